//! Distance attenuation for positional playback.
//!
//! Positional channels blend between flat gain (spatial blend 0.0) and
//! distance-attenuated gain (spatial blend 1.0). Panning and filtering are
//! left to the output backend.

use std::cell::Cell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use volley_common::Vec3;

/// Gain below which a source is treated as inaudible.
pub const MIN_AUDIBLE_GAIN: f32 = 0.001;

/// Distance attenuation model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttenuationModel {
    /// No distance attenuation.
    None,
    /// Linear falloff from min to max distance.
    Linear,
    /// Inverse distance (min/d) falloff.
    #[default]
    Inverse,
}

impl AttenuationModel {
    /// Attenuation factor (0.0-1.0) at `distance`.
    #[must_use]
    pub fn calculate(self, distance: f32, min_distance: f32, max_distance: f32) -> f32 {
        let min_distance = min_distance.max(f32::EPSILON);
        let max_distance = max_distance.max(min_distance);
        let d = distance.clamp(0.0, max_distance);

        if d <= min_distance {
            return 1.0;
        }

        match self {
            Self::None => 1.0,
            Self::Linear => {
                let range = max_distance - min_distance;
                if range > 0.0 {
                    1.0 - ((d - min_distance) / range)
                } else {
                    1.0
                }
            },
            Self::Inverse => min_distance / d,
        }
    }
}

/// Listener position shared between the host and every binding.
#[derive(Debug, Clone, Default)]
pub struct SharedListener {
    position: Rc<Cell<Vec3>>,
}

impl SharedListener {
    /// Creates a listener at the origin.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the listener.
    pub fn set_position(&self, position: Vec3) {
        self.position.set(position);
    }

    /// Current listener position.
    #[must_use]
    pub fn position(&self) -> Vec3 {
        self.position.get()
    }
}

/// Positional parameters of one source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialSource {
    /// World position.
    pub position: Vec3,
    /// 0.0 = flat, 1.0 = fully attenuated by distance.
    pub blend: f32,
    /// Full-volume radius.
    pub min_distance: f32,
    /// Attenuation stops beyond this distance.
    pub max_distance: f32,
}

impl SpatialSource {
    /// Gain for this source as heard from `listener`.
    #[must_use]
    pub fn gain(&self, listener: Vec3, model: AttenuationModel) -> f32 {
        let blend = self.blend.clamp(0.0, 1.0);
        if blend <= 0.0 {
            return 1.0;
        }
        let distance = self.position.distance(listener);
        let attenuation = model.calculate(distance, self.min_distance, self.max_distance);
        (1.0 - blend) + blend * attenuation
    }
}
