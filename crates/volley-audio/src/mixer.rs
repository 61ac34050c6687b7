//! Category volume control.
//!
//! Volumes are linear `0.0..=1.0` at the API and decibels on the bus:
//!
//! ```text
//! set:  dB = 20 · log10(linear)      linear <= 0  ->  FLOOR_DB
//! get:  linear = 10^(dB / 20)        dB <= FLOOR_DB  ->  0
//! ```
//!
//! Channels do not read bus parameters themselves; the engine pushes each
//! category's effective gain ([`MixerController::bus_gain`]) to the channels
//! routed to it whenever a volume, mute flag or master level changes.

use tracing::{debug, error, warn};
use volley_common::{AudioCategory, CategoryTable};
use volley_kernel::{BusHandle, BusRouter};

/// Silence floor in decibels.
pub const FLOOR_DB: f32 = -80.0;

/// Converts a linear volume to decibels, flooring silence at [`FLOOR_DB`].
#[must_use]
pub fn linear_to_db(linear: f32) -> f32 {
    if linear <= 0.0 {
        FLOOR_DB
    } else {
        (20.0 * linear.log10()).max(FLOOR_DB)
    }
}

/// Converts decibels to a linear volume; anything at the floor is silence.
#[must_use]
pub fn db_to_linear(db: f32) -> f32 {
    if db <= FLOOR_DB {
        0.0
    } else {
        10.0_f32.powf(db / 20.0)
    }
}

/// Category → bus routing plus volume and mute state.
#[derive(Debug)]
pub struct MixerController {
    router: Box<dyn BusRouter>,
    master_parameter: String,
    muted: CategoryTable<bool>,
    reported_missing: CategoryTable<bool>,
}

impl MixerController {
    /// Wraps a router. `master_parameter` names the master bus parameter.
    pub fn new(router: Box<dyn BusRouter>, master_parameter: impl Into<String>) -> Self {
        Self {
            router,
            master_parameter: master_parameter.into(),
            muted: CategoryTable::default(),
            reported_missing: CategoryTable::default(),
        }
    }

    /// Bus for a category. A missing route is reported once per category.
    pub fn route(&mut self, category: AudioCategory) -> Option<BusHandle> {
        let bus = self.router.bus(category);
        if bus.is_none() && !*self.reported_missing.get(category) {
            *self.reported_missing.get_mut(category) = true;
            error!("No mixer bus routed for category {category}; its volume controls are inert");
        }
        bus
    }

    /// Sets a category volume (linear, clamped to `0.0..=1.0`).
    pub fn set_category_volume(&mut self, category: AudioCategory, linear: f32) {
        let Some(bus) = self.route(category) else {
            return;
        };
        let db = linear_to_db(linear.clamp(0.0, 1.0));
        if self.router.set_parameter(&bus.volume_parameter, db) {
            debug!("{category} volume -> {db:.1} dB");
        } else {
            warn!(
                "Bus parameter '{}' for {category} is not exposed",
                bus.volume_parameter
            );
        }
    }

    /// Current category volume (linear). Unrouted categories report 1.0.
    pub fn category_volume(&mut self, category: AudioCategory) -> f32 {
        self.route(category)
            .and_then(|bus| self.router.parameter(&bus.volume_parameter))
            .map_or(1.0, db_to_linear)
    }

    /// Sets the master parameter in raw decibels.
    pub fn set_master_parameter(&mut self, db: f32) {
        if !self.router.set_parameter(&self.master_parameter, db) {
            warn!("Master parameter '{}' is not exposed", self.master_parameter);
        }
    }

    /// Master parameter in raw decibels (0 dB when not exposed).
    #[must_use]
    pub fn master_parameter(&self) -> f32 {
        self.router.parameter(&self.master_parameter).unwrap_or(0.0)
    }

    /// Sets the master volume (linear).
    pub fn set_master_volume(&mut self, linear: f32) {
        self.set_master_parameter(linear_to_db(linear.clamp(0.0, 1.0)));
    }

    /// Master volume (linear).
    #[must_use]
    pub fn master_volume(&self) -> f32 {
        db_to_linear(self.master_parameter())
    }

    /// Mutes or unmutes a category without touching its volume.
    pub fn set_category_muted(&mut self, category: AudioCategory, muted: bool) {
        *self.muted.get_mut(category) = muted;
        debug!("{category} muted = {muted}");
    }

    /// Whether a category is muted.
    #[must_use]
    pub fn is_muted(&self, category: AudioCategory) -> bool {
        *self.muted.get(category)
    }

    /// Effective linear gain for channels in a category.
    pub fn bus_gain(&mut self, category: AudioCategory) -> f32 {
        if self.is_muted(category) {
            return 0.0;
        }
        self.category_volume(category) * self.master_volume()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use volley_kernel::ParameterMixer;

    fn mixer() -> MixerController {
        MixerController::new(
            Box::new(ParameterMixer::with_conventional_routes("master_volume")),
            "master_volume",
        )
    }

    #[test]
    fn test_db_conversions() {
        assert!(linear_to_db(1.0).abs() < 1e-6);
        assert!((linear_to_db(0.0) - FLOOR_DB).abs() < f32::EPSILON);
        assert!((linear_to_db(-1.0) - FLOOR_DB).abs() < f32::EPSILON);
        assert!((linear_to_db(0.5) + 6.0206).abs() < 1e-3);
        assert!(db_to_linear(FLOOR_DB).abs() < f32::EPSILON);
        assert!(db_to_linear(-120.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_category_volume_zero_is_silence() {
        let mut mixer = mixer();
        mixer.set_category_volume(AudioCategory::Sfx, 0.0);
        assert!(mixer.category_volume(AudioCategory::Sfx).abs() < f32::EPSILON);
    }

    #[test]
    fn test_unrouted_category_is_inert() {
        let mut router = ParameterMixer::with_conventional_routes("master_volume");
        router.unroute(AudioCategory::Voice);
        let mut mixer = MixerController::new(Box::new(router), "master_volume");

        mixer.set_category_volume(AudioCategory::Voice, 0.2);
        assert!((mixer.category_volume(AudioCategory::Voice) - 1.0).abs() < f32::EPSILON);
        assert!(mixer.route(AudioCategory::Voice).is_none());
        assert!(*mixer.reported_missing.get(AudioCategory::Voice));
    }

    #[test]
    fn test_bus_gain_combines_master_and_mute() {
        let mut mixer = mixer();
        mixer.set_category_volume(AudioCategory::Music, 0.5);
        mixer.set_master_volume(0.5);
        assert!((mixer.bus_gain(AudioCategory::Music) - 0.25).abs() < 1e-4);

        mixer.set_category_muted(AudioCategory::Music, true);
        assert!(mixer.bus_gain(AudioCategory::Music).abs() < f32::EPSILON);
        // volume survives the mute
        assert!((mixer.category_volume(AudioCategory::Music) - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_master_parameter_raw() {
        let mut mixer = mixer();
        mixer.set_master_parameter(-6.0);
        assert!((mixer.master_parameter() + 6.0).abs() < f32::EPSILON);
    }

    proptest! {
        #[test]
        fn prop_category_volume_round_trip(v in 0.001f32..=1.0) {
            let mut mixer = mixer();
            mixer.set_category_volume(AudioCategory::Sfx, v);
            let back = mixer.category_volume(AudioCategory::Sfx);
            prop_assert!((back - v).abs() <= v * 1e-3, "{v} -> {back}");
        }
    }
}
