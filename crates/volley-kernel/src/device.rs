//! Output device abstraction.
//!
//! Every playback channel owns exactly one [`OutputDevice`] binding, created
//! by a [`DeviceFactory`] when the pool grows. Bindings are recycled with the
//! channel and only dropped at pool teardown.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use volley_common::{ChannelId, DeviceError, Vec3};

/// Reference to the waveform an asset plays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipRef {
    /// Clip key (usually a path relative to the asset root).
    pub path: Arc<str>,
    /// Natural duration in seconds at pitch 1.0.
    pub duration: f32,
}

impl ClipRef {
    /// Creates a clip reference.
    #[must_use]
    pub fn new(path: impl AsRef<str>, duration: f32) -> Self {
        Self {
            path: Arc::from(path.as_ref()),
            duration: duration.max(0.0),
        }
    }
}

/// Everything a binding needs to start a clip.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSettings {
    /// Clip to play.
    pub clip: ClipRef,
    /// Channel volume (0.0-1.0).
    pub volume: f32,
    /// Playback speed multiplier.
    pub pitch: f32,
    /// Whether the clip repeats.
    pub looping: bool,
    /// 0.0 = flat 2D, 1.0 = fully positional.
    pub spatial_blend: f32,
    /// Distance below which the clip is at full volume.
    pub min_distance: f32,
    /// Distance at which attenuation stops.
    pub max_distance: f32,
}

/// One output binding.
pub trait OutputDevice: fmt::Debug {
    /// Loads a clip and its playback settings. Does not start playback.
    fn configure(&mut self, settings: &DeviceSettings) -> Result<(), DeviceError>;

    /// Starts the configured clip after `delay` seconds.
    fn play(&mut self, delay: f32);

    /// Stops playback and forgets the clip position.
    fn stop(&mut self);

    /// Pauses playback.
    fn pause(&mut self);

    /// Resumes paused playback.
    fn resume(&mut self);

    /// Sets the channel volume.
    fn set_volume(&mut self, volume: f32);

    /// Sets the playback speed.
    fn set_pitch(&mut self, pitch: f32);

    /// Sets the linear gain of the bus the channel is routed to.
    fn set_bus_gain(&mut self, gain: f32);

    /// Places the source in the world.
    fn set_position(&mut self, position: Vec3);

    /// Advances device time by `dt` seconds.
    fn advance(&mut self, dt: f32);

    /// Whether audio is (or is scheduled to be) coming out of this binding.
    fn is_playing(&self) -> bool;

    /// Whether playback is paused.
    fn is_paused(&self) -> bool;

    /// Final gain after volume, bus gain and spatial attenuation.
    fn output_gain(&self) -> f32;

    /// Returns the binding to its unconfigured state.
    fn reset(&mut self);
}

/// Creates output bindings for new pool channels.
pub trait DeviceFactory: fmt::Debug {
    /// Creates the binding for channel `id`.
    fn create(&mut self, id: ChannelId) -> Result<Box<dyn OutputDevice>, DeviceError>;

    /// Makes a clip ready for low-latency playback.
    fn preload(&mut self, _clip: &ClipRef) -> Result<(), DeviceError> {
        Ok(())
    }
}
