//! Simulated output device.
//!
//! `HeadlessDevice` produces no sound; it keeps the same timeline a real
//! sink would (start delay, pitch-scaled clip length, looping, pause) so the
//! engine behaves identically on servers, in tests and without hardware.

use tracing::trace;
use volley_common::{ChannelId, DeviceError, Vec3};

use crate::device::{DeviceFactory, DeviceSettings, OutputDevice};
use crate::spatial::{AttenuationModel, SharedListener, SpatialSource};

/// Binding that advances a virtual playhead.
#[derive(Debug)]
pub struct HeadlessDevice {
    id: ChannelId,
    settings: Option<DeviceSettings>,
    listener: SharedListener,
    model: AttenuationModel,
    position: Vec3,
    bus_gain: f32,
    active: bool,
    paused: bool,
    delay_left: f32,
    playhead: f32,
}

impl HeadlessDevice {
    /// Creates an unconfigured binding.
    #[must_use]
    pub fn new(id: ChannelId, listener: SharedListener, model: AttenuationModel) -> Self {
        Self {
            id,
            settings: None,
            listener,
            model,
            position: Vec3::ZERO,
            bus_gain: 1.0,
            active: false,
            paused: false,
            delay_left: 0.0,
            playhead: 0.0,
        }
    }

    /// Seconds of clip played so far.
    #[must_use]
    pub fn playhead(&self) -> f32 {
        self.playhead
    }

    fn clip_length(&self) -> Option<f32> {
        let settings = self.settings.as_ref()?;
        if settings.looping {
            return None;
        }
        Some(settings.clip.duration / settings.pitch.max(f32::EPSILON))
    }
}

impl OutputDevice for HeadlessDevice {
    fn configure(&mut self, settings: &DeviceSettings) -> Result<(), DeviceError> {
        self.settings = Some(settings.clone());
        self.active = false;
        self.paused = false;
        self.delay_left = 0.0;
        self.playhead = 0.0;
        Ok(())
    }

    fn play(&mut self, delay: f32) {
        if self.settings.is_none() {
            trace!("{}: play without clip ignored", self.id);
            return;
        }
        self.active = true;
        self.paused = false;
        self.delay_left = delay.max(0.0);
        self.playhead = 0.0;
    }

    fn stop(&mut self) {
        self.active = false;
        self.paused = false;
        self.delay_left = 0.0;
        self.playhead = 0.0;
    }

    fn pause(&mut self) {
        if self.active {
            self.paused = true;
        }
    }

    fn resume(&mut self) {
        self.paused = false;
    }

    fn set_volume(&mut self, volume: f32) {
        if let Some(settings) = self.settings.as_mut() {
            settings.volume = volume;
        }
    }

    fn set_pitch(&mut self, pitch: f32) {
        if let Some(settings) = self.settings.as_mut() {
            settings.pitch = pitch;
        }
    }

    fn set_bus_gain(&mut self, gain: f32) {
        self.bus_gain = gain;
    }

    fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    fn advance(&mut self, dt: f32) {
        if !self.active || self.paused {
            return;
        }

        let mut dt = dt.max(0.0);
        if self.delay_left > 0.0 {
            let consumed = dt.min(self.delay_left);
            self.delay_left -= consumed;
            dt -= consumed;
        }
        self.playhead += dt;

        if let Some(length) = self.clip_length() {
            if self.delay_left <= 0.0 && self.playhead >= length {
                self.active = false;
                trace!("{}: clip finished", self.id);
            }
        }
    }

    fn is_playing(&self) -> bool {
        self.active && !self.paused
    }

    fn is_paused(&self) -> bool {
        self.active && self.paused
    }

    fn output_gain(&self) -> f32 {
        let Some(settings) = self.settings.as_ref() else {
            return 0.0;
        };
        let source = SpatialSource {
            position: self.position,
            blend: settings.spatial_blend,
            min_distance: settings.min_distance,
            max_distance: settings.max_distance,
        };
        settings.volume * self.bus_gain * source.gain(self.listener.position(), self.model)
    }

    fn reset(&mut self) {
        self.stop();
        self.settings = None;
        self.position = Vec3::ZERO;
        self.bus_gain = 1.0;
    }
}

/// Creates [`HeadlessDevice`] bindings sharing one listener.
#[derive(Debug, Default)]
pub struct HeadlessFactory {
    listener: SharedListener,
    model: AttenuationModel,
    created: usize,
}

impl HeadlessFactory {
    /// Creates a factory with its own listener.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses an existing listener.
    #[must_use]
    pub fn with_listener(mut self, listener: SharedListener) -> Self {
        self.listener = listener;
        self
    }

    /// Sets the attenuation model.
    #[must_use]
    pub fn with_model(mut self, model: AttenuationModel) -> Self {
        self.model = model;
        self
    }

    /// The listener bindings attenuate against.
    #[must_use]
    pub fn listener(&self) -> &SharedListener {
        &self.listener
    }

    /// Number of bindings created so far.
    #[must_use]
    pub fn created(&self) -> usize {
        self.created
    }
}

impl DeviceFactory for HeadlessFactory {
    fn create(&mut self, id: ChannelId) -> Result<Box<dyn OutputDevice>, DeviceError> {
        self.created += 1;
        Ok(Box::new(HeadlessDevice::new(
            id,
            self.listener.clone(),
            self.model,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::ClipRef;

    fn settings(duration: f32, looping: bool) -> DeviceSettings {
        DeviceSettings {
            clip: ClipRef::new("test.wav", duration),
            volume: 1.0,
            pitch: 1.0,
            looping,
            spatial_blend: 0.0,
            min_distance: 1.0,
            max_distance: 50.0,
        }
    }

    fn device() -> HeadlessDevice {
        HeadlessDevice::new(
            ChannelId::new(0),
            SharedListener::new(),
            AttenuationModel::Linear,
        )
    }

    #[test]
    fn test_clip_finishes_after_duration() {
        let mut dev = device();
        dev.configure(&settings(1.0, false)).expect("configure");
        dev.play(0.0);
        assert!(dev.is_playing());

        dev.advance(0.5);
        assert!(dev.is_playing());
        dev.advance(0.5);
        assert!(!dev.is_playing());
    }

    #[test]
    fn test_delay_postpones_playhead() {
        let mut dev = device();
        dev.configure(&settings(1.0, false)).expect("configure");
        dev.play(0.5);

        dev.advance(0.5);
        assert!(dev.playhead().abs() < f32::EPSILON);
        assert!(dev.is_playing());
        dev.advance(0.9);
        assert!(dev.is_playing());
        dev.advance(0.2);
        assert!(!dev.is_playing());
    }

    #[test]
    fn test_pitch_shortens_clip() {
        let mut dev = device();
        let mut s = settings(1.0, false);
        s.pitch = 2.0;
        dev.configure(&s).expect("configure");
        dev.play(0.0);
        dev.advance(0.5);
        assert!(!dev.is_playing());
    }

    #[test]
    fn test_looping_never_finishes() {
        let mut dev = device();
        dev.configure(&settings(0.1, true)).expect("configure");
        dev.play(0.0);
        for _ in 0..100 {
            dev.advance(0.1);
        }
        assert!(dev.is_playing());
    }

    #[test]
    fn test_pause_freezes_playhead() {
        let mut dev = device();
        dev.configure(&settings(1.0, false)).expect("configure");
        dev.play(0.0);
        dev.advance(0.25);
        dev.pause();
        assert!(dev.is_paused());
        assert!(!dev.is_playing());

        dev.advance(10.0);
        assert!((dev.playhead() - 0.25).abs() < 1e-6);

        dev.resume();
        assert!(dev.is_playing());
    }

    #[test]
    fn test_output_gain_includes_bus_and_distance() {
        let listener = SharedListener::new();
        let mut dev = HeadlessDevice::new(ChannelId::new(1), listener.clone(), AttenuationModel::Linear);
        let mut s = settings(1.0, false);
        s.volume = 0.5;
        s.spatial_blend = 1.0;
        s.max_distance = 11.0;
        dev.configure(&s).expect("configure");
        dev.set_bus_gain(0.5);
        dev.set_position(Vec3::new(6.0, 0.0, 0.0));

        // halfway between min (1) and max (11) distance
        assert!((dev.output_gain() - 0.125).abs() < 1e-6);

        listener.set_position(Vec3::new(6.0, 0.0, 0.0));
        assert!((dev.output_gain() - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_reset_clears_clip() {
        let mut dev = device();
        dev.configure(&settings(1.0, false)).expect("configure");
        dev.play(0.0);
        dev.reset();
        assert!(!dev.is_playing());
        assert!(dev.output_gain().abs() < f32::EPSILON);

        dev.play(0.0);
        assert!(!dev.is_playing());
    }

    #[test]
    fn test_factory_counts_bindings() {
        let mut factory = HeadlessFactory::new();
        let _ = factory.create(ChannelId::new(0)).expect("create");
        let _ = factory.create(ChannelId::new(1)).expect("create");
        assert_eq!(factory.created(), 2);
    }
}
