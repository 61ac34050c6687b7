//! Rodio output backend.
//!
//! One rodio [`Sink`] per playback. A binding keeps its settings between
//! plays and builds a fresh sink on every `play`, so stopped sinks never have
//! to be reused.
//!
//! ```text
//! ┌──────────────┐   create()   ┌───────────────┐  append  ┌──────────┐
//! │ RodioFactory │ ───────────► │ RodioBinding  │ ───────► │   Sink   │
//! │ (stream)     │              │ (per channel) │          │ (rodio)  │
//! └──────┬───────┘              └───────┬───────┘          └──────────┘
//!        │          SampleBank          │
//!        └──────── decoded clips ───────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, OutputStreamHandle, Sink, Source};
use tracing::{debug, info, warn};
use volley_common::{ChannelId, DeviceError, Vec3};

use crate::device::{ClipRef, DeviceFactory, DeviceSettings, OutputDevice};
use crate::sample_bank::SampleBank;
use crate::spatial::{AttenuationModel, SharedListener, SpatialSource};

/// Wraps rodio's output stream.
pub struct RodioOutput {
    /// The output stream (must be kept alive).
    _stream: OutputStream,
    handle: OutputStreamHandle,
}

impl std::fmt::Debug for RodioOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RodioOutput").finish_non_exhaustive()
    }
}

impl RodioOutput {
    /// Opens the default output device.
    pub fn open_default() -> Result<Self, DeviceError> {
        let (stream, handle) =
            OutputStream::try_default().map_err(|e| DeviceError::InitFailed(e.to_string()))?;
        info!("Audio output device opened");
        Ok(Self {
            _stream: stream,
            handle,
        })
    }

    fn create_sink(&self) -> Result<Sink, DeviceError> {
        Sink::try_new(&self.handle).map_err(|e| DeviceError::BindingFailed(e.to_string()))
    }
}

/// Creates rodio-backed bindings.
#[derive(Debug)]
pub struct RodioFactory {
    output: Arc<RodioOutput>,
    bank: Arc<RwLock<SampleBank>>,
    listener: SharedListener,
    model: AttenuationModel,
}

impl RodioFactory {
    /// Opens the default device and resolves clips against `asset_root`.
    pub fn open_default(asset_root: impl Into<PathBuf>) -> Result<Self, DeviceError> {
        Ok(Self {
            output: Arc::new(RodioOutput::open_default()?),
            bank: Arc::new(RwLock::new(SampleBank::new(asset_root))),
            listener: SharedListener::new(),
            model: AttenuationModel::default(),
        })
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

    /// Shared sample bank.
    #[must_use]
    pub fn bank(&self) -> Arc<RwLock<SampleBank>> {
        Arc::clone(&self.bank)
    }
}

impl DeviceFactory for RodioFactory {
    fn create(&mut self, id: ChannelId) -> Result<Box<dyn OutputDevice>, DeviceError> {
        debug!("Creating rodio binding for {}", id);
        Ok(Box::new(RodioBinding {
            id,
            output: Arc::clone(&self.output),
            bank: Arc::clone(&self.bank),
            listener: self.listener.clone(),
            model: self.model,
            settings: None,
            sink: None,
            position: Vec3::ZERO,
            bus_gain: 1.0,
        }))
    }

    fn preload(&mut self, clip: &ClipRef) -> Result<(), DeviceError> {
        self.bank.write().load(&clip.path).map(|_| ())
    }
}

/// One channel's rodio binding.
pub struct RodioBinding {
    id: ChannelId,
    output: Arc<RodioOutput>,
    bank: Arc<RwLock<SampleBank>>,
    listener: SharedListener,
    model: AttenuationModel,
    settings: Option<DeviceSettings>,
    sink: Option<Sink>,
    position: Vec3,
    bus_gain: f32,
}

impl std::fmt::Debug for RodioBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RodioBinding")
            .field("id", &self.id)
            .field("settings", &self.settings)
            .field("has_sink", &self.sink.is_some())
            .field("bus_gain", &self.bus_gain)
            .finish_non_exhaustive()
    }
}

impl RodioBinding {
    fn apply_gain(&self) {
        if let Some(sink) = &self.sink {
            sink.set_volume(self.output_gain());
        }
    }
}

impl OutputDevice for RodioBinding {
    fn configure(&mut self, settings: &DeviceSettings) -> Result<(), DeviceError> {
        self.bank.write().load(&settings.clip.path)?;
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
        self.settings = Some(settings.clone());
        Ok(())
    }

    fn play(&mut self, delay: f32) {
        let Some(settings) = self.settings.as_ref() else {
            warn!("{}: play without configured clip", self.id);
            return;
        };
        let bank = self.bank.read();
        let Some(clip) = bank.get(&settings.clip.path) else {
            warn!("{}: clip '{}' no longer banked", self.id, settings.clip.path);
            return;
        };

        let sink = match self.output.create_sink() {
            Ok(sink) => sink,
            Err(e) => {
                warn!("{}: {}", self.id, e);
                return;
            },
        };

        let buffer = SamplesBuffer::new(clip.channels, clip.sample_rate, (*clip.samples).clone());
        let delay = Duration::from_secs_f32(delay.max(0.0));
        if settings.looping {
            sink.append(buffer.repeat_infinite().delay(delay));
        } else {
            sink.append(buffer.delay(delay));
        }
        sink.set_speed(settings.pitch);
        sink.play();
        drop(bank);

        self.sink = Some(sink);
        self.apply_gain();
    }

    fn stop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
    }

    fn pause(&mut self) {
        if let Some(sink) = &self.sink {
            sink.pause();
        }
    }

    fn resume(&mut self) {
        if let Some(sink) = &self.sink {
            sink.play();
        }
    }

    fn set_volume(&mut self, volume: f32) {
        if let Some(settings) = self.settings.as_mut() {
            settings.volume = volume;
        }
        self.apply_gain();
    }

    fn set_pitch(&mut self, pitch: f32) {
        if let Some(settings) = self.settings.as_mut() {
            settings.pitch = pitch;
        }
        if let Some(sink) = &self.sink {
            sink.set_speed(pitch);
        }
    }

    fn set_bus_gain(&mut self, gain: f32) {
        self.bus_gain = gain;
        self.apply_gain();
    }

    fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    fn advance(&mut self, _dt: f32) {
        // rodio keeps its own clock; only the listener-relative gain moves
        self.apply_gain();
    }

    fn is_playing(&self) -> bool {
        self.sink
            .as_ref()
            .is_some_and(|sink| !sink.empty() && !sink.is_paused())
    }

    fn is_paused(&self) -> bool {
        self.sink
            .as_ref()
            .is_some_and(|sink| !sink.empty() && sink.is_paused())
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
