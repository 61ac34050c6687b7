//! Poolable playback unit.
//!
//! A channel owns one output binding for its whole life. The pool hands it
//! out, the engine configures it per play, and the pool resets it on return.
//!
//! State machine:
//!
//! ```text
//!            play()                      pause()
//!   Idle ──► Configuring ──► Playing ◄──────────► Paused
//!    ▲            │            │       resume()     │
//!    │  failure   │            │ stop() / finished  │ stop()
//!    └────────────┴────────────┴────────────────────┘
//! ```
//!
//! The lifetime watchdog counts time spent outside `Paused`. Once it passes
//! the per-play lifetime the channel reports [`ChannelTick::Expired`] and the
//! pool reclaims it, whether or not anyone disposed the handle.

use std::sync::Arc;

use tracing::{debug, trace};
use volley_common::{Anchor, AnchorFollower, AudioCategory, ChannelId, DeviceError, Vec3};
use volley_kernel::{DeviceSettings, OutputDevice};

use crate::asset::{AudioAsset, PlaybackParameters};

/// Channel lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelState {
    /// Unused or finished.
    #[default]
    Idle,
    /// Loading a clip into the binding.
    Configuring,
    /// Producing (or scheduled to produce) audio.
    Playing,
    /// Suspended mid-clip.
    Paused,
}

/// Where a channel sits in the world.
#[derive(Debug, Clone, Default)]
pub enum Placement {
    /// No position; spatial blend decides how it sounds.
    #[default]
    Unplaced,
    /// A fixed point.
    Fixed(Vec3),
    /// Follows an anchor every tick.
    Attached(AnchorFollower),
}

/// Numeric limits every play is clamped to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelLimits {
    /// Lowest pitch.
    pub min_pitch: f32,
    /// Highest pitch.
    pub max_pitch: f32,
    /// Seconds the watchdog waits past the natural clip length.
    pub lifetime_margin: f32,
}

impl Default for ChannelLimits {
    fn default() -> Self {
        Self {
            min_pitch: 0.1,
            max_pitch: 4.0,
            lifetime_margin: 0.5,
        }
    }
}

/// Outcome of one channel tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelTick {
    /// Keep going.
    Running,
    /// The watchdog lifetime ran out.
    Expired,
}

/// One reusable output channel.
#[derive(Debug)]
pub struct PlaybackChannel {
    id: ChannelId,
    generation: u32,
    device: Box<dyn OutputDevice>,
    state: ChannelState,
    asset: Option<Arc<AudioAsset>>,
    volume: f32,
    pitch: f32,
    looping: bool,
    spatial_blend: f32,
    bus_gain: f32,
    delay: f32,
    placement: Placement,
    elapsed: f32,
    lifetime: Option<f32>,
    limits: ChannelLimits,
}

impl PlaybackChannel {
    /// Wraps a freshly created binding.
    pub fn new(id: ChannelId, device: Box<dyn OutputDevice>, limits: ChannelLimits) -> Self {
        Self {
            id,
            generation: 0,
            device,
            state: ChannelState::Idle,
            asset: None,
            volume: 1.0,
            pitch: 1.0,
            looping: false,
            spatial_blend: 0.0,
            bus_gain: 1.0,
            delay: 0.0,
            placement: Placement::Unplaced,
            elapsed: 0.0,
            lifetime: None,
            limits,
        }
    }

    /// Channel ID.
    #[must_use]
    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// Number of times this channel has been returned to the pool.
    #[must_use]
    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub(crate) fn bump_generation(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    /// Starts `asset` with per-call overrides.
    ///
    /// Returns the resolved volume. With a fade-in the binding starts silent
    /// and the caller is expected to ramp toward that volume.
    pub fn play(
        &mut self,
        asset: &Arc<AudioAsset>,
        params: &PlaybackParameters,
        rng: &mut fastrand::Rng,
    ) -> Result<f32, DeviceError> {
        let volume_jitter = params.random_volume.map_or(1.0, |range| range.sample(rng));
        let pitch_jitter = params.random_pitch.map_or(1.0, |range| range.sample(rng));

        let volume =
            (asset.default_volume * params.volume_multiplier * volume_jitter).clamp(0.0, 1.0);
        let pitch = (asset.default_pitch * params.pitch_multiplier * pitch_jitter)
            .clamp(self.limits.min_pitch, self.limits.max_pitch);
        let looping = params.loop_override.unwrap_or(asset.looping);
        let spatial_blend = params
            .spatial_blend_override
            .unwrap_or(asset.spatial_blend)
            .clamp(0.0, 1.0);
        let delay = params.delay.max(0.0);
        let start_volume = if params.fade_in > 0.0 { 0.0 } else { volume };

        self.state = ChannelState::Configuring;
        let settings = DeviceSettings {
            clip: asset.clip.clone(),
            volume: start_volume,
            pitch,
            looping,
            spatial_blend,
            min_distance: asset.min_distance,
            max_distance: asset.max_distance,
        };
        if let Err(e) = self.device.configure(&settings) {
            self.device.reset();
            self.state = ChannelState::Idle;
            return Err(e);
        }

        self.asset = Some(Arc::clone(asset));
        self.volume = start_volume;
        self.pitch = pitch;
        self.looping = looping;
        self.spatial_blend = spatial_blend;
        self.delay = delay;
        self.elapsed = 0.0;
        self.lifetime = self.natural_lifetime();

        self.device.set_bus_gain(self.bus_gain);
        self.device.play(delay);
        self.state = ChannelState::Playing;
        debug!(
            "{}: playing '{}' vol={volume:.2} pitch={pitch:.2} loop={looping} delay={delay:.2}",
            self.id, asset.id
        );
        Ok(volume)
    }

    fn natural_lifetime(&self) -> Option<f32> {
        if self.looping {
            return None;
        }
        let duration = self.asset.as_ref()?.clip.duration;
        Some(self.delay + duration / self.pitch + self.limits.lifetime_margin)
    }

    /// Stops playback. The channel stays checked out.
    pub fn stop(&mut self) {
        if self.state == ChannelState::Idle {
            return;
        }
        self.device.stop();
        self.state = ChannelState::Idle;
    }

    /// Pauses; only meaningful while playing.
    pub fn pause(&mut self) {
        if self.state == ChannelState::Playing {
            self.device.pause();
            self.state = ChannelState::Paused;
        }
    }

    /// Resumes; only meaningful while paused.
    pub fn resume(&mut self) {
        if self.state == ChannelState::Paused {
            self.device.resume();
            self.state = ChannelState::Playing;
        }
    }

    /// Sets the channel volume (clamped to `0.0..=1.0`).
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        self.device.set_volume(self.volume);
    }

    /// Sets the pitch (clamped to the configured limits).
    ///
    /// Only the part of the clip not yet played is rescaled in the watchdog
    /// lifetime.
    pub fn set_pitch(&mut self, pitch: f32) {
        let previous = self.pitch;
        self.pitch = pitch.clamp(self.limits.min_pitch, self.limits.max_pitch);
        self.device.set_pitch(self.pitch);
        if let Some(lifetime) = self.lifetime {
            self.lifetime = Some(self.rescaled_lifetime(lifetime, previous));
        }
    }

    fn rescaled_lifetime(&self, lifetime: f32, previous_pitch: f32) -> f32 {
        let margin = self.limits.lifetime_margin;
        let pending_delay = (self.delay - self.elapsed).max(0.0);
        let clip_left = (lifetime - margin - self.elapsed - pending_delay).max(0.0);
        self.elapsed + pending_delay + clip_left * previous_pitch / self.pitch + margin
    }

    /// Sets the linear gain of the category bus.
    pub fn set_bus_gain(&mut self, gain: f32) {
        self.bus_gain = gain.max(0.0);
        self.device.set_bus_gain(self.bus_gain);
    }

    /// Pins the source at a point.
    pub fn set_position(&mut self, position: Vec3) {
        self.placement = Placement::Fixed(position);
        self.device.set_position(position);
    }

    /// Follows `anchor` from now on.
    pub fn attach_to(&mut self, anchor: &Anchor) {
        self.device.set_position(anchor.get());
        self.placement = Placement::Attached(anchor.follower());
    }

    /// Advances the binding and the watchdog.
    pub fn tick(&mut self, dt: f32) -> ChannelTick {
        if let Placement::Attached(follower) = &self.placement {
            match follower.position() {
                Some(position) => self.device.set_position(position),
                None => {
                    // anchor dropped; keep its last position
                    trace!("{}: anchor gone, pinning in place", self.id);
                    self.placement = Placement::Unplaced;
                },
            }
        }

        self.device.advance(dt);
        if self.state == ChannelState::Playing && !self.device.is_playing() {
            trace!("{}: clip finished", self.id);
            self.state = ChannelState::Idle;
        }

        if self.state != ChannelState::Paused {
            if let Some(lifetime) = self.lifetime {
                self.elapsed += dt;
                if self.elapsed >= lifetime {
                    debug!(
                        "{}: watchdog expired after {:.2}s (lifetime {lifetime:.2}s)",
                        self.id, self.elapsed
                    );
                    return ChannelTick::Expired;
                }
            }
        }
        ChannelTick::Running
    }

    /// Returns everything to defaults. Called by the pool before requeueing.
    pub fn reset(&mut self) {
        self.device.reset();
        self.state = ChannelState::Idle;
        self.asset = None;
        self.volume = 1.0;
        self.pitch = 1.0;
        self.looping = false;
        self.spatial_blend = 0.0;
        self.bus_gain = 1.0;
        self.delay = 0.0;
        self.placement = Placement::Unplaced;
        self.elapsed = 0.0;
        self.lifetime = None;
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// Whether the channel is playing.
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.state == ChannelState::Playing
    }

    /// Whether the channel is paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.state == ChannelState::Paused
    }

    /// Asset currently loaded.
    #[must_use]
    pub fn asset(&self) -> Option<&Arc<AudioAsset>> {
        self.asset.as_ref()
    }

    /// Category of the loaded asset.
    #[must_use]
    pub fn category(&self) -> Option<AudioCategory> {
        self.asset.as_ref().map(|asset| asset.category)
    }

    /// Channel volume.
    #[must_use]
    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Playback pitch.
    #[must_use]
    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    /// Whether the current play loops.
    #[must_use]
    pub fn is_looping(&self) -> bool {
        self.looping
    }

    /// Spatial blend of the current play.
    #[must_use]
    pub fn spatial_blend(&self) -> f32 {
        self.spatial_blend
    }

    /// Current placement.
    #[must_use]
    pub fn placement(&self) -> &Placement {
        &self.placement
    }

    /// Seconds counted by the watchdog.
    #[must_use]
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// Watchdog lifetime of the current play (`None` while looping or idle).
    #[must_use]
    pub fn lifetime(&self) -> Option<f32> {
        self.lifetime
    }

    /// Final gain reported by the binding.
    #[must_use]
    pub fn output_gain(&self) -> f32 {
        self.device.output_gain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::RandomRange;
    use volley_kernel::{AttenuationModel, ClipRef, HeadlessDevice, SharedListener};

    fn channel() -> PlaybackChannel {
        let id = ChannelId::new(0);
        PlaybackChannel::new(
            id,
            Box::new(HeadlessDevice::new(
                id,
                SharedListener::new(),
                AttenuationModel::Inverse,
            )),
            ChannelLimits::default(),
        )
    }

    fn asset(duration: f32) -> Arc<AudioAsset> {
        Arc::new(AudioAsset::new("Shot", ClipRef::new("shot.wav", duration)).with_volume(0.8))
    }

    #[test]
    fn test_play_resolves_parameters() {
        let mut channel = channel();
        let mut rng = fastrand::Rng::with_seed(1);
        let params = PlaybackParameters::default()
            .with_volume(2.0)
            .with_pitch(10.0)
            .with_loop(true)
            .with_spatial_blend(0.5);

        let volume = channel.play(&asset(1.0), &params, &mut rng).expect("play");

        assert!((volume - 1.0).abs() < f32::EPSILON);
        assert!((channel.pitch() - 4.0).abs() < f32::EPSILON);
        assert!(channel.is_looping());
        assert!((channel.spatial_blend() - 0.5).abs() < f32::EPSILON);
        assert!(channel.lifetime().is_none());
        assert_eq!(channel.state(), ChannelState::Playing);
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let mut channel = channel();
        let mut rng = fastrand::Rng::with_seed(9);
        let params = PlaybackParameters::default()
            .with_random_volume_range(RandomRange::new(0.5, 0.75))
            .with_random_pitch();

        for _ in 0..100 {
            let volume = channel.play(&asset(1.0), &params, &mut rng).expect("play");
            assert!((0.4 - 1e-6..=0.6 + 1e-6).contains(&volume));
            assert!((0.95 - 1e-6..=1.05 + 1e-6).contains(&channel.pitch()));
        }
    }

    #[test]
    fn test_fade_in_starts_silent() {
        let mut channel = channel();
        let mut rng = fastrand::Rng::new();
        let params = PlaybackParameters::default().with_fade_in(1.0);
        let target = channel.play(&asset(1.0), &params, &mut rng).expect("play");

        assert!((target - 0.8).abs() < f32::EPSILON);
        assert!(channel.volume().abs() < f32::EPSILON);
        assert!(channel.output_gain().abs() < f32::EPSILON);
    }

    #[test]
    fn test_pause_resume_only_from_matching_state() {
        let mut channel = channel();
        channel.resume();
        assert_eq!(channel.state(), ChannelState::Idle);

        let mut rng = fastrand::Rng::new();
        channel
            .play(&asset(1.0), &PlaybackParameters::default(), &mut rng)
            .expect("play");
        channel.resume();
        assert!(channel.is_playing());
        channel.pause();
        assert!(channel.is_paused());
        channel.pause();
        assert!(channel.is_paused());
        channel.resume();
        assert!(channel.is_playing());
    }

    #[test]
    fn test_natural_finish_then_watchdog() {
        let mut channel = channel();
        let mut rng = fastrand::Rng::new();
        channel
            .play(&asset(0.5), &PlaybackParameters::default(), &mut rng)
            .expect("play");
        // 0.5s clip + 0.5s margin
        assert!((channel.lifetime().unwrap_or_default() - 1.0).abs() < 1e-6);

        assert_eq!(channel.tick(0.25), ChannelTick::Running);
        assert!(channel.is_playing());
        assert_eq!(channel.tick(0.25), ChannelTick::Running);
        assert_eq!(channel.state(), ChannelState::Idle);
        assert_eq!(channel.tick(0.25), ChannelTick::Running);
        assert_eq!(channel.tick(0.25), ChannelTick::Expired);
    }

    #[test]
    fn test_paused_time_does_not_expire() {
        let mut channel = channel();
        let mut rng = fastrand::Rng::new();
        channel
            .play(&asset(0.2), &PlaybackParameters::default(), &mut rng)
            .expect("play");
        channel.pause();
        for _ in 0..100 {
            assert_eq!(channel.tick(0.1), ChannelTick::Running);
        }
        assert!(channel.is_paused());
        assert!(channel.elapsed().abs() < f32::EPSILON);
    }

    #[test]
    fn test_lifetime_includes_delay_and_pitch() {
        let mut channel = channel();
        let mut rng = fastrand::Rng::new();
        let params = PlaybackParameters::default().with_delay(0.5).with_pitch(2.0);
        channel.play(&asset(1.0), &params, &mut rng).expect("play");
        // 0.5s delay + 1.0s clip at double speed + 0.5s margin
        assert!((channel.lifetime().unwrap_or_default() - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_pitch_change_rescales_remaining_lifetime() {
        let mut channel = channel();
        let mut rng = fastrand::Rng::new();
        channel
            .play(&asset(10.0), &PlaybackParameters::default(), &mut rng)
            .expect("play");
        assert_eq!(channel.tick(4.0), ChannelTick::Running);

        channel.set_pitch(4.0);
        // 4s played + 6s left at 4x + 0.5s margin
        assert!((channel.lifetime().unwrap_or_default() - 6.0).abs() < 1e-5);
        assert_eq!(channel.tick(1.0), ChannelTick::Running);
        assert_eq!(channel.tick(1.0), ChannelTick::Expired);
    }

    #[test]
    fn test_attached_channel_follows_anchor() {
        let mut channel = channel();
        let mut rng = fastrand::Rng::new();
        let params = PlaybackParameters::default().with_spatial_blend(1.0);
        channel.play(&asset(10.0), &params, &mut rng).expect("play");

        let anchor = Anchor::new(Vec3::ZERO);
        channel.attach_to(&anchor);
        channel.tick(0.01);
        let near = channel.output_gain();

        anchor.set(Vec3::new(100.0, 0.0, 0.0));
        channel.tick(0.01);
        assert!(channel.output_gain() < near);

        drop(anchor);
        channel.tick(0.01);
        assert!(matches!(channel.placement(), Placement::Unplaced));
    }

    #[test]
    fn test_reset_restores_defaults() {
        let mut channel = channel();
        let mut rng = fastrand::Rng::new();
        channel
            .play(&asset(1.0), &PlaybackParameters::default().with_loop(true), &mut rng)
            .expect("play");
        channel.set_position(Vec3::ONE);
        channel.reset();

        assert_eq!(channel.state(), ChannelState::Idle);
        assert!(channel.asset().is_none());
        assert!(!channel.is_looping());
        assert!((channel.volume() - 1.0).abs() < f32::EPSILON);
        assert!(matches!(channel.placement(), Placement::Unplaced));
    }
}
