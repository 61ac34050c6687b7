//! Caller-facing playback handles.
//!
//! A [`PlaybackHandle`] is a small copyable token. The state behind it lives
//! in the engine's [`HandleTable`]; [`HandleControl`] borrows the engine to
//! operate on one handle:
//!
//! ```ignore
//! let shot = engine.play("Gunfire", PlaybackParameters::default());
//! if let Some(shot) = shot {
//!     engine.handle(shot).fade_volume(0.2, 0.5);
//! }
//! ```
//!
//! Disposal is terminal and idempotent. Every operation on a disposed handle
//! is a logged no-op, and because the table entry is gone the handle can no
//! longer reach the channel it once held.

use std::fmt;
use std::sync::Arc;

use ahash::AHashMap;
use tracing::{debug, trace, warn};
use volley_common::{Anchor, AssetId, ChannelId, HandleId, IdSequence, Vec3, WaitTicket};
use volley_kernel::CancelToken;

use crate::asset::AudioAsset;
use crate::engine::AudioEngine;
use crate::events::PlaybackEvent;
use crate::pool::ChannelLease;
use crate::tasks::FadeThen;

/// Token for one playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlaybackHandle(HandleId);

impl PlaybackHandle {
    pub(crate) const fn from_id(id: HandleId) -> Self {
        Self(id)
    }

    /// Underlying ID.
    #[must_use]
    pub const fn id(self) -> HandleId {
        self.0
    }
}

impl fmt::Display for PlaybackHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Handle lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    /// Refers to a live channel.
    Active,
    /// Channel returned; terminal.
    Disposed,
}

/// Result of asking to wait for a playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Already over.
    Finished,
    /// Looping playbacks never finish; nothing to wait for.
    Looping,
    /// Poll the ticket with [`AudioEngine::poll_wait`].
    Pending(WaitTicket),
}

/// State of a wait ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    /// Still playing.
    Pending,
    /// Done. The ticket is consumed.
    Ready,
    /// Never issued, or already consumed.
    Unknown,
}

/// How a playback ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EndCause {
    Stopped,
    Evicted,
    Expired,
}

impl EndCause {
    pub(crate) fn event(self, handle: PlaybackHandle, asset: AssetId) -> PlaybackEvent {
        match self {
            Self::Stopped => PlaybackEvent::Stopped { handle, asset },
            Self::Evicted => PlaybackEvent::Evicted { handle, asset },
            Self::Expired => PlaybackEvent::Expired { handle, asset },
        }
    }
}

/// The fade currently running on a handle.
#[derive(Debug)]
pub(crate) struct ActiveFade {
    pub(crate) token: CancelToken,
    pub(crate) then: FadeThen,
}

#[derive(Debug)]
pub(crate) struct HandleEntry {
    pub(crate) lease: ChannelLease,
    pub(crate) asset: Arc<AudioAsset>,
    /// Volume that resume and fades restore toward.
    pub(crate) target_volume: f32,
    pub(crate) fade: Option<ActiveFade>,
}

/// Live handles, keyed both ways.
#[derive(Debug, Default)]
pub(crate) struct HandleTable {
    entries: AHashMap<PlaybackHandle, HandleEntry>,
    by_channel: AHashMap<ChannelId, PlaybackHandle>,
    ids: IdSequence,
}

impl HandleTable {
    pub(crate) fn insert(
        &mut self,
        lease: ChannelLease,
        asset: Arc<AudioAsset>,
        target_volume: f32,
    ) -> PlaybackHandle {
        let handle = PlaybackHandle(self.ids.next_handle());
        self.by_channel.insert(lease.id(), handle);
        self.entries.insert(handle, HandleEntry {
            lease,
            asset,
            target_volume,
            fade: None,
        });
        handle
    }

    pub(crate) fn get(&self, handle: PlaybackHandle) -> Option<&HandleEntry> {
        self.entries.get(&handle)
    }

    pub(crate) fn get_mut(&mut self, handle: PlaybackHandle) -> Option<&mut HandleEntry> {
        self.entries.get_mut(&handle)
    }

    pub(crate) fn contains(&self, handle: PlaybackHandle) -> bool {
        self.entries.contains_key(&handle)
    }

    pub(crate) fn remove(&mut self, handle: PlaybackHandle) -> Option<HandleEntry> {
        let entry = self.entries.remove(&handle)?;
        if self.by_channel.get(&entry.lease.id()) == Some(&handle) {
            self.by_channel.remove(&entry.lease.id());
        }
        Some(entry)
    }

    pub(crate) fn by_channel(&self, channel: ChannelId) -> Option<PlaybackHandle> {
        self.by_channel.get(&channel).copied()
    }

    pub(crate) fn handles(&self) -> Vec<PlaybackHandle> {
        self.entries.keys().copied().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Operations on one handle, borrowed from the engine.
#[derive(Debug)]
pub struct HandleControl<'a> {
    engine: &'a mut AudioEngine,
    handle: PlaybackHandle,
}

impl<'a> HandleControl<'a> {
    pub(crate) fn new(engine: &'a mut AudioEngine, handle: PlaybackHandle) -> Self {
        Self { engine, handle }
    }

    /// The handle being controlled.
    #[must_use]
    pub fn handle(&self) -> PlaybackHandle {
        self.handle
    }

    /// Whether the playback is producing audio (a pending delay counts).
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.engine
            .live_channel(self.handle)
            .is_some_and(|channel| channel.is_playing())
    }

    /// Whether the playback is paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.engine
            .live_channel(self.handle)
            .is_some_and(|channel| channel.is_paused())
    }

    /// Lifecycle state.
    #[must_use]
    pub fn state(&self) -> HandleState {
        if self.engine.handles.contains(self.handle) {
            HandleState::Active
        } else {
            HandleState::Disposed
        }
    }

    /// Whether the handle has been disposed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.state() == HandleState::Disposed
    }

    /// Asset being played.
    #[must_use]
    pub fn asset(&self) -> Option<AssetId> {
        self.engine
            .handles
            .get(self.handle)
            .map(|entry| entry.asset.id.clone())
    }

    /// Channel the playback holds.
    #[must_use]
    pub fn channel(&self) -> Option<ChannelId> {
        self.engine
            .handles
            .get(self.handle)
            .map(|entry| entry.lease.id())
    }

    /// Current channel volume.
    #[must_use]
    pub fn volume(&self) -> Option<f32> {
        self.engine.live_channel(self.handle).map(|channel| channel.volume())
    }

    /// Current pitch.
    #[must_use]
    pub fn pitch(&self) -> Option<f32> {
        self.engine.live_channel(self.handle).map(|channel| channel.pitch())
    }

    /// Volume that resume restores toward.
    #[must_use]
    pub fn target_volume(&self) -> Option<f32> {
        self.engine
            .handles
            .get(self.handle)
            .map(|entry| entry.target_volume)
    }

    fn disposed(&self, operation: &str) -> bool {
        if self.engine.handles.contains(self.handle) {
            return false;
        }
        debug!("{}: {operation} on disposed handle ignored", self.handle);
        true
    }

    fn pending_fade(&self) -> Option<FadeThen> {
        self.engine
            .handles
            .get(self.handle)
            .and_then(|entry| entry.fade.as_ref())
            .map(|fade| fade.then)
    }

    /// A fading stop is final; later fades, pauses and resumes must not undo it.
    fn stopping(&self, operation: &str) -> bool {
        if self.pending_fade() != Some(FadeThen::StopAndDispose) {
            return false;
        }
        debug!("{}: {operation} while stopping ignored", self.handle);
        true
    }

    /// Whether a fading stop is under way.
    #[must_use]
    pub fn is_stopping(&self) -> bool {
        self.pending_fade() == Some(FadeThen::StopAndDispose)
    }

    /// Stops the playback, fading out first when `fade_out > 0`, then disposes it.
    ///
    /// A second fading stop leaves the first one running; a stop without fade
    /// always disposes at once.
    pub fn stop(&mut self, fade_out: f32) {
        if self.disposed("stop") {
            return;
        }
        if fade_out > 0.0 {
            if self.stopping("stop") {
                return;
            }
            let from = self.volume().unwrap_or(0.0);
            self.engine
                .start_fade(self.handle, from, 0.0, fade_out, FadeThen::StopAndDispose);
        } else {
            self.engine.retire(self.handle, EndCause::Stopped);
        }
    }

    /// Pauses, fading out first when `fade_out > 0`.
    pub fn pause(&mut self, fade_out: f32) {
        if self.disposed("pause") || self.stopping("pause") {
            return;
        }
        if !self.is_playing() {
            trace!("{}: pause while not playing ignored", self.handle);
            return;
        }
        if fade_out > 0.0 {
            let from = self.volume().unwrap_or(0.0);
            self.engine
                .start_fade(self.handle, from, 0.0, fade_out, FadeThen::Pause);
        } else if let Some(channel) = self.engine.live_channel_mut(self.handle) {
            channel.pause();
        }
    }

    /// Resumes toward the last target volume, fading in when `fade_in > 0`.
    ///
    /// A pause that is still fading out is cancelled.
    pub fn resume(&mut self, fade_in: f32) {
        if self.disposed("resume") || self.stopping("resume") {
            return;
        }
        if self.pending_fade() == Some(FadeThen::Pause) {
            trace!("{}: resume cancels pending pause", self.handle);
            self.engine.cancel_fade(self.handle);
        } else if !self.is_paused() {
            trace!("{}: resume while not paused ignored", self.handle);
            return;
        }
        let target = self.target_volume().unwrap_or(1.0);
        let Some(channel) = self.engine.live_channel_mut(self.handle) else {
            return;
        };
        channel.resume();
        if fade_in > 0.0 {
            let from = channel.volume();
            self.engine
                .start_fade(self.handle, from, target, fade_in, FadeThen::Hold);
        } else {
            channel.set_volume(target);
        }
    }

    /// Sets the volume (clamped) and makes it the new target.
    pub fn set_volume(&mut self, volume: f32) {
        if self.disposed("set_volume") {
            return;
        }
        let volume = volume.clamp(0.0, 1.0);
        if let Some(entry) = self.engine.handles.get_mut(self.handle) {
            entry.target_volume = volume;
        }
        if let Some(channel) = self.engine.live_channel_mut(self.handle) {
            channel.set_volume(volume);
        }
    }

    /// Sets the pitch (clamped to the engine limits).
    pub fn set_pitch(&mut self, pitch: f32) {
        if self.disposed("set_pitch") {
            return;
        }
        if let Some(channel) = self.engine.live_channel_mut(self.handle) {
            channel.set_pitch(pitch);
        }
    }

    /// Moves the source to a fixed point.
    pub fn set_position(&mut self, position: Vec3) {
        if self.disposed("set_position") {
            return;
        }
        if let Some(channel) = self.engine.live_channel_mut(self.handle) {
            channel.set_position(position);
        }
    }

    /// Makes the source follow an anchor.
    pub fn attach_to(&mut self, anchor: &Anchor) {
        if self.disposed("attach_to") {
            return;
        }
        if let Some(channel) = self.engine.live_channel_mut(self.handle) {
            channel.attach_to(anchor);
        }
    }

    /// Ramps linearly to `target` over `duration` seconds, one sample per tick.
    ///
    /// Replaces any fade already running on this handle, except a fading stop.
    pub fn fade_volume(&mut self, target: f32, duration: f32) {
        if self.disposed("fade_volume") || self.stopping("fade_volume") {
            return;
        }
        let target = target.clamp(0.0, 1.0);
        if let Some(entry) = self.engine.handles.get_mut(self.handle) {
            entry.target_volume = target;
        }
        if duration <= 0.0 {
            self.engine.cancel_fade(self.handle);
            if let Some(channel) = self.engine.live_channel_mut(self.handle) {
                channel.set_volume(target);
            }
            return;
        }
        let from = self.volume().unwrap_or(0.0);
        self.engine
            .start_fade(self.handle, from, target, duration, FadeThen::Hold);
    }

    /// Waits until the playback is neither playing nor paused.
    pub fn wait_for_completion(&mut self) -> Completion {
        let Some(channel) = self.engine.live_channel(self.handle) else {
            return Completion::Finished;
        };
        if channel.is_looping() {
            warn!(
                "{}: waiting on a looping playback would never finish",
                self.handle
            );
            return Completion::Looping;
        }
        if !channel.is_playing() && !channel.is_paused() {
            return Completion::Finished;
        }
        Completion::Pending(self.engine.start_wait(self.handle))
    }

    /// Stops the playback and returns its channel. Safe to call repeatedly.
    pub fn dispose(&mut self) {
        if self.disposed("dispose") {
            return;
        }
        self.engine.retire(self.handle, EndCause::Stopped);
    }
}
