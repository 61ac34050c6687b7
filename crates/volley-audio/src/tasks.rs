//! Cooperative tasks run by the engine scheduler.
//!
//! Each task does one unit of work per tick and re-resolves its handle on
//! every step, so a handle disposed between ticks ends the task cleanly.

use tracing::trace;
use volley_common::{AudioCategory, WaitTicket};
use volley_kernel::{CooperativeTask, Scheduler, Step, TaskHost};

use crate::engine::AudioEngine;
use crate::events::PlaybackEvent;
use crate::handle::{EndCause, PlaybackHandle};

/// Slack so accumulated tick time lands a fade on its final sample.
const FADE_EPSILON: f32 = 1e-4;

/// What a fade does once it reaches its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeThen {
    /// Keep playing at the target volume.
    Hold,
    /// Pause the channel.
    Pause,
    /// Stop and dispose the handle.
    StopAndDispose,
}

/// Linear volume ramp.
#[derive(Debug, Clone)]
pub struct FadeTask {
    pub(crate) handle: PlaybackHandle,
    pub(crate) from: f32,
    pub(crate) to: f32,
    pub(crate) duration: f32,
    pub(crate) elapsed: f32,
    pub(crate) then: FadeThen,
}

impl FadeTask {
    /// Volume at `elapsed` seconds into the fade.
    #[must_use]
    pub fn sample(&self) -> f32 {
        if self.duration <= 0.0 || self.elapsed + FADE_EPSILON >= self.duration {
            return self.to;
        }
        let t = (self.elapsed / self.duration).clamp(0.0, 1.0);
        self.from + (self.to - self.from) * t
    }

    fn is_finished(&self) -> bool {
        self.duration <= 0.0 || self.elapsed + FADE_EPSILON >= self.duration
    }

    fn step(&mut self, engine: &mut AudioEngine, dt: f32) -> Step {
        self.elapsed += dt;
        let volume = self.sample();
        let Some(channel) = engine.live_channel_mut(self.handle) else {
            trace!("{}: fade ended, handle disposed", self.handle);
            return Step::Done;
        };
        channel.set_volume(volume);
        if !self.is_finished() {
            return Step::Pending;
        }

        match self.then {
            FadeThen::Hold => {},
            FadeThen::Pause => channel.pause(),
            FadeThen::StopAndDispose => {
                engine.retire(self.handle, EndCause::Stopped);
                return Step::Done;
            },
        }
        // A replaced fade is cancelled before it can step, so this one is current.
        if let Some(entry) = engine.handles.get_mut(self.handle) {
            entry.fade = None;
        }
        Step::Done
    }
}

/// Drops a one-shot from tracking once it is over.
#[derive(Debug, Clone)]
pub struct AutoDetachTask {
    pub(crate) handle: PlaybackHandle,
    pub(crate) category: AudioCategory,
    /// Seconds before polling starts.
    pub(crate) remaining: f32,
}

impl AutoDetachTask {
    fn step(&mut self, engine: &mut AudioEngine, dt: f32) -> Step {
        if self.remaining > 0.0 {
            self.remaining -= dt;
            return Step::Pending;
        }
        let Some(entry) = engine.handles.get(self.handle) else {
            return Step::Done;
        };
        let asset = entry.asset.id.clone();
        let busy = engine
            .live_channel(self.handle)
            .is_some_and(|channel| channel.is_playing() || channel.is_paused());
        if busy {
            return Step::Pending;
        }

        trace!("{}: auto-detaching '{asset}'", self.handle);
        engine.guard.untrack(&asset, self.handle);
        engine.untrack(self.handle, self.category);
        engine.events.push(PlaybackEvent::Completed {
            handle: self.handle,
            asset,
        });
        Step::Done
    }
}

/// Resolves a wait ticket once a playback is over.
#[derive(Debug, Clone)]
pub struct WaitTask {
    pub(crate) handle: PlaybackHandle,
    pub(crate) ticket: WaitTicket,
}

impl WaitTask {
    fn step(&mut self, engine: &mut AudioEngine) -> Step {
        let busy = engine
            .live_channel(self.handle)
            .is_some_and(|channel| channel.is_playing() || channel.is_paused());
        if busy {
            return Step::Pending;
        }
        engine.resolve_wait(self.ticket);
        Step::Done
    }
}

/// Every task the engine schedules.
#[derive(Debug, Clone)]
pub enum EngineTask {
    /// Volume ramp.
    Fade(FadeTask),
    /// Tracking cleanup for one-shots.
    AutoDetach(AutoDetachTask),
    /// Completion wait.
    Wait(WaitTask),
}

impl CooperativeTask<AudioEngine> for EngineTask {
    fn step(&mut self, cx: &mut AudioEngine, dt: f32) -> Step {
        match self {
            Self::Fade(task) => task.step(cx, dt),
            Self::AutoDetach(task) => task.step(cx, dt),
            Self::Wait(task) => task.step(cx),
        }
    }
}

impl TaskHost for AudioEngine {
    type Task = EngineTask;

    fn scheduler(&mut self) -> &mut Scheduler<EngineTask> {
        &mut self.scheduler
    }
}
