//! Playback event queue.
//!
//! The engine never calls back into the host. Everything observable about a
//! playback's life is pushed here and drained by the host once per frame.

use std::collections::VecDeque;

use tracing::trace;
use volley_common::{AssetId, ChannelId};

use crate::handle::PlaybackHandle;

/// Why a play request produced no handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The catalog does not know the asset.
    UnknownAsset,
    /// The asset played too recently.
    Throttled,
    /// No channel could be created.
    NoChannel,
    /// The output binding refused the clip.
    DeviceFailed,
    /// The engine has been shut down.
    ShutDown,
}

/// Something that happened to a playback.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    /// A handle started playing.
    Started {
        /// New handle.
        handle: PlaybackHandle,
        /// Asset played.
        asset: AssetId,
        /// Channel it was given.
        channel: ChannelId,
    },
    /// A play request was turned down.
    Rejected {
        /// Asset requested.
        asset: AssetId,
        /// Why.
        reason: RejectReason,
    },
    /// A handle was stopped to make room for a newer instance.
    Evicted {
        /// Evicted handle.
        handle: PlaybackHandle,
        /// Its asset.
        asset: AssetId,
    },
    /// The watchdog reclaimed a handle's channel.
    Expired {
        /// Expired handle.
        handle: PlaybackHandle,
        /// Its asset.
        asset: AssetId,
    },
    /// A one-shot ran to its natural end.
    Completed {
        /// Finished handle.
        handle: PlaybackHandle,
        /// Its asset.
        asset: AssetId,
    },
    /// A handle was stopped or disposed by the host.
    Stopped {
        /// Stopped handle.
        handle: PlaybackHandle,
        /// Its asset.
        asset: AssetId,
    },
}

impl PlaybackEvent {
    /// Handle the event is about, if any.
    #[must_use]
    pub fn handle(&self) -> Option<PlaybackHandle> {
        match self {
            Self::Started { handle, .. }
            | Self::Evicted { handle, .. }
            | Self::Expired { handle, .. }
            | Self::Completed { handle, .. }
            | Self::Stopped { handle, .. } => Some(*handle),
            Self::Rejected { .. } => None,
        }
    }

    /// Asset the event is about.
    #[must_use]
    pub fn asset(&self) -> &AssetId {
        match self {
            Self::Started { asset, .. }
            | Self::Rejected { asset, .. }
            | Self::Evicted { asset, .. }
            | Self::Expired { asset, .. }
            | Self::Completed { asset, .. }
            | Self::Stopped { asset, .. } => asset,
        }
    }
}

/// Bounded FIFO of events. When full, the oldest event is dropped.
#[derive(Debug)]
pub struct EventQueue {
    events: VecDeque<PlaybackEvent>,
    capacity: usize,
    dropped: u64,
}

impl EventQueue {
    /// Creates a queue holding at most `capacity` events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity.min(64)),
            capacity,
            dropped: 0,
        }
    }

    /// Appends an event.
    pub fn push(&mut self, event: PlaybackEvent) {
        if self.events.len() == self.capacity {
            if let Some(old) = self.events.pop_front() {
                trace!("Event queue full, dropping {old:?}");
                self.dropped += 1;
            }
        }
        self.events.push_back(event);
    }

    /// Takes every queued event, oldest first.
    pub fn drain(&mut self) -> Vec<PlaybackEvent> {
        self.events.drain(..).collect()
    }

    /// Queued events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events dropped because the queue was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejected(name: &str) -> PlaybackEvent {
        PlaybackEvent::Rejected {
            asset: AssetId::new(name),
            reason: RejectReason::Throttled,
        }
    }

    #[test]
    fn test_drops_oldest_when_full() {
        let mut queue = EventQueue::new(2);
        queue.push(rejected("a"));
        queue.push(rejected("b"));
        queue.push(rejected("c"));

        assert_eq!(queue.dropped(), 1);
        let names: Vec<_> = queue
            .drain()
            .iter()
            .map(|e| e.asset().as_str().to_string())
            .collect();
        assert_eq!(names, ["b", "c"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_rejected_has_no_handle() {
        assert!(rejected("a").handle().is_none());
    }
}
