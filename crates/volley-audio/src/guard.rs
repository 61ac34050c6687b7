//! Per-asset throttling.
//!
//! Two independent limits per asset ID:
//! - a minimum interval measured from the last *accepted* play
//! - a cap on simultaneously playing instances, enforced by evicting the
//!   oldest tracked instance (strict registration order)

use std::collections::VecDeque;

use ahash::AHashMap;
use tracing::trace;
use volley_common::AssetId;

use crate::asset::AudioAsset;
use crate::handle::PlaybackHandle;

/// Tolerance for accumulated tick-clock error when comparing intervals.
const CLOCK_EPSILON: f64 = 1e-6;

/// Decision for one play request.
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    /// Play may proceed once the listed instances are stopped.
    Accepted {
        /// Oldest instances to stop, in eviction order.
        evict: Vec<PlaybackHandle>,
    },
    /// Too soon after the last accepted play.
    Throttled {
        /// Seconds until the asset may play again.
        wait: f64,
    },
}

#[derive(Debug, Default)]
struct AssetHistory {
    last_accepted: Option<f64>,
    tracked: VecDeque<PlaybackHandle>,
}

/// Rate and concurrency limiter keyed by asset ID.
#[derive(Debug, Default)]
pub struct FrequencyGuard {
    assets: AHashMap<AssetId, AssetHistory>,
}

impl FrequencyGuard {
    /// Creates an empty guard.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decides whether `asset` may play at `now`.
    ///
    /// `is_live` reports whether a tracked instance is still playing or
    /// paused; instances that are neither are forgotten before the cap is
    /// checked. Paused instances stay eligible for eviction so resuming one
    /// can never push the asset over its cap.
    /// Evicted instances are removed from tracking here; stopping them is
    /// the caller's job.
    pub fn can_play(
        &mut self,
        asset: &AudioAsset,
        now: f64,
        is_live: impl Fn(PlaybackHandle) -> bool,
    ) -> Admission {
        let Some(history) = self.assets.get_mut(&asset.id) else {
            return Admission::Accepted { evict: Vec::new() };
        };

        if let Some(last) = history.last_accepted {
            let since = now - last;
            let min = f64::from(asset.min_time_between_plays);
            if since + CLOCK_EPSILON < min {
                trace!("'{}' throttled ({since:.3}s < {min:.3}s)", asset.id);
                return Admission::Throttled { wait: min - since };
            }
        }

        history.tracked.retain(|&handle| is_live(handle));

        let mut evict = Vec::new();
        let max = asset.max_concurrent_instances as usize;
        if max > 0 {
            while history.tracked.len() >= max {
                match history.tracked.pop_front() {
                    Some(oldest) => evict.push(oldest),
                    None => break,
                }
            }
        }
        Admission::Accepted { evict }
    }

    /// Records an accepted play.
    pub fn register_playback(&mut self, asset: &AssetId, handle: PlaybackHandle, now: f64) {
        let history = self.assets.entry(asset.clone()).or_default();
        history.last_accepted = Some(now);
        history.tracked.push_back(handle);
    }

    /// Forgets one instance.
    pub fn untrack(&mut self, asset: &AssetId, handle: PlaybackHandle) {
        if let Some(history) = self.assets.get_mut(asset) {
            history.tracked.retain(|&h| h != handle);
        }
    }

    /// Number of tracked instances of an asset.
    #[must_use]
    pub fn tracked_count(&self, asset: &AssetId) -> usize {
        self.assets.get(asset).map_or(0, |history| history.tracked.len())
    }

    /// Time of the last accepted play of an asset.
    #[must_use]
    pub fn last_accepted(&self, asset: &AssetId) -> Option<f64> {
        self.assets.get(asset).and_then(|history| history.last_accepted)
    }

    /// Forgets everything.
    pub fn clear(&mut self) {
        self.assets.clear();
    }
}
