//! Channel pool.
//!
//! Channels are created lazily and never dropped until teardown. Every
//! checkout is a [`ChannelLease`]: the channel ID plus the generation it had
//! when handed out. Returning a channel bumps its generation, so a lease held
//! past its release can no longer reach the channel.

use std::collections::{BTreeSet, VecDeque};

use tracing::{debug, info, warn};
use volley_common::{AudioCategory, ChannelId, DeviceError};
use volley_kernel::{ClipRef, DeviceFactory};

use crate::channel::{ChannelLimits, ChannelTick, PlaybackChannel};

/// A checked-out channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelLease {
    id: ChannelId,
    generation: u32,
}

impl ChannelLease {
    /// Channel this lease refers to.
    #[must_use]
    pub fn id(self) -> ChannelId {
        self.id
    }

    /// Generation the channel had at checkout.
    #[must_use]
    pub fn generation(self) -> u32 {
        self.generation
    }
}

/// Pool counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Channels waiting in the idle queue.
    pub idle: usize,
    /// Channels checked out.
    pub active: usize,
    /// Channels ever created.
    pub created: usize,
    /// Successful returns to the idle queue.
    pub released: u64,
    /// Channels reclaimed by the watchdog.
    pub expired: u64,
}

/// Recycling pool of playback channels.
#[derive(Debug)]
pub struct PlaybackPool {
    factory: Box<dyn DeviceFactory>,
    channels: Vec<PlaybackChannel>,
    idle: VecDeque<ChannelId>,
    active: BTreeSet<ChannelId>,
    limits: ChannelLimits,
    capacity_warning: usize,
    warned: bool,
    released: u64,
    expired: u64,
}

impl PlaybackPool {
    /// Creates an empty pool.
    pub fn new(
        factory: Box<dyn DeviceFactory>,
        limits: ChannelLimits,
        capacity_warning: usize,
    ) -> Self {
        Self {
            factory,
            channels: Vec::new(),
            idle: VecDeque::new(),
            active: BTreeSet::new(),
            limits,
            capacity_warning,
            warned: false,
            released: 0,
            expired: 0,
        }
    }

    fn create(&mut self) -> Result<ChannelId, DeviceError> {
        let id = ChannelId::new(self.channels.len() as u32);
        let device = self.factory.create(id)?;
        self.channels.push(PlaybackChannel::new(id, device, self.limits));

        if self.channels.len() > self.capacity_warning && !self.warned {
            self.warned = true;
            warn!(
                "Playback pool grew past {} channels; check for leaked handles",
                self.capacity_warning
            );
        }
        Ok(id)
    }

    /// Constructs `count` idle channels up front.
    pub fn preload(&mut self, count: usize) -> Result<(), DeviceError> {
        for _ in 0..count {
            let id = self.create()?;
            self.idle.push_back(id);
        }
        debug!("Preloaded {count} playback channels");
        Ok(())
    }

    /// Checks out an idle channel, creating one if none is free.
    pub fn acquire(&mut self) -> Result<ChannelLease, DeviceError> {
        let id = match self.idle.pop_front() {
            Some(id) => id,
            None => self.create()?,
        };
        self.active.insert(id);
        let generation = self.channels[id.index()].generation();
        Ok(ChannelLease { id, generation })
    }

    /// Resets a channel and returns it to the idle queue.
    ///
    /// Returns `false` (with a warning) if the lease is not current.
    pub fn release(&mut self, lease: ChannelLease) -> bool {
        if !self.active.contains(&lease.id) {
            warn!("Release of {} ignored: channel is not active", lease.id);
            return false;
        }
        let channel = &mut self.channels[lease.id.index()];
        if channel.generation() != lease.generation {
            warn!(
                "Release of {} ignored: stale lease (generation {} != {})",
                lease.id,
                lease.generation,
                channel.generation()
            );
            return false;
        }

        channel.reset();
        channel.bump_generation();
        self.active.remove(&lease.id);
        self.idle.push_back(lease.id);
        self.released += 1;
        true
    }

    /// Whether the lease still refers to a checked-out channel.
    #[must_use]
    pub fn is_current(&self, lease: ChannelLease) -> bool {
        self.active.contains(&lease.id)
            && self.channels[lease.id.index()].generation() == lease.generation
    }

    /// Channel behind a current lease.
    #[must_use]
    pub fn channel(&self, lease: ChannelLease) -> Option<&PlaybackChannel> {
        self.is_current(lease).then(|| &self.channels[lease.id.index()])
    }

    /// Mutable channel behind a current lease.
    pub fn channel_mut(&mut self, lease: ChannelLease) -> Option<&mut PlaybackChannel> {
        if self.is_current(lease) {
            Some(&mut self.channels[lease.id.index()])
        } else {
            None
        }
    }

    /// Ticks every checked-out channel and reclaims expired ones.
    ///
    /// Returns the leases the watchdog released.
    pub fn tick(&mut self, dt: f32) -> Vec<ChannelLease> {
        let snapshot: Vec<ChannelId> = self.active.iter().copied().collect();
        let mut expired = Vec::new();

        for id in snapshot {
            let channel = &mut self.channels[id.index()];
            if channel.tick(dt) == ChannelTick::Expired {
                let lease = ChannelLease {
                    id,
                    generation: channel.generation(),
                };
                if self.release(lease) {
                    self.expired += 1;
                    expired.push(lease);
                }
            }
        }
        expired
    }

    /// Pushes a bus gain to every checked-out channel of a category.
    pub fn apply_bus_gain(&mut self, category: AudioCategory, gain: f32) {
        for id in &self.active {
            let channel = &mut self.channels[id.index()];
            if channel.category() == Some(category) {
                channel.set_bus_gain(gain);
            }
        }
    }

    /// Asks the device layer to prepare a clip.
    pub fn preload_clip(&mut self, clip: &ClipRef) -> Result<(), DeviceError> {
        self.factory.preload(clip)
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            idle: self.idle.len(),
            active: self.active.len(),
            created: self.channels.len(),
            released: self.released,
            expired: self.expired,
        }
    }

    /// Stops and drops every channel.
    pub fn teardown(&mut self) {
        for channel in &mut self.channels {
            channel.reset();
        }
        info!(
            "Playback pool torn down ({} channels, {} still active)",
            self.channels.len(),
            self.active.len()
        );
        self.channels.clear();
        self.idle.clear();
        self.active.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::asset::{AudioAsset, PlaybackParameters};
    use volley_kernel::HeadlessFactory;

    fn pool() -> PlaybackPool {
        PlaybackPool::new(
            Box::new(HeadlessFactory::new()),
            ChannelLimits::default(),
            4,
        )
    }

    #[test]
    fn test_acquire_prefers_idle() {
        let mut pool = pool();
        pool.preload(2).expect("preload");
        assert_eq!(pool.stats().idle, 2);

        let a = pool.acquire().expect("acquire");
        let b = pool.acquire().expect("acquire");
        let c = pool.acquire().expect("acquire");
        assert_ne!(a.id(), b.id());
        assert_ne!(b.id(), c.id());
        assert_eq!(pool.stats().created, 3);
        assert_eq!(pool.stats().active, 3);
        assert_eq!(pool.stats().idle, 0);
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut pool = pool();
        let lease = pool.acquire().expect("acquire");

        assert!(pool.release(lease));
        assert!(!pool.release(lease));
        assert_eq!(pool.stats().released, 1);
        assert_eq!(pool.stats().idle, 1);
        assert_eq!(pool.stats().active, 0);
    }

    #[test]
    fn test_stale_lease_cannot_reach_recycled_channel() {
        let mut pool = pool();
        let old = pool.acquire().expect("acquire");
        pool.release(old);
        let new = pool.acquire().expect("acquire");

        assert_eq!(old.id(), new.id());
        assert!(pool.channel(old).is_none());
        assert!(pool.channel(new).is_some());
        assert!(!pool.release(old));
        assert!(pool.is_current(new));
    }

    #[test]
    fn test_active_and_idle_are_disjoint() {
        let mut pool = pool();
        pool.preload(3).expect("preload");
        let mut leases = Vec::new();
        for round in 0..20 {
            if round % 3 == 2 {
                if let Some(lease) = leases.pop() {
                    pool.release(lease);
                }
            } else {
                leases.push(pool.acquire().expect("acquire"));
            }
            for id in &pool.idle {
                assert!(!pool.active.contains(id));
            }
        }
    }

    #[test]
    fn test_watchdog_reclaims() {
        let mut pool = pool();
        let lease = pool.acquire().expect("acquire");
        let asset = Arc::new(AudioAsset::new(
            "Blip",
            volley_kernel::ClipRef::new("blip.wav", 0.25),
        ));
        let mut rng = fastrand::Rng::new();
        pool.channel_mut(lease)
            .expect("channel")
            .play(&asset, &PlaybackParameters::default(), &mut rng)
            .expect("play");

        // 0.25s clip + 0.5s margin
        assert!(pool.tick(0.25).is_empty());
        assert!(pool.tick(0.25).is_empty());
        let expired = pool.tick(0.25);
        assert_eq!(expired, vec![lease]);
        assert_eq!(pool.stats().expired, 1);
        assert!(!pool.is_current(lease));
    }

    #[test]
    fn test_teardown_clears() {
        let mut pool = pool();
        pool.preload(2).expect("preload");
        let _ = pool.acquire().expect("acquire");
        pool.teardown();
        assert_eq!(pool.stats(), PoolStats::default());
    }
}
