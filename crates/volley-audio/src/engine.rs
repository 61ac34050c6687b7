//! The audio engine facade.
//!
//! ```text
//! play(id) ──► catalog lookup ──► guard.can_play ──► evict oldest
//!                                        │
//!          handle ◄── channel.play ◄── mixer route ◄── pool.acquire
//!
//! tick(dt) ──► pool.tick (watchdog) ──► scheduler: fades, auto-detach, waits
//! ```
//!
//! Everything runs on the caller's thread. The host calls [`AudioEngine::tick`]
//! once per frame (or drives it from a [`TickSource`]) and drains
//! [`AudioEngine::drain_events`] when it cares about playback outcomes.

use std::collections::VecDeque;
use std::sync::Arc;

use ahash::AHashMap;
use tracing::{debug, error, info, trace, warn};
use volley_common::{
    Anchor, AssetId, AudioCategory, CatalogError, CategoryTable, IdSequence, Vec3, VolleyResult,
    WaitTicket,
};
use volley_kernel::{
    drive, BusRouter, DeviceFactory, HeadlessFactory, ParameterMixer, Scheduler, SharedListener,
    TickSource,
};

use crate::asset::{AudioAsset, PlaybackParameters};
use crate::catalog::{AudioCatalog, StaticCatalog};
use crate::channel::{ChannelLimits, PlaybackChannel};
use crate::config::AudioConfig;
use crate::events::{EventQueue, PlaybackEvent, RejectReason};
use crate::guard::{Admission, FrequencyGuard};
use crate::handle::{
    ActiveFade, EndCause, HandleControl, HandleTable, PlaybackHandle, WaitStatus,
};
use crate::mixer::MixerController;
use crate::pool::{PlaybackPool, PoolStats};
use crate::tasks::{AutoDetachTask, EngineTask, FadeTask, FadeThen, WaitTask};

/// Snapshot of engine counters.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlaybackStats {
    /// Pool counters.
    pub pool: PoolStats,
    /// Live (non-disposed) handles.
    pub handles: usize,
    /// Handles in the global tracking list.
    pub tracked: usize,
    /// Queued cooperative tasks.
    pub tasks: usize,
    /// Engine clock in seconds.
    pub clock: f64,
}

enum Placement<'a> {
    Flat,
    At(Vec3),
    Attached(&'a Anchor),
}

/// Builder for [`AudioEngine`].
#[derive(Debug)]
pub struct AudioEngineBuilder {
    config: AudioConfig,
    catalog: Option<Box<dyn AudioCatalog>>,
    factory: Option<Box<dyn DeviceFactory>>,
    router: Option<Box<dyn BusRouter>>,
    listener: SharedListener,
}

impl AudioEngineBuilder {
    /// Uses a catalog (default: empty [`StaticCatalog`]).
    #[must_use]
    pub fn catalog(mut self, catalog: impl AudioCatalog + 'static) -> Self {
        self.catalog = Some(Box::new(catalog));
        self
    }

    /// Uses a device factory (default: [`HeadlessFactory`] on the builder's listener).
    #[must_use]
    pub fn factory(mut self, factory: impl DeviceFactory + 'static) -> Self {
        self.factory = Some(Box::new(factory));
        self
    }

    /// Uses a bus router (default: [`ParameterMixer`] built from the config routes).
    #[must_use]
    pub fn router(mut self, router: impl BusRouter + 'static) -> Self {
        self.router = Some(Box::new(router));
        self
    }

    /// Shares a listener. A custom factory should be given the same one.
    #[must_use]
    pub fn listener(mut self, listener: SharedListener) -> Self {
        self.listener = listener;
        self
    }

    /// Builds the engine and preloads the initial pool.
    pub fn build(self) -> VolleyResult<AudioEngine> {
        let mut config = self.config;
        config.validate();
        config.check()?;

        let factory = self.factory.unwrap_or_else(|| {
            Box::new(HeadlessFactory::new().with_listener(self.listener.clone()))
        });
        let router = self.router.unwrap_or_else(|| {
            let mixer = config
                .categories
                .iter()
                .fold(ParameterMixer::new(&config.master_parameter), |mixer, (category, route)| {
                    mixer.with_route(*category, &route.bus_route())
                });
            Box::new(mixer)
        });
        let catalog = self.catalog.unwrap_or_else(|| Box::new(StaticCatalog::new()));

        let limits = ChannelLimits {
            min_pitch: config.min_pitch,
            max_pitch: config.max_pitch,
            lifetime_margin: config.lifetime_margin,
        };
        let mut pool = PlaybackPool::new(factory, limits, config.pool_capacity_warning);
        pool.preload(config.initial_pool_size)?;

        let mut mixer = MixerController::new(router, config.master_parameter.clone());
        for (category, route) in &config.categories {
            mixer.set_category_volume(*category, route.default_volume);
        }
        mixer.set_master_volume(config.master_volume);

        let rng = config
            .random_seed
            .map_or_else(fastrand::Rng::new, fastrand::Rng::with_seed);

        info!(
            "Audio engine ready: {} channels preloaded, {} categories routed",
            config.initial_pool_size,
            config.categories.len()
        );

        Ok(AudioEngine {
            events: EventQueue::new(config.max_queued_events),
            config,
            catalog,
            pool,
            guard: FrequencyGuard::new(),
            mixer,
            handles: HandleTable::default(),
            tracked: Vec::new(),
            by_category: CategoryTable::default(),
            scheduler: Scheduler::new(),
            waits: AHashMap::new(),
            resolved_waits: VecDeque::new(),
            wait_ids: IdSequence::new(),
            rng,
            clock: 0.0,
            listener: self.listener,
            shut_down: false,
        })
    }
}

/// Pooled, category-aware playback engine.
#[derive(Debug)]
pub struct AudioEngine {
    config: AudioConfig,
    catalog: Box<dyn AudioCatalog>,
    pub(crate) pool: PlaybackPool,
    pub(crate) guard: FrequencyGuard,
    mixer: MixerController,
    pub(crate) handles: HandleTable,
    tracked: Vec<PlaybackHandle>,
    by_category: CategoryTable<Vec<PlaybackHandle>>,
    pub(crate) scheduler: Scheduler<EngineTask>,
    pub(crate) events: EventQueue,
    waits: AHashMap<WaitTicket, bool>,
    /// Resolved tickets in resolution order, bounded like the event queue.
    resolved_waits: VecDeque<WaitTicket>,
    wait_ids: IdSequence,
    rng: fastrand::Rng,
    clock: f64,
    listener: SharedListener,
    shut_down: bool,
}

impl AudioEngine {
    /// Starts building an engine.
    #[must_use]
    pub fn builder(config: AudioConfig) -> AudioEngineBuilder {
        AudioEngineBuilder {
            config,
            catalog: None,
            factory: None,
            router: None,
            listener: SharedListener::new(),
        }
    }

    /// Headless engine over a catalog.
    pub fn headless(
        config: AudioConfig,
        catalog: impl AudioCatalog + 'static,
    ) -> VolleyResult<Self> {
        Self::builder(config).catalog(catalog).build()
    }

    /// Effective configuration.
    #[must_use]
    pub fn config(&self) -> &AudioConfig {
        &self.config
    }

    /// Engine clock in seconds.
    #[must_use]
    pub fn clock(&self) -> f64 {
        self.clock
    }

    // === Playback ===

    /// Plays an asset.
    ///
    /// Returns `None` when the asset is unknown, throttled, or no channel
    /// could be started. The reason is queued as [`PlaybackEvent::Rejected`].
    pub fn play(
        &mut self,
        id: impl Into<AssetId>,
        params: PlaybackParameters,
    ) -> Option<PlaybackHandle> {
        self.start(id.into(), params, Placement::Flat)
    }

    /// Plays an asset fully positional at a point.
    pub fn play_at(
        &mut self,
        id: impl Into<AssetId>,
        position: Vec3,
        params: PlaybackParameters,
    ) -> Option<PlaybackHandle> {
        self.start(id.into(), params.with_spatial_blend(1.0), Placement::At(position))
    }

    /// Plays an asset fully positional, following an anchor.
    pub fn play_attached(
        &mut self,
        id: impl Into<AssetId>,
        anchor: &Anchor,
        params: PlaybackParameters,
    ) -> Option<PlaybackHandle> {
        self.start(id.into(), params.with_spatial_blend(1.0), Placement::Attached(anchor))
    }

    fn reject(&mut self, asset: AssetId, reason: RejectReason) -> Option<PlaybackHandle> {
        self.events.push(PlaybackEvent::Rejected { asset, reason });
        None
    }

    fn start(
        &mut self,
        id: AssetId,
        params: PlaybackParameters,
        placement: Placement<'_>,
    ) -> Option<PlaybackHandle> {
        if self.shut_down {
            warn!("Play of '{id}' after shutdown ignored");
            return self.reject(id, RejectReason::ShutDown);
        }
        let Some(asset) = self.catalog.lookup(&id) else {
            warn!("Unknown audio asset '{id}'");
            return self.reject(id, RejectReason::UnknownAsset);
        };

        let admission = {
            let handles = &self.handles;
            let pool = &self.pool;
            self.guard.can_play(&asset, self.clock, |handle| {
                handles
                    .get(handle)
                    .and_then(|entry| pool.channel(entry.lease))
                    .is_some_and(|channel| channel.is_playing() || channel.is_paused())
            })
        };
        match admission {
            Admission::Throttled { .. } => return self.reject(id, RejectReason::Throttled),
            Admission::Accepted { evict } => {
                for handle in evict {
                    debug!("Evicting {handle} to admit another '{id}'");
                    self.retire(handle, EndCause::Evicted);
                }
            },
        }

        let lease = match self.pool.acquire() {
            Ok(lease) => lease,
            Err(e) => {
                error!("No playback channel for '{id}': {e}");
                return self.reject(id, RejectReason::NoChannel);
            },
        };

        self.mixer.route(asset.category);
        let bus_gain = self.mixer.bus_gain(asset.category);
        let Some(channel) = self.pool.channel_mut(lease) else {
            warn!("Freshly acquired {} is not current", lease.id());
            return self.reject(id, RejectReason::NoChannel);
        };
        channel.set_bus_gain(bus_gain);
        let target = match channel.play(&asset, &params, &mut self.rng) {
            Ok(volume) => volume,
            Err(e) => {
                warn!("Failed to start '{id}': {e}");
                self.pool.release(lease);
                return self.reject(id, RejectReason::DeviceFailed);
            },
        };
        match placement {
            Placement::Flat => {},
            Placement::At(position) => channel.set_position(position),
            Placement::Attached(anchor) => channel.attach_to(anchor),
        }
        let looping = channel.is_looping();
        let pitch = channel.pitch();

        let handle = self.handles.insert(lease, Arc::clone(&asset), target);
        if params.fade_in > 0.0 {
            self.start_fade(handle, 0.0, target, params.fade_in, FadeThen::Hold);
        }

        self.guard.register_playback(&asset.id, handle, self.clock);
        self.tracked.push(handle);
        self.by_category.get_mut(asset.category).push(handle);

        if !looping {
            let remaining =
                params.delay.max(0.0) + asset.clip.duration / pitch + self.config.detach_margin;
            self.scheduler.spawn(EngineTask::AutoDetach(AutoDetachTask {
                handle,
                category: asset.category,
                remaining,
            }));
        }

        debug!("{handle}: '{id}' on {}", lease.id());
        self.events.push(PlaybackEvent::Started {
            handle,
            asset: id,
            channel: lease.id(),
        });
        Some(handle)
    }

    /// Controls for one handle.
    pub fn handle(&mut self, handle: PlaybackHandle) -> HandleControl<'_> {
        HandleControl::new(self, handle)
    }

    // === Bulk control ===

    /// Stops every tracked playback of a category and clears its tracking.
    pub fn stop_category(&mut self, category: AudioCategory, fade_out: f32) {
        let snapshot = std::mem::take(self.by_category.get_mut(category));
        debug!("Stopping {} {category} playbacks", snapshot.len());
        for &handle in &snapshot {
            self.handle(handle).stop(fade_out);
        }
        self.tracked.retain(|handle| !snapshot.contains(handle));
    }

    /// Stops every tracked playback and clears tracking.
    pub fn stop_all(&mut self, fade_out: f32) {
        let snapshot = std::mem::take(&mut self.tracked);
        debug!("Stopping {} playbacks", snapshot.len());
        for handle in snapshot {
            self.handle(handle).stop(fade_out);
        }
        for (_, list) in self.by_category.iter_mut() {
            list.clear();
        }
    }

    /// Pauses every tracked playback of a category.
    pub fn pause_category(&mut self, category: AudioCategory, fade_out: f32) {
        for handle in self.by_category.get(category).clone() {
            self.handle(handle).pause(fade_out);
        }
    }

    /// Resumes every tracked playback of a category.
    pub fn resume_category(&mut self, category: AudioCategory, fade_in: f32) {
        for handle in self.by_category.get(category).clone() {
            self.handle(handle).resume(fade_in);
        }
    }

    /// Pauses every tracked playback.
    pub fn pause_all(&mut self, fade_out: f32) {
        for handle in self.tracked.clone() {
            self.handle(handle).pause(fade_out);
        }
    }

    /// Resumes every tracked playback.
    pub fn resume_all(&mut self, fade_in: f32) {
        for handle in self.tracked.clone() {
            self.handle(handle).resume(fade_in);
        }
    }

    /// Tracked handles, oldest first.
    #[must_use]
    pub fn tracked(&self) -> &[PlaybackHandle] {
        &self.tracked
    }

    /// Tracked handles of one category, oldest first.
    #[must_use]
    pub fn tracked_in(&self, category: AudioCategory) -> &[PlaybackHandle] {
        self.by_category.get(category)
    }

    // === Mixing ===

    /// Sets a category volume (linear).
    pub fn set_category_volume(&mut self, category: AudioCategory, volume: f32) {
        self.mixer.set_category_volume(category, volume);
        self.refresh_bus_gain(category);
    }

    /// Category volume (linear).
    pub fn category_volume(&mut self, category: AudioCategory) -> f32 {
        self.mixer.category_volume(category)
    }

    /// Sets the master volume (linear).
    pub fn set_master_volume(&mut self, volume: f32) {
        self.mixer.set_master_volume(volume);
        self.refresh_all_bus_gains();
    }

    /// Master volume (linear).
    #[must_use]
    pub fn master_volume(&self) -> f32 {
        self.mixer.master_volume()
    }

    /// Sets the master bus parameter in raw decibels.
    pub fn set_master_parameter(&mut self, db: f32) {
        self.mixer.set_master_parameter(db);
        self.refresh_all_bus_gains();
    }

    /// Master bus parameter in raw decibels.
    #[must_use]
    pub fn master_parameter(&self) -> f32 {
        self.mixer.master_parameter()
    }

    /// Mutes or unmutes a category.
    pub fn set_category_muted(&mut self, category: AudioCategory, muted: bool) {
        self.mixer.set_category_muted(category, muted);
        self.refresh_bus_gain(category);
    }

    /// Whether a category is muted.
    #[must_use]
    pub fn is_category_muted(&self, category: AudioCategory) -> bool {
        self.mixer.is_muted(category)
    }

    fn refresh_bus_gain(&mut self, category: AudioCategory) {
        let gain = self.mixer.bus_gain(category);
        self.pool.apply_bus_gain(category, gain);
    }

    fn refresh_all_bus_gains(&mut self) {
        for category in AudioCategory::ALL {
            self.refresh_bus_gain(category);
        }
    }

    // === Listener ===

    /// Moves the listener spatial playback is attenuated against.
    pub fn set_listener_position(&mut self, position: Vec3) {
        self.listener.set_position(position);
    }

    /// The shared listener.
    #[must_use]
    pub fn listener(&self) -> &SharedListener {
        &self.listener
    }

    // === Time ===

    /// Advances the engine by `dt` seconds.
    pub fn tick(&mut self, dt: f32) {
        if self.shut_down {
            return;
        }
        let dt = dt.max(0.0);
        self.clock += f64::from(dt);

        for lease in self.pool.tick(dt) {
            let Some(handle) = self.handles.by_channel(lease.id()) else {
                continue;
            };
            if self.handles.get(handle).is_some_and(|entry| entry.lease == lease) {
                self.retire(handle, EndCause::Expired);
            }
        }

        let finished = drive(self, dt);
        if finished > 0 {
            trace!("{finished} tasks finished");
        }
    }

    /// Ticks from a source until it runs dry or `max_steps` ticks have run.
    ///
    /// Returns the number of ticks performed.
    pub fn pump(&mut self, source: &mut dyn TickSource, max_steps: usize) -> usize {
        let mut steps = 0;
        while steps < max_steps {
            let Some(dt) = source.next_delta() else {
                break;
            };
            self.tick(dt);
            steps += 1;
        }
        steps
    }

    // === Events and waits ===

    /// Takes every queued event, oldest first.
    pub fn drain_events(&mut self) -> Vec<PlaybackEvent> {
        self.events.drain()
    }

    /// Checks a ticket from [`HandleControl::wait_for_completion`].
    pub fn poll_wait(&mut self, ticket: WaitTicket) -> WaitStatus {
        match self.waits.get(&ticket) {
            None => WaitStatus::Unknown,
            Some(false) => WaitStatus::Pending,
            Some(true) => {
                self.waits.remove(&ticket);
                self.resolved_waits.retain(|&t| t != ticket);
                WaitStatus::Ready
            },
        }
    }

    /// Outstanding wait tickets, pending or resolved.
    #[must_use]
    pub fn pending_waits(&self) -> usize {
        self.waits.len()
    }

    // === Catalog ===

    /// Descriptor for an asset.
    #[must_use]
    pub fn asset(&self, id: &AssetId) -> Option<Arc<AudioAsset>> {
        self.catalog.lookup(id)
    }

    /// Asks the device layer to prepare an asset's clip.
    pub fn preload(&mut self, id: &AssetId) -> Result<(), CatalogError> {
        let asset = self
            .catalog
            .lookup(id)
            .ok_or_else(|| CatalogError::NotFound(id.clone()))?;
        self.pool
            .preload_clip(&asset.clip)
            .map_err(|source| CatalogError::PreloadFailed {
                id: id.clone(),
                source,
            })
    }

    /// Preloads every asset in the catalog. Returns how many were prepared.
    pub fn preload_all(&mut self) -> Result<usize, CatalogError> {
        let assets = self.catalog.assets();
        for asset in &assets {
            self.preload(&asset.id)?;
        }
        Ok(assets.len())
    }

    // === Lifecycle ===

    /// Counters for the host.
    #[must_use]
    pub fn stats(&self) -> PlaybackStats {
        PlaybackStats {
            pool: self.pool.stats(),
            handles: self.handles.len(),
            tracked: self.tracked.len(),
            tasks: self.scheduler.len(),
            clock: self.clock,
        }
    }

    /// Stops everything, cancels all tasks and tears down the pool.
    ///
    /// The engine ignores play requests and ticks afterwards.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.stop_all(0.0);
        for handle in self.handles.handles() {
            self.retire(handle, EndCause::Stopped);
        }
        self.scheduler.cancel_all();
        self.waits.clear();
        self.resolved_waits.clear();
        self.guard.clear();
        self.pool.teardown();
        self.shut_down = true;
        info!("Audio engine shut down");
    }

    /// Whether [`shutdown`](Self::shutdown) has run.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    // === Internals shared with handles and tasks ===

    pub(crate) fn live_channel(&self, handle: PlaybackHandle) -> Option<&PlaybackChannel> {
        let entry = self.handles.get(handle)?;
        self.pool.channel(entry.lease)
    }

    pub(crate) fn live_channel_mut(
        &mut self,
        handle: PlaybackHandle,
    ) -> Option<&mut PlaybackChannel> {
        let lease = self.handles.get(handle)?.lease;
        self.pool.channel_mut(lease)
    }

    /// Disposes a handle. Returns `false` if it was already gone.
    pub(crate) fn retire(&mut self, handle: PlaybackHandle, cause: EndCause) -> bool {
        let Some(entry) = self.handles.remove(handle) else {
            debug!("{handle}: already disposed");
            return false;
        };
        if let Some(fade) = &entry.fade {
            fade.token.cancel();
        }
        if cause != EndCause::Expired {
            self.pool.release(entry.lease);
        }
        self.guard.untrack(&entry.asset.id, handle);
        self.untrack(handle, entry.asset.category);
        self.events.push(cause.event(handle, entry.asset.id.clone()));
        true
    }

    pub(crate) fn untrack(&mut self, handle: PlaybackHandle, category: AudioCategory) {
        self.tracked.retain(|&h| h != handle);
        self.by_category.get_mut(category).retain(|&h| h != handle);
    }

    /// Starts a fade on a handle, cancelling any fade already running on it.
    pub(crate) fn start_fade(
        &mut self,
        handle: PlaybackHandle,
        from: f32,
        to: f32,
        duration: f32,
        then: FadeThen,
    ) {
        let Some(entry) = self.handles.get_mut(handle) else {
            return;
        };
        if let Some(previous) = entry.fade.take() {
            previous.token.cancel();
        }
        let (_, token) = self.scheduler.spawn(EngineTask::Fade(FadeTask {
            handle,
            from,
            to,
            duration,
            elapsed: 0.0,
            then,
        }));
        entry.fade = Some(ActiveFade { token, then });
    }

    /// Cancels the fade running on a handle, leaving the volume where it is.
    pub(crate) fn cancel_fade(&mut self, handle: PlaybackHandle) {
        if let Some(fade) = self.handles.get_mut(handle).and_then(|entry| entry.fade.take()) {
            fade.token.cancel();
        }
    }

    /// Marks a ticket ready. Beyond the queue limit the oldest unpolled
    /// tickets are forgotten and poll as unknown.
    pub(crate) fn resolve_wait(&mut self, ticket: WaitTicket) {
        let Some(ready) = self.waits.get_mut(&ticket) else {
            return;
        };
        *ready = true;
        self.resolved_waits.push_back(ticket);
        while self.resolved_waits.len() > self.config.max_queued_events {
            if let Some(stale) = self.resolved_waits.pop_front() {
                trace!("Dropping unpolled wait ticket {stale:?}");
                self.waits.remove(&stale);
            }
        }
    }

    pub(crate) fn start_wait(&mut self, handle: PlaybackHandle) -> WaitTicket {
        let ticket = self.wait_ids.next_ticket();
        self.waits.insert(ticket, false);
        self.scheduler.spawn(EngineTask::Wait(WaitTask { handle, ticket }));
        ticket
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::Completion;
    use volley_kernel::{ClipRef, FixedTicks};

    fn engine() -> AudioEngine {
        let catalog = StaticCatalog::new()
            .with_asset(AudioAsset::new("Beep", ClipRef::new("beep.wav", 0.5)))
            .and_then(|c| {
                c.with_asset(
                    AudioAsset::new("Theme", ClipRef::new("theme.ogg", 30.0))
                        .with_looping(true)
                        .with_category(AudioCategory::Music),
                )
            })
            .expect("catalog");
        AudioEngine::headless(AudioConfig::default().with_seed(3), catalog).expect("engine")
    }

    #[test]
    fn test_unknown_asset_rejected() {
        let mut engine = engine();
        assert!(engine.play("Nope", PlaybackParameters::default()).is_none());
        assert_eq!(engine.drain_events(), vec![PlaybackEvent::Rejected {
            asset: AssetId::new("Nope"),
            reason: RejectReason::UnknownAsset,
        }]);
    }

    #[test]
    fn test_unpolled_wait_tickets_are_bounded() {
        let catalog = StaticCatalog::new()
            .with_asset(AudioAsset::new("Beep", ClipRef::new("beep.wav", 0.5)))
            .expect("catalog");
        let config = AudioConfig {
            max_queued_events: 2,
            ..AudioConfig::default()
        };
        let mut engine = AudioEngine::headless(config, catalog).expect("engine");

        let mut tickets = Vec::new();
        for _ in 0..4 {
            let beep = engine
                .play("Beep", PlaybackParameters::default())
                .expect("handle");
            let Completion::Pending(ticket) = engine.handle(beep).wait_for_completion() else {
                panic!("one-shot should be pending");
            };
            tickets.push(ticket);
        }
        assert_eq!(engine.pending_waits(), 4);

        engine.pump(&mut FixedTicks::covering(0.1, 2.0), usize::MAX);
        assert_eq!(engine.pending_waits(), 2);
        assert_eq!(engine.poll_wait(tickets[0]), WaitStatus::Unknown);
        assert_eq!(engine.poll_wait(tickets[3]), WaitStatus::Ready);
        assert_eq!(engine.pending_waits(), 1);
    }

    #[test]
    fn test_play_tracks_and_starts() {
        let mut engine = engine();
        let handle = engine
            .play("Beep", PlaybackParameters::default())
            .expect("handle");

        assert!(engine.handle(handle).is_playing());
        assert_eq!(engine.tracked(), &[handle]);
        assert_eq!(engine.tracked_in(AudioCategory::Sfx), &[handle]);
        assert!(matches!(
            engine.drain_events().as_slice(),
            [PlaybackEvent::Started { .. }]
        ));
    }

    #[test]
    fn test_one_shot_detaches_then_expires() {
        let mut engine = engine();
        let handle = engine
            .play("Beep", PlaybackParameters::default())
            .expect("handle");
        engine.drain_events();

        // 0.5s clip: detach polls from 0.6s, the watchdog fires at 1.0s
        engine.pump(&mut FixedTicks::covering(0.05, 1.5), usize::MAX);

        assert!(engine.tracked().is_empty());
        assert!(engine.handle(handle).is_disposed());
        let events = engine.drain_events();
        assert!(events.contains(&PlaybackEvent::Completed {
            handle,
            asset: AssetId::new("Beep"),
        }));
        assert!(events.contains(&PlaybackEvent::Expired {
            handle,
            asset: AssetId::new("Beep"),
        }));
        assert_eq!(engine.stats().pool.active, 0);
    }

    #[test]
    fn test_looping_has_no_lifetime() {
        let mut engine = engine();
        let theme = engine
            .play("Theme", PlaybackParameters::default())
            .expect("handle");
        engine.pump(&mut FixedTicks::covering(0.1, 100.0), usize::MAX);
        assert!(engine.handle(theme).is_playing());
        assert_eq!(
            engine.handle(theme).wait_for_completion(),
            Completion::Looping
        );
    }

    #[test]
    fn test_category_volume_reaches_channels() {
        let mut engine = engine();
        let theme = engine
            .play("Theme", PlaybackParameters::default())
            .expect("handle");

        engine.set_category_volume(AudioCategory::Music, 0.5);
        let gain = engine.live_channel(theme).expect("channel").output_gain();
        assert!((gain - 0.5).abs() < 1e-4, "{gain}");

        engine.set_category_muted(AudioCategory::Music, true);
        let gain = engine.live_channel(theme).expect("channel").output_gain();
        assert!(gain.abs() < f32::EPSILON);
    }

    #[test]
    fn test_stop_category_clears_only_that_category() {
        let mut engine = engine();
        let theme = engine
            .play("Theme", PlaybackParameters::default())
            .expect("theme");
        let beep = engine
            .play("Beep", PlaybackParameters::default())
            .expect("beep");

        engine.stop_category(AudioCategory::Music, 0.0);
        assert!(engine.handle(theme).is_disposed());
        assert!(engine.handle(beep).is_playing());
        assert_eq!(engine.tracked(), &[beep]);
    }

    #[test]
    fn test_pause_all_keeps_tracking() {
        let mut engine = engine();
        let theme = engine
            .play("Theme", PlaybackParameters::default())
            .expect("theme");
        engine.pause_all(0.0);
        assert!(engine.handle(theme).is_paused());
        assert_eq!(engine.tracked(), &[theme]);
        engine.resume_all(0.0);
        assert!(engine.handle(theme).is_playing());
    }

    #[test]
    fn test_wait_for_completion() {
        let mut engine = engine();
        let beep = engine
            .play("Beep", PlaybackParameters::default())
            .expect("beep");
        let Completion::Pending(ticket) = engine.handle(beep).wait_for_completion()
        else {
            panic!("expected a pending wait");
        };
        assert_eq!(engine.poll_wait(ticket), WaitStatus::Pending);

        engine.pump(&mut FixedTicks::covering(0.1, 0.7), usize::MAX);
        assert_eq!(engine.poll_wait(ticket), WaitStatus::Ready);
        assert_eq!(engine.poll_wait(ticket), WaitStatus::Unknown);
    }

    #[test]
    fn test_preload() {
        let mut engine = engine();
        assert!(engine.preload(&AssetId::new("Beep")).is_ok());
        assert!(matches!(
            engine.preload(&AssetId::new("Nope")),
            Err(CatalogError::NotFound(_))
        ));
        assert_eq!(engine.preload_all().expect("preload"), 2);
    }

    #[test]
    fn test_shutdown() {
        let mut engine = engine();
        let theme = engine
            .play("Theme", PlaybackParameters::default())
            .expect("theme");
        engine.shutdown();

        assert!(engine.handle(theme).is_disposed());
        assert!(engine.is_shut_down());
        assert!(engine.play("Beep", PlaybackParameters::default()).is_none());
        let stats = engine.stats();
        assert_eq!(stats.pool.active, 0);
        assert_eq!(stats.pool.created, 0);
        assert_eq!(stats.handles, 0);
        assert_eq!(stats.tasks, 0);
    }
}
