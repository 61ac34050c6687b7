//! Scripted playback session.
//!
//! Exercises the engine the way a game would: rapid fire against a
//! throttled asset, positional one-shots, a footstep source following a
//! moving anchor, an ambient loop, and category-wide volume, pause and stop
//! changes, all on a fixed tick.

use std::fs;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};
use volley_audio::{AudioAsset, AudioEngine, PlaybackEvent, PlaybackParameters, StaticCatalog};
use volley_common::{Anchor, AudioCategory, Vec3};
use volley_kernel::{ClipRef, FixedTicks, SharedListener, TickSource};

use crate::config::{EngineConfig, OutputKind};
use crate::timing::{FixedStep, FramePacer};

/// Runs one session.
pub fn run(config: &EngineConfig) -> Result<()> {
    let catalog = load_catalog(config)?;
    let mut engine = build_engine(config, catalog)?;

    if config.preload {
        match engine.preload_all() {
            Ok(count) => info!("Preloaded {count} clips"),
            Err(e) => warn!("Preload failed: {e}"),
        }
    }

    let mut session = Session::new(config.session_seconds, config.audio.random_seed);
    if config.realtime {
        let mut pacer = FramePacer::new(config.tick_rate);
        let mut step = FixedStep::new(config.tick_rate);
        while !session.is_over() {
            for _ in 0..step.advance(pacer.wait()) {
                if session.is_over() {
                    break;
                }
                session.tick(&mut engine, step.step());
            }
        }
    } else {
        let mut ticks = FixedTicks::covering(config.tick_dt(), config.session_seconds);
        while let Some(dt) = ticks.next_delta() {
            session.tick(&mut engine, dt);
        }
    }

    session.report(&engine);
    engine.shutdown();
    Ok(())
}

fn load_catalog(config: &EngineConfig) -> Result<StaticCatalog> {
    let Some(path) = &config.manifest else {
        info!("No manifest configured, using the built-in catalog");
        return demo_catalog();
    };
    let source = fs::read_to_string(path)
        .with_context(|| format!("reading manifest {}", path.display()))?;
    let catalog = StaticCatalog::from_toml_str(&source)
        .with_context(|| format!("parsing manifest {}", path.display()))?;
    Ok(catalog)
}

fn demo_catalog() -> Result<StaticCatalog> {
    let assets = [
        AudioAsset::new("Gunfire", ClipRef::new("sfx/gunfire.wav", 0.6))
            .with_min_interval(0.05)
            .with_max_instances(3)
            .with_priority(200),
        AudioAsset::new("Explosion", ClipRef::new("sfx/explosion.wav", 2.5))
            .with_volume(0.9)
            .with_spatial_blend(1.0)
            .with_distances(2.0, 80.0),
        AudioAsset::new("Footstep", ClipRef::new("sfx/footstep.wav", 0.3))
            .with_volume(0.6)
            .with_min_interval(0.25)
            .with_max_instances(2),
        AudioAsset::new("Wind", ClipRef::new("ambient/wind.ogg", 12.0))
            .with_looping(true)
            .with_category(AudioCategory::Ambient),
        AudioAsset::new("Click", ClipRef::new("ui/click.wav", 0.1)).with_category(AudioCategory::Ui),
    ];
    let mut catalog = StaticCatalog::new();
    for asset in assets {
        catalog.insert(asset)?;
    }
    Ok(catalog)
}

fn build_engine(config: &EngineConfig, catalog: StaticCatalog) -> Result<AudioEngine> {
    let listener = SharedListener::new();
    let builder = AudioEngine::builder(config.audio.clone())
        .catalog(catalog)
        .listener(listener.clone());

    let builder = match config.output {
        OutputKind::Headless => builder,
        #[cfg(feature = "rodio-output")]
        OutputKind::Rodio => {
            let factory = volley_kernel::backend::RodioFactory::open_default(&config.asset_root)?
                .with_listener(listener);
            builder.factory(factory)
        },
        #[cfg(not(feature = "rodio-output"))]
        OutputKind::Rodio => {
            warn!(
                "Built without rodio-output; clips under {} will not be heard",
                config.asset_root.display()
            );
            builder
        },
    };

    Ok(builder.build()?)
}

#[derive(Debug, Default)]
struct EventTally {
    started: u32,
    rejected: u32,
    evicted: u32,
    expired: u32,
    completed: u32,
    stopped: u32,
}

impl EventTally {
    fn record(&mut self, event: &PlaybackEvent) {
        debug!("{event:?}");
        match event {
            PlaybackEvent::Started { .. } => self.started += 1,
            PlaybackEvent::Rejected { .. } => self.rejected += 1,
            PlaybackEvent::Evicted { .. } => self.evicted += 1,
            PlaybackEvent::Expired { .. } => self.expired += 1,
            PlaybackEvent::Completed { .. } => self.completed += 1,
            PlaybackEvent::Stopped { .. } => self.stopped += 1,
        }
    }
}

/// Slack for summed tick deltas landing just short of the session length.
const SESSION_SLACK: f64 = 1e-6;

/// Timeline of the scripted session.
#[derive(Debug)]
struct Session {
    length: f32,
    elapsed: f64,
    rng: fastrand::Rng,
    player: Anchor,
    ambience_started: bool,
    next_explosion: f32,
    next_report: f32,
    cues_done: u8,
    tally: EventTally,
}

impl Session {
    fn new(length: f32, seed: Option<u64>) -> Self {
        Self {
            length,
            elapsed: 0.0,
            rng: seed.map_or_else(fastrand::Rng::new, fastrand::Rng::with_seed),
            player: Anchor::new(Vec3::ZERO),
            ambience_started: false,
            next_explosion: 0.5,
            next_report: 1.0,
            cues_done: 0,
            tally: EventTally::default(),
        }
    }

    fn is_over(&self) -> bool {
        self.elapsed + SESSION_SLACK >= f64::from(self.length)
    }

    fn now(&self) -> f32 {
        self.elapsed as f32
    }

    fn progress(&self) -> f32 {
        if self.length <= 0.0 {
            1.0
        } else {
            (self.elapsed / f64::from(self.length)) as f32
        }
    }

    fn tick(&mut self, engine: &mut AudioEngine, dt: f32) {
        if !self.ambience_started {
            self.ambience_started = true;
            engine.play("Wind", PlaybackParameters::default().with_fade_in(2.0));
        }

        let progress = self.progress();
        if progress < 0.6 {
            // held trigger: most of these are throttled
            engine.play("Gunfire", PlaybackParameters::default().with_random_pitch());
        }

        if self.now() >= self.next_explosion {
            self.next_explosion += 1.0;
            let at = Vec3::new(self.rng.f32() * 60.0 - 30.0, 0.0, self.rng.f32() * 60.0 - 30.0);
            engine.play_at(
                "Explosion",
                at,
                PlaybackParameters::default()
                    .with_fade_in(0.1)
                    .with_random_volume(),
            );
        }

        // walk in a circle around the listener
        let angle = self.now() * 0.8;
        self.player.set(Vec3::new(angle.cos() * 5.0, 0.0, angle.sin() * 5.0));
        engine.play_attached("Footstep", &self.player, PlaybackParameters::default());

        self.run_cues(engine, progress);

        engine.tick(dt);
        self.elapsed += f64::from(dt);

        for event in engine.drain_events() {
            self.tally.record(&event);
        }

        if self.now() >= self.next_report {
            self.next_report += 1.0;
            let stats = engine.stats();
            info!(
                "t={:.1}s channels {}/{} active, {} tracked, {} tasks",
                stats.clock, stats.pool.active, stats.pool.created, stats.tracked, stats.tasks
            );
        }
    }

    fn run_cues(&mut self, engine: &mut AudioEngine, progress: f32) {
        const CUES: [f32; 4] = [0.5, 0.6, 0.75, 0.9];
        let Some(&at) = CUES.get(usize::from(self.cues_done)) else {
            return;
        };
        if progress < at {
            return;
        }
        match self.cues_done {
            0 => {
                info!("Cue: sfx down to 50%");
                engine.set_category_volume(AudioCategory::Sfx, 0.5);
                engine.play("Click", PlaybackParameters::default());
            },
            1 => {
                info!("Cue: pausing ambience");
                engine.pause_category(AudioCategory::Ambient, 0.5);
            },
            2 => {
                info!("Cue: resuming ambience");
                engine.resume_category(AudioCategory::Ambient, 0.5);
            },
            _ => {
                info!("Cue: stopping everything");
                engine.stop_all(0.5);
            },
        }
        self.cues_done += 1;
    }

    fn report(&self, engine: &AudioEngine) {
        let stats = engine.stats();
        info!(
            "Session over after {:.1}s: {} started, {} rejected, {} evicted, {} completed, {} stopped, {} expired",
            self.elapsed,
            self.tally.started,
            self.tally.rejected,
            self.tally.evicted,
            self.tally.completed,
            self.tally.stopped,
            self.tally.expired
        );
        info!(
            "Pool: {} channels created, {} returned, {} reclaimed by watchdog",
            stats.pool.created, stats.pool.released, stats.pool.expired
        );
    }
}
