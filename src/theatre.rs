//! Registry of sources, scenes and stages, and the scene switching built on it.

use std::{
    collections::{BTreeSet, HashMap},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc,
    },
    time::Duration,
};

use crate::{
    config::model::{Config, ConfigContext},
    foundation::{
        core::{Dims, Rgba8},
        error::{MixError, MixResult},
    },
    frame::alloc::FrameAllocator,
    io::{self, BuildCtx, Source},
};

pub mod events;
pub mod scene;
pub mod stage;

pub use events::TheatreEvent;
pub use scene::Scene;
pub use stage::Stage;

/// Which sources and sinks failed to start.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StartReport {
    pub failed_sources: Vec<String>,
    pub failed_sinks: Vec<String>,
}

impl StartReport {
    pub fn all_started(&self) -> bool {
        self.failed_sources.is_empty() && self.failed_sinks.is_empty()
    }
}

#[derive(Debug)]
pub struct Theatre {
    sources: Vec<Box<dyn Source>>,
    source_index: HashMap<String, usize>,
    source_fallbacks: Vec<Option<usize>>,
    scenes: Vec<Scene>,
    scene_index: HashMap<String, usize>,
    stages: Vec<Stage>,
    stage_index: HashMap<String, usize>,
    fallback: Rgba8,
    shutdown: Arc<AtomicBool>,
    listeners: Vec<mpsc::Sender<TheatreEvent>>,
}

impl Theatre {
    /// Build every source, scene and stage in `cfg`, then apply each stage's default scene.
    ///
    /// Only sources that appear in at least one scene, or that such a source falls back to, are
    /// built. They are ordered by `z`, then by name, and that order is their index everywhere
    /// else.
    #[tracing::instrument(skip_all)]
    pub fn from_config(
        cfg: &Config,
        ctx: &ConfigContext,
        alloc: &dyn FrameAllocator,
    ) -> MixResult<Self> {
        let mut cfg = cfg.clone();
        cfg.add_generated_scenes();
        cfg.validate()?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let build = BuildCtx {
            config: ctx,
            alloc,
            shutdown: &shutdown,
        };

        let mut used: BTreeSet<&str> = BTreeSet::new();
        let mut pending: Vec<&str> = cfg
            .scenes
            .values()
            .flat_map(|s| s.layers.iter().map(|l| l.source.as_str()))
            .collect();
        while let Some(name) = pending.pop() {
            if used.insert(name)
                && let Some(fb) = cfg.sources.get(name).and_then(|s| s.fallback.as_deref())
            {
                pending.push(fb);
            }
        }
        let mut enabled: Vec<(&String, f64)> = cfg
            .sources
            .iter()
            .filter(|(name, _)| used.contains(name.as_str()))
            .map(|(name, src)| (name, src.z))
            .collect();
        enabled.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(b.0)));

        let mut sources = Vec::with_capacity(enabled.len());
        let mut source_index = HashMap::new();
        for (name, _) in enabled {
            tracing::info!(source = %name, "adding source");
            let src = io::build_source(name, &cfg.sources[name].kind, build)
                .map_err(|e| e.within(format_args!("source {name}")))?;
            source_index.insert(name.clone(), sources.len());
            sources.push(src);
        }
        let mut source_fallbacks = vec![None; sources.len()];
        for (name, &idx) in &source_index {
            source_fallbacks[idx] = cfg.sources[name]
                .fallback
                .as_ref()
                .and_then(|fb| source_index.get(fb).copied());
        }

        let mut scenes = Vec::with_capacity(cfg.scenes.len());
        let mut scene_index = HashMap::new();
        for (name, scene_cfg) in &cfg.scenes {
            scene_index.insert(name.clone(), scenes.len());
            scenes.push(Scene::from_cfg(name, scene_cfg, &source_index)?);
        }

        let source_dims: Vec<Dims> = sources.iter().map(|s| s.frames().info().dims()).collect();
        let mut stages = Vec::with_capacity(cfg.stages.len());
        let mut stage_index = HashMap::new();
        for (name, stage_cfg) in &cfg.stages {
            let sink = io::build_sink(name, stage_cfg, build)?;
            stage_index.insert(name.clone(), stages.len());
            stages.push(Stage::new(
                name,
                &stage_cfg.default_scene,
                Duration::from_millis(stage_cfg.transition_time_ms.unwrap_or(0)),
                sink,
                &source_dims,
                &scenes,
            ));
        }

        let mut theatre = Self {
            sources,
            source_index,
            source_fallbacks,
            scenes,
            scene_index,
            stages,
            stage_index,
            fallback: cfg.fallback(),
            shutdown,
            listeners: Vec::new(),
        };
        theatre.reset_to_default_scenes()?;
        tracing::info!(
            sources = theatre.sources.len(),
            scenes = theatre.scenes.len(),
            stages = theatre.stages.len(),
            "theatre ready"
        );
        Ok(theatre)
    }

    /// Switch `stage` to `scene`. Unknown names change nothing.
    #[tracing::instrument(skip(self))]
    pub fn set_scene(&mut self, stage: &str, scene: &str, animate: bool) -> MixResult<()> {
        let &stage_idx = self
            .stage_index
            .get(stage)
            .ok_or_else(|| MixError::unknown("stage", stage))?;
        let &scene_idx = self
            .scene_index
            .get(scene)
            .ok_or_else(|| MixError::unknown("scene", scene))?;

        self.stages[stage_idx].apply_scene(scene_idx, &self.scenes[scene_idx], animate);
        tracing::info!("scene changed");
        self.emit(TheatreEvent::SceneChanged {
            stage: stage.to_owned(),
            scene: scene.to_owned(),
            animated: animate,
        });
        Ok(())
    }

    /// Cut every stage to its default scene.
    pub fn reset_to_default_scenes(&mut self) -> MixResult<()> {
        for i in 0..self.stages.len() {
            let stage = self.stages[i].name().to_owned();
            let scene = self.stages[i].default_scene().to_owned();
            self.set_scene(&stage, &scene, false).map_err(|e| {
                MixError::config(format!(
                    "could not apply default scene ({scene}) to stage {stage}: {e}"
                ))
            })?;
        }
        Ok(())
    }

    /// Advance every layer of every stage by `dt` seconds.
    pub fn animate(&mut self, dt: f64) {
        let dims = self.source_dims();
        for stage in &mut self.stages {
            stage.animate(dt, &dims);
        }
    }

    /// Start all sources, then all sinks. Failures are logged and reported, never fatal.
    pub fn start(&self) -> StartReport {
        let mut report = StartReport::default();
        for src in &self.sources {
            if !src.start() {
                tracing::error!(stream = %src.frames().name(), "source failed to start");
                report.failed_sources.push(src.frames().name().to_owned());
            }
        }
        for stage in &self.stages {
            if !stage.sink().start() {
                tracing::error!(stream = %stage.name(), "sink failed to start");
                report.failed_sinks.push(stage.name().to_owned());
            }
        }
        report
    }

    /// Receive an event for every future scene change.
    pub fn subscribe(&mut self) -> mpsc::Receiver<TheatreEvent> {
        let (tx, rx) = mpsc::channel();
        self.listeners.push(tx);
        rx
    }

    fn emit(&mut self, event: TheatreEvent) {
        self.listeners.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Flag polled by the render loop and by every producer thread.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Raise the shutdown flag and wake everything blocked on a forwarder.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        for src in &self.sources {
            src.frames().close();
        }
        for stage in &self.stages {
            stage.sink().frames().close();
        }
    }

    pub fn sources(&self) -> &[Box<dyn Source>] {
        &self.sources
    }

    pub fn source_index(&self, name: &str) -> Option<usize> {
        self.source_index.get(name).copied()
    }

    /// Index of the source drawn in place of each source while it is not live.
    pub fn source_fallbacks(&self) -> &[Option<usize>] {
        &self.source_fallbacks
    }

    pub fn source_dims(&self) -> Vec<Dims> {
        self.sources
            .iter()
            .map(|s| s.frames().info().dims())
            .collect()
    }

    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    pub fn scene(&self, name: &str) -> Option<&Scene> {
        self.scene_index.get(name).map(|&i| &self.scenes[i])
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn stage(&self, name: &str) -> Option<&Stage> {
        self.stage_index.get(name).map(|&i| &self.stages[i])
    }

    /// Name of the scene currently active on `stage`.
    pub fn active_scene(&self, stage: &str) -> Option<&str> {
        let idx = self.stage(stage)?.active_scene()?;
        Some(self.scenes[idx].name())
    }

    pub fn fallback(&self) -> Rgba8 {
        self.fallback
    }
}

#[cfg(test)]
#[path = "../tests/unit/theatre/theatre.rs"]
mod tests;
