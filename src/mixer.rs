//! The render loop: pull the freshest frame of every source, animate, composite every stage.
//!
//! Nothing here blocks on a producer. A source without a fresh frame keeps its last texture, a
//! source that stopped being live shows its fallback source (or nothing), and a sink without a
//! free frame skips the tick.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc,
    },
    thread,
    time::{Duration, Instant},
};

use crate::{
    foundation::error::{MixError, MixResult},
    frame::{
        buffer::{Frame, FrameType},
        forwarder::ReadCursor,
    },
    theatre::{Stage, Theatre},
};

pub mod composite;
pub mod texture;
pub mod timer;

use composite::{draw_layer, fill, unpremultiply};
use texture::Texture;
use timer::DeltaTimer;

/// How long a [`Controller`] waits for the render loop to answer.
pub const CONTROL_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MixerStats {
    /// Ticks completed.
    pub frames_rendered: u64,
    /// Stage outputs skipped because the sink had no writable frame.
    pub sink_frames_dropped: u64,
    pub source_frames_uploaded: u64,
    /// Measured over the last call to [`Mixer::run`].
    pub fps: f64,
}

/// Work handed to the render loop from other threads, applied between ticks.
#[derive(Debug)]
pub enum Request {
    SetScene {
        stage: String,
        scene: String,
        animate: bool,
        reply: mpsc::Sender<MixResult<()>>,
    },
}

/// First non-empty texture along `source`'s fallback chain.
fn live_texture<'a>(
    source: usize,
    textures: &'a [Texture],
    fallbacks: &[Option<usize>],
) -> Option<&'a Texture> {
    let mut idx = source;
    // A chain can visit each source at most once before it loops.
    for _ in 0..textures.len() {
        let tex = textures.get(idx)?;
        if !tex.is_empty() {
            return Some(tex);
        }
        idx = fallbacks.get(idx).copied().flatten()?;
    }
    None
}

/// Paint `stage`'s active layers over `background` into an RGBA output frame.
fn composite_stage(
    out: &mut Frame,
    stage: &Stage,
    textures: &[Texture],
    fallbacks: &[Option<usize>],
    background: [u8; 4],
) -> MixResult<()> {
    if out.frame_type() != FrameType::Rgba {
        return Err(MixError::decode(format!(
            "stages render RGBA, not {}",
            out.frame_type()
        )));
    }
    let dims = stage.output();
    let canvas = out.data_mut();
    fill(canvas, background);
    for layer in stage.active_layers() {
        if let Some(tex) = live_texture(layer.source(), textures, fallbacks) {
            draw_layer(canvas, dims, tex, layer)?;
        }
    }
    unpremultiply(canvas);
    Ok(())
}

/// Thread-safe handle for switching scenes and stopping a running [`Mixer`].
#[derive(Clone, Debug)]
pub struct Controller {
    tx: mpsc::Sender<Request>,
    shutdown: Arc<AtomicBool>,
}

impl Controller {
    /// Ask the render loop to switch `stage` to `scene` and wait for the outcome.
    pub fn set_scene(&self, stage: &str, scene: &str, animate: bool) -> MixResult<()> {
        let (reply, answer) = mpsc::channel();
        self.tx
            .send(Request::SetScene {
                stage: stage.to_owned(),
                scene: scene.to_owned(),
                animate,
                reply,
            })
            .map_err(|_| MixError::io("render loop has stopped"))?;
        answer
            .recv_timeout(CONTROL_TIMEOUT)
            .map_err(|_| MixError::io("render loop did not answer the scene request"))?
    }

    /// Ask the render loop to stop after the current tick.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

#[derive(Debug)]
pub struct Mixer {
    theatre: Theatre,
    cursors: Vec<ReadCursor>,
    textures: Vec<Texture>,
    stats: MixerStats,
    tx: mpsc::Sender<Request>,
    rx: mpsc::Receiver<Request>,
}

impl Mixer {
    pub fn new(theatre: Theatre) -> Self {
        let n = theatre.sources().len();
        let (tx, rx) = mpsc::channel();
        Self {
            theatre,
            cursors: vec![ReadCursor::new(); n],
            textures: vec![Texture::new(); n],
            stats: MixerStats::default(),
            tx,
            rx,
        }
    }

    pub fn theatre(&self) -> &Theatre {
        &self.theatre
    }

    pub fn theatre_mut(&mut self) -> &mut Theatre {
        &mut self.theatre
    }

    pub fn controller(&self) -> Controller {
        Controller {
            tx: self.tx.clone(),
            shutdown: self.theatre.shutdown_handle(),
        }
    }

    /// Latest picture of source `index`, empty when it has none or is not live.
    pub fn texture(&self, index: usize) -> Option<&Texture> {
        self.textures.get(index)
    }

    pub fn stats(&self) -> MixerStats {
        self.stats
    }

    fn handle_requests(&mut self) {
        while let Ok(req) = self.rx.try_recv() {
            match req {
                Request::SetScene {
                    stage,
                    scene,
                    animate,
                    reply,
                } => {
                    let res = self.theatre.set_scene(&stage, &scene, animate);
                    if let Err(e) = &res {
                        tracing::warn!(%stage, %scene, "scene request rejected: {e}");
                    }
                    // The requester may have timed out already.
                    let _ = reply.send(res);
                }
            }
        }
    }

    fn upload_sources(&mut self, dt: Duration) {
        for (i, src) in self.theatre.sources().iter().enumerate() {
            let frames = src.frames();
            frames.age(dt);
            if !frames.is_live() {
                if !self.textures[i].is_empty() {
                    tracing::info!(stream = %frames.name(), "source went stale");
                    self.textures[i].clear();
                }
                continue;
            }
            let Some(frame) = frames.get_fresh_for_reading(&mut self.cursors[i]) else {
                continue;
            };
            match self.textures[i].upload(&frame) {
                Ok(()) => self.stats.source_frames_uploaded += 1,
                Err(e) => {
                    tracing::warn!(stream = %frames.name(), "dropping frame {}: {e}", frame.id());
                }
            }
            frames.finished_reading(frame);
        }
    }

    fn render_stages(&mut self) {
        let background = self.theatre.fallback().to_premul();
        let fallbacks = self.theatre.source_fallbacks();
        for stage in self.theatre.stages() {
            let frames = stage.sink().frames();
            let Some(mut out) = frames.get_for_writing() else {
                self.stats.sink_frames_dropped += 1;
                tracing::debug!(stream = %frames.name(), "no free output frame, skipping");
                continue;
            };
            let composited = composite_stage(&mut out, stage, &self.textures, fallbacks, background);
            match composited {
                Ok(()) => frames.finished_writing(out),
                Err(e) => {
                    tracing::warn!(stream = %frames.name(), "could not composite: {e}");
                    frames.failed_writing(out);
                }
            }
        }
    }

    /// Run one render-loop iteration covering `dt` of wall time.
    pub fn tick(&mut self, dt: Duration) {
        self.handle_requests();
        self.upload_sources(dt);
        self.theatre.animate(dt.as_secs_f64());
        self.render_stages();
        self.stats.frames_rendered += 1;
    }

    /// Tick at `fps` until shutdown is requested or `max_frames` ticks have run.
    pub fn run(&mut self, fps: f64, max_frames: Option<u64>) -> MixResult<MixerStats> {
        if !(fps.is_finite() && fps > 0.0) {
            return Err(MixError::config(format!(
                "frame rate must be a positive number, got {fps}"
            )));
        }
        let period = Duration::from_secs_f64(1.0 / fps);
        let mut timer = DeltaTimer::new();
        let started = Instant::now();
        let first = self.stats.frames_rendered;
        let mut deadline = started;
        tracing::info!(fps, "render loop started");

        while !self.theatre.is_shutdown_requested() {
            if max_frames.is_some_and(|max| self.stats.frames_rendered - first >= max) {
                break;
            }
            self.tick(timer.next());

            deadline += period;
            let now = Instant::now();
            if deadline > now {
                thread::sleep(deadline - now);
            } else {
                deadline = now;
            }
        }

        let elapsed = started.elapsed().as_secs_f64();
        let rendered = self.stats.frames_rendered - first;
        if elapsed > 0.0 {
            self.stats.fps = rendered as f64 / elapsed;
        }
        tracing::info!(
            frames = rendered,
            fps = self.stats.fps,
            dropped = self.stats.sink_frames_dropped,
            "render loop stopped"
        );
        Ok(self.stats)
    }
}

#[cfg(test)]
#[path = "../tests/unit/mixer/mixer.rs"]
mod tests;
