//! Producers and consumers of frame streams.
//!
//! The engine only talks to them through [`Source`] and [`Sink`]: each owns one forwarder and
//! can be started. Everything they do after that happens on their own threads.

use std::{
    fmt,
    sync::{Arc, atomic::AtomicBool},
};

use crate::{
    config::model::{ConfigContext, SinkKind, SourceKind, StageCfg},
    foundation::error::MixResult,
    frame::{
        alloc::FrameAllocator,
        buffer::{FrameInfo, FrameType},
        forwarder::FrameForwarder,
    },
};

pub mod ffmpeg_sink;
pub mod ffmpeg_source;
pub mod image_source;
pub mod null_sink;
pub(crate) mod process;

pub use ffmpeg_sink::FfmpegSink;
pub use ffmpeg_source::FfmpegSource;
pub use image_source::ImageSource;
pub use null_sink::NullSink;

/// A producer of frames.
pub trait Source: Send + Sync + fmt::Debug {
    fn frames(&self) -> &Arc<FrameForwarder>;

    /// Begin producing. `false` means the source will never deliver frames.
    fn start(&self) -> bool;
}

/// A consumer of composited output frames.
pub trait Sink: Send + Sync + fmt::Debug {
    fn frames(&self) -> &Arc<FrameForwarder>;

    fn start(&self) -> bool;
}

/// Shared inputs for building sources and sinks from config.
#[derive(Clone, Copy)]
pub struct BuildCtx<'a> {
    pub config: &'a ConfigContext,
    pub alloc: &'a dyn FrameAllocator,
    pub shutdown: &'a Arc<AtomicBool>,
}

impl fmt::Debug for BuildCtx<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildCtx")
            .field("config", self.config)
            .finish_non_exhaustive()
    }
}

pub fn build_source(name: &str, kind: &SourceKind, ctx: BuildCtx<'_>) -> MixResult<Box<dyn Source>> {
    Ok(match kind {
        SourceKind::FfmpegStdout { frames, cmd } => Box::new(FfmpegSource::new(
            name,
            cmd,
            FrameInfo::new(FrameType::Yuv422p, *frames),
            ctx.alloc,
            Arc::clone(ctx.shutdown),
        )),
        SourceKind::Image {
            path,
            width,
            height,
            colour,
        } => {
            let size = width.zip(*height);
            let img = match path {
                Some(p) => image_source::load(&ctx.config.resolve(p), size)?,
                None => image_source::blank(size.unwrap_or((1, 1)), colour.as_deref())?,
            };
            Box::new(ImageSource::new(name, img, ctx.alloc))
        }
    })
}

pub fn build_sink(name: &str, cfg: &StageCfg, ctx: BuildCtx<'_>) -> MixResult<Box<dyn Sink>> {
    let info = FrameInfo::new(FrameType::Rgba, cfg.frames);
    Ok(match &cfg.kind {
        SinkKind::FfmpegStdin { cmd } => Box::new(FfmpegSink::new(
            name,
            cmd,
            info,
            ctx.alloc,
            Arc::clone(ctx.shutdown),
        )),
        SinkKind::Null => Box::new(NullSink::new(name, info, ctx.alloc)),
    })
}
