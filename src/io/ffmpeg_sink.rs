use std::{
    io::Write,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use crate::{
    frame::{
        alloc::FrameAllocator,
        buffer::FrameInfo,
        forwarder::{FrameForwarder, ReadCursor},
    },
    io::{
        Sink,
        process::{self, Pipe, RESTART_DELAY, SPAWN_RETRY_DELAY},
    },
};

/// How long the feeder waits for a new frame before repeating the last one.
pub const REPEAT_AFTER: Duration = Duration::from_millis(100);

/// Pipes composited RGBA frames into the stdin of a shell command.
#[derive(Debug)]
pub struct FfmpegSink {
    cmd: String,
    frames: Arc<FrameForwarder>,
    started: AtomicBool,
    shutdown: Arc<AtomicBool>,
}

impl FfmpegSink {
    pub fn new(
        name: &str,
        cmd: &str,
        info: FrameInfo,
        alloc: &dyn FrameAllocator,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            cmd: cmd.to_owned(),
            frames: Arc::new(FrameForwarder::new(name, info, alloc)),
            started: AtomicBool::new(false),
            shutdown,
        }
    }
}

impl Sink for FfmpegSink {
    fn frames(&self) -> &Arc<FrameForwarder> {
        &self.frames
    }

    fn start(&self) -> bool {
        if self.started.swap(true, Ordering::AcqRel) {
            return true;
        }
        let frames = Arc::clone(&self.frames);
        let shutdown = Arc::clone(&self.shutdown);
        let cmd = self.cmd.clone();
        let spawned = thread::Builder::new()
            .name(format!("{}-sink", frames.name()))
            .spawn(move || run(&cmd, &frames, &shutdown));
        match spawned {
            Ok(_) => true,
            Err(e) => {
                tracing::error!(stream = %self.frames.name(), "could not start sink thread: {e}");
                false
            }
        }
    }
}

fn run(cmd: &str, frames: &FrameForwarder, shutdown: &AtomicBool) {
    let stream = frames.name();
    while !shutdown.load(Ordering::Relaxed) {
        tracing::info!(stream = %stream, "starting ffmpeg");
        let mut child = match process::spawn_shell(cmd, Pipe::Stdin) {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!(stream = %stream, "{e}");
                process::sleep_unless(shutdown, SPAWN_RETRY_DELAY);
                continue;
            }
        };
        if let Some(stderr) = child.stderr.take() {
            process::log_lines(stream.to_owned(), stderr);
        }
        let Some(stdin) = child.stdin.take() else {
            tracing::warn!(stream = %stream, "ffmpeg has no stdin");
            process::supervise(stream, &mut child, shutdown);
            continue;
        };

        thread::scope(|s| {
            s.spawn(|| feed(stdin, frames, shutdown));
            process::supervise(stream, &mut child, shutdown);
        });
        process::sleep_unless(shutdown, RESTART_DELAY);
    }
    tracing::info!(stream = %stream, "sink stopped");
}

/// Write frames into `out` until it breaks or `stop` is raised.
///
/// New frames are written as they arrive; when none arrives within [`REPEAT_AFTER`] the
/// current one is written again so the encoder keeps a steady input.
pub fn feed(mut out: impl Write, frames: &FrameForwarder, stop: &AtomicBool) {
    let stream = frames.name();
    let mut cursor = ReadCursor::new();
    while !stop.load(Ordering::Relaxed) && !frames.is_closed() {
        let frame = frames
            .blocking_get_for_reading_timeout(&mut cursor, REPEAT_AFTER)
            .or_else(|| frames.get_any_for_reading());
        let Some(frame) = frame else {
            process::sleep_unless(stop, REPEAT_AFTER);
            continue;
        };
        let written = out.write_all(frame.data());
        frames.finished_reading(frame);
        if let Err(e) = written {
            tracing::warn!(stream = %stream, "could not write to ffmpeg stdin: {e}");
            return;
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/io/ffmpeg_sink.rs"]
mod tests;
