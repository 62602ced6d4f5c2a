use std::{
    io::{ErrorKind, Read},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
};

use crate::{
    frame::{
        alloc::FrameAllocator, buffer::FrameInfo, decode::decode_yuyv422,
        forwarder::FrameForwarder,
    },
    io::{
        Source,
        process::{self, Pipe, RESTART_DELAY, SPAWN_RETRY_DELAY},
    },
};

/// Raw YUYV422 video read from the stdout of a shell command, restarted whenever it dies.
#[derive(Debug)]
pub struct FfmpegSource {
    cmd: String,
    frames: Arc<FrameForwarder>,
    started: AtomicBool,
    shutdown: Arc<AtomicBool>,
}

impl FfmpegSource {
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

impl Source for FfmpegSource {
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
            .name(format!("{}-source", frames.name()))
            .spawn(move || run(&cmd, &frames, &shutdown));
        match spawned {
            Ok(_) => true,
            Err(e) => {
                tracing::error!(stream = %self.frames.name(), "could not start source thread: {e}");
                false
            }
        }
    }
}

fn run(cmd: &str, frames: &FrameForwarder, shutdown: &AtomicBool) {
    let stream = frames.name();
    while !shutdown.load(Ordering::Relaxed) {
        tracing::info!(stream = %stream, "starting ffmpeg");
        let mut child = match process::spawn_shell(cmd, Pipe::Stdout) {
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
        let Some(stdout) = child.stdout.take() else {
            tracing::warn!(stream = %stream, "ffmpeg has no stdout");
            process::supervise(stream, &mut child, shutdown);
            continue;
        };

        thread::scope(|s| {
            s.spawn(|| pump(stdout, frames));
            process::supervise(stream, &mut child, shutdown);
        });
        process::sleep_unless(shutdown, RESTART_DELAY);
    }
    tracing::info!(stream = %stream, "source stopped");
}

/// Move whole frames from `input` into the forwarder until the stream ends.
///
/// Frames that find the pool exhausted are still read in full and then discarded, so the
/// reader never loses alignment with frame boundaries.
pub fn pump(mut input: impl Read, frames: &FrameForwarder) {
    let stream = frames.name();
    let mut packed = vec![0u8; frames.info().buf_size()];
    loop {
        if let Err(e) = input.read_exact(&mut packed) {
            if e.kind() == ErrorKind::UnexpectedEof {
                tracing::info!(stream = %stream, "ffmpeg output ended");
            } else {
                tracing::warn!(stream = %stream, "could not read from ffmpeg's output: {e}");
            }
            return;
        }
        let Some(mut frame) = frames.get_for_writing() else {
            continue;
        };
        match decode_yuyv422(&packed, &mut frame) {
            Ok(()) => frames.finished_writing(frame),
            Err(e) => {
                tracing::warn!(stream = %stream, "{e}");
                frames.failed_writing(frame);
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/io/ffmpeg_source.rs"]
mod tests;
