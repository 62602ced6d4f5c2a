use std::{
    io::{BufRead, BufReader, Read},
    process::{Child, Command, Stdio},
    sync::atomic::{AtomicBool, Ordering},
    thread,
    time::{Duration, Instant},
};

use crate::foundation::error::{MixError, MixResult};

/// Wait before restarting a child that exited.
pub const RESTART_DELAY: Duration = Duration::from_secs(1);
/// Wait before retrying a child that could not be spawned at all.
pub const SPAWN_RETRY_DELAY: Duration = Duration::from_secs(5);

const POLL: Duration = Duration::from_millis(50);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pipe {
    Stdin,
    Stdout,
}

/// Run `cmd` through `sh -c` with the given pipe attached and stderr captured.
pub fn spawn_shell(cmd: &str, pipe: Pipe) -> MixResult<Child> {
    let mut command = Command::new("sh");
    command.arg("-c").arg(cmd).stderr(Stdio::piped());
    match pipe {
        Pipe::Stdin => command.stdin(Stdio::piped()).stdout(Stdio::null()),
        Pipe::Stdout => command.stdin(Stdio::null()).stdout(Stdio::piped()),
    };
    command
        .spawn()
        .map_err(|e| MixError::io(format!("failed to spawn `{cmd}`: {e}")))
}

/// Forward a child's stderr to the log, one line per event.
pub fn log_lines(stream: String, stderr: impl Read + Send + 'static) {
    let spawned = thread::Builder::new()
        .name(format!("{stream}-stderr"))
        .spawn(move || {
            for line in BufReader::new(stderr).lines() {
                match line {
                    Ok(line) => tracing::info!(stream = %stream, "[ffmpeg] {line}"),
                    Err(_) => break,
                }
            }
        });
    if let Err(e) = spawned {
        tracing::warn!("could not start stderr logger: {e}");
    }
}

/// Sleep for `d`, returning early with `false` once `stop` is raised.
pub fn sleep_unless(stop: &AtomicBool, d: Duration) -> bool {
    let deadline = Instant::now() + d;
    loop {
        if stop.load(Ordering::Relaxed) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep(POLL.min(deadline - now));
    }
}

/// Block until `child` exits or `stop` is raised, killing it in the latter case.
pub fn supervise(stream: &str, child: &mut Child, stop: &AtomicBool) {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                tracing::warn!(stream = %stream, %status, "ffmpeg died");
                return;
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(stream = %stream, "could not poll ffmpeg: {e}");
                return;
            }
        }
        if stop.load(Ordering::Relaxed) {
            if let Err(e) = child.kill() {
                tracing::debug!(stream = %stream, "kill failed: {e}");
            }
            if let Err(e) = child.wait() {
                tracing::debug!(stream = %stream, "wait failed: {e}");
            }
            return;
        }
        thread::sleep(POLL);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/io/process.rs"]
mod tests;
