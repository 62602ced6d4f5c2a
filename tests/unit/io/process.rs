use std::io::Read;

use super::*;

#[test]
fn sleep_returns_early_when_stopped() {
    let stop = AtomicBool::new(true);
    let t0 = Instant::now();
    assert!(!sleep_unless(&stop, Duration::from_secs(10)));
    assert!(t0.elapsed() < Duration::from_secs(1));
}

#[test]
fn sleep_runs_to_completion() {
    let stop = AtomicBool::new(false);
    assert!(sleep_unless(&stop, Duration::from_millis(10)));
}

#[test]
fn shell_command_output_is_piped() {
    let mut child = spawn_shell("printf abc", Pipe::Stdout).unwrap();
    let mut out = String::new();
    child.stdout.take().unwrap().read_to_string(&mut out).unwrap();
    assert_eq!(out, "abc");
    assert!(child.wait().unwrap().success());
}

#[test]
fn supervise_kills_on_stop() {
    let mut child = spawn_shell("sleep 30", Pipe::Stdout).unwrap();
    let stop = AtomicBool::new(true);
    let t0 = Instant::now();
    supervise("test", &mut child, &stop);
    assert!(t0.elapsed() < Duration::from_secs(5));
    assert!(child.try_wait().unwrap().is_some());
}

#[test]
fn supervise_returns_when_child_exits() {
    let mut child = spawn_shell("exit 3", Pipe::Stdout).unwrap();
    let stop = AtomicBool::new(false);
    supervise("test", &mut child, &stop);
}
