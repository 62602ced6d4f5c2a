use std::{
    io::{BufRead, BufReader},
    path::PathBuf,
    thread,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use stagehand::{Config, ConfigContext, Controller, HeapAllocator, Mixer, Theatre};

#[derive(Parser, Debug)]
#[command(name = "stagehand", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse and validate a config file, then print what it defines.
    Validate(ValidateArgs),
    /// Start every source and stage and run the mixer.
    Run(RunArgs),
}

#[derive(Parser, Debug)]
struct ValidateArgs {
    /// Mixer config JSON.
    #[arg(long)]
    config: PathBuf,
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Mixer config JSON.
    #[arg(long)]
    config: PathBuf,

    /// Output frame rate.
    #[arg(long, default_value_t = 30.0)]
    fps: f64,

    /// Stop after this many frames.
    #[arg(long)]
    frames: Option<u64>,
}

/// One line typed on the control input.
#[derive(Clone, Debug, PartialEq, Eq)]
enum ControlLine {
    Scene {
        stage: String,
        scene: String,
        animate: bool,
    },
    Quit,
}

fn parse_control(line: &str) -> anyhow::Result<Option<ControlLine>> {
    let words: Vec<&str> = line.split_whitespace().collect();
    match words.as_slice() {
        [] => Ok(None),
        ["quit" | "exit"] => Ok(Some(ControlLine::Quit)),
        ["scene", stage, scene] => Ok(Some(ControlLine::Scene {
            stage: (*stage).to_owned(),
            scene: (*scene).to_owned(),
            animate: true,
        })),
        ["scene", stage, scene, "cut"] => Ok(Some(ControlLine::Scene {
            stage: (*stage).to_owned(),
            scene: (*scene).to_owned(),
            animate: false,
        })),
        _ => anyhow::bail!("expected `scene <stage> <scene> [cut]` or `quit`, got `{line}`"),
    }
}

fn control_loop(input: impl BufRead, ctl: &Controller) {
    for line in input.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!("control input closed: {e}");
                return;
            }
        };
        match parse_control(&line) {
            Ok(None) => {}
            Ok(Some(ControlLine::Quit)) => {
                ctl.shutdown();
                return;
            }
            Ok(Some(ControlLine::Scene {
                stage,
                scene,
                animate,
            })) => {
                if let Err(e) = ctl.set_scene(&stage, &scene, animate) {
                    eprintln!("{e}");
                }
            }
            Err(e) => eprintln!("{e}"),
        }
        if ctl.is_shutdown_requested() {
            return;
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Validate(args) => cmd_validate(args),
        Command::Run(args) => cmd_run(args),
    }
}

fn read_config(path: &std::path::Path) -> anyhow::Result<Config> {
    Config::load(path).with_context(|| format!("load config '{}'", path.display()))
}

fn cmd_validate(args: ValidateArgs) -> anyhow::Result<()> {
    let cfg = read_config(&args.config)?;
    print!("{cfg}");
    println!("\nConfig OK.");
    Ok(())
}

fn cmd_run(args: RunArgs) -> anyhow::Result<()> {
    let cfg = read_config(&args.config)?;
    let ctx = ConfigContext::for_file(&args.config);
    let theatre = Theatre::from_config(&cfg, &ctx, &HeapAllocator::new())
        .context("build theatre")?;

    let report = theatre.start();
    if !report.all_started() {
        tracing::warn!(
            sources = ?report.failed_sources,
            sinks = ?report.failed_sinks,
            "running with streams that failed to start"
        );
    }

    let mut mixer = Mixer::new(theatre);
    let ctl = mixer.controller();
    thread::Builder::new()
        .name("control".to_owned())
        .spawn(move || control_loop(BufReader::new(std::io::stdin()), &ctl))
        .context("spawn control thread")?;

    let result = mixer.run(args.fps, args.frames);
    mixer.theatre().shutdown();
    let stats = result.context("render loop")?;
    println!(
        "rendered {} frames at {:.1} fps ({} output frames dropped)",
        stats.frames_rendered, stats.fps, stats.sink_frames_dropped
    );
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/bin/stagehand.rs"]
mod tests;
