use super::*;

#[test]
fn scene_lines_animate_unless_cut() {
    assert_eq!(
        parse_control("scene program wide").unwrap(),
        Some(ControlLine::Scene {
            stage: "program".into(),
            scene: "wide".into(),
            animate: true,
        })
    );
    assert_eq!(
        parse_control("  scene program wide cut ").unwrap(),
        Some(ControlLine::Scene {
            stage: "program".into(),
            scene: "wide".into(),
            animate: false,
        })
    );
}

#[test]
fn blank_and_quit_lines() {
    assert_eq!(parse_control("   ").unwrap(), None);
    assert_eq!(parse_control("quit").unwrap(), Some(ControlLine::Quit));
}

#[test]
fn malformed_lines_are_rejected() {
    assert!(parse_control("scene program").is_err());
    assert!(parse_control("scene a b fade").is_err());
    assert!(parse_control("jump").is_err());
}

#[test]
fn cli_parses_run_flags() {
    let cli = Cli::try_parse_from([
        "stagehand", "run", "--config", "mix.json", "--fps", "25", "--frames", "10",
    ])
    .unwrap();
    let Command::Run(args) = cli.cmd else {
        panic!("expected run");
    };
    assert_eq!(args.config, PathBuf::from("mix.json"));
    assert_eq!(args.fps, 25.0);
    assert_eq!(args.frames, Some(10));
}
