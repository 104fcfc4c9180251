//! Option layering: defaults, config file, flags.

use clap::Parser;
use ledgerscan::engine::Cli;
use ledgerscan::engine::cli::setup_opts;
use ledgerscan::utils::ledgerscan_toml::{
    apply_file_to_opts, load_ledgerscan_toml, parse_ledgerscan_toml,
};
use ledgerscan::utils::{DEFAULT_PAGE_LIMIT, WorkerLimits};
use ledgerscan::{Opts, ScanMode};
use std::path::PathBuf;
use std::time::Duration;

const SAMPLE: &str = r#"
[settings]
root = "/srv/archive"
mode = "whole-tree"
workers = 3
include_ext = ["PDF"]
write_delay_ms = 10
limit = 100
"#;

#[test]
fn test_defaults() {
    let opts = Opts::default();
    assert_eq!(opts.scan_mode, ScanMode::PerSubtree);
    assert_eq!(opts.page_limit, DEFAULT_PAGE_LIMIT);
    assert!(opts.workers >= 1 && opts.workers <= WorkerLimits::DEFAULT_MAX);
    assert_eq!(opts.classifiable_ext, ["pdf"]);
    assert_eq!(opts.checkpoint_every, 500);
    assert_eq!(opts.reclaim_every, 5000);
    assert_eq!(opts.write_attempts, 6);
    assert_eq!(opts.write_base_delay, Duration::from_millis(500));
    assert_eq!(opts.hash_block_size, 8 * 1024 * 1024);
    assert!(opts.hash);
    assert_eq!(opts.limit, None);
}

#[test]
fn test_file_overrides_defaults() {
    let file = parse_ledgerscan_toml(SAMPLE).unwrap();
    let mut opts = Opts::default();
    apply_file_to_opts(&file, &mut opts);
    assert_eq!(opts.root, PathBuf::from("/srv/archive"));
    assert_eq!(opts.scan_mode, ScanMode::WholeTree);
    assert_eq!(opts.workers, 3);
    assert_eq!(opts.include_ext, ["PDF"]);
    assert_eq!(opts.write_base_delay, Duration::from_millis(10));
    assert_eq!(opts.limit, Some(100));
    assert_eq!(opts.page_limit, DEFAULT_PAGE_LIMIT);
}

#[test]
fn test_unknown_setting_rejected() {
    assert!(parse_ledgerscan_toml("[settings]\nworkerz = 2\n").is_err());
}

#[test]
fn test_empty_file_is_valid() {
    let file = parse_ledgerscan_toml("").unwrap();
    let mut opts = Opts::default();
    apply_file_to_opts(&file, &mut opts);
    assert_eq!(opts.scan_mode, ScanMode::PerSubtree);
}

#[test]
fn test_flags_override_file() {
    let file = parse_ledgerscan_toml(SAMPLE).unwrap();
    let cli = Cli::try_parse_from([
        "ledgerscan",
        "data",
        "--workers",
        "5",
        "--fresh",
        "--hash",
        "false",
        "--subtrees",
        "b",
        "a",
    ])
    .unwrap();
    let opts = setup_opts(&cli, Some(&file));
    assert_eq!(opts.root, PathBuf::from("data"));
    assert_eq!(opts.workers, 5);
    assert_eq!(opts.scan_mode, ScanMode::WholeTree);
    assert!(opts.fresh);
    assert!(!opts.hash);
    assert_eq!(opts.subtrees, ["b", "a"]);
}

#[test]
fn test_root_from_file_when_no_dir_flag() {
    let file = parse_ledgerscan_toml(SAMPLE).unwrap();
    let cli = Cli::try_parse_from(["ledgerscan", "--mode", "per-subtree"]).unwrap();
    let opts = setup_opts(&cli, Some(&file));
    assert_eq!(opts.root, PathBuf::from("/srv/archive"));
    assert_eq!(opts.scan_mode, ScanMode::PerSubtree);
}

#[test]
fn test_load_missing_and_invalid_files() {
    let dir = tempfile::tempdir().unwrap();
    assert!(
        load_ledgerscan_toml(&dir.path().join("absent.toml"))
            .unwrap()
            .is_none()
    );

    let bad = dir.path().join("bad.toml");
    std::fs::write(&bad, "[settings\nworkers = ").unwrap();
    assert!(load_ledgerscan_toml(&bad).is_err());

    let good = dir.path().join("good.toml");
    std::fs::write(&good, SAMPLE).unwrap();
    assert!(load_ledgerscan_toml(&good).unwrap().is_some());
}
