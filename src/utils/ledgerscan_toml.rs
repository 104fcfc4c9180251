//! Load `ledgerscan.toml` (CLI only). Library callers build [`Opts`] directly.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::Opts;
use crate::types::ScanMode;

#[derive(Debug, Default, Deserialize)]
pub struct LedgerscanToml {
    #[serde(default)]
    settings: SettingsSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SettingsSection {
    root: Option<String>,
    out: Option<String>,
    state_db: Option<String>,
    mode: Option<ScanMode>,
    subtrees: Option<Vec<String>>,
    include_ext: Option<Vec<String>>,
    exclude_ext: Option<Vec<String>>,
    exclude_dirs: Option<Vec<String>>,
    classify_ext: Option<Vec<String>>,
    workers: Option<usize>,
    page_limit: Option<usize>,
    hash: Option<bool>,
    hash_block_size: Option<usize>,
    checkpoint_every: Option<u64>,
    reclaim_every: Option<u64>,
    write_attempts: Option<u32>,
    write_delay_ms: Option<u64>,
    reset: Option<bool>,
    fresh: Option<bool>,
    rescan: Option<Vec<String>>,
    revisit_finished: Option<bool>,
    limit: Option<u64>,
    subtree_column: Option<bool>,
    verbose: Option<bool>,
}

/// Read a config file. `Ok(None)` when it does not exist; unreadable or invalid files are errors
/// the caller logs before ignoring them.
pub fn load_ledgerscan_toml(path: &Path) -> Result<Option<LedgerscanToml>> {
    let s = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("read config {}", path.display())),
    };
    let parsed =
        parse_ledgerscan_toml(&s).with_context(|| format!("parse config {}", path.display()))?;
    Ok(Some(parsed))
}

pub fn parse_ledgerscan_toml(s: &str) -> std::result::Result<LedgerscanToml, toml::de::Error> {
    toml::from_str(s)
}

/// Overwrite opts field from file when present.
macro_rules! apply_file_opt {
    ($sec:expr, $opts:expr, $sec_field:ident => $opts_field:ident) => {
        if let Some(v) = $sec.$sec_field.clone() {
            $opts.$opts_field = v;
        }
    };
}

/// Apply file config to opts (only fields present in the file). Call before applying CLI.
pub fn apply_file_to_opts(file: &LedgerscanToml, opts: &mut Opts) {
    let sec = &file.settings;
    if let Some(ref p) = sec.root {
        opts.root = PathBuf::from(p);
    }
    if let Some(ref p) = sec.out {
        opts.out = PathBuf::from(p);
    }
    if let Some(ref p) = sec.state_db {
        opts.state_db = PathBuf::from(p);
    }
    apply_file_opt!(sec, opts, mode => scan_mode);
    apply_file_opt!(sec, opts, subtrees => subtrees);
    apply_file_opt!(sec, opts, include_ext => include_ext);
    apply_file_opt!(sec, opts, exclude_ext => exclude_ext);
    apply_file_opt!(sec, opts, exclude_dirs => exclude_dirs);
    apply_file_opt!(sec, opts, classify_ext => classifiable_ext);
    apply_file_opt!(sec, opts, workers => workers);
    apply_file_opt!(sec, opts, page_limit => page_limit);
    apply_file_opt!(sec, opts, hash => hash);
    apply_file_opt!(sec, opts, hash_block_size => hash_block_size);
    apply_file_opt!(sec, opts, checkpoint_every => checkpoint_every);
    apply_file_opt!(sec, opts, reclaim_every => reclaim_every);
    apply_file_opt!(sec, opts, write_attempts => write_attempts);
    if let Some(ms) = sec.write_delay_ms {
        opts.write_base_delay = Duration::from_millis(ms);
    }
    apply_file_opt!(sec, opts, reset => reset_state);
    apply_file_opt!(sec, opts, fresh => fresh);
    apply_file_opt!(sec, opts, rescan => rescan);
    apply_file_opt!(sec, opts, revisit_finished => revisit_finished);
    if let Some(n) = sec.limit {
        opts.limit = Some(n);
    }
    apply_file_opt!(sec, opts, subtree_column => subtree_column);
    apply_file_opt!(sec, opts, verbose => verbose);
}
