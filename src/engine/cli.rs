//! CLI command handler: defaults, then the config file, then flags; then run the inventory.

use anyhow::Result;
use log::{debug, warn};
use std::path::PathBuf;
use std::time::Duration;

use crate::Opts;
use crate::engine::arg_parser::Cli;
use crate::inventory::inventory_with_opts;
use crate::utils::config::PackagePaths;
use crate::utils::ledgerscan_toml::{LedgerscanToml, apply_file_to_opts, load_ledgerscan_toml};
use crate::utils::setup_logging;

/// Overwrite opts field from a flag when given.
macro_rules! apply_cli_opt {
    ($cli:expr, $opts:expr, $cli_field:ident => $opts_field:ident) => {
        if let Some(v) = $cli.$cli_field.clone() {
            $opts.$opts_field = v;
        }
    };
}

/// Overwrite a list option when the flag was given at least once.
macro_rules! apply_cli_list {
    ($cli:expr, $opts:expr, $cli_field:ident => $opts_field:ident) => {
        if !$cli.$cli_field.is_empty() {
            $opts.$opts_field = $cli.$cli_field.clone();
        }
    };
}

fn config_path(cli: &Cli) -> PathBuf {
    cli.config
        .clone()
        .unwrap_or_else(|| PathBuf::from(PackagePaths::get().config_filename()))
}

/// Build run options: defaults, config file, flags (later wins).
pub fn setup_opts(cli: &Cli, file: Option<&LedgerscanToml>) -> Opts {
    let mut opts = Opts::default();
    if let Some(file) = file {
        apply_file_to_opts(file, &mut opts);
    }
    if let Some(ref dir) = cli.dir {
        opts.root = dir.clone();
    }
    if let Some(ref out) = cli.out {
        opts.out = out.clone();
    }
    if let Some(ref db) = cli.state_db {
        opts.state_db = db.clone();
    }
    apply_cli_opt!(cli, opts, mode => scan_mode);
    apply_cli_list!(cli, opts, subtrees => subtrees);
    apply_cli_list!(cli, opts, include_ext => include_ext);
    apply_cli_list!(cli, opts, exclude_ext => exclude_ext);
    apply_cli_list!(cli, opts, exclude_dirs => exclude_dirs);
    apply_cli_list!(cli, opts, classify_ext => classifiable_ext);
    apply_cli_opt!(cli, opts, workers => workers);
    apply_cli_opt!(cli, opts, page_limit => page_limit);
    apply_cli_opt!(cli, opts, hash => hash);
    apply_cli_opt!(cli, opts, hash_block_size => hash_block_size);
    apply_cli_opt!(cli, opts, checkpoint_every => checkpoint_every);
    apply_cli_opt!(cli, opts, reclaim_every => reclaim_every);
    apply_cli_opt!(cli, opts, write_attempts => write_attempts);
    if let Some(ms) = cli.write_delay_ms {
        opts.write_base_delay = Duration::from_millis(ms);
    }
    apply_cli_opt!(cli, opts, reset => reset_state);
    apply_cli_opt!(cli, opts, fresh => fresh);
    apply_cli_list!(cli, opts, rescan => rescan);
    apply_cli_opt!(cli, opts, revisit_finished => revisit_finished);
    if cli.limit.is_some() {
        opts.limit = cli.limit;
    }
    apply_cli_opt!(cli, opts, subtree_column => subtree_column);
    apply_cli_opt!(cli, opts, verbose => verbose);
    opts
}

/// Parse options, set up logging, run the inventory.
pub fn handle_run(cli: &Cli) -> Result<()> {
    let file = load_ledgerscan_toml(&config_path(cli));
    let opts = setup_opts(cli, file.as_ref().ok().and_then(Option::as_ref));
    setup_logging(opts.verbose);
    if let Err(e) = &file {
        warn!("{e:#}; using defaults and flags only");
    }
    debug!(
        "{} CONFIG:{:#?}",
        env!("CARGO_PKG_NAME").to_uppercase(),
        opts
    );
    inventory_with_opts(&opts)?;
    Ok(())
}
