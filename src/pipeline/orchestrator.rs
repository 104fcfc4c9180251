//! Scan driver: plans segments (one per first-level directory, or the whole tree), walks each in
//! order, runs the per-file stages, and records completion.

use anyhow::{Context, Result, anyhow, bail};
use log::{debug, info, warn};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use crate::Opts;
use crate::classifier::Classifier;
use crate::engine::db_ops::FingerprintStore;
use crate::engine::hashing::digest_hex;
use crate::engine::normalize::PathNormalizer;
use crate::engine::progress::{ProgressBar, set_bar_desc};
use crate::engine::tools::{
    ExtensionFilter, extension_of, normalize_extensions, now_secs, path_relative_to,
    path_to_db_string, subtree_output_path,
};
use crate::types::{ResetScope, ScanMode, ScanSummary};

use super::classify::ClassifierPool;
use super::context::{FirstError, SharedSink, Sink, lock_sink, take_first_error};
use super::error_handler::{Stage, StageErrors};
use super::metadata::{digest_with_retry, file_task, stat_with_retry};
use super::row::{PendingRow, error_row};
use super::walk::{WalkOutcome, first_level_dirs, walk_files};

/// One output file and, in per-subtree mode, one completion unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Segment {
    /// Subtree name; `None` in whole-tree mode.
    pub name: Option<String>,
    pub dir: PathBuf,
    pub out: PathBuf,
}

/// Why a segment's walk ended before exhausting the tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stop {
    Cancelled,
    Limit,
    Aborted,
}

struct SegmentEnd {
    walk_errors: u64,
    stopped: Option<Stop>,
}

/// Everything the per-file loop needs that stays fixed for the run.
struct ScanContext<'a> {
    opts: &'a Opts,
    root: PathBuf,
    normalizer: PathNormalizer,
    filter: ExtensionFilter,
    classifiable: HashSet<String>,
    exclude_dirs: HashSet<String>,
    sink: SharedSink,
    cancel: Arc<AtomicBool>,
    abort: Arc<AtomicBool>,
}

/// Normalize and check the root. An invalid or missing root is fatal.
fn resolve_root(normalizer: &PathNormalizer, root: &Path) -> Result<PathBuf> {
    let key = normalizer
        .normalize(root)
        .map_err(|r| anyhow!("invalid root {}: {r}", root.display()))?;
    let path = PathBuf::from(key);
    if !path.is_dir() {
        bail!("root {} is not a directory", root.display());
    }
    Ok(path)
}

/// Output files and walk roots for this run, in processing order.
pub fn plan_segments(opts: &Opts, root: &Path, exclude_dirs: &HashSet<String>) -> Result<Vec<Segment>> {
    if opts.scan_mode == ScanMode::WholeTree {
        return Ok(vec![Segment {
            name: None,
            dir: root.to_path_buf(),
            out: opts.out.clone(),
        }]);
    }

    let names = if opts.subtrees.is_empty() {
        let (dirs, files) = first_level_dirs(root, exclude_dirs)?;
        if !files.is_empty() {
            warn!(
                "{} file(s) directly under the root are not part of any subtree and are not inventoried",
                files.len()
            );
        }
        dirs
    } else {
        let mut seen = HashSet::new();
        opts.subtrees
            .iter()
            .filter(|name| seen.insert(name.as_str()))
            .filter(|name| {
                let ok = root.join(name.as_str()).is_dir();
                if !ok {
                    warn!("Subtree {name} not found under {}; skipping", root.display());
                }
                ok
            })
            .cloned()
            .collect()
    };

    Ok(names
        .into_iter()
        .map(|name| Segment {
            dir: root.join(&name),
            out: subtree_output_path(&opts.out, &name),
            name: Some(name),
        })
        .collect())
}

fn limit_reached(opts: &Opts, admitted: u64) -> bool {
    opts.limit.is_some_and(|limit| admitted >= limit)
}

/// First path component of a relative path, when the file sits inside a directory.
fn first_component(rel: &str) -> Option<String> {
    rel.split_once('/').map(|(first, _)| first.to_string())
}

/// Walk one segment, emitting rows directly or through the pool.
fn scan_segment(
    ctx: &ScanContext<'_>,
    seg: &Segment,
    pool: &ClassifierPool,
    admitted: &mut u64,
) -> Result<SegmentEnd> {
    let opts = ctx.opts;
    let mut end = SegmentEnd {
        walk_errors: 0,
        stopped: None,
    };

    for outcome in walk_files(&seg.dir, &ctx.exclude_dirs) {
        if ctx.cancel.load(Ordering::SeqCst) {
            end.stopped = Some(Stop::Cancelled);
            break;
        }
        if ctx.abort.load(Ordering::SeqCst) {
            end.stopped = Some(Stop::Aborted);
            break;
        }

        let path = match outcome {
            WalkOutcome::File(path) => path,
            WalkOutcome::Err { msg, path } => {
                let at = path
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| seg.dir.display().to_string());
                warn!("walk: {at}: {msg}");
                end.walk_errors += 1;
                lock_sink(&ctx.sink)?.record_walk_error();
                continue;
            }
        };

        if !ctx.filter.accepts(&extension_of(&path)) {
            lock_sink(&ctx.sink)?.record_filtered();
            continue;
        }

        let rel = path_to_db_string(&path_relative_to(&path, &ctx.root).unwrap_or_else(|| path.clone()));
        let subtree = seg.name.clone().or_else(|| first_component(&rel));
        let mut errors = StageErrors::new();

        let key = match ctx.normalizer.normalize(&path) {
            Ok(key) => key,
            Err(rejection) => {
                warn!("{}: path: {rejection}", path.display());
                if limit_reached(opts, *admitted) {
                    end.stopped = Some(Stop::Limit);
                    break;
                }
                *admitted += 1;
                errors.push(Stage::Path, rejection.to_string());
                lock_sink(&ctx.sink)?.commit(&error_row(&path, rel, subtree, &errors), None)?;
                continue;
            }
        };

        let meta = match stat_with_retry(Path::new(&key)) {
            Ok(meta) => meta,
            Err(e) => {
                warn!("{key}: stat: {e}");
                if limit_reached(opts, *admitted) {
                    end.stopped = Some(Stop::Limit);
                    break;
                }
                *admitted += 1;
                errors.push(Stage::Stat, e.to_string());
                lock_sink(&ctx.sink)?.commit(&error_row(&path, rel, subtree, &errors), None)?;
                continue;
            }
        };

        let task = file_task(key, &path, rel, subtree, &meta);
        {
            let mut sink = lock_sink(&ctx.sink)?;
            if !opts.fresh && sink.store().should_skip(&task.key, task.size, task.mtime_ns)? {
                sink.record_skipped();
                continue;
            }
        }
        if limit_reached(opts, *admitted) {
            end.stopped = Some(Stop::Limit);
            break;
        }
        *admitted += 1;

        let mut pending = PendingRow::new(task);
        if opts.hash {
            match digest_with_retry(&pending.task.fs_path(), opts.hash_block_size) {
                Ok(hash) => pending.digest = Some(digest_hex(&hash)),
                Err(e) => {
                    warn!("{}: digest: {e}", pending.task.key);
                    pending.errors.push(Stage::Digest, e.to_string());
                }
            }
        }

        if ctx.classifiable.contains(&pending.task.extension) {
            pool.submit(pending)?;
        } else {
            let (row, task) = pending.into_row(None);
            lock_sink(&ctx.sink)?.commit(&row, Some(&task))?;
        }
    }
    Ok(end)
}

/// Clear state as requested before anything is read from the store.
fn apply_resets(opts: &Opts, store: &mut FingerprintStore) -> Result<()> {
    if opts.reset_state {
        info!("Resetting all stored state");
        store.reset(&ResetScope::All)?;
    }
    if !opts.rescan.is_empty() {
        info!("Clearing finished markers for: {}", opts.rescan.join(", "));
        store.reset(&ResetScope::Subtrees(opts.rescan.clone()))?;
    }
    Ok(())
}

/// Run a scan. Per-file failures become row errors; store failures, write exhaustion, and an
/// invalid root are returned as `Err`.
pub fn run_scan(
    opts: &Opts,
    classifier: Arc<dyn Classifier>,
    cancel: Arc<AtomicBool>,
    progress: Option<ProgressBar>,
) -> Result<ScanSummary> {
    let start = Instant::now();
    let normalizer = PathNormalizer::native()?;
    let root = resolve_root(&normalizer, &opts.root)?;

    let mut store = FingerprintStore::open(&opts.state_db)
        .with_context(|| format!("open state store {}", opts.state_db.display()))?;
    apply_resets(opts, &mut store)?;

    let exclude_dirs: HashSet<String> = opts.exclude_dirs.iter().cloned().collect();
    let segments = plan_segments(opts, &root, &exclude_dirs)?;
    debug!("Planned {} segment(s) under {}", segments.len(), root.display());

    let ctx = ScanContext {
        opts,
        root,
        normalizer,
        filter: ExtensionFilter::new(&opts.include_ext, &opts.exclude_ext),
        classifiable: normalize_extensions(&opts.classifiable_ext),
        exclude_dirs,
        sink: Sink::new(store, Arc::clone(&classifier), opts, progress.clone()).shared(),
        cancel,
        abort: Arc::new(AtomicBool::new(false)),
    };
    let first_error: FirstError = Arc::new(Mutex::new(None));
    let truncate = opts.fresh || opts.reset_state;

    let mut summary = ScanSummary::default();
    let mut admitted = 0_u64;

    for seg in &segments {
        if ctx.cancel.load(Ordering::SeqCst) {
            summary.cancelled = true;
            break;
        }
        if limit_reached(opts, admitted) {
            summary.limit_reached = true;
            break;
        }
        let label = seg.name.as_deref().unwrap_or(".");

        if let Some(name) = &seg.name
            && !opts.fresh
            && !opts.revisit_finished
            && lock_sink(&ctx.sink)?.store().is_subtree_finished(name)?
        {
            info!("Subtree {name} already finished; skipping");
            summary.finished_skipped.push(name.clone());
            continue;
        }

        info!("Scanning {label} -> {}", seg.out.display());
        if let Some(pb) = &progress {
            set_bar_desc(pb, label);
        }
        lock_sink(&ctx.sink)?.open_output(&seg.out, truncate)?;

        let pool = ClassifierPool::start(
            opts.workers,
            Arc::clone(&classifier),
            opts.page_limit,
            Arc::clone(&ctx.sink),
            Arc::clone(&first_error),
            Arc::clone(&ctx.abort),
        );
        let walked = scan_segment(&ctx, seg, &pool, &mut admitted);
        let joined = pool.finish();
        let outcome = match take_first_error(&first_error) {
            Some(msg) => Err(anyhow!(msg)),
            None => walked.and_then(|end| joined.map(|()| end)),
        };
        let end = match outcome {
            Ok(end) => end,
            Err(e) => {
                if let Ok(mut sink) = lock_sink(&ctx.sink) {
                    sink.salvage();
                }
                return Err(e);
            }
        };

        let mut sink = lock_sink(&ctx.sink)?;
        sink.close_output()?;
        let tally = sink.take_tally();

        match end.stopped {
            Some(Stop::Cancelled) => summary.cancelled = true,
            Some(Stop::Limit) => summary.limit_reached = true,
            Some(Stop::Aborted) => bail!("scan aborted after a fatal error"),
            None => {}
        }
        if let Some(name) = &seg.name {
            if end.stopped.is_none() && end.walk_errors == 0 {
                sink.store_mut().mark_subtree_finished(name, now_secs())?;
                info!("Subtree {name} finished ({} rows)", tally.processed);
            } else if end.walk_errors > 0 {
                warn!(
                    "Subtree {name}: {} unreadable director(ies); not marked finished",
                    end.walk_errors
                );
            }
            summary.subtrees.push((name.clone(), tally.clone()));
        }
        drop(sink);
        summary.total.merge(&tally);
        if summary.cancelled || summary.limit_reached {
            break;
        }
    }

    let sink = Arc::try_unwrap(ctx.sink)
        .map_err(|_| anyhow!("output sink still shared at shutdown"))?
        .into_inner()
        .map_err(|_| anyhow!("output sink lock poisoned"))?;
    sink.finish()?.close()?;

    summary.elapsed = start.elapsed();
    Ok(summary)
}
