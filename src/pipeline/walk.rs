//! Deterministic traversal of one segment (a subtree or the whole root).

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// One result from a directory walk: a file to consider or an error with optional path.
pub enum WalkOutcome {
    File(PathBuf),
    Err { msg: String, path: Option<PathBuf> },
}

/// Convert a walkdir result into [`WalkOutcome`]. Directories yield `None`. A symlink is
/// yielded as a file unless it resolves to a directory, which is logged and not followed; a
/// dangling link is yielded too so its failed stat ends up in a row.
pub fn to_outcome_walkdir(r: Result<walkdir::DirEntry, walkdir::Error>) -> Option<WalkOutcome> {
    match r {
        Ok(entry) => {
            let ft = entry.file_type();
            if ft.is_file() {
                return Some(WalkOutcome::File(entry.into_path()));
            }
            if !ft.is_symlink() {
                return None;
            }
            match std::fs::metadata(entry.path()) {
                Ok(target) if target.is_dir() => {
                    log::info!(
                        "{}: link to a directory, not followed",
                        entry.path().display()
                    );
                    None
                }
                _ => Some(WalkOutcome::File(entry.into_path())),
            }
        }
        Err(err) => Some(WalkOutcome::Err {
            msg: format!("{}", err),
            path: err.path().map(PathBuf::from),
        }),
    }
}

/// Files under `dir` in name order, depth first. Directories named in `exclude_dirs`
/// are pruned at any depth. Links to files are yielded; links to directories are not followed.
pub fn walk_files(dir: &Path, exclude_dirs: &HashSet<String>) -> impl Iterator<Item = WalkOutcome> {
    let exclude = exclude_dirs.clone();
    WalkDir::new(dir)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(move |e| {
            e.depth() == 0
                || !e.file_type().is_dir()
                || !exclude.contains(e.file_name().to_string_lossy().as_ref())
        })
        .filter_map(to_outcome_walkdir)
}

/// First-level directories of `root`, sorted, minus excluded names. Root-level files are
/// returned separately so the caller can report them. Entries whose names are not valid
/// Unicode are logged and left out.
pub fn first_level_dirs(
    root: &Path,
    exclude_dirs: &HashSet<String>,
) -> anyhow::Result<(Vec<String>, Vec<String>)> {
    use anyhow::Context;

    let mut dirs = Vec::new();
    let mut files = Vec::new();
    for entry in std::fs::read_dir(root).with_context(|| format!("read root {}", root.display()))? {
        let entry = entry.with_context(|| format!("read root {}", root.display()))?;
        let name = match entry.file_name().into_string() {
            Ok(name) => name,
            Err(_) => {
                log::warn!(
                    "{}: name is not valid Unicode; not inventoried",
                    entry.path().display()
                );
                continue;
            }
        };
        let ft = match entry.file_type() {
            Ok(ft) => ft,
            Err(e) => {
                log::warn!("{}: {e}", entry.path().display());
                continue;
            }
        };
        if ft.is_dir() {
            if !exclude_dirs.contains(&name) {
                dirs.push(name);
            }
        } else if ft.is_file() {
            files.push(name);
        }
    }
    dirs.sort();
    files.sort();
    Ok((dirs, files))
}
