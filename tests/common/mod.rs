//! Shared fixtures for integration tests.

#![allow(dead_code)]

use ledgerscan::{Classifier, Opts};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Decides from content markers: `TEXT` → has text, `CORRUPT` → error, `PANIC` → panics,
/// anything else → image only.
pub struct FakeClassifier;

impl Classifier for FakeClassifier {
    fn has_text(&self, file: &mut File, _page_limit: usize) -> anyhow::Result<bool> {
        let mut s = String::new();
        file.read_to_string(&mut s)?;
        if s.contains("CORRUPT") {
            anyhow::bail!("corrupt document");
        }
        if s.contains("PANIC") {
            panic!("classifier blew up");
        }
        Ok(s.contains("TEXT"))
    }
}

pub fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

/// root/
///   alpha/ a.txt, bad.pdf (corrupt), doc1.pdf (text), doc2.pdf (image)
///   beta/  b.txt, sub/c.txt
///   top.txt
pub fn build_tree(root: &Path) {
    write_file(&root.join("alpha/a.txt"), "plain notes");
    write_file(&root.join("alpha/bad.pdf"), "CORRUPT");
    write_file(&root.join("alpha/doc1.pdf"), "TEXT on page one");
    write_file(&root.join("alpha/doc2.pdf"), "scanned pixels");
    write_file(&root.join("beta/b.txt"), "bravo");
    write_file(&root.join("beta/sub/c.txt"), "charlie");
    write_file(&root.join("top.txt"), "root level");
}

/// Options rooted in `tmp`: tree under `tmp/root`, outputs under `tmp/out`, state in `tmp`.
pub fn test_opts(tmp: &Path) -> Opts {
    Opts {
        root: tmp.join("root"),
        out: tmp.join("out").join("inv.csv"),
        state_db: tmp.join("state.sqlite"),
        workers: 2,
        write_base_delay: Duration::from_millis(1),
        ..Default::default()
    }
}

pub fn out_file(tmp: &Path, subtree: &str) -> PathBuf {
    tmp.join("out").join(format!("inv_{subtree}.csv"))
}

/// Header and records of a CSV output.
pub fn read_csv(path: &Path) -> (Vec<String>, Vec<csv::StringRecord>) {
    let mut rdr = csv::Reader::from_path(path).unwrap();
    let headers = rdr.headers().unwrap().iter().map(String::from).collect();
    let records = rdr.records().map(|r| r.unwrap()).collect();
    (headers, records)
}

/// Value of `column` in `record`, looked up by header name.
pub fn field<'a>(headers: &[String], record: &'a csv::StringRecord, column: &str) -> &'a str {
    let idx = headers.iter().position(|h| h == column).unwrap();
    record.get(idx).unwrap()
}

/// The record whose `relative_path` is `rel`.
pub fn row_for<'a>(
    headers: &[String],
    records: &'a [csv::StringRecord],
    rel: &str,
) -> &'a csv::StringRecord {
    records
        .iter()
        .find(|r| field(headers, r, "relative_path") == rel)
        .unwrap_or_else(|| panic!("no row for {rel}"))
}
