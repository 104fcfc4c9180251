//! Classification: failure containment around the capability, and the built-in PDF probe.

mod common;

use common::{FakeClassifier, read_csv};
use ledgerscan::engine::FingerprintStore;
use ledgerscan::pipeline::{ClassifierPool, PendingRow, Sink, classify_file};
use ledgerscan::utils::WorkerLimits;
use ledgerscan::{Classification, Classifier, FileTask, Opts, PdfMarkerProbe};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

fn fixture(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_three_outcomes() {
    let dir = tempfile::tempdir().unwrap();
    let text = fixture(dir.path(), "t.pdf", b"TEXT");
    let image = fixture(dir.path(), "i.pdf", b"pixels");
    let corrupt = fixture(dir.path(), "c.pdf", b"CORRUPT");

    let r = classify_file(&FakeClassifier, &text, 5);
    assert_eq!(r.kind, Classification::HasText);
    assert_eq!(r.error, None);

    let r = classify_file(&FakeClassifier, &image, 5);
    assert_eq!(r.kind, Classification::ImageOnly);
    assert_eq!(r.error, None);

    let r = classify_file(&FakeClassifier, &corrupt, 5);
    assert_eq!(r.kind, Classification::Unresolved);
    assert!(r.error.unwrap().contains("corrupt"));
}

#[test]
fn test_panic_becomes_unresolved() {
    let dir = tempfile::tempdir().unwrap();
    let path = fixture(dir.path(), "p.pdf", b"PANIC");
    let r = classify_file(&FakeClassifier, &path, 5);
    assert_eq!(r.kind, Classification::Unresolved);
    let msg = r.error.unwrap();
    assert!(msg.contains("panicked"), "{msg}");
    assert!(msg.contains("classifier blew up"), "{msg}");
}

#[test]
fn test_unopenable_file_is_unresolved() {
    let dir = tempfile::tempdir().unwrap();
    let r = classify_file(&FakeClassifier, &dir.path().join("missing.pdf"), 5);
    assert_eq!(r.kind, Classification::Unresolved);
    assert!(r.error.unwrap().starts_with("open failed"));
}

struct RecordingClassifier {
    seen_limit: AtomicUsize,
}

impl Classifier for RecordingClassifier {
    fn has_text(&self, _file: &mut File, page_limit: usize) -> anyhow::Result<bool> {
        self.seen_limit.store(page_limit, Ordering::SeqCst);
        Ok(true)
    }
}

#[test]
fn test_page_limit_passed_through() {
    let dir = tempfile::tempdir().unwrap();
    let path = fixture(dir.path(), "x.pdf", b"");
    let c = RecordingClassifier {
        seen_limit: AtomicUsize::new(0),
    };
    classify_file(&c, &path, 3);
    assert_eq!(c.seen_limit.load(Ordering::SeqCst), 3);
}

/// Holds every call until the gate opens.
struct GatedClassifier {
    open: AtomicBool,
    calls: AtomicUsize,
}

impl Classifier for GatedClassifier {
    fn has_text(&self, _file: &mut File, _page_limit: usize) -> anyhow::Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        while !self.open.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(5));
        }
        Ok(false)
    }
}

#[test]
fn test_submit_blocks_while_queue_full() {
    let dir = tempfile::tempdir().unwrap();
    let doc = fixture(dir.path(), "doc.pdf", b"pixels");
    let out = dir.path().join("inv.csv");
    let gate = Arc::new(GatedClassifier {
        open: AtomicBool::new(false),
        calls: AtomicUsize::new(0),
    });

    let opts = Opts {
        checkpoint_every: 0,
        reclaim_every: 0,
        ..Default::default()
    };
    let mut sink = Sink::new(
        FingerprintStore::open_in_memory().unwrap(),
        gate.clone(),
        &opts,
        None,
    );
    sink.open_output(&out, true).unwrap();
    let sink = sink.shared();
    let pool = ClassifierPool::start(
        1,
        gate.clone(),
        5,
        Arc::clone(&sink),
        Arc::new(Mutex::new(None)),
        Arc::new(AtomicBool::new(false)),
    );

    let capacity = WorkerLimits::QUEUE_PER_WORKER;
    let total = capacity + 3;
    let submitted = AtomicUsize::new(0);
    let mut accepted_while_blocked = 0;
    thread::scope(|s| {
        s.spawn(|| {
            for i in 0..total {
                let task = FileTask {
                    key: doc.to_str().unwrap().to_string(),
                    rel_path: format!("alpha/doc{i}.pdf"),
                    name: format!("doc{i}"),
                    extension: "pdf".to_string(),
                    size: 6,
                    mtime_ns: 0,
                    subtree: Some("alpha".to_string()),
                };
                pool.submit(PendingRow::new(task)).unwrap();
                submitted.fetch_add(1, Ordering::SeqCst);
            }
        });
        while gate.calls.load(Ordering::SeqCst) == 0 {
            thread::sleep(Duration::from_millis(5));
        }
        thread::sleep(Duration::from_millis(200));
        accepted_while_blocked = submitted.load(Ordering::SeqCst);
        gate.open.store(true, Ordering::SeqCst);
    });
    pool.finish().unwrap();

    // One file in the worker's hands, the rest of the queue full, the submitter waiting.
    assert_eq!(accepted_while_blocked, capacity + 1);
    let (_, records) = read_csv(&out);
    assert_eq!(records.len(), total);
}

fn probe(content: &[u8], page_limit: usize) -> anyhow::Result<bool> {
    let dir = tempfile::tempdir().unwrap();
    let path = fixture(dir.path(), "doc.pdf", content);
    let mut file = File::open(&path).unwrap();
    PdfMarkerProbe::new().has_text(&mut file, page_limit)
}

#[test]
fn test_probe_text_page() {
    let pdf = b"%PDF-1.4\n1 0 obj << /Type /Page /Resources << /Font << /F1 2 0 R >> >> >> endobj\n%%EOF";
    assert!(probe(pdf, 5).unwrap());
}

#[test]
fn test_probe_text_operator() {
    let pdf = b"%PDF-1.4\n<< /Type/Page >>\nstream\nBT (Hello) Tj ET\nendstream\n%%EOF";
    assert!(probe(pdf, 5).unwrap());
}

#[test]
fn test_probe_image_page() {
    let pdf = b"%PDF-1.4\n<< /Type /Page /Resources << /XObject << /Im0 3 0 R >> >> >>\n%%EOF";
    assert!(!probe(pdf, 5).unwrap());
}

#[test]
fn test_probe_not_pdf() {
    let err = probe(b"just some text", 5).unwrap_err();
    assert!(err.to_string().contains("not a PDF"));
    assert!(probe(b"", 5).is_err());
}

#[test]
fn test_probe_encrypted() {
    let pdf = b"%PDF-1.7\n<< /Type /Page /Font 1 >>\ntrailer << /Encrypt 5 0 R >>\n%%EOF";
    let err = probe(pdf, 5).unwrap_err();
    assert!(err.to_string().contains("encrypted"));
}

#[test]
fn test_probe_text_beyond_page_limit() {
    let mut pdf = b"%PDF-1.4\n".to_vec();
    for _ in 0..3 {
        pdf.extend_from_slice(b"<< /Type /Page >>\n");
    }
    pdf.extend_from_slice(b"<< /Font 1 >>\n");
    assert!(!probe(&pdf, 2).unwrap());
    assert!(probe(&pdf, 3).unwrap());
}

#[test]
fn test_probe_page_tree_not_counted() {
    let pdf = b"%PDF-1.4\n<< /Type /Pages /Kids [] >>\n<< /Type /Page >>\n<< /Font 1 >>\n";
    assert!(probe(pdf, 1).unwrap());
}

#[test]
fn test_probe_markers_across_block_boundary() {
    const BLOCK: usize = 1024 * 1024;
    let mut pdf = b"%PDF-1.4\n".to_vec();
    // First page marker straddles the first read boundary.
    pdf.resize(BLOCK - 5, b' ');
    pdf.extend_from_slice(b"/Type /Page >>\n<< /Type /Page >>\n<< /Font 1 >>\n");
    // Counted once each: two pages, font within a limit of two.
    assert!(probe(&pdf, 2).unwrap());
    assert!(!probe(&pdf, 1).unwrap());
}
