//! Classification capability: decides whether a document carries extractable text.
//!
//! The pipeline only depends on the [`Classifier`] trait. [`PdfMarkerProbe`] is the built-in
//! implementation; callers can inject any other (a real document library, or a fake in tests).

mod pdf_probe;

pub use pdf_probe::PdfMarkerProbe;

use anyhow::Result;
use std::fs::File;

pub trait Classifier: Send + Sync {
    /// Whether extractable text appears within the first `page_limit` pages.
    /// `Err` explains why it could not be determined (encrypted, corrupt, unsupported).
    fn has_text(&self, file: &mut File, page_limit: usize) -> Result<bool>;

    /// Drop any internal caches. Called by the periodic memory reclamation pass.
    fn release_caches(&self) {}
}
