//! Byte-level PDF probe. Streams the file in fixed blocks, counting page objects and looking for
//! font resources or text-showing operators among the first pages. No decompression: a heuristic, not a parser.

use anyhow::{Result, bail};
use memchr::memmem;
use std::fs::File;
use std::io::{ErrorKind, Read};

use super::Classifier;

const BLOCK_SIZE: usize = 1024 * 1024;
/// The header may be preceded by junk; readers accept it within the first KiB.
const HEADER_WINDOW: usize = 1024;
const HEADER: &[u8] = b"%PDF-";

#[derive(Clone, Copy, PartialEq, Eq)]
enum Marker {
    Page,
    Text,
    Encrypt,
}

const MARKERS: &[(&[u8], Marker)] = &[
    (b"/Type/Page", Marker::Page),
    (b"/Type /Page", Marker::Page),
    (b"/Font", Marker::Text),
    (b") Tj", Marker::Text),
    (b"] TJ", Marker::Text),
    (b"/Encrypt", Marker::Encrypt),
];

#[derive(Clone, Debug, Default)]
pub struct PdfMarkerProbe;

impl PdfMarkerProbe {
    pub fn new() -> Self {
        Self
    }
}

struct ScanState {
    page_limit: usize,
    pages: usize,
    text_seen: bool,
    encrypted: bool,
}

impl ScanState {
    /// Process every marker that became complete in `window` (one byte of lookahead needed),
    /// skipping those already complete inside the first `carried` bytes.
    fn feed(&mut self, window: &[u8], carried: usize, eof: bool) {
        let mut events: Vec<(usize, Marker)> = Vec::new();
        for (pattern, marker) in MARKERS {
            let span = pattern.len() + 1;
            for pos in memmem::find_iter(window, pattern) {
                let complete_now = eof || pos + span <= window.len();
                let complete_before = pos + span <= carried;
                if !complete_now || complete_before {
                    continue;
                }
                // `/Type/Pages` is the page tree node, not a page.
                if *marker == Marker::Page && window.get(pos + pattern.len()) == Some(&b's') {
                    continue;
                }
                events.push((pos, *marker));
            }
        }
        events.sort_by_key(|(pos, _)| *pos);
        for (_, marker) in events {
            match marker {
                Marker::Page => self.pages += 1,
                Marker::Text if self.pages <= self.page_limit => self.text_seen = true,
                Marker::Text => {}
                Marker::Encrypt => self.encrypted = true,
            }
        }
    }
}

fn read_block(file: &mut File, buf: &mut [u8]) -> std::io::Result<usize> {
    loop {
        match file.read(buf) {
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

impl Classifier for PdfMarkerProbe {
    fn has_text(&self, file: &mut File, page_limit: usize) -> Result<bool> {
        let carry_len = MARKERS.iter().map(|(p, _)| p.len()).max().unwrap_or(0);
        let mut state = ScanState {
            page_limit,
            pages: 0,
            text_seen: false,
            encrypted: false,
        };
        let mut block = vec![0u8; BLOCK_SIZE];
        let mut window: Vec<u8> = Vec::with_capacity(BLOCK_SIZE + carry_len);
        let mut carried = 0_usize;
        let mut first = true;

        loop {
            let n = read_block(file, &mut block)?;
            let eof = n == 0;
            window.extend_from_slice(&block[..n]);
            if first {
                let head = &window[..window.len().min(HEADER_WINDOW)];
                if memmem::find(head, HEADER).is_none() {
                    bail!("not a PDF (missing %PDF- header)");
                }
                first = false;
            }
            state.feed(&window, carried, eof);
            if eof {
                break;
            }
            let keep = window.len().min(carry_len);
            window.drain(..window.len() - keep);
            carried = keep;
        }

        if state.encrypted {
            bail!("encrypted document");
        }
        Ok(state.text_seen)
    }
}
