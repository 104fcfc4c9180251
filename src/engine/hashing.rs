//! File hashing utilities

use blake3::Hasher;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Hash a file with blake3, reading `block_size` bytes at a time so memory stays bounded.
/// A read failure mid-stream aborts the digest; the caller tags and records it.
pub fn hash_file(path: &Path, block_size: usize) -> io::Result<blake3::Hash> {
    let file = File::open(path)?;
    hash_reader(file, block_size)
}

/// Streaming digest over any reader (same block discipline as [`hash_file`]).
pub fn hash_reader<R: Read>(mut reader: R, block_size: usize) -> io::Result<blake3::Hash> {
    let mut hasher = Hasher::new();
    let mut buffer = vec![0u8; block_size.max(1)];
    loop {
        let n = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buffer[..n]);
    }
    Ok(hasher.finalize())
}

/// Hex digest for the output row.
pub fn digest_hex(hash: &blake3::Hash) -> String {
    hash.to_hex().to_string()
}
