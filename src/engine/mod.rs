//! Engine module: leaf primitives for the scan pipeline

pub mod arg_parser;
pub mod cli;
pub mod db_ops;
pub mod hashing;
pub mod normalize;
pub mod progress;
pub mod tools;

// Re-export commonly used functions
pub use arg_parser::Cli;
pub use cli::handle_run;
pub use db_ops::{FingerprintStore, open_db, open_db_in_memory};
pub use hashing::{digest_hex, hash_file, hash_reader};
pub use normalize::{PathNormalizer, PathStyle, Rejection};
pub use tools::{ExtensionFilter, path_relative_to};
