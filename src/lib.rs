//! Archive Transfer Library
//!
//! Moves archival objects from a Dropbox intake folder into a fixed folder layout on a
//! NAS. Every object is verified against the Dropbox content hash, gets a SHA-256
//! manifest next to it, and carries a copy of its submission's metadata file.

pub mod app;
pub mod auth;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};
