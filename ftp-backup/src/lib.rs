//! FTP Backup Library
//!
//! Archives a fixed set of application directories and database files,
//! keeps a bounded number of archives locally, and ships a combined archive
//! to an FTP server with the same retention applied remotely.

pub mod archive;
pub mod config;
pub mod executor;
pub mod fs;
pub mod retention;
pub mod transfer;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use utils::errors::{BackupError, Result};
