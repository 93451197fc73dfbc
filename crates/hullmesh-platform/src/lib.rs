//! # Hullmesh Platform
//!
//! Platform layer for the hullmesh mesh pipeline.
//!
//! This crate provides the OS-facing primitives the pipeline runs on:
//! - **Threading**: Named background threads with checked joins
//! - **Timers**: Restartable debounce timers and high-resolution timing

pub mod threading;
pub mod timer;

pub use threading::Thread;
pub use timer::{Debounce, HighResTimer, ScopedTimer};

use thiserror::Error;

/// Platform-specific errors
#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Thread spawn failed for '{name}': {source}")]
    ThreadSpawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Thread '{0}' panicked")]
    ThreadPanicked(String),
}

/// Result type for platform operations
pub type PlatformResult<T> = Result<T, PlatformError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PlatformError::ThreadPanicked("lod-worker".into());
        assert_eq!(err.to_string(), "Thread 'lod-worker' panicked");

        let err = PlatformError::ThreadSpawn {
            name: "lod-worker".into(),
            source: std::io::Error::other("no threads left"),
        };
        assert!(err.to_string().contains("no threads left"));
    }
}
