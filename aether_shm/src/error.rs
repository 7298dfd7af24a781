//! Error types for segment and ring operations

use thiserror::Error;

/// Errors that can occur during segment lifecycle and publish operations.
///
/// `Empty` and `Lapped` consume outcomes are deliberately not here - they
/// are expected control flow, carried by [`crate::ring::Consumed`].
#[derive(Error, Debug)]
pub enum ShmError {
    /// Publish payload exceeds the slot data area.
    #[error("payload too large: {len} bytes exceeds slot capacity {max}")]
    PayloadTooLarge {
        /// Rejected payload length in bytes.
        len: usize,
        /// Slot data capacity in bytes.
        max: usize,
    },

    /// Segment name already exists.
    #[error("segment already exists: {name}")]
    SegmentExists {
        /// Segment name.
        name: String,
    },

    /// Segment name does not exist.
    #[error("segment not found: {name}")]
    NotFound {
        /// Segment name.
        name: String,
    },

    /// Invalid magic value in the segment header - stale or foreign segment.
    #[error("invalid magic on '{name}'")]
    InvalidMagic {
        /// Segment name.
        name: String,
    },

    /// Layout version mismatch - segment written by an incompatible build.
    #[error("version mismatch on '{name}': expected {expected}, got {actual}")]
    VersionMismatch {
        /// Segment name.
        name: String,
        /// Version this build understands.
        expected: u32,
        /// Version found in the header.
        actual: u32,
    },

    /// Mapped size disagrees with the size derived from the header.
    #[error("size mismatch on '{name}': expected {expected} bytes, got {actual}")]
    SizeMismatch {
        /// Segment name.
        name: String,
        /// Size derived from the header capacity.
        expected: usize,
        /// Size of the underlying shm object.
        actual: usize,
    },

    /// Ring capacity outside the accepted range.
    #[error("invalid ring capacity: {capacity} (must be > 0)")]
    InvalidCapacity {
        /// Rejected capacity.
        capacity: u32,
    },

    /// OS-level error from nix/libc calls.
    #[error("OS error on '{name}': {source}")]
    Os {
        /// Segment name.
        name: String,
        /// Underlying errno.
        source: nix::errno::Errno,
    },

    /// IO error (mapping or fd handling).
    #[error("IO error: {source}")]
    Io {
        /// Source IO error.
        #[from]
        source: std::io::Error,
    },
}

/// Result type for segment and ring operations.
pub type ShmResult<T> = Result<T, ShmError>;
