//! Domain-specific error types for the netplay protocol.
//!
//! All fallible operations return `Result<T, NetplayError>`.
//! No panics on invalid input — every error is typed and recoverable.

use thiserror::Error;

/// The canonical error type for the netplay core.
#[derive(Debug, Error)]
pub enum NetplayError {
    // ── Protocol Errors ──────────────────────────────────────────
    /// A numeric value did not map to any known enum variant.
    #[error("unknown {type_name} discriminant: {value:#x}")]
    UnknownVariant { type_name: &'static str, value: u64 },

    /// A message violated protocol rules (e.g. a payload field missing
    /// for its declared type).
    #[error("protocol violation: {0}")]
    ProtocolViolation(&'static str),

    /// The text envelope could not be parsed or produced.
    #[error("envelope error: {0}")]
    Envelope(#[from] serde_json::Error),

    // ── Frame Codec Errors ───────────────────────────────────────
    /// The pixel codec rejected the data.
    #[error("pixel codec error: {0}")]
    PixelCodec(#[from] qoi::Error),

    /// The raster length is not a whole number of scanlines.
    #[error("bad raster geometry: {len} bytes is not a multiple of {line_bytes}-byte lines")]
    RasterGeometry { len: usize, line_bytes: usize },

    /// The raster has more scanlines than the region header can carry.
    #[error("raster too tall: {lines} lines (max 255)")]
    RasterTooTall { lines: usize },

    /// A binary frame message is shorter than its fixed region trailer.
    #[error("truncated frame payload: {len} bytes")]
    TruncatedFrame { len: usize },

    /// The decoded sub-raster does not match its region header.
    #[error("frame region mismatch: header says {header} lines, trailer says {trailer}")]
    RegionMismatch { header: u32, trailer: u32 },

    /// A decoded region does not fit inside the target raster.
    #[error("frame region out of bounds: lines {start}..{end} in a {total}-line raster")]
    RegionOutOfBounds { start: u32, end: u32, total: u32 },

    // ── Connection Errors ────────────────────────────────────────
    /// An event channel was closed unexpectedly.
    #[error("channel closed")]
    ChannelClosed,

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

// ── Convenient From implementations ──────────────────────────────

impl From<String> for NetplayError {
    fn from(s: String) -> Self {
        NetplayError::Other(s)
    }
}

impl From<&str> for NetplayError {
    fn from(s: &str) -> Self {
        NetplayError::Other(s.to_string())
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for NetplayError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        NetplayError::ChannelClosed
    }
}
