//! Scanline-level frame diffing with QOI compression.
//!
//! The host compares each rendered RGBA raster against the previously
//! sent one, finds the span of scanlines that changed, and ships only
//! that sub-raster, losslessly compressed. The wire layout is:
//!
//! ```text
//! [qoi-compressed sub-raster][region trailer: x, y_line, width, h_lines]
//! ```
//!
//! The trailer is always the **last 4 bytes** of the payload, one byte
//! per field. `x` and `width` are always 0 on the wire today (regions
//! span full scanlines and the receiver knows the raster width); they
//! are carried for forward compatibility. `y_line` and `h_lines` are
//! scanline counts, which caps supported rasters at 255 lines — plenty
//! for the 256×240 targets this protocol was built for.
//!
//! Comparison walks in 4-byte pixel units and ignores the alpha byte:
//! the emulated cores render opaque frames, and skipping the fourth
//! byte saves a quarter of the scan work.

use bytes::Bytes;

use crate::error::NetplayError;

/// Bytes per RGBA pixel.
pub const PIXEL_BYTES: usize = 4;

/// Size of the fixed region trailer at the end of each binary frame.
pub const REGION_TRAILER: usize = 4;

// ── FrameRegion ──────────────────────────────────────────────────

/// The rectangular sub-raster a frame payload covers.
///
/// A zero `height_lines` means "nothing changed"; callers must skip
/// sending such frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameRegion {
    /// Left edge in pixels. Always 0 (regions span whole scanlines).
    pub x: u32,
    /// Top edge in scanlines.
    pub y_line: u32,
    /// Width in pixels; 0 means "the full raster width".
    pub width: u32,
    /// Height in scanlines.
    pub height_lines: u32,
}

impl FrameRegion {
    /// A zero-area region ("no change").
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.height_lines == 0
    }
}

// ── EncodedFrame ─────────────────────────────────────────────────

/// A compressed frame diff ready to send as one binary message.
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    /// Compressed sub-raster followed by the region trailer. Empty when
    /// nothing changed.
    pub payload: Bytes,
    /// The region the payload covers.
    pub region: FrameRegion,
}

impl EncodedFrame {
    /// `true` when the diff found no change; such frames must not be sent.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

// ── DecodedFrame ─────────────────────────────────────────────────

/// A reconstructed sub-raster plus the region it belongs at.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    /// Raw RGBA bytes of the changed scanlines.
    pub pixels: Vec<u8>,
    /// Where to composite the pixels in the full raster.
    pub region: FrameRegion,
}

// ── Encoding ─────────────────────────────────────────────────────

/// Find the first differing byte index from either end, stepping in
/// 4-byte pixel units and ignoring the alpha byte.
///
/// Returns the raw byte index of the first differing pixel, `len` when
/// scanning forward over identical buffers, or a negative value when
/// scanning backward over identical buffers. Mismatched lengths are
/// treated as "differs from byte 0 / the last pixel".
fn diff_boundary(previous: &[u8], current: &[u8], from_end: bool) -> i64 {
    let len = current.len() as i64;
    let mut index = if from_end { len - PIXEL_BYTES as i64 } else { 0 };

    if previous.len() == current.len() {
        while index >= 0 && index < len {
            let i = index as usize;
            if previous[i] != current[i]
                || previous[i + 1] != current[i + 1]
                || previous[i + 2] != current[i + 2]
            {
                break;
            }
            if from_end {
                index -= PIXEL_BYTES as i64;
            } else {
                index += PIXEL_BYTES as i64;
            }
        }
    }
    index
}

/// Diff `current` against `previous` and compress the changed span.
///
/// An empty `previous` or `whole_frame = true` encodes the entire
/// raster. Identical rasters produce an empty payload and a zero-area
/// region. The changed span is rounded outward to whole scanlines; a
/// sub-pixel difference absorbed entirely by that rounding is reported
/// as "no change" as well — an intentional bandwidth tradeoff.
pub fn encode_frame_diff(
    previous: &[u8],
    current: &[u8],
    width: u32,
    whole_frame: bool,
) -> Result<EncodedFrame, NetplayError> {
    let line_bytes = width as usize * PIXEL_BYTES;
    if line_bytes == 0 || current.len() % line_bytes != 0 {
        return Err(NetplayError::RasterGeometry {
            len: current.len(),
            line_bytes,
        });
    }
    let total_lines = current.len() / line_bytes;
    if total_lines > u8::MAX as usize {
        return Err(NetplayError::RasterTooTall { lines: total_lines });
    }

    let (start, end) = if whole_frame || previous.is_empty() {
        (0, current.len())
    } else {
        let last = diff_boundary(previous, current, true);
        if last < 0 {
            // Scanned past the front: nothing differs.
            (0, 0)
        } else {
            let first = diff_boundary(previous, current, false);
            let start = first as usize / line_bytes * line_bytes;
            let end = (last as usize / line_bytes + 1) * line_bytes;
            (start, end)
        }
    };

    if end == start {
        return Ok(EncodedFrame {
            payload: Bytes::new(),
            region: FrameRegion::empty(),
        });
    }

    let y_line = (start / line_bytes) as u32;
    let height_lines = ((end - start) / line_bytes) as u32;
    let mut payload = qoi::encode_to_vec(&current[start..end], width, height_lines)?;
    payload.extend_from_slice(&[0, y_line as u8, 0, height_lines as u8]);

    Ok(EncodedFrame {
        payload: payload.into(),
        region: FrameRegion {
            x: 0,
            y_line,
            width: 0,
            height_lines,
        },
    })
}

// ── Decoding ─────────────────────────────────────────────────────

/// Split off the region trailer and decompress the sub-raster.
pub fn decode_frame(payload: &[u8]) -> Result<DecodedFrame, NetplayError> {
    if payload.len() <= REGION_TRAILER {
        return Err(NetplayError::TruncatedFrame { len: payload.len() });
    }
    let (compressed, trailer) = payload.split_at(payload.len() - REGION_TRAILER);

    let (header, pixels) = qoi::decode_to_vec(compressed)?;
    let trailer_lines = trailer[3] as u32;
    if header.height != trailer_lines {
        return Err(NetplayError::RegionMismatch {
            header: header.height,
            trailer: trailer_lines,
        });
    }

    Ok(DecodedFrame {
        pixels,
        region: FrameRegion {
            x: trailer[0] as u32,
            y_line: trailer[1] as u32,
            // A zero width byte means "full raster width"; the codec
            // header knows the real value either way.
            width: header.width,
            height_lines: trailer_lines,
        },
    })
}

/// Paste a decoded sub-raster into a retained full raster.
///
/// `width` is the full raster width in pixels; the target buffer must
/// hold at least `region.y_line + region.height_lines` scanlines.
pub fn composite(target: &mut [u8], frame: &DecodedFrame, width: u32) -> Result<(), NetplayError> {
    let line_bytes = width as usize * PIXEL_BYTES;
    if line_bytes == 0 || target.len() % line_bytes != 0 {
        return Err(NetplayError::RasterGeometry {
            len: target.len(),
            line_bytes,
        });
    }
    let total = (target.len() / line_bytes) as u32;
    let start = frame.region.y_line;
    let end = start + frame.region.height_lines;
    if end > total || frame.pixels.len() != (end - start) as usize * line_bytes {
        return Err(NetplayError::RegionOutOfBounds { start, end, total });
    }

    let offset = start as usize * line_bytes;
    target[offset..offset + frame.pixels.len()].copy_from_slice(&frame.pixels);
    Ok(())
}

// ── Tests ────────────────────────────────────────────────────────
