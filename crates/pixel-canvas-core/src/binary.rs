//! Compact binary snapshot encoding for `GET /api/pixels/binary`
//!
//! Each pixel is a fixed 8-byte little-endian record: `u16 x; u16 y; u8 r;
//! u8 g; u8 b; u8 reserved`. The trailing byte pads the record to an 8-byte
//! boundary; producers set it to zero, consumers must ignore it (its
//! meaning is reserved, per the open question in the design notes).

use crate::model::{Color, PixelEvent};

/// Size in bytes of one encoded pixel record.
pub const RECORD_SIZE: usize = 8;

/// Encode pixel events as fixed 8-byte records, in the order given. Callers
/// are responsible for supplying canonical ascending `(x, y)` order (e.g.
/// from [`crate::cache::CanvasCache::get_all`]).
#[must_use]
pub fn encode(events: &[PixelEvent]) -> Vec<u8> {
    let mut out = Vec::with_capacity(events.len() * RECORD_SIZE);
    for ev in events {
        out.extend_from_slice(&ev.x.to_le_bytes());
        out.extend_from_slice(&ev.y.to_le_bytes());
        out.push(ev.color.r);
        out.push(ev.color.g);
        out.push(ev.color.b);
        out.push(0); // reserved
    }
    out
}

/// One decoded record: coordinate and color, with the reserved byte
/// discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinaryPixel {
    /// X coordinate
    pub x: u16,
    /// Y coordinate
    pub y: u16,
    /// Color
    pub color: Color,
}

/// Decode a byte buffer produced by [`encode`]. Fails if the buffer length
/// is not a multiple of [`RECORD_SIZE`].
pub fn decode(bytes: &[u8]) -> Result<Vec<BinaryPixel>, String> {
    if bytes.len() % RECORD_SIZE != 0 {
        return Err(format!(
            "binary snapshot length {} is not a multiple of {RECORD_SIZE}",
            bytes.len()
        ));
    }
    Ok(bytes
        .chunks_exact(RECORD_SIZE)
        .map(|chunk| BinaryPixel {
            x: u16::from_le_bytes([chunk[0], chunk[1]]),
            y: u16::from_le_bytes([chunk[2], chunk[3]]),
            color: Color::from_rgb(chunk[4], chunk[5], chunk[6]),
        })
        .collect())
}
