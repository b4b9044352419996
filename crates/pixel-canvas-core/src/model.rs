//! Canvas Data Model
//!
//! This module defines the data model for the pixel canvas: the color
//! representation, the pixel event (the atomic write unit), the materialized
//! canvas cell, user records, and the pending broadcast update.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Canvas width in cells. Coordinates are `[0, CANVAS_WIDTH - 1]`.
pub const CANVAS_WIDTH: u16 = 5000;
/// Canvas height in cells. Coordinates are `[0, CANVAS_HEIGHT - 1]`.
pub const CANVAS_HEIGHT: u16 = 5000;

/// An RGB color, parsed once from `#RRGGBB` at ingress and carried as three
/// bytes internally. Stringified only when emitting JSON, per the
/// "parse once, carry bytes" design note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    /// Red channel
    pub r: u8,
    /// Green channel
    pub g: u8,
    /// Blue channel
    pub b: u8,
}

impl Color {
    /// Parse a `#RRGGBB` string (case-insensitive). Fails unless the input is
    /// exactly `#` followed by 6 hex digits.
    pub fn parse(s: &str) -> Result<Self> {
        let bytes = s.as_bytes();
        if bytes.len() != 7 || bytes[0] != b'#' || !s[1..].bytes().all(|b| b.is_ascii_hexdigit())
        {
            return Err(Error::validation(format!("invalid color: {s}")));
        }
        let r = u8::from_str_radix(&s[1..3], 16).map_err(|_| Error::validation("invalid color"))?;
        let g = u8::from_str_radix(&s[3..5], 16).map_err(|_| Error::validation("invalid color"))?;
        let b = u8::from_str_radix(&s[5..7], 16).map_err(|_| Error::validation("invalid color"))?;
        Ok(Self { r, g, b })
    }

    /// Build directly from bytes (e.g. decoding the binary snapshot format).
    #[must_use]
    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl TryFrom<String> for Color {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Color> for String {
    fn from(c: Color) -> Self {
        c.to_string()
    }
}

/// Validate that a coordinate is within the canvas bounds.
pub fn validate_coord(x: i64, y: i64) -> Result<(u16, u16)> {
    if x < 0 || x >= i64::from(CANVAS_WIDTH) || y < 0 || y >= i64::from(CANVAS_HEIGHT) {
        return Err(Error::validation(format!(
            "coordinate ({x}, {y}) out of range [0, {}]x[0, {}]",
            CANVAS_WIDTH - 1,
            CANVAS_HEIGHT - 1
        )));
    }
    Ok((x as u16, y as u16))
}

/// The atomic write unit: one pixel draw, recorded once in the Event Store
/// and never mutated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelEvent {
    /// X coordinate, `[0, 4999]`
    pub x: u16,
    /// Y coordinate, `[0, 4999]`
    pub y: u16,
    /// Normalized (upper-case) `#RRGGBB` color
    pub color: Color,
    /// Opaque session/user identifier that authored the draw
    pub user_id: String,
    /// Wall-clock timestamp at append
    pub timestamp: DateTime<Utc>,
    /// Event Store insertion-order sequence number; the tie-break for
    /// last-write-wins when two events share a timestamp.
    #[serde(default)]
    pub seq: i64,
}

impl PixelEvent {
    /// Construct a new pixel event with the current time and `seq = 0`
    /// (the Event Store assigns the real sequence number on append).
    #[must_use]
    pub fn new(x: u16, y: u16, color: Color, user_id: impl Into<String>) -> Self {
        Self {
            x,
            y,
            color,
            user_id: user_id.into(),
            timestamp: Utc::now(),
            seq: 0,
        }
    }

    /// Whether `self` should win over `other` for the same coordinate:
    /// greater timestamp, or equal timestamp and greater insertion order.
    #[must_use]
    pub fn supersedes(&self, other: &PixelEvent) -> bool {
        (self.timestamp, self.seq) > (other.timestamp, other.seq)
    }
}

/// A record in the broadcast queue, a cheaper echo of `PixelEvent` that
/// drops the Event Store's internal sequence number before it ever reaches
/// a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingUpdate {
    /// X coordinate
    pub x: u16,
    /// Y coordinate
    pub y: u16,
    /// Color
    pub color: Color,
    /// Author
    pub user_id: String,
}

impl From<&PixelEvent> for PendingUpdate {
    fn from(ev: &PixelEvent) -> Self {
        Self {
            x: ev.x,
            y: ev.y,
            color: ev.color,
            user_id: ev.user_id.clone(),
        }
    }
}

/// A user record: `{ userId unique, nickname, color, createdAt }`.
/// Immutable after creation except through explicit replacement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Unique user identifier
    pub user_id: String,
    /// Display nickname, at most 50 characters
    pub nickname: String,
    /// User's drawing color
    pub color: Color,
    /// When the user record was created
    pub created_at: DateTime<Utc>,
}

/// Maximum nickname length in characters.
pub const MAX_NICKNAME_LEN: usize = 50;

impl UserRecord {
    /// Validate the invariants a `UserRecord` must satisfy before insertion.
    pub fn validate(&self) -> Result<()> {
        if self.nickname.chars().count() > MAX_NICKNAME_LEN {
            return Err(Error::validation(format!(
                "nickname exceeds {MAX_NICKNAME_LEN} characters"
            )));
        }
        if self.user_id.is_empty() {
            return Err(Error::validation("user_id must not be empty"));
        }
        Ok(())
    }
}
