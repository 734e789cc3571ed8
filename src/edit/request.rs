//! Edit request schema.
//!
//! Two body shapes are accepted:
//!
//! ```json
//! {"text": "hi", "x": 5, "y": 5}
//! ```
//!
//! ```json
//! {"actions": [
//!     {"type": "text", "text": "hi", "x": 5, "y": 5},
//!     {"type": "draw", "points": [{"x": 0, "y": 0}], "color": "#ff0000"}
//! ]}
//! ```
//!
//! The wire form is deserialized into loosely typed raw structs and then
//! validated into an [`EditRequest`], so a body matching neither shape (or
//! both) is rejected up front instead of half-applied.

use std::fmt;

use image::Rgba;
use serde::de::{self, Deserializer, Visitor};
use serde::Deserialize;

use super::color::{parse_color, DEFAULT_DRAW_COLOR};
use crate::error::EditError;

/// Message returned when a body matches neither accepted shape.
pub const MISSING_FIELDS_MESSAGE: &str =
    "Missing \"actions\" array in body, or legacy \"text\", \"x\", \"y\" fields.";

// =============================================================================
// Validated Types
// =============================================================================

/// Render `text` with its top-left corner at (`x`, `y`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextOp {
    pub text: String,
    pub x: i64,
    pub y: i64,
}

/// A draw point. Points missing either coordinate are skipped when drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: Option<i64>,
    pub y: Option<i64>,
}

impl Point {
    pub fn new(x: i64, y: i64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
        }
    }

    /// Both coordinates, if present.
    pub fn coords(&self) -> Option<(i64, i64)> {
        Some((self.x?, self.y?))
    }
}

/// Set each point to `color`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawOp {
    pub points: Vec<Point>,
    pub color: Rgba<u8>,
}

/// A single edit operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOp {
    Text(TextOp),
    Draw(DrawOp),
}

/// A validated edit request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditRequest {
    /// Legacy `{text, x, y}` body
    Single(TextOp),

    /// `{actions: [...]}` body, applied in order
    Batch(Vec<EditOp>),
}

impl EditRequest {
    /// Parse and validate a JSON request body.
    ///
    /// An empty body is treated as `{}`.
    pub fn from_json(body: &[u8]) -> Result<Self, EditError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(EditError::invalid(MISSING_FIELDS_MESSAGE));
        }

        let raw: RawEditRequest = serde_json::from_slice(body)
            .map_err(|e| EditError::invalid(format!("Invalid edit request body: {}", e)))?;

        raw.validate()
    }

    /// Operations in application order.
    pub fn into_ops(self) -> Vec<EditOp> {
        match self {
            EditRequest::Single(op) => vec![EditOp::Text(op)],
            EditRequest::Batch(ops) => ops,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            EditRequest::Single(_) => 1,
            EditRequest::Batch(ops) => ops.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =============================================================================
// Coordinates
// =============================================================================

/// A pixel coordinate as sent by clients.
///
/// Accepts JSON integers, finite floats (truncated toward zero), and strings
/// with a leading decimal integer (`"12"`, `" -3"`, `"12px"`). Anything that
/// does not yield a number is a deserialization error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Coordinate(i64);

impl<'de> Deserialize<'de> for Coordinate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(CoordinateVisitor)
    }
}

struct CoordinateVisitor;

impl Visitor<'_> for CoordinateVisitor {
    type Value = Coordinate;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an integer coordinate or a string starting with one")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Ok(Coordinate(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        i64::try_from(v)
            .map(Coordinate)
            .map_err(|_| E::custom(format!("coordinate {} is out of range", v)))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        if !v.is_finite() || v.abs() >= i64::MAX as f64 {
            return Err(E::custom(format!("coordinate {} is not a usable number", v)));
        }
        Ok(Coordinate(v.trunc() as i64))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        parse_leading_int(v)
            .map(Coordinate)
            .ok_or_else(|| E::custom(format!("coordinate {:?} is not a number", v)))
    }
}

/// Parse an optional sign followed by decimal digits, ignoring leading
/// whitespace and anything after the digits.
fn parse_leading_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (negative, rest) = match s.as_bytes().first()? {
        b'-' => (true, &s[1..]),
        b'+' => (false, &s[1..]),
        _ => (false, s),
    };

    let digits_len = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits_len == 0 {
        return None;
    }

    let magnitude: i64 = rest[..digits_len].parse().ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct RawEditRequest {
    text: Option<String>,
    x: Option<Coordinate>,
    y: Option<Coordinate>,
    actions: Option<Vec<RawAction>>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum RawAction {
    Text {
        text: Option<String>,
        x: Option<Coordinate>,
        y: Option<Coordinate>,
    },
    Draw {
        points: Option<Vec<RawPoint>>,
        color: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
struct RawPoint {
    x: Option<Coordinate>,
    y: Option<Coordinate>,
}

impl RawEditRequest {
    fn validate(self) -> Result<EditRequest, EditError> {
        let has_legacy = self.text.is_some() || self.x.is_some() || self.y.is_some();

        match self.actions {
            Some(_) if has_legacy => Err(EditError::invalid(
                "Body must contain either \"actions\" or legacy \"text\", \"x\", \"y\" fields, not both.",
            )),
            Some(actions) => {
                if actions.is_empty() {
                    return Err(EditError::invalid("\"actions\" must not be empty."));
                }
                actions
                    .into_iter()
                    .enumerate()
                    .map(|(index, action)| action.validate(index))
                    .collect::<Result<Vec<_>, _>>()
                    .map(EditRequest::Batch)
            }
            None => match (self.text, self.x, self.y) {
                (Some(text), Some(x), Some(y)) if !text.is_empty() => Ok(EditRequest::Single(TextOp {
                    text,
                    x: x.0,
                    y: y.0,
                })),
                _ => Err(EditError::invalid(MISSING_FIELDS_MESSAGE)),
            },
        }
    }
}

impl RawAction {
    fn validate(self, index: usize) -> Result<EditOp, EditError> {
        match self {
            RawAction::Text { text, x, y } => match (text, x, y) {
                (Some(text), Some(x), Some(y)) if !text.is_empty() => Ok(EditOp::Text(TextOp {
                    text,
                    x: x.0,
                    y: y.0,
                })),
                _ => Err(EditError::invalid(format!(
                    "Action {}: text actions require \"text\", \"x\" and \"y\".",
                    index
                ))),
            },
            RawAction::Draw { points, color } => {
                let points = points.ok_or_else(|| {
                    EditError::invalid(format!(
                        "Action {}: draw actions require a \"points\" array.",
                        index
                    ))
                })?;
                let color = parse_color(color.as_deref().unwrap_or(DEFAULT_DRAW_COLOR))?;

                Ok(EditOp::Draw(DrawOp {
                    points: points
                        .into_iter()
                        .map(|p| Point {
                            x: p.x.map(|c| c.0),
                            y: p.y.map(|c| c.0),
                        })
                        .collect(),
                    color,
                }))
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
