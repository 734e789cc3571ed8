//! Image editing.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        EditService                           │
//! │   lock(filename) → read → spawn_blocking(apply) → replace    │
//! │                                                              │
//! │  ┌──────────────┐  ┌──────────────┐  ┌────────────────────┐  │
//! │  │   request    │  │    engine    │  │   text / color     │  │
//! │  │ (validation) │  │ (decode/enc) │  │ (glyphs, css)      │  │
//! │  └──────────────┘  └──────────────┘  └────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```

mod color;
mod engine;
mod request;
mod service;
mod text;

pub use color::{parse_color, DEFAULT_DRAW_COLOR};
pub use engine::{EditEngine, DEFAULT_JPEG_QUALITY, MAX_JPEG_QUALITY, MIN_JPEG_QUALITY};
pub use request::{DrawOp, EditOp, EditRequest, Point, TextOp, MISSING_FIELDS_MESSAGE};
pub use service::EditService;
pub use text::{draw_text, FONT_SIZE, TEXT_COLOR};
