//! CSS color strings for draw operations.

use image::Rgba;

use crate::error::EditError;

/// Color used by draw operations that do not name one.
pub const DEFAULT_DRAW_COLOR: &str = "#000000";

/// Resolve a CSS color (`#f00`, `#ff000080`, `rgb(255, 0, 0)`, `red`, ...)
/// to an RGBA pixel.
pub fn parse_color(input: &str) -> Result<Rgba<u8>, EditError> {
    let color = csscolorparser::parse(input.trim())
        .map_err(|e| EditError::invalid(format!("Invalid color {:?}: {}", input, e)))?;
    Ok(Rgba(color.to_rgba8()))
}
