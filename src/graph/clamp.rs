//! Canvas boundary clamping.
//!
//! Keeps a node's rendered circle fully inside the canvas: a position is
//! pulled in by `(node_radius + padding)` pixels from every edge, expressed in
//! normalized units per axis.

use super::types::{CanvasDimensions, Position};

/// Largest margin per axis; beyond this the bounds would invert
pub const MAX_MARGIN: f32 = 0.5;

/// Normalized margin on each axis
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Margin {
    pub x: f32,
    pub y: f32,
}

impl Margin {
    pub const NONE: Margin = Margin { x: 0.0, y: 0.0 };

    /// Margin for a canvas of the given size, or no margin before measurement
    pub fn for_canvas(dimensions: Option<CanvasDimensions>, node_radius: f32, padding: f32) -> Self {
        let Some(dims) = dimensions.filter(CanvasDimensions::is_measured) else {
            return Self::NONE;
        };
        let inset = (node_radius + padding).max(0.0);
        Self {
            x: (inset / dims.width).min(MAX_MARGIN),
            y: (inset / dims.height).min(MAX_MARGIN),
        }
    }

    /// Clamp a position into `[margin, 1 - margin]` on both axes
    pub fn apply(&self, position: Position) -> Position {
        Position {
            x: clamp_axis(position.x, self.x),
            y: clamp_axis(position.y, self.y),
        }
    }
}

fn clamp_axis(value: f32, margin: f32) -> f32 {
    if !value.is_finite() {
        return 0.5;
    }
    value.clamp(margin, 1.0 - margin)
}

/// Clamp `position` so a node of `node_radius` plus `padding` stays on canvas.
///
/// With unknown or zero dimensions this is a plain `[0, 1]` clamp.
pub fn clamp(
    position: Position,
    dimensions: Option<CanvasDimensions>,
    node_radius: f32,
    padding: f32,
) -> Position {
    Margin::for_canvas(dimensions, node_radius, padding).apply(position)
}
