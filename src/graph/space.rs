//! Conversion between normalized canvas positions and simulation space.
//!
//! The simulation integrates in pixel units centred on the origin, so its
//! force constants (charge, link distance) mean the same thing on any canvas.

use super::types::{CanvasDimensions, Position};
use egui::{Pos2, Vec2};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutSpace {
    extent: Vec2,
}

impl LayoutSpace {
    /// Space spanning the measured canvas, or `fallback` pixels square before measurement
    pub fn new(dimensions: Option<CanvasDimensions>, fallback: f32) -> Self {
        let extent = match dimensions.filter(CanvasDimensions::is_measured) {
            Some(dims) => Vec2::new(dims.width, dims.height),
            None => Vec2::splat(fallback.max(1.0)),
        };
        Self { extent }
    }

    pub fn extent(&self) -> Vec2 {
        self.extent
    }

    pub fn to_simulation(&self, position: Position) -> Pos2 {
        Pos2::new(
            (position.x - 0.5) * self.extent.x,
            (position.y - 0.5) * self.extent.y,
        )
    }

    pub fn to_normalized(&self, point: Pos2) -> Position {
        Position::new(
            point.x / self.extent.x + 0.5,
            point.y / self.extent.y + 0.5,
        )
    }
}
