//! Simulation-side node, link and option types.

use crate::graph::types::NodeId;
use egui::{Pos2, Vec2};
use serde::{Deserialize, Serialize};

/// Alpha the engine resumes at after a non-destructive change
pub const REHEAT_ALPHA: f32 = 0.3;

/// Ephemeral physics state for one node.
///
/// Coordinates are in simulation space (pixels, origin at the canvas
/// centre). A node with non-finite `x`/`y` has not been placed yet; the
/// engine seeds it when the node enters the simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationNode {
    pub id: NodeId,
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub vx: f32,
    #[serde(default)]
    pub vy: f32,
    /// Pinned nodes keep their position and ignore forces
    #[serde(default)]
    pub fixed: bool,
}

impl SimulationNode {
    pub fn new(id: impl Into<NodeId>, x: f32, y: f32) -> Self {
        Self {
            id: id.into(),
            x,
            y,
            vx: 0.0,
            vy: 0.0,
            fixed: false,
        }
    }

    pub fn at(id: impl Into<NodeId>, pos: Pos2) -> Self {
        Self::new(id, pos.x, pos.y)
    }

    /// A node for the engine to place
    pub fn unplaced(id: impl Into<NodeId>) -> Self {
        Self::new(id, f32::NAN, f32::NAN)
    }

    pub fn is_placed(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn pos(&self) -> Pos2 {
        Pos2::new(self.x, self.y)
    }

    pub fn velocity(&self) -> Vec2 {
        Vec2::new(self.vx, self.vy)
    }

    /// Apply a patch; `None` fields are left unchanged
    pub fn apply(&mut self, patch: &NodePatch) {
        if let Some(x) = patch.x {
            self.x = x;
        }
        if let Some(y) = patch.y {
            self.y = y;
        }
        if let Some(vx) = patch.vx {
            self.vx = vx;
        }
        if let Some(vy) = patch.vy {
            self.vy = vy;
        }
        if let Some(fixed) = patch.fixed {
            self.fixed = fixed;
        }
    }
}

/// Partial update addressed to one node by id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vx: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vy: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed: Option<bool>,
}

impl NodePatch {
    /// Move a node to `pos`
    pub fn position(pos: Pos2) -> Self {
        Self {
            x: Some(pos.x),
            y: Some(pos.y),
            ..Self::default()
        }
    }

    /// Pin a node at `pos` with zero velocity
    pub fn pin(pos: Pos2) -> Self {
        Self {
            vx: Some(0.0),
            vy: Some(0.0),
            fixed: Some(true),
            ..Self::position(pos)
        }
    }

    /// Release a pinned node at `pos` with zero velocity
    pub fn release(pos: Pos2) -> Self {
        Self {
            fixed: Some(false),
            ..Self::pin(pos)
        }
    }
}

/// Spring between two nodes, addressed by id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    pub source: NodeId,
    pub target: NodeId,
}

impl Link {
    pub fn new(source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

/// Tunable force parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationOptions {
    /// Many-body strength; negative repels
    pub charge: f32,
    /// Target spring length
    pub link_distance: f32,
    /// Fixed spring strength; `None` derives it from node degrees
    pub link_strength: Option<f32>,
    /// Fraction of velocity lost per tick (0.0 - 1.0)
    pub velocity_decay: f32,
    /// Per-tick alpha cooling rate
    pub alpha_decay: f32,
    /// Alpha below which the simulation counts as settled
    pub alpha_min: f32,
    /// Pull toward the origin on each axis
    pub center_strength: f32,
    /// Barnes-Hut approximation threshold
    pub theta: f32,
    /// Repulsion is computed with distances no smaller than this
    pub distance_min: f32,
    /// Seed for the jiggle applied to coincident nodes
    pub seed: u64,
}

/// Cooling rate that brings alpha from 1.0 to `alpha_min` in ~300 ticks
pub fn default_alpha_decay(alpha_min: f32) -> f32 {
    1.0 - alpha_min.powf(1.0 / 300.0)
}

impl Default for SimulationOptions {
    fn default() -> Self {
        let alpha_min = 0.001;
        Self {
            charge: -30.0,
            link_distance: 30.0,
            link_strength: None,
            velocity_decay: 0.4,
            alpha_decay: default_alpha_decay(alpha_min),
            alpha_min,
            center_strength: 0.1,
            theta: 0.9,
            distance_min: 1.0,
            seed: 0x5eed,
        }
    }
}
