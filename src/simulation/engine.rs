//! Force-directed simulation state and integration step.
//!
//! Nodes live in a flat array for the force passes; every external address
//! goes through the id -> index map, so adding or removing nodes can never
//! patch the wrong node.

use super::forces::Forces;
use super::types::{Link, NodePatch, SimulationNode, SimulationOptions, REHEAT_ALPHA};
use crate::graph::types::NodeId;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;

/// Radius step of the seeding spiral for unplaced nodes
const INITIAL_RADIUS: f32 = 10.0;

pub struct Simulation {
    nodes: Vec<SimulationNode>,
    /// Node index lookup (id -> index in nodes)
    index: HashMap<NodeId, usize>,
    links: Vec<Link>,
    options: SimulationOptions,
    forces: Forces,
    alpha: f32,
    alpha_target: f32,
    rng: StdRng,
}

impl Simulation {
    /// Build a simulation at rest (alpha 0); unplaced nodes are seeded on a spiral
    pub fn new(nodes: Vec<SimulationNode>, links: Vec<Link>, options: SimulationOptions) -> Self {
        let rng = StdRng::seed_from_u64(options.seed);
        let mut nodes = nodes;
        seed_unplaced(&mut nodes);
        let index = build_index(&nodes);
        let forces = Forces::build(&options, &links, &index);

        tracing::debug!(
            "Simulation built: {} nodes, {} links ({} resolved)",
            nodes.len(),
            links.len(),
            forces.links.len()
        );

        Self {
            nodes,
            index,
            links,
            options,
            forces,
            alpha: 0.0,
            alpha_target: 0.0,
            rng,
        }
    }

    pub fn nodes(&self) -> &[SimulationNode] {
        &self.nodes
    }

    pub fn node(&self, id: &str) -> Option<&SimulationNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn options(&self) -> &SimulationOptions {
        &self.options
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn set_alpha(&mut self, alpha: f32) {
        self.alpha = alpha.clamp(0.0, 1.0);
    }

    /// Alpha has cooled below `alpha_min`
    pub fn is_settled(&self) -> bool {
        self.alpha < self.options.alpha_min
    }

    /// Sum of node speeds, a cheap measure of how much the layout still moves
    pub fn total_velocity(&self) -> f32 {
        self.nodes.iter().map(|n| n.velocity().length()).sum()
    }

    /// Advance the simulation by one integration step
    pub fn tick(&mut self) {
        self.alpha += (self.alpha_target - self.alpha) * self.options.alpha_decay;
        self.forces.apply(&mut self.nodes, self.alpha, &mut self.rng);

        let keep = 1.0 - self.options.velocity_decay;
        for node in &mut self.nodes {
            if node.fixed {
                node.vx = 0.0;
                node.vy = 0.0;
            } else {
                node.vx *= keep;
                node.vy *= keep;
                node.x += node.vx;
                node.y += node.vy;
            }
        }
    }

    /// Rebuild forces with new options; positions are kept
    pub fn set_options(&mut self, options: SimulationOptions) {
        self.forces = Forces::build(&options, &self.links, &self.index);
        self.options = options;
    }

    /// Replace the working set.
    ///
    /// Incoming nodes that are unplaced but already simulated keep their
    /// current state; the rest of the unplaced nodes are seeded.
    pub fn replace_network(&mut self, nodes: Vec<SimulationNode>, links: Vec<Link>) {
        let mut previous: HashMap<NodeId, SimulationNode> = self
            .nodes
            .drain(..)
            .map(|n| (n.id.clone(), n))
            .collect();

        self.nodes = nodes
            .into_iter()
            .map(|node| {
                if node.is_placed() {
                    return node;
                }
                previous.remove(&node.id).unwrap_or(node)
            })
            .collect();
        seed_unplaced(&mut self.nodes);
        self.index = build_index(&self.nodes);
        self.links = links;
        self.forces = Forces::build(&self.options, &self.links, &self.index);

        tracing::debug!(
            "Network replaced: {} nodes, {} links",
            self.nodes.len(),
            self.forces.links.len()
        );
    }

    /// Patch one node by id. Returns false if the id is unknown.
    pub fn update_node(&mut self, id: &str, patch: &NodePatch) -> bool {
        match self.index.get(id) {
            Some(&i) => {
                self.nodes[i].apply(patch);
                true
            }
            None => false,
        }
    }

    /// Resume at the reheat alpha without touching positions
    pub fn reheat(&mut self) {
        self.alpha = REHEAT_ALPHA;
    }
}

fn build_index(nodes: &[SimulationNode]) -> HashMap<NodeId, usize> {
    nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.id.clone(), i))
        .collect()
}

/// Place unplaced nodes on a phyllotaxis spiral around the origin
fn seed_unplaced(nodes: &mut [SimulationNode]) {
    let golden_angle = std::f32::consts::PI * (3.0 - 5.0_f32.sqrt());
    for (i, node) in nodes.iter_mut().enumerate() {
        if !node.is_placed() {
            let radius = INITIAL_RADIUS * (0.5 + i as f32).sqrt();
            let angle = i as f32 * golden_angle;
            node.x = radius * angle.cos();
            node.y = radius * angle.sin();
        }
        if !node.vx.is_finite() {
            node.vx = 0.0;
        }
        if !node.vy.is_finite() {
            node.vy = 0.0;
        }
    }
}
