//! Forces applied on each simulation tick.
//!
//! Every force adds to node velocities scaled by the current alpha; the
//! engine integrates positions afterwards.
//! - Many-body charge between all nodes (Barnes-Hut)
//! - Springs along links toward a target distance
//! - Weak positional pull toward the origin

use super::quadtree::{jiggle, ChargeQuery, Quadtree};
use super::types::{Link, SimulationNode, SimulationOptions};
use crate::graph::types::NodeId;
use egui::Pos2;
use rand::Rng;
use std::collections::HashMap;

pub struct ManyBody {
    pub strength: f32,
    pub theta: f32,
    pub distance_min2: f32,
}

impl ManyBody {
    pub fn new(options: &SimulationOptions) -> Self {
        Self {
            strength: options.charge,
            theta: options.theta,
            distance_min2: options.distance_min * options.distance_min,
        }
    }

    pub fn apply<R: Rng>(&self, nodes: &mut [SimulationNode], alpha: f32, rng: &mut R) {
        if nodes.len() < 2 || self.strength == 0.0 {
            return;
        }
        let bodies: Vec<(Pos2, f32)> = nodes.iter().map(|n| (n.pos(), self.strength)).collect();
        let tree = Quadtree::build(&bodies, self.theta);

        for (index, node) in nodes.iter_mut().enumerate() {
            let query = ChargeQuery {
                index,
                pos: bodies[index].0,
                alpha,
                distance_min2: self.distance_min2,
            };
            let dv = tree.velocity_delta(query, rng);
            node.vx += dv.x;
            node.vy += dv.y;
        }
    }
}

/// A link with its endpoints resolved to node-array indices
#[derive(Debug, Clone, PartialEq)]
struct ResolvedLink {
    source: usize,
    target: usize,
    strength: f32,
    /// Share of the correction applied to the target
    bias: f32,
}

pub struct LinkForce {
    links: Vec<ResolvedLink>,
    distance: f32,
}

impl LinkForce {
    /// Resolve links by node id; links with a missing endpoint or a single
    /// endpoint are dropped.
    pub fn new(links: &[Link], index: &HashMap<NodeId, usize>, options: &SimulationOptions) -> Self {
        let mut endpoints = Vec::with_capacity(links.len());
        for link in links {
            match (index.get(&link.source), index.get(&link.target)) {
                (Some(&s), Some(&t)) if s != t => endpoints.push((s, t)),
                (Some(_), Some(_)) => {
                    tracing::trace!("Dropping self-link on {}", link.source);
                }
                _ => {
                    tracing::debug!(
                        "Dropping link {} -> {}: endpoint not in simulation",
                        link.source,
                        link.target
                    );
                }
            }
        }

        let mut degree: HashMap<usize, u32> = HashMap::new();
        for &(s, t) in &endpoints {
            *degree.entry(s).or_insert(0) += 1;
            *degree.entry(t).or_insert(0) += 1;
        }

        let links = endpoints
            .into_iter()
            .map(|(source, target)| {
                let ds = degree[&source] as f32;
                let dt = degree[&target] as f32;
                ResolvedLink {
                    source,
                    target,
                    strength: options.link_strength.unwrap_or(1.0 / ds.min(dt)),
                    bias: ds / (ds + dt),
                }
            })
            .collect();

        Self {
            links,
            distance: options.link_distance,
        }
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn apply<R: Rng>(&self, nodes: &mut [SimulationNode], alpha: f32, rng: &mut R) {
        for link in &self.links {
            let (source, target) = (&nodes[link.source], &nodes[link.target]);
            let mut dx = target.x + target.vx - source.x - source.vx;
            let mut dy = target.y + target.vy - source.y - source.vy;
            if dx == 0.0 {
                dx = jiggle(rng);
            }
            if dy == 0.0 {
                dy = jiggle(rng);
            }
            let length = (dx * dx + dy * dy).sqrt();
            let scale = (length - self.distance) / length * alpha * link.strength;
            dx *= scale;
            dy *= scale;

            let target = &mut nodes[link.target];
            target.vx -= dx * link.bias;
            target.vy -= dy * link.bias;
            let source = &mut nodes[link.source];
            source.vx += dx * (1.0 - link.bias);
            source.vy += dy * (1.0 - link.bias);
        }
    }
}

/// Pull toward the origin, proportional to distance
pub struct CenterForce {
    pub strength: f32,
}

impl CenterForce {
    pub fn apply(&self, nodes: &mut [SimulationNode], alpha: f32) {
        let k = self.strength * alpha;
        if k == 0.0 {
            return;
        }
        for node in nodes {
            node.vx -= node.x * k;
            node.vy -= node.y * k;
        }
    }
}

/// The full force set for one simulation
pub struct Forces {
    pub many_body: ManyBody,
    pub links: LinkForce,
    pub center: CenterForce,
}

impl Forces {
    pub fn build(options: &SimulationOptions, links: &[Link], index: &HashMap<NodeId, usize>) -> Self {
        Self {
            many_body: ManyBody::new(options),
            links: LinkForce::new(links, index, options),
            center: CenterForce {
                strength: options.center_strength,
            },
        }
    }

    pub fn apply<R: Rng>(&self, nodes: &mut [SimulationNode], alpha: f32, rng: &mut R) {
        self.links.apply(nodes, alpha, rng);
        self.many_body.apply(nodes, alpha, rng);
        self.center.apply(nodes, alpha);
    }
}
