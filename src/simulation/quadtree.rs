//! Barnes-Hut quadtree for O(n log n) many-body force calculation.
//!
//! Instead of calculating the charge interaction between all pairs of nodes
//! O(n²), distant groups of nodes are treated as a single body at their
//! centre of charge.

use egui::{Pos2, Vec2};
use rand::Rng;

/// Depth below which near-coincident bodies share a leaf instead of splitting
const MAX_DEPTH: u32 = 50;

/// One charged body, by index into the simulation's node array
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Body {
    pub index: usize,
    pub charge: f32,
}

/// A node in the quadtree - either a leaf holding the bodies at one position, or an internal node with children
#[derive(Debug, Default)]
pub enum QuadNode {
    #[default]
    Empty,
    Leaf {
        pos: Pos2,
        /// Bodies at `pos`; more than one only when they coincide
        bodies: Vec<Body>,
    },
    Internal {
        /// Centre of charge of all bodies in this cell
        center: Pos2,
        /// Sum of the bodies' charges
        total_charge: f32,
        /// Sum of |charge|, used to weight the centre
        weight: f32,
        /// Number of bodies in this cell
        count: u32,
        /// Children: NW, NE, SW, SE
        children: Box<[QuadNode; 4]>,
    },
}

/// Axis-aligned bounding box for quadtree cells
#[derive(Debug, Clone, Copy)]
pub struct Bounds {
    pub min: Pos2,
    pub max: Pos2,
}

impl Bounds {
    pub fn new(min: Pos2, max: Pos2) -> Self {
        Self { min, max }
    }

    pub fn center(&self) -> Pos2 {
        Pos2::new(
            (self.min.x + self.max.x) / 2.0,
            (self.min.y + self.max.y) / 2.0,
        )
    }

    pub fn size(&self) -> f32 {
        (self.max.x - self.min.x).max(self.max.y - self.min.y)
    }

    /// Get the quadrant for a position (0=NW, 1=NE, 2=SW, 3=SE)
    pub fn quadrant(&self, pos: Pos2) -> usize {
        let center = self.center();
        let east = pos.x >= center.x;
        let south = pos.y >= center.y;
        match (south, east) {
            (false, false) => 0,
            (false, true) => 1,
            (true, false) => 2,
            (true, true) => 3,
        }
    }

    /// Get bounds for a specific quadrant
    pub fn child_bounds(&self, quadrant: usize) -> Bounds {
        let center = self.center();
        match quadrant {
            0 => Bounds::new(self.min, center),
            1 => Bounds::new(Pos2::new(center.x, self.min.y), Pos2::new(self.max.x, center.y)),
            2 => Bounds::new(Pos2::new(self.min.x, center.y), Pos2::new(center.x, self.max.y)),
            _ => Bounds::new(center, self.max),
        }
    }
}

/// Parameters for one force query
#[derive(Debug, Clone, Copy)]
pub struct ChargeQuery {
    /// Index of the body being pushed (skipped in its own leaf)
    pub index: usize,
    pub pos: Pos2,
    /// Current simulation alpha
    pub alpha: f32,
    /// Squared minimum distance
    pub distance_min2: f32,
}

pub struct Quadtree {
    pub root: QuadNode,
    pub bounds: Bounds,
    /// Cell size / distance threshold for approximation.
    /// Higher = faster but less accurate.
    pub theta: f32,
}

impl Quadtree {
    /// Build a quadtree from `(position, charge)` pairs indexed by slice position
    pub fn build(bodies: &[(Pos2, f32)], theta: f32) -> Self {
        if bodies.is_empty() {
            return Self {
                root: QuadNode::Empty,
                bounds: Bounds::new(Pos2::ZERO, Pos2::ZERO),
                theta,
            };
        }

        let mut min_x = f32::MAX;
        let mut min_y = f32::MAX;
        let mut max_x = f32::MIN;
        let mut max_y = f32::MIN;

        for (pos, _) in bodies {
            min_x = min_x.min(pos.x);
            min_y = min_y.min(pos.y);
            max_x = max_x.max(pos.x);
            max_y = max_y.max(pos.y);
        }

        // Pad and make square (required for proper quadtree)
        let padding = 1.0;
        min_x -= padding;
        min_y -= padding;
        let size = (max_x + padding - min_x).max(max_y + padding - min_y);
        let bounds = Bounds::new(
            Pos2::new(min_x, min_y),
            Pos2::new(min_x + size, min_y + size),
        );

        let mut tree = Self {
            root: QuadNode::Empty,
            bounds,
            theta,
        };

        for (index, &(pos, charge)) in bodies.iter().enumerate() {
            tree.insert(pos, charge, index);
        }

        tree
    }

    pub fn insert(&mut self, pos: Pos2, charge: f32, index: usize) {
        self.root = Self::insert_into(std::mem::take(&mut self.root), pos, charge, index, self.bounds, 0);
    }

    fn insert_into(node: QuadNode, pos: Pos2, charge: f32, index: usize, bounds: Bounds, depth: u32) -> QuadNode {
        let body = Body { index, charge };
        match node {
            QuadNode::Empty => QuadNode::Leaf {
                pos,
                bodies: vec![body],
            },

            // Coincident bodies can never be told apart by splitting
            QuadNode::Leaf {
                pos: existing_pos,
                mut bodies,
            } if existing_pos == pos || depth >= MAX_DEPTH => {
                bodies.push(body);
                QuadNode::Leaf {
                    pos: existing_pos,
                    bodies,
                }
            }

            QuadNode::Leaf {
                pos: existing_pos,
                bodies,
            } => {
                let existing_charge: f32 = bodies.iter().map(|b| b.charge).sum();
                let w_existing: f32 = bodies.iter().map(|b| b.charge.abs()).sum();
                let existing_count = bodies.len() as u32;

                let mut children: Box<[QuadNode; 4]> = Box::default();
                children[bounds.quadrant(existing_pos)] = QuadNode::Leaf {
                    pos: existing_pos,
                    bodies,
                };

                let nq = bounds.quadrant(pos);
                children[nq] = Self::insert_into(
                    std::mem::take(&mut children[nq]),
                    pos,
                    charge,
                    index,
                    bounds.child_bounds(nq),
                    depth + 1,
                );

                let w_new = charge.abs();
                QuadNode::Internal {
                    center: weighted_center(existing_pos, w_existing, pos, w_new),
                    total_charge: existing_charge + charge,
                    weight: w_existing + w_new,
                    count: existing_count + 1,
                    children,
                }
            }

            QuadNode::Internal {
                center,
                total_charge,
                weight,
                count,
                mut children,
            } => {
                let q = bounds.quadrant(pos);
                children[q] = Self::insert_into(
                    std::mem::take(&mut children[q]),
                    pos,
                    charge,
                    index,
                    bounds.child_bounds(q),
                    depth + 1,
                );

                let w_new = charge.abs();
                QuadNode::Internal {
                    center: weighted_center(center, weight, pos, w_new),
                    total_charge: total_charge + charge,
                    weight: weight + w_new,
                    count: count + 1,
                    children,
                }
            }
        }
    }

    /// Velocity change on the queried body from every other body.
    ///
    /// Each body contributes `delta * charge * alpha / d²` where `delta`
    /// points from the queried body toward it, so negative charges repel.
    /// Exactly coincident bodies are separated with a tiny random jiggle.
    pub fn velocity_delta<R: Rng>(&self, query: ChargeQuery, rng: &mut R) -> Vec2 {
        self.accumulate(&self.root, query, self.bounds, rng)
    }

    fn accumulate<R: Rng>(&self, node: &QuadNode, query: ChargeQuery, bounds: Bounds, rng: &mut R) -> Vec2 {
        match node {
            QuadNode::Empty => Vec2::ZERO,

            QuadNode::Leaf { pos, bodies } => {
                let mut dv = Vec2::ZERO;
                for body in bodies.iter().filter(|b| b.index != query.index) {
                    let mut delta = *pos - query.pos;
                    if delta.x == 0.0 {
                        delta.x = jiggle(rng);
                    }
                    if delta.y == 0.0 {
                        delta.y = jiggle(rng);
                    }
                    dv += charge_impulse(delta, body.charge, query);
                }
                dv
            }

            QuadNode::Internal {
                center,
                total_charge,
                children,
                ..
            } => {
                let delta = *center - query.pos;
                let distance = delta.length();

                // Far enough: treat the whole cell as one body
                if distance > 0.0 && bounds.size() / distance < self.theta {
                    charge_impulse(delta, *total_charge, query)
                } else {
                    let mut dv = Vec2::ZERO;
                    for (i, child) in children.iter().enumerate() {
                        dv += self.accumulate(child, query, bounds.child_bounds(i), rng);
                    }
                    dv
                }
            }
        }
    }
}

fn weighted_center(a: Pos2, wa: f32, b: Pos2, wb: f32) -> Pos2 {
    let total = wa + wb;
    if total <= 0.0 {
        return Pos2::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0);
    }
    Pos2::new((a.x * wa + b.x * wb) / total, (a.y * wa + b.y * wb) / total)
}

fn charge_impulse(delta: Vec2, charge: f32, query: ChargeQuery) -> Vec2 {
    let mut l = delta.length_sq();
    if l < query.distance_min2 {
        l = (query.distance_min2 * l).sqrt();
    }
    if l <= 0.0 {
        return Vec2::ZERO;
    }
    delta * (charge * query.alpha / l)
}

/// Tiny random offset used to break exact overlaps
pub fn jiggle<R: Rng>(rng: &mut R) -> f32 {
    (rng.gen::<f32>() - 0.5) * 1e-6
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn query(index: usize, pos: Pos2) -> ChargeQuery {
        ChargeQuery {
            index,
            pos,
            alpha: 1.0,
            distance_min2: 1.0,
        }
    }

    #[test]
    fn build_aggregates_charge() {
        let bodies = vec![
            (Pos2::new(0.0, 0.0), -30.0),
            (Pos2::new(100.0, 0.0), -30.0),
            (Pos2::new(0.0, 100.0), -30.0),
            (Pos2::new(100.0, 100.0), -30.0),
        ];

        let tree = Quadtree::build(&bodies, 0.9);

        match &tree.root {
            QuadNode::Internal { count, total_charge, .. } => {
                assert_eq!(*count, 4);
                assert_eq!(*total_charge, -120.0);
            }
            _ => panic!("Expected internal node"),
        }
    }

    #[test]
    fn negative_charge_repels() {
        let bodies = vec![(Pos2::new(0.0, 0.0), -30.0), (Pos2::new(100.0, 0.0), -30.0)];
        let tree = Quadtree::build(&bodies, 0.9);
        let mut rng = StdRng::seed_from_u64(1);

        let dv = tree.velocity_delta(query(0, Pos2::new(0.0, 0.0)), &mut rng);
        assert!(dv.x < 0.0, "Force should push left: {:?}", dv);
        // -30 * 1 / 100² * 100
        assert!((dv.x + 0.3).abs() < 1e-4);
    }

    #[test]
    fn approximation_close_to_exact() {
        let mut bodies = Vec::new();
        for i in 0..10 {
            for j in 0..10 {
                bodies.push((Pos2::new(500.0 + i as f32 * 3.0, j as f32 * 3.0), -30.0));
            }
        }
        bodies.push((Pos2::new(0.0, 0.0), -30.0));
        let origin_body = bodies.len() - 1;
        let mut rng = StdRng::seed_from_u64(1);

        let exact = Quadtree::build(&bodies, 0.0).velocity_delta(query(origin_body, Pos2::ZERO), &mut rng);
        let approx = Quadtree::build(&bodies, 0.9).velocity_delta(query(origin_body, Pos2::ZERO), &mut rng);
        assert!((exact - approx).length() / exact.length() < 0.05, "{exact:?} vs {approx:?}");
    }

    #[test]
    fn coincident_bodies_get_pushed_apart() {
        let bodies = vec![(Pos2::new(5.0, 5.0), -30.0), (Pos2::new(5.0, 5.0), -30.0)];
        let tree = Quadtree::build(&bodies, 0.9);
        let mut rng = StdRng::seed_from_u64(7);
        let dv = tree.velocity_delta(query(1, Pos2::new(5.0, 5.0)), &mut rng);
        assert!(dv.length() > 0.0);
        assert!(dv.x.is_finite() && dv.y.is_finite());
    }

    #[test]
    fn coincident_bodies_share_a_leaf() {
        let bodies = vec![
            (Pos2::new(5.0, 5.0), -30.0),
            (Pos2::new(5.0, 5.0), -30.0),
            (Pos2::new(5.0, 5.0), -30.0),
            (Pos2::new(40.0, 5.0), -30.0),
        ];
        let tree = Quadtree::build(&bodies, 0.9);

        match &tree.root {
            QuadNode::Internal { count, total_charge, .. } => {
                assert_eq!(*count, 4);
                assert_eq!(*total_charge, -120.0);
            }
            _ => panic!("Expected internal node"),
        }

        // the lone body feels all three stacked ones
        let mut rng = StdRng::seed_from_u64(3);
        let dv = Quadtree::build(&bodies, 0.0).velocity_delta(query(3, Pos2::new(40.0, 5.0)), &mut rng);
        // 3 * -30 / 35² * 35
        assert!((dv.x - 90.0 / 35.0).abs() < 1e-3, "{dv:?}");
    }
}
