//! Pointer-driven node dragging.
//!
//! Pointer moves are tracked at the document level: once a drag captures the
//! pointer, moves arrive wherever the pointer is, not only over the node. The
//! last pointer position is cached even when nothing is being dragged so that
//! drops carrying only metadata can still be placed.
//!
//! While a node is dragged the store is the only thing that moves it. When
//! the engine is running the node is pinned in the simulation, the pin
//! follows the pointer, and on release the node is handed back (unpinned, at
//! its final position) with a reheat.

use crate::graph::types::{NodeId, Position};
use crate::graph::{LayoutSpace, PositionStore};
use crate::simulation::{NodePatch, SimulationHandle};
use egui::{Pos2, Rect};

/// The part of the simulation engine a drag needs
pub trait EngineControl {
    fn is_running(&self) -> bool;
    fn update_node(&mut self, node_id: &str, patch: NodePatch);
    fn reheat(&mut self);
}

impl EngineControl for SimulationHandle {
    fn is_running(&self) -> bool {
        SimulationHandle::is_running(self)
    }

    fn update_node(&mut self, node_id: &str, patch: NodePatch) {
        SimulationHandle::update_node(self, node_id, patch);
    }

    fn reheat(&mut self) {
        SimulationHandle::reheat(self);
    }
}

/// Where the final position of a drag went
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseTarget {
    /// Handed to the running engine via `update_node` + `reheat`
    Engine,
    /// Written straight to the position store
    Store,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DragRelease {
    pub node_id: NodeId,
    pub position: Position,
    pub target: ReleaseTarget,
    /// The node was pinned in an engine that stopped during the drag and
    /// still needs unpinning
    pub stale_pin: bool,
}

/// Outcome of an aborted drag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragCancel {
    pub node_id: NodeId,
    /// The pin was released in the running engine. Like any `update_node`,
    /// this resumes the engine at the reheat alpha.
    pub unpinned: bool,
    /// The node was pinned in an engine that stopped during the drag
    pub stale_pin: bool,
}

#[derive(Debug, Clone)]
struct ActiveDrag {
    node_id: NodeId,
    /// Pinned in the engine at pointer-down
    pinned: bool,
}

#[derive(Debug, Default)]
pub struct DragInteractionController {
    canvas_rect: Option<Rect>,
    last_pointer: Option<Pos2>,
    active: Option<ActiveDrag>,
}

impl DragInteractionController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canvas bounding rectangle in pointer coordinates
    pub fn set_canvas_rect(&mut self, rect: Rect) {
        self.canvas_rect = Some(rect);
    }

    pub fn canvas_rect(&self) -> Option<Rect> {
        self.canvas_rect
    }

    /// Pointer location as a normalized canvas position (unclamped)
    pub fn normalize(&self, pointer: Pos2) -> Option<Position> {
        let rect = self.canvas_rect?;
        if rect.width() <= 0.0 || rect.height() <= 0.0 {
            return None;
        }
        Some(Position::new(
            (pointer.x - rect.min.x) / rect.width(),
            (pointer.y - rect.min.y) / rect.height(),
        ))
    }

    pub fn last_pointer(&self) -> Option<Pos2> {
        self.last_pointer
    }

    /// Last pointer position in normalized canvas space, for drops
    pub fn last_pointer_position(&self) -> Option<Position> {
        self.last_pointer.and_then(|p| self.normalize(p))
    }

    pub fn dragged_node(&self) -> Option<&str> {
        self.active.as_ref().map(|d| d.node_id.as_str())
    }

    pub fn is_dragging(&self) -> bool {
        self.active.is_some()
    }

    /// The dragged node, if it is pinned in the engine
    pub fn pinned_node(&self) -> Option<&str> {
        self.active
            .as_ref()
            .filter(|d| d.pinned)
            .map(|d| d.node_id.as_str())
    }

    /// Begin dragging `node_id`. Returns false if a drag is already active
    /// or the node is not on the canvas.
    pub fn pointer_down(
        &mut self,
        node_id: &str,
        pointer: Pos2,
        store: &PositionStore,
        engine: Option<&mut dyn EngineControl>,
        space: LayoutSpace,
    ) -> bool {
        self.last_pointer = Some(pointer);
        if self.active.is_some() || !store.is_member(node_id) {
            return false;
        }

        let mut pinned = false;
        if let Some(engine) = engine.filter(|e| e.is_running()) {
            let current = store
                .get(node_id)
                .or_else(|| self.normalize(pointer).map(|p| store.clamp(p)));
            if let Some(current) = current {
                engine.update_node(node_id, NodePatch::pin(space.to_simulation(current)));
                pinned = true;
            }
        }

        tracing::trace!("Drag start on {} (pinned: {})", node_id, pinned);
        self.active = Some(ActiveDrag {
            node_id: node_id.to_string(),
            pinned,
        });
        true
    }

    /// Document-level pointer move. While dragging, writes the candidate
    /// position to the store and returns the stored (clamped) value.
    pub fn track_pointer(&mut self, pointer: Pos2, store: &mut PositionStore) -> Option<Position> {
        self.last_pointer = Some(pointer);
        let node_id = self.active.as_ref()?.node_id.clone();
        let candidate = self.normalize(pointer)?;
        store.set_position(&node_id, candidate);
        store.get(&node_id)
    }

    /// Pointer move that also drags the engine pin along, so the rest of
    /// the layout reacts to where the node is now
    pub fn pointer_move(
        &mut self,
        pointer: Pos2,
        store: &mut PositionStore,
        engine: Option<&mut dyn EngineControl>,
        space: LayoutSpace,
    ) -> Option<Position> {
        let position = self.track_pointer(pointer, store)?;
        if let (Some(node_id), Some(engine)) = (self.pinned_node(), engine.filter(|e| e.is_running())) {
            engine.update_node(node_id, NodePatch::pin(space.to_simulation(position)));
        }
        Some(position)
    }

    /// Finish the drag, optionally at a final pointer location
    pub fn pointer_up(
        &mut self,
        pointer: Option<Pos2>,
        store: &mut PositionStore,
        engine: Option<&mut dyn EngineControl>,
        space: LayoutSpace,
    ) -> Option<DragRelease> {
        if let Some(pointer) = pointer {
            self.track_pointer(pointer, store);
        }
        let drag = self.active.take()?;

        let position = match store.get(&drag.node_id) {
            Some(position) => position,
            None => {
                let fallback = self.last_pointer_position()?;
                store.set_position(&drag.node_id, fallback);
                store.get(&drag.node_id)?
            }
        };

        let release = match engine.filter(|e| e.is_running()) {
            Some(engine) => {
                engine.update_node(&drag.node_id, NodePatch::release(space.to_simulation(position)));
                engine.reheat();
                DragRelease {
                    node_id: drag.node_id,
                    position,
                    target: ReleaseTarget::Engine,
                    stale_pin: false,
                }
            }
            None => {
                store.set_position(&drag.node_id, position);
                DragRelease {
                    node_id: drag.node_id,
                    position,
                    target: ReleaseTarget::Store,
                    stale_pin: drag.pinned,
                }
            }
        };

        tracing::trace!("Drag released: {:?}", release);
        Some(release)
    }

    /// Abort the drag where the node currently is (e.g. pointer capture lost)
    pub fn cancel(
        &mut self,
        store: &PositionStore,
        engine: Option<&mut dyn EngineControl>,
        space: LayoutSpace,
    ) -> Option<DragCancel> {
        let drag = self.active.take()?;
        let mut cancel = DragCancel {
            node_id: drag.node_id,
            unpinned: false,
            stale_pin: false,
        };
        if !drag.pinned {
            return Some(cancel);
        }

        match engine.filter(|e| e.is_running()) {
            Some(engine) => {
                let patch = match store.get(&cancel.node_id) {
                    Some(position) => NodePatch::release(space.to_simulation(position)),
                    None => NodePatch {
                        fixed: Some(false),
                        ..NodePatch::default()
                    },
                };
                engine.update_node(&cancel.node_id, patch);
                cancel.unpinned = true;
            }
            None => cancel.stale_pin = true,
        }
        Some(cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::types::{CanvasDimensions, PersistedNode};
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct MockEngine {
        running: bool,
        updates: Vec<(String, NodePatch)>,
        reheats: usize,
    }

    impl EngineControl for MockEngine {
        fn is_running(&self) -> bool {
            self.running
        }

        fn update_node(&mut self, node_id: &str, patch: NodePatch) {
            self.updates.push((node_id.to_string(), patch));
        }

        fn reheat(&mut self) {
            self.reheats += 1;
        }
    }

    fn setup() -> (DragInteractionController, PositionStore, LayoutSpace) {
        let mut store = PositionStore::new(10.0, 0.0);
        store.sync_from_nodes(
            &[
                PersistedNode::new("a").with_layout("layout", Position::new(0.5, 0.5)),
                PersistedNode::new("b"),
            ],
            "layout",
        );
        let dims = CanvasDimensions::new(200.0, 100.0);
        store.set_canvas_dimensions(dims);

        let mut drag = DragInteractionController::new();
        drag.set_canvas_rect(Rect::from_min_size(Pos2::new(100.0, 50.0), egui::vec2(200.0, 100.0)));
        (drag, store, LayoutSpace::new(Some(dims), 1000.0))
    }

    #[test]
    fn normalizes_relative_to_canvas_rect() {
        let (drag, _, _) = setup();
        assert_eq!(drag.normalize(Pos2::new(150.0, 75.0)), Some(Position::new(0.25, 0.25)));
        assert_eq!(DragInteractionController::new().normalize(Pos2::ZERO), None);
    }

    #[test]
    fn drag_with_idle_engine_writes_store() {
        let (mut drag, mut store, space) = setup();
        let mut engine = MockEngine::default();

        assert!(drag.pointer_down("a", Pos2::new(200.0, 100.0), &store, Some(&mut engine), space));
        assert_eq!(drag.dragged_node(), Some("a"));

        let moved = drag.track_pointer(Pos2::new(250.0, 125.0), &mut store);
        assert_eq!(moved, Some(Position::new(0.75, 0.75)));

        let release = drag
            .pointer_up(Some(Pos2::new(260.0, 130.0)), &mut store, Some(&mut engine), space)
            .unwrap();
        assert_eq!(release.target, ReleaseTarget::Store);
        assert_eq!(release.position, Position::new(0.8, 0.8));
        assert_eq!(store.get("a"), Some(Position::new(0.8, 0.8)));
        assert!(engine.updates.is_empty());
        assert_eq!(engine.reheats, 0);
        assert!(!drag.is_dragging());
    }

    #[test]
    fn drag_with_running_engine_pins_then_hands_back() {
        let (mut drag, mut store, space) = setup();
        let mut engine = MockEngine {
            running: true,
            ..MockEngine::default()
        };

        drag.pointer_down("a", Pos2::new(200.0, 100.0), &store, Some(&mut engine), space);
        assert_eq!(engine.updates.len(), 1);
        assert_eq!(engine.updates[0].1, NodePatch::pin(Pos2::ZERO));

        drag.track_pointer(Pos2::new(250.0, 75.0), &mut store);
        let release = drag.pointer_up(None, &mut store, Some(&mut engine), space).unwrap();

        assert_eq!(release.target, ReleaseTarget::Engine);
        assert_eq!(release.position, Position::new(0.75, 0.25));
        assert_eq!(engine.updates.len(), 2);
        assert_eq!(
            engine.updates[1],
            ("a".to_string(), NodePatch::release(Pos2::new(50.0, -25.0)))
        );
        assert_eq!(engine.reheats, 1);
    }

    #[test]
    fn drag_position_is_clamped_to_canvas() {
        let (mut drag, mut store, space) = setup();
        drag.pointer_down("a", Pos2::new(200.0, 100.0), &store, None, space);
        let moved = drag.track_pointer(Pos2::new(1000.0, -400.0), &mut store).unwrap();
        // radius 10 on a 200x100 canvas
        assert!((moved.x - 0.95).abs() < 1e-6);
        assert!((moved.y - 0.1).abs() < 1e-6);
    }

    #[test]
    fn pointer_cached_without_drag() {
        let (mut drag, mut store, _) = setup();
        assert_eq!(drag.track_pointer(Pos2::new(120.0, 60.0), &mut store), None);
        assert_eq!(drag.last_pointer(), Some(Pos2::new(120.0, 60.0)));
        assert_eq!(drag.last_pointer_position(), Some(Position::new(0.1, 0.1)));
    }

    #[test]
    fn rejects_second_drag_and_unknown_nodes() {
        let (mut drag, store, space) = setup();
        assert!(!drag.pointer_down("ghost", Pos2::ZERO, &store, None, space));
        assert!(drag.pointer_down("a", Pos2::ZERO, &store, None, space));
        assert!(!drag.pointer_down("b", Pos2::ZERO, &store, None, space));
        assert_eq!(drag.dragged_node(), Some("a"));
    }

    #[test]
    fn engine_stopping_mid_drag_reports_stale_pin() {
        let (mut drag, mut store, space) = setup();
        let mut engine = MockEngine {
            running: true,
            ..MockEngine::default()
        };
        drag.pointer_down("a", Pos2::new(200.0, 100.0), &store, Some(&mut engine), space);
        engine.running = false;

        let release = drag
            .pointer_up(Some(Pos2::new(150.0, 100.0)), &mut store, Some(&mut engine), space)
            .unwrap();
        assert_eq!(release.target, ReleaseTarget::Store);
        assert!(release.stale_pin);
        assert_eq!(engine.updates.len(), 1);
    }

    #[test]
    fn unplaced_node_lands_under_pointer() {
        let (mut drag, mut store, space) = setup();
        assert!(drag.pointer_down("b", Pos2::new(150.0, 100.0), &store, None, space));
        let release = drag.pointer_up(None, &mut store, None, space).unwrap();
        assert_eq!(release.position, Position::new(0.25, 0.5));
        assert_eq!(store.get("b"), Some(Position::new(0.25, 0.5)));
    }

    #[test]
    fn pin_follows_the_pointer_while_engine_runs() {
        let (mut drag, mut store, space) = setup();
        let mut engine = MockEngine {
            running: true,
            ..MockEngine::default()
        };
        drag.pointer_down("a", Pos2::new(200.0, 100.0), &store, Some(&mut engine), space);
        drag.pointer_move(Pos2::new(250.0, 75.0), &mut store, Some(&mut engine), space);

        assert_eq!(engine.updates.len(), 2);
        assert_eq!(
            engine.updates[1],
            ("a".to_string(), NodePatch::pin(Pos2::new(50.0, -25.0)))
        );

        // idle engine: the store alone follows the pointer
        engine.running = false;
        drag.pointer_move(Pos2::new(150.0, 75.0), &mut store, Some(&mut engine), space);
        assert_eq!(engine.updates.len(), 2);
        assert_eq!(store.get("a"), Some(Position::new(0.25, 0.25)));
    }

    #[test]
    fn cancel_releases_pin_in_place() {
        let (mut drag, store, space) = setup();
        let mut engine = MockEngine {
            running: true,
            ..MockEngine::default()
        };
        drag.pointer_down("a", Pos2::new(200.0, 100.0), &store, Some(&mut engine), space);
        let cancel = drag.cancel(&store, Some(&mut engine), space).unwrap();

        assert_eq!(
            cancel,
            DragCancel {
                node_id: "a".to_string(),
                unpinned: true,
                stale_pin: false,
            }
        );
        assert_eq!(engine.updates[1], ("a".to_string(), NodePatch::release(Pos2::ZERO)));
        assert!(!drag.is_dragging());
    }

    #[test]
    fn cancel_after_engine_stopped_reports_stale_pin() {
        let (mut drag, store, space) = setup();
        let mut engine = MockEngine {
            running: true,
            ..MockEngine::default()
        };
        drag.pointer_down("a", Pos2::new(200.0, 100.0), &store, Some(&mut engine), space);
        engine.running = false;

        let cancel = drag.cancel(&store, Some(&mut engine), space).unwrap();
        assert!(cancel.stale_pin);
        assert!(!cancel.unpinned);
        assert_eq!(engine.updates.len(), 1);
    }
}
