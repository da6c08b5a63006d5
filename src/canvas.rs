//! One mounted sociogram canvas.
//!
//! Owns the position store, at most one simulation engine and the drag
//! controller. The host event loop calls `pump` once per frame to move
//! engine output into the store, forwards pointer and resize events, and
//! calls `checkpoint` when positions should reach the persisted network.

use crate::error::{LayoutError, Result};
use crate::graph::types::{NetworkData, NodeId, Position};
use crate::graph::{CanvasDimensions, LayoutSpace, LayoutWriter, PositionStore, SyncDelta};
use crate::interaction::{DragInteractionController, DragRelease, EngineControl, ReleaseTarget};
use crate::settings::LayoutSettings;
use crate::simulation::{Event, Link, NodePatch, SimulationHandle, SimulationNode, SimulationOptions};
use egui::{Pos2, Rect};
use std::collections::{HashMap, HashSet};

/// What one `pump` moved into the store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpSummary {
    pub events: usize,
    pub written: usize,
    /// An `end` event was received
    pub ended: bool,
}

pub struct SociogramCanvas {
    settings: LayoutSettings,
    store: PositionStore,
    space: LayoutSpace,
    drag: DragInteractionController,
    engine: Option<SimulationHandle>,
    links: Vec<Link>,
    /// Events stamped with fewer applied commands than this predate the
    /// last store -> engine push and are ignored
    barrier: u64,
    /// Nodes whose position was just handed to the engine, ignored in
    /// events until the engine has applied the hand-off
    handed_off: HashMap<NodeId, u64>,
}

impl SociogramCanvas {
    pub fn mount(settings: LayoutSettings) -> Self {
        let store = PositionStore::new(settings.node_radius, settings.padding);
        let space = LayoutSpace::new(None, settings.default_extent);
        Self {
            settings,
            store,
            space,
            drag: DragInteractionController::new(),
            engine: None,
            links: Vec::new(),
            barrier: 0,
            handed_off: HashMap::new(),
        }
    }

    pub fn settings(&self) -> &LayoutSettings {
        &self.settings
    }

    pub fn store(&self) -> &PositionStore {
        &self.store
    }

    pub fn space(&self) -> LayoutSpace {
        self.space
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn dragged_node(&self) -> Option<&str> {
        self.drag.dragged_node()
    }

    pub fn is_running(&self) -> bool {
        self.engine.as_ref().is_some_and(SimulationHandle::is_running)
    }

    pub fn select_node(&mut self, id: Option<&str>) {
        self.store.select_node(id);
    }

    /// Replace the canvas contents with `network`
    pub fn load_network(&mut self, network: &NetworkData) {
        self.store
            .sync_from_nodes(&network.nodes, &self.settings.layout_attribute);
        self.links = derive_links(network, &self.store);

        if self.engine_initialized() {
            let restart = self.is_running();
            let nodes = self.working_set(None);
            self.send_network(nodes, restart);
        }
    }

    /// Follow an edit of the network: new nodes are tracked, removed ones
    /// pruned, and a running engine keeps the state of everything else.
    pub fn apply_network_change(&mut self, network: &NetworkData) -> SyncDelta {
        let delta = self
            .store
            .sync_new_from_nodes(&network.nodes, &self.settings.layout_attribute);
        self.links = derive_links(network, &self.store);

        if self.engine_initialized() {
            let restart = self.is_running();
            let keep: Option<HashSet<&str>> = restart.then(|| {
                self.store
                    .members()
                    .iter()
                    .map(String::as_str)
                    .filter(|id| !delta.added.iter().any(|added| added.as_str() == *id))
                    .collect()
            });
            let nodes = self.working_set(keep.as_ref());
            self.send_network(nodes, restart);
        }
        delta
    }

    /// Simulation nodes for every member. Ids in `keep_engine_state` are sent
    /// unplaced so the engine retains its own position for them. A node
    /// pinned by an ongoing drag stays pinned.
    fn working_set(&self, keep_engine_state: Option<&HashSet<&str>>) -> Vec<SimulationNode> {
        let pinned = self.drag.pinned_node();
        self.store
            .members()
            .iter()
            .map(|id| {
                if keep_engine_state.is_some_and(|keep| keep.contains(id.as_str())) {
                    return SimulationNode::unplaced(id.clone());
                }
                let mut node = match self.store.get(id) {
                    Some(position) => SimulationNode::at(id.clone(), self.space.to_simulation(position)),
                    None => SimulationNode::unplaced(id.clone()),
                };
                node.fixed = pinned == Some(id.as_str());
                node
            })
            .collect()
    }

    /// Replace the engine's working set. Events already in flight were
    /// computed from the old one and are dropped by `pump`.
    fn send_network(&mut self, nodes: Vec<SimulationNode>, restart: bool) {
        let links = self.links.clone();
        if let Some(engine) = self.engine.as_mut() {
            engine.update_network(nodes, links, restart);
            self.barrier = engine.sent();
        }
    }

    /// Push the store's positions to an idle engine so resuming starts
    /// from what is on screen
    fn sync_idle_engine(&mut self) {
        if self.engine_initialized() && !self.is_running() {
            let nodes = self.working_set(None);
            self.send_network(nodes, false);
        }
    }

    /// Ignore `node_id` in events until the engine has applied every command sent so far
    fn hand_off(&mut self, node_id: &str) {
        if let Some(engine) = self.engine.as_ref() {
            self.handed_off.insert(node_id.to_string(), engine.sent());
        }
    }

    fn engine_initialized(&self) -> bool {
        self.engine
            .as_ref()
            .is_some_and(|e| e.is_initialized() && !e.is_terminated())
    }

    /// Spawn a fresh engine seeded from the store and run it from cold
    pub fn start_layout(&mut self) -> Result<()> {
        if let Some(mut previous) = self.engine.take() {
            previous.terminate();
        }

        let mut engine = SimulationHandle::spawn(self.settings.worker_config()).map_err(LayoutError::Spawn)?;
        let nodes = self.working_set(None);
        tracing::info!(
            "Starting layout: {} nodes ({} unplaced), {} links",
            nodes.len(),
            nodes.iter().filter(|n| !n.is_placed()).count(),
            self.links.len()
        );
        engine.initialize(nodes, self.links.clone(), self.settings.simulation.clone());
        engine.start();
        self.engine = Some(engine);
        self.barrier = 0;
        self.handed_off.clear();
        Ok(())
    }

    pub fn stop_layout(&mut self) {
        if let Some(engine) = self.engine.as_mut() {
            engine.stop();
        }
    }

    /// Resume the engine at the reheat alpha. A stopped engine first picks
    /// up any positions written to the store while it was idle.
    pub fn reheat_layout(&mut self) {
        if !self.engine_initialized() {
            return;
        }
        self.sync_idle_engine();
        if let Some(engine) = self.engine.as_mut() {
            engine.reheat();
        }
    }

    /// Rebuild the engine's forces and resume, from the store's positions
    /// when the engine was idle
    pub fn update_options(&mut self, options: SimulationOptions) {
        self.settings.simulation = options.clone();
        self.sync_idle_engine();
        if let Some(engine) = self.engine.as_mut() {
            engine.update_options(options);
        }
    }

    /// Move pending engine output into the store without blocking
    pub fn pump(&mut self) -> PumpSummary {
        let Some(engine) = self.engine.as_ref() else {
            return PumpSummary::default();
        };

        let mut summary = PumpSummary::default();
        for event in engine.drain() {
            summary.events += 1;
            summary.ended |= event.is_end() && event.applied() >= self.barrier;
            summary.written += self.ingest(&event);
        }
        if summary.ended {
            tracing::debug!("Layout settled after {} pumped events", summary.events);
        }
        summary
    }

    fn ingest(&mut self, event: &Event) -> usize {
        let applied = event.applied();
        if applied < self.barrier {
            tracing::trace!("Dropping event computed before the last network push");
            return 0;
        }

        let dragged = self.drag.dragged_node();
        let handed_off = &self.handed_off;
        let space = self.space;
        let entries: Vec<(&str, Position)> = event
            .nodes()
            .iter()
            .filter(|node| node.is_placed() && Some(node.id.as_str()) != dragged)
            .filter(|node| handed_off.get(&node.id).map_or(true, |&sent| applied >= sent))
            .map(|node| (node.id.as_str(), space.to_normalized(node.pos())))
            .collect();
        let written = self.store.set_batch_positions(entries);
        self.handed_off.retain(|_, sent| applied < *sent);
        written
    }

    /// Canvas moved or resized on screen
    pub fn set_canvas_rect(&mut self, rect: Rect) {
        self.drag.set_canvas_rect(rect);
        self.resize(CanvasDimensions::from_rect(rect));
    }

    /// Re-clamp the store and rescale the simulation space. An engine that
    /// is already laid out is moved into the new space, so nodes keep their
    /// place on the canvas.
    pub fn resize(&mut self, dimensions: CanvasDimensions) {
        self.store.set_canvas_dimensions(dimensions);
        let space = LayoutSpace::new(Some(dimensions), self.settings.default_extent);
        if space == self.space {
            return;
        }
        self.space = space;
        if self.engine_initialized() {
            let restart = self.is_running();
            let nodes = self.working_set(None);
            self.send_network(nodes, restart);
        }
    }

    pub fn pointer_down(&mut self, node_id: &str, pointer: Pos2) -> bool {
        let engine = self.engine.as_mut().map(|e| e as &mut dyn EngineControl);
        self.drag
            .pointer_down(node_id, pointer, &self.store, engine, self.space)
    }

    /// Document-level pointer move; returns the dragged node's new position
    pub fn pointer_move(&mut self, pointer: Pos2) -> Option<Position> {
        let engine = self.engine.as_mut().map(|e| e as &mut dyn EngineControl);
        self.drag
            .pointer_move(pointer, &mut self.store, engine, self.space)
    }

    pub fn pointer_up(&mut self, pointer: Option<Pos2>) -> Option<DragRelease> {
        let engine = self.engine.as_mut().map(|e| e as &mut dyn EngineControl);
        let release = self
            .drag
            .pointer_up(pointer, &mut self.store, engine, self.space)?;

        match release.target {
            ReleaseTarget::Engine => self.hand_off(&release.node_id),
            // unpin in the idle engine without resuming it
            ReleaseTarget::Store if release.stale_pin => self.sync_idle_engine(),
            ReleaseTarget::Store => {}
        }
        Some(release)
    }

    /// Abort the drag, leaving the node where it is
    pub fn cancel_drag(&mut self) -> Option<NodeId> {
        let engine = self.engine.as_mut().map(|e| e as &mut dyn EngineControl);
        let cancel = self.drag.cancel(&self.store, engine, self.space)?;
        if cancel.unpinned {
            self.hand_off(&cancel.node_id);
        } else if cancel.stale_pin {
            self.sync_idle_engine();
        }
        Some(cancel.node_id)
    }

    /// Place `node_id` at a point relative to the canvas's top-left corner
    pub fn drop_node(&mut self, node_id: &str, point: Pos2) -> bool {
        let Some(dimensions) = self.store.dimensions().filter(CanvasDimensions::is_measured) else {
            tracing::debug!("Drop of {} before the canvas was measured", node_id);
            return false;
        };
        let position = Position::new(point.x / dimensions.width, point.y / dimensions.height);
        self.place(node_id, position)
    }

    /// Place `node_id` under the last tracked pointer position
    pub fn drop_node_at_last_pointer(&mut self, node_id: &str) -> bool {
        match self.drag.last_pointer_position() {
            Some(position) => self.place(node_id, position),
            None => false,
        }
    }

    fn place(&mut self, node_id: &str, position: Position) -> bool {
        if !self.store.set_position(node_id, position) {
            return false;
        }
        if self.is_running() {
            if let (Some(stored), Some(engine)) = (self.store.get(node_id), self.engine.as_mut()) {
                engine.update_node(node_id, NodePatch::position(self.space.to_simulation(stored)));
                self.hand_off(node_id);
            }
        }
        true
    }

    /// Flush changed positions to the persisted network
    pub fn checkpoint<W: LayoutWriter + ?Sized>(&mut self, writer: &mut W) -> std::result::Result<usize, W::Error> {
        let written = self
            .store
            .sync_to_persisted(writer, &self.settings.layout_attribute)?;
        tracing::debug!("Checkpoint wrote {} positions", written);
        Ok(written)
    }
}

impl Drop for SociogramCanvas {
    fn drop(&mut self) {
        if let Some(mut engine) = self.engine.take() {
            engine.terminate();
        }
    }
}

/// One link per connected pair of member nodes, whatever the edge types
fn derive_links(network: &NetworkData, store: &PositionStore) -> Vec<Link> {
    let mut seen = HashSet::new();
    network
        .edges
        .iter()
        .filter(|edge| edge.from != edge.to && store.is_member(&edge.from) && store.is_member(&edge.to))
        .filter(|edge| {
            let pair = if edge.from < edge.to {
                (edge.from.as_str(), edge.to.as_str())
            } else {
                (edge.to.as_str(), edge.from.as_str())
            };
            seen.insert(pair)
        })
        .map(|edge| Link::new(edge.from.clone(), edge.to.clone()))
        .collect()
}

#[cfg(test)]
#[path = "canvas_tests.rs"]
mod tests;
