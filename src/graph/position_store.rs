//! Reactive store of normalized node positions for one mounted canvas.
//!
//! The store has two writers, simulation ticks and drag overrides, and every
//! write goes through the boundary clamp. Readers either query it directly
//! or subscribe to the revision counter and re-read on change.

use super::clamp::Margin;
use super::sync::{self, LayoutWriter};
use super::types::{CanvasDimensions, NodeId, PersistedNode, Position};
use std::collections::{HashMap, HashSet};
use tokio::sync::watch;

/// Nodes added and removed by an incremental resync
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncDelta {
    pub added: Vec<NodeId>,
    pub removed: Vec<NodeId>,
}

impl SyncDelta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

pub struct PositionStore {
    /// Node positions (id -> normalized position)
    positions: HashMap<NodeId, Position>,
    /// Ids of the network currently on the canvas, in network order
    members: Vec<NodeId>,
    member_set: HashSet<NodeId>,
    /// Last value written to (or read from) the persisted model per node
    persisted: HashMap<NodeId, Position>,
    dimensions: Option<CanvasDimensions>,
    node_radius: f32,
    padding: f32,
    margin: Margin,
    selected: Option<NodeId>,
    revision: watch::Sender<u64>,
}

impl PositionStore {
    pub fn new(node_radius: f32, padding: f32) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            positions: HashMap::new(),
            members: Vec::new(),
            member_set: HashSet::new(),
            persisted: HashMap::new(),
            dimensions: None,
            node_radius,
            padding,
            margin: Margin::NONE,
            selected: None,
            revision,
        }
    }

    /// Clamp and store one position. Returns false for ids outside the network.
    pub fn set_position(&mut self, id: &str, position: Position) -> bool {
        let applied = self.insert_clamped(id, position);
        if applied {
            self.bump();
        }
        applied
    }

    /// Clamp and store a batch of positions under a single revision.
    /// Returns how many entries were applied.
    pub fn set_batch_positions<I, S>(&mut self, entries: I) -> usize
    where
        I: IntoIterator<Item = (S, Position)>,
        S: AsRef<str>,
    {
        let applied = entries
            .into_iter()
            .filter(|(id, position)| self.insert_clamped(id.as_ref(), *position))
            .count();
        if applied > 0 {
            self.bump();
        }
        applied
    }

    /// Record new canvas dimensions and re-clamp every stored position
    pub fn set_canvas_dimensions(&mut self, dimensions: CanvasDimensions) {
        self.dimensions = Some(dimensions);
        self.margin = Margin::for_canvas(self.dimensions, self.node_radius, self.padding);
        let margin = self.margin;
        for position in self.positions.values_mut() {
            *position = margin.apply(*position);
        }
        tracing::trace!(
            "Canvas resized to {}x{}, re-clamped {} positions",
            dimensions.width,
            dimensions.height,
            self.positions.len()
        );
        self.bump();
    }

    /// Replace everything from the persisted layout attribute.
    ///
    /// Used when the network is swapped wholesale (e.g. revisiting a stage).
    /// Nodes without a readable attribute become members with no position.
    pub fn sync_from_nodes(&mut self, nodes: &[PersistedNode], layout_attribute: &str) {
        self.positions.clear();
        self.persisted.clear();
        self.set_members(nodes);

        let margin = self.margin;
        for node in nodes {
            if let Some(position) = node.layout_position(layout_attribute) {
                self.positions.insert(node.id.clone(), margin.apply(position));
                self.persisted.insert(node.id.clone(), position);
            }
        }
        self.prune_selection();

        tracing::debug!(
            "Synced {} nodes ({} placed) from '{}'",
            nodes.len(),
            self.positions.len(),
            layout_attribute
        );
        self.bump();
    }

    /// Incremental resync: track new nodes, drop removed ones, leave the rest alone.
    pub fn sync_new_from_nodes(&mut self, nodes: &[PersistedNode], layout_attribute: &str) -> SyncDelta {
        let incoming: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();

        let removed: Vec<NodeId> = self
            .members
            .iter()
            .filter(|id| !incoming.contains(id.as_str()))
            .cloned()
            .collect();
        for id in &removed {
            self.positions.remove(id);
            self.persisted.remove(id);
        }

        let mut added = Vec::new();
        let margin = self.margin;
        for node in nodes {
            if self.member_set.contains(&node.id) {
                continue;
            }
            if let Some(position) = node.layout_position(layout_attribute) {
                self.positions.insert(node.id.clone(), margin.apply(position));
                self.persisted.insert(node.id.clone(), position);
            }
            added.push(node.id.clone());
        }

        self.set_members(nodes);
        self.prune_selection();

        let delta = SyncDelta { added, removed };
        if !delta.is_empty() {
            tracing::debug!(
                "Incremental sync: +{} -{} nodes",
                delta.added.len(),
                delta.removed.len()
            );
            self.bump();
        }
        delta
    }

    /// Flush changed positions through `writer`; returns the number written
    pub fn sync_to_persisted<W: LayoutWriter + ?Sized>(
        &mut self,
        writer: &mut W,
        layout_attribute: &str,
    ) -> Result<usize, W::Error> {
        sync::flush(&self.positions, &mut self.persisted, writer, layout_attribute)
    }

    /// Track a single selected node (or clear it with `None`)
    pub fn select_node(&mut self, id: Option<&str>) {
        let next = id.filter(|id| self.member_set.contains(*id)).map(str::to_string);
        if next != self.selected {
            self.selected = next;
            self.bump();
        }
    }

    pub fn get(&self, id: &str) -> Option<Position> {
        self.positions.get(id).copied()
    }

    pub fn positions(&self) -> &HashMap<NodeId, Position> {
        &self.positions
    }

    /// Member ids in network order
    pub fn members(&self) -> &[NodeId] {
        &self.members
    }

    pub fn is_member(&self, id: &str) -> bool {
        self.member_set.contains(id)
    }

    /// Members that have no position yet
    pub fn unplaced(&self) -> Vec<NodeId> {
        self.members
            .iter()
            .filter(|id| !self.positions.contains_key(*id))
            .cloned()
            .collect()
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn dimensions(&self) -> Option<CanvasDimensions> {
        self.dimensions
    }

    pub fn margin(&self) -> Margin {
        self.margin
    }

    /// Clamp a position with the store's current margin without storing it
    pub fn clamp(&self, position: Position) -> Position {
        self.margin.apply(position)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Current revision; increases on every mutation batch
    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    /// Change notifications for the rendering layer
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    fn insert_clamped(&mut self, id: &str, position: Position) -> bool {
        if !self.member_set.contains(id) {
            tracing::trace!("Ignoring position for unknown node {}", id);
            return false;
        }
        let clamped = self.margin.apply(position);
        match self.positions.get_mut(id) {
            Some(existing) => *existing = clamped,
            None => {
                self.positions.insert(id.to_string(), clamped);
            }
        }
        true
    }

    fn set_members(&mut self, nodes: &[PersistedNode]) {
        self.members = nodes.iter().map(|n| n.id.clone()).collect();
        self.member_set = self.members.iter().cloned().collect();
    }

    fn prune_selection(&mut self) {
        if let Some(selected) = &self.selected {
            if !self.member_set.contains(selected) {
                self.selected = None;
            }
        }
    }

    fn bump(&mut self) {
        self.revision.send_modify(|rev| *rev += 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const ATTR: &str = "layout";

    fn placed(id: &str, x: f32, y: f32) -> PersistedNode {
        PersistedNode::new(id).with_layout(ATTR, Position::new(x, y))
    }

    fn store_with(nodes: &[PersistedNode]) -> PositionStore {
        let mut store = PositionStore::new(20.0, 10.0);
        store.sync_from_nodes(nodes, ATTR);
        store
    }

    #[test]
    fn round_trip_from_layout_attribute() {
        let nodes = vec![placed("a", 0.1, 0.2), placed("b", 0.75, 0.5), placed("c", 0.0, 1.0)];
        let store = store_with(&nodes);
        for node in &nodes {
            assert_eq!(store.get(&node.id), node.layout_position(ATTR));
        }
    }

    #[test]
    fn unplaced_nodes_are_members_without_position() {
        let nodes = vec![placed("a", 0.1, 0.2), PersistedNode::new("b")];
        let store = store_with(&nodes);
        assert_eq!(store.len(), 1);
        assert!(store.is_member("b"));
        assert_eq!(store.get("b"), None);
        assert_eq!(store.unplaced(), vec!["b".to_string()]);
    }

    #[test]
    fn set_position_clamps_and_ignores_strangers() {
        let mut store = store_with(&[placed("a", 0.5, 0.5)]);
        store.set_canvas_dimensions(CanvasDimensions::new(300.0, 300.0));

        assert!(store.set_position("a", Position::new(2.0, -1.0)));
        let p = store.get("a").unwrap();
        assert!((p.x - 0.9).abs() < 1e-6);
        assert!((p.y - 0.1).abs() < 1e-6);

        assert!(!store.set_position("zzz", Position::CENTER));
        assert_eq!(store.get("zzz"), None);
    }

    #[test]
    fn batch_is_one_revision() {
        let mut store = store_with(&[placed("a", 0.1, 0.1), placed("b", 0.2, 0.2)]);
        let before = store.revision();
        let applied = store.set_batch_positions(vec![
            ("a", Position::new(0.3, 0.3)),
            ("b", Position::new(0.4, 0.4)),
            ("nope", Position::new(0.5, 0.5)),
        ]);
        assert_eq!(applied, 2);
        assert_eq!(store.revision(), before + 1);
        assert_eq!(store.get("b"), Some(Position::new(0.4, 0.4)));
    }

    #[test]
    fn shrinking_canvas_moves_edge_nodes_inward() {
        let mut store = store_with(&[placed("edge", 0.99, 0.01), placed("mid", 0.5, 0.5)]);
        store.set_canvas_dimensions(CanvasDimensions::new(2000.0, 2000.0));
        let wide = store.get("edge").unwrap();
        assert!((wide.x - 0.985).abs() < 1e-6);

        store.set_canvas_dimensions(CanvasDimensions::new(200.0, 200.0));
        let narrow = store.get("edge").unwrap();
        let margin = store.margin();
        assert!(narrow.x < wide.x);
        assert!(narrow.x <= 1.0 - margin.x && narrow.y >= margin.y);
        assert_eq!(store.get("mid"), Some(Position::CENTER));
    }

    #[test]
    fn incremental_sync_prunes_and_preserves() {
        let mut store = store_with(&[placed("a", 0.1, 0.1), placed("b", 0.2, 0.2)]);
        // Simulation has moved "a" since the last sync
        store.set_position("a", Position::new(0.6, 0.6));
        store.select_node(Some("b"));

        let next = vec![placed("a", 0.1, 0.1), placed("c", 0.3, 0.3), PersistedNode::new("d")];
        let delta = store.sync_new_from_nodes(&next, ATTR);

        assert_eq!(delta.added, vec!["c".to_string(), "d".to_string()]);
        assert_eq!(delta.removed, vec!["b".to_string()]);
        assert_eq!(store.get("a"), Some(Position::new(0.6, 0.6)));
        assert_eq!(store.get("b"), None);
        assert_eq!(store.get("c"), Some(Position::new(0.3, 0.3)));
        assert_eq!(store.unplaced(), vec!["d".to_string()]);
        assert_eq!(store.selected(), None);
    }

    #[test]
    fn unchanged_resync_is_empty_delta() {
        let nodes = vec![placed("a", 0.1, 0.1)];
        let mut store = store_with(&nodes);
        let before = store.revision();
        assert!(store.sync_new_from_nodes(&nodes, ATTR).is_empty());
        assert_eq!(store.revision(), before);
    }

    #[test]
    fn second_flush_writes_nothing() {
        let mut store = store_with(&[placed("a", 0.1, 0.1), PersistedNode::new("b")]);
        store.set_position("a", Position::new(0.4, 0.4));
        store.set_position("b", Position::new(0.6, 0.6));

        let mut writes = 0;
        let mut writer = |_: &str, _: &str, _: Position| -> Result<(), ()> {
            writes += 1;
            Ok(())
        };
        assert_eq!(store.sync_to_persisted(&mut writer, ATTR), Ok(2));
        assert_eq!(store.sync_to_persisted(&mut writer, ATTR), Ok(0));
        drop(writer);
        assert_eq!(writes, 2);
    }

    #[test]
    fn freshly_synced_store_flushes_nothing() {
        let mut store = store_with(&[placed("a", 0.1, 0.1), placed("b", 0.9, 0.2)]);
        let mut writer = |_: &str, _: &str, _: Position| -> Result<(), ()> { Err(()) };
        assert_eq!(store.sync_to_persisted(&mut writer, ATTR), Ok(0));
    }

    #[test]
    fn selection_only_accepts_members() {
        let mut store = store_with(&[placed("a", 0.1, 0.1)]);
        store.select_node(Some("ghost"));
        assert_eq!(store.selected(), None);
        store.select_node(Some("a"));
        assert_eq!(store.selected(), Some("a"));
        store.select_node(None);
        assert_eq!(store.selected(), None);
    }

    #[test]
    fn subscribers_see_revisions() {
        let mut store = store_with(&[placed("a", 0.1, 0.1)]);
        let mut rx = store.subscribe();
        rx.mark_unchanged();
        store.set_position("a", Position::new(0.2, 0.2));
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), store.revision());
    }

    #[tokio::test]
    async fn subscriber_wakes_on_batch() {
        let mut store = store_with(&[placed("a", 0.1, 0.1), placed("b", 0.2, 0.2)]);
        let mut rx = store.subscribe();
        rx.mark_unchanged();

        let waiter = tokio::spawn(async move {
            rx.changed().await.unwrap();
            *rx.borrow()
        });
        let before = store.revision();
        store.set_batch_positions([("a", Position::new(0.3, 0.3)), ("b", Position::new(0.4, 0.4))]);

        assert_eq!(waiter.await.unwrap(), before + 1);
    }
}
