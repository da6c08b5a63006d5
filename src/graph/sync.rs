//! One-directional flush of layout positions into the persisted network.
//!
//! Flushing happens at logical checkpoints (stage exit, drag release, layout
//! end), never per tick. Only positions that differ from the last value known
//! to be persisted are written, so re-flushing an unchanged store is free.

use super::types::{encode_layout, NetworkData, NodeId, Position};
use std::collections::HashMap;
use std::convert::Infallible;

/// Destination for layout writes.
///
/// Any `FnMut(&str, &str, Position) -> Result<(), E>` closure is a writer.
pub trait LayoutWriter {
    type Error;

    fn write_layout(
        &mut self,
        node_id: &str,
        attribute: &str,
        position: Position,
    ) -> Result<(), Self::Error>;
}

impl<F, E> LayoutWriter for F
where
    F: FnMut(&str, &str, Position) -> Result<(), E>,
{
    type Error = E;

    fn write_layout(&mut self, node_id: &str, attribute: &str, position: Position) -> Result<(), E> {
        self(node_id, attribute, position)
    }
}

/// In-memory network as a writer: sets the attribute on the matching node.
/// Ids with no matching node are skipped.
impl LayoutWriter for NetworkData {
    type Error = Infallible;

    fn write_layout(&mut self, node_id: &str, attribute: &str, position: Position) -> Result<(), Infallible> {
        match self.node_mut(node_id) {
            Some(node) => {
                node.attributes
                    .insert(attribute.to_string(), encode_layout(position));
            }
            None => tracing::debug!("No persisted node {} for layout write", node_id),
        }
        Ok(())
    }
}

/// Write every position that differs from `persisted`, in id order.
///
/// Each successful write is recorded in `persisted` before the next one is
/// attempted; the first writer error is returned unchanged.
pub fn flush<W: LayoutWriter + ?Sized>(
    positions: &HashMap<NodeId, Position>,
    persisted: &mut HashMap<NodeId, Position>,
    writer: &mut W,
    attribute: &str,
) -> Result<usize, W::Error> {
    let mut pending: Vec<(&NodeId, Position)> = positions
        .iter()
        .filter(|(id, pos)| persisted.get(*id) != Some(*pos))
        .map(|(id, pos)| (id, *pos))
        .collect();
    pending.sort_by(|a, b| a.0.cmp(b.0));

    let mut written = 0;
    for (id, position) in pending {
        writer.write_layout(id, attribute, position)?;
        persisted.insert(id.clone(), position);
        written += 1;
    }

    if written > 0 {
        tracing::debug!("Flushed {} layout positions to '{}'", written, attribute);
    }
    Ok(written)
}
