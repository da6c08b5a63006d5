//! Network data, canvas geometry and the position store.

pub mod clamp;
pub mod position_store;
pub mod space;
pub mod sync;
pub mod types;

pub use clamp::{clamp, Margin};
pub use position_store::{PositionStore, SyncDelta};
pub use space::LayoutSpace;
pub use sync::LayoutWriter;
pub use types::{CanvasDimensions, NetworkData, NodeId, PersistedEdge, PersistedNode, Position};
