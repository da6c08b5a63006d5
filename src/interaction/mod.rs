//! Pointer interaction on the canvas.

pub mod drag;

pub use drag::{DragCancel, DragInteractionController, DragRelease, EngineControl, ReleaseTarget};
