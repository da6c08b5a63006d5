//! Force-directed sociogram layout.
//!
//! Positions the nodes of a participant network on a canvas, animates them
//! with a force simulation running on its own thread, lets the user drag
//! nodes mid-simulation, and writes final positions back into the persisted
//! network at checkpoints.

pub mod canvas;
pub mod error;
pub mod graph;
pub mod interaction;
pub mod settings;
pub mod simulation;

pub use canvas::{PumpSummary, SociogramCanvas};
pub use error::LayoutError;
pub use settings::LayoutSettings;
