//! Force-directed layout simulation and the worker that runs it off the UI thread.

pub mod engine;
pub mod forces;
pub mod protocol;
pub mod quadtree;
pub mod types;
pub mod worker;

pub use engine::Simulation;
pub use protocol::{Command, Event};
pub use types::{Link, NodePatch, SimulationNode, SimulationOptions, REHEAT_ALPHA};
pub use worker::{SimulationHandle, WorkerConfig};
