//! Messages exchanged with the simulation worker.

use super::types::{Link, NodePatch, SimulationNode, SimulationOptions};
use crate::graph::types::NodeId;
use serde::{Deserialize, Serialize};

/// Inbound commands, processed in order by the worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Build a simulation at rest (alpha 0)
    Initialize {
        nodes: Vec<SimulationNode>,
        links: Vec<Link>,
        options: SimulationOptions,
    },
    /// Cold start at alpha 1
    Start,
    /// Halt and emit `End`; no-op when already stopped
    Stop,
    /// Resume at alpha 0.3 keeping positions
    Reheat,
    /// Rebuild forces and resume at alpha 0.3
    UpdateOptions { options: SimulationOptions },
    /// Replace the working set; reheat only when `restart`
    UpdateNetwork {
        nodes: Vec<SimulationNode>,
        links: Vec<Link>,
        restart: bool,
    },
    /// Patch one node by id and resume at alpha 0.3
    UpdateNode { node_id: NodeId, patch: NodePatch },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Initialize { .. } => "initialize",
            Command::Start => "start",
            Command::Stop => "stop",
            Command::Reheat => "reheat",
            Command::UpdateOptions { .. } => "update_options",
            Command::UpdateNetwork { .. } => "update_network",
            Command::UpdateNode { .. } => "update_node",
        }
    }
}

/// Outbound events.
///
/// `applied` is the number of commands the worker had taken in when the
/// event was produced, so the receiver can tell which of its commands an
/// event already reflects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// One integration step completed
    Tick {
        nodes: Vec<SimulationNode>,
        #[serde(default)]
        applied: u64,
    },
    /// Converged or explicitly stopped
    End {
        nodes: Vec<SimulationNode>,
        #[serde(default)]
        applied: u64,
    },
}

impl Event {
    pub fn nodes(&self) -> &[SimulationNode] {
        match self {
            Event::Tick { nodes, .. } | Event::End { nodes, .. } => nodes,
        }
    }

    pub fn applied(&self) -> u64 {
        match self {
            Event::Tick { applied, .. } | Event::End { applied, .. } => *applied,
        }
    }

    pub fn is_end(&self) -> bool {
        matches!(self, Event::End { .. })
    }
}
