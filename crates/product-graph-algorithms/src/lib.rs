pub mod common;
pub mod topology;

pub use common::{GraphView, NodeId};
pub use topology::{dependency_depths, dependency_order, TopologyError, TopologyResult};
