//! Flow graph primitives shared by the block builder and the control-flow reducer.
//!
//! - [`NodeId`] - Stable index of a node in a graph arena
//! - [`JumpType`] - Kind of an edge (always, conditional true, conditional false)
//! - [`FlowGraph`] - Arena graph with `Start`/`End` sentinels

mod flow;
mod jump;
mod node;

pub use flow::FlowGraph;
pub use jump::JumpType;
pub use node::NodeId;
