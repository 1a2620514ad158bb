//! Shared helpers used by the codec and the decompiler.

mod dot;
pub mod graph;

pub use dot::escape_dot;
