//! # sagekit Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the sagekit library. Import this module to get quick access to the essential
//! types for reading tables and decompiling scripts.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all sagekit operations
pub use crate::Error;

/// The result type used throughout sagekit
pub use crate::Result;

/// Configuration for the table codec and the decompiler
pub use crate::config::{CodecConfig, DecompilerConfig};

// ================================================================================================
// File Access
// ================================================================================================

/// Input files and seekable streams
pub use crate::file::{BinaryReader, BinaryWriter, File, Positioned};

// ================================================================================================
// SLB Tables
// ================================================================================================

/// Record declaration
pub use crate::slb::{FieldAttrs, FieldFlags, RecordBuilder, SlbRecord};

/// Reading and writing
pub use crate::slb::{SlbContainer, TreeReader, TreeWriter};

// ================================================================================================
// OSI Bytecode
// ================================================================================================

/// Decoding
pub use crate::osi::{Instruction, Module, Operation, Subroutine};

/// Decompilation
pub use crate::osi::{Decompiler, ReducedGraph, SubroutineGraph};

// ================================================================================================
// LSS Statements
// ================================================================================================

/// Statement tree and rendering
pub use crate::lss::{render, Expression, Statement};

// ================================================================================================
// Graphs
// ================================================================================================

/// Flow graph primitives
pub use crate::utils::graph::{FlowGraph, JumpType, NodeId};
