//! OSI bytecode decoding and decompilation.
//!
//! OSI is the compiled form of LSS scripts: a stack machine with forward and backward
//! relative branches. Decompilation runs in four stages:
//!
//! - [`decoder`] reads a module and decodes each subroutine into [`Instruction`]s
//! - [`builder`] splits the instructions into basic blocks joined by typed jumps
//! - [`reconstruct`] evaluates each block on a symbolic stack, yielding statements
//! - [`fold`] rewrites branch and loop shapes into `if`, `else` and `while`
//!
//! [`Decompiler`] drives the whole pipeline.
//!
//! # Examples
//!
//! ```rust,no_run
//! use sagekit::{file::File, osi::{Decompiler, Module}, lss::render};
//! use std::path::Path;
//!
//! let file = File::from_file(Path::new("script.osi"))?;
//! let module = Module::parse(file.data())?;
//!
//! for decompiled in Decompiler::default().decompile_all(&module) {
//!     match decompiled.result {
//!         Ok(reduced) => match reduced.body() {
//!             Some(body) => println!("sub {} {{\n{}}}", decompiled.name, render(body)),
//!             None => println!("{}", reduced.to_dot(&decompiled.name)),
//!         },
//!         Err(error) => eprintln!("{}: {}", decompiled.name, error),
//!     }
//! }
//! # Ok::<(), sagekit::Error>(())
//! ```

pub mod builder;
pub mod decoder;
pub mod decompiler;
pub mod fold;
pub mod instruction;
pub mod reconstruct;

pub use builder::{build_graph, OsiBlock, SubroutineGraph};
pub use decoder::{decode_stream, encode_stream, Module, Subroutine, OSI_MAGIC};
pub use decompiler::{DecompiledSubroutine, Decompiler, ReducedGraph};
pub use fold::{fold, FoldKind};
pub use instruction::{FlowType, Instruction, Opcode, Operation};
pub use reconstruct::{reconstruct, LssBlock, StackContext};
