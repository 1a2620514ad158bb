// Copyright 2025 sagekit contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
// - 'file/physical.rs' uses mmap to map a file into memory

//! # sagekit
//!
//! Binary table codec and bytecode decompiler for SAGE engine-family game assets.
//!
//! `sagekit` covers the two pieces of the asset pipeline that carry real logic:
//!
//! - **SLB tables** - a declarative tree codec. A record type lists its fields once; the
//!   resulting schema reads and writes the offset-relative binary layout byte for byte,
//!   including counted lists, out-of-line strings, padding and footer alignment.
//! - **OSI bytecode** - a decompiler for compiled LSS scripts. Instructions are split into
//!   basic blocks, rebuilt into statements on a symbolic stack and folded back into
//!   `if`, `else` and `while`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sagekit::prelude::*;
//! use std::path::Path;
//!
//! let file = File::from_file(Path::new("scripts/title.osi"))?;
//! let module = Module::parse(file.data())?;
//!
//! for decompiled in Decompiler::default().decompile_all(&module) {
//!     if let Ok(reduced) = decompiled.result {
//!         if let Some(body) = reduced.body() {
//!             println!("{}:\n{}", decompiled.name, render(body));
//!         }
//!     }
//! }
//! # Ok::<(), sagekit::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`file`] - file backends and the seekable [`file::BinaryReader`] / [`file::BinaryWriter`]
//! - [`slb`] - schema tree, tree reader, tree writer and container framing
//! - [`osi`] - instruction decoding, block graph, reconstruction and folding
//! - [`lss`] - the statement tree the decompiler produces
//! - [`utils`] - the flow graph shared by the decompiler stages
//! - [`config`] - codec and decompiler settings
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, Error>`](Result). Errors abort the current input;
//! batch entry points such as [`osi::Decompiler::decompile_all`] report one result per
//! item instead.
//!
//! ```rust
//! use sagekit::{slb::SlbContainer, Error};
//!
//! # #[derive(Default)] struct Empty { x: u8 }
//! # impl sagekit::slb::SlbRecord for Empty {
//! #     const TYPE_NAME: &'static str = "Empty";
//! #     fn describe(f: &mut sagekit::slb::RecordBuilder<Self>) {
//! #         f.field("x", Default::default(), |e| &e.x, |e, v| e.x = v);
//! #     }
//! # }
//! match SlbContainer::new(*b"TBL\0").from_bytes::<Empty>(b"OSI\0....") {
//!     Err(Error::BadMagic { found, .. }) => assert_eq!(&found, b"OSI\0"),
//!     _ => unreachable!(),
//! }
//! ```
//!
//! ## Logging
//!
//! The crate logs through the [`log`](https://docs.rs/log) facade and installs no logger.
//! Structural events (schema built, block split, fold applied) are `debug`, per field and
//! per instruction detail is `trace`, tolerated anomalies are `warn`.

#[macro_use]
pub(crate) mod error;

/// Codec and decompiler configuration.
pub mod config;

/// File backends and seekable little-endian streams.
///
/// [`file::File`] gives uniform byte access to memory-mapped files and in-memory buffers.
/// [`file::BinaryReader`] and [`file::BinaryWriter`] wrap any seekable stream and share the
/// [`file::Positioned`] trait, whose guard restores the stream position on every exit path.
pub mod file;

/// LSS statement tree.
pub mod lss;

/// OSI bytecode decoding and decompilation.
///
/// # Key Types
///
/// - [`osi::Module`] / [`osi::Subroutine`] - decoded bytecode
/// - [`osi::SubroutineGraph`] - basic blocks joined by typed jumps
/// - [`osi::Decompiler`] - the full pipeline, one subroutine or a whole module
/// - [`osi::ReducedGraph`] - the folded result
pub mod osi;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use sagekit::prelude::*;
///
/// let decompiler = Decompiler::new(DecompilerConfig::conservative());
/// assert!(!decompiler.config().fold_inverted_if);
/// ```
pub mod prelude;

/// SLB tree codec.
///
/// # Key Types
///
/// - [`slb::SlbRecord`] - implemented by every table record type
/// - [`slb::DataNode`] - the cached schema of a record type
/// - [`slb::TreeReader`] / [`slb::TreeWriter`] - schema driven read and write passes
/// - [`slb::SlbContainer`] - whole-table framing
pub mod slb;

/// Shared graph and formatting utilities.
pub mod utils;

/// `sagekit` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `sagekit` Error type
///
/// The main error type for all operations in this crate.
pub use error::Error;

pub use config::{CodecConfig, DecompilerConfig};
