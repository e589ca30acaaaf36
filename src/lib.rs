// Copyright 2025 Johann Kempter
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
#![allow(clippy::too_many_arguments)]
//#![deny(unsafe_code)]
// - 'file/physical.rs' uses mmap to map a file into memory

//! # abiscope
//!
//! Deterministic ABI-only projections of compiled JVM class files.
//!
//! Build systems that compile a module against its dependencies only need to recompile when the
//! *contract* of a dependency changes: its public and protected declarations, its generic
//! signatures, its compile-time constants and the bodies of functions that callers inline.
//! `abiscope` reads the class files of a module and produces exactly that contract, encoded in a
//! canonical byte form. Editing a private helper, renaming a local variable or moving a line
//! leaves the artifact byte-identical, so its digest can serve as a cache key.
//!
//! ## Features
//!
//! - **Full class file model** - Constant pool, members, annotations, signatures, code and
//!   stack map frames are decoded into owned values
//! - **Declarative policy** - One table decides what survives, see [`abi::policy`]
//! - **Inline awareness** - Bodies that callers copy are kept, together with everything they
//!   reach, even private declarations
//! - **Canonical output** - Sorted members and attributes, deterministic constant pools, no
//!   debug information
//! - **Atomic publication** - The output directory is replaced in one rename
//! - **Parallel** - Containers are parsed, pruned and encoded on the rayon thread pool
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use abiscope::prelude::*;
//! use std::path::Path;
//!
//! let source = ModuleSource::from_directory(Path::new("build/classes/kotlin/main"))?;
//! let artifact = generate_abi(&source, Path::new("build/abi"))?;
//! println!("ABI digest: {}", artifact.digest());
//! # Ok::<(), abiscope::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`prelude`] - Convenient re-exports of commonly used types
//! - [`classfile`] - Reading, modelling and building class files
//! - [`module`] - Module inputs and the parsed module index
//! - [`abi`] - The generation pipeline: policy, marking, rewriting, serialization, assembly
//! - [`Error`] and [`Result`] - Error handling
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T>`], aliased to `std::result::Result<T, Error>`.
//! Input problems are reported per container, and nothing is published unless the whole
//! module was processed successfully.
//!
//! ### Testing
//!
//! ```bash
//! cargo test
//! cargo bench
//! ```
#[macro_use]
pub(crate) mod error;
pub mod file;

/// Convenient re-exports of the most commonly used types.
///
/// # Example
///
/// ```rust,no_run
/// use abiscope::prelude::*;
///
/// let source = ModuleSource::new().with_container("a/A.class", std::fs::read("A.class")?);
/// let artifact = AbiGenerator::default().generate(&source)?;
/// # Ok::<(), abiscope::Error>(())
/// ```
pub mod prelude;

/// The class file model.
///
/// Class files are decoded into a [`classfile::DeclarationUnit`] holding resolved constants,
/// members and attributes. [`classfile::builder`] constructs units programmatically.
pub mod classfile;

/// Module inputs and the parsed module index.
pub mod module;

/// The ABI generation pipeline.
pub mod abi;

/// `abiscope` Result type
///
/// A type alias for `std::result::Result<T, Error>` where the error type is always [`Error`].
///
/// # Examples
///
/// ```rust,no_run
/// use abiscope::{classfile::DeclarationUnit, Result};
///
/// fn load(path: &str) -> Result<DeclarationUnit> {
///     DeclarationUnit::parse(&std::fs::read(path)?)
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// `abiscope` Error type
///
/// The main error type for all operations in this crate.
pub use error::Error;

/// Generate and publish the ABI of a module in one call.
pub use abi::generate_abi;

/// Configurable pipeline entry point.
pub use abi::{AbiGenConfig, AbiGenerator};

/// The generated artifact.
pub use abi::assemble::AbiArtifact;

/// Module inputs and index.
pub use module::{InlineHints, Module, ModuleSource};

/// Low-level cursor over container bytes.
pub use file::parser::Parser;
