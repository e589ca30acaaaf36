//! ABI generation pipeline.
//!
//! This module turns the compiled containers of one module into its ABI-only projection: the
//! subset of declarations, signatures and inline bodies that dependents compile against, in a
//! canonical byte form so that the artifact (and its [`AbiArtifact::digest`]) only changes when
//! the contract does.
//!
//! # Architecture
//!
//! The pipeline runs in strict phases:
//!
//! 1. **Read** - every container is parsed into a [`crate::classfile::DeclarationUnit`]
//!    ([`crate::module::Module::read`])
//! 2. **Flag** - methods whose bodies callers copy are flagged
//!    ([`crate::module::Module::flag_inline_methods`])
//! 3. **Mark** - the [`policy`] table seeds a global reachability pass over the whole module
//!    ([`mark::Marking::compute`])
//! 4. **Rewrite** - each kept unit is pruned and canonicalized independently
//!    ([`rewrite::prune_unit`]) and checked for dangling references
//! 5. **Serialize** - each pruned unit is encoded with a freshly built constant pool
//!    ([`serialize::write_unit`])
//! 6. **Assemble** - class files and module resources are collected into an [`AbiArtifact`],
//!    which can be published atomically
//!
//! Phases 1, 4 and 5 process units in parallel; marking is global and runs on one thread.
//!
//! # Key Components
//!
//! - [`AbiGenerator`] - Configured entry point running the whole pipeline
//! - [`AbiGenConfig`] - Output location and threading options
//! - [`generate_abi`] - One-call convenience wrapper
//! - [`policy`] - The visibility policy table
//! - [`mark`] - Global marking
//! - [`rewrite`] - Per-unit pruning and canonical ordering
//! - [`pool`] - Deterministic constant pool construction
//! - [`serialize`] - Class file encoding
//! - [`assemble`] - The artifact and its publication
//!
//! # Examples
//!
//! ```rust,no_run
//! use abiscope::{AbiGenConfig, AbiGenerator, ModuleSource};
//! use std::path::{Path, PathBuf};
//!
//! let source = ModuleSource::from_directory(Path::new("build/classes/kotlin/main"))?;
//! let generator = AbiGenerator::new(AbiGenConfig::new(PathBuf::from("build/abi")))
//!     .with_inline_function("app/UtilsKt", "measure", "(Lkotlin/jvm/functions/Function0;)J");
//!
//! let artifact = generator.run(&source)?;
//! println!("{} entries, digest {}", artifact.len(), artifact.digest());
//! # Ok::<(), abiscope::Error>(())
//! ```

pub mod assemble;
pub mod mark;
pub mod policy;
pub mod pool;
pub mod rewrite;
pub mod serialize;

use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::{
    classfile::constant::MemberRef,
    module::{InlineHints, Module, ModuleSource},
    Error, Result,
};

pub use assemble::AbiArtifact;
pub use mark::Marking;

/// Options of an ABI generation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbiGenConfig {
    /// Directory the artifact is published to by [`AbiGenerator::run`]
    pub output_dir: PathBuf,
    /// Parse, rewrite and serialize units on the rayon thread pool
    pub parallel: bool,
}

impl AbiGenConfig {
    /// Configuration publishing to `output_dir`, with parallelism enabled.
    #[must_use]
    pub fn new(output_dir: PathBuf) -> Self {
        AbiGenConfig {
            output_dir,
            parallel: true,
        }
    }

    /// Enable or disable parallel processing.
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

impl Default for AbiGenConfig {
    fn default() -> Self {
        AbiGenConfig::new(PathBuf::from("abi"))
    }
}

/// Runs the ABI pipeline over a module.
#[derive(Debug, Clone, Default)]
pub struct AbiGenerator {
    config: AbiGenConfig,
    hints: InlineHints,
}

impl AbiGenerator {
    /// Create a generator with the given configuration.
    #[must_use]
    pub fn new(config: AbiGenConfig) -> Self {
        AbiGenerator {
            config,
            hints: InlineHints::new(),
        }
    }

    /// Declare a method as inline even though it carries no inline marker.
    ///
    /// Front-ends know which functions are `inline` from their own metadata; this is how they
    /// pass that knowledge on.
    #[must_use]
    pub fn with_inline_function(mut self, owner: &str, name: &str, descriptor: &str) -> Self {
        self.hints.insert(MemberRef::new(owner, name, descriptor));
        self
    }

    /// Replace all inline hints.
    #[must_use]
    pub fn with_inline_hints(mut self, hints: InlineHints) -> Self {
        self.hints = hints;
        self
    }

    /// The configuration of this generator.
    #[must_use]
    pub fn config(&self) -> &AbiGenConfig {
        &self.config
    }

    /// Compute the ABI artifact of a module without writing it anywhere.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedContainer`] for unreadable containers,
    /// [`crate::Error::UnresolvableInlineReference`] if an inline body depends on something that
    /// does not exist, [`crate::Error::PoolOverflow`] if a pruned unit cannot be encoded and
    /// [`crate::Error::DanglingReference`] on internal inconsistencies.
    pub fn generate(&self, inputs: &ModuleSource) -> Result<AbiArtifact> {
        let mut module = Module::read(inputs, self.config.parallel)?;
        module.flag_inline_methods(&self.hints);

        let marking = Marking::compute(&module)?;
        let kept: Vec<&str> = marking.kept_classes().collect();

        let project = |name: &&str| -> Result<(String, Vec<u8>)> {
            let unit = module
                .get(name)
                .ok_or_else(|| Error::Error(format!("Marked class {name} is not in the module")))?;
            let pruned = rewrite::prune_unit(unit, &marking, &module)?;
            rewrite::validate_references(&pruned, &marking, &module)?;
            Ok((unit.file_name(), serialize::write_unit(&pruned)?))
        };

        let files: Vec<(String, Vec<u8>)> = if self.config.parallel {
            kept.par_iter().map(project).collect::<Result<_>>()?
        } else {
            kept.iter().map(project).collect::<Result<_>>()?
        };

        let mut artifact = AbiArtifact::new();
        for (path, data) in files {
            artifact.insert(path, data)?;
        }
        for (path, data) in inputs.resources() {
            artifact.insert(path, data.to_vec())?;
        }

        log::info!(
            "ABI of {} units keeps {} classes, {} entries, digest {}",
            module.len(),
            kept.len(),
            artifact.len(),
            artifact.digest()
        );
        Ok(artifact)
    }

    /// Compute the artifact and publish it to the configured output directory.
    ///
    /// # Errors
    /// Everything [`AbiGenerator::generate`] returns, plus [`crate::Error::OutputWrite`] if
    /// publication fails. Nothing is written unless generation succeeded.
    pub fn run(&self, inputs: &ModuleSource) -> Result<AbiArtifact> {
        let artifact = self.generate(inputs)?;
        artifact.publish(&self.config.output_dir)?;
        Ok(artifact)
    }
}

/// Generate the ABI of a module and publish it to `output_dir`.
///
/// Only methods carrying an inline marker annotation are treated as inline; use
/// [`AbiGenerator::with_inline_function`] to declare others.
///
/// # Errors
/// See [`AbiGenerator::run`].
pub fn generate_abi(inputs: &ModuleSource, output_dir: &Path) -> Result<AbiArtifact> {
    AbiGenerator::new(AbiGenConfig::new(output_dir.to_path_buf())).run(inputs)
}
