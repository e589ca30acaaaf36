//! # abiscope Prelude
//!
//! This module provides a convenient prelude for the most commonly used types from the
//! abiscope library. Import this module to get quick access to the essential types for ABI
//! generation.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all abiscope operations
pub use crate::Error;

/// The result type used throughout abiscope
pub use crate::Result;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// Pipeline entry points
pub use crate::{generate_abi, AbiGenConfig, AbiGenerator};

/// Inputs and the parsed module
pub use crate::{InlineHints, Module, ModuleSource};

/// The generated artifact
pub use crate::AbiArtifact;

/// Low-level file parsing utilities
pub use crate::Parser;

// ================================================================================================
// Class File Model
// ================================================================================================

/// Declarations and their parts
pub use crate::classfile::{
    attributes::{Annotation, Attribute, ElementValue, InnerClass, Retention},
    body::Body,
    constant::{Constant, MemberRef},
    read_unit, ConstantPool, DeclarationUnit, Member, MemberKey, MemberKind,
};

/// Access flags
pub use crate::classfile::flags::{
    Access, ClassAccessFlags, FieldAccessFlags, MethodAccessFlags, NestedClassFlags,
};

/// Programmatic construction of class files
pub use crate::classfile::builder::{ClassBuilder, CodeBuilder};

// ================================================================================================
// Pipeline Stages
// ================================================================================================

/// Policy decisions
pub use crate::abi::policy::{Decision, DeclarationKind, Trait};

/// Global marking
pub use crate::abi::mark::{Marking, Resolution};
