//! The visibility policy table.
//!
//! Every keep/drop decision of the classifier comes from [`POLICY`], a first-match table keyed
//! by declaration kind, declared visibility and one dominant [`Trait`]. Keeping the rules in one
//! declarative table makes the policy reviewable at a glance and lets the tests enumerate every
//! combination.
//!
//! The closed annotation sets the classifier consults live here as well: [`INLINE_MARKERS`]
//! flags methods whose bodies callers copy, and [`DROPPED_ANNOTATIONS`] never survive into ABI
//! output.

use strum::{EnumCount, EnumIter};

use crate::classfile::{flags::Access, DeclarationUnit, Member, MemberKind};

/// Annotation types that mark a method as inline-only.
pub const INLINE_MARKERS: &[&str] = &["Lkotlin/internal/InlineOnly;"];

/// Annotation types that are removed from every surviving declaration.
pub const DROPPED_ANNOTATIONS: &[&str] = &["Lkotlin/jvm/internal/SourceDebugExtension;"];

/// Suffix of the synthetic method that supplies default arguments.
pub const DEFAULT_SUFFIX: &str = "$default";

/// What kind of declaration a decision is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumCount)]
pub enum DeclarationKind {
    /// A declaration unit
    Class,
    /// A field
    Field,
    /// A method
    Method,
}

impl From<MemberKind> for DeclarationKind {
    fn from(kind: MemberKind) -> Self {
        match kind {
            MemberKind::Field => DeclarationKind::Field,
            MemberKind::Method => DeclarationKind::Method,
        }
    }
}

/// The property of a declaration that dominates its decision.
///
/// A declaration has exactly one trait; when several apply, the first in this precedence wins:
/// `StaticInitializer`, `Inline`, `Constant`, `Bridge`, `Synthetic`, `Local`, `Plain`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumCount)]
pub enum Trait {
    /// Nothing special
    Plain,
    /// Generated by the compiler
    Synthetic,
    /// Bridge method
    Bridge,
    /// `static final` field with a compile-time value
    Constant,
    /// Method whose body callers copy
    Inline,
    /// `<clinit>`
    StaticInitializer,
    /// Local or anonymous class
    Local,
}

/// Outcome of classification.
///
/// Ordered by how much of the declaration survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIter)]
pub enum Decision {
    /// Not part of the ABI
    Drop,
    /// Signature only
    Keep,
    /// Signature and body
    KeepBodyToo,
}

/// One row of the policy table; `None` matches anything.
#[derive(Debug, Clone, Copy)]
pub struct PolicyRule {
    /// Declaration kind to match
    pub kind: Option<DeclarationKind>,
    /// Visibility to match
    pub access: Option<Access>,
    /// Trait to match
    pub traits: Option<Trait>,
    /// Decision when the row matches
    pub decision: Decision,
}

const fn rule(
    kind: Option<DeclarationKind>,
    access: Option<Access>,
    traits: Option<Trait>,
    decision: Decision,
) -> PolicyRule {
    PolicyRule {
        kind,
        access,
        traits,
        decision,
    }
}

/// The policy, evaluated top to bottom. The last row matches everything.
pub static POLICY: &[PolicyRule] = &[
    // Static initializers only run code
    rule(None, None, Some(Trait::StaticInitializer), Decision::Drop),
    // Callers embed inline bodies regardless of visibility
    rule(Some(DeclarationKind::Method), None, Some(Trait::Inline), Decision::KeepBodyToo),
    rule(None, None, Some(Trait::Inline), Decision::Keep),
    // Dependents may have copied the value
    rule(Some(DeclarationKind::Field), None, Some(Trait::Constant), Decision::Keep),
    rule(None, None, Some(Trait::Bridge), Decision::Drop),
    rule(None, None, Some(Trait::Synthetic), Decision::Drop),
    rule(Some(DeclarationKind::Class), None, Some(Trait::Local), Decision::Drop),
    rule(None, Some(Access::Private), None, Decision::Drop),
    rule(None, None, None, Decision::Keep),
];

/// Look up the decision for a combination.
#[must_use]
pub fn decide(kind: DeclarationKind, access: Access, traits: Trait) -> Decision {
    POLICY
        .iter()
        .find(|row| {
            row.kind.is_none_or(|k| k == kind)
                && row.access.is_none_or(|a| a == access)
                && row.traits.is_none_or(|t| t == traits)
        })
        .map_or(Decision::Keep, |row| row.decision)
}

/// The dominant trait of a member.
#[must_use]
pub fn member_trait(member: &Member) -> Trait {
    if member.is_static_initializer() {
        Trait::StaticInitializer
    } else if member.kind == MemberKind::Method && member.inline {
        Trait::Inline
    } else if member.is_constant() {
        Trait::Constant
    } else if member.is_bridge() {
        Trait::Bridge
    } else if member.is_synthetic() {
        Trait::Synthetic
    } else {
        Trait::Plain
    }
}

/// The dominant trait of a declaration unit.
#[must_use]
pub fn class_trait(unit: &DeclarationUnit) -> Trait {
    if unit.is_synthetic() {
        Trait::Synthetic
    } else if unit.is_local_or_anonymous() {
        Trait::Local
    } else {
        Trait::Plain
    }
}

/// Classify a member by its own properties.
#[must_use]
pub fn classify_member(member: &Member) -> Decision {
    decide(member.kind.into(), member.visibility(), member_trait(member))
}

/// Classify a declaration unit by its own properties.
#[must_use]
pub fn classify_class(unit: &DeclarationUnit) -> Decision {
    decide(DeclarationKind::Class, unit.visibility(), class_trait(unit))
}

/// Returns `true` if the annotation type marks a method as inline-only.
#[must_use]
pub fn is_inline_marker(type_descriptor: &str) -> bool {
    INLINE_MARKERS.contains(&type_descriptor)
}

/// Returns `true` if the annotation type never survives.
#[must_use]
pub fn is_dropped_annotation(type_descriptor: &str) -> bool {
    DROPPED_ANNOTATIONS.contains(&type_descriptor)
}
