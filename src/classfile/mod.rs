//! In-memory model of compiled JVM class files.
//!
//! A class file is read once into a [`DeclarationUnit`]: its header, its [`Member`]s, its
//! attribute tables and its fully resolved constant pool. Everything downstream (classification,
//! marking, rewriting and serialization) works on these owned values and never sees a raw pool
//! index.
//!
//! # Architecture
//!
//! - [`constant`] - Resolved constant pool entries
//! - [`attributes`] - Class, field and method attributes
//! - [`body`] - Method bodies with their pool operands
//! - [`flags`] - Access flags and declared visibility
//! - [`opcodes`] - Instruction table and operand decoding
//! - [`descriptor`] - Class names mentioned by descriptors and generic signatures
//! - [`mutf8`] - Modified UTF-8
//! - [`builder`] - Programmatic construction of units
//!
//! # Examples
//!
//! ```rust
//! use abiscope::classfile::{builder::ClassBuilder, read_unit, Member, MemberKind};
//! use abiscope::classfile::flags::MethodAccessFlags;
//!
//! let bytes = ClassBuilder::new("a/A")
//!     .method(Member::method(MethodAccessFlags::PUBLIC | MethodAccessFlags::ABSTRACT, "f", "()I"))
//!     .to_bytes()?;
//!
//! let unit = read_unit(&bytes)?;
//! assert_eq!(unit.name, "a/A");
//! assert!(unit.member(MemberKind::Method, "f", "()I").is_some());
//! # Ok::<(), abiscope::Error>(())
//! ```

pub mod attributes;
pub mod body;
pub mod builder;
pub mod constant;
pub mod descriptor;
pub mod flags;
pub mod mutf8;
pub mod opcodes;
mod reader;

pub use reader::read_unit;

use crate::{
    classfile::{
        attributes::{Annotation, Attribute, InnerClass},
        body::Body,
        constant::Constant,
        flags::{
            Access, ClassAccessFlags, FieldAccessFlags, MethodAccessFlags, NestedClassFlags,
        },
    },
    Result,
};

/// The class file magic number
pub const MAGIC: u32 = 0xCAFE_BABE;
/// Name of instance initializers
pub const CONSTRUCTOR: &str = "<init>";
/// Name of the static initializer
pub const STATIC_INITIALIZER: &str = "<clinit>";
/// Root of every class hierarchy
pub const OBJECT: &str = "java/lang/Object";

/// Whether a member is a field or a method.
///
/// Fields sort before methods, which is the order the class file stores them in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MemberKind {
    /// `field_info`
    Field,
    /// `method_info`
    Method,
}

/// Identity of a member within its class, and its canonical sort key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberKey {
    /// Field or method
    pub kind: MemberKind,
    /// Simple name
    pub name: String,
    /// Descriptor
    pub descriptor: String,
}

impl MemberKey {
    /// Create a new key.
    pub fn new(kind: MemberKind, name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        MemberKey {
            kind,
            name: name.into(),
            descriptor: descriptor.into(),
        }
    }
}

impl std::fmt::Display for MemberKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            MemberKind::Field => write!(f, "{}:{}", self.name, self.descriptor),
            MemberKind::Method => write!(f, "{}{}", self.name, self.descriptor),
        }
    }
}

/// A field or method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    /// Field or method
    pub kind: MemberKind,
    /// Raw access flags, interpreted through [`Member::field_flags`] or [`Member::method_flags`]
    pub access: u16,
    /// Simple name
    pub name: String,
    /// Field or method descriptor
    pub descriptor: String,
    /// Attributes in file order
    pub attributes: Vec<Attribute>,
    /// Set when callers copy this method's body into their own code
    pub inline: bool,
}

impl Member {
    /// Create a field without attributes.
    pub fn field(
        access: FieldAccessFlags,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        Member {
            kind: MemberKind::Field,
            access: access.bits(),
            name: name.into(),
            descriptor: descriptor.into(),
            attributes: Vec::new(),
            inline: false,
        }
    }

    /// Create a method without attributes.
    pub fn method(
        access: MethodAccessFlags,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        Member {
            kind: MemberKind::Method,
            access: access.bits(),
            name: name.into(),
            descriptor: descriptor.into(),
            attributes: Vec::new(),
            inline: false,
        }
    }

    /// Attach a method body.
    #[must_use]
    pub fn with_body(self, body: Body) -> Self {
        self.with_attribute(Attribute::Code(body))
    }

    /// Attach a compile-time constant value.
    #[must_use]
    pub fn with_constant_value(self, value: Constant) -> Self {
        self.with_attribute(Attribute::ConstantValue(value))
    }

    /// Attach any attribute.
    #[must_use]
    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// The identity of this member within its class.
    #[must_use]
    pub fn key(&self) -> MemberKey {
        MemberKey::new(self.kind, self.name.clone(), self.descriptor.clone())
    }

    /// Returns `true` if `key` names this member.
    #[must_use]
    pub fn matches(&self, kind: MemberKind, name: &str, descriptor: &str) -> bool {
        self.kind == kind && self.name == name && self.descriptor == descriptor
    }

    /// Access flags as field flags.
    #[must_use]
    pub fn field_flags(&self) -> FieldAccessFlags {
        FieldAccessFlags::from_bits_retain(self.access)
    }

    /// Access flags as method flags.
    #[must_use]
    pub fn method_flags(&self) -> MethodAccessFlags {
        MethodAccessFlags::from_bits_retain(self.access)
    }

    /// Declared visibility.
    #[must_use]
    pub fn visibility(&self) -> Access {
        Access::from_flags(self.access)
    }

    /// The method body, if any.
    #[must_use]
    pub fn body(&self) -> Option<&Body> {
        self.attributes.iter().find_map(|attribute| match attribute {
            Attribute::Code(body) => Some(body),
            _ => None,
        })
    }

    /// Mutable access to the method body, if any.
    pub fn body_mut(&mut self) -> Option<&mut Body> {
        self.attributes.iter_mut().find_map(|attribute| match attribute {
            Attribute::Code(body) => Some(body),
            _ => None,
        })
    }

    /// Remove the method body and return it.
    pub fn take_body(&mut self) -> Option<Body> {
        let position = self
            .attributes
            .iter()
            .position(|attribute| matches!(attribute, Attribute::Code(_)))?;
        match self.attributes.remove(position) {
            Attribute::Code(body) => Some(body),
            _ => None,
        }
    }

    /// The `ConstantValue` of a field, if any.
    #[must_use]
    pub fn constant_value(&self) -> Option<&Constant> {
        self.attributes.iter().find_map(|attribute| match attribute {
            Attribute::ConstantValue(value) => Some(value),
            _ => None,
        })
    }

    /// The generic signature, if any.
    #[must_use]
    pub fn signature(&self) -> Option<&str> {
        signature_of(&self.attributes)
    }

    /// Declaration annotations of both retentions.
    pub fn annotations(&self) -> impl Iterator<Item = &Annotation> {
        annotations_of(&self.attributes)
    }

    /// Returns `true` if the member carries the annotation `type_descriptor`.
    #[must_use]
    pub fn has_annotation(&self, type_descriptor: &str) -> bool {
        self.annotations()
            .any(|annotation| annotation.type_descriptor == type_descriptor)
    }

    /// Returns `true` for members generated by the compiler.
    #[must_use]
    pub fn is_synthetic(&self) -> bool {
        self.access & MethodAccessFlags::SYNTHETIC.bits() != 0
            || self
                .attributes
                .iter()
                .any(|attribute| matches!(attribute, Attribute::Synthetic))
    }

    /// Returns `true` for bridge methods.
    #[must_use]
    pub fn is_bridge(&self) -> bool {
        self.kind == MemberKind::Method && self.method_flags().contains(MethodAccessFlags::BRIDGE)
    }

    /// Returns `true` for `<clinit>`.
    #[must_use]
    pub fn is_static_initializer(&self) -> bool {
        self.kind == MemberKind::Method && self.name == STATIC_INITIALIZER
    }

    /// Returns `true` for `static final` fields with a compile-time constant value.
    #[must_use]
    pub fn is_constant(&self) -> bool {
        self.kind == MemberKind::Field
            && self
                .field_flags()
                .contains(FieldAccessFlags::STATIC | FieldAccessFlags::FINAL)
            && self.constant_value().is_some()
    }
}

/// A constant pool as read from a class file.
///
/// Index 0 and the second slot of `Long`/`Double` entries are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstantPool {
    entries: Vec<Option<Constant>>,
}

impl ConstantPool {
    pub(crate) fn from_entries(entries: Vec<Option<Constant>>) -> Self {
        ConstantPool { entries }
    }

    /// The `constant_pool_count` of the class file.
    #[must_use]
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Look up an entry.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if `index` is zero, out of range or the second slot
    /// of a wide entry.
    pub fn get(&self, index: u16) -> Result<&Constant> {
        match self.entries.get(index as usize) {
            Some(Some(constant)) => Ok(constant),
            _ => Err(malformed_error!("Invalid constant pool index {}", index)),
        }
    }

    /// All entries with their indices.
    pub fn iter(&self) -> impl Iterator<Item = (u16, &Constant)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| entry.as_ref().map(|c| (index as u16, c)))
    }

    /// Returns `true` if a structurally equal entry exists.
    #[must_use]
    pub fn contains(&self, constant: &Constant) -> bool {
        self.entries.iter().flatten().any(|entry| entry == constant)
    }

    /// Returns `true` if any `Utf8` entry contains `text`.
    #[must_use]
    pub fn mentions(&self, text: &str) -> bool {
        self.entries.iter().flatten().any(|entry| match entry {
            Constant::Utf8(value) => value.contains(text),
            _ => false,
        })
    }
}

/// One class, interface, enum or annotation interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclarationUnit {
    /// Internal name, e.g. `kotlin/collections/CollectionsKt`
    pub name: String,
    /// Minor class file version
    pub minor_version: u16,
    /// Major class file version
    pub major_version: u16,
    /// Class access flags
    pub access: ClassAccessFlags,
    /// Super class; `None` only for `java/lang/Object` and `module-info`
    pub super_class: Option<String>,
    /// Directly implemented interfaces
    pub interfaces: Vec<String>,
    /// Fields and methods in file order
    pub members: Vec<Member>,
    /// Class attributes in file order
    pub attributes: Vec<Attribute>,
    /// The constant pool the unit was read from; empty for built units
    pub constant_pool: ConstantPool,
}

impl DeclarationUnit {
    /// Parse a class file.
    ///
    /// # Errors
    /// See [`read_unit`].
    pub fn parse(data: &[u8]) -> Result<Self> {
        read_unit(data)
    }

    /// Relative path of the class file, e.g. `a/b/C.class`.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}.class", self.name)
    }

    /// Find a member by kind, name and descriptor.
    #[must_use]
    pub fn member(&self, kind: MemberKind, name: &str, descriptor: &str) -> Option<&Member> {
        self.members
            .iter()
            .find(|member| member.matches(kind, name, descriptor))
    }

    /// Find a method by name and descriptor.
    #[must_use]
    pub fn method(&self, name: &str, descriptor: &str) -> Option<&Member> {
        self.member(MemberKind::Method, name, descriptor)
    }

    /// Find a field by name and descriptor.
    #[must_use]
    pub fn field(&self, name: &str, descriptor: &str) -> Option<&Member> {
        self.member(MemberKind::Field, name, descriptor)
    }

    /// All fields in file order.
    pub fn fields(&self) -> impl Iterator<Item = &Member> {
        self.members
            .iter()
            .filter(|member| member.kind == MemberKind::Field)
    }

    /// All methods in file order.
    pub fn methods(&self) -> impl Iterator<Item = &Member> {
        self.members
            .iter()
            .filter(|member| member.kind == MemberKind::Method)
    }

    /// Super class followed by interfaces.
    pub fn supertypes(&self) -> impl Iterator<Item = &str> {
        self.super_class
            .iter()
            .chain(self.interfaces.iter())
            .map(String::as_str)
    }

    /// The `InnerClasses` entries, or an empty slice.
    #[must_use]
    pub fn inner_classes(&self) -> &[InnerClass] {
        self.attributes
            .iter()
            .find_map(|attribute| match attribute {
                Attribute::InnerClasses(entries) => Some(entries.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }

    /// The `InnerClasses` entry describing this unit itself, if it is nested.
    #[must_use]
    pub fn own_inner_entry(&self) -> Option<&InnerClass> {
        self.inner_classes()
            .iter()
            .find(|entry| entry.inner == self.name)
    }

    /// The enclosing class of a local or anonymous class.
    #[must_use]
    pub fn enclosing_class(&self) -> Option<&str> {
        self.attributes.iter().find_map(|attribute| match attribute {
            Attribute::EnclosingMethod { class, .. } => Some(class.as_str()),
            _ => None,
        })
    }

    /// The declaring class of a member class, or the enclosing class of a local class.
    #[must_use]
    pub fn outer_class(&self) -> Option<&str> {
        self.own_inner_entry()
            .and_then(|entry| entry.outer.as_deref())
            .or_else(|| self.enclosing_class())
    }

    /// Returns `true` for classes with no name a dependent could write down.
    #[must_use]
    pub fn is_local_or_anonymous(&self) -> bool {
        self.enclosing_class().is_some()
            || self
                .own_inner_entry()
                .is_some_and(InnerClass::is_local_or_anonymous)
    }

    /// Declared visibility.
    ///
    /// Nested classes carry their source visibility in the `InnerClasses` entry; top level
    /// classes are either public or package-private.
    #[must_use]
    pub fn visibility(&self) -> Access {
        if let Some(entry) = self.own_inner_entry() {
            return Access::from_flags(entry.flags.bits());
        }
        if self.access.contains(ClassAccessFlags::PUBLIC) {
            Access::Public
        } else {
            Access::Package
        }
    }

    /// Returns `true` for classes generated by the compiler.
    #[must_use]
    pub fn is_synthetic(&self) -> bool {
        self.access.contains(ClassAccessFlags::SYNTHETIC)
            || self
                .own_inner_entry()
                .is_some_and(|entry| entry.flags.contains(NestedClassFlags::SYNTHETIC))
            || self
                .attributes
                .iter()
                .any(|attribute| matches!(attribute, Attribute::Synthetic))
    }

    /// The generic signature, if any.
    #[must_use]
    pub fn signature(&self) -> Option<&str> {
        signature_of(&self.attributes)
    }

    /// Declaration annotations of both retentions.
    pub fn annotations(&self) -> impl Iterator<Item = &Annotation> {
        annotations_of(&self.attributes)
    }
}

fn signature_of(attributes: &[Attribute]) -> Option<&str> {
    attributes.iter().find_map(|attribute| match attribute {
        Attribute::Signature(signature) => Some(signature.as_str()),
        _ => None,
    })
}

fn annotations_of(attributes: &[Attribute]) -> impl Iterator<Item = &Annotation> {
    attributes
        .iter()
        .filter_map(|attribute| match attribute {
            Attribute::Annotations { annotations, .. } => Some(annotations.iter()),
            _ => None,
        })
        .flatten()
}
