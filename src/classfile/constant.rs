//! Resolved constant pool values.
//!
//! The reader turns every `cp_info` entry into a [`Constant`] that owns its strings and nested
//! constants, so nothing downstream of the reader handles raw pool indices. Two constants that
//! compare equal are structurally identical pool entries, which is what makes deduplication in
//! the rebuilt pool a simple map lookup.
//!
//! # Key Types
//! - [`Constant`] - One resolved pool entry
//! - [`MemberRef`] - Owner, name and descriptor of a field or method reference
//! - [`ReferenceKind`] - Behaviour of a `CONSTANT_MethodHandle`
//! - [`BootstrapMethod`] - Bootstrap handle and static arguments of a dynamic constant

use std::fmt;

use strum::{EnumIter, FromRepr};
use widestring::U16String;

/// `CONSTANT_Utf8`
pub const TAG_UTF8: u8 = 1;
/// `CONSTANT_Integer`
pub const TAG_INTEGER: u8 = 3;
/// `CONSTANT_Float`
pub const TAG_FLOAT: u8 = 4;
/// `CONSTANT_Long`
pub const TAG_LONG: u8 = 5;
/// `CONSTANT_Double`
pub const TAG_DOUBLE: u8 = 6;
/// `CONSTANT_Class`
pub const TAG_CLASS: u8 = 7;
/// `CONSTANT_String`
pub const TAG_STRING: u8 = 8;
/// `CONSTANT_Fieldref`
pub const TAG_FIELDREF: u8 = 9;
/// `CONSTANT_Methodref`
pub const TAG_METHODREF: u8 = 10;
/// `CONSTANT_InterfaceMethodref`
pub const TAG_INTERFACE_METHODREF: u8 = 11;
/// `CONSTANT_NameAndType`
pub const TAG_NAME_AND_TYPE: u8 = 12;
/// `CONSTANT_MethodHandle`
pub const TAG_METHOD_HANDLE: u8 = 15;
/// `CONSTANT_MethodType`
pub const TAG_METHOD_TYPE: u8 = 16;
/// `CONSTANT_Dynamic`
pub const TAG_DYNAMIC: u8 = 17;
/// `CONSTANT_InvokeDynamic`
pub const TAG_INVOKE_DYNAMIC: u8 = 18;
/// `CONSTANT_Module`
pub const TAG_MODULE: u8 = 19;
/// `CONSTANT_Package`
pub const TAG_PACKAGE: u8 = 20;

/// Symbolic reference to a field or method.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberRef {
    /// Internal name of the owning class (or an array descriptor for array methods)
    pub owner: String,
    /// Simple member name
    pub name: String,
    /// Field or method descriptor
    pub descriptor: String,
}

impl MemberRef {
    /// Create a new member reference.
    pub fn new(
        owner: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        MemberRef {
            owner: owner.into(),
            name: name.into(),
            descriptor: descriptor.into(),
        }
    }
}

impl fmt::Display for MemberRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}{}", self.owner, self.name, self.descriptor)
    }
}

/// The `reference_kind` of a `CONSTANT_MethodHandle` (JVMS 5.4.3.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIter, FromRepr)]
#[repr(u8)]
pub enum ReferenceKind {
    /// `REF_getField`
    GetField = 1,
    /// `REF_getStatic`
    GetStatic = 2,
    /// `REF_putField`
    PutField = 3,
    /// `REF_putStatic`
    PutStatic = 4,
    /// `REF_invokeVirtual`
    InvokeVirtual = 5,
    /// `REF_invokeStatic`
    InvokeStatic = 6,
    /// `REF_invokeSpecial`
    InvokeSpecial = 7,
    /// `REF_newInvokeSpecial`
    NewInvokeSpecial = 8,
    /// `REF_invokeInterface`
    InvokeInterface = 9,
}

/// A bootstrap method entry with its static arguments resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BootstrapMethod {
    /// The `CONSTANT_MethodHandle` of the bootstrap method
    pub handle: Constant,
    /// Static arguments, each a loadable constant
    pub arguments: Vec<Constant>,
}

/// One resolved constant pool entry.
///
/// Floating point values are kept as their raw IEEE bits so that equality is structural
/// (`NaN` payloads and signed zeros stay distinct, exactly like distinct pool entries).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Constant {
    /// Modified UTF-8 text
    Utf8(String),
    /// 32-bit integer
    Integer(i32),
    /// 32-bit float as raw bits
    Float(u32),
    /// 64-bit integer, occupies two pool slots
    Long(i64),
    /// 64-bit float as raw bits, occupies two pool slots
    Double(u64),
    /// Class or array type, by internal name
    Class(String),
    /// String literal
    String(String),
    /// Field reference
    FieldRef(MemberRef),
    /// Class method reference
    MethodRef(MemberRef),
    /// Interface method reference
    InterfaceMethodRef(MemberRef),
    /// Name and descriptor pair
    NameAndType {
        /// Member name
        name: String,
        /// Member descriptor
        descriptor: String,
    },
    /// Method handle
    MethodHandle {
        /// How the handle behaves
        kind: ReferenceKind,
        /// The field or method reference the handle points at
        reference: Box<Constant>,
    },
    /// Method type by descriptor
    MethodType(String),
    /// Dynamically computed constant
    Dynamic {
        /// Bootstrap method computing the value
        bootstrap: Box<BootstrapMethod>,
        /// Name of the constant
        name: String,
        /// Field descriptor of the constant
        descriptor: String,
    },
    /// Dynamically computed call site
    InvokeDynamic {
        /// Bootstrap method linking the call site
        bootstrap: Box<BootstrapMethod>,
        /// Name of the call site
        name: String,
        /// Method descriptor of the call site
        descriptor: String,
    },
    /// Module name
    Module(String),
    /// Package name
    Package(String),
    /// Modified UTF-8 text holding unpaired surrogates, as UTF-16 code units
    Utf16(U16String),
    /// String literal over a [`Constant::Utf16`] entry
    WideString(U16String),
}

impl Constant {
    /// The `cp_info` tag byte of this entry.
    #[must_use]
    pub fn tag(&self) -> u8 {
        match self {
            Constant::Utf8(_) => TAG_UTF8,
            Constant::Integer(_) => TAG_INTEGER,
            Constant::Float(_) => TAG_FLOAT,
            Constant::Long(_) => TAG_LONG,
            Constant::Double(_) => TAG_DOUBLE,
            Constant::Class(_) => TAG_CLASS,
            Constant::String(_) => TAG_STRING,
            Constant::FieldRef(_) => TAG_FIELDREF,
            Constant::MethodRef(_) => TAG_METHODREF,
            Constant::InterfaceMethodRef(_) => TAG_INTERFACE_METHODREF,
            Constant::NameAndType { .. } => TAG_NAME_AND_TYPE,
            Constant::MethodHandle { .. } => TAG_METHOD_HANDLE,
            Constant::MethodType(_) => TAG_METHOD_TYPE,
            Constant::Dynamic { .. } => TAG_DYNAMIC,
            Constant::InvokeDynamic { .. } => TAG_INVOKE_DYNAMIC,
            Constant::Module(_) => TAG_MODULE,
            Constant::Package(_) => TAG_PACKAGE,
            Constant::Utf16(_) => TAG_UTF8,
            Constant::WideString(_) => TAG_STRING,
        }
    }

    /// Number of pool slots this entry occupies.
    #[must_use]
    pub fn slots(&self) -> u16 {
        match self {
            Constant::Long(_) | Constant::Double(_) => 2,
            _ => 1,
        }
    }

    /// The pool entries this entry points at directly.
    ///
    /// Bootstrap methods are not included; they live in the `BootstrapMethods` attribute and
    /// are reached through [`Constant::bootstrap`].
    #[must_use]
    pub fn children(&self) -> Vec<Constant> {
        match self {
            Constant::Class(name)
            | Constant::String(name)
            | Constant::MethodType(name)
            | Constant::Module(name)
            | Constant::Package(name) => vec![Constant::Utf8(name.clone())],
            Constant::FieldRef(member)
            | Constant::MethodRef(member)
            | Constant::InterfaceMethodRef(member) => vec![
                Constant::Class(member.owner.clone()),
                Constant::NameAndType {
                    name: member.name.clone(),
                    descriptor: member.descriptor.clone(),
                },
            ],
            Constant::NameAndType { name, descriptor } => vec![
                Constant::Utf8(name.clone()),
                Constant::Utf8(descriptor.clone()),
            ],
            Constant::WideString(units) => vec![Constant::Utf16(units.clone())],
            Constant::MethodHandle { reference, .. } => vec![reference.as_ref().clone()],
            Constant::Dynamic {
                name, descriptor, ..
            }
            | Constant::InvokeDynamic {
                name, descriptor, ..
            } => vec![Constant::NameAndType {
                name: name.clone(),
                descriptor: descriptor.clone(),
            }],
            Constant::Utf8(_)
            | Constant::Utf16(_)
            | Constant::Integer(_)
            | Constant::Float(_)
            | Constant::Long(_)
            | Constant::Double(_) => Vec::new(),
        }
    }

    /// The bootstrap method of a dynamic constant or call site.
    #[must_use]
    pub fn bootstrap(&self) -> Option<&BootstrapMethod> {
        match self {
            Constant::Dynamic { bootstrap, .. } | Constant::InvokeDynamic { bootstrap, .. } => {
                Some(bootstrap)
            }
            _ => None,
        }
    }

    /// The field or method this constant refers to, if any.
    #[must_use]
    pub fn member_ref(&self) -> Option<&MemberRef> {
        match self {
            Constant::FieldRef(member)
            | Constant::MethodRef(member)
            | Constant::InterfaceMethodRef(member) => Some(member),
            Constant::MethodHandle { reference, .. } => reference.member_ref(),
            _ => None,
        }
    }

    /// Returns `true` for field references, including method handles on fields.
    #[must_use]
    pub fn is_field_ref(&self) -> bool {
        match self {
            Constant::FieldRef(_) => true,
            Constant::MethodHandle { reference, .. } => reference.is_field_ref(),
            _ => false,
        }
    }

    /// Returns `true` if the value can be pushed with `ldc`, `ldc_w` or `ldc2_w`.
    #[must_use]
    pub fn is_loadable(&self) -> bool {
        matches!(
            self,
            Constant::Integer(_)
                | Constant::Float(_)
                | Constant::Long(_)
                | Constant::Double(_)
                | Constant::Class(_)
                | Constant::String(_)
                | Constant::WideString(_)
                | Constant::MethodHandle { .. }
                | Constant::MethodType(_)
                | Constant::Dynamic { .. }
        )
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Utf8(value) => write!(f, "Utf8 {value:?}"),
            Constant::Integer(value) => write!(f, "Integer {value}"),
            Constant::Float(bits) => write!(f, "Float {}", f32::from_bits(*bits)),
            Constant::Long(value) => write!(f, "Long {value}"),
            Constant::Double(bits) => write!(f, "Double {}", f64::from_bits(*bits)),
            Constant::Class(name) => write!(f, "Class {name}"),
            Constant::String(value) => write!(f, "String {value:?}"),
            Constant::FieldRef(member) => write!(f, "Field {member}"),
            Constant::MethodRef(member) | Constant::InterfaceMethodRef(member) => {
                write!(f, "Method {member}")
            }
            Constant::NameAndType { name, descriptor } => write!(f, "NameAndType {name}{descriptor}"),
            Constant::MethodHandle { kind, reference } => write!(f, "MethodHandle {kind:?} {reference}"),
            Constant::MethodType(descriptor) => write!(f, "MethodType {descriptor}"),
            Constant::Dynamic { name, descriptor, .. } => write!(f, "Dynamic {name}{descriptor}"),
            Constant::InvokeDynamic { name, descriptor, .. } => {
                write!(f, "InvokeDynamic {name}{descriptor}")
            }
            Constant::Module(name) => write!(f, "Module {name}"),
            Constant::Package(name) => write!(f, "Package {name}"),
            Constant::Utf16(units) => write!(f, "Utf8 {:?}", units.to_string_lossy()),
            Constant::WideString(units) => write!(f, "String {:?}", units.to_string_lossy()),
        }
    }
}
