//! Access flags of classes, nested classes, fields and methods.
//!
//! The same bit can mean different things depending on where it appears (`0x0040` is
//! `ACC_VOLATILE` on a field and `ACC_BRIDGE` on a method), so each declaration kind has its own
//! flag set.

use bitflags::bitflags;
use strum::{EnumCount, EnumIter};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Class access and property flags (JVMS 4.1)
    pub struct ClassAccessFlags: u16 {
        /// Declared public; may be accessed from outside its package
        const PUBLIC = 0x0001;
        /// Declared final; no subclasses allowed
        const FINAL = 0x0010;
        /// Treat superclass methods specially when invoked by invokespecial
        const SUPER = 0x0020;
        /// Is an interface, not a class
        const INTERFACE = 0x0200;
        /// Declared abstract; must not be instantiated
        const ABSTRACT = 0x0400;
        /// Not present in source code
        const SYNTHETIC = 0x1000;
        /// Declared as an annotation interface
        const ANNOTATION = 0x2000;
        /// Declared as an enum class
        const ENUM = 0x4000;
        /// Is a module, not a class or interface
        const MODULE = 0x8000;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Flags of an `InnerClasses` entry (JVMS 4.7.6)
    pub struct NestedClassFlags: u16 {
        /// Marked or implicitly public in source
        const PUBLIC = 0x0001;
        /// Marked private in source
        const PRIVATE = 0x0002;
        /// Marked protected in source
        const PROTECTED = 0x0004;
        /// Marked or implicitly static in source
        const STATIC = 0x0008;
        /// Marked or implicitly final in source
        const FINAL = 0x0010;
        /// Was an interface in source
        const INTERFACE = 0x0200;
        /// Marked or implicitly abstract in source
        const ABSTRACT = 0x0400;
        /// Not present in source code
        const SYNTHETIC = 0x1000;
        /// Declared as an annotation interface
        const ANNOTATION = 0x2000;
        /// Declared as an enum class
        const ENUM = 0x4000;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Field access and property flags (JVMS 4.5)
    pub struct FieldAccessFlags: u16 {
        /// Declared public
        const PUBLIC = 0x0001;
        /// Declared private
        const PRIVATE = 0x0002;
        /// Declared protected
        const PROTECTED = 0x0004;
        /// Declared static
        const STATIC = 0x0008;
        /// Declared final; never directly assigned to after construction
        const FINAL = 0x0010;
        /// Declared volatile; cannot be cached
        const VOLATILE = 0x0040;
        /// Declared transient; not written or read by a persistent object manager
        const TRANSIENT = 0x0080;
        /// Not present in source code
        const SYNTHETIC = 0x1000;
        /// Declared as an element of an enum class
        const ENUM = 0x4000;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Method access and property flags (JVMS 4.6)
    pub struct MethodAccessFlags: u16 {
        /// Declared public
        const PUBLIC = 0x0001;
        /// Declared private
        const PRIVATE = 0x0002;
        /// Declared protected
        const PROTECTED = 0x0004;
        /// Declared static
        const STATIC = 0x0008;
        /// Declared final; must not be overridden
        const FINAL = 0x0010;
        /// Declared synchronized
        const SYNCHRONIZED = 0x0020;
        /// A bridge method, generated by the compiler
        const BRIDGE = 0x0040;
        /// Declared with variable number of arguments
        const VARARGS = 0x0080;
        /// Declared native
        const NATIVE = 0x0100;
        /// Declared abstract; no implementation is provided
        const ABSTRACT = 0x0400;
        /// In a class file whose major version is at least 46 and at most 60, declared strictfp
        const STRICT = 0x0800;
        /// Not present in source code
        const SYNTHETIC = 0x1000;
    }
}

/// Bitmask of the three visibility bits shared by fields, methods and nested classes
pub const VISIBILITY_MASK: u16 = 0x0007;

/// Declared visibility of a class or member.
///
/// Ordered from most to least visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIter, EnumCount)]
pub enum Access {
    /// `ACC_PUBLIC`
    Public,
    /// `ACC_PROTECTED`
    Protected,
    /// No visibility flag; accessible from the same runtime package
    Package,
    /// `ACC_PRIVATE`
    Private,
}

impl Access {
    /// Extract the visibility from raw access flags.
    ///
    /// Inconsistent combinations are resolved towards the most visible flag present, so a
    /// malformed member is never hidden by accident.
    #[must_use]
    pub fn from_flags(flags: u16) -> Access {
        let bits = flags & VISIBILITY_MASK;
        if bits & 0x0001 != 0 {
            Access::Public
        } else if bits & 0x0004 != 0 {
            Access::Protected
        } else if bits & 0x0002 != 0 {
            Access::Private
        } else {
            Access::Package
        }
    }
}
