//! Attribute tables of classes, fields and methods.
//!
//! Attributes are decoded into owned values with every constant pool index already resolved.
//! Attributes the reader does not understand are preserved as [`UnknownAttribute`] so they can
//! be reported, but they are never written to ABI output because their payload may embed pool
//! indices that cannot be remapped.

use crate::classfile::{body::Body, constant::Constant, flags::NestedClassFlags};

/// `Code`
pub const CODE: &str = "Code";
/// `ConstantValue`
pub const CONSTANT_VALUE: &str = "ConstantValue";
/// `Exceptions`
pub const EXCEPTIONS: &str = "Exceptions";
/// `Signature`
pub const SIGNATURE: &str = "Signature";
/// `SourceFile`
pub const SOURCE_FILE: &str = "SourceFile";
/// `SourceDebugExtension`
pub const SOURCE_DEBUG_EXTENSION: &str = "SourceDebugExtension";
/// `InnerClasses`
pub const INNER_CLASSES: &str = "InnerClasses";
/// `EnclosingMethod`
pub const ENCLOSING_METHOD: &str = "EnclosingMethod";
/// `RuntimeVisibleAnnotations`
pub const RUNTIME_VISIBLE_ANNOTATIONS: &str = "RuntimeVisibleAnnotations";
/// `RuntimeInvisibleAnnotations`
pub const RUNTIME_INVISIBLE_ANNOTATIONS: &str = "RuntimeInvisibleAnnotations";
/// `RuntimeVisibleParameterAnnotations`
pub const RUNTIME_VISIBLE_PARAMETER_ANNOTATIONS: &str = "RuntimeVisibleParameterAnnotations";
/// `RuntimeInvisibleParameterAnnotations`
pub const RUNTIME_INVISIBLE_PARAMETER_ANNOTATIONS: &str = "RuntimeInvisibleParameterAnnotations";
/// `AnnotationDefault`
pub const ANNOTATION_DEFAULT: &str = "AnnotationDefault";
/// `Deprecated`
pub const DEPRECATED: &str = "Deprecated";
/// `Synthetic`
pub const SYNTHETIC: &str = "Synthetic";
/// `BootstrapMethods`
pub const BOOTSTRAP_METHODS: &str = "BootstrapMethods";
/// `NestHost`
pub const NEST_HOST: &str = "NestHost";
/// `NestMembers`
pub const NEST_MEMBERS: &str = "NestMembers";
/// `PermittedSubclasses`
pub const PERMITTED_SUBCLASSES: &str = "PermittedSubclasses";
/// `MethodParameters`
pub const METHOD_PARAMETERS: &str = "MethodParameters";
/// `LineNumberTable`
pub const LINE_NUMBER_TABLE: &str = "LineNumberTable";
/// `LocalVariableTable`
pub const LOCAL_VARIABLE_TABLE: &str = "LocalVariableTable";
/// `LocalVariableTypeTable`
pub const LOCAL_VARIABLE_TYPE_TABLE: &str = "LocalVariableTypeTable";
/// `StackMapTable`
pub const STACK_MAP_TABLE: &str = "StackMapTable";

/// Whether an annotation attribute is visible through reflection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Retention {
    /// `RuntimeVisible*`
    Visible,
    /// `RuntimeInvisible*`
    Invisible,
}

/// One annotation with its element-value pairs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Annotation {
    /// Field descriptor of the annotation interface, e.g. `Lkotlin/Metadata;`
    pub type_descriptor: String,
    /// Element name and value pairs in declaration order
    pub elements: Vec<(String, ElementValue)>,
}

/// An annotation element value (JVMS 4.7.16.1).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ElementValue {
    /// A primitive or string constant; `tag` is one of `BCDFIJSZs`
    Const {
        /// The element tag character
        tag: u8,
        /// The constant value
        value: Constant,
    },
    /// An enum constant
    Enum {
        /// Field descriptor of the enum class
        type_descriptor: String,
        /// Simple name of the enum constant
        const_name: String,
    },
    /// A class literal, by return descriptor
    Class(String),
    /// A nested annotation
    Annotation(Annotation),
    /// An array of values
    Array(Vec<ElementValue>),
}

/// One entry of the `InnerClasses` attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InnerClass {
    /// Internal name of the nested class
    pub inner: String,
    /// Internal name of the declaring class; absent for local and anonymous classes
    pub outer: Option<String>,
    /// Simple source name; absent for anonymous classes
    pub simple_name: Option<String>,
    /// Declared flags of the nested class
    pub flags: NestedClassFlags,
}

impl InnerClass {
    /// Returns `true` for classes that have no name a dependent could write down.
    #[must_use]
    pub fn is_local_or_anonymous(&self) -> bool {
        self.outer.is_none() || self.simple_name.is_none()
    }
}

/// One entry of the `MethodParameters` attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodParameter {
    /// Parameter name, if recorded
    pub name: Option<String>,
    /// Parameter flags
    pub flags: u16,
}

/// An attribute the reader does not decode.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnknownAttribute {
    /// Attribute name
    pub name: String,
    /// Raw payload, which may contain indices into the original pool
    pub data: Vec<u8>,
}

/// A decoded class, field or method attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribute {
    /// Method implementation
    Code(Body),
    /// Compile-time constant value of a field
    ConstantValue(Constant),
    /// Declared checked exceptions, by internal name
    Exceptions(Vec<String>),
    /// Generic signature
    Signature(String),
    /// Source file name
    SourceFile(String),
    /// Opaque debug extension (SMAP for Kotlin)
    SourceDebugExtension(Vec<u8>),
    /// Nested class table
    InnerClasses(Vec<InnerClass>),
    /// Enclosing class and method of a local or anonymous class
    EnclosingMethod {
        /// Internal name of the enclosing class
        class: String,
        /// Name and descriptor of the enclosing method, if any
        method: Option<(String, String)>,
    },
    /// Declaration annotations
    Annotations {
        /// Visible or invisible at runtime
        retention: Retention,
        /// The annotations
        annotations: Vec<Annotation>,
    },
    /// Parameter annotations, one list per parameter
    ParameterAnnotations {
        /// Visible or invisible at runtime
        retention: Retention,
        /// The annotations of each parameter
        parameters: Vec<Vec<Annotation>>,
    },
    /// Default value of an annotation interface element
    AnnotationDefault(ElementValue),
    /// `Deprecated` marker
    Deprecated,
    /// `Synthetic` marker
    Synthetic,
    /// Nest host of a nest member
    NestHost(String),
    /// Members of the nest hosted by this class
    NestMembers(Vec<String>),
    /// Permitted direct subclasses of a sealed class
    PermittedSubclasses(Vec<String>),
    /// Formal parameter names and flags
    MethodParameters(Vec<MethodParameter>),
    /// Anything else
    Unknown(UnknownAttribute),
}

impl Attribute {
    /// The attribute name as it appears in the class file.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Attribute::Code(_) => CODE,
            Attribute::ConstantValue(_) => CONSTANT_VALUE,
            Attribute::Exceptions(_) => EXCEPTIONS,
            Attribute::Signature(_) => SIGNATURE,
            Attribute::SourceFile(_) => SOURCE_FILE,
            Attribute::SourceDebugExtension(_) => SOURCE_DEBUG_EXTENSION,
            Attribute::InnerClasses(_) => INNER_CLASSES,
            Attribute::EnclosingMethod { .. } => ENCLOSING_METHOD,
            Attribute::Annotations {
                retention: Retention::Visible,
                ..
            } => RUNTIME_VISIBLE_ANNOTATIONS,
            Attribute::Annotations {
                retention: Retention::Invisible,
                ..
            } => RUNTIME_INVISIBLE_ANNOTATIONS,
            Attribute::ParameterAnnotations {
                retention: Retention::Visible,
                ..
            } => RUNTIME_VISIBLE_PARAMETER_ANNOTATIONS,
            Attribute::ParameterAnnotations {
                retention: Retention::Invisible,
                ..
            } => RUNTIME_INVISIBLE_PARAMETER_ANNOTATIONS,
            Attribute::AnnotationDefault(_) => ANNOTATION_DEFAULT,
            Attribute::Deprecated => DEPRECATED,
            Attribute::Synthetic => SYNTHETIC,
            Attribute::NestHost(_) => NEST_HOST,
            Attribute::NestMembers(_) => NEST_MEMBERS,
            Attribute::PermittedSubclasses(_) => PERMITTED_SUBCLASSES,
            Attribute::MethodParameters(_) => METHOD_PARAMETERS,
            Attribute::Unknown(unknown) => &unknown.name,
        }
    }

    /// Position of this attribute in the canonical output order.
    ///
    /// Attributes of the same kind keep their relative order.
    #[must_use]
    pub fn canonical_rank(&self) -> u8 {
        match self {
            Attribute::ConstantValue(_) => 0,
            Attribute::Code(_) => 1,
            Attribute::Exceptions(_) => 2,
            Attribute::Signature(_) => 3,
            Attribute::AnnotationDefault(_) => 4,
            Attribute::Annotations {
                retention: Retention::Visible,
                ..
            } => 5,
            Attribute::Annotations {
                retention: Retention::Invisible,
                ..
            } => 6,
            Attribute::ParameterAnnotations {
                retention: Retention::Visible,
                ..
            } => 7,
            Attribute::ParameterAnnotations {
                retention: Retention::Invisible,
                ..
            } => 8,
            Attribute::Deprecated => 9,
            Attribute::Synthetic => 10,
            Attribute::EnclosingMethod { .. } => 11,
            Attribute::InnerClasses(_) => 12,
            Attribute::PermittedSubclasses(_) => 13,
            Attribute::NestHost(_) => 14,
            Attribute::NestMembers(_) => 15,
            Attribute::MethodParameters(_) => 16,
            Attribute::SourceFile(_) => 17,
            Attribute::SourceDebugExtension(_) => 18,
            Attribute::Unknown(_) => 19,
        }
    }
}

impl Annotation {
    /// Create an annotation without elements.
    pub fn marker(type_descriptor: impl Into<String>) -> Self {
        Annotation {
            type_descriptor: type_descriptor.into(),
            elements: Vec::new(),
        }
    }
}
