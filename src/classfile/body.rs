//! Method bodies: bytecode, exception handlers, stack map frames and debug tables.
//!
//! Bytecode is kept as the original byte sequence. Every operand that indexes the constant pool
//! is recorded as a [`CodeReference`] carrying the resolved [`Constant`], so the serializer can
//! patch fresh indices into a copy of the code without re-assembling instructions. Branch
//! offsets and switch padding therefore stay valid.

use crate::classfile::{attributes::UnknownAttribute, constant::Constant};

/// Width of a constant pool operand inside bytecode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandWidth {
    /// One byte, only used by `ldc`
    Byte,
    /// Two bytes
    Short,
}

/// A constant pool operand inside bytecode.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CodeReference {
    /// Byte offset of the operand (not of the opcode) within the code
    pub offset: usize,
    /// Operand width
    pub width: OperandWidth,
    /// The referenced constant
    pub constant: Constant,
}

/// An exception table entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExceptionHandler {
    /// Start of the protected range (inclusive)
    pub start_pc: u16,
    /// End of the protected range (exclusive)
    pub end_pc: u16,
    /// Start of the handler
    pub handler_pc: u16,
    /// Caught class; `None` catches everything (`finally`)
    pub catch_type: Option<String>,
}

/// A verification type of a stack map frame (JVMS 4.7.4).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VerificationType {
    /// `Top_variable_info`
    Top,
    /// `Integer_variable_info`
    Integer,
    /// `Float_variable_info`
    Float,
    /// `Double_variable_info`
    Double,
    /// `Long_variable_info`
    Long,
    /// `Null_variable_info`
    Null,
    /// `UninitializedThis_variable_info`
    UninitializedThis,
    /// `Object_variable_info`, by class name
    Object(String),
    /// `Uninitialized_variable_info`, by offset of the `new` instruction
    Uninitialized(u16),
}

impl VerificationType {
    /// The `tag` byte of this verification type.
    #[must_use]
    pub fn tag(&self) -> u8 {
        match self {
            VerificationType::Top => 0,
            VerificationType::Integer => 1,
            VerificationType::Float => 2,
            VerificationType::Double => 3,
            VerificationType::Long => 4,
            VerificationType::Null => 5,
            VerificationType::UninitializedThis => 6,
            VerificationType::Object(_) => 7,
            VerificationType::Uninitialized(_) => 8,
        }
    }
}

/// One frame of a `StackMapTable`.
///
/// The original `frame_type` is kept so the frame is written back in the same compact form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StackMapFrame {
    /// The raw frame type byte
    pub frame_type: u8,
    /// Offset delta to the previous frame
    pub offset_delta: u16,
    /// Locals listed by `append_frame` and `full_frame`
    pub locals: Vec<VerificationType>,
    /// Stack items listed by `same_locals_1_stack_item*` and `full_frame`
    pub stack: Vec<VerificationType>,
}

/// A `LineNumberTable` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LineNumber {
    /// First instruction of the line
    pub start_pc: u16,
    /// Source line number
    pub line: u16,
}

/// A `LocalVariableTable` or `LocalVariableTypeTable` entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocalVariable {
    /// Start of the live range
    pub start_pc: u16,
    /// Length of the live range
    pub length: u16,
    /// Variable name
    pub name: String,
    /// Descriptor, or generic signature for the type table
    pub descriptor: String,
    /// Local slot
    pub index: u16,
}

/// A decoded `Code` attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Body {
    /// Maximum operand stack depth
    pub max_stack: u16,
    /// Number of local variable slots
    pub max_locals: u16,
    /// Raw bytecode
    pub code: Vec<u8>,
    /// Constant pool operands within `code`, ordered by offset
    pub references: Vec<CodeReference>,
    /// Exception handlers in table order
    pub exception_table: Vec<ExceptionHandler>,
    /// Stack map frames, if the method has a `StackMapTable`
    pub stack_map: Option<Vec<StackMapFrame>>,
    /// Debug line numbers
    pub line_numbers: Vec<LineNumber>,
    /// Debug local variable names
    pub local_variables: Vec<LocalVariable>,
    /// Debug local variable generic signatures
    pub local_variable_types: Vec<LocalVariable>,
    /// Undecoded nested attributes
    pub unknown: Vec<UnknownAttribute>,
}

impl Body {
    /// Remove everything that only serves debuggers and tools.
    ///
    /// Line numbers and local variable names change whenever unrelated source lines move, so a
    /// body whose instructions are unchanged must compare equal after this runs.
    pub fn strip_debug_info(&mut self) {
        self.line_numbers.clear();
        self.local_variables.clear();
        self.local_variable_types.clear();
        self.unknown.clear();
    }

    /// Returns `true` if the body still carries debug-only tables.
    #[must_use]
    pub fn has_debug_info(&self) -> bool {
        !self.line_numbers.is_empty()
            || !self.local_variables.is_empty()
            || !self.local_variable_types.is_empty()
    }

    /// Every constant this body refers to, in code order followed by handler and frame types.
    ///
    /// Class names referenced only by exception handlers and stack map frames are returned as
    /// [`Constant::Class`].
    #[must_use]
    pub fn referenced_constants(&self) -> Vec<Constant> {
        let mut constants: Vec<Constant> = self
            .references
            .iter()
            .map(|reference| reference.constant.clone())
            .collect();

        for handler in &self.exception_table {
            if let Some(catch_type) = &handler.catch_type {
                constants.push(Constant::Class(catch_type.clone()));
            }
        }

        for frame in self.stack_map.iter().flatten() {
            for ty in frame.locals.iter().chain(frame.stack.iter()) {
                if let VerificationType::Object(name) = ty {
                    constants.push(Constant::Class(name.clone()));
                }
            }
        }

        constants
    }
}
