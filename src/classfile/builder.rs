//! Programmatic construction of declaration units.
//!
//! [`ClassBuilder`] assembles a [`DeclarationUnit`] in memory and can serialize it into a class
//! file, and [`CodeBuilder`] assembles method bodies instruction by instruction while recording
//! the pool operands the same way the reader does. Together they produce realistic inputs
//! without a Java or Kotlin compiler, which is what the test suites and benchmarks use them for.
//!
//! # Examples
//!
//! ```rust
//! use abiscope::classfile::builder::{ClassBuilder, CodeBuilder};
//! use abiscope::classfile::{flags::MethodAccessFlags, opcodes, Member};
//!
//! let body = CodeBuilder::new()
//!     .invokestatic("a/A", "helper", "()I")
//!     .op(opcodes::IRETURN)
//!     .build();
//!
//! let bytes = ClassBuilder::new("a/A")
//!     .method(Member::method(MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC, "f", "()I").with_body(body))
//!     .source_file("A.kt")
//!     .to_bytes()?;
//! assert_eq!(&bytes[..4], &[0xCA, 0xFE, 0xBA, 0xBE]);
//! # Ok::<(), abiscope::Error>(())
//! ```

use crate::{
    abi::serialize::write_unit,
    classfile::{
        attributes::{Annotation, Attribute, InnerClass, Retention},
        body::{
            Body, CodeReference, ExceptionHandler, LineNumber, LocalVariable, OperandWidth,
            StackMapFrame,
        },
        constant::{BootstrapMethod, Constant, MemberRef},
        flags::ClassAccessFlags,
        opcodes, ConstantPool, DeclarationUnit, Member, OBJECT,
    },
    Result,
};

/// Builder for [`DeclarationUnit`]s.
///
/// Defaults to a public class extending `java/lang/Object` with class file version 52.0.
#[derive(Debug, Clone)]
pub struct ClassBuilder {
    unit: DeclarationUnit,
}

impl ClassBuilder {
    /// Start a class with the internal name `name`.
    pub fn new(name: impl Into<String>) -> Self {
        ClassBuilder {
            unit: DeclarationUnit {
                name: name.into(),
                minor_version: 0,
                major_version: 52,
                access: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
                super_class: Some(OBJECT.to_string()),
                interfaces: Vec::new(),
                members: Vec::new(),
                attributes: Vec::new(),
                constant_pool: ConstantPool::default(),
            },
        }
    }

    /// Continue building from an existing unit.
    pub fn from_unit(unit: DeclarationUnit) -> Self {
        ClassBuilder { unit }
    }

    /// Replace the class access flags.
    #[must_use]
    pub fn access(mut self, access: ClassAccessFlags) -> Self {
        self.unit.access = access;
        self
    }

    /// Set the class file version.
    #[must_use]
    pub fn version(mut self, major: u16, minor: u16) -> Self {
        self.unit.major_version = major;
        self.unit.minor_version = minor;
        self
    }

    /// Replace the super class.
    #[must_use]
    pub fn super_class(mut self, name: impl Into<String>) -> Self {
        self.unit.super_class = Some(name.into());
        self
    }

    /// Add an implemented interface.
    #[must_use]
    pub fn interface(mut self, name: impl Into<String>) -> Self {
        self.unit.interfaces.push(name.into());
        self
    }

    /// Add a field.
    #[must_use]
    pub fn field(mut self, field: Member) -> Self {
        self.unit.members.push(field);
        self
    }

    /// Add a method.
    #[must_use]
    pub fn method(mut self, method: Member) -> Self {
        self.unit.members.push(method);
        self
    }

    /// Add a class attribute.
    #[must_use]
    pub fn attribute(mut self, attribute: Attribute) -> Self {
        self.unit.attributes.push(attribute);
        self
    }

    /// Add a `SourceFile` attribute.
    #[must_use]
    pub fn source_file(self, name: impl Into<String>) -> Self {
        self.attribute(Attribute::SourceFile(name.into()))
    }

    /// Add a runtime visible annotation to the class.
    #[must_use]
    pub fn annotation(self, annotation: Annotation) -> Self {
        self.attribute(Attribute::Annotations {
            retention: Retention::Visible,
            annotations: vec![annotation],
        })
    }

    /// Add an `InnerClasses` entry, creating the attribute on first use.
    #[must_use]
    pub fn inner_class(mut self, entry: InnerClass) -> Self {
        let existing = self.unit.attributes.iter_mut().find_map(|attribute| match attribute {
            Attribute::InnerClasses(entries) => Some(entries),
            _ => None,
        });
        match existing {
            Some(entries) => entries.push(entry),
            None => self.unit.attributes.push(Attribute::InnerClasses(vec![entry])),
        }
        self
    }

    /// Mark the class as local or anonymous, enclosed by `class`.
    #[must_use]
    pub fn enclosing_method(
        self,
        class: impl Into<String>,
        method: Option<(&str, &str)>,
    ) -> Self {
        self.attribute(Attribute::EnclosingMethod {
            class: class.into(),
            method: method.map(|(name, descriptor)| (name.to_string(), descriptor.to_string())),
        })
    }

    /// Finish and return the unit.
    #[must_use]
    pub fn build(self) -> DeclarationUnit {
        self.unit
    }

    /// Finish and serialize the unit into a class file.
    ///
    /// Every attribute is written as given; nothing is pruned.
    ///
    /// # Errors
    /// Returns [`crate::Error::PoolOverflow`] if the unit does not fit into one class file.
    pub fn to_bytes(self) -> Result<Vec<u8>> {
        write_unit(&self.unit)
    }
}

/// Builder for method [`Body`]s.
///
/// `max_stack` and `max_locals` are not computed; they default to values large enough for the
/// small bodies tests write and can be set explicitly.
#[derive(Debug, Clone)]
pub struct CodeBuilder {
    body: Body,
    locals: Vec<(String, String, u16)>,
}

impl Default for CodeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeBuilder {
    /// Start an empty body.
    #[must_use]
    pub fn new() -> Self {
        CodeBuilder {
            body: Body {
                max_stack: 8,
                max_locals: 8,
                ..Body::default()
            },
            locals: Vec::new(),
        }
    }

    /// Set the maximum operand stack depth.
    #[must_use]
    pub fn max_stack(mut self, max_stack: u16) -> Self {
        self.body.max_stack = max_stack;
        self
    }

    /// Set the number of local variable slots.
    #[must_use]
    pub fn max_locals(mut self, max_locals: u16) -> Self {
        self.body.max_locals = max_locals;
        self
    }

    /// Current offset in the code.
    #[must_use]
    pub fn pc(&self) -> u16 {
        self.body.code.len() as u16
    }

    /// Append a single instruction without operands.
    #[must_use]
    pub fn op(mut self, opcode: u8) -> Self {
        self.body.code.push(opcode);
        self
    }

    /// Append raw bytes.
    #[must_use]
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.body.code.extend_from_slice(bytes);
        self
    }

    fn local_op(mut self, short_form: u8, long_form: u8, index: u8) -> Self {
        if index <= 3 {
            self.body.code.push(short_form + index);
        } else {
            self.body.code.extend_from_slice(&[long_form, index]);
        }
        self
    }

    /// `aload`
    #[must_use]
    pub fn aload(self, index: u8) -> Self {
        self.local_op(opcodes::ALOAD_0, opcodes::ALOAD, index)
    }

    /// `iload`
    #[must_use]
    pub fn iload(self, index: u8) -> Self {
        self.local_op(opcodes::ILOAD_0, opcodes::ILOAD, index)
    }

    /// Push an `int` using the shortest instruction.
    #[must_use]
    pub fn iconst(mut self, value: i32) -> Self {
        match value {
            -1..=5 => self.body.code.push((i32::from(opcodes::ICONST_0) + value) as u8),
            -128..=127 => self
                .body
                .code
                .extend_from_slice(&[opcodes::BIPUSH, value as i8 as u8]),
            -32768..=32767 => {
                self.body.code.push(opcodes::SIPUSH);
                self.body.code.extend_from_slice(&(value as i16).to_be_bytes());
            }
            _ => return self.ldc(Constant::Integer(value)),
        }
        self
    }

    fn pool_op(mut self, opcode: u8, width: OperandWidth, constant: Constant) -> Self {
        self.body.code.push(opcode);
        self.body.references.push(CodeReference {
            offset: self.body.code.len(),
            width,
            constant,
        });
        match width {
            OperandWidth::Byte => self.body.code.push(0),
            OperandWidth::Short => self.body.code.extend_from_slice(&[0, 0]),
        }
        self
    }

    /// `ldc`, or `ldc2_w` for `long` and `double` constants.
    #[must_use]
    pub fn ldc(self, constant: Constant) -> Self {
        if constant.slots() == 2 {
            self.pool_op(opcodes::LDC2_W, OperandWidth::Short, constant)
        } else {
            self.pool_op(opcodes::LDC, OperandWidth::Byte, constant)
        }
    }

    /// `ldc_w`
    #[must_use]
    pub fn ldc_w(self, constant: Constant) -> Self {
        self.pool_op(opcodes::LDC_W, OperandWidth::Short, constant)
    }

    fn field_op(self, opcode: u8, owner: &str, name: &str, descriptor: &str) -> Self {
        let reference = Constant::FieldRef(MemberRef::new(owner, name, descriptor));
        self.pool_op(opcode, OperandWidth::Short, reference)
    }

    /// `getstatic`
    #[must_use]
    pub fn getstatic(self, owner: &str, name: &str, descriptor: &str) -> Self {
        self.field_op(opcodes::GETSTATIC, owner, name, descriptor)
    }

    /// `putstatic`
    #[must_use]
    pub fn putstatic(self, owner: &str, name: &str, descriptor: &str) -> Self {
        self.field_op(opcodes::PUTSTATIC, owner, name, descriptor)
    }

    /// `getfield`
    #[must_use]
    pub fn getfield(self, owner: &str, name: &str, descriptor: &str) -> Self {
        self.field_op(opcodes::GETFIELD, owner, name, descriptor)
    }

    /// `putfield`
    #[must_use]
    pub fn putfield(self, owner: &str, name: &str, descriptor: &str) -> Self {
        self.field_op(opcodes::PUTFIELD, owner, name, descriptor)
    }

    /// `invokevirtual`
    #[must_use]
    pub fn invokevirtual(self, owner: &str, name: &str, descriptor: &str) -> Self {
        let reference = Constant::MethodRef(MemberRef::new(owner, name, descriptor));
        self.pool_op(opcodes::INVOKEVIRTUAL, OperandWidth::Short, reference)
    }

    /// `invokespecial`
    #[must_use]
    pub fn invokespecial(self, owner: &str, name: &str, descriptor: &str) -> Self {
        let reference = Constant::MethodRef(MemberRef::new(owner, name, descriptor));
        self.pool_op(opcodes::INVOKESPECIAL, OperandWidth::Short, reference)
    }

    /// `invokestatic`
    #[must_use]
    pub fn invokestatic(self, owner: &str, name: &str, descriptor: &str) -> Self {
        let reference = Constant::MethodRef(MemberRef::new(owner, name, descriptor));
        self.pool_op(opcodes::INVOKESTATIC, OperandWidth::Short, reference)
    }

    /// `invokeinterface`, with the argument count derived by the caller.
    #[must_use]
    pub fn invokeinterface(self, owner: &str, name: &str, descriptor: &str, count: u8) -> Self {
        let reference = Constant::InterfaceMethodRef(MemberRef::new(owner, name, descriptor));
        self.pool_op(opcodes::INVOKEINTERFACE, OperandWidth::Short, reference)
            .raw(&[count, 0])
    }

    /// `invokedynamic`
    #[must_use]
    pub fn invokedynamic(self, bootstrap: BootstrapMethod, name: &str, descriptor: &str) -> Self {
        let call_site = Constant::InvokeDynamic {
            bootstrap: Box::new(bootstrap),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        };
        self.pool_op(opcodes::INVOKEDYNAMIC, OperandWidth::Short, call_site)
            .raw(&[0, 0])
    }

    /// `new`
    #[must_use]
    pub fn new_object(self, class: &str) -> Self {
        self.pool_op(opcodes::NEW, OperandWidth::Short, Constant::Class(class.to_string()))
    }

    /// `checkcast`
    #[must_use]
    pub fn checkcast(self, class: &str) -> Self {
        self.pool_op(opcodes::CHECKCAST, OperandWidth::Short, Constant::Class(class.to_string()))
    }

    /// `instanceof`
    #[must_use]
    pub fn instanceof(self, class: &str) -> Self {
        self.pool_op(opcodes::INSTANCEOF, OperandWidth::Short, Constant::Class(class.to_string()))
    }

    /// Record that the next instruction starts source line `line`.
    #[must_use]
    pub fn line(mut self, line: u16) -> Self {
        let start_pc = self.pc();
        self.body.line_numbers.push(LineNumber { start_pc, line });
        self
    }

    /// Name local slot `index`; the entry covers the whole body.
    #[must_use]
    pub fn local_variable(mut self, name: &str, descriptor: &str, index: u16) -> Self {
        self.locals
            .push((name.to_string(), descriptor.to_string(), index));
        self
    }

    /// Add an exception handler.
    #[must_use]
    pub fn handler(mut self, start_pc: u16, end_pc: u16, handler_pc: u16, catch_type: Option<&str>) -> Self {
        self.body.exception_table.push(ExceptionHandler {
            start_pc,
            end_pc,
            handler_pc,
            catch_type: catch_type.map(str::to_string),
        });
        self
    }

    /// Add a stack map frame.
    #[must_use]
    pub fn frame(mut self, frame: StackMapFrame) -> Self {
        self.body.stack_map.get_or_insert_with(Vec::new).push(frame);
        self
    }

    /// Finish the body.
    #[must_use]
    pub fn build(mut self) -> Body {
        let length = self.pc();
        for (name, descriptor, index) in self.locals {
            self.body.local_variables.push(LocalVariable {
                start_pc: 0,
                length,
                name,
                descriptor,
                index,
            });
        }
        self.body
    }
}
