//! Deterministic constant pool construction.
//!
//! [`ConstantPoolBuilder`] is an arena of deduplicated [`Constant`]s addressed by stable `u16`
//! indices. Because the reader resolves every original index into a value, the
//! `Constant -> index` map doubles as the old-to-new remapping table: any surviving reference
//! finds its new index by looking up its value.
//!
//! # Interning order
//!
//! Indices depend only on the unit being written, in this order:
//!
//! 1. Targets of one-byte `ldc` operands, so they always fit in a byte
//! 2. `this_class`, `super_class` and the interfaces
//! 3. Fields, then methods, each with their attributes
//! 4. Class attributes
//! 5. Children of everything above, breadth-first
//! 6. The `BootstrapMethods` attribute name
//!
//! Nothing is ever interned while writing; the serializer only looks indices up, and a failed
//! lookup surfaces as [`crate::Error::DanglingReference`].

use std::collections::{HashMap, VecDeque};

use crate::{
    classfile::{
        attributes::{self, Annotation, Attribute, ElementValue},
        body::{Body, OperandWidth, VerificationType},
        constant::{BootstrapMethod, Constant},
        mutf8, DeclarationUnit, MemberKind,
    },
    file::io::{push_be, push_len_u16},
    Error, Result,
};

/// Largest pool index a one-byte `ldc` operand can hold
const MAX_LDC_INDEX: u16 = u8::MAX as u16;

/// Largest valid `constant_pool_count`
const MAX_POOL_COUNT: u32 = u16::MAX as u32;

/// Builds the constant pool of one output class file.
#[derive(Debug)]
pub struct ConstantPoolBuilder {
    unit: String,
    entries: Vec<(u16, Constant)>,
    indices: HashMap<Constant, u16>,
    next: u32,
    bootstraps: Vec<BootstrapMethod>,
    bootstrap_indices: HashMap<BootstrapMethod, u16>,
}

impl ConstantPoolBuilder {
    /// Create an empty pool for the unit named `unit`.
    pub fn new(unit: impl Into<String>) -> Self {
        ConstantPoolBuilder {
            unit: unit.into(),
            entries: Vec::new(),
            indices: HashMap::new(),
            next: 1,
            bootstraps: Vec::new(),
            bootstrap_indices: HashMap::new(),
        }
    }

    /// Build the complete pool for a unit.
    ///
    /// # Errors
    /// Returns [`crate::Error::PoolOverflow`] if the pool exceeds 65535 slots or a one-byte
    /// `ldc` target does not fit into a byte.
    pub fn for_unit(unit: &DeclarationUnit) -> Result<Self> {
        let mut pool = ConstantPoolBuilder::new(unit.name.clone());

        for body in unit.methods().filter_map(|method| method.body()) {
            for reference in &body.references {
                if reference.width == OperandWidth::Byte {
                    let index = pool.intern(&reference.constant)?;
                    if index > MAX_LDC_INDEX {
                        return Err(pool.overflow(format!(
                            "ldc target {} lands at index {}",
                            reference.constant, index
                        )));
                    }
                }
            }
        }

        let mut constants = Vec::new();
        collect_unit_constants(unit, &mut constants);
        for constant in &constants {
            pool.intern(constant)?;
        }

        pool.close()?;
        Ok(pool)
    }

    /// Name of the unit this pool belongs to.
    #[must_use]
    pub fn unit(&self) -> &str {
        &self.unit
    }

    fn overflow(&self, message: String) -> Error {
        Error::PoolOverflow {
            unit: self.unit.clone(),
            message,
        }
    }

    /// Add a constant if absent and return its index.
    ///
    /// # Errors
    /// Returns [`crate::Error::PoolOverflow`] if the pool is full.
    pub fn intern(&mut self, constant: &Constant) -> Result<u16> {
        if let Some(&index) = self.indices.get(constant) {
            return Ok(index);
        }

        let slots = u32::from(constant.slots());
        if self.next + slots > MAX_POOL_COUNT {
            return Err(self.overflow(format!(
                "more than {} constant pool slots",
                MAX_POOL_COUNT - 1
            )));
        }

        let index = self.next as u16;
        self.next += slots;
        self.entries.push((index, constant.clone()));
        self.indices.insert(constant.clone(), index);
        Ok(index)
    }

    /// Intern the children of every entry, breadth-first, registering bootstrap methods on
    /// the way.
    fn close(&mut self) -> Result<()> {
        let mut queue: VecDeque<usize> = (0..self.entries.len()).collect();

        while let Some(position) = queue.pop_front() {
            let constant = self.entries[position].1.clone();

            let mut children = constant.children();
            if let Some(bootstrap) = constant.bootstrap() {
                if !self.bootstrap_indices.contains_key(bootstrap) {
                    let Ok(index) = u16::try_from(self.bootstraps.len()) else {
                        return Err(self.overflow("too many bootstrap methods".to_string()));
                    };
                    self.bootstraps.push(bootstrap.clone());
                    self.bootstrap_indices.insert(bootstrap.clone(), index);
                }
                children.push(bootstrap.handle.clone());
                children.extend(bootstrap.arguments.iter().cloned());
            }

            for child in children {
                let before = self.entries.len();
                self.intern(&child)?;
                if self.entries.len() > before {
                    queue.push_back(before);
                }
            }
        }

        if !self.bootstraps.is_empty() {
            self.intern(&Constant::Utf8(attributes::BOOTSTRAP_METHODS.to_string()))?;
        }
        Ok(())
    }

    /// Index of an interned constant.
    ///
    /// # Errors
    /// Returns [`crate::Error::DanglingReference`] if the constant was never interned.
    pub fn index_of(&self, constant: &Constant) -> Result<u16> {
        self.indices
            .get(constant)
            .copied()
            .ok_or_else(|| Error::DanglingReference {
                unit: self.unit.clone(),
                target: constant.to_string(),
            })
    }

    /// Index of a `Utf8` entry.
    ///
    /// # Errors
    /// See [`ConstantPoolBuilder::index_of`].
    pub fn utf8(&self, value: &str) -> Result<u16> {
        self.index_of(&Constant::Utf8(value.to_string()))
    }

    /// Index of a `Class` entry.
    ///
    /// # Errors
    /// See [`ConstantPoolBuilder::index_of`].
    pub fn class(&self, name: &str) -> Result<u16> {
        self.index_of(&Constant::Class(name.to_string()))
    }

    /// Position of a bootstrap method in the `BootstrapMethods` attribute.
    ///
    /// # Errors
    /// Returns [`crate::Error::DanglingReference`] if the bootstrap method was never reached.
    pub fn bootstrap_index(&self, bootstrap: &BootstrapMethod) -> Result<u16> {
        self.bootstrap_indices
            .get(bootstrap)
            .copied()
            .ok_or_else(|| Error::DanglingReference {
                unit: self.unit.clone(),
                target: format!("bootstrap method {}", bootstrap.handle),
            })
    }

    /// Bootstrap methods in attribute order.
    #[must_use]
    pub fn bootstrap_methods(&self) -> &[BootstrapMethod] {
        &self.bootstraps
    }

    /// The `constant_pool_count` to write.
    #[must_use]
    pub fn count(&self) -> u16 {
        self.next as u16
    }

    /// Number of distinct entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing was interned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in index order.
    pub fn iter(&self) -> impl Iterator<Item = (u16, &Constant)> {
        self.entries.iter().map(|(index, constant)| (*index, constant))
    }

    /// Write `constant_pool_count` followed by every entry.
    ///
    /// # Errors
    /// Returns [`crate::Error::PoolOverflow`] for strings longer than 65535 encoded bytes and
    /// [`crate::Error::DanglingReference`] if an entry refers to something not interned.
    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        push_be(out, self.count());

        for (_, constant) in &self.entries {
            push_be(out, constant.tag());
            match constant {
                Constant::Utf8(value) => self.write_utf8(out, &mutf8::encode(value))?,
                Constant::Utf16(units) => self.write_utf8(out, &mutf8::encode_wide(units))?,
                Constant::Integer(value) => push_be(out, *value),
                Constant::Float(bits) => push_be(out, *bits),
                Constant::Long(value) => push_be(out, *value),
                Constant::Double(bits) => push_be(out, *bits),
                Constant::Class(name)
                | Constant::String(name)
                | Constant::MethodType(name)
                | Constant::Module(name)
                | Constant::Package(name) => push_be(out, self.utf8(name)?),
                Constant::WideString(units) => {
                    push_be(out, self.index_of(&Constant::Utf16(units.clone()))?);
                }
                Constant::FieldRef(member)
                | Constant::MethodRef(member)
                | Constant::InterfaceMethodRef(member) => {
                    push_be(out, self.class(&member.owner)?);
                    push_be(
                        out,
                        self.index_of(&Constant::NameAndType {
                            name: member.name.clone(),
                            descriptor: member.descriptor.clone(),
                        })?,
                    );
                }
                Constant::NameAndType { name, descriptor } => {
                    push_be(out, self.utf8(name)?);
                    push_be(out, self.utf8(descriptor)?);
                }
                Constant::MethodHandle { kind, reference } => {
                    push_be(out, *kind as u8);
                    push_be(out, self.index_of(reference)?);
                }
                Constant::Dynamic {
                    bootstrap,
                    name,
                    descriptor,
                }
                | Constant::InvokeDynamic {
                    bootstrap,
                    name,
                    descriptor,
                } => {
                    push_be(out, self.bootstrap_index(bootstrap)?);
                    push_be(
                        out,
                        self.index_of(&Constant::NameAndType {
                            name: name.clone(),
                            descriptor: descriptor.clone(),
                        })?,
                    );
                }
            }
        }

        Ok(())
    }

    fn write_utf8(&self, out: &mut Vec<u8>, encoded: &[u8]) -> Result<()> {
        if encoded.len() > usize::from(u16::MAX) {
            return Err(self.overflow(format!(
                "string of {} bytes exceeds the Utf8 limit",
                encoded.len()
            )));
        }
        push_len_u16(out, encoded.len())?;
        out.extend_from_slice(encoded);
        Ok(())
    }
}

/// Collect the top-level constants a unit's class file refers to, in serialization order.
///
/// Must stay in step with what the serializer writes: attributes the serializer skips
/// contribute nothing here.
pub fn collect_unit_constants(unit: &DeclarationUnit, out: &mut Vec<Constant>) {
    out.push(Constant::Class(unit.name.clone()));
    if let Some(super_class) = &unit.super_class {
        out.push(Constant::Class(super_class.clone()));
    }
    for interface in &unit.interfaces {
        out.push(Constant::Class(interface.clone()));
    }

    for kind in [MemberKind::Field, MemberKind::Method] {
        for member in unit.members.iter().filter(|member| member.kind == kind) {
            out.push(Constant::Utf8(member.name.clone()));
            out.push(Constant::Utf8(member.descriptor.clone()));
            for attribute in &member.attributes {
                collect_attribute_constants(attribute, out);
            }
        }
    }

    for attribute in &unit.attributes {
        collect_attribute_constants(attribute, out);
    }
}

/// Collect the constants of one attribute, starting with its name.
pub fn collect_attribute_constants(attribute: &Attribute, out: &mut Vec<Constant>) {
    if matches!(attribute, Attribute::Unknown(_)) {
        return;
    }
    out.push(Constant::Utf8(attribute.name().to_string()));

    match attribute {
        Attribute::Code(body) => collect_body_constants(body, out),
        Attribute::ConstantValue(value) => out.push(value.clone()),
        Attribute::Exceptions(classes)
        | Attribute::NestMembers(classes)
        | Attribute::PermittedSubclasses(classes) => {
            out.extend(classes.iter().cloned().map(Constant::Class));
        }
        Attribute::Signature(value) | Attribute::SourceFile(value) => {
            out.push(Constant::Utf8(value.clone()));
        }
        Attribute::NestHost(class) => out.push(Constant::Class(class.clone())),
        Attribute::InnerClasses(entries) => {
            for entry in entries {
                out.push(Constant::Class(entry.inner.clone()));
                if let Some(outer) = &entry.outer {
                    out.push(Constant::Class(outer.clone()));
                }
                if let Some(simple_name) = &entry.simple_name {
                    out.push(Constant::Utf8(simple_name.clone()));
                }
            }
        }
        Attribute::EnclosingMethod { class, method } => {
            out.push(Constant::Class(class.clone()));
            if let Some((name, descriptor)) = method {
                out.push(Constant::NameAndType {
                    name: name.clone(),
                    descriptor: descriptor.clone(),
                });
            }
        }
        Attribute::Annotations { annotations, .. } => {
            for annotation in annotations {
                collect_annotation_constants(annotation, out);
            }
        }
        Attribute::ParameterAnnotations { parameters, .. } => {
            for annotation in parameters.iter().flatten() {
                collect_annotation_constants(annotation, out);
            }
        }
        Attribute::AnnotationDefault(value) => collect_element_constants(value, out),
        Attribute::MethodParameters(parameters) => {
            out.extend(
                parameters
                    .iter()
                    .filter_map(|parameter| parameter.name.clone())
                    .map(Constant::Utf8),
            );
        }
        Attribute::SourceDebugExtension(_)
        | Attribute::Deprecated
        | Attribute::Synthetic
        | Attribute::Unknown(_) => {}
    }
}

fn collect_body_constants(body: &Body, out: &mut Vec<Constant>) {
    out.extend(body.references.iter().map(|reference| reference.constant.clone()));
    for handler in &body.exception_table {
        if let Some(catch_type) = &handler.catch_type {
            out.push(Constant::Class(catch_type.clone()));
        }
    }

    if let Some(frames) = &body.stack_map {
        out.push(Constant::Utf8(attributes::STACK_MAP_TABLE.to_string()));
        for ty in frames.iter().flat_map(|frame| frame.locals.iter().chain(frame.stack.iter())) {
            if let VerificationType::Object(name) = ty {
                out.push(Constant::Class(name.clone()));
            }
        }
    }
    if !body.line_numbers.is_empty() {
        out.push(Constant::Utf8(attributes::LINE_NUMBER_TABLE.to_string()));
    }
    for (name, table) in [
        (attributes::LOCAL_VARIABLE_TABLE, &body.local_variables),
        (attributes::LOCAL_VARIABLE_TYPE_TABLE, &body.local_variable_types),
    ] {
        if table.is_empty() {
            continue;
        }
        out.push(Constant::Utf8(name.to_string()));
        for variable in table {
            out.push(Constant::Utf8(variable.name.clone()));
            out.push(Constant::Utf8(variable.descriptor.clone()));
        }
    }
}

fn collect_annotation_constants(annotation: &Annotation, out: &mut Vec<Constant>) {
    out.push(Constant::Utf8(annotation.type_descriptor.clone()));
    for (name, value) in &annotation.elements {
        out.push(Constant::Utf8(name.clone()));
        collect_element_constants(value, out);
    }
}

fn collect_element_constants(value: &ElementValue, out: &mut Vec<Constant>) {
    match value {
        ElementValue::Const { value, .. } => out.push(value.clone()),
        ElementValue::Enum {
            type_descriptor,
            const_name,
        } => {
            out.push(Constant::Utf8(type_descriptor.clone()));
            out.push(Constant::Utf8(const_name.clone()));
        }
        ElementValue::Class(descriptor) => out.push(Constant::Utf8(descriptor.clone())),
        ElementValue::Annotation(annotation) => collect_annotation_constants(annotation, out),
        ElementValue::Array(values) => {
            for value in values {
                collect_element_constants(value, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::{
        builder::{ClassBuilder, CodeBuilder},
        constant::{MemberRef, ReferenceKind},
        flags::MethodAccessFlags,
        opcodes, Member,
    };

    #[test]
    fn deduplicates_and_reserves_wide_slots() {
        let mut pool = ConstantPoolBuilder::new("a/A");
        let long = pool.intern(&Constant::Long(5)).unwrap();
        let utf8 = pool.intern(&Constant::Utf8("x".to_string())).unwrap();
        let again = pool.intern(&Constant::Long(5)).unwrap();

        assert_eq!((long, utf8, again), (1, 3, 1));
        assert_eq!(pool.count(), 4);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn children_are_closed_after_top_level_entries() {
        let unit = ClassBuilder::new("a/A").build();
        let pool = ConstantPoolBuilder::for_unit(&unit).unwrap();

        let order: Vec<&Constant> = pool.iter().map(|(_, constant)| constant).collect();
        assert_eq!(order[0], &Constant::Class("a/A".to_string()));
        assert_eq!(order[1], &Constant::Class("java/lang/Object".to_string()));
        assert_eq!(order[2], &Constant::Utf8("a/A".to_string()));
        assert_eq!(order[3], &Constant::Utf8("java/lang/Object".to_string()));
    }

    #[test]
    fn ldc_targets_come_first() {
        let body = CodeBuilder::new()
            .invokestatic("a/B", "g", "()V")
            .ldc(Constant::String("late".to_string()))
            .op(opcodes::ARETURN)
            .build();
        let unit = ClassBuilder::new("a/A")
            .method(Member::method(MethodAccessFlags::STATIC, "f", "()Ljava/lang/String;").with_body(body))
            .build();

        let pool = ConstantPoolBuilder::for_unit(&unit).unwrap();
        assert_eq!(pool.index_of(&Constant::String("late".to_string())).unwrap(), 1);
    }

    #[test]
    fn bootstrap_methods_are_registered() {
        let handle = Constant::MethodHandle {
            kind: ReferenceKind::InvokeStatic,
            reference: Box::new(Constant::MethodRef(MemberRef::new(
                "java/lang/invoke/StringConcatFactory",
                "makeConcatWithConstants",
                "()Ljava/lang/invoke/CallSite;",
            ))),
        };
        let bootstrap = BootstrapMethod {
            handle,
            arguments: vec![Constant::String("\u{1}!".to_string())],
        };
        let body = CodeBuilder::new()
            .aload(0)
            .invokedynamic(bootstrap.clone(), "makeConcatWithConstants", "(Ljava/lang/String;)Ljava/lang/String;")
            .op(opcodes::ARETURN)
            .build();
        let unit = ClassBuilder::new("a/A")
            .method(
                Member::method(MethodAccessFlags::STATIC, "f", "(Ljava/lang/String;)Ljava/lang/String;")
                    .with_body(body),
            )
            .build();

        let pool = ConstantPoolBuilder::for_unit(&unit).unwrap();
        assert_eq!(pool.bootstrap_methods(), &[bootstrap.clone()]);
        assert_eq!(pool.bootstrap_index(&bootstrap).unwrap(), 0);
        assert!(pool.utf8(attributes::BOOTSTRAP_METHODS).is_ok());
        assert!(pool.index_of(&bootstrap.arguments[0]).is_ok());
    }

    #[test]
    fn missing_lookup_is_dangling() {
        let pool = ConstantPoolBuilder::new("a/A");
        let error = pool.class("a/Gone").unwrap_err();
        assert!(error.is_internal());
    }

    #[test]
    fn too_many_ldc_targets_overflow() {
        let mut code = CodeBuilder::new();
        for i in 0..300 {
            code = code.ldc(Constant::String(format!("s{i}"))).op(opcodes::POP);
        }
        let unit = ClassBuilder::new("a/A")
            .method(Member::method(MethodAccessFlags::STATIC, "f", "()V").with_body(code.op(opcodes::RETURN).build()))
            .build();

        assert!(matches!(
            ConstantPoolBuilder::for_unit(&unit),
            Err(Error::PoolOverflow { .. })
        ));
    }
}
