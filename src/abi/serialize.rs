//! Class file serialization.
//!
//! [`write_unit`] turns a [`DeclarationUnit`] back into class file bytes. It writes members and
//! attributes in the order they appear in the unit, so canonical ordering is the job of the
//! rewriter; the output is a pure function of the logical model. Every pool index comes from a
//! [`ConstantPoolBuilder`] built up front, and code operands are patched into a copy of the
//! original bytecode.

use crate::{
    abi::pool::ConstantPoolBuilder,
    classfile::{
        attributes::{self, Annotation, Attribute, ElementValue},
        body::{Body, LocalVariable, OperandWidth, VerificationType},
        constant::Constant,
        DeclarationUnit, MemberKind, MAGIC,
    },
    file::io::{push_be, push_len_u16, push_len_u32, write_be_at},
    Error, Result,
};

/// Serialize a unit into class file bytes.
///
/// Unknown attributes are skipped, since their payload may embed indices into a pool that no
/// longer exists.
///
/// # Errors
/// Returns [`crate::Error::PoolOverflow`] if the unit does not fit into a class file and
/// [`crate::Error::DanglingReference`] if a reference was never interned, which indicates a bug.
pub fn write_unit(unit: &DeclarationUnit) -> Result<Vec<u8>> {
    let pool = ConstantPoolBuilder::for_unit(unit)?;
    let mut out = Vec::with_capacity(1024);

    push_be(&mut out, MAGIC);
    push_be(&mut out, unit.minor_version);
    push_be(&mut out, unit.major_version);
    pool.write(&mut out)?;

    push_be(&mut out, unit.access.bits());
    push_be(&mut out, pool.class(&unit.name)?);
    match &unit.super_class {
        Some(super_class) => push_be(&mut out, pool.class(super_class)?),
        None => push_be(&mut out, 0_u16),
    }
    push_len_u16(&mut out, unit.interfaces.len())?;
    for interface in &unit.interfaces {
        push_be(&mut out, pool.class(interface)?);
    }

    for kind in [MemberKind::Field, MemberKind::Method] {
        let members: Vec<_> = unit
            .members
            .iter()
            .filter(|member| member.kind == kind)
            .collect();
        push_len_u16(&mut out, members.len())?;
        for member in members {
            push_be(&mut out, member.access);
            push_be(&mut out, pool.utf8(&member.name)?);
            push_be(&mut out, pool.utf8(&member.descriptor)?);
            write_attributes(&mut out, &pool, &member.attributes, false)?;
        }
    }

    write_attributes(&mut out, &pool, &unit.attributes, true)?;
    Ok(out)
}

fn write_attributes(
    out: &mut Vec<u8>,
    pool: &ConstantPoolBuilder,
    list: &[Attribute],
    with_bootstrap: bool,
) -> Result<()> {
    let mut written: Vec<Vec<u8>> = Vec::with_capacity(list.len() + 1);

    for attribute in list {
        if let Attribute::Unknown(unknown) = attribute {
            log::warn!(
                "Skipping unknown attribute {} in {}",
                unknown.name,
                pool.unit()
            );
            continue;
        }
        let mut data = Vec::new();
        write_attribute_data(&mut data, pool, attribute)?;
        written.push(framed(pool.utf8(attribute.name())?, &data)?);
    }

    if with_bootstrap && !pool.bootstrap_methods().is_empty() {
        let mut data = Vec::new();
        push_len_u16(&mut data, pool.bootstrap_methods().len())?;
        for bootstrap in pool.bootstrap_methods() {
            push_be(&mut data, pool.index_of(&bootstrap.handle)?);
            push_len_u16(&mut data, bootstrap.arguments.len())?;
            for argument in &bootstrap.arguments {
                push_be(&mut data, pool.index_of(argument)?);
            }
        }
        written.push(framed(pool.utf8(attributes::BOOTSTRAP_METHODS)?, &data)?);
    }

    push_len_u16(out, written.len())?;
    for attribute in written {
        out.extend_from_slice(&attribute);
    }
    Ok(())
}

fn framed(name_index: u16, data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() + 6);
    push_be(&mut out, name_index);
    push_len_u32(&mut out, data.len())?;
    out.extend_from_slice(data);
    Ok(out)
}

fn write_class_list(out: &mut Vec<u8>, pool: &ConstantPoolBuilder, classes: &[String]) -> Result<()> {
    push_len_u16(out, classes.len())?;
    for class in classes {
        push_be(out, pool.class(class)?);
    }
    Ok(())
}

fn write_attribute_data(
    out: &mut Vec<u8>,
    pool: &ConstantPoolBuilder,
    attribute: &Attribute,
) -> Result<()> {
    match attribute {
        Attribute::Code(body) => write_body(out, pool, body)?,
        Attribute::ConstantValue(value) => push_be(out, pool.index_of(value)?),
        Attribute::Exceptions(classes)
        | Attribute::NestMembers(classes)
        | Attribute::PermittedSubclasses(classes) => write_class_list(out, pool, classes)?,
        Attribute::Signature(value) | Attribute::SourceFile(value) => {
            push_be(out, pool.utf8(value)?);
        }
        Attribute::SourceDebugExtension(data) => out.extend_from_slice(data),
        Attribute::InnerClasses(entries) => {
            push_len_u16(out, entries.len())?;
            for entry in entries {
                push_be(out, pool.class(&entry.inner)?);
                match &entry.outer {
                    Some(outer) => push_be(out, pool.class(outer)?),
                    None => push_be(out, 0_u16),
                }
                match &entry.simple_name {
                    Some(simple_name) => push_be(out, pool.utf8(simple_name)?),
                    None => push_be(out, 0_u16),
                }
                push_be(out, entry.flags.bits());
            }
        }
        Attribute::EnclosingMethod { class, method } => {
            push_be(out, pool.class(class)?);
            match method {
                Some((name, descriptor)) => push_be(
                    out,
                    pool.index_of(&Constant::NameAndType {
                        name: name.clone(),
                        descriptor: descriptor.clone(),
                    })?,
                ),
                None => push_be(out, 0_u16),
            }
        }
        Attribute::Annotations { annotations, .. } => {
            write_annotations(out, pool, annotations)?;
        }
        Attribute::ParameterAnnotations { parameters, .. } => {
            let Ok(count) = u8::try_from(parameters.len()) else {
                return Err(malformed_error!("{} annotated parameters", parameters.len()));
            };
            push_be(out, count);
            for annotations in parameters {
                write_annotations(out, pool, annotations)?;
            }
        }
        Attribute::AnnotationDefault(value) => write_element_value(out, pool, value)?,
        Attribute::Deprecated | Attribute::Synthetic => {}
        Attribute::NestHost(class) => push_be(out, pool.class(class)?),
        Attribute::MethodParameters(parameters) => {
            let Ok(count) = u8::try_from(parameters.len()) else {
                return Err(malformed_error!("{} method parameters", parameters.len()));
            };
            push_be(out, count);
            for parameter in parameters {
                match &parameter.name {
                    Some(name) => push_be(out, pool.utf8(name)?),
                    None => push_be(out, 0_u16),
                }
                push_be(out, parameter.flags);
            }
        }
        Attribute::Unknown(_) => {}
    }
    Ok(())
}

fn write_body(out: &mut Vec<u8>, pool: &ConstantPoolBuilder, body: &Body) -> Result<()> {
    push_be(out, body.max_stack);
    push_be(out, body.max_locals);

    let mut code = body.code.clone();
    for reference in &body.references {
        let index = pool.index_of(&reference.constant)?;
        let mut offset = reference.offset;
        match reference.width {
            OperandWidth::Byte => {
                let Ok(index) = u8::try_from(index) else {
                    return Err(Error::PoolOverflow {
                        unit: pool.unit().to_string(),
                        message: format!("ldc operand at {} needs index {}", reference.offset, index),
                    });
                };
                write_be_at(&mut code, &mut offset, index)?;
            }
            OperandWidth::Short => write_be_at(&mut code, &mut offset, index)?,
        }
    }
    push_len_u32(out, code.len())?;
    out.extend_from_slice(&code);

    push_len_u16(out, body.exception_table.len())?;
    for handler in &body.exception_table {
        push_be(out, handler.start_pc);
        push_be(out, handler.end_pc);
        push_be(out, handler.handler_pc);
        match &handler.catch_type {
            Some(catch_type) => push_be(out, pool.class(catch_type)?),
            None => push_be(out, 0_u16),
        }
    }

    let mut nested: Vec<Vec<u8>> = Vec::new();
    if let Some(frames) = &body.stack_map {
        let mut data = Vec::new();
        push_len_u16(&mut data, frames.len())?;
        for frame in frames {
            push_be(&mut data, frame.frame_type);
            match frame.frame_type {
                0..=63 => {}
                64..=127 => write_verification_types(&mut data, pool, &frame.stack)?,
                247 => {
                    push_be(&mut data, frame.offset_delta);
                    write_verification_types(&mut data, pool, &frame.stack)?;
                }
                248..=251 => push_be(&mut data, frame.offset_delta),
                252..=254 => {
                    push_be(&mut data, frame.offset_delta);
                    write_verification_types(&mut data, pool, &frame.locals)?;
                }
                255 => {
                    push_be(&mut data, frame.offset_delta);
                    push_len_u16(&mut data, frame.locals.len())?;
                    write_verification_types(&mut data, pool, &frame.locals)?;
                    push_len_u16(&mut data, frame.stack.len())?;
                    write_verification_types(&mut data, pool, &frame.stack)?;
                }
                reserved => {
                    return Err(malformed_error!("Reserved stack map frame type {}", reserved))
                }
            }
        }
        nested.push(framed(pool.utf8(attributes::STACK_MAP_TABLE)?, &data)?);
    }

    if !body.line_numbers.is_empty() {
        let mut data = Vec::new();
        push_len_u16(&mut data, body.line_numbers.len())?;
        for line in &body.line_numbers {
            push_be(&mut data, line.start_pc);
            push_be(&mut data, line.line);
        }
        nested.push(framed(pool.utf8(attributes::LINE_NUMBER_TABLE)?, &data)?);
    }

    for (name, table) in [
        (attributes::LOCAL_VARIABLE_TABLE, &body.local_variables),
        (attributes::LOCAL_VARIABLE_TYPE_TABLE, &body.local_variable_types),
    ] {
        if !table.is_empty() {
            let data = local_variable_table(pool, table)?;
            nested.push(framed(pool.utf8(name)?, &data)?);
        }
    }

    push_len_u16(out, nested.len())?;
    for attribute in nested {
        out.extend_from_slice(&attribute);
    }
    Ok(())
}

fn local_variable_table(pool: &ConstantPoolBuilder, table: &[LocalVariable]) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    push_len_u16(&mut data, table.len())?;
    for variable in table {
        push_be(&mut data, variable.start_pc);
        push_be(&mut data, variable.length);
        push_be(&mut data, pool.utf8(&variable.name)?);
        push_be(&mut data, pool.utf8(&variable.descriptor)?);
        push_be(&mut data, variable.index);
    }
    Ok(data)
}

fn write_verification_types(
    out: &mut Vec<u8>,
    pool: &ConstantPoolBuilder,
    types: &[VerificationType],
) -> Result<()> {
    for ty in types {
        push_be(out, ty.tag());
        match ty {
            VerificationType::Object(name) => push_be(out, pool.class(name)?),
            VerificationType::Uninitialized(offset) => push_be(out, *offset),
            _ => {}
        }
    }
    Ok(())
}

fn write_annotations(
    out: &mut Vec<u8>,
    pool: &ConstantPoolBuilder,
    annotations: &[Annotation],
) -> Result<()> {
    push_len_u16(out, annotations.len())?;
    for annotation in annotations {
        write_annotation(out, pool, annotation)?;
    }
    Ok(())
}

fn write_annotation(out: &mut Vec<u8>, pool: &ConstantPoolBuilder, annotation: &Annotation) -> Result<()> {
    push_be(out, pool.utf8(&annotation.type_descriptor)?);
    push_len_u16(out, annotation.elements.len())?;
    for (name, value) in &annotation.elements {
        push_be(out, pool.utf8(name)?);
        write_element_value(out, pool, value)?;
    }
    Ok(())
}

fn write_element_value(out: &mut Vec<u8>, pool: &ConstantPoolBuilder, value: &ElementValue) -> Result<()> {
    match value {
        ElementValue::Const { tag, value } => {
            push_be(out, *tag);
            push_be(out, pool.index_of(value)?);
        }
        ElementValue::Enum {
            type_descriptor,
            const_name,
        } => {
            push_be(out, b'e');
            push_be(out, pool.utf8(type_descriptor)?);
            push_be(out, pool.utf8(const_name)?);
        }
        ElementValue::Class(descriptor) => {
            push_be(out, b'c');
            push_be(out, pool.utf8(descriptor)?);
        }
        ElementValue::Annotation(annotation) => {
            push_be(out, b'@');
            write_annotation(out, pool, annotation)?;
        }
        ElementValue::Array(values) => {
            push_be(out, b'[');
            push_len_u16(out, values.len())?;
            for value in values {
                write_element_value(out, pool, value)?;
            }
        }
    }
    Ok(())
}
