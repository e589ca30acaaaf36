//! Class file reader.
//!
//! Reading happens in two stages. The first stage walks the file once, decoding the raw
//! constant pool and slicing out member and attribute payloads without interpreting them. This
//! is needed because `CONSTANT_Dynamic` and `CONSTANT_InvokeDynamic` entries refer to the
//! `BootstrapMethods` attribute, which sits at the very end of the file. The second stage
//! resolves every pool entry into an owned [`Constant`] and decodes the attributes against the
//! resolved pool.

use widestring::U16String;

use crate::{
    classfile::{
        attributes::{
            self, Annotation, Attribute, ElementValue, InnerClass, MethodParameter, Retention,
            UnknownAttribute,
        },
        body::{
            Body, CodeReference, ExceptionHandler, LineNumber, LocalVariable, StackMapFrame,
            VerificationType,
        },
        constant::{self, BootstrapMethod, Constant, MemberRef, ReferenceKind},
        flags::{ClassAccessFlags, NestedClassFlags},
        mutf8,
        opcodes::decode_pool_operands,
        ConstantPool, DeclarationUnit, Member, MemberKind, MAGIC,
    },
    file::parser::Parser,
    Result,
};

/// Nesting limit for constants that refer to other constants.
///
/// Legal pools nest at most a handful of levels; the limit only exists to stop cycles between
/// `CONSTANT_Dynamic` entries and their bootstrap arguments.
const MAX_RESOLVE_DEPTH: usize = 64;

/// Upper bound on the total size of all resolved constants, counted in constant nodes.
///
/// Resolved constants own their operands, so a `CONSTANT_Dynamic` chain whose bootstrap
/// arguments name the previous link twice doubles in size with every link. Ordinary pools stay
/// several orders of magnitude below this bound.
const MAX_RESOLVED_NODES: usize = 1 << 22;

/// Parse one class file into a [`DeclarationUnit`].
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if the magic is missing, a pool index is invalid or
/// points at the wrong kind of entry, or a string is not valid modified UTF-8, and
/// [`crate::Error::OutOfBounds`] if a declared length exceeds the available bytes. Callers that
/// know the container name report it as [`crate::Error::MalformedContainer`].
pub fn read_unit(data: &[u8]) -> Result<DeclarationUnit> {
    let raw = RawClass::parse(data)?;
    let mut resolver = Resolver::new(&raw.pool);

    let bootstrap = raw
        .attributes
        .iter()
        .find(|attribute| attribute.name == attributes::BOOTSTRAP_METHODS);
    if let Some(attribute) = bootstrap {
        resolver.bootstrap = parse_bootstrap_methods(attribute.data)?;
    }

    let pool = resolver.resolve_all()?;

    let name = pool.class_name(raw.this_class)?;
    let super_class = pool.optional_class(raw.super_class)?;
    let interfaces = raw
        .interfaces
        .iter()
        .map(|&index| pool.class_name(index))
        .collect::<Result<Vec<_>>>()?;

    let mut members = Vec::with_capacity(raw.members.len());
    for raw_member in &raw.members {
        let mut attributes = Vec::with_capacity(raw_member.attributes.len());
        for attribute in &raw_member.attributes {
            let in_method = raw_member.kind == MemberKind::Method;
            attributes.push(parse_attribute(&pool, attribute, in_method)?);
        }
        members.push(Member {
            kind: raw_member.kind,
            access: raw_member.access,
            name: pool.utf8(raw_member.name)?,
            descriptor: pool.utf8(raw_member.descriptor)?,
            attributes,
            inline: false,
        });
    }

    let mut class_attributes = Vec::with_capacity(raw.attributes.len());
    for attribute in &raw.attributes {
        if attribute.name == attributes::BOOTSTRAP_METHODS {
            continue;
        }
        class_attributes.push(parse_attribute(&pool, attribute, false)?);
    }

    Ok(DeclarationUnit {
        name,
        minor_version: raw.minor_version,
        major_version: raw.major_version,
        access: ClassAccessFlags::from_bits_retain(raw.access),
        super_class,
        interfaces,
        members,
        attributes: class_attributes,
        constant_pool: pool,
    })
}

/// A pool entry with its references still expressed as indices.
#[derive(Debug, Clone)]
enum RawEntry {
    Utf8(String),
    Utf16(U16String),
    Integer(i32),
    Float(u32),
    Long(i64),
    Double(u64),
    Class(u16),
    String(u16),
    FieldRef(u16, u16),
    MethodRef(u16, u16),
    InterfaceMethodRef(u16, u16),
    NameAndType(u16, u16),
    MethodHandle(u8, u16),
    MethodType(u16),
    Dynamic(u16, u16),
    InvokeDynamic(u16, u16),
    Module(u16),
    Package(u16),
}

struct RawAttribute<'a> {
    name: String,
    data: &'a [u8],
}

struct RawMember<'a> {
    kind: MemberKind,
    access: u16,
    name: u16,
    descriptor: u16,
    attributes: Vec<RawAttribute<'a>>,
}

struct RawBootstrap {
    handle: u16,
    arguments: Vec<u16>,
}

struct RawClass<'a> {
    minor_version: u16,
    major_version: u16,
    pool: Vec<Option<RawEntry>>,
    access: u16,
    this_class: u16,
    super_class: u16,
    interfaces: Vec<u16>,
    members: Vec<RawMember<'a>>,
    attributes: Vec<RawAttribute<'a>>,
}

impl<'a> RawClass<'a> {
    fn parse(data: &'a [u8]) -> Result<Self> {
        let mut parser = Parser::new(data);

        let magic = parser.read_be::<u32>()?;
        if magic != MAGIC {
            return Err(malformed_error!("Invalid class file magic {:08X}", magic));
        }
        let minor_version = parser.read_be::<u16>()?;
        let major_version = parser.read_be::<u16>()?;

        let pool = parse_raw_pool(&mut parser)?;

        let access = parser.read_be::<u16>()?;
        let this_class = parser.read_be::<u16>()?;
        let super_class = parser.read_be::<u16>()?;

        let interface_count = parser.read_be::<u16>()?;
        let mut interfaces = Vec::with_capacity(interface_count as usize);
        for _ in 0..interface_count {
            interfaces.push(parser.read_be::<u16>()?);
        }

        let mut members = Vec::new();
        for kind in [MemberKind::Field, MemberKind::Method] {
            let count = parser.read_be::<u16>()?;
            for _ in 0..count {
                let access = parser.read_be::<u16>()?;
                let name = parser.read_be::<u16>()?;
                let descriptor = parser.read_be::<u16>()?;
                let attributes = parse_raw_attributes(&mut parser, &pool)?;
                members.push(RawMember {
                    kind,
                    access,
                    name,
                    descriptor,
                    attributes,
                });
            }
        }

        let attributes = parse_raw_attributes(&mut parser, &pool)?;
        if parser.has_more_data() {
            return Err(malformed_error!(
                "{} trailing bytes after class file",
                parser.remaining()
            ));
        }

        Ok(RawClass {
            minor_version,
            major_version,
            pool,
            access,
            this_class,
            super_class,
            interfaces,
            members,
            attributes,
        })
    }
}

fn parse_raw_pool(parser: &mut Parser<'_>) -> Result<Vec<Option<RawEntry>>> {
    let count = parser.read_be::<u16>()?;
    if count == 0 {
        return Err(malformed_error!("constant_pool_count must not be zero"));
    }

    let mut pool: Vec<Option<RawEntry>> = Vec::with_capacity(count as usize);
    pool.push(None);

    while pool.len() < count as usize {
        let tag = parser.read_be::<u8>()?;
        let entry = match tag {
            constant::TAG_UTF8 => {
                let length = parser.read_be::<u16>()?;
                match mutf8::decode_text(parser.read_bytes(length as usize)?)? {
                    mutf8::Text::Unicode(text) => RawEntry::Utf8(text),
                    mutf8::Text::Wide(units) => RawEntry::Utf16(units),
                }
            }
            constant::TAG_INTEGER => RawEntry::Integer(parser.read_be::<i32>()?),
            constant::TAG_FLOAT => RawEntry::Float(parser.read_be::<u32>()?),
            constant::TAG_LONG => RawEntry::Long(parser.read_be::<i64>()?),
            constant::TAG_DOUBLE => RawEntry::Double(parser.read_be::<u64>()?),
            constant::TAG_CLASS => RawEntry::Class(parser.read_be::<u16>()?),
            constant::TAG_STRING => RawEntry::String(parser.read_be::<u16>()?),
            constant::TAG_FIELDREF => {
                RawEntry::FieldRef(parser.read_be::<u16>()?, parser.read_be::<u16>()?)
            }
            constant::TAG_METHODREF => {
                RawEntry::MethodRef(parser.read_be::<u16>()?, parser.read_be::<u16>()?)
            }
            constant::TAG_INTERFACE_METHODREF => {
                RawEntry::InterfaceMethodRef(parser.read_be::<u16>()?, parser.read_be::<u16>()?)
            }
            constant::TAG_NAME_AND_TYPE => {
                RawEntry::NameAndType(parser.read_be::<u16>()?, parser.read_be::<u16>()?)
            }
            constant::TAG_METHOD_HANDLE => {
                RawEntry::MethodHandle(parser.read_be::<u8>()?, parser.read_be::<u16>()?)
            }
            constant::TAG_METHOD_TYPE => RawEntry::MethodType(parser.read_be::<u16>()?),
            constant::TAG_DYNAMIC => {
                RawEntry::Dynamic(parser.read_be::<u16>()?, parser.read_be::<u16>()?)
            }
            constant::TAG_INVOKE_DYNAMIC => {
                RawEntry::InvokeDynamic(parser.read_be::<u16>()?, parser.read_be::<u16>()?)
            }
            constant::TAG_MODULE => RawEntry::Module(parser.read_be::<u16>()?),
            constant::TAG_PACKAGE => RawEntry::Package(parser.read_be::<u16>()?),
            _ => {
                return Err(malformed_error!(
                    "Invalid constant pool tag {} at index {}",
                    tag,
                    pool.len()
                ))
            }
        };

        let wide = matches!(entry, RawEntry::Long(_) | RawEntry::Double(_));
        pool.push(Some(entry));
        if wide {
            if pool.len() >= count as usize {
                return Err(malformed_error!("Wide constant overruns constant_pool_count"));
            }
            pool.push(None);
        }
    }

    Ok(pool)
}

fn parse_raw_attributes<'a>(
    parser: &mut Parser<'a>,
    pool: &[Option<RawEntry>],
) -> Result<Vec<RawAttribute<'a>>> {
    let count = parser.read_be::<u16>()?;
    let mut attributes = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name_index = parser.read_be::<u16>()?;
        let name = match pool.get(name_index as usize) {
            Some(Some(RawEntry::Utf8(name))) => name.clone(),
            _ => {
                return Err(malformed_error!(
                    "Attribute name index {} is not a Utf8 constant",
                    name_index
                ))
            }
        };
        let data = parser.read_u32_prefixed()?;
        attributes.push(RawAttribute { name, data });
    }
    Ok(attributes)
}

fn parse_bootstrap_methods(data: &[u8]) -> Result<Vec<RawBootstrap>> {
    let mut parser = Parser::new(data);
    let count = parser.read_be::<u16>()?;
    let mut methods = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let handle = parser.read_be::<u16>()?;
        let argument_count = parser.read_be::<u16>()?;
        let mut arguments = Vec::with_capacity(argument_count as usize);
        for _ in 0..argument_count {
            arguments.push(parser.read_be::<u16>()?);
        }
        methods.push(RawBootstrap { handle, arguments });
    }
    Ok(methods)
}

/// Turns raw entries into resolved constants, memoizing every resolved index.
struct Resolver<'r> {
    raw: &'r [Option<RawEntry>],
    bootstrap: Vec<RawBootstrap>,
    resolved: Vec<Option<Constant>>,
    sizes: Vec<Option<usize>>,
}

impl<'r> Resolver<'r> {
    fn new(raw: &'r [Option<RawEntry>]) -> Self {
        Resolver {
            raw,
            bootstrap: Vec::new(),
            resolved: vec![None; raw.len()],
            sizes: vec![None; raw.len()],
        }
    }

    fn resolve_all(mut self) -> Result<ConstantPool> {
        let mut total = 0_usize;
        for index in 1..self.raw.len() {
            if self.raw[index].is_some() {
                total = total.saturating_add(self.size(index as u16, 0)?);
            }
        }
        if total > MAX_RESOLVED_NODES {
            return Err(malformed_error!(
                "Constant pool expands to more than {} resolved constants",
                MAX_RESOLVED_NODES
            ));
        }

        for index in 1..self.raw.len() {
            if self.raw[index].is_some() {
                self.resolve(index as u16, 0)?;
            }
        }
        Ok(ConstantPool::from_entries(self.resolved))
    }

    fn entry(&self, index: u16) -> Result<&'r RawEntry> {
        match self.raw.get(index as usize) {
            Some(Some(entry)) => Ok(entry),
            _ => Err(malformed_error!("Invalid constant pool index {}", index)),
        }
    }

    fn utf8(&self, index: u16) -> Result<String> {
        match self.entry(index)? {
            RawEntry::Utf8(value) => Ok(value.clone()),
            RawEntry::Utf16(_) => Err(malformed_error!(
                "Constant {} holds unpaired surrogates and cannot be used as a name",
                index
            )),
            _ => Err(malformed_error!("Constant {} is not a Utf8 constant", index)),
        }
    }

    fn name_and_type(&self, index: u16) -> Result<(String, String)> {
        match self.entry(index)? {
            RawEntry::NameAndType(name, descriptor) => Ok((self.utf8(*name)?, self.utf8(*descriptor)?)),
            _ => Err(malformed_error!("Constant {} is not a NameAndType", index)),
        }
    }

    fn member_ref(&self, class: u16, name_and_type: u16) -> Result<MemberRef> {
        let owner = match self.entry(class)? {
            RawEntry::Class(name) => self.utf8(*name)?,
            _ => return Err(malformed_error!("Constant {} is not a Class", class)),
        };
        let (name, descriptor) = self.name_and_type(name_and_type)?;
        Ok(MemberRef {
            owner,
            name,
            descriptor,
        })
    }

    /// Number of constant nodes the entry at `index` owns once resolved, memoized.
    fn size(&mut self, index: u16, depth: usize) -> Result<usize> {
        if let Some(Some(size)) = self.sizes.get(index as usize) {
            return Ok(*size);
        }
        if depth > MAX_RESOLVE_DEPTH {
            return Err(malformed_error!(
                "Constant {} refers to itself through bootstrap arguments",
                index
            ));
        }

        let operands: Vec<u16> = match self.entry(index)? {
            RawEntry::Utf8(_)
            | RawEntry::Utf16(_)
            | RawEntry::Integer(_)
            | RawEntry::Float(_)
            | RawEntry::Long(_)
            | RawEntry::Double(_) => Vec::new(),
            RawEntry::Class(operand)
            | RawEntry::String(operand)
            | RawEntry::MethodType(operand)
            | RawEntry::Module(operand)
            | RawEntry::Package(operand)
            | RawEntry::MethodHandle(_, operand) => vec![*operand],
            RawEntry::FieldRef(first, second)
            | RawEntry::MethodRef(first, second)
            | RawEntry::InterfaceMethodRef(first, second)
            | RawEntry::NameAndType(first, second) => vec![*first, *second],
            RawEntry::Dynamic(bootstrap, nat) | RawEntry::InvokeDynamic(bootstrap, nat) => {
                let Some(raw) = self.bootstrap.get(*bootstrap as usize) else {
                    return Err(malformed_error!("Invalid bootstrap method index {}", bootstrap));
                };
                let mut operands = Vec::with_capacity(raw.arguments.len() + 2);
                operands.push(*nat);
                operands.push(raw.handle);
                operands.extend_from_slice(&raw.arguments);
                operands
            }
        };

        let mut size = 1_usize;
        for operand in operands {
            size = size.saturating_add(self.size(operand, depth + 1)?);
        }
        self.sizes[index as usize] = Some(size);
        Ok(size)
    }

    fn bootstrap_method(&mut self, index: u16, depth: usize) -> Result<BootstrapMethod> {
        let Some(raw) = self.bootstrap.get(index as usize) else {
            return Err(malformed_error!("Invalid bootstrap method index {}", index));
        };
        let handle_index = raw.handle;
        let argument_indices = raw.arguments.clone();

        let handle = self.resolve(handle_index, depth + 1)?;
        if !matches!(handle, Constant::MethodHandle { .. }) {
            return Err(malformed_error!(
                "Bootstrap method {} is not a MethodHandle",
                index
            ));
        }
        let mut arguments = Vec::with_capacity(argument_indices.len());
        for argument in argument_indices {
            arguments.push(self.resolve(argument, depth + 1)?);
        }
        Ok(BootstrapMethod { handle, arguments })
    }

    fn resolve(&mut self, index: u16, depth: usize) -> Result<Constant> {
        if let Some(Some(constant)) = self.resolved.get(index as usize) {
            return Ok(constant.clone());
        }
        if depth > MAX_RESOLVE_DEPTH {
            return Err(malformed_error!(
                "Constant {} refers to itself through bootstrap arguments",
                index
            ));
        }

        let constant = match self.entry(index)? {
            RawEntry::Utf8(value) => Constant::Utf8(value.clone()),
            RawEntry::Utf16(units) => Constant::Utf16(units.clone()),
            RawEntry::Integer(value) => Constant::Integer(*value),
            RawEntry::Float(bits) => Constant::Float(*bits),
            RawEntry::Long(value) => Constant::Long(*value),
            RawEntry::Double(bits) => Constant::Double(*bits),
            RawEntry::Class(name) => Constant::Class(self.utf8(*name)?),
            RawEntry::String(value) => match self.entry(*value)? {
                RawEntry::Utf16(units) => Constant::WideString(units.clone()),
                _ => Constant::String(self.utf8(*value)?),
            },
            RawEntry::FieldRef(class, nat) => Constant::FieldRef(self.member_ref(*class, *nat)?),
            RawEntry::MethodRef(class, nat) => Constant::MethodRef(self.member_ref(*class, *nat)?),
            RawEntry::InterfaceMethodRef(class, nat) => {
                Constant::InterfaceMethodRef(self.member_ref(*class, *nat)?)
            }
            RawEntry::NameAndType(name, descriptor) => Constant::NameAndType {
                name: self.utf8(*name)?,
                descriptor: self.utf8(*descriptor)?,
            },
            RawEntry::MethodHandle(kind, reference) => {
                let Some(kind) = ReferenceKind::from_repr(*kind) else {
                    return Err(malformed_error!("Invalid method handle kind {}", kind));
                };
                let reference = self.resolve(*reference, depth + 1)?;
                if reference.member_ref().is_none() {
                    return Err(malformed_error!(
                        "Method handle {} does not point at a member reference",
                        index
                    ));
                }
                Constant::MethodHandle {
                    kind,
                    reference: Box::new(reference),
                }
            }
            RawEntry::MethodType(descriptor) => Constant::MethodType(self.utf8(*descriptor)?),
            RawEntry::Dynamic(bootstrap, nat) => {
                let (name, descriptor) = self.name_and_type(*nat)?;
                Constant::Dynamic {
                    bootstrap: Box::new(self.bootstrap_method(*bootstrap, depth)?),
                    name,
                    descriptor,
                }
            }
            RawEntry::InvokeDynamic(bootstrap, nat) => {
                let (name, descriptor) = self.name_and_type(*nat)?;
                Constant::InvokeDynamic {
                    bootstrap: Box::new(self.bootstrap_method(*bootstrap, depth)?),
                    name,
                    descriptor,
                }
            }
            RawEntry::Module(name) => Constant::Module(self.utf8(*name)?),
            RawEntry::Package(name) => Constant::Package(self.utf8(*name)?),
        };

        self.resolved[index as usize] = Some(constant.clone());
        Ok(constant)
    }
}

impl ConstantPool {
    fn utf8(&self, index: u16) -> Result<String> {
        match self.get(index)? {
            Constant::Utf8(value) => Ok(value.clone()),
            Constant::Utf16(_) => Err(malformed_error!(
                "Constant {} holds unpaired surrogates and cannot be used as a name",
                index
            )),
            _ => Err(malformed_error!("Constant {} is not a Utf8 constant", index)),
        }
    }

    fn optional_utf8(&self, index: u16) -> Result<Option<String>> {
        if index == 0 {
            return Ok(None);
        }
        self.utf8(index).map(Some)
    }

    fn class_name(&self, index: u16) -> Result<String> {
        match self.get(index)? {
            Constant::Class(name) => Ok(name.clone()),
            _ => Err(malformed_error!("Constant {} is not a Class", index)),
        }
    }

    fn optional_class(&self, index: u16) -> Result<Option<String>> {
        if index == 0 {
            return Ok(None);
        }
        self.class_name(index).map(Some)
    }

    fn class_list(&self, parser: &mut Parser<'_>) -> Result<Vec<String>> {
        let count = parser.read_be::<u16>()?;
        let mut classes = Vec::with_capacity(count as usize);
        for _ in 0..count {
            classes.push(self.class_name(parser.read_be::<u16>()?)?);
        }
        Ok(classes)
    }
}

fn parse_attribute(
    pool: &ConstantPool,
    raw: &RawAttribute<'_>,
    in_method: bool,
) -> Result<Attribute> {
    let mut parser = Parser::new(raw.data);

    let attribute = match raw.name.as_str() {
        attributes::CODE if in_method => Attribute::Code(parse_code(pool, raw.data)?),
        attributes::CONSTANT_VALUE => Attribute::ConstantValue(pool.get(parser.read_be::<u16>()?)?.clone()),
        attributes::EXCEPTIONS => Attribute::Exceptions(pool.class_list(&mut parser)?),
        attributes::SIGNATURE => Attribute::Signature(pool.utf8(parser.read_be::<u16>()?)?),
        attributes::SOURCE_FILE => Attribute::SourceFile(pool.utf8(parser.read_be::<u16>()?)?),
        attributes::SOURCE_DEBUG_EXTENSION => Attribute::SourceDebugExtension(raw.data.to_vec()),
        attributes::INNER_CLASSES => {
            let count = parser.read_be::<u16>()?;
            let mut entries = Vec::with_capacity(count as usize);
            for _ in 0..count {
                entries.push(InnerClass {
                    inner: pool.class_name(parser.read_be::<u16>()?)?,
                    outer: pool.optional_class(parser.read_be::<u16>()?)?,
                    simple_name: pool.optional_utf8(parser.read_be::<u16>()?)?,
                    flags: NestedClassFlags::from_bits_retain(parser.read_be::<u16>()?),
                });
            }
            Attribute::InnerClasses(entries)
        }
        attributes::ENCLOSING_METHOD => {
            let class = pool.class_name(parser.read_be::<u16>()?)?;
            let method_index = parser.read_be::<u16>()?;
            let method = if method_index == 0 {
                None
            } else {
                match pool.get(method_index)? {
                    Constant::NameAndType { name, descriptor } => Some((name.clone(), descriptor.clone())),
                    _ => return Err(malformed_error!("EnclosingMethod does not name a method")),
                }
            };
            Attribute::EnclosingMethod { class, method }
        }
        attributes::RUNTIME_VISIBLE_ANNOTATIONS => Attribute::Annotations {
            retention: Retention::Visible,
            annotations: parse_annotations(pool, &mut parser)?,
        },
        attributes::RUNTIME_INVISIBLE_ANNOTATIONS => Attribute::Annotations {
            retention: Retention::Invisible,
            annotations: parse_annotations(pool, &mut parser)?,
        },
        attributes::RUNTIME_VISIBLE_PARAMETER_ANNOTATIONS => Attribute::ParameterAnnotations {
            retention: Retention::Visible,
            parameters: parse_parameter_annotations(pool, &mut parser)?,
        },
        attributes::RUNTIME_INVISIBLE_PARAMETER_ANNOTATIONS => Attribute::ParameterAnnotations {
            retention: Retention::Invisible,
            parameters: parse_parameter_annotations(pool, &mut parser)?,
        },
        attributes::ANNOTATION_DEFAULT => Attribute::AnnotationDefault(parse_element_value(pool, &mut parser)?),
        attributes::DEPRECATED => Attribute::Deprecated,
        attributes::SYNTHETIC => Attribute::Synthetic,
        attributes::NEST_HOST => Attribute::NestHost(pool.class_name(parser.read_be::<u16>()?)?),
        attributes::NEST_MEMBERS => Attribute::NestMembers(pool.class_list(&mut parser)?),
        attributes::PERMITTED_SUBCLASSES => Attribute::PermittedSubclasses(pool.class_list(&mut parser)?),
        attributes::METHOD_PARAMETERS => {
            let count = parser.read_be::<u8>()?;
            let mut parameters = Vec::with_capacity(count as usize);
            for _ in 0..count {
                parameters.push(MethodParameter {
                    name: pool.optional_utf8(parser.read_be::<u16>()?)?,
                    flags: parser.read_be::<u16>()?,
                });
            }
            Attribute::MethodParameters(parameters)
        }
        _ => Attribute::Unknown(UnknownAttribute {
            name: raw.name.clone(),
            data: raw.data.to_vec(),
        }),
    };

    Ok(attribute)
}

fn parse_code(pool: &ConstantPool, data: &[u8]) -> Result<Body> {
    let mut parser = Parser::new(data);
    let max_stack = parser.read_be::<u16>()?;
    let max_locals = parser.read_be::<u16>()?;
    let code = parser.read_u32_prefixed()?;

    let mut references = Vec::new();
    for operand in decode_pool_operands(code)? {
        references.push(CodeReference {
            offset: operand.offset,
            width: operand.width,
            constant: pool.get(operand.index)?.clone(),
        });
    }

    let handler_count = parser.read_be::<u16>()?;
    let mut exception_table = Vec::with_capacity(handler_count as usize);
    for _ in 0..handler_count {
        exception_table.push(ExceptionHandler {
            start_pc: parser.read_be::<u16>()?,
            end_pc: parser.read_be::<u16>()?,
            handler_pc: parser.read_be::<u16>()?,
            catch_type: pool.optional_class(parser.read_be::<u16>()?)?,
        });
    }

    let mut body = Body {
        max_stack,
        max_locals,
        code: code.to_vec(),
        references,
        exception_table,
        ..Body::default()
    };

    let attribute_count = parser.read_be::<u16>()?;
    for _ in 0..attribute_count {
        let name = pool.utf8(parser.read_be::<u16>()?)?;
        let data = parser.read_u32_prefixed()?;
        let mut nested = Parser::new(data);
        match name.as_str() {
            attributes::STACK_MAP_TABLE => {
                body.stack_map = Some(parse_stack_map(pool, &mut nested)?);
            }
            attributes::LINE_NUMBER_TABLE => {
                let count = nested.read_be::<u16>()?;
                for _ in 0..count {
                    body.line_numbers.push(LineNumber {
                        start_pc: nested.read_be::<u16>()?,
                        line: nested.read_be::<u16>()?,
                    });
                }
            }
            attributes::LOCAL_VARIABLE_TABLE => {
                body.local_variables = parse_local_variables(pool, &mut nested)?;
            }
            attributes::LOCAL_VARIABLE_TYPE_TABLE => {
                body.local_variable_types = parse_local_variables(pool, &mut nested)?;
            }
            _ => body.unknown.push(UnknownAttribute {
                name,
                data: data.to_vec(),
            }),
        }
    }

    Ok(body)
}

fn parse_local_variables(pool: &ConstantPool, parser: &mut Parser<'_>) -> Result<Vec<LocalVariable>> {
    let count = parser.read_be::<u16>()?;
    let mut variables = Vec::with_capacity(count as usize);
    for _ in 0..count {
        variables.push(LocalVariable {
            start_pc: parser.read_be::<u16>()?,
            length: parser.read_be::<u16>()?,
            name: pool.utf8(parser.read_be::<u16>()?)?,
            descriptor: pool.utf8(parser.read_be::<u16>()?)?,
            index: parser.read_be::<u16>()?,
        });
    }
    Ok(variables)
}

fn parse_stack_map(pool: &ConstantPool, parser: &mut Parser<'_>) -> Result<Vec<StackMapFrame>> {
    let count = parser.read_be::<u16>()?;
    let mut frames = Vec::with_capacity(count as usize);

    for _ in 0..count {
        let frame_type = parser.read_be::<u8>()?;
        let mut frame = StackMapFrame {
            frame_type,
            offset_delta: 0,
            locals: Vec::new(),
            stack: Vec::new(),
        };

        match frame_type {
            0..=63 => frame.offset_delta = u16::from(frame_type),
            64..=127 => {
                frame.offset_delta = u16::from(frame_type - 64);
                frame.stack.push(parse_verification_type(pool, parser)?);
            }
            128..=246 => {
                return Err(malformed_error!("Reserved stack map frame type {}", frame_type))
            }
            247 => {
                frame.offset_delta = parser.read_be::<u16>()?;
                frame.stack.push(parse_verification_type(pool, parser)?);
            }
            248..=251 => frame.offset_delta = parser.read_be::<u16>()?,
            252..=254 => {
                frame.offset_delta = parser.read_be::<u16>()?;
                for _ in 0..(frame_type - 251) {
                    frame.locals.push(parse_verification_type(pool, parser)?);
                }
            }
            255 => {
                frame.offset_delta = parser.read_be::<u16>()?;
                let locals = parser.read_be::<u16>()?;
                for _ in 0..locals {
                    frame.locals.push(parse_verification_type(pool, parser)?);
                }
                let stack = parser.read_be::<u16>()?;
                for _ in 0..stack {
                    frame.stack.push(parse_verification_type(pool, parser)?);
                }
            }
        }

        frames.push(frame);
    }

    Ok(frames)
}

fn parse_verification_type(pool: &ConstantPool, parser: &mut Parser<'_>) -> Result<VerificationType> {
    let tag = parser.read_be::<u8>()?;
    Ok(match tag {
        0 => VerificationType::Top,
        1 => VerificationType::Integer,
        2 => VerificationType::Float,
        3 => VerificationType::Double,
        4 => VerificationType::Long,
        5 => VerificationType::Null,
        6 => VerificationType::UninitializedThis,
        7 => VerificationType::Object(pool.class_name(parser.read_be::<u16>()?)?),
        8 => VerificationType::Uninitialized(parser.read_be::<u16>()?),
        _ => return Err(malformed_error!("Invalid verification type tag {}", tag)),
    })
}

fn parse_annotations(pool: &ConstantPool, parser: &mut Parser<'_>) -> Result<Vec<Annotation>> {
    let count = parser.read_be::<u16>()?;
    let mut annotations = Vec::with_capacity(count as usize);
    for _ in 0..count {
        annotations.push(parse_annotation(pool, parser)?);
    }
    Ok(annotations)
}

fn parse_parameter_annotations(
    pool: &ConstantPool,
    parser: &mut Parser<'_>,
) -> Result<Vec<Vec<Annotation>>> {
    let count = parser.read_be::<u8>()?;
    let mut parameters = Vec::with_capacity(count as usize);
    for _ in 0..count {
        parameters.push(parse_annotations(pool, parser)?);
    }
    Ok(parameters)
}

fn parse_annotation(pool: &ConstantPool, parser: &mut Parser<'_>) -> Result<Annotation> {
    let type_descriptor = pool.utf8(parser.read_be::<u16>()?)?;
    let count = parser.read_be::<u16>()?;
    let mut elements = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name = pool.utf8(parser.read_be::<u16>()?)?;
        elements.push((name, parse_element_value(pool, parser)?));
    }
    Ok(Annotation {
        type_descriptor,
        elements,
    })
}

fn parse_element_value(pool: &ConstantPool, parser: &mut Parser<'_>) -> Result<ElementValue> {
    let tag = parser.read_be::<u8>()?;
    Ok(match tag {
        b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b's' => ElementValue::Const {
            tag,
            value: pool.get(parser.read_be::<u16>()?)?.clone(),
        },
        b'e' => ElementValue::Enum {
            type_descriptor: pool.utf8(parser.read_be::<u16>()?)?,
            const_name: pool.utf8(parser.read_be::<u16>()?)?,
        },
        b'c' => ElementValue::Class(pool.utf8(parser.read_be::<u16>()?)?),
        b'@' => ElementValue::Annotation(parse_annotation(pool, parser)?),
        b'[' => {
            let count = parser.read_be::<u16>()?;
            let mut values = Vec::with_capacity(count as usize);
            for _ in 0..count {
                values.push(parse_element_value(pool, parser)?);
            }
            ElementValue::Array(values)
        }
        _ => return Err(malformed_error!("Invalid element value tag {}", tag)),
    })
}
