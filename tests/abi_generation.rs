//! End-to-end tests of ABI generation.
//!
//! Modules are assembled from class files built with [`ClassBuilder`], run through the whole
//! pipeline and checked on the produced artifact: what survives, what disappears, and which
//! input changes are allowed to change the output.

use abiscope::{classfile::opcodes, prelude::*};
use std::fs;
use widestring::U16String;

const INLINE_ONLY: &str = "Lkotlin/internal/InlineOnly;";

fn inline_only() -> Attribute {
    Attribute::Annotations {
        retention: Retention::Invisible,
        annotations: vec![Annotation::marker(INLINE_ONLY)],
    }
}

fn constructor() -> Member {
    Member::method(MethodAccessFlags::PUBLIC, "<init>", "()V").with_body(
        CodeBuilder::new()
            .line(1)
            .aload(0)
            .invokespecial("java/lang/Object", "<init>", "()V")
            .op(opcodes::RETURN)
            .build(),
    )
}

/// `class A { inline fun f() = helper(); private fun helper() = 42; private fun unused() = 1 }`
fn example_unit(helper_value: i32, unused_value: i32, first_line: u16) -> DeclarationUnit {
    let f = Member::method(MethodAccessFlags::PUBLIC | MethodAccessFlags::FINAL, "f", "()I")
        .with_attribute(inline_only())
        .with_body(
            CodeBuilder::new()
                .line(first_line)
                .aload(0)
                .invokespecial("a/A", "helper", "()I")
                .op(opcodes::IRETURN)
                .local_variable("this", "La/A;", 0)
                .build(),
        );
    let helper = Member::method(MethodAccessFlags::PRIVATE | MethodAccessFlags::FINAL, "helper", "()I")
        .with_body(
            CodeBuilder::new()
                .line(first_line + 2)
                .iconst(helper_value)
                .op(opcodes::IRETURN)
                .build(),
        );
    let unused = Member::method(MethodAccessFlags::PRIVATE | MethodAccessFlags::FINAL, "unused", "()I")
        .with_body(
            CodeBuilder::new()
                .line(first_line + 4)
                .iconst(unused_value)
                .op(opcodes::IRETURN)
                .build(),
        );

    ClassBuilder::new("a/A")
        .source_file("A.kt")
        .annotation(Annotation::marker("Lkotlin/Metadata;"))
        .method(constructor())
        .method(f)
        .method(helper)
        .method(unused)
        .build()
}

/// A class whose contract is `compute` and `LIMIT`, with private implementation details.
fn service_unit(compute_descriptor: &str, compute_value: i32, first_line: u16) -> DeclarationUnit {
    let returns_long = compute_descriptor.ends_with('J');
    let mut body = CodeBuilder::new()
        .line(first_line)
        .aload(0)
        .getfield("a/Service", "secretState", "I");
    body = body.iconst(compute_value).op(0x60); // iadd
    body = if returns_long {
        body.op(0x85).op(opcodes::LRETURN) // i2l
    } else {
        body.op(opcodes::IRETURN)
    };

    ClassBuilder::new("a/Service")
        .source_file("Service.kt")
        .field(Member::field(FieldAccessFlags::PRIVATE, "secretState", "I"))
        .field(
            Member::field(
                FieldAccessFlags::PUBLIC | FieldAccessFlags::STATIC | FieldAccessFlags::FINAL,
                "LIMIT",
                "I",
            )
            .with_constant_value(Constant::Integer(10)),
        )
        .method(constructor())
        .method(
            Member::method(MethodAccessFlags::PUBLIC, "compute", compute_descriptor)
                .with_body(body.build()),
        )
        .method(
            Member::method(MethodAccessFlags::PRIVATE, "secretHelper", "(Ljava/lang/String;)V")
                .with_body(CodeBuilder::new().line(first_line + 7).op(opcodes::RETURN).build()),
        )
        .build()
}

fn source_of(units: Vec<DeclarationUnit>) -> ModuleSource {
    let mut source = ModuleSource::new();
    for unit in units {
        let name = unit.file_name();
        let bytes = ClassBuilder::from_unit(unit).to_bytes().unwrap();
        source.add_container(name, bytes);
    }
    source
}

fn generate(units: Vec<DeclarationUnit>) -> Result<AbiArtifact> {
    AbiGenerator::default().generate(&source_of(units))
}

fn parse(artifact: &AbiArtifact, path: &str) -> DeclarationUnit {
    DeclarationUnit::parse(artifact.get(path).unwrap()).unwrap()
}

#[test]
fn idempotence() -> Result<()> {
    let first = generate(vec![example_unit(42, 1, 10), service_unit("()I", 1, 30)])?;
    let second = generate(vec![example_unit(42, 1, 10), service_unit("()I", 1, 30)])?;
    assert_eq!(first, second);
    assert_eq!(first.digest(), second.digest());

    // The projection of a projection is the projection itself
    let mut again = ModuleSource::new();
    for (path, data) in first.iter() {
        again.add_container(path, data.to_vec());
    }
    let third = AbiGenerator::default().generate(&again)?;
    assert_eq!(first, third);
    Ok(())
}

#[test]
fn stability_under_body_only_change() -> Result<()> {
    let before = generate(vec![example_unit(42, 1, 10), service_unit("()I", 1, 30)])?;
    let after = generate(vec![example_unit(42, 7, 110), service_unit("()I", 5, 230)])?;
    assert_eq!(before.digest(), after.digest());
    assert_eq!(before, after);
    Ok(())
}

#[test]
fn inline_body_change_is_visible() -> Result<()> {
    let before = generate(vec![example_unit(42, 1, 10)])?;
    let after = generate(vec![example_unit(43, 1, 10)])?;
    assert_ne!(before.digest(), after.digest());
    Ok(())
}

#[test]
fn instability_under_signature_change() -> Result<()> {
    let before = generate(vec![service_unit("()I", 1, 30)])?;
    let after = generate(vec![service_unit("()J", 1, 30)])?;
    assert_ne!(before.digest(), after.digest());
    Ok(())
}

#[test]
fn private_member_erasure() -> Result<()> {
    let artifact = generate(vec![service_unit("()I", 1, 30)])?;
    let unit = parse(&artifact, "a/Service.class");

    for trace in ["secretState", "secretHelper", "Ljava/lang/String;", "Service.kt", "SourceFile"] {
        assert!(!unit.constant_pool.mentions(trace), "{trace} leaked into the ABI");
    }
    assert!(unit.method("compute", "()I").unwrap().body().is_none());
    assert_eq!(
        unit.field("LIMIT", "I").unwrap().constant_value(),
        Some(&Constant::Integer(10))
    );
    assert!(unit.method("<init>", "()V").is_some());
    Ok(())
}

#[test]
fn inline_transitivity() -> Result<()> {
    let artifact = generate(vec![example_unit(42, 1, 10)])?;
    let unit = parse(&artifact, "a/A.class");

    let f = unit.method("f", "()I").unwrap();
    let f_body = f.body().unwrap();
    assert!(!f_body.has_debug_info());
    assert!(f.has_annotation(INLINE_ONLY));

    let helper = unit.method("helper", "()I").unwrap();
    assert_eq!(helper.body().unwrap().code, vec![opcodes::BIPUSH, 42, opcodes::IRETURN]);

    assert!(unit.method("unused", "()I").is_none());
    assert!(!unit.constant_pool.mentions("unused"));
    assert!(unit.annotations().any(|a| a.type_descriptor == "Lkotlin/Metadata;"));
    Ok(())
}

#[test]
fn inline_hints_and_default_companions() -> Result<()> {
    let g = Member::method(MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC, "g", "(I)I").with_body(
        CodeBuilder::new()
            .iload(0)
            .invokestatic("a/UtilsKt", "twice", "(I)I")
            .op(opcodes::IRETURN)
            .build(),
    );
    let g_default = Member::method(
        MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC | MethodAccessFlags::SYNTHETIC,
        "g$default",
        "(IILjava/lang/Object;)I",
    )
    .with_body(
        CodeBuilder::new()
            .iload(0)
            .invokestatic("a/UtilsKt", "g", "(I)I")
            .op(opcodes::IRETURN)
            .build(),
    );
    let twice = Member::method(MethodAccessFlags::PRIVATE | MethodAccessFlags::STATIC, "twice", "(I)I")
        .with_body(
            CodeBuilder::new()
                .iload(0)
                .iconst(2)
                .op(0x68) // imul
                .op(opcodes::IRETURN)
                .build(),
        );
    let utils = ClassBuilder::new("a/UtilsKt")
        .access(ClassAccessFlags::PUBLIC | ClassAccessFlags::FINAL | ClassAccessFlags::SUPER)
        .method(g)
        .method(g_default)
        .method(twice)
        .build();

    let plain = generate(vec![utils.clone()])?;
    let unit = parse(&plain, "a/UtilsKt.class");
    assert!(unit.method("g", "(I)I").unwrap().body().is_none());
    assert!(unit.method("g$default", "(IILjava/lang/Object;)I").is_none());
    assert!(unit.method("twice", "(I)I").is_none());

    let hinted = AbiGenerator::default()
        .with_inline_function("a/UtilsKt", "g", "(I)I")
        .generate(&source_of(vec![utils]))?;
    let unit = parse(&hinted, "a/UtilsKt.class");
    assert!(unit.method("g", "(I)I").unwrap().body().is_some());
    assert!(unit
        .method("g$default", "(IILjava/lang/Object;)I")
        .unwrap()
        .body()
        .is_some());
    assert!(unit.method("twice", "(I)I").unwrap().body().is_some());
    Ok(())
}

#[test]
fn reference_integrity() -> Result<()> {
    let hidden = ClassBuilder::new("a/Api$Impl")
        .access(ClassAccessFlags::FINAL | ClassAccessFlags::SUPER)
        .inner_class(InnerClass {
            inner: "a/Api$Impl".to_string(),
            outer: Some("a/Api".to_string()),
            simple_name: Some("Impl".to_string()),
            flags: NestedClassFlags::PRIVATE | NestedClassFlags::STATIC | NestedClassFlags::FINAL,
        })
        .field(Member::field(FieldAccessFlags::STATIC, "counter", "I"))
        .field(Member::field(FieldAccessFlags::PRIVATE, "ignored", "J"))
        .method(
            Member::method(MethodAccessFlags::PRIVATE | MethodAccessFlags::STATIC, "bump", "()I").with_body(
                CodeBuilder::new()
                    .getstatic("a/Api$Impl", "counter", "I")
                    .op(opcodes::IRETURN)
                    .build(),
            ),
        )
        .build();
    let unreachable = ClassBuilder::new("a/Api$Unused")
        .access(ClassAccessFlags::SUPER)
        .inner_class(InnerClass {
            inner: "a/Api$Unused".to_string(),
            outer: Some("a/Api".to_string()),
            simple_name: Some("Unused".to_string()),
            flags: NestedClassFlags::PRIVATE | NestedClassFlags::STATIC,
        })
        .build();
    let entry = Member::method(MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC, "entry", "()I")
        .with_attribute(inline_only())
        .with_body(
            CodeBuilder::new()
                .invokestatic("a/Api$Impl", "bump", "()I")
                .op(opcodes::IRETURN)
                .build(),
        );
    let api = ClassBuilder::new("a/Api")
        .method(entry)
        .inner_class(InnerClass {
            inner: "a/Api$Impl".to_string(),
            outer: Some("a/Api".to_string()),
            simple_name: Some("Impl".to_string()),
            flags: NestedClassFlags::PRIVATE | NestedClassFlags::STATIC | NestedClassFlags::FINAL,
        })
        .inner_class(InnerClass {
            inner: "a/Api$Unused".to_string(),
            outer: Some("a/Api".to_string()),
            simple_name: Some("Unused".to_string()),
            flags: NestedClassFlags::PRIVATE | NestedClassFlags::STATIC,
        })
        .build();

    let artifact = generate(vec![api, hidden, unreachable])?;
    assert_eq!(
        artifact.paths().collect::<Vec<_>>(),
        vec!["a/Api$Impl.class", "a/Api.class"]
    );

    let units: Vec<DeclarationUnit> = artifact
        .iter()
        .map(|(_, data)| DeclarationUnit::parse(data).unwrap())
        .collect();
    let find = |name: &str| units.iter().find(|unit| unit.name == name);

    for unit in &units {
        for (_, constant) in unit.constant_pool.iter() {
            match constant {
                Constant::Class(name) if name.starts_with("a/") => {
                    assert!(find(name).is_some(), "{} references missing {name}", unit.name);
                }
                Constant::FieldRef(reference) | Constant::MethodRef(reference)
                    if reference.owner.starts_with("a/") =>
                {
                    let kind = if matches!(constant, Constant::FieldRef(_)) {
                        MemberKind::Field
                    } else {
                        MemberKind::Method
                    };
                    let owner = find(&reference.owner).unwrap();
                    assert!(
                        owner.member(kind, &reference.name, &reference.descriptor).is_some(),
                        "{} references missing {reference}",
                        unit.name
                    );
                }
                _ => {}
            }
        }
    }

    let api = find("a/Api").unwrap();
    let nested: Vec<&str> = api.inner_classes().iter().map(|e| e.inner.as_str()).collect();
    assert_eq!(nested, vec!["a/Api$Impl"]);

    let implementation = find("a/Api$Impl").unwrap();
    assert!(implementation.method("bump", "()I").unwrap().body().is_some());
    assert!(implementation.field("counter", "I").is_some());
    assert!(implementation.field("ignored", "J").is_none());
    Ok(())
}

#[test]
fn unresolvable_inline_reference_fails_without_output() {
    let f = Member::method(MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC, "f", "()V")
        .with_attribute(inline_only())
        .with_body(
            CodeBuilder::new()
                .invokestatic("a/A", "vanished", "()V")
                .op(opcodes::RETURN)
                .build(),
        );
    let unit = ClassBuilder::new("a/A").method(f).build();

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("abi");
    match generate_abi(&source_of(vec![unit]), &output) {
        Err(Error::UnresolvableInlineReference { from, target }) => {
            assert_eq!(from, "a/A.f()V");
            assert_eq!(target, "a/A.vanished()V");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(!output.exists());
}

#[test]
fn malformed_container_is_named() {
    let source = source_of(vec![service_unit("()I", 1, 1)])
        .with_container("a/Broken.class", vec![0xCA, 0xFE, 0xBA, 0xBE, 0x00, 0x00]);

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("abi");
    match generate_abi(&source, &output) {
        Err(Error::MalformedContainer { container, .. }) => assert_eq!(container, "a/Broken.class"),
        other => panic!("unexpected {other:?}"),
    }
    assert!(!output.exists());

    let not_a_class = ModuleSource::new().with_container("notes.class", b"hello".to_vec());
    assert!(matches!(
        AbiGenerator::default().generate(&not_a_class),
        Err(Error::MalformedContainer { .. })
    ));
}

#[test]
fn publish_replaces_previous_artifact() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("abi");

    let first = generate_abi(&source_of(vec![example_unit(42, 1, 10), service_unit("()I", 1, 30)]), &output)?;
    assert_eq!(fs::read(output.join("a/A.class"))?, first.get("a/A.class").unwrap());
    assert!(output.join("a/Service.class").exists());

    let second = generate_abi(&source_of(vec![example_unit(42, 1, 10)]), &output)?;
    assert_eq!(second.len(), 1);
    assert!(output.join("a/A.class").exists());
    assert!(!output.join("a/Service.class").exists());
    Ok(())
}

#[test]
fn directory_input_with_resources() -> Result<()> {
    let input = tempfile::tempdir().unwrap();
    let write = |relative: &str, data: &[u8]| {
        let path = input.path().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, data).unwrap();
    };

    let class = ClassBuilder::from_unit(example_unit(42, 1, 10)).to_bytes()?;
    write("a/A.class", &class);
    write("META-INF/main.kotlin_module", &[0, 0, 0, 3, 0, 0, 0, 1]);
    write("README.txt", b"not part of the ABI");

    let source = ModuleSource::from_directory(input.path())?;
    assert_eq!(source.len(), 1);

    let output = tempfile::tempdir().unwrap();
    let artifact = generate_abi(&source, &output.path().join("abi"))?;
    assert_eq!(
        artifact.paths().collect::<Vec<_>>(),
        vec!["META-INF/main.kotlin_module", "a/A.class"]
    );
    assert_eq!(
        fs::read(output.path().join("abi/META-INF/main.kotlin_module"))?,
        vec![0, 0, 0, 3, 0, 0, 0, 1]
    );
    assert!(!output.path().join("abi/README.txt").exists());
    Ok(())
}

/// Overwrite the text of the `CONSTANT_Utf8` entry holding `text` with raw bytes of equal
/// length.
fn patch_utf8(class: &mut [u8], text: &str, replacement: &[u8]) {
    assert_eq!(text.len(), replacement.len());
    let mut entry = vec![1_u8];
    entry.extend_from_slice(&(text.len() as u16).to_be_bytes());
    entry.extend_from_slice(text.as_bytes());
    let at = class
        .windows(entry.len())
        .position(|window| window == entry.as_slice())
        .unwrap();
    class[at + 3..at + entry.len()].copy_from_slice(replacement);
}

#[test]
fn unpaired_surrogates_in_string_literals_survive() -> Result<()> {
    let name = Member::method(
        MethodAccessFlags::PUBLIC | MethodAccessFlags::FINAL,
        "name",
        "()Ljava/lang/String;",
    )
    .with_attribute(inline_only())
    .with_body(
        CodeBuilder::new()
            .ldc(Constant::String("zzz".to_string()))
            .op(opcodes::ARETURN)
            .build(),
    );
    let marker = Member::field(
        FieldAccessFlags::PUBLIC | FieldAccessFlags::STATIC | FieldAccessFlags::FINAL,
        "MARKER",
        "Ljava/lang/String;",
    )
    .with_constant_value(Constant::String("yyy".to_string()));

    // "\uD800" and "\uDC01" as javac writes them
    let mut class = ClassBuilder::new("a/A").field(marker).method(name).to_bytes()?;
    patch_utf8(&mut class, "zzz", &[0xED, 0xA0, 0x80]);
    patch_utf8(&mut class, "yyy", &[0xED, 0xB0, 0x81]);

    let source = ModuleSource::new().with_container("a/A.class", class);
    let artifact = AbiGenerator::default().generate(&source)?;
    let output = artifact.get("a/A.class").unwrap();
    assert!(output.windows(6).any(|w| w == [1, 0, 3, 0xED, 0xA0, 0x80]));
    assert!(output.windows(6).any(|w| w == [1, 0, 3, 0xED, 0xB0, 0x81]));

    let unit = DeclarationUnit::parse(output)?;
    let high = Constant::WideString(U16String::from_vec(vec![0xD800_u16]));
    assert!(unit.constant_pool.contains(&high));
    let body = unit.method("name", "()Ljava/lang/String;").unwrap().body().unwrap();
    assert_eq!(body.references[0].constant, high);
    assert_eq!(
        unit.field("MARKER", "Ljava/lang/String;").unwrap().constant_value(),
        Some(&Constant::WideString(U16String::from_vec(vec![0xDC01_u16])))
    );

    let again = AbiGenerator::default()
        .generate(&ModuleSource::new().with_container("a/A.class", output.to_vec()))?;
    assert_eq!(artifact, again);
    Ok(())
}

#[test]
fn unpaired_surrogates_in_names_are_rejected() -> Result<()> {
    let mut class = ClassBuilder::new("a/A")
        .field(Member::field(FieldAccessFlags::PUBLIC, "zzz", "I"))
        .to_bytes()?;
    patch_utf8(&mut class, "zzz", &[0xED, 0xA0, 0x80]);

    let source = ModuleSource::new().with_container("a/A.class", class);
    match AbiGenerator::default().generate(&source) {
        Err(Error::MalformedContainer { container, message }) => {
            assert_eq!(container, "a/A.class");
            assert!(message.contains("unpaired surrogates"), "{message}");
        }
        other => panic!("unexpected {other:?}"),
    }
    Ok(())
}

/// `a/A` with fields `x` and `MAX = 7` and methods `name()` and `run()`, written by hand with
/// members in reverse order, unused pool entries and duplicated `Utf8` and `Class` entries.
fn scrambled_class() -> Vec<u8> {
    fn utf8(out: &mut Vec<u8>, text: &str) {
        out.push(1);
        out.extend_from_slice(&(text.len() as u16).to_be_bytes());
        out.extend_from_slice(text.as_bytes());
    }
    fn u16s(out: &mut Vec<u8>, values: &[u16]) {
        for value in values {
            out.extend_from_slice(&value.to_be_bytes());
        }
    }

    let mut out = vec![0xCA, 0xFE, 0xBA, 0xBE, 0, 0, 0, 52];
    u16s(&mut out, &[23]);
    utf8(&mut out, "unused"); // 1
    out.extend_from_slice(&[8, 0, 3]); // 2: String #3
    utf8(&mut out, "abi"); // 3
    utf8(&mut out, "I"); // 4
    utf8(&mut out, "I"); // 5
    out.extend_from_slice(&[3, 0, 0, 0, 7]); // 6: Integer 7
    utf8(&mut out, "java/lang/Object"); // 7
    out.extend_from_slice(&[7, 0, 7]); // 8
    utf8(&mut out, "a/A"); // 9
    out.extend_from_slice(&[7, 0, 9]); // 10
    out.extend_from_slice(&[7, 0, 9]); // 11
    utf8(&mut out, "run"); // 12
    utf8(&mut out, "()V"); // 13
    utf8(&mut out, "Code"); // 14
    utf8(&mut out, "ConstantValue"); // 15
    utf8(&mut out, "MAX"); // 16
    utf8(&mut out, "x"); // 17
    utf8(&mut out, "name"); // 18
    utf8(&mut out, "()Ljava/lang/String;"); // 19
    out.push(5); // 20 and 21: Long 99
    out.extend_from_slice(&99_i64.to_be_bytes());
    utf8(&mut out, "Code"); // 22

    // access, this, super, interfaces
    u16s(&mut out, &[0x0021, 11, 8, 0]);

    // fields: MAX, x
    u16s(&mut out, &[2]);
    u16s(&mut out, &[0x0019, 16, 5, 1, 15]);
    out.extend_from_slice(&2_u32.to_be_bytes());
    u16s(&mut out, &[6]);
    u16s(&mut out, &[0x0001, 17, 4, 0]);

    // methods: run, name
    u16s(&mut out, &[2]);
    u16s(&mut out, &[0x0001, 12, 13, 1, 22]);
    out.extend_from_slice(&13_u32.to_be_bytes());
    u16s(&mut out, &[8, 8]);
    out.extend_from_slice(&1_u32.to_be_bytes());
    out.push(opcodes::RETURN);
    u16s(&mut out, &[0, 0]);
    u16s(&mut out, &[0x0001, 18, 19, 1, 14]);
    out.extend_from_slice(&15_u32.to_be_bytes());
    u16s(&mut out, &[8, 8]);
    out.extend_from_slice(&3_u32.to_be_bytes());
    out.extend_from_slice(&[0x12, 2, opcodes::ARETURN]); // ldc #2
    u16s(&mut out, &[0, 0]);

    // class attributes
    u16s(&mut out, &[0]);
    out
}

#[test]
fn output_ignores_member_order_and_pool_layout() -> Result<()> {
    let canonical = ClassBuilder::new("a/A")
        .field(Member::field(FieldAccessFlags::PUBLIC, "x", "I"))
        .field(
            Member::field(
                FieldAccessFlags::PUBLIC | FieldAccessFlags::STATIC | FieldAccessFlags::FINAL,
                "MAX",
                "I",
            )
            .with_constant_value(Constant::Integer(7)),
        )
        .method(
            Member::method(MethodAccessFlags::PUBLIC, "name", "()Ljava/lang/String;").with_body(
                CodeBuilder::new()
                    .ldc(Constant::String("abi".to_string()))
                    .op(opcodes::ARETURN)
                    .build(),
            ),
        )
        .method(
            Member::method(MethodAccessFlags::PUBLIC, "run", "()V")
                .with_body(CodeBuilder::new().op(opcodes::RETURN).build()),
        )
        .to_bytes()?;
    let scrambled = scrambled_class();
    assert_ne!(canonical, scrambled);

    let generator =
        AbiGenerator::default().with_inline_function("a/A", "name", "()Ljava/lang/String;");
    let from_canonical =
        generator.generate(&ModuleSource::new().with_container("a/A.class", canonical))?;
    let from_scrambled =
        generator.generate(&ModuleSource::new().with_container("a/A.class", scrambled))?;

    assert_eq!(from_canonical.get("a/A.class"), from_scrambled.get("a/A.class"));
    assert_eq!(from_canonical.digest(), from_scrambled.digest());

    let unit = parse(&from_scrambled, "a/A.class");
    assert!(!unit.constant_pool.mentions("unused"));
    assert!(!unit.constant_pool.contains(&Constant::Long(99)));
    let mut seen = std::collections::HashSet::new();
    for (_, constant) in unit.constant_pool.iter() {
        assert!(seen.insert(constant.clone()), "{constant} appears twice");
    }
    Ok(())
}
