//! Per-unit pruning and canonicalization.
//!
//! Once [`crate::abi::mark::Marking`] has decided the fate of every declaration, each surviving
//! unit is rewritten independently:
//!
//! - dropped members disappear, kept methods lose their bodies, inline bodies lose their debug
//!   tables
//! - attributes that only serve debuggers, reflection or the nest-based access checks of the
//!   runtime are removed, as are the annotations in
//!   [`DROPPED_ANNOTATIONS`](crate::abi::policy::DROPPED_ANNOTATIONS)
//! - nested class tables are reduced to the classes the unit still mentions
//! - members and attributes are put into canonical order
//!
//! The result is then checked by [`validate_references`] before it is handed to the serializer.

use std::collections::BTreeSet;

use crate::{
    abi::{
        mark::{resolve_member, Marking, Resolution},
        policy::{is_dropped_annotation, Decision},
        pool::collect_unit_constants,
    },
    classfile::{
        attributes::{Annotation, Attribute, InnerClass},
        constant::Constant,
        descriptor::{element_class, referenced_classes},
        ConstantPool, DeclarationUnit, Member, MemberKey, MemberKind,
    },
    module::Module,
    Error, Result,
};

/// Produce the ABI projection of one kept unit.
///
/// # Errors
/// Returns [`crate::Error::MalformedContainer`] if a surviving descriptor or signature cannot be
/// parsed.
pub fn prune_unit(unit: &DeclarationUnit, marking: &Marking, module: &Module) -> Result<DeclarationUnit> {
    let mut members: Vec<Member> = unit
        .members
        .iter()
        .filter_map(|member| prune_member(member, marking.member_decision(unit, member)))
        .collect();
    members.sort_by_key(Member::key);

    let mut attributes: Vec<Attribute> = unit
        .attributes
        .iter()
        .filter_map(|attribute| prune_class_attribute(attribute, marking, module))
        .collect();

    let mut pruned = DeclarationUnit {
        name: unit.name.clone(),
        minor_version: unit.minor_version,
        major_version: unit.major_version,
        access: unit.access,
        super_class: unit.super_class.clone(),
        interfaces: unit.interfaces.clone(),
        members,
        attributes: Vec::new(),
        constant_pool: ConstantPool::default(),
    };

    // Nested class entries depend on what the rest of the pruned unit mentions
    let inner = attributes.iter().position(|a| matches!(a, Attribute::InnerClasses(_)));
    let entries = match inner {
        Some(position) => match attributes.remove(position) {
            Attribute::InnerClasses(entries) => entries,
            _ => Vec::new(),
        },
        None => Vec::new(),
    };
    pruned.attributes = attributes;

    let mentioned = mentioned_classes(&pruned)
        .map_err(|e| e.in_container(&unit.file_name()))?;
    let entries = prune_inner_classes(&unit.name, entries, &mentioned, marking, module);
    if !entries.is_empty() {
        pruned.attributes.push(Attribute::InnerClasses(entries));
    }

    pruned.attributes.sort_by_key(Attribute::canonical_rank);
    Ok(pruned)
}

fn prune_member(member: &Member, decision: Decision) -> Option<Member> {
    let mut member = match decision {
        Decision::Drop => return None,
        Decision::Keep => {
            let mut member = member.clone();
            member.take_body();
            member
        }
        Decision::KeepBodyToo => member.clone(),
    };

    if let Some(body) = member.body_mut() {
        body.strip_debug_info();
    }
    member.attributes = std::mem::take(&mut member.attributes)
        .into_iter()
        .filter_map(prune_member_attribute)
        .collect();
    member.attributes.sort_by_key(Attribute::canonical_rank);
    Some(member)
}

fn prune_member_attribute(attribute: Attribute) -> Option<Attribute> {
    match attribute {
        Attribute::MethodParameters(_)
        | Attribute::SourceDebugExtension(_)
        | Attribute::Unknown(_) => None,
        Attribute::Annotations {
            retention,
            annotations,
        } => filter_annotations(annotations).map(|annotations| Attribute::Annotations {
            retention,
            annotations,
        }),
        other => Some(other),
    }
}

fn filter_annotations(annotations: Vec<Annotation>) -> Option<Vec<Annotation>> {
    let kept: Vec<_> = annotations
        .into_iter()
        .filter(|annotation| !is_dropped_annotation(&annotation.type_descriptor))
        .collect();
    (!kept.is_empty()).then_some(kept)
}

fn prune_class_attribute(attribute: &Attribute, marking: &Marking, module: &Module) -> Option<Attribute> {
    match attribute {
        Attribute::SourceFile(_)
        | Attribute::SourceDebugExtension(_)
        | Attribute::NestHost(_)
        | Attribute::NestMembers(_)
        | Attribute::MethodParameters(_)
        | Attribute::Unknown(_) => None,
        Attribute::Annotations {
            retention,
            annotations,
        } => filter_annotations(annotations.clone()).map(|annotations| Attribute::Annotations {
            retention: *retention,
            annotations,
        }),
        Attribute::PermittedSubclasses(classes) => {
            let kept: Vec<String> = classes
                .iter()
                .filter(|class| marking.is_class_kept(class) || !module.contains(class))
                .cloned()
                .collect();
            (!kept.is_empty()).then_some(Attribute::PermittedSubclasses(kept))
        }
        Attribute::EnclosingMethod { class, method } => {
            let method = method.as_ref().filter(|(name, descriptor)| {
                !module.contains(class)
                    || marking.decision(class, &MemberKey::new(MemberKind::Method, name, descriptor))
                        != Decision::Drop
            });
            Some(Attribute::EnclosingMethod {
                class: class.clone(),
                method: method.cloned(),
            })
        }
        other => Some(other.clone()),
    }
}

/// Every class name the unit refers to through its pool, descriptors or signatures.
fn mentioned_classes(unit: &DeclarationUnit) -> Result<BTreeSet<String>> {
    let mut constants = Vec::new();
    collect_unit_constants(unit, &mut constants);

    let mut mentioned = BTreeSet::new();
    let mut texts: Vec<&str> = Vec::new();

    while let Some(constant) = constants.pop() {
        match &constant {
            Constant::Class(name) => {
                mentioned.extend(element_class(name));
            }
            Constant::FieldRef(reference)
            | Constant::MethodRef(reference)
            | Constant::InterfaceMethodRef(reference) => {
                mentioned.extend(element_class(&reference.owner));
                mentioned.extend(referenced_classes(&reference.descriptor)?);
            }
            Constant::MethodType(descriptor)
            | Constant::NameAndType { descriptor, .. } => {
                mentioned.extend(referenced_classes(descriptor)?);
            }
            _ => {}
        }
        if let Some(bootstrap) = constant.bootstrap() {
            constants.push(bootstrap.handle.clone());
            constants.extend(bootstrap.arguments.iter().cloned());
        }
        constants.extend(constant.children());
    }

    for member in &unit.members {
        texts.push(&member.descriptor);
        texts.extend(member.signature());
    }
    texts.extend(unit.signature());
    for text in texts {
        mentioned.extend(referenced_classes(text)?);
    }

    Ok(mentioned)
}

/// Reduce nested class entries to those the pruned unit still needs.
///
/// An entry survives if it describes the unit itself, a kept member class of the unit, or a
/// class the unit mentions. Entries for the declaring classes of survivors are kept too. Entries
/// for in-module classes that were dropped never survive.
fn prune_inner_classes(
    unit: &str,
    entries: Vec<InnerClass>,
    mentioned: &BTreeSet<String>,
    marking: &Marking,
    module: &Module,
) -> Vec<InnerClass> {
    let available = |entry: &InnerClass| !module.contains(&entry.inner) || marking.is_class_kept(&entry.inner);

    let mut wanted: BTreeSet<&str> = entries
        .iter()
        .filter(|entry| available(entry))
        .filter(|entry| {
            entry.inner == unit
                || entry.outer.as_deref() == Some(unit)
                || mentioned.contains(&entry.inner)
        })
        .map(|entry| entry.inner.as_str())
        .collect();

    loop {
        let outers: Vec<&str> = entries
            .iter()
            .filter(|entry| wanted.contains(entry.inner.as_str()))
            .filter_map(|entry| entry.outer.as_deref())
            .filter(|outer| !wanted.contains(outer))
            .filter(|outer| {
                entries
                    .iter()
                    .any(|entry| entry.inner == *outer && available(entry))
            })
            .collect();
        if outers.is_empty() {
            break;
        }
        wanted.extend(outers);
    }

    let mut kept: Vec<InnerClass> = Vec::with_capacity(wanted.len());
    for entry in &entries {
        if wanted.contains(entry.inner.as_str()) && !kept.iter().any(|k| k.inner == entry.inner) {
            kept.push(entry.clone());
        }
    }
    kept.sort_by(|a, b| a.inner.cmp(&b.inner));
    kept
}

/// Check that no surviving reference of a pruned unit points at a dropped declaration.
///
/// # Errors
/// Returns [`crate::Error::DanglingReference`] naming the first offending reference. This is
/// never caused by input and indicates a marking bug.
pub fn validate_references(unit: &DeclarationUnit, marking: &Marking, module: &Module) -> Result<()> {
    let mut constants = Vec::new();
    collect_unit_constants(unit, &mut constants);

    let dangling = |target: String| Error::DanglingReference {
        unit: unit.name.clone(),
        target,
    };

    while let Some(constant) = constants.pop() {
        match &constant {
            Constant::Class(name) => {
                if let Some(class) = element_class(name) {
                    if module.contains(&class) && !marking.is_class_kept(&class) {
                        return Err(dangling(class));
                    }
                }
            }
            Constant::FieldRef(reference)
            | Constant::MethodRef(reference)
            | Constant::InterfaceMethodRef(reference) => {
                let kind = if constant.is_field_ref() {
                    MemberKind::Field
                } else {
                    MemberKind::Method
                };
                if let Resolution::Found { owner, key } = resolve_member(module, reference, kind) {
                    if !marking.is_class_kept(&owner) || marking.decision(&owner, &key) == Decision::Drop {
                        return Err(dangling(reference.to_string()));
                    }
                }
            }
            _ => {}
        }
        if let Some(bootstrap) = constant.bootstrap() {
            constants.push(bootstrap.handle.clone());
            constants.extend(bootstrap.arguments.iter().cloned());
        }
        constants.extend(constant.children());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::{
        attributes::Retention,
        builder::{ClassBuilder, CodeBuilder},
        flags::{ClassAccessFlags, FieldAccessFlags, MethodAccessFlags, NestedClassFlags},
        opcodes,
    };

    fn nested(inner: &str, outer: &str, simple: &str, flags: NestedClassFlags) -> InnerClass {
        InnerClass {
            inner: inner.to_string(),
            outer: Some(outer.to_string()),
            simple_name: Some(simple.to_string()),
            flags,
        }
    }

    fn prune(units: Vec<DeclarationUnit>, name: &str) -> DeclarationUnit {
        let module = Module::from_units(units).unwrap();
        let marking = Marking::compute(&module).unwrap();
        let pruned = prune_unit(module.get(name).unwrap(), &marking, &module).unwrap();
        validate_references(&pruned, &marking, &module).unwrap();
        pruned
    }

    #[test]
    fn bodies_and_private_members_go() {
        let unit = ClassBuilder::new("a/A")
            .source_file("A.kt")
            .method(
                Member::method(MethodAccessFlags::PUBLIC, "run", "()V")
                    .with_body(CodeBuilder::new().line(3).op(opcodes::RETURN).build()),
            )
            .method(Member::method(MethodAccessFlags::PRIVATE, "hidden", "()V"))
            .field(Member::field(FieldAccessFlags::PRIVATE, "state", "I"))
            .field(Member::field(FieldAccessFlags::PUBLIC, "count", "I"))
            .build();

        let pruned = prune(vec![unit], "a/A");
        assert_eq!(pruned.members.len(), 2);
        assert!(pruned.method("run", "()V").unwrap().body().is_none());
        assert!(pruned.field("count", "I").is_some());
        assert!(pruned.attributes.is_empty());
    }

    #[test]
    fn members_are_sorted() {
        let unit = ClassBuilder::new("a/A")
            .method(Member::method(MethodAccessFlags::PUBLIC, "b", "()V"))
            .method(Member::method(MethodAccessFlags::PUBLIC, "a", "(I)V"))
            .method(Member::method(MethodAccessFlags::PUBLIC, "a", "()V"))
            .field(Member::field(FieldAccessFlags::PUBLIC, "z", "I"))
            .build();

        let pruned = prune(vec![unit], "a/A");
        let keys: Vec<String> = pruned.members.iter().map(|m| m.key().to_string()).collect();
        assert_eq!(keys, vec!["z:I", "a()V", "a(I)V", "b()V"]);
    }

    #[test]
    fn inline_bodies_lose_debug_info() {
        let inline = Member {
            inline: true,
            ..Member::method(MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC, "f", "()I")
                .with_body(
                    CodeBuilder::new()
                        .line(10)
                        .iconst(3)
                        .op(opcodes::IRETURN)
                        .local_variable("x", "I", 0)
                        .build(),
                )
        };
        let unit = ClassBuilder::new("a/A").method(inline).build();

        let pruned = prune(vec![unit], "a/A");
        let body = pruned.method("f", "()I").unwrap().body().unwrap();
        assert!(!body.has_debug_info());
        assert_eq!(body.code, vec![opcodes::ICONST_0 + 3, opcodes::IRETURN]);
    }

    #[test]
    fn dropped_annotations_are_filtered() {
        let unit = ClassBuilder::new("a/A")
            .annotation(Annotation::marker("Lkotlin/Metadata;"))
            .attribute(Attribute::Annotations {
                retention: Retention::Invisible,
                annotations: vec![Annotation::marker("Lkotlin/jvm/internal/SourceDebugExtension;")],
            })
            .build();

        let pruned = prune(vec![unit], "a/A");
        assert_eq!(pruned.attributes.len(), 1);
        assert!(pruned.annotations().any(|a| a.type_descriptor == "Lkotlin/Metadata;"));
    }

    #[test]
    fn inner_classes_follow_retention() {
        let outer = ClassBuilder::new("a/Outer")
            .inner_class(nested("a/Outer$Public", "a/Outer", "Public", NestedClassFlags::PUBLIC))
            .inner_class(nested("a/Outer$Private", "a/Outer", "Private", NestedClassFlags::PRIVATE))
            .inner_class(nested(
                "java/util/Map$Entry",
                "java/util/Map",
                "Entry",
                NestedClassFlags::PUBLIC | NestedClassFlags::STATIC | NestedClassFlags::INTERFACE,
            ))
            .inner_class(nested(
                "java/lang/Thread$State",
                "java/lang/Thread",
                "State",
                NestedClassFlags::PUBLIC | NestedClassFlags::STATIC,
            ))
            .method(Member::method(
                MethodAccessFlags::PUBLIC,
                "entry",
                "()Ljava/util/Map$Entry;",
            ))
            .build();
        let public = ClassBuilder::new("a/Outer$Public")
            .inner_class(nested("a/Outer$Public", "a/Outer", "Public", NestedClassFlags::PUBLIC))
            .build();
        let private = ClassBuilder::new("a/Outer$Private")
            .access(ClassAccessFlags::SUPER)
            .inner_class(nested("a/Outer$Private", "a/Outer", "Private", NestedClassFlags::PRIVATE))
            .build();

        let pruned = prune(vec![outer, public, private], "a/Outer");
        let names: Vec<&str> = pruned.inner_classes().iter().map(|e| e.inner.as_str()).collect();
        assert_eq!(names, vec!["a/Outer$Public", "java/util/Map$Entry"]);
    }

    #[test]
    fn enclosing_method_of_dropped_method_is_cleared() {
        let outer = ClassBuilder::new("a/A")
            .method(Member::method(MethodAccessFlags::PRIVATE, "make", "()Ljava/lang/Object;"))
            .build();
        let local = ClassBuilder::new("a/A$make$1")
            .enclosing_method("a/A", Some(("make", "()Ljava/lang/Object;")))
            .build();
        let module = Module::from_units([outer, local]).unwrap();

        let mut marking = Marking::default();
        marking.keep("a/A", None);
        marking.keep("a/A$make$1", None);

        let pruned = prune_unit(module.get("a/A$make$1").unwrap(), &marking, &module).unwrap();
        assert_eq!(
            pruned.attributes,
            vec![Attribute::EnclosingMethod {
                class: "a/A".to_string(),
                method: None
            }]
        );
    }

    #[test]
    fn dangling_references_are_reported() {
        let unit = ClassBuilder::new("a/A")
            .method(
                Member::method(MethodAccessFlags::PUBLIC, "f", "()V").with_body(
                    CodeBuilder::new()
                        .aload(0)
                        .invokespecial("a/A", "helper", "()V")
                        .op(opcodes::RETURN)
                        .build(),
                ),
            )
            .method(Member::method(MethodAccessFlags::PRIVATE, "helper", "()V"))
            .build();
        let module = Module::from_units([unit]).unwrap();

        // A marking that keeps the body but forgets its dependency
        let mut marking = Marking::default();
        marking.keep(
            "a/A",
            Some((MemberKey::new(MemberKind::Method, "f", "()V"), Decision::KeepBodyToo)),
        );

        let pruned = prune_unit(module.get("a/A").unwrap(), &marking, &module).unwrap();
        match validate_references(&pruned, &marking, &module) {
            Err(Error::DanglingReference { unit, target }) => {
                assert_eq!(unit, "a/A");
                assert_eq!(target, "a/A.helper()V");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn permitted_subclasses_keep_survivors() {
        let sealed = ClassBuilder::new("a/Shape")
            .access(ClassAccessFlags::PUBLIC | ClassAccessFlags::ABSTRACT | ClassAccessFlags::SUPER)
            .attribute(Attribute::PermittedSubclasses(vec![
                "a/Circle".to_string(),
                "a/Shape$Hidden".to_string(),
            ]))
            .inner_class(nested("a/Shape$Hidden", "a/Shape", "Hidden", NestedClassFlags::PRIVATE))
            .build();
        let circle = ClassBuilder::new("a/Circle").super_class("a/Shape").build();
        let hidden = ClassBuilder::new("a/Shape$Hidden")
            .access(ClassAccessFlags::SUPER)
            .super_class("a/Shape")
            .inner_class(nested("a/Shape$Hidden", "a/Shape", "Hidden", NestedClassFlags::PRIVATE))
            .build();

        let pruned = prune(vec![sealed, circle, hidden], "a/Shape");
        assert_eq!(
            pruned.attributes,
            vec![Attribute::PermittedSubclasses(vec!["a/Circle".to_string()])]
        );
    }
}
