//! Global mark phase.
//!
//! Marking decides, for the whole module at once, which units and members survive and which
//! members keep their bodies. It works like the mark half of a mark-and-sweep collector:
//!
//! 1. Every unit the policy keeps is a root, and within it every member the policy keeps.
//! 2. Kept units pull in their in-module supertypes, their declaring classes and every
//!    in-module class their kept members mention in descriptors, signatures, exceptions or
//!    annotations.
//! 3. Every body kept for inlining is scanned. Each class, field, method, method handle and
//!    bootstrap argument it references is resolved against the module, and what it resolves to
//!    is retained as well, transitively.
//!
//! Rewriting must not start before marking has finished, since a body in one unit can force
//! retention of a private member of another.

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use crate::{
    abi::policy::{classify_class, classify_member, Decision},
    classfile::{
        attributes::{Attribute, ElementValue},
        constant::{Constant, MemberRef},
        descriptor::{element_class, referenced_classes},
        DeclarationUnit, Member, MemberKey, MemberKind, OBJECT,
    },
    module::Module,
    Error, Result,
};

/// Methods every class inherits from `java/lang/Object`.
const OBJECT_METHODS: &[(&str, &str)] = &[
    ("<init>", "()V"),
    ("clone", "()Ljava/lang/Object;"),
    ("equals", "(Ljava/lang/Object;)Z"),
    ("finalize", "()V"),
    ("getClass", "()Ljava/lang/Class;"),
    ("hashCode", "()I"),
    ("notify", "()V"),
    ("notifyAll", "()V"),
    ("toString", "()Ljava/lang/String;"),
    ("wait", "()V"),
    ("wait", "(J)V"),
    ("wait", "(JI)V"),
];

/// Result of looking up a member reference in the module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Declared by an in-module unit
    Found {
        /// The declaring unit
        owner: String,
        /// The member within it
        key: MemberKey,
    },
    /// Resolved by something outside the module
    External,
    /// Cannot be resolved anywhere
    Missing,
}

/// Resolve a field or method reference the way the JVM would, restricted to the module.
///
/// The owner is searched first, then its super class chain, then its interfaces. References
/// whose owner is not part of the module are external. A member missing from an in-module
/// hierarchy is still external if some ancestor lives outside the module (other than
/// `java/lang/Object`), or if it is one of `java/lang/Object`'s own methods.
#[must_use]
pub fn resolve_member(module: &Module, reference: &MemberRef, kind: MemberKind) -> Resolution {
    let Some(owner) = element_class(&reference.owner) else {
        return Resolution::External;
    };
    if reference.owner.starts_with('[') || !module.contains(&owner) {
        return Resolution::External;
    }

    let mut queue = VecDeque::from([owner]);
    let mut visited = BTreeSet::new();
    let mut external_ancestor = false;

    while let Some(class) = queue.pop_front() {
        if !visited.insert(class.clone()) {
            continue;
        }
        let Some(unit) = module.get(&class) else {
            if class != OBJECT {
                external_ancestor = true;
            }
            continue;
        };
        if unit
            .member(kind, &reference.name, &reference.descriptor)
            .is_some()
        {
            return Resolution::Found {
                owner: class,
                key: MemberKey::new(kind, reference.name.clone(), reference.descriptor.clone()),
            };
        }
        queue.extend(unit.supertypes().map(str::to_string));
    }

    let object_method = kind == MemberKind::Method
        && OBJECT_METHODS
            .iter()
            .any(|(name, descriptor)| reference.name == *name && reference.descriptor == *descriptor);
    if external_ancestor || object_method {
        Resolution::External
    } else {
        Resolution::Missing
    }
}

/// The outcome of the mark phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Marking {
    classes: BTreeSet<String>,
    members: BTreeMap<String, BTreeMap<MemberKey, Decision>>,
}

impl Marking {
    /// Mark the whole module.
    ///
    /// Inline flags must already be set on the module's methods.
    ///
    /// # Errors
    /// Returns [`crate::Error::UnresolvableInlineReference`] if a kept body references a
    /// member that exists neither in the module nor outside it, and
    /// [`crate::Error::MalformedContainer`] if a kept member has an invalid descriptor or
    /// signature.
    pub fn compute(module: &Module) -> Result<Marking> {
        let mut marker = Marker {
            module,
            marking: Marking::default(),
            classes: VecDeque::new(),
            bodies: VecDeque::new(),
        };

        for unit in module.units() {
            let decision = classify_class(unit);
            log::debug!("{}: {:?}", unit.name, decision);
            if decision != Decision::Drop {
                marker.retain_class(&unit.name);
            }
        }
        marker.run()?;

        log::debug!(
            "Marked {} of {} units",
            marker.marking.classes.len(),
            module.len()
        );
        Ok(marker.marking)
    }

    /// Returns `true` if the unit survives.
    #[must_use]
    pub fn is_class_kept(&self, name: &str) -> bool {
        self.classes.contains(name)
    }

    /// Names of all surviving units, ordered.
    pub fn kept_classes(&self) -> impl Iterator<Item = &str> {
        self.classes.iter().map(String::as_str)
    }

    /// Number of surviving units.
    #[must_use]
    pub fn kept_class_count(&self) -> usize {
        self.classes.len()
    }

    /// Final decision for a member.
    #[must_use]
    pub fn decision(&self, class: &str, key: &MemberKey) -> Decision {
        self.members
            .get(class)
            .and_then(|members| members.get(key))
            .copied()
            .unwrap_or(Decision::Drop)
    }

    /// Final decision for a member of a unit.
    #[must_use]
    pub fn member_decision(&self, unit: &DeclarationUnit, member: &Member) -> Decision {
        self.decision(&unit.name, &member.key())
    }

    #[cfg(test)]
    pub(crate) fn keep(&mut self, class: &str, key: Option<(MemberKey, Decision)>) {
        self.classes.insert(class.to_string());
        if let Some((key, decision)) = key {
            self.members
                .entry(class.to_string())
                .or_default()
                .insert(key, decision);
        }
    }
}

struct Marker<'m> {
    module: &'m Module,
    marking: Marking,
    classes: VecDeque<String>,
    bodies: VecDeque<(String, MemberKey)>,
}

impl Marker<'_> {
    fn run(&mut self) -> Result<()> {
        loop {
            if let Some(class) = self.classes.pop_front() {
                self.expand_class(&class)?;
            } else if let Some((class, key)) = self.bodies.pop_front() {
                self.scan_body(&class, &key)?;
            } else {
                return Ok(());
            }
        }
    }

    /// Mark an in-module class as surviving. Classes outside the module are ignored.
    fn retain_class(&mut self, name: &str) {
        if self.module.contains(name) && self.marking.classes.insert(name.to_string()) {
            self.classes.push_back(name.to_string());
        }
    }

    fn retain_mentioned(&mut self, text: &str, unit: &str) -> Result<()> {
        let classes = referenced_classes(text).map_err(|e| e.in_container(&format!("{unit}.class")))?;
        for class in classes {
            self.retain_class(&class);
        }
        Ok(())
    }

    /// Raise a member's decision; a member newly kept with its body is queued for scanning.
    fn retain_member(&mut self, class: &str, key: MemberKey, decision: Decision) -> Result<()> {
        let members = self.marking.members.entry(class.to_string()).or_default();
        let previous = members.get(&key).copied().unwrap_or(Decision::Drop);
        if decision <= previous {
            return Ok(());
        }
        members.insert(key.clone(), decision);

        if previous == Decision::Drop {
            self.retain_member_mentions(class, &key)?;
        }
        if decision == Decision::KeepBodyToo {
            self.bodies.push_back((class.to_string(), key));
        }
        Ok(())
    }

    fn retain_member_mentions(&mut self, class: &str, key: &MemberKey) -> Result<()> {
        let module = self.module;
        let Some(member) = module
            .get(class)
            .and_then(|unit| unit.member(key.kind, &key.name, &key.descriptor))
        else {
            return Ok(());
        };

        self.retain_mentioned(&member.descriptor, class)?;
        for attribute in &member.attributes {
            self.retain_attribute_mentions(attribute, class)?;
        }
        Ok(())
    }

    fn retain_attribute_mentions(&mut self, attribute: &Attribute, unit: &str) -> Result<()> {
        match attribute {
            Attribute::Signature(signature) => self.retain_mentioned(signature, unit)?,
            Attribute::Exceptions(classes) => {
                for class in classes {
                    self.retain_class(class);
                }
            }
            Attribute::Annotations { annotations, .. } => {
                for annotation in annotations {
                    self.retain_mentioned(&annotation.type_descriptor, unit)?;
                    for (_, value) in &annotation.elements {
                        self.retain_element_mentions(value, unit)?;
                    }
                }
            }
            Attribute::ParameterAnnotations { parameters, .. } => {
                for annotation in parameters.iter().flatten() {
                    self.retain_mentioned(&annotation.type_descriptor, unit)?;
                }
            }
            Attribute::AnnotationDefault(value) => self.retain_element_mentions(value, unit)?,
            _ => {}
        }
        Ok(())
    }

    fn retain_element_mentions(&mut self, value: &ElementValue, unit: &str) -> Result<()> {
        match value {
            ElementValue::Enum {
                type_descriptor, ..
            } => self.retain_mentioned(type_descriptor, unit),
            ElementValue::Class(descriptor) if descriptor != "V" => {
                self.retain_mentioned(descriptor, unit)
            }
            ElementValue::Annotation(annotation) => {
                self.retain_mentioned(&annotation.type_descriptor, unit)?;
                for (_, value) in &annotation.elements {
                    self.retain_element_mentions(value, unit)?;
                }
                Ok(())
            }
            ElementValue::Array(values) => {
                for value in values {
                    self.retain_element_mentions(value, unit)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Decide the members of a newly retained class and pull in what the class itself needs.
    fn expand_class(&mut self, name: &str) -> Result<()> {
        let module = self.module;
        let Some(unit) = module.get(name) else {
            return Ok(());
        };

        for supertype in unit.supertypes() {
            self.retain_class(supertype);
        }
        if let Some(outer) = unit.outer_class() {
            self.retain_class(outer);
        }
        if let Some(signature) = unit.signature() {
            self.retain_mentioned(signature, name)?;
        }
        for attribute in &unit.attributes {
            if matches!(attribute, Attribute::Annotations { .. }) {
                self.retain_attribute_mentions(attribute, name)?;
            }
        }

        // Callers regenerate local classes they inline, so every method body is needed. Synthetic
        // anonymous classes count as well.
        let promote = unit.is_local_or_anonymous();

        for member in &unit.members {
            let decision = if promote {
                match member.kind {
                    MemberKind::Field => Decision::Keep,
                    MemberKind::Method => Decision::KeepBodyToo,
                }
            } else {
                classify_member(member)
            };
            if decision != Decision::Drop {
                self.retain_member(name, member.key(), decision)?;
            }
        }
        Ok(())
    }

    fn scan_body(&mut self, class: &str, key: &MemberKey) -> Result<()> {
        let module = self.module;
        let Some(body) = module
            .get(class)
            .and_then(|unit| unit.member(key.kind, &key.name, &key.descriptor))
            .and_then(Member::body)
        else {
            return Ok(());
        };

        let from = format!("{class}.{key}");
        let mut pending = body.referenced_constants();
        let mut seen = HashSet::new();

        while let Some(constant) = pending.pop() {
            if !seen.insert(constant.clone()) {
                continue;
            }
            match &constant {
                Constant::Class(name) => {
                    if let Some(name) = element_class(name) {
                        self.retain_class(&name);
                    }
                }
                Constant::FieldRef(reference) => {
                    self.retain_reference(&from, reference, MemberKind::Field)?;
                }
                Constant::MethodRef(reference) | Constant::InterfaceMethodRef(reference) => {
                    self.retain_reference(&from, reference, MemberKind::Method)?;
                }
                Constant::MethodHandle { reference, .. } => pending.push(reference.as_ref().clone()),
                Constant::MethodType(descriptor) => self.retain_mentioned(descriptor, class)?,
                Constant::Dynamic {
                    bootstrap,
                    descriptor,
                    ..
                }
                | Constant::InvokeDynamic {
                    bootstrap,
                    descriptor,
                    ..
                } => {
                    self.retain_mentioned(descriptor, class)?;
                    pending.push(bootstrap.handle.clone());
                    pending.extend(bootstrap.arguments.iter().cloned());
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn retain_reference(&mut self, from: &str, reference: &MemberRef, kind: MemberKind) -> Result<()> {
        if let Some(owner) = element_class(&reference.owner) {
            self.retain_class(&owner);
        }
        self.retain_mentioned(&reference.descriptor, &reference.owner)?;

        match resolve_member(self.module, reference, kind) {
            Resolution::Found { owner, key } => {
                self.retain_class(&owner);
                let own_decision = self
                    .module
                    .get(&owner)
                    .and_then(|unit| unit.member(key.kind, &key.name, &key.descriptor))
                    .map_or(Decision::Drop, classify_member);

                // Members outside the contract are copied along with the body that uses them
                let decision = match (kind, own_decision) {
                    (_, Decision::KeepBodyToo) => Decision::KeepBodyToo,
                    (MemberKind::Field, _) => Decision::Keep,
                    (MemberKind::Method, Decision::Drop) => Decision::KeepBodyToo,
                    (MemberKind::Method, _) => Decision::Keep,
                };
                self.retain_member(&owner, key, decision)
            }
            Resolution::External => Ok(()),
            Resolution::Missing => Err(Error::UnresolvableInlineReference {
                from: from.to_string(),
                target: reference.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::{
        attributes::InnerClass,
        builder::{ClassBuilder, CodeBuilder},
        flags::{ClassAccessFlags, FieldAccessFlags, MethodAccessFlags, NestedClassFlags},
        opcodes,
    };

    fn inline(member: Member) -> Member {
        Member {
            inline: true,
            ..member
        }
    }

    fn key(kind: MemberKind, name: &str, descriptor: &str) -> MemberKey {
        MemberKey::new(kind, name, descriptor)
    }

    #[test]
    fn example_scenario() {
        let f = inline(
            Member::method(MethodAccessFlags::PUBLIC | MethodAccessFlags::FINAL, "f", "()I").with_body(
                CodeBuilder::new()
                    .aload(0)
                    .invokespecial("a/A", "helper", "()I")
                    .op(opcodes::IRETURN)
                    .build(),
            ),
        );
        let helper = Member::method(MethodAccessFlags::PRIVATE, "helper", "()I")
            .with_body(CodeBuilder::new().iconst(42).op(opcodes::IRETURN).build());
        let unused = Member::method(MethodAccessFlags::PRIVATE, "unused", "()I")
            .with_body(CodeBuilder::new().iconst(1).op(opcodes::IRETURN).build());
        let unit = ClassBuilder::new("a/A").method(f).method(helper).method(unused).build();

        let module = Module::from_units([unit]).unwrap();
        let marking = Marking::compute(&module).unwrap();

        assert!(marking.is_class_kept("a/A"));
        assert_eq!(marking.decision("a/A", &key(MemberKind::Method, "f", "()I")), Decision::KeepBodyToo);
        assert_eq!(
            marking.decision("a/A", &key(MemberKind::Method, "helper", "()I")),
            Decision::KeepBodyToo
        );
        assert_eq!(marking.decision("a/A", &key(MemberKind::Method, "unused", "()I")), Decision::Drop);
    }

    #[test]
    fn inline_retention_crosses_units() {
        let f = inline(
            Member::method(MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC, "f", "()I").with_body(
                CodeBuilder::new()
                    .getstatic("a/Impl", "secret", "I")
                    .op(opcodes::IRETURN)
                    .build(),
            ),
        );
        let api = ClassBuilder::new("a/Api").method(f).build();
        let implementation = ClassBuilder::new("a/Impl")
            .access(crate::classfile::flags::ClassAccessFlags::SUPER)
            .inner_class(InnerClass {
                inner: "a/Impl".to_string(),
                outer: Some("a/Api".to_string()),
                simple_name: Some("Impl".to_string()),
                flags: NestedClassFlags::PRIVATE | NestedClassFlags::STATIC,
            })
            .field(Member::field(FieldAccessFlags::PRIVATE | FieldAccessFlags::STATIC, "secret", "I"))
            .field(Member::field(FieldAccessFlags::PRIVATE | FieldAccessFlags::STATIC, "other", "I"))
            .build();

        let module = Module::from_units([api, implementation]).unwrap();
        let marking = Marking::compute(&module).unwrap();

        assert!(marking.is_class_kept("a/Impl"));
        assert_eq!(
            marking.decision("a/Impl", &key(MemberKind::Field, "secret", "I")),
            Decision::Keep
        );
        assert_eq!(marking.decision("a/Impl", &key(MemberKind::Field, "other", "I")), Decision::Drop);
    }

    #[test]
    fn anonymous_classes_reached_from_inline_bodies_keep_all_bodies() {
        let f = inline(
            Member::method(MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC, "f", "()Ljava/lang/Runnable;")
                .with_body(
                    CodeBuilder::new()
                        .new_object("a/A$f$1")
                        .op(opcodes::DUP)
                        .invokespecial("a/A$f$1", "<init>", "()V")
                        .op(opcodes::ARETURN)
                        .build(),
                ),
        );
        let outer = ClassBuilder::new("a/A").method(f).build();
        let anonymous = ClassBuilder::new("a/A$f$1")
            .access(crate::classfile::flags::ClassAccessFlags::FINAL | crate::classfile::flags::ClassAccessFlags::SUPER)
            .interface("java/lang/Runnable")
            .enclosing_method("a/A", Some(("f", "()Ljava/lang/Runnable;")))
            .method(Member::method(MethodAccessFlags::empty(), "<init>", "()V").with_body(
                CodeBuilder::new()
                    .aload(0)
                    .invokespecial("java/lang/Object", "<init>", "()V")
                    .op(opcodes::RETURN)
                    .build(),
            ))
            .method(Member::method(MethodAccessFlags::PUBLIC | MethodAccessFlags::FINAL, "run", "()V").with_body(
                CodeBuilder::new().op(opcodes::RETURN).build(),
            ))
            .build();
        let unrelated = ClassBuilder::new("a/A$g$1")
            .enclosing_method("a/A", None)
            .build();

        let module = Module::from_units([outer, anonymous, unrelated]).unwrap();
        let marking = Marking::compute(&module).unwrap();

        assert!(marking.is_class_kept("a/A$f$1"));
        assert!(!marking.is_class_kept("a/A$g$1"));
        assert_eq!(
            marking.decision("a/A$f$1", &key(MemberKind::Method, "run", "()V")),
            Decision::KeepBodyToo
        );
    }

    #[test]
    fn synthetic_anonymous_classes_keep_all_bodies() {
        let f = inline(
            Member::method(MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC, "f", "()Ljava/lang/Runnable;")
                .with_body(
                    CodeBuilder::new()
                        .new_object("a/A$f$1")
                        .op(opcodes::DUP)
                        .invokespecial("a/A$f$1", "<init>", "()V")
                        .op(opcodes::ARETURN)
                        .build(),
                ),
        );
        let outer = ClassBuilder::new("a/A").method(f).build();
        let anonymous = ClassBuilder::new("a/A$f$1")
            .access(ClassAccessFlags::FINAL | ClassAccessFlags::SUPER | ClassAccessFlags::SYNTHETIC)
            .interface("java/lang/Runnable")
            .enclosing_method("a/A", Some(("f", "()Ljava/lang/Runnable;")))
            .field(Member::field(FieldAccessFlags::PRIVATE, "captured", "I"))
            .method(Member::method(MethodAccessFlags::empty(), "<init>", "()V").with_body(
                CodeBuilder::new()
                    .aload(0)
                    .invokespecial("java/lang/Object", "<init>", "()V")
                    .op(opcodes::RETURN)
                    .build(),
            ))
            .method(Member::method(MethodAccessFlags::PUBLIC | MethodAccessFlags::FINAL, "run", "()V").with_body(
                CodeBuilder::new().op(opcodes::RETURN).build(),
            ))
            .build();

        let module = Module::from_units([outer, anonymous]).unwrap();
        let marking = Marking::compute(&module).unwrap();

        assert!(marking.is_class_kept("a/A$f$1"));
        assert_eq!(
            marking.decision("a/A$f$1", &key(MemberKind::Method, "run", "()V")),
            Decision::KeepBodyToo
        );
        assert_eq!(
            marking.decision("a/A$f$1", &key(MemberKind::Method, "<init>", "()V")),
            Decision::KeepBodyToo
        );
        assert_eq!(
            marking.decision("a/A$f$1", &key(MemberKind::Field, "captured", "I")),
            Decision::Keep
        );
    }

    #[test]
    fn unresolvable_reference_fails() {
        let f = inline(
            Member::method(MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC, "f", "()V").with_body(
                CodeBuilder::new()
                    .invokestatic("a/A", "gone", "()V")
                    .op(opcodes::RETURN)
                    .build(),
            ),
        );
        let unit = ClassBuilder::new("a/A").method(f).build();
        let module = Module::from_units([unit]).unwrap();

        match Marking::compute(&module) {
            Err(Error::UnresolvableInlineReference { from, target }) => {
                assert_eq!(from, "a/A.f()V");
                assert_eq!(target, "a/A.gone()V");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn external_resolution() {
        let base = ClassBuilder::new("a/Base").super_class("java/util/AbstractList").build();
        let child = ClassBuilder::new("a/Child").super_class("a/Base").build();
        let plain = ClassBuilder::new("a/Plain").build();
        let module = Module::from_units([base, child, plain]).unwrap();

        let inherited = MemberRef::new("a/Child", "size", "()I");
        assert_eq!(resolve_member(&module, &inherited, MemberKind::Method), Resolution::External);

        let object = MemberRef::new("a/Plain", "hashCode", "()I");
        assert_eq!(resolve_member(&module, &object, MemberKind::Method), Resolution::External);

        let missing = MemberRef::new("a/Plain", "size", "()I");
        assert_eq!(resolve_member(&module, &missing, MemberKind::Method), Resolution::Missing);

        let outside = MemberRef::new("java/lang/String", "length", "()I");
        assert_eq!(resolve_member(&module, &outside, MemberKind::Method), Resolution::External);

        let array = MemberRef::new("[La/Plain;", "clone", "()Ljava/lang/Object;");
        assert_eq!(resolve_member(&module, &array, MemberKind::Method), Resolution::External);
    }

    #[test]
    fn members_resolve_through_supertypes() {
        let base = ClassBuilder::new("a/Base")
            .method(Member::method(MethodAccessFlags::PUBLIC, "g", "()V"))
            .build();
        let child = ClassBuilder::new("a/Child").super_class("a/Base").build();
        let module = Module::from_units([base, child]).unwrap();

        let reference = MemberRef::new("a/Child", "g", "()V");
        assert_eq!(
            resolve_member(&module, &reference, MemberKind::Method),
            Resolution::Found {
                owner: "a/Base".to_string(),
                key: key(MemberKind::Method, "g", "()V"),
            }
        );
    }

    #[test]
    fn supertypes_and_mentioned_classes_are_kept() {
        let hidden_base = ClassBuilder::new("a/Base")
            .access(crate::classfile::flags::ClassAccessFlags::SUPER)
            .inner_class(InnerClass {
                inner: "a/Base".to_string(),
                outer: Some("a/Outer".to_string()),
                simple_name: Some("Base".to_string()),
                flags: NestedClassFlags::PRIVATE,
            })
            .build();
        let returned = ClassBuilder::new("a/Result")
            .access(crate::classfile::flags::ClassAccessFlags::SUPER)
            .inner_class(InnerClass {
                inner: "a/Result".to_string(),
                outer: Some("a/Outer".to_string()),
                simple_name: Some("Result".to_string()),
                flags: NestedClassFlags::PRIVATE,
            })
            .build();
        let outer = ClassBuilder::new("a/Outer").build();
        let child = ClassBuilder::new("a/Child")
            .super_class("a/Base")
            .method(Member::method(MethodAccessFlags::PUBLIC, "get", "()La/Result;"))
            .build();
        let module = Module::from_units([hidden_base, returned, outer, child]).unwrap();
        let marking = Marking::compute(&module).unwrap();

        assert!(marking.is_class_kept("a/Base"));
        assert!(marking.is_class_kept("a/Result"));
        assert_eq!(marking.kept_class_count(), 4);
    }
}
