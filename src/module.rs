//! Module inputs and the parsed module index.
//!
//! A [`ModuleSource`] is the set of compiled containers of one module as handed over by the
//! front-end, plus resources that travel with them (`META-INF/*.kotlin_module`). Reading it
//! produces a [`Module`]: every container parsed into a [`DeclarationUnit`] and indexed by
//! internal name.
//!
//! Containers are parsed in parallel into a concurrent index, which is then frozen into an
//! ordered map so every later phase iterates units in the same order on every run.

use std::{
    collections::{BTreeMap, BTreeSet},
    path::Path,
};

use dashmap::DashMap;
use rayon::prelude::*;
use walkdir::WalkDir;

use crate::{
    abi::policy::{is_inline_marker, DEFAULT_SUFFIX},
    classfile::{constant::MemberRef, read_unit, DeclarationUnit, MemberKind},
    file::ContainerBytes,
    Error, Result,
};

/// File extension of compiled containers
const CLASS_EXTENSION: &str = "class";

/// Directory holding module-level resources
const META_INF: &str = "META-INF";

/// Extension of Kotlin module mapping files
const KOTLIN_MODULE_EXTENSION: &str = "kotlin_module";

/// The compiled containers and resources of one module.
#[derive(Debug, Default)]
pub struct ModuleSource {
    containers: BTreeMap<String, ContainerBytes>,
    resources: BTreeMap<String, Vec<u8>>,
}

impl ModuleSource {
    /// Create an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect a module from a class output directory.
    ///
    /// Every `*.class` file becomes a container; `module-info.class` and
    /// `META-INF/*.kotlin_module` files are carried along as resources. Everything else is
    /// ignored.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the directory cannot be walked or a file cannot
    /// be read.
    pub fn from_directory(root: &Path) -> Result<Self> {
        let mut source = ModuleSource::new();

        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(|e| Error::FileError(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let Ok(relative) = path.strip_prefix(root) else {
                continue;
            };
            let name = relative_name(relative);
            let extension = path.extension().and_then(|e| e.to_str());

            if name == "module-info.class" || name.ends_with("/module-info.class") {
                source.resources.insert(name, std::fs::read(path)?);
            } else if extension == Some(CLASS_EXTENSION) {
                let container = ContainerBytes::from_file(name.clone(), path)?;
                source.containers.insert(name, container);
            } else if extension == Some(KOTLIN_MODULE_EXTENSION)
                && relative.starts_with(META_INF)
            {
                source.resources.insert(name, std::fs::read(path)?);
            }
        }

        log::debug!(
            "Collected {} containers and {} resources from {}",
            source.containers.len(),
            source.resources.len(),
            root.display()
        );
        Ok(source)
    }

    /// Add an in-memory container addressed by `name`.
    #[must_use]
    pub fn with_container(mut self, name: impl Into<String>, data: Vec<u8>) -> Self {
        self.add_container(name, data);
        self
    }

    /// Add an in-memory container addressed by `name`.
    pub fn add_container(&mut self, name: impl Into<String>, data: Vec<u8>) {
        let name = name.into();
        self.containers
            .insert(name.clone(), ContainerBytes::from_mem(name, data));
    }

    /// Add a resource copied verbatim into the artifact.
    #[must_use]
    pub fn with_resource(mut self, name: impl Into<String>, data: Vec<u8>) -> Self {
        self.resources.insert(name.into(), data);
        self
    }

    /// Containers ordered by name.
    pub fn containers(&self) -> impl Iterator<Item = &ContainerBytes> {
        self.containers.values()
    }

    /// Resources ordered by name.
    pub fn resources(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.resources
            .iter()
            .map(|(name, data)| (name.as_str(), data.as_slice()))
    }

    /// Number of containers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.containers.len()
    }

    /// Returns `true` if there are no containers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }
}

fn relative_name(relative: &Path) -> String {
    relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Explicit inline declarations supplied by the front-end.
///
/// Bytecode does not record which methods are inline. The front-end knows, and passes the
/// owner, name and descriptor of each one here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InlineHints {
    methods: BTreeSet<MemberRef>,
}

impl InlineHints {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a method inline.
    pub fn insert(&mut self, method: MemberRef) {
        self.methods.insert(method);
    }

    /// Returns `true` if the method was declared inline.
    #[must_use]
    pub fn contains(&self, owner: &str, name: &str, descriptor: &str) -> bool {
        self.methods
            .contains(&MemberRef::new(owner, name, descriptor))
    }

    /// Number of hints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// Returns `true` if there are no hints.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

/// All declaration units of one module, indexed by internal name.
#[derive(Debug, Default)]
pub struct Module {
    units: BTreeMap<String, DeclarationUnit>,
}

impl Module {
    /// Parse every container of `source`.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedContainer`] naming a container that fails to parse, or
    /// that declares a class already declared by another container.
    pub fn read(source: &ModuleSource, parallel: bool) -> Result<Module> {
        let index: DashMap<String, DeclarationUnit> = DashMap::with_capacity(source.len());
        let containers: Vec<&ContainerBytes> = source.containers().collect();

        let parse = |container: &&ContainerBytes| -> Result<()> {
            let unit = read_unit(container.data()).map_err(|e| e.in_container(container.name()))?;
            let name = unit.name.clone();
            if index.insert(name.clone(), unit).is_some() {
                return Err(Error::MalformedContainer {
                    container: container.name().to_string(),
                    message: format!("class {name} is declared by more than one container"),
                });
            }
            Ok(())
        };

        let results: Vec<Result<()>> = if parallel {
            containers.par_iter().map(parse).collect()
        } else {
            containers.iter().map(parse).collect()
        };
        results.into_iter().collect::<Result<Vec<()>>>()?;

        let units: BTreeMap<String, DeclarationUnit> = index.into_iter().collect();
        log::debug!("Parsed {} declaration units", units.len());
        Ok(Module { units })
    }

    /// Build a module from already parsed units.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedContainer`] for duplicate class names.
    pub fn from_units(units: impl IntoIterator<Item = DeclarationUnit>) -> Result<Module> {
        let mut module = Module::default();
        for unit in units {
            let name = unit.name.clone();
            if module.units.insert(name.clone(), unit).is_some() {
                return Err(Error::MalformedContainer {
                    container: format!("{name}.class"),
                    message: format!("class {name} is declared more than once"),
                });
            }
        }
        Ok(module)
    }

    /// Look up a unit by internal name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&DeclarationUnit> {
        self.units.get(name)
    }

    /// Returns `true` if the module declares `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.units.contains_key(name)
    }

    /// All units ordered by name.
    pub fn units(&self) -> impl Iterator<Item = &DeclarationUnit> {
        self.units.values()
    }

    /// Number of units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Returns `true` if the module declares nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Set the inline flag of every method whose body callers copy.
    ///
    /// A method is inline if it carries an inline marker annotation or was named in `hints`.
    /// The synthetic `name$default` companion of an inline method `name` is inline as well,
    /// since callers that omit arguments inline it instead.
    pub fn flag_inline_methods(&mut self, hints: &InlineHints) {
        let mut flagged = 0_usize;

        for unit in self.units.values_mut() {
            let owner = unit.name.clone();
            for member in unit
                .members
                .iter_mut()
                .filter(|member| member.kind == MemberKind::Method)
            {
                member.inline = member.annotations().any(|a| is_inline_marker(&a.type_descriptor))
                    || hints.contains(&owner, &member.name, &member.descriptor);
            }

            let inline_names: Vec<String> = unit
                .methods()
                .filter(|method| method.inline)
                .map(|method| format!("{}{}", method.name, DEFAULT_SUFFIX))
                .collect();
            for member in unit.members.iter_mut() {
                if member.kind == MemberKind::Method
                    && member.is_synthetic()
                    && inline_names.contains(&member.name)
                {
                    member.inline = true;
                }
            }

            flagged += unit.methods().filter(|method| method.inline).count();
        }

        log::debug!("Flagged {flagged} inline methods");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::{
        attributes::{Annotation, Attribute, Retention},
        builder::ClassBuilder,
        flags::MethodAccessFlags,
        Member,
    };

    fn class(name: &str) -> Vec<u8> {
        ClassBuilder::new(name).to_bytes().unwrap()
    }

    #[test]
    fn reads_containers_in_parallel() {
        let source = ModuleSource::new()
            .with_container("a/A.class", class("a/A"))
            .with_container("a/B.class", class("a/B"));
        let module = Module::read(&source, true).unwrap();
        assert_eq!(module.len(), 2);
        assert!(module.contains("a/B"));
    }

    #[test]
    fn malformed_container_is_named() {
        let source = ModuleSource::new()
            .with_container("a/A.class", class("a/A"))
            .with_container("a/Broken.class", vec![0xCA, 0xFE]);
        match Module::read(&source, false) {
            Err(Error::MalformedContainer { container, .. }) => assert_eq!(container, "a/Broken.class"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn duplicate_classes_fail() {
        let source = ModuleSource::new()
            .with_container("a/A.class", class("a/A"))
            .with_container("copy/A.class", class("a/A"));
        assert!(matches!(
            Module::read(&source, true),
            Err(Error::MalformedContainer { .. })
        ));
    }

    #[test]
    fn directory_sources() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("a")).unwrap();
        std::fs::create_dir_all(dir.path().join("META-INF")).unwrap();
        std::fs::write(dir.path().join("a/A.class"), class("a/A")).unwrap();
        std::fs::write(dir.path().join("a/notes.txt"), b"ignored").unwrap();
        std::fs::write(dir.path().join("META-INF/main.kotlin_module"), b"\x00\x01").unwrap();

        let source = ModuleSource::from_directory(dir.path()).unwrap();
        assert_eq!(source.len(), 1);
        assert_eq!(source.containers().next().unwrap().name(), "a/A.class");
        let resources: Vec<_> = source.resources().collect();
        assert_eq!(resources, [("META-INF/main.kotlin_module", &b"\x00\x01"[..])]);
    }

    #[test]
    fn inline_flags_from_markers_hints_and_defaults() {
        let marked = Member::method(MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC, "f", "()V")
            .with_attribute(Attribute::Annotations {
                retention: Retention::Invisible,
                annotations: vec![Annotation::marker("Lkotlin/internal/InlineOnly;")],
            });
        let hinted = Member::method(MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC, "g", "()V");
        let defaults = Member::method(
            MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC | MethodAccessFlags::SYNTHETIC,
            "g$default",
            "(IILjava/lang/Object;)V",
        );
        let plain = Member::method(MethodAccessFlags::PUBLIC, "h", "()V");
        let unit = ClassBuilder::new("a/A")
            .method(marked)
            .method(hinted)
            .method(defaults)
            .method(plain)
            .build();

        let mut module = Module::from_units([unit]).unwrap();
        let mut hints = InlineHints::new();
        hints.insert(MemberRef::new("a/A", "g", "()V"));
        module.flag_inline_methods(&hints);

        let unit = module.get("a/A").unwrap();
        assert!(unit.method("f", "()V").unwrap().inline);
        assert!(unit.method("g", "()V").unwrap().inline);
        assert!(unit.method("g$default", "(IILjava/lang/Object;)V").unwrap().inline);
        assert!(!unit.method("h", "()V").unwrap().inline);
    }
}
