//! ABI artifact assembly and atomic publication.
//!
//! An [`AbiArtifact`] is the in-memory result of a run: relative paths mapped to file contents,
//! ordered by path so that iteration, hashing and the written tree are deterministic.
//!
//! # Atomic Publication
//!
//! [`AbiArtifact::publish`] never exposes a partial tree. The entries are written into a staging
//! directory next to the destination (same filesystem, so renames are atomic), a previous
//! artifact at the destination is moved aside, and the staging directory is renamed into place.
//! If the final rename fails the previous artifact is moved back. Staging and trash directories
//! are [`tempfile::TempDir`]s, so whatever is left over on any path is removed when they drop.

use std::{
    collections::BTreeMap,
    fs,
    path::{Component, Path, PathBuf},
};

use sha1::{Digest, Sha1};

use crate::{Error, Result};

/// The ABI projection of a module, keyed by relative output path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AbiArtifact {
    entries: BTreeMap<String, Vec<u8>>,
}

impl AbiArtifact {
    /// Create an empty artifact.
    #[must_use]
    pub fn new() -> Self {
        AbiArtifact::default()
    }

    /// Add or replace an entry.
    ///
    /// # Errors
    /// Returns [`crate::Error::Error`] if `path` is empty, absolute or leaves the artifact root.
    pub fn insert(&mut self, path: impl Into<String>, data: Vec<u8>) -> Result<()> {
        let path = path.into();
        let relative = Path::new(&path);
        if path.is_empty()
            || !relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)))
        {
            return Err(Error::Error(format!("Invalid artifact path '{path}'")));
        }

        self.entries.insert(path, data);
        Ok(())
    }

    /// Contents of an entry.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.entries.get(path).map(Vec::as_slice)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the artifact has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.entries
            .iter()
            .map(|(path, data)| (path.as_str(), data.as_slice()))
    }

    /// Entry paths in order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// SHA-1 over every path and its contents, hex encoded.
    ///
    /// Two artifacts have the same digest exactly when they have the same entries, which makes
    /// the digest usable as a build cache key.
    #[must_use]
    pub fn digest(&self) -> String {
        let mut hasher = Sha1::new();
        for (path, data) in &self.entries {
            hasher.update((path.len() as u64).to_be_bytes());
            hasher.update(path.as_bytes());
            hasher.update((data.len() as u64).to_be_bytes());
            hasher.update(data);
        }
        hex::encode(hasher.finalize())
    }

    /// Write the artifact to `destination`, replacing whatever was there.
    ///
    /// Readers of `destination` observe either the previous tree or the complete new one.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutputWrite`] if any filesystem operation fails. The previous
    /// contents of `destination` are left in place in that case.
    pub fn publish(&self, destination: &Path) -> Result<()> {
        let parent = match destination.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let name = destination
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "abi".to_string());

        fs::create_dir_all(&parent).map_err(write_error(&parent))?;

        let staging = tempfile::Builder::new()
            .prefix(&format!(".{name}.staging"))
            .tempdir_in(&parent)
            .map_err(write_error(&parent))?;

        for (path, data) in &self.entries {
            let target = staging.path().join(path);
            if let Some(directory) = target.parent() {
                fs::create_dir_all(directory).map_err(write_error(directory))?;
            }
            fs::write(&target, data).map_err(write_error(&target))?;
        }

        let trash = if destination.exists() {
            let trash = tempfile::Builder::new()
                .prefix(&format!(".{name}.previous"))
                .tempdir_in(&parent)
                .map_err(write_error(&parent))?;
            let previous = trash.path().join(&name);
            fs::rename(destination, &previous).map_err(write_error(destination))?;
            Some((trash, previous))
        } else {
            None
        };

        if let Err(error) = fs::rename(staging.path(), destination) {
            if let Some((_, previous)) = &trash {
                if let Err(restore) = fs::rename(previous, destination) {
                    log::error!(
                        "Failed to restore {} after a failed publish: {restore}",
                        destination.display()
                    );
                }
            }
            return Err(Error::OutputWrite {
                path: destination.to_path_buf(),
                source: error,
            });
        }

        log::debug!(
            "Published {} entries to {}",
            self.entries.len(),
            destination.display()
        );
        Ok(())
    }
}

fn write_error(path: &Path) -> impl FnOnce(std::io::Error) -> Error + '_ {
    move |source| Error::OutputWrite {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> AbiArtifact {
        let mut artifact = AbiArtifact::new();
        artifact.insert("a/B.class", vec![0xCA, 0xFE, 0xBA, 0xBE]).unwrap();
        artifact.insert("a/A.class", vec![1, 2, 3]).unwrap();
        artifact
            .insert("META-INF/main.kotlin_module", vec![0, 0, 0, 1])
            .unwrap();
        artifact
    }

    #[test]
    fn entries_are_ordered() {
        let artifact = sample();
        let paths: Vec<&str> = artifact.paths().collect();
        assert_eq!(
            paths,
            vec!["META-INF/main.kotlin_module", "a/A.class", "a/B.class"]
        );
        assert_eq!(artifact.get("a/A.class"), Some(&[1_u8, 2, 3][..]));
        assert_eq!(artifact.len(), 3);
    }

    #[test]
    fn invalid_paths_are_rejected() {
        let mut artifact = AbiArtifact::new();
        assert!(artifact.insert("", Vec::new()).is_err());
        assert!(artifact.insert("../escape.class", Vec::new()).is_err());
        assert!(artifact.insert("/abs.class", Vec::new()).is_err());
        assert!(artifact.is_empty());
    }

    #[test]
    fn digest_depends_on_paths_and_contents() {
        let artifact = sample();
        assert_eq!(artifact.digest(), sample().digest());
        assert_eq!(artifact.digest().len(), 40);

        let mut changed = sample();
        changed.insert("a/A.class", vec![1, 2, 4]).unwrap();
        assert_ne!(artifact.digest(), changed.digest());

        let mut renamed = AbiArtifact::new();
        for (path, data) in artifact.iter() {
            renamed.insert(path.replace("a/A", "a/C"), data.to_vec()).unwrap();
        }
        assert_ne!(artifact.digest(), renamed.digest());
    }

    #[test]
    fn publish_writes_tree() {
        let dir = tempdir().unwrap();
        let destination = dir.path().join("out").join("abi");

        sample().publish(&destination).unwrap();

        assert_eq!(fs::read(destination.join("a/A.class")).unwrap(), vec![1, 2, 3]);
        assert_eq!(
            fs::read(destination.join("META-INF/main.kotlin_module")).unwrap(),
            vec![0, 0, 0, 1]
        );
    }

    #[test]
    fn publish_replaces_previous_tree() {
        let dir = tempdir().unwrap();
        let destination = dir.path().join("abi");

        sample().publish(&destination).unwrap();

        let mut next = AbiArtifact::new();
        next.insert("b/Only.class", vec![9]).unwrap();
        next.publish(&destination).unwrap();

        assert!(!destination.join("a/A.class").exists());
        assert_eq!(fs::read(destination.join("b/Only.class")).unwrap(), vec![9]);

        // No staging or trash directories are left behind
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("abi")]);
    }

    #[test]
    fn failed_publish_keeps_previous_tree() {
        let dir = tempdir().unwrap();
        let destination = dir.path().join("abi");
        sample().publish(&destination).unwrap();

        // A file where a directory is needed makes the staging write fail
        let mut broken = AbiArtifact::new();
        broken.insert("x", vec![1]).unwrap();
        broken.insert("x/y.class", vec![2]).unwrap();

        match broken.publish(&destination) {
            Err(Error::OutputWrite { .. }) => {}
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(fs::read(destination.join("a/A.class")).unwrap(), vec![1, 2, 3]);
        assert!(!destination.join("x").exists());
    }
}
