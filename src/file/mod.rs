//! Byte-level access to compiled containers.
//!
//! Class files reach the reader either from memory or from memory-mapped files on disk. Both
//! sources implement the [`Backend`] trait so that the rest of the pipeline only ever sees a
//! byte slice.
//!
//! # Key Components
//!
//! - [`Backend`] - Common interface over in-memory and file-backed data
//! - [`ContainerBytes`] - A named, loaded container handed to the reader
//! - [`io`] - Big-endian read/write helpers
//! - [`parser`] - Cursor-based [`parser::Parser`]

pub mod io;
pub mod parser;

mod memory;
mod physical;

use std::{fmt, path::Path};

use crate::Result;

pub use memory::Memory;
pub use physical::Physical;

/// Backend for container data sources.
///
/// Implementations provide access to the raw bytes of one container. All
/// implementations must be thread-safe since containers are parsed in parallel.
pub trait Backend: Send + Sync {
    /// Returns the entire data buffer.
    fn data(&self) -> &[u8];

    /// Returns the total length of the data buffer.
    fn len(&self) -> usize;
}

/// One compiled container together with the path it is addressed by.
///
/// The name is the `/`-separated path relative to the module root, for example
/// `com/example/A.class`. It is used for error reporting and for placing resources; class files
/// are placed by their internal name instead.
pub struct ContainerBytes {
    name: String,
    backend: Box<dyn Backend>,
}

impl ContainerBytes {
    /// Wrap an in-memory buffer.
    pub fn from_mem(name: impl Into<String>, data: Vec<u8>) -> Self {
        ContainerBytes {
            name: name.into(),
            backend: Box::new(Memory::new(data)),
        }
    }

    /// Memory-map a file from disk.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be opened or mapped.
    pub fn from_file(name: impl Into<String>, path: &Path) -> Result<Self> {
        Ok(ContainerBytes {
            name: name.into(),
            backend: Box::new(Physical::new(path)?),
        })
    }

    /// The relative name of this container.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The raw bytes of this container.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.backend.data()
    }

    /// Length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.backend.len()
    }

    /// Returns `true` for an empty container.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.backend.len() == 0
    }
}

impl fmt::Debug for ContainerBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerBytes")
            .field("name", &self.name)
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_container() {
        let container = ContainerBytes::from_mem("a/B.class", vec![0xCA, 0xFE, 0xBA, 0xBE]);
        assert_eq!(container.name(), "a/B.class");
        assert_eq!(container.len(), 4);
        assert_eq!(container.data()[0], 0xCA);
        assert!(!container.is_empty());
    }
}
