use std::path::PathBuf;

use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// The variants follow the stages of the ABI pipeline. Parsing problems of a single container
/// surface as [`Error::MalformedContainer`], problems found while marking the module surface as
/// [`Error::UnresolvableInlineReference`], engine invariant violations as
/// [`Error::DanglingReference`], and publication failures as [`Error::OutputWrite`].
///
/// # Error Categories
///
/// ## Container Parsing Errors
/// - [`Error::Malformed`] - Corrupted or invalid structure, with the source location that detected it
/// - [`Error::OutOfBounds`] - Attempted to read beyond the end of the input
/// - [`Error::MalformedContainer`] - A named container could not be parsed
///
/// ## Marking and Rewriting Errors
/// - [`Error::UnresolvableInlineReference`] - An inline body depends on something that does not exist
/// - [`Error::DanglingReference`] - A surviving reference targets a dropped element (engine bug)
/// - [`Error::PoolOverflow`] - The rebuilt constant pool cannot be encoded
///
/// ## I/O Errors
/// - [`Error::FileError`] - Filesystem errors while reading inputs
/// - [`Error::OutputWrite`] - The artifact could not be written or published
///
/// # Examples
///
/// ```rust,no_run
/// use abiscope::{generate_abi, Error, ModuleSource};
/// use std::path::Path;
///
/// let source = ModuleSource::from_directory(Path::new("build/classes"))?;
/// match generate_abi(&source, Path::new("build/abi")) {
///     Ok(artifact) => println!("ABI digest: {}", artifact.digest()),
///     Err(Error::MalformedContainer { container, message }) => {
///         eprintln!("{container} is not a class file: {message}");
///     }
///     Err(e) => eprintln!("ABI generation failed: {e}"),
/// }
/// # Ok::<(), abiscope::Error>(())
/// ```
#[derive(Error, Debug)]
pub enum Error {
    // Container parsing errors
    /// The data is damaged and could not be parsed.
    ///
    /// The error includes the source location where the malformation was detected for
    /// debugging purposes.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while parsing the data.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// A compiled container is not a valid class file.
    ///
    /// Raised by the reader when the magic marker is absent, a declared length exceeds the
    /// available bytes, or a constant pool index does not resolve.
    #[error("Malformed container '{container}': {message}")]
    MalformedContainer {
        /// Relative path or name of the container
        container: String,
        /// What went wrong
        message: String,
    },

    // Marking and rewriting errors
    /// A body that callers inline references a declaration that cannot be found in the module
    /// and cannot be resolved outside of it either.
    #[error("Inline body of {from} references unresolvable {target}")]
    UnresolvableInlineReference {
        /// The member whose body holds the reference
        from: String,
        /// The reference that failed to resolve
        target: String,
    },

    /// A surviving reference targets an element that was dropped.
    ///
    /// This indicates a bug in the marking phase, never invalid input.
    #[error("Dangling reference in {unit}: {target} was dropped")]
    DanglingReference {
        /// The unit holding the reference
        unit: String,
        /// The dropped target
        target: String,
    },

    /// The rebuilt constant pool of a unit cannot be encoded.
    #[error("Constant pool overflow in {unit}: {message}")]
    PoolOverflow {
        /// The unit being serialized
        unit: String,
        /// What limit was exceeded
        message: String,
    },

    // I/O errors
    /// File I/O error while reading inputs.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// The artifact could not be written to its destination.
    ///
    /// No partial artifact is left visible when this is returned.
    #[error("Failed to write ABI artifact at {}: {source}", path.display())]
    OutputWrite {
        /// The path that could not be written
        path: PathBuf,
        /// The underlying I/O failure
        source: std::io::Error,
    },

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),
}

impl Error {
    /// Attach the container name to a parse failure.
    ///
    /// Errors that already carry a container name are returned unchanged.
    pub(crate) fn in_container(self, container: &str) -> Error {
        match self {
            Error::MalformedContainer { .. } => self,
            Error::Malformed { message, .. } => Error::MalformedContainer {
                container: container.to_string(),
                message,
            },
            Error::OutOfBounds => Error::MalformedContainer {
                container: container.to_string(),
                message: "declared length exceeds available bytes".to_string(),
            },
            other => Error::MalformedContainer {
                container: container.to_string(),
                message: other.to_string(),
            },
        }
    }

    /// Returns `true` for errors that indicate an engine bug rather than bad input.
    #[must_use]
    pub fn is_internal(&self) -> bool {
        matches!(self, Error::DanglingReference { .. })
    }
}
