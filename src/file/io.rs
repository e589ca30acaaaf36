//! Low-level byte order and safe reading/writing utilities for class file parsing.
//!
//! The class file format stores every multi-byte quantity in big-endian order. This module
//! provides bounds-checked helpers for reading such values out of byte slices and for
//! appending or patching them in output buffers.
//!
//! # Key Components
//!
//! - [`crate::file::io::ClassIO`] - Trait defining big-endian conversion for primitive types
//! - [`crate::file::io::read_be`] / [`crate::file::io::read_be_at`] - Bounds-checked reads
//! - [`crate::file::io::write_be_at`] - Bounds-checked in-place patching
//! - [`crate::file::io::push_be`] - Append to a growable output buffer
//!
//! # Usage Examples
//!
//! ```rust,ignore
//! use abiscope::file::io::{read_be_at, push_be};
//!
//! let data = [0xCA, 0xFE, 0xBA, 0xBE, 0x00, 0x34];
//! let mut offset = 0;
//! let magic: u32 = read_be_at(&data, &mut offset)?;
//! let version: u16 = read_be_at(&data, &mut offset)?;
//! assert_eq!(magic, 0xCAFEBABE);
//! assert_eq!(version, 52);
//!
//! let mut out = Vec::new();
//! push_be(&mut out, magic);
//! assert_eq!(out, [0xCA, 0xFE, 0xBA, 0xBE]);
//! # Ok::<(), abiscope::Error>(())
//! ```
//!
//! # Error Handling
//!
//! All reading and patching functions return [`crate::Error::OutOfBounds`] if there are
//! insufficient bytes in the buffer to complete the operation.

use crate::{Error::OutOfBounds, Result};

/// Trait for type-specific safe big-endian conversions.
///
/// Each implementation names the fixed-size byte array of its type through `Bytes`, which the
/// reading functions fill from a bounds-checked slice.
pub trait ClassIO: Sized + Copy {
    /// Associated type representing the byte array type for this numeric type.
    type Bytes: Sized + AsRef<[u8]> + for<'a> TryFrom<&'a [u8]>;

    /// Read T from a byte buffer in big-endian
    fn from_be_bytes(bytes: Self::Bytes) -> Self;

    /// Write T to a byte buffer in big-endian
    fn to_be_bytes(self) -> Self::Bytes;
}

macro_rules! impl_class_io {
    ($($ty:ty => $n:expr),* $(,)?) => {
        $(
            impl ClassIO for $ty {
                type Bytes = [u8; $n];

                fn from_be_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_be_bytes(bytes)
                }

                fn to_be_bytes(self) -> Self::Bytes {
                    <$ty>::to_be_bytes(self)
                }
            }
        )*
    };
}

impl_class_io! {
    u8 => 1,
    i8 => 1,
    u16 => 2,
    i16 => 2,
    u32 => 4,
    i32 => 4,
    u64 => 8,
    i64 => 8,
}

/// Safely reads a value of type `T` in big-endian byte order from the start of a buffer.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes.
pub fn read_be<T: ClassIO>(data: &[u8]) -> Result<T> {
    let mut offset = 0_usize;
    read_be_at(data, &mut offset)
}

/// Safely reads a value of type `T` in big-endian byte order at `offset`, advancing the
/// offset by the size of `T`.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes.
pub fn read_be_at<T: ClassIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    let Some(end) = offset.checked_add(type_len) else {
        return Err(OutOfBounds);
    };
    if end > data.len() {
        return Err(OutOfBounds);
    }

    let Ok(read) = data[*offset..end].try_into() else {
        return Err(OutOfBounds);
    };

    *offset = end;
    Ok(T::from_be_bytes(read))
}

/// Overwrites the bytes at `offset` with `value` in big-endian order, advancing the offset.
///
/// Used to patch constant pool indices into copied bytecode.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the value does not fit at `offset`.
pub fn write_be_at<T: ClassIO>(data: &mut [u8], offset: &mut usize, value: T) -> Result<()> {
    let bytes = value.to_be_bytes();
    let bytes = bytes.as_ref();
    let Some(end) = offset.checked_add(bytes.len()) else {
        return Err(OutOfBounds);
    };
    if end > data.len() {
        return Err(OutOfBounds);
    }

    data[*offset..end].copy_from_slice(bytes);
    *offset = end;
    Ok(())
}

/// Appends `value` to `out` in big-endian order.
pub fn push_be<T: ClassIO>(out: &mut Vec<u8>, value: T) {
    out.extend_from_slice(value.to_be_bytes().as_ref());
}

/// Appends a length as a `u16`, the width the class file format uses for almost every count.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if `len` does not fit into 16 bits.
pub fn push_len_u16(out: &mut Vec<u8>, len: usize) -> Result<()> {
    let Ok(len) = u16::try_from(len) else {
        return Err(malformed_error!("Count {} does not fit into u16", len));
    };
    push_be(out, len);
    Ok(())
}

/// Appends a length as a `u32`, as used by attribute lengths.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if `len` does not fit into 32 bits.
pub fn push_len_u32(out: &mut Vec<u8>, len: usize) -> Result<()> {
    let Ok(len) = u32::try_from(len) else {
        return Err(malformed_error!("Length {} does not fit into u32", len));
    };
    push_be(out, len);
    Ok(())
}
