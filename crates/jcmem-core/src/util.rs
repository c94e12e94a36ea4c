//! Byte-packing helpers over card byte arrays (`Util` / `JCint` surface).
//!
//! Values are big-endian. Setters are transaction-participating writes.

use crate::{
    array::{assemble_be, split_be},
    error::{CardError, ErrorOrigin, UtilReason},
    memory::CardMemory,
    store::ArrayRef,
};
use jcmem_primitives::ElementKind;

/// Concatenate two bytes into a short, `b1` high.
#[must_use]
pub const fn make_short(b1: i8, b2: i8) -> i16 {
    (((b1 as u8 as u16) << 8) | (b2 as u8 as u16)) as i16
}

/// Concatenate two shorts into an int, `s1` high.
#[must_use]
pub const fn make_int(s1: i16, s2: i16) -> i32 {
    (((s1 as u16 as u32) << 16) | (s2 as u16 as u32)) as i32
}

/// Concatenate four bytes into an int, `b1` high.
#[must_use]
pub const fn make_int_from_bytes(b1: i8, b2: i8, b3: i8, b4: i8) -> i32 {
    make_int(make_short(b1, b2), make_short(b3, b4))
}

// Resolve a byte array and a `width`-byte window at `off`.
fn byte_window(
    memory: &CardMemory,
    array: ArrayRef,
    off: i16,
    width: usize,
) -> Result<usize, CardError> {
    let descriptor = memory.store.descriptor(array, ErrorOrigin::Array)?;
    if descriptor.kind != ElementKind::Byte {
        return Err(CardError::util(
            ErrorOrigin::Array,
            UtilReason::TypeMismatched,
            format!("{array} holds {:?} elements; byte array required", descriptor.kind),
        ));
    }

    let start = usize::try_from(off).ok();
    match start {
        Some(start) if start + width <= descriptor.length => Ok(start),
        _ => Err(CardError::index_out_of_bounds(
            ErrorOrigin::Array,
            format!("{width}-byte value at {off} outside {array} of length {}", descriptor.length),
        )),
    }
}

fn read_value(memory: &CardMemory, array: ArrayRef, off: i16, width: usize) -> Result<u32, CardError> {
    let start = byte_window(memory, array, off, width)?;
    let bytes = memory.store.read(array, start, width)?;

    Ok(assemble_be(&bytes))
}

fn write_value(
    memory: &mut CardMemory,
    array: ArrayRef,
    off: i16,
    value: u32,
    width: usize,
) -> Result<i16, CardError> {
    let start = byte_window(memory, array, off, width)?;
    memory.write_participating(array, start, &split_be(value, width))?;

    Ok(off + width as i16)
}

pub(crate) fn get_short(memory: &CardMemory, array: ArrayRef, off: i16) -> Result<i16, CardError> {
    Ok(read_value(memory, array, off, 2)? as u16 as i16)
}

pub(crate) fn set_short(
    memory: &mut CardMemory,
    array: ArrayRef,
    off: i16,
    value: i16,
) -> Result<i16, CardError> {
    write_value(memory, array, off, u32::from(value as u16), 2)
}

pub(crate) fn get_int(memory: &CardMemory, array: ArrayRef, off: i16) -> Result<i32, CardError> {
    Ok(read_value(memory, array, off, 4)? as i32)
}

pub(crate) fn set_int(
    memory: &mut CardMemory,
    array: ArrayRef,
    off: i16,
    value: i32,
) -> Result<i16, CardError> {
    write_value(memory, array, off, value as u32, 4)
}

///
/// TESTS
///
