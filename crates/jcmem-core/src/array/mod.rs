//! Generic array engine: bounds-checked, kind-aware copy/fill/compare/find
//! over byte, short and int arrays.
//!
//! Every entry point validates completely before the first write, so a
//! rejected call never leaves a partial effect. Mutating variants route
//! persistent writes through the atomic lane unless the caller asked for
//! the non-atomic variant.

mod repack;
mod validate;

pub(crate) use repack::{assemble_be, split_be};

use crate::{
    array::{
        repack::RepackPlan,
        validate::{Operand, check_range, non_negative, resolve_generic, same_kind},
    },
    error::{CardError, ErrorOrigin, UtilReason},
    memory::CardMemory,
    obs::sink::{self, ArrayOpKind, MetricsEvent},
    store::ArrayRef,
};
use jcmem_primitives::ElementKind;
use std::cmp::Ordering;

///
/// Atomicity
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Atomicity {
    Atomic,
    NonAtomic,
}

// Record call metrics around one engine entry point.
fn instrument<T>(
    kind: ArrayOpKind,
    op: impl FnOnce() -> Result<(T, u64), CardError>,
) -> Result<T, CardError> {
    match op() {
        Ok((value, elements)) => {
            sink::record(MetricsEvent::ArrayOp { kind, elements });
            Ok(value)
        }
        Err(err) => {
            sink::record(MetricsEvent::ArrayOpFailed { kind });
            Err(err)
        }
    }
}

// Persistent integrity-sensitive arrays reject the non-atomic lane.
fn guard_non_atomic(dest: &Operand, atomicity: Atomicity) -> Result<(), CardError> {
    if atomicity == Atomicity::NonAtomic && dest.descriptor.requires_atomic_writes() {
        return Err(CardError::security(
            ErrorOrigin::Array,
            format!(
                "non-atomic write to persistent integrity-sensitive array {}",
                dest.array
            ),
        ));
    }

    Ok(())
}

fn write(
    memory: &mut CardMemory,
    array: ArrayRef,
    offset: usize,
    bytes: &[u8],
    atomicity: Atomicity,
) -> Result<(), CardError> {
    if bytes.is_empty() {
        return Ok(());
    }

    match atomicity {
        Atomicity::Atomic => memory.write_atomic(array, offset, bytes),
        Atomicity::NonAtomic => memory.write_direct(array, offset, bytes),
    }
}

// Array indices never exceed `i16::MAX`, so this only fails on a broken invariant.
fn to_short(value: usize) -> Result<i16, CardError> {
    i16::try_from(value).map_err(|_| {
        CardError::index_out_of_bounds(ErrorOrigin::Array, format!("index {value} exceeds short range"))
    })
}

// ==========================================================================
// Copy
// ==========================================================================

/// Copy `src_len` source elements into `dest` starting at `dest_off`,
/// repacking between element widths. Returns `dest_off` plus the number of
/// destination elements written.
pub(crate) fn copy_repack(
    memory: &mut CardMemory,
    src: ArrayRef,
    src_off: i16,
    src_len: i16,
    dest: ArrayRef,
    dest_off: i16,
    atomicity: Atomicity,
) -> Result<i16, CardError> {
    let kind = match atomicity {
        Atomicity::Atomic => ArrayOpKind::Copy,
        Atomicity::NonAtomic => ArrayOpKind::CopyNonAtomic,
    };

    instrument(kind, || {
        let [src_op, dest_op] = resolve_generic(&memory.store, [src, dest])?;
        let src_off = non_negative(src_off, "source offset")?;
        let src_len = non_negative(src_len, "source length")?;
        let dest_off = non_negative(dest_off, "destination offset")?;

        let plan = RepackPlan::new(&src_op, src_off, src_len, &dest_op, dest_off)?;
        guard_non_atomic(&dest_op, atomicity)?;

        // Staging through an owned buffer makes overlapping same-array copies safe.
        let staged = memory.store.read(src, plan.src_byte_off, plan.byte_len)?;
        write(memory, dest, plan.dest_byte_off, &staged, atomicity)?;

        let next = to_short(dest_off + plan.dest_elements)?;
        Ok((next, plan.dest_elements as u64))
    })
}

// ==========================================================================
// Fill
// ==========================================================================

/// Fill `len` elements of `array` from `off` with the element at `val_off`
/// in `val_array`. Both arrays must share an element kind. Returns `off + len`.
pub(crate) fn fill_generic(
    memory: &mut CardMemory,
    array: ArrayRef,
    off: i16,
    len: i16,
    val_array: ArrayRef,
    val_off: i16,
    atomicity: Atomicity,
) -> Result<i16, CardError> {
    let kind = match atomicity {
        Atomicity::Atomic => ArrayOpKind::Fill,
        Atomicity::NonAtomic => ArrayOpKind::FillNonAtomic,
    };

    instrument(kind, || {
        let [target, value] = resolve_generic(&memory.store, [array, val_array])?;
        same_kind(&target, &value)?;

        let off = non_negative(off, "fill offset")?;
        let len = non_negative(len, "fill length")?;
        let val_off = non_negative(val_off, "value offset")?;
        check_range(&target, off, len, "fill")?;
        check_range(&value, val_off, 1, "value")?;
        guard_non_atomic(&target, atomicity)?;

        let width = target.width();
        let element = memory.store.read(val_array, val_off * width, width)?;
        let pattern = element.repeat(len);
        write(memory, array, off * width, &pattern, atomicity)?;

        Ok((to_short(off + len)?, len as u64))
    })
}

// ==========================================================================
// Compare
// ==========================================================================

/// Compare `length` elements as unsigned values, left to right.
///
/// Returns -1, 0 or 1 by the sign of `src[i] - dest[i]` at the first
/// mismatch, or 0 when every element matches.
pub(crate) fn compare_generic(
    memory: &CardMemory,
    src: ArrayRef,
    src_off: i16,
    dest: ArrayRef,
    dest_off: i16,
    length: i16,
) -> Result<i8, CardError> {
    instrument(ArrayOpKind::Compare, || {
        let [left, right] = resolve_generic(&memory.store, [src, dest])?;
        same_kind(&left, &right)?;

        let src_off = non_negative(src_off, "source offset")?;
        let dest_off = non_negative(dest_off, "destination offset")?;
        let length = non_negative(length, "length")?;
        check_range(&left, src_off, length, "source")?;
        check_range(&right, dest_off, length, "destination")?;

        let width = left.width();
        let left_bytes = memory.store.read(src, src_off * width, length * width)?;
        let right_bytes = memory.store.read(dest, dest_off * width, length * width)?;

        // Big-endian byte order compares like the unsigned element value.
        let pairs = left_bytes.chunks_exact(width).zip(right_bytes.chunks_exact(width));
        for (compared, (l, r)) in pairs.enumerate() {
            match l.cmp(r) {
                Ordering::Less => return Ok((-1, compared as u64 + 1)),
                Ordering::Greater => return Ok((1, compared as u64 + 1)),
                Ordering::Equal => {}
            }
        }

        Ok((0, length as u64))
    })
}

// ==========================================================================
// Find
// ==========================================================================

/// Scan `array` from `off` to the end for the first element equal to the
/// value at `val_off` in `val_array`. Returns its index or -1.
///
/// `val_array` either shares the element kind of `array` (the value is the
/// element at `val_off`) or is a byte array (the value is assembled from
/// `width` bytes at `val_off`, most-significant first).
pub(crate) fn find_generic(
    memory: &CardMemory,
    array: ArrayRef,
    off: i16,
    val_array: ArrayRef,
    val_off: i16,
) -> Result<i16, CardError> {
    instrument(ArrayOpKind::Find, || {
        let [target, value] = resolve_generic(&memory.store, [array, val_array])?;

        let off = non_negative(off, "search offset")?;
        let val_off = non_negative(val_off, "value offset")?;
        check_range(&target, off, 0, "search")?;

        let width = target.width();
        let needle = if value.descriptor.kind == target.descriptor.kind {
            check_range(&value, val_off, 1, "value")?;
            memory.store.read(val_array, val_off * width, width)?
        } else if value.descriptor.kind == ElementKind::Byte {
            check_range(&value, val_off, width, "value")?;
            memory.store.read(val_array, val_off, width)?
        } else {
            return Err(CardError::util(
                ErrorOrigin::Array,
                UtilReason::TypeMismatched,
                format!(
                    "search value in {:?} array cannot encode a {:?} element",
                    value.descriptor.kind, target.descriptor.kind
                ),
            ));
        };

        let remaining = target.length() - off;
        let haystack = memory.store.read(array, off * width, remaining * width)?;
        let found = haystack
            .chunks_exact(width)
            .position(|element| element == needle.as_slice());

        match found {
            Some(index) => Ok((to_short(off + index)?, index as u64 + 1)),
            None => Ok((-1, remaining as u64)),
        }
    })
}
