//! Integrity-sensitive arrays.
//!
//! A sensitive array carries an xxh3 checksum over its payload. Every write
//! that goes through the store refreshes it, so only out-of-band corruption
//! (a bit flip) makes `assert_integrity` fail.

use crate::{
    error::{CardError, ErrorOrigin, SystemReason, UtilReason},
    memory::CardMemory,
    store::ArrayRef,
};
use jcmem_primitives::{ElementKind, PersistenceClass};

/// Allocate a zero-filled integrity-sensitive array.
///
/// `kind` must be a primitive element kind and `memory_type` one of the
/// `MEMORY_TYPE_*` codes.
pub(crate) fn make_array(
    memory: &mut CardMemory,
    supported: bool,
    kind: ElementKind,
    memory_type: u8,
    length: i16,
) -> Result<ArrayRef, CardError> {
    if !supported {
        return Err(CardError::system(
            ErrorOrigin::Sensitive,
            SystemReason::IllegalUse,
            "integrity-sensitive arrays are not supported by this card",
        ));
    }
    if !kind.is_primitive() {
        return Err(CardError::system(
            ErrorOrigin::Sensitive,
            SystemReason::IllegalValue,
            format!("{kind:?} arrays cannot be integrity-sensitive"),
        ));
    }

    let persistence = PersistenceClass::from_memory_type(memory_type).ok_or_else(|| {
        CardError::system(
            ErrorOrigin::Sensitive,
            SystemReason::IllegalValue,
            format!("unknown memory type {memory_type}"),
        )
    })?;
    let length = usize::try_from(length).map_err(|_| {
        CardError::system(
            ErrorOrigin::Sensitive,
            SystemReason::IllegalValue,
            format!("negative array length {length}"),
        )
    })?;

    let array = memory.store.allocate(kind, length, persistence, true)?;
    memory.debug_log(format!(
        "integrity-sensitive {kind:?}[{length}] allocated as {array} ({persistence:?})"
    ));

    Ok(array)
}

pub(crate) fn is_sensitive(memory: &CardMemory, array: ArrayRef) -> Result<bool, CardError> {
    Ok(memory
        .store
        .descriptor(array, ErrorOrigin::Sensitive)?
        .integrity_sensitive)
}

/// Recompute the checksum of a sensitive array and compare.
pub(crate) fn assert_integrity(memory: &CardMemory, array: ArrayRef) -> Result<(), CardError> {
    let cell = memory.store.cell(array, ErrorOrigin::Sensitive)?;
    if !cell.descriptor.integrity_sensitive {
        return Err(CardError::util(
            ErrorOrigin::Sensitive,
            UtilReason::IllegalValue,
            format!("{array} is not integrity-sensitive"),
        ));
    }

    if cell.integrity_intact() {
        Ok(())
    } else {
        memory.debug_log(format!("integrity check failed for {array}"));
        Err(CardError::security(
            ErrorOrigin::Sensitive,
            format!("integrity check failed for {array}"),
        ))
    }
}

/// Zero a sensitive array as one atomic unit.
pub(crate) fn clear_array(memory: &mut CardMemory, array: ArrayRef) -> Result<(), CardError> {
    let descriptor = memory.store.descriptor(array, ErrorOrigin::Sensitive)?;
    if !descriptor.integrity_sensitive {
        return Err(CardError::util(
            ErrorOrigin::Sensitive,
            UtilReason::IllegalValue,
            format!("{array} is not integrity-sensitive"),
        ));
    }
    if descriptor.byte_len() == 0 {
        return Ok(());
    }

    memory.write_atomic(array, 0, &vec![0; descriptor.byte_len()])
}
