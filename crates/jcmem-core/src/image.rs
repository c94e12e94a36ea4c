//! Persistent image codec.
//!
//! An image holds every array descriptor, persistent payloads (with their
//! integrity checksums) and the pending undo log. Loading an image is a
//! simulated power-up: the undo log is rolled back and transient arrays come
//! back zeroed.

use crate::{
    config::CardConfig,
    error::{CardError, ErrorOrigin, SystemReason},
    memory::CardMemory,
    serialize::{deserialize, serialize},
    store::{ArrayCell, ArrayDescriptor, ArrayRef, ArrayStore},
    txn::{TransactionManager, UndoEntry, rollback_reverse},
};
use jcmem_primitives::{ElementKind, MAX_ARRAY_LENGTH, PersistenceClass};
use serde::{Deserialize, Serialize};

/// Bumped whenever the image layout changes.
pub const IMAGE_FORMAT_VERSION: u16 = 1;

///
/// PersistentImage
///

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct PersistentImage {
    format: u16,
    arrays: Vec<ImageArray>,
    pending: Vec<UndoEntry>,
}

///
/// ImageArray
///
/// `data` is empty for transient arrays.
///

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct ImageArray {
    array: ArrayRef,
    kind: u8,
    length: u16,
    memory_type: u8,
    integrity_sensitive: bool,
    checksum: Option<u64>,
    data: Vec<u8>,
}

impl ImageArray {
    fn capture(array: ArrayRef, cell: &ArrayCell) -> Self {
        let descriptor = cell.descriptor;
        let persistent = descriptor.persistence.is_persistent();

        Self {
            array,
            kind: descriptor.kind.code(),
            length: descriptor.length as u16,
            memory_type: descriptor.persistence.memory_type(),
            integrity_sensitive: descriptor.integrity_sensitive,
            checksum: if persistent { cell.checksum } else { None },
            data: if persistent { cell.data.clone() } else { Vec::new() },
        }
    }

    fn into_cell(self) -> Result<(ArrayRef, ArrayCell), CardError> {
        let kind = ElementKind::from_code(self.kind)
            .ok_or_else(|| image_error(format!("unknown element kind {}", self.kind)))?;
        let persistence = PersistenceClass::from_memory_type(self.memory_type)
            .ok_or_else(|| image_error(format!("unknown memory type {}", self.memory_type)))?;
        let length = usize::from(self.length);
        if length > MAX_ARRAY_LENGTH {
            return Err(image_error(format!(
                "{} length {length} exceeds {MAX_ARRAY_LENGTH}",
                self.array
            )));
        }

        let descriptor = ArrayDescriptor {
            kind,
            length,
            persistence,
            integrity_sensitive: self.integrity_sensitive,
        };

        let mut cell = ArrayCell::zeroed(descriptor);
        if persistence.is_persistent() {
            if self.data.len() != descriptor.byte_len() {
                return Err(image_error(format!(
                    "{} payload is {} bytes, descriptor needs {}",
                    self.array,
                    self.data.len(),
                    descriptor.byte_len()
                )));
            }
            cell.data = self.data;
            cell.checksum = self.checksum;
        }

        Ok((self.array, cell))
    }
}

fn image_error(message: impl Into<String>) -> CardError {
    CardError::system(ErrorOrigin::Image, SystemReason::IllegalValue, message)
}

/// Encode the card's persistent state.
pub(crate) fn capture(memory: &CardMemory) -> Result<Vec<u8>, CardError> {
    let image = PersistentImage {
        format: IMAGE_FORMAT_VERSION,
        arrays: memory
            .store
            .iter()
            .map(|(array, cell)| ImageArray::capture(array, cell))
            .collect(),
        pending: memory.txn.log().entries().to_vec(),
    };

    Ok(serialize(&image)?)
}

/// Decode an image and power the card up from it.
pub(crate) fn restore(config: &CardConfig, bytes: &[u8]) -> Result<CardMemory, CardError> {
    let image: PersistentImage = deserialize(bytes)?;
    if image.format != IMAGE_FORMAT_VERSION {
        return Err(image_error(format!(
            "unsupported image format {}",
            image.format
        )));
    }

    let mut store = ArrayStore::new(config);
    for entry in image.arrays {
        let (array, cell) = entry.into_cell()?;
        store.adopt(array, cell)?;
    }

    let pending = image.pending.len();
    rollback_reverse(&mut store, image.pending)?;

    let memory = CardMemory::from_parts(store, TransactionManager::new(config), config.debug);
    if pending > 0 {
        memory.debug_log(format!(
            "image restore rolled back {pending} pending undo entries"
        ));
    }

    Ok(memory)
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::CardRuntime;
    use jcmem_primitives::CLEAR_ON_RESET;

    #[test]
    fn restore_rejects_lengths_beyond_short_range() {
        let mut card = CardRuntime::default();
        card.make_transient_array(ElementKind::Byte, 4, CLEAR_ON_RESET)
            .expect("allocation should succeed");
        let bytes = card.persistent_image().expect("capture should succeed");

        let mut image: PersistentImage = deserialize(&bytes).expect("image should decode");
        image.arrays[0].length = MAX_ARRAY_LENGTH as u16 + 1;
        let tampered = serialize(&image).expect("image should encode");

        let err = restore(&CardConfig::default(), &tampered)
            .err()
            .expect("oversized length should be rejected");

        assert_eq!(err.origin, ErrorOrigin::Image);
        assert_eq!(err.reason_code(), SystemReason::IllegalValue as u16);
        assert!(err.message.contains("exceeds"));
    }
}
