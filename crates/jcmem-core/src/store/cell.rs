use jcmem_primitives::{ElementKind, PersistenceClass};
use xxhash_rust::xxh3::xxh3_64;

///
/// ArrayDescriptor
///
/// Immutable type metadata attached to every array.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ArrayDescriptor {
    pub kind: ElementKind,
    pub length: usize,
    pub persistence: PersistenceClass,
    pub integrity_sensitive: bool,
}

impl ArrayDescriptor {
    /// Payload size in bytes.
    #[must_use]
    pub const fn byte_len(&self) -> usize {
        self.length * self.kind.width()
    }

    /// Persistent integrity-sensitive arrays only accept atomic mutation.
    #[must_use]
    pub const fn requires_atomic_writes(&self) -> bool {
        self.integrity_sensitive && self.persistence.is_persistent()
    }
}

///
/// ArrayCell
///
/// Descriptor plus big-endian element bytes. Integrity-sensitive cells keep
/// a checksum of `data` that every legitimate write refreshes.
///

#[derive(Clone, Debug)]
pub(crate) struct ArrayCell {
    pub(crate) descriptor: ArrayDescriptor,
    pub(crate) data: Vec<u8>,
    pub(crate) checksum: Option<u64>,
}

impl ArrayCell {
    pub(crate) fn zeroed(descriptor: ArrayDescriptor) -> Self {
        let mut cell = Self {
            descriptor,
            data: vec![0; descriptor.byte_len()],
            checksum: None,
        };
        cell.refresh_checksum();

        cell
    }

    pub(crate) fn refresh_checksum(&mut self) {
        if self.descriptor.integrity_sensitive {
            self.checksum = Some(xxh3_64(&self.data));
        }
    }

    /// Return true when stored bytes still match the recorded checksum.
    pub(crate) fn integrity_intact(&self) -> bool {
        self.checksum
            .is_none_or(|checksum| checksum == xxh3_64(&self.data))
    }
}
