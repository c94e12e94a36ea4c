//! `CardRuntime`: the context object applets call into.
//!
//! One runtime is one simulated card session. It owns the array store and
//! the transaction manager; nothing here is process-global, so tests can run
//! several cards side by side.


use crate::{
    array::{self, Atomicity},
    config::CardConfig,
    error::{CardError, ErrorOrigin, SystemReason},
    image,
    memory::CardMemory,
    sensitive,
    store::{ArrayDescriptor, ArrayRef},
    util,
};
use jcmem_primitives::{ElementKind, PersistenceClass};

///
/// CardRuntime
///

pub struct CardRuntime {
    config: CardConfig,
    memory: CardMemory,
}

impl CardRuntime {
    /// Start a fresh card with empty memory.
    pub fn new(config: CardConfig) -> Result<Self, CardError> {
        config.validate()?;
        let memory = CardMemory::new(&config);

        Ok(Self { config, memory })
    }

    /// Power a card up from a persistent image, running recovery.
    pub fn restore(config: CardConfig, image: &[u8]) -> Result<Self, CardError> {
        config.validate()?;
        let memory = image::restore(&config, image)?;

        Ok(Self { config, memory })
    }

    #[must_use]
    pub const fn config(&self) -> &CardConfig {
        &self.config
    }

    pub(crate) const fn memory(&self) -> &CardMemory {
        &self.memory
    }

    pub(crate) const fn memory_mut(&mut self) -> &mut CardMemory {
        &mut self.memory
    }

    // ======================================================================
    // Transactions
    // ======================================================================

    pub fn begin_transaction(&mut self) -> Result<(), CardError> {
        self.memory.begin()
    }

    pub fn commit_transaction(&mut self) -> Result<(), CardError> {
        self.memory.commit()
    }

    pub fn abort_transaction(&mut self) -> Result<(), CardError> {
        self.memory.abort()
    }

    /// 1 while a transaction is in progress, else 0.
    #[must_use]
    pub const fn transaction_depth(&self) -> u8 {
        self.memory.txn.depth()
    }

    /// Remaining commit capacity in bytes, clamped to the `short` range.
    #[must_use]
    pub fn unused_commit_capacity(&self) -> i16 {
        clamp_short(self.memory.txn.unused_capacity())
    }

    #[must_use]
    pub fn max_commit_capacity(&self) -> i16 {
        clamp_short(self.memory.txn.max_capacity())
    }

    #[must_use]
    pub const fn unused_commit_capacity_extended(&self) -> u32 {
        self.memory.txn.unused_capacity()
    }

    // ======================================================================
    // Allocation
    // ======================================================================

    pub fn make_persistent_array(&mut self, kind: ElementKind, length: i16) -> Result<ArrayRef, CardError> {
        let length = array_length(length)?;

        self.memory
            .store
            .allocate(kind, length, PersistenceClass::Persistent, false)
    }

    /// Allocate a transient array cleared on `event` (`CLEAR_ON_RESET` or
    /// `CLEAR_ON_DESELECT`).
    pub fn make_transient_array(
        &mut self,
        kind: ElementKind,
        length: i16,
        event: u8,
    ) -> Result<ArrayRef, CardError> {
        let persistence = PersistenceClass::from_event(event).ok_or_else(|| {
            CardError::system(
                ErrorOrigin::Store,
                SystemReason::IllegalValue,
                format!("unknown transient event {event}"),
            )
        })?;
        if !kind.supports_transient() {
            return Err(CardError::system(
                ErrorOrigin::Store,
                SystemReason::IllegalValue,
                format!("{kind:?} arrays cannot be transient"),
            ));
        }
        let length = array_length(length)?;

        self.memory.store.allocate(kind, length, persistence, false)
    }

    // ======================================================================
    // Element access
    // ======================================================================

    /// Read one element, sign-extended from its storage width.
    pub fn get_element(&self, array: ArrayRef, index: i16) -> Result<i32, CardError> {
        let (descriptor, start) = self.element_slot(array, index, 1)?;
        let width = descriptor.kind.width();
        let bytes = self.memory.store.read(array, start, width)?;

        Ok(decode_element(descriptor.kind, &bytes))
    }

    /// Write one element, truncated to its storage width. Joins an open
    /// transaction.
    pub fn set_element(&mut self, array: ArrayRef, index: i16, value: i32) -> Result<(), CardError> {
        let (descriptor, start) = self.element_slot(array, index, 1)?;
        let bytes = encode_element(descriptor.kind, value);

        self.memory.write_participating(array, start, &bytes)
    }

    /// Write `values` from index 0. Joins an open transaction.
    pub fn load_elements(&mut self, array: ArrayRef, values: &[i32]) -> Result<(), CardError> {
        let count = i16::try_from(values.len()).map_err(|_| {
            CardError::index_out_of_bounds(ErrorOrigin::Store, "element list exceeds short range")
        })?;
        let (descriptor, _) = self.element_slot(array, 0, count)?;
        if values.is_empty() {
            return Ok(());
        }

        let bytes: Vec<u8> = values
            .iter()
            .flat_map(|value| encode_element(descriptor.kind, *value))
            .collect();

        self.memory.write_participating(array, 0, &bytes)
    }

    pub fn elements(&self, array: ArrayRef) -> Result<Vec<i32>, CardError> {
        let descriptor = self.descriptor(array)?;
        let bytes = self.memory.store.read(array, 0, descriptor.byte_len())?;

        Ok(bytes
            .chunks_exact(descriptor.kind.width())
            .map(|chunk| decode_element(descriptor.kind, chunk))
            .collect())
    }

    /// Raw big-endian storage bytes.
    pub fn raw_bytes(&self, array: ArrayRef) -> Result<Vec<u8>, CardError> {
        let descriptor = self.descriptor(array)?;

        self.memory.store.read(array, 0, descriptor.byte_len())
    }

    // Validate `[index, index + count)` and return the byte offset of `index`.
    fn element_slot(
        &self,
        array: ArrayRef,
        index: i16,
        count: i16,
    ) -> Result<(ArrayDescriptor, usize), CardError> {
        let descriptor = self.descriptor(array)?;
        let start = usize::try_from(index).ok();
        let count = usize::try_from(count).ok();

        match (start, count) {
            (Some(start), Some(count)) if start + count <= descriptor.length => {
                Ok((descriptor, start * descriptor.kind.width()))
            }
            _ => Err(CardError::index_out_of_bounds(
                ErrorOrigin::Store,
                format!(
                    "index {index} (+{count:?}) outside {array} of length {}",
                    descriptor.length
                ),
            )),
        }
    }

    // ======================================================================
    // Queries and events
    // ======================================================================

    pub fn descriptor(&self, array: ArrayRef) -> Result<ArrayDescriptor, CardError> {
        self.memory.store.descriptor(array, ErrorOrigin::Store)
    }

    /// `CLEAR_ON_RESET`, `CLEAR_ON_DESELECT` or `NOT_A_TRANSIENT_OBJECT`.
    pub fn is_transient(&self, array: ArrayRef) -> Result<u8, CardError> {
        Ok(self.descriptor(array)?.persistence.event_code())
    }

    /// Bytes available in one memory pool, clamped to the `short` range.
    pub fn available_memory(&self, memory_type: u8) -> Result<i16, CardError> {
        Ok(clamp_short(self.available_memory_extended(memory_type)?))
    }

    pub fn available_memory_extended(&self, memory_type: u8) -> Result<u32, CardError> {
        let persistence = PersistenceClass::from_memory_type(memory_type).ok_or_else(|| {
            CardError::system(
                ErrorOrigin::Store,
                SystemReason::IllegalValue,
                format!("unknown memory type {memory_type}"),
            )
        })?;

        Ok(self.memory.store.pool(persistence).available())
    }

    /// Card reset: roll back any open transaction and zero every transient
    /// array. Returns the number of arrays cleared.
    pub fn clear_on_reset(&mut self) -> Result<u64, CardError> {
        self.memory.reset()
    }

    /// Applet deselection: zero `CLEAR_ON_DESELECT` arrays.
    pub fn clear_on_deselect(&mut self) -> u64 {
        self.memory.deselect()
    }

    // ======================================================================
    // Generic array engine
    // ======================================================================

    pub fn array_copy_repack(
        &mut self,
        src: ArrayRef,
        src_off: i16,
        src_len: i16,
        dest: ArrayRef,
        dest_off: i16,
    ) -> Result<i16, CardError> {
        array::copy_repack(
            &mut self.memory,
            src,
            src_off,
            src_len,
            dest,
            dest_off,
            Atomicity::Atomic,
        )
    }

    pub fn array_copy_repack_non_atomic(
        &mut self,
        src: ArrayRef,
        src_off: i16,
        src_len: i16,
        dest: ArrayRef,
        dest_off: i16,
    ) -> Result<i16, CardError> {
        array::copy_repack(
            &mut self.memory,
            src,
            src_off,
            src_len,
            dest,
            dest_off,
            Atomicity::NonAtomic,
        )
    }

    pub fn array_fill_generic(
        &mut self,
        array: ArrayRef,
        off: i16,
        len: i16,
        val_array: ArrayRef,
        val_off: i16,
    ) -> Result<i16, CardError> {
        array::fill_generic(
            &mut self.memory,
            array,
            off,
            len,
            val_array,
            val_off,
            Atomicity::Atomic,
        )
    }

    pub fn array_fill_generic_non_atomic(
        &mut self,
        array: ArrayRef,
        off: i16,
        len: i16,
        val_array: ArrayRef,
        val_off: i16,
    ) -> Result<i16, CardError> {
        array::fill_generic(
            &mut self.memory,
            array,
            off,
            len,
            val_array,
            val_off,
            Atomicity::NonAtomic,
        )
    }

    pub fn array_compare_generic(
        &self,
        src: ArrayRef,
        src_off: i16,
        dest: ArrayRef,
        dest_off: i16,
        length: i16,
    ) -> Result<i8, CardError> {
        array::compare_generic(&self.memory, src, src_off, dest, dest_off, length)
    }

    pub fn array_find_generic(
        &self,
        array: ArrayRef,
        off: i16,
        val_array: ArrayRef,
        val_off: i16,
    ) -> Result<i16, CardError> {
        array::find_generic(&self.memory, array, off, val_array, val_off)
    }

    // ======================================================================
    // Integrity-sensitive arrays
    // ======================================================================

    pub fn make_integrity_sensitive_array(
        &mut self,
        kind: ElementKind,
        memory_type: u8,
        length: i16,
    ) -> Result<ArrayRef, CardError> {
        sensitive::make_array(
            &mut self.memory,
            self.config.integrity_sensitive_supported,
            kind,
            memory_type,
            length,
        )
    }

    pub fn is_integrity_sensitive(&self, array: ArrayRef) -> Result<bool, CardError> {
        sensitive::is_sensitive(&self.memory, array)
    }

    pub fn assert_integrity(&self, array: ArrayRef) -> Result<(), CardError> {
        sensitive::assert_integrity(&self.memory, array)
    }

    pub fn clear_array(&mut self, array: ArrayRef) -> Result<(), CardError> {
        sensitive::clear_array(&mut self.memory, array)
    }

    // ======================================================================
    // Byte packing
    // ======================================================================

    pub fn get_short(&self, array: ArrayRef, off: i16) -> Result<i16, CardError> {
        util::get_short(&self.memory, array, off)
    }

    pub fn set_short(&mut self, array: ArrayRef, off: i16, value: i16) -> Result<i16, CardError> {
        util::set_short(&mut self.memory, array, off, value)
    }

    pub fn get_int(&self, array: ArrayRef, off: i16) -> Result<i32, CardError> {
        util::get_int(&self.memory, array, off)
    }

    pub fn set_int(&mut self, array: ArrayRef, off: i16, value: i32) -> Result<i16, CardError> {
        util::set_int(&mut self.memory, array, off, value)
    }

    // ======================================================================
    // Simulation hooks
    // ======================================================================

    /// Arm a card tear that fires after `bytes` more bytes are written.
    pub const fn inject_power_loss_after(&mut self, bytes: u64) {
        self.memory.store.arm_tear(bytes);
    }

    /// Flip bits in storage without refreshing integrity checksums.
    pub fn inject_bit_flip(&mut self, array: ArrayRef, byte: usize, mask: u8) -> Result<(), CardError> {
        self.memory.store.flip_bits(array, byte, mask)
    }

    /// Serialize persistent state, including any pending undo log.
    pub fn persistent_image(&self) -> Result<Vec<u8>, CardError> {
        image::capture(&self.memory)
    }
}

impl Default for CardRuntime {
    fn default() -> Self {
        let config = CardConfig::default();
        let memory = CardMemory::new(&config);

        Self { config, memory }
    }
}

fn clamp_short(value: u32) -> i16 {
    i16::try_from(value).unwrap_or(i16::MAX)
}

fn array_length(length: i16) -> Result<usize, CardError> {
    usize::try_from(length).map_err(|_| {
        CardError::system(
            ErrorOrigin::Store,
            SystemReason::IllegalValue,
            format!("negative array length {length}"),
        )
    })
}

fn decode_element(kind: ElementKind, bytes: &[u8]) -> i32 {
    let raw = array::assemble_be(bytes);
    match kind {
        ElementKind::Boolean | ElementKind::Byte => i32::from(raw as u8 as i8),
        ElementKind::Short => i32::from(raw as u16 as i16),
        ElementKind::Int | ElementKind::Object => raw as i32,
    }
}

fn encode_element(kind: ElementKind, value: i32) -> Vec<u8> {
    array::split_be(value as u32, kind.width())
}
