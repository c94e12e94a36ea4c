//! Array storage: descriptors, raw big-endian element bytes, memory pools.
//!
//! The store is the byte-addressable backing for every card array. It knows
//! nothing about transactions; callers decide whether a write is logged.

mod cell;
#[cfg(test)]
mod tests;

pub use cell::ArrayDescriptor;
pub(crate) use cell::ArrayCell;

use crate::{
    config::CardConfig,
    error::{CardError, ErrorOrigin, SystemReason, UtilReason},
};
use derive_more::Display;
use jcmem_primitives::{ElementKind, MAX_ARRAY_LENGTH, PersistenceClass};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

///
/// ArrayRef
///
/// Opaque reference to a card array. `ArrayRef::NULL` is the null reference.
///

#[derive(
    Clone, Copy, Debug, Deserialize, Display, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
#[display("#{_0}")]
pub struct ArrayRef(u32);

impl ArrayRef {
    pub const NULL: Self = Self(0);

    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn id(self) -> u32 {
        self.0
    }
}

///
/// PoolUsage
///
/// Bytes charged against one memory pool.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub(crate) struct PoolUsage {
    pub(crate) used: u32,
    pub(crate) capacity: u32,
}

impl PoolUsage {
    const fn new(capacity: u32) -> Self {
        Self { used: 0, capacity }
    }

    pub(crate) const fn available(self) -> u32 {
        self.capacity.saturating_sub(self.used)
    }
}

///
/// ArrayStore
///

pub(crate) struct ArrayStore {
    cells: BTreeMap<ArrayRef, ArrayCell>,

    /// Next reference to hand out; `None` once the id space is spent.
    next_id: Option<u32>,
    persistent: PoolUsage,
    transient_reset: PoolUsage,
    transient_deselect: PoolUsage,

    /// Remaining byte writes before a simulated tear; `None` when disarmed.
    tear_budget: Option<u64>,
}

impl ArrayStore {
    pub(crate) fn new(config: &CardConfig) -> Self {
        Self {
            cells: BTreeMap::new(),
            next_id: Some(1),
            persistent: PoolUsage::new(config.persistent_capacity),
            transient_reset: PoolUsage::new(config.transient_reset_capacity),
            transient_deselect: PoolUsage::new(config.transient_deselect_capacity),
            tear_budget: None,
        }
    }

    // ======================================================================
    // Allocation
    // ======================================================================

    /// Allocate a zero-filled array and charge its payload to the matching pool.
    pub(crate) fn allocate(
        &mut self,
        kind: ElementKind,
        length: usize,
        persistence: PersistenceClass,
        integrity_sensitive: bool,
    ) -> Result<ArrayRef, CardError> {
        if length > MAX_ARRAY_LENGTH {
            return Err(CardError::system(
                ErrorOrigin::Store,
                SystemReason::IllegalValue,
                format!("array length {length} exceeds {MAX_ARRAY_LENGTH}"),
            ));
        }

        let bytes = u32::try_from(length * kind.width()).map_err(|_| {
            CardError::system(
                ErrorOrigin::Store,
                SystemReason::NoResource,
                "array payload does not fit the memory model",
            )
        })?;

        let array = self.free_reference()?;

        let pool = self.pool_mut(persistence);
        if bytes > pool.available() {
            let reason = if persistence.is_persistent() {
                SystemReason::NoResource
            } else {
                SystemReason::NoTransientSpace
            };
            return Err(CardError::system(
                ErrorOrigin::Store,
                reason,
                format!(
                    "{persistence:?} pool exhausted: requested {bytes} bytes, {} available",
                    pool.available()
                ),
            ));
        }
        pool.used += bytes;
        self.next_id = array.0.checked_add(1);

        let descriptor = ArrayDescriptor {
            kind,
            length,
            persistence,
            integrity_sensitive,
        };
        self.cells.insert(array, ArrayCell::zeroed(descriptor));

        Ok(array)
    }

    // Reference the next allocation will use, never one already in the table.
    fn free_reference(&self) -> Result<ArrayRef, CardError> {
        let array = self.next_id.map(ArrayRef).ok_or_else(|| {
            CardError::system(
                ErrorOrigin::Store,
                SystemReason::NoResource,
                "array reference space exhausted",
            )
        })?;
        if self.cells.contains_key(&array) {
            return Err(CardError::system(
                ErrorOrigin::Store,
                SystemReason::NoResource,
                format!("array reference {array} is already in use"),
            ));
        }

        Ok(array)
    }

    const fn pool_mut(&mut self, persistence: PersistenceClass) -> &mut PoolUsage {
        match persistence {
            PersistenceClass::Persistent => &mut self.persistent,
            PersistenceClass::TransientReset => &mut self.transient_reset,
            PersistenceClass::TransientDeselect => &mut self.transient_deselect,
        }
    }

    pub(crate) const fn pool(&self, persistence: PersistenceClass) -> PoolUsage {
        match persistence {
            PersistenceClass::Persistent => self.persistent,
            PersistenceClass::TransientReset => self.transient_reset,
            PersistenceClass::TransientDeselect => self.transient_deselect,
        }
    }

    // ======================================================================
    // Lookup
    // ======================================================================

    /// Resolve a reference, rejecting null and unknown handles.
    pub(crate) fn cell(&self, array: ArrayRef, origin: ErrorOrigin) -> Result<&ArrayCell, CardError> {
        if array.is_null() {
            return Err(CardError::null_pointer(origin, "null array reference"));
        }

        self.cells.get(&array).ok_or_else(|| {
            CardError::util(
                origin,
                UtilReason::IllegalValue,
                format!("{array} is not an array reference"),
            )
        })
    }

    fn cell_mut(&mut self, array: ArrayRef) -> Result<&mut ArrayCell, CardError> {
        if array.is_null() {
            return Err(CardError::null_pointer(ErrorOrigin::Store, "null array reference"));
        }

        self.cells.get_mut(&array).ok_or_else(|| {
            CardError::util(
                ErrorOrigin::Store,
                UtilReason::IllegalValue,
                format!("{array} is not an array reference"),
            )
        })
    }

    pub(crate) fn descriptor(
        &self,
        array: ArrayRef,
        origin: ErrorOrigin,
    ) -> Result<ArrayDescriptor, CardError> {
        Ok(self.cell(array, origin)?.descriptor)
    }

    /// Copy `len` raw bytes starting at byte offset `offset`.
    pub(crate) fn read(&self, array: ArrayRef, offset: usize, len: usize) -> Result<Vec<u8>, CardError> {
        let cell = self.cell(array, ErrorOrigin::Store)?;
        let end = checked_end(offset, len, cell.data.len())?;

        Ok(cell.data[offset..end].to_vec())
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (ArrayRef, &ArrayCell)> {
        self.cells.iter().map(|(array, cell)| (*array, cell))
    }

    // ======================================================================
    // Mutation
    // ======================================================================

    /// Write bytes subject to the armed tear budget.
    ///
    /// A tear applies the leading part of `bytes` that fits the budget and
    /// reports `PowerLoss`; callers must run recovery before continuing.
    pub(crate) fn write(&mut self, array: ArrayRef, offset: usize, bytes: &[u8]) -> Result<(), CardError> {
        let allowed = match self.tear_budget {
            Some(budget) if budget < bytes.len() as u64 => {
                self.tear_budget = Some(0);
                Some(budget as usize)
            }
            Some(budget) => {
                self.tear_budget = Some(budget - bytes.len() as u64);
                None
            }
            None => None,
        };

        match allowed {
            Some(prefix) => {
                self.write_untorn(array, offset, &bytes[..prefix])?;
                self.tear_budget = None;
                Err(CardError::power_loss(
                    ErrorOrigin::Store,
                    format!("card tear after {prefix} of {} bytes written to {array}", bytes.len()),
                ))
            }
            None => self.write_untorn(array, offset, bytes),
        }
    }

    /// Write bytes ignoring the tear budget (recovery and image restore).
    pub(crate) fn write_untorn(
        &mut self,
        array: ArrayRef,
        offset: usize,
        bytes: &[u8],
    ) -> Result<(), CardError> {
        let cell = self.cell_mut(array)?;
        let end = checked_end(offset, bytes.len(), cell.data.len())?;
        cell.data[offset..end].copy_from_slice(bytes);
        cell.refresh_checksum();

        Ok(())
    }

    /// Zero the contents of every transient array matching `clear`.
    pub(crate) fn clear_transients(&mut self, clear: impl Fn(PersistenceClass) -> bool) -> u64 {
        let mut cleared = 0u64;
        for cell in self.cells.values_mut() {
            let persistence = cell.descriptor.persistence;
            if persistence.is_transient() && clear(persistence) {
                cell.data.fill(0);
                cell.refresh_checksum();
                cleared += 1;
            }
        }

        cleared
    }

    // ======================================================================
    // Fault injection
    // ======================================================================

    pub(crate) const fn arm_tear(&mut self, bytes: u64) {
        self.tear_budget = Some(bytes);
    }

    pub(crate) const fn disarm_tear(&mut self) {
        self.tear_budget = None;
    }

    /// Flip bits in storage without refreshing the integrity checksum.
    pub(crate) fn flip_bits(&mut self, array: ArrayRef, byte: usize, mask: u8) -> Result<(), CardError> {
        let cell = self.cell_mut(array)?;
        let slot = cell.data.get_mut(byte).ok_or_else(|| {
            CardError::index_out_of_bounds(ErrorOrigin::Store, format!("byte {byte} outside {array}"))
        })?;
        *slot ^= mask;

        Ok(())
    }

    // ======================================================================
    // Image support
    // ======================================================================

    /// Re-insert a cell under its original reference while rebuilding from an image.
    pub(crate) fn adopt(&mut self, array: ArrayRef, cell: ArrayCell) -> Result<(), CardError> {
        if array.is_null() || self.cells.contains_key(&array) {
            return Err(CardError::system(
                ErrorOrigin::Image,
                SystemReason::IllegalValue,
                format!("duplicate or null array reference {array} in image"),
            ));
        }

        let bytes = u32::try_from(cell.data.len()).unwrap_or(u32::MAX);
        let pool = self.pool_mut(cell.descriptor.persistence);
        if bytes > pool.available() {
            return Err(CardError::system(
                ErrorOrigin::Image,
                SystemReason::NoResource,
                format!("image array {array} does not fit the configured pool"),
            ));
        }
        pool.used += bytes;

        self.next_id = match (self.next_id, array.0.checked_add(1)) {
            (Some(next), Some(after)) => Some(next.max(after)),
            _ => None,
        };
        self.cells.insert(array, cell);

        Ok(())
    }
}

/// Compute `offset + len`, rejecting ranges outside `limit`.
fn checked_end(offset: usize, len: usize, limit: usize) -> Result<usize, CardError> {
    offset
        .checked_add(len)
        .filter(|end| *end <= limit)
        .ok_or_else(|| {
            CardError::index_out_of_bounds(
                ErrorOrigin::Store,
                format!("byte range {offset}+{len} outside array of {limit} bytes"),
            )
        })
}
