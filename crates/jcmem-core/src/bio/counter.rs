use crate::{
    error::{BioReason, CardError},
    memory::CardMemory,
    store::ArrayRef,
};
use jcmem_primitives::{ElementKind, PersistenceClass};

const LIMIT_SLOT: usize = 0;
const REMAINING_SLOT: usize = 1;

///
/// TryCounter
///
/// Try limit and remaining tries of one template, kept in a two-byte
/// persistent array. Every update is unconditional: an aborted transaction
/// never restores spent tries.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct TryCounter {
    array: ArrayRef,
}

impl TryCounter {
    pub(crate) fn allocate(memory: &mut CardMemory, try_limit: u8) -> Result<Self, CardError> {
        check_limit(try_limit)?;

        let array = memory
            .store
            .allocate(ElementKind::Byte, 2, PersistenceClass::Persistent, false)?;
        let counter = Self { array };
        counter.store(memory, try_limit, try_limit)?;

        Ok(counter)
    }

    pub(crate) const fn array(self) -> ArrayRef {
        self.array
    }

    pub(crate) fn remaining(self, memory: &CardMemory) -> Result<u8, CardError> {
        Ok(memory.store.read(self.array, REMAINING_SLOT, 1)?[0])
    }

    pub(crate) fn limit(self, memory: &CardMemory) -> Result<u8, CardError> {
        Ok(memory.store.read(self.array, LIMIT_SLOT, 1)?[0])
    }

    pub(crate) fn is_blocked(self, memory: &CardMemory) -> Result<bool, CardError> {
        Ok(self.remaining(memory)? == 0)
    }

    /// Spend one try.
    pub(crate) fn record_failure(self, memory: &mut CardMemory) -> Result<u8, CardError> {
        let remaining = self.remaining(memory)?.saturating_sub(1);
        memory.write_unconditional(self.array, REMAINING_SLOT, &[remaining])?;

        Ok(remaining)
    }

    /// Restore the full try limit after a successful match.
    pub(crate) fn record_success(self, memory: &mut CardMemory) -> Result<(), CardError> {
        let limit = self.limit(memory)?;
        memory.write_unconditional(self.array, REMAINING_SLOT, &[limit])
    }

    pub(crate) fn reset_limit(self, memory: &mut CardMemory, try_limit: u8) -> Result<(), CardError> {
        check_limit(try_limit)?;

        self.store(memory, try_limit, try_limit)
    }

    fn store(self, memory: &mut CardMemory, limit: u8, remaining: u8) -> Result<(), CardError> {
        memory.write_unconditional(self.array, LIMIT_SLOT, &[limit, remaining])
    }
}

fn check_limit(try_limit: u8) -> Result<(), CardError> {
    if try_limit == 0 {
        return Err(CardError::bio(
            BioReason::IllegalValue,
            "try limit must be at least 1",
        ));
    }

    Ok(())
}
