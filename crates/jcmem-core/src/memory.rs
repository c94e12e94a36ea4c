//! Trusted write boundary between the array engine and storage.
//!
//! Every mutation of card memory goes through one of four lanes:
//! - atomic: logged as a single unit, opening an implicit transaction when
//!   none is in progress;
//! - participating: logged only while a transaction is open;
//! - direct: never logged (non-atomic engine variants);
//! - unconditional: never logged, even inside a transaction (security
//!   counters).
//!
//! Transient arrays are written directly on every lane.

use crate::{
    config::CardConfig,
    error::{CardError, ErrorClass, ErrorOrigin},
    obs::sink::{self, AbortCause, MetricsEvent},
    store::{ArrayRef, ArrayStore},
    txn::{TransactionManager, TxnState, UndoEntry, rollback_reverse},
};
use jcmem_primitives::PersistenceClass;

///
/// CardMemory
///

pub(crate) struct CardMemory {
    pub(crate) store: ArrayStore,
    pub(crate) txn: TransactionManager,
    debug: bool,
}

impl CardMemory {
    pub(crate) fn new(config: &CardConfig) -> Self {
        Self {
            store: ArrayStore::new(config),
            txn: TransactionManager::new(config),
            debug: config.debug,
        }
    }

    pub(crate) const fn from_parts(store: ArrayStore, txn: TransactionManager, debug: bool) -> Self {
        Self { store, txn, debug }
    }

    pub(crate) fn debug_log(&self, s: impl Into<String>) {
        if self.debug {
            println!("[debug] {}", s.into());
        }
    }

    // ======================================================================
    // Transaction lifecycle
    // ======================================================================

    pub(crate) fn begin(&mut self) -> Result<(), CardError> {
        self.txn.begin()?;
        sink::record(MetricsEvent::TxnBegin { implicit: false });
        self.debug_log("transaction begin");

        Ok(())
    }

    pub(crate) fn commit(&mut self) -> Result<(), CardError> {
        let implicit = self.txn.state() == TxnState::Implicit;
        let summary = self.txn.commit()?;
        sink::record(MetricsEvent::TxnCommit {
            implicit,
            entries: summary.entries,
            bytes: summary.bytes,
        });
        if !implicit {
            self.debug_log(format!(
                "transaction commit: {} undo entries, {} bytes",
                summary.entries, summary.bytes
            ));
        }

        Ok(())
    }

    pub(crate) fn abort(&mut self) -> Result<(), CardError> {
        let entries = self.txn.abort()?;
        self.roll_back(entries, AbortCause::Explicit)
    }

    // Restore a drained log and report the abort.
    fn roll_back(
        &mut self,
        entries: Vec<UndoEntry>,
        cause: AbortCause,
    ) -> Result<(), CardError> {
        let count = entries.len() as u64;
        rollback_reverse(&mut self.store, entries)?;
        sink::record(MetricsEvent::TxnAbort {
            cause,
            entries: count,
        });
        self.debug_log(format!("transaction rolled back ({cause:?}): {count} undo entries"));

        Ok(())
    }

    // Roll back whatever is open, explicit or implicit.
    fn roll_back_open(&mut self, cause: AbortCause) -> Result<(), CardError> {
        if self.txn.is_idle() {
            return Ok(());
        }
        let entries = self.txn.discard();

        self.roll_back(entries, cause)
    }

    // ======================================================================
    // Write lanes
    // ======================================================================

    /// Write `bytes` as one all-or-nothing unit.
    pub(crate) fn write_atomic(
        &mut self,
        array: ArrayRef,
        offset: usize,
        bytes: &[u8],
    ) -> Result<(), CardError> {
        if self.is_transient(array)? {
            return self.write_store(array, offset, bytes);
        }

        let implicit = self.txn.is_idle();
        if implicit {
            self.txn.begin_implicit();
            sink::record(MetricsEvent::TxnBegin { implicit: true });
        }

        let result = self.write_logged(array, offset, bytes);
        if !implicit {
            return result;
        }

        match result {
            Ok(()) => self.commit(),
            Err(err) => {
                if self.txn.state() == TxnState::Implicit {
                    self.roll_back_open(AbortCause::Explicit)?;
                }
                Err(err)
            }
        }
    }

    /// Write `bytes`, joining the open transaction if there is one.
    ///
    /// Outside a transaction, persistent integrity-sensitive arrays still
    /// take the atomic lane.
    pub(crate) fn write_participating(
        &mut self,
        array: ArrayRef,
        offset: usize,
        bytes: &[u8],
    ) -> Result<(), CardError> {
        let descriptor = self.store.descriptor(array, ErrorOrigin::Store)?;
        if descriptor.persistence.is_transient() {
            return self.write_store(array, offset, bytes);
        }
        if self.txn.is_idle() {
            if descriptor.requires_atomic_writes() {
                return self.write_atomic(array, offset, bytes);
            }
            return self.write_store(array, offset, bytes);
        }

        self.write_logged(array, offset, bytes)
    }

    /// Write `bytes` without any logging.
    pub(crate) fn write_direct(
        &mut self,
        array: ArrayRef,
        offset: usize,
        bytes: &[u8],
    ) -> Result<(), CardError> {
        self.write_store(array, offset, bytes)
    }

    /// Write `bytes` outside any open transaction. A later abort keeps them.
    pub(crate) fn write_unconditional(
        &mut self,
        array: ArrayRef,
        offset: usize,
        bytes: &[u8],
    ) -> Result<(), CardError> {
        if !self.txn.is_idle() {
            self.debug_log(format!("unconditional write to {array} inside transaction"));
        }

        self.write_store(array, offset, bytes)
    }

    // Log the before-image, then write. Requires an open transaction.
    fn write_logged(&mut self, array: ArrayRef, offset: usize, bytes: &[u8]) -> Result<(), CardError> {
        let before = self.store.read(array, offset, bytes.len())?;
        let unused = u64::from(self.txn.unused_capacity());

        match self.txn.log_before_image(array, offset, before) {
            Ok(cost) => sink::record(MetricsEvent::UndoLogged { bytes: cost }),
            Err(err) => {
                sink::record(MetricsEvent::CapacityExceeded {
                    requested: bytes.len() as u64,
                    unused,
                });
                self.debug_log(format!("commit capacity exceeded writing {array}: {err}"));
                self.roll_back_open(AbortCause::Overflow)?;
                return Err(err);
            }
        }

        self.write_store(array, offset, bytes)
    }

    // Store write with power-loss recovery on tear.
    fn write_store(&mut self, array: ArrayRef, offset: usize, bytes: &[u8]) -> Result<(), CardError> {
        match self.store.write(array, offset, bytes) {
            Err(err) if err.class == ErrorClass::PowerLoss => {
                self.recover_after_power_loss()?;
                Err(err)
            }
            other => other,
        }
    }

    fn is_transient(&self, array: ArrayRef) -> Result<bool, CardError> {
        Ok(self
            .store
            .descriptor(array, ErrorOrigin::Store)?
            .persistence
            .is_transient())
    }

    // ======================================================================
    // Card events
    // ======================================================================

    /// Simulated power-up after a tear: roll back, then reset transients.
    pub(crate) fn recover_after_power_loss(&mut self) -> Result<(), CardError> {
        sink::record(MetricsEvent::PowerLoss);
        self.debug_log("power loss: running recovery");
        self.store.disarm_tear();
        self.roll_back_open(AbortCause::PowerLoss)?;
        self.clear_transients(|_| true);

        Ok(())
    }

    /// Card reset: any open transaction is rolled back and all transient
    /// arrays are cleared.
    pub(crate) fn reset(&mut self) -> Result<u64, CardError> {
        self.roll_back_open(AbortCause::Reset)?;

        Ok(self.clear_transients(|_| true))
    }

    /// Applet deselection: CLEAR_ON_DESELECT arrays are cleared.
    pub(crate) fn deselect(&mut self) -> u64 {
        self.clear_transients(|class| class == PersistenceClass::TransientDeselect)
    }

    fn clear_transients(&mut self, clear: impl Fn(PersistenceClass) -> bool) -> u64 {
        let arrays = self.store.clear_transients(clear);
        sink::record(MetricsEvent::TransientClear { arrays });
        self.debug_log(format!("cleared {arrays} transient arrays"));

        arrays
    }
}
