//! Transaction manager: the two-state (idle / in progress) commit protocol.
//!
//! Contract:
//! - Only one transaction is open at a time; nesting is rejected, not queued.
//! - Every persistent write made inside a transaction is preceded by an undo
//!   entry in the commit log. The log is the recovery authority: rolling it
//!   back in reverse order restores the pre-transaction store exactly.
//! - Commit discards the log; abort, overflow and power loss roll it back.
//! - Transient arrays and unconditional (security counter) writes never
//!   enter the log.

mod log;
mod rollback;
#[cfg(test)]
mod tests;

pub(crate) use log::{CommitLog, UndoEntry};
pub(crate) use rollback::rollback_reverse;

use crate::{
    config::CardConfig,
    error::{CardError, TransactionReason},
    store::ArrayRef,
};

///
/// TxnState
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum TxnState {
    Idle,
    /// Opened by `begin_transaction`.
    Explicit,
    /// Opened around a single atomic engine operation.
    Implicit,
}

///
/// CommitSummary
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct CommitSummary {
    pub(crate) entries: u64,
    pub(crate) bytes: u64,
}

///
/// TransactionManager
///

#[derive(Clone, Debug)]
pub(crate) struct TransactionManager {
    state: TxnState,
    log: CommitLog,
}

impl TransactionManager {
    pub(crate) const fn new(config: &CardConfig) -> Self {
        Self {
            state: TxnState::Idle,
            log: CommitLog::new(config.commit_capacity, config.commit_entry_overhead),
        }
    }

    pub(crate) const fn state(&self) -> TxnState {
        self.state
    }

    pub(crate) const fn is_idle(&self) -> bool {
        matches!(self.state, TxnState::Idle)
    }

    /// Card-visible depth: 1 while a transaction is open, else 0.
    pub(crate) const fn depth(&self) -> u8 {
        match self.state {
            TxnState::Idle => 0,
            TxnState::Explicit | TxnState::Implicit => 1,
        }
    }

    pub(crate) const fn unused_capacity(&self) -> u32 {
        self.log.unused()
    }

    pub(crate) const fn max_capacity(&self) -> u32 {
        self.log.max()
    }

    pub(crate) const fn log(&self) -> &CommitLog {
        &self.log
    }

    // ======================================================================
    // Lifecycle
    // ======================================================================

    pub(crate) fn begin(&mut self) -> Result<(), CardError> {
        if !self.is_idle() {
            return Err(CardError::transaction(
                TransactionReason::InProgress,
                "transaction already in progress",
            ));
        }

        debug_assert_eq!(self.log.len(), 0, "idle transaction manager with non-empty log");
        self.state = TxnState::Explicit;

        Ok(())
    }

    pub(crate) fn begin_implicit(&mut self) {
        debug_assert!(self.is_idle(), "implicit transaction opened over an open one");
        self.state = TxnState::Implicit;
    }

    /// Close the open transaction, keeping every logged write.
    pub(crate) fn commit(&mut self) -> Result<CommitSummary, CardError> {
        if self.is_idle() {
            return Err(CardError::transaction(
                TransactionReason::NotInProgress,
                "commit without a transaction in progress",
            ));
        }

        let bytes = u64::from(self.log.used());
        let entries = self.log.take();
        self.state = TxnState::Idle;

        Ok(CommitSummary {
            entries: entries.len() as u64,
            bytes,
        })
    }

    /// Close the open transaction and hand back its undo entries for rollback.
    pub(crate) fn abort(&mut self) -> Result<Vec<UndoEntry>, CardError> {
        if self.is_idle() {
            return Err(CardError::transaction(
                TransactionReason::NotInProgress,
                "abort without a transaction in progress",
            ));
        }

        Ok(self.discard())
    }

    /// Drop to idle regardless of state (recovery path).
    pub(crate) fn discard(&mut self) -> Vec<UndoEntry> {
        self.state = TxnState::Idle;
        self.log.take()
    }

    // ======================================================================
    // Logging
    // ======================================================================

    /// Record a before-image, failing with BUFFER_FULL when it does not fit.
    ///
    /// A rejected entry leaves the log untouched.
    pub(crate) fn log_before_image(
        &mut self,
        array: ArrayRef,
        offset: usize,
        before: Vec<u8>,
    ) -> Result<u64, CardError> {
        debug_assert!(!self.is_idle(), "undo entry logged outside a transaction");

        let cost = self.log.entry_cost(before.len());
        if !self.log.fits(before.len()) {
            return Err(CardError::transaction(
                TransactionReason::BufferFull,
                format!(
                    "commit capacity exceeded: entry needs {cost} bytes, {} of {} unused",
                    self.log.unused(),
                    self.log.max()
                ),
            ));
        }

        self.log.push(UndoEntry {
            array,
            offset,
            before,
        });

        Ok(cost)
    }
}
