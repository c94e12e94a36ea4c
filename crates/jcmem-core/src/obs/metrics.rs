use serde::Serialize;
use std::{
    cell::RefCell,
    collections::BTreeMap,
    time::{SystemTime, UNIX_EPOCH},
};

///
/// EventState
/// Ephemeral, in-memory counters for transaction and array-engine activity.
///

#[derive(Clone, Debug, Serialize)]
pub struct EventState {
    pub ops: EventOps,
    pub operations: BTreeMap<String, OperationCounters>,
    pub since_ms: u64,
}

impl Default for EventState {
    fn default() -> Self {
        Self {
            ops: EventOps::default(),
            operations: BTreeMap::new(),
            since_ms: now_millis(),
        }
    }
}

///
/// EventOps
///

#[derive(Clone, Debug, Default, Serialize)]
pub struct EventOps {
    // Transaction lifecycle
    pub txn_begins: u64,
    pub txn_commits: u64,
    pub txn_aborts: u64,
    pub implicit_txns: u64,

    // Commit log
    pub undo_entries: u64,
    pub undo_bytes: u64,
    pub capacity_overflows: u64,

    // Card events
    pub power_losses: u64,
    pub transient_clears: u64,
    pub transient_arrays_cleared: u64,
}

///
/// OperationCounters
/// Per array-engine entry point.
///

#[derive(Clone, Debug, Default, Serialize)]
pub struct OperationCounters {
    pub calls: u64,
    pub elements: u64,
    pub failures: u64,
}

///
/// EventReport
/// Point-in-time copy handed to hosts and tests.
///

#[derive(Clone, Debug, Serialize)]
pub struct EventReport {
    pub ops: EventOps,
    pub operations: BTreeMap<String, OperationCounters>,
    pub since_ms: u64,
}

thread_local! {
    static EVENT_STATE: RefCell<EventState> = RefCell::new(EventState::default());
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
}

/// Borrow metrics immutably.
pub(crate) fn with_state<R>(f: impl FnOnce(&EventState) -> R) -> R {
    EVENT_STATE.with(|m| f(&m.borrow()))
}

/// Borrow metrics mutably.
pub(crate) fn with_state_mut<R>(f: impl FnOnce(&mut EventState) -> R) -> R {
    EVENT_STATE.with(|m| f(&mut m.borrow_mut()))
}

/// Reset all counters (useful in tests).
pub(crate) fn reset_all() {
    with_state_mut(|m| *m = EventState::default());
}

/// Snapshot current state.
pub(crate) fn report() -> EventReport {
    with_state(|m| EventReport {
        ops: m.ops.clone(),
        operations: m.operations.clone(),
        since_ms: m.since_ms,
    })
}
