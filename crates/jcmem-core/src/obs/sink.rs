//! Metrics sink boundary.
//!
//! Runtime logic MUST NOT depend on obs::metrics directly.
//! All instrumentation flows through MetricsEvent and MetricsSink.

use crate::obs::metrics::{self, EventReport};
use std::cell::RefCell;

thread_local! {
    static SINK_OVERRIDE: RefCell<Option<*const dyn MetricsSink>> = RefCell::new(None);
}

///
/// ArrayOpKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ArrayOpKind {
    Copy,
    CopyNonAtomic,
    Fill,
    FillNonAtomic,
    Compare,
    Find,
}

impl ArrayOpKind {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Copy => "array_copy_repack",
            Self::CopyNonAtomic => "array_copy_repack_non_atomic",
            Self::Fill => "array_fill_generic",
            Self::FillNonAtomic => "array_fill_generic_non_atomic",
            Self::Compare => "array_compare_generic",
            Self::Find => "array_find_generic",
        }
    }
}

///
/// AbortCause
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AbortCause {
    Explicit,
    Overflow,
    PowerLoss,
    Reset,
}

///
/// MetricsEvent
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MetricsEvent {
    TxnBegin {
        implicit: bool,
    },
    TxnCommit {
        implicit: bool,
        entries: u64,
        bytes: u64,
    },
    TxnAbort {
        cause: AbortCause,
        entries: u64,
    },
    UndoLogged {
        bytes: u64,
    },
    CapacityExceeded {
        requested: u64,
        unused: u64,
    },
    ArrayOp {
        kind: ArrayOpKind,
        elements: u64,
    },
    ArrayOpFailed {
        kind: ArrayOpKind,
    },
    PowerLoss,
    TransientClear {
        arrays: u64,
    },
}

///
/// MetricsSink
///

pub trait MetricsSink {
    fn record(&self, event: MetricsEvent);
}

/// GlobalMetricsSink
/// Default thread-local sink that writes into global metrics state.
/// Acts as the concrete sink when no scoped override is installed.

pub(crate) struct GlobalMetricsSink;

impl MetricsSink for GlobalMetricsSink {
    fn record(&self, event: MetricsEvent) {
        match event {
            MetricsEvent::TxnBegin { implicit } => {
                metrics::with_state_mut(|m| {
                    m.ops.txn_begins = m.ops.txn_begins.saturating_add(1);
                    if implicit {
                        m.ops.implicit_txns = m.ops.implicit_txns.saturating_add(1);
                    }
                });
            }

            MetricsEvent::TxnCommit { .. } => {
                metrics::with_state_mut(|m| {
                    m.ops.txn_commits = m.ops.txn_commits.saturating_add(1);
                });
            }

            MetricsEvent::TxnAbort { cause, .. } => {
                metrics::with_state_mut(|m| {
                    m.ops.txn_aborts = m.ops.txn_aborts.saturating_add(1);
                    if cause == AbortCause::Overflow {
                        m.ops.capacity_overflows = m.ops.capacity_overflows.saturating_add(1);
                    }
                });
            }

            MetricsEvent::UndoLogged { bytes } => {
                metrics::with_state_mut(|m| {
                    m.ops.undo_entries = m.ops.undo_entries.saturating_add(1);
                    m.ops.undo_bytes = m.ops.undo_bytes.saturating_add(bytes);
                });
            }

            // Overflow counting happens on the abort that follows.
            MetricsEvent::CapacityExceeded { .. } => {}

            MetricsEvent::ArrayOp { kind, elements } => {
                metrics::with_state_mut(|m| {
                    let entry = m.operations.entry(kind.label().to_string()).or_default();
                    entry.calls = entry.calls.saturating_add(1);
                    entry.elements = entry.elements.saturating_add(elements);
                });
            }

            MetricsEvent::ArrayOpFailed { kind } => {
                metrics::with_state_mut(|m| {
                    let entry = m.operations.entry(kind.label().to_string()).or_default();
                    entry.calls = entry.calls.saturating_add(1);
                    entry.failures = entry.failures.saturating_add(1);
                });
            }

            MetricsEvent::PowerLoss => {
                metrics::with_state_mut(|m| {
                    m.ops.power_losses = m.ops.power_losses.saturating_add(1);
                });
            }

            MetricsEvent::TransientClear { arrays } => {
                metrics::with_state_mut(|m| {
                    m.ops.transient_clears = m.ops.transient_clears.saturating_add(1);
                    m.ops.transient_arrays_cleared =
                        m.ops.transient_arrays_cleared.saturating_add(arrays);
                });
            }
        }
    }
}

pub(crate) const GLOBAL_METRICS_SINK: GlobalMetricsSink = GlobalMetricsSink;

pub(crate) fn record(event: MetricsEvent) {
    let override_ptr = SINK_OVERRIDE.with(|cell| *cell.borrow());
    if let Some(ptr) = override_ptr {
        // SAFETY:
        // - `ptr` was produced from a live `&dyn MetricsSink` in `with_metrics_sink`,
        //   which restores the previous slot on every exit (including unwind).
        // - `record` is synchronous and never retains `ptr` past this call.
        // - Only a shared reference is materialized, matching the original borrow.
        unsafe { (&*ptr).record(event) };
    } else {
        GLOBAL_METRICS_SINK.record(event);
    }
}

/// Snapshot the current metrics state.
#[must_use]
pub fn metrics_report() -> EventReport {
    metrics::report()
}

/// Reset all metrics state.
pub fn metrics_reset_all() {
    metrics::reset_all();
}

/// Run a closure with a temporary metrics sink override.
pub fn with_metrics_sink<T>(sink: &dyn MetricsSink, f: impl FnOnce() -> T) -> T {
    struct Guard(Option<*const dyn MetricsSink>);

    impl Drop for Guard {
        fn drop(&mut self) {
            SINK_OVERRIDE.with(|cell| {
                *cell.borrow_mut() = self.0;
            });
        }
    }

    // SAFETY:
    // - The erased pointer is installed only for this dynamic scope; `Guard`
    //   restores the previous slot on all exits.
    // - `record` dereferences synchronously and never persists the pointer.
    let sink_ptr = unsafe { std::mem::transmute::<&dyn MetricsSink, *const dyn MetricsSink>(sink) };
    let prev = SINK_OVERRIDE.with(|cell| {
        let mut slot = cell.borrow_mut();
        slot.replace(sink_ptr)
    });
    let _guard = Guard(prev);

    f()
}
