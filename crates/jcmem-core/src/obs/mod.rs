//! Observability: runtime telemetry (metrics) and sink abstractions.
//!
//! This module does not touch array storage. Runtime code reports through
//! `sink::record` only.

pub(crate) mod metrics;
pub(crate) mod sink;

// re-exports
pub use metrics::{EventOps, EventReport, EventState, OperationCounters};
pub use sink::{
    AbortCause, ArrayOpKind, MetricsEvent, MetricsSink, metrics_report, metrics_reset_all,
    with_metrics_sink,
};
