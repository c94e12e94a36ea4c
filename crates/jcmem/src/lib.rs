//! ## Crate layout
//! - `core`: card runtime, transaction manager, generic array engine,
//!   integrity-sensitive arrays, biometric bookkeeping and observability.
//! - `primitives`: element kinds, persistence classes and card constants.
//!
//! The `prelude` module mirrors the surface a card simulator drives.

pub use jcmem_core as core;
pub use jcmem_primitives as primitives;

pub use jcmem_core::{
    error::{CardError, ErrorClass},
    runtime::CardRuntime,
};

/// re-exports
///
/// hosts that persist metrics reports or configs can use these without
/// naming serde in their own Cargo.toml
pub mod __reexports {
    pub use serde;
}

//
// Consts
//

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

///
/// Prelude
///

pub mod prelude {
    pub use crate::core::prelude::*;
    pub use crate::core::{
        bio::{MATCH_NEEDS_MORE_DATA, MINIMUM_SUCCESSFUL_MATCH_SCORE, MatchOutcome},
        error::ErrorDetail,
        obs::{metrics_report, metrics_reset_all},
        util::{make_int, make_int_from_bytes, make_short},
    };
}

///
/// TESTS
///
