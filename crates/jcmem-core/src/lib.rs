//! Core runtime for jcmem: the transactional card memory manager and the
//! generic array engine, plus the integrity, byte-packing and biometric
//! bookkeeping that sit on top of them.
#![warn(unreachable_pub)]

pub(crate) mod array;
pub(crate) mod image;
pub(crate) mod memory;
pub(crate) mod sensitive;
pub(crate) mod txn;

// public exports are one module level down
pub mod bio;
pub mod config;
pub mod error;
pub mod obs;
pub mod runtime;
pub mod serialize;
pub mod store;
pub mod util;

pub use image::IMAGE_FORMAT_VERSION;

///
/// Prelude
///
/// Domain vocabulary for applet-facing code: the runtime, array handles and
/// the error surface they report through.
///

pub mod prelude {
    pub use crate::{
        bio::{BioTemplate, OwnerBioTemplate},
        config::CardConfig,
        error::{CardError, ErrorClass},
        runtime::CardRuntime,
        store::{ArrayDescriptor, ArrayRef},
    };
    pub use jcmem_primitives::{
        CLEAR_ON_DESELECT, CLEAR_ON_RESET, ElementKind, MEMORY_TYPE_PERSISTENT,
        MEMORY_TYPE_TRANSIENT_DESELECT, MEMORY_TYPE_TRANSIENT_RESET, NOT_A_TRANSIENT_OBJECT,
    };
}
