//! Wire types and the error taxonomy shared between `master` and `worker`.
//!
//! Nothing in this crate performs I/O; it exists so both binaries agree on
//! the shape of the RPC surface described in spec section 6 without either
//! one depending on the other's internals.

pub mod constants;
pub mod error;
pub mod types;
pub mod worker_id;

pub use error::CoreError;
pub use types::*;
pub use worker_id::EncodedWorkerId;
