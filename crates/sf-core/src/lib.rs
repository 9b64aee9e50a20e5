//! sf-core: stable foundation for simflow.
//!
//! Contains:
//! - ids (string identifiers for simulations, parameters, nodes, runs)
//! - value (parameter value maps + JSON coercion helpers)
//! - timing (injectable clock)
//! - error (shared error types)

pub mod error;
pub mod ids;
pub mod timing;
pub mod value;

// Re-exports: nice ergonomics for downstream crates
pub use error::{SfError, SfResult};
pub use ids::*;
pub use timing::{Clock, ManualClock, SystemClock};
pub use value::*;
