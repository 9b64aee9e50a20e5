//! Content-based hashing for run IDs.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sf_core::ParameterValues;

/// Derive a run id from what was executed and when.
///
/// Parameter maps are ordered, so identical inputs hash identically.
pub fn compute_run_id(
    simulation_id: &str,
    parameter_values: &ParameterValues,
    executed_at: &DateTime<Utc>,
) -> String {
    let mut hasher = Sha256::new();

    hasher.update(simulation_id.as_bytes());

    let values_json = serde_json::to_string(parameter_values).unwrap_or_default();
    hasher.update(values_json.as_bytes());

    let stamp = executed_at.timestamp_nanos_opt().unwrap_or_default();
    hasher.update(stamp.to_le_bytes());

    let result = hasher.finalize();
    // 16 bytes is plenty for a session-local history.
    format!("{:x}", result)[..32].to_string()
}
