//! Worker identifiers: `<CODE>-<PINCODE>-<NNN>`.
//!
//! The sequence number is the count of workers already registered for the
//! same department and pincode, plus one. Counting and the later write are
//! separate round trips, so two creations racing in the same window can
//! both receive the same identifier.

use crate::error::Result;
use crate::store::{DataStore, WORKERS};
use crate::types::Department;

/// Field on each worker record that the counter matches on.
pub const COUNT_FIELD: &str = "department_pincode";

/// `"<department>_<pincode>"`, stored on every worker.
pub fn count_key(department: &Department, pincode: &str) -> String {
    format!("{}_{}", department.key(), pincode)
}

pub fn format_worker_id(department: &Department, pincode: &str, existing: usize) -> String {
    format!("{}-{}-{:03}", department.code(), pincode, existing + 1)
}

/// Count existing workers for the department/pincode pair and derive the
/// next identifier. Nothing is written.
pub async fn generate_worker_id(
    store: &dyn DataStore,
    department: &Department,
    pincode: &str,
) -> Result<String> {
    let key = count_key(department, pincode);
    let matches = store.query_equal(WORKERS, COUNT_FIELD, &key).await?;
    let existing = matches.as_object().map_or(0, |m| m.len());
    tracing::debug!(%key, existing, "counted workers for id");
    Ok(format_worker_id(department, pincode, existing))
}
