//! Worker profile creation.
//!
//! Input is validated before anything touches the store. The duplicate
//! phone scan, the id count and the final write are separate round trips
//! and are not atomic.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{json, Map, Value};

use crate::error::{CivicError, Result};
use crate::ids::{count_key, generate_worker_id};
use crate::store::{worker_path, DataStore, WORKERS};
use crate::types::{Department, Worker};

static PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{10}$").expect("phone pattern is valid"));
static PINCODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{6}$").expect("pincode pattern is valid"));

/// Initial credential handed to the worker alongside their id.
pub const DEFAULT_WORKER_PASSWORD: &str = "12345678";

#[derive(Debug, Clone, Default)]
pub struct NewWorker {
    pub name: String,
    pub phone: String,
    pub department: String,
    pub pincode: String,
    pub location: Option<String>,
}

impl NewWorker {
    /// Field checks only; no store access.
    pub fn validate(&self) -> Result<Department> {
        if self.name.trim().is_empty() {
            return Err(CivicError::validation("name", "Name is required."));
        }
        if !PHONE.is_match(self.phone.trim()) {
            return Err(CivicError::validation(
                "phone",
                "Phone number must be exactly 10 digits.",
            ));
        }
        if self.department.trim().is_empty() {
            return Err(CivicError::validation("department", "Department is required."));
        }
        if !PINCODE.is_match(self.pincode.trim()) {
            return Err(CivicError::validation(
                "pincode",
                "Pincode must be exactly 6 digits.",
            ));
        }
        Ok(Department::parse(&self.department))
    }

    fn record(&self, department: &Department, worker_id: &str) -> Value {
        let pincode = self.pincode.trim();
        let mut body = Map::new();
        body.insert("name".into(), json!(self.name.trim()));
        body.insert("phone".into(), json!(self.phone.trim()));
        body.insert("department".into(), json!(department.display_name()));
        body.insert("pincode".into(), json!(pincode));
        body.insert("workerId".into(), json!(worker_id));
        body.insert("department_pincode".into(), json!(count_key(department, pincode)));
        body.insert("assignedIssueIds".into(), json!([]));
        body.insert("password".into(), json!(DEFAULT_WORKER_PASSWORD));
        if let Some(location) = self.location.as_deref().map(str::trim).filter(|l| !l.is_empty()) {
            body.insert("location".into(), json!(location));
        }
        Value::Object(body)
    }
}

fn phone_taken(workers: &Value, phone: &str) -> bool {
    workers.as_object().is_some_and(|all| {
        all.values().any(|w| match w.get("phone") {
            Some(Value::String(s)) => s.trim() == phone,
            Some(Value::Number(n)) => n.to_string() == phone,
            _ => false,
        })
    })
}

/// Validate, check for a duplicate phone, allocate an id and write the
/// record. Returns the record as read back from the store.
pub async fn create_worker(store: &dyn DataStore, input: &NewWorker) -> Result<Worker> {
    let department = input.validate()?;
    let phone = input.phone.trim();

    let existing = store
        .get(WORKERS)
        .await
        .map_err(|e| CivicError::WorkerCreation(Box::new(e)))?;
    if phone_taken(&existing, phone) {
        return Err(CivicError::DuplicatePhone(phone.to_string()));
    }

    let worker_id = generate_worker_id(store, &department, input.pincode.trim())
        .await
        .map_err(|e| CivicError::WorkerCreation(Box::new(e)))?;

    let path = worker_path(&worker_id);
    store
        .set(&path, input.record(&department, &worker_id))
        .await
        .map_err(|e| CivicError::WorkerCreation(Box::new(e)))?;
    tracing::info!(worker = %worker_id, department = department.key(), "worker created");

    let stored = store.get(&path).await?;
    if stored.is_null() {
        return Err(CivicError::WorkerNotFound(worker_id));
    }
    Ok(Worker::from_value(&worker_id, stored)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::store::{MemoryStore, Subscription};
    use async_trait::async_trait;

    fn input(phone: &str, pincode: &str) -> NewWorker {
        NewWorker {
            name: "Ravi Kumar".into(),
            phone: phone.into(),
            department: "garbage".into(),
            pincode: pincode.into(),
            location: Some("Ward 4".into()),
        }
    }

    fn seeded() -> MemoryStore {
        MemoryStore::with_data(json!({
            "workers": {
                "GBG-110001-001": { "phone": "9000000001", "department_pincode": "garbage_110001" },
                "GBG-110001-002": { "phone": 9000000002u64, "department_pincode": "garbage_110001" }
            }
        }))
    }

    #[test]
    fn test_validation() {
        let short = input("12345", "110001").validate().unwrap_err();
        assert!(matches!(short, CivicError::Validation { field: "phone", .. }));
        assert_eq!(short.kind(), ErrorKind::Validation);

        let letters = input("12345abcde", "110001").validate().unwrap_err();
        assert!(matches!(letters, CivicError::Validation { field: "phone", .. }));

        let pin = input("9876543210", "11000").validate().unwrap_err();
        assert!(matches!(pin, CivicError::Validation { field: "pincode", .. }));

        let nameless = NewWorker {
            name: "  ".into(),
            ..input("9876543210", "110001")
        };
        assert!(matches!(
            nameless.validate().unwrap_err(),
            CivicError::Validation { field: "name", .. }
        ));

        assert_eq!(
            input("9876543210", "110001").validate().unwrap(),
            Department::Garbage
        );
    }

    #[tokio::test]
    async fn test_invalid_input_writes_nothing() {
        let store = seeded();
        let before = store.snapshot();
        assert!(create_worker(&store, &input("98765", "110001")).await.is_err());
        assert_eq!(store.snapshot(), before);
    }

    #[tokio::test]
    async fn test_duplicate_phone_rejected() {
        let store = seeded();
        let before = store.snapshot();

        let err = create_worker(&store, &input("9000000001", "110001"))
            .await
            .unwrap_err();
        assert!(matches!(err, CivicError::DuplicatePhone(ref p) if p == "9000000001"));
        assert_eq!(err.kind(), ErrorKind::Duplicate);

        // Numeric phones stored by other clients still count.
        let err = create_worker(&store, &input("9000000002", "110001"))
            .await
            .unwrap_err();
        assert!(matches!(err, CivicError::DuplicatePhone(_)));
        assert_eq!(store.snapshot(), before);
    }

    #[tokio::test]
    async fn test_create_round_trip() {
        let store = seeded();
        let worker = create_worker(&store, &input("9876543210", "110001"))
            .await
            .unwrap();

        assert_eq!(worker.id, "GBG-110001-003");
        assert_eq!(worker.worker_id, "GBG-110001-003");
        assert_eq!(worker.name, "Ravi Kumar");
        assert_eq!(worker.department, "Garbage");
        assert_eq!(worker.location, "Ward 4");
        assert_eq!(worker.pincode, "110001");
        assert_eq!(worker.department_pincode, "garbage_110001");
        assert!(worker.assigned_issue_ids.is_empty());

        // The new record is counted by the next allocation.
        let next = create_worker(&store, &input("9876543211", "110001"))
            .await
            .unwrap();
        assert_eq!(next.id, "GBG-110001-004");
    }

    #[tokio::test]
    async fn test_display_name_stored_for_known_departments() {
        let store = MemoryStore::new();
        let worker = create_worker(
            &store,
            &NewWorker {
                department: "drainage".into(),
                ..input("9876543210", "400001")
            },
        )
        .await
        .unwrap();
        assert_eq!(worker.id, "DRN-400001-001");
        assert_eq!(worker.department, "Drainage & Sewerage");
    }

    /// Fails every read under `workers`.
    struct FailingStore {
        inner: MemoryStore,
    }

    fn unreachable_error(path: &str) -> CivicError {
        CivicError::read(
            path,
            CivicError::Api {
                status: 503,
                message: "Service unavailable".into(),
            },
        )
    }

    #[async_trait]
    impl DataStore for FailingStore {
        async fn get(&self, path: &str) -> Result<Value> {
            if path.starts_with(WORKERS) {
                return Err(unreachable_error(path));
            }
            self.inner.get(path).await
        }
        async fn query_equal(&self, path: &str, _child: &str, _value: &str) -> Result<Value> {
            Err(unreachable_error(path))
        }
        async fn update(&self, path: &str, fields: Value) -> Result<()> {
            self.inner.update(path, fields).await
        }
        async fn set(&self, path: &str, value: Value) -> Result<()> {
            self.inner.set(path, value).await
        }
        async fn subscribe(&self, path: &str) -> Result<Subscription> {
            self.inner.subscribe(path).await
        }
    }

    #[tokio::test]
    async fn test_read_failure_reports_creation_failure_without_write() {
        let store = FailingStore {
            inner: MemoryStore::new(),
        };
        let err = create_worker(&store, &input("9876543210", "110001"))
            .await
            .unwrap_err();
        assert!(matches!(err, CivicError::WorkerCreation(_)));
        assert!(err.to_string().starts_with("Failed to create worker"));
        assert_eq!(err.kind(), ErrorKind::Remote);
        assert!(store.inner.snapshot().is_null());
    }
}
