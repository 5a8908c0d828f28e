use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::fields;

/// A municipal staff record, stored under `workers/<id>`.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct Worker {
    #[serde(default, skip_deserializing)]
    pub id: String,
    #[serde(rename = "workerId", default, deserialize_with = "fields::loose_string")]
    pub worker_id: String,
    #[serde(default, deserialize_with = "fields::loose_string")]
    pub name: String,
    #[serde(default, deserialize_with = "fields::loose_string")]
    pub phone: String,
    #[serde(default, deserialize_with = "fields::loose_string")]
    pub department: String,
    #[serde(default, deserialize_with = "fields::loose_string")]
    pub location: String,
    #[serde(default, deserialize_with = "fields::loose_string")]
    pub pincode: String,
    #[serde(default, deserialize_with = "fields::loose_string")]
    pub department_pincode: String,
    #[serde(
        rename = "assignedIssueIds",
        default,
        deserialize_with = "fields::string_list"
    )]
    pub assigned_issue_ids: Vec<String>,
    #[serde(
        rename = "resolvedIssuesId",
        default,
        deserialize_with = "fields::string_list"
    )]
    pub resolved_issue_ids: Vec<String>,
}

impl Worker {
    pub fn from_value(id: &str, value: Value) -> serde_json::Result<Self> {
        let mut worker: Worker = serde_json::from_value(value)?;
        worker.id = id.to_string();
        if worker.worker_id.is_empty() {
            worker.worker_id = worker.id.clone();
        }
        Ok(worker)
    }

    /// Decode every child of the `workers` node, skipping malformed ones.
    pub fn collection(value: Value) -> Vec<Worker> {
        let Value::Object(map) = value else {
            return Vec::new();
        };
        map.into_iter()
            .filter_map(|(id, body)| match Worker::from_value(&id, body) {
                Ok(worker) => Some(worker),
                Err(e) => {
                    tracing::warn!(worker = %id, "skipping malformed worker: {e}");
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_worker_from_value() {
        let worker = Worker::from_value(
            "GBG-110001-001",
            json!({
                "name": "Ravi",
                "phone": 9876543210u64,
                "department": "Garbage",
                "pincode": "110001",
                "assignedIssueIds": ["GBG-1", "GBG-2"]
            }),
        )
        .unwrap();
        assert_eq!(worker.id, "GBG-110001-001");
        assert_eq!(worker.worker_id, "GBG-110001-001");
        assert_eq!(worker.phone, "9876543210");
        assert_eq!(worker.assigned_issue_ids.len(), 2);
        assert!(worker.resolved_issue_ids.is_empty());
    }

    #[test]
    fn test_missing_lists_default_empty() {
        let worker = Worker::from_value("W", json!({ "name": "A" })).unwrap();
        assert!(worker.assigned_issue_ids.is_empty());
        assert!(worker.resolved_issue_ids.is_empty());
    }
}
