use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::department::issue_type_from_id;
use super::fields;
use super::IssueStatus;

/// A citizen-reported civic problem, stored under `complaints/<id>`.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    /// Record key. Filled in from the path, never stored in the body.
    #[serde(default, skip_deserializing)]
    pub id: String,
    #[serde(default, deserialize_with = "fields::optional_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "fields::optional_string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "fields::optional_string")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "fields::optional_string")]
    pub department: Option<String>,
    #[serde(default)]
    pub status: IssueStatus,
    #[serde(default = "default_location", deserialize_with = "location")]
    pub location: String,
    #[serde(
        default,
        rename(deserialize = "gps"),
        deserialize_with = "coordinates"
    )]
    pub coordinates: Option<(f64, f64)>,
    #[serde(
        default,
        rename(deserialize = "dateTime"),
        deserialize_with = "fields::timestamp"
    )]
    pub reported_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "fields::timestamp")]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "assignee")]
    pub assigned_to: Option<String>,
    #[serde(
        default,
        rename(deserialize = "assignedDate"),
        deserialize_with = "fields::timestamp"
    )]
    pub assigned_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "fields::string_list")]
    pub photos: Vec<String>,
    #[serde(default, deserialize_with = "fields::timestamp_list")]
    pub photo_timestamps: Vec<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "fields::string_list")]
    pub audio: Vec<String>,
    #[serde(default, deserialize_with = "fields::optional_string")]
    pub voice_note: Option<String>,
    #[serde(flatten)]
    pub completion: Completion,
}

/// Evidence a worker attaches when closing an issue. Stored flat on the
/// complaint record.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct Completion {
    #[serde(default, deserialize_with = "fields::string_list")]
    pub completion_photos: Vec<String>,
    #[serde(default, deserialize_with = "fields::timestamp_list")]
    pub completion_timestamps: Vec<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "fields::timestamp")]
    pub completion_timestamp: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "fields::optional_string")]
    pub completion_notes: Option<String>,
    #[serde(default, deserialize_with = "fields::optional_string")]
    pub completion_voice_note: Option<String>,
}

impl Completion {
    pub fn is_empty(&self) -> bool {
        self.completion_photos.is_empty()
            && self.completion_notes.is_none()
            && self.completion_voice_note.is_none()
    }

    /// Timestamp for the n-th completion photo, falling back to the single
    /// completion timestamp.
    pub fn photo_timestamp(&self, index: usize) -> Option<DateTime<Utc>> {
        self.completion_timestamps
            .get(index)
            .copied()
            .flatten()
            .or(self.completion_timestamp)
    }
}

impl Issue {
    /// Decode a stored record under its key.
    pub fn from_value(id: &str, value: Value) -> serde_json::Result<Self> {
        let mut issue: Issue = serde_json::from_value(value)?;
        issue.id = id.to_string();
        Ok(issue)
    }

    /// Keep only what capacity depends on from a record that does not
    /// decode. Non-object children yield nothing.
    fn salvage(id: &str, body: &Value) -> Option<Issue> {
        let map = body.as_object()?;
        Some(Issue {
            id: id.to_string(),
            status: map
                .get("status")
                .and_then(fields::text)
                .map(|s| IssueStatus::parse(&s))
                .unwrap_or_default(),
            assigned_to: map.get("assignedTo").and_then(normalize_assignee),
            location: default_location(),
            ..Issue::default()
        })
    }

    /// Decode every child of the `complaints` node. A record that fails to
    /// decode is kept with its status and assignee so it still counts
    /// against the worker.
    pub fn collection(value: Value) -> Vec<Issue> {
        let Value::Object(map) = value else {
            return Vec::new();
        };
        map.into_iter()
            .filter_map(|(id, body)| match Issue::deserialize(&body) {
                Ok(mut issue) => {
                    issue.id = id;
                    Some(issue)
                }
                Err(e) => {
                    tracing::warn!(issue = %id, "malformed complaint: {e}");
                    Issue::salvage(&id, &body)
                }
            })
            .collect()
    }

    pub fn is_assigned_to(&self, worker_id: &str) -> bool {
        self.assigned_to.as_deref() == Some(worker_id)
    }

    /// Counts against the worker's capacity.
    pub fn is_active_for(&self, worker_id: &str) -> bool {
        self.is_assigned_to(worker_id) && !self.status.is_closed()
    }

    pub fn issue_type(&self) -> &'static str {
        issue_type_from_id(&self.id)
    }

    /// Best human label: title, then category, then the type from the id.
    pub fn headline(&self) -> String {
        self.title
            .clone()
            .or_else(|| self.category.clone())
            .unwrap_or_else(|| self.issue_type().to_string())
    }

    /// Department the issue should be routed to.
    pub fn routing_department(&self) -> Option<&str> {
        self.department.as_deref().or(self.category.as_deref())
    }

    pub fn photo_timestamp(&self, index: usize) -> Option<DateTime<Utc>> {
        self.photo_timestamps.get(index).copied().flatten()
    }
}

fn default_location() -> String {
    "N/A".to_string()
}

fn location<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let text = match &value {
        Value::Object(map) => map.get("address").and_then(fields::text),
        other => fields::text(other),
    };
    Ok(text
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(default_location))
}

/// Parse `"lat, lng"`. The `0,0` placeholder and NaN both mean absent.
pub fn parse_gps(gps: &str) -> Option<(f64, f64)> {
    let parts: Vec<f64> = gps
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .ok()?;
    match parts.as_slice() {
        [lat, lng] if lat.is_finite() && lng.is_finite() && *lat != 0.0 && *lng != 0.0 => {
            Some((*lat, *lng))
        }
        _ => None,
    }
}

fn coordinates<'de, D>(deserializer: D) -> Result<Option<(f64, f64)>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_str().and_then(parse_gps))
}

/// `assignedTo` is either a bare worker id or an embedded worker object.
/// Both collapse to the identifier here and nowhere else.
fn assignee<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(normalize_assignee(&value))
}

pub fn normalize_assignee(value: &Value) -> Option<String> {
    let id = match value {
        Value::String(s) => Some(s.as_str()),
        Value::Object(map) => map
            .get("id")
            .or_else(|| map.get("workerId"))
            .and_then(Value::as_str),
        _ => None,
    }?;
    let id = id.trim();
    (!id.is_empty()).then(|| id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_assignee_string_and_object_forms() {
        let a = Issue::from_value("GBG-1", json!({ "assignedTo": "GBG-110001-001" })).unwrap();
        let b = Issue::from_value(
            "GBG-2",
            json!({ "assignedTo": { "id": "GBG-110001-001", "name": "Ravi" } }),
        )
        .unwrap();
        assert_eq!(a.assigned_to.as_deref(), Some("GBG-110001-001"));
        assert_eq!(b.assigned_to, a.assigned_to);
    }

    #[test]
    fn test_empty_assignee_is_none() {
        let issue = Issue::from_value("GBG-1", json!({ "assignedTo": "" })).unwrap();
        assert!(issue.assigned_to.is_none());
    }

    #[test]
    fn test_gps_parsing() {
        assert_eq!(parse_gps("28.61, 77.20"), Some((28.61, 77.20)));
        assert_eq!(parse_gps("0, 0"), None);
        assert_eq!(parse_gps("NaN, 77.2"), None);
        assert_eq!(parse_gps("28.61"), None);
        assert_eq!(parse_gps("north, south"), None);
    }

    #[test]
    fn test_defaults_for_sparse_record() {
        let issue = Issue::from_value("WTR-9", json!({})).unwrap();
        assert_eq!(issue.id, "WTR-9");
        assert_eq!(issue.status, IssueStatus::Pending);
        assert_eq!(issue.location, "N/A");
        assert!(issue.coordinates.is_none());
        assert!(issue.reported_at.is_none());
        assert!(issue.photos.is_empty());
        assert!(issue.completion.is_empty());
        assert_eq!(issue.issue_type(), "Water");
    }

    #[test]
    fn test_full_record() {
        let issue = Issue::from_value(
            "RDG-4",
            json!({
                "title": "Pothole near school",
                "status": "in progress",
                "category": "Road Damage",
                "location": "MG Road",
                "gps": "28.6139, 77.2090",
                "dateTime": "2024-05-01T10:30:00Z",
                "photos": { "-Nb": "https://img/2.jpg", "-Na": "https://img/1.jpg" },
                "photoTimestamps": ["2024-05-01T10:31:00Z"],
                "completionNotes": "Filled",
                "completionTimestamp": 1714559400000i64
            }),
        )
        .unwrap();
        assert_eq!(issue.status, IssueStatus::InProgress);
        assert_eq!(issue.coordinates, Some((28.6139, 77.2090)));
        assert_eq!(issue.photos, vec!["https://img/1.jpg", "https://img/2.jpg"]);
        assert!(issue.photo_timestamp(0).is_some());
        assert!(issue.photo_timestamp(1).is_none());
        assert_eq!(issue.completion.completion_notes.as_deref(), Some("Filled"));
        assert_eq!(
            issue.completion.photo_timestamp(3),
            issue.completion.completion_timestamp
        );
        assert_eq!(issue.headline(), "Pothole near school");
    }

    #[test]
    fn test_collection_skips_non_objects() {
        let issues = Issue::collection(json!({
            "GBG-1": { "status": "Pending" },
            "GBG-2": { "status": "Resolved" }
        }));
        assert_eq!(issues.len(), 2);
        assert!(Issue::collection(Value::Null).is_empty());
    }

    #[test]
    fn test_irregular_fields_still_decode() {
        let issues = Issue::collection(json!({
            "GBG-1": {
                "status": "Assigned",
                "assignedTo": "W1",
                "title": 42,
                "location": { "lat": 28.6, "lng": 77.2 }
            },
            "GBG-2": { "status": 3, "assignedTo": "W1", "location": { "address": "MG Road" } }
        }));
        assert_eq!(issues.len(), 2);
        let first = issues.iter().find(|i| i.id == "GBG-1").unwrap();
        assert_eq!(first.location, "N/A");
        assert_eq!(first.title.as_deref(), Some("42"));
        let second = issues.iter().find(|i| i.id == "GBG-2").unwrap();
        assert_eq!(second.location, "MG Road");
        assert_eq!(second.status, IssueStatus::Other("3".to_string()));
        assert!(second.is_active_for("W1"));
    }

    #[test]
    fn test_salvage_keeps_status_and_assignee() {
        let issue = Issue::salvage(
            "GBG-1",
            &json!({ "status": "In Progress", "assignedTo": { "id": "W1" } }),
        )
        .unwrap();
        assert!(issue.is_active_for("W1"));
        assert_eq!(issue.status, IssueStatus::InProgress);
        assert!(Issue::salvage("GBG-2", &json!("stray")).is_none());
    }

    #[test]
    fn test_active_for_excludes_closed() {
        let open = Issue::from_value("GBG-1", json!({ "assignedTo": "W1", "status": "Assigned" })).unwrap();
        let done = Issue::from_value("GBG-2", json!({ "assignedTo": "W1", "status": "completed" })).unwrap();
        assert!(open.is_active_for("W1"));
        assert!(!done.is_active_for("W1"));
        assert!(!open.is_active_for("W2"));
    }
}
