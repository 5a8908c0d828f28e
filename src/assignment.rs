//! Worker assignment rules.
//!
//! A worker may hold at most [`WORKER_CAPACITY`] open issues. Counts are
//! always recomputed from issue status at call time; the per-worker id
//! lists are kept in step but never trusted for capacity.
//!
//! Every check here is a read followed by separate writes. Two admins
//! assigning the same worker at once can both pass the capacity check, and
//! a failed write leaves the earlier writes in place.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

use crate::error::{CivicError, Result};
use crate::store::{complaint_path, worker_path, DataStore, COMPLAINTS};
use crate::types::{Issue, IssueStatus, Worker};

pub const WORKER_CAPACITY: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Availability {
    Available,
    Occupied,
}

impl Availability {
    pub fn label(self) -> &'static str {
        match self {
            Availability::Available => "Available",
            Availability::Occupied => "Occupied",
        }
    }
}

pub fn active_assigned_count(issues: &[Issue], worker_id: &str) -> usize {
    issues.iter().filter(|i| i.is_active_for(worker_id)).count()
}

pub fn is_available(issues: &[Issue], worker_id: &str) -> bool {
    active_assigned_count(issues, worker_id) < WORKER_CAPACITY
}

pub fn availability(issues: &[Issue], worker_id: &str) -> Availability {
    if is_available(issues, worker_id) {
        Availability::Available
    } else {
        Availability::Occupied
    }
}

/// Open and closed issues held by one worker, derived from the collection.
#[derive(Debug, Serialize)]
pub struct WorkerLoad<'a> {
    pub active: Vec<&'a Issue>,
    pub resolved: Vec<&'a Issue>,
    pub availability: Availability,
}

pub fn worker_load<'a>(issues: &'a [Issue], worker_id: &str) -> WorkerLoad<'a> {
    let (resolved, active): (Vec<&Issue>, Vec<&Issue>) = issues
        .iter()
        .filter(|i| i.is_assigned_to(worker_id))
        .partition(|i| i.status.is_closed());
    let availability = if active.len() < WORKER_CAPACITY {
        Availability::Available
    } else {
        Availability::Occupied
    };
    WorkerLoad {
        active,
        resolved,
        availability,
    }
}

/// Outcome of a successful [`assign`].
#[derive(Debug, Clone, Serialize)]
pub struct Assignment {
    pub issue_id: String,
    pub worker_id: String,
    pub previous_worker: Option<String>,
    pub assigned_at: DateTime<Utc>,
}

async fn load_issue(store: &dyn DataStore, issue_id: &str) -> Result<Issue> {
    let value = store.get(&complaint_path(issue_id)).await?;
    if value.is_null() {
        return Err(CivicError::IssueNotFound(issue_id.to_string()));
    }
    Ok(Issue::from_value(issue_id, value)?)
}

async fn load_worker(store: &dyn DataStore, worker_id: &str) -> Result<Option<Worker>> {
    let value = store.get(&worker_path(worker_id)).await?;
    if value.is_null() {
        return Ok(None);
    }
    Ok(Some(Worker::from_value(worker_id, value)?))
}

pub async fn load_issues(store: &dyn DataStore) -> Result<Vec<Issue>> {
    Ok(Issue::collection(store.get(COMPLAINTS).await?))
}

/// Assign `worker_id` to `issue_id`, moving it off any previous assignee.
pub async fn assign(store: &dyn DataStore, issue_id: &str, worker_id: &str) -> Result<Assignment> {
    let issue = load_issue(store, issue_id).await?;
    let previous = issue.assigned_to.clone();

    if previous.as_deref() == Some(worker_id) {
        return Err(CivicError::AlreadyAssigned {
            issue: issue_id.to_string(),
            worker: worker_id.to_string(),
        });
    }

    let issues = load_issues(store).await?;
    let active = active_assigned_count(&issues, worker_id);
    if active >= WORKER_CAPACITY {
        return Err(CivicError::WorkerOccupied {
            worker: worker_id.to_string(),
            active,
        });
    }

    if let Some(prev_id) = previous.as_deref() {
        if let Some(prev) = load_worker(store, prev_id).await? {
            let remaining: Vec<&String> = prev
                .assigned_issue_ids
                .iter()
                .filter(|id| id.as_str() != issue_id)
                .collect();
            store
                .update(&worker_path(prev_id), json!({ "assignedIssueIds": remaining }))
                .await?;
        }
    }

    let mut assigned_ids = load_worker(store, worker_id)
        .await?
        .map(|w| w.assigned_issue_ids)
        .unwrap_or_default();
    if !assigned_ids.iter().any(|id| id == issue_id) {
        assigned_ids.push(issue_id.to_string());
    }
    store
        .update(&worker_path(worker_id), json!({ "assignedIssueIds": assigned_ids }))
        .await?;

    let assigned_at = Utc::now();
    store
        .update(
            &complaint_path(issue_id),
            json!({
                "assignedTo": worker_id,
                "assignedDate": assigned_at.to_rfc3339(),
                "status": IssueStatus::Assigned,
            }),
        )
        .await?;

    tracing::info!(issue = issue_id, worker = worker_id, previous = ?previous, "assigned");
    Ok(Assignment {
        issue_id: issue_id.to_string(),
        worker_id: worker_id.to_string(),
        previous_worker: previous,
        assigned_at,
    })
}

/// Set the issue status. Closing an assigned issue also records it on the
/// worker's resolved list.
pub async fn update_status(store: &dyn DataStore, issue_id: &str, status: &IssueStatus) -> Result<()> {
    let issue = load_issue(store, issue_id).await?;
    store
        .update(&complaint_path(issue_id), json!({ "status": status }))
        .await?;

    if !status.is_closed() {
        tracing::info!(issue = issue_id, %status, "status updated");
        return Ok(());
    }

    if let Some(worker_id) = issue.assigned_to.as_deref() {
        let mut resolved = load_worker(store, worker_id)
            .await?
            .map(|w| w.resolved_issue_ids)
            .unwrap_or_default();
        if !resolved.iter().any(|id| id == issue_id) {
            resolved.push(issue_id.to_string());
            store
                .update(&worker_path(worker_id), json!({ "resolvedIssuesId": resolved }))
                .await?;
        }
    }
    tracing::info!(issue = issue_id, %status, "status updated");
    Ok(())
}
