//! List-view predicates and ordering.
//!
//! Filters are conjunctive; an unset filter or the literal `all` matches
//! everything. Output keeps the input order.

use std::cmp::Reverse;

use crate::assignment::{availability, Availability};
use crate::types::{Department, Issue, IssueStatus, Worker};

fn active_filter(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("all"))
}

#[derive(Debug, Clone, Default)]
pub struct IssueFilter {
    pub search: Option<String>,
    pub status: Option<String>,
    pub category: Option<String>,
}

impl IssueFilter {
    pub fn matches(&self, issue: &Issue) -> bool {
        if let Some(term) = self.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let term = term.to_lowercase();
            let hit = [
                issue.title.as_deref(),
                issue.description.as_deref(),
                Some(issue.location.as_str()),
            ]
            .into_iter()
            .flatten()
            .any(|field| field.to_lowercase().contains(&term));
            if !hit {
                return false;
            }
        }
        if let Some(status) = active_filter(&self.status) {
            if issue.status != IssueStatus::parse(status) {
                return false;
            }
        }
        if let Some(category) = active_filter(&self.category) {
            let wanted = Department::normalize(category);
            let actual = issue.category.as_deref().map(Department::normalize);
            if actual.as_deref() != Some(wanted.as_str()) {
                return false;
            }
        }
        true
    }

    pub fn apply<'a>(&self, issues: &'a [Issue]) -> Vec<&'a Issue> {
        issues.iter().filter(|i| self.matches(i)).collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct WorkerFilter {
    pub department: Option<String>,
    pub location: Option<String>,
    pub availability: Option<Availability>,
}

impl WorkerFilter {
    /// Restrict to the department an issue belongs to, as the assign view
    /// does when opened for a specific issue.
    pub fn for_issue(mut self, issue: &Issue) -> Self {
        if let Some(dept) = issue.routing_department() {
            self.department = Some(dept.to_string());
        }
        self
    }

    pub fn matches(&self, worker: &Worker, issues: &[Issue]) -> bool {
        if let Some(dept) = active_filter(&self.department) {
            if Department::normalize(&worker.department) != Department::normalize(dept) {
                return false;
            }
        }
        if let Some(location) = active_filter(&self.location) {
            if Department::normalize(&worker.location) != Department::normalize(location) {
                return false;
            }
        }
        if let Some(bucket) = self.availability {
            if availability(issues, &worker.id) != bucket {
                return false;
            }
        }
        true
    }

    pub fn apply<'a>(&self, workers: &'a [Worker], issues: &[Issue]) -> Vec<&'a Worker> {
        workers.iter().filter(|w| self.matches(w, issues)).collect()
    }
}

/// Newest first. Undated issues go last in their input order.
pub fn sort_by_reported_desc(issues: &mut [&Issue]) {
    issues.sort_by_key(|i| (i.reported_at.is_none(), Reverse(i.reported_at)));
}

/// The `n` most recently reported issues; undated ones are left out.
pub fn recent_issues(issues: &[Issue], n: usize) -> Vec<&Issue> {
    let mut dated: Vec<&Issue> = issues.iter().filter(|i| i.reported_at.is_some()).collect();
    sort_by_reported_desc(&mut dated);
    dated.truncate(n);
    dated
}

/// Distinct values in first-seen order, for filter pickers.
pub fn distinct<'a>(values: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for value in values {
        if !value.is_empty() && !seen.iter().any(|s| s == value) {
            seen.push(value.to_string());
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn issue(id: &str, body: serde_json::Value) -> Issue {
        Issue::from_value(id, body).unwrap()
    }

    fn sample() -> Vec<Issue> {
        vec![
            issue("GBG-1", json!({ "title": "Overflowing bin", "status": "Resolved", "category": "Garbage", "location": "Sector 5", "dateTime": "2024-05-01T09:00:00Z" })),
            issue("RDG-2", json!({ "title": "Pothole", "status": "pending", "category": "Road Damage", "location": "MG Road", "dateTime": "2024-05-03T09:00:00Z" })),
            issue("GBG-3", json!({ "description": "Bin not collected", "status": "RESOLVED", "category": "Garbage" })),
            issue("SLT-4", json!({ "title": "Dark street", "status": "In Progress", "category": "StreetLight", "dateTime": "2024-05-02T09:00:00Z" })),
        ]
    }

    fn ids(issues: &[&Issue]) -> Vec<String> {
        issues.iter().map(|i| i.id.clone()).collect()
    }

    #[test]
    fn test_status_filter_is_case_insensitive_and_stable() {
        let issues = sample();
        let filter = IssueFilter {
            status: Some("Resolved".into()),
            ..Default::default()
        };
        assert_eq!(ids(&filter.apply(&issues)), ["GBG-1", "GBG-3"]);
    }

    #[test]
    fn test_all_is_inactive() {
        let issues = sample();
        let filter = IssueFilter {
            status: Some("all".into()),
            category: Some("ALL".into()),
            search: None,
        };
        assert_eq!(filter.apply(&issues).len(), 4);
    }

    #[test]
    fn test_search_spans_title_description_location() {
        let issues = sample();
        let by_desc = IssueFilter {
            search: Some("BIN".into()),
            ..Default::default()
        };
        assert_eq!(ids(&by_desc.apply(&issues)), ["GBG-1", "GBG-3"]);
        let by_location = IssueFilter {
            search: Some("mg road".into()),
            ..Default::default()
        };
        assert_eq!(ids(&by_location.apply(&issues)), ["RDG-2"]);
    }

    #[test]
    fn test_category_normalized_and_conjunctive() {
        let issues = sample();
        let filter = IssueFilter {
            category: Some("roaddamage".into()),
            ..Default::default()
        };
        assert_eq!(ids(&filter.apply(&issues)), ["RDG-2"]);

        let both = IssueFilter {
            category: Some("garbage".into()),
            search: Some("overflowing".into()),
            status: Some("resolved".into()),
        };
        assert_eq!(ids(&both.apply(&issues)), ["GBG-1"]);
    }

    #[test]
    fn test_sort_newest_first() {
        let issues = sample();
        let mut dated: Vec<&Issue> = issues.iter().filter(|i| i.reported_at.is_some()).collect();
        sort_by_reported_desc(&mut dated);
        assert_eq!(ids(&dated), ["RDG-2", "SLT-4", "GBG-1"]);
        assert_eq!(ids(&recent_issues(&issues, 2)), ["RDG-2", "SLT-4"]);
    }

    #[test]
    fn test_sort_mixed_dated_and_undated() {
        let issues: Vec<Issue> = (0..60)
            .map(|i| {
                if i % 3 == 0 {
                    issue(&format!("U-{i}"), json!({}))
                } else {
                    issue(&format!("D-{i}"), json!({ "dateTime": 1_700_000_000_000i64 + i * 60_000 }))
                }
            })
            .collect();
        let mut sorted: Vec<&Issue> = issues.iter().collect();
        sort_by_reported_desc(&mut sorted);

        let (dated, undated) = sorted.split_at(40);
        assert!(dated.iter().all(|i| i.reported_at.is_some()));
        assert!(dated.windows(2).all(|w| w[0].reported_at >= w[1].reported_at));
        let expected: Vec<String> = (0..60).step_by(3).map(|i| format!("U-{i}")).collect();
        assert_eq!(ids(undated), expected);
    }

    #[test]
    fn test_worker_filter() {
        let workers: Vec<Worker> = vec![
            Worker::from_value("W1", json!({ "department": "Road Damage", "location": "North Zone" })).unwrap(),
            Worker::from_value("W2", json!({ "department": "Garbage", "location": "North Zone" })).unwrap(),
            Worker::from_value("W3", json!({ "department": "Garbage", "location": "South" })).unwrap(),
        ];
        let mut complaints = Vec::new();
        for i in 0..10 {
            complaints.push(issue(&format!("GBG-{i}"), json!({ "assignedTo": "W2", "status": "Assigned" })));
        }

        let garbage = WorkerFilter {
            department: Some("garbage".into()),
            ..Default::default()
        };
        assert_eq!(garbage.apply(&workers, &complaints).len(), 2);

        let available = WorkerFilter {
            department: Some("Garbage".into()),
            availability: Some(Availability::Available),
            ..Default::default()
        };
        let hits: Vec<&str> = available
            .apply(&workers, &complaints)
            .iter()
            .map(|w| w.id.as_str())
            .collect();
        assert_eq!(hits, ["W3"]);

        let north = WorkerFilter {
            location: Some("northzone".into()),
            availability: Some(Availability::Occupied),
            ..Default::default()
        };
        assert_eq!(north.apply(&workers, &complaints).len(), 1);
    }

    #[test]
    fn test_worker_filter_for_issue_uses_issue_department() {
        let target = issue("RDG-9", json!({ "category": "Road Damage" }));
        let filter = WorkerFilter {
            department: Some("Garbage".into()),
            ..Default::default()
        }
        .for_issue(&target);
        assert_eq!(filter.department.as_deref(), Some("Road Damage"));
    }

    #[test]
    fn test_distinct() {
        assert_eq!(distinct(["a", "b", "a", "", "c"]), ["a", "b", "c"]);
    }
}
