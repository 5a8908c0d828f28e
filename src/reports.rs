//! Dashboard and report statistics.
//!
//! Everything here is computed from an in-memory snapshot of the issue and
//! worker collections; nothing reads the store.

use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::assignment::{availability, Availability};
use crate::filter::{distinct, recent_issues, IssueFilter};
use crate::types::{Issue, IssueStatus, Worker};

/// Status cards shown on the dashboard, in display order.
pub const DASHBOARD_STATUSES: [IssueStatus; 5] = [
    IssueStatus::Pending,
    IssueStatus::Assigned,
    IssueStatus::InProgress,
    IssueStatus::Resolved,
    IssueStatus::ReviewAndApprove,
];

pub const RECENT_ISSUES: usize = 6;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StatusCount {
    pub status: String,
    pub count: usize,
}

pub fn count_status(issues: &[Issue], status: &IssueStatus) -> usize {
    issues.iter().filter(|i| &i.status == status).count()
}

pub fn status_counts(issues: &[Issue], statuses: &[IssueStatus]) -> Vec<StatusCount> {
    statuses
        .iter()
        .map(|status| StatusCount {
            status: status.label().to_string(),
            count: count_status(issues, status),
        })
        .collect()
}

/// `count` out of `total`, reported as a rounded percentage.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Rate {
    pub count: usize,
    pub total: usize,
}

impl Rate {
    pub fn percent(self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        ((self.count as f64 / self.total as f64) * 100.0).round() as u32
    }
}

pub fn completion_rate(issues: &[Issue]) -> Rate {
    Rate {
        count: count_status(issues, &IssueStatus::Completed),
        total: issues.len(),
    }
}

pub fn resolution_rate(issues: &[Issue]) -> Rate {
    Rate {
        count: count_status(issues, &IssueStatus::Resolved),
        total: issues.len(),
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DepartmentOccupancy {
    pub department: String,
    pub available: usize,
    pub occupied: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Occupancy {
    pub available: usize,
    pub occupied: usize,
    pub by_department: Vec<DepartmentOccupancy>,
}

/// Available/occupied split across all workers and per department, in the
/// order departments first appear.
pub fn worker_occupancy(workers: &[Worker], issues: &[Issue]) -> Occupancy {
    let mut occupancy = Occupancy {
        available: 0,
        occupied: 0,
        by_department: Vec::new(),
    };
    for worker in workers {
        let department = if worker.department.trim().is_empty() {
            "Unknown"
        } else {
            worker.department.as_str()
        };
        let index = match occupancy
            .by_department
            .iter()
            .position(|d| d.department == department)
        {
            Some(index) => index,
            None => {
                occupancy.by_department.push(DepartmentOccupancy {
                    department: department.to_string(),
                    available: 0,
                    occupied: 0,
                });
                occupancy.by_department.len() - 1
            }
        };
        let entry = &mut occupancy.by_department[index];
        match availability(issues, &worker.id) {
            Availability::Available => {
                occupancy.available += 1;
                entry.available += 1;
            }
            Availability::Occupied => {
                occupancy.occupied += 1;
                entry.occupied += 1;
            }
        }
    }
    occupancy
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CategoryCount {
    pub category: String,
    pub count: usize,
}

pub fn category_breakdown(issues: &[Issue]) -> Vec<CategoryCount> {
    let mut counts: Vec<CategoryCount> = Vec::new();
    for issue in issues {
        let category = issue.category.as_deref().unwrap_or("Unknown");
        match counts.iter_mut().find(|c| c.category == category) {
            Some(entry) => entry.count += 1,
            None => counts.push(CategoryCount {
                category: category.to_string(),
                count: 1,
            }),
        }
    }
    counts
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum Period {
    #[serde(rename = "7d")]
    Week,
    #[default]
    #[serde(rename = "30d")]
    Month,
    #[serde(rename = "year")]
    Year,
    #[serde(rename = "all")]
    All,
}

impl Period {
    pub fn label(self) -> &'static str {
        match self {
            Period::Week => "7d",
            Period::Month => "30d",
            Period::Year => "year",
            Period::All => "all",
        }
    }

    pub fn window(self) -> Option<Duration> {
        match self {
            Period::Week => Some(Duration::days(7)),
            Period::Month => Some(Duration::days(30)),
            Period::Year => Some(Duration::days(365)),
            Period::All => None,
        }
    }

    /// Undated issues are always inside the period.
    pub fn contains(self, issue: &Issue, now: DateTime<Utc>) -> bool {
        match (self.window(), issue.reported_at) {
            (Some(window), Some(reported)) => now.signed_duration_since(reported) <= window,
            _ => true,
        }
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "7d" | "week" => Ok(Period::Week),
            "30d" | "month" => Ok(Period::Month),
            "year" | "365d" => Ok(Period::Year),
            "all" => Ok(Period::All),
            other => Err(format!("unknown period '{other}' (expected 7d, 30d, year or all)")),
        }
    }
}

fn is_located(issue: &Issue) -> bool {
    issue.coordinates.is_some()
}

#[derive(Debug, Serialize)]
pub struct Dashboard<'a> {
    pub total: usize,
    pub statuses: Vec<StatusCount>,
    pub completion: Rate,
    pub completion_percent: u32,
    pub located: usize,
    pub recent: Vec<&'a Issue>,
}

pub fn dashboard(issues: &[Issue]) -> Dashboard<'_> {
    let completion = completion_rate(issues);
    Dashboard {
        total: issues.len(),
        statuses: status_counts(issues, &DASHBOARD_STATUSES),
        completion,
        completion_percent: completion.percent(),
        located: issues.iter().filter(|i| is_located(i)).count(),
        recent: recent_issues(issues, RECENT_ISSUES),
    }
}

#[derive(Debug, Serialize)]
pub struct Report {
    pub total_issues: usize,
    pub resolution: Rate,
    pub resolution_percent: u32,
    pub active_workers: usize,
    pub occupancy: Occupancy,
    pub categories: Vec<CategoryCount>,
    /// Categories available for the map filter.
    pub category_options: Vec<String>,
    pub period: Period,
    pub category: Option<String>,
    /// Issues matching the category and period filters.
    pub in_view: usize,
    /// Of those, the ones carrying usable coordinates.
    pub located: usize,
}

pub fn report(
    issues: &[Issue],
    workers: &[Worker],
    category: Option<&str>,
    period: Period,
    now: DateTime<Utc>,
) -> Report {
    let resolution = resolution_rate(issues);
    let filter = IssueFilter {
        category: category.map(String::from),
        ..Default::default()
    };
    let in_view: Vec<&Issue> = filter
        .apply(issues)
        .into_iter()
        .filter(|i| period.contains(i, now))
        .collect();

    Report {
        total_issues: issues.len(),
        resolution,
        resolution_percent: resolution.percent(),
        active_workers: workers.len(),
        occupancy: worker_occupancy(workers, issues),
        categories: category_breakdown(issues),
        category_options: distinct(issues.iter().filter_map(|i| i.category.as_deref())),
        period,
        category: category.map(String::from),
        in_view: in_view.len(),
        located: in_view.iter().filter(|i| is_located(i)).count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn issue(id: &str, body: serde_json::Value) -> Issue {
        Issue::from_value(id, body).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn sample() -> Vec<Issue> {
        vec![
            issue("GBG-1", json!({ "status": "Resolved", "category": "Garbage", "gps": "28.61, 77.20", "dateTime": "2024-05-30T10:00:00Z" })),
            issue("GBG-2", json!({ "status": "completed", "category": "Garbage", "dateTime": "2024-01-10T10:00:00Z" })),
            issue("RDG-3", json!({ "status": "pending", "category": "Road Damage", "gps": "12.97, 77.59" })),
            issue("WTR-4", json!({ "status": "In Progress", "category": "Water", "dateTime": "2024-05-20T10:00:00Z" })),
            issue("WTR-5", json!({ "status": "Assigned", "category": "Water", "assignedTo": "W2", "dateTime": "2023-01-01T10:00:00Z" })),
        ]
    }

    #[test]
    fn test_status_counts_case_insensitive() {
        let issues = sample();
        let counts = status_counts(&issues, &DASHBOARD_STATUSES);
        let pairs: Vec<(&str, usize)> = counts.iter().map(|c| (c.status.as_str(), c.count)).collect();
        assert_eq!(
            pairs,
            [
                ("Pending", 1),
                ("Assigned", 1),
                ("In Progress", 1),
                ("Resolved", 1),
                ("Review & Approve", 0)
            ]
        );
    }

    #[test]
    fn test_rates() {
        let issues = sample();
        assert_eq!(completion_rate(&issues).percent(), 20);
        assert_eq!(resolution_rate(&issues), Rate { count: 1, total: 5 });
        assert_eq!(Rate { count: 2, total: 3 }.percent(), 67);
        assert_eq!(Rate { count: 0, total: 0 }.percent(), 0);
    }

    #[test]
    fn test_occupancy_by_department() {
        let workers = vec![
            Worker::from_value("W1", json!({ "department": "Garbage" })).unwrap(),
            Worker::from_value("W2", json!({ "department": "Water" })).unwrap(),
            Worker::from_value("W3", json!({ "department": "Garbage" })).unwrap(),
            Worker::from_value("W4", json!({})).unwrap(),
        ];
        let issues: Vec<Issue> = (0..10)
            .map(|i| issue(&format!("GBG-{i}"), json!({ "assignedTo": "W3", "status": "In Progress" })))
            .collect();

        let occupancy = worker_occupancy(&workers, &issues);
        assert_eq!(occupancy.available, 3);
        assert_eq!(occupancy.occupied, 1);
        assert_eq!(
            occupancy.by_department[0],
            DepartmentOccupancy {
                department: "Garbage".into(),
                available: 1,
                occupied: 1
            }
        );
        assert_eq!(occupancy.by_department[2].department, "Unknown");
    }

    #[test]
    fn test_category_breakdown_keeps_first_seen_order() {
        let issues = sample();
        let breakdown = category_breakdown(&issues);
        let pairs: Vec<(&str, usize)> = breakdown.iter().map(|c| (c.category.as_str(), c.count)).collect();
        assert_eq!(pairs, [("Garbage", 2), ("Road Damage", 1), ("Water", 2)]);
    }

    #[test]
    fn test_period_keeps_undated_issues() {
        let issues = sample();
        let in_week: Vec<&str> = issues
            .iter()
            .filter(|i| Period::Week.contains(i, now()))
            .map(|i| i.id.as_str())
            .collect();
        assert_eq!(in_week, ["GBG-1", "RDG-3"]);
        assert!(issues.iter().all(|i| Period::All.contains(i, now())));
        assert_eq!("7D".parse::<Period>().unwrap(), Period::Week);
        assert!("fortnight".parse::<Period>().is_err());
    }

    #[test]
    fn test_report_filters_map_view() {
        let issues = sample();
        let workers = vec![Worker::from_value("W2", json!({ "department": "Water" })).unwrap()];

        let all = report(&issues, &workers, None, Period::Month, now());
        assert_eq!(all.total_issues, 5);
        assert_eq!(all.resolution_percent, 20);
        assert_eq!(all.active_workers, 1);
        assert_eq!(all.in_view, 3);
        assert_eq!(all.located, 2);
        assert_eq!(all.category_options, ["Garbage", "Road Damage", "Water"]);

        let garbage = report(&issues, &workers, Some("garbage"), Period::Year, now());
        assert_eq!(garbage.in_view, 2);
        assert_eq!(garbage.located, 1);
    }

    #[test]
    fn test_dashboard_recent_excludes_undated() {
        let issues = sample();
        let summary = dashboard(&issues);
        assert_eq!(summary.total, 5);
        assert_eq!(summary.completion_percent, 20);
        assert_eq!(summary.located, 2);
        let recent: Vec<&str> = summary.recent.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(recent, ["GBG-1", "WTR-4", "GBG-2", "WTR-5"]);
    }
}
