//! Status timeline shown on the issue detail view.
//!
//! Purely derived from the status; a later stage implies every earlier one.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::{Issue, IssueStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Stage {
    Submitted,
    PendingReview,
    Assigned,
    InProgress,
    Resolved,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Submitted,
        Stage::PendingReview,
        Stage::Assigned,
        Stage::InProgress,
        Stage::Resolved,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Stage::Submitted => "Complaint Submitted",
            Stage::PendingReview => "Pending Review",
            Stage::Assigned => "Assigned",
            Stage::InProgress => "In Progress",
            Stage::Resolved => "Resolved",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Stage::Submitted => "",
            Stage::PendingReview => "Waiting for worker assignment",
            Stage::Assigned => "Your complaint has been assigned to a municipal worker",
            Stage::InProgress => "Work has started on your complaint.",
            Stage::Resolved => "The issue has been resolved.",
        }
    }

    /// Whether an issue in `status` has reached this stage.
    pub fn reached_by(self, status: &IssueStatus) -> bool {
        use IssueStatus::*;
        match self {
            Stage::Submitted => true,
            Stage::PendingReview => {
                matches!(status, Pending | Assigned | InProgress | Resolved | Completed)
            }
            Stage::Assigned => matches!(status, Assigned | InProgress | Resolved | Completed),
            Stage::InProgress => matches!(status, InProgress | Resolved | Completed),
            Stage::Resolved => matches!(status, Resolved | Completed),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TimelineStep {
    pub stage: Stage,
    pub title: &'static str,
    pub subtitle: String,
    pub description: &'static str,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Timeline {
    pub steps: Vec<TimelineStep>,
}

impl Timeline {
    #[cfg(test)]
    pub fn for_status(status: &IssueStatus) -> Self {
        Self::build(status, None, None)
    }

    pub fn for_issue(issue: &Issue) -> Self {
        Self::build(&issue.status, issue.reported_at, issue.assigned_at)
    }

    fn build(
        status: &IssueStatus,
        reported_at: Option<DateTime<Utc>>,
        assigned_at: Option<DateTime<Utc>>,
    ) -> Self {
        let steps = Stage::ALL
            .into_iter()
            .map(|stage| {
                let active = stage.reached_by(status);
                let subtitle = match stage {
                    Stage::Submitted => reported_at
                        .map(format_stamp)
                        .unwrap_or_else(|| "N/A".to_string()),
                    Stage::PendingReview if *status == IssueStatus::Pending => {
                        "In Progress".to_string()
                    }
                    Stage::PendingReview => String::new(),
                    Stage::Assigned => assigned_at
                        .map(format_stamp)
                        .unwrap_or_else(|| "Current Stage".to_string()),
                    Stage::InProgress if active => "Work Started".to_string(),
                    Stage::Resolved if active => "Completed".to_string(),
                    Stage::InProgress | Stage::Resolved => "Not Yet".to_string(),
                };
                TimelineStep {
                    stage,
                    title: stage.title(),
                    subtitle,
                    description: stage.description(),
                    active,
                }
            })
            .collect();
        Self { steps }
    }

    /// Highest stage marked active. Submitted always is.
    pub fn current_stage(&self) -> Stage {
        self.steps
            .iter()
            .rev()
            .find(|s| s.active)
            .map(|s| s.stage)
            .unwrap_or(Stage::Submitted)
    }

    /// At or past Assigned, the detail view offers "Reassign" instead of
    /// "Assign".
    pub fn can_reassign(&self) -> bool {
        self.current_stage() >= Stage::Assigned
    }

    pub fn is_resolved(&self) -> bool {
        self.current_stage() == Stage::Resolved
    }
}

fn format_stamp(ts: DateTime<Utc>) -> String {
    ts.format("%d %b %Y, %H:%M").to_string()
}
