use std::fmt;

use colored::Colorize;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Lifecycle status of a reported issue.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum IssueStatus {
    #[default]
    Pending,
    Assigned,
    InProgress,
    Resolved,
    Completed,
    ReviewAndApprove,
    /// Status text this tool does not recognise, kept verbatim.
    Other(String),
}

impl IssueStatus {
    /// Normalise free-form status text. Comparison is case-insensitive.
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        match trimmed.to_lowercase().as_str() {
            "" | "pending" => IssueStatus::Pending,
            "assigned" => IssueStatus::Assigned,
            "in progress" => IssueStatus::InProgress,
            "resolved" => IssueStatus::Resolved,
            "completed" => IssueStatus::Completed,
            "review & approve" => IssueStatus::ReviewAndApprove,
            _ => IssueStatus::Other(trimmed.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            IssueStatus::Pending => "Pending",
            IssueStatus::Assigned => "Assigned",
            IssueStatus::InProgress => "In Progress",
            IssueStatus::Resolved => "Resolved",
            IssueStatus::Completed => "Completed",
            IssueStatus::ReviewAndApprove => "Review & Approve",
            IssueStatus::Other(s) => s,
        }
    }

    /// Resolved and completed issues no longer count against a worker.
    pub fn is_closed(&self) -> bool {
        matches!(self, IssueStatus::Resolved | IssueStatus::Completed)
    }

    /// Get the colored label for terminal output.
    pub fn colored(&self) -> String {
        let label = self.label();
        match self {
            IssueStatus::Pending => label.yellow().to_string(),
            IssueStatus::Assigned => label.blue().to_string(),
            IssueStatus::InProgress => label.truecolor(255, 165, 0).to_string(),
            IssueStatus::Resolved | IssueStatus::Completed => label.green().to_string(),
            IssueStatus::ReviewAndApprove => label.bright_black().to_string(),
            IssueStatus::Other(_) => label.to_string(),
        }
    }
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl std::str::FromStr for IssueStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(IssueStatus::parse(s))
    }
}

impl Serialize for IssueStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for IssueStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(super::fields::text(&value)
            .map(|s| IssueStatus::parse(&s))
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(IssueStatus::parse("RESOLVED"), IssueStatus::Resolved);
        assert_eq!(IssueStatus::parse("in progress"), IssueStatus::InProgress);
        assert_eq!(IssueStatus::parse(" In Progress "), IssueStatus::InProgress);
        assert_eq!(
            IssueStatus::parse("Review & Approve"),
            IssueStatus::ReviewAndApprove
        );
    }

    #[test]
    fn test_unknown_status_is_preserved() {
        let status = IssueStatus::parse("Reverted");
        assert_eq!(status, IssueStatus::Other("Reverted".to_string()));
        assert_eq!(status.label(), "Reverted");
        assert!(!status.is_closed());
    }

    #[test]
    fn test_closed_statuses() {
        assert!(IssueStatus::Resolved.is_closed());
        assert!(IssueStatus::Completed.is_closed());
        assert!(!IssueStatus::InProgress.is_closed());
        assert!(!IssueStatus::Pending.is_closed());
    }

    #[test]
    fn test_missing_status_deserializes_as_pending() {
        let status: IssueStatus = serde_json::from_str("null").unwrap();
        assert_eq!(status, IssueStatus::Pending);
        let status: IssueStatus = serde_json::from_str("\"completed\"").unwrap();
        assert_eq!(status, IssueStatus::Completed);
    }
}
