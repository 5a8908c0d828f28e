use colored::Colorize;
use tabled::Tabled;

use crate::assignment::load_issues;
use crate::error::Result;
use crate::output::{begin_frame, format_relative, print_item, print_table, truncate};
use crate::reports::{dashboard, StatusCount};
use crate::store::{DataStore, COMPLAINTS};
use crate::types::{Issue, IssueStatus};

#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Issues")]
    count: usize,
}

impl From<&StatusCount> for StatusRow {
    fn from(count: &StatusCount) -> Self {
        Self {
            status: IssueStatus::parse(&count.status).colored(),
            count: count.count,
        }
    }
}

#[derive(Tabled)]
struct RecentRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Type")]
    issue_type: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Reported")]
    reported: String,
}

impl From<&Issue> for RecentRow {
    fn from(issue: &Issue) -> Self {
        Self {
            id: issue.id.clone(),
            issue_type: issue.issue_type().to_string(),
            title: truncate(&issue.headline(), 40),
            status: issue.status.colored(),
            reported: format_relative(issue.reported_at),
        }
    }
}

fn render(issues: &[Issue]) {
    let summary = dashboard(issues);
    print_item(&summary, |s| {
        println!(
            "{} issues, {}% completed ({} of {}), {} on the map",
            s.total.to_string().bold(),
            s.completion_percent,
            s.completion.count,
            s.completion.total,
            s.located
        );
        println!();
        print_table(&s.statuses, |c| StatusRow::from(c));
        println!();
        println!("{}", "Recent issues".bold());
        if s.recent.is_empty() {
            println!("No dated issues yet.");
        } else {
            print_table(&s.recent, |issue| RecentRow::from(*issue));
        }
    });
}

pub async fn run(store: &dyn DataStore, watch: bool) -> Result<()> {
    if !watch {
        render(&load_issues(store).await?);
        return Ok(());
    }

    super::watch(store, COMPLAINTS, |value| {
        begin_frame("Dashboard");
        render(&Issue::collection(value));
        Ok(())
    })
    .await
}
