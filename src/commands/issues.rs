use colored::Colorize;
use serde::Serialize;
use serde_json::Value;
use tabled::Tabled;

use crate::assignment::{self, load_issues};
use crate::cli::IssueListArgs;
use crate::error::{CivicError, Result};
use crate::filter::{sort_by_reported_desc, IssueFilter};
use crate::output::{
    begin_frame, format_relative, format_timestamp, is_json_output, print_item, print_json,
    print_message, print_table, truncate,
};
use crate::store::{complaint_path, DataStore, COMPLAINTS};
use crate::timeline::Timeline;
use crate::types::{Issue, IssueStatus};

#[derive(Tabled)]
struct IssueRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Location")]
    location: String,
    #[tabled(rename = "Reported")]
    reported: String,
    #[tabled(rename = "Assignee")]
    assignee: String,
}

impl From<&Issue> for IssueRow {
    fn from(issue: &Issue) -> Self {
        Self {
            id: issue.id.clone(),
            title: truncate(&issue.headline(), 40),
            category: issue
                .category
                .clone()
                .unwrap_or_else(|| issue.issue_type().to_string()),
            status: issue.status.colored(),
            location: truncate(&issue.location, 30),
            reported: format_relative(issue.reported_at),
            assignee: issue.assigned_to.clone().unwrap_or_else(|| "-".to_string()),
        }
    }
}

impl IssueListArgs {
    fn filter(&self) -> IssueFilter {
        IssueFilter {
            search: self.search.clone(),
            status: self.status.clone(),
            category: self.category.clone(),
        }
    }
}

fn render_list(issues: &[Issue], args: &IssueListArgs) {
    let mut matched = args.filter().apply(issues);
    sort_by_reported_desc(&mut matched);
    matched.truncate(args.limit);
    print_table(&matched, |issue| IssueRow::from(*issue));
}

pub async fn list(store: &dyn DataStore, args: IssueListArgs) -> Result<()> {
    if !args.watch {
        let issues = load_issues(store).await?;
        render_list(&issues, &args);
        return Ok(());
    }

    super::watch(store, COMPLAINTS, |value| {
        begin_frame("Issues");
        render_list(&Issue::collection(value), &args);
        Ok(())
    })
    .await
}

#[derive(Serialize)]
struct IssueDetail<'a> {
    issue: &'a Issue,
    timeline: Timeline,
}

fn render_detail(issue: &Issue) {
    let detail = IssueDetail {
        issue,
        timeline: Timeline::for_issue(issue),
    };
    print_item(&detail, |d| print_detail(d.issue, &d.timeline));
}

fn print_detail(issue: &Issue, timeline: &Timeline) {
    println!("{} - {}", issue.id.bold(), issue.headline());
    println!();

    if let Some(desc) = &issue.description {
        println!("{desc}");
        println!();
    }

    println!("Type:      {}", issue.issue_type());
    if let Some(category) = &issue.category {
        println!("Category:  {category}");
    }
    println!("Status:    {}", issue.status.colored());
    println!("Location:  {}", issue.location);
    if let Some((lat, lng)) = issue.coordinates {
        println!("GPS:       {lat:.5}, {lng:.5}");
    }
    println!("Reported:  {}", format_timestamp(issue.reported_at));
    if issue.deadline.is_some() {
        println!("Deadline:  {}", format_timestamp(issue.deadline));
    }
    println!(
        "Assignee:  {}",
        issue.assigned_to.as_deref().unwrap_or("Unassigned")
    );

    println!();
    println!("{}", "Timeline".bold());
    for step in &timeline.steps {
        let marker = if step.active {
            "●".green().to_string()
        } else {
            "○".bright_black().to_string()
        };
        let subtitle = if step.subtitle.is_empty() {
            String::new()
        } else {
            format!(" ({})", step.subtitle)
        };
        println!("  {marker} {}{}", step.title, subtitle.bright_black());
        if step.active && !step.description.is_empty() {
            println!("      {}", step.description);
        }
    }

    if !issue.photos.is_empty() || !issue.audio.is_empty() || issue.voice_note.is_some() {
        println!();
        println!("{}", "Media".bold());
        for (i, photo) in issue.photos.iter().enumerate() {
            println!(
                "  Photo {}: {} [{}]",
                i + 1,
                photo,
                format_timestamp(issue.photo_timestamp(i))
            );
        }
        for (i, clip) in issue.audio.iter().enumerate() {
            println!("  Audio {}: {clip}", i + 1);
        }
        if let Some(note) = &issue.voice_note {
            println!("  Voice note: {note}");
        }
    }

    let completion = &issue.completion;
    if !completion.is_empty() {
        println!();
        println!("{}", "Completion evidence".bold());
        for (i, photo) in completion.completion_photos.iter().enumerate() {
            println!(
                "  Photo {}: {} [{}]",
                i + 1,
                photo,
                format_timestamp(completion.photo_timestamp(i))
            );
        }
        if let Some(notes) = &completion.completion_notes {
            println!("  Notes: {notes}");
        }
        if let Some(note) = &completion.completion_voice_note {
            println!("  Voice note: {note}");
        }
    }

    println!();
    let action = if timeline.can_reassign() { "Reassign" } else { "Assign" };
    let mut hint = format!("{action}: civic issue assign {} <worker-id>", issue.id);
    if timeline.is_resolved() {
        hint.push_str(" (reopens the issue)");
    }
    println!("{}", hint.bright_black());
}

fn decode(id: &str, value: Value) -> Result<Issue> {
    if value.is_null() {
        return Err(CivicError::IssueNotFound(id.to_string()));
    }
    Ok(Issue::from_value(id, value)?)
}

pub async fn show(store: &dyn DataStore, id: &str, watch: bool) -> Result<()> {
    let path = complaint_path(id);
    if !watch {
        let issue = decode(id, store.get(&path).await?)?;
        render_detail(&issue);
        return Ok(());
    }

    super::watch(store, &path, |value| {
        let issue = decode(id, value)?;
        begin_frame(&format!("Issue {id}"));
        render_detail(&issue);
        Ok(())
    })
    .await
}

pub async fn assign(store: &dyn DataStore, id: &str, worker: &str) -> Result<()> {
    let assignment = assignment::assign(store, id, worker).await?;

    if is_json_output() {
        print_json(&assignment);
        return Ok(());
    }
    match &assignment.previous_worker {
        Some(previous) => print_message(&format!(
            "Reassigned {} from {} to {}",
            assignment.issue_id, previous, assignment.worker_id
        )),
        None => print_message(&format!(
            "Assigned {} to {}",
            assignment.issue_id, assignment.worker_id
        )),
    }
    Ok(())
}

pub async fn status(store: &dyn DataStore, id: &str, status: &str) -> Result<()> {
    let status = IssueStatus::parse(status);
    if let IssueStatus::Other(text) = &status {
        tracing::warn!(issue = id, "writing unrecognised status '{text}'");
    }
    assignment::update_status(store, id, &status).await?;
    print_message(&format!("Updated {id} to {status}"));
    Ok(())
}
