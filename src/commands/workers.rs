use colored::Colorize;
use serde::Serialize;
use tabled::Tabled;

use crate::assignment::{
    active_assigned_count, availability, load_issues, worker_load, Availability, WorkerLoad,
};
use crate::cli::{AvailabilityArg, WorkerCreateArgs, WorkerListArgs};
use crate::config::Config;
use crate::error::{CivicError, Result};
use crate::filter::WorkerFilter;
use crate::output::{
    availability_colored, format_relative, is_json_output, print_item, print_json,
    print_message, print_table, truncate,
};
use crate::profile::{create_worker, NewWorker, DEFAULT_WORKER_PASSWORD};
use crate::store::{complaint_path, worker_path, DataStore, WORKERS};
use crate::types::{Issue, Worker};

impl From<AvailabilityArg> for Availability {
    fn from(arg: AvailabilityArg) -> Self {
        match arg {
            AvailabilityArg::Available => Availability::Available,
            AvailabilityArg::Occupied => Availability::Occupied,
        }
    }
}

/// A worker with the load figures derived from the issue collection.
#[derive(Serialize)]
struct WorkerSummary<'a> {
    #[serde(flatten)]
    worker: &'a Worker,
    active: usize,
    availability: Availability,
}

#[derive(Tabled)]
struct WorkerRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Department")]
    department: String,
    #[tabled(rename = "Location")]
    location: String,
    #[tabled(rename = "Phone")]
    phone: String,
    #[tabled(rename = "Active")]
    active: usize,
    #[tabled(rename = "Status")]
    availability: String,
}

impl From<&WorkerSummary<'_>> for WorkerRow {
    fn from(summary: &WorkerSummary<'_>) -> Self {
        let worker = summary.worker;
        Self {
            id: worker.id.clone(),
            name: worker.name.clone(),
            department: worker.department.clone(),
            location: truncate(&worker.location, 30),
            phone: worker.phone.clone(),
            active: summary.active,
            availability: availability_colored(summary.availability),
        }
    }
}

#[derive(Tabled)]
struct AssignedIssueRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Reported")]
    reported: String,
}

impl From<&Issue> for AssignedIssueRow {
    fn from(issue: &Issue) -> Self {
        Self {
            id: issue.id.clone(),
            title: truncate(&issue.headline(), 40),
            status: issue.status.colored(),
            reported: format_relative(issue.reported_at),
        }
    }
}

pub async fn list(store: &dyn DataStore, args: WorkerListArgs) -> Result<()> {
    let mut filter = WorkerFilter {
        department: args.department,
        location: args.location,
        availability: args.availability.map(Availability::from),
    };
    if let Some(issue_id) = &args.issue {
        let value = store.get(&complaint_path(issue_id)).await?;
        if value.is_null() {
            return Err(CivicError::IssueNotFound(issue_id.clone()));
        }
        filter = filter.for_issue(&Issue::from_value(issue_id, value)?);
    }

    let workers = Worker::collection(store.get(WORKERS).await?);
    let issues = load_issues(store).await?;

    let summaries: Vec<WorkerSummary> = filter
        .apply(&workers, &issues)
        .into_iter()
        .map(|worker| WorkerSummary {
            worker,
            active: active_assigned_count(&issues, &worker.id),
            availability: availability(&issues, &worker.id),
        })
        .collect();
    print_table(&summaries, |s| WorkerRow::from(s));
    Ok(())
}

#[derive(Serialize)]
struct WorkerDetail<'a> {
    worker: &'a Worker,
    #[serde(flatten)]
    load: WorkerLoad<'a>,
}

pub async fn show(store: &dyn DataStore, id: &str) -> Result<()> {
    let value = store.get(&worker_path(id)).await?;
    if value.is_null() {
        return Err(CivicError::WorkerNotFound(id.to_string()));
    }
    let worker = Worker::from_value(id, value)?;
    let issues = load_issues(store).await?;
    let detail = WorkerDetail {
        worker: &worker,
        load: worker_load(&issues, id),
    };

    print_item(&detail, |d| {
        let w = d.worker;
        println!("{} - {}", w.worker_id.bold(), w.name);
        println!();
        println!("Department: {}", w.department);
        println!("Location:   {}", if w.location.is_empty() { "-" } else { w.location.as_str() });
        println!("Pincode:    {}", w.pincode);
        println!("Phone:      {}", w.phone);
        println!("Status:     {}", availability_colored(d.load.availability));

        println!();
        println!("{} ({})", "Active issues".bold(), d.load.active.len());
        if !d.load.active.is_empty() {
            print_table(&d.load.active, |issue| AssignedIssueRow::from(*issue));
        }
        println!();
        println!("{} ({})", "Resolved issues".bold(), d.load.resolved.len());
        if !d.load.resolved.is_empty() {
            print_table(&d.load.resolved, |issue| AssignedIssueRow::from(*issue));
        }
    });
    Ok(())
}

pub async fn create(store: &dyn DataStore, config: &Config, args: WorkerCreateArgs) -> Result<()> {
    let pincode = config
        .resolve_pincode(args.pincode.as_deref())
        .ok_or_else(|| CivicError::validation("pincode", "Pincode is required."))?;
    let input = NewWorker {
        name: args.name,
        phone: args.phone,
        department: args.department,
        pincode,
        location: args.location,
    };

    let worker = create_worker(store, &input).await?;

    if is_json_output() {
        print_json(&worker);
        return Ok(());
    }
    print_message(&format!("Created worker {} - {}", worker.worker_id, worker.name));
    print_message(&format!("Initial password: {DEFAULT_WORKER_PASSWORD}"));
    Ok(())
}
