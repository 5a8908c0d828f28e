use chrono::Utc;
use colored::Colorize;
use tabled::Tabled;

use crate::assignment::load_issues;
use crate::cli::ReportArgs;
use crate::error::Result;
use crate::output::{print_item, print_table};
use crate::reports::{report, CategoryCount, DepartmentOccupancy, Report};
use crate::store::{DataStore, WORKERS};
use crate::types::Worker;

#[derive(Tabled)]
struct DepartmentRow {
    #[tabled(rename = "Department")]
    department: String,
    #[tabled(rename = "Available")]
    available: usize,
    #[tabled(rename = "Occupied")]
    occupied: usize,
}

impl From<&DepartmentOccupancy> for DepartmentRow {
    fn from(d: &DepartmentOccupancy) -> Self {
        Self {
            department: d.department.clone(),
            available: d.available,
            occupied: d.occupied,
        }
    }
}

#[derive(Tabled)]
struct CategoryRow {
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Issues")]
    count: usize,
}

impl From<&CategoryCount> for CategoryRow {
    fn from(c: &CategoryCount) -> Self {
        Self {
            category: c.category.clone(),
            count: c.count,
        }
    }
}

fn print_report(r: &Report) {
    println!("{}", "Key metrics".bold());
    println!("  Total issues:     {}", r.total_issues);
    println!(
        "  Resolution rate:  {}% ({} of {} resolved)",
        r.resolution_percent, r.resolution.count, r.resolution.total
    );
    println!("  Active workers:   {}", r.active_workers);
    println!(
        "  Occupancy:        {} available, {} occupied",
        r.occupancy.available.to_string().green(),
        r.occupancy.occupied.to_string().red()
    );

    if !r.occupancy.by_department.is_empty() {
        println!();
        print_table(&r.occupancy.by_department, |d| DepartmentRow::from(d));
    }

    println!();
    println!("{}", "Issues by category".bold());
    print_table(&r.categories, |c| CategoryRow::from(c));

    println!();
    let scope = r.category.as_deref().unwrap_or("all categories");
    println!(
        "{} {} issues in view ({scope}, {}), {} with coordinates",
        "Map:".bold(),
        r.in_view,
        r.period.label(),
        r.located
    );
    if !r.category_options.is_empty() {
        println!("Categories: {}", r.category_options.join(", ").bright_black());
    }
}

pub async fn run(store: &dyn DataStore, args: ReportArgs) -> Result<()> {
    let workers = Worker::collection(store.get(WORKERS).await?);
    let issues = load_issues(store).await?;
    let summary = report(
        &issues,
        &workers,
        args.category.as_deref(),
        args.period,
        Utc::now(),
    );
    print_item(&summary, print_report);
    Ok(())
}
