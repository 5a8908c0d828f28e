use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use crate::reports::Period;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Compact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AvailabilityArg {
    Available,
    Occupied,
}

#[derive(Parser)]
#[command(name = "civic")]
#[command(about = "Admin console for municipal civic-issue tracking", version)]
#[command(after_help = "EXAMPLES:
    civic login                           Sign in as an administrator
    civic dashboard --watch               Live status overview
    civic issues --status pending         List pending issues
    civic issue assign GBG-0042 GBG-110001-003   Assign a worker
    civic worker create --name \"Ravi\" --phone 9876543210 --department garbage --pincode 110001")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (table, json, compact)
    #[arg(long, short = 'o', global = true, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Output as JSON (alias for --format json)
    #[arg(long, global = true, hide = true)]
    pub json: bool,

    /// Suppress success messages
    #[arg(long, short, global = true)]
    pub quiet: bool,

    /// Show debug logs and detailed error information
    #[arg(long, short, global = true)]
    pub verbose: bool,
}

impl Cli {
    /// Get the effective output format, considering --json flag
    pub fn output_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            self.format
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in with an administrator account
    #[command(after_help = "EXAMPLES:
    civic login
    civic login --email admin@city.gov.in")]
    Login {
        /// Account email (prompted for if omitted)
        #[arg(long, short)]
        email: Option<String>,
    },
    /// Sign out and forget the stored session
    Logout,
    /// Show the signed-in administrator
    Whoami,
    /// Manage a single issue
    #[command(
        alias = "i",
        after_help = "EXAMPLES:
    civic issue show GBG-0042
    civic issue show GBG-0042 --watch
    civic issue assign GBG-0042 GBG-110001-003
    civic issue status GBG-0042 \"In Progress\""
    )]
    Issue {
        #[command(subcommand)]
        action: IssueCommands,
    },
    /// List issues
    #[command(after_help = "EXAMPLES:
    civic issues
    civic issues --status resolved --category garbage
    civic issues --search \"street light\" --limit 20
    civic issues --watch")]
    Issues(IssueListArgs),
    /// Manage a single worker
    #[command(
        alias = "w",
        after_help = "EXAMPLES:
    civic worker show GBG-110001-003
    civic worker create --name \"Ravi Kumar\" --phone 9876543210 --department garbage --pincode 110001"
    )]
    Worker {
        #[command(subcommand)]
        action: WorkerCommands,
    },
    /// List workers
    #[command(after_help = "EXAMPLES:
    civic workers
    civic workers --department \"Road Damage\" --availability available
    civic workers --issue RDG-0007")]
    Workers(WorkerListArgs),
    /// Status overview and recent issues
    #[command(after_help = "EXAMPLES:
    civic dashboard
    civic dashboard --watch")]
    Dashboard {
        /// Keep running and refresh on every change
        #[arg(long)]
        watch: bool,
    },
    /// Resolution, occupancy and category statistics
    #[command(after_help = "EXAMPLES:
    civic report
    civic report --period 7d --category garbage")]
    Report(ReportArgs),
    /// Generate shell completions
    #[command(after_help = "EXAMPLES:
    civic completions bash > ~/.bash_completion.d/civic
    civic completions zsh > ~/.zfunc/_civic
    civic completions fish > ~/.config/fish/completions/civic.fish")]
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
    /// Initialize configuration file interactively
    #[command(after_help = "EXAMPLES:
    civic init")]
    Init,
}

#[derive(Subcommand)]
pub enum IssueCommands {
    /// Show issue details, timeline, media and completion evidence
    #[command(alias = "view")]
    Show {
        /// Issue identifier (e.g., GBG-0042)
        id: String,

        /// Keep running and refresh on every change
        #[arg(long)]
        watch: bool,
    },
    /// Assign or reassign a worker
    Assign {
        /// Issue identifier
        id: String,

        /// Worker identifier (e.g., GBG-110001-003)
        worker: String,
    },
    /// Set the issue status
    Status {
        /// Issue identifier
        id: String,

        /// New status (Pending, Assigned, "In Progress", Resolved, Completed)
        status: String,
    },
}

#[derive(Subcommand)]
pub enum WorkerCommands {
    /// Show a worker with active and resolved issues
    #[command(alias = "view")]
    Show {
        /// Worker identifier
        id: String,
    },
    /// Create a worker profile
    Create(WorkerCreateArgs),
}

#[derive(Args, Clone)]
pub struct IssueListArgs {
    /// Match title, description or location (case-insensitive)
    #[arg(long, short)]
    pub search: Option<String>,

    /// Filter by status ("all" for every status)
    #[arg(long)]
    pub status: Option<String>,

    /// Filter by category ("all" for every category)
    #[arg(long)]
    pub category: Option<String>,

    /// Maximum number of issues to show
    #[arg(long, short, default_value = "50")]
    pub limit: usize,

    /// Keep running and refresh on every change
    #[arg(long)]
    pub watch: bool,
}

#[derive(Args, Clone)]
pub struct WorkerListArgs {
    /// Filter by department
    #[arg(long)]
    pub department: Option<String>,

    /// Filter by location
    #[arg(long)]
    pub location: Option<String>,

    /// Filter by availability
    #[arg(long, value_enum)]
    pub availability: Option<AvailabilityArg>,

    /// Only workers in this issue's department
    #[arg(long)]
    pub issue: Option<String>,
}

#[derive(Args, Clone)]
pub struct WorkerCreateArgs {
    /// Full name
    #[arg(long)]
    pub name: String,

    /// 10-digit phone number
    #[arg(long)]
    pub phone: String,

    /// Department (garbage, streetlight, roaddamage, water, drainage)
    #[arg(long)]
    pub department: String,

    /// 6-digit pincode (uses default_pincode if not specified)
    #[arg(long)]
    pub pincode: Option<String>,

    /// Work area
    #[arg(long)]
    pub location: Option<String>,
}

#[derive(Args, Clone)]
pub struct ReportArgs {
    /// Restrict the map view to one category
    #[arg(long)]
    pub category: Option<String>,

    /// Time window: 7d, 30d, year or all
    #[arg(long, default_value = "30d")]
    pub period: Period,
}
