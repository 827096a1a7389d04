//! CLI argument definitions for Bugtrail.

use crate::models::{BugStatus, Severity};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Bugtrail - Bug report lifecycle tracking for humans and AI agents.
///
/// Users report bugs, managers triage and assign them, developers and AI
/// agents fix them, testers verify or send them back.
#[derive(Parser, Debug)]
#[command(name = "bt")]
#[command(author, about = "Bug report lifecycle tracking for humans and AI agents", long_about = None)]
#[command(version = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("BT_GIT_COMMIT"),
    " ",
    env!("BT_BUILD_TIMESTAMP"),
    ")"
))]
pub struct Cli {
    /// Output in human-readable format instead of JSON
    #[arg(short = 'H', long = "human", global = true)]
    pub human_readable: bool,

    /// Run as if bt was started in <path> instead of the current directory.
    /// Can also be set via BT_REPO environment variable.
    #[arg(short = 'C', long = "repo", global = true, env = "BT_REPO")]
    pub repo_path: Option<PathBuf>,

    /// Identity to act as (recorded as author and assignee).
    /// Can also be set via BT_ACTOR environment variable.
    #[arg(long = "as", global = true, env = "BT_ACTOR")]
    pub actor: Option<String>,

    /// Log engine activity to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

fn parse_status(s: &str) -> Result<BugStatus, String> {
    s.parse()
}

fn parse_severity(s: &str) -> Result<Severity, String> {
    s.parse()
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// File a new bug report
    Report {
        /// Short summary of the problem
        title: String,

        /// What happened
        #[arg(short, long)]
        description: String,

        /// Steps to reproduce
        #[arg(short = 'r', long = "steps")]
        reproduction_steps: Option<String>,

        /// Browser / OS / app version (collected automatically if omitted)
        #[arg(long)]
        system_info: Option<String>,

        /// Relevant log lines
        #[arg(long)]
        log_context: Option<String>,

        /// Path to a screenshot
        #[arg(long)]
        screenshot: Option<String>,

        /// Display name for the screenshot (defaults to the file name)
        #[arg(long, requires = "screenshot")]
        screenshot_name: Option<String>,

        /// Host session the report came from
        #[arg(long)]
        session: Option<String>,

        /// Reporter name shown in views (defaults to the actor identity)
        #[arg(long)]
        display_name: Option<String>,
    },

    /// Show a bug with its full progress trail
    Show {
        /// Bug ID (e.g., bug-1a2b3c4d)
        id: String,
    },

    /// Triage, assignment and oversight
    Manager {
        #[command(subcommand)]
        command: ManagerCommands,
    },

    /// Developer queue and progress updates
    Dev {
        #[command(subcommand)]
        command: DevCommands,
    },

    /// AI agent queue and fixes
    Ai {
        #[command(subcommand)]
        command: AiCommands,
    },

    /// Verification queue and audit
    Tester {
        #[command(subcommand)]
        command: TesterCommands,
    },

    /// Repository settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// System administration
    System {
        #[command(subcommand)]
        command: SystemCommands,
    },
}

/// Sort order for `manager list`
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ListSort {
    /// Newest report first
    #[default]
    Reported,
    /// Most recently changed first
    Updated,
}

/// Manager subcommands
#[derive(Subcommand, Debug)]
pub enum ManagerCommands {
    /// List bugs (open bugs by default)
    List {
        /// Only bugs in this status (e.g., "Good-to-Test")
        #[arg(long, value_parser = parse_status)]
        status: Option<BugStatus>,

        /// Only bugs with this severity
        #[arg(long, value_parser = parse_severity)]
        severity: Option<Severity>,

        /// Include Resolved and Dismissed bugs
        #[arg(short, long)]
        all: bool,

        /// Sort order
        #[arg(long, value_enum, default_value_t = ListSort::Reported)]
        sort: ListSort,

        /// Maximum number of bugs (defaults to the configured list-limit)
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Set severity (Critical, High, Medium, Low)
    Severity {
        /// Bug ID
        id: String,

        #[arg(value_parser = parse_severity)]
        severity: Severity,
    },

    /// Set category
    Category {
        /// Bug ID
        id: String,

        category: String,
    },

    /// Override status (audited)
    Status {
        /// Bug ID
        id: String,

        /// New status, exactly as written (e.g., "In Progress")
        #[arg(value_parser = parse_status)]
        status: BugStatus,

        /// Reason recorded in the override note
        #[arg(long)]
        reason: Option<String>,
    },

    /// Dismiss a bug (won't fix, duplicate, not a bug)
    Dismiss {
        /// Bug ID
        id: String,

        /// Reason recorded in the override note
        #[arg(long)]
        reason: Option<String>,
    },

    /// Set severity and category and mark a new bug Triaged
    Triage {
        /// Bug ID
        id: String,

        #[arg(short, long, value_parser = parse_severity)]
        severity: Severity,

        #[arg(short, long)]
        category: String,

        /// Triage remark
        #[arg(short, long)]
        note: Option<String>,
    },

    /// Assign one or more bugs (each id is processed independently)
    Assign {
        /// Bug IDs
        #[arg(required = true)]
        ids: Vec<String>,

        /// Developer or AI agent identity (defaults to yourself)
        #[arg(short, long)]
        to: Option<String>,
    },

    /// Open work per assignee
    Workload,

    /// Apply a JSON array of updates ({bug_id, severity?, category?, status?, note?})
    Apply {
        /// JSON file with the updates, or "-" for stdin
        file: String,
    },
}

/// Developer subcommands
#[derive(Subcommand, Debug)]
pub enum DevCommands {
    /// Move a bug forward ("In Progress", "Good-to-Test") or add a progress note
    Progress {
        /// Bug ID
        id: String,

        /// Target status, exactly as written
        #[arg(value_parser = parse_status)]
        status: BugStatus,

        /// Progress note
        #[arg(short, long)]
        note: Option<String>,
    },

    /// Bugs assigned to you
    Mine {
        /// Show another assignee's bugs
        #[arg(long)]
        assignee: Option<String>,
    },
}

/// AI agent subcommands
#[derive(Subcommand, Debug)]
pub enum AiCommands {
    /// Bugs for AI agents to work on
    List {
        /// Statuses to include (repeatable or comma-separated; default Assigned)
        #[arg(long, value_delimiter = ',', value_parser = parse_status)]
        status: Vec<BugStatus>,

        /// Only bugs with this severity
        #[arg(long, value_parser = parse_severity)]
        severity: Option<Severity>,

        /// Maximum number of bugs
        #[arg(short, long, default_value_t = crate::storage::queries::DEFAULT_AI_LIMIT)]
        limit: usize,
    },

    /// Full details of one bug
    Show {
        /// Bug ID
        id: String,
    },

    /// Record a fix and hand the bug to testers
    Fix {
        /// Bug ID
        id: String,

        /// What was changed
        notes: String,
    },
}

/// Tester subcommands
#[derive(Subcommand, Debug)]
pub enum TesterCommands {
    /// Bugs waiting for verification
    Queue,

    /// Verify a fix and resolve the bug
    Resolve {
        /// Bug ID
        id: String,

        /// Verification note
        #[arg(short, long)]
        note: Option<String>,
    },

    /// Reject a fix and return the bug to its assignee
    SendBack {
        /// Bug ID
        id: String,

        /// What is still wrong
        notes: String,
    },

    /// Resolved bugs with resolver and fixer
    Audit {
        /// Maximum number of bugs (defaults to the configured list-limit)
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

/// Configuration subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Get a configuration value
    Get {
        /// Configuration key
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,
        /// Configuration value
        value: String,
    },

    /// List all configuration values
    List,
}

/// System administration subcommands
#[derive(Subcommand, Debug)]
pub enum SystemCommands {
    /// Initialize bugtrail for this repository
    Init,
}
