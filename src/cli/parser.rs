use crate::export::ExportFormat;
use clap::{Parser, Subcommand};

/// Command-line interface definition for rBreakTracker
#[derive(Parser)]
#[command(
    name = "rbreaktracker",
    version = env!("CARGO_PKG_VERSION"),
    about = "Team break tracker: punch in/out, live presence and CSV/JSON reports backed by SQLite",
    long_about = None
)]
pub struct Cli {
    /// Override database path (useful for tests or custom DB)
    #[arg(global = true, long = "db")]
    pub db: Option<String>,

    /// Run in test mode (no config file update)
    #[arg(global = true, long = "test", hide = true)]
    pub test: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database and configuration
    Init,

    /// Show the configuration
    Config {
        #[arg(long = "print", help = "Print the current configuration")]
        print_config: bool,
    },

    /// Manage the team roster
    Member {
        #[command(subcommand)]
        action: MemberAction,
    },

    /// Start a break for a member (by id or name)
    #[command(name = "in")]
    PunchIn { member: String },

    /// End the current break of a member (by id or name)
    #[command(name = "out")]
    PunchOut { member: String },

    /// Show who is on break and for how long
    Status,

    /// Follow changes live until interrupted
    Watch {
        #[arg(long = "updates", help = "Stop after this many updates")]
        updates: Option<usize>,
    },

    /// Export intervals for a period
    Export {
        #[arg(long, value_enum, default_value = "csv")]
        format: ExportFormat,

        #[arg(long, value_name = "FILE")]
        file: String,

        #[arg(
            long,
            value_name = "RANGE",
            help = "YYYY, YYYY-MM, YYYY-MM-DD, A:B ranges, or 'all' (default: today)"
        )]
        range: Option<String>,

        #[arg(long, short = 'f')]
        force: bool,
    },

    /// Print the internal log table
    Log {
        #[arg(long = "print", help = "Print rows from the internal log table")]
        print: bool,

        #[arg(long = "limit", default_value_t = 50)]
        limit: usize,
    },
}

#[derive(Subcommand)]
pub enum MemberAction {
    /// Add a member
    Add {
        name: String,

        #[arg(long)]
        email: Option<String>,

        #[arg(long, help = "Grant administrator privileges")]
        admin: bool,
    },

    /// List members
    List,

    /// Remove a member (closing an ongoing break)
    Remove { id: i64 },
}
