// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stackyard")]
#[command(about = "Converge container stacks onto declared versions through a durable command queue")]
#[command(version)]
pub struct Cli {
    /// Path to the configuration file (default: discovered in the current directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print results as JSON lines
    #[arg(long, global = true, conflicts_with = "quiet")]
    pub json: bool,

    /// Print only essential results
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a stackyard.yml with default settings
    Init {
        /// Prefix for runtime object names and labels
        #[arg(long)]
        prefix: Option<String>,

        /// Overwrite an existing configuration file
        #[arg(short, long)]
        force: bool,
    },

    /// Create and inspect stacks
    #[command(subcommand)]
    Stack(StackCommands),

    /// Create and inspect stack versions
    #[command(subcommand)]
    Version(VersionCommands),

    /// Queue convergence of a stack onto a version
    Apply {
        stack: String,
        /// Version label (default: the latest version)
        version: Option<String>,
    },

    /// Queue a start of every container in a stack
    Start { stack: String },

    /// Queue a stop of every container in a stack
    Stop { stack: String },

    /// Queue a stop followed by a start
    Restart { stack: String },

    /// Queue removal of a stack's containers, network and volumes
    Delete { stack: String },

    /// Queue convergence back onto an earlier version
    Rollback { stack: String, version: String },

    /// Queue a deploy into one service's container
    Deploy {
        stack: String,
        service: String,

        /// Artifact to record with the deploy
        #[arg(long)]
        artifact: Option<String>,

        /// Strategy label to record with the deploy
        #[arg(long)]
        strategy: Option<String>,

        /// Command to run inside the container
        #[arg(last = true)]
        command: Vec<String>,
    },

    /// Cancel a command that has not started
    Cancel { id: i64 },

    /// List recent commands
    Commands {
        /// Only commands for this stack
        #[arg(long)]
        stack: Option<String>,

        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Show one command
    Command { id: i64 },

    /// Show a command's log, oldest line first
    Logs {
        id: i64,

        /// Number of most recent lines (default: logs.page_size)
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show what applying a version would change
    Plan {
        stack: String,
        /// Version label (default: the latest version)
        version: Option<String>,
    },

    /// Show a stack's containers as the runtime sees them
    Status { stack: String },

    /// Show recent output of a service's container
    ContainerLogs {
        stack: String,
        service: String,

        #[arg(long, default_value_t = 100)]
        tail: u64,

        /// Keep printing new output until interrupted
        #[arg(short, long)]
        follow: bool,
    },

    /// Run the command worker
    Worker {
        /// Process every claimable command, then exit
        #[arg(long)]
        once: bool,
    },
}

#[derive(Subcommand)]
pub enum StackCommands {
    /// Register a new stack
    Create {
        id: String,
        /// Display name (default: the id)
        #[arg(long)]
        name: Option<String>,
    },

    /// List stacks
    List,

    /// Show a stack and its applied version
    Show { id: String },
}

#[derive(Subcommand)]
pub enum VersionCommands {
    /// Store a version from a JSON or YAML body file
    Create {
        stack: String,

        /// Body file with a top-level `compose` key
        #[arg(short, long)]
        file: PathBuf,

        /// Version label (default: v<epoch-millis>)
        #[arg(long = "label")]
        label: Option<String>,

        #[arg(long)]
        comment: Option<String>,

        /// Author recorded on the version (default: cli@<hostname>)
        #[arg(long)]
        created_by: Option<String>,
    },

    /// List versions, newest first
    List {
        stack: String,

        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Print a version's body
    Show { stack: String, version: String },
}
