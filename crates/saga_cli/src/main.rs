//! Saga CLI - Command-line interface for the saga story-world engine.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "saga")]
#[command(about = "Branching version control for story worlds", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new saga repository
    Init,
    /// Append an event to a branch
    Append {
        /// Branch to append under
        branch: String,
        /// Container being mutated (e.g. "scene_kings_court")
        container: String,
        /// Event type (e.g. CREATE_SCENE, UPDATE_CHARACTER)
        event_type: String,
        /// Payload as a JSON object
        payload: String,
    },
    /// Branch management
    Branch {
        #[command(subcommand)]
        command: BranchCommands,
    },
    /// Resolve a branch head into its full container set
    Checkout {
        /// Branch name
        branch: String,
        /// Output format (json, text)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Compare two branches' resolved states
    Compare {
        /// Side A branch
        branch_a: String,
        /// Side B branch
        branch_b: String,
        /// Output format (json, text)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Fork an era for one container
    ForkEra {
        /// Branch to fork from
        branch: String,
        /// Container the era is built around
        container: String,
        /// Name of the new era branch
        era: String,
    },
    /// Merge a source branch into a target branch
    Merge {
        /// Branch whose changes are replayed
        source: String,
        /// Branch the changes land on
        target: String,
    },
    /// Show a branch's event history
    Log {
        /// Branch name
        branch: String,
        /// Maximum number of events to show
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Verify store integrity
    Verify,
}

#[derive(Subcommand)]
enum BranchCommands {
    /// List all branches
    List,
    /// Create a branch forked at an event
    Create {
        /// Name of the new branch
        name: String,
        /// Fork point event id (defaults to the source branch's head)
        #[arg(long)]
        at: Option<u64>,
        /// Branch this one diverges from
        #[arg(long, default_value = "main")]
        from: String,
    },
    /// Discard a branch pointer (events remain)
    Discard {
        /// Branch name
        name: String,
    },
}

fn main() -> Result<()> {
    // Initialize tracing subscriber
    // Respects RUST_LOG environment variable (e.g., RUST_LOG=debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => commands::init::run(),
        Commands::Append {
            branch,
            container,
            event_type,
            payload,
        } => commands::append::run(&branch, &container, &event_type, &payload),
        Commands::Branch { command } => match command {
            BranchCommands::List => commands::branch::list(),
            BranchCommands::Create { name, at, from } => {
                commands::branch::create(&name, at, &from)
            }
            BranchCommands::Discard { name } => commands::branch::discard(&name),
        },
        Commands::Checkout { branch, format } => commands::checkout::run(&branch, &format),
        Commands::Compare {
            branch_a,
            branch_b,
            format,
        } => commands::compare::run(&branch_a, &branch_b, &format),
        Commands::ForkEra {
            branch,
            container,
            era,
        } => commands::merge::fork_era(&branch, &container, &era),
        Commands::Merge { source, target } => commands::merge::run(&source, &target),
        Commands::Log { branch, limit } => commands::log::run(&branch, limit),
        Commands::Verify => commands::verify::run(),
    }
}
