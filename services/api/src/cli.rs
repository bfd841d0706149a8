use crate::batch::{run_export, run_import, run_list, run_matching, ExportArgs, ImportArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use event_match::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Event Match",
    about = "Serve the event matchmaking API and run operator batch jobs",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Recompute every attendee's top matches from the personality quizzes
    RunMatching,
    /// Load quiz answers from a CSV export
    Import(ImportArgs),
    /// Inspect stored match results
    Matches {
        #[command(subcommand)]
        command: MatchesCommand,
    },
}

#[derive(Subcommand, Debug)]
enum MatchesCommand {
    /// Print every attendee's ranked matches
    List,
    /// Write all match rows as CSV
    Export(ExportArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::RunMatching => run_matching(),
        Command::Import(args) => run_import(args),
        Command::Matches {
            command: MatchesCommand::List,
        } => run_list(),
        Command::Matches {
            command: MatchesCommand::Export(args),
        } => run_export(args),
    }
}
