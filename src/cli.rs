use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Read PDF and EPUB documents one word at a time
#[derive(Parser, Debug)]
#[command(name = "rsvp-reader", version, about)]
pub struct Cli {
    /// Directory holding the reading position, pace, and history
    #[arg(long, env = "RSVP_STATE_DIR", default_value = ".rsvp-reader", global = true)]
    pub state_dir: PathBuf,

    /// Configuration file (TOML)
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Present a document word by word in the terminal
    Read(ReadArgs),

    /// Print the extracted text of a document, one unit per paragraph
    Extract(ExtractArgs),

    /// Inspect or edit the reading history
    #[command(subcommand)]
    History(HistoryCommand),
}

#[derive(clap::Args, Debug)]
pub struct ReadArgs {
    /// Path to the input PDF or EPUB file
    pub input: PathBuf,

    /// Pace in words per minute (60-1000)
    #[arg(short, long)]
    pub wpm: Option<u32>,

    /// Start at this token index instead of the saved position
    #[arg(long, conflicts_with_all = ["from_unit", "restart"])]
    pub from_token: Option<usize>,

    /// Start at the first token of this page or chapter (1-indexed)
    #[arg(long, conflicts_with = "restart")]
    pub from_unit: Option<usize>,

    /// Ignore the saved position and start from the beginning
    #[arg(long, default_value_t = false)]
    pub restart: bool,

    /// Pause after presenting this many tokens
    #[arg(short = 'n', long)]
    pub count: Option<usize>,
}

#[derive(clap::Args, Debug)]
pub struct ExtractArgs {
    /// Path to the input PDF or EPUB file
    pub input: PathBuf,

    /// Print one token per line instead of normalized unit text
    #[arg(long, default_value_t = false)]
    pub tokens: bool,
}

#[derive(Subcommand, Debug)]
pub enum HistoryCommand {
    /// List documents, most recent first
    List,

    /// Forget the record for one document
    Delete {
        /// Document name as shown by `history list`
        name: String,
    },
}
