mod app;
mod commands;
mod render;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "revisu-cli", about = "Spaced-repetition review of your notes", version)]
struct Cli {
    /// Use a specific config file (default: ~/.config/revisu/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "plain")]
    format: OutputFormat,

    /// Disable ANSI colors
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Plain,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Extract a topic from a note file and schedule it for review
    Process {
        /// Path to the note
        path: PathBuf,
        /// File type (defaults to the file extension)
        #[arg(long = "type")]
        file_type: Option<String>,
    },

    /// List topics due for review
    Due,

    /// Record a review of a topic
    Review {
        /// Topic id
        topic_id: i64,
        /// Recall quality from 0 (blackout) to 5 (perfect)
        #[arg(allow_negative_numbers = true)]
        quality: i32,
    },

    /// Show a topic with its questions
    Show {
        /// Topic id
        topic_id: i64,
    },

    /// List processed files, most recent first
    Files {
        /// Maximum files
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show a processed file and its topics
    File {
        /// File id
        file_id: i64,
    },

    /// List all tags
    Tags,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let use_color = !cli.no_color && atty_check();
    let app = app::App::new(cli.config.as_deref())?;

    match cli.command {
        Command::Process { path, file_type } => {
            commands::process::run(&app, &path, file_type.as_deref(), &cli.format, use_color)?;
        }
        Command::Due => {
            commands::due::run(&app, &cli.format, use_color)?;
        }
        Command::Review { topic_id, quality } => {
            commands::review::run(&app, topic_id, quality, &cli.format, use_color)?;
        }
        Command::Show { topic_id } => {
            commands::show::run(&app, topic_id, &cli.format, use_color)?;
        }
        Command::Files { limit } => {
            commands::files::run_list(&app, limit, &cli.format, use_color)?;
        }
        Command::File { file_id } => {
            commands::files::run_show(&app, file_id, &cli.format, use_color)?;
        }
        Command::Tags => {
            commands::tags::run(&app, &cli.format)?;
        }
    }

    Ok(())
}

/// Check if stdout is a terminal (for color support)
fn atty_check() -> bool {
    unsafe { libc_isatty(1) != 0 }
}

extern "C" {
    #[link_name = "isatty"]
    fn libc_isatty(fd: i32) -> i32;
}
