mod count_cmd;
mod doctor;
mod limit_cmd;
mod logging;
mod models_cmd;
mod request;
mod usage_cmd;

use std::env;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use clawmeter_core::config::Paths;

#[derive(Parser)]
#[command(
    name = "clawmeter",
    about = "Clawmeter - token accounting and rate limiting for chat context windows"
)]
struct Cli {
    /// Print debug logs to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Count tokens in text (arguments, --file, or stdin)
    Count {
        /// Text to count
        text: Vec<String>,
        /// Read text from a file instead
        #[arg(long)]
        file: Option<PathBuf>,
        /// Model ID or shortname
        #[arg(long)]
        model: Option<String>,
    },
    /// Show context window usage for a request file
    Usage {
        /// Request JSON ("-" for stdin)
        request: PathBuf,
        /// Model ID or shortname (overrides the request's model)
        #[arg(long)]
        model: Option<String>,
        /// Context window size (defaults to the model's)
        #[arg(long, allow_negative_numbers = true)]
        max_tokens: Option<i64>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the summarization prompt for a request's older history
    Compact {
        /// Request JSON ("-" for stdin)
        request: PathBuf,
        /// Messages to keep verbatim
        #[arg(long)]
        keep_recent: Option<usize>,
    },
    /// Run a burst of admissions for one session through the rate limiter
    Limit {
        /// Request JSON ("-" for stdin)
        request: PathBuf,
        /// Session ID
        #[arg(long, default_value = "cli")]
        session: String,
        /// Number of back-to-back requests
        #[arg(long, default_value = "1")]
        burst: u32,
    },
    /// List known model context windows
    Models,
    /// Check settings and tokenizer availability
    Doctor,
}

fn resolve_paths() -> Paths {
    let working_dir = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    Paths::resolve(&working_dir)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let paths = resolve_paths();
    logging::init(cli.verbose, &paths.log_file);

    match cli.command {
        Some(Commands::Count { text, file, model }) => {
            count_cmd::count(&text, file.as_deref(), model.as_deref(), &paths)
        }
        Some(Commands::Usage {
            request,
            model,
            max_tokens,
            json,
        }) => usage_cmd::show_usage(&request, model.as_deref(), max_tokens, json, &paths),
        Some(Commands::Compact {
            request,
            keep_recent,
        }) => usage_cmd::show_compaction(&request, keep_recent, &paths),
        Some(Commands::Limit {
            request,
            session,
            burst,
        }) => limit_cmd::run_burst(&request, &session, burst, &paths),
        Some(Commands::Models) => models_cmd::list_models(&paths),
        Some(Commands::Doctor) | None => doctor::run_doctor(&paths),
    }
}
