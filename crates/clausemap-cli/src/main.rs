mod commands;
mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "clausemap",
    version,
    about = "Locate contract clauses on PDF pages for highlighting"
)]
struct Cli {
    /// Log matching decisions to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the positioned text fragments of a PDF
    Extract {
        /// Path to PDF file
        input_file: PathBuf,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,

        /// Extraction backend: native (default) or pdftotext
        #[arg(long, value_name = "NAME")]
        backend: Option<String>,
    },
    /// Print the plain text of a PDF, one blank line after each page
    Text {
        /// Path to PDF file
        input_file: PathBuf,

        /// Extraction backend: native (default) or pdftotext
        #[arg(long, value_name = "NAME")]
        backend: Option<String>,
    },
    /// Find the page position of each clause in a PDF
    Locate {
        /// Path to PDF file
        input_file: PathBuf,

        /// JSON array of clauses, each with "text" and "page"
        #[arg(short, long, value_name = "FILE")]
        clauses: PathBuf,

        /// Locator config file (see `clausemap config schema`)
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Extraction backend, overriding the config file
        #[arg(long, value_name = "NAME")]
        backend: Option<String>,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,
    },
    /// Inspect and validate locator configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the default configuration as JSON
    Show,
    /// Describe every configuration field
    Schema,
    /// Validate a config file
    Validate {
        /// Path to JSON config file
        file: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Extract {
            input_file,
            output,
            backend,
        } => commands::extract::run(input_file, &output, backend.as_deref()),
        Commands::Text {
            input_file,
            backend,
        } => commands::text::run(input_file, backend.as_deref()),
        Commands::Locate {
            input_file,
            clauses,
            config,
            backend,
            output,
        } => commands::locate::run(input_file, clauses, config, backend.as_deref(), &output),
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::show(),
            ConfigAction::Schema => commands::config::schema(),
            ConfigAction::Validate { file } => commands::config::validate(&file),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
