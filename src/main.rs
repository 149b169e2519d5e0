mod bibtex;
mod cache;
mod citations;
mod commands;
mod config;
mod diagnostics;
mod document;
mod error;
mod extract;
mod freshness;
mod registry;
mod renumber;
mod rewrite;
mod types;
mod watch;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt as _, util::SubscriberInitExt as _};

#[derive(Parser)]
#[command(
    name = "mdxref",
    version,
    about = "Cross-reference numbering and citations for notebook markdown"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Log scan and renumbering details to stderr
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Report undefined references and duplicate labels
    Check {
        /// Notebook (.ipynb), Markdown file, or directory of chapters
        document: PathBuf,
    },
    /// Rewrite labels, citations, and the bibliography block
    Render {
        /// Notebook (.ipynb), Markdown file, or directory of chapters
        document: PathBuf,
        /// Write to this file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// List numbered labels, citation order, and duplicates
    Scan {
        /// Notebook (.ipynb), Markdown file, or directory of chapters
        document: PathBuf,
        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },
    /// Render, then re-render incrementally whenever the document changes
    Watch {
        /// Notebook (.ipynb), Markdown file, or directory of chapters
        document: PathBuf,
        /// Write to this file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

/// Install the stderr log subscriber. `RUST_LOG` wins unless `--verbose` is set.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("mdxref=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| return EnvFilter::new("mdxref=info"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match &cli.command {
        Commands::Check { document } => commands::check(document),
        Commands::Render { document, output } => {
            commands::render(document, output.as_deref()).map(|()| return ExitCode::SUCCESS)
        },
        Commands::Scan { document, json } => commands::scan(document, *json).map(|()| return ExitCode::SUCCESS),
        Commands::Watch { document, output } => watch::run(document, output.as_deref()),
    };

    return match result {
        Err(e) => {
            diagnostics::print_error(&e);
            ExitCode::from(3_u8)
        },
        Ok(code) => code,
    };
}
