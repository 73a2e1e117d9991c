//! CLI interface for duct-search.
//!
//! Provides command-line argument parsing using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Command-line interface for duct-search.
#[derive(Parser)]
#[command(name = "duct-search")]
#[command(author, version, about = "Build, search and serve static-site search indexes", long_about = None)]
pub struct Cli {
    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Build search-index.json from rendered pages and content.
    Build {
        /// Directory of rendered `*.html` pages.
        #[arg(short, long)]
        pages: Option<PathBuf>,

        /// JSON manifest of pre-rendered content items.
        #[arg(short, long)]
        content: Option<PathBuf>,

        /// Output path (overrides `[builder].output`).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// URL path to exclude; a trailing `*` matches any suffix. Repeatable.
        #[arg(short, long = "exclude")]
        exclude: Vec<String>,

        /// Maximum content characters per entry (0 disables truncation).
        #[arg(long)]
        max_content_length: Option<usize>,
    },

    /// Search an index with the local client provider.
    Search {
        /// The search query string.
        query: String,

        /// Index location: URL, path relative to `[client].base_url`, or file.
        #[arg(short, long)]
        index: Option<String>,

        /// Maximum number of results to return.
        #[arg(short, long)]
        limit: Option<usize>,

        /// Number of ranked results to skip.
        #[arg(long)]
        offset: Option<usize>,

        /// Fraction of the top score a result must reach (0 keeps all).
        #[arg(short, long)]
        threshold: Option<f64>,
    },

    /// Run the index worker.
    #[cfg(feature = "worker")]
    Serve {
        /// Address to listen on (overrides `[worker].listen`).
        #[arg(short, long)]
        listen: Option<String>,

        /// Directory for the persisted index (overrides `[worker].data_dir`).
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
    },

    /// Talk to a deployed index worker.
    Remote {
        /// Worker base URL (overrides `[cloudflare].worker_url`).
        #[arg(short, long, global = true)]
        worker_url: Option<String>,

        #[command(subcommand)]
        command: RemoteCommands,
    },
}

/// Subcommands of `remote`.
#[derive(Subcommand)]
pub enum RemoteCommands {
    /// Query the worker.
    Search {
        query: String,

        #[arg(short, long)]
        limit: Option<usize>,

        #[arg(long)]
        offset: Option<usize>,
    },

    /// Show the worker's index statistics.
    Stats,

    /// Append the entries of a search-index.json to the worker's index.
    Append {
        /// Path to a search-index.json file.
        index: PathBuf,

        /// Admin token (defaults to `[worker].auth_token` or the environment).
        #[arg(short, long)]
        token: Option<String>,
    },
}
