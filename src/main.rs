use clap::Parser;
use duct_search::cli::{Cli, Commands, RemoteCommands};
use duct_search::commands::{self, BuildOptions, SearchArgs};
use duct_search::config::Config;
use duct_search::index::SearchResult;
use duct_search::search::SearchOptions;
use tracing_subscriber::EnvFilter;

/// Log filter variable, checked before `RUST_LOG`.
const LOG_ENV: &str = "DUCT_SEARCH_LOG";

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("duct_search=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_results(query: &str, results: &[SearchResult]) {
    if results.is_empty() {
        println!("No matches found for '{query}'");
        return;
    }

    for (i, result) in results.iter().enumerate() {
        println!("{}. {} ({})", i + 1, result.title, result.url);
        if !result.excerpt.is_empty() {
            println!("   {}", result.excerpt);
        }
    }
    println!("\n{} result(s) found", results.len());
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging();

    let Some(command) = cli.command else {
        Cli::parse_from(["duct-search", "--help"]);
        return Ok(());
    };

    let config = Config::load()?;
    let runtime = tokio::runtime::Runtime::new()?;

    match command {
        Commands::Build {
            pages,
            content,
            output,
            exclude,
            max_content_length,
        } => {
            let options = BuildOptions {
                pages,
                content,
                output,
                exclude,
                max_content_length,
            };
            let report = commands::build(&config, &options)?;
            println!(
                "Indexed {} entries ({} skipped, {} excluded)",
                report.indexed, report.skipped, report.excluded
            );
        }
        Commands::Search {
            query,
            index,
            limit,
            offset,
            threshold,
        } => {
            let args = SearchArgs {
                index,
                limit,
                offset,
                threshold,
            };
            let results = runtime.block_on(commands::search(&config, &query, &args))?;
            print_results(&query, &results);
        }
        #[cfg(feature = "worker")]
        Commands::Serve { listen, data_dir } => {
            runtime.block_on(commands::serve(&config, listen, data_dir))?;
        }
        Commands::Remote {
            worker_url,
            command,
        } => match command {
            RemoteCommands::Search {
                query,
                limit,
                offset,
            } => {
                let options = SearchOptions {
                    limit,
                    offset,
                    threshold: None,
                };
                let results = runtime.block_on(commands::remote_search(
                    &config, worker_url, &query, &options,
                ))?;
                print_results(&query, &results);
            }
            RemoteCommands::Stats => {
                let stats = runtime.block_on(commands::remote_stats(&config, worker_url))?;
                println!("{}", serde_json::to_string_pretty(&stats)?);
            }
            RemoteCommands::Append { index, token } => {
                let response = runtime.block_on(commands::remote_append(
                    &config, worker_url, &index, token,
                ))?;
                println!(
                    "Appended {}; worker index now holds {} entries",
                    index.display(),
                    response.entries_count
                );
            }
        },
    }

    Ok(())
}
