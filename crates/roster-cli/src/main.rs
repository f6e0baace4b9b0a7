//! Roster CLI
//!
//! Browse school administration lists (students, payments, confirmations)
//! from a list endpoint or a JSON export, with debounced search, filters,
//! pagination and sample estimates.

// CLI tool - relax pedantic lints for ergonomics
#![allow(clippy::pedantic)]

mod render;
mod repl;
mod view_config;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use roster_core::{FilterValue, LoggingConfig};
use std::path::{Path, PathBuf};
use tokio::runtime::Runtime;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use view_config::{ViewConfig, VIEW_TEMPLATE};

#[derive(Parser)]
#[command(name = "roster")]
#[command(version)]
#[command(about = "Browse school administration lists", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print one page of a list
    Browse {
        /// View file path
        #[arg(short, long, value_name = "FILE", env = "ROSTER_VIEW")]
        view: PathBuf,

        /// Search text
        #[arg(short, long)]
        search: Option<String>,

        /// Filter as NAME=VALUE (VALUE may be `all` or `min..max`), repeatable
        #[arg(short, long, value_name = "NAME=VALUE")]
        filter: Vec<String>,

        /// Page to show
        #[arg(short, long, default_value_t = 1)]
        page: usize,

        /// Page size override
        #[arg(long)]
        page_size: Option<usize>,

        /// Print the view as JSON
        #[arg(long)]
        json: bool,
    },

    /// Interactive list browser
    Repl {
        /// View file path
        #[arg(short, long, value_name = "FILE", env = "ROSTER_VIEW")]
        view: PathBuf,
    },

    /// Validate a view file
    Validate {
        /// View file path
        #[arg(short, long, value_name = "FILE", env = "ROSTER_VIEW")]
        view: PathBuf,
    },

    /// Generate an example view file
    Init {
        /// Output file path
        #[arg(short, long, default_value = "roster-view.toml")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Browse {
            view,
            search,
            filter,
            page,
            page_size,
            json,
        } => {
            let view = load_view(&view, cli.verbose)?;
            let filters = filter
                .iter()
                .map(|f| parse_filter_arg(f))
                .collect::<Result<Vec<_>>>()?;
            let runtime = build_runtime()?;
            let _guard = runtime.enter();

            let mut engine = view.build_engine()?;
            if let Some((name, _)) = filters
                .iter()
                .find(|(name, _)| !view_config::declares_filter(engine.spec(), name))
            {
                bail!("Unknown filter '{name}'");
            }
            if let Some(size) = page_size {
                engine.set_page_size(size);
            }
            for (name, value) in filters {
                engine.set_filter(name, value);
            }
            if let Some(search) = search {
                engine.set_search(search);
            }
            runtime.block_on(engine.settle());

            // Nothing was fetched yet when no server-side input changed
            if engine.generation() == 0 {
                engine.refresh();
                runtime.block_on(engine.settle());
            }
            engine.set_page(page);

            if json {
                render::print_json(&engine)?;
            } else {
                render::print_view(&engine, view.title.as_deref(), &view.columns);
            }

            if let Some(message) = engine.error() {
                bail!("List fetch failed: {message}");
            }
        }

        Commands::Repl { view } => {
            let view = load_view(&view, cli.verbose)?;
            let runtime = build_runtime()?;
            repl::run(&runtime, &view)?;
        }

        Commands::Validate { view } => {
            init_logging(&LoggingConfig::default(), cli.verbose)?;
            match ViewConfig::load(&view) {
                Ok(config) => {
                    info!(
                        filters = config.filters.len(),
                        metrics = config.metrics.len(),
                        "View is valid"
                    );
                    println!("{} {}", "✓".green(), view.display());
                }
                Err(e) => {
                    error!("Invalid view: {e:#}");
                    std::process::exit(1);
                }
            }
        }

        Commands::Init { output } => {
            init_logging(&LoggingConfig::default(), cli.verbose)?;
            if output.exists() {
                bail!("Refusing to overwrite {}", output.display());
            }
            std::fs::write(&output, VIEW_TEMPLATE)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            info!("Generated view file: {}", output.display());
            println!("Edit the file, then run: roster browse --view {}", output.display());
        }
    }

    Ok(())
}

fn load_view(path: &Path, verbose: bool) -> Result<ViewConfig> {
    let view = ViewConfig::load(path)?;
    init_logging(&view.engine.logging, verbose)?;
    info!(view = %path.display(), "Loaded view");
    Ok(view)
}

fn build_runtime() -> Result<Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")
}

/// Sets up tracing on stderr. `RUST_LOG` wins over the configured level.
fn init_logging(config: &LoggingConfig, verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { config.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    let result = if config.format == "json" {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))
}

fn parse_filter_arg(arg: &str) -> Result<(String, FilterValue)> {
    let Some((name, value)) = arg.split_once('=') else {
        bail!("Invalid filter '{arg}', expected NAME=VALUE");
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("Invalid filter '{arg}', name is empty");
    }
    Ok((name.to_string(), FilterValue::parse(value.trim())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_filter_arg() {
        let (name, value) = parse_filter_arg("status=1").unwrap();
        assert_eq!(name, "status");
        assert_eq!(value, FilterValue::parse("1"));

        let (name, value) = parse_filter_arg("amount = 100..200").unwrap();
        assert_eq!(name, "amount");
        assert_eq!(value, FilterValue::parse("100..200"));

        assert!(parse_filter_arg("status").is_err());
        assert!(parse_filter_arg("=1").is_err());
    }

    #[test]
    fn test_browse_args() {
        let cli = Cli::try_parse_from([
            "roster", "browse", "--view", "v.toml", "-f", "status=1", "-f", "class=7A", "--page",
            "2",
        ])
        .unwrap();

        match cli.command {
            Commands::Browse { filter, page, .. } => {
                assert_eq!(filter, vec!["status=1", "class=7A"]);
                assert_eq!(page, 2);
            }
            _ => panic!("expected browse"),
        }
    }
}
