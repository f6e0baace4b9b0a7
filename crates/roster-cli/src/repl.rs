//! Interactive list browser.
//!
//! Plain input is typed into the search box; dot-commands drive filters
//! and pagination. After each line the engine is settled so the debounce
//! and any fetch complete before the view is redrawn.

use anyhow::Result;
use colored::Colorize;
use roster_core::{FilterValue, ListEngine};
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{Completer, Editor, Helper, Highlighter, Hinter, Validator};
use serde_json::Value;
use std::path::PathBuf;
use tokio::runtime::Runtime;
use tracing::debug;

use crate::render;
use crate::view_config::{declares_filter, ViewConfig};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// A parsed REPL line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Type into the search box (empty clears it).
    Search(String),
    /// Set a named filter.
    Filter {
        /// Filter name.
        name: String,
        /// Raw value, parsed with [`FilterValue::parse`].
        value: String,
    },
    /// Reset every filter.
    Clear,
    /// Jump to a page.
    Page(usize),
    Next,
    Prev,
    First,
    Last,
    /// Change the page size.
    Size(usize),
    /// Fetch again with the current query.
    Refresh,
    /// Re-issue the last failed request.
    Retry,
    /// Redraw the view.
    Show,
    /// Show only the statistics.
    Stats,
    /// Print the view snapshot as JSON.
    Json,
    Help,
    Quit,
}

/// Parses one input line.
///
/// # Errors
///
/// Returns a message for unknown commands or bad arguments.
pub fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim();
    if !line.starts_with('.') {
        return Ok(Command::Search(line.to_string()));
    }

    let parts: Vec<&str> = line.split_whitespace().collect();
    let cmd = parts.first().map(|s| s.to_lowercase()).unwrap_or_default();

    match cmd.as_str() {
        ".search" | ".s" => {
            let text = line[parts[0].len()..].trim();
            Ok(Command::Search(text.to_string()))
        }
        ".filter" | ".f" => match parts.get(1) {
            Some(name) => {
                let value = if parts.len() > 2 {
                    parts[2..].join(" ")
                } else {
                    "all".to_string()
                };
                Ok(Command::Filter {
                    name: (*name).to_string(),
                    value,
                })
            }
            None => Err("Usage: .filter <name> [value|min..max|all]".to_string()),
        },
        ".clear" => Ok(Command::Clear),
        ".page" | ".p" => parse_number(parts.get(1), ".page <n>").map(Command::Page),
        ".size" => parse_number(parts.get(1), ".size <n>").and_then(|n| {
            if n == 0 {
                Err("Page size must be at least 1".to_string())
            } else {
                Ok(Command::Size(n))
            }
        }),
        ".next" | ".n" => Ok(Command::Next),
        ".prev" => Ok(Command::Prev),
        ".first" => Ok(Command::First),
        ".last" => Ok(Command::Last),
        ".refresh" | ".r" => Ok(Command::Refresh),
        ".retry" => Ok(Command::Retry),
        ".show" => Ok(Command::Show),
        ".stats" => Ok(Command::Stats),
        ".json" => Ok(Command::Json),
        ".help" | ".h" => Ok(Command::Help),
        ".quit" | ".exit" | ".q" => Ok(Command::Quit),
        _ => Err(format!("Unknown command: {cmd}")),
    }
}

fn parse_number(arg: Option<&&str>, usage: &str) -> Result<usize, String> {
    arg.ok_or_else(|| format!("Usage: {usage}"))?
        .parse()
        .map_err(|_| format!("Usage: {usage}"))
}

enum CommandResult {
    Continue,
    Redraw,
    Quit,
}

#[derive(Completer, Helper, Highlighter, Hinter, Validator)]
struct ReplHelper;

/// Runs the interactive browser over a view.
pub fn run(runtime: &Runtime, view: &ViewConfig) -> Result<()> {
    let _guard = runtime.enter();
    let title = view.title.as_deref().unwrap_or("Roster");

    println!("\n{}", format!("Roster v{VERSION} - {title}").bold().cyan());
    println!(
        "Type to search, {} for commands, {} to exit\n",
        ".help".yellow(),
        ".quit".yellow()
    );

    let mut engine = view.build_engine()?;
    engine.refresh();
    runtime.block_on(engine.settle());
    render::print_view(&engine, view.title.as_deref(), &view.columns);

    let mut rl: Editor<ReplHelper, DefaultHistory> = Editor::new()?;
    rl.set_helper(Some(ReplHelper));

    let history_path = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".roster_history");
    let _ = rl.load_history(&history_path);

    loop {
        let prompt = "roster> ".bold().blue().to_string();
        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);

                let command = match parse_command(line) {
                    Ok(command) => command,
                    Err(e) => {
                        println!("{} {}", "Error:".red().bold(), e);
                        continue;
                    }
                };

                match apply_command(&mut engine, command) {
                    CommandResult::Continue => {}
                    CommandResult::Quit => break,
                    CommandResult::Redraw => {
                        let events = runtime.block_on(engine.settle());
                        debug!(events = events.len(), "Engine settled");
                        render::print_view(&engine, None, &view.columns);
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("Use .quit to exit");
            }
            Err(ReadlineError::Eof) => {
                break;
            }
            Err(err) => {
                println!("{} {:?}", "Error:".red().bold(), err);
                break;
            }
        }
    }

    engine.dispose();
    let _ = rl.save_history(&history_path);
    println!("Goodbye!");
    Ok(())
}

fn apply_command(engine: &mut ListEngine<Value>, command: Command) -> CommandResult {
    match command {
        Command::Search(text) => engine.set_search(text),
        Command::Filter { name, value } => {
            if !declares_filter(engine.spec(), &name) {
                println!("{} Unknown filter: {name}", "Error:".red().bold());
                return CommandResult::Continue;
            }
            engine.set_filter(name, FilterValue::parse(&value));
        }
        Command::Clear => engine.clear_filters(),
        Command::Page(page) => engine.set_page(page),
        Command::Next => engine.next_page(),
        Command::Prev => engine.previous_page(),
        Command::First => engine.first_page(),
        Command::Last => engine.last_page(),
        Command::Size(size) => engine.set_page_size(size),
        Command::Refresh => {
            engine.refresh();
        }
        Command::Retry => {
            if engine.retry().is_none() {
                println!("{}", "Nothing to retry.".dimmed());
                return CommandResult::Continue;
            }
        }
        Command::Show => {}
        Command::Stats => {
            if engine.estimates().is_empty() {
                println!("{}", "No metrics configured.".dimmed());
            } else {
                println!("{}", render::estimates_table(engine.estimates()));
            }
            return CommandResult::Continue;
        }
        Command::Json => {
            if let Err(e) = render::print_json(engine) {
                println!("{} {}", "Error:".red().bold(), e);
            }
            return CommandResult::Continue;
        }
        Command::Help => {
            print_help();
            return CommandResult::Continue;
        }
        Command::Quit => return CommandResult::Quit,
    }
    CommandResult::Redraw
}

fn print_help() {
    println!("\n{}", "Roster Commands".bold().underline());
    println!();
    println!("  {}                 Search (plain text)", "<text>".yellow());
    println!("  {}        Search, empty text clears", ".search [text]".yellow());
    println!(
        "  {} Set a filter (value, min..max or all)",
        ".filter <name> [value]".yellow()
    );
    println!("  {}                 Reset all filters", ".clear".yellow());
    println!("  {}              Jump to page", ".page <n>".yellow());
    println!(
        "  {}  Navigate pages",
        ".next .prev .first .last".yellow()
    );
    println!("  {}              Set page size", ".size <n>".yellow());
    println!("  {}               Fetch again", ".refresh".yellow());
    println!("  {}                 Retry the failed request", ".retry".yellow());
    println!("  {}                  Redraw the list", ".show".yellow());
    println!("  {}                 Show statistics", ".stats".yellow());
    println!("  {}                  Print view as JSON", ".json".yellow());
    println!("  {}                  Show this help", ".help".yellow());
    println!("  {}                  Exit", ".quit".yellow());
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_search() {
        assert_eq!(
            parse_command("ana silva"),
            Ok(Command::Search("ana silva".to_string()))
        );
    }

    #[test]
    fn test_search_command_keeps_spaces() {
        assert_eq!(
            parse_command(".search  Bruno Costa "),
            Ok(Command::Search("Bruno Costa".to_string()))
        );
        assert_eq!(parse_command(".search"), Ok(Command::Search(String::new())));
    }

    #[test]
    fn test_filter_command() {
        assert_eq!(
            parse_command(".filter amount 100..200"),
            Ok(Command::Filter {
                name: "amount".to_string(),
                value: "100..200".to_string()
            })
        );
        assert_eq!(
            parse_command(".f status"),
            Ok(Command::Filter {
                name: "status".to_string(),
                value: "all".to_string()
            })
        );
        assert!(parse_command(".filter").is_err());
    }

    #[test]
    fn test_filter_value_with_spaces() {
        assert_eq!(
            parse_command(".filter class 7 A"),
            Ok(Command::Filter {
                name: "class".to_string(),
                value: "7 A".to_string()
            })
        );
    }

    #[test]
    fn test_navigation_commands() {
        assert_eq!(parse_command(".page 4"), Ok(Command::Page(4)));
        assert_eq!(parse_command(".NEXT"), Ok(Command::Next));
        assert_eq!(parse_command(".prev"), Ok(Command::Prev));
        assert_eq!(parse_command(".size 25"), Ok(Command::Size(25)));
        assert!(parse_command(".page x").is_err());
        assert!(parse_command(".size 0").is_err());
    }

    #[test]
    fn test_unknown_command() {
        let err = parse_command(".bogus").unwrap_err();
        assert!(err.contains("Unknown command"));
    }
}
