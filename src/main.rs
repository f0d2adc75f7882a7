mod clipboard;
mod config;
mod console;
mod error;
mod log_entry;
mod log_source;
mod notify;
mod scheduler;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use console::{Command, ConsoleView};
use log::{error, info, warn};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let cli = config::Cli::parse();

    // Load configuration
    let config = config::load_config(&cli)?;

    let level = config
        .log_level
        .parse::<log::LevelFilter>()
        .unwrap_or(log::LevelFilter::Info);
    simple_logger::SimpleLogger::new()
        .with_level(level)
        .env()
        .init()
        .context("Failed to initialise logging")?;

    info!("Starting console-viewer");
    info!("Configuration loaded successfully ({:?} mode)", config.mode);

    let notifier: Arc<dyn notify::Notifier> = Arc::new(notify::ConsoleNotifier);
    let source = Arc::new(log_source::LogSource::new(&config, Arc::clone(&notifier))?);

    let mut scheduler =
        scheduler::RefreshScheduler::start(Arc::clone(&source), config.refresh_interval());

    let mut view = ConsoleView::new(config.color);
    let mut clipboard = clipboard::SystemClipboard::new();
    let mut updates = source.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    println!("{}", console::HELP);

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snap = updates.borrow_and_update().clone();
                print!("{}", view.render(&snap, Local::now()));
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match console::parse_command(&line) {
                    Command::Refresh => {
                        let source = Arc::clone(&source);
                        tokio::spawn(async move { source.refresh().await });
                    }
                    Command::Copy => {
                        let snap = source.snapshot();
                        clipboard::copy_entries(&snap.entries, &mut clipboard, notifier.as_ref());
                    }
                    Command::Toggle(n) => {
                        let snap = source.snapshot();
                        if view.toggle(n, &snap.entries) {
                            print!("{}", view.render(&snap, Local::now()));
                        } else {
                            eprintln!("Entry {} has no details", n);
                        }
                    }
                    Command::Help => println!("{}", console::HELP),
                    Command::Quit => break,
                    Command::Unknown(cmd) => eprintln!("Unknown command: {}", cmd),
                },
                Ok(None) => {
                    info!("stdin closed, commands disabled");
                    stdin_open = false;
                }
                Err(e) => {
                    error!("Failed to read command: {}", e);
                    stdin_open = false;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted");
                break;
            }
        }
    }

    scheduler.shutdown();
    info!("console-viewer stopped");

    Ok(())
}
