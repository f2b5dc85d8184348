use clap::Parser;
use colored::*;
use eyre::{Context, Result, eyre};
use log::{debug, info};
use serde_json::Value;
use std::fs;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

mod cli;

use cli::Cli;
use cli::commands::Commands;
use eventwatch::config::Config;
use eventwatch::http::{HttpClient, JsonFieldFetch, StatusLookup, report_fn};
use eventwatch::{Fetch, PollHandle, PollingCoordinator, SequentialQueue};

fn setup_logging(level: Option<&str>) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("eventwatch")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("eventwatch.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    // RUST_LOG wins over the configured level
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level.unwrap_or("info")))
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

async fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        Commands::Watch {
            url,
            pointer,
            interval_ms,
            initial_delay_ms,
            once_changed,
            hint_stdin,
        } => {
            let options = WatchOptions {
                url: url.clone(),
                pointer: pointer.clone(),
                interval_ms: *interval_ms,
                initial_delay_ms: *initial_delay_ms,
                once_changed: *once_changed,
                hint_stdin: *hint_stdin,
            };
            handle_watch_command(options, config).await
        }
        Commands::Status { url, interval_ms } => {
            let options = WatchOptions {
                url: url.clone(),
                pointer: "/status".to_string(),
                interval_ms: *interval_ms,
                initial_delay_ms: None,
                once_changed: true,
                hint_stdin: false,
            };
            handle_watch_command(options, config).await
        }
        Commands::Batch { url, ids, refresh } => handle_batch_command(url, ids, *refresh, config).await,
    }
}

struct WatchOptions {
    url: String,
    pointer: String,
    interval_ms: Option<u64>,
    initial_delay_ms: Option<u64>,
    once_changed: bool,
    hint_stdin: bool,
}

fn timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}

async fn handle_watch_command(options: WatchOptions, config: &Config) -> Result<()> {
    info!("Watching {} at {}", options.pointer, options.url);
    let client = HttpClient::new(&config.http).context("Failed to build HTTP client")?;
    let fetch = JsonFieldFetch::new(client, options.url.clone(), &options.pointer);

    // What the caller sees right now is the baseline; only later differences count
    let baseline = fetch.fetch().await.context("Initial fetch failed")?;
    println!(
        "{} {} {} = {}",
        timestamp().dimmed(),
        "Watching".cyan(),
        fetch.pointer(),
        baseline
    );

    let interval = options
        .interval_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| config.poll.interval(options.hint_stdin));
    let initial_delay = options
        .initial_delay_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| config.poll.initial_delay());

    let (tx, mut changes) = mpsc::unbounded_channel::<Value>();
    let handle = PollingCoordinator::new(interval, fetch, move |value| {
        let _ = tx.send(value);
    })
    .context("Invalid poll settings")?
    .with_baseline(baseline)
    .with_initial_delay(initial_delay)
    .with_hint_throttle(config.poll.hint_throttle())
    .start()
    .context("Failed to start poller")?;

    if options.hint_stdin {
        let hints = handle.clone();
        std::thread::spawn(move || forward_stdin_hints(hints));
    }

    loop {
        match next_event(&mut changes, &handle).await {
            WatchEvent::Changed(value) => {
                println!("{} {} {}", timestamp().dimmed(), "Changed:".green(), value);
                if options.once_changed {
                    handle.halt();
                    return Ok(());
                }
            }
            WatchEvent::Halted => {
                return match handle.last_error() {
                    Some(e) => {
                        println!("{} {}", "Stopped looking:".yellow(), e);
                        Err(eyre!("Stopped watching {}: {}", options.url, e))
                    }
                    None => Ok(()),
                };
            }
            WatchEvent::Interrupted => {
                info!("Interrupted, halting poller");
                handle.halt();
                return Ok(());
            }
        }
    }
}

#[derive(Debug, PartialEq)]
enum WatchEvent {
    Changed(Value),
    Halted,
    Interrupted,
}

// Buffered changes are reported before the halt that follows them
async fn next_event(changes: &mut mpsc::UnboundedReceiver<Value>, handle: &PollHandle<Value>) -> WatchEvent {
    tokio::select! {
        biased;
        Some(value) = changes.recv() => WatchEvent::Changed(value),
        _ = handle.halted() => WatchEvent::Halted,
        _ = tokio::signal::ctrl_c() => WatchEvent::Interrupted,
    }
}

// Plain thread: a blocked stdin read must not hold up runtime shutdown
fn forward_stdin_hints(handle: PollHandle<Value>) {
    for line in std::io::stdin().lock().lines() {
        if line.is_err() || handle.is_halted() {
            break;
        }
        if handle.hint() {
            debug!("Hint accepted");
        }
    }
}

async fn handle_batch_command(url: &str, ids: &[String], refresh: bool, config: &Config) -> Result<()> {
    info!("Looking up status for {} ids at {}", ids.len(), url);
    let client = HttpClient::new(&config.http).context("Failed to build HTTP client")?;
    let lookup = Arc::new(StatusLookup::new(client, url).with_refresh(refresh));
    let queue = SequentialQueue::new();

    let report = report_fn(|id, outcome| match outcome {
        Ok(status) => println!("{:>10}  {}", id, status.to_string().color(status.color())),
        Err(e) => println!("{:>10}  {} ({})", id, "Unknown".yellow(), e),
    });
    lookup.enqueue_all(&queue, ids.iter().cloned(), report);

    if let Some(pump) = queue.drain() {
        pump.await.context("Status lookups aborted")?;
    }
    info!("Finished {} lookups", queue.settled());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    // Setup logging once the configured level is known
    setup_logging(config.log_level.as_deref()).context("Failed to setup logging")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, &config).await.context("Application failed")?;

    Ok(())
}
