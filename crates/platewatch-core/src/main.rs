//! PlateWatch CLI
//!
//! Command-line interface for the PlateWatch alert engine.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use platewatch::alerting::{normalize_field, AlertEngine};
use platewatch::api::HttpServer;
use platewatch::models::{default_rules, AlertNotification, AlertRule, SensorSample};
use platewatch::persistence::{JsonFileStore, PersistedState, StatePort};
use platewatch::scheduler::Scheduler;
use platewatch::source::{HttpSampleSource, SampleSource};
use platewatch::Config;

/// PlateWatch - defect-risk alerts for plating lines
#[derive(Parser)]
#[command(name = "platewatch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "PLATEWATCH_CONFIG")]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (for commands that support it)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Ignore the saved state file and start from the built-in rules
    #[arg(long, global = true)]
    fresh: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the sensor source on a schedule and serve the REST API
    Serve {
        /// HTTP API port
        #[arg(long, env = "PLATEWATCH_HTTP_PORT")]
        port: Option<u16>,

        /// Sensor endpoint URL
        #[arg(long, env = "PLATEWATCH_SOURCE_URL")]
        source: Option<String>,

        /// Poll interval (e.g. "10s")
        #[arg(long, value_parser = humantime::parse_duration)]
        interval: Option<Duration>,
    },

    /// Evaluate one sample file against the rule set
    Check {
        /// JSON file holding a sample or a polled response body
        #[arg(long)]
        sample: PathBuf,
    },

    /// Poll the sensor source once and show the normalized fields
    Poll {
        /// Sensor endpoint URL
        #[arg(long, env = "PLATEWATCH_SOURCE_URL")]
        source: Option<String>,
    },

    /// Inspect the rule set
    Rules {
        #[command(subcommand)]
        command: RulesCommands,
    },
}

#[derive(Subcommand)]
enum RulesCommands {
    /// List rules with their groups
    List,

    /// Write the rule set to a file as JSON
    Export {
        /// Output file
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_logging(&config, cli.verbose);

    let store = JsonFileStore::new(&config.storage.state_file);

    // Execute command
    let result = match cli.command {
        Commands::Serve {
            port,
            source,
            interval,
        } => run_serve(config, &store, cli.fresh, port, source, interval).await,
        Commands::Check { sample } => run_check(&config, &store, cli.fresh, &sample, cli.format),
        Commands::Poll { source } => run_poll(&config, source, cli.format).await,
        Commands::Rules { command } => run_rules(&config, &store, cli.fresh, command, cli.format),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(config: &Config, verbose: bool) {
    let level = if verbose { "debug" } else { config.logging.level.as_str() };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    if config.logging.format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Engine seeded from saved state, or from the built-in rules
fn build_engine(config: &Config, store: &dyn StatePort, fresh: bool) -> anyhow::Result<AlertEngine> {
    let mut engine = AlertEngine::new(&config.engine);

    let saved = if fresh { None } else { store.load()? };
    match saved {
        Some(state) => state.apply(&mut engine),
        None => {
            info!("Starting with built-in rule set");
            engine.replace_rules(default_rules());
        }
    }

    Ok(engine)
}

async fn run_serve(
    mut config: Config,
    store: &dyn StatePort,
    fresh: bool,
    port: Option<u16>,
    source: Option<String>,
    interval: Option<Duration>,
) -> anyhow::Result<()> {
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(url) = source {
        config.source.url = url;
    }
    if let Some(interval) = interval {
        config.engine.poll_interval = interval;
    }
    config.validate()?;

    let engine = build_engine(&config, store, fresh)?.into_shared();
    let source = Arc::new(HttpSampleSource::from_config(&config.source)?);

    let mut scheduler = Scheduler::new(engine.clone(), source, config.engine.poll_interval);
    scheduler.start();

    let shutdown = CancellationToken::new();
    let server = HttpServer::new(engine.clone());
    let addr = config.bind_addr();
    let server_shutdown = shutdown.clone();
    let mut server_handle =
        tokio::spawn(async move { server.serve(&addr, server_shutdown).await });

    info!(
        api = %config.bind_addr(),
        source = %config.source.url,
        "PlateWatch running, press Ctrl+C to stop"
    );

    let server_result = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Ctrl+C received, shutting down...");
            shutdown.cancel();
            (&mut server_handle).await
        }
        result = &mut server_handle => result,
    };

    scheduler.stop().await;

    let snapshot = PersistedState::capture(&engine.read());
    if let Err(e) = store.save(&snapshot) {
        warn!(error = %e, "Failed to save state");
    }

    server_result??;
    Ok(())
}

fn run_check(
    config: &Config,
    store: &dyn StatePort,
    fresh: bool,
    path: &Path,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(path)?;
    let body: serde_json::Value = serde_json::from_str(&raw)?;
    let sample = SensorSample::from_envelope(body)
        .ok_or_else(|| anyhow::anyhow!("{} does not contain a sample", path.display()))?;

    let mut engine = build_engine(config, store, fresh)?;
    engine.clear_notifications();
    let emitted = engine.process_sample(sample);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&emitted)?),
        OutputFormat::Text => print_notifications(&emitted),
    }
    Ok(())
}

fn print_notifications(notifications: &[AlertNotification]) {
    if notifications.is_empty() {
        println!("No rule group triggered.");
        return;
    }
    for n in notifications {
        println!("[{}] {} ({})", n.severity, n.message, n.rule_id);
    }
}

async fn run_poll(
    config: &Config,
    source: Option<String>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let url = source.unwrap_or_else(|| config.source.url.clone());
    let source = HttpSampleSource::new(&url, config.source.timeout)?;

    let sample = match source.poll().await {
        Ok(sample) => sample,
        Err(e) => {
            error!(source = %url, error = %e, "Poll failed");
            return Err(e.into());
        }
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&sample)?),
        OutputFormat::Text => {
            for (field, raw) in sample.iter() {
                match normalize_field(raw) {
                    Some(value) => println!("{field:<20} {raw:<24} -> {value}"),
                    None => println!("{field:<20} {raw:<24} -> (absent)"),
                }
            }
        }
    }
    Ok(())
}

fn run_rules(
    config: &Config,
    store: &dyn StatePort,
    fresh: bool,
    command: RulesCommands,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let engine = build_engine(config, store, fresh)?;

    match command {
        RulesCommands::List => match format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(engine.rules())?),
            OutputFormat::Text => print_rules(&engine),
        },
        RulesCommands::Export { output } => {
            std::fs::write(&output, serde_json::to_vec_pretty(engine.rules())?)?;
            println!("Exported {} rule(s) to {}", engine.rules().len(), output.display());
        }
    }
    Ok(())
}

fn print_rules(engine: &AlertEngine) {
    for rule in engine.rules() {
        let AlertRule {
            id,
            field,
            operator,
            value,
            severity,
            is_active,
            ..
        } = rule;
        let group = engine.group_display_name(rule.group_key(), rule.group_key());
        let state = if *is_active { "on " } else { "off" };
        println!("{state} {id:<8} {field} {operator} {value:<10} {severity:<8} {group}");
    }
}
