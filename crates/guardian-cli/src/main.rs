mod render;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use guardian_archive::{date_key, IncidentArchive};
use guardian_bus::EventBus;
use guardian_core::{load_config, AlarmControl, AlertPipeline, GuardianConfig};
use tokio::io::{AsyncBufRead, BufReader};
use tokio::task::JoinHandle;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "guardian", version, about = "Sensor threat monitor and incident log")]
struct Cli {
    #[arg(
        long,
        default_value = ".",
        help = "Guardian root directory (contains config/, data/ and logs/)"
    )]
    root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(
        about = "Classify sensor lines and raise alerts until the source closes",
        long_about = "Classify sensor lines and raise alerts until the source closes.\n\
                      Send SIGUSR1 to silence active alarms without stopping; Ctrl-C silences and exits."
    )]
    Watch {
        #[arg(long, help = "Serial device or file to read (default: stdin)")]
        input: Option<PathBuf>,
    },
    #[command(about = "Count incidents recorded on a date")]
    Summary {
        #[arg(long, help = "Date as YYYY-MM-DD (default: today)")]
        date: Option<String>,
    },
    #[command(about = "List incidents newest first")]
    Search {
        #[arg(default_value = "", help = "Matches threat type and date, case-insensitive")]
        query: String,
    },
    #[command(about = "Ask the assistant (try 'summary' or 'status')")]
    Ask {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    #[command(about = "Validate config and print the effective settings")]
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();

    if cli.root.starts_with("~") {
        if let Some(home) = std::env::var_os("HOME") {
            cli.root = PathBuf::from(home).join(cli.root.strip_prefix("~").unwrap_or(&cli.root));
        }
    }

    let log_dir = cli.root.join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&log_dir, "guardian.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .init();

    let config = load_config(&cli.root.join("config"))?;

    match cli.command {
        Commands::Watch { input } => watch(&cli.root, &config, input.as_deref()).await?,
        Commands::Summary { date } => {
            let archive = open_archive(&cli.root, &config)?;
            let date = date.unwrap_or_else(|| date_key(&Local::now()));
            let summary = archive.summary(&date).await;
            println!("{date}: {} incident(s)", summary.count);
        }
        Commands::Search { query } => {
            let archive = open_archive(&cli.root, &config)?;
            let results = archive.search(&query).await;
            if results.is_empty() {
                println!("No incidents found.");
            } else {
                println!(
                    "{:<14} {:<9} {:<11} {:<9} {}",
                    "ID", "TYPE", "DATE", "TIME", "DETAILS"
                );
                println!("{}", "-".repeat(80));
                for incident in &results {
                    println!("{}", render::incident_row(incident));
                }
            }
        }
        Commands::Ask { text } => {
            let bus = EventBus::new(16);
            let mut pipeline = AlertPipeline::open(&config, &cli.root, bus.publisher())?;
            let reply = pipeline.ask(&text.join(" "), Local::now()).await;
            println!("{reply}");
            pipeline.flush().await;
        }
        Commands::Validate => {
            println!(
                "Config valid. archive={:?} at {}, debounce {}ms, revert {}ms.",
                config.archive.backend,
                cli.root.join(&config.archive.dir).display(),
                config.debounce_ms,
                config.revert_ms
            );
            print!("{}", serde_yaml::to_string(&config)?);
        }
    }

    Ok(())
}

fn open_archive(root: &Path, config: &GuardianConfig) -> Result<IncidentArchive> {
    let store = config.archive.open_store(root)?;
    Ok(IncidentArchive::new(store, config.archive.key.clone()))
}

async fn open_source(input: Option<&Path>) -> Result<Box<dyn AsyncBufRead + Unpin + Send>> {
    match input {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("failed to open input: {}", path.display()))?;
            Ok(Box::new(BufReader::new(file)))
        }
        None => Ok(Box::new(BufReader::new(tokio::io::stdin()))),
    }
}

async fn watch(root: &Path, config: &GuardianConfig, input: Option<&Path>) -> Result<()> {
    let bus = EventBus::new(256);
    let mut ui_rx = bus.subscribe_all().await;
    let ui = tokio::spawn(async move {
        while let Some(msg) = ui_rx.recv().await {
            if let Some(line) = render::render(&msg) {
                println!("{line}");
            }
        }
    });

    let mut pipeline = AlertPipeline::open(config, root, bus.publisher())?;
    let source = open_source(input).await?;
    let silencer = spawn_silence_listener(pipeline.alarm_control())?;
    tracing::info!(root = %root.display(), "guardian watching");

    let finished = tokio::select! {
        summary = pipeline.run(source) => Some(summary?),
        _ = tokio::signal::ctrl_c() => None,
    };

    match finished {
        Some(summary) => {
            println!(
                "Source closed: {} lines, {} alerts, {} incidents logged.",
                summary.lines, summary.alerts, summary.incidents
            );
            pipeline.flush().await;
        }
        None => {
            pipeline.stop_alarm().await;
            println!("Interrupted, alarms silenced.");
        }
    }

    // Closing every publisher lets the render task drain and exit.
    if let Some(silencer) = silencer {
        silencer.abort();
    }
    drop(pipeline);
    drop(bus);
    let _ = tokio::time::timeout(Duration::from_millis(500), ui).await;
    Ok(())
}

/// SIGUSR1 silences alarms while the pipeline keeps reading.
#[cfg(unix)]
fn spawn_silence_listener(control: AlarmControl) -> Result<Option<JoinHandle<()>>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut usr1 = signal(SignalKind::user_defined1()).context("failed to listen for SIGUSR1")?;
    Ok(Some(tokio::spawn(async move {
        while usr1.recv().await.is_some() {
            tracing::info!("stop-alarm requested");
            control.stop().await;
        }
    })))
}

#[cfg(not(unix))]
fn spawn_silence_listener(_control: AlarmControl) -> Result<Option<JoinHandle<()>>> {
    Ok(None)
}
