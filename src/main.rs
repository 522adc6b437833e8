//! vibeshift - mood effects for online video audio
//!
//! Entry point: parses the command line, sets up logging, loads the
//! configuration and dispatches to the HTTP service or a one-shot command.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tracing::{Level, info};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use vibeshift::cli::{Args, Commands};
use vibeshift::clip::{ClipOperations, split_filename};
use vibeshift::config::Config;
use vibeshift::effects::{DEFAULT_EFFECT, EFFECTS};
use vibeshift::media::{MediaProcessorFactory, MediaProcessorTrait};
use vibeshift::pipeline::ProcessingPipeline;
use vibeshift::server;

const DEFAULT_CONFIG_FILE: &str = "vibeshift.toml";

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging to both console and file
    setup_logging(args.verbose)?;

    let config = load_config(args.config.as_deref())?.with_overrides(
        std::env::var("VIBESHIFT_API_KEY").ok(),
        std::env::var("VIBESHIFT_PORT").ok().and_then(|v| v.trim().parse().ok()),
    );

    match args.command {
        Commands::Serve { host, port } => {
            let mut config = config;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            server::serve(config).await?;
        }
        Commands::Transform { url, effect, output } => {
            let media = create_media(&config).await?;
            std::fs::create_dir_all(&config.workspace.temp_root)?;
            let pipeline = ProcessingPipeline::new(&config, media)?;

            let processed = pipeline.process(&url, effect.as_deref()).await?;
            tokio::fs::write(&output, &processed.bytes)
                .await
                .with_context(|| format!("writing {}", output.display()))?;
            println!(
                "Wrote {} ({} bytes, effect '{}', via {})",
                output.display(),
                processed.bytes.len(),
                processed.effect.name,
                processed.backend
            );
        }
        Commands::Split { input, output, start, end } => {
            let clips = ClipOperations::new(create_media(&config).await?);
            clips.split(&input, &output, start, end).await?;
            println!("Wrote {} (as {})", output.display(), split_filename(start, end));
        }
        Commands::Mix { tracks, output } => {
            let clips = ClipOperations::new(create_media(&config).await?);
            clips.mix(&tracks, &output).await?;
            println!("Mixed {} tracks into {}", tracks.len(), output.display());
        }
        Commands::Effects => {
            println!("\nAvailable effects:");
            println!("{:<14} {:>6} {:>10} {:>7}", "Name", "Speed", "Delay(ms)", "Decay");
            println!("{}", "-".repeat(40));
            for effect in &EFFECTS {
                let marker = if effect.name == DEFAULT_EFFECT { " (default)" } else { "" };
                println!(
                    "{:<14} {:>6.2} {:>10} {:>7.2}{}",
                    effect.name, effect.speed, effect.echo_delay_ms, effect.echo_decay, marker
                );
            }
        }
        Commands::InitConfig { path } => {
            if path.exists() {
                anyhow::bail!("{} already exists", path.display());
            }
            Config::default().save_to_file(&path)?;
            println!("Wrote default configuration to {}", path.display());
        }
    }

    Ok(())
}

/// `--config` if given, else vibeshift.toml in the working directory, else defaults
fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let config = match explicit {
        Some(path) => Config::from_file(path).with_context(|| format!("loading {}", path.display()))?,
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            info!("Found {} in current directory, loading...", DEFAULT_CONFIG_FILE);
            Config::from_file(DEFAULT_CONFIG_FILE)?
        }
        None => Config::default(),
    };
    Ok(config)
}

async fn create_media(config: &Config) -> Result<Arc<dyn MediaProcessorTrait>> {
    let media: Arc<dyn MediaProcessorTrait> =
        Arc::from(MediaProcessorFactory::create_processor(config.media.clone()));
    media.check_availability().await?;
    Ok(media)
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = std::env::current_dir()?.join(".vibeshift").join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "vibeshift.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized - console: {}, file: {}",
        log_level,
        log_dir.join("vibeshift.log").display()
    );

    Ok(())
}
