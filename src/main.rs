//! Application entry point — `read-aloud`.
//!
//! # Startup sequence
//!
//! 1. Parse the command line.
//! 2. Initialise logging (`-v` lowers the default filter to `debug`).
//! 3. Load [`AppConfig`] from `--config` or the platform config dir
//!    (returns default on first run).
//! 4. Run the subcommand. `speak` and `voices` start the `espeak-ng`
//!    backend, initialise the [`VoiceCatalog`] and, for `speak`, drive a
//!    [`PlaybackCoordinator`] until it finishes or Ctrl-C stops it.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use read_aloud::{
    config::{AppConfig, AppPaths},
    platform::{CommandSynth, SpeechPlatform},
    playback::{PlaybackCoordinator, PlaybackEvent},
    text::SegmentationPolicy,
    voice::VoiceCatalog,
};

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

/// Read text aloud, one sentence at a time.
#[derive(Parser)]
#[command(name = "read-aloud", version)]
struct Cli {
    /// Use this settings file instead of the platform default
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Speak a text file, or stdin when no file is given
    Speak {
        /// File to read
        file: Option<PathBuf>,
        /// Speed multiplier (1.0 = normal)
        #[arg(short, long)]
        rate: Option<f32>,
        /// Preferred voice identifier (prefix and substring matches count)
        #[arg(long)]
        voice: Option<String>,
        /// Speak word-bounded chunks of at most N words instead of sentences
        #[arg(long, value_name = "N")]
        chunk: Option<usize>,
    },

    /// List the ranked voices for the configured language
    Voices {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Manage the settings file
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Write a settings file with every default filled in
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
    /// Print the effective configuration as TOML
    Show,
    /// Print the settings file path
    Path,
}

// ---------------------------------------------------------------------------
// Subcommands
// ---------------------------------------------------------------------------

fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display())),
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("failed to read stdin")?;
            Ok(text)
        }
    }
}

/// Start the speech backend and a catalog with its first snapshot.
async fn start_engine(config: &AppConfig) -> (Arc<dyn SpeechPlatform>, VoiceCatalog) {
    let class = config.platform_class();
    let policy = config.platform_policy();
    log::debug!("platform class: {}", class.label());

    let platform: Arc<dyn SpeechPlatform> =
        Arc::new(CommandSynth::spawn(&config.synth).with_class(class));
    let catalog = VoiceCatalog::new(Arc::clone(&platform), &config.voice, &policy);
    catalog.initialize().await;
    (platform, catalog)
}

async fn speak(
    config: &AppConfig,
    file: Option<&Path>,
    rate: Option<f32>,
    voice: Option<String>,
    chunk: Option<usize>,
) -> Result<()> {
    let text = read_input(file)?;
    let (platform, catalog) = start_engine(config).await;
    let (coordinator, mut events) =
        PlaybackCoordinator::with_platform(platform, catalog, config.platform_policy());

    let mut options = config.playback.options();
    if rate.is_some() {
        options.rate = rate;
    }
    if voice.is_some() {
        options.preferred_voice_id = voice;
    }
    if let Some(max_words) = chunk {
        options.segmentation = SegmentationPolicy::BoundedChunk { max_words };
    }

    coordinator.play(&text, options);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(PlaybackEvent::Progress { index, total, text, .. }) => {
                    println!("[{}/{}] {}", index + 1, total, text);
                }
                Some(PlaybackEvent::Completed { .. }) | None => return Ok(()),
                Some(PlaybackEvent::Failed { error, .. }) => bail!(error),
                Some(PlaybackEvent::Started { session }) => {
                    log::debug!("session {session} started");
                }
            },
            _ = &mut ctrl_c => {
                coordinator.stop();
                log::info!("interrupted, playback stopped");
                return Ok(());
            }
        }
    }
}

async fn list_voices(config: &AppConfig, json: bool) -> Result<()> {
    let (_platform, catalog) = start_engine(config).await;
    let voices = catalog.get_voices();

    if json {
        println!("{}", serde_json::to_string_pretty(voices.as_slice())?);
        return Ok(());
    }

    if voices.is_empty() {
        println!("No {} voices found.", catalog.target());
        return Ok(());
    }
    for voice in voices.iter() {
        let marker = if voice.is_platform_default { "*" } else { " " };
        println!("{marker} {:<32} {}", voice.identifier, voice.language_tag);
    }
    Ok(())
}

fn run_config(command: ConfigCommand, config: &AppConfig, path: &Path) -> Result<()> {
    match command {
        ConfigCommand::Init { force } => {
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            AppConfig::default().save_to(path)?;
            println!("Wrote {}", path.display());
        }
        ConfigCommand::Show => print!("{}", toml::to_string_pretty(config)?),
        ConfigCommand::Path => println!("{}", path.display()),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let settings_path = cli
        .config
        .clone()
        .unwrap_or_else(|| AppPaths::new().settings_file);
    let config = AppConfig::load_from(&settings_path)
        .with_context(|| format!("failed to load {}", settings_path.display()))?;
    log::debug!("config loaded from {}", settings_path.display());

    match cli.command {
        Commands::Speak {
            file,
            rate,
            voice,
            chunk,
        } => speak(&config, file.as_deref(), rate, voice, chunk).await,
        Commands::Voices { json } => list_voices(&config, json).await,
        Commands::Config(command) => run_config(command, &config, &settings_path),
    }
}
