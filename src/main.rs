use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use glance_lib::dispatcher::{DispatchConfig, Dispatcher, SessionUpdate};
use glance_lib::settings::{self, Settings, API_KEY_ENV};
use glance_lib::speech::VoiceCatalog;

#[derive(Parser, Debug)]
#[command(name = "glance", version, about = "Take a picture, hear what Claude sees")]
struct Cli {
    /// Settings file (defaults to <config dir>/glance/settings.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true)]
    model: Option<String>,

    #[arg(long, global = true)]
    max_tokens: Option<u32>,

    /// Speak replies aloud
    #[arg(long, global = true)]
    speak: bool,

    /// Read pictures from this file instead of running the capture command
    #[arg(long, global = true)]
    file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive session: Enter takes a picture, `q` quits
    Run,
    /// List voices for the configured locale
    Voices {
        /// Show every voice, not just the configured locale
        #[arg(long)]
        all: bool,
    },
    /// Print the effective settings
    Config {
        /// Write the effective settings back to the settings file
        #[arg(long)]
        save: bool,
    },
}

fn load_settings(cli: &Cli) -> Result<(Settings, PathBuf), Box<dyn std::error::Error>> {
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => settings::default_config_path()?,
    };
    let mut settings = Settings::load(&path)?;
    settings.apply_env(std::env::var(API_KEY_ENV).ok());
    if let Some(model) = &cli.model {
        settings.model = model.clone();
    }
    if let Some(max_tokens) = cli.max_tokens {
        settings.max_tokens = max_tokens;
    }
    if cli.speak {
        settings.speak_replies = true;
    }
    if let Some(file) = &cli.file {
        settings.capture_file = Some(file.clone());
    }
    settings.validate()?;
    Ok((settings, path))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let (settings, path) = load_settings(&cli)?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(settings).await,
        Command::Voices { all } => voices(&settings, all).await,
        Command::Config { save } => {
            if save {
                settings.save(&path)?;
            }
            print!("{}", toml::to_string_pretty(&settings.redacted())?);
            Ok(())
        }
    }
}

async fn voices(settings: &Settings, all: bool) -> Result<(), Box<dyn std::error::Error>> {
    let speaker = glance_lib::speaker_from_settings(settings);
    let catalog = VoiceCatalog::new(settings.voice_locale.clone());
    for voice in catalog.voices(speaker.as_ref()).await? {
        if all || voice.language == catalog.locale() {
            println!("{:<12} {:<28} {}", voice.language, voice.id, voice.name);
        }
    }
    Ok(())
}

async fn run(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    if settings.api_key.is_empty() {
        log::warn!("No API key configured; set {} or apiKey in the settings file", API_KEY_ENV);
    }

    let camera = glance_lib::camera_from_settings(&settings)
        .ok_or("no capture source configured")?;
    let provider = Arc::new(glance_lib::provider_from_settings(&settings));
    let config = DispatchConfig {
        model: settings.model.clone(),
        max_tokens: settings.max_tokens,
    };

    let (updates_tx, mut updates_rx) = mpsc::unbounded_channel();
    let (mut dispatcher, handle) = Dispatcher::new(config, provider, updates_tx);
    dispatcher = dispatcher.with_camera(camera);

    if settings.speak_replies {
        let speaker = glance_lib::speaker_from_settings(&settings);
        let catalog = Arc::new(VoiceCatalog::new(settings.voice_locale.clone()));
        // Fail before the first picture rather than on the first reply.
        catalog.validate(speaker.as_ref()).await?;
        dispatcher = dispatcher.with_speech(speaker, catalog);
    }

    let worker = tokio::spawn(dispatcher.run());

    tokio::spawn(async move {
        while let Some(update) = updates_rx.recv().await {
            match update {
                SessionUpdate::ImageAdded { turns } => println!("[picture #{turns}]"),
                SessionUpdate::CaptureSkipped { reason } => println!("[no picture: {reason}]"),
                SessionUpdate::RequestSent { .. } => println!("[asking...]"),
                SessionUpdate::Reply { text } => println!("{text}"),
                SessionUpdate::RequestFailed { error } => println!("[request failed: {error}]"),
            }
        }
    });

    println!("Press Enter to take a picture, q then Enter to quit.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().eq_ignore_ascii_case("q") {
            break;
        }
        if !handle.capture().await {
            break;
        }
    }

    handle.shutdown().await;
    let session = worker.await?;
    log::info!("Session ended with {} turns", session.flow().len());
    Ok(())
}
