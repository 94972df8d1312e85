//! Homescreen CLI - maintenance tool for the home screen's local stores

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use homescreen::app::{raw_data_url, store_image, HomeScreen, LEGACY_MIGRATED_KEY};
use homescreen::config::{self, HomescreenConfig};
use homescreen::lock::{LockStage, LockState};
use homescreen::remote::{self, HttpMusicProvider, MusicProvider, Translator};
use homescreen::storage::{AllowList, JsonFileLegacyStorage};
use homescreen::ui::{self, Icons};
use serde_json::Value;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "homescreen")]
#[command(version = "0.1.0")]
#[command(about = "Inspect and maintain the phone home screen's local storage")]
#[command(long_about = r#"
Homescreen keeps settings and images for the home screen simulator in one
SQLite file. This tool lets you:
  • Read, write and remove settings
  • Migrate the older flat key-value storage
  • Compress and store images
  • Export everything to a JSON backup
  • Query the configured music-search and translation endpoints

Example usage:
  homescreen init
  homescreen set userName '"Ann"'
  homescreen put-image wallpaper ./beach.png --kind wallpaper
  homescreen export --out backup.json
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file (defaults to ./homescreen.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file and create the database
    Init {
        /// Overwrite an existing config file
        #[arg(short, long)]
        force: bool,
    },

    /// Print the value stored under a key
    Get { key: String },

    /// Store a value under a key
    Set {
        key: String,

        /// JSON value (or plain text with --text)
        value: String,

        /// Store the value as a string instead of parsing it as JSON
        #[arg(short, long)]
        text: bool,
    },

    /// Remove a key
    Rm { key: String },

    /// List stored keys
    Keys,

    /// Show storage and lock screen state
    Status,

    /// Remove every setting
    Clear {
        /// Remove stored images too
        #[arg(long)]
        images: bool,
    },

    /// Migrate keys from the legacy storage dump
    Migrate {
        /// Keys to migrate
        keys: Vec<String>,

        /// Migrate every allow-listed key
        #[arg(short, long, conflicts_with = "keys")]
        all: bool,

        /// Legacy dump (defaults to storage.legacy_path)
        #[arg(short, long)]
        legacy: Option<PathBuf>,
    },

    /// Compress an image file and store it
    PutImage {
        id: String,
        file: PathBuf,

        /// Category tag, e.g. avatar or wallpaper
        #[arg(short, long, default_value = "image")]
        kind: String,

        /// Store the file as-is without compressing
        #[arg(long)]
        raw: bool,
    },

    /// List stored images
    Images {
        /// Only images of this kind
        #[arg(short, long)]
        kind: Option<String>,
    },

    /// Remove a stored image
    RmImage { id: String },

    /// Show storage usage
    Usage,

    /// Export images and settings to a JSON backup
    Export {
        /// Output file (defaults to a timestamped name)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Search every configured music provider
    Search { keyword: String },

    /// Translate text with the configured endpoint
    Translate {
        text: String,

        #[arg(long, default_value = "auto")]
        from: String,

        #[arg(long, default_value = "en")]
        to: String,
    },
}

/// Boot the app against the configured database, exiting when it cannot be opened
async fn open_app(config: &HomescreenConfig) -> anyhow::Result<HomeScreen> {
    config::ensure_db_dir(&PathBuf::from(&config.storage.database))?;
    let app = HomeScreen::boot(config.clone()).await;
    if !app.has_storage() {
        ui::error(&format!("Cannot open database {}", config.storage.database));
        std::process::exit(1);
    }
    Ok(app)
}

fn describe_lock(state: LockState) -> &'static str {
    match state {
        LockState::Unlocked => "off",
        LockState::Locked(LockStage::NoAuth) => "slide to unlock",
        LockState::Locked(LockStage::AwaitingSecondaryAuth) => "waiting for PIN or pattern",
    }
}

fn preview(value: &Value) -> String {
    let text = value.to_string();
    if text.chars().count() > 60 {
        let cut: String = text.chars().take(57).collect();
        format!("{}...", cut)
    } else {
        text
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = config::load_config(cli.config.as_deref())?.unwrap_or_default();

    match cli.command {
        Commands::Init { force } => {
            let path = cli.config.clone().unwrap_or_else(config::default_config_path);
            config::write_config(&path, &config, force)?;
            open_app(&config).await?;

            ui::header("Homescreen initialized");
            ui::status(Icons::PACKAGE, "Config", &path.display().to_string());
            ui::status(Icons::DATABASE, "Database", &config.storage.database);
        }

        Commands::Get { key } => {
            let app = open_app(&config).await?;
            match app.kv()?.entry(&key).await? {
                Some(entry) => println!("{}", serde_json::to_string_pretty(&entry.value)?),
                None => {
                    ui::warn(&format!("No value stored under {}", key));
                    std::process::exit(1);
                }
            }
        }

        Commands::Set { key, value, text } => {
            let value = if text {
                Value::String(value)
            } else {
                serde_json::from_str(&value).map_err(|e| {
                    anyhow::anyhow!("{} is not valid JSON ({}); use --text to store plain text", value, e)
                })?
            };
            let app = open_app(&config).await?;
            app.kv()?.set(&key, value).await?;
            ui::success(&format!("Stored {}", key));
        }

        Commands::Rm { key } => {
            let app = open_app(&config).await?;
            app.kv()?.remove(&key).await?;
            println!("{} Removed {}", Icons::DEL, key);
        }

        Commands::Keys => {
            let app = open_app(&config).await?;
            let entries = app.kv()?.entries().await?;
            if entries.is_empty() {
                println!("∅ No settings stored.");
            } else {
                ui::section(" Settings ");
                for entry in &entries {
                    ui::key_value(&entry.key, &ui::muted(&preview(&entry.value)));
                }
                ui::summary_row("Total:", &entries.len().to_string());
            }
        }

        Commands::Status => {
            let app = open_app(&config).await?;
            let keys = app.kv()?.list_keys().await?;
            let images = app.blobs()?.list_all().await?;

            ui::header("Homescreen status");
            ui::status(Icons::DATABASE, "Database", &config.storage.database);
            ui::status(Icons::KEY, "Settings", &keys.len().to_string());
            ui::status(Icons::IMAGE, "Images", &images.len().to_string());
            ui::status(Icons::LOCK, "Lock screen", describe_lock(app.lock().state()));
        }

        Commands::Clear { images } => {
            let app = open_app(&config).await?;
            app.kv()?.clear().await?;
            if images {
                app.blobs()?.clear().await?;
            }
            ui::success(if images { "Cleared settings and images" } else { "Cleared settings" });
        }

        Commands::Migrate { keys, all, legacy } => {
            let legacy_path = legacy
                .or_else(|| config.storage.legacy_path.as_ref().map(PathBuf::from))
                .ok_or_else(|| anyhow::anyhow!("no legacy dump given (use --legacy or storage.legacy_path)"))?;

            let source = JsonFileLegacyStorage::load(&legacy_path)?;
            let allow = AllowList::default();
            let keys = if all || keys.is_empty() { allow.keys() } else { keys };

            let app = open_app(&config).await?;
            let kv = app.kv()?;
            println!("{} Migrating {} keys from {}", Icons::MOVE, keys.len(), legacy_path.display());
            let migrated = kv.migrate_legacy(&source, &allow, &keys).await?;
            if all {
                kv.set(LEGACY_MIGRATED_KEY, Value::Bool(true)).await?;
            }
            ui::success(&format!("Migrated {} of {} keys", migrated, keys.len()));
        }

        Commands::PutImage { id, file, kind, raw } => {
            let bytes = std::fs::read(&file)?;
            let original = bytes.len() as u64;
            let app = open_app(&config).await?;
            let record = if raw {
                let data = raw_data_url(bytes)?;
                store_image(app.blobs()?, &id, &data, &kind).await?
            } else {
                app.upload_image(&id, bytes, &kind).await?
            };
            ui::success(&format!("Stored {} ({})", record.id, record.kind));
            ui::summary_row("Original:", &ui::human_bytes(original));
            ui::summary_row("Stored:", &ui::human_bytes(record.data.len() as u64));
        }

        Commands::Images { kind } => {
            let app = open_app(&config).await?;
            let images = match &kind {
                Some(kind) => app.blobs()?.list_by_kind(kind).await?,
                None => app.blobs()?.list_all().await?,
            };
            if images.is_empty() {
                println!("∅ No images stored.");
            } else {
                ui::section(" Images ");
                for image in &images {
                    let created = chrono::DateTime::from_timestamp_millis(image.created_at)
                        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_default();
                    println!(
                        "{} {} [{}] {} {}",
                        Icons::IMAGE,
                        image.id,
                        image.kind,
                        ui::human_bytes(image.data.len() as u64),
                        ui::dim(&created)
                    );
                }
            }
        }

        Commands::RmImage { id } => {
            let app = open_app(&config).await?;
            app.blobs()?.delete(&id).await?;
            println!("{} Removed image {}", Icons::DEL, id);
        }

        Commands::Usage => {
            let app = open_app(&config).await?;
            let stores = app.stores()?;
            let stats = stores.db.run(|store| store.stats()).await?;
            println!("{} Homescreen Storage ({})", Icons::STATS, config.storage.database);
            println!("------------------------------------");
            println!("{}", stats);

            match stores.blobs.estimate_usage().await? {
                Some(usage) => ui::info(
                    "Quota",
                    &format!(
                        "{} of {} ({:.1}%)",
                        ui::human_bytes(usage.used_bytes),
                        ui::human_bytes(usage.quota_bytes),
                        usage.ratio() * 100.0
                    ),
                ),
                None => ui::info("Quota", "not configured"),
            }
        }

        Commands::Export { out } => {
            let app = open_app(&config).await?;
            let doc = app.export().await?;
            let out = out.unwrap_or_else(|| PathBuf::from(doc.file_name()));
            doc.write_to(&out)?;
            ui::success(&format!(
                "Exported {} images and {} settings to {}",
                doc.images.len(),
                doc.settings.len(),
                out.display()
            ));
        }

        Commands::Search { keyword } => {
            if config.remote.music.is_empty() {
                ui::warn("No music providers configured ([[remote.music]] in homescreen.toml)");
                return Ok(());
            }
            let providers: Vec<Box<dyn MusicProvider>> = config
                .remote
                .music
                .iter()
                .map(|p| Box::new(HttpMusicProvider::new(&p.name, &p.endpoint)) as Box<dyn MusicProvider>)
                .collect();

            println!("{} Searching {} providers for '{}'...", Icons::MUSIC, providers.len(), keyword);
            let result = remote::search_all(&providers, &keyword).await;

            for failure in &result.failures {
                ui::warn(&format!("{} failed: {}", failure.provider, failure.error));
            }
            if result.tracks.is_empty() {
                println!("❌ No tracks found.");
            } else {
                for track in &result.tracks {
                    println!("- {} - {} {}", track.name, track.artist, ui::dim(&format!("[{}]", track.source)));
                    println!("  {}", ui::muted(&track.url));
                }
            }
        }

        Commands::Translate { text, from, to } => {
            let endpoint = config
                .remote
                .translate_endpoint
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("remote.translate_endpoint is not configured"))?;
            let translated = Translator::new(endpoint).translate(&text, &from, &to).await?;
            println!("{} {}", Icons::GLOBE, translated);
        }
    }

    Ok(())
}
