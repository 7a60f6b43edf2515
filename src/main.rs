//! # Tunewear CLI (`tw`)
//!
//! The `tw` binary drives the library against a local SQLite document
//! store and a remote recommendation service.
//!
//! ## Usage
//!
//! ```bash
//! tw --config ./config/tw.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `tw init` | Create the SQLite store and run schema migrations |
//! | `tw health` | Probe the recommendation service |
//! | `tw login` | Issue an anonymous user id |
//! | `tw recommend <ids...>` | Turn music ids into style labels |
//! | `tw sample <style> --user <id>` | Draw garments for a style |
//! | `tw save --user <id>` | Persist music ids, style tags and gender |
//! | `tw load --user <id>` | Show a user's stored selections |
//! | `tw add-garment --user <id> <json>` | Append a garment to the user's list |
//! | `tw seed` | Load the garment and song tables into the store |
//!
//! Log verbosity follows `RUST_LOG` (default `tunewear=info`). Logs go to
//! stderr so command output can be piped.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use tunewear::auth::{self, AnonymousIdentity};
use tunewear::config::{self, Config};
use tunewear::migrate;
use tunewear::mirror::{LoadOptions, UserStateMirror};
use tunewear::models::MirroredSample;
use tunewear::objects::create_object_store;
use tunewear::recommend::{RecommendClient, RecommendOutcome};
use tunewear::resolver::DownloadUrlResolver;
use tunewear::sampler::CatalogSampler;
use tunewear::seed::{read_cloth_table, read_songs_table, SeedLoader};
use tunewear::session::Session;
use tunewear::store::sqlite::SqliteStore;
use tunewear::store::DocumentStore;

/// Tunewear CLI: music-driven clothing style recommendations.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/tw.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "tw",
    about = "Tunewear: music-driven clothing style recommendations",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/tw.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the document store schema. Idempotent.
    Init,

    /// Check whether the recommendation service is reachable.
    Health,

    /// Sign in anonymously and print the new user id.
    Login,

    /// Ask the recommendation service for style labels.
    Recommend {
        /// Music ids to seed the recommendation with.
        #[arg(required = true)]
        ids: Vec<u32>,
    },

    /// Draw up to ten garments for a style and mirror them for the user.
    Sample {
        style: String,

        #[arg(long)]
        user: String,

        /// Fixed RNG seed for reproducible draws.
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Persist the user's selections. Unspecified fields keep their
    /// stored values.
    Save {
        #[arg(long)]
        user: String,

        /// Music ids (repeatable).
        #[arg(long = "music")]
        music: Vec<u32>,

        /// Style tags (repeatable).
        #[arg(long = "style")]
        style: Vec<String>,

        #[arg(long)]
        gender: Option<String>,
    },

    /// Print the user's stored selections.
    Load {
        #[arg(long)]
        user: String,

        /// Also restore mirrored samples and the music catalog.
        #[arg(long)]
        with_catalog: bool,
    },

    /// Append a garment (`{"img_id","img_url","web_url"}`) to the user's list.
    AddGarment {
        #[arg(long)]
        user: String,

        garment: String,
    },

    /// Load the static garment and song tables into the store.
    Seed {
        /// Garment table (JSON). Defaults to `seed.cloth_table`.
        #[arg(long)]
        cloth: Option<PathBuf>,

        /// Song table (JSON). Defaults to `seed.songs_table`.
        #[arg(long)]
        songs: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "tunewear=info".into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Store initialized at {}.", cfg.store.path.display());
        }
        Commands::Health => {
            let client = RecommendClient::from_config(&cfg.api)?;
            if client.health().await {
                println!("{}: ok", client.base_url());
            } else {
                bail!("{}: unreachable", client.base_url());
            }
        }
        Commands::Login => {
            let session = Session::new();
            let user = auth::sign_in(&AnonymousIdentity, &session).await?;
            println!("{}", user);
        }
        Commands::Recommend { ids } => {
            let client = RecommendClient::from_config(&cfg.api)?;
            match client.recommend(&ids).await? {
                RecommendOutcome::Labels(labels) => {
                    if labels.is_empty() {
                        println!("No styles recommended.");
                    }
                    for label in labels {
                        println!("{}", label);
                    }
                }
                RecommendOutcome::RemoteError(err) => {
                    bail!(
                        "recommendation service returned {}: {}",
                        err.status,
                        err.message().unwrap_or("no message")
                    );
                }
            }
        }
        Commands::Sample { style, user, seed } => {
            let store = open_store(&cfg).await?;
            let resolver = DownloadUrlResolver::new(create_object_store(&cfg.objects)?);
            let session = signed_in(&user);
            let sampler = CatalogSampler::new(store, resolver, session);

            let report = match seed {
                Some(seed) => {
                    use rand::SeedableRng;
                    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
                    sampler.fetch_style_items_with_rng(&style, &mut rng).await?
                }
                None => sampler.fetch_style_items(&style).await?,
            };

            println!(
                "{} ({:?}, max {}): {} item(s) in {} attempt(s)",
                report.style,
                report.mode,
                report.max_size,
                report.items.len(),
                report.attempts
            );
            for item in &report.items {
                println!("  {:>4}  {}  {}", item.img_id, item.img_url, item.web_url);
            }
        }
        Commands::Save {
            user,
            music,
            style,
            gender,
        } => {
            let store = open_store(&cfg).await?;
            let session = signed_in(&user);
            let mirror = UserStateMirror::new(store, session.clone());
            mirror.load(LoadOptions::default()).await?;

            if !music.is_empty() {
                session.set_music_ids(music);
            }
            if !style.is_empty() {
                session.set_style_tags(style);
            }
            if let Some(gender) = gender {
                session.set_gender(gender);
            }
            mirror.save().await?;
            println!("Saved selections for {}.", user);
        }
        Commands::Load { user, with_catalog } => {
            let store = open_store(&cfg).await?;
            let session = signed_in(&user);
            let mirror = UserStateMirror::new(store, session.clone());
            let report = mirror.load(LoadOptions { with_catalog }).await?;

            if !report.found {
                println!("No stored selections for {}.", user);
                return Ok(());
            }
            let snap = session.snapshot();
            println!("music:  {:?}", snap.music_ids);
            println!("styles: {:?}", snap.style_tags);
            println!("gender: {}", snap.gender);
            if with_catalog {
                for batch in &snap.cloth_batches {
                    println!("garments: {}", batch.len());
                }
                println!("tracks: {}", report.tracks_loaded);
            }
        }
        Commands::AddGarment { user, garment } => {
            let item: MirroredSample =
                serde_json::from_str(&garment).context("Failed to parse garment JSON")?;
            let store = open_store(&cfg).await?;
            let mirror = UserStateMirror::new(store, signed_in(&user));
            mirror.add_garment(&item).await?;
            println!("Added garment {} for {}.", item.img_id, user);
        }
        Commands::Seed { cloth, songs } => {
            let cloth_path = cloth.or_else(|| cfg.seed.cloth_table.clone());
            let songs_path = songs.or_else(|| cfg.seed.songs_table.clone());
            if cloth_path.is_none() && songs_path.is_none() {
                bail!("nothing to seed: pass --cloth/--songs or set [seed] in the config");
            }
            let cloth_rows = match cloth_path {
                Some(p) => read_cloth_table(&p)?,
                None => Vec::new(),
            };
            let song_rows = match songs_path {
                Some(p) => read_songs_table(&p)?,
                None => Vec::new(),
            };

            let store = open_store(&cfg).await?;
            let resolver = DownloadUrlResolver::new(create_object_store(&cfg.objects)?);
            let report = SeedLoader::new(store, resolver)
                .seed_all(&cloth_rows, &song_rows)
                .await?;

            println!("Garments written: {}", report.garments_written);
            for (style, max_size) in &report.styles_counted {
                println!("  {:<16} max_size={}", style, max_size);
            }
            println!(
                "Songs written: {} (skipped {})",
                report.songs_written, report.songs_skipped
            );
        }
    }

    Ok(())
}

async fn open_store(cfg: &Config) -> anyhow::Result<Arc<dyn DocumentStore>> {
    let store = SqliteStore::open(&cfg.store.path).await?;
    Ok(Arc::new(store))
}

fn signed_in(user: &str) -> Arc<Session> {
    let session = Arc::new(Session::new());
    session.set_user(user);
    session
}
