//! larder-server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`) overlaid with
//! `LARDER_*` environment variables, loads the ontology snapshot, and serves
//! the decision API over HTTP. A snapshot that fails to load stops startup.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use larder_api::{AppState, ServerConfig, load_snapshot};
use larder_core::SnapshotHandle;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Larder allergen and expiry decision server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("LARDER"))
    .build()
    .context("failed to read config file")?;

  let mut server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;
  server_cfg.ontology_path = expand_tilde(&server_cfg.ontology_path);

  let snapshot = load_snapshot(&server_cfg.ontology_path)
    .await
    .with_context(|| {
      format!("failed to load ontology from {:?}", server_cfg.ontology_path)
    })?;
  let stats = snapshot.stats();
  tracing::info!(
    fingerprint = %stats.fingerprint,
    ingredients = stats.ingredients,
    allergens = stats.allergens,
    risk_phrases = stats.risk_phrases,
    "ontology loaded"
  );

  let state = AppState {
    snapshot: Arc::new(SnapshotHandle::new(snapshot)),
    config:   Arc::new(server_cfg.clone()),
  };

  let app = larder_api::router(state);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
