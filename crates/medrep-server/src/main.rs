//! medrep server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens the
//! SQLite store, makes sure the bootstrap manager exists, and serves the JSON
//! API under `/api`.
//!
//! # Password hash generation
//!
//! To generate the argon2 PHC string for `bootstrap_manager.password_hash`:
//!
//! ```text
//! cargo run -p medrep-server -- --hash-password
//! ```

mod settings;

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use axum::{Router, routing::get};
use clap::Parser;
use medrep_core::{rep::Role, store::SalesStore};
use medrep_store_sqlite::SqliteStore;
use rand_core::OsRng;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use settings::{BootstrapManager, ServerConfig};

#[derive(Parser)]
#[command(author, version, about = "Pharma sales workflow server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print the argon2 hash for a password entered on stdin and exit.
  #[arg(long)]
  hash_password: bool,
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

  if cli.hash_password {
    let password = read_password()?;
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?
      .to_string();
    println!("{hash}");
    return Ok(());
  }

  let cfg = ServerConfig::load(&cli.config)?;

  if let Some(parent) = cfg.store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {parent:?}"))?;
  }
  let store = SqliteStore::open(&cfg.store_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", cfg.store_path))?;

  if let Some(manager) = &cfg.bootstrap_manager {
    bootstrap(&store, manager).await?;
  }

  let app = Router::new()
    .route("/healthz", get(|| async { "ok" }))
    .nest("/api", medrep_api::api_router(Arc::new(store)))
    .layer(TraceLayer::new_for_http());

  let address = cfg.address();
  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Register the configured manager unless the username is already taken.
async fn bootstrap(store: &SqliteStore, manager: &BootstrapManager) -> anyhow::Result<()> {
  let existing = store
    .find_credentials(manager.username.clone())
    .await
    .context("failed to look up bootstrap manager")?;
  if existing.is_some() {
    tracing::debug!(username = %manager.username, "bootstrap manager already present");
    return Ok(());
  }
  store
    .add_rep(manager.username.clone(), Role::Manager, manager.password_hash.clone())
    .await
    .context("failed to create bootstrap manager")?;
  tracing::info!(username = %manager.username, "bootstrap manager created");
  Ok(())
}

/// Read a password from stdin.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  Ok(line.trim_end_matches(['\n', '\r']).to_string())
}
