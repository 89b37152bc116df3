//! Server configuration: `config.toml` overlaid with `MEDREP_*` variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Deserialize;

/// Runtime server configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:              String,
  pub port:              u16,
  pub store_path:        PathBuf,
  /// Manager account created on startup when no user of that name exists.
  pub bootstrap_manager: Option<BootstrapManager>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BootstrapManager {
  pub username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
}

impl ServerConfig {
  /// Layer defaults, the file at `path` (optional), and the environment.
  ///
  /// Nested keys use a double underscore, e.g.
  /// `MEDREP_BOOTSTRAP_MANAGER__USERNAME`.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = builder()?
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("MEDREP")
          .prefix_separator("_")
          .separator("__"),
      )
      .build()
      .context("failed to read configuration")?;

    let mut cfg: ServerConfig = settings
      .try_deserialize()
      .context("failed to deserialise ServerConfig")?;
    cfg.store_path = expand_tilde(&cfg.store_path);
    Ok(cfg)
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

fn builder() -> anyhow::Result<config::ConfigBuilder<config::builder::DefaultState>> {
  Ok(
    config::Config::builder()
      .set_default("host", "127.0.0.1")?
      .set_default("port", 8080)?
      .set_default("store_path", "~/.local/share/medrep/medrep.db")?,
  )
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use super::*;
  use config::FileFormat;

  fn parse(toml: &str) -> ServerConfig {
    builder()
      .unwrap()
      .add_source(config::File::from_str(toml, FileFormat::Toml))
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap()
  }

  #[test]
  fn defaults_fill_missing_keys() {
    let cfg = parse("port = 9000");
    assert_eq!(cfg.host, "127.0.0.1");
    assert_eq!(cfg.address(), "127.0.0.1:9000");
    assert!(cfg.bootstrap_manager.is_none());
  }

  #[test]
  fn reads_bootstrap_manager_table() {
    let cfg = parse(
      r#"
        store_path = "/var/lib/medrep/medrep.db"

        [bootstrap_manager]
        username      = "maha"
        password_hash = "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA"
      "#,
    );
    let manager = cfg.bootstrap_manager.unwrap();
    assert_eq!(manager.username, "maha");
    assert!(manager.password_hash.starts_with("$argon2id$"));
    assert_eq!(cfg.store_path, PathBuf::from("/var/lib/medrep/medrep.db"));
  }

  #[test]
  fn tilde_expansion_leaves_absolute_paths() {
    let abs = Path::new("/tmp/medrep.db");
    assert_eq!(expand_tilde(abs), abs.to_path_buf());
  }
}
