use crate::core::config::AppConfig;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

const EXAMPLE_CONFIG: &str = include_str!("../../docs/example_config.yaml");

/// Writes the example configuration to `config_path`, or to the default
/// location when none is given. Returns the path written.
pub fn run(config_path: Option<&str>) -> Result<PathBuf> {
    let path = match config_path {
        Some(p) => PathBuf::from(p),
        None => AppConfig::default_config_path()?,
    };
    setup_at_path(&path)?;
    println!("Created example configuration at {}", path.display());
    Ok(path)
}

pub fn setup_at_path<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();

    if path.exists() {
        anyhow::bail!("Configuration file already exists at {}", path.display());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    std::fs::write(path, EXAMPLE_CONFIG)
        .with_context(|| format!("Failed to write config file to {}", path.display()))?;

    tracing::info!("Created default configuration at {}", path.display());
    Ok(())
}
