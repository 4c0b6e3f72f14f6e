//! Configuration loading for the pulse CLI.

use anyhow::{Context, Result};
use pulse_client::PipelineConfig;
use std::path::{Path, PathBuf};

/// Configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "pulse.toml";

/// Load the pipeline configuration.
///
/// An explicit path must exist. Without one, `./pulse.toml` is used when
/// present and built-in defaults otherwise.
pub fn load(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => {
            let local = Path::new(DEFAULT_CONFIG_FILE);
            if local.exists() {
                PipelineConfig::from_file(local).context("Failed to load ./pulse.toml")
            } else {
                Ok(PipelineConfig::default())
            }
        }
    }
}

/// Get the default data directory for pulse.
pub fn default_data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("io", "pulse", "pulse")
        .context("Could not determine home directory")?;
    Ok(dirs.data_dir().to_path_buf())
}

/// Create the data directory, owner-only on Unix.
pub async fn ensure_data_dir(path: &Path) -> Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .context("Failed to create data directory")?;
    set_dir_permissions_0700(path).await
}

/// Set directory permissions to 0700 (owner only) on Unix.
/// No-op on non-Unix platforms.
async fn set_dir_permissions_0700(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
            .await
            .context("Failed to set directory permissions")?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}
