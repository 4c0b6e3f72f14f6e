//! Show effective configuration and stored state.

use anyhow::{Context, Result};
use pulse_client::{FileStore, FirstOpenStore, PipelineConfig};
use std::path::Path;

/// Run the status command.
pub async fn run(config: &PipelineConfig, data_dir: &Path) -> Result<()> {
    println!("=== pulse status ===");
    println!();

    let delivery = config.delivery_config();
    println!("Collector:");
    println!("  URL:      {}", delivery.base_url);
    println!(
        "  Identity: {}",
        config.collector.identity.as_deref().unwrap_or("NOT SET")
    );
    println!();

    let store = FileStore::new(data_dir);
    println!("State:");
    println!("  File:       {}", store.path().display());
    match store.load().await {
        Ok(Some(millis)) => println!("  First open: {} ({})", millis, format_timestamp(millis)),
        Ok(None) => println!("  First open: not recorded"),
        Err(e) => println!("  First open: unreadable ({})", e),
    }
    println!();

    println!("Effective configuration:");
    let text = toml::to_string_pretty(config).context("Failed to render configuration")?;
    for line in text.lines() {
        println!("  {}", line);
    }

    Ok(())
}

/// Format a millisecond timestamp relative to now.
fn format_timestamp(millis: i64) -> String {
    let now = pulse_types::now_millis();
    let diff = now.saturating_sub(millis).max(0) / 1000;

    if diff < 60 {
        "just now".to_string()
    } else if diff < 3600 {
        format!("{} minutes ago", diff / 60)
    } else if diff < 86400 {
        format!("{} hours ago", diff / 3600)
    } else {
        format!("{} days ago", diff / 86400)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn status_without_state() {
        let dir = tempdir().unwrap();
        let result = run(&PipelineConfig::default(), dir.path()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn status_with_recorded_first_open() {
        let dir = tempdir().unwrap();
        FileStore::new(dir.path()).save(1_700_000_000_000).await.unwrap();

        let result = run(&PipelineConfig::for_host("example.com", true), dir.path()).await;
        assert!(result.is_ok());
    }

    #[test]
    fn format_timestamp_works() {
        let now = pulse_types::now_millis();

        assert_eq!(format_timestamp(now), "just now");
        assert!(format_timestamp(now - 120_000).contains("minutes"));
        assert!(format_timestamp(now - 7_200_000).contains("hours"));
        assert!(format_timestamp(now - 172_800_000).contains("days"));
    }
}
