//! Send one event.

use anyhow::{bail, Context, Result};
use pulse_client::{FileStore, Pipeline, PipelineConfig, ReqwestTransport};
use pulse_types::{ParamValue, Parameters};
use std::path::Path;
use std::sync::Arc;

use crate::config::ensure_data_dir;

/// Build the parameter map from `key=value` pairs and an optional JSON
/// object. Pairs win over JSON keys.
///
/// Values that parse as JSON keep their type (`9.99`, `true`, `[1,2]`);
/// anything else is sent as a string.
pub fn parse_parameters(pairs: &[String], json: Option<&str>) -> Result<Parameters> {
    let mut parameters = match json {
        Some(text) => serde_json::from_str::<Parameters>(text)
            .context("--json must be a JSON object")?,
        None => Parameters::new(),
    };

    for pair in pairs {
        let (key, raw) = pair
            .split_once('=')
            .with_context(|| format!("Invalid parameter '{}', expected key=value", pair))?;
        if key.is_empty() {
            bail!("Invalid parameter '{}', empty key", pair);
        }
        let value = serde_json::from_str::<ParamValue>(raw)
            .unwrap_or_else(|_| ParamValue::from(raw));
        parameters.insert(key.to_string(), value);
    }

    Ok(parameters)
}

/// Run the track command.
pub async fn run(
    config: &PipelineConfig,
    data_dir: &Path,
    name: &str,
    parameters: Parameters,
    identity: Option<&str>,
) -> Result<()> {
    let mut config = config.clone();
    if let Some(identity) = identity {
        config.collector.identity = Some(identity.to_string());
    }
    if config.collector.identity.is_none() {
        bail!("No user identity. Pass --identity or set collector.identity in pulse.toml.");
    }

    ensure_data_dir(data_dir).await?;
    let transport = Arc::new(ReqwestTransport::new()?);
    let store = Arc::new(FileStore::new(data_dir));
    let pipeline = Pipeline::from_config(&config, transport, store);

    pipeline.log_event(name, parameters);
    let result = pipeline.deliver_now().await;
    pipeline.shutdown().await;

    let delivered = result.context("Failed to deliver event")?;
    println!(
        "Delivered {} event(s) to {}",
        delivered,
        config.delivery_config().base_url
    );
    Ok(())
}
