//! Check collector reachability.

use anyhow::{bail, Result};
use pulse_client::{probe, PipelineConfig, ReqwestTransport};

/// Run the probe command.
///
/// `host` overrides the configured collector; `https` forces HTTPS on top of
/// the configured scheme.
pub async fn run(config: &PipelineConfig, host: Option<&str>, https: bool) -> Result<()> {
    let host = host.unwrap_or(&config.collector.host);
    let use_https = https || config.collector.use_https;
    let transport = ReqwestTransport::new()?;

    let report = probe(&transport, host, use_https, config.probe_timeout()).await;
    if !report.reachable {
        bail!("{}", report);
    }

    println!("{}", report);
    Ok(())
}
