//! Submit a profile snapshot.

use anyhow::{Context, Result};
use pulse_client::{
    build_snapshot, first_open_or_init, DeliveryClient, FileStore, HostProfile, PipelineConfig,
    ProfileFields, ReqwestTransport,
};
use pulse_types::now_millis;
use std::path::Path;
use std::sync::Arc;

use crate::config::ensure_data_dir;

/// Profile fields from flags, falling back to the configured identity.
pub fn fields(
    config: &PipelineConfig,
    identity: Option<String>,
    push_token: Option<String>,
    affiliate_id: Option<String>,
    promo_code: Option<String>,
) -> ProfileFields {
    ProfileFields {
        identity: identity.or_else(|| config.collector.identity.clone()),
        push_token,
        affiliate_id,
        promo_code,
    }
}

/// Run the profile command.
pub async fn run(config: &PipelineConfig, data_dir: &Path, fields: ProfileFields) -> Result<()> {
    let identity = fields.identity.clone().context(
        "No user identity. Pass --identity or set collector.identity in pulse.toml.",
    )?;

    ensure_data_dir(data_dir).await?;
    let store = FileStore::new(data_dir);
    let now = now_millis();
    let first_open = first_open_or_init(&store, now)
        .await
        .context("Failed to read first-open state")?;

    let provider = HostProfile::detect(config.profile.clone());
    let snapshot = build_snapshot(&provider, &fields, first_open, now);

    let transport = Arc::new(ReqwestTransport::new()?);
    let delivery = DeliveryClient::new(config.delivery_config(), transport);
    delivery
        .submit_profile(&identity, &snapshot)
        .await
        .context("Failed to submit profile")?;

    println!("Profile updated for {}", identity);
    Ok(())
}
