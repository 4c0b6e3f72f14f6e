//! Device and user attributes for profile snapshots.
//!
//! [`ProfileProvider`] is the read-only boundary to whatever platform
//! layer knows about the device. [`ProfileFields`] is the part the host
//! application sets explicitly (identity, push token, affiliate data).
//! [`build_snapshot`] combines both into the document sent to the
//! collector.

use pulse_types::ProfileSnapshot;
use serde::{Deserialize, Serialize};

/// Read-only source of device attributes. Every accessor may return `None`.
pub trait ProfileProvider: Send + Sync {
    /// Host application package / bundle identifier.
    fn package_name(&self) -> Option<String> {
        None
    }

    /// Operating system version string.
    fn os_version(&self) -> Option<String> {
        None
    }

    /// Hardware identifier (e.g. machine architecture or model code).
    fn device_identifier(&self) -> Option<String> {
        None
    }

    /// Human-readable device model.
    fn device_model(&self) -> Option<String> {
        None
    }

    /// Host application version.
    fn app_version(&self) -> Option<String> {
        None
    }

    /// Host application build number.
    fn app_version_code(&self) -> Option<i64> {
        None
    }

    /// OS build identifier.
    fn build_id(&self) -> Option<String> {
        None
    }

    /// Locale identifier, e.g. `en_US`.
    fn locale(&self) -> Option<String> {
        None
    }

    /// Upper-case country code.
    fn country_code(&self) -> Option<String> {
        None
    }

    /// Advertising identifier.
    fn advertising_id(&self) -> Option<String> {
        None
    }

    /// Whether ad tracking is limited.
    fn is_limited_ad_tracking(&self) -> Option<bool> {
        None
    }
}

/// Fixed attribute values, typically loaded from the `[profile]` config
/// section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticProfile {
    /// Package name.
    pub package: Option<String>,
    /// OS version.
    pub os_version: Option<String>,
    /// Device identifier.
    pub device: Option<String>,
    /// Device model.
    pub device_model: Option<String>,
    /// App version.
    pub app_version: Option<String>,
    /// App build number.
    pub app_version_code: Option<i64>,
    /// OS build id.
    pub build_id: Option<String>,
    /// Locale identifier.
    pub locale: Option<String>,
    /// Country code.
    pub geo: Option<String>,
    /// Advertising identifier.
    pub advertising_id: Option<String>,
    /// Limited ad tracking flag.
    pub is_limited_ad_tracking: Option<bool>,
}

impl ProfileProvider for StaticProfile {
    fn package_name(&self) -> Option<String> {
        self.package.clone()
    }

    fn os_version(&self) -> Option<String> {
        self.os_version.clone()
    }

    fn device_identifier(&self) -> Option<String> {
        self.device.clone()
    }

    fn device_model(&self) -> Option<String> {
        self.device_model.clone()
    }

    fn app_version(&self) -> Option<String> {
        self.app_version.clone()
    }

    fn app_version_code(&self) -> Option<i64> {
        self.app_version_code
    }

    fn build_id(&self) -> Option<String> {
        self.build_id.clone()
    }

    fn locale(&self) -> Option<String> {
        self.locale.clone()
    }

    fn country_code(&self) -> Option<String> {
        self.geo.as_ref().map(|g| g.to_uppercase())
    }

    fn advertising_id(&self) -> Option<String> {
        self.advertising_id.clone()
    }

    fn is_limited_ad_tracking(&self) -> Option<bool> {
        self.is_limited_ad_tracking
    }
}

/// Provider for a plain host process.
///
/// Reports the OS family and architecture, and derives locale and country
/// from `LC_ALL` / `LC_MESSAGES` / `LANG`. Values in `overrides` win over
/// anything detected.
#[derive(Debug, Clone, Default)]
pub struct HostProfile {
    overrides: StaticProfile,
    lang: Option<String>,
}

impl HostProfile {
    /// Detect from the current environment.
    pub fn detect(overrides: StaticProfile) -> Self {
        let lang = ["LC_ALL", "LC_MESSAGES", "LANG"]
            .iter()
            .filter_map(|key| std::env::var(key).ok())
            .find(|value| !value.is_empty());
        Self { overrides, lang }
    }

    /// Build with an explicit locale string instead of the environment.
    pub fn with_lang(overrides: StaticProfile, lang: Option<&str>) -> Self {
        Self {
            overrides,
            lang: lang.map(str::to_string),
        }
    }
}

/// `en_US.UTF-8@euro` -> `en_US`. `C` and `POSIX` carry no locale.
fn parse_locale(lang: &str) -> Option<String> {
    let base = lang.split(|c| c == '.' || c == '@').next().unwrap_or_default().trim();
    if base.is_empty() || base == "C" || base == "POSIX" {
        return None;
    }
    Some(base.replace('-', "_"))
}

fn region_of(locale: &str) -> Option<String> {
    let (_, region) = locale.split_once('_')?;
    if region.len() == 2 && region.chars().all(|c| c.is_ascii_alphabetic()) {
        Some(region.to_ascii_uppercase())
    } else {
        None
    }
}

impl ProfileProvider for HostProfile {
    fn package_name(&self) -> Option<String> {
        self.overrides.package_name()
    }

    fn os_version(&self) -> Option<String> {
        self.overrides
            .os_version()
            .or_else(|| Some(std::env::consts::OS.to_string()))
    }

    fn device_identifier(&self) -> Option<String> {
        self.overrides
            .device_identifier()
            .or_else(|| Some(std::env::consts::ARCH.to_string()))
    }

    fn device_model(&self) -> Option<String> {
        self.overrides
            .device_model()
            .or_else(|| Some(std::env::consts::FAMILY.to_string()))
    }

    fn app_version(&self) -> Option<String> {
        self.overrides.app_version()
    }

    fn app_version_code(&self) -> Option<i64> {
        self.overrides.app_version_code()
    }

    fn build_id(&self) -> Option<String> {
        self.overrides.build_id()
    }

    fn locale(&self) -> Option<String> {
        self.overrides
            .locale()
            .or_else(|| self.lang.as_deref().and_then(parse_locale))
    }

    fn country_code(&self) -> Option<String> {
        self.overrides
            .country_code()
            .or_else(|| self.locale().as_deref().and_then(region_of))
    }

    fn advertising_id(&self) -> Option<String> {
        self.overrides.advertising_id()
    }

    fn is_limited_ad_tracking(&self) -> Option<bool> {
        self.overrides.is_limited_ad_tracking()
    }
}

/// Attributes set explicitly by the host application.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileFields {
    /// User identity; nothing is delivered without it.
    pub identity: Option<String>,
    /// Push notification token.
    pub push_token: Option<String>,
    /// Affiliate click id.
    pub affiliate_id: Option<String>,
    /// Affiliate promo code.
    pub promo_code: Option<String>,
}

/// Assemble a full snapshot.
///
/// `first_open` comes from the first-open store and `now` becomes the
/// last-update timestamp. `device` is always null; `device_model` carries
/// the hardware identifier, or the model name when there is none.
pub fn build_snapshot(
    provider: &dyn ProfileProvider,
    fields: &ProfileFields,
    first_open: i64,
    now: i64,
) -> ProfileSnapshot {
    ProfileSnapshot {
        lib_id: None,
        package: provider.package_name(),
        app_first_open_timestamp: Some(first_open),
        app_last_update_timestamp: Some(now),
        app_delete_timestamp: None,
        push_token: fields.push_token.clone(),
        geo: provider.country_code(),
        os_version: provider.os_version(),
        // The collector reads the hardware identifier from `device_model`.
        device: None,
        device_model: provider.device_identifier().or_else(|| provider.device_model()),
        app_version: provider.app_version(),
        referrer: None,
        attribution_installation_id: None,
        is_limited_ad_tracking: provider.is_limited_ad_tracking(),
        advertising_id: provider.advertising_id(),
        os_version_int: None,
        app_version_code: provider.app_version_code(),
        build_id: provider.build_id(),
        locale: provider.locale(),
        hints: None,
        affiliate_id: fields.affiliate_id.clone(),
        promo_code: fields.promo_code.clone(),
    }
}
