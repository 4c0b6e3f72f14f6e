//! Collector addressing rules.
//!
//! Turns a user-supplied host string into a base URL and maps each
//! delivery operation onto a method and path. No parsing or validation of
//! the final URL happens here; the HTTP layer does that.

use std::fmt;

/// API version segment appended to every collector base URL.
pub const API_VERSION: &str = "v1";

/// HTTP method of a collector request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// Reachability probe.
    Get,
    /// Profile snapshot submission.
    Patch,
    /// Event batch submission.
    Post,
}

impl Method {
    /// Upper-case method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Patch => "PATCH",
            Method::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A collector operation keyed by user identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// `PATCH /users/{identity}`
    Profile(String),
    /// `POST /users/{identity}/event`
    Events(String),
}

impl Endpoint {
    /// Method used for this endpoint.
    pub fn method(&self) -> Method {
        match self {
            Endpoint::Profile(_) => Method::Patch,
            Endpoint::Events(_) => Method::Post,
        }
    }

    /// Path relative to the base URL, with a leading `/`.
    pub fn path(&self) -> String {
        match self {
            Endpoint::Profile(identity) => format!("/users/{}", identity),
            Endpoint::Events(identity) => format!("/users/{}/event", identity),
        }
    }

    /// The identity this request is for.
    pub fn identity(&self) -> &str {
        match self {
            Endpoint::Profile(identity) | Endpoint::Events(identity) => identity,
        }
    }
}

/// Strip whitespace, any scheme prefix and surrounding slashes from a host.
pub fn clean_host(host: &str) -> String {
    host.trim()
        .replace("http://", "")
        .replace("https://", "")
        .trim_matches('/')
        .to_string()
}

fn scheme(use_https: bool) -> &'static str {
    if use_https {
        "https"
    } else {
        "http"
    }
}

/// `scheme://host`, used by the reachability probe.
pub fn origin_url(host: &str, use_https: bool) -> String {
    format!("{}://{}", scheme(use_https), clean_host(host))
}

/// `scheme://host/v1`, the prefix of every delivery URL.
pub fn base_url(host: &str, use_https: bool) -> String {
    format!("{}/{}", origin_url(host, use_https), API_VERSION)
}

/// Full delivery URL for an endpoint.
pub fn endpoint_url(base_url: &str, endpoint: &Endpoint) -> String {
    format!("{}{}", base_url, endpoint.path())
}

/// Host with scheme, path and port removed.
pub fn host_name(host: &str) -> String {
    let cleaned = clean_host(host);
    let without_path = cleaned.split('/').next().unwrap_or_default();
    without_path
        .split(':')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Check if a host points at the local machine or a private network.
///
/// Plaintext HTTP to anything else deserves a warning.
pub fn is_local_host(host: &str) -> bool {
    let host = host.trim();
    let cleaned = clean_host(host);
    host.contains("localhost")
        || host.contains("127.0.0.1")
        || cleaned.starts_with("192.168.")
        || cleaned.starts_with("10.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_strips_scheme_and_slashes() {
        assert_eq!(
            base_url("  https://collector.example.com/ ", true),
            "https://collector.example.com/v1"
        );
        assert_eq!(
            base_url("http://192.168.1.100:8000", false),
            "http://192.168.1.100:8000/v1"
        );
        assert_eq!(base_url("/api.host/", false), "http://api.host/v1");
    }

    #[test]
    fn scheme_follows_flag_not_input() {
        assert_eq!(base_url("http://example.com", true), "https://example.com/v1");
        assert_eq!(base_url("https://example.com", false), "http://example.com/v1");
    }

    #[test]
    fn origin_has_no_version() {
        assert_eq!(origin_url("example.com", true), "https://example.com");
    }

    #[test]
    fn endpoint_methods_and_paths() {
        let profile = Endpoint::Profile("user-1".into());
        let events = Endpoint::Events("user-1".into());

        assert_eq!(profile.method(), Method::Patch);
        assert_eq!(profile.path(), "/users/user-1");
        assert_eq!(events.method(), Method::Post);
        assert_eq!(events.path(), "/users/user-1/event");
        assert_eq!(events.identity(), "user-1");
    }

    #[test]
    fn endpoint_url_joins() {
        let base = base_url("example.com", true);
        assert_eq!(
            endpoint_url(&base, &Endpoint::Events("abc".into())),
            "https://example.com/v1/users/abc/event"
        );
    }

    #[test]
    fn host_name_is_bare() {
        assert_eq!(host_name("https://api.example.com:8443/path"), "api.example.com");
        assert_eq!(host_name("example.com"), "example.com");
    }

    #[test]
    fn local_hosts_are_recognised() {
        assert!(is_local_host("localhost:8000"));
        assert!(is_local_host("http://127.0.0.1"));
        assert!(is_local_host("192.168.1.100"));
        assert!(is_local_host("http://10.0.0.5:8000"));
    }

    #[test]
    fn public_hosts_are_not_local() {
        assert!(!is_local_host("collector.example.com"));
        assert!(!is_local_host("172.16.0.1"));
        assert!(!is_local_host("110.1.1.1"));
    }

    #[test]
    fn method_display() {
        assert_eq!(Method::Patch.to_string(), "PATCH");
        assert_eq!(Method::Get.as_str(), "GET");
    }
}
