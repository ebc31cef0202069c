//! Connection options and base-URL assembly.

/// Path under which every tenant's app-layer API is mounted.
pub const API_PATH: &str = "/collectionspace/tenant";

const DEFAULT_HTTP_PORT: u16 = 80;

/// Where to find a CollectionSpace server.
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | `CSPACE_HOST` | (empty) | Host name; required by `SessionClient::new` |
/// | `CSPACE_PORT` | `8180` | TCP port; omitted from the URL when `80` |
/// | `CSPACE_SSL` | `false` | Use `https` instead of `http` |
/// | `CSPACE_TENANT` | `core` | Tenant short name |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    pub host: String,
    pub port: u16,
    pub ssl: bool,
    pub tenant: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 8180,
            ssl: false,
            tenant: "core".to_string(),
        }
    }
}

impl ClientOptions {
    /// Default options pointed at `host`.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    /// Populate options from environment variables, applying defaults where
    /// a variable is absent or unparsable.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            host: lookup("CSPACE_HOST").unwrap_or(defaults.host),
            port: lookup("CSPACE_PORT")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.port),
            ssl: lookup("CSPACE_SSL")
                .and_then(|v| parse_flag(&v))
                .unwrap_or(defaults.ssl),
            tenant: lookup("CSPACE_TENANT").unwrap_or(defaults.tenant),
        }
    }

    /// `scheme://host[:port]/collectionspace/tenant/<tenant>`, or just the
    /// path when no host is configured.
    pub fn base_url(&self) -> String {
        let mut url = String::new();
        if !self.host.is_empty() {
            url.push_str(if self.ssl { "https" } else { "http" });
            url.push_str("://");
            url.push_str(&self.host);
            if self.port != DEFAULT_HTTP_PORT {
                url.push_str(&format!(":{}", self.port));
            }
        }
        url.push_str(API_PATH);
        url.push('/');
        url.push_str(&self.tenant);
        url
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
