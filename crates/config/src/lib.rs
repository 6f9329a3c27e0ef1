use std::path::PathBuf;
use serde::Deserialize;

/// All configuration for the Courtside server.
///
/// Precedence (lowest to highest): defaults → config file → env var → CLI arg.
/// CLI arg merging is done by the caller after `Config::load()`.
#[derive(Debug, Clone)]
pub struct Config {
    // Database
    pub db_url: String,

    // Server
    pub port: u16,
    /// IANA zone that game dates and start times are written in.
    pub timezone: String,
    pub view_cache_ttl_secs: u64,

    // Logging
    pub log_level: String,
    pub utc: bool,

    // Identity provider
    pub auth_domain: String,
    pub auth_audience: String,
    /// Shared HS256 secret. When set, tokens are checked against it instead
    /// of the provider's published keys.
    pub auth_secret: Option<String>,

    // Places provider
    pub places_api_key: Option<String>,
}

/// Config file layout (~/.courtside/config.toml). All fields optional; they
/// layer on top of compiled-in defaults.
#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    db_url: Option<String>,
    port: Option<u16>,
    timezone: Option<String>,
    view_cache_ttl_secs: Option<u64>,
    log_level: Option<String>,
    utc: Option<bool>,
    auth_domain: Option<String>,
    auth_audience: Option<String>,
    auth_secret: Option<String>,
    places_api_key: Option<String>,
}

impl Config {
    /// Config directory: ~/.courtside/
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".courtside")
    }

    /// Config file path: ~/.courtside/config.toml
    pub fn file_path() -> PathBuf {
        Self::dir().join("config.toml")
    }

    /// Load config: defaults → config file → env vars.
    /// CLI args should be merged by the caller afterward.
    pub fn load() -> Self {
        let mut config = Self::defaults();

        // Layer 2: config file
        if let Ok(contents) = std::fs::read_to_string(Self::file_path()) {
            if let Ok(file) = toml::from_str::<FileConfig>(&contents) {
                config.apply_file(file);
            }
        }

        // Layer 3: environment variables
        config.apply_env();

        config
    }

    // --- Private helpers ---

    fn defaults() -> Self {
        Self {
            db_url: "sqlite:courtside.db".to_string(),
            port: 3000,
            timezone: "UTC".to_string(),
            view_cache_ttl_secs: 60,
            log_level: "info".to_string(),
            utc: false,
            auth_domain: "courtside.us.auth0.com".to_string(),
            auth_audience: "https://api.courtside.app".to_string(),
            auth_secret: None,
            places_api_key: None,
        }
    }

    fn apply_file(&mut self, file: FileConfig) {
        if let Some(v) = file.db_url { self.db_url = v; }
        if let Some(v) = file.port { self.port = v; }
        if let Some(v) = file.timezone { self.timezone = v; }
        if let Some(v) = file.view_cache_ttl_secs { self.view_cache_ttl_secs = v; }
        if let Some(v) = file.log_level { self.log_level = v; }
        if let Some(v) = file.utc { self.utc = v; }
        if let Some(v) = file.auth_domain { self.auth_domain = v; }
        if let Some(v) = file.auth_audience { self.auth_audience = v; }
        if let Some(v) = file.auth_secret { self.auth_secret = Some(v); }
        if let Some(v) = file.places_api_key { self.places_api_key = Some(v); }
    }

    fn apply_env(&mut self) {
        self.apply_vars(|key| std::env::var(key).ok());
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("COURTSIDE_DB_URL") { self.db_url = v; }
        if let Some(v) = var("COURTSIDE_PORT") {
            if let Ok(p) = v.parse() { self.port = p; }
        }
        if let Some(v) = var("COURTSIDE_TIMEZONE") { self.timezone = v; }
        if let Some(v) = var("COURTSIDE_VIEW_CACHE_TTL") {
            if let Ok(s) = v.parse() { self.view_cache_ttl_secs = s; }
        }
        if let Some(v) = var("COURTSIDE_LOG_LEVEL") { self.log_level = v; }
        if let Some(v) = var("COURTSIDE_UTC") {
            self.utc = v == "1" || v.eq_ignore_ascii_case("true");
        }
        if let Some(v) = var("AUTH_DOMAIN") { self.auth_domain = v; }
        if let Some(v) = var("AUTH_AUDIENCE") { self.auth_audience = v; }
        if let Some(v) = var("AUTH_SECRET") { self.auth_secret = Some(v); }
        if let Some(v) = var("PLACES_API_KEY") { self.places_api_key = Some(v); }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_layer_overrides_defaults() {
        let mut config = Config::defaults();
        let file: FileConfig = toml::from_str(
            r#"
            port = 8080
            timezone = "America/Chicago"
            places_api_key = "k"
            "#,
        )
        .unwrap();
        config.apply_file(file);

        assert_eq!(config.port, 8080);
        assert_eq!(config.timezone, "America/Chicago");
        assert_eq!(config.places_api_key.as_deref(), Some("k"));
        assert_eq!(config.db_url, "sqlite:courtside.db");
        assert_eq!(config.auth_secret, None);
    }

    #[test]
    fn env_layer_overrides_file() {
        let mut config = Config::defaults();
        config.apply_file(FileConfig {
            port: Some(8080),
            ..Default::default()
        });
        config.apply_vars(|key| match key {
            "COURTSIDE_PORT" => Some("9090".to_string()),
            "COURTSIDE_UTC" => Some("TRUE".to_string()),
            "AUTH_SECRET" => Some("dev-secret".to_string()),
            "COURTSIDE_VIEW_CACHE_TTL" => Some("not-a-number".to_string()),
            _ => None,
        });

        assert_eq!(config.port, 9090);
        assert!(config.utc);
        assert_eq!(config.auth_secret.as_deref(), Some("dev-secret"));
        assert_eq!(config.view_cache_ttl_secs, 60);
    }
}
