//! Configuration management
//!
//! This module handles loading and parsing configuration for Inkpost.
//! Configuration can be loaded from:
//! - inkpost.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::models::MAX_PER_PAGE;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Blog identity and comment policy
    #[serde(default)]
    pub blog: BlogConfig,
    /// Post and comment directories
    #[serde(default)]
    pub content: ContentConfig,
    /// Spam checking
    #[serde(default)]
    pub spam: SpamConfig,
    /// Comment form challenge
    #[serde(default)]
    pub captcha: CaptchaConfig,
}

/// Server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "http://localhost:8080".to_string()
}

/// Blog configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlogConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_description")]
    pub description: String,
    /// Public base URL, used in the feed and sent to the spam service
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_posts_per_page")]
    pub posts_per_page: u32,
    /// Days after publishing that comments stay open; 0 never closes them
    #[serde(default)]
    pub comments_open_for_days: u32,
}

impl Default for BlogConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            description: default_description(),
            address: default_address(),
            posts_per_page: default_posts_per_page(),
            comments_open_for_days: 0,
        }
    }
}

fn default_name() -> String {
    "Inkpost".to_string()
}

fn default_description() -> String {
    "Blogging Engine".to_string()
}

fn default_address() -> String {
    "http://localhost:8080".to_string()
}

fn default_posts_per_page() -> u32 {
    10
}

/// Content directories
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentConfig {
    #[serde(default = "default_post_path")]
    pub post_path: PathBuf,
    #[serde(default = "default_comment_path")]
    pub comment_path: PathBuf,
    /// Follow filesystem notifications for the post directory
    #[serde(default = "default_watch")]
    pub watch: bool,
    /// Seconds between full rescans; 0 disables them
    #[serde(default = "default_rescan_interval")]
    pub rescan_interval_secs: u64,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            post_path: default_post_path(),
            comment_path: default_comment_path(),
            watch: default_watch(),
            rescan_interval_secs: default_rescan_interval(),
        }
    }
}

impl ContentConfig {
    pub fn rescan_interval(&self) -> Duration {
        Duration::from_secs(self.rescan_interval_secs)
    }
}

fn default_post_path() -> PathBuf {
    PathBuf::from("./posts")
}

fn default_comment_path() -> PathBuf {
    PathBuf::from("./comments")
}

fn default_watch() -> bool {
    true
}

fn default_rescan_interval() -> u64 {
    600
}

/// Spam service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpamConfig {
    /// Akismet API key; without one no comment is treated as spam
    #[serde(default)]
    pub akismet_api_key: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for SpamConfig {
    fn default() -> Self {
        Self {
            akismet_api_key: None,
            timeout_secs: default_timeout(),
        }
    }
}

/// Challenge verification configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptchaConfig {
    /// reCAPTCHA secret; without one the challenge is not required
    #[serde(default)]
    pub recaptcha_secret: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for CaptchaConfig {
    fn default() -> Self {
        Self {
            recaptcha_secret: None,
            timeout_secs: default_timeout(),
        }
    }
}

fn default_timeout() -> u64 {
    10
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError {
        path: String,
        message: String,
    },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist or is empty, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content).map_err(|e| {
            ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            }
        })?;

        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Environment variables follow the pattern `INKPOST_<SECTION>_<FIELD>`:
    /// - INKPOST_SERVER_HOST, INKPOST_SERVER_PORT, INKPOST_SERVER_CORS_ORIGIN
    /// - INKPOST_BLOG_NAME, INKPOST_BLOG_DESCRIPTION, INKPOST_BLOG_ADDRESS
    /// - INKPOST_BLOG_POSTS_PER_PAGE, INKPOST_BLOG_COMMENTS_OPEN_FOR_DAYS
    /// - INKPOST_CONTENT_POST_PATH, INKPOST_CONTENT_COMMENT_PATH
    /// - INKPOST_CONTENT_WATCH, INKPOST_CONTENT_RESCAN_INTERVAL_SECS
    /// - INKPOST_SPAM_AKISMET_API_KEY, INKPOST_CAPTCHA_RECAPTCHA_SECRET
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        // Server configuration
        if let Ok(host) = std::env::var("INKPOST_SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = env_parse("INKPOST_SERVER_PORT") {
            self.server.port = port;
        }
        if let Ok(cors_origin) = std::env::var("INKPOST_SERVER_CORS_ORIGIN") {
            self.server.cors_origin = cors_origin;
        }

        // Blog configuration
        if let Ok(name) = std::env::var("INKPOST_BLOG_NAME") {
            self.blog.name = name;
        }
        if let Ok(description) = std::env::var("INKPOST_BLOG_DESCRIPTION") {
            self.blog.description = description;
        }
        if let Ok(address) = std::env::var("INKPOST_BLOG_ADDRESS") {
            self.blog.address = address;
        }
        if let Some(per_page) = env_parse("INKPOST_BLOG_POSTS_PER_PAGE") {
            self.blog.posts_per_page = per_page;
        }
        if let Some(days) = env_parse("INKPOST_BLOG_COMMENTS_OPEN_FOR_DAYS") {
            self.blog.comments_open_for_days = days;
        }

        // Content configuration
        if let Ok(path) = std::env::var("INKPOST_CONTENT_POST_PATH") {
            self.content.post_path = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("INKPOST_CONTENT_COMMENT_PATH") {
            self.content.comment_path = PathBuf::from(path);
        }
        if let Ok(watch) = std::env::var("INKPOST_CONTENT_WATCH") {
            match watch.to_lowercase().as_str() {
                "true" | "1" | "yes" => self.content.watch = true,
                "false" | "0" | "no" => self.content.watch = false,
                _ => {} // Ignore invalid values
            }
        }
        if let Some(secs) = env_parse("INKPOST_CONTENT_RESCAN_INTERVAL_SECS") {
            self.content.rescan_interval_secs = secs;
        }

        // External services
        if let Ok(key) = std::env::var("INKPOST_SPAM_AKISMET_API_KEY") {
            self.spam.akismet_api_key = Some(key);
        }
        if let Ok(secret) = std::env::var("INKPOST_CAPTCHA_RECAPTCHA_SECRET") {
            self.captcha.recaptcha_secret = Some(secret);
        }
    }

    /// Checks settings that would make the server unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.blog.posts_per_page == 0 || self.blog.posts_per_page > MAX_PER_PAGE {
            return Err(ConfigError::ValidationError(format!(
                "blog.posts_per_page must be between 1 and {}",
                MAX_PER_PAGE
            )));
        }
        if !self.content.post_path.is_dir() {
            return Err(ConfigError::ValidationError(format!(
                "post directory '{}' does not exist",
                self.content.post_path.display()
            )));
        }
        Ok(())
    }
}

/// Parses an environment variable, ignoring it when unset or malformed.
fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared mutex for all config tests that modify environment variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
const ENV_VARS: &[&str] = &[
    "INKPOST_SERVER_HOST",
    "INKPOST_SERVER_PORT",
    "INKPOST_SERVER_CORS_ORIGIN",
    "INKPOST_BLOG_NAME",
    "INKPOST_BLOG_DESCRIPTION",
    "INKPOST_BLOG_ADDRESS",
    "INKPOST_BLOG_POSTS_PER_PAGE",
    "INKPOST_BLOG_COMMENTS_OPEN_FOR_DAYS",
    "INKPOST_CONTENT_POST_PATH",
    "INKPOST_CONTENT_COMMENT_PATH",
    "INKPOST_CONTENT_WATCH",
    "INKPOST_CONTENT_RESCAN_INTERVAL_SECS",
    "INKPOST_SPAM_AKISMET_API_KEY",
    "INKPOST_CAPTCHA_RECAPTCHA_SECRET",
];

#[cfg(test)]
fn clear_env() {
    for name in ENV_VARS {
        std::env::remove_var(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        super::CONFIG_ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let path = std::path::Path::new("nonexistent_inkpost.yml");
        let config = Config::load(path).unwrap();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.blog.name, "Inkpost");
        assert_eq!(config.blog.posts_per_page, 10);
        assert_eq!(config.blog.comments_open_for_days, 0);
        assert_eq!(config.content.post_path, PathBuf::from("./posts"));
        assert_eq!(config.content.comment_path, PathBuf::from("./comments"));
        assert!(config.content.watch);
        assert_eq!(config.content.rescan_interval(), Duration::from_secs(600));
        assert!(config.spam.akismet_api_key.is_none());
        assert_eq!(config.captcha.timeout_secs, 10);
    }

    #[test]
    fn test_load_empty_file_returns_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "  \n").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_full_config() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"
server:
  host: "127.0.0.1"
  port: 9000
blog:
  name: "My Notes"
  description: "Things I wrote down"
  address: "https://notes.example.com"
  posts_per_page: 5
  comments_open_for_days: 30
content:
  post_path: "/srv/posts"
  comment_path: "/srv/comments"
  watch: false
  rescan_interval_secs: 0
spam:
  akismet_api_key: "abc123"
captcha:
  recaptcha_secret: "s3cret"
  timeout_secs: 3
"#).unwrap();

        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.blog.name, "My Notes");
        assert_eq!(config.blog.address, "https://notes.example.com");
        assert_eq!(config.blog.posts_per_page, 5);
        assert_eq!(config.blog.comments_open_for_days, 30);
        assert_eq!(config.content.post_path, PathBuf::from("/srv/posts"));
        assert!(!config.content.watch);
        assert!(config.content.rescan_interval().is_zero());
        assert_eq!(config.spam.akismet_api_key.as_deref(), Some("abc123"));
        assert_eq!(config.spam.timeout_secs, 10);
        assert_eq!(config.captcha.recaptcha_secret.as_deref(), Some("s3cret"));
        assert_eq!(config.captcha.timeout_secs, 3);
    }

    #[test]
    fn test_load_invalid_yaml_reports_location() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "server:\n  port: not_a_number\n").unwrap();

        let err = Config::load(file.path()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Failed to parse"));
        assert!(message.contains("line"));
    }

    #[test]
    fn test_env_overrides() {
        let _guard = lock_env();
        clear_env();

        std::env::set_var("INKPOST_SERVER_PORT", "4000");
        std::env::set_var("INKPOST_BLOG_NAME", "From Env");
        std::env::set_var("INKPOST_CONTENT_WATCH", "no");
        std::env::set_var("INKPOST_SPAM_AKISMET_API_KEY", "key");

        let config = Config::load_with_env(std::path::Path::new("nonexistent_inkpost.yml")).unwrap();
        clear_env();

        assert_eq!(config.server.port, 4000);
        assert_eq!(config.blog.name, "From Env");
        assert!(!config.content.watch);
        assert_eq!(config.spam.akismet_api_key.as_deref(), Some("key"));
    }

    #[test]
    fn test_env_malformed_values_are_ignored() {
        let _guard = lock_env();
        clear_env();

        std::env::set_var("INKPOST_SERVER_PORT", "not-a-port");
        std::env::set_var("INKPOST_CONTENT_WATCH", "maybe");

        let config = Config::load_with_env(std::path::Path::new("nonexistent_inkpost.yml")).unwrap();
        clear_env();

        assert_eq!(config.server.port, 8080);
        assert!(config.content.watch);
    }

    #[test]
    fn test_validate() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.content.post_path = dir.path().to_path_buf();
        assert!(config.validate().is_ok());

        config.blog.posts_per_page = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));

        config.blog.posts_per_page = MAX_PER_PAGE;
        assert!(config.validate().is_ok());
        config.blog.posts_per_page = MAX_PER_PAGE + 1;
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));

        config.blog.posts_per_page = 10;
        config.content.post_path = dir.path().join("missing");
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
    }
}
