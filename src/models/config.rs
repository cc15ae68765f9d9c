//! Application configuration structures.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Sweep loop, batching and pacing settings
    #[serde(default)]
    pub watcher: WatcherConfig,

    /// Retry policy applied around every adapter call
    #[serde(default)]
    pub retry: RetryConfig,

    /// HTTP client settings shared by the HTML adapters
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Notification sink settings
    #[serde(default)]
    pub notifier: NotifierConfig,

    /// File locations
    #[serde(default)]
    pub paths: PathsConfig,

    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Watched marketplaces, processed in table order
    #[serde(default = "defaults::default_sites")]
    pub sites: Vec<SiteConfig>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.watcher.batch_size == 0 {
            return Err(AppError::validation("watcher.batch_size must be > 0"));
        }
        if self.watcher.request_jitter_ms_min > self.watcher.request_jitter_ms_max {
            return Err(AppError::validation(
                "watcher.request_jitter_ms_min must be <= request_jitter_ms_max",
            ));
        }
        if self.watcher.adapter_timeout_secs == 0 {
            return Err(AppError::validation(
                "watcher.adapter_timeout_secs must be > 0",
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(AppError::validation("retry.max_attempts must be > 0"));
        }
        if self.retry.min_delay_ms > self.retry.max_delay_ms {
            return Err(AppError::validation(
                "retry.min_delay_ms must be <= retry.max_delay_ms",
            ));
        }
        if self.crawler.user_agents.iter().all(|ua| ua.trim().is_empty()) {
            return Err(AppError::validation("crawler.user_agents is empty"));
        }
        if self.notifier.kind == NotifierKind::Telegram && self.notifier.recipients.is_empty() {
            return Err(AppError::validation(
                "notifier.recipients is empty, new listings would be marked seen without being sent",
            ));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.sites.is_empty() {
            return Err(AppError::validation("No sites defined"));
        }

        let mut ids = HashSet::new();
        let mut seen_files = HashSet::new();
        for site in &self.sites {
            if site.id.trim().is_empty() {
                return Err(AppError::validation("site id is empty"));
            }
            if !ids.insert(site.id.as_str()) {
                return Err(AppError::validation(format!(
                    "duplicate site id '{}'",
                    site.id
                )));
            }
            if !seen_files.insert(site.seen_file()) {
                return Err(AppError::validation(format!(
                    "site '{}': seen file '{}' is shared with another site",
                    site.id,
                    site.seen_file()
                )));
            }
            if site.concurrency == 0 {
                return Err(AppError::validation(format!(
                    "site '{}': concurrency must be > 0",
                    site.id
                )));
            }
            if self.watcher.batch_size < site.concurrency {
                return Err(AppError::validation(format!(
                    "site '{}': watcher.batch_size ({}) must be >= concurrency ({})",
                    site.id, self.watcher.batch_size, site.concurrency
                )));
            }
            if !site.search_url.contains("{keyword}") {
                return Err(AppError::validation(format!(
                    "site '{}': search_url has no {{keyword}} placeholder",
                    site.id
                )));
            }
            if site.link_selector.trim().is_empty() {
                return Err(AppError::validation(format!(
                    "site '{}': link_selector is empty",
                    site.id
                )));
            }
        }
        Ok(())
    }

    /// Path of the seen-link file for a site.
    pub fn seen_path(&self, site: &SiteConfig) -> PathBuf {
        Path::new(&self.paths.seen_dir).join(site.seen_file())
    }

    /// Look up a site by id.
    pub fn site(&self, id: &str) -> Option<&SiteConfig> {
        self.sites.iter().find(|s| s.id == id)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            watcher: WatcherConfig::default(),
            retry: RetryConfig::default(),
            crawler: CrawlerConfig::default(),
            notifier: NotifierConfig::default(),
            paths: PathsConfig::default(),
            logging: LoggingConfig::default(),
            sites: defaults::default_sites(),
        }
    }
}

/// Sweep loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Sleep between two full sweeps
    #[serde(default = "defaults::cycle_interval")]
    pub cycle_interval_secs: u64,

    /// Keywords per batch
    #[serde(default = "defaults::batch_size")]
    pub batch_size: usize,

    /// Pause after each batch
    #[serde(default = "defaults::batch_pause")]
    pub batch_pause_secs: u64,

    /// Lower bound of the delay taken after a capacity permit is acquired
    #[serde(default = "defaults::jitter_min")]
    pub request_jitter_ms_min: u64,

    /// Upper bound of the delay taken after a capacity permit is acquired
    #[serde(default = "defaults::jitter_max")]
    pub request_jitter_ms_max: u64,

    /// Upper bound for a single adapter call
    #[serde(default = "defaults::adapter_timeout")]
    pub adapter_timeout_secs: u64,

    /// Sweep all sites at once instead of one after another
    #[serde(default = "defaults::parallel_sites")]
    pub parallel_sites: bool,
}

impl WatcherConfig {
    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.cycle_interval_secs)
    }

    pub fn batch_pause(&self) -> Duration {
        Duration::from_secs(self.batch_pause_secs)
    }

    pub fn adapter_timeout(&self) -> Duration {
        Duration::from_secs(self.adapter_timeout_secs)
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            cycle_interval_secs: defaults::cycle_interval(),
            batch_size: defaults::batch_size(),
            batch_pause_secs: defaults::batch_pause(),
            request_jitter_ms_min: defaults::jitter_min(),
            request_jitter_ms_max: defaults::jitter_max(),
            adapter_timeout_secs: defaults::adapter_timeout(),
            parallel_sites: defaults::parallel_sites(),
        }
    }
}

/// Retry policy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per adapter call (1 disables in-cycle retries)
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// Lower bound of the delay between attempts
    #[serde(default = "defaults::retry_min_delay")]
    pub min_delay_ms: u64,

    /// Upper bound of the delay between attempts
    #[serde(default = "defaults::retry_max_delay")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: defaults::max_attempts(),
            min_delay_ms: defaults::retry_min_delay(),
            max_delay_ms: defaults::retry_max_delay(),
        }
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent pool, one is picked per request
    #[serde(default = "defaults::user_agents")]
    pub user_agents: Vec<String>,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agents: defaults::user_agents(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Which sink receives notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifierKind {
    Telegram,
    Log,
}

/// Notification sink settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    #[serde(default = "defaults::notifier_kind")]
    pub kind: NotifierKind,

    /// Environment variable holding the bot token
    #[serde(default = "defaults::token_env")]
    pub token_env: String,

    #[serde(default = "defaults::api_base")]
    pub api_base: String,

    /// Chat ids that receive every new listing
    #[serde(default)]
    pub recipients: Vec<i64>,

    /// Minimum spacing between two outbound messages
    #[serde(default = "defaults::min_interval")]
    pub min_interval_ms: u64,

    /// Supports `{site}`, `{keyword}` and `{link}`
    #[serde(default = "defaults::message_template")]
    pub message_template: String,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            kind: defaults::notifier_kind(),
            token_env: defaults::token_env(),
            api_base: defaults::api_base(),
            recipients: Vec::new(),
            min_interval_ms: defaults::min_interval(),
            message_template: defaults::message_template(),
        }
    }
}

/// File locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "defaults::keywords_file")]
    pub keywords_file: String,

    /// Directory holding one seen-link file per site
    #[serde(default = "defaults::seen_dir")]
    pub seen_dir: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            keywords_file: defaults::keywords_file(),
            seen_dir: defaults::seen_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

/// One watched marketplace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Stable identifier, also used in log prefixes
    pub id: String,

    /// Display name used in notifications
    pub name: String,

    /// Maximum simultaneous adapter calls for this site
    #[serde(default = "defaults::site_concurrency")]
    pub concurrency: usize,

    /// Seen-link file name inside `paths.seen_dir` (default `seen_{id}.json`)
    #[serde(default)]
    pub seen_file: Option<String>,

    /// Search page URL with a `{keyword}` placeholder
    pub search_url: String,

    /// CSS selector matching listing anchors
    pub link_selector: String,

    #[serde(default = "defaults::link_attr")]
    pub link_attr: String,

    /// Only keep links containing this substring
    #[serde(default)]
    pub link_contains: Option<String>,

    /// Keep at most this many links per search
    #[serde(default = "defaults::max_results")]
    pub max_results: usize,
}

impl SiteConfig {
    pub fn seen_file(&self) -> String {
        self.seen_file
            .clone()
            .unwrap_or_else(|| format!("seen_{}.json", self.id))
    }
}

mod defaults {
    use super::{NotifierKind, SiteConfig};

    // Watcher defaults
    pub fn cycle_interval() -> u64 {
        60
    }
    pub fn batch_size() -> usize {
        30
    }
    pub fn batch_pause() -> u64 {
        3
    }
    pub fn jitter_min() -> u64 {
        1200
    }
    pub fn jitter_max() -> u64 {
        2800
    }
    pub fn adapter_timeout() -> u64 {
        90
    }
    pub fn parallel_sites() -> bool {
        true
    }

    // Retry defaults
    pub fn max_attempts() -> u32 {
        1
    }
    pub fn retry_min_delay() -> u64 {
        1000
    }
    pub fn retry_max_delay() -> u64 {
        5000
    }

    // Crawler defaults
    pub fn user_agents() -> Vec<String> {
        vec![
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36".into(),
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_4) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15".into(),
            "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0".into(),
        ]
    }
    pub fn timeout() -> u64 {
        60
    }

    // Notifier defaults
    pub fn notifier_kind() -> NotifierKind {
        NotifierKind::Telegram
    }
    pub fn token_env() -> String {
        "TELEGRAM_BOT_TOKEN".into()
    }
    pub fn api_base() -> String {
        "https://api.telegram.org".into()
    }
    pub fn min_interval() -> u64 {
        1000
    }
    pub fn message_template() -> String {
        "🔍 <b>{site}</b> | <b>{keyword}</b>\n{link}".into()
    }

    // Path defaults
    pub fn keywords_file() -> String {
        "storage/keywords.txt".into()
    }
    pub fn seen_dir() -> String {
        "storage".into()
    }

    pub fn log_level() -> String {
        "info".into()
    }

    // Site defaults
    pub fn site_concurrency() -> usize {
        5
    }
    pub fn link_attr() -> String {
        "href".into()
    }
    pub fn max_results() -> usize {
        60
    }

    fn site(
        id: &str,
        name: &str,
        concurrency: usize,
        search_url: &str,
        link_selector: &str,
        link_contains: Option<&str>,
    ) -> SiteConfig {
        SiteConfig {
            id: id.to_string(),
            name: name.to_string(),
            concurrency,
            seen_file: None,
            search_url: search_url.to_string(),
            link_selector: link_selector.to_string(),
            link_attr: link_attr(),
            link_contains: link_contains.map(str::to_string),
            max_results: max_results(),
        }
    }

    pub fn default_sites() -> Vec<SiteConfig> {
        vec![
            site(
                "aukro",
                "Aukro",
                7,
                "https://aukro.cz/vysledky-vyhledavani?text={keyword}&searchAll=true&categoryId=8466&subbrand=BAZAAR",
                "a.item-card-main-container",
                None,
            ),
            site(
                "bazos",
                "Bazos",
                5,
                "https://knihy.bazos.cz/inzeraty/{keyword}/",
                "div.inzeratynadpis a",
                None,
            ),
            site(
                "sbazar",
                "Sbazar",
                7,
                "https://www.sbazar.cz/hledej/{keyword}/31-knihy-literatura",
                "a[href^=\"/inzerat/\"]",
                Some("/inzerat/"),
            ),
            site(
                "vinted",
                "Vinted",
                7,
                "https://www.vinted.cz/catalog?search_text={keyword}&catalog[]=2312&page=1",
                "div.new-item-box__image-container a",
                Some("/items/"),
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_recipient() -> Config {
        let mut config = Config::default();
        config.notifier.recipients = vec![42];
        config
    }

    #[test]
    fn validate_default_config_with_recipient_ok() {
        assert!(with_recipient().validate().is_ok());
    }

    #[test]
    fn validate_rejects_telegram_without_recipients() {
        let config = Config::default();
        assert!(config.notifier.recipients.is_empty());
        assert!(matches!(config.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn validate_allows_log_sink_without_recipients() {
        let mut config = Config::default();
        config.notifier.kind = NotifierKind::Log;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_user_agents() {
        let mut config = with_recipient();
        config.crawler.user_agents = vec!["  ".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_concurrency() {
        let mut config = with_recipient();
        config.sites[0].concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_batch_smaller_than_capacity() {
        let mut config = with_recipient();
        config.watcher.batch_size = 4;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_duplicate_site_ids() {
        let mut config = with_recipient();
        let dup = config.sites[0].clone();
        config.sites.push(dup);
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_shared_seen_file() {
        let mut config = with_recipient();
        config.sites[1].seen_file = Some("seen_aukro.json".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_attempts() {
        let mut config = with_recipient();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn shipped_config_is_valid_and_uses_default_template() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("storage/config.toml");
        let config = Config::load(path).unwrap();

        assert!(config.validate().is_ok());
        assert_eq!(
            config.notifier.message_template,
            defaults::message_template()
        );
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [watcher]
            batch_size = 10

            [notifier]
            recipients = [123456789]

            [[sites]]
            id = "bazos"
            name = "Bazos"
            search_url = "https://knihy.bazos.cz/inzeraty/{keyword}/"
            link_selector = "div.inzeratynadpis a"
            "#,
        )
        .unwrap();

        assert_eq!(config.watcher.batch_size, 10);
        assert_eq!(config.watcher.batch_pause_secs, 3);
        assert_eq!(config.retry.max_attempts, 1);
        assert_eq!(config.sites.len(), 1);
        assert_eq!(config.sites[0].concurrency, 5);
        assert_eq!(config.sites[0].seen_file(), "seen_bazos.json");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn seen_path_joins_seen_dir() {
        let config = Config::default();
        let site = config.site("vinted").unwrap();
        assert_eq!(
            config.seen_path(site),
            Path::new("storage").join("seen_vinted.json")
        );
    }
}
