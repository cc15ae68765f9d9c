// src/models/mod.rs

//! Domain models for the watcher.
//!
//! Configuration, listing links and the notification events derived
//! from them.

mod config;
mod listing;

// Re-export all public types
pub use config::{
    Config, CrawlerConfig, LoggingConfig, NotifierConfig, NotifierKind, PathsConfig, RetryConfig,
    SiteConfig, WatcherConfig,
};
pub use listing::{NotificationEvent, normalize_link};
