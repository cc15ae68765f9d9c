//! Service layer for the watcher.
//!
//! This module contains the external collaborators of the sweep loop:
//! - Site search (`SiteAdapter`, `HtmlSearchAdapter`)
//! - Notification delivery (`Notifier`, `NotifierDispatch`)

mod adapter;
mod html;
mod notifier;

pub use adapter::{Site, SiteAdapter};
pub use html::HtmlSearchAdapter;
pub use notifier::{
    DeliveryReport, LogNotifier, Notifier, NotifierDispatch, RateLimiter, TelegramNotifier,
    build_notifier,
};
