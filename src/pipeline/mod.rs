//! Sweep pipeline.
//!
//! - `cycle`: the cycle driver looping over sites and keywords
//! - `governor`: batching and per-site concurrency limits
//! - `task`: one keyword on one site, from search to notification
//! - `retry`: retry policy and request jitter

pub mod cycle;
pub mod governor;
pub mod retry;
pub mod task;

pub use cycle::{CycleReport, SiteReport, Watcher};
pub use governor::Governor;
pub use retry::RetryPolicy;
pub use task::{KeywordOutcome, SitePass};
