//! Keyword task: search one keyword on one site and notify new links.

use std::sync::Arc;
use std::time::Duration;

use crate::control::ControlState;
use crate::error::{AppError, Result};
use crate::models::NotificationEvent;
use crate::pipeline::retry::RetryPolicy;
use crate::services::{DeliveryReport, NotifierDispatch, Site};
use crate::storage::DedupStore;

/// What happened to one keyword in one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeywordOutcome {
    /// The adapter answered; `new_links` of `found` links were not seen before.
    Completed {
        found: usize,
        new_links: usize,
        delivery: DeliveryReport,
    },
    /// The pause flag was raised before the adapter call
    Paused,
    /// The adapter failed on every attempt; counts as zero results
    Failed { message: String },
}

/// Everything a keyword task of one site pass needs.
pub struct SitePass {
    pub site: Site,
    pub store: Arc<DedupStore>,
    pub dispatch: Arc<NotifierDispatch>,
    pub control: Arc<ControlState>,
    pub policy: RetryPolicy,
    pub adapter_timeout: Duration,
}

enum Search {
    Links(Vec<String>),
    Paused,
}

impl SitePass {
    /// Process one keyword end to end. Never fails; errors are logged and
    /// reported through the outcome.
    pub async fn process_keyword(&self, keyword: String) -> KeywordOutcome {
        let links = match self.search(&keyword).await {
            Ok(Search::Links(links)) => links,
            Ok(Search::Paused) => {
                log::warn!(
                    "[{}] Skipped '{}' while the keyword list is being replaced",
                    self.site.id,
                    keyword
                );
                return KeywordOutcome::Paused;
            }
            Err(e) => {
                log::error!(
                    "[{}] Failed to process '{}': {}",
                    self.site.id,
                    keyword,
                    e
                );
                return KeywordOutcome::Failed {
                    message: e.to_string(),
                };
            }
        };

        let found = links.len();
        let new_links = self.store.diff_and_merge(&links).await;
        let seen_total = self.store.len().await;

        log::info!(
            "[{}] '{}': {} links, {} seen so far, {} new",
            self.site.id,
            keyword,
            found,
            seen_total,
            new_links.len()
        );

        let mut delivery = DeliveryReport::default();
        if !new_links.is_empty() {
            let events: Vec<NotificationEvent> = new_links
                .iter()
                .map(|link| NotificationEvent::new(&self.site.id, &self.site.name, &keyword, link))
                .collect();
            delivery = self.dispatch.deliver_all(&events).await;

            log::info!(
                "[{}] Sent {} new links for '{}'",
                self.site.id,
                delivery.delivered,
                keyword
            );

            if let Err(e) = self.store.persist().await {
                log::error!("[{}] {}", self.site.id, e);
            }
        }

        KeywordOutcome::Completed {
            found,
            new_links: new_links.len(),
            delivery,
        }
    }

    /// Call the adapter under the timeout and retry policy, checking the
    /// pause flag before every attempt.
    async fn search(&self, keyword: &str) -> Result<Search> {
        let mut attempt = 1;
        loop {
            if self.control.is_paused() {
                return Ok(Search::Paused);
            }

            let result =
                match tokio::time::timeout(self.adapter_timeout, self.site.adapter.search(keyword))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(AppError::timeout(
                        &self.site.id,
                        keyword,
                        self.adapter_timeout.as_secs(),
                    )),
                };

            match result {
                Ok(links) => return Ok(Search::Links(links)),
                Err(e) if self.policy.should_retry(attempt) => {
                    let delay = self.policy.delay();
                    log::warn!(
                        "[{}] Attempt {}/{} for '{}' failed: {}. Retrying in {:?}",
                        self.site.id,
                        attempt,
                        self.policy.max_attempts(),
                        keyword,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
