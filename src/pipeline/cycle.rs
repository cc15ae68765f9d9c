// src/pipeline/cycle.rs

//! Cycle driver.
//!
//! One cycle sweeps every configured site with the current keyword list.
//! Cycles repeat on a fixed interval until shutdown. Failures are contained
//! at the narrowest scope: a keyword, else a site, never the loop.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::join_all;

use crate::control::{ControlState, KeywordFile};
use crate::error::Result;
use crate::models::Config;
use crate::pipeline::governor::Governor;
use crate::pipeline::retry::RetryPolicy;
use crate::pipeline::task::{KeywordOutcome, SitePass};
use crate::services::{
    DeliveryReport, HtmlSearchAdapter, NotifierDispatch, Site, SiteAdapter, build_notifier,
};
use crate::storage::{DedupStore, LocalStorage, SeenStore};
use crate::utils::http;

/// Result of one site pass.
#[derive(Debug, Clone, Default)]
pub struct SiteReport {
    pub site: String,
    pub keywords: usize,
    pub completed: usize,
    pub paused: usize,
    pub failed: usize,
    pub links_found: usize,
    pub new_links: usize,
    pub delivery: DeliveryReport,
    pub seen_before: usize,
    pub seen_after: usize,
    /// Set when the pass could not run or was aborted
    pub error: Option<String>,
}

impl SiteReport {
    fn aborted(site: &Site, keywords: usize, message: String) -> Self {
        Self {
            site: site.id.clone(),
            keywords,
            error: Some(message),
            ..Self::default()
        }
    }

    fn record(&mut self, outcome: &KeywordOutcome) {
        match outcome {
            KeywordOutcome::Completed {
                found,
                new_links,
                delivery,
            } => {
                self.completed += 1;
                self.links_found += found;
                self.new_links += new_links;
                self.delivery.absorb(*delivery);
            }
            KeywordOutcome::Paused => self.paused += 1,
            KeywordOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

/// Result of one full sweep.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub keywords: usize,
    pub sites: Vec<SiteReport>,
}

impl CycleReport {
    pub fn new_links(&self) -> usize {
        self.sites.iter().map(|s| s.new_links).sum()
    }

    pub fn delivered(&self) -> usize {
        self.sites.iter().map(|s| s.delivery.delivered).sum()
    }

    pub fn failed_keywords(&self) -> usize {
        self.sites.iter().map(|s| s.failed).sum()
    }

    pub fn site(&self, id: &str) -> Option<&SiteReport> {
        self.sites.iter().find(|s| s.site == id)
    }

    fn log_summary(&self) {
        let elapsed = self.finished_at - self.started_at;
        log::info!(
            "Cycle finished in {}s: {} keywords x {} sites, {} new links, {} sent, {} failed keywords",
            elapsed.num_seconds(),
            self.keywords,
            self.sites.len(),
            self.new_links(),
            self.delivered(),
            self.failed_keywords()
        );
        for site in &self.sites {
            match &site.error {
                Some(error) => log::info!("    {}: aborted ({})", site.site, error),
                None => log::info!(
                    "    {}: {} done, {} paused, {} failed, {} new, seen {} -> {}",
                    site.site,
                    site.completed,
                    site.paused,
                    site.failed,
                    site.new_links,
                    site.seen_before,
                    site.seen_after
                ),
            }
        }
    }
}

/// The sweep loop over all sites and keywords.
pub struct Watcher {
    config: Arc<Config>,
    sites: Vec<Site>,
    backend: Arc<dyn SeenStore>,
    keywords: KeywordFile,
    control: Arc<ControlState>,
    dispatch: Arc<NotifierDispatch>,
    governor: Governor,
    policy: RetryPolicy,
}

impl Watcher {
    pub fn new(
        config: Arc<Config>,
        sites: Vec<Site>,
        backend: Arc<dyn SeenStore>,
        keywords: KeywordFile,
        control: Arc<ControlState>,
        dispatch: Arc<NotifierDispatch>,
    ) -> Self {
        let governor = Governor::from_config(&config.watcher);
        let policy = RetryPolicy::from_config(&config.retry);
        Self {
            config,
            sites,
            backend,
            keywords,
            control,
            dispatch,
            governor,
            policy,
        }
    }

    /// Wire up HTML adapters, local seen-link files and the configured
    /// notifier.
    pub fn from_config(config: Arc<Config>, control: Arc<ControlState>) -> Result<Self> {
        let client = http::create_async_client(&config.crawler)?;
        let crawler = Arc::new(config.crawler.clone());

        let mut sites = Vec::with_capacity(config.sites.len());
        for site_config in &config.sites {
            let adapter: Arc<dyn SiteAdapter> = Arc::new(HtmlSearchAdapter::new(
                site_config.clone(),
                Arc::clone(&crawler),
                client.clone(),
            )?);
            sites.push(Site::new(site_config, adapter));
        }

        let backend: Arc<dyn SeenStore> = Arc::new(LocalStorage::new(&config.paths.seen_dir));
        let keywords = KeywordFile::new(&config.paths.keywords_file, Arc::clone(&control));
        let notifier = build_notifier(&config.notifier, client);
        let dispatch = Arc::new(NotifierDispatch::new(
            notifier,
            Arc::clone(&control),
            &config.notifier,
        ));

        Ok(Self::new(config, sites, backend, keywords, control, dispatch))
    }

    pub fn sites(&self) -> &[Site] {
        &self.sites
    }

    pub fn control(&self) -> &Arc<ControlState> {
        &self.control
    }

    /// Run cycles until `shutdown` resolves or `max_cycles` cycles are done.
    ///
    /// Returns the number of completed cycles. A cycle interrupted by
    /// shutdown is not counted.
    pub async fn run_until<S>(&self, shutdown: S, max_cycles: Option<usize>) -> usize
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut completed = 0;

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    log::info!("Shutdown requested, stopping mid-cycle");
                    break;
                }
                report = self.run_cycle() => {
                    completed += 1;
                    report.log_summary();
                }
            }

            if max_cycles.is_some_and(|max| completed >= max) {
                break;
            }

            let interval = self.config.watcher.cycle_interval();
            log::info!("Waiting {}s before the next cycle", interval.as_secs());
            tokio::select! {
                _ = &mut shutdown => {
                    log::info!("Shutdown requested, stopping");
                    break;
                }
                _ = tokio::time::sleep(interval) => {}
            }
        }

        completed
    }

    /// Sweep every site once with the keyword list as it is on disk now.
    pub async fn run_cycle(&self) -> CycleReport {
        let started_at = Utc::now();
        let keywords = self.keywords.load().await;
        log::info!(
            "Starting cycle: {} sites, {} keywords",
            self.sites.len(),
            keywords.len()
        );

        let sites = if self.config.watcher.parallel_sites {
            join_all(
                self.sites
                    .iter()
                    .map(|site| self.run_site_isolated(site, &keywords)),
            )
            .await
        } else {
            let mut reports = Vec::with_capacity(self.sites.len());
            for site in &self.sites {
                reports.push(self.run_site_isolated(site, &keywords).await);
            }
            reports
        };

        CycleReport {
            started_at,
            finished_at: Utc::now(),
            keywords: keywords.len(),
            sites,
        }
    }

    async fn run_site_isolated(&self, site: &Site, keywords: &[String]) -> SiteReport {
        match AssertUnwindSafe(self.run_site(site, keywords))
            .catch_unwind()
            .await
        {
            Ok(report) => report,
            Err(_) => {
                log::error!("[{}] Site pass panicked, continuing with other sites", site.id);
                SiteReport::aborted(site, keywords.len(), "panicked".to_string())
            }
        }
    }

    /// One site pass: load its store, run the keywords through the
    /// governor, persist.
    pub async fn run_site(&self, site: &Site, keywords: &[String]) -> SiteReport {
        log::info!("[{}] Processing {}", site.id, site.name);

        let store =
            match DedupStore::open(&site.id, &site.store_key, Arc::clone(&self.backend)).await {
                Ok(store) => Arc::new(store),
                Err(e) => {
                    log::error!(
                        "[{}] Cannot load seen links, skipping site this cycle: {}",
                        site.id,
                        e
                    );
                    return SiteReport::aborted(site, keywords.len(), e.to_string());
                }
            };

        let mut report = SiteReport {
            site: site.id.clone(),
            keywords: keywords.len(),
            seen_before: store.len().await,
            ..SiteReport::default()
        };

        let pass = Arc::new(SitePass {
            site: site.clone(),
            store: Arc::clone(&store),
            dispatch: Arc::clone(&self.dispatch),
            control: Arc::clone(&self.control),
            policy: self.policy,
            adapter_timeout: self.config.watcher.adapter_timeout(),
        });

        let outcomes = self
            .governor
            .run(&site.id, site.capacity, keywords, |keyword| {
                let pass = Arc::clone(&pass);
                async move {
                    let label = keyword.clone();
                    AssertUnwindSafe(pass.process_keyword(keyword))
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|_| {
                            log::error!("[{}] Task for '{}' panicked", pass.site.id, label);
                            KeywordOutcome::Failed {
                                message: "panicked".to_string(),
                            }
                        })
                }
            })
            .await;

        for outcome in &outcomes {
            report.record(outcome);
        }

        if let Err(e) = store.persist().await {
            log::error!("[{}] {}", site.id, e);
        }
        report.seen_after = store.len().await;

        log::info!(
            "[{}] Finished {} keywords ({} new links)",
            site.id,
            report.keywords,
            report.new_links
        );
        report
    }
}
