//! Concurrency governor.
//!
//! Runs a site's keywords in fixed-size batches. Within a batch at most
//! `capacity` tasks hold a permit at once; batches run strictly one after
//! another with a fixed pause in between.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::Semaphore;

use crate::models::WatcherConfig;
use crate::pipeline::retry::jitter;

/// Batch size, pacing and per-permit jitter.
#[derive(Debug, Clone)]
pub struct Governor {
    batch_size: usize,
    batch_pause: Duration,
    jitter_ms: (u64, u64),
}

impl Governor {
    pub fn new(batch_size: usize, batch_pause: Duration) -> Self {
        Self {
            batch_size: batch_size.max(1),
            batch_pause,
            jitter_ms: (0, 0),
        }
    }

    /// Delay taken after a permit is acquired, before the task runs.
    pub fn with_jitter(mut self, min_ms: u64, max_ms: u64) -> Self {
        self.jitter_ms = (min_ms, max_ms);
        self
    }

    pub fn from_config(config: &WatcherConfig) -> Self {
        Self::new(config.batch_size, config.batch_pause())
            .with_jitter(config.request_jitter_ms_min, config.request_jitter_ms_max)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of batches needed for `keywords` keywords.
    pub fn batch_count(&self, keywords: usize) -> usize {
        keywords.div_ceil(self.batch_size)
    }

    /// Run `task` once per keyword and return the outputs in keyword order.
    ///
    /// The governor waits for every task of a batch to settle before the
    /// pause and the next batch. Tasks report failures through their output.
    pub async fn run<F, Fut, T>(
        &self,
        label: &str,
        capacity: usize,
        keywords: &[String],
        task: F,
    ) -> Vec<T>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = T>,
    {
        let semaphore = Arc::new(Semaphore::new(capacity.max(1)));
        let total_batches = self.batch_count(keywords.len());
        let mut outputs = Vec::with_capacity(keywords.len());

        for (index, batch) in keywords.chunks(self.batch_size).enumerate() {
            log::info!(
                "[{}] Processing batch {}/{} ({} keywords)",
                label,
                index + 1,
                total_batches,
                batch.len()
            );

            let jobs = batch.iter().map(|keyword| {
                let semaphore = Arc::clone(&semaphore);
                let fut = task(keyword.clone());
                let delay = jitter(self.jitter_ms.0, self.jitter_ms.1);
                async move {
                    // The semaphore is never closed
                    let _permit = semaphore.acquire_owned().await.ok();
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    fut.await
                }
            });
            outputs.extend(join_all(jobs).await);

            if index + 1 < total_batches && !self.batch_pause.is_zero() {
                tokio::time::sleep(self.batch_pause).await;
            }
        }

        outputs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;

    fn keywords(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("kw{i}")).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_of_30_with_capacity_5_runs_exactly_5() {
        let governor = Governor::new(30, Duration::from_secs(3));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let samples = Arc::new(std::sync::Mutex::new(Vec::new()));

        let outputs = governor
            .run("test", 5, &keywords(30), |kw| {
                let in_flight = Arc::clone(&in_flight);
                let peak = Arc::clone(&peak);
                let samples = Arc::clone(&samples);
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    samples.lock().unwrap().push(in_flight.load(Ordering::SeqCst));
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    kw
                }
            })
            .await;

        assert_eq!(outputs.len(), 30);
        assert_eq!(outputs[0], "kw0");
        assert_eq!(outputs[29], "kw29");
        assert_eq!(peak.load(Ordering::SeqCst), 5);
        // Sampled mid-task, every wave has all five permits in use
        assert!(samples.lock().unwrap().iter().all(|&n| n == 5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_batches_are_sequential_and_paced() {
        let governor = Governor::new(4, Duration::from_secs(3));
        let start = Instant::now();
        let started_at = Arc::new(std::sync::Mutex::new(Vec::new()));

        governor
            .run("test", 4, &keywords(10), |kw| {
                let started_at = Arc::clone(&started_at);
                async move {
                    started_at
                        .lock()
                        .unwrap()
                        .push((kw, start.elapsed().as_secs()));
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
            })
            .await;

        let started_at = started_at.lock().unwrap();
        let at = |name: &str| started_at.iter().find(|(k, _)| k == name).unwrap().1;
        // batch 1: 0s, batch 2: 5s + 3s pause, batch 3: 16s
        assert_eq!(at("kw0"), 0);
        assert_eq!(at("kw3"), 0);
        assert_eq!(at("kw4"), 8);
        assert_eq!(at("kw7"), 8);
        assert_eq!(at("kw8"), 16);
        assert_eq!(at("kw9"), 16);
        // No pause after the last batch
        assert_eq!(start.elapsed().as_secs(), 21);
    }

    #[tokio::test]
    async fn test_empty_keyword_list() {
        let governor = Governor::new(30, Duration::from_secs(3));
        let outputs: Vec<String> = governor
            .run("test", 5, &[], |kw| async move { kw })
            .await;
        assert!(outputs.is_empty());
        assert_eq!(governor.batch_count(0), 0);
        assert_eq!(governor.batch_count(31), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_jitter_delays_each_task() {
        let governor = Governor::new(10, Duration::ZERO).with_jitter(1000, 1000);
        let start = Instant::now();

        governor
            .run("test", 1, &keywords(3), |_kw| async {})
            .await;

        // One permit: three sequential one-second delays
        assert_eq!(start.elapsed().as_secs(), 3);
    }
}
