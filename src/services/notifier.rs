// src/services/notifier.rs

//! Notification sinks and per-event dispatch.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::control::ControlState;
use crate::error::{AppError, Result};
use crate::models::{NotificationEvent, NotifierConfig, NotifierKind};

/// Delivers one text message to one recipient.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, recipient: i64, text: &str) -> Result<()>;
}

/// Telegram Bot API sink.
pub struct TelegramNotifier {
    client: Client,
    endpoint: String,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

impl TelegramNotifier {
    pub fn new(client: Client, api_base: &str, token: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}/bot{}/sendMessage", api_base.trim_end_matches('/'), token),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn deliver(&self, recipient: i64, text: &str) -> Result<()> {
        let body = SendMessage {
            chat_id: recipient,
            text,
            parse_mode: "HTML",
            disable_web_page_preview: false,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::notify(recipient, e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AppError::notify(recipient, format!("{status}: {detail}")));
        }
        Ok(())
    }
}

/// Sink that only writes messages to the log.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, recipient: i64, text: &str) -> Result<()> {
        log::info!("[notify -> {}] {}", recipient, text.replace('\n', " "));
        Ok(())
    }
}

/// Build the sink selected by the configuration.
///
/// A Telegram sink without a token in the environment falls back to the
/// log sink.
pub fn build_notifier(config: &NotifierConfig, client: Client) -> Arc<dyn Notifier> {
    match config.kind {
        NotifierKind::Log => Arc::new(LogNotifier),
        NotifierKind::Telegram => match std::env::var(&config.token_env) {
            Ok(token) if !token.trim().is_empty() => {
                Arc::new(TelegramNotifier::new(client, &config.api_base, token.trim()))
            }
            _ => {
                log::warn!(
                    "{} is not set, notifications will only be logged",
                    config.token_env
                );
                Arc::new(LogNotifier)
            }
        },
    }
}

/// Outcome of dispatching one or more events.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    /// Not sent: the recipient disabled notifications or none is configured
    pub dropped: usize,
    pub failed: usize,
}

impl DeliveryReport {
    pub fn absorb(&mut self, other: DeliveryReport) {
        self.delivered += other.delivered;
        self.dropped += other.dropped;
        self.failed += other.failed;
    }
}

/// Spaces consecutive sends at least `min_interval` apart.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_slot: Mutex::new(None),
        }
    }

    /// Wait until the next send slot and reserve it.
    pub async fn acquire(&self) {
        if self.min_interval.is_zero() {
            return;
        }

        let wait_until = {
            let mut next = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = match *next {
                Some(at) if at > now => at,
                _ => now,
            };
            *next = Some(slot + self.min_interval);
            slot
        };
        tokio::time::sleep_until(wait_until).await;
    }
}

/// Turns notification events into outbound messages.
pub struct NotifierDispatch {
    notifier: Arc<dyn Notifier>,
    control: Arc<ControlState>,
    recipients: Vec<i64>,
    template: String,
    limiter: RateLimiter,
}

impl NotifierDispatch {
    pub fn new(
        notifier: Arc<dyn Notifier>,
        control: Arc<ControlState>,
        config: &NotifierConfig,
    ) -> Self {
        Self {
            notifier,
            control,
            recipients: config.recipients.clone(),
            template: config.message_template.clone(),
            limiter: RateLimiter::new(Duration::from_millis(config.min_interval_ms)),
        }
    }

    /// Deliver one event to every recipient.
    ///
    /// Never fails: disabled recipients are skipped and delivery errors are
    /// logged, neither affects the other recipients.
    pub async fn deliver(&self, event: &NotificationEvent) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        if self.recipients.is_empty() {
            log::warn!(
                "[{}] No recipients configured, not sent: {}",
                event.site,
                event.link
            );
            report.dropped += 1;
            return report;
        }

        let text = event.format(&self.template);
        for &recipient in &self.recipients {
            if !self.control.is_recipient_enabled(recipient).await {
                log::info!(
                    "[{}] Recipient {} disabled notifications, not sent: {}",
                    event.site,
                    recipient,
                    event.link
                );
                report.dropped += 1;
                continue;
            }

            self.limiter.acquire().await;
            match self.notifier.deliver(recipient, &text).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    log::error!("[{}] Failed to send {}: {}", event.site, event.link, e);
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// Deliver events one by one, in order.
    pub async fn deliver_all(&self, events: &[NotificationEvent]) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for event in events {
            report.absorb(self.deliver(event).await);
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: StdMutex<Vec<(i64, String)>>,
        fail_for: Option<i64>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn deliver(&self, recipient: i64, text: &str) -> Result<()> {
            if self.fail_for == Some(recipient) {
                return Err(AppError::notify(recipient, "chat not found"));
            }
            self.sent.lock().unwrap().push((recipient, text.to_string()));
            Ok(())
        }
    }

    fn config(recipients: Vec<i64>) -> NotifierConfig {
        NotifierConfig {
            recipients,
            min_interval_ms: 0,
            message_template: "{site} | {keyword} | {link}".into(),
            ..NotifierConfig::default()
        }
    }

    fn event(link: &str) -> NotificationEvent {
        NotificationEvent::new("bazos", "Bazos", "toyen", link)
    }

    #[tokio::test]
    async fn test_delivers_to_every_recipient() {
        let notifier = Arc::new(RecordingNotifier::default());
        let dispatch = NotifierDispatch::new(
            notifier.clone(),
            Arc::new(ControlState::new()),
            &config(vec![1, 2]),
        );

        let report = dispatch.deliver(&event("https://x/a")).await;

        assert_eq!(report.delivered, 2);
        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent[0], (1, "BAZOS | toyen | https://x/a".to_string()));
    }

    #[tokio::test]
    async fn test_disabled_recipient_is_dropped() {
        let notifier = Arc::new(RecordingNotifier::default());
        let control = Arc::new(ControlState::new());
        control.set_recipient_enabled(2, false).await;
        let dispatch = NotifierDispatch::new(notifier.clone(), control, &config(vec![1, 2]));

        let report = dispatch.deliver(&event("https://x/a")).await;

        assert_eq!(report.delivered, 1);
        assert_eq!(report.dropped, 1);
        assert_eq!(notifier.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_no_recipients_counts_as_dropped() {
        let notifier = Arc::new(RecordingNotifier::default());
        let dispatch =
            NotifierDispatch::new(notifier.clone(), Arc::new(ControlState::new()), &config(vec![]));

        let report = dispatch
            .deliver_all(&[event("https://x/a"), event("https://x/b")])
            .await;

        assert_eq!(report.delivered, 0);
        assert_eq!(report.dropped, 2);
        assert!(notifier.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failure_does_not_block_siblings() {
        let notifier = Arc::new(RecordingNotifier {
            fail_for: Some(1),
            ..Default::default()
        });
        let dispatch = NotifierDispatch::new(
            notifier.clone(),
            Arc::new(ControlState::new()),
            &config(vec![1, 2]),
        );

        let report = dispatch
            .deliver_all(&[event("https://x/a"), event("https://x/b")])
            .await;

        assert_eq!(report.failed, 2);
        assert_eq!(report.delivered, 2);
        assert_eq!(notifier.sent.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limiter_spaces_sends() {
        let limiter = RateLimiter::new(Duration::from_millis(500));
        let start = Instant::now();

        limiter.acquire().await;
        limiter.acquire().await;
        limiter.acquire().await;

        assert!(start.elapsed() >= Duration::from_millis(1000));
        assert!(start.elapsed() < Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn test_build_notifier_log_kind() {
        let config = NotifierConfig {
            kind: NotifierKind::Log,
            ..NotifierConfig::default()
        };
        let notifier = build_notifier(&config, Client::new());
        assert!(notifier.deliver(1, "hello").await.is_ok());
    }
}
