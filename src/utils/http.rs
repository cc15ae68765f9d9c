// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use rand::seq::SliceRandom;

use crate::error::{AppError, Result};
use crate::models::CrawlerConfig;

/// Create a configured asynchronous HTTP client.
///
/// The User-Agent is set per request, see [`pick_user_agent`].
pub fn create_async_client(config: &CrawlerConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// Pick a random non-empty User-Agent from the configured pool.
pub fn pick_user_agent(config: &CrawlerConfig) -> Result<&str> {
    let candidates: Vec<&str> = config
        .user_agents
        .iter()
        .map(|ua| ua.trim())
        .filter(|ua| !ua.is_empty())
        .collect();

    candidates
        .choose(&mut rand::thread_rng())
        .copied()
        .ok_or_else(|| AppError::config("crawler.user_agents is empty"))
}

/// Fetch a page body with the given User-Agent, failing on non-2xx status.
pub async fn fetch_text(client: &reqwest::Client, url: &str, user_agent: &str) -> Result<String> {
    let text = client
        .get(url)
        .header(reqwest::header::USER_AGENT, user_agent)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_user_agent_skips_blank_entries() {
        let config = CrawlerConfig {
            user_agents: vec!["  ".into(), "agent/1.0".into()],
            timeout_secs: 5,
        };
        assert_eq!(pick_user_agent(&config).unwrap(), "agent/1.0");
    }

    #[test]
    fn test_pick_user_agent_empty_pool() {
        let config = CrawlerConfig {
            user_agents: Vec::new(),
            timeout_secs: 5,
        };
        assert!(pick_user_agent(&config).is_err());
    }
}
