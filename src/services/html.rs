// src/services/html.rs

//! Configurable HTML search adapter.
//!
//! Fetches a site's search page for a keyword and collects listing links
//! using CSS selectors from the site configuration.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{CrawlerConfig, SiteConfig};
use crate::services::SiteAdapter;
use crate::utils::http::{fetch_text, pick_user_agent};
use crate::utils::{resolve_url, search_url};

/// Adapter that scrapes listing links from a server-rendered search page.
pub struct HtmlSearchAdapter {
    site: SiteConfig,
    crawler: Arc<CrawlerConfig>,
    client: Client,
    selector: Selector,
}

impl HtmlSearchAdapter {
    /// Create an adapter for `site`, validating its selector up front.
    pub fn new(site: SiteConfig, crawler: Arc<CrawlerConfig>, client: Client) -> Result<Self> {
        let selector = Self::parse_selector(&site.link_selector)?;
        Ok(Self {
            site,
            crawler,
            client,
            selector,
        })
    }

    /// Extract listing links from a search results page.
    pub fn extract_links(&self, html: &str, page_url: &Url) -> Vec<String> {
        let document = Html::parse_document(html);
        let mut seen = HashSet::new();
        let mut links = Vec::new();

        for element in document.select(&self.selector) {
            let Some(href) = element.value().attr(&self.site.link_attr) else {
                continue;
            };
            let href = href.trim();
            if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
                continue;
            }

            let link = resolve_url(page_url, href);
            if let Some(needle) = &self.site.link_contains {
                if !link.contains(needle.as_str()) {
                    continue;
                }
            }
            if seen.insert(link.clone()) {
                links.push(link);
            }
            if links.len() >= self.site.max_results {
                break;
            }
        }
        links
    }

    fn parse_selector(s: &str) -> Result<Selector> {
        Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
    }
}

#[async_trait]
impl SiteAdapter for HtmlSearchAdapter {
    async fn search(&self, keyword: &str) -> Result<Vec<String>> {
        let url = search_url(&self.site.search_url, keyword);
        let page_url = Url::parse(&url)?;
        let user_agent = pick_user_agent(&self.crawler)?;

        log::debug!("[{}] Opening {}", self.site.id, url);
        let html = fetch_text(&self.client, &url, user_agent)
            .await
            .map_err(|e| AppError::adapter(&self.site.id, keyword, e))?;

        let links = self.extract_links(&html, &page_url);
        if links.is_empty() {
            log::info!(
                "[{}] No elements matched '{}' for '{}'",
                self.site.id,
                self.site.link_selector,
                keyword
            );
        }
        log::debug!("[{}] '{}' returned {} links", self.site.id, keyword, links.len());
        Ok(links)
    }
}
