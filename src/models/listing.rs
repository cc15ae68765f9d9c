//! Listing links and notification events.

use serde::{Deserialize, Serialize};

/// Canonical form of a listing link: trimmed and lower-cased.
///
/// Every comparison, store and persist goes through this, so
/// `normalize_link(normalize_link(x)) == normalize_link(x)`.
pub fn normalize_link(link: &str) -> String {
    link.trim().to_lowercase()
}

/// One newly discovered listing, delivered independently of its siblings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationEvent {
    /// Site identifier
    pub site: String,

    /// Site display name
    pub site_name: String,

    /// Keyword whose search surfaced the link
    pub keyword: String,

    /// Normalized link
    pub link: String,
}

impl NotificationEvent {
    pub fn new(
        site: impl Into<String>,
        site_name: impl Into<String>,
        keyword: impl Into<String>,
        link: impl Into<String>,
    ) -> Self {
        Self {
            site: site.into(),
            site_name: site_name.into(),
            keyword: keyword.into(),
            link: link.into(),
        }
    }

    /// Render the event using a template.
    ///
    /// Supported placeholders: `{site}` (upper-cased display name),
    /// `{keyword}` and `{link}`. Values are HTML-escaped. The template is
    /// scanned once, so braces inside substituted values are never expanded.
    pub fn format(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len() + self.link.len());
        let mut rest = template;

        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let tail = &rest[start..];
            match self.placeholder(tail) {
                Some((token, value)) => {
                    out.push_str(&value);
                    rest = &tail[token.len()..];
                }
                None => {
                    out.push('{');
                    rest = &tail[1..];
                }
            }
        }
        out.push_str(rest);
        out
    }

    fn placeholder(&self, tail: &str) -> Option<(&'static str, String)> {
        if tail.starts_with("{site}") {
            Some(("{site}", escape_html(&self.site_name.to_uppercase())))
        } else if tail.starts_with("{keyword}") {
            Some(("{keyword}", escape_html(&self.keyword)))
        } else if tail.starts_with("{link}") {
            Some(("{link}", escape_html(&self.link)))
        } else {
            None
        }
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
