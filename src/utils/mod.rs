//! Utility functions and helpers.

pub mod http;

use url::Url;

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Percent-encode a keyword for use inside a URL path or query value.
///
/// Spaces become `%20` so the result is valid in both positions.
pub fn encode_keyword(keyword: &str) -> String {
    url::form_urlencoded::byte_serialize(keyword.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// Substitute the encoded keyword into a `{keyword}` URL template.
pub fn search_url(template: &str, keyword: &str) -> String {
    template.replace("{keyword}", &encode_keyword(keyword))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_url() {
        let base = Url::parse("https://example.com/path/").unwrap();
        assert_eq!(
            resolve_url(&base, "page.html"),
            "https://example.com/path/page.html"
        );
        assert_eq!(
            resolve_url(&base, "/root.html"),
            "https://example.com/root.html"
        );
        assert_eq!(
            resolve_url(&base, "https://other.com/x"),
            "https://other.com/x"
        );
    }

    #[test]
    fn test_encode_keyword() {
        assert_eq!(encode_keyword("Knihy s Toyen"), "Knihy%20s%20Toyen");
        assert_eq!(encode_keyword("a+b"), "a%2Bb");
        assert_eq!(encode_keyword("čeština"), "%C4%8De%C5%A1tina");
    }

    #[test]
    fn test_search_url() {
        assert_eq!(
            search_url("https://knihy.bazos.cz/inzeraty/{keyword}/", "Toyen 1930"),
            "https://knihy.bazos.cz/inzeraty/Toyen%201930/"
        );
    }
}
