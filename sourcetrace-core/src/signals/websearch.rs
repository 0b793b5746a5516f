//! Reverse image search for earlier copies of an image on the web.
//!
//! Best-effort scrape of Google's search-by-image endpoint. The result
//! page's structure shifts frequently, so extraction is regex-based and
//! every failure mode degrades to a typed `Unavailable` marker carrying the
//! manual search URL, letting a human run the query in a browser. A paid
//! search API would slot in behind the same signal contract.

use crate::config::SearchConfig;
use crate::error::SignalError;
use crate::types::{WebMatch, WebMatchSignal};
use regex::Regex;
use reqwest::Client;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, warn};

/// Collects the reverse-search signal for a public image URL.
pub struct ReverseSearchCollector {
    client: Option<Client>,
    max_matches: usize,
}

impl ReverseSearchCollector {
    /// Build the collector. A failed HTTP client build degrades the
    /// collector to always-unavailable rather than failing construction.
    pub fn new(config: &SearchConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .ok();
        Self {
            client,
            max_matches: config.max_matches,
        }
    }

    /// Search for earlier instances of the image.
    ///
    /// Never fails outward: every error path resolves to a typed marker,
    /// carrying the manual search URL whenever one could be constructed.
    pub async fn search(&self, image_url: &str) -> WebMatchSignal {
        if image_url.trim().is_empty() {
            return WebMatchSignal::unavailable("Invalid image URL provided", None);
        }

        let search_url = format!(
            "https://www.google.com/searchbyimage?image_url={}&safe=off",
            urlencoding::encode(image_url)
        );

        let client = match &self.client {
            Some(c) => c,
            None => {
                return WebMatchSignal::unavailable(
                    "Search client unavailable",
                    Some(search_url),
                );
            }
        };

        let response = match client
            .get(&search_url)
            .header(
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            )
            .header("Accept-Language", "en-US,en;q=0.5")
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                warn!(category = "timeout", "Reverse search request timed out");
                return WebMatchSignal::unavailable(
                    "Search request timed out",
                    Some(search_url),
                );
            }
            Err(e) => {
                warn!(category = "network", error = %e, "Reverse search request failed");
                return WebMatchSignal::unavailable(
                    format!("Network error: {}", e),
                    Some(search_url),
                );
            }
        };

        let status = response.status();
        if status.as_u16() == 429 {
            let err = SignalError::Blocked {
                message: "Rate limit exceeded - too many requests".into(),
            };
            warn!(category = "blocked", "Search engine rate limited the request");
            return WebMatchSignal::unavailable(err.to_string(), Some(search_url));
        }

        let final_url = response.url().to_string();
        if !status.is_success() {
            return WebMatchSignal::unavailable(
                format!("Search failed with status {}", status.as_u16()),
                Some(search_url),
            );
        }

        let html = match response.text().await {
            Ok(t) => t,
            Err(e) => {
                return WebMatchSignal::unavailable(
                    format!("Failed to read search response: {}", e),
                    Some(search_url),
                );
            }
        };

        if let Some(err) = captcha_block(&final_url, &html) {
            warn!(category = "blocked", "Search engine returned a CAPTCHA page");
            return WebMatchSignal::unavailable(err.to_string(), Some(search_url));
        }

        let matches = extract_matches(&html, self.max_matches);
        debug!(match_count = matches.len(), "Reverse search completed");

        match matches.first().cloned() {
            Some(earliest) => WebMatchSignal::Found {
                match_count: matches.len(),
                earliest_match: earliest,
                matches,
                search_url,
            },
            None => WebMatchSignal::NoMatches { search_url },
        }
    }
}

/// Detect the search engine's CAPTCHA interstitial, either by the redirect
/// target or by a challenge widget in the body.
fn captcha_block(final_url: &str, html: &str) -> Option<SignalError> {
    if final_url.contains("sorry/index") || html.to_lowercase().contains("recaptcha") {
        Some(SignalError::Blocked {
            message: "Search engine CAPTCHA detected - automated search unavailable".into(),
        })
    } else {
        None
    }
}

/// Extract result links and titles from the search page HTML.
///
/// Matches anchors whose href is an external absolute URL followed by a
/// nearby heading element; the search engine's own navigation links are
/// filtered by domain.
fn extract_matches(html: &str, limit: usize) -> Vec<WebMatch> {
    static RESULT_RE: OnceLock<Regex> = OnceLock::new();
    static TAG_RE: OnceLock<Regex> = OnceLock::new();
    let result_re = RESULT_RE.get_or_init(|| {
        Regex::new(r#"(?s)<a[^>]+href="(https?://[^"]+)"[^>]*>.{0,400}?<h3[^>]*>(.*?)</h3>"#)
            .unwrap()
    });
    let tag_re = TAG_RE.get_or_init(|| Regex::new(r"<[^>]+>").unwrap());

    let mut matches = Vec::new();
    for cap in result_re.captures_iter(html) {
        if matches.len() >= limit {
            break;
        }
        let link = cap[1].to_string();
        let domain = match url::Url::parse(&link) {
            Ok(u) => u.host_str().unwrap_or("unknown").to_string(),
            Err(_) => continue,
        };
        if domain.contains("google.") || domain.contains("gstatic.") {
            continue;
        }
        let title = tag_re.replace_all(&cap[2], "").trim().to_string();
        matches.push(WebMatch {
            url: link,
            domain,
            title: if title.is_empty() {
                "No title".to_string()
            } else {
                title
            },
        });
    }
    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_matches_from_result_page() {
        let html = r#"
            <div class="g"><a href="https://twitter.com/user123/status/9876"><br>
            <h3>Earlier tweet with this photo</h3></a></div>
            <div class="g"><a href="https://news.example.com/story"><h3>News <em>story</em></h3></a></div>
            <a href="https://www.google.com/preferences"><h3>Settings</h3></a>
        "#;
        let matches = extract_matches(html, 5);
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].domain, "twitter.com");
        assert_eq!(matches[0].title, "Earlier tweet with this photo");
        assert_eq!(matches[1].title, "News story");
    }

    #[test]
    fn test_extract_matches_respects_limit() {
        let mut html = String::new();
        for i in 0..10 {
            html.push_str(&format!(
                r#"<a href="https://site{i}.example.com/p"><h3>Match {i}</h3></a>"#
            ));
        }
        assert_eq!(extract_matches(&html, 3).len(), 3);
    }

    #[test]
    fn test_extract_matches_empty_page() {
        assert!(extract_matches("<html><body>nothing</body></html>", 5).is_empty());
    }

    #[test]
    fn test_captcha_block_detects_redirect_interstitial() {
        let err = captcha_block(
            "https://www.google.com/sorry/index?continue=...",
            "<html></html>",
        )
        .unwrap();
        assert!(matches!(err, SignalError::Blocked { .. }));
        assert!(err.to_string().contains("CAPTCHA"));
    }

    #[test]
    fn test_captcha_block_detects_challenge_widget() {
        let html = r#"<div class="g-recaptcha" data-sitekey="x"></div>"#;
        assert!(captcha_block("https://www.google.com/searchbyimage", html).is_some());
        // Case-insensitive on the body.
        assert!(captcha_block("https://www.google.com/searchbyimage", "reCAPTCHA").is_some());
    }

    #[test]
    fn test_captcha_block_passes_normal_result_page() {
        let html = r#"<a href="https://example.com"><h3>Match</h3></a>"#;
        assert!(captcha_block("https://www.google.com/searchbyimage", html).is_none());
    }

    #[tokio::test]
    async fn test_search_rejects_empty_url() {
        let collector = ReverseSearchCollector::new(&SearchConfig::default());
        let signal = collector.search("  ").await;
        match signal {
            WebMatchSignal::Unavailable { search_url, .. } => assert!(search_url.is_none()),
            other => panic!("Expected Unavailable, got {:?}", other),
        }
    }
}
