//! Best-effort web enrichment from the Wikipedia action API.
//!
//! Every failure path returns `None`; enrichment never fails a query.

use serde::Serialize;
use std::time::Duration;

const WIKIPEDIA_API: &str = "https://en.wikipedia.org/w/api.php";
const WEB_TIMEOUT: Duration = Duration::from_secs(10);
const SUMMARY_LIMIT: usize = 500;

/// Supplementary context fetched from the public web.
#[derive(Clone, Debug, Serialize)]
pub struct WebContext {
    pub title: String,
    pub summary: String,
    pub url: String,
    pub source: String,
}

/// Wikipedia lookup client. `offline` short-circuits every request, used in
/// tests and air-gapped deployments.
pub struct WebAgent {
    http: reqwest::Client,
    offline: bool,
}

impl WebAgent {
    pub fn new(offline: bool) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(WEB_TIMEOUT)
                .build()
                .unwrap_or_default(),
            offline,
        }
    }

    /// Intro extract for the page best matching `topic`, or `None` when
    /// offline, on any transport error, or when no page exists.
    pub async fn wikipedia_summary(&self, topic: &str) -> Option<WebContext> {
        if self.offline || topic.trim().is_empty() {
            return None;
        }

        let response = self
            .http
            .get(WIKIPEDIA_API)
            .query(&[
                ("action", "query"),
                ("format", "json"),
                ("prop", "extracts|info"),
                ("exintro", "1"),
                ("explaintext", "1"),
                ("inprop", "url"),
                ("redirects", "1"),
                ("titles", topic.trim()),
            ])
            .send()
            .await
            .ok()?;
        let body: serde_json::Value = response.json().await.ok()?;

        let pages = body.get("query")?.get("pages")?.as_object()?;
        let (page_id, page) = pages.iter().next()?;
        if page_id == "-1" {
            return None;
        }

        let extract = page.get("extract")?.as_str()?;
        if extract.trim().is_empty() {
            return None;
        }
        Some(WebContext {
            title: page
                .get("title")
                .and_then(|v| v.as_str())
                .unwrap_or(topic)
                .to_string(),
            summary: truncate_summary(extract),
            url: page
                .get("fullurl")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            source: "Wikipedia".to_string(),
        })
    }

    /// Enrichment query for an artifact, scoped by its culture.
    pub async fn enrich_artifact(&self, name: &str, culture: &str) -> Option<WebContext> {
        let topic = if culture.is_empty() {
            name.to_string()
        } else {
            format!("{name} ({culture})")
        };
        match self.wikipedia_summary(&topic).await {
            Some(ctx) => Some(ctx),
            None => self.wikipedia_summary(name).await,
        }
    }
}

/// Caps the extract at a character budget, cutting at a word boundary.
fn truncate_summary(extract: &str) -> String {
    let trimmed = extract.trim();
    if trimmed.chars().count() <= SUMMARY_LIMIT {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(SUMMARY_LIMIT).collect();
    match cut.rfind(' ') {
        Some(pos) => format!("{}...", &cut[..pos]),
        None => format!("{cut}..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn offline_agent_never_fetches() {
        let agent = WebAgent::new(true);
        assert!(agent.wikipedia_summary("Eyo Festival").await.is_none());
        assert!(agent.enrich_artifact("Ife Bronze Head", "Yoruba").await.is_none());
    }

    #[tokio::test]
    async fn blank_topic_is_skipped() {
        let agent = WebAgent::new(false);
        assert!(agent.wikipedia_summary("   ").await.is_none());
    }

    #[test]
    fn long_extracts_are_cut_at_word_boundaries() {
        let extract = "word ".repeat(200);
        let summary = truncate_summary(&extract);
        assert!(summary.chars().count() <= SUMMARY_LIMIT + 3);
        assert!(summary.ends_with("..."));

        assert_eq!(truncate_summary("short extract"), "short extract");
    }
}
