//! arXiv metadata source.
//!
//! Resolves abs/pdf URLs through the arXiv export Atom API. The feed is
//! small and flat, so the handful of fields are pulled with anchored
//! regexes over the first `<entry>` rather than a full XML parser. The full
//! text itself is never downloaded here; the language model reads the PDF
//! by URL.

use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

use super::{ExtractionError, PaperMetadata, PaperSource};

const DEFAULT_API_BASE: &str = "https://export.arxiv.org/api";

static ID_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"arxiv\.org/abs/(\d+\.\d+)",
        r"arxiv\.org/pdf/(\d+\.\d+)",
        r"(\d{4}\.\d{4,5})",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static pattern"))
    .collect()
});

static ENTRY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<entry>(.*?)</entry>").expect("static pattern"));
static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<title>(.*?)</title>").expect("static pattern"));
static SUMMARY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<summary>(.*?)</summary>").expect("static pattern"));
static AUTHOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<name>([^<]+)</name>").expect("static pattern"));
static PUBLISHED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<published>(\d{4})").expect("static pattern"));

/// Paper source backed by the arXiv export API.
pub struct ArxivSource {
    http: reqwest::Client,
    api_base: String,
}

impl ArxivSource {
    #[must_use]
    pub fn new() -> Self {
        Self::with_api_base(DEFAULT_API_BASE)
    }

    /// Point the client at a different API base (tests use a local mock).
    #[must_use]
    pub fn with_api_base(api_base: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    /// Extract the arXiv id from an abs/pdf URL or a bare id.
    #[must_use]
    pub fn extract_arxiv_id(reference: &str) -> Option<String> {
        ID_PATTERNS
            .iter()
            .find_map(|re| re.captures(reference))
            .map(|caps| caps[1].to_string())
    }

    fn collapse_whitespace(raw: &str) -> String {
        raw.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

impl Default for ArxivSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaperSource for ArxivSource {
    async fn fetch(&self, source_reference: &str) -> Result<PaperMetadata, ExtractionError> {
        let arxiv_id = Self::extract_arxiv_id(source_reference).ok_or_else(|| {
            ExtractionError::UnsupportedSource {
                reference: source_reference.to_string(),
            }
        })?;

        tracing::info!(arxiv_id = %arxiv_id, "fetching arXiv metadata");

        let url = format!("{}/query?id_list={arxiv_id}", self.api_base);
        let body = self
            .http
            .get(&url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| ExtractionError::Transport {
                message: e.to_string(),
            })?
            .text()
            .await
            .map_err(|e| ExtractionError::Transport {
                message: e.to_string(),
            })?;

        let entry = ENTRY_RE
            .captures(&body)
            .map(|caps| caps[1].to_string())
            .ok_or_else(|| ExtractionError::EmptyResult {
                reference: source_reference.to_string(),
            })?;

        let title = TITLE_RE
            .captures(&entry)
            .map(|caps| Self::collapse_whitespace(&caps[1]))
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ExtractionError::EmptyResult {
                reference: source_reference.to_string(),
            })?;

        let abstract_text = SUMMARY_RE
            .captures(&entry)
            .map(|caps| Self::collapse_whitespace(&caps[1]))
            .unwrap_or_default();

        let authors = AUTHOR_RE
            .captures_iter(&entry)
            .map(|caps| caps[1].trim().to_string())
            .collect();

        let year = PUBLISHED_RE
            .captures(&entry)
            .and_then(|caps| caps[1].parse::<i64>().ok());

        Ok(PaperMetadata {
            title,
            authors,
            year,
            abstract_text,
            pdf_url: Some(format!("https://arxiv.org/pdf/{arxiv_id}")),
            full_text: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_ids_from_common_url_shapes() {
        for reference in [
            "https://arxiv.org/abs/2401.12345",
            "https://arxiv.org/pdf/2401.12345",
            "2401.12345",
        ] {
            assert_eq!(
                ArxivSource::extract_arxiv_id(reference).as_deref(),
                Some("2401.12345"),
                "failed for {reference}"
            );
        }
        assert_eq!(ArxivSource::extract_arxiv_id("https://example.com"), None);
    }

    #[test]
    fn collapses_feed_whitespace() {
        assert_eq!(
            ArxivSource::collapse_whitespace("  A\n  Folded\n  Title "),
            "A Folded Title"
        );
    }
}
