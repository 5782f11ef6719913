//! Instructional page content adapter.
//!
//! States publish how-to-vote instructions as web pages, not feeds. This
//! adapter fetches a registered page and normalizes it to plain text: the
//! `<main>`/`<article>` region when one exists, scripts and styles dropped,
//! tags stripped, whitespace collapsed one line per block, truncated at 8k
//! characters on a line boundary with an explicit notice.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use ballotline_core::{
    Adapter, AdapterQuery, Error, FactField, FactPayload, FactValue, Result, TextContent,
    VotingType,
};
use chrono::Utc;
use regex::{Regex, RegexBuilder};
use reqwest::header::{HeaderValue, ACCEPT, USER_AGENT};
use reqwest::Client;
use tracing::instrument;

const SOURCE_ID: &str = "page_content";
/// Official page, but scraped: below a structured feed, above a search hit.
const CONFIDENCE: f64 = 0.85;
const MAX_CHARS: usize = 8_000;
const TRUNCATION_NOTICE: &str = "[Content truncated]";
const BROWSER_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

struct HtmlPatterns {
    title: Regex,
    main_region: Regex,
    drop_blocks: Regex,
    tag: Regex,
}

impl HtmlPatterns {
    fn compile() -> Result<Self> {
        let build = |pattern: &str| {
            RegexBuilder::new(pattern)
                .case_insensitive(true)
                .dot_matches_new_line(true)
                .build()
                .map_err(|e| Error::backend("compile html pattern", e))
        };
        Ok(Self {
            title: build(r"<title[^>]*>(.*?)</title>")?,
            main_region: build(r"<(main|article)[^>]*>(.*?)</(?:main|article)>")?,
            drop_blocks: build(r"<(script|style|noscript)[^>]*>.*?</(?:script|style|noscript)>")?,
            tag: build(r"<[^>]+>")?,
        })
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
}

/// Normalize an HTML document into (title, cleaned text).
fn normalize_html(patterns: &HtmlPatterns, html: &str) -> (Option<String>, String) {
    let title = patterns
        .title
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| decode_entities(m.as_str()).trim().to_string())
        .filter(|t| !t.is_empty());

    // Prefer the main content region; fall back to the whole document.
    let region = patterns
        .main_region
        .captures(html)
        .and_then(|c| c.get(2))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| html.to_string());

    let without_blocks = patterns.drop_blocks.replace_all(&region, "\n");
    let without_tags = patterns.tag.replace_all(&without_blocks, "\n");
    let decoded = decode_entities(&without_tags);

    let text = decoded
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    (title, text)
}

/// Cut at the last line boundary inside the budget and say so.
fn truncate_on_line(text: &str, max_chars: usize) -> String {
    if text.len() <= max_chars {
        return text.to_string();
    }
    let mut cut = max_chars;
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    let head = match text[..cut].rfind('\n') {
        Some(idx) if idx > 0 => &text[..idx],
        _ => &text[..cut],
    };
    format!("{head}\n\n{TRUNCATION_NOTICE}")
}

/// Fetches registered how-to-vote pages and serves their normalized text.
pub struct PageContentAdapter {
    client: Client,
    patterns: HtmlPatterns,
    /// (state, voting type) → page URL.
    pages: HashMap<(String, VotingType), String>,
}

impl PageContentAdapter {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .expect("reqwest client");
        Ok(Self {
            client,
            patterns: HtmlPatterns::compile()?,
            pages: HashMap::new(),
        })
    }

    /// Register the page serving instructions for a state and channel.
    pub fn with_page(
        mut self,
        state: impl Into<String>,
        voting_type: VotingType,
        url: impl Into<String>,
    ) -> Self {
        self.pages
            .insert((state.into().to_ascii_uppercase(), voting_type), url.into());
        self
    }

    #[instrument(level = "debug", skip(self))]
    async fn fetch_page(&self, url: &str) -> Result<String> {
        let resp = self
            .client
            .get(url)
            .header(USER_AGENT, HeaderValue::from_static(crate::USER_AGENT_VALUE))
            .header(ACCEPT, HeaderValue::from_static(BROWSER_ACCEPT))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::source_unavailable(SOURCE_ID, e.to_string()))?;
        resp.text()
            .await
            .map_err(|e| Error::backend("read page body", e))
    }
}

#[async_trait]
impl Adapter for PageContentAdapter {
    fn source_id(&self) -> &str {
        SOURCE_ID
    }

    #[instrument(level = "info", skip(self))]
    async fn fetch(&self, query: &AdapterQuery) -> Result<Vec<FactValue>> {
        let AdapterQuery::Instructional {
            state, voting_type, ..
        } = query
        else {
            return Err(Error::NotFound(
                "page content serves instructional queries only".to_string(),
            ));
        };
        let key = (state.to_ascii_uppercase(), *voting_type);
        let url = self.pages.get(&key).ok_or_else(|| {
            Error::NotFound(format!(
                "no instructional page registered for {} / {}",
                key.0,
                voting_type.as_str()
            ))
        })?;

        let html = self.fetch_page(url).await?;
        let (title, text) = normalize_html(&self.patterns, &html);
        if text.trim().is_empty() {
            return Err(Error::NotFound(format!("page at '{url}' has no text content")));
        }
        let body = truncate_on_line(&text, MAX_CHARS);

        Ok(vec![FactValue::new(
            FactField::InstructionalContent,
            FactPayload::Text(TextContent::new(title, Some(url.clone()), body)?),
            SOURCE_ID,
            Utc::now(),
            CONFIDENCE,
        )?])
    }
}
