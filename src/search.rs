//! Web-search context acquisition with a global time budget.
//!
//! One provider is active per request: Tavily and Brave over the shared
//! async HTTP client, or DuckDuckGo over a blocking client on a worker
//! thread (its endpoint flow is synchronous two-step scraping). Top hits are
//! enriched with cleaned article text from the Jina reader service, each
//! fetch window carved out of the remaining 60-second budget.
//!
//! The subsystem never fails upward: every error path degrades to a
//! `[System Note: …]` string so Stage 1 can proceed without context.

use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};

/// Total wall-clock budget for one search, enrichment included.
pub const SEARCH_TIMEOUT_BUDGET: Duration = Duration::from_secs(60);

/// Minimum budget left for an enrichment fetch to be worth starting.
const MIN_FETCH_WINDOW: Duration = Duration::from_secs(5);

/// Cap on a single enrichment fetch.
const MAX_FETCH_WINDOW: Duration = Duration::from_secs(25);

/// Base timeout for search API calls and the pooled clients.
const SEARCH_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Additional DuckDuckGo attempts after a rate-limited first try.
const DDG_MAX_RETRIES: u32 = 2;

/// Base back-off between DuckDuckGo retries (scaled by attempt number).
const DDG_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Enriched bodies shorter than this keep the original summary appended.
const MIN_CONTENT_CHARS: usize = 500;

/// Formatted content bodies are clipped to roughly this many characters.
const MAX_CONTENT_CHARS: usize = 2000;

const READER_BASE: &str = "https://r.jina.ai/";
const TAVILY_ENDPOINT: &str = "https://api.tavily.com/search";
const BRAVE_ENDPOINT: &str = "https://api.search.brave.com/res/v1/web/search";
const DDG_HOME: &str = "https://duckduckgo.com/";
const DDG_NEWS_ENDPOINT: &str = "https://duckduckgo.com/news.js";

/// DuckDuckGo serves a challenge page to clients without a browser UA.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// The supported web-search providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchProviderKind {
    /// DuckDuckGo news search (no key, blocking client).
    #[serde(rename = "duckduckgo")]
    DuckDuckGo,
    /// Tavily search API.
    Tavily,
    /// Brave search API.
    Brave,
}

impl std::fmt::Display for SearchProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::DuckDuckGo => "duckduckgo",
            Self::Tavily => "tavily",
            Self::Brave => "brave",
        };
        f.write_str(name)
    }
}

/// Per-request search parameters resolved from settings.
#[derive(Debug, Clone, Copy)]
pub struct SearchOptions {
    /// Which provider to use.
    pub provider: SearchProviderKind,
    /// Maximum results to request.
    pub max_results: usize,
    /// How many top hits to enrich with full text (0 disables).
    pub full_content_results: usize,
}

/// A single search result, optionally enriched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    /// 1-based position in the result list.
    pub index: usize,
    /// Result title.
    pub title: String,
    /// Result URL.
    pub url: String,
    /// Publisher name, when the provider reports one.
    pub source: Option<String>,
    /// Provider-supplied summary or description.
    pub summary: String,
    /// Cleaned full text when an enrichment fetch succeeded.
    pub content: Option<String>,
}

/// Errors inside the search subsystem. Never escapes [`Searcher::perform_search`].
#[derive(Debug, Error)]
pub enum SearchError {
    /// The active provider's API key is not configured.
    #[error("{provider} API key not configured")]
    MissingKey {
        /// Provider missing its key.
        provider: SearchProviderKind,
    },
    /// The provider responded with a non-success status.
    #[error("{provider} search error: {status} - {body}")]
    Status {
        /// Responding provider.
        provider: SearchProviderKind,
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },
    /// DuckDuckGo rate limiting; the only retryable failure.
    #[error("DuckDuckGo Ratelimit: {detail}")]
    RateLimited {
        /// What indicated the rate limit.
        detail: String,
    },
    /// Network-level failure.
    #[error("search transport error: {detail}")]
    Transport {
        /// Underlying error description.
        detail: String,
    },
    /// Response did not match the expected schema.
    #[error("malformed search response: {detail}")]
    Parse {
        /// What failed to parse.
        detail: String,
    },
}

/// The enrichment window for a fetch starting `elapsed` into the budget.
///
/// `None` means the budget is exhausted and the fetch (and all later ones)
/// should be skipped; otherwise the window is the remaining budget capped at
/// 25 seconds.
#[doc(hidden)]
pub fn fetch_window(elapsed: Duration) -> Option<Duration> {
    let remaining = SEARCH_TIMEOUT_BUDGET.saturating_sub(elapsed);
    if remaining <= MIN_FETCH_WINDOW {
        None
    } else {
        Some(remaining.min(MAX_FETCH_WINDOW))
    }
}

/// The degraded context string for a failed search.
#[doc(hidden)]
pub fn system_note(provider: SearchProviderKind, err: &SearchError) -> String {
    match (provider, err) {
        (SearchProviderKind::Tavily, SearchError::MissingKey { .. }) => {
            "[System Note: Tavily API key not configured. Please add TAVILY_API_KEY to your environment.]"
        }
        (SearchProviderKind::Tavily, SearchError::Status { .. }) => {
            "[System Note: Tavily search failed. Please check your API key.]"
        }
        (SearchProviderKind::Tavily, _) => "[System Note: Tavily search failed. Please try again.]",
        (SearchProviderKind::Brave, SearchError::MissingKey { .. }) => {
            "[System Note: Brave API key not configured. Please add your Brave API key in settings.]"
        }
        (SearchProviderKind::Brave, SearchError::Status { .. }) => {
            "[System Note: Brave search failed. Please check your API key.]"
        }
        (SearchProviderKind::Brave, _) => "[System Note: Brave search failed. Please try again.]",
        (SearchProviderKind::DuckDuckGo, _) => {
            "[System Note: Web search was attempted but failed. Please answer based on your internal knowledge.]"
        }
    }
    .to_owned()
}

// ---------------------------------------------------------------------------
// Wire types (pub for integration testing)
// ---------------------------------------------------------------------------

/// Tavily search request body.
#[doc(hidden)]
#[derive(Debug, Serialize)]
pub struct TavilyRequest {
    /// API key travels in the body on this API.
    pub api_key: String,
    /// Search query.
    pub query: String,
    /// Maximum results.
    pub max_results: usize,
    /// Always `false`; the council does its own synthesis.
    pub include_answer: bool,
    /// Always `false`; enrichment goes through the reader service.
    pub include_raw_content: bool,
    /// Always `"advanced"`.
    pub search_depth: String,
}

/// Tavily search response body.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct TavilyResponse {
    /// Search results.
    #[serde(default)]
    pub results: Vec<TavilyResultEntry>,
}

/// A single Tavily result.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct TavilyResultEntry {
    /// Result title.
    #[serde(default)]
    pub title: Option<String>,
    /// Result URL.
    #[serde(default)]
    pub url: Option<String>,
    /// Result content snippet.
    #[serde(default)]
    pub content: Option<String>,
}

/// Brave search response body.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct BraveResponse {
    /// Web results section.
    #[serde(default)]
    pub web: Option<BraveWebSection>,
}

/// Brave `web` section.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct BraveWebSection {
    /// Web results.
    #[serde(default)]
    pub results: Vec<BraveResultEntry>,
}

/// A single Brave result.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct BraveResultEntry {
    /// Result title.
    #[serde(default)]
    pub title: Option<String>,
    /// Result URL.
    #[serde(default)]
    pub url: Option<String>,
    /// Result description.
    #[serde(default)]
    pub description: Option<String>,
    /// Extra snippets with more content, when present.
    #[serde(default)]
    pub extra_snippets: Vec<String>,
}

/// DuckDuckGo news.js response body.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct DdgNewsResponse {
    /// News results.
    #[serde(default)]
    pub results: Vec<DdgNewsEntry>,
}

/// A single DuckDuckGo news result.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct DdgNewsEntry {
    /// Result title.
    #[serde(default)]
    pub title: Option<String>,
    /// Result URL.
    #[serde(default)]
    pub url: Option<String>,
    /// Result excerpt.
    #[serde(default)]
    pub excerpt: Option<String>,
    /// Publisher name.
    #[serde(default)]
    pub source: Option<String>,
}

// ---------------------------------------------------------------------------
// Pure helpers (pub for integration testing)
// ---------------------------------------------------------------------------

/// Convert a Tavily response into formatted context text.
#[doc(hidden)]
pub fn format_tavily_results(resp: TavilyResponse) -> String {
    let blocks: Vec<String> = resp
        .results
        .into_iter()
        .enumerate()
        .map(|(i, entry)| {
            format!(
                "Result {}:\nTitle: {}\nURL: {}\nContent:\n{}",
                i.saturating_add(1),
                entry.title.unwrap_or_else(|| "No Title".to_owned()),
                entry.url.unwrap_or_else(|| "#".to_owned()),
                entry
                    .content
                    .unwrap_or_else(|| "No content available.".to_owned()),
            )
        })
        .collect();

    if blocks.is_empty() {
        "No web search results found.".to_owned()
    } else {
        blocks.join("\n\n")
    }
}

/// Convert a Brave response into hits ready for enrichment.
#[doc(hidden)]
pub fn brave_hits(resp: BraveResponse, max_results: usize) -> Vec<SearchHit> {
    let results = resp.web.map(|web| web.results).unwrap_or_default();
    results
        .into_iter()
        .take(max_results)
        .enumerate()
        .map(|(i, entry)| {
            let mut description = entry
                .description
                .unwrap_or_else(|| "No description available.".to_owned());
            for snippet in entry.extra_snippets.iter().take(2) {
                description.push('\n');
                description.push_str(snippet);
            }
            SearchHit {
                index: i.saturating_add(1),
                title: entry.title.unwrap_or_else(|| "No Title".to_owned()),
                url: entry.url.unwrap_or_else(|| "#".to_owned()),
                source: None,
                summary: description,
                content: None,
            }
        })
        .collect()
}

/// Convert a DuckDuckGo news response into hits ready for enrichment.
#[doc(hidden)]
pub fn ddg_hits(resp: DdgNewsResponse, max_results: usize) -> Vec<SearchHit> {
    resp.results
        .into_iter()
        .take(max_results)
        .enumerate()
        .map(|(i, entry)| SearchHit {
            index: i.saturating_add(1),
            title: entry.title.unwrap_or_else(|| "No Title".to_owned()),
            url: entry.url.unwrap_or_else(|| "#".to_owned()),
            source: entry.source.filter(|s| !s.is_empty()),
            summary: entry
                .excerpt
                .unwrap_or_else(|| "No description available.".to_owned()),
            content: None,
        })
        .collect()
}

/// Render hits into the context block injected into Stage 1.
#[doc(hidden)]
pub fn format_hits(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return "No web search results found.".to_owned();
    }

    let blocks: Vec<String> = hits
        .iter()
        .map(|hit| {
            let mut text = format!(
                "Result {}:\nTitle: {}\nURL: {}",
                hit.index, hit.title, hit.url
            );
            if let Some(source) = &hit.source {
                text.push_str("\nSource: ");
                text.push_str(source);
            }
            match &hit.content {
                Some(content) => {
                    text.push_str("\nContent:\n");
                    text.push_str(&clip_chars(content, MAX_CONTENT_CHARS));
                }
                None => {
                    text.push_str("\nSummary: ");
                    text.push_str(&hit.summary);
                }
            }
            text
        })
        .collect();

    blocks.join("\n\n")
}

/// Attach an enriched body to a hit, padding short bodies with the summary.
#[doc(hidden)]
pub fn attach_content(hit: &mut SearchHit, mut content: String) {
    if content.chars().count() < MIN_CONTENT_CHARS {
        content.push_str(
            "\n\n[System Note: Full content fetch yielded limited text. Appending original summary.]\nOriginal Summary: ",
        );
        content.push_str(&hit.summary);
    }
    hit.content = Some(content);
}

/// Extract the `vqd` token DuckDuckGo requires for API-shaped requests.
#[doc(hidden)]
pub fn extract_vqd(page: &str) -> Option<String> {
    let re = regex::Regex::new(r#"vqd=['"]?([\d-]+)"#).ok()?;
    re.captures(page)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_owned())
}

fn clip_chars(text: &str, max: usize) -> String {
    let mut clipped: String = text.chars().take(max).collect();
    if text.chars().count() > max {
        clipped.push_str("...");
    }
    clipped
}

fn url_fetchable(raw: &str) -> bool {
    raw != "#" && url::Url::parse(raw).is_ok()
}

// ---------------------------------------------------------------------------
// Searcher
// ---------------------------------------------------------------------------

/// Search context provider with pooled HTTP clients.
///
/// The async client is injected at start-up and shared with the adapters.
/// The blocking client for DuckDuckGo is built on first use inside the
/// worker thread — a blocking client cannot be constructed on the async
/// runtime.
pub struct Searcher {
    http: reqwest::Client,
    blocking: OnceLock<Option<reqwest::blocking::Client>>,
    tavily_api_key: Option<String>,
    brave_api_key: Option<String>,
}

impl Searcher {
    /// Create a searcher sharing the process HTTP client.
    pub fn new(
        http: reqwest::Client,
        tavily_api_key: Option<String>,
        brave_api_key: Option<String>,
    ) -> Self {
        Self {
            http,
            blocking: OnceLock::new(),
            tavily_api_key,
            brave_api_key,
        }
    }

    /// Perform a web search, returning formatted context text.
    ///
    /// Never fails: provider errors degrade to a `[System Note: …]` string
    /// so the caller can proceed without search context. Total wall clock is
    /// bounded by [`SEARCH_TIMEOUT_BUDGET`] plus one in-flight fetch window.
    pub async fn perform_search(self: Arc<Self>, query: &str, options: SearchOptions) -> String {
        let started = Instant::now();
        let result = match options.provider {
            SearchProviderKind::Tavily => self.search_tavily(query, options.max_results).await,
            SearchProviderKind::Brave => self.search_brave(query, options, started).await,
            SearchProviderKind::DuckDuckGo => {
                let this = Arc::clone(&self);
                let query = query.to_owned();
                tokio::task::spawn_blocking(move || {
                    this.search_duckduckgo(&query, options, started)
                })
                .await
                .unwrap_or_else(|e| {
                    Err(SearchError::Transport {
                        detail: format!("search worker thread failed: {e}"),
                    })
                })
            }
        };

        match result {
            Ok(context) => context,
            Err(err) => {
                error!(provider = %options.provider, error = %err, "web search failed");
                system_note(options.provider, &err)
            }
        }
    }

    async fn search_tavily(&self, query: &str, max_results: usize) -> Result<String, SearchError> {
        let api_key = self
            .tavily_api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(SearchError::MissingKey {
                provider: SearchProviderKind::Tavily,
            })?;

        let body = TavilyRequest {
            api_key: api_key.to_owned(),
            query: query.to_owned(),
            max_results,
            include_answer: false,
            include_raw_content: false,
            search_depth: "advanced".to_owned(),
        };

        let response = self
            .http
            .post(TAVILY_ENDPOINT)
            .timeout(SEARCH_HTTP_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(|e| SearchError::Transport {
                detail: e.to_string(),
            })?;

        let payload = check_search_response(SearchProviderKind::Tavily, response).await?;
        let parsed: TavilyResponse =
            serde_json::from_str(&payload).map_err(|e| SearchError::Parse {
                detail: e.to_string(),
            })?;
        Ok(format_tavily_results(parsed))
    }

    async fn search_brave(
        &self,
        query: &str,
        options: SearchOptions,
        started: Instant,
    ) -> Result<String, SearchError> {
        let api_key = self
            .brave_api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(SearchError::MissingKey {
                provider: SearchProviderKind::Brave,
            })?;

        let count = options.max_results.to_string();
        let response = self
            .http
            .get(BRAVE_ENDPOINT)
            .query(&[("q", query), ("count", count.as_str())])
            .header("Accept", "application/json")
            .header("X-Subscription-Token", api_key)
            .timeout(SEARCH_HTTP_TIMEOUT)
            .send()
            .await
            .map_err(|e| SearchError::Transport {
                detail: e.to_string(),
            })?;

        let payload = check_search_response(SearchProviderKind::Brave, response).await?;
        let parsed: BraveResponse =
            serde_json::from_str(&payload).map_err(|e| SearchError::Parse {
                detail: e.to_string(),
            })?;

        let mut hits = brave_hits(parsed, options.max_results);
        self.enrich_hits(&mut hits, options.full_content_results, started)
            .await;
        Ok(format_hits(&hits))
    }

    async fn enrich_hits(&self, hits: &mut [SearchHit], full_content_results: usize, started: Instant) {
        for hit in hits.iter_mut().take(full_content_results) {
            if !url_fetchable(&hit.url) {
                continue;
            }
            let Some(window) = fetch_window(started.elapsed()) else {
                warn!("search time budget exhausted, skipping remaining content fetches");
                break;
            };
            if let Some(content) = self.fetch_reader(&hit.url, window).await {
                attach_content(hit, content);
            }
        }
    }

    async fn fetch_reader(&self, url: &str, timeout: Duration) -> Option<String> {
        let reader_url = format!("{READER_BASE}{url}");
        match self
            .http
            .get(&reader_url)
            .header("Accept", "text/plain")
            .timeout(timeout)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => response.text().await.ok(),
            Ok(response) => {
                warn!(status = %response.status(), %url, "reader service returned non-success");
                None
            }
            Err(e) => {
                warn!(%url, error = %e, "reader fetch failed");
                None
            }
        }
    }

    // -- DuckDuckGo (blocking, worker thread) -------------------------------

    fn blocking_client(&self) -> Result<&reqwest::blocking::Client, SearchError> {
        self.blocking
            .get_or_init(|| {
                reqwest::blocking::Client::builder()
                    .timeout(SEARCH_HTTP_TIMEOUT)
                    .build()
                    .ok()
            })
            .as_ref()
            .ok_or_else(|| SearchError::Transport {
                detail: "failed to build blocking HTTP client".to_owned(),
            })
    }

    fn search_duckduckgo(
        &self,
        query: &str,
        options: SearchOptions,
        started: Instant,
    ) -> Result<String, SearchError> {
        let client = self.blocking_client()?;

        let mut attempt: u32 = 0;
        let mut hits = loop {
            match ddg_news_request(client, query, options.max_results) {
                Ok(found) => break found,
                Err(err @ SearchError::RateLimited { .. }) if attempt < DDG_MAX_RETRIES => {
                    let delay = DDG_RETRY_DELAY.saturating_mul(attempt.saturating_add(1));
                    warn!(error = %err, ?delay, "DuckDuckGo rate limit hit, retrying");
                    std::thread::sleep(delay);
                    attempt = attempt.saturating_add(1);
                }
                Err(err) => return Err(err),
            }
        };

        for hit in hits.iter_mut().take(options.full_content_results) {
            if !url_fetchable(&hit.url) {
                continue;
            }
            let Some(window) = fetch_window(started.elapsed()) else {
                warn!("search time budget exhausted, skipping remaining content fetches");
                break;
            };
            if let Some(content) = fetch_reader_blocking(client, &hit.url, window) {
                attach_content(hit, content);
            }
        }

        Ok(format_hits(&hits))
    }
}

async fn check_search_response(
    provider: SearchProviderKind,
    response: reqwest::Response,
) -> Result<String, SearchError> {
    let status = response.status();
    let body = response.text().await.map_err(|e| SearchError::Transport {
        detail: e.to_string(),
    })?;
    if !status.is_success() {
        return Err(SearchError::Status {
            provider,
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}

fn ddg_news_request(
    client: &reqwest::blocking::Client,
    query: &str,
    max_results: usize,
) -> Result<Vec<SearchHit>, SearchError> {
    let home = client
        .get(DDG_HOME)
        .query(&[("q", query)])
        .header("User-Agent", BROWSER_USER_AGENT)
        .send()
        .map_err(|e| SearchError::Transport {
            detail: e.to_string(),
        })?;
    let page = check_ddg_response(home)?;

    let vqd = extract_vqd(&page).ok_or_else(|| SearchError::RateLimited {
        detail: "no vqd token in response page".to_owned(),
    })?;

    let news = client
        .get(DDG_NEWS_ENDPOINT)
        .query(&[("l", "us-en"), ("o", "json"), ("q", query), ("vqd", vqd.as_str())])
        .header("User-Agent", BROWSER_USER_AGENT)
        .send()
        .map_err(|e| SearchError::Transport {
            detail: e.to_string(),
        })?;
    let payload = check_ddg_response(news)?;

    let parsed: DdgNewsResponse =
        serde_json::from_str(&payload).map_err(|e| SearchError::Parse {
            detail: e.to_string(),
        })?;
    Ok(ddg_hits(parsed, max_results))
}

fn check_ddg_response(response: reqwest::blocking::Response) -> Result<String, SearchError> {
    let status = response.status();
    if status == reqwest::StatusCode::FORBIDDEN || status == reqwest::StatusCode::TOO_MANY_REQUESTS
    {
        return Err(SearchError::RateLimited {
            detail: format!("status {status}"),
        });
    }
    let body = response.text().map_err(|e| SearchError::Transport {
        detail: e.to_string(),
    })?;
    if !status.is_success() {
        return Err(SearchError::Status {
            provider: SearchProviderKind::DuckDuckGo,
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}

fn fetch_reader_blocking(
    client: &reqwest::blocking::Client,
    url: &str,
    timeout: Duration,
) -> Option<String> {
    let reader_url = format!("{READER_BASE}{url}");
    match client
        .get(&reader_url)
        .header("Accept", "text/plain")
        .timeout(timeout)
        .send()
    {
        Ok(response) if response.status().is_success() => response.text().ok(),
        Ok(response) => {
            warn!(status = %response.status(), %url, "reader service returned non-success");
            None
        }
        Err(e) => {
            warn!(%url, error = %e, "reader fetch failed");
            None
        }
    }
}
