use crate::error::{Result, WikiError};
use crate::extract::{extract_body_text, extract_candidates};
use crate::page::{Candidate, PageRef};
use crate::source::LinkSource;
use futures::FutureExt;
use futures::future::BoxFuture;
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://en.wikipedia.org";

/// Upper bound the Wikipedia API accepts for `list=random`.
pub const MAX_RANDOM_PAGES: usize = 500;

#[derive(Debug, Clone)]
pub struct WikiConfig {
    pub base_url: String,
    pub api_url: Option<String>,
    pub timeout_secs: u64,
    pub max_paragraphs: usize,
    pub user_agent: String,
}

impl Default for WikiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_url: None,
            timeout_secs: 10,
            max_paragraphs: 3,
            user_agent: format!("philhop/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl WikiConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = Some(api_url.into());
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_max_paragraphs(mut self, max_paragraphs: usize) -> Self {
        self.max_paragraphs = max_paragraphs;
        self
    }
}

/// HTTP client for article pages and the Wikipedia API.
#[derive(Debug, Clone)]
pub struct WikiClient {
    client: Client,
    base: Url,
    api: Url,
    max_paragraphs: usize,
}

#[derive(Debug, Deserialize)]
struct RandomResponse {
    query: RandomQuery,
}

#[derive(Debug, Deserialize)]
struct RandomQuery {
    random: Vec<RandomEntry>,
}

#[derive(Debug, Deserialize)]
struct RandomEntry {
    title: String,
}

impl WikiClient {
    pub fn new(config: WikiConfig) -> Result<Self> {
        let base = Url::parse(&config.base_url)
            .map_err(|e| WikiError::InvalidUrl(format!("{}: {}", config.base_url, e)))?;
        let api = match &config.api_url {
            Some(api_url) => Url::parse(api_url),
            None => base.join("/w/api.php"),
        }
        .map_err(|e| WikiError::InvalidUrl(format!("API URL: {}", e)))?;

        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs((config.timeout_secs / 2).max(1)))
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self {
            client,
            base,
            api,
            max_paragraphs: config.max_paragraphs,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Parse user input (URL, article path or title) into a page reference.
    pub fn page(&self, input: &str) -> Result<PageRef> {
        PageRef::parse(&self.base, input)
            .ok_or_else(|| WikiError::InvalidUrl(format!("Not an article: {}", input)))
    }

    /// Fetch the raw HTML of an article.
    pub async fn fetch_html(&self, page: &PageRef) -> Result<String> {
        let url = page
            .url(&self.base)
            .ok_or_else(|| WikiError::InvalidUrl(page.id.clone()))?;
        debug!("Fetching {}", url);

        let start = Instant::now();
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(WikiError::Status(status.as_u16(), url.to_string()));
        }

        let body = response.text().await?;
        debug!("Fetched {} in {:?} ({} bytes)", url, start.elapsed(), body.len());
        if body.trim().is_empty() {
            return Err(WikiError::NoContent(url.to_string()));
        }
        Ok(body)
    }

    /// Ordered outgoing article links of a page.
    pub async fn extract_links(&self, page: &PageRef) -> Result<Vec<Candidate>> {
        let html = self.fetch_html(page).await?;
        let candidates = extract_candidates(&html, &self.base, self.max_paragraphs);
        debug!("Extracted {} candidates from {}", candidates.len(), page.id);
        Ok(candidates)
    }

    /// Prose text of a page.
    pub async fn fetch_body_text(&self, page: &PageRef) -> Result<String> {
        let html = self.fetch_html(page).await?;
        let text = extract_body_text(&html);
        if text.is_empty() {
            return Err(WikiError::NoContent(page.id.clone()));
        }
        Ok(text)
    }

    /// Draw `n` random main-namespace articles.
    pub async fn random_pages(&self, n: usize) -> Result<Vec<PageRef>> {
        if n == 0 || n > MAX_RANDOM_PAGES {
            return Err(WikiError::Other(format!(
                "Random page count must be between 1 and {}, got {}",
                MAX_RANDOM_PAGES, n
            )));
        }
        info!("Getting {} random Wikipedia pages", n);

        let limit = n.to_string();
        let response = self
            .client
            .get(self.api.clone())
            .query(&[
                ("action", "query"),
                ("format", "json"),
                ("list", "random"),
                ("rnnamespace", "0"),
                ("rnlimit", limit.as_str()),
            ])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(WikiError::Status(status.as_u16(), self.api.to_string()));
        }

        let body: RandomResponse = response
            .json()
            .await
            .map_err(|e| WikiError::ParseError(format!("random pages response: {}", e)))?;

        Ok(body
            .query
            .random
            .iter()
            .filter_map(|entry| PageRef::from_title(&self.base, &entry.title))
            .collect())
    }
}

impl LinkSource for WikiClient {
    fn extract<'a>(&'a self, page: &'a PageRef) -> BoxFuture<'a, Result<Vec<Candidate>>> {
        self.extract_links(page).boxed()
    }

    fn body_text<'a>(&'a self, page: &'a PageRef) -> BoxFuture<'a, Result<String>> {
        self.fetch_body_text(page).boxed()
    }
}
