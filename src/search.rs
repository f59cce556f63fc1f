use std::io::{self, Write};

use tracing::debug;

use crate::config::Config;
use crate::error::SearchError;
use crate::gateway::WebSearchGateway;

/// Only `Url` sources are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceType {
    Url,
    Document,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRef {
    pub source_type: SourceType,
    pub url: String,
    pub title: Option<String>,
}

impl SourceRef {
    pub fn url(url: impl Into<String>, title: Option<String>) -> Self {
        Self {
            source_type: SourceType::Url,
            url: url.into(),
            title,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebSearchTool {
    pub enable_image_understanding: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub query: String,
    pub model: String,
    pub api_key: String,
    pub web_search: WebSearchTool,
}

impl SearchRequest {
    /// Fails before anything touches the network when no credential is configured.
    pub fn from_config(cfg: &Config, query: &str) -> Result<Self, SearchError> {
        let api_key = cfg.api_key()?.to_string();
        Ok(Self {
            query: query.to_string(),
            model: cfg.model.clone(),
            api_key,
            web_search: WebSearchTool {
                enable_image_understanding: cfg.enable_image_understanding,
            },
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResult {
    pub answer: String,
    pub sources: Vec<SourceRef>,
}

impl SearchResult {
    pub fn url_sources(&self) -> impl Iterator<Item = &SourceRef> {
        self.sources
            .iter()
            .filter(|source| source.source_type == SourceType::Url)
    }
}

pub const NO_SOURCES_NOTICE: &str = "No web sources were used for this query.";

pub fn render(result: &SearchResult, out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "Answer:\n")?;
    writeln!(out, "{}", result.answer)?;
    writeln!(out, "\n")?;

    let mut url_sources = result.url_sources().peekable();
    if url_sources.peek().is_none() {
        writeln!(out, "{NO_SOURCES_NOTICE}")?;
        return Ok(());
    }

    writeln!(out, "Sources:\n")?;
    for (idx, source) in url_sources.enumerate() {
        writeln!(out, "{}. {}", idx + 1, source.url)?;
        if let Some(title) = &source.title {
            writeln!(out, "   Title: {title}")?;
        }
    }
    Ok(())
}

/// Runs one web-search-backed query and prints the answer with its sources.
///
/// Failures from the service are reported on `err` and then returned, so the
/// caller decides the exit status.
pub async fn perform_web_search<G>(
    gateway: &G,
    cfg: &Config,
    query: &str,
    out: &mut impl Write,
    err: &mut impl Write,
) -> Result<SearchResult, SearchError>
where
    G: WebSearchGateway + ?Sized,
{
    let request = SearchRequest::from_config(cfg, query)?;

    if let Err(io_err) = writeln!(out, "Searching with {}: {}\n", request.model, request.query) {
        return Err(report_failure(err, output_error(io_err)));
    }

    let result = match gateway.search(&request).await {
        Ok(result) => result,
        Err(search_err) => {
            debug!(model = %request.model, error = %search_err, "web search failed");
            return Err(report_failure(err, SearchError::request(&search_err)));
        }
    };
    debug!(
        model = %request.model,
        answer_len = result.answer.len(),
        source_count = result.sources.len(),
        "web search completed"
    );

    if let Err(io_err) = render(&result, out) {
        return Err(report_failure(err, output_error(io_err)));
    }
    Ok(result)
}

fn output_error(err: io::Error) -> SearchError {
    SearchError::request(&anyhow::Error::new(err).context("Failed to write search output"))
}

fn report_failure(err: &mut impl Write, failure: SearchError) -> SearchError {
    let _ = writeln!(err, "Error performing web search: {failure}");
    failure
}
