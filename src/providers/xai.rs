use anyhow::{Context, Result, anyhow};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tracing::debug;

use crate::config::Config;
use crate::providers::http_errors::xai_request_error;
use crate::search::{SearchRequest, SearchResult, SourceRef};

#[derive(Debug, Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    input: &'a str,
    tools: Vec<ToolDeclaration>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ToolDeclaration {
    WebSearch { enable_image_understanding: bool },
}

#[derive(Debug, Deserialize)]
struct ResponsesResponse {
    #[serde(default)]
    output: Vec<OutputItem>,
    #[serde(default)]
    citations: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OutputItem {
    Message {
        #[serde(default)]
        content: Vec<ContentPart>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    OutputText {
        #[serde(default)]
        text: String,
        #[serde(default)]
        annotations: Vec<Annotation>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Annotation {
    UrlCitation {
        url: String,
        #[serde(default)]
        title: Option<String>,
    },
    #[serde(other)]
    Other,
}

fn responses_url(base_url: &str) -> String {
    format!("{}/responses", base_url.trim_end_matches('/'))
}

fn build_request_body(request: &SearchRequest) -> ResponsesRequest<'_> {
    ResponsesRequest {
        model: &request.model,
        input: &request.query,
        tools: vec![ToolDeclaration::WebSearch {
            enable_image_understanding: request.web_search.enable_image_understanding,
        }],
    }
}

/// Collects the answer text and the cited URLs, first citation of a URL wins.
fn into_search_result(response: ResponsesResponse) -> SearchResult {
    let mut answer = String::new();
    let mut sources = Vec::new();
    let mut seen = HashSet::new();

    for item in response.output {
        let OutputItem::Message { content } = item else {
            continue;
        };
        for part in content {
            let ContentPart::OutputText { text, annotations } = part else {
                continue;
            };
            answer.push_str(&text);
            for annotation in annotations {
                if let Annotation::UrlCitation { url, title } = annotation
                    && seen.insert(url.clone())
                {
                    let title = title.filter(|title| !title.trim().is_empty());
                    sources.push(SourceRef::url(url, title));
                }
            }
        }
    }

    if sources.is_empty() {
        for url in response.citations {
            if seen.insert(url.clone()) {
                sources.push(SourceRef::url(url, None));
            }
        }
    }

    SearchResult { answer, sources }
}

pub async fn search(
    client: &Client,
    cfg: &Config,
    request: &SearchRequest,
) -> Result<SearchResult> {
    let api_url = responses_url(&cfg.base_url);
    let body = build_request_body(request);
    debug!(
        api_url = %api_url,
        model = %request.model,
        query_len = request.query.len(),
        "sending xai responses request"
    );

    let mut builder = client
        .post(&api_url)
        .bearer_auth(&request.api_key)
        .json(&body);
    if let Some(secs) = cfg.timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }

    let response = builder.send().await.map_err(|err| {
        debug!(
            api_url = %api_url,
            model = %request.model,
            error = %err,
            "xai request failed"
        );
        xai_request_error(err, &api_url, cfg.timeout_secs)
    })?;

    if !response.status().is_success() {
        let status = response.status();
        let response_body = response
            .text()
            .await
            .unwrap_or_else(|_| "<failed to read response body>".to_string());
        debug!(
            api_url = %api_url,
            model = %request.model,
            status = %status,
            response_body_len = response_body.len(),
            "xai returned non-success status"
        );
        return Err(anyhow!(
            "xAI request failed with status {}: {}",
            status,
            response_body
        ));
    }

    let parsed: ResponsesResponse = response
        .json()
        .await
        .context("Failed to parse xAI responses payload")?;
    let result = into_search_result(parsed);
    debug!(
        model = %request.model,
        answer_len = result.answer.len(),
        source_count = result.sources.len(),
        "received xai responses payload"
    );
    Ok(result)
}
