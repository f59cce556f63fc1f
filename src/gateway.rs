use anyhow::Result;
use reqwest::Client;
use std::future::Future;
use std::pin::Pin;

use crate::config::Config;
use crate::providers;
use crate::search::{SearchRequest, SearchResult};

pub type WebSearchFuture<'a> = Pin<Box<dyn Future<Output = Result<SearchResult>> + 'a>>;

/// Answers a prompt with the hosted model's web search tool enabled.
pub trait WebSearchGateway {
    fn search<'a>(&'a self, request: &'a SearchRequest) -> WebSearchFuture<'a>;
}

trait SearchBackend {
    fn search<'a>(
        &'a self,
        client: &'a Client,
        cfg: &'a Config,
        request: &'a SearchRequest,
    ) -> WebSearchFuture<'a>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct XaiBackend;

impl SearchBackend for XaiBackend {
    fn search<'a>(
        &'a self,
        client: &'a Client,
        cfg: &'a Config,
        request: &'a SearchRequest,
    ) -> WebSearchFuture<'a> {
        Box::pin(async move { providers::xai::search(client, cfg, request).await })
    }
}

pub struct HostSearchGateway<'a, B = XaiBackend> {
    client: &'a Client,
    cfg: &'a Config,
    backend: B,
}

impl<'a> HostSearchGateway<'a, XaiBackend> {
    pub fn new(client: &'a Client, cfg: &'a Config) -> Self {
        Self {
            client,
            cfg,
            backend: XaiBackend,
        }
    }
}

#[cfg(test)]
impl<'a, B> HostSearchGateway<'a, B> {
    fn with_backend(client: &'a Client, cfg: &'a Config, backend: B) -> Self {
        Self {
            client,
            cfg,
            backend,
        }
    }
}

impl<'a, B> WebSearchGateway for HostSearchGateway<'a, B>
where
    B: SearchBackend,
{
    fn search<'b>(&'b self, request: &'b SearchRequest) -> WebSearchFuture<'b> {
        self.backend.search(self.client, self.cfg, request)
    }
}
