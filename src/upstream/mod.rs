//! Clients for the third-party services the portal fronts.
//!
//! Each service sits behind an async trait so the assistant and the HTTP
//! proxies can be driven by fakes in tests. The reqwest implementations are
//! thin: they shape the request, check the status, and validate the payload.

pub mod chat;
pub mod documents;
pub mod news;
pub mod prompt;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

pub use chat::{ChatCompletionsClient, ChatRequest, ChatRole, ChatService, ChatTurn};
pub use documents::{
    DocumentFormat, DocumentQuestion, DocumentService, GenerateRequest, GeneratedPayload,
    IaMigranteClient,
};
pub use news::{NewsAggregatorClient, NewsQuery, NewsService};

use crate::config::UpstreamConfig;
use crate::news::NewsItem;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("{service} request failed: {reason}")]
    Transport {
        service: &'static str,
        reason: String,
    },

    #[error("{service} answered with HTTP {status}")]
    Status { service: &'static str, status: u16 },

    #[error("{service} returned an empty payload")]
    EmptyPayload { service: &'static str },

    #[error("{service} response is missing {field}")]
    MissingContent {
        service: &'static str,
        field: &'static str,
    },

    #[error("{service} response could not be decoded: {reason}")]
    Decode {
        service: &'static str,
        reason: String,
    },

    #[error("{service} is not configured")]
    NotConfigured { service: &'static str },

    #[error("{service} request limit reached, try again shortly")]
    RateLimited { service: &'static str },
}

impl UpstreamError {
    pub(crate) fn transport(service: &'static str, err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode {
                service,
                reason: err.to_string(),
            }
        } else {
            Self::Transport {
                service,
                reason: err.to_string(),
            }
        }
    }
}

pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client, UpstreamError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("nolivos/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| UpstreamError::Transport {
            service: "http client",
            reason: e.to_string(),
        })
}

/// Resolve `path` under `base`, keeping any path prefix `base` carries.
pub(crate) fn endpoint(base: &Url, path: &str) -> Result<Url, UpstreamError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }
    base.join(path.trim_start_matches('/'))
        .map_err(|e| UpstreamError::Transport {
            service: "url",
            reason: e.to_string(),
        })
}

/// The three services, as trait objects.
#[derive(Clone)]
pub struct Upstream {
    pub documents: Arc<dyn DocumentService>,
    pub chat: Arc<dyn ChatService>,
    pub news: Arc<dyn NewsService>,
}

impl Upstream {
    /// Build reqwest clients for every configured service. Services without
    /// a URL answer `NotConfigured`.
    pub fn from_config(config: &UpstreamConfig, firm_name: &str) -> Result<Self, UpstreamError> {
        let http = http_client(config.timeout)?;

        let documents: Arc<dyn DocumentService> = match &config.documents_url {
            Some(url) => Arc::new(IaMigranteClient::new(url.clone(), http.clone())),
            None => Arc::new(Unconfigured),
        };
        let chat: Arc<dyn ChatService> = match &config.chat_url {
            Some(url) => Arc::new(ChatCompletionsClient::new(
                url.clone(),
                config.chat_model.clone(),
                config.chat_api_key.clone(),
                firm_name.to_string(),
                http.clone(),
            )),
            None => Arc::new(Unconfigured),
        };
        let news: Arc<dyn NewsService> = match &config.news_url {
            Some(url) => Arc::new(NewsAggregatorClient::new(url.clone(), http)),
            None => Arc::new(Unconfigured),
        };

        Ok(Self {
            documents,
            chat,
            news,
        })
    }
}

/// Stand-in for a service with no configured URL.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unconfigured;

#[async_trait]
impl DocumentService for Unconfigured {
    async fn questions(&self, _document_type: &str) -> Result<Vec<DocumentQuestion>, UpstreamError> {
        Err(UpstreamError::NotConfigured {
            service: documents::SERVICE,
        })
    }

    async fn generate(&self, _request: &GenerateRequest) -> Result<GeneratedPayload, UpstreamError> {
        Err(UpstreamError::NotConfigured {
            service: documents::SERVICE,
        })
    }
}

#[async_trait]
impl ChatService for Unconfigured {
    async fn complete(&self, _request: &ChatRequest) -> Result<String, UpstreamError> {
        Err(UpstreamError::NotConfigured {
            service: chat::SERVICE,
        })
    }
}

#[async_trait]
impl NewsService for Unconfigured {
    async fn fetch(&self, _query: &NewsQuery) -> Result<Vec<NewsItem>, UpstreamError> {
        Err(UpstreamError::NotConfigured {
            service: news::SERVICE,
        })
    }
}
