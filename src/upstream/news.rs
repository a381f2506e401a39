//! Immigration news aggregator client.

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use super::{UpstreamError, endpoint};
use crate::news::{NewsItem, NewsKind, state_name};

pub(crate) const SERVICE: &str = "news service";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewsQuery {
    pub kind: NewsKind,
    pub limit: usize,
}

#[async_trait]
pub trait NewsService: Send + Sync {
    async fn fetch(&self, query: &NewsQuery) -> Result<Vec<NewsItem>, UpstreamError>;
}

#[derive(Debug, Deserialize)]
struct NewsResponse {
    news: Option<Vec<NewsItem>>,
}

/// Talks to an aggregator exposing `GET /api/immigration-news?type=&limit=`
/// with a `{news: [...]}` body.
#[derive(Debug, Clone)]
pub struct NewsAggregatorClient {
    base: Url,
    http: reqwest::Client,
}

impl NewsAggregatorClient {
    pub fn new(base: Url, http: reqwest::Client) -> Self {
        Self { base, http }
    }
}

/// Fill in `state_name` from the state code when the aggregator omits it,
/// and cap the list at the requested size.
fn normalize(mut items: Vec<NewsItem>, limit: usize) -> Vec<NewsItem> {
    items.truncate(limit);
    for item in &mut items {
        if item.state_name.is_none() {
            item.state_name = item
                .state
                .as_deref()
                .and_then(state_name)
                .map(str::to_string);
        }
    }
    items
}

#[async_trait]
impl NewsService for NewsAggregatorClient {
    async fn fetch(&self, query: &NewsQuery) -> Result<Vec<NewsItem>, UpstreamError> {
        let mut url = endpoint(&self.base, "api/immigration-news")?;
        url.query_pairs_mut()
            .append_pair("type", query.kind.as_str())
            .append_pair("limit", &query.limit.to_string());

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| UpstreamError::transport(SERVICE, e))?;
        let status = response.status();
        if !status.is_success() {
            tracing::warn!(%status, kind = query.kind.as_str(), "news fetch failed");
            return Err(UpstreamError::Status {
                service: SERVICE,
                status: status.as_u16(),
            });
        }

        let body: NewsResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::transport(SERVICE, e))?;
        let items = body.news.ok_or(UpstreamError::MissingContent {
            service: SERVICE,
            field: "news",
        })?;
        Ok(normalize(items, query.limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_truncates_and_names_states() {
        let raw: Vec<NewsItem> = serde_json::from_value(serde_json::json!([
            {"id": "1", "title": "a", "link": "l", "published": "p", "state": "TX"},
            {"id": "2", "title": "b", "link": "l", "published": "p", "state": "CA", "state_name": "Calif."},
            {"id": "3", "title": "c", "link": "l", "published": "p"}
        ]))
        .expect("parse");

        let items = normalize(raw, 2);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].state_name.as_deref(), Some("Texas"));
        assert_eq!(items[1].state_name.as_deref(), Some("Calif."));
    }
}
