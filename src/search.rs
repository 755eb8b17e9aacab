//! News search: one request to the NewsCatcher search API.
//!
//! The fetcher issues a single page-size bounded request (no pagination),
//! turns each usable hit into an [`Article`], and drops hits that lack a title
//! or summary. Transport and status failures are retried by [`RetryAsk`];
//! once the attempts are used up the caller gets a [`FetchError`] instead of
//! an empty list.

use crate::api::{AskAsync, RetryAsk, RetryPolicy, read_json};
use crate::config::SearchSettings;
use crate::error::{ApiError, FetchError};
use crate::models::Article;
use crate::utils::{collapse_whitespace, plain_text};
use chrono::{DateTime, NaiveDateTime};
use itertools::Itertools;
use serde::Deserialize;
use tracing::{debug, info, instrument};
use url::Url;

/// Parameters of one search request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub query: String,
    pub language: String,
    pub page_size: u32,
}

impl From<&SearchSettings> for SearchQuery {
    fn from(settings: &SearchSettings) -> Self {
        Self {
            query: settings.query.clone(),
            language: settings.language.clone(),
            page_size: settings.page_size,
        }
    }
}

/// Body of a search response. Only the fields the report uses are read.
#[derive(Debug, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub total_hits: Option<u64>,
    /// Absent when the query has no hits.
    #[serde(default)]
    pub articles: Vec<RawArticle>,
}

/// One hit as the API returns it; every field may be missing or null.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct RawArticle {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub author: Option<String>,
    pub clean_url: Option<String>,
    pub published_date: Option<String>,
    pub link: Option<String>,
}

impl RawArticle {
    /// Convert to an [`Article`], or `None` when title or summary is
    /// missing or blank.
    pub fn into_article(self) -> Option<Article> {
        let title = self
            .title
            .map(|t| collapse_whitespace(&t))
            .filter(|t| !t.is_empty())?;
        let summary = self
            .summary
            .map(|s| plain_text(&s))
            .filter(|s| !s.is_empty())?;
        let url = self.link.unwrap_or_default();
        let source = self
            .clean_url
            .filter(|s| !s.is_empty())
            .or_else(|| host_of(&url))
            .unwrap_or_default();

        Some(Article {
            title,
            summary,
            source,
            author: self.author.map(|a| collapse_whitespace(&a)).filter(|a| !a.is_empty()),
            published_at: self.published_date.as_deref().and_then(parse_published),
            url,
        })
    }
}

/// Accepts `YYYY-MM-DD HH:MM:SS` (NewsCatcher) and RFC 3339.
pub fn parse_published(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|d| d.naive_utc()))
}

fn host_of(link: &str) -> Option<String> {
    Url::parse(link)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
}

/// Turn a decoded response into articles: drop incomplete hits, collapse
/// duplicates by link, keep the API's order.
pub fn articles_from_response(response: SearchResponse) -> Vec<Article> {
    let received = response.articles.len();
    let articles: Vec<Article> = response
        .articles
        .into_iter()
        .filter_map(|raw| {
            let title = raw.title.clone();
            let article = raw.into_article();
            if article.is_none() {
                debug!(?title, "Dropping search hit without title or summary");
            }
            article
        })
        .unique_by(|a| if a.url.is_empty() { a.title.clone() } else { a.url.clone() })
        .collect();

    debug!(
        received,
        kept = articles.len(),
        status = ?response.status,
        total_hits = ?response.total_hits,
        "Parsed search response"
    );
    articles
}

/// HTTP client for the NewsCatcher `v2/search` endpoint.
pub struct NewsCatcherClient {
    http: reqwest::Client,
    endpoint: Url,
    api_key: String,
}

impl NewsCatcherClient {
    pub fn new(http: reqwest::Client, endpoint: Url, api_key: String) -> Self {
        Self {
            http,
            endpoint,
            api_key,
        }
    }
}

impl std::fmt::Debug for NewsCatcherClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewsCatcherClient")
            .field("endpoint", &self.endpoint.as_str())
            .finish()
    }
}

impl AskAsync for NewsCatcherClient {
    type Request = SearchQuery;
    type Response = SearchResponse;

    #[instrument(level = "info", skip_all, fields(q = %request.query, lang = %request.language))]
    async fn ask(&self, request: &SearchQuery) -> Result<SearchResponse, ApiError> {
        let page_size = request.page_size.to_string();
        let response = self
            .http
            .get(self.endpoint.clone())
            .header("x-api-key", &self.api_key)
            .query(&[
                ("q", request.query.as_str()),
                ("lang", request.language.as_str()),
                ("page_size", page_size.as_str()),
                ("page", "1"),
            ])
            .send()
            .await?;
        read_json(response).await
    }
}

/// Fetch one page of articles matching `query`.
#[instrument(level = "info", skip_all, fields(q = %query.query, lang = %query.language, page_size = query.page_size))]
pub async fn fetch<C>(client: &C, query: &SearchQuery, retry: RetryPolicy) -> Result<Vec<Article>, FetchError>
where
    C: AskAsync<Request = SearchQuery, Response = SearchResponse>,
{
    let api = RetryAsk::new(client, retry);
    let response = api.ask(query).await.map_err(|source| FetchError {
        attempts: api.max_attempts(),
        source,
    })?;

    let articles = articles_from_response(response);
    info!(count = articles.len(), "Fetched articles");
    Ok(articles)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::api::tests::no_wait;
    use std::cell::{Cell, RefCell};

    /// Serves a canned response, or fails every call with HTTP 500.
    pub(crate) struct FakeSearch {
        pub body: Option<&'static str>,
        pub calls: Cell<usize>,
        pub seen: RefCell<Vec<SearchQuery>>,
    }

    impl FakeSearch {
        pub(crate) fn ok(body: &'static str) -> Self {
            Self {
                body: Some(body),
                calls: Cell::new(0),
                seen: RefCell::new(Vec::new()),
            }
        }

        pub(crate) fn failing() -> Self {
            Self {
                body: None,
                calls: Cell::new(0),
                seen: RefCell::new(Vec::new()),
            }
        }
    }

    impl AskAsync for FakeSearch {
        type Request = SearchQuery;
        type Response = SearchResponse;

        async fn ask(&self, request: &SearchQuery) -> Result<SearchResponse, ApiError> {
            self.calls.set(self.calls.get() + 1);
            self.seen.borrow_mut().push(request.clone());
            match self.body {
                Some(body) => Ok(serde_json::from_str(body)?),
                None => Err(ApiError::Status {
                    status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                    body: "internal error".to_string(),
                }),
            }
        }
    }

    pub(crate) fn query(page_size: u32) -> SearchQuery {
        SearchQuery {
            query: "\"S-OIL\"".to_string(),
            language: "ko".to_string(),
            page_size,
        }
    }

    const RESPONSE: &str = r#"{
        "status": "ok",
        "total_hits": 4,
        "articles": [
            {
                "title": "S-OIL posts record quarterly profit",
                "author": "Kim Min-ji",
                "published_date": "2023-03-14 05:12:00",
                "link": "https://www.yna.co.kr/view/AKR1",
                "clean_url": "yna.co.kr",
                "summary": "S-OIL <b>beat</b> estimates\n on strong refining margins."
            },
            {
                "title": "No summary here",
                "link": "https://example.com/a",
                "summary": null
            },
            {
                "title": "",
                "summary": "A summary without a headline",
                "link": "https://example.com/b"
            },
            {
                "title": "S-OIL posts record quarterly profit",
                "summary": "Syndicated copy",
                "link": "https://www.yna.co.kr/view/AKR1"
            },
            {
                "title": "Shaheen project on schedule",
                "summary": "Construction continues.",
                "published_date": "2023-03-13T09:00:00Z",
                "link": "https://www.hankyung.com/article/2"
            }
        ]
    }"#;

    #[test]
    fn test_articles_from_response() {
        let response: SearchResponse = serde_json::from_str(RESPONSE).unwrap();
        let articles = articles_from_response(response);

        assert_eq!(articles.len(), 2);

        let first = &articles[0];
        assert_eq!(first.title, "S-OIL posts record quarterly profit");
        assert_eq!(first.summary, "S-OIL beat estimates on strong refining margins.");
        assert_eq!(first.source, "yna.co.kr");
        assert_eq!(first.author.as_deref(), Some("Kim Min-ji"));
        assert_eq!(first.published_date(), "2023-03-14");

        let second = &articles[1];
        assert_eq!(second.source, "hankyung.com");
        assert_eq!(second.author, None);
        assert_eq!(second.published_date(), "2023-03-13");
    }

    #[test]
    fn test_response_without_articles() {
        let response: SearchResponse =
            serde_json::from_str(r#"{"status": "No matches for your search."}"#).unwrap();
        assert!(articles_from_response(response).is_empty());
    }

    #[test]
    fn test_parse_published() {
        assert!(parse_published("2023-03-14 05:12:00").is_some());
        assert!(parse_published("2023-03-14T05:12:00+09:00").is_some());
        assert!(parse_published("yesterday").is_none());
    }

    #[tokio::test]
    async fn test_fetch_sends_query_parameters() {
        let search = FakeSearch::ok(RESPONSE);
        let articles = fetch(&search, &query(2), no_wait(3)).await.unwrap();

        assert_eq!(articles.len(), 2);
        assert_eq!(search.calls.get(), 1);
        assert_eq!(search.seen.borrow()[0], query(2));
    }

    #[tokio::test]
    async fn test_fetch_surfaces_error_after_retries() {
        let search = FakeSearch::failing();
        let err = fetch(&search, &query(2), no_wait(3)).await.unwrap_err();

        assert_eq!(search.calls.get(), 3);
        assert_eq!(err.attempts, 3);
        assert!(matches!(err.source, ApiError::Status { .. }));
    }
}
