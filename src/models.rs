//! Data models shared by the fetch, scoring, and reporting stages.
//!
//! - [`Article`]: one search hit, as returned by the news search API
//! - [`ScoredArticle`]: an article with its Positivity Index (PI)
//! - [`Report`]: the aggregated result of one run
//! - [`Tier`]: presentational bucket for a PI value

use chrono::{DateTime, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A news article as returned by the search API.
///
/// Only `title` and `summary` are required; the remaining fields are shown in
/// the report when present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    /// The article headline.
    pub title: String,
    /// Plain-text summary with markup removed.
    pub summary: String,
    /// Publishing outlet, usually its bare domain (e.g. `yna.co.kr`).
    pub source: String,
    /// Byline, if the API knows it.
    pub author: Option<String>,
    /// Publication time as reported by the API.
    pub published_at: Option<NaiveDateTime>,
    /// Link to the original article.
    pub url: String,
}

impl Article {
    /// Publication date as `YYYY-MM-DD`, or an empty string when unknown.
    pub fn published_date(&self) -> String {
        self.published_at
            .map(|ts| ts.date().to_string())
            .unwrap_or_default()
    }
}

/// An [`Article`] paired with its Positivity Index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredArticle {
    #[serde(flatten)]
    pub article: Article,
    /// PI in `0..=10`.
    pub positivity_score: u8,
    /// Whether `positivity_score` is the configured fallback rather than a
    /// value parsed from the completion.
    pub used_fallback: bool,
}

/// Result of one run. Built once by the reporter and never mutated after it
/// has been written.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub generated_at: DateTime<Local>,
    /// Arithmetic mean of all scores; `0.0` when there are no articles.
    pub average_score: f64,
    pub articles: Vec<ScoredArticle>,
    #[serde(skip)]
    pub html_body: String,
}

/// Presentational bucket derived from a PI value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    High,
    Medium,
    Low,
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::High => "high",
            Tier::Medium => "medium",
            Tier::Low => "low",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
