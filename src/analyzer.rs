//! Sentiment scoring through a hosted text-completion model.
//!
//! Each article is turned into a fixed prompt, sent as one completion request
//! with a bounded token budget, and the first integer in the answer becomes
//! its Positivity Index (PI). Answers without a usable number fall back to the
//! configured score; that is reported to the caller through
//! [`Analysis::used_fallback`] and is not an error. Only exhausted HTTP
//! retries produce an [`AnalysisError`].

use crate::api::{AskAsync, RetryAsk, RetryPolicy, read_json};
use crate::config::CompletionSettings;
use crate::error::{AnalysisError, ApiError};
use crate::models::Article;
use crate::utils::truncate_for_log;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

/// Highest valid PI.
pub const MAX_SCORE: u8 = 10;

static INTEGER_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-+]?[0-9]+").unwrap());

/// Extract the PI from a free-text completion.
///
/// Takes the first integer token in `text`; returns `None` if there is none
/// or if it lies outside `0..=10`.
///
/// ```ignore
/// assert_eq!(parse_score(" 8"), Some(8));
/// assert_eq!(parse_score("Score: 10/10"), Some(10));
/// assert_eq!(parse_score("42"), None);
/// assert_eq!(parse_score("positive"), None);
/// ```
pub fn parse_score(text: &str) -> Option<u8> {
    let token = INTEGER_TOKEN.find(text)?.as_str();
    let value: i64 = token.parse().ok()?;
    u8::try_from(value).ok().filter(|v| *v <= MAX_SCORE)
}

/// Build the sentiment prompt for one article.
pub fn build_prompt(company: &str, language: &str, article: &Article) -> String {
    format!(
        "Given the following title and summary of an article in {lang}: \
         Title: {title} Summary: {summary} \
         Could you gauge on a scale of 0-10 how positively it mentions {company}, \
         with 0 being terrible publicity for {company} such as accusing it of malpractice, \
         and 10 being good coverage of {company} such as applauding its initiatives, \
         regardless of whether {company} is mentioned in the summary or not. \
         Respond only with a single integer from 0 to 10 and nothing else.",
        lang = language_name(language),
        title = article.title,
        summary = article.summary,
    )
}

/// English name of a two-letter language code, for the prompt.
fn language_name(code: &str) -> String {
    let name = match code.to_ascii_lowercase().as_str() {
        "ko" => "Korean",
        "en" => "English",
        "ja" => "Japanese",
        "zh" => "Chinese",
        "de" => "German",
        "fr" => "French",
        "es" => "Spanish",
        "ar" => "Arabic",
        _ => return format!("the language with code \"{code}\""),
    };
    name.to_string()
}

/// Body of a `POST /v1/completions` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: String,
    pub max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    text: String,
}

/// HTTP client for an OpenAI-compatible completions endpoint.
pub struct CompletionClient {
    http: reqwest::Client,
    endpoint: Url,
    api_key: String,
}

impl CompletionClient {
    pub fn new(http: reqwest::Client, endpoint: Url, api_key: String) -> Self {
        Self {
            http,
            endpoint,
            api_key,
        }
    }
}

impl std::fmt::Debug for CompletionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionClient")
            .field("endpoint", &self.endpoint.as_str())
            .finish()
    }
}

impl AskAsync for CompletionClient {
    type Request = CompletionRequest;
    type Response = String;

    #[instrument(level = "info", skip_all, fields(model = %request.model))]
    async fn ask(&self, request: &CompletionRequest) -> Result<String, ApiError> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;
        let body: CompletionResponse = read_json(response).await?;
        let text = body
            .choices
            .into_iter()
            .next()
            .ok_or(ApiError::EmptyChoices)?
            .text;
        Ok(text.trim().to_string())
    }
}

/// Outcome of scoring one article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Analysis {
    /// PI in `0..=10`.
    pub score: u8,
    /// `score` is the fallback because `raw` held no usable number.
    pub used_fallback: bool,
    /// The completion text as received.
    pub raw: String,
}

/// Scores articles one at a time against a completion backend.
pub struct Analyzer<'a, C> {
    client: &'a C,
    settings: &'a CompletionSettings,
    language: &'a str,
    retry: RetryPolicy,
}

impl<'a, C> Analyzer<'a, C>
where
    C: AskAsync<Request = CompletionRequest, Response = String>,
{
    pub fn new(
        client: &'a C,
        settings: &'a CompletionSettings,
        language: &'a str,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            client,
            settings,
            language,
            retry,
        }
    }

    /// Score one article.
    #[instrument(level = "info", skip_all, fields(title = %truncate_for_log(&article.title, 80)))]
    pub async fn analyze(&self, article: &Article) -> Result<Analysis, AnalysisError> {
        let request = CompletionRequest {
            model: self.settings.model.clone(),
            prompt: build_prompt(&self.settings.company, self.language, article),
            max_tokens: self.settings.max_tokens,
        };

        let api = RetryAsk::new(self.client, self.retry);
        let raw = api.ask(&request).await.map_err(|source| AnalysisError {
            title: article.title.clone(),
            attempts: api.max_attempts(),
            source,
        })?;

        let analysis = match parse_score(&raw) {
            Some(score) => Analysis {
                score,
                used_fallback: false,
                raw,
            },
            None => Analysis {
                score: self.settings.fallback_score,
                used_fallback: true,
                raw,
            },
        };
        debug!(
            score = analysis.score,
            used_fallback = analysis.used_fallback,
            raw = %truncate_for_log(&analysis.raw, 120),
            "Scored article"
        );
        Ok(analysis)
    }
}
