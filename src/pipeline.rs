//! One run of the report: fetch, score each article in turn, render, write.
//!
//! Stages run strictly one after another and articles are scored one at a
//! time. Failure policy:
//!
//! | Condition | Outcome |
//! |-----------|---------|
//! | output directory not writable | abort before any request |
//! | search API fails after retries | abort, no report written |
//! | no articles found | report with average 0.0 and a "no articles" note |
//! | completion has no usable number | fallback score, run continues |
//! | completion API fails after retries | article skipped; run aborts with `strict` |
//! | report cannot be rendered or written | abort |

use crate::analyzer::{Analyzer, CompletionRequest};
use crate::api::AskAsync;
use crate::config::Configuration;
use crate::error::PipelineError;
use crate::models::ScoredArticle;
use crate::report::{Reporter, WrittenReport};
use crate::search::{SearchQuery, SearchResponse, fetch};
use crate::utils::{ensure_writable_dir, truncate_for_log};
use futures::stream::{self, StreamExt};
use std::pin::pin;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

/// Counters and output paths of a finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub fetched: usize,
    pub scored: usize,
    pub skipped: usize,
    pub fallbacks: usize,
    pub average_score: f64,
    pub written: WrittenReport,
}

/// Execute the whole pipeline against the given API clients.
#[instrument(level = "info", skip_all, fields(q = %config.search.query))]
pub async fn run<S, C>(
    config: &Configuration,
    search: &S,
    completion: &C,
) -> Result<RunSummary, PipelineError>
where
    S: AskAsync<Request = SearchQuery, Response = SearchResponse>,
    C: AskAsync<Request = CompletionRequest, Response = String>,
{
    let start_time = Instant::now();

    // Anything that can fail locally is checked before the first request.
    ensure_writable_dir(&config.report.output_dir).await?;
    let reporter = Reporter::new(&config.report).await?;

    // ---- Fetch ----
    let articles = fetch(search, &SearchQuery::from(&config.search), config.retry).await?;
    let fetched = articles.len();
    if fetched == 0 {
        warn!("No articles found; the report will say so");
    }

    // ---- Score, one article at a time ----
    let analyzer = Analyzer::new(
        completion,
        &config.completion,
        &config.search.language,
        config.retry,
    );
    let analyzer = &analyzer;
    let mut outcomes = pin!(stream::iter(articles.into_iter().enumerate()).then(
        move |(index, article)| async move {
            let outcome = analyzer.analyze(&article).await;
            (index, article, outcome)
        }
    ));

    let mut scored = Vec::with_capacity(fetched);
    let mut skipped = 0usize;
    let mut fallbacks = 0usize;

    while let Some((index, article, outcome)) = outcomes.next().await {
        match outcome {
            Ok(analysis) => {
                if analysis.used_fallback {
                    fallbacks += 1;
                    warn!(
                        index,
                        fallback = analysis.score,
                        completion = %truncate_for_log(&analysis.raw, 120),
                        "Completion had no usable score; using fallback"
                    );
                }
                info!(index, score = analysis.score, "Scored article");
                scored.push(ScoredArticle {
                    article,
                    positivity_score: analysis.score,
                    used_fallback: analysis.used_fallback,
                });
            }
            Err(e) if config.strict => {
                error!(index, error = %e, "Scoring failed; aborting (strict)");
                return Err(e.into());
            }
            Err(e) => {
                skipped += 1;
                error!(index, error = %e, "Scoring failed; skipping article");
            }
        }
    }

    // ---- Render and write ----
    let report = reporter.generate(scored)?;
    let written = reporter.write(&report).await?;

    let summary = RunSummary {
        fetched,
        scored: report.articles.len(),
        skipped,
        fallbacks,
        average_score: report.average_score,
        written,
    };

    let elapsed = start_time.elapsed();
    info!(
        fetched = summary.fetched,
        scored = summary.scored,
        skipped = summary.skipped,
        fallbacks = summary.fallbacks,
        average = summary.average_score,
        path = %summary.written.html.display(),
        ?elapsed,
        "Run complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::tests::FakeCompletion;
    use crate::config::Settings;
    use crate::config::tests::cli;
    use crate::error::ApiError;
    use crate::search::tests::FakeSearch;
    use std::path::Path;
    use std::time::Duration as StdDuration;

    fn config(output_dir: &Path, extra: &[&str]) -> Configuration {
        let mut args = vec!["-q", "\"S-OIL\"", "-l", "ko", "-n", "2", "-o"];
        let dir = output_dir.to_str().unwrap();
        args.push(dir);
        args.extend_from_slice(extra);

        let mut config = Configuration::from_parts(&cli(&args), Settings::default()).unwrap();
        config.retry.base_delay = StdDuration::ZERO;
        config.retry.max_delay = StdDuration::ZERO;
        config.retry.max_jitter = StdDuration::ZERO;
        config
    }

    fn files_in(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    const TWO_ARTICLES: &str = r#"{
        "status": "ok",
        "articles": [
            {
                "title": "S-OIL wins sustainability award",
                "summary": "The refiner was praised for its emissions cuts.",
                "clean_url": "yna.co.kr",
                "published_date": "2026-10-17 08:00:00",
                "link": "https://www.yna.co.kr/view/1"
            },
            {
                "title": "S-OIL shares flat amid margin worries",
                "summary": "Analysts are cautious on refining margins.",
                "clean_url": "hankyung.com",
                "published_date": "2026-10-17 10:30:00",
                "link": "https://www.hankyung.com/article/2"
            }
        ]
    }"#;

    #[tokio::test]
    async fn test_two_articles_average_and_tiers() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config(tmp.path(), &[]);
        let search = FakeSearch::ok(TWO_ARTICLES);
        let completion = FakeCompletion::new(&[Some("9"), Some("5")]);

        let summary = run(&config, &search, &completion).await.unwrap();

        assert_eq!(search.seen.borrow()[0].page_size, 2);
        assert_eq!(search.seen.borrow()[0].language, "ko");
        assert_eq!(summary.fetched, 2);
        assert_eq!(summary.scored, 2);
        assert_eq!(summary.average_score, 7.0);

        let html = std::fs::read_to_string(&summary.written.html).unwrap();
        assert!(html.contains("Average PI: 7.0"));
        assert_eq!(html.matches("<table class=\"article\">").count(), 2);
        assert!(html.contains(
            "data-tier=\"high\" style=\"background-color: #32CD32\"><strong>9</strong>"
        ));
        assert!(html.contains(
            "data-tier=\"low\" style=\"background-color: #FF4500\"><strong>5</strong>"
        ));
        assert!(html.contains("S-OIL wins sustainability award"));
        assert_eq!(files_in(tmp.path()).len(), 1);
    }

    #[tokio::test]
    async fn test_non_numeric_completion_uses_fallback() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config(tmp.path(), &[]);
        let search = FakeSearch::ok(TWO_ARTICLES);
        let completion =
            FakeCompletion::new(&[Some("Overall this reads as neutral coverage."), Some("8")]);

        let summary = run(&config, &search, &completion).await.unwrap();

        assert_eq!(summary.scored, 2);
        assert_eq!(summary.fallbacks, 1);
        assert_eq!(summary.average_score, 6.5);
        assert!(summary.written.html.exists());
    }

    #[tokio::test]
    async fn test_search_failure_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config(tmp.path(), &["--retries", "3"]);
        let search = FakeSearch::failing();
        let completion = FakeCompletion::new(&[]);

        let err = run(&config, &search, &completion).await.unwrap_err();

        match err {
            PipelineError::Fetch(e) => {
                assert_eq!(e.attempts, 3);
                assert!(matches!(e.source, ApiError::Status { .. }));
            }
            other => panic!("expected a fetch error, got {other:?}"),
        }
        assert_eq!(search.calls.get(), 3);
        assert_eq!(completion.calls.get(), 0);
        assert!(files_in(tmp.path()).is_empty());
    }

    #[tokio::test]
    async fn test_no_articles_still_reports() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config(tmp.path(), &[]);
        let search = FakeSearch::ok(r#"{"status": "No matches for your search."}"#);
        let completion = FakeCompletion::new(&[]);

        let summary = run(&config, &search, &completion).await.unwrap();

        assert_eq!(summary.fetched, 0);
        assert_eq!(summary.average_score, 0.0);
        let html = std::fs::read_to_string(&summary.written.html).unwrap();
        assert!(html.contains("No articles found."));
    }

    #[tokio::test]
    async fn test_unscorable_article_is_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config(tmp.path(), &["--retries", "2"]);
        let search = FakeSearch::ok(TWO_ARTICLES);
        let completion = FakeCompletion::new(&[None, None, Some("7")]);

        let summary = run(&config, &search, &completion).await.unwrap();

        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.scored, 1);
        assert_eq!(summary.average_score, 7.0);
        assert_eq!(completion.calls.get(), 3);
    }

    #[tokio::test]
    async fn test_strict_run_aborts_on_unscorable_article() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config(tmp.path(), &["--retries", "2", "--strict"]);
        let search = FakeSearch::ok(TWO_ARTICLES);
        let completion = FakeCompletion::new(&[None, None, Some("7")]);

        let err = run(&config, &search, &completion).await.unwrap_err();

        assert!(matches!(err, PipelineError::Analysis(_)));
        assert_eq!(completion.calls.get(), 2);
        assert!(files_in(tmp.path()).is_empty());
    }

    #[tokio::test]
    async fn test_json_copy_is_written_on_request() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config(tmp.path(), &["--json"]);
        let search = FakeSearch::ok(TWO_ARTICLES);
        let completion = FakeCompletion::new(&[Some("9"), Some("5")]);

        let summary = run(&config, &search, &completion).await.unwrap();

        let json_path = summary.written.json.unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(json_path).unwrap()).unwrap();
        assert_eq!(value["average_score"], 7.0);
        assert_eq!(value["articles"][0]["positivity_score"], 9);
        assert_eq!(files_in(tmp.path()).len(), 2);
    }
}
