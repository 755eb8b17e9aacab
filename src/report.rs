//! Aggregation of scored articles into a [`Report`], and writing it to disk.
//!
//! The average PI is the arithmetic mean of all scores. With no articles it
//! is defined as `0.0` and the report says that no articles were found.

use crate::config::ReportSettings;
use crate::error::ReportError;
use crate::models::{Report, ScoredArticle};
use crate::outputs::files::{dated_stem, free_stem, write_new};
use crate::outputs::html::{DEFAULT_TEMPLATE, RenderContext, load_template, render};
use crate::outputs::json::write_report_json;
use chrono::{DateTime, Local};
use std::path::PathBuf;
use tokio::fs;
use tracing::{info, instrument, warn};

/// Mean of `scores`, or `0.0` for an empty slice.
pub fn average_score(scores: &[u8]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    let sum: u64 = scores.iter().map(|&s| u64::from(s)).sum();
    sum as f64 / scores.len() as f64
}

/// Paths produced by [`Reporter::write`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenReport {
    pub html: PathBuf,
    pub json: Option<PathBuf>,
}

/// Builds and writes the report for one run.
#[derive(Debug)]
pub struct Reporter<'a> {
    settings: &'a ReportSettings,
    template: String,
}

impl<'a> Reporter<'a> {
    /// Prepare a reporter, loading the template override if one is set.
    pub async fn new(settings: &'a ReportSettings) -> Result<Self, ReportError> {
        let template = match &settings.template {
            Some(path) => load_template(path).await?,
            None => DEFAULT_TEMPLATE.to_string(),
        };
        Ok(Self { settings, template })
    }

    /// Build the report as of now.
    pub fn generate(&self, articles: Vec<ScoredArticle>) -> Result<Report, ReportError> {
        self.generate_at(articles, Local::now())
    }

    /// Build the report with an explicit generation time.
    pub fn generate_at(
        &self,
        articles: Vec<ScoredArticle>,
        generated_at: DateTime<Local>,
    ) -> Result<Report, ReportError> {
        let scores: Vec<u8> = articles.iter().map(|a| a.positivity_score).collect();
        let average = average_score(&scores);
        let stamp = generated_at.format("%Y-%m-%d %H:%M:%S %Z").to_string();

        let html_body = render(
            &self.template,
            &RenderContext {
                title: &self.settings.title,
                company: &self.settings.company,
                generated_at: &stamp,
                average,
                articles: &articles,
                thresholds: &self.settings.thresholds,
                colors: &self.settings.colors,
            },
        )?;

        Ok(Report {
            generated_at,
            average_score: average,
            articles,
            html_body,
        })
    }

    /// Write the report (and its JSON copy, if enabled) into the output
    /// directory under a date-based name.
    #[instrument(level = "info", skip_all, fields(dir = %self.settings.output_dir.display()))]
    pub async fn write(&self, report: &Report) -> Result<WrittenReport, ReportError> {
        let extensions: &[&str] = if self.settings.write_json {
            &["html", "json"]
        } else {
            &["html"]
        };
        let dir = &self.settings.output_dir;
        let stem = dated_stem(&self.settings.file_prefix, report.generated_at.date_naive());
        let stem = free_stem(dir, &stem, extensions).await?;

        let html = dir.join(format!("{stem}.html"));
        write_new(&html, report.html_body.as_bytes()).await?;

        let json = if self.settings.write_json {
            match write_report_json(report, &html).await {
                Ok(path) => Some(path),
                Err(e) => {
                    // An HTML file without its JSON copy is not a finished report.
                    if let Err(remove) = fs::remove_file(&html).await {
                        warn!(path = %html.display(), error = %remove, "Could not remove partial report");
                    }
                    return Err(e);
                }
            }
        } else {
            None
        };

        info!(html = %html.display(), json = ?json, "Report written");
        Ok(WrittenReport { html, json })
    }
}
