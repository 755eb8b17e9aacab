//! HTML rendering of a report.
//!
//! Rendering is plain placeholder substitution into a static template. The
//! built-in template is compiled into the binary; a replacement can be loaded
//! from disk. All article text is escaped before it is inserted, and
//! `{{rows}}` is substituted last so nothing inside an article can be
//! mistaken for a placeholder.
//!
//! # Placeholders
//!
//! | Placeholder | Value |
//! |-------------|-------|
//! | `{{title}}` | report heading |
//! | `{{company}}` | company the coverage is about |
//! | `{{generated_at}}` | generation timestamp |
//! | `{{average}}` | average PI, one decimal |
//! | `{{average_color}}` / `{{average_tier}}` | tier of the average |
//! | `{{article_count}}` | number of scored articles |
//! | `{{rows}}` | one block per article (required) |

use crate::config::{Thresholds, TierColors};
use crate::error::ReportError;
use crate::models::{ScoredArticle, Tier};
use crate::utils::escape_html;
use std::fmt::Write;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Template shipped with the binary.
pub const DEFAULT_TEMPLATE: &str = include_str!("../../templates/report.html");

const REQUIRED: [&str; 2] = ["{{rows}}", "{{average}}"];

/// Load a template override, checking that it can hold a report.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn load_template(path: &Path) -> Result<String, ReportError> {
    let template = fs::read_to_string(path)
        .await
        .map_err(|source| ReportError::Template {
            path: path.to_path_buf(),
            source,
        })?;
    check_template(&template)?;
    info!(bytes = template.len(), "Loaded report template");
    Ok(template)
}

/// Fail if a required placeholder is missing.
pub fn check_template(template: &str) -> Result<(), ReportError> {
    match REQUIRED.into_iter().find(|p| !template.contains(p)) {
        Some(missing) => Err(ReportError::Placeholder(missing)),
        None => Ok(()),
    }
}

/// Round to one decimal place, the precision the report displays.
pub fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Map a PI (or an average of PIs) to its tier.
pub fn tier_for(score: f64, thresholds: &Thresholds) -> Tier {
    if score >= thresholds.high {
        Tier::High
    } else if score >= thresholds.medium {
        Tier::Medium
    } else {
        Tier::Low
    }
}

pub fn color_for(tier: Tier, colors: &TierColors) -> &str {
    match tier {
        Tier::High => &colors.high,
        Tier::Medium => &colors.medium,
        Tier::Low => &colors.low,
    }
}

/// Everything the template needs besides its own text.
#[derive(Debug)]
pub struct RenderContext<'a> {
    pub title: &'a str,
    pub company: &'a str,
    pub generated_at: &'a str,
    pub average: f64,
    pub articles: &'a [ScoredArticle],
    pub thresholds: &'a Thresholds,
    pub colors: &'a TierColors,
}

/// Substitute the context into `template`.
///
/// Deterministic: the same context always yields the same bytes.
pub fn render(template: &str, ctx: &RenderContext<'_>) -> Result<String, ReportError> {
    check_template(template)?;

    // The header is colored by the value it shows.
    let shown_average = round_to_tenth(ctx.average);
    let average_tier = tier_for(shown_average, ctx.thresholds);
    let rows = render_rows(ctx);

    let html = template
        .replace("{{title}}", &escape_html(ctx.title))
        .replace("{{company}}", &escape_html(ctx.company))
        .replace("{{generated_at}}", &escape_html(ctx.generated_at))
        .replace("{{average}}", &format!("{shown_average:.1}"))
        .replace("{{average_tier}}", average_tier.as_str())
        .replace(
            "{{average_color}}",
            &escape_html(color_for(average_tier, ctx.colors)),
        )
        .replace("{{article_count}}", &ctx.articles.len().to_string())
        .replace("{{rows}}", &rows);
    Ok(html)
}

fn render_rows(ctx: &RenderContext<'_>) -> String {
    if ctx.articles.is_empty() {
        return "<p class=\"empty\">No articles found.</p>\n".to_string();
    }

    let mut out = String::new();
    for (i, scored) in ctx.articles.iter().enumerate() {
        let article = &scored.article;
        let tier = tier_for(f64::from(scored.positivity_score), ctx.thresholds);

        write!(
            out,
            "<p class=\"article-number\">{n}.</p>\n\
             <table class=\"article\">\n\
             \x20 <tr><th>Title</th><td colspan=\"3\">{title}</td><th>PI</th>\
             <td class=\"pi\" data-tier=\"{tier}\" style=\"background-color: {color}\"><strong>{score}</strong></td></tr>\n\
             \x20 <tr><th>Author</th><td>{author}</td><th>Agency</th><td>{agency}</td><th>Date</th><td>{date}</td></tr>\n\
             \x20 <tr><th>Summary</th><td colspan=\"5\">{summary}</td></tr>\n\
             \x20 <tr><th>URL</th><td colspan=\"5\">{link}</td></tr>\n\
             </table>\n",
            n = i + 1,
            title = escape_html(&article.title),
            tier = tier,
            color = escape_html(color_for(tier, ctx.colors)),
            score = scored.positivity_score,
            author = escape_html(article.author.as_deref().unwrap_or("")),
            agency = escape_html(&article.source),
            date = article.published_date(),
            summary = escape_html(&article.summary),
            link = render_link(&article.url),
        )
        .expect("writing to a String cannot fail");
    }
    out
}

/// Only http(s) links become anchors; anything else is shown as text.
fn render_link(url: &str) -> String {
    let escaped = escape_html(url);
    if url.starts_with("https://") || url.starts_with("http://") {
        format!("<a href=\"{escaped}\">{escaped}</a>")
    } else {
        escaped
    }
}
