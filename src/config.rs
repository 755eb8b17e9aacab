//! Run configuration.
//!
//! A [`Configuration`] is assembled once at start-up from three layers, in
//! order of precedence:
//!
//! 1. command-line flags and their environment variables ([`Cli`])
//! 2. an optional YAML settings file ([`Settings`])
//! 3. built-in defaults
//!
//! API keys come from the environment (or a `.env` file) and otherwise from
//! plain-text key files in the config directory. A key missing from both is a
//! [`ConfigError`], raised before any network call. The resulting value is
//! passed by reference to every stage; nothing reads configuration globally.

use crate::api::RetryPolicy;
use crate::cli::Cli;
use crate::error::ConfigError;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;
use tracing::{debug, info, instrument};
use url::Url;

pub const NEWS_API_URL: &str = "https://api.newscatcherapi.com/v2/search";
pub const COMPLETION_API_URL: &str = "https://api.openai.com/v1/completions";

const NEWSCATCHER_KEY_VAR: &str = "NEWSCATCHER_API_KEY";
const NEWSCATCHER_KEY_FILE: &str = "newscatcher_API_apiKey.txt";
const OPENAI_KEY_VAR: &str = "OPENAI_API_KEY";
const OPENAI_KEY_FILE: &str = "openai_apiKey.txt";

/// Largest page the search API serves in one request.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Parameters of the single search request.
#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub endpoint: Url,
    pub query: String,
    pub language: String,
    pub page_size: u32,
}

/// Parameters of each completion request and of the sentiment prompt.
#[derive(Debug, Clone)]
pub struct CompletionSettings {
    pub endpoint: Url,
    pub model: String,
    pub max_tokens: u32,
    /// Company whose coverage is being scored.
    pub company: String,
    /// PI used when a completion has no usable number.
    pub fallback_score: u8,
}

/// Lower bounds of the presentational tiers.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Thresholds {
    pub high: f64,
    pub medium: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            high: 8.0,
            medium: 6.0,
        }
    }
}

/// Background colors of the presentational tiers.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TierColors {
    pub high: String,
    pub medium: String,
    pub low: String,
}

impl Default for TierColors {
    fn default() -> Self {
        Self {
            high: "#32CD32".to_string(),
            medium: "#FFA500".to_string(),
            low: "#FF4500".to_string(),
        }
    }
}

/// How the report is rendered and where it goes.
#[derive(Debug, Clone)]
pub struct ReportSettings {
    pub output_dir: PathBuf,
    /// Leading part of the report file name, e.g. `S_OIL_PSR`.
    pub file_prefix: String,
    /// Heading shown at the top of the report.
    pub title: String,
    pub company: String,
    pub template: Option<PathBuf>,
    pub thresholds: Thresholds,
    pub colors: TierColors,
    pub write_json: bool,
}

/// Everything a run needs, read-only after [`Configuration::load`].
#[derive(Clone)]
pub struct Configuration {
    pub newscatcher_api_key: String,
    pub openai_api_key: String,
    pub search: SearchSettings,
    pub completion: CompletionSettings,
    pub report: ReportSettings,
    pub retry: RetryPolicy,
    pub timeout: StdDuration,
    /// Abort on the first article that cannot be scored instead of skipping it.
    pub strict: bool,
}

impl std::fmt::Debug for Configuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Configuration")
            .field("newscatcher_api_key", &"<redacted>")
            .field("openai_api_key", &"<redacted>")
            .field("search", &self.search)
            .field("completion", &self.completion)
            .field("report", &self.report)
            .field("retry", &self.retry)
            .field("timeout", &self.timeout)
            .field("strict", &self.strict)
            .finish()
    }
}

/// Optional YAML settings file. Every field may be omitted.
///
/// ```yaml
/// query: '"S-OIL"'
/// language: ko
/// page_size: 25
/// company: S-OIL
/// model: gpt-3.5-turbo-instruct
/// thresholds: { high: 8, medium: 6 }
/// retry: { max_attempts: 4, base_delay_ms: 500 }
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub query: Option<String>,
    pub language: Option<String>,
    pub page_size: Option<u32>,
    pub company: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub fallback_score: Option<u8>,
    pub news_api_url: Option<String>,
    pub completion_api_url: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub config_dir: Option<PathBuf>,
    pub file_prefix: Option<String>,
    pub title: Option<String>,
    pub template: Option<PathBuf>,
    pub thresholds: Option<Thresholds>,
    pub colors: Option<TierColors>,
    pub write_json: Option<bool>,
    pub strict: Option<bool>,
    pub timeout_secs: Option<u64>,
    pub retry: RetrySettings,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySettings {
    pub max_attempts: Option<usize>,
    pub base_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    pub max_jitter_ms: Option<u64>,
}

impl Settings {
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = serde_yaml::from_str(&raw).map_err(|source| ConfigError::Settings {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Loaded settings file");
        Ok(settings)
    }
}

impl Configuration {
    /// Build the configuration from CLI flags and the settings file they name.
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let settings = match &cli.settings {
            Some(path) => Settings::from_file(path)?,
            None => Settings::default(),
        };
        Self::from_parts(cli, settings)
    }

    /// Merge already-parsed layers. Split out from [`Configuration::load`] so
    /// precedence can be tested without touching the file system.
    pub fn from_parts(cli: &Cli, settings: Settings) -> Result<Self, ConfigError> {
        let config_dir = cli
            .config_dir
            .clone()
            .or(settings.config_dir)
            .unwrap_or_else(|| PathBuf::from("config"));

        let newscatcher_api_key = resolve_api_key(
            cli.newscatcher_api_key.as_deref(),
            NEWSCATCHER_KEY_VAR,
            &config_dir.join(NEWSCATCHER_KEY_FILE),
        )?;
        let openai_api_key = resolve_api_key(
            cli.openai_api_key.as_deref(),
            OPENAI_KEY_VAR,
            &config_dir.join(OPENAI_KEY_FILE),
        )?;

        let company = cli
            .company
            .clone()
            .or(settings.company)
            .unwrap_or_else(|| "S-OIL".to_string());

        let search = SearchSettings {
            endpoint: parse_endpoint(settings.news_api_url.as_deref().unwrap_or(NEWS_API_URL))?,
            query: cli
                .query
                .clone()
                .or(settings.query)
                .unwrap_or_else(|| format!("\"{company}\"")),
            language: cli
                .language
                .clone()
                .or(settings.language)
                .unwrap_or_else(|| "ko".to_string())
                .to_ascii_lowercase(),
            page_size: cli.page_size.or(settings.page_size).unwrap_or(25),
        };

        let completion = CompletionSettings {
            endpoint: parse_endpoint(
                settings
                    .completion_api_url
                    .as_deref()
                    .unwrap_or(COMPLETION_API_URL),
            )?,
            model: cli
                .model
                .clone()
                .or(settings.model)
                .unwrap_or_else(|| "text-davinci-003".to_string()),
            max_tokens: cli.max_tokens.or(settings.max_tokens).unwrap_or(50),
            company: company.clone(),
            fallback_score: cli.fallback_score.or(settings.fallback_score).unwrap_or(5),
        };

        let file_prefix = settings
            .file_prefix
            .unwrap_or_else(|| format!("{}_PSR", file_stem_of(&company)));
        let report = ReportSettings {
            output_dir: cli
                .output_dir
                .clone()
                .or(settings.output_dir)
                .unwrap_or_else(|| PathBuf::from("output")),
            file_prefix,
            title: settings
                .title
                .unwrap_or_else(|| format!("{company} Press Summary Report")),
            company,
            template: cli.template.clone().or(settings.template),
            thresholds: settings.thresholds.unwrap_or_default(),
            colors: settings.colors.unwrap_or_default(),
            write_json: cli.json || settings.write_json.unwrap_or(false),
        };

        let defaults = RetryPolicy::default();
        let retry = RetryPolicy {
            max_attempts: cli
                .retries
                .or(settings.retry.max_attempts)
                .unwrap_or(defaults.max_attempts),
            base_delay: settings
                .retry
                .base_delay_ms
                .map(StdDuration::from_millis)
                .unwrap_or(defaults.base_delay),
            max_delay: settings
                .retry
                .max_delay_ms
                .map(StdDuration::from_millis)
                .unwrap_or(defaults.max_delay),
            max_jitter: settings
                .retry
                .max_jitter_ms
                .map(StdDuration::from_millis)
                .unwrap_or(defaults.max_jitter),
        };

        let config = Configuration {
            newscatcher_api_key,
            openai_api_key,
            search,
            completion,
            report,
            retry,
            timeout: StdDuration::from_secs(cli.timeout_secs.or(settings.timeout_secs).unwrap_or(30)),
            strict: cli.strict || settings.strict.unwrap_or(false),
        };
        config.validate()?;
        debug!(?config, "Configuration assembled");
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.search.query.trim().is_empty() {
            return invalid("query must not be empty".into());
        }
        let lang = &self.search.language;
        if lang.len() != 2 || !lang.chars().all(|c| c.is_ascii_alphabetic()) {
            return invalid(format!("language must be a two-letter code, got {lang:?}"));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&self.search.page_size) {
            return invalid(format!(
                "page_size must be between 1 and {MAX_PAGE_SIZE}, got {}",
                self.search.page_size
            ));
        }
        if self.completion.model.trim().is_empty() {
            return invalid("model must not be empty".into());
        }
        if self.completion.max_tokens == 0 {
            return invalid("max_tokens must be positive".into());
        }
        if self.completion.fallback_score > 10 {
            return invalid(format!(
                "fallback_score must be between 0 and 10, got {}",
                self.completion.fallback_score
            ));
        }
        let t = self.report.thresholds;
        if !(0.0 <= t.medium && t.medium <= t.high && t.high <= 10.0) {
            return invalid(format!(
                "thresholds must satisfy 0 <= medium <= high <= 10, got medium {} high {}",
                t.medium, t.high
            ));
        }
        if self.report.file_prefix.is_empty()
            || self.report.file_prefix.contains(['/', '\\'])
        {
            return invalid(format!(
                "file_prefix must be a plain file name, got {:?}",
                self.report.file_prefix
            ));
        }
        if self.retry.max_attempts == 0 {
            return invalid("retry attempts must be at least 1".into());
        }
        if self.timeout.is_zero() {
            return invalid("timeout must be positive".into());
        }
        Ok(())
    }
}

/// Use the key given on the command line or in the environment, otherwise
/// read it from `path`.
pub fn resolve_api_key(
    explicit: Option<&str>,
    var: &'static str,
    path: &Path,
) -> Result<String, ConfigError> {
    if let Some(key) = explicit.map(str::trim).filter(|k| !k.is_empty()) {
        debug!(var, "API key taken from environment");
        return Ok(key.to_string());
    }

    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConfigError::MissingKey {
                var,
                path: path.to_path_buf(),
            });
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let key = raw.trim();
    if key.is_empty() {
        return Err(ConfigError::EmptyKey(path.to_path_buf()));
    }
    debug!(var, path = %path.display(), "API key read from file");
    Ok(key.to_string())
}

fn parse_endpoint(raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| ConfigError::Invalid(format!("bad endpoint URL {raw:?}: {e}")))
}

/// `S-OIL` -> `S_OIL`, `Acme Corp.` -> `Acme_Corp`.
fn file_stem_of(company: &str) -> String {
    let stem: String = company
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    stem.trim_matches('_').to_string()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use clap::Parser;

    pub(crate) fn cli(extra: &[&str]) -> Cli {
        let mut args = vec![
            "press_summary_report",
            "--newscatcher-api-key",
            "nc-key",
            "--openai-api-key",
            "oa-key",
        ];
        args.extend_from_slice(extra);
        Cli::parse_from(args)
    }

    #[test]
    fn test_defaults() {
        let config = Configuration::from_parts(&cli(&[]), Settings::default()).unwrap();

        assert_eq!(config.search.query, "\"S-OIL\"");
        assert_eq!(config.search.language, "ko");
        assert_eq!(config.search.page_size, 25);
        assert_eq!(config.search.endpoint.as_str(), NEWS_API_URL);
        assert_eq!(config.completion.model, "text-davinci-003");
        assert_eq!(config.completion.max_tokens, 50);
        assert_eq!(config.completion.fallback_score, 5);
        assert_eq!(config.report.file_prefix, "S_OIL_PSR");
        assert_eq!(config.report.output_dir, PathBuf::from("output"));
        assert_eq!(config.report.thresholds, Thresholds::default());
        assert_eq!(config.retry, RetryPolicy::default());
        assert!(!config.strict);
    }

    #[test]
    fn test_cli_wins_over_settings() {
        let settings: Settings = serde_yaml::from_str(
            r#"
query: from-settings
language: en
page_size: 40
company: Acme Corp.
retry:
  max_attempts: 7
  base_delay_ms: 10
"#,
        )
        .unwrap();
        let config =
            Configuration::from_parts(&cli(&["-q", "from-cli", "--retries", "2"]), settings)
                .unwrap();

        assert_eq!(config.search.query, "from-cli");
        assert_eq!(config.search.language, "en");
        assert_eq!(config.search.page_size, 40);
        assert_eq!(config.completion.company, "Acme Corp.");
        assert_eq!(config.report.file_prefix, "Acme_Corp_PSR");
        assert_eq!(config.retry.max_attempts, 2);
        assert_eq!(config.retry.base_delay, StdDuration::from_millis(10));
    }

    #[test]
    fn test_unknown_settings_key_is_rejected() {
        let parsed: Result<Settings, _> = serde_yaml::from_str("querry: typo\n");
        assert!(parsed.is_err());
    }

    #[test]
    fn test_validation() {
        let bad = [
            vec!["-q", "   "],
            vec!["-l", "kor"],
            vec!["-l", "k1"],
            vec!["-n", "0"],
            vec!["-n", "101"],
            vec!["--fallback-score", "11"],
            vec!["--retries", "0"],
            vec!["--max-tokens", "0"],
        ];
        for args in bad {
            let res = Configuration::from_parts(&cli(&args), Settings::default());
            assert!(
                matches!(res, Err(ConfigError::Invalid(_))),
                "expected {args:?} to be rejected"
            );
        }

        let ok = Configuration::from_parts(&cli(&["-n", "100", "-l", "EN"]), Settings::default())
            .unwrap();
        assert_eq!(ok.search.language, "en");
    }

    #[test]
    fn test_inverted_thresholds_are_rejected() {
        let settings: Settings =
            serde_yaml::from_str("thresholds: { high: 5, medium: 7 }\n").unwrap();
        let res = Configuration::from_parts(&cli(&[]), settings);
        assert!(matches!(res, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_resolve_api_key_prefers_explicit_value() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(OPENAI_KEY_FILE);
        fs::write(&path, "from-file\n").unwrap();

        let key = resolve_api_key(Some(" from-env "), OPENAI_KEY_VAR, &path).unwrap();
        assert_eq!(key, "from-env");
    }

    #[test]
    fn test_resolve_api_key_falls_back_to_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(OPENAI_KEY_FILE);
        fs::write(&path, "  sk-test-123\n").unwrap();

        assert_eq!(
            resolve_api_key(None, OPENAI_KEY_VAR, &path).unwrap(),
            "sk-test-123"
        );
        assert_eq!(
            resolve_api_key(Some(""), OPENAI_KEY_VAR, &path).unwrap(),
            "sk-test-123"
        );
    }

    #[test]
    fn test_resolve_api_key_missing_everywhere() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(NEWSCATCHER_KEY_FILE);

        let err = resolve_api_key(None, NEWSCATCHER_KEY_VAR, &path).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingKey { var: NEWSCATCHER_KEY_VAR, .. }
        ));
    }

    #[test]
    fn test_resolve_api_key_empty_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(NEWSCATCHER_KEY_FILE);
        fs::write(&path, " \n\t").unwrap();

        let err = resolve_api_key(None, NEWSCATCHER_KEY_VAR, &path).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyKey(_)));
    }

    #[test]
    fn test_load_reads_settings_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("psr.yaml");
        fs::write(&path, "page_size: 7\nwrite_json: true\n").unwrap();

        let config =
            Configuration::load(&cli(&["--settings", path.to_str().unwrap()])).unwrap();
        assert_eq!(config.search.page_size, 7);
        assert!(config.report.write_json);
    }

    #[test]
    fn test_debug_redacts_keys() {
        let config = Configuration::from_parts(&cli(&[]), Settings::default()).unwrap();
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("oa-key"));
        assert!(dbg.contains("<redacted>"));
    }
}
