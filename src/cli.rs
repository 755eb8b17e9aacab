//! Command-line interface definitions.
//!
//! Nothing is required: every option has a default, can come from the
//! environment, or can be set in the YAML settings file. Flags given here win
//! over the settings file.

use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for the press summary report.
///
/// # Examples
///
/// ```sh
/// # Daily run with the built-in defaults ("S-OIL", Korean, 25 articles)
/// press_summary_report
///
/// # Smaller English run into a custom directory, with a JSON copy
/// press_summary_report -q '"S-OIL"' -l en -n 10 -o ./reports --json
///
/// # Settings file plus a custom template
/// press_summary_report --settings psr.yaml --template templates/report.html
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Search query sent to the news API [default: "S-OIL"]
    #[arg(short, long)]
    pub query: Option<String>,

    /// Two-letter article language code [default: ko]
    #[arg(short, long)]
    pub language: Option<String>,

    /// Number of articles to request, 1-100 [default: 25]
    #[arg(short = 'n', long)]
    pub page_size: Option<u32>,

    /// Company the sentiment prompt asks about [default: S-OIL]
    #[arg(long)]
    pub company: Option<String>,

    /// Completion model name [default: text-davinci-003]
    #[arg(long)]
    pub model: Option<String>,

    /// Output token budget per completion [default: 50]
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Score used when a completion has no usable number [default: 5]
    #[arg(long)]
    pub fallback_score: Option<u8>,

    /// Directory the report is written to [default: output]
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Directory holding the fallback API key files [default: config]
    #[arg(long)]
    pub config_dir: Option<PathBuf>,

    /// Optional YAML settings file
    #[arg(short, long, env = "PSR_SETTINGS")]
    pub settings: Option<PathBuf>,

    /// HTML template overriding the built-in one
    #[arg(short, long)]
    pub template: Option<PathBuf>,

    /// Also write the report data as JSON next to the HTML file
    #[arg(long)]
    pub json: bool,

    /// Abort the run if any article cannot be scored
    #[arg(long)]
    pub strict: bool,

    /// Total attempts per API call before giving up [default: 3]
    #[arg(long)]
    pub retries: Option<usize>,

    /// Per-request timeout in seconds [default: 30]
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Directory for a daily log file, in addition to stderr
    #[arg(long, env = "PSR_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// NewsCatcher API key (falls back to <config-dir>/newscatcher_API_apiKey.txt)
    #[arg(long, env = "NEWSCATCHER_API_KEY", hide_env_values = true)]
    pub newscatcher_api_key: Option<String>,

    /// OpenAI API key (falls back to <config-dir>/openai_apiKey.txt)
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,
}
