//! Output generation for the rendered report.
//!
//! # Submodules
//!
//! - [`html`]: Renders a report into the HTML template
//! - [`files`]: Names and writes the dated report file without overwriting
//! - [`json`]: Writes the optional JSON copy of the report data
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! ├── S_OIL_PSR_10_18_2026.html    # first run of the day
//! ├── S_OIL_PSR_10_18_2026.json    # with --json
//! └── S_OIL_PSR_10_18_2026_2.html  # second run the same day
//! ```

pub mod files;
pub mod html;
pub mod json;
