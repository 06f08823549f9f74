//! Configuration types for table extraction.
//!
//! Every extraction knob lives in [`ExtractionConfig`], built via
//! [`ExtractionConfigBuilder`]. The same config is shared by the CLI, the
//! HTTP server (one instance behind an `Arc` for all requests) and library
//! callers.

use crate::error::Pdf2TableError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Configuration for a PDF table extraction run.
///
/// # Example
/// ```rust
/// use edgequake_pdf2table::{ExtractionConfig, HeaderAlignment, PageSelection};
///
/// let config = ExtractionConfig::builder()
///     .pages(PageSelection::Range(1, 3))
///     .alignment(HeaderAlignment::ByPosition)
///     .schema_guard(true)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Pages handed to the table source. Default: pages 1–2.
    ///
    /// Statements put the transaction table on the first page or two;
    /// later pages tend to carry terms and summaries that would only add
    /// noise to the merged output.
    pub pages: PageSelection,

    /// PDF user password for encrypted documents.
    #[serde(skip_serializing)]
    pub password: Option<String>,

    /// How fragments after the first are reconciled with the canonical
    /// headers. Default: [`HeaderAlignment::ByLabel`].
    pub alignment: HeaderAlignment,

    /// Refuse positional relabelling unless the fragment is exactly as wide
    /// as the canonical header row. Only consulted under
    /// [`HeaderAlignment::ByPosition`]. Default: false.
    pub schema_guard: bool,

    /// Geometry tolerances for the pdfium table detector.
    pub detector: DetectorConfig,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            pages: PageSelection::default(),
            password: None,
            alignment: HeaderAlignment::default(),
            schema_guard: false,
            detector: DetectorConfig::default(),
            download_timeout_secs: 120,
        }
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn alignment(mut self, alignment: HeaderAlignment) -> Self {
        self.config.alignment = alignment;
        self
    }

    pub fn schema_guard(mut self, v: bool) -> Self {
        self.config.schema_guard = v;
        self
    }

    pub fn detector(mut self, detector: DetectorConfig) -> Self {
        self.config.detector = detector;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, Pdf2TableError> {
        let c = &self.config;
        match &c.pages {
            PageSelection::Single(0) => {
                return Err(Pdf2TableError::InvalidConfig(
                    "Pages are 1-indexed, got page 0".into(),
                ));
            }
            PageSelection::Range(start, end) if *start == 0 || start > end => {
                return Err(Pdf2TableError::InvalidConfig(format!(
                    "Invalid page range {start}-{end}"
                )));
            }
            PageSelection::Set(pages) if pages.is_empty() || pages.contains(&0) => {
                return Err(Pdf2TableError::InvalidConfig(
                    "Page set must be non-empty and 1-indexed".into(),
                ));
            }
            _ => {}
        }
        c.detector.validate()?;
        if c.download_timeout_secs == 0 {
            return Err(Pdf2TableError::InvalidConfig(
                "Download timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Header alignment ─────────────────────────────────────────────────────

/// Strategy for reconciling a fragment's column labels with the canonical
/// headers recorded from the first non-empty fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HeaderAlignment {
    /// Every fragment is matched on its own labels. (default)
    #[default]
    ByLabel,
    /// Fragments whose labels differ from the canonical headers are
    /// relabelled column-by-column from the canonical headers.
    ///
    /// Assumes continuation tables keep the same column order. Two tables
    /// with unrelated schemas on the same pages will be merged incorrectly;
    /// pair with [`ExtractionConfig::schema_guard`] to limit the damage.
    ByPosition,
}

impl fmt::Display for HeaderAlignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderAlignment::ByLabel => f.write_str("by-label"),
            HeaderAlignment::ByPosition => f.write_str("by-position"),
        }
    }
}

// ── Detector tolerances ──────────────────────────────────────────────────

/// Geometry thresholds used by [`crate::pipeline::extract::PdfiumTableSource`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Text segments whose vertical centres are within this many points
    /// belong to the same row. Default: 5.0.
    pub row_tolerance: f32,
    /// Left edges within this many points belong to the same column.
    /// Default: 10.0.
    pub col_tolerance: f32,
    /// Minimum consecutive rows for a region to count as a table. Default: 2.
    pub min_rows: usize,
    /// Minimum cells per row for a row to be part of a table. Default: 2.
    pub min_cols: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            row_tolerance: 5.0,
            col_tolerance: 10.0,
            min_rows: 2,
            min_cols: 2,
        }
    }
}

impl DetectorConfig {
    fn validate(&self) -> Result<(), Pdf2TableError> {
        if !(self.row_tolerance > 0.0 && self.col_tolerance > 0.0) {
            return Err(Pdf2TableError::InvalidConfig(format!(
                "Detector tolerances must be positive (row={}, col={})",
                self.row_tolerance, self.col_tolerance
            )));
        }
        if self.min_rows == 0 || self.min_cols == 0 {
            return Err(Pdf2TableError::InvalidConfig(
                "Detector min_rows and min_cols must be ≥ 1".into(),
            ));
        }
        Ok(())
    }
}

// ── Page selection ───────────────────────────────────────────────────────

/// Specifies which pages of the PDF to scan for tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSelection {
    /// Scan all pages.
    All,
    /// Scan a single page (1-indexed).
    Single(usize),
    /// Scan a contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Scan specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl Default for PageSelection {
    fn default() -> Self {
        PageSelection::Range(1, 2)
    }
}

impl PageSelection {
    /// Expand the selection into a sorted, deduplicated list of 0-indexed
    /// page numbers that exist in a document of `total_pages` pages.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = match self {
            PageSelection::All => (0..total_pages).collect(),
            PageSelection::Single(p) => (1..=total_pages)
                .contains(p)
                .then(|| p - 1)
                .into_iter()
                .collect(),
            PageSelection::Range(start, end) => {
                ((*start).max(1) - 1..(*end).min(total_pages)).collect()
            }
            PageSelection::Set(pages) => pages
                .iter()
                .filter(|&&p| p >= 1 && p <= total_pages)
                .map(|p| p - 1)
                .collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }

    /// First 1-indexed page the selection asks for, used in error reports.
    pub fn first_page(&self) -> usize {
        match self {
            PageSelection::All => 1,
            PageSelection::Single(p) => *p,
            PageSelection::Range(start, _) => *start,
            PageSelection::Set(pages) => pages.iter().copied().min().unwrap_or(1),
        }
    }
}

impl fmt::Display for PageSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageSelection::All => f.write_str("all"),
            PageSelection::Single(p) => write!(f, "{p}"),
            PageSelection::Range(start, end) => write!(f, "{start}-{end}"),
            PageSelection::Set(pages) => {
                let parts: Vec<String> = pages.iter().map(ToString::to_string).collect();
                f.write_str(&parts.join(","))
            }
        }
    }
}

impl FromStr for PageSelection {
    type Err = Pdf2TableError;

    /// Parse `all`, `5`, `3-15` or `1,3,5,7`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        let parse_page = |p: &str| -> Result<usize, Pdf2TableError> {
            let page: usize = p.trim().parse().map_err(|_| {
                Pdf2TableError::InvalidConfig(format!("Invalid page number: '{}'", p.trim()))
            })?;
            if page < 1 {
                return Err(Pdf2TableError::InvalidConfig(format!(
                    "Pages are 1-indexed, minimum is 1 (got {page})"
                )));
            }
            Ok(page)
        };

        if s == "all" {
            return Ok(PageSelection::All);
        }

        if let Some((start, end)) = s.split_once('-') {
            let (start, end) = (parse_page(start)?, parse_page(end)?);
            if start > end {
                return Err(Pdf2TableError::InvalidConfig(format!(
                    "Invalid page range '{start}-{end}': start must be <= end"
                )));
            }
            return Ok(PageSelection::Range(start, end));
        }

        if s.contains(',') {
            let pages = s.split(',').map(parse_page).collect::<Result<Vec<_>, _>>()?;
            return Ok(PageSelection::Set(pages));
        }

        Ok(PageSelection::Single(parse_page(&s)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_scans_first_two_pages() {
        let config = ExtractionConfig::default();
        assert_eq!(config.pages, PageSelection::Range(1, 2));
        assert_eq!(config.alignment, HeaderAlignment::ByLabel);
        assert!(!config.schema_guard);
    }

    #[test]
    fn page_selection_to_indices() {
        assert_eq!(PageSelection::All.to_indices(3), vec![0, 1, 2]);
        assert_eq!(PageSelection::Single(3).to_indices(5), vec![2]);
        assert_eq!(PageSelection::Single(6).to_indices(5), Vec::<usize>::new());
        assert_eq!(PageSelection::Range(1, 2).to_indices(1), vec![0]);
        assert_eq!(PageSelection::Range(2, 4).to_indices(5), vec![1, 2, 3]);
        assert_eq!(
            PageSelection::Set(vec![3, 1, 3, 9]).to_indices(5),
            vec![0, 2]
        );
    }

    #[test]
    fn page_selection_parses_cli_forms() {
        assert_eq!("all".parse::<PageSelection>().unwrap(), PageSelection::All);
        assert_eq!("4".parse::<PageSelection>().unwrap(), PageSelection::Single(4));
        assert_eq!(
            " 1-2 ".parse::<PageSelection>().unwrap(),
            PageSelection::Range(1, 2)
        );
        assert_eq!(
            "1,3,5".parse::<PageSelection>().unwrap(),
            PageSelection::Set(vec![1, 3, 5])
        );
        assert!("0".parse::<PageSelection>().is_err());
        assert!("5-2".parse::<PageSelection>().is_err());
        assert!("x".parse::<PageSelection>().is_err());
    }

    #[test]
    fn page_selection_display_round_trips_range() {
        assert_eq!(PageSelection::Range(1, 2).to_string(), "1-2");
        assert_eq!(PageSelection::Set(vec![1, 4]).to_string(), "1,4");
    }

    #[test]
    fn alignment_displays_kebab_case() {
        assert_eq!(HeaderAlignment::ByLabel.to_string(), "by-label");
        assert_eq!(HeaderAlignment::ByPosition.to_string(), "by-position");
        assert_eq!(
            serde_json::to_string(&HeaderAlignment::ByPosition).unwrap(),
            "\"by-position\""
        );
    }

    #[test]
    fn build_rejects_bad_values() {
        assert!(ExtractionConfig::builder()
            .pages(PageSelection::Range(3, 1))
            .build()
            .is_err());
        assert!(ExtractionConfig::builder()
            .pages(PageSelection::Set(vec![]))
            .build()
            .is_err());
        assert!(ExtractionConfig::builder()
            .detector(DetectorConfig {
                row_tolerance: 0.0,
                ..DetectorConfig::default()
            })
            .build()
            .is_err());
        assert!(ExtractionConfig::builder()
            .download_timeout_secs(0)
            .build()
            .is_err());
    }

    #[test]
    fn password_is_not_serialised() {
        let config = ExtractionConfig::builder().password("hunter2").build().unwrap();
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("hunter2"));
        assert!(json.contains("\"alignment\":\"by-label\""));
    }
}
