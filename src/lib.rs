//! # edgequake-pdf2table
//!
//! Extract transaction tables from bank-statement PDFs as JSON records.
//!
//! Statement PDFs carry their transactions in one table that is usually
//! split across pages. The pages after the first often repeat no header at
//! all, and the header that is there rarely uses the same wording twice
//! ("Withdrawal Amt.", "Withdrawal(Dr)"). This crate finds the table
//! fragments on each page and folds them into a single list of records
//! with a fixed schema:
//!
//! | Key                 | Matched by                          |
//! |---------------------|-------------------------------------|
//! | `Date`              | label equals `date`                 |
//! | `Narration`         | label equals `narration`/`description` |
//! | `Withdrawal Amount` | label contains `withdrawal`         |
//! | `Deposit Amount`    | label contains `deposit`            |
//! | `Closing Balance`   | label contains `closing balance`    |
//!
//! Matching ignores case and surrounding whitespace.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input      resolve local file, URL download or upload bytes
//!  ├─ 2. Extract    detect table fragments per page (pdfium, spawn_blocking)
//!  ├─ 3. Normalize  align headers, match target columns, project rows
//!  └─ 4. Output     {"data": [...]} + stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2table::{extract_tables, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExtractionConfig::default(); // pages 1-2, header alignment by label
//!     let output = extract_tables("statement.pdf", &config).await?;
//!     println!("{}", serde_json::to_string_pretty(&output.envelope())?);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `cli`    | on      | The `pdf2table` binary (clap + anyhow + tracing-subscriber) |
//! | `server` | on      | [`server`] module: actix-web `POST /process-pdf` endpoint |
//!
//! Library-only use:
//! ```toml
//! edgequake-pdf2table = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod fragment;
pub mod output;
pub mod pipeline;
#[cfg(feature = "server")]
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    DetectorConfig, ExtractionConfig, ExtractionConfigBuilder, HeaderAlignment, PageSelection,
};
pub use convert::{
    extract_from_bytes, extract_from_bytes_with, extract_tables, extract_tables_sync,
    extract_tables_with, extract_to_file,
};
pub use error::Pdf2TableError;
pub use fragment::{ColumnLabel, RawFragment};
pub use output::{ExtractionOutput, ExtractionStats, NormalizeStats, NormalizedRecord, TargetColumn};
pub use pipeline::extract::{PdfiumTableSource, TableSource};
pub use pipeline::normalize::TableNormalizer;
