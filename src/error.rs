//! Error types for the edgequake-pdf2table library.
//!
//! Every fatal failure surfaces as a [`Pdf2TableError`]. Fragments that the
//! normaliser cannot use (no rows, no recognised column) are not errors:
//! they are skipped silently and only show up in
//! [`crate::output::ExtractionStats`] and the debug logs.
//!
//! [`Pdf2TableError::is_client_error`] splits the variants into "the caller
//! sent something we cannot process" and "we failed to process it", which
//! the HTTP layer maps onto 4xx and 5xx responses.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-pdf2table library.
#[derive(Debug, Error)]
pub enum Pdf2TableError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// An upload declared a content type other than `application/pdf`.
    #[error("File must be a PDF")]
    UnsupportedContentType { content_type: Option<String> },

    /// An upload exceeded the configured size limit.
    #[error("Upload exceeds the {limit} byte limit")]
    UploadTooLarge { limit: usize },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// The page selection does not intersect the document.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    /// The table source failed while reading a specific page.
    #[error("Table extraction failed on page {page}: {detail}")]
    ExtractionFailed { page: usize, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output JSON file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
PDFium is normally downloaded automatically on first run.\n\
If the auto-download failed, you can:\n\
  • Check your internet connection and try again.\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Pdf2TableError {
    /// `true` when the failure is caused by what the caller supplied rather
    /// than by the extraction machinery.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Pdf2TableError::InvalidInput { .. }
                | Pdf2TableError::NotAPdf { .. }
                | Pdf2TableError::UnsupportedContentType { .. }
                | Pdf2TableError::UploadTooLarge { .. }
                | Pdf2TableError::PasswordRequired { .. }
                | Pdf2TableError::WrongPassword { .. }
                | Pdf2TableError::PageOutOfRange { .. }
                | Pdf2TableError::InvalidConfig(_)
        )
    }
}
