//! Input resolution: turn a path, URL or byte buffer into a local PDF file.
//!
//! pdfium opens documents from the file system, so every input ends up as a
//! path. Downloads and uploads are written to temp storage owned by
//! [`ResolvedInput`]; dropping it removes the file on every exit path,
//! panics included. The `%PDF` magic bytes are checked before pdfium ever
//! sees the file.

use crate::error::Pdf2TableError;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::{TempDir, TempPath};
use tracing::{debug, info};

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// A local PDF path, plus whatever temp storage keeps it alive.
pub enum ResolvedInput {
    /// Input was already a local file.
    Local(PathBuf),
    /// Input was a URL; the PDF lives in a temp directory.
    Downloaded { path: PathBuf, _temp_dir: TempDir },
    /// Input was an in-memory buffer spooled to a temp file.
    Spooled(TempPath),
}

impl ResolvedInput {
    /// Path to the PDF file regardless of how it was resolved.
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Downloaded { path, .. } => path,
            ResolvedInput::Spooled(tmp) => tmp,
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to a local PDF file path.
///
/// URLs are downloaded to a temporary directory; local files are checked
/// for existence, readability and the PDF signature.
pub async fn resolve_input(
    input: &str,
    timeout_secs: u64,
) -> Result<ResolvedInput, Pdf2TableError> {
    if input.trim().is_empty() {
        return Err(Pdf2TableError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(input)
    }
}

/// Write `bytes` to a `.pdf` temp file after checking the PDF signature.
///
/// The write goes through `tokio::fs`, so large uploads do not hold up the
/// calling runtime thread.
pub async fn spool_bytes(bytes: &[u8]) -> Result<ResolvedInput, Pdf2TableError> {
    check_magic(bytes, Path::new("<upload>"))?;

    let path = tempfile::Builder::new()
        .prefix("pdf2table-")
        .suffix(".pdf")
        .tempfile()
        .map_err(|e| Pdf2TableError::Internal(format!("tempfile: {e}")))?
        .into_temp_path();
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| Pdf2TableError::Internal(format!("tempfile write: {e}")))?;

    debug!("Spooled {} bytes to {}", bytes.len(), path.display());
    Ok(ResolvedInput::Spooled(path))
}

fn check_magic(bytes: &[u8], path: &Path) -> Result<(), Pdf2TableError> {
    if bytes.len() < PDF_MAGIC.len() || &bytes[..4] != PDF_MAGIC {
        let mut magic = [0u8; 4];
        let n = bytes.len().min(4);
        magic[..n].copy_from_slice(&bytes[..n]);
        return Err(Pdf2TableError::NotAPdf {
            path: path.to_path_buf(),
            magic,
        });
    }
    Ok(())
}

fn resolve_local(path_str: &str) -> Result<ResolvedInput, Pdf2TableError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(Pdf2TableError::FileNotFound { path });
    }

    let mut magic = [0u8; 4];
    match std::fs::File::open(&path) {
        Ok(mut f) => match f.read_exact(&mut magic) {
            Ok(()) => check_magic(&magic, &path)?,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                // Shorter than the signature itself.
                let head = std::fs::read(&path).unwrap_or_default();
                check_magic(&head, &path)?;
            }
            Err(e) => {
                return Err(Pdf2TableError::CorruptPdf {
                    path,
                    detail: e.to_string(),
                })
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Pdf2TableError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(Pdf2TableError::FileNotFound { path });
        }
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(ResolvedInput::Local(path))
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, Pdf2TableError> {
    info!("Downloading PDF from: {}", url);

    let download_failed = |reason: String| Pdf2TableError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| download_failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            Pdf2TableError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            download_failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(download_failed(format!("HTTP {}", response.status())));
    }

    let filename = filename_from_url(url);
    let bytes = response
        .bytes()
        .await
        .map_err(|e| download_failed(e.to_string()))?;

    let temp_dir = TempDir::new().map_err(|e| Pdf2TableError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(&filename);
    check_magic(&bytes, &file_path)?;

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| Pdf2TableError::Internal(format!("Failed to write temp file: {}", e)))?;

    info!("Downloaded {} bytes to: {}", bytes.len(), file_path.display());

    Ok(ResolvedInput::Downloaded {
        path: file_path,
        _temp_dir: temp_dir,
    })
}

/// Last path segment of the URL when it looks like a file name.
fn filename_from_url(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|last| !last.is_empty() && last.contains('.'))
        .unwrap_or_else(|| "downloaded.pdf".to_string())
}
