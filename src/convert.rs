//! Extraction entry points.
//!
//! Every entry point follows the same three steps: resolve the input to a
//! local PDF, run the [`TableSource`] on the blocking pool, then normalise
//! the fragments. The `*_with` variants take the source explicitly so that
//! callers (and tests) can swap the pdfium backend for their own.

use crate::config::ExtractionConfig;
use crate::error::Pdf2TableError;
use crate::output::{ExtractionOutput, ExtractionStats};
use crate::pipeline::extract::{PdfiumTableSource, TableSource};
use crate::pipeline::input::{self, ResolvedInput};
use crate::pipeline::normalize::TableNormalizer;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Extract and normalise the tables of a PDF file or URL with pdfium.
///
/// # Arguments
/// * `input_str`: local file path or HTTP/HTTPS URL to a PDF
/// * `config`: extraction configuration
///
/// # Errors
/// Fails on unreadable input, non-PDF input, encrypted documents without
/// the right password, an empty page selection, or a pdfium failure.
/// Finding no usable table is not an error: the output is simply empty.
pub async fn extract_tables(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, Pdf2TableError> {
    extract_tables_with(Arc::new(PdfiumTableSource), input_str, config).await
}

/// [`extract_tables`] with a caller-supplied [`TableSource`].
pub async fn extract_tables_with(
    source: Arc<dyn TableSource>,
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, Pdf2TableError> {
    let started = Instant::now();
    let input_str = input_str.as_ref();
    info!("Starting extraction: {}", input_str);

    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    run(source, &resolved, config, started).await
}

/// Extract tables from PDF bytes held in memory.
///
/// The bytes are written to a managed temp file that is removed when this
/// function returns, whether it succeeds or not.
pub async fn extract_from_bytes(
    bytes: &[u8],
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, Pdf2TableError> {
    extract_from_bytes_with(Arc::new(PdfiumTableSource), bytes, config).await
}

/// [`extract_from_bytes`] with a caller-supplied [`TableSource`].
pub async fn extract_from_bytes_with(
    source: Arc<dyn TableSource>,
    bytes: &[u8],
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, Pdf2TableError> {
    let started = Instant::now();
    let resolved = input::spool_bytes(bytes).await?;
    run(source, &resolved, config, started).await
}

/// Synchronous wrapper around [`extract_tables`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_tables_sync(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, Pdf2TableError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2TableError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract_tables(input_str, config))
}

/// Extract tables and write `{"data": [...]}` JSON to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn extract_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionStats, Pdf2TableError> {
    let output = extract_tables(input_str, config).await?;
    write_json(&output, output_path.as_ref()).await?;
    Ok(output.stats)
}

async fn write_json(output: &ExtractionOutput, path: &Path) -> Result<(), Pdf2TableError> {
    let write_failed = |source: std::io::Error| Pdf2TableError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_failed)?;
    }

    let json = serde_json::to_vec_pretty(&output.envelope())
        .map_err(|e| Pdf2TableError::Internal(format!("Failed to serialise output: {e}")))?;

    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, &json).await.map_err(write_failed)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_failed)?;
    Ok(())
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn run(
    source: Arc<dyn TableSource>,
    resolved: &ResolvedInput,
    config: &ExtractionConfig,
    started: Instant,
) -> Result<ExtractionOutput, Pdf2TableError> {
    let span = tracing::info_span!("extract", pages = %config.pages, alignment = %config.alignment);

    let extract_start = Instant::now();
    let pdf_path = resolved.path().to_path_buf();
    let task_config = config.clone();
    let task_span = span.clone();
    let fragments = tokio::task::spawn_blocking(move || {
        task_span.in_scope(|| source.extract_fragments(&pdf_path, &task_config))
    })
    .await
    .map_err(|e| Pdf2TableError::Internal(format!("Extraction task panicked: {}", e)))??;
    let extract_duration_ms = extract_start.elapsed().as_millis() as u64;

    let (data, normalize) = TableNormalizer::from_config(config)
        .with_span(span.clone())
        .normalize_with_stats(fragments);

    let stats = ExtractionStats {
        normalize,
        extract_duration_ms,
        total_duration_ms: started.elapsed().as_millis() as u64,
    };

    span.in_scope(|| {
        info!(
            "Extraction complete: {} records from {}/{} fragments, {}ms total",
            stats.normalize.records,
            stats.normalize.fragments_used,
            stats.normalize.fragments_found,
            stats.total_duration_ms
        )
    });

    Ok(ExtractionOutput { data, stats })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::RawFragment;
    use crate::HeaderAlignment;
    use std::sync::Mutex;

    /// Returns canned fragments and records the page selection it was given.
    struct StubSource {
        fragments: Vec<RawFragment>,
        seen_pages: Mutex<Vec<String>>,
    }

    impl StubSource {
        fn new(fragments: Vec<RawFragment>) -> Arc<Self> {
            Arc::new(Self {
                fragments,
                seen_pages: Mutex::new(Vec::new()),
            })
        }
    }

    impl TableSource for StubSource {
        fn extract_fragments(
            &self,
            pdf_path: &Path,
            config: &ExtractionConfig,
        ) -> Result<Vec<RawFragment>, Pdf2TableError> {
            assert!(pdf_path.exists(), "source must see a live file");
            self.seen_pages.lock().unwrap().push(config.pages.to_string());
            Ok(self.fragments.clone())
        }
    }

    struct FailingSource;

    impl TableSource for FailingSource {
        fn extract_fragments(
            &self,
            _pdf_path: &Path,
            _config: &ExtractionConfig,
        ) -> Result<Vec<RawFragment>, Pdf2TableError> {
            Err(Pdf2TableError::ExtractionFailed {
                page: 1,
                detail: "broken text layer".into(),
            })
        }
    }

    /// Records the name of the span the source was called under.
    #[derive(Default)]
    struct SpanRecordingSource {
        span_name: Mutex<Option<&'static str>>,
    }

    impl TableSource for SpanRecordingSource {
        fn extract_fragments(
            &self,
            _pdf_path: &Path,
            _config: &ExtractionConfig,
        ) -> Result<Vec<RawFragment>, Pdf2TableError> {
            *self.span_name.lock().unwrap() = tracing::Span::current().metadata().map(|m| m.name());
            Ok(Vec::new())
        }
    }

    fn two_page_statement() -> Vec<RawFragment> {
        vec![
            RawFragment::headerless(vec![
                vec!["Date", "Narration", "Withdrawal", "Deposit", "Closing Balance"],
                vec!["01/01", "ATM", "100", "", "500"],
            ])
            .on_page(1),
            RawFragment::headerless(vec![
                vec!["02/01", "SALARY", "", "1000", "1500"],
                vec!["03/01", "RENT", "700", "", "800"],
            ])
            .on_page(2),
        ]
    }

    #[tokio::test]
    async fn from_bytes_runs_source_and_normalizer() {
        let source = StubSource::new(two_page_statement());
        let config = ExtractionConfig::builder()
            .alignment(HeaderAlignment::ByPosition)
            .build()
            .unwrap();

        let output = extract_from_bytes_with(source.clone(), b"%PDF-1.4\n", &config)
            .await
            .unwrap();

        assert_eq!(output.data.len(), 2);
        assert_eq!(output.data[1].narration.as_deref(), Some("RENT"));
        assert_eq!(output.stats.normalize.fragments_found, 2);
        assert_eq!(output.stats.normalize.fragments_realigned, 1);
        assert_eq!(*source.seen_pages.lock().unwrap(), vec!["1-2".to_string()]);
    }

    #[tokio::test]
    async fn by_label_drops_headerless_continuation() {
        let source = StubSource::new(two_page_statement());
        let output = extract_from_bytes_with(source, b"%PDF-1.4\n", &ExtractionConfig::default())
            .await
            .unwrap();
        assert_eq!(output.data.len(), 1);
        assert_eq!(output.stats.normalize.fragments_unmatched, 1);
    }

    #[tokio::test]
    async fn source_errors_propagate() {
        let config = ExtractionConfig::default();
        let err = extract_from_bytes_with(Arc::new(FailingSource), b"%PDF-1.4\n", &config)
            .await
            .unwrap_err();
        assert!(matches!(err, Pdf2TableError::ExtractionFailed { page: 1, .. }));
    }

    #[tokio::test]
    async fn source_runs_inside_the_extract_span() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        let source = Arc::new(SpanRecordingSource::default());
        extract_from_bytes_with(source.clone(), b"%PDF-1.4\n", &ExtractionConfig::default())
            .await
            .unwrap();

        assert_eq!(*source.span_name.lock().unwrap(), Some("extract"));
    }

    #[tokio::test]
    async fn non_pdf_bytes_never_reach_the_source() {
        let source = StubSource::new(Vec::new());
        let err = extract_from_bytes_with(source.clone(), b"hello", &ExtractionConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Pdf2TableError::NotAPdf { .. }));
        assert!(source.seen_pages.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn write_json_emits_data_envelope() {
        let source = StubSource::new(two_page_statement());
        let output = extract_from_bytes_with(source, b"%PDF-1.4\n", &ExtractionConfig::default())
            .await
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/rows.json");
        write_json(&output, &path).await.unwrap();

        let written: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(written["data"][0]["Narration"], "ATM");
        assert!(written.get("stats").is_none());
        assert!(!path.with_extension("json.tmp").exists());
    }
}
