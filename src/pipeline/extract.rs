//! Table sources: turn a PDF into [`RawFragment`]s.
//!
//! [`TableSource`] is the contract the rest of the crate depends on: given a
//! local PDF path and the page selection in [`ExtractionConfig`], return
//! every table-like region on those pages in document order. Sources are
//! blocking and are always driven from `spawn_blocking`.
//!
//! [`PdfiumTableSource`] is the production source. It never runs OCR; it
//! reads the text layer through pdfium and groups positioned text segments
//! into grids:
//!
//! ```text
//! segments ──▶ rows (same vertical centre) ──▶ regions (consecutive rows
//!   with a similar cell count) ──▶ columns (clustered left edges) ──▶ grid
//! ```
//!
//! The detector cannot tell a header row from data, so fragments are emitted
//! headerless and the normaliser promotes their first row.

use crate::config::{DetectorConfig, ExtractionConfig};
use crate::error::Pdf2TableError;
use crate::fragment::RawFragment;
use once_cell::sync::Lazy;
use pdfium_render::prelude::*;
use regex::Regex;
use std::cmp::Ordering;
use std::path::Path;
use tracing::{debug, info};

/// A document-conversion backend that finds tables in a PDF.
pub trait TableSource: Send + Sync {
    /// Return the table fragments found on the selected pages, in page order
    /// and top-to-bottom within a page.
    fn extract_fragments(
        &self,
        pdf_path: &Path,
        config: &ExtractionConfig,
    ) -> Result<Vec<RawFragment>, Pdf2TableError>;
}

/// [`TableSource`] backed by pdfium's text layer.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfiumTableSource;

impl TableSource for PdfiumTableSource {
    fn extract_fragments(
        &self,
        pdf_path: &Path,
        config: &ExtractionConfig,
    ) -> Result<Vec<RawFragment>, Pdf2TableError> {
        let pdfium = pdfium_auto::bind_pdfium_silent()
            .map_err(|e| Pdf2TableError::PdfiumBindingFailed(e.to_string()))?;

        let password = config.password.as_deref();
        let document = pdfium
            .load_pdf_from_file(pdf_path, password)
            .map_err(|e| load_error(pdf_path, password, e))?;

        let pages = document.pages();
        let total_pages = pages.len() as usize;
        info!("PDF loaded: {} pages", total_pages);

        let page_indices = config.pages.to_indices(total_pages);
        if page_indices.is_empty() {
            return Err(Pdf2TableError::PageOutOfRange {
                page: config.pages.first_page(),
                total: total_pages,
            });
        }

        let mut fragments = Vec::new();
        for idx in page_indices {
            let page_num = idx + 1;
            let page = pages
                .get(idx as u16)
                .map_err(|e| Pdf2TableError::ExtractionFailed {
                    page: page_num,
                    detail: format!("{:?}", e),
                })?;

            let cells = page_cells(&page).map_err(|e| Pdf2TableError::ExtractionFailed {
                page: page_num,
                detail: format!("{:?}", e),
            })?;

            let tables = detect_tables(cells, &config.detector);
            debug!("Page {}: {} table region(s)", page_num, tables.len());

            fragments.extend(
                tables
                    .into_iter()
                    .map(|rows| RawFragment::headerless(rows).on_page(page_num)),
            );
        }

        Ok(fragments)
    }
}

fn load_error(pdf_path: &Path, password: Option<&str>, e: PdfiumError) -> Pdf2TableError {
    let err_str = format!("{:?}", e);
    if err_str.contains("Password") || err_str.contains("password") {
        if password.is_some() {
            Pdf2TableError::WrongPassword {
                path: pdf_path.to_path_buf(),
            }
        } else {
            Pdf2TableError::PasswordRequired {
                path: pdf_path.to_path_buf(),
            }
        }
    } else {
        Pdf2TableError::CorruptPdf {
            path: pdf_path.to_path_buf(),
            detail: err_str,
        }
    }
}

// ── Text segments ────────────────────────────────────────────────────────

/// A positioned run of text, top-left origin, in points.
#[derive(Debug, Clone, PartialEq)]
pub struct TextCell {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl TextCell {
    fn center_x(&self) -> f32 {
        self.x + self.width / 2.0
    }

    fn center_y(&self) -> f32 {
        self.y + self.height / 2.0
    }

    fn right(&self) -> f32 {
        self.x + self.width
    }
}

fn page_cells(page: &PdfPage<'_>) -> Result<Vec<TextCell>, PdfiumError> {
    let page_height = page.height().value;
    let text = page.text()?;

    let mut cells = Vec::new();
    for segment in text.segments().iter() {
        let content = clean_cell(&segment.text());
        if content.is_empty() {
            continue;
        }

        // pdfium reports a bottom-left origin.
        let bounds = segment.bounds();
        cells.push(TextCell {
            text: content,
            x: bounds.left().value,
            y: page_height - bounds.top().value,
            width: bounds.right().value - bounds.left().value,
            height: bounds.top().value - bounds.bottom().value,
        });
    }

    Ok(cells)
}

static RE_INVISIBLE: Lazy<Regex> =
    Lazy::new(|| Regex::new("[\u{200B}\u{200C}\u{200D}\u{2060}\u{FEFF}\u{00AD}]").unwrap());

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Strip invisible characters and collapse runs of whitespace.
pub fn clean_cell(text: &str) -> String {
    let visible = RE_INVISIBLE.replace_all(text, "");
    RE_WHITESPACE.replace_all(visible.trim(), " ").into_owned()
}

// ── Grid detection ───────────────────────────────────────────────────────

/// Group positioned text into table grids (rows of cell strings).
pub fn detect_tables(mut cells: Vec<TextCell>, config: &DetectorConfig) -> Vec<Vec<Vec<String>>> {
    cells.sort_by(|a, b| cmp_f32(a.y, b.y).then_with(|| cmp_f32(a.x, b.x)));

    let rows = cluster_rows(&cells, config.row_tolerance);
    find_regions(&rows, config)
        .iter()
        .filter_map(|region| build_grid(region, config))
        .collect()
}

fn cmp_f32(a: f32, b: f32) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

/// Cells whose vertical centre lies within `tolerance` of a row's first cell
/// join that row. Rows come back top-to-bottom, cells left-to-right.
fn cluster_rows(cells: &[TextCell], tolerance: f32) -> Vec<Vec<&TextCell>> {
    let mut rows: Vec<Vec<&TextCell>> = Vec::new();

    for cell in cells {
        let existing = rows.iter_mut().find(|row| {
            row.first()
                .is_some_and(|first| (cell.center_y() - first.center_y()).abs() <= tolerance)
        });
        match existing {
            Some(row) => row.push(cell),
            None => rows.push(vec![cell]),
        }
    }

    for row in &mut rows {
        row.sort_by(|a, b| cmp_f32(a.x, b.x));
    }
    rows.sort_by(|a, b| {
        let ay = a.first().map_or(0.0, |c| c.y);
        let by = b.first().map_or(0.0, |c| c.y);
        cmp_f32(ay, by)
    });

    rows
}

/// Runs of consecutive rows whose cell counts stay within ±1 of the run's
/// first row. Rows narrower than `min_cols` end the current run.
fn find_regions<'a>(
    rows: &[Vec<&'a TextCell>],
    config: &DetectorConfig,
) -> Vec<Vec<Vec<&'a TextCell>>> {
    let mut regions = Vec::new();
    let mut current: Vec<Vec<&'a TextCell>> = Vec::new();
    let mut expected_cols: Option<usize> = None;

    let mut close = |current: &mut Vec<Vec<&'a TextCell>>| {
        if current.len() >= config.min_rows {
            regions.push(std::mem::take(current));
        } else {
            current.clear();
        }
    };

    for row in rows {
        let width = row.len();
        if width < config.min_cols {
            close(&mut current);
            expected_cols = None;
            continue;
        }

        match expected_cols {
            Some(expected) if width.abs_diff(expected) <= 1 => current.push(row.clone()),
            _ => {
                close(&mut current);
                current.push(row.clone());
                expected_cols = Some(width);
            }
        }
    }
    close(&mut current);

    regions
}

fn build_grid(region: &[Vec<&TextCell>], config: &DetectorConfig) -> Option<Vec<Vec<String>>> {
    let boundaries = column_boundaries(region, config.col_tolerance);
    let num_cols = boundaries.len().saturating_sub(1);
    if num_cols < config.min_cols {
        return None;
    }

    let grid = region
        .iter()
        .map(|row| {
            let mut cells = vec![String::new(); num_cols];
            for cell in row {
                let slot = &mut cells[column_index(cell, &boundaries).min(num_cols - 1)];
                if !slot.is_empty() {
                    slot.push(' ');
                }
                slot.push_str(&cell.text);
            }
            cells
        })
        .collect();

    Some(grid)
}

/// Left edges clustered within `tolerance`, plus the right edge of the
/// widest cell as the closing boundary.
fn column_boundaries(region: &[Vec<&TextCell>], tolerance: f32) -> Vec<f32> {
    let mut lefts: Vec<f32> = region.iter().flatten().map(|c| c.x).collect();
    lefts.sort_by(|a, b| cmp_f32(*a, *b));

    let Some(&first) = lefts.first() else {
        return Vec::new();
    };

    let mut boundaries = vec![first];
    for &x in &lefts[1..] {
        if boundaries.last().is_some_and(|&last| x - last > tolerance) {
            boundaries.push(x);
        }
    }

    if let Some(max_right) = region
        .iter()
        .flatten()
        .map(|c| c.right())
        .max_by(|a, b| cmp_f32(*a, *b))
    {
        boundaries.push(max_right);
    }

    boundaries
}

fn column_index(cell: &TextCell, boundaries: &[f32]) -> usize {
    let center = cell.center_x();
    boundaries
        .windows(2)
        .position(|w| center >= w[0] && center < w[1])
        .unwrap_or_else(|| boundaries.len().saturating_sub(2))
}
