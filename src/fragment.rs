//! Raw tabular fragments handed over by a [`crate::TableSource`].
//!
//! A fragment is one table-like region found on a page: a list of column
//! labels plus rows of cell text aligned with those labels. Sources that
//! cannot tell a header row from data (the pdfium detector never can) label
//! the columns `0..n`; the normaliser then promotes the first row.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A column label as reported by the table source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnLabel {
    /// Positional label: no textual header was detected upstream.
    Index(usize),
    /// Textual header.
    Name(String),
}

impl ColumnLabel {
    pub fn is_index(&self) -> bool {
        matches!(self, ColumnLabel::Index(_))
    }
}

impl fmt::Display for ColumnLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnLabel::Index(i) => write!(f, "{i}"),
            ColumnLabel::Name(name) => f.write_str(name),
        }
    }
}

impl From<&str> for ColumnLabel {
    fn from(s: &str) -> Self {
        ColumnLabel::Name(s.to_string())
    }
}

impl From<String> for ColumnLabel {
    fn from(s: String) -> Self {
        ColumnLabel::Name(s)
    }
}

/// One table-like region extracted from a document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawFragment {
    /// Column labels, in column order.
    pub columns: Vec<ColumnLabel>,
    /// Data rows; cell `i` belongs to `columns[i]`.
    pub rows: Vec<Vec<String>>,
    /// 1-indexed page the fragment was found on, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
}

impl RawFragment {
    /// Fragment with textual headers.
    pub fn with_header<L, R, C>(columns: impl IntoIterator<Item = L>, rows: R) -> Self
    where
        L: Into<ColumnLabel>,
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: collect_rows(rows),
            page: None,
        }
    }

    /// Fragment without a detected header: columns are labelled `0..width`
    /// where `width` is the widest row.
    pub fn headerless<R, C>(rows: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        let rows = collect_rows(rows);
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        Self {
            columns: (0..width).map(ColumnLabel::Index).collect(),
            rows,
            page: None,
        }
    }

    /// Tag the fragment with the page it came from.
    pub fn on_page(mut self, page: usize) -> Self {
        self.page = Some(page);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// `true` when no column carries a textual label.
    pub fn is_headerless(&self) -> bool {
        self.columns.iter().all(ColumnLabel::is_index)
    }

    /// Cell text at (`row`, `col`); cells past the end of a short row read as
    /// the empty string.
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }
}

fn collect_rows<R, C>(rows: R) -> Vec<Vec<String>>
where
    R: IntoIterator<Item = C>,
    C: IntoIterator,
    C::Item: Into<String>,
{
    rows.into_iter()
        .map(|row| row.into_iter().map(Into::into).collect())
        .collect()
}
