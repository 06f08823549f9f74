//! Table normalisation: fold raw fragments into one list of records.
//!
//! Statements split one logical transaction table across pages (and
//! sometimes across several detected regions on a page). Continuation
//! tables frequently lose their header row or come back with different
//! labels. The normaliser:
//!
//! 1. drops fragments without rows,
//! 2. promotes the first row to the header when the source found none,
//! 3. remembers the first fragment's labels as the canonical headers,
//! 4. optionally relabels later fragments from the canonical headers
//!    ([`HeaderAlignment::ByPosition`]),
//! 5. matches labels against the five [`TargetColumn`]s, and
//! 6. projects every row onto the matched columns.
//!
//! It is pure: no I/O, no shared state, no errors. Skip decisions are logged
//! at debug level on the span supplied by the caller.

use crate::config::{ExtractionConfig, HeaderAlignment};
use crate::fragment::RawFragment;
use crate::output::{NormalizeStats, NormalizedRecord, TargetColumn};
use tracing::{debug, warn, Span};

/// Stateless normaliser; per-run state (the canonical headers) lives on the
/// stack of [`TableNormalizer::normalize_with_stats`].
#[derive(Debug, Clone)]
pub struct TableNormalizer {
    alignment: HeaderAlignment,
    schema_guard: bool,
    span: Span,
}

impl Default for TableNormalizer {
    fn default() -> Self {
        Self::new(HeaderAlignment::default())
    }
}

impl TableNormalizer {
    pub fn new(alignment: HeaderAlignment) -> Self {
        Self {
            alignment,
            schema_guard: false,
            span: Span::current(),
        }
    }

    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new(config.alignment).with_schema_guard(config.schema_guard)
    }

    pub fn with_schema_guard(mut self, enabled: bool) -> Self {
        self.schema_guard = enabled;
        self
    }

    /// Attach the span that log events for this run are recorded under.
    /// Defaults to the span that was current when the normaliser was built.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Normalise `fragments` in order, discarding the counters.
    pub fn normalize(&self, fragments: Vec<RawFragment>) -> Vec<NormalizedRecord> {
        self.normalize_with_stats(fragments).0
    }

    /// Normalise `fragments` in order and report what happened to each.
    pub fn normalize_with_stats(
        &self,
        fragments: Vec<RawFragment>,
    ) -> (Vec<NormalizedRecord>, NormalizeStats) {
        let mut stats = NormalizeStats {
            fragments_found: fragments.len(),
            ..NormalizeStats::default()
        };
        let mut canonical_headers: Option<Vec<String>> = None;
        let mut records = Vec::new();

        for (idx, fragment) in fragments.into_iter().enumerate() {
            if fragment.is_empty() {
                debug!(
                    parent: &self.span,
                    fragment = idx,
                    page = ?fragment.page,
                    "skipping fragment without rows"
                );
                stats.fragments_empty += 1;
                continue;
            }

            let (labels, body_start) = split_header(&fragment);
            let canonical = canonical_headers.get_or_insert_with(|| labels.clone());
            let labels = match self.align(idx, labels, canonical) {
                Aligned::Kept(labels) => labels,
                Aligned::Relabelled(labels) => {
                    stats.fragments_realigned += 1;
                    labels
                }
            };

            let targets = match_targets(&labels);
            if targets.is_empty() {
                debug!(
                    parent: &self.span,
                    fragment = idx,
                    ?labels,
                    "no recognised column, skipping fragment"
                );
                stats.fragments_unmatched += 1;
                continue;
            }

            debug!(
                parent: &self.span,
                fragment = idx,
                rows = fragment.rows.len() - body_start,
                matched = targets.len(),
                "normalising fragment"
            );
            stats.fragments_used += 1;
            records.extend(
                (body_start..fragment.rows.len()).map(|row| project(&fragment, row, &targets)),
            );
        }

        stats.records = records.len();
        (records, stats)
    }

    fn align(&self, idx: usize, labels: Vec<String>, canonical: &[String]) -> Aligned {
        if self.alignment == HeaderAlignment::ByLabel || labels == canonical {
            return Aligned::Kept(labels);
        }

        let width = labels.len();
        if self.schema_guard && width != canonical.len() {
            debug!(
                parent: &self.span,
                fragment = idx,
                width,
                canonical_width = canonical.len(),
                "schema guard: width differs from canonical headers, keeping own labels"
            );
            return Aligned::Kept(labels);
        }
        if width > canonical.len() {
            warn!(
                parent: &self.span,
                fragment = idx,
                width,
                canonical_width = canonical.len(),
                "fragment is wider than canonical headers, keeping own labels"
            );
            return Aligned::Kept(labels);
        }

        debug!(
            parent: &self.span,
            fragment = idx,
            from = ?labels,
            "relabelling fragment from canonical headers"
        );
        Aligned::Relabelled(canonical[..width].to_vec())
    }
}

enum Aligned {
    Kept(Vec<String>),
    Relabelled(Vec<String>),
}

/// Resolve the fragment's labels and the index of its first data row,
/// promoting row 0 when the source reported positional labels only.
fn split_header(fragment: &RawFragment) -> (Vec<String>, usize) {
    if fragment.is_headerless() {
        let labels = (0..fragment.width())
            .map(|col| fragment.cell(0, col).to_string())
            .collect();
        (labels, 1)
    } else {
        (fragment.columns.iter().map(ToString::to_string).collect(), 0)
    }
}

/// First column index matching each target, in [`TargetColumn::ALL`] order.
fn match_targets(labels: &[String]) -> Vec<(TargetColumn, usize)> {
    TargetColumn::ALL
        .iter()
        .filter_map(|&target| {
            labels
                .iter()
                .position(|label| target.matches(label))
                .map(|col| (target, col))
        })
        .collect()
}

fn project(
    fragment: &RawFragment,
    row: usize,
    targets: &[(TargetColumn, usize)],
) -> NormalizedRecord {
    let mut record = NormalizedRecord::default();
    for &(target, col) in targets {
        record.set(target, fragment.cell(row, col));
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::ColumnLabel;

    fn statement_header() -> Vec<&'static str> {
        vec!["Date", "Narration", "Withdrawal", "Deposit", "Closing Balance"]
    }

    fn statement_fragment() -> RawFragment {
        RawFragment::with_header(statement_header(), vec![vec!["01/01", "ATM", "100", "", "500"]])
    }

    fn by_position() -> TableNormalizer {
        TableNormalizer::new(HeaderAlignment::ByPosition)
    }

    #[test]
    fn empty_input_yields_nothing() {
        let (records, stats) = TableNormalizer::default().normalize_with_stats(vec![]);
        assert!(records.is_empty());
        assert_eq!(stats, NormalizeStats::default());
    }

    #[test]
    fn end_to_end_single_fragment() {
        let fragment = RawFragment::with_header(
            ["Date", "Narration", "Withdrawal(Dr)", "Deposit(Cr)", "Closing Balance"],
            vec![vec!["01/01", "ATM", "100", "", "500"]],
        );
        let records = TableNormalizer::default().normalize(vec![fragment]);
        assert_eq!(records.len(), 1);
        let json = serde_json::to_value(&records[0]).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "Date": "01/01",
                "Narration": "ATM",
                "Withdrawal Amount": "100",
                "Deposit Amount": "",
                "Closing Balance": "500"
            })
        );
    }

    #[test]
    fn zero_row_fragment_contributes_nothing() {
        let empty = RawFragment::with_header(statement_header(), Vec::<Vec<&str>>::new());
        let (records, stats) = TableNormalizer::default().normalize_with_stats(vec![empty]);
        assert!(records.is_empty());
        assert_eq!(stats.fragments_empty, 1);
    }

    #[test]
    fn headerless_fragment_promotes_first_row() {
        let fragment = RawFragment::headerless(vec![
            vec!["Date", "Description", "Closing Balance"],
            vec!["02/01", "UPI", "400"],
            vec!["03/01", "NEFT", "900"],
        ]);
        let records = TableNormalizer::default().normalize(vec![fragment]);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].date.as_deref(), Some("02/01"));
        assert_eq!(records[0].narration.as_deref(), Some("UPI"));
        assert_eq!(records[1].closing_balance.as_deref(), Some("900"));
        assert_eq!(records[0].withdrawal_amount, None);
    }

    #[test]
    fn headerless_single_row_fragment_yields_no_records() {
        let fragment = RawFragment::headerless(vec![vec!["Date", "Narration"]]);
        let records = TableNormalizer::default().normalize(vec![fragment]);
        assert!(records.is_empty());
    }

    #[test]
    fn by_position_overwrites_differing_labels() {
        let a = statement_fragment();
        let b = RawFragment::with_header(
            ["1", "2", "3", "4", "5"],
            vec![vec!["02/01", "POS", "50", "", "450"]],
        );
        let (records, stats) = by_position().normalize_with_stats(vec![a, b]);
        assert_eq!(stats.fragments_realigned, 1);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].date.as_deref(), Some("02/01"));
        assert_eq!(records[1].withdrawal_amount.as_deref(), Some("50"));
        assert_eq!(records[1].closing_balance.as_deref(), Some("450"));
    }

    #[test]
    fn by_position_uses_canonical_prefix_for_narrower_fragment() {
        let a = statement_fragment();
        let b = RawFragment::with_header(["x", "y"], vec![vec!["02/01", "POS"]]);
        let records = by_position().normalize(vec![a, b]);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].date.as_deref(), Some("02/01"));
        assert_eq!(records[1].narration.as_deref(), Some("POS"));
        assert_eq!(records[1].closing_balance, None);
    }

    #[test]
    fn by_position_keeps_labels_of_wider_fragment() {
        let a = RawFragment::with_header(["Date", "Narration"], vec![vec!["01/01", "ATM"]]);
        let b = RawFragment::with_header(["a", "b", "c"], vec![vec!["1", "2", "3"]]);
        let (records, stats) = by_position().normalize_with_stats(vec![a, b]);
        assert_eq!(records.len(), 1);
        assert_eq!(stats.fragments_unmatched, 1);
        assert_eq!(stats.fragments_realigned, 0);
    }

    #[test]
    fn by_label_never_relabels() {
        let a = statement_fragment();
        let b = RawFragment::with_header(
            ["1", "2", "3", "4", "5"],
            vec![vec!["02/01", "POS", "50", "", "450"]],
        );
        let (records, stats) = TableNormalizer::default().normalize_with_stats(vec![a, b]);
        assert_eq!(records.len(), 1);
        assert_eq!(stats.fragments_realigned, 0);
        assert_eq!(stats.fragments_unmatched, 1);
    }

    #[test]
    fn schema_guard_refuses_width_mismatch() {
        let a = statement_fragment();
        let summary = RawFragment::with_header(
            ["Opening", "Total"],
            vec![vec!["1,000", "5,000"]],
        );
        let normalizer = by_position().with_schema_guard(true);
        let (records, stats) = normalizer.normalize_with_stats(vec![a, summary]);
        assert_eq!(records.len(), 1);
        assert_eq!(stats.fragments_unmatched, 1);
        assert_eq!(stats.fragments_realigned, 0);
    }

    #[test]
    fn canonical_headers_come_from_promoted_first_fragment() {
        let a = RawFragment::headerless(vec![
            vec!["Date", "Narration", "Closing Balance"],
            vec!["01/01", "ATM", "500"],
        ]);
        let b = RawFragment::headerless(vec![
            vec!["02/01", "POS", "450"],
            vec!["03/01", "FEE", "440"],
        ]);
        let records = by_position().normalize(vec![a, b]);
        // b's first row becomes its (wrong) header, then gets relabelled.
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].date.as_deref(), Some("03/01"));
        assert_eq!(records[1].closing_balance.as_deref(), Some("440"));
    }

    #[test]
    fn narration_and_description_map_to_narration() {
        for label in ["Narration", " DESCRIPTION ", "description"] {
            let fragment = RawFragment::with_header([label], vec![vec!["ATM"]]);
            let records = TableNormalizer::default().normalize(vec![fragment]);
            assert_eq!(records[0].narration.as_deref(), Some("ATM"), "label {label:?}");
        }
    }

    #[test]
    fn withdrawal_dr_maps_to_withdrawal_amount() {
        let fragment = RawFragment::with_header(["Withdrawal Dr"], vec![vec!["250.00"]]);
        let records = TableNormalizer::default().normalize(vec![fragment]);
        let json = serde_json::to_string(&records[0]).unwrap();
        assert_eq!(json, r#"{"Withdrawal Amount":"250.00"}"#);
    }

    #[test]
    fn unmatched_fragment_is_skipped() {
        let fragment =
            RawFragment::with_header(["Account", "Branch"], vec![vec!["123", "MG Road"]]);
        let (records, stats) = TableNormalizer::default().normalize_with_stats(vec![fragment]);
        assert!(records.is_empty());
        assert_eq!(stats.fragments_unmatched, 1);
        assert_eq!(stats.fragments_used, 0);
    }

    #[test]
    fn first_matching_label_wins() {
        let fragment = RawFragment::with_header(
            ["Deposit Ref", "Deposit Amount"],
            vec![vec!["REF1", "100"]],
        );
        let records = TableNormalizer::default().normalize(vec![fragment]);
        assert_eq!(records[0].deposit_amount.as_deref(), Some("REF1"));
    }

    #[test]
    fn order_is_fragment_then_row() {
        let a = RawFragment::with_header(["Date"], vec![vec!["1"], vec!["2"]]);
        let skipped = RawFragment::with_header(["Other"], vec![vec!["x"]]);
        let b = RawFragment::with_header(["Date"], vec![vec!["3"]]);
        let records = TableNormalizer::default().normalize(vec![a, skipped, b]);
        let dates: Vec<_> = records.iter().filter_map(|r| r.date.as_deref()).collect();
        assert_eq!(dates, vec!["1", "2", "3"]);
    }

    #[test]
    fn short_rows_read_missing_cells_as_empty() {
        let fragment = RawFragment::with_header(["Date", "Closing Balance"], vec![vec!["01/01"]]);
        let records = TableNormalizer::default().normalize(vec![fragment]);
        assert_eq!(records[0].closing_balance.as_deref(), Some(""));
    }

    #[test]
    fn mixed_labels_are_not_promoted() {
        let fragment = RawFragment {
            columns: vec![ColumnLabel::Index(0), ColumnLabel::from("Date")],
            rows: vec![vec!["a".into(), "01/01".into()]],
            page: Some(1),
        };
        let records = TableNormalizer::default().normalize(vec![fragment]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].date.as_deref(), Some("01/01"));
    }

    #[test]
    fn stats_count_records_and_used_fragments() {
        let a = RawFragment::with_header(["Date"], vec![vec!["1"], vec!["2"]]);
        let empty = RawFragment::with_header(["Date"], Vec::<Vec<&str>>::new());
        let (_, stats) = TableNormalizer::default().normalize_with_stats(vec![a, empty]);
        assert_eq!(stats.fragments_found, 2);
        assert_eq!(stats.fragments_used, 1);
        assert_eq!(stats.fragments_empty, 1);
        assert_eq!(stats.records, 2);
    }
}
