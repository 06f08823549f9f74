//! Output types: normalised records, run statistics and the JSON envelope.

use serde::{Deserialize, Serialize};

/// The five columns the normaliser knows how to recognise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetColumn {
    Date,
    Narration,
    Withdrawal,
    Deposit,
    ClosingBalance,
}

impl TargetColumn {
    /// Match order. The first label matching a target claims it.
    pub const ALL: [TargetColumn; 5] = [
        TargetColumn::Date,
        TargetColumn::Narration,
        TargetColumn::Withdrawal,
        TargetColumn::Deposit,
        TargetColumn::ClosingBalance,
    ];

    /// Key used for this column in a [`NormalizedRecord`].
    pub fn output_key(self) -> &'static str {
        match self {
            TargetColumn::Date => "Date",
            TargetColumn::Narration => "Narration",
            TargetColumn::Withdrawal => "Withdrawal Amount",
            TargetColumn::Deposit => "Deposit Amount",
            TargetColumn::ClosingBalance => "Closing Balance",
        }
    }

    /// Whether a source column label identifies this target.
    ///
    /// Date and narration need an exact (trimmed, case-insensitive) label;
    /// the amount columns match on a substring so that variants such as
    /// `Withdrawal Amt.` or `Deposit(Cr)` are picked up.
    pub fn matches(self, label: &str) -> bool {
        let lower = label.to_lowercase();
        match self {
            TargetColumn::Date => lower.trim() == "date",
            TargetColumn::Narration => matches!(lower.trim(), "narration" | "description"),
            TargetColumn::Withdrawal => lower.contains("withdrawal"),
            TargetColumn::Deposit => lower.contains("deposit"),
            TargetColumn::ClosingBalance => lower.contains("closing balance"),
        }
    }
}

/// One transaction row in the fixed output schema.
///
/// Columns that were not found in the source table are omitted from the
/// serialised form rather than written as `null`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NormalizedRecord {
    #[serde(rename = "Date", default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(rename = "Narration", default, skip_serializing_if = "Option::is_none")]
    pub narration: Option<String>,
    #[serde(
        rename = "Withdrawal Amount",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub withdrawal_amount: Option<String>,
    #[serde(rename = "Deposit Amount", default, skip_serializing_if = "Option::is_none")]
    pub deposit_amount: Option<String>,
    #[serde(
        rename = "Closing Balance",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub closing_balance: Option<String>,
}

impl NormalizedRecord {
    pub fn set(&mut self, target: TargetColumn, value: impl Into<String>) {
        *self.slot_mut(target) = Some(value.into());
    }

    fn slot_mut(&mut self, target: TargetColumn) -> &mut Option<String> {
        match target {
            TargetColumn::Date => &mut self.date,
            TargetColumn::Narration => &mut self.narration,
            TargetColumn::Withdrawal => &mut self.withdrawal_amount,
            TargetColumn::Deposit => &mut self.deposit_amount,
            TargetColumn::ClosingBalance => &mut self.closing_balance,
        }
    }
}

/// Counters collected while normalising one batch of fragments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizeStats {
    /// Fragments received from the table source.
    pub fragments_found: usize,
    /// Fragments that contributed at least one column mapping.
    pub fragments_used: usize,
    /// Fragments skipped because they had no data rows.
    pub fragments_empty: usize,
    /// Fragments skipped because no column matched a target.
    pub fragments_unmatched: usize,
    /// Fragments whose labels were rewritten from the canonical headers.
    pub fragments_realigned: usize,
    /// Records emitted.
    pub records: usize,
}

/// Statistics for a full extraction run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionStats {
    #[serde(flatten)]
    pub normalize: NormalizeStats,
    /// Wall-clock time spent in the table source.
    pub extract_duration_ms: u64,
    /// Wall-clock time for the whole run, input resolution included.
    pub total_duration_ms: u64,
}

/// Result of a successful extraction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionOutput {
    /// Normalised records in document order.
    pub data: Vec<NormalizedRecord>,
    pub stats: ExtractionStats,
}

impl ExtractionOutput {
    /// The `{"data": [...]}` body returned by the HTTP endpoint and written
    /// by [`crate::extract_to_file`].
    pub fn envelope(&self) -> DataEnvelope<'_> {
        DataEnvelope { data: &self.data }
    }
}

/// Serialisable `{"data": [...]}` wrapper.
#[derive(Debug, Serialize)]
pub struct DataEnvelope<'a> {
    pub data: &'a [NormalizedRecord],
}
