use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A statement period normalized to month/year bounds.
///
/// Always satisfies `end >= start` chronologically; parsers swap reversed
/// input rather than rejecting it. Re-derived from the source string on
/// every parse, never cached across calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementPeriod {
    pub start_month: u32,
    pub start_year: i32,
    pub end_month: u32,
    pub end_year: i32,
}

impl StatementPeriod {
    pub fn new(start_month: u32, start_year: i32, end_month: u32, end_year: i32) -> Self {
        let period = Self {
            start_month,
            start_year,
            end_month,
            end_year,
        };
        period.normalized()
    }

    /// Months since year 0, used for ordering comparisons.
    pub fn start_ordinal(&self) -> i64 {
        self.start_year as i64 * 12 + self.start_month as i64
    }

    pub fn end_ordinal(&self) -> i64 {
        self.end_year as i64 * 12 + self.end_month as i64
    }

    /// Swap start and end if the input was reversed (data-entry inversion).
    pub fn normalized(self) -> Self {
        if self.end_ordinal() < self.start_ordinal() {
            Self {
                start_month: self.end_month,
                start_year: self.end_year,
                end_month: self.start_month,
                end_year: self.start_year,
            }
        } else {
            self
        }
    }

    /// Stable identifier used in cache fingerprints.
    pub fn key(&self) -> String {
        format!(
            "{:04}-{:02}:{:04}-{:02}",
            self.start_year, self.start_month, self.end_year, self.end_month
        )
    }
}

/// A bare month/year position produced by range expansion, before any
/// balance data is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthSlot {
    pub month: u32,
    pub year: i32,
}

/// Completeness scenario assigned to a month's closing balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BalanceScenario {
    /// The month is fully covered and the balance is an end-of-month figure.
    CompleteMonth,
    /// The current/most-recent month with transactions stopping well short
    /// of the period end. Its closing balance cannot be trusted.
    IncompleteMonth,
    /// A non-final month whose own transactions end mid-month; the balance
    /// is as of the last transaction in that month.
    EarlyEnd,
    /// No explicit end-of-month balance, but a last-transaction balance
    /// exists and stands in for it.
    LastTransaction,
}

/// One classified month of a statement.
///
/// Created by the balance scenario classifier, one per month in the
/// expanded range; never mutated afterwards except through explicit human
/// review in the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthEntry {
    pub month: u32,
    pub year: i32,
    pub opening_balance: Option<f64>,
    pub closing_balance: Option<f64>,
    pub is_complete: bool,
    pub scenario: Option<BalanceScenario>,
    pub notes: Option<String>,
}

impl MonthEntry {
    pub fn empty(month: u32, year: i32) -> Self {
        Self {
            month,
            year,
            opening_balance: None,
            closing_balance: None,
            is_complete: false,
            scenario: None,
            notes: None,
        }
    }
}

/// A raw per-month balance candidate as reported by the model, before the
/// classifier has assigned a trust scenario. Month and year are kept as
/// loose JSON values because models occasionally emit them as strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawMonthlyBalance {
    #[serde(default)]
    pub month: serde_json::Value,
    #[serde(default)]
    pub year: serde_json::Value,
    #[serde(default)]
    pub opening_balance: Option<f64>,
    #[serde(default)]
    pub closing_balance: Option<f64>,
    #[serde(default)]
    pub last_transaction_date: Option<String>,
    #[serde(default)]
    pub last_transaction_balance: Option<f64>,
}

/// Semantic type of an extracted field, used to build the model prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Amount,
    Date,
    BankName,
    PaymentMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: FieldKind, required: bool) -> Self {
        Self {
            name: name.into(),
            kind,
            required,
        }
    }
}

/// Which document family is being extracted. Selects the system prompt and
/// participates in cache fingerprints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMode {
    PaymentReceipt,
    BankStatement,
}

impl ExtractionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMode::PaymentReceipt => "payment_receipt",
            ExtractionMode::BankStatement => "bank_statement",
        }
    }
}

impl std::fmt::Display for ExtractionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single extraction job: one document, one field schema, one mode.
/// Stateless and transient; never persisted by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionRequest {
    pub record_id: String,
    pub document_path: String,
    pub excel_path: Option<String>,
    pub password: Option<String>,
    pub fields: Vec<FieldSpec>,
    pub mode: ExtractionMode,
}

/// Model confidence bucket reported alongside an extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_uppercase().as_str() {
            "HIGH" => Some(Confidence::High),
            "MEDIUM" => Some(Confidence::Medium),
            "LOW" => Some(Confidence::Low),
            _ => None,
        }
    }
}

/// Normalized outcome of one extraction request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub success: bool,
    pub fields: BTreeMap<String, serde_json::Value>,
    pub confidence: Confidence,
    pub quality_issues: Vec<String>,
    pub requires_password: bool,
    pub monthly_balances: Vec<MonthEntry>,
    pub error: Option<String>,
}

impl ExtractionResult {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            fields: BTreeMap::new(),
            confidence: Confidence::Low,
            quality_issues: Vec::new(),
            requires_password: false,
            monthly_balances: Vec::new(),
            error: Some(message.into()),
        }
    }

    pub fn password_required() -> Self {
        let mut result = Self::failure("Document is password protected");
        result.requires_password = true;
        result
    }
}

/// One statement row as stored by the caller: a record id, the calendar
/// month it is filed under, and the underlying file pair. Two records with
/// the same file pair are one unit of extraction work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatementRecord {
    pub record_id: String,
    pub month: u32,
    pub year: i32,
    pub pdf_path: String,
    pub excel_path: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Per-record outcome of a bulk run. Bulk processing yields exactly one of
/// these per input record, in input order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentOutcome {
    pub record_id: String,
    pub pdf_path: String,
    pub result: ExtractionResult,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_normalization_swaps_reversed_bounds() {
        let period = StatementPeriod::new(3, 2024, 1, 2024);
        assert_eq!(period.start_month, 1);
        assert_eq!(period.end_month, 3);
        assert!(period.end_ordinal() >= period.start_ordinal());
    }

    #[test]
    fn test_period_key_is_stable() {
        let period = StatementPeriod::new(11, 2024, 2, 2025);
        assert_eq!(period.key(), "2024-11:2025-02");
    }

    #[test]
    fn test_confidence_parse() {
        assert_eq!(Confidence::parse("high"), Some(Confidence::High));
        assert_eq!(Confidence::parse(" MEDIUM "), Some(Confidence::Medium));
        assert_eq!(Confidence::parse("certain"), None);
    }
}
