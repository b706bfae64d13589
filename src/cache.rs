//! Request fingerprinting, result caching, and file-pair deduplication.
//!
//! Extraction calls are billable, so repeated work is cut off in two
//! places: a whole-batch cache keyed by (period, record set, mode), and a
//! pre-network dedup of statements that point at identical underlying
//! files. Cache entries live for the application session; there is no
//! automatic expiry.

use crate::schema::{DocumentOutcome, ExtractionMode, StatementRecord};
use std::collections::HashMap;
use std::sync::Mutex;

/// Deterministic fingerprint for a batch request: period identifier,
/// sorted record-id list, and mode.
pub fn fingerprint(period_key: &str, record_ids: &[String], mode: ExtractionMode) -> String {
    let mut ids: Vec<&str> = record_ids.iter().map(String::as_str).collect();
    ids.sort_unstable();
    format!("{}|{}|{}", period_key, ids.join(","), mode)
}

#[derive(Default)]
pub struct ExtractionCache {
    entries: Mutex<HashMap<String, Vec<DocumentOutcome>>>,
}

impl ExtractionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, fingerprint: &str) -> Option<Vec<DocumentOutcome>> {
        self.entries.lock().unwrap().get(fingerprint).cloned()
    }

    pub fn put(&self, fingerprint: String, outcomes: Vec<DocumentOutcome>) {
        self.entries.lock().unwrap().insert(fingerprint, outcomes);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One unit of extraction work after dedup: a file pair plus the indices
/// of every input record that shares it.
#[derive(Debug, Clone)]
pub struct ExtractionUnit {
    pub pdf_path: String,
    pub excel_path: Option<String>,
    pub password: Option<String>,
    /// Indices into the original record slice, in input order.
    pub members: Vec<usize>,
}

/// Group statements that reference identical document paths into single
/// units of work. Two records filed under different calendar months but
/// backed by the same (pdf, excel) pair are extracted once; the result is
/// fanned out to all members. Unit order follows first appearance so batch
/// output order stays deterministic.
pub fn dedup_statements(records: &[StatementRecord]) -> Vec<ExtractionUnit> {
    let mut units: Vec<ExtractionUnit> = Vec::new();
    let mut index_by_pair: HashMap<(String, Option<String>), usize> = HashMap::new();

    for (index, record) in records.iter().enumerate() {
        let pair = (record.pdf_path.clone(), record.excel_path.clone());
        match index_by_pair.get(&pair) {
            Some(&unit_index) => units[unit_index].members.push(index),
            None => {
                index_by_pair.insert(pair, units.len());
                units.push(ExtractionUnit {
                    pdf_path: record.pdf_path.clone(),
                    excel_path: record.excel_path.clone(),
                    password: record.password.clone(),
                    members: vec![index],
                });
            }
        }
    }

    units
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ExtractionResult;

    fn record(id: &str, month: u32, pdf: &str, excel: Option<&str>) -> StatementRecord {
        StatementRecord {
            record_id: id.to_string(),
            month,
            year: 2024,
            pdf_path: pdf.to_string(),
            excel_path: excel.map(String::from),
            password: None,
        }
    }

    #[test]
    fn test_fingerprint_sorts_record_ids() {
        let a = fingerprint(
            "2024-01:2024-03",
            &["b".to_string(), "a".to_string()],
            ExtractionMode::BankStatement,
        );
        let b = fingerprint(
            "2024-01:2024-03",
            &["a".to_string(), "b".to_string()],
            ExtractionMode::BankStatement,
        );
        assert_eq!(a, b);
        assert_eq!(a, "2024-01:2024-03|a,b|bank_statement");
    }

    #[test]
    fn test_fingerprint_distinguishes_mode() {
        let ids = vec!["a".to_string()];
        assert_ne!(
            fingerprint("p", &ids, ExtractionMode::BankStatement),
            fingerprint("p", &ids, ExtractionMode::PaymentReceipt)
        );
    }

    #[test]
    fn test_identical_file_pairs_collapse_to_one_unit() {
        let records = vec![
            record("r1", 1, "stmts/jan-mar.pdf", Some("stmts/jan-mar.xlsx")),
            record("r2", 2, "stmts/jan-mar.pdf", Some("stmts/jan-mar.xlsx")),
            record("r3", 3, "stmts/march.pdf", None),
        ];

        let units = dedup_statements(&records);
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].members, vec![0, 1]);
        assert_eq!(units[1].members, vec![2]);
    }

    #[test]
    fn test_same_pdf_different_excel_is_not_deduped() {
        let records = vec![
            record("r1", 1, "a.pdf", Some("a.xlsx")),
            record("r2", 2, "a.pdf", Some("b.xlsx")),
        ];
        assert_eq!(dedup_statements(&records).len(), 2);
    }

    #[test]
    fn test_cache_round_trip() {
        let cache = ExtractionCache::new();
        assert!(cache.get("fp").is_none());

        cache.put(
            "fp".to_string(),
            vec![DocumentOutcome {
                record_id: "r1".to_string(),
                pdf_path: "a.pdf".to_string(),
                result: ExtractionResult::failure("x"),
            }],
        );

        let hit = cache.get("fp").unwrap();
        assert_eq!(hit.len(), 1);
        assert_eq!(hit[0].record_id, "r1");
    }
}
