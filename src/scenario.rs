//! Closing-balance trust classification.
//!
//! The model reports a closing balance for every month it can see, but not
//! every reported balance is an end-of-month figure. A statement cut
//! mid-month, or a month whose transactions simply stop early, yields a
//! number that looks authoritative and is not. This classifier is the
//! single source of truth for whether a closing balance can be trusted;
//! downstream consumers must not re-derive trust from raw model confidence
//! scores.

use crate::schema::{BalanceScenario, MonthEntry, RawMonthlyBalance, StatementPeriod};
use chrono::{Datelike, Days, NaiveDate};
use log::debug;

/// Classifier tuning. The incomplete-month threshold is a business
/// heuristic with no hard justification, so it is configuration rather
/// than a literal constant.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// A final month whose last transaction precedes the period end by
    /// more than this many days is treated as incomplete.
    pub incomplete_threshold_days: i64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            incomplete_threshold_days: 5,
        }
    }
}

/// Classify raw per-month balance candidates into validated entries.
///
/// Candidates whose month or year fails to parse as a valid integer are
/// discarded entirely rather than defaulted past validation.
pub fn classify_monthly_balances(
    candidates: &[RawMonthlyBalance],
    period: &StatementPeriod,
    last_transaction: Option<NaiveDate>,
    config: &ClassifierConfig,
) -> Vec<MonthEntry> {
    let period_end = last_day_of_month(period.end_year, period.end_month);
    let mut entries = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        let Some(month) = loose_u32(&candidate.month).filter(|m| (1..=12).contains(m)) else {
            debug!("Discarding balance candidate with unparseable month: {:?}", candidate.month);
            continue;
        };
        let Some(year) = loose_i32(&candidate.year).filter(|y| (1900..=2100).contains(y)) else {
            debug!("Discarding balance candidate with unparseable year: {:?}", candidate.year);
            continue;
        };

        entries.push(classify_one(candidate, month, year, period, period_end, last_transaction, config));
    }

    entries
}

fn classify_one(
    candidate: &RawMonthlyBalance,
    month: u32,
    year: i32,
    period: &StatementPeriod,
    period_end: NaiveDate,
    last_transaction: Option<NaiveDate>,
    config: &ClassifierConfig,
) -> MonthEntry {
    let mut entry = MonthEntry::empty(month, year);
    entry.opening_balance = candidate.opening_balance;

    let is_final_month = month == period.end_month && year == period.end_year;
    let own_last_txn = candidate
        .last_transaction_date
        .as_deref()
        .and_then(parse_loose_date);

    if is_final_month {
        let statement_last = last_transaction.or(own_last_txn);
        match statement_last {
            Some(last) => {
                let gap_days = (period_end - last).num_days();
                if gap_days <= 0 {
                    // Transactions run to the stated period end.
                    entry.scenario = Some(BalanceScenario::CompleteMonth);
                    entry.closing_balance = candidate.closing_balance;
                    entry.is_complete = true;
                    return entry;
                }
                if gap_days > config.incomplete_threshold_days {
                    // Current month, statement cut early. Whatever the model
                    // reported as a closing balance is not an end-of-month
                    // figure.
                    entry.scenario = Some(BalanceScenario::IncompleteMonth);
                    entry.closing_balance = None;
                    entry.is_complete = false;
                    entry.notes = Some(format!(
                        "Last transaction on {} is {} days before period end {}",
                        last, gap_days, period_end
                    ));
                    return entry;
                }
                // Within the tolerance window: close enough to month end.
                entry.scenario = Some(BalanceScenario::CompleteMonth);
                entry.closing_balance = candidate.closing_balance;
                entry.is_complete = true;
                return entry;
            }
            None => {
                // No transaction date to verify against; fall through to the
                // generic rules below.
            }
        }
    }

    if !is_final_month {
        if let Some(own_last) = own_last_txn {
            let month_end = last_day_of_month(year, month);
            let in_month = own_last.year() == year && own_last.month() == month;
            if in_month && own_last < month_end {
                entry.scenario = Some(BalanceScenario::EarlyEnd);
                entry.closing_balance = candidate
                    .last_transaction_balance
                    .or(candidate.closing_balance);
                entry.is_complete = false;
                entry.notes = Some(format!(
                    "Transactions end {} but month ends {}; balance is as of last transaction",
                    own_last, month_end
                ));
                return entry;
            }
        }
    }

    if candidate.closing_balance.is_none() {
        if let Some(balance) = candidate.last_transaction_balance {
            entry.scenario = Some(BalanceScenario::LastTransaction);
            entry.closing_balance = Some(balance);
            entry.is_complete = true;
            return entry;
        }
        return entry;
    }

    entry.scenario = Some(BalanceScenario::CompleteMonth);
    entry.closing_balance = candidate.closing_balance;
    entry.is_complete = true;
    entry
}

/// Last calendar day of a month.
pub fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    let next_month = if month == 12 { 1 } else { month + 1 };
    let next_year = if month == 12 { year + 1 } else { year };

    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .unwrap_or(NaiveDate::MAX)
        .checked_sub_days(Days::new(1))
        .unwrap_or(NaiveDate::MAX)
}

/// Parse a date in any of the formats the model or the documents use.
pub fn parse_loose_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    for format in ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%d %b %Y", "%d %B %Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Some(date);
        }
    }
    None
}

fn loose_u32(value: &serde_json::Value) -> Option<u32> {
    match value {
        serde_json::Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn loose_i32(value: &serde_json::Value) -> Option<i32> {
    match value {
        serde_json::Value::Number(n) => n.as_i64().and_then(|v| i32::try_from(v).ok()),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
