//! Field-level validation of a completed extraction record.
//!
//! Validation never mutates the record and never blocks a save by itself;
//! source documents are sometimes genuinely incomplete, so the caller
//! decides whether a failing report blocks or merely warns.

use crate::scenario::parse_loose_date;
use serde::{Deserialize, Serialize};

/// Closed set of accepted payment modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMode {
    Mpesa,
    BankTransfer,
}

impl PaymentMode {
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "mpesa" | "m-pesa" => Some(PaymentMode::Mpesa),
            "bank transfer" | "bank_transfer" => Some(PaymentMode::BankTransfer),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMode::Mpesa => "Mpesa",
            PaymentMode::BankTransfer => "Bank Transfer",
        }
    }
}

/// The flattened payment fields a reviewer saves.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentExtraction {
    pub amount: Option<String>,
    pub payment_date: Option<String>,
    pub payment_mode: Option<String>,
    pub bank_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<FieldError>,
}

/// Validate a payment extraction. Amount must parse as a non-NaN number
/// after stripping thousands separators; the date must be a real calendar
/// date; the mode must be in the closed enum; bank name is required only
/// for bank transfers (mobile money implies "N/A" and is exempt).
pub fn validate_payment(record: &PaymentExtraction) -> ValidationReport {
    let mut errors = Vec::new();

    match record.amount.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => {
            let cleaned = raw.replace(',', "");
            match cleaned.parse::<f64>() {
                Ok(value) if !value.is_nan() => {}
                _ => errors.push(FieldError {
                    field: "amount".to_string(),
                    message: format!("'{}' is not a valid amount", raw),
                }),
            }
        }
        _ => errors.push(FieldError {
            field: "amount".to_string(),
            message: "Amount is required".to_string(),
        }),
    }

    match record.payment_date.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => {
            if parse_loose_date(raw).is_none() {
                errors.push(FieldError {
                    field: "payment_date".to_string(),
                    message: format!("'{}' is not a valid date", raw),
                });
            }
        }
        _ => errors.push(FieldError {
            field: "payment_date".to_string(),
            message: "Payment date is required".to_string(),
        }),
    }

    let mode = record
        .payment_mode
        .as_deref()
        .and_then(PaymentMode::parse);
    if record
        .payment_mode
        .as_deref()
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
        .is_none()
        || mode.is_none()
    {
        errors.push(FieldError {
            field: "payment_mode".to_string(),
            message: "Payment mode must be Mpesa or Bank Transfer".to_string(),
        });
    }

    if mode == Some(PaymentMode::BankTransfer) {
        let has_bank = record
            .bank_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty() && !name.eq_ignore_ascii_case("n/a"))
            .is_some();
        if !has_bank {
            errors.push(FieldError {
                field: "bank_name".to_string(),
                message: "Bank name is required for bank transfers".to_string(),
            });
        }
    }

    ValidationReport {
        is_valid: errors.is_empty(),
        errors,
    }
}
