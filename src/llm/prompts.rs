// Per-mode system prompts and the user-prompt builder.

use crate::schema::{ExtractionMode, FieldKind, FieldSpec};

pub const SYSTEM_PROMPT_PAYMENT_RECEIPT: &str = r#"
You are a Payment Document Extraction Specialist for payroll and statutory
tax documents (PAYE, SHIF, NSSF, housing levy receipts).

## YOUR MISSION
Extract the requested fields from the document text exactly as written.

## RULES
1. Extract ONLY what is explicitly written. Never calculate or infer values.
2. Amounts: keep the number as printed (thousands separators allowed), no
   currency symbols.
3. Dates: output as YYYY-MM-DD.
4. payment_mode must be exactly "Mpesa" or "Bank Transfer".
5. bank_name: the paying bank. For Mpesa payments use "N/A".
6. If a requested field is not present in the document, return null for it.
   Do NOT guess.

## OUTPUT
Return ONLY one JSON object with the requested field names as keys, plus:
- "confidence": "HIGH", "MEDIUM" or "LOW"
- "quality_issues": array of strings describing anything that reduced your
  confidence (blurry scan, truncated text, ambiguous labels)
"#;

pub const SYSTEM_PROMPT_BANK_STATEMENT: &str = r#"
You are a Bank Statement Extraction Specialist.

## YOUR MISSION
Extract the requested fields plus per-month balance data from the statement
text.

## RULES
1. Extract ONLY what is explicitly written. Never calculate balances.
2. "statement_period": the period exactly as stated on the document.
3. "last_transaction_date": the date of the final transaction anywhere in
   the statement, as YYYY-MM-DD.
4. "monthly_balances": one object per calendar month covered, each with:
   - "month": integer 1-12
   - "year": four-digit integer
   - "opening_balance": number or null
   - "closing_balance": the explicit end-of-month balance, or null if the
     statement does not state one
   - "last_transaction_date": date of that month's final transaction,
     YYYY-MM-DD, or null
   - "last_transaction_balance": running balance after that transaction,
     or null
5. If a month has no explicit end-of-month balance, leave closing_balance
   null and fill last_transaction_balance instead. Do NOT substitute one
   for the other yourself.
6. If a requested field is not present, return null for it.

## OUTPUT
Return ONLY one JSON object with the requested field names as keys, plus
"statement_period", "last_transaction_date", "monthly_balances",
"confidence" ("HIGH"/"MEDIUM"/"LOW") and "quality_issues" (array of
strings).
"#;

pub fn system_prompt_for(mode: ExtractionMode) -> &'static str {
    match mode {
        ExtractionMode::PaymentReceipt => SYSTEM_PROMPT_PAYMENT_RECEIPT,
        ExtractionMode::BankStatement => SYSTEM_PROMPT_BANK_STATEMENT,
    }
}

/// Build the user prompt: the field schema followed by the document text.
pub fn build_user_prompt(fields: &[FieldSpec], document_text: &str) -> String {
    let mut prompt = String::from("Extract the following fields:\n");
    for field in fields {
        prompt.push_str(&format!(
            "- \"{}\" ({}{})\n",
            field.name,
            kind_label(field.kind),
            if field.required { ", required" } else { "" },
        ));
    }
    prompt.push_str("\nReturn exactly one JSON object. Document text follows.\n\n");
    prompt.push_str(document_text);
    prompt
}

fn kind_label(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::Text => "text",
        FieldKind::Amount => "numeric amount",
        FieldKind::Date => "date, YYYY-MM-DD",
        FieldKind::BankName => "bank name",
        FieldKind::PaymentMode => "one of: Mpesa, Bank Transfer",
    }
}
