//! # Statement Extractor
//!
//! A library for extracting structured fields from payroll receipts and bank
//! statements (PDFs) via LLM, with monthly balance reconciliation and
//! validation.
//!
//! ## Core Concepts
//!
//! - **Extraction Mode**: payment receipts yield flat fields; bank statements
//!   additionally yield per-month balance entries
//! - **Statement Period**: the month range a statement covers, parsed from
//!   free-form text ("01/01/2024 - 31/03/2024", "Jan to Mar 2024", ...)
//! - **Balance Scenario**: each month of the period is classified as a
//!   complete month, an incomplete final month, an early-ended month, or a
//!   last-transaction fallback
//! - **Key Pool**: API keys rotate round-robin with failure tracking and
//!   rate-limit cooldowns
//! - **Batch Cache**: a batch of statement records is fingerprinted so a
//!   repeat run returns cached outcomes without any model calls
//!
//! ## Example
//!
//! ```rust,ignore
//! use statement_extractor::*;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! let store = Arc::new(InMemoryStore::new());
//! let model = Arc::new(GeminiClient::default());
//! let keys = Arc::new(KeyPool::new(vec!["key-1".into(), "key-2".into()]));
//!
//! let orchestrator = ExtractionOrchestrator::new(store, model, keys);
//!
//! let fields = vec![
//!     FieldSpec::new("amount", FieldKind::Amount, true),
//!     FieldSpec::new("payment_date", FieldKind::Date, true),
//! ];
//!
//! let outcomes = orchestrator
//!     .process_bulk(
//!         &records,
//!         &fields,
//!         ExtractionMode::BankStatement,
//!         Some(&period),
//!         None,
//!         CancellationToken::new(),
//!     )
//!     .await;
//! ```

pub mod cache;
pub mod chunking;
pub mod error;
pub mod keypool;
pub mod llm;
pub mod months;
pub mod orchestrator;
pub mod pdf;
pub mod period;
pub mod scenario;
pub mod schema;
pub mod storage;
pub mod validation;

pub use cache::{dedup_statements, fingerprint, ExtractionCache, ExtractionUnit};
pub use chunking::{chunk_pages, combine_pages, TextChunk, DEFAULT_CHUNK_CHARS};
pub use error::{ExtractionError, Result};
pub use keypool::KeyPool;
pub use llm::{ExtractionEvent, ExtractionModel, GeminiClient};
pub use months::{expand_month_range, expand_period};
pub use orchestrator::{extract_json_object, ExtractionOrchestrator, OrchestratorConfig};
pub use pdf::{extract_page_texts, load_document, PageText};
pub use period::DateRangeParser;
pub use scenario::{classify_monthly_balances, last_day_of_month, parse_loose_date, ClassifierConfig};
pub use schema::*;
pub use storage::{DocumentStore, InMemoryStore};
pub use validation::{
    validate_payment, FieldError, PaymentExtraction, PaymentMode, ValidationReport,
};
