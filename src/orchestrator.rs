//! End-to-end extraction pipeline.
//!
//! One document at a time: fetch bytes, extract positioned page text,
//! optionally chunk and embed, call the model through the key pool with
//! retry, parse and normalize the response, classify monthly balances.
//! Batches run sequentially, one document's round trip completing before
//! the next starts, which keeps the third-party rate limits honest and
//! progress reporting simple.

use crate::cache::{dedup_statements, fingerprint, ExtractionCache};
use crate::chunking::{chunk_pages, combine_pages, DEFAULT_CHUNK_CHARS};
use crate::error::{ExtractionError, Result};
use crate::keypool::KeyPool;
use crate::llm::prompts::{build_user_prompt, system_prompt_for};
use crate::llm::{ExtractionEvent, ExtractionModel};
use crate::months::expand_period;
use crate::pdf;
use crate::period::DateRangeParser;
use crate::scenario::{classify_monthly_balances, parse_loose_date, ClassifierConfig};
use crate::schema::{
    Confidence, DocumentOutcome, ExtractionMode, ExtractionRequest, ExtractionResult, FieldSpec,
    MonthEntry, RawMonthlyBalance, StatementPeriod, StatementRecord,
};
use crate::storage::DocumentStore;
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::Sender;
use tokio_util::sync::CancellationToken;

/// Per-orchestrator pipeline tuning. Retry policy is configuration, not a
/// global: receipt batches and multi-hundred-page statements do not want
/// the same settings.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Model call attempts per document (key rotation between attempts).
    pub max_retries: usize,
    /// Delay between attempts.
    pub retry_delay: Duration,
    /// Character budget per embedding chunk.
    pub chunk_chars: usize,
    /// Whether to embed text chunks for downstream grounding. Embedding is
    /// best-effort either way; failures only degrade, never abort.
    pub embed_chunks: bool,
    pub classifier: ClassifierConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_millis(4000),
            chunk_chars: DEFAULT_CHUNK_CHARS,
            embed_chunks: false,
            classifier: ClassifierConfig::default(),
        }
    }
}

pub struct ExtractionOrchestrator {
    store: Arc<dyn DocumentStore>,
    model: Arc<dyn ExtractionModel>,
    keys: Arc<KeyPool>,
    cache: ExtractionCache,
    parser: DateRangeParser,
    config: OrchestratorConfig,
}

impl ExtractionOrchestrator {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        model: Arc<dyn ExtractionModel>,
        keys: Arc<KeyPool>,
    ) -> Self {
        Self {
            store,
            model,
            keys,
            cache: ExtractionCache::new(),
            parser: DateRangeParser::new(),
            config: OrchestratorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Run the full pipeline for one document.
    pub async fn extract(
        &self,
        request: &ExtractionRequest,
        progress: Option<Sender<ExtractionEvent>>,
    ) -> Result<ExtractionResult> {
        send_event(
            &progress,
            ExtractionEvent::Fetching {
                path: request.document_path.clone(),
            },
        )
        .await;

        let bytes = self.store.download(&request.document_path).await?;
        let doc = pdf::load_document(&bytes, request.password.as_deref())?;

        send_event(
            &progress,
            ExtractionEvent::ExtractingText {
                path: request.document_path.clone(),
            },
        )
        .await;
        let pages = pdf::extract_page_texts(&doc);

        if self.config.embed_chunks {
            self.embed_best_effort(&pages, &progress).await;
        }

        let document_text = combine_pages(&pages);
        let user_prompt = build_user_prompt(&request.fields, &document_text);
        let system_prompt = system_prompt_for(request.mode);

        let response = self
            .call_model_with_retry(system_prompt, &user_prompt, &progress)
            .await?;

        let mut result = self.normalize_response(request, &response);
        if document_text.trim().is_empty() {
            result
                .quality_issues
                .push("No text could be extracted from the document".to_string());
        }
        Ok(result)
    }

    /// Process a batch of statement records.
    ///
    /// Sequential, continue-on-error: every input record yields exactly one
    /// outcome, in input order, and this never returns an error. The cache
    /// is consulted before any work and records sharing a file pair are
    /// extracted once with the result fanned out. Cancellation aborts
    /// documents not yet started; the in-flight one finishes.
    pub async fn process_bulk(
        &self,
        records: &[StatementRecord],
        fields: &[FieldSpec],
        mode: ExtractionMode,
        period: Option<&StatementPeriod>,
        progress: Option<Sender<ExtractionEvent>>,
        cancel: CancellationToken,
    ) -> Vec<DocumentOutcome> {
        let record_ids: Vec<String> = records.iter().map(|r| r.record_id.clone()).collect();
        let period_key = period.map(|p| p.key()).unwrap_or_else(|| "unknown".to_string());
        let batch_fingerprint = fingerprint(&period_key, &record_ids, mode);

        if let Some(hit) = self.cache.get(&batch_fingerprint) {
            info!("Batch fingerprint {} served from cache", batch_fingerprint);
            return hit;
        }

        let units = dedup_statements(records);
        info!(
            "Processing {} records as {} extraction units",
            records.len(),
            units.len()
        );
        send_event(&progress, ExtractionEvent::Starting { total: units.len() }).await;

        let mut results: Vec<Option<ExtractionResult>> = vec![None; records.len()];
        let mut completed = 0_usize;

        for unit in &units {
            if cancel.is_cancelled() {
                send_event(
                    &progress,
                    ExtractionEvent::Cancelled {
                        remaining: units.len() - completed,
                    },
                )
                .await;
                break;
            }

            let request = ExtractionRequest {
                record_id: records[unit.members[0]].record_id.clone(),
                document_path: unit.pdf_path.clone(),
                excel_path: unit.excel_path.clone(),
                password: unit.password.clone(),
                fields: fields.to_vec(),
                mode,
            };

            let result = match self.extract(&request, progress.clone()).await {
                Ok(result) => result,
                Err(ExtractionError::PasswordProtected) => ExtractionResult::password_required(),
                Err(err) => {
                    warn!("Extraction failed for {}: {}", unit.pdf_path, err);
                    send_event(
                        &progress,
                        ExtractionEvent::Failed {
                            path: unit.pdf_path.clone(),
                            reason: err.to_string(),
                        },
                    )
                    .await;
                    ExtractionResult::failure(err.to_string())
                }
            };

            for &member in &unit.members {
                results[member] = Some(result.clone());
            }

            completed += 1;
            send_event(
                &progress,
                ExtractionEvent::DocumentComplete {
                    path: unit.pdf_path.clone(),
                    success: result.success,
                },
            )
            .await;
            send_event(
                &progress,
                ExtractionEvent::Progress {
                    completed,
                    total: units.len(),
                },
            )
            .await;
        }

        let outcomes: Vec<DocumentOutcome> = records
            .iter()
            .zip(results)
            .map(|(record, result)| DocumentOutcome {
                record_id: record.record_id.clone(),
                pdf_path: record.pdf_path.clone(),
                result: result
                    .unwrap_or_else(|| ExtractionResult::failure(ExtractionError::Cancelled.to_string())),
            })
            .collect();

        // Only a fully successful run is worth replaying; caching partial
        // failures would make them sticky across retries.
        let all_succeeded = !cancel.is_cancelled()
            && outcomes.iter().all(|outcome| outcome.result.success);
        if all_succeeded {
            self.cache.put(batch_fingerprint, outcomes.clone());
        }

        outcomes
    }

    async fn embed_best_effort(
        &self,
        pages: &[pdf::PageText],
        progress: &Option<Sender<ExtractionEvent>>,
    ) {
        let chunks = chunk_pages(pages, self.config.chunk_chars);
        let total = chunks.len();
        for chunk in chunks {
            send_event(
                progress,
                ExtractionEvent::Embedding {
                    chunk: chunk.index + 1,
                    total,
                },
            )
            .await;
            let key = self.keys.next();
            if let Err(err) = self.model.embed(&key, &chunk.text).await {
                // Embedding only improves downstream grounding; extraction
                // proceeds without it.
                warn!("Embedding failed for chunk {}: {}", chunk.index, err);
                break;
            }
        }
    }

    async fn call_model_with_retry(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        progress: &Option<Sender<ExtractionEvent>>,
    ) -> Result<serde_json::Value> {
        let mut last_error = ExtractionError::ExtractionFailed("No attempts made".to_string());

        for attempt in 1..=self.config.max_retries.max(1) {
            send_event(progress, ExtractionEvent::CallingModel { attempt }).await;
            let key = self.keys.next();

            match self.model.generate(&key, system_prompt, user_prompt).await {
                Ok(text) => match extract_json_object(&text) {
                    Some(value) => return Ok(value),
                    None => {
                        debug!("Attempt {}: response contained no JSON object", attempt);
                        last_error = ExtractionError::MalformedResponse(truncate(&text, 200));
                    }
                },
                Err(err) => {
                    self.keys.report_failure(&key);
                    debug!("Attempt {} failed: {}", attempt, err);
                    last_error = err;
                }
            }

            if attempt < self.config.max_retries {
                tokio::time::sleep(self.config.retry_delay).await;
            }
        }

        Err(last_error)
    }

    /// Turn the model's loose JSON object into a typed result.
    fn normalize_response(
        &self,
        request: &ExtractionRequest,
        response: &serde_json::Value,
    ) -> ExtractionResult {
        let empty = serde_json::Map::new();
        let object = response.as_object().unwrap_or(&empty);

        let mut fields = BTreeMap::new();
        let mut quality_issues = Vec::new();

        for spec in &request.fields {
            let value = object
                .get(&spec.name)
                .cloned()
                .unwrap_or(serde_json::Value::Null);
            if spec.required && value.is_null() {
                quality_issues.push(format!("Missing required field '{}'", spec.name));
            }
            fields.insert(spec.name.clone(), value);
        }

        let confidence = object
            .get("confidence")
            .and_then(|v| v.as_str())
            .and_then(Confidence::parse)
            .unwrap_or(Confidence::Medium);

        if let Some(issues) = object.get("quality_issues").and_then(|v| v.as_array()) {
            quality_issues.extend(
                issues
                    .iter()
                    .filter_map(|issue| issue.as_str().map(String::from)),
            );
        }

        let monthly_balances = if request.mode == ExtractionMode::BankStatement {
            self.classify_balances(object, &mut quality_issues)
        } else {
            Vec::new()
        };

        ExtractionResult {
            success: true,
            fields,
            confidence,
            quality_issues,
            requires_password: false,
            monthly_balances,
            error: None,
        }
    }

    fn classify_balances(
        &self,
        object: &serde_json::Map<String, serde_json::Value>,
        quality_issues: &mut Vec<String>,
    ) -> Vec<MonthEntry> {
        let period = object
            .get("statement_period")
            .and_then(|v| v.as_str())
            .and_then(|text| self.parser.parse(text));

        let Some(period) = period else {
            // Period unknown: no months may be assumed.
            quality_issues.push("Statement period could not be parsed".to_string());
            return Vec::new();
        };

        let candidates: Vec<RawMonthlyBalance> = object
            .get("monthly_balances")
            .cloned()
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default();

        let last_transaction = object
            .get("last_transaction_date")
            .and_then(|v| v.as_str())
            .and_then(parse_loose_date);

        let classified = classify_monthly_balances(
            &candidates,
            &period,
            last_transaction,
            &self.config.classifier,
        );

        // Emit one entry per month of the stated period, in order; months
        // the model never reported come back empty rather than missing.
        let mut by_slot: BTreeMap<(i32, u32), MonthEntry> = classified
            .into_iter()
            .map(|entry| ((entry.year, entry.month), entry))
            .collect();

        expand_period(&period)
            .into_iter()
            .map(|slot| {
                by_slot
                    .remove(&(slot.year, slot.month))
                    .unwrap_or_else(|| MonthEntry::empty(slot.month, slot.year))
            })
            .collect()
    }
}

async fn send_event(progress: &Option<Sender<ExtractionEvent>>, event: ExtractionEvent) {
    if let Some(tx) = progress {
        let _ = tx.send(event).await;
    }
}

/// Pull the first balanced `{...}` block out of the response text and
/// parse it. Models wrap JSON in prose and code fences often enough that
/// strict whole-response parsing is a losing game; anything without one
/// balanced object is malformed.
pub fn extract_json_object(text: &str) -> Option<serde_json::Value> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0_usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes[start..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match byte {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    let candidate = &text[start..start + offset + 1];
                    return serde_json::from_str::<serde_json::Value>(candidate)
                        .ok()
                        .filter(serde_json::Value::is_object);
                }
            }
            _ => {}
        }
    }
    None
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max).collect();
        format!("{}...", cut)
    }
}
