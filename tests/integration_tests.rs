use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use statement_extractor::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Canned model: returns a fixed response and counts calls.
struct MockModel {
    response: String,
    calls: AtomicUsize,
    embed_calls: AtomicUsize,
    embed_fails: bool,
}

impl MockModel {
    fn new(response: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            response: response.into(),
            calls: AtomicUsize::new(0),
            embed_calls: AtomicUsize::new(0),
            embed_fails: false,
        })
    }

    fn with_failing_embed(response: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            response: response.into(),
            calls: AtomicUsize::new(0),
            embed_calls: AtomicUsize::new(0),
            embed_fails: true,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn embed_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExtractionModel for MockModel {
    async fn generate(
        &self,
        _api_key: &str,
        _system_prompt: &str,
        _user_prompt: &str,
    ) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.response.clone())
    }

    async fn embed(&self, _api_key: &str, _text: &str) -> Result<Vec<f32>> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        if self.embed_fails {
            return Err(ExtractionError::ExtractionFailed(
                "embedding backend unavailable".to_string(),
            ));
        }
        Ok(vec![0.0; 8])
    }
}

/// Store whose documents cannot be served without a password, surfacing
/// the same error the PDF loader raises for encrypted files.
struct LockedStore;

#[async_trait]
impl DocumentStore for LockedStore {
    fn get_public_url(&self, path: &str) -> String {
        format!("locked://{}", path)
    }

    async fn download(&self, _path: &str) -> Result<Vec<u8>> {
        Err(ExtractionError::PasswordProtected)
    }

    async fn upload(&self, path: &str, _bytes: Vec<u8>) -> Result<String> {
        Ok(path.to_string())
    }

    async fn remove(&self, _paths: &[String]) -> Result<()> {
        Ok(())
    }
}

fn pdf_bytes(lines: &[&str]) -> Vec<u8> {
    let mut operations = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), 12.into()]),
    ];
    for (index, line) in lines.iter().enumerate() {
        let y = 700 - (index as i64) * 20;
        operations.push(Operation::new(
            "Tm",
            vec![
                1.into(),
                0.into(),
                0.into(),
                1.into(),
                50.into(),
                y.into(),
            ],
        ));
        operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
    }
    operations.push(Operation::new("ET", vec![]));

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });
    let content = Content { operations };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => vec![page_id.into()],
        "Count" => 1,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

fn fast_config() -> OrchestratorConfig {
    OrchestratorConfig {
        max_retries: 2,
        retry_delay: Duration::from_millis(1),
        ..OrchestratorConfig::default()
    }
}

fn receipt_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::new("amount", FieldKind::Amount, true),
        FieldSpec::new("payment_date", FieldKind::Date, true),
        FieldSpec::new("payment_mode", FieldKind::PaymentMode, true),
        FieldSpec::new("bank_name", FieldKind::BankName, false),
    ]
}

fn statement_record(id: &str, month: u32, pdf: &str) -> StatementRecord {
    StatementRecord {
        record_id: id.to_string(),
        month,
        year: 2024,
        pdf_path: pdf.to_string(),
        excel_path: None,
        password: None,
    }
}

#[tokio::test]
async fn test_payment_receipt_end_to_end() {
    let store = Arc::new(InMemoryStore::new().with_blob(
        "receipts/paye-may.pdf",
        pdf_bytes(&["PAYE Payment Receipt", "Amount: 12,500.00"]),
    ));
    let model = MockModel::new(
        r#"Here is the extraction:
{"amount": "12,500.00", "payment_date": "2024-05-14", "payment_mode": "Bank Transfer",
 "bank_name": "Equity Bank", "confidence": "HIGH", "quality_issues": []}"#,
    );
    let keys = Arc::new(KeyPool::new(vec!["k1".to_string()]));
    let orchestrator =
        ExtractionOrchestrator::new(store, model.clone(), keys).with_config(fast_config());

    let request = ExtractionRequest {
        record_id: "r1".to_string(),
        document_path: "receipts/paye-may.pdf".to_string(),
        excel_path: None,
        password: None,
        fields: receipt_fields(),
        mode: ExtractionMode::PaymentReceipt,
    };

    let result = orchestrator.extract(&request, None).await.unwrap();

    assert!(result.success);
    assert_eq!(result.confidence, Confidence::High);
    assert!(result.quality_issues.is_empty());
    assert_eq!(result.fields["amount"], serde_json::json!("12,500.00"));
    assert!(result.monthly_balances.is_empty());
    assert_eq!(model.calls(), 1);

    let extraction = PaymentExtraction {
        amount: result.fields["amount"].as_str().map(String::from),
        payment_date: result.fields["payment_date"].as_str().map(String::from),
        payment_mode: result.fields["payment_mode"].as_str().map(String::from),
        bank_name: result.fields["bank_name"].as_str().map(String::from),
    };
    assert!(validate_payment(&extraction).is_valid);
}

#[tokio::test]
async fn test_bank_statement_monthly_classification() {
    let store = Arc::new(InMemoryStore::new().with_blob(
        "stmts/q1.pdf",
        pdf_bytes(&["Statement Period: 01/01/2024 - 31/03/2024"]),
    ));
    let model = MockModel::new(
        r#"{
            "account_name": "ACME Ltd",
            "statement_period": "01/01/2024 - 31/03/2024",
            "last_transaction_date": "2024-03-31",
            "monthly_balances": [
                {"month": 1, "year": 2024, "opening_balance": 1000.0, "closing_balance": 1500.0,
                 "last_transaction_date": "2024-01-31", "last_transaction_balance": 1500.0},
                {"month": 3, "year": 2024, "opening_balance": 1800.0, "closing_balance": 500.0,
                 "last_transaction_date": "2024-03-31", "last_transaction_balance": 500.0}
            ],
            "confidence": "MEDIUM",
            "quality_issues": ["February is missing from the statement"]
        }"#,
    );
    let keys = Arc::new(KeyPool::new(vec!["k1".to_string()]));
    let orchestrator =
        ExtractionOrchestrator::new(store, model, keys).with_config(fast_config());

    let request = ExtractionRequest {
        record_id: "r1".to_string(),
        document_path: "stmts/q1.pdf".to_string(),
        excel_path: None,
        password: None,
        fields: vec![FieldSpec::new("account_name", FieldKind::Text, true)],
        mode: ExtractionMode::BankStatement,
    };

    let result = orchestrator.extract(&request, None).await.unwrap();

    assert!(result.success);
    assert_eq!(result.monthly_balances.len(), 3);

    let january = &result.monthly_balances[0];
    assert_eq!((january.month, january.year), (1, 2024));
    assert_eq!(january.scenario, Some(BalanceScenario::CompleteMonth));
    assert!(january.is_complete);
    assert_eq!(january.closing_balance, Some(1500.0));

    // Month the model never reported comes back empty, not missing.
    let february = &result.monthly_balances[1];
    assert_eq!((february.month, february.year), (2, 2024));
    assert_eq!(february.scenario, None);
    assert!(!february.is_complete);
    assert_eq!(february.closing_balance, None);

    // Final month whose last transaction lands on the month's last day.
    let march = &result.monthly_balances[2];
    assert_eq!((march.month, march.year), (3, 2024));
    assert_eq!(march.scenario, Some(BalanceScenario::CompleteMonth));
    assert!(march.is_complete);

    assert!(result
        .quality_issues
        .contains(&"February is missing from the statement".to_string()));
}

#[tokio::test]
async fn test_bulk_dedups_shared_file_pairs() {
    let store = Arc::new(InMemoryStore::new().with_blob(
        "stmts/jan-mar.pdf",
        pdf_bytes(&["Statement 01/01/2024 - 31/03/2024"]),
    ));
    let model = MockModel::new(
        r#"{"account_name": "ACME", "statement_period": "01/01/2024 - 31/03/2024",
            "last_transaction_date": "2024-03-31", "monthly_balances": [],
            "confidence": "HIGH", "quality_issues": []}"#,
    );
    let keys = Arc::new(KeyPool::new(vec!["k1".to_string()]));
    let orchestrator =
        ExtractionOrchestrator::new(store, model.clone(), keys).with_config(fast_config());

    // Three calendar months filed against the same underlying PDF.
    let records = vec![
        statement_record("r-jan", 1, "stmts/jan-mar.pdf"),
        statement_record("r-feb", 2, "stmts/jan-mar.pdf"),
        statement_record("r-mar", 3, "stmts/jan-mar.pdf"),
    ];
    let fields = vec![FieldSpec::new("account_name", FieldKind::Text, true)];
    let period = StatementPeriod::new(1, 2024, 3, 2024);

    let (tx, mut rx) = tokio::sync::mpsc::channel(64);
    let outcomes = orchestrator
        .process_bulk(
            &records,
            &fields,
            ExtractionMode::BankStatement,
            Some(&period),
            Some(tx),
            CancellationToken::new(),
        )
        .await;

    assert_eq!(model.calls(), 1);
    assert_eq!(outcomes.len(), 3);
    let ids: Vec<&str> = outcomes.iter().map(|o| o.record_id.as_str()).collect();
    assert_eq!(ids, vec!["r-jan", "r-feb", "r-mar"]);
    assert!(outcomes.iter().all(|o| o.result.success));

    let mut saw_starting = false;
    let mut saw_complete = false;
    while let Some(event) = rx.recv().await {
        match event {
            ExtractionEvent::Starting { total } => {
                saw_starting = true;
                assert_eq!(total, 1);
            }
            ExtractionEvent::DocumentComplete { success, .. } => {
                saw_complete = true;
                assert!(success);
            }
            _ => {}
        }
    }
    assert!(saw_starting);
    assert!(saw_complete);
}

#[tokio::test]
async fn test_bulk_repeat_run_is_served_from_cache() {
    let store = Arc::new(InMemoryStore::new().with_blob(
        "stmts/jan.pdf",
        pdf_bytes(&["Statement for January 2024"]),
    ));
    let model = MockModel::new(
        r#"{"account_name": "ACME", "statement_period": "January 2024",
            "last_transaction_date": "2024-01-31", "monthly_balances": [],
            "confidence": "HIGH", "quality_issues": []}"#,
    );
    let keys = Arc::new(KeyPool::new(vec!["k1".to_string()]));
    let orchestrator =
        ExtractionOrchestrator::new(store, model.clone(), keys).with_config(fast_config());

    let records = vec![statement_record("r1", 1, "stmts/jan.pdf")];
    let fields = vec![FieldSpec::new("account_name", FieldKind::Text, true)];
    let period = StatementPeriod::new(1, 2024, 1, 2024);

    let first = orchestrator
        .process_bulk(
            &records,
            &fields,
            ExtractionMode::BankStatement,
            Some(&period),
            None,
            CancellationToken::new(),
        )
        .await;
    assert_eq!(model.calls(), 1);
    assert!(first[0].result.success);

    let second = orchestrator
        .process_bulk(
            &records,
            &fields,
            ExtractionMode::BankStatement,
            Some(&period),
            None,
            CancellationToken::new(),
        )
        .await;

    assert_eq!(model.calls(), 1, "cache hit must make no model calls");
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].record_id, first[0].record_id);
    assert!(second[0].result.success);
}

#[tokio::test]
async fn test_bulk_continues_past_a_failing_document() {
    // Only the first record's document exists in the store.
    let store = Arc::new(InMemoryStore::new().with_blob(
        "stmts/good.pdf",
        pdf_bytes(&["Statement for January 2024"]),
    ));
    let model = MockModel::new(
        r#"{"account_name": "ACME", "statement_period": "January 2024",
            "last_transaction_date": "2024-01-31", "monthly_balances": [],
            "confidence": "HIGH", "quality_issues": []}"#,
    );
    let keys = Arc::new(KeyPool::new(vec!["k1".to_string()]));
    let orchestrator =
        ExtractionOrchestrator::new(store, model.clone(), keys).with_config(fast_config());

    let records = vec![
        statement_record("r-good", 1, "stmts/good.pdf"),
        statement_record("r-missing", 2, "stmts/missing.pdf"),
    ];
    let fields = vec![FieldSpec::new("account_name", FieldKind::Text, true)];

    let outcomes = orchestrator
        .process_bulk(
            &records,
            &fields,
            ExtractionMode::BankStatement,
            None,
            None,
            CancellationToken::new(),
        )
        .await;

    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].record_id, "r-good");
    assert!(outcomes[0].result.success);
    assert_eq!(outcomes[1].record_id, "r-missing");
    assert!(!outcomes[1].result.success);
    assert!(outcomes[1]
        .result
        .error
        .as_deref()
        .unwrap()
        .contains("No such blob"));
}

#[tokio::test]
async fn test_bulk_cancelled_before_start_makes_no_calls() {
    let store = Arc::new(InMemoryStore::new().with_blob(
        "stmts/jan.pdf",
        pdf_bytes(&["Statement for January 2024"]),
    ));
    let model = MockModel::new(r#"{"account_name": "ACME"}"#);
    let keys = Arc::new(KeyPool::new(vec!["k1".to_string()]));
    let orchestrator =
        ExtractionOrchestrator::new(store, model.clone(), keys).with_config(fast_config());

    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcomes = orchestrator
        .process_bulk(
            &[statement_record("r1", 1, "stmts/jan.pdf")],
            &[FieldSpec::new("account_name", FieldKind::Text, true)],
            ExtractionMode::BankStatement,
            None,
            None,
            cancel,
        )
        .await;

    assert_eq!(model.calls(), 0);
    assert_eq!(outcomes.len(), 1);
    assert!(!outcomes[0].result.success);
}

#[tokio::test]
async fn test_malformed_response_exhausts_retries() {
    let store = Arc::new(InMemoryStore::new().with_blob(
        "receipts/r.pdf",
        pdf_bytes(&["Receipt"]),
    ));
    let model = MockModel::new("I could not find any structured data in this document.");
    let keys = Arc::new(KeyPool::new(vec!["k1".to_string(), "k2".to_string()]));
    let orchestrator =
        ExtractionOrchestrator::new(store, model.clone(), keys).with_config(fast_config());

    let request = ExtractionRequest {
        record_id: "r1".to_string(),
        document_path: "receipts/r.pdf".to_string(),
        excel_path: None,
        password: None,
        fields: receipt_fields(),
        mode: ExtractionMode::PaymentReceipt,
    };

    let err = orchestrator.extract(&request, None).await.unwrap_err();
    assert!(matches!(err, ExtractionError::MalformedResponse(_)));
    assert_eq!(model.calls(), 2);
}

#[tokio::test]
async fn test_password_protected_document_marks_outcome() {
    let model = MockModel::new(r#"{"account_name": "ACME"}"#);
    let keys = Arc::new(KeyPool::new(vec!["k1".to_string()]));
    let orchestrator = ExtractionOrchestrator::new(Arc::new(LockedStore), model.clone(), keys)
        .with_config(fast_config());

    let outcomes = orchestrator
        .process_bulk(
            &[statement_record("r1", 1, "stmts/locked.pdf")],
            &[FieldSpec::new("account_name", FieldKind::Text, true)],
            ExtractionMode::BankStatement,
            None,
            None,
            CancellationToken::new(),
        )
        .await;

    assert_eq!(outcomes.len(), 1);
    assert!(!outcomes[0].result.success);
    assert!(outcomes[0].result.requires_password);
    // The document never opened, so no model call was made or billed.
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn test_embedding_failure_does_not_abort_extraction() {
    let store = Arc::new(InMemoryStore::new().with_blob(
        "receipts/paye.pdf",
        pdf_bytes(&["PAYE Payment Receipt", "Amount: 12,500.00"]),
    ));
    let model = MockModel::with_failing_embed(
        r#"{"amount": "12,500.00", "payment_date": "2024-05-14", "payment_mode": "Mpesa",
            "bank_name": null, "confidence": "HIGH", "quality_issues": []}"#,
    );
    let keys = Arc::new(KeyPool::new(vec!["k1".to_string()]));
    let orchestrator = ExtractionOrchestrator::new(store, model.clone(), keys).with_config(
        OrchestratorConfig {
            embed_chunks: true,
            ..fast_config()
        },
    );

    let request = ExtractionRequest {
        record_id: "r1".to_string(),
        document_path: "receipts/paye.pdf".to_string(),
        excel_path: None,
        password: None,
        fields: receipt_fields(),
        mode: ExtractionMode::PaymentReceipt,
    };

    let result = orchestrator.extract(&request, None).await.unwrap();

    // Embedding was attempted and failed; extraction still completed.
    assert_eq!(model.embed_calls(), 1);
    assert!(result.success);
    assert_eq!(result.fields["amount"], serde_json::json!("12,500.00"));
    assert_eq!(model.calls(), 1);
}

#[tokio::test]
async fn test_unknown_period_yields_no_months() {
    let store = Arc::new(InMemoryStore::new().with_blob(
        "stmts/odd.pdf",
        pdf_bytes(&["Statement"]),
    ));
    let model = MockModel::new(
        r#"{"account_name": "ACME", "statement_period": "whenever",
            "monthly_balances": [{"month": 1, "year": 2024, "closing_balance": 10.0}],
            "confidence": "LOW", "quality_issues": []}"#,
    );
    let keys = Arc::new(KeyPool::new(vec!["k1".to_string()]));
    let orchestrator =
        ExtractionOrchestrator::new(store, model, keys).with_config(fast_config());

    let request = ExtractionRequest {
        record_id: "r1".to_string(),
        document_path: "stmts/odd.pdf".to_string(),
        excel_path: None,
        password: None,
        fields: vec![FieldSpec::new("account_name", FieldKind::Text, true)],
        mode: ExtractionMode::BankStatement,
    };

    let result = orchestrator.extract(&request, None).await.unwrap();
    assert!(result.success);
    assert!(result.monthly_balances.is_empty());
    assert!(result
        .quality_issues
        .iter()
        .any(|issue| issue.contains("period")));
}
