mod common;

use catalog_sync::api::RemoteError;
use catalog_sync::api::resilience::RetryConfig;
use catalog_sync::catalog::SourceEntity;
use catalog_sync::import::{
    BatchImportOrchestrator, ImportErrorKind, ImportMode, ImportOptions, ImportStatus, ImportSummary,
};
use common::{Call, MockCatalog, options, plan_from_csv};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const SHELVES: &str = "Artikelnummer;Artikelname;Kategorie 1;Kategorie 2;VK Brutto\n\
R-100;Steckregal 100;Regale;Steckregale;119,00\n\
R-200;Steckregal 200;Regale;Steckregale;238,00\n\
S-1;Schraube;Zubehör;;1,19\n";

fn five_items() -> String {
    let mut csv = String::from("Artikelnummer;Artikelname\n");
    for i in 1..=5 {
        csv.push_str(&format!("A{};Artikel {}\n", i, i));
    }
    csv
}

fn statuses(results: &[catalog_sync::import::ImportResult]) -> Vec<ImportStatus> {
    results.iter().map(|r| r.status).collect()
}

async fn run(remote: &Arc<MockCatalog>, csv: &str, options: ImportOptions) -> Vec<catalog_sync::import::ImportResult> {
    let plan = plan_from_csv(csv, &options);
    BatchImportOrchestrator::new(remote.clone(), options).run(plan).await
}

#[tokio::test]
async fn test_upsert_twice_creates_nothing_new() {
    let remote = Arc::new(MockCatalog::new());

    let first = run(&remote, SHELVES, options()).await;
    assert_eq!(statuses(&first), vec![ImportStatus::Created; 3]);

    let shelf = remote.record("R-100").unwrap();
    assert_eq!(shelf["item_group"], json!("Steckregale"));
    assert_eq!(shelf["standard_rate"], json!(100.0));
    assert_eq!(shelf["item_name"], json!("Steckregal 100"));
    assert_eq!(remote.record("S-1").unwrap()["item_group"], json!("Zubehör"));
    assert_eq!(remote.category_parent("Steckregale"), Some(Some("Regale".to_string())));

    let category_creates = |calls: &[Call]| {
        calls
            .iter()
            .filter(|c| matches!(c, Call::CreateCategory(_)))
            .count()
    };
    assert_eq!(category_creates(&remote.calls()), 3);

    let calls_before = remote.calls().len();
    let second = run(&remote, SHELVES, options()).await;
    let summary = ImportSummary::from_results(&second, 10);
    assert_eq!(summary.created, 0);
    assert_eq!(summary.updated, 3);
    assert_eq!(remote.record_count(), 3);
    assert_eq!(category_creates(&remote.calls()[calls_before..]), 0);
}

#[tokio::test]
async fn test_create_only_skips_existing() {
    let remote = Arc::new(MockCatalog::new().with_record("R-200"));
    let options = ImportOptions {
        mode: ImportMode::CreateOnly,
        ..options()
    };

    let results = run(&remote, SHELVES, options).await;
    assert_eq!(
        statuses(&results),
        vec![ImportStatus::Created, ImportStatus::Skipped, ImportStatus::Created]
    );
    assert_eq!(results[1].target_id.as_deref(), Some("R-200"));
    assert!(!remote.calls().iter().any(|c| matches!(c, Call::Update(_))));
}

#[tokio::test]
async fn test_update_only_skips_missing() {
    let remote = Arc::new(MockCatalog::new().with_record("S-1"));
    let options = ImportOptions {
        mode: ImportMode::UpdateOnly,
        ..options()
    };

    let results = run(&remote, SHELVES, options).await;
    assert_eq!(
        statuses(&results),
        vec![ImportStatus::Skipped, ImportStatus::Skipped, ImportStatus::Updated]
    );
    assert!(!remote.calls().iter().any(|c| matches!(c, Call::Create(_))));
    assert_eq!(remote.record("S-1").unwrap()["item_name"], json!("Schraube"));
}

#[tokio::test]
async fn test_update_keeps_existing_group_and_unit() {
    let remote = Arc::new(MockCatalog::new().with_record("R-100"));
    let options = ImportOptions {
        mode: ImportMode::UpdateOnly,
        ..options()
    };

    let results = run(&remote, "Artikelnummer;Artikelname;Preis\nR-100;Regal;99,00\n", options).await;
    assert_eq!(statuses(&results), vec![ImportStatus::Updated]);

    let record = remote.record("R-100").unwrap();
    assert_eq!(record["item_name"], json!("Regal"));
    assert_eq!(record["standard_rate"], json!(99.0));
    assert!(!record.contains_key("item_group"));
    assert!(!record.contains_key("stock_uom"));
}

#[tokio::test]
async fn test_upsert_fills_defaults_only_for_new_items() {
    let remote = Arc::new(MockCatalog::new().with_record("A1"));

    let results = run(&remote, "Artikelnummer;Preis\nA1;10,00\nA2;20,00\n", options()).await;
    assert_eq!(statuses(&results), vec![ImportStatus::Updated, ImportStatus::Created]);

    let existing = remote.record("A1").unwrap();
    assert!(!existing.contains_key("item_name"));
    assert!(!existing.contains_key("item_group"));
    assert!(!existing.contains_key("stock_uom"));

    let created = remote.record("A2").unwrap();
    assert_eq!(created["item_name"], json!("A2"));
    assert_eq!(created["item_group"], json!("Alle Artikelgruppen"));
    assert_eq!(created["stock_uom"], json!("Stk"));
}

#[tokio::test]
async fn test_dry_run_touches_nothing() {
    let remote = Arc::new(MockCatalog::new());
    let options = ImportOptions {
        dry_run: true,
        ..options()
    };

    let results = run(&remote, SHELVES, options).await;
    assert_eq!(statuses(&results), vec![ImportStatus::Simulated; 3]);
    assert!(remote.calls().is_empty());
    assert_eq!(remote.record_count(), 0);
}

#[tokio::test]
async fn test_permanent_failure_only_fails_its_record() {
    let remote = Arc::new(
        MockCatalog::new().fail_writes("A3", vec![RemoteError::http(417, "Value missing for Item")]),
    );

    let results = run(&remote, &five_items(), options()).await;
    assert_eq!(results.len(), 5);
    for (i, result) in results.iter().enumerate() {
        assert_eq!(result.line, i + 1);
        if i == 2 {
            assert_eq!(result.status, ImportStatus::Failed);
            assert_eq!(result.error_kind, Some(ImportErrorKind::PermanentWriteError));
            assert!(result.message.as_deref().unwrap().contains("417"));
        } else {
            assert_eq!(result.status, ImportStatus::Created);
        }
    }

    let a3_creates = remote
        .calls()
        .iter()
        .filter(|c| **c == Call::Create("A3".into()))
        .count();
    assert_eq!(a3_creates, 1);
}

#[tokio::test]
async fn test_transient_failure_is_retried() {
    let remote = Arc::new(MockCatalog::new().fail_writes(
        "A2",
        vec![RemoteError::http(503, "Service Unavailable"), RemoteError::Timeout],
    ));

    let results = run(&remote, &five_items(), options()).await;
    assert_eq!(statuses(&results), vec![ImportStatus::Created; 5]);

    let a2_creates = remote
        .calls()
        .iter()
        .filter(|c| **c == Call::Create("A2".into()))
        .count();
    assert_eq!(a2_creates, 3);
    // records that succeeded are written once
    assert_eq!(
        remote
            .calls()
            .iter()
            .filter(|c| **c == Call::Create("A1".into()))
            .count(),
        1
    );
}

#[tokio::test]
async fn test_request_exceeding_timeout_is_retried() {
    let remote = Arc::new(MockCatalog::new().stall_writes("A2", 1, Duration::from_secs(1)));
    let options = ImportOptions {
        request_timeout: Duration::from_millis(50),
        ..options()
    };

    let results = run(&remote, &five_items(), options).await;
    assert_eq!(statuses(&results), vec![ImportStatus::Created; 5]);

    let a2_creates = remote
        .calls()
        .iter()
        .filter(|c| **c == Call::Create("A2".into()))
        .count();
    assert_eq!(a2_creates, 2);
    assert_eq!(remote.record_count(), 5);
}

#[tokio::test]
async fn test_transient_failure_exhausts_retries() {
    let remote = Arc::new(MockCatalog::new().fail_writes(
        "A4",
        vec![RemoteError::Timeout, RemoteError::Timeout, RemoteError::Timeout],
    ));
    let options = ImportOptions {
        retry: RetryConfig::immediate(3),
        ..options()
    };

    let results = run(&remote, &five_items(), options).await;
    assert_eq!(results[3].status, ImportStatus::Failed);
    assert_eq!(results[3].error_kind, Some(ImportErrorKind::PermanentWriteError));
    assert!(results[3].message.as_deref().unwrap().contains("after 3 attempts"));
    assert_eq!(ImportSummary::from_results(&results, 10).created, 4);

    let a4_creates = remote
        .calls()
        .iter()
        .filter(|c| **c == Call::Create("A4".into()))
        .count();
    assert_eq!(a4_creates, 3);
}

#[tokio::test]
async fn test_category_failure_fails_dependent_records() {
    let remote = Arc::new(
        MockCatalog::new().fail_category("Steckregale", RemoteError::http(417, "Invalid parent")),
    );

    let results = run(&remote, SHELVES, options()).await;
    assert_eq!(results[0].error_kind, Some(ImportErrorKind::CategoryCreationError));
    assert_eq!(results[1].error_kind, Some(ImportErrorKind::CategoryCreationError));
    assert!(results[0].message.as_deref().unwrap().contains("Steckregale"));
    assert_eq!(results[2].status, ImportStatus::Created);

    assert!(remote.record("R-100").is_none());
    // permanent category errors are not retried
    let attempts = remote
        .calls()
        .iter()
        .filter(|c| **c == Call::CreateCategory("Steckregale".into()))
        .count();
    assert_eq!(attempts, 1);
}

#[tokio::test]
async fn test_category_creation_retried_after_transient_failure() {
    let remote = Arc::new(MockCatalog::new().flaky_category(
        "Regale",
        vec![RemoteError::http(503, "Service Unavailable"), RemoteError::Timeout],
    ));

    let results = run(&remote, SHELVES, options()).await;
    assert_eq!(statuses(&results), vec![ImportStatus::Created; 3]);
    assert_eq!(remote.record("R-100").unwrap()["item_group"], json!("Steckregale"));
    assert_eq!(remote.category_parent("Steckregale"), Some(Some("Regale".to_string())));

    let attempts = remote
        .calls()
        .iter()
        .filter(|c| **c == Call::CreateCategory("Regale".into()))
        .count();
    assert_eq!(attempts, 3);
}

#[tokio::test]
async fn test_invalid_record_in_batch_of_five() {
    let csv = "Artikelnummer;Artikelname\nA1;Regal\nA2;Boden\n;Ohne Nummer\nA4;Winkel\nA5;Fuss\n";
    let remote = Arc::new(MockCatalog::new());

    let results = run(&remote, csv, options()).await;
    assert_eq!(results.len(), 5);
    let failed: Vec<_> = results.iter().filter(|r| r.is_failure()).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].line, 3);
    assert_eq!(failed[0].error_kind, Some(ImportErrorKind::ValidationError));
    assert!(failed[0].message.as_deref().unwrap().contains("item_code"));
    assert_eq!(remote.record_count(), 4);
}

#[tokio::test]
async fn test_connection_failure_fails_all_records() {
    let remote = Arc::new(MockCatalog::new().refuse_connection(RemoteError::Auth("Invalid token".into())));

    let results = run(&remote, SHELVES, options()).await;
    assert!(
        results
            .iter()
            .all(|r| r.error_kind == Some(ImportErrorKind::ConnectionError))
    );
    assert_eq!(remote.calls(), vec![Call::CheckConnection]);
}

#[tokio::test]
async fn test_cancellation_stops_at_batch_boundary() {
    let token = CancellationToken::new();
    let remote = Arc::new(MockCatalog::new().cancel_on_create(token.clone()));
    let options = ImportOptions {
        batch_size: 2,
        ..options()
    };

    let plan = plan_from_csv(&five_items(), &options);
    let results = BatchImportOrchestrator::new(remote.clone(), options)
        .with_cancellation(token)
        .run(plan)
        .await;

    assert_eq!(results.len(), 5);
    assert_eq!(results[0].status, ImportStatus::Created);
    assert_eq!(results[1].status, ImportStatus::Created);
    for result in &results[2..] {
        assert_eq!(result.status, ImportStatus::Skipped);
        assert_eq!(result.error_kind, Some(ImportErrorKind::Cancelled));
    }
    assert_eq!(remote.record_count(), 2);
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let token = CancellationToken::new();
    token.cancel();
    let remote = Arc::new(MockCatalog::new());

    let plan = plan_from_csv(SHELVES, &options());
    let results = BatchImportOrchestrator::new(remote.clone(), options())
        .with_cancellation(token)
        .run(plan)
        .await;

    assert!(
        results
            .iter()
            .all(|r| r.error_kind == Some(ImportErrorKind::Cancelled))
    );
    assert!(remote.writes().is_empty());
}

#[tokio::test]
async fn test_variant_import_sends_attributes() {
    let csv = "Artikelnummer;Vorlage;Farbe;Größe;Aktiv\n\
REG-1-BL;REG-1;Blau;XL;ja\n\
REG-1-RT;REG-1;Rot;;nein\n\
REG-1-X;REG-1;;;ja\n";
    let remote = Arc::new(MockCatalog::new());
    let options = ImportOptions {
        entity: SourceEntity::ItemVariant,
        ..options()
    };

    let results = run(&remote, csv, options).await;
    assert_eq!(
        statuses(&results),
        vec![ImportStatus::Created, ImportStatus::Created, ImportStatus::Failed]
    );
    assert_eq!(results[2].error_kind, Some(ImportErrorKind::ValidationError));

    let blue = remote.record("REG-1-BL").unwrap();
    assert_eq!(blue["variant_of"], json!("REG-1"));
    assert_eq!(blue["disabled"], json!(0));
    assert_eq!(
        blue["attributes"],
        json!([
            {"attribute": "Farbe", "attribute_value": "Blau"},
            {"attribute": "Größe", "attribute_value": "XL"},
        ])
    );
    assert!(!blue.contains_key("item_group"));
    assert_eq!(remote.record("REG-1-RT").unwrap()["disabled"], json!(1));
}

#[tokio::test]
async fn test_attribute_import_upserts_by_name() {
    let csv = "Attributname;Werte\nFarbe;Rot, Blau\nGröße;S,M,L\n";
    let remote = Arc::new(MockCatalog::new().with_record("Farbe"));
    let options = ImportOptions {
        entity: SourceEntity::ItemAttribute,
        ..options()
    };

    let results = run(&remote, csv, options).await;
    assert_eq!(statuses(&results), vec![ImportStatus::Updated, ImportStatus::Created]);
    assert_eq!(results[1].key.as_deref(), Some("Größe"));
    assert_eq!(remote.record("Farbe").unwrap()["attribute_values"], json!("Rot, Blau"));
    assert_eq!(remote.record("Größe").unwrap()["attribute_name"], json!("Größe"));
}
