//! End-to-end tests for single-item processing and status tracking.

mod common;

use std::fs;

use barramento::backend::StageStatus;
use barramento::db::hash_repo;
use barramento::db::log_repo::LogFilter;
use barramento::db::object_repo::{self, StatusChange};
use barramento::pipeline::PollOutcome;
use barramento::{ErrorKind, PreservationStatus};
use common::{ItemBuilder, TestHarness};

#[test]
fn test_item_travels_from_repository_to_stored_aip() {
    let h = TestHarness::new();
    h.add_valid_item(42, 7);

    let result = h.processor.process_item(42, 7, Some("batch-manual")).unwrap();
    assert_eq!(result.status, PreservationStatus::TransferStarted);
    assert_eq!(result.transfer_uuid, "transfer-1");
    assert!(result.warnings.is_empty());

    let started = h.backend.started();
    assert_eq!(started.len(), 1);
    assert_eq!(started[0].accession, "tainacan-42");
    assert_eq!(started[0].transfer_type, "standard");
    assert_eq!(started[0].path, h.package_root.join(&result.sip_id));

    let object = h.object(42).unwrap();
    assert_eq!(object.preservation_status, "transfer_started");
    assert_eq!(object.collection_id, 7);
    assert_eq!(object.sip_id.as_deref(), Some(result.sip_id.as_str()));
    assert_eq!(object.backend_transfer_ref.as_deref(), Some("transfer-1"));
    assert_eq!(object.batch_id.as_deref(), Some("batch-manual"));

    // Still processing: nothing advances.
    let report = h.processor.check_transfers(20).unwrap();
    assert_eq!(report.checked, 1);
    assert_eq!(report.updated, 0);
    assert_eq!(report.details[0].outcome, PollOutcome::Waiting);

    h.backend.complete_transfer("transfer-1", "X");
    let report = h.processor.check_transfers(20).unwrap();
    assert_eq!(report.updated, 1);
    let object = h.object(42).unwrap();
    assert_eq!(object.preservation_status, "ingest_started");
    assert_eq!(object.backend_sip_ref.as_deref(), Some("X"));
    assert_eq!(object.transfer_status.as_deref(), Some("COMPLETE"));

    h.backend.complete_ingest("X", "Y");
    let report = h.processor.check_ingests(20).unwrap();
    assert_eq!(report.updated, 1);
    let object = h.object(42).unwrap();
    assert_eq!(object.preservation_status, "aip_stored");
    assert_eq!(object.aip_id.as_deref(), Some("Y"));
    assert_eq!(
        object.archivematica_url.as_deref(),
        Some("https://am.example.org/aip/Y")
    );
}

#[test]
fn test_package_contains_payload_and_metadata() {
    let h = TestHarness::new();
    let document = h.media_file("dom-casmurro.pdf", b"%PDF-1.4 dom casmurro");
    let cover = h.media_file("capa.png", b"png bytes");
    h.repository.add_item(
        ItemBuilder::new(42, 7)
            .title("Dom Casmurro")
            .document(&document)
            .attachment(&cover)
            .author("Machado de Assis")
            .build(),
    );

    let result = h.processor.process_item(42, 7, None).unwrap();
    let package = h.package_root.join(&result.sip_id);

    assert!(package.join("objects/dom-casmurro.pdf").is_file());
    assert!(package.join("objects/attachments/capa.png").is_file());
    let dc = fs::read_to_string(package.join("metadata/dc.xml")).unwrap();
    assert!(dc.contains("Dom Casmurro"));
    assert!(dc.contains("Machado de Assis"));
    assert!(package.join("metadata/mets.xml").is_file());

    let object = h.object(42).unwrap();
    let hashes = hash_repo::list_by_object(&h.db, object.id).unwrap();
    assert!(hashes.iter().any(|row| row.is_package));
    assert!(hashes.iter().filter(|row| !row.is_package).count() >= 2);
    assert!(hashes.iter().all(|row| row.hash_type == "sha256"));
}

#[test]
fn test_invalid_item_is_rejected_before_packaging() {
    let h = TestHarness::new();
    h.repository.add_item(ItemBuilder::new(42, 7).build());

    let err = h.processor.process_item(42, 7, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    assert_eq!(
        err.reasons(),
        [
            "Item has no primary document".to_string(),
            "Required metadata \"field 12 (creator)\" not filled".to_string(),
        ]
    );

    assert!(h.object(42).is_none());
    assert_eq!(h.package_count(), 0);
    assert!(h.backend.started().is_empty());
}

#[test]
fn test_remote_document_is_rejected_when_documents_are_optional() {
    let h = TestHarness::with_config(|c| c.document_required(false));
    let cover = h.media_file("capa.png", b"\x89PNG");
    h.repository.add_item(
        ItemBuilder::new(42, 7)
            .remote_document("https://www.youtube.com/watch?v=dQw4w9WgXcQ")
            .attachment(&cover)
            .author("Machado de Assis")
            .build(),
    );

    let err = h.processor.process_item(42, 7, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    assert_eq!(err.reasons(), ["Primary document has no local file".to_string()]);

    assert!(h.object(42).is_none());
    assert_eq!(h.package_count(), 0);
    assert!(h.backend.started().is_empty());
}

#[test]
fn test_missing_item_is_not_found() {
    let h = TestHarness::new();

    let err = h.processor.process_item(999, 7, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(h.object(999).is_none());
}

#[test]
fn test_oversized_package_is_never_submitted() {
    let h = TestHarness::with_config(|c| c.max_package_size_mb(0));
    h.add_valid_item(42, 7);

    let err = h.processor.process_item(42, 7, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SizeExceeded);
    assert!(h.backend.started().is_empty());
    assert_eq!(h.status_of(42).as_deref(), Some("sip_created"));
}

#[test]
fn test_backend_failure_leaves_object_packaged() {
    let h = TestHarness::new();
    h.add_valid_item(42, 7);
    h.backend.reject_transfers(true);

    let err = h.processor.process_item(42, 7, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BackendRequestFailed);
    assert_eq!(h.status_of(42).as_deref(), Some("sip_created"));
    assert!(h.object(42).unwrap().backend_transfer_ref.is_none());
}

#[test]
fn test_failed_transfer_is_terminal_for_polling() {
    let h = TestHarness::new();
    h.add_valid_item(42, 7);
    h.processor.process_item(42, 7, None).unwrap();

    h.backend.set_transfer_status(
        "transfer-1",
        StageStatus {
            status: "FAILED".to_string(),
            sip_uuid: None,
            message: Some("Checksum mismatch".to_string()),
        },
    );
    let report = h.processor.check_transfers(20).unwrap();
    assert_eq!(report.updated, 1);

    let object = h.object(42).unwrap();
    assert_eq!(object.preservation_status, "transfer_failed");
    assert!(object
        .status_message
        .as_deref()
        .unwrap()
        .contains("Checksum mismatch"));

    // A later success report cannot resurrect the object.
    h.backend.complete_transfer("transfer-1", "X");
    let report = h.processor.update_all_statuses(20).unwrap();
    assert_eq!(report.checked, 0);
    assert_eq!(h.status_of(42).as_deref(), Some("transfer_failed"));
}

#[test]
fn test_failed_ingest_is_recorded() {
    let h = TestHarness::new();
    h.add_valid_item(42, 7);
    h.processor.process_item(42, 7, None).unwrap();
    h.backend.complete_transfer("transfer-1", "X");
    h.processor.check_transfers(20).unwrap();

    h.backend.set_ingest_status("X", StageStatus::new("REJECTED"));
    h.processor.check_ingests(20).unwrap();

    let object = h.object(42).unwrap();
    assert_eq!(object.preservation_status, "ingest_failed");
    assert_eq!(object.ingest_status.as_deref(), Some("REJECTED"));
}

#[test]
fn test_unknown_transfer_counts_as_poll_failure() {
    let h = TestHarness::new();
    object_repo::update_status(
        &h.db,
        42,
        Some(7),
        None,
        &StatusChange {
            backend_transfer_ref: Some("vanished".to_string()),
            ..StatusChange::to("transfer_started")
        },
    )
    .unwrap();

    let report = h.processor.check_transfers(20).unwrap();
    assert_eq!(report.checked, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(h.status_of(42).as_deref(), Some("transfer_started"));
}

#[test]
fn test_check_preservation_status_repolls_in_flight_object() {
    let h = TestHarness::new();
    h.add_valid_item(42, 7);
    h.processor.process_item(42, 7, None).unwrap();
    let object_id = h.object(42).unwrap().id;

    h.backend.complete_transfer("transfer-1", "X");
    let status = h.processor.check_preservation_status(object_id).unwrap();
    assert_eq!(status.item_id, 42);
    assert_eq!(status.status, "ingest_started");
    assert_eq!(status.transfer_status.as_deref(), Some("COMPLETE"));

    let err = h.processor.check_preservation_status(object_id + 100).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_dissemination_only_from_stored_aip() {
    let h = TestHarness::new();
    h.add_valid_item(42, 7);
    h.processor.process_item(42, 7, None).unwrap();
    let object_id = h.object(42).unwrap().id;

    let err = h.processor.record_dissemination(object_id, "dip-1").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);

    h.backend.complete_transfer("transfer-1", "X");
    h.backend.complete_ingest("X", "Y");
    h.processor.update_all_statuses(20).unwrap();
    h.processor.update_all_statuses(20).unwrap();
    assert_eq!(h.status_of(42).as_deref(), Some("aip_stored"));

    let status = h.processor.record_dissemination(object_id, "dip-1").unwrap();
    assert_eq!(status.status, "fully_preserved");
    assert_eq!(status.dip_id.as_deref(), Some("dip-1"));
    assert_eq!(status.aip_id.as_deref(), Some("Y"));
}

#[test]
fn test_verify_object_detects_tampering() {
    let h = TestHarness::new();
    h.add_valid_item(42, 7);
    let result = h.processor.process_item(42, 7, None).unwrap();
    let object_id = h.object(42).unwrap().id;

    let report = h.processor.verify_object(object_id).unwrap();
    assert!(report.is_intact());
    assert_eq!(report.invalid + report.missing, 0);
    assert_eq!(report.valid, report.records.len());

    let payload = h.package_root.join(&result.sip_id).join("objects/item-42.pdf");
    fs::write(&payload, b"bit rot").unwrap();
    let report = h.processor.verify_object(object_id).unwrap();
    assert!(!report.is_intact());
    assert!(report.invalid >= 1);

    fs::remove_file(&payload).unwrap();
    let report = h.processor.verify_object(object_id).unwrap();
    assert!(report.missing >= 1);

    let hashes = hash_repo::list_by_object(&h.db, object_id).unwrap();
    assert!(hashes.iter().all(|row| row.verification_date.is_some()));
    assert!(hashes
        .iter()
        .any(|row| row.verification_status.as_deref() == Some("missing")));
}

#[test]
fn test_audit_log_records_transitions() {
    let h = TestHarness::new();
    h.add_valid_item(42, 7);
    h.processor.process_item(42, 7, None).unwrap();

    let filter = LogFilter {
        item_id: Some(42),
        ..Default::default()
    };
    let (rows, total) = h.processor.audit().query(&filter).unwrap();
    assert!(total >= 2);
    let messages: Vec<&str> = rows.iter().map(|r| r.message.as_str()).collect();
    assert!(messages.contains(&"SIP created"));
    assert!(messages.contains(&"Transfer started"));
}
