use std::path::Path;

use serde_json::json;
use tracing::{debug, info_span};

use crate::db::{hash_repo, now, object_repo};
use crate::error::{PreservationError, Result};
use crate::hash::{self, HashAlgorithm};

use super::report::{HashCheck, IntegrityReport};
use super::runner::Processor;

pub const VERIFICATION_VALID: &str = "valid";
pub const VERIFICATION_INVALID: &str = "invalid";
pub const VERIFICATION_MISSING: &str = "missing";

impl Processor {
    /// Re-hashes every recorded file and package of an object and stamps
    /// the outcome on each hash record.
    pub fn verify_object(&self, object_id: i64) -> Result<IntegrityReport> {
        let _span = info_span!("verify_object", object_id).entered();

        let object = object_repo::find_by_id(&self.db, object_id)?
            .ok_or_else(|| PreservationError::not_found("Preservation object", object_id))?;
        let records = hash_repo::list_by_object(&self.db, object_id)?;

        let mut report = IntegrityReport {
            object_id,
            item_id: object.item_id,
            verified_at: now(),
            valid: 0,
            invalid: 0,
            missing: 0,
            records: Vec::with_capacity(records.len()),
        };

        for record in &records {
            let status = check_record(&record.file_path, &record.hash_value, &record.hash_type);
            match status {
                VERIFICATION_VALID => report.valid += 1,
                VERIFICATION_MISSING => report.missing += 1,
                _ => report.invalid += 1,
            }
            hash_repo::update_verification(&self.db, record.id, status)?;
            report.records.push(HashCheck {
                hash_id: record.id,
                file_path: record.file_path.clone(),
                is_package: record.is_package,
                algorithm: record.hash_type.clone(),
                status: status.to_string(),
            });
        }

        let context = json!({
            "item_id": object.item_id,
            "collection_id": object.collection_id,
            "aip_id": object.aip_id,
            "object_id": object_id,
            "valid": report.valid,
            "invalid": report.invalid,
            "missing": report.missing,
        });
        if report.is_intact() {
            self.audit.info("Integrity check passed", context);
        } else {
            self.audit.error("Integrity check failed", context);
        }

        Ok(report)
    }
}

fn check_record(file_path: &str, expected: &str, algorithm: &str) -> &'static str {
    let path = Path::new(file_path);
    if !path.exists() {
        return VERIFICATION_MISSING;
    }

    let algorithm: HashAlgorithm = match algorithm.parse() {
        Ok(algorithm) => algorithm,
        Err(e) => {
            debug!(error = %e, "Unknown algorithm on hash record");
            return VERIFICATION_INVALID;
        }
    };

    match hash::verify(path, expected, algorithm) {
        Ok(true) => VERIFICATION_VALID,
        Ok(false) => VERIFICATION_INVALID,
        Err(e) => {
            debug!(error = %e, "Re-hash failed");
            VERIFICATION_INVALID
        }
    }
}
