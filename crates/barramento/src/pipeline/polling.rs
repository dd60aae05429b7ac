//! Status tracking against the preservation backend.
//!
//! Objects are re-checked oldest `last_status_update` first. A backend
//! error leaves the object untouched so the next pass can retry.

use serde_json::json;
use tracing::{debug, info_span};

use crate::db::object_repo::{self, ObjectRow, StatusChange};
use crate::error::{PreservationError, Result};

use super::report::{PollOutcome, PollReport, StatusReport};
use super::runner::{Processor, Transition};
use super::state::{BackendStatus, PreservationStatus};

impl Processor {
    /// Polls transfers of objects in `transfer_started`.
    pub fn check_transfers(&self, limit: usize) -> Result<PollReport> {
        let _span = info_span!("check_transfers", limit).entered();
        self.poll_all(&[PreservationStatus::TransferStarted], limit)
    }

    /// Polls ingests of objects in `ingest_started`.
    pub fn check_ingests(&self, limit: usize) -> Result<PollReport> {
        let _span = info_span!("check_ingests", limit).entered();
        self.poll_all(&[PreservationStatus::IngestStarted], limit)
    }

    /// Re-polls every in-flight object regardless of stage.
    pub fn update_all_statuses(&self, limit: usize) -> Result<PollReport> {
        let _span = info_span!("update_all_statuses", limit).entered();
        self.poll_all(&PreservationStatus::IN_FLIGHT, limit)
    }

    /// Current state of an object, re-polled first when it is in flight.
    pub fn check_preservation_status(&self, object_id: i64) -> Result<StatusReport> {
        let object = object_repo::find_by_id(&self.db, object_id)?
            .ok_or_else(|| PreservationError::not_found("Preservation object", object_id))?;

        if let Err(e) = self.poll_object(&object) {
            self.log_poll_failure(&object, &e);
        }

        let current = object_repo::find_by_id(&self.db, object_id)?
            .ok_or_else(|| PreservationError::not_found("Preservation object", object_id))?;
        Ok(StatusReport::from(current))
    }

    /// Records the dissemination package of a stored object, making it
    /// `fully_preserved`.
    pub fn record_dissemination(&self, object_id: i64, dip_id: &str) -> Result<StatusReport> {
        let object = object_repo::find_by_id(&self.db, object_id)?
            .ok_or_else(|| PreservationError::not_found("Preservation object", object_id))?;
        let from = parse_status(&object)?;
        if from != PreservationStatus::AipStored {
            return Err(PreservationError::InvalidTransition {
                item_id: object.item_id,
                from: from.to_string(),
                to: PreservationStatus::FullyPreserved.to_string(),
            });
        }

        let change = StatusChange {
            dip_id: Some(dip_id.to_string()),
            ..StatusChange::default()
        };
        let outcome = self.transition(
            object.item_id,
            object.collection_id,
            from,
            PreservationStatus::FullyPreserved,
            change,
            "dissemination_recorded",
        )?;
        if let Transition::Conflict { current, .. } = outcome {
            return Err(PreservationError::InvalidTransition {
                item_id: object.item_id,
                from: current,
                to: PreservationStatus::FullyPreserved.to_string(),
            });
        }

        let current = object_repo::find_by_id(&self.db, object_id)?
            .ok_or_else(|| PreservationError::not_found("Preservation object", object_id))?;
        Ok(StatusReport::from(current))
    }

    fn poll_all(&self, statuses: &[PreservationStatus], limit: usize) -> Result<PollReport> {
        let names: Vec<&str> = statuses.iter().map(|s| s.as_str()).collect();
        let objects = object_repo::list_by_status(&self.db, &names, limit)?;

        let mut report = PollReport::default();
        for object in &objects {
            match self.poll_object(object) {
                Ok(outcome) => report.record(object, outcome),
                Err(e) => {
                    self.log_poll_failure(object, &e);
                    report.record_failure(object, e.to_string());
                }
            }
        }

        debug!(
            checked = report.checked,
            updated = report.updated,
            failed = report.failed,
            "Poll pass finished"
        );
        Ok(report)
    }

    fn poll_object(&self, object: &ObjectRow) -> Result<PollOutcome> {
        match parse_status(object)? {
            PreservationStatus::TransferStarted => self.poll_transfer(object),
            PreservationStatus::IngestStarted => self.poll_ingest(object),
            other => Ok(PollOutcome::Unchanged {
                reason: format!("status {} is not polled", other),
            }),
        }
    }

    fn poll_transfer(&self, object: &ObjectRow) -> Result<PollOutcome> {
        let Some(uuid) = object.backend_transfer_ref.as_deref().filter(|u| !u.is_empty()) else {
            return Ok(PollOutcome::Unchanged {
                reason: "no transfer reference recorded".to_string(),
            });
        };

        let stage = self.backend.get_transfer_status(uuid)?;
        let from = PreservationStatus::TransferStarted;
        let base = StatusChange {
            transfer_status: Some(stage.status.clone()),
            ..StatusChange::default()
        };

        match BackendStatus::parse(&stage.status) {
            BackendStatus::Complete => match stage.sip_uuid.filter(|s| !s.is_empty()) {
                Some(sip_uuid) => {
                    let change = StatusChange {
                        backend_sip_ref: Some(sip_uuid),
                        ..base
                    };
                    self.advance(object, from, PreservationStatus::IngestStarted, change, "transfer_complete")
                }
                None => self.restamp(object, from, base),
            },
            BackendStatus::Processing => self.restamp(object, from, base),
            status if status.is_failure() => {
                let change = StatusChange {
                    status_message: Some(failure_message(&stage.status, stage.message.as_deref())),
                    ..base
                };
                self.advance(object, from, PreservationStatus::TransferFailed, change, "transfer_failed")
            }
            _ => Ok(PollOutcome::Unchanged {
                reason: format!("unrecognised transfer status '{}'", stage.status),
            }),
        }
    }

    fn poll_ingest(&self, object: &ObjectRow) -> Result<PollOutcome> {
        let Some(uuid) = object.backend_sip_ref.as_deref().filter(|u| !u.is_empty()) else {
            return Ok(PollOutcome::Unchanged {
                reason: "no ingest reference recorded".to_string(),
            });
        };

        let stage = self.backend.get_ingest_status(uuid)?;
        let from = PreservationStatus::IngestStarted;
        let base = StatusChange {
            ingest_status: Some(stage.status.clone()),
            ..StatusChange::default()
        };

        match BackendStatus::parse(&stage.status) {
            BackendStatus::Complete => {
                let aip = self.backend.get_aip_info(uuid)?;
                match aip.uuid.filter(|u| !u.is_empty()) {
                    Some(aip_id) => {
                        let change = StatusChange {
                            aip_id: Some(aip_id),
                            archivematica_url: aip.url,
                            ..base
                        };
                        self.advance(object, from, PreservationStatus::AipStored, change, "ingest_complete")
                    }
                    None => Ok(PollOutcome::Unchanged {
                        reason: "ingest complete but no AIP reported yet".to_string(),
                    }),
                }
            }
            BackendStatus::Processing => self.restamp(object, from, base),
            status if status.is_failure() => {
                let change = StatusChange {
                    status_message: Some(failure_message(&stage.status, stage.message.as_deref())),
                    ..base
                };
                self.advance(object, from, PreservationStatus::IngestFailed, change, "ingest_failed")
            }
            _ => Ok(PollOutcome::Unchanged {
                reason: format!("unrecognised ingest status '{}'", stage.status),
            }),
        }
    }

    fn advance(
        &self,
        object: &ObjectRow,
        from: PreservationStatus,
        to: PreservationStatus,
        change: StatusChange,
        event: &str,
    ) -> Result<PollOutcome> {
        match self.transition(object.item_id, object.collection_id, from, to, change, event)? {
            Transition::Applied => Ok(PollOutcome::Advanced { from, to }),
            Transition::Conflict { current, .. } => Ok(PollOutcome::Unchanged {
                reason: format!("status changed concurrently to {}", current),
            }),
        }
    }

    fn restamp(
        &self,
        object: &ObjectRow,
        status: PreservationStatus,
        change: StatusChange,
    ) -> Result<PollOutcome> {
        let outcome =
            self.transition(object.item_id, object.collection_id, status, status, change, "poll")?;
        Ok(if outcome.is_applied() {
            PollOutcome::Waiting
        } else {
            PollOutcome::Unchanged {
                reason: "status changed concurrently".to_string(),
            }
        })
    }

    fn log_poll_failure(&self, object: &ObjectRow, err: &PreservationError) {
        self.audit.warning(
            "Failed to check preservation status",
            json!({
                "item_id": object.item_id,
                "collection_id": object.collection_id,
                "object_id": object.id,
                "status": object.preservation_status,
                "error": err.to_string(),
            }),
        );
    }
}

fn parse_status(object: &ObjectRow) -> Result<PreservationStatus> {
    object
        .preservation_status
        .parse()
        .map_err(|_| PreservationError::InvalidTransition {
            item_id: object.item_id,
            from: object.preservation_status.clone(),
            to: "unknown".to_string(),
        })
}

fn failure_message(status: &str, message: Option<&str>) -> String {
    match message.map(str::trim).filter(|m| !m.is_empty()) {
        Some(message) => format!("{}: {}", status, message),
        None => status.to_string(),
    }
}
