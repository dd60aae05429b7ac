use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, info_span, warn};

use crate::audit::AuditLog;
use crate::backend::{ArchivematicaClient, PreservationBackend};
use crate::config::Config;
use crate::db::object_repo::{self, StatusChange, StatusOutcome};
use crate::db::Database;
use crate::error::{ConfigError, PreservationError, Result};
use crate::package::{PackageBuilder, PackageInfo};
use crate::queue::QueueManager;
use crate::repository::{Item, RepositoryClient, TainacanClient};
use crate::sanitize;
use crate::validator::{self, Validator};

use super::config::PreservationConfig;
use super::context::PipelineContext;
use super::error::PipelineWarning;
use super::report::ItemResult;
use super::state::PreservationStatus;

/// Moves items from the repository through packaging into the backend and
/// tracks them until they are stored.
pub struct Processor {
    pub(crate) config: Arc<PreservationConfig>,
    pub(crate) db: Database,
    pub(crate) repository: Arc<dyn RepositoryClient>,
    pub(crate) backend: Arc<dyn PreservationBackend>,
    pub(crate) validator: Validator,
    pub(crate) builder: PackageBuilder,
    pub(crate) queue: QueueManager,
    pub(crate) audit: AuditLog,
}

impl Processor {
    /// Production constructor: builds both HTTP clients from the config.
    pub fn from_config(config: &Config, db: Database) -> std::result::Result<Self, ConfigError> {
        let repository = Arc::new(TainacanClient::from_settings(&config.repository)?);
        let backend = Arc::new(ArchivematicaClient::from_settings(&config.archivematica)?);
        Ok(Self::new(
            Arc::new(PreservationConfig::from_config(config)),
            db,
            repository,
            backend,
        ))
    }

    pub fn new(
        config: Arc<PreservationConfig>,
        db: Database,
        repository: Arc<dyn RepositoryClient>,
        backend: Arc<dyn PreservationBackend>,
    ) -> Self {
        let audit = AuditLog::new(db.clone(), config.debug_mode);
        Self {
            validator: Validator::new(Arc::clone(&config), db.clone(), audit.clone()),
            builder: PackageBuilder::new(Arc::clone(&config), db.clone()),
            queue: QueueManager::new(db.clone(), config.retry_attempts),
            audit,
            config,
            db,
            repository,
            backend,
        }
    }

    pub fn config(&self) -> &PreservationConfig {
        &self.config
    }

    pub fn queue(&self) -> &QueueManager {
        &self.queue
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// Fetches, validates, packages and submits one item.
    ///
    /// On success the object is `transfer_started`. Every failure is
    /// written to the audit log before it is returned.
    pub fn process_item(
        &self,
        item_id: u64,
        collection_id: u64,
        batch_id: Option<&str>,
    ) -> Result<ItemResult> {
        let mut ctx = PipelineContext::new(item_id, collection_id, batch_id.map(str::to_string));
        let _span = info_span!("process_item", item_id, collection_id).entered();

        // Step 1: Fetch item
        let item = {
            let _step = info_span!("fetch_item").entered();
            match self.step_fetch(&ctx) {
                Ok(item) => item,
                Err(e) => {
                    self.audit.error("Failed to fetch item", failure_context(&ctx, &e));
                    return Err(e);
                }
            }
        };

        // Step 2: Validate item
        {
            let _step = info_span!("validate_item").entered();
            if let Err(e) = self.validator.validate_item(&item) {
                let e = PreservationError::from(e);
                self.audit.warning("Item validation failed", failure_context(&ctx, &e));
                return Err(e);
            }
        }

        // Step 3: Build package
        let package = {
            let _step = info_span!("build_package").entered();
            match self.step_build(&mut ctx, &item) {
                Ok(package) => package,
                Err(e) => {
                    self.audit.error("Failed to create SIP", failure_context(&ctx, &e));
                    return Err(e);
                }
            }
        };

        // Step 4: Check the built package
        {
            let _step = info_span!("check_package").entered();
            if let Err(e) = self.step_check_package(&mut ctx, &package) {
                self.audit.error("Package rejected before submission", failure_context(&ctx, &e));
                return Err(e);
            }
        }

        // Step 5: Start transfer
        let transfer_uuid = {
            let _step = info_span!("start_transfer").entered();
            match self.step_submit(&mut ctx, &item, &package) {
                Ok(uuid) => uuid,
                Err(e) => {
                    self.audit.error("Failed to start transfer", failure_context(&ctx, &e));
                    return Err(e);
                }
            }
        };

        Ok(ItemResult {
            item_id,
            collection_id,
            sip_id: package.sip_id,
            transfer_uuid,
            status: PreservationStatus::TransferStarted,
            batch_id: ctx.batch_id.or(Some(package.batch_id)),
            warnings: ctx.warnings,
        })
    }

    fn step_fetch(&self, ctx: &PipelineContext) -> Result<Item> {
        let mut item = self.repository.get_item(ctx.item_id)?;
        if item.collection_id != ctx.collection_id {
            debug!(
                reported = item.collection_id,
                queued = ctx.collection_id,
                "Item collection differs from queued collection"
            );
            item.collection_id = ctx.collection_id;
        }
        Ok(item)
    }

    fn step_build(&self, ctx: &mut PipelineContext, item: &Item) -> Result<PackageInfo> {
        let package = self.builder.build(item)?;

        for skipped in &package.skipped_attachments {
            self.audit.warning(
                "Attachment skipped",
                json!({
                    "item_id": item.id,
                    "collection_id": ctx.collection_id,
                    "sip_id": package.sip_id,
                    "attachment": skipped.source,
                    "reason": skipped.reason,
                }),
            );
            ctx.warnings.push(PipelineWarning::AttachmentSkipped {
                source: skipped.source.clone(),
                reason: skipped.reason.clone(),
            });
        }

        self.audit.info(
            "SIP created",
            json!({
                "item_id": item.id,
                "collection_id": ctx.collection_id,
                "batch_id": ctx.batch_id.as_deref().unwrap_or(package.batch_id.as_str()),
                "sip_id": package.sip_id,
                "package": sanitize::redact_path(&package.path),
                "files": package.files.len(),
                "hash": package.hash,
                "algorithm": package.algorithm,
            }),
        );

        ctx.sip_id = Some(package.sip_id.clone());
        ctx.package_path = Some(package.path.clone());
        Ok(package)
    }

    fn step_check_package(&self, ctx: &mut PipelineContext, package: &PackageInfo) -> Result<()> {
        validator::validate_package_structure(&package.path)?;
        ctx.package_size = self.validator.validate_package_size(&package.path)?;
        Ok(())
    }

    fn step_submit(
        &self,
        ctx: &mut PipelineContext,
        item: &Item,
        package: &PackageInfo,
    ) -> Result<String> {
        let accession = format!("{}-{}", self.config.identifier_prefix, item.id);
        let receipt =
            self.backend
                .start_transfer(&package.path, &self.config.transfer_type, &accession)?;

        let change = StatusChange {
            backend_transfer_ref: Some(receipt.uuid.clone()),
            batch_id: ctx.batch_id.clone(),
            ..StatusChange::default()
        };
        let applied = self.transition(
            item.id,
            ctx.collection_id,
            PreservationStatus::SipCreated,
            PreservationStatus::TransferStarted,
            change,
            "transfer_started",
        )?;
        if let Some(warning) = applied.conflict() {
            ctx.warnings.push(warning);
        }

        self.audit.info(
            "Transfer started",
            json!({
                "item_id": item.id,
                "collection_id": ctx.collection_id,
                "batch_id": ctx.batch_id,
                "sip_id": package.sip_id,
                "transfer_uuid": receipt.uuid,
            }),
        );
        ctx.transfer_uuid = Some(receipt.uuid.clone());
        Ok(receipt.uuid)
    }

    /// Applies a tracked status change guarded by the status the caller
    /// last saw. A change that stays on the same status only re-stamps the
    /// object and is not logged as a transition.
    pub(crate) fn transition(
        &self,
        item_id: u64,
        collection_id: u64,
        from: PreservationStatus,
        to: PreservationStatus,
        mut change: StatusChange,
        event: &str,
    ) -> Result<Transition> {
        if !from.can_advance_to(to) {
            return Err(PreservationError::InvalidTransition {
                item_id,
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        change.status = to.as_str().to_string();

        match object_repo::update_status(&self.db, item_id, None, Some(from.as_str()), &change)? {
            StatusOutcome::Applied { old_status } => {
                if from == to {
                    debug!(item_id, status = %to, event, "Status re-stamped");
                } else {
                    self.audit.info(
                        &format!("Status changed: {}→{}", old_status, to),
                        json!({
                            "item_id": item_id,
                            "collection_id": collection_id,
                            "batch_id": change.batch_id,
                            "aip_id": change.aip_id,
                            "event": event,
                            "old_status": old_status,
                            "new_status": to,
                            "message": change.status_message,
                        }),
                    );
                }
                Ok(Transition::Applied)
            }
            StatusOutcome::Inserted => Ok(Transition::Applied),
            StatusOutcome::Conflict { current } => {
                warn!(item_id, expected = %from, current = %current, event, "Status changed concurrently");
                Ok(Transition::Conflict {
                    expected: from,
                    current,
                })
            }
            StatusOutcome::Missing => Err(PreservationError::not_found("Preservation object", item_id)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Transition {
    Applied,
    Conflict {
        expected: PreservationStatus,
        current: String,
    },
}

impl Transition {
    pub(crate) fn is_applied(&self) -> bool {
        matches!(self, Transition::Applied)
    }

    fn conflict(&self) -> Option<PipelineWarning> {
        match self {
            Transition::Applied => None,
            Transition::Conflict { expected, current } => Some(PipelineWarning::StatusConflict {
                expected: expected.to_string(),
                current: current.clone(),
            }),
        }
    }
}

fn failure_context(ctx: &PipelineContext, err: &PreservationError) -> Value {
    json!({
        "item_id": ctx.item_id,
        "collection_id": ctx.collection_id,
        "batch_id": ctx.batch_id,
        "sip_id": ctx.sip_id,
        "error": err.to_string(),
        "kind": err.kind(),
        "details": err.details(),
    })
}
