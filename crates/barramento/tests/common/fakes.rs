//! In-process stand-ins for the repository and the preservation backend.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use barramento::backend::{AipInfo, PreservationBackend, StageStatus, TransferReceipt};
use barramento::repository::{Collection, Item, ItemFilter, ItemPage, RepositoryClient};
use barramento::ClientError;

/// Serves a fixed set of items.
#[derive(Default)]
pub struct FakeRepository {
    items: Mutex<Vec<Item>>,
    fetches: AtomicUsize,
    offline: Mutex<bool>,
}

impl FakeRepository {
    pub fn add_item(&self, item: Item) {
        let mut items = self.items.lock().unwrap();
        items.retain(|existing| existing.id != item.id);
        items.push(item);
    }

    pub fn set_offline(&self, offline: bool) {
        *self.offline.lock().unwrap() = offline;
    }

    /// Number of `get_item` calls so far.
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn check_online(&self) -> Result<(), ClientError> {
        if *self.offline.lock().unwrap() {
            return Err(ClientError::Status {
                status: 503,
                message: "Service Unavailable".to_string(),
            });
        }
        Ok(())
    }
}

impl RepositoryClient for FakeRepository {
    fn list_collections(&self) -> Result<Vec<Collection>, ClientError> {
        self.check_online()?;
        let items = self.items.lock().unwrap();
        let mut ids: Vec<u64> = items.iter().map(|i| i.collection_id).collect();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids
            .into_iter()
            .map(|id| Collection {
                id,
                name: format!("Collection {}", id),
                description: String::new(),
                items_count: items.iter().filter(|i| i.collection_id == id).count() as u64,
                metadata_schema: Vec::new(),
            })
            .collect())
    }

    fn list_items(&self, collection_id: u64, filter: &ItemFilter) -> Result<ItemPage, ClientError> {
        self.check_online()?;
        let items = self.items.lock().unwrap();
        let matching: Vec<Item> = items
            .iter()
            .filter(|i| i.collection_id == collection_id)
            .cloned()
            .collect();
        let per_page = filter.per_page.max(1) as usize;
        let start = (filter.page.max(1) as usize - 1) * per_page;
        Ok(ItemPage {
            total: matching.len() as u64,
            items: matching.into_iter().skip(start).take(per_page).collect(),
        })
    }

    fn get_item(&self, item_id: u64) -> Result<Item, ClientError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        self.items
            .lock()
            .unwrap()
            .iter()
            .find(|i| i.id == item_id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound {
                what: "item",
                id: item_id.to_string(),
            })
    }

    fn test_connection(&self) -> Result<(), ClientError> {
        self.check_online()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StartedTransfer {
    pub uuid: String,
    pub path: PathBuf,
    pub transfer_type: String,
    pub accession: String,
}

#[derive(Default)]
struct BackendState {
    started: Vec<StartedTransfer>,
    transfers: HashMap<String, StageStatus>,
    ingests: HashMap<String, StageStatus>,
    aips: HashMap<String, AipInfo>,
    reject_transfers: bool,
}

/// Records submitted transfers and reports whatever status a test sets.
///
/// A started transfer reports `PROCESSING` until told otherwise. Unknown
/// UUIDs answer with `NotFound`.
#[derive(Default)]
pub struct FakeBackend {
    state: Mutex<BackendState>,
}

impl FakeBackend {
    pub fn started(&self) -> Vec<StartedTransfer> {
        self.state.lock().unwrap().started.clone()
    }

    /// Makes every following `start_transfer` fail with HTTP 500.
    pub fn reject_transfers(&self, reject: bool) {
        self.state.lock().unwrap().reject_transfers = reject;
    }

    pub fn set_transfer_status(&self, uuid: &str, status: StageStatus) {
        self.state
            .lock()
            .unwrap()
            .transfers
            .insert(uuid.to_string(), status);
    }

    pub fn complete_transfer(&self, uuid: &str, sip_uuid: &str) {
        self.set_transfer_status(
            uuid,
            StageStatus {
                status: "COMPLETE".to_string(),
                sip_uuid: Some(sip_uuid.to_string()),
                message: None,
            },
        );
        self.set_ingest_status(sip_uuid, StageStatus::new("PROCESSING"));
    }

    pub fn set_ingest_status(&self, uuid: &str, status: StageStatus) {
        self.state
            .lock()
            .unwrap()
            .ingests
            .insert(uuid.to_string(), status);
    }

    pub fn complete_ingest(&self, sip_uuid: &str, aip_uuid: &str) {
        let mut state = self.state.lock().unwrap();
        state
            .ingests
            .insert(sip_uuid.to_string(), StageStatus::new("COMPLETE"));
        state.aips.insert(
            sip_uuid.to_string(),
            AipInfo {
                uuid: Some(aip_uuid.to_string()),
                url: Some(format!("https://am.example.org/aip/{}", aip_uuid)),
            },
        );
    }
}

impl PreservationBackend for FakeBackend {
    fn start_transfer(
        &self,
        package_path: &Path,
        transfer_type: &str,
        accession: &str,
    ) -> Result<TransferReceipt, ClientError> {
        let mut state = self.state.lock().unwrap();
        if state.reject_transfers {
            return Err(ClientError::Status {
                status: 500,
                message: "Internal Server Error".to_string(),
            });
        }

        let uuid = format!("transfer-{}", state.started.len() + 1);
        state.started.push(StartedTransfer {
            uuid: uuid.clone(),
            path: package_path.to_path_buf(),
            transfer_type: transfer_type.to_string(),
            accession: accession.to_string(),
        });
        state
            .transfers
            .insert(uuid.clone(), StageStatus::new("PROCESSING"));
        Ok(TransferReceipt { uuid })
    }

    fn get_transfer_status(&self, uuid: &str) -> Result<StageStatus, ClientError> {
        self.state
            .lock()
            .unwrap()
            .transfers
            .get(uuid)
            .cloned()
            .ok_or_else(|| ClientError::NotFound {
                what: "transfer",
                id: uuid.to_string(),
            })
    }

    fn get_ingest_status(&self, uuid: &str) -> Result<StageStatus, ClientError> {
        self.state
            .lock()
            .unwrap()
            .ingests
            .get(uuid)
            .cloned()
            .ok_or_else(|| ClientError::NotFound {
                what: "ingest",
                id: uuid.to_string(),
            })
    }

    fn get_aip_info(&self, uuid: &str) -> Result<AipInfo, ClientError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .aips
            .get(uuid)
            .cloned()
            .unwrap_or_default())
    }

    fn test_connection(&self) -> Result<(), ClientError> {
        Ok(())
    }
}
