//! Test harness for pipeline integration tests.
//!
//! Provides a `TestHarness` that owns a temporary media directory, a
//! package root, an in-memory database and fake collaborators, and wires
//! them into a `Processor`.

#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use barramento::db::object_repo::{self, ObjectRow, StatusChange};
use barramento::db::Database;
use barramento::{PreservationConfig, Processor};
use tempfile::TempDir;

use super::builders::{ConfigBuilder, ItemBuilder};
use super::fakes::{FakeBackend, FakeRepository};

/// Test harness for running the pipeline against fakes.
pub struct TestHarness {
    /// Root temporary directory (cleaned up on drop)
    pub temp_dir: TempDir,
    /// Where item files live before packaging
    pub media_dir: PathBuf,
    /// Where packages are written
    pub package_root: PathBuf,
    pub db: Database,
    pub repository: Arc<FakeRepository>,
    pub backend: Arc<FakeBackend>,
    pub processor: Arc<Processor>,
}

impl TestHarness {
    /// Creates a harness with the default test configuration.
    pub fn new() -> Self {
        Self::with_config(|builder| builder)
    }

    /// Creates a harness, letting the caller adjust the configuration. The
    /// package root is always pointed into the temp dir.
    pub fn with_config(configure: impl FnOnce(ConfigBuilder) -> ConfigBuilder) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let media_dir = temp_dir.path().join("media");
        let package_root = temp_dir.path().join("packages");
        fs::create_dir_all(&media_dir).expect("Failed to create media dir");

        let config = configure(ConfigBuilder::new())
            .package_root(&package_root)
            .build();

        let db = Database::open_in_memory().expect("Failed to open database");
        let repository = Arc::new(FakeRepository::default());
        let backend = Arc::new(FakeBackend::default());
        let processor = Arc::new(Processor::new(
            Arc::new(config),
            db.clone(),
            repository.clone(),
            backend.clone(),
        ));

        Self {
            temp_dir,
            media_dir,
            package_root,
            db,
            repository,
            backend,
            processor,
        }
    }

    pub fn config(&self) -> &PreservationConfig {
        self.processor.config()
    }

    /// Writes a media file and returns its path.
    pub fn media_file(&self, name: &str, content: &[u8]) -> PathBuf {
        let path = self.media_dir.join(name);
        fs::write(&path, content).expect("Failed to write media file");
        path
    }

    /// Registers a valid item (document plus author) with the repository.
    pub fn add_valid_item(&self, id: u64, collection_id: u64) {
        let document = self.media_file(&format!("item-{}.pdf", id), b"%PDF-1.4 test document");
        self.repository.add_item(
            ItemBuilder::new(id, collection_id)
                .title(&format!("Documento {}", id))
                .document(&document)
                .author("Machado de Assis")
                .build(),
        );
    }

    pub fn object(&self, item_id: u64) -> Option<ObjectRow> {
        object_repo::find_by_item(&self.db, item_id).expect("Failed to read object")
    }

    pub fn status_of(&self, item_id: u64) -> Option<String> {
        self.object(item_id).map(|o| o.preservation_status)
    }

    /// Forces an object into a status without going through the pipeline.
    pub fn set_status(&self, item_id: u64, collection_id: u64, status: &str) {
        object_repo::update_status(
            &self.db,
            item_id,
            Some(collection_id),
            None,
            &StatusChange::to(status),
        )
        .expect("Failed to set status");
    }

    /// Number of package directories under the package root.
    pub fn package_count(&self) -> usize {
        match fs::read_dir(&self.package_root) {
            Ok(entries) => entries.filter_map(Result::ok).count(),
            Err(_) => 0,
        }
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
