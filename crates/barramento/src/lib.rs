pub mod audit;
pub mod backend;
pub mod config;
pub mod db;
pub mod error;
pub mod hash;
pub(crate) mod http;
pub mod package;
pub mod pipeline;
pub mod queue;
pub mod repository;
pub mod sanitize;
pub mod scheduler;
pub mod secrets;
pub mod validator;
pub mod worker;

pub use audit::{AuditLog, LogLevel};
pub use backend::{ArchivematicaClient, PreservationBackend};
pub use config::{load_config, Config};
pub use db::{Database, DatabaseError};
pub use error::{
    ClientError, ConfigError, ErrorKind, HashError, PackageError, PreservationError, Result,
    ValidationError, WorkerError,
};
pub use hash::HashAlgorithm;
pub use pipeline::{PreservationConfig, PreservationStatus, Processor};
pub use queue::QueueManager;
pub use repository::{RepositoryClient, TainacanClient};
pub use scheduler::Scheduler;
pub use secrets::{resolve_secret, SecretError, SecretSource};
