pub mod loader;
pub mod schema;

pub use loader::{load_config, load_config_from_str};
pub use schema::{
    ArchivematicaSettings, CleanupPolicy, Config, FixedMetadata, LogFormat, LoggingSettings,
    MetadataMapping, PreservationSettings, RepositorySettings, ScheduleFrequency,
    ScheduleSettings,
};
