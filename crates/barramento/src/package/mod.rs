//! Submission information packages.
//!
//! Layout of a generated package:
//!
//! ```text
//! <package_root>/<sip_id>/
//!   objects/                 primary document
//!   objects/attachments/     item attachments
//!   metadata/dc.xml
//!   metadata/mets.xml
//!   metadata/submissionDocumentation/tainacan_metadata.json
//! ```

pub mod builder;
pub mod dublin_core;
pub mod info;
pub mod mets;
mod xml;

pub use builder::PackageBuilder;
pub use info::{PackageFile, PackageInfo, SkippedAttachment};

pub const OBJECTS_DIR: &str = "objects";
pub const ATTACHMENTS_DIR: &str = "attachments";
pub const METADATA_DIR: &str = "metadata";
pub const SUBMISSION_DOCS_DIR: &str = "submissionDocumentation";
pub const DC_FILE: &str = "dc.xml";
pub const METS_FILE: &str = "mets.xml";
pub const SNAPSHOT_FILE: &str = "tainacan_metadata.json";
