use std::path::PathBuf;

use super::error::PipelineWarning;

pub struct PipelineContext {
    // Input
    pub item_id: u64,
    pub collection_id: u64,
    pub batch_id: Option<String>,

    // Step 3 results
    pub sip_id: Option<String>,
    pub package_path: Option<PathBuf>,

    // Step 4 result
    pub package_size: u64,

    // Step 5 result
    pub transfer_uuid: Option<String>,

    // Non-fatal warnings
    pub warnings: Vec<PipelineWarning>,
}

impl PipelineContext {
    pub fn new(item_id: u64, collection_id: u64, batch_id: Option<String>) -> Self {
        Self {
            item_id,
            collection_id,
            batch_id,
            sip_id: None,
            package_path: None,
            package_size: 0,
            transfer_uuid: None,
            warnings: Vec::new(),
        }
    }
}
