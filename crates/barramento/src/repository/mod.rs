//! The digital repository the items come from.

pub mod tainacan;

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ClientError;

pub use tainacan::TainacanClient;

/// Read access to collections and items.
pub trait RepositoryClient: Send + Sync {
    fn list_collections(&self) -> Result<Vec<Collection>, ClientError>;

    fn list_items(&self, collection_id: u64, filter: &ItemFilter) -> Result<ItemPage, ClientError>;

    /// Fails with `ClientError::NotFound` when the item does not exist.
    fn get_item(&self, item_id: u64) -> Result<Item, ClientError>;

    fn test_connection(&self) -> Result<(), ClientError>;

    /// Every item of a collection, page by page.
    fn list_all_items(&self, collection_id: u64) -> Result<Vec<Item>, ClientError> {
        let mut filter = ItemFilter::default();
        let mut items = Vec::new();
        loop {
            let page = self.list_items(collection_id, &filter)?;
            let fetched = page.items.len();
            items.extend(page.items);
            if fetched == 0 || fetched < filter.per_page as usize || items.len() as u64 >= page.total
            {
                break;
            }
            filter.page += 1;
        }
        Ok(items)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub items_count: u64,
    #[serde(default)]
    pub metadata_schema: Vec<MetadataField>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataField {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub field_type: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub multiple: bool,
    #[serde(default)]
    pub semantic_uri: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFilter {
    pub per_page: u32,
    pub page: u32,
    pub status: Option<String>,
}

impl Default for ItemFilter {
    fn default() -> Self {
        Self {
            per_page: 100,
            page: 1,
            status: Some("publish".to_string()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ItemPage {
    pub items: Vec<Item>,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub collection_id: u64,
    #[serde(default)]
    pub document: Option<ItemFile>,
    #[serde(default)]
    pub attachments: Vec<ItemFile>,
    /// Keyed by metadata field id.
    #[serde(default)]
    pub metadata: BTreeMap<String, MetadataValue>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub creation_date: Option<String>,
    #[serde(default)]
    pub modification_date: Option<String>,
}

/// The primary document or an attachment of an item.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ItemFile {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub title: Option<String>,
    /// Local path of the file, when the repository's media is reachable.
    #[serde(default)]
    pub file_path: Option<PathBuf>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataValue {
    pub name: String,
    #[serde(default)]
    pub value: serde_json::Value,
    #[serde(default)]
    pub semantic_uri: Option<String>,
}

impl MetadataValue {
    pub fn new(name: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            value,
            semantic_uri: None,
        }
    }

    /// The value flattened to its non-empty text parts; one entry per value
    /// of a multi-valued field.
    pub fn values(&self) -> Vec<String> {
        let mut out = Vec::new();
        collect_text(&self.value, &mut out);
        out
    }

    pub fn is_empty(&self) -> bool {
        self.values().is_empty()
    }
}

fn collect_text(value: &serde_json::Value, out: &mut Vec<String>) {
    use serde_json::Value;

    match value {
        Value::Null => {}
        Value::String(s) => {
            let s = s.trim();
            if !s.is_empty() {
                out.push(s.to_string());
            }
        }
        Value::Bool(b) => out.push(b.to_string()),
        Value::Number(n) => out.push(n.to_string()),
        Value::Array(values) => {
            for v in values {
                collect_text(v, out);
            }
        }
        // Taxonomy terms and relationships come back as objects.
        Value::Object(map) => {
            if let Some(v) = map.get("name").or_else(|| map.get("value")) {
                collect_text(v, out);
            }
        }
    }
}

impl Item {
    /// Text values of a metadata field, empty when absent.
    pub fn metadata_values(&self, field_id: &str) -> Vec<String> {
        self.metadata
            .get(field_id)
            .map(MetadataValue::values)
            .unwrap_or_default()
    }
}
