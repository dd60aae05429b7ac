//! Tainacan REST client (`wp-json/tainacan/v2`).

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::Url;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use crate::config::schema::RepositorySettings;
use crate::error::{ClientError, ConfigError};
use crate::{http, sanitize};

use super::{
    Collection, Item, ItemFile, ItemFilter, ItemPage, MetadataField, MetadataValue,
    RepositoryClient,
};

const API_PREFIX: &str = "wp-json/tainacan/v2/";
const MEDIA_PREFIX: &str = "wp-json/wp/v2/media/";

pub struct TainacanClient {
    http: Client,
    base_url: Url,
    user: Option<String>,
    key: Option<SecretString>,
    media_url_prefix: Option<String>,
    media_root: Option<PathBuf>,
}

impl TainacanClient {
    pub fn from_settings(settings: &RepositorySettings) -> Result<Self, ConfigError> {
        let key = settings
            .key
            .resolve_optional()
            .map_err(|source| ConfigError::Secret {
                field: "repository.api_key",
                source,
            })?;

        Self::new(
            &settings.url,
            settings.user.clone(),
            key,
            Duration::from_secs(settings.timeout_secs),
        )
        .map(|client| {
            client.with_media_mapping(
                settings.media_url_prefix.clone(),
                settings.media_root.as_deref().map(PathBuf::from),
            )
        })
    }

    pub fn new(
        base_url: &str,
        user: Option<String>,
        key: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let base_url = http::base_url(base_url)?;
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::Validation {
                message: format!("Failed to build repository HTTP client: {}", e),
            })?;

        Ok(Self {
            http,
            base_url,
            user,
            key,
            media_url_prefix: None,
            media_root: None,
        })
    }

    /// Public media URLs starting with `prefix` are read from `root` on disk.
    pub fn with_media_mapping(mut self, prefix: Option<String>, root: Option<PathBuf>) -> Self {
        self.media_url_prefix = prefix;
        self.media_root = root;
        self
    }

    fn url(&self, path: &str) -> Result<Url, ClientError> {
        self.base_url
            .join(path)
            .map_err(|e| ClientError::InvalidResponse {
                endpoint: path.to_string(),
                reason: format!("failed to build URL: {}", e),
            })
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match (&self.user, &self.key) {
            (Some(user), Some(key)) => req.basic_auth(user, Some(key.expose_secret())),
            _ => req,
        }
    }

    fn get(&self, path: &str) -> Result<(Value, Option<u64>), ClientError> {
        let url = self.url(path)?;
        let endpoint = sanitize::redact_url(url.as_str());
        tracing::debug!(endpoint = %endpoint, "GET");

        let response = self
            .authorize(self.http.get(url))
            .send()
            .map_err(|source| ClientError::Transport {
                endpoint: endpoint.clone(),
                source,
            })?;

        let status = response.status();
        let total = response
            .headers()
            .get("x-wp-total")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok());
        let body = response.text().unwrap_or_default();

        if !status.is_success() {
            return Err(http::status_error(status, &body));
        }

        let json = serde_json::from_str(&body).map_err(|e| ClientError::InvalidResponse {
            endpoint,
            reason: e.to_string(),
        })?;
        Ok((json, total))
    }

    fn local_path(&self, url: &str) -> Option<PathBuf> {
        let prefix = self.media_url_prefix.as_deref()?;
        let root = self.media_root.as_ref()?;
        let relative = url.strip_prefix(prefix)?.trim_start_matches('/');
        if relative.is_empty() || relative.split('/').any(|part| part == "..") {
            return None;
        }
        Some(root.join(relative))
    }

    fn media_file(&self, media_id: u64) -> Result<ItemFile, ClientError> {
        let (json, _) = self.get(&format!("{}{}", MEDIA_PREFIX, media_id))?;
        let url = str_field(&json, "source_url");
        Ok(ItemFile {
            id: Some(media_id),
            title: rendered(&json["title"]),
            file_path: url.as_deref().and_then(|u| self.local_path(u)),
            mime_type: str_field(&json, "mime_type"),
            size: json["media_details"]["filesize"].as_u64(),
            url,
        })
    }

    fn document(&self, json: &Value) -> Result<Option<ItemFile>, ClientError> {
        let document = &json["document"];

        // Some installations expand the document inline.
        if document.is_object() {
            let mut file = self.attachment(document);
            if file.mime_type.is_none() {
                file.mime_type = str_field(json, "document_mimetype");
            }
            return Ok(Some(file));
        }

        let reference = match document {
            Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => return Ok(None),
        };

        match json["document_type"].as_str().unwrap_or("attachment") {
            "attachment" => {
                let Ok(media_id) = reference.parse::<u64>() else {
                    return Ok(None);
                };
                let mut file = self.media_file(media_id)?;
                if file.mime_type.is_none() {
                    file.mime_type = str_field(json, "document_mimetype");
                }
                Ok(Some(file))
            }
            "url" => Ok(Some(ItemFile {
                url: Some(reference),
                ..ItemFile::default()
            })),
            _ => Ok(None),
        }
    }

    fn attachment(&self, json: &Value) -> ItemFile {
        let url = str_field(json, "url").or_else(|| str_field(json, "source_url"));
        let file_path = str_field(json, "file_path")
            .map(PathBuf::from)
            .or_else(|| url.as_deref().and_then(|u| self.local_path(u)));
        ItemFile {
            id: id_of(&json["id"]),
            title: rendered(&json["title"]),
            file_path,
            mime_type: str_field(json, "mime_type"),
            size: json["size"].as_u64(),
            url,
        }
    }

    fn attachments(&self, item_id: u64) -> Result<Vec<ItemFile>, ClientError> {
        let (json, _) = self.get(&format!("{}items/{}/attachments", API_PREFIX, item_id))?;
        Ok(list_of(&json)
            .iter()
            .map(|attachment| self.attachment(attachment))
            .collect())
    }
}

impl RepositoryClient for TainacanClient {
    fn list_collections(&self) -> Result<Vec<Collection>, ClientError> {
        let (json, _) = self.get(&format!("{}collections?perpage=-1", API_PREFIX))?;

        let mut collections = Vec::new();
        for entry in list_of(&json) {
            let Some(mut collection) = parse_collection(entry) else {
                continue;
            };
            let (schema, _) =
                self.get(&format!("{}collection/{}/metadata", API_PREFIX, collection.id))?;
            collection.metadata_schema = list_of(&schema).iter().filter_map(parse_field).collect();
            collections.push(collection);
        }
        Ok(collections)
    }

    fn list_items(&self, collection_id: u64, filter: &ItemFilter) -> Result<ItemPage, ClientError> {
        let mut path = format!(
            "{}collection/{}/items?perpage={}&paged={}",
            API_PREFIX, collection_id, filter.per_page, filter.page
        );
        if let Some(status) = &filter.status {
            path.push_str(&format!("&status={}", status));
        }

        let (json, total) = self.get(&path)?;
        let items: Vec<Item> = list_of(&json)
            .iter()
            .filter_map(|entry| parse_item(entry, Some(collection_id)))
            .collect();
        let total = total.unwrap_or(items.len() as u64);
        Ok(ItemPage { items, total })
    }

    fn get_item(&self, item_id: u64) -> Result<Item, ClientError> {
        let (json, _) = self
            .get(&format!("{}items/{}", API_PREFIX, item_id))
            .map_err(|e| match e {
                ClientError::Status { status: 404, .. } => ClientError::NotFound {
                    what: "item",
                    id: item_id.to_string(),
                },
                other => other,
            })?;

        let mut item = parse_item(&json, None).ok_or_else(|| ClientError::InvalidResponse {
            endpoint: format!("items/{}", item_id),
            reason: "missing id, title or collection_id".to_string(),
        })?;
        item.document = self.document(&json)?;
        item.attachments = self.attachments(item_id)?;
        Ok(item)
    }

    fn test_connection(&self) -> Result<(), ClientError> {
        self.get(&format!("{}collections?perpage=1", API_PREFIX))
            .map(|_| ())
    }
}

fn list_of(json: &Value) -> &[Value] {
    match json {
        Value::Array(items) => items,
        Value::Object(map) => map
            .get("items")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]),
        _ => &[],
    }
}

fn id_of(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn str_field(json: &Value, key: &str) -> Option<String> {
    json[key]
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// WordPress wraps some strings as `{"rendered": "..."}`.
fn rendered(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Object(map) => map
            .get("rendered")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        _ => None,
    }
}

fn parse_collection(json: &Value) -> Option<Collection> {
    let id = id_of(&json["id"])?;
    let items_count = json["items_count"]
        .as_u64()
        .or_else(|| json["total_items"]["publish"].as_u64())
        .or_else(|| id_of(&json["total_items"]["publish"]))
        .unwrap_or(0);
    Some(Collection {
        id,
        name: rendered(&json["name"]).unwrap_or_default(),
        description: rendered(&json["description"]).unwrap_or_default(),
        items_count,
        metadata_schema: Vec::new(),
    })
}

fn parse_field(json: &Value) -> Option<MetadataField> {
    let id = id_of(&json["id"])?;
    let flag = |v: &Value| matches!(v.as_str(), Some("yes")) || v.as_bool().unwrap_or(false);
    Some(MetadataField {
        id: id.to_string(),
        name: rendered(&json["name"]).unwrap_or_default(),
        field_type: str_field(json, "metadata_type").unwrap_or_default(),
        required: flag(&json["required"]),
        multiple: flag(&json["multiple"]),
        semantic_uri: str_field(json, "semantic_uri"),
    })
}

/// Builds an item from its REST representation. Document and attachments
/// need extra requests and are filled in by the caller.
fn parse_item(json: &Value, collection_id: Option<u64>) -> Option<Item> {
    let id = id_of(&json["id"])?;
    let collection_id = id_of(&json["collection_id"]).or(collection_id)?;

    let mut metadata = BTreeMap::new();
    if let Value::Object(entries) = &json["metadata"] {
        for (key, entry) in entries {
            let field_id = id_of(&entry["id"])
                .map(|id| id.to_string())
                .unwrap_or_else(|| key.clone());
            metadata.insert(
                field_id,
                MetadataValue {
                    name: rendered(&entry["name"]).unwrap_or_else(|| key.clone()),
                    value: entry["value"].clone(),
                    semantic_uri: str_field(entry, "semantic_uri"),
                },
            );
        }
    }

    Some(Item {
        id,
        title: rendered(&json["title"]).unwrap_or_default(),
        description: rendered(&json["description"]).unwrap_or_default(),
        collection_id,
        document: None,
        attachments: Vec::new(),
        metadata,
        url: str_field(json, "url"),
        creation_date: str_field(json, "creation_date"),
        modification_date: str_field(json, "modification_date"),
    })
}
