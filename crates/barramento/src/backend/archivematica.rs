//! Archivematica dashboard API client.

use std::path::Path;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::Url;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::config::schema::ArchivematicaSettings;
use crate::error::{ClientError, ConfigError};
use crate::{http, sanitize};

use super::{AipInfo, PreservationBackend, StageStatus, TransferReceipt};

pub struct ArchivematicaClient {
    http: Client,
    base_url: Url,
    user: String,
    key: SecretString,
    transfer_location: Option<String>,
}

impl ArchivematicaClient {
    pub fn from_settings(settings: &ArchivematicaSettings) -> Result<Self, ConfigError> {
        let key = settings
            .key
            .resolve()
            .map_err(|source| ConfigError::Secret {
                field: "archivematica.api_key",
                source,
            })?;

        Ok(Self::new(
            &settings.url,
            &settings.user,
            key,
            Duration::from_secs(settings.timeout_secs),
        )?
        .with_transfer_location(settings.transfer_location_uuid.clone()))
    }

    pub fn new(
        base_url: &str,
        user: &str,
        key: SecretString,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let base_url = http::base_url(base_url)?;
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::Validation {
                message: format!("Failed to build Archivematica HTTP client: {}", e),
            })?;

        Ok(Self {
            http,
            base_url,
            user: user.to_string(),
            key,
            transfer_location: None,
        })
    }

    /// Package paths are sent relative to this storage-service location.
    pub fn with_transfer_location(mut self, location_uuid: Option<String>) -> Self {
        self.transfer_location = location_uuid.filter(|l| !l.is_empty());
        self
    }

    /// The `path` value of a start-transfer request.
    ///
    /// With a registered location this is base64 of `<location>:<path>`,
    /// otherwise the plain path.
    pub fn transfer_path(&self, package_path: &Path) -> String {
        let path = package_path.to_string_lossy();
        match &self.transfer_location {
            Some(location) => STANDARD.encode(format!("{}:{}", location, path)),
            None => path.into_owned(),
        }
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        req.header(
            "Authorization",
            format!("ApiKey {}:{}", self.user, self.key.expose_secret()),
        )
    }

    fn send<T: DeserializeOwned>(&self, req: RequestBuilder, path: &str) -> Result<T, ClientError> {
        let endpoint = sanitize::redact_url(&format!("{}{}", self.base_url, path));
        let response = self
            .authorize(req)
            .send()
            .map_err(|source| ClientError::Transport {
                endpoint: endpoint.clone(),
                source,
            })?;

        let status = response.status();
        let body = response.text().unwrap_or_default();
        tracing::debug!(endpoint = %endpoint, status = status.as_u16(), "Archivematica response");

        if !status.is_success() {
            return Err(http::status_error(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| ClientError::InvalidResponse {
            endpoint,
            reason: e.to_string(),
        })
    }

    fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let url = self.url(path)?;
        self.send(self.http.get(url), path)
    }

    fn url(&self, path: &str) -> Result<Url, ClientError> {
        self.base_url
            .join(path)
            .map_err(|e| ClientError::InvalidResponse {
                endpoint: path.to_string(),
                reason: format!("failed to build URL: {}", e),
            })
    }
}

impl PreservationBackend for ArchivematicaClient {
    fn start_transfer(
        &self,
        package_path: &Path,
        transfer_type: &str,
        accession: &str,
    ) -> Result<TransferReceipt, ClientError> {
        const PATH: &str = "api/transfer/start_transfer/";

        let name = package_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut body = json!({
            "name": name,
            "type": transfer_type,
            "path": self.transfer_path(package_path),
        });
        if !accession.is_empty() {
            body["accession"] = json!(accession);
        }

        let url = self.url(PATH)?;
        let response: serde_json::Value = self.send(self.http.post(url).json(&body), PATH)?;
        let uuid = response["uuid"]
            .as_str()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| ClientError::InvalidResponse {
                endpoint: PATH.to_string(),
                reason: "response has no transfer uuid".to_string(),
            })?;

        Ok(TransferReceipt {
            uuid: uuid.to_string(),
        })
    }

    fn get_transfer_status(&self, uuid: &str) -> Result<StageStatus, ClientError> {
        self.get(&format!("api/transfer/status/{}/", uuid))
    }

    fn get_ingest_status(&self, uuid: &str) -> Result<StageStatus, ClientError> {
        self.get(&format!("api/ingest/status/{}/", uuid))
    }

    fn get_aip_info(&self, uuid: &str) -> Result<AipInfo, ClientError> {
        self.get(&format!("api/ingest/completed/{}/", uuid))
    }

    fn test_connection(&self) -> Result<(), ClientError> {
        if self.user.is_empty() || self.key.expose_secret().is_empty() {
            return Err(ClientError::MissingCredentials {
                service: "archivematica",
            });
        }
        self.get::<serde_json::Value>("api/transfer/start_transfer/")
            .map(|_| ())
    }
}
