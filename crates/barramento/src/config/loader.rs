use std::collections::HashSet;
use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;
use crate::package::dublin_core;

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    let preservation = &config.preservation;

    let mut fields = HashSet::new();
    for mapping in &preservation.metadata_mapping {
        if !fields.insert(mapping.field.as_str()) {
            return Err(ConfigError::Validation {
                message: format!("Metadata field '{}' is mapped more than once", mapping.field),
            });
        }
        if dublin_core::qualify_element(&mapping.element).is_none() {
            return Err(ConfigError::Validation {
                message: format!(
                    "Metadata field '{}' maps to unknown element '{}'",
                    mapping.field, mapping.element
                ),
            });
        }
    }

    for fixed in &preservation.fixed_metadata {
        if dublin_core::qualify_element(&fixed.element).is_none() {
            return Err(ConfigError::Validation {
                message: format!("Fixed metadata uses unknown element '{}'", fixed.element),
            });
        }
    }

    if !config.archivematica.key.is_configured() {
        return Err(ConfigError::Validation {
            message: "archivematica requires one of api_key, api_key_file or api_key_env"
                .to_string(),
        });
    }

    let media = (
        &config.repository.media_url_prefix,
        &config.repository.media_root,
    );
    if media.0.is_some() != media.1.is_some() {
        return Err(ConfigError::Validation {
            message: "repository.media_url_prefix and repository.media_root must be set together"
                .to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{CleanupPolicy, ScheduleFrequency};
    use crate::hash::HashAlgorithm;
    use std::time::Duration;

    const MINIMAL: &str = r#"
    {
        "version": "1.0",
        "repository": { "url": "https://acervo.example.org" },
        "archivematica": {
            "url": "https://am.example.org",
            "user": "demo",
            "api_key_env": "ARCHIVEMATICA_API_KEY"
        }
    }
    "#;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config = load_config_from_str(MINIMAL).unwrap();
        let p = &config.preservation;
        assert_eq!(p.hash_algorithm, HashAlgorithm::Sha256);
        assert_eq!(p.max_package_size_mb, 1024);
        assert_eq!(p.retry_attempts, 3);
        assert!(p.document_required);
        assert_eq!(p.cleanup_policy, CleanupPolicy::Keep);
        assert_eq!(p.identifier_prefix, "tainacan");
        assert_eq!(config.schedule.batch_limit, 20);
        assert_eq!(config.schedule.frequency, ScheduleFrequency::Daily);
        assert_eq!(config.schedule.interval(), Duration::from_secs(86_400));
        assert_eq!(config.archivematica.timeout_secs, 45);
        assert_eq!(config.logging.retention_days, 90);
    }

    #[test]
    fn test_full_config() {
        let json = r#"
        {
            "version": "1.0",
            "database_path": "/var/lib/barramento/state.db",
            "preservation": {
                "hash_algorithm": "sha512",
                "max_package_size_mb": 2048,
                "retry_attempts": 5,
                "enabled_collections": [7, 9],
                "metadata_mapping": [
                    { "field": "12", "element": "creator" },
                    { "field": "15", "element": "dcterms:spatial" }
                ],
                "required_metadata": ["12"],
                "fixed_metadata": [{ "element": "rights", "value": "CC-BY" }],
                "cleanup_policy": "remove_on_failure"
            },
            "repository": {
                "url": "https://acervo.example.org",
                "media_url_prefix": "https://acervo.example.org/wp-content/uploads/",
                "media_root": "/srv/www/wp-content/uploads"
            },
            "archivematica": {
                "url": "https://am.example.org",
                "user": "demo",
                "api_key": "abc",
                "transfer_location_uuid": "5b0fd3c8-0000-0000-0000-000000000000"
            },
            "schedule": { "frequency": "hourly", "worker_count": 4 },
            "logging": { "debug_mode": true, "format": "json" }
        }
        "#;

        let config = load_config_from_str(json).unwrap();
        assert_eq!(config.preservation.enabled_collections, vec![7, 9]);
        assert_eq!(config.preservation.metadata_mapping.len(), 2);
        assert_eq!(
            config.preservation.cleanup_policy,
            CleanupPolicy::RemoveOnFailure
        );
        assert_eq!(config.schedule.worker_count, 4);
        assert_eq!(config.schedule.interval(), Duration::from_secs(3600));
        assert!(config.logging.debug_mode);
    }

    #[test]
    fn test_schema_rejects_unknown_algorithm() {
        let json = MINIMAL.replace(
            r#""version": "1.0","#,
            r#""version": "1.0", "preservation": { "hash_algorithm": "crc32" },"#,
        );
        let result = load_config_from_str(&json);
        assert!(matches!(result, Err(ConfigError::SchemaValidation { .. })));
    }

    #[test]
    fn test_schema_rejects_unknown_keys() {
        let json = MINIMAL.replace(r#""version": "1.0","#, r#""version": "1.0", "colour": 1,"#);
        assert!(matches!(
            load_config_from_str(&json),
            Err(ConfigError::SchemaValidation { .. })
        ));
    }

    #[test]
    fn test_unknown_mapping_element_rejected() {
        let json = MINIMAL.replace(
            r#""version": "1.0","#,
            r#""version": "1.0", "preservation": { "metadata_mapping": [{ "field": "3", "element": "colour" }] },"#,
        );
        match load_config_from_str(&json) {
            Err(ConfigError::Validation { message }) => assert!(message.contains("colour")),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_mapping_rejected() {
        let json = MINIMAL.replace(
            r#""version": "1.0","#,
            r#""version": "1.0", "preservation": { "metadata_mapping": [
                { "field": "3", "element": "creator" },
                { "field": "3", "element": "subject" }
            ] },"#,
        );
        assert!(matches!(
            load_config_from_str(&json),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn test_missing_backend_key_rejected() {
        let json = r#"
        {
            "version": "1.0",
            "repository": { "url": "https://acervo.example.org" },
            "archivematica": { "url": "https://am.example.org", "user": "demo" }
        }
        "#;
        assert!(matches!(
            load_config_from_str(json),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            load_config_from_str("{ not json"),
            Err(ConfigError::ParseJson(_))
        ));
    }

    #[test]
    fn test_load_config_missing_file() {
        assert!(matches!(
            load_config("/nonexistent/barramento.json"),
            Err(ConfigError::ReadFile { .. })
        ));
    }
}
