//! Configuration management with environment variable support.
//!
//! This module provides [`Config`] for loading and validating SealStore's
//! object storage settings from JSON files and environment variables.
//!
//! ## Environment Variables
//!
//! - `SEALSTORE_CONFIG`: Override config file path
//! - `S3_BUCKET_NAME`: Target bucket
//! - `AWS_REGION`: Bucket region
//! - `S3_ENDPOINT`: Custom endpoint for S3-compatible services
//! - `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY`: Static credentials
//! - `KMS_KEY_ID`: Managed key used for server-side encrypted uploads
//!
//! The encryption password is never part of the config.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Environment variable names for configuration overrides
pub const ENV_CONFIG_PATH: &str = "SEALSTORE_CONFIG";
pub const ENV_BUCKET: &str = "S3_BUCKET_NAME";
pub const ENV_REGION: &str = "AWS_REGION";
pub const ENV_ENDPOINT: &str = "S3_ENDPOINT";
pub const ENV_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
pub const ENV_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
pub const ENV_KMS_KEY_ID: &str = "KMS_KEY_ID";

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub kms_key_id: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bucket: "default-bucket".to_string(),
            region: "us-east-1".to_string(),
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
            kms_key_id: None,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("kms_key_id", &self.kms_key_id)
            .finish()
    }
}

impl Config {
    /// Load config from file path, then apply environment overrides.
    /// A missing file is an error.
    pub fn load(path: &str) -> Result<Self> {
        if !Path::new(path).exists() {
            anyhow::bail!("config file {} not found", path);
        }
        info!(path, "loading config from file");
        let s =
            fs::read_to_string(path).with_context(|| format!("reading config file {}", path))?;
        let mut config: Config =
            serde_json::from_str(&s).with_context(|| format!("parsing config file {}", path))?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load config with environment variable overrides
    /// Priority: ENV vars > config file > defaults
    ///
    /// Defaults are used only when no path is given and `SEALSTORE_CONFIG`
    /// is unset.
    pub fn load_with_env(path: Option<&str>) -> Result<Self> {
        let config_path = path
            .map(String::from)
            .or_else(|| env::var(ENV_CONFIG_PATH).ok());

        if let Some(p) = config_path {
            return Self::load(&p);
        }

        debug!("using default configuration");
        let mut config = Config::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| env::var(name).ok());
    }

    /// Apply overrides from an arbitrary lookup, keyed by the `ENV_*` names
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bucket) = lookup(ENV_BUCKET) {
            debug!(bucket = %bucket, "overriding bucket from environment");
            self.bucket = bucket;
        }
        if let Some(region) = lookup(ENV_REGION) {
            debug!(region = %region, "overriding region from environment");
            self.region = region;
        }
        if let Some(endpoint) = lookup(ENV_ENDPOINT) {
            debug!(endpoint = %endpoint, "overriding endpoint from environment");
            self.endpoint = Some(endpoint);
        }
        if let Some(access_key_id) = lookup(ENV_ACCESS_KEY_ID) {
            self.access_key_id = Some(access_key_id);
        }
        if let Some(secret) = lookup(ENV_SECRET_ACCESS_KEY) {
            self.secret_access_key = Some(secret);
        }
        if let Some(kms_key_id) = lookup(ENV_KMS_KEY_ID) {
            debug!(kms_key_id = %kms_key_id, "overriding kms_key_id from environment");
            self.kms_key_id = Some(kms_key_id);
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.bucket.trim().is_empty() {
            anyhow::bail!("bucket cannot be empty");
        }

        if self.region.trim().is_empty() {
            anyhow::bail!("region cannot be empty");
        }

        if let Some(kms) = &self.kms_key_id {
            if kms.trim().is_empty() {
                anyhow::bail!("kms_key_id cannot be empty when set");
            }
        }

        if self.access_key_id.is_some() != self.secret_access_key.is_some() {
            warn!("only one of access_key_id / secret_access_key is set; falling back to ambient credentials");
        }

        if let Some(endpoint) = &self.endpoint {
            if endpoint.starts_with("http://") {
                warn!(
                    endpoint = %endpoint,
                    "S3 endpoint uses plaintext HTTP - credentials and objects travel unencrypted"
                );
            }
        }

        Ok(())
    }

    /// Create a new config with explicit values
    pub fn new(bucket: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            region: region.into(),
            ..Self::default()
        }
    }

    pub fn with_kms_key_id(mut self, kms_key_id: impl Into<String>) -> Self {
        self.kms_key_id = Some(kms_key_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_overrides_take_priority() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (ENV_BUCKET, "env-bucket"),
            (ENV_KMS_KEY_ID, "alias/files"),
            (ENV_ENDPOINT, "https://minio.local"),
        ]);
        let mut cfg = Config::new("file-bucket", "eu-west-1");
        cfg.apply_overrides_from(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(cfg.bucket, "env-bucket");
        assert_eq!(cfg.region, "eu-west-1");
        assert_eq!(cfg.kms_key_id.as_deref(), Some("alias/files"));
        assert_eq!(cfg.endpoint.as_deref(), Some("https://minio.local"));
    }

    #[test]
    fn test_validate_rejects_empty_bucket() {
        assert!(Config::new("  ", "us-east-1").validate().is_err());
        assert!(Config::new("b", "").validate().is_err());
        assert!(Config::new("b", "us-east-1").validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_blank_kms_key() {
        let cfg = Config::new("b", "us-east-1").with_kms_key_id(" ");
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let cfg: Config = serde_json::from_str(r#"{"bucket":"mine"}"#).unwrap();
        assert_eq!(cfg.bucket, "mine");
        assert_eq!(cfg.region, "us-east-1");
        assert!(cfg.kms_key_id.is_none());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let mut cfg = Config::new("b", "r");
        cfg.secret_access_key = Some("hunter2".into());
        let printed = format!("{:?}", cfg);
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("REDACTED"));
    }

    #[test]
    fn test_load_from_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, r#"{"bucket":"from-file","region":"ap-south-1"}"#).unwrap();
        let cfg = Config::load_with_env(Some(path.to_str().unwrap())).unwrap();
        // process env may override; at minimum the file parsed and validated
        assert!(!cfg.bucket.is_empty());
    }

    #[test]
    fn test_missing_explicit_path_is_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("prd.json");
        let path = path.to_str().unwrap();

        let err = Config::load_with_env(Some(path)).unwrap_err();
        assert!(err.to_string().contains("not found"));
        assert!(err.to_string().contains("prd.json"));
        assert!(Config::load(path).is_err());
    }

    #[test]
    fn test_load_rejects_invalid_json() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(Config::load(path.to_str().unwrap()).is_err());
    }
}
