//! Configuration module
//!
//! Configuration is read from the environment (and an optional `.env` file)
//! once at startup. The storage core consumes a single default upload bucket,
//! used both for new uploads and as the fallback bucket when a stored
//! reference cannot be decoded as a URL.

use std::env;
use std::path::PathBuf;

use crate::storage_types::StorageBackend;

// Common constants
const MAX_CONNECTIONS: u32 = 20;
const DEFAULT_UPLOAD_BUCKET: &str = "openlearn-uploads";
const DEFAULT_REFERENCE_HOST: &str = "s3.amazonaws.com";

/// Object store configuration
#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Default bucket for uploads and for fallback reference decoding
    pub upload_bucket: String,
    /// Host placed in canonical stored references (`https://{host}/{bucket}/{key}`)
    pub reference_host: String,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO, etc.)
    pub local_storage_path: Option<String>,
    /// Directory for temporary upload staging files (system temp dir when unset)
    pub staging_dir: Option<PathBuf>,
}

impl StorageConfig {
    /// In-memory storage with the default bucket; used by tests and local tooling.
    pub fn in_memory(upload_bucket: impl Into<String>) -> Self {
        Self {
            backend: StorageBackend::Memory,
            upload_bucket: upload_bucket.into(),
            reference_host: DEFAULT_REFERENCE_HOST.to_string(),
            s3_region: None,
            s3_endpoint: None,
            local_storage_path: None,
            staging_dir: None,
        }
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.upload_bucket.trim().is_empty() || self.upload_bucket.contains('/') {
            return Err(anyhow::anyhow!(
                "UPLOAD_BUCKET must be a non-empty bucket name without '/'"
            ));
        }

        if self.reference_host.trim().is_empty() {
            return Err(anyhow::anyhow!("STORAGE_REFERENCE_HOST must not be empty"));
        }

        match self.backend {
            StorageBackend::S3 if self.s3_region.is_none() => Err(anyhow::anyhow!(
                "STORAGE_BACKEND=s3 requires S3_REGION or AWS_REGION to be set"
            )),
            StorageBackend::Local if self.local_storage_path.is_none() => Err(anyhow::anyhow!(
                "STORAGE_BACKEND=local requires LOCAL_STORAGE_PATH to be set"
            )),
            _ => Ok(()),
        }
    }
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub environment: String,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub storage: StorageConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let backend = match env::var("STORAGE_BACKEND") {
            Ok(value) => value.parse::<StorageBackend>()?,
            Err(_) => StorageBackend::S3,
        };

        let storage = StorageConfig {
            backend,
            upload_bucket: env::var("UPLOAD_BUCKET")
                .unwrap_or_else(|_| DEFAULT_UPLOAD_BUCKET.to_string()),
            reference_host: env::var("STORAGE_REFERENCE_HOST")
                .unwrap_or_else(|_| DEFAULT_REFERENCE_HOST.to_string()),
            s3_region: env::var("S3_REGION")
                .or_else(|_| env::var("AWS_REGION"))
                .ok(),
            s3_endpoint: env::var("S3_ENDPOINT").ok(),
            local_storage_path: env::var("LOCAL_STORAGE_PATH").ok(),
            staging_dir: env::var("UPLOAD_STAGING_DIR").ok().map(PathBuf::from),
        };

        let config = Config {
            environment,
            database_url: env::var("DATABASE_URL").ok(),
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(MAX_CONNECTIONS),
            storage,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if let Some(ref url) = self.database_url {
            if !url.starts_with("postgres://") && !url.starts_with("postgresql://") {
                return Err(anyhow::anyhow!(
                    "DATABASE_URL must be a valid PostgreSQL connection string"
                ));
            }
        }

        if self.is_production() && self.storage.backend == StorageBackend::Memory {
            return Err(anyhow::anyhow!(
                "STORAGE_BACKEND=memory cannot be used in production"
            ));
        }

        self.storage.validate()
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let environment = self.environment.to_lowercase();
        environment == "production" || environment == "prod"
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.storage.backend
    }

    pub fn upload_bucket(&self) -> &str {
        &self.storage.upload_bucket
    }

    pub fn database_url(&self) -> Option<&str> {
        self.database_url.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(storage: StorageConfig) -> Config {
        Config {
            environment: "development".to_string(),
            database_url: None,
            db_max_connections: MAX_CONNECTIONS,
            storage,
        }
    }

    #[test]
    fn test_in_memory_config_is_valid() {
        let config = config_with(StorageConfig::in_memory("uploads"));
        assert!(config.validate().is_ok());
        assert_eq!(config.upload_bucket(), "uploads");
        assert_eq!(config.storage.reference_host, DEFAULT_REFERENCE_HOST);
    }

    #[test]
    fn test_bucket_name_must_not_contain_separator() {
        let config = config_with(StorageConfig::in_memory("uploads/nested"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_s3_backend_requires_region() {
        let mut storage = StorageConfig::in_memory("uploads");
        storage.backend = StorageBackend::S3;
        assert!(config_with(storage.clone()).validate().is_err());

        storage.s3_region = Some("us-east-1".to_string());
        assert!(config_with(storage).validate().is_ok());
    }

    #[test]
    fn test_memory_backend_rejected_in_production() {
        let mut config = config_with(StorageConfig::in_memory("uploads"));
        config.environment = "Production".to_string();
        assert!(config.is_production());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_database_url_must_be_postgres() {
        let mut config = config_with(StorageConfig::in_memory("uploads"));
        config.database_url = Some("mysql://localhost/openlearn".to_string());
        assert!(config.validate().is_err());
    }
}
