//! Centralized application configuration.
//! Combines environment variables and CLI arguments.
//!
//! Storage credentials are required: a missing key or endpoint is a hard
//! `ConfigError`, never a fallback to embedded literals.

use anyhow::{Context, Result};
use clap::Parser;
use std::env;
use thiserror::Error;
use url::Url;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable `{0}`")]
    MissingVar(&'static str),
    #[error("invalid value for `{name}`: {reason}")]
    InvalidVar { name: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage: StorageConfig,
}

/// Connection and signing parameters for the S3-compatible storage gateway.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Full gateway URL, e.g. `https://project.example.co/storage/v1/s3`.
    /// The path portion is the provider prefix that must appear in dispatched
    /// URLs but never in signed canonical URIs.
    pub endpoint: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Presigned URL lifetime in seconds.
    pub url_expiry_secs: u64,
    /// Base for durable public object URLs (`{public_base}/{bucket}/{key}`).
    pub public_base: String,
    /// Bucket merged image/video uploads land in.
    pub media_bucket: String,
    /// Bucket merged document uploads land in.
    pub document_bucket: String,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Chunked media-upload coordination API")]
pub struct Args {
    /// Host to bind to (overrides UPLOAD_COORDINATOR_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides UPLOAD_COORDINATOR_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Presigned URL expiry in seconds (overrides STORAGE_URL_EXPIRY_SECS)
    #[arg(long)]
    pub url_expiry_secs: Option<u64>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        let args = Args::parse();

        let env_host = env::var("UPLOAD_COORDINATOR_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = match env::var("UPLOAD_COORDINATOR_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing UPLOAD_COORDINATOR_PORT value `{}`", value))?,
            Err(env::VarError::NotPresent) => 3000,
            Err(err) => return Err(err).context("reading UPLOAD_COORDINATOR_PORT"),
        };

        let storage = StorageConfig::from_env(args.url_expiry_secs)?;

        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            storage,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl StorageConfig {
    /// Load storage settings from the environment.
    ///
    /// Endpoint, region, and both credential halves are mandatory. The
    /// endpoint must parse as an absolute URL with a host so signing can
    /// split it into bare host + provider prefix.
    pub fn from_env(expiry_override: Option<u64>) -> Result<Self, ConfigError> {
        let endpoint = required_var("STORAGE_ENDPOINT")?;
        let region = required_var("STORAGE_REGION")?;
        let access_key_id = required_var("STORAGE_ACCESS_KEY_ID")?;
        let secret_access_key = required_var("STORAGE_SECRET_ACCESS_KEY")?;

        let parsed = Url::parse(&endpoint).map_err(|err| ConfigError::InvalidVar {
            name: "STORAGE_ENDPOINT",
            reason: err.to_string(),
        })?;
        if parsed.host_str().is_none() {
            return Err(ConfigError::InvalidVar {
                name: "STORAGE_ENDPOINT",
                reason: "URL has no host".into(),
            });
        }

        let url_expiry_secs = match expiry_override {
            Some(value) => value,
            None => match env::var("STORAGE_URL_EXPIRY_SECS") {
                Ok(value) => value.parse::<u64>().map_err(|err| ConfigError::InvalidVar {
                    name: "STORAGE_URL_EXPIRY_SECS",
                    reason: err.to_string(),
                })?,
                Err(_) => 3600,
            },
        };
        if url_expiry_secs == 0 {
            return Err(ConfigError::InvalidVar {
                name: "STORAGE_URL_EXPIRY_SECS",
                reason: "expiry must be at least 1 second".into(),
            });
        }

        let public_base =
            env::var("STORAGE_PUBLIC_BASE").unwrap_or_else(|_| default_public_base(&parsed));
        let media_bucket = env::var("STORAGE_MEDIA_BUCKET").unwrap_or_else(|_| "media".into());
        let document_bucket =
            env::var("STORAGE_DOCUMENT_BUCKET").unwrap_or_else(|_| "documents".into());

        Ok(Self {
            endpoint,
            region,
            access_key_id,
            secret_access_key,
            url_expiry_secs,
            public_base,
            media_bucket,
            document_bucket,
        })
    }
}

fn required_var(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingVar(name)),
    }
}

/// Default public-object base derived from the gateway endpoint:
/// the bare origin plus the provider's public-object path.
fn default_public_base(endpoint: &Url) -> String {
    let mut base = format!(
        "{}://{}",
        endpoint.scheme(),
        endpoint.host_str().unwrap_or("")
    );
    if let Some(port) = endpoint.port() {
        base.push_str(&format!(":{}", port));
    }
    base.push_str("/storage/v1/object/public");
    base
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_base_strips_gateway_prefix() {
        let endpoint = Url::parse("https://project.example.co/storage/v1/s3").unwrap();
        assert_eq!(
            default_public_base(&endpoint),
            "https://project.example.co/storage/v1/object/public"
        );
    }

    #[test]
    fn public_base_keeps_explicit_port() {
        let endpoint = Url::parse("http://localhost:9000/storage/v1/s3").unwrap();
        assert_eq!(
            default_public_base(&endpoint),
            "http://localhost:9000/storage/v1/object/public"
        );
    }
}
