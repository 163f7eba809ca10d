// /////////////////////////////////////////////////////////////////////////////
// Blockhaul
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Engine Configuration
//!
//! Serde-backed configuration for both engines, loaded from TOML. All
//! fields carry defaults so a minimal deployment only names the bucket and
//! credentials:
//!
//! ```toml
//! # backend.toml
//! bucket_name = "backups"
//! access_key = "minio"
//! secret_key_file = "/etc/blockhaul/secret"
//! endpoint_url = "storage.internal:9000"
//! use_ssl = false
//! addressing_style = "path"
//! simultaneous_reads = 8
//! simultaneous_writes = 8
//! bandwidth_write = 50_000_000
//! ```
//!
//! Credentials are either inline strings or paths to files whose trimmed
//! ASCII contents are the secret. Validation errors are raised synchronously
//! as [`TransferError::InvalidConfiguration`], before any worker spawns.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use blockhaul_domain::TransferError;

/// How object keys are addressed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressingStyle {
    /// `https://endpoint/bucket/key` - what most S3-compatible servers want.
    #[default]
    Path,
    /// `https://bucket.endpoint/key`.
    Virtual,
}

/// Configuration of the object-store engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Inline access key; takes precedence over `access_key_file`.
    pub access_key: Option<String>,
    /// Path to a file whose trimmed contents are the access key.
    pub access_key_file: Option<PathBuf>,
    /// Inline secret key; takes precedence over `secret_key_file`.
    pub secret_key: Option<String>,
    /// Path to a file whose trimmed contents are the secret key.
    pub secret_key_file: Option<PathBuf>,
    /// Signing region; defaults to `us-east-1` for stores that ignore it.
    pub region: Option<String>,
    /// Endpoint of an S3-compatible store; empty means real AWS.
    pub endpoint_url: Option<String>,
    /// Scheme to use when `endpoint_url` does not carry one.
    pub use_ssl: bool,
    /// Bucket all blocks live in.
    pub bucket_name: String,
    pub addressing_style: AddressingStyle,
    /// Only SigV4 spellings are accepted (`"v4"`, `"s3v4"` or unset).
    pub signature_version: Option<String>,
    /// Omit the `encoding-type=url` ListObjects parameter for servers that
    /// reject it.
    pub disable_encoding_type: bool,
    /// Reader pool size.
    pub simultaneous_reads: usize,
    /// Writer pool size.
    pub simultaneous_writes: usize,
    /// Read bandwidth cap in bytes/sec; `0` = unlimited.
    pub bandwidth_read: u64,
    /// Write bandwidth cap in bytes/sec; `0` = unlimited.
    pub bandwidth_write: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            access_key: None,
            access_key_file: None,
            secret_key: None,
            secret_key_file: None,
            region: None,
            endpoint_url: None,
            use_ssl: true,
            bucket_name: String::new(),
            addressing_style: AddressingStyle::default(),
            signature_version: None,
            disable_encoding_type: false,
            simultaneous_reads: 1,
            simultaneous_writes: 1,
            bandwidth_read: 0,
            bandwidth_write: 0,
        }
    }
}

impl BackendConfig {
    /// Parses a TOML document.
    pub fn from_toml_str(raw: &str) -> Result<Self, TransferError> {
        toml::from_str(raw)
            .map_err(|e| TransferError::invalid_config(format!("backend config: {e}")))
    }

    /// Reads and parses a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TransferError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            TransferError::invalid_config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Resolves the access/secret key pair, reading credential files where
    /// the inline values are absent.
    ///
    /// # Errors
    ///
    /// [`TransferError::InvalidConfiguration`] when a key is configured
    /// neither inline nor as a readable file.
    pub fn credentials(&self) -> Result<(String, String), TransferError> {
        let access_key = resolve_secret("access_key", &self.access_key, &self.access_key_file)?;
        let secret_key = resolve_secret("secret_key", &self.secret_key, &self.secret_key_file)?;
        Ok((access_key, secret_key))
    }

    /// Endpoint with a scheme, or `None` when the store is real AWS.
    /// `use_ssl` picks the scheme only when the configured endpoint does
    /// not already carry one.
    pub fn resolved_endpoint(&self) -> Option<String> {
        let endpoint = self.endpoint_url.as_deref()?.trim();
        if endpoint.is_empty() {
            return None;
        }
        if endpoint.contains("://") {
            Some(endpoint.to_string())
        } else if self.use_ssl {
            Some(format!("https://{endpoint}"))
        } else {
            Some(format!("http://{endpoint}"))
        }
    }

    /// Checks everything that can be checked without touching the network.
    pub fn validate(&self) -> Result<(), TransferError> {
        if self.bucket_name.is_empty() {
            return Err(TransferError::invalid_config("bucket_name must be set"));
        }
        match self.signature_version.as_deref() {
            None | Some("") | Some("v4") | Some("s3v4") => {}
            Some(other) => {
                return Err(TransferError::invalid_config(format!(
                    "unsupported signature_version {other:?}; only SigV4 is supported"
                )));
            }
        }
        self.credentials().map(|_| ())
    }
}

/// Configuration of the file IO engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileIoConfig {
    /// Reader pool size.
    pub simultaneous_reads: usize,
    /// Writer pool size.
    pub simultaneous_writes: usize,
}

impl Default for FileIoConfig {
    fn default() -> Self {
        Self {
            simultaneous_reads: 1,
            simultaneous_writes: 1,
        }
    }
}

impl FileIoConfig {
    /// Parses a TOML document.
    pub fn from_toml_str(raw: &str) -> Result<Self, TransferError> {
        toml::from_str(raw).map_err(|e| TransferError::invalid_config(format!("io config: {e}")))
    }
}

fn resolve_secret(
    name: &str,
    inline: &Option<String>,
    file: &Option<PathBuf>,
) -> Result<String, TransferError> {
    if let Some(value) = inline {
        return Ok(value.clone());
    }
    let Some(path) = file else {
        return Err(TransferError::invalid_config(format!(
            "{name} is configured neither inline nor as a file"
        )));
    };
    let contents = std::fs::read_to_string(path).map_err(|e| {
        TransferError::invalid_config(format!(
            "cannot read {name} file {}: {e}",
            path.display()
        ))
    })?;
    Ok(contents.trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = BackendConfig::default();
        assert_eq!(config.simultaneous_reads, 1);
        assert_eq!(config.simultaneous_writes, 1);
        assert_eq!(config.bandwidth_read, 0);
        assert_eq!(config.addressing_style, AddressingStyle::Path);
        assert!(config.use_ssl);
    }

    #[test]
    fn test_toml_round_trip() {
        let config = BackendConfig::from_toml_str(
            r#"
            bucket_name = "backups"
            access_key = "ak"
            secret_key = "sk"
            addressing_style = "virtual"
            simultaneous_writes = 6
            bandwidth_write = 1000000
            "#,
        )
        .unwrap();
        assert_eq!(config.bucket_name, "backups");
        assert_eq!(config.addressing_style, AddressingStyle::Virtual);
        assert_eq!(config.simultaneous_writes, 6);
        assert_eq!(config.bandwidth_write, 1_000_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_credentials_from_files_are_trimmed() {
        let mut access = tempfile::NamedTempFile::new().unwrap();
        write!(access, "the-access-key\n").unwrap();
        let mut secret = tempfile::NamedTempFile::new().unwrap();
        write!(secret, "the-secret-key\n\n").unwrap();

        let config = BackendConfig {
            access_key_file: Some(access.path().to_path_buf()),
            secret_key_file: Some(secret.path().to_path_buf()),
            bucket_name: "b".into(),
            ..BackendConfig::default()
        };
        let (ak, sk) = config.credentials().unwrap();
        assert_eq!(ak, "the-access-key");
        assert_eq!(sk, "the-secret-key");
    }

    #[test]
    fn test_missing_credentials_rejected() {
        let config = BackendConfig {
            bucket_name: "b".into(),
            ..BackendConfig::default()
        };
        assert!(matches!(
            config.credentials(),
            Err(TransferError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_signature_version_gate() {
        let mut config = BackendConfig {
            bucket_name: "b".into(),
            access_key: Some("a".into()),
            secret_key: Some("s".into()),
            ..BackendConfig::default()
        };
        assert!(config.validate().is_ok());
        config.signature_version = Some("s3v4".into());
        assert!(config.validate().is_ok());
        config.signature_version = Some("s3".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resolved_endpoint_scheme() {
        let mut config = BackendConfig {
            endpoint_url: Some("storage.internal:9000".into()),
            ..BackendConfig::default()
        };
        assert_eq!(
            config.resolved_endpoint().as_deref(),
            Some("https://storage.internal:9000")
        );
        config.use_ssl = false;
        assert_eq!(
            config.resolved_endpoint().as_deref(),
            Some("http://storage.internal:9000")
        );
        config.endpoint_url = Some("http://already:9000".into());
        config.use_ssl = true;
        assert_eq!(
            config.resolved_endpoint().as_deref(),
            Some("http://already:9000")
        );
        config.endpoint_url = None;
        assert_eq!(config.resolved_endpoint(), None);
    }

    #[test]
    fn test_file_io_config_defaults() {
        let config = FileIoConfig::from_toml_str("simultaneous_reads = 4").unwrap();
        assert_eq!(config.simultaneous_reads, 4);
        assert_eq!(config.simultaneous_writes, 1);
    }
}
