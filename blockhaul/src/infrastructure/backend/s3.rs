// /////////////////////////////////////////////////////////////////////////////
// Blockhaul
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # S3 Object Store
//!
//! Production [`ObjectStore`] over any S3-compatible HTTP endpoint (AWS,
//! MinIO, Ceph RGW, ...). Only whole-object operations are used: GetObject,
//! PutObject, HeadObject, DeleteObject and ListObjects with an optional
//! prefix - no multipart, no versioning, no ACLs.
//!
//! ## Blocking Bridge
//!
//! Engine workers are OS threads, so the provider owns one small tokio
//! runtime and every call bridges with `block_on`. Each
//! [`open_store`](ObjectStoreProvider::open_store) builds an independent
//! SDK client, giving every worker its own HTTP session as the engine
//! expects.
//!
//! ## Error Classification
//!
//! SDK failures are folded into the transfer taxonomy: a 404 or
//! `NoSuchKey`/`NotFound` service code becomes `KeyNotFound`, request and
//! connector timeouts become `TransportTimeout`, connector I/O faults
//! become `ConnectionFailed`, and everything else - auth failures, missing
//! buckets, 5xx - becomes `BackendFailure`. The engine's retry policy keys
//! off exactly this split.

use std::sync::Arc;

use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::EncodingType;
use aws_sdk_s3::Client;
use tokio::runtime::Runtime;

use blockhaul_domain::{ObjectStore, ObjectStoreProvider, TransferError};

use crate::infrastructure::config::{AddressingStyle, BackendConfig};

/// Signing region used when the configuration names none; S3-compatible
/// stores accept any region, real AWS needs a correct one.
const DEFAULT_REGION: &str = "us-east-1";

/// Factory for per-worker S3 sessions against one bucket.
pub struct S3StoreProvider {
    runtime: Arc<Runtime>,
    client_config: aws_sdk_s3::Config,
    bucket: String,
    disable_encoding_type: bool,
}

impl S3StoreProvider {
    /// Builds the provider from configuration, resolving credentials
    /// (inline or file-based) and the endpoint scheme.
    ///
    /// # Errors
    ///
    /// [`TransferError::InvalidConfiguration`] for bad or incomplete
    /// configuration; [`TransferError::BackendFailure`] when the bridging
    /// runtime cannot start.
    pub fn from_config(config: &BackendConfig) -> Result<Self, TransferError> {
        config.validate()?;
        let (access_key, secret_key) = config.credentials()?;
        let credentials = Credentials::new(access_key, secret_key, None, None, "blockhaul-config");

        let region = config
            .region
            .clone()
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region))
            .credentials_provider(credentials)
            .force_path_style(config.addressing_style == AddressingStyle::Path);
        if let Some(endpoint) = config.resolved_endpoint() {
            builder = builder.endpoint_url(endpoint);
        }

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("blockhaul-s3")
            .enable_all()
            .build()
            .map_err(|e| {
                TransferError::backend_failure(format!("cannot start s3 bridge runtime: {e}"))
            })?;

        Ok(Self {
            runtime: Arc::new(runtime),
            client_config: builder.build(),
            bucket: config.bucket_name.clone(),
            disable_encoding_type: config.disable_encoding_type,
        })
    }
}

impl ObjectStoreProvider for S3StoreProvider {
    fn open_store(&self) -> Result<Box<dyn ObjectStore>, TransferError> {
        Ok(Box::new(S3ObjectStore {
            runtime: Arc::clone(&self.runtime),
            client: Client::from_conf(self.client_config.clone()),
            bucket: self.bucket.clone(),
            disable_encoding_type: self.disable_encoding_type,
        }))
    }
}

/// One S3 client session against the configured bucket.
pub struct S3ObjectStore {
    runtime: Arc<Runtime>,
    client: Client,
    bucket: String,
    disable_encoding_type: bool,
}

impl ObjectStore for S3ObjectStore {
    fn get(&self, key: &str) -> Result<Vec<u8>, TransferError> {
        self.runtime.block_on(async {
            let response = self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(key)
                .send()
                .await
                .map_err(|e| classify_sdk_error("GetObject", Some(key), &e))?;
            let body = response.body.collect().await.map_err(|e| {
                TransferError::ConnectionFailed(format!("GetObject body for {key}: {e}"))
            })?;
            Ok(body.into_bytes().to_vec())
        })
    }

    fn put(&self, key: &str, data: &[u8]) -> Result<(), TransferError> {
        self.runtime.block_on(async {
            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(key)
                .body(ByteStream::from(data.to_vec()))
                .send()
                .await
                .map(|_| ())
                .map_err(|e| classify_sdk_error("PutObject", Some(key), &e))
        })
    }

    fn head(&self, key: &str) -> Result<(), TransferError> {
        self.runtime.block_on(async {
            self.client
                .head_object()
                .bucket(&self.bucket)
                .key(key)
                .send()
                .await
                .map(|_| ())
                .map_err(|e| classify_sdk_error("HeadObject", Some(key), &e))
        })
    }

    fn delete(&self, key: &str) -> Result<(), TransferError> {
        self.runtime.block_on(async {
            self.client
                .delete_object()
                .bucket(&self.bucket)
                .key(key)
                .send()
                .await
                .map(|_| ())
                .map_err(|e| classify_sdk_error("DeleteObject", Some(key), &e))
        })
    }

    fn list(&self, prefix: Option<&str>) -> Result<Vec<String>, TransferError> {
        self.runtime.block_on(async {
            let mut keys = Vec::new();
            let mut marker: Option<String> = None;
            loop {
                let mut request = self.client.list_objects().bucket(&self.bucket);
                if !self.disable_encoding_type {
                    request = request.encoding_type(EncodingType::Url);
                }
                if let Some(prefix) = prefix {
                    request = request.prefix(prefix);
                }
                if let Some(marker) = &marker {
                    request = request.marker(marker);
                }
                let response = request
                    .send()
                    .await
                    .map_err(|e| classify_sdk_error("ListObjects", None, &e))?;

                let page_start = keys.len();
                for object in response.contents() {
                    if let Some(key) = object.key() {
                        keys.push(key.to_string());
                    }
                }

                if response.is_truncated().unwrap_or(false) && keys.len() > page_start {
                    marker = response
                        .next_marker()
                        .map(str::to_string)
                        .or_else(|| keys.last().cloned());
                } else {
                    break;
                }
            }
            Ok(keys)
        })
    }
}

/// Folds any SDK error into the transfer taxonomy.
fn classify_sdk_error<E>(operation: &str, key: Option<&str>, err: &SdkError<E>) -> TransferError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let subject = match key {
        Some(key) => format!("{operation} {key}"),
        None => operation.to_string(),
    };
    match err {
        SdkError::TimeoutError(_) => TransferError::TransportTimeout(format!("{subject} timed out")),
        SdkError::DispatchFailure(failure) => {
            let timed_out = failure
                .as_connector_error()
                .map(|c| c.is_timeout())
                .unwrap_or(false);
            if timed_out {
                TransferError::TransportTimeout(format!("{subject} timed out"))
            } else {
                TransferError::ConnectionFailed(format!("{subject}: {err}"))
            }
        }
        SdkError::ResponseError(_) => {
            TransferError::ConnectionFailed(format!("{subject}: unparseable response"))
        }
        SdkError::ServiceError(context) => {
            let status = context.raw().status().as_u16();
            let code = err.code().unwrap_or_default();
            if status == 404 || code == "NoSuchKey" || code == "NotFound" {
                TransferError::KeyNotFound(match key {
                    Some(key) => format!("key {key} not found"),
                    None => format!("{operation}: not found"),
                })
            } else {
                TransferError::BackendFailure(format!(
                    "{subject} failed with status {status}: {}",
                    err.message().unwrap_or("no further detail")
                ))
            }
        }
        _ => TransferError::BackendFailure(format!("{subject}: {err}")),
    }
}
