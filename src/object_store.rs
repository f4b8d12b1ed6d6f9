//! Object-storage boundary for archival blobs.
//!
//! The pipeline treats object storage as "put/get bytes by key" — encoding
//! and decoding stay on this side of the boundary, storage is
//! schema-agnostic. Two implementations:
//!
//! - **[`S3ObjectStore`]** — S3 REST API with AWS Signature V4 signing.
//!   Uses only pure-Rust dependencies (`hmac`, `sha2`) — no C library
//!   dependencies, compatible with all build environments. Supports custom
//!   endpoints for S3-compatible services (MinIO, LocalStack).
//! - **[`MemoryObjectStore`]** — in-memory map, for development and tests.
//!
//! Credentials are read from `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`,
//! and optionally `AWS_SESSION_TOKEN`.

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::config::ArchiveConfig;
use crate::error::StoreError;

type HmacSha256 = Hmac<Sha256>;

/// Atomic single-object put/get by key.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError>;
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;
}

// ============ AWS Credentials ============

/// AWS credentials loaded from environment variables.
struct AwsCredentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: Option<String>,
}

impl AwsCredentials {
    fn from_env() -> Result<Self, StoreError> {
        let access_key_id = std::env::var("AWS_ACCESS_KEY_ID").map_err(|_| {
            StoreError::Unavailable("AWS_ACCESS_KEY_ID environment variable not set".into())
        })?;
        let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY").map_err(|_| {
            StoreError::Unavailable("AWS_SECRET_ACCESS_KEY environment variable not set".into())
        })?;
        let session_token = std::env::var("AWS_SESSION_TOKEN").ok();

        Ok(Self {
            access_key_id,
            secret_access_key,
            session_token,
        })
    }
}

// ============ S3 Object Store ============

/// S3-backed object store using signed REST calls.
pub struct S3ObjectStore {
    config: ArchiveConfig,
    client: reqwest::Client,
}

impl S3ObjectStore {
    pub fn new(config: ArchiveConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Compute the S3 hostname for the configured bucket and region.
    ///
    /// If a custom `endpoint_url` is set (MinIO, LocalStack, etc.), that is
    /// used instead of the standard virtual-hosted address.
    fn host(&self) -> String {
        if let Some(ref endpoint) = self.config.endpoint_url {
            endpoint
                .trim_start_matches("https://")
                .trim_start_matches("http://")
                .trim_end_matches('/')
                .to_string()
        } else {
            format!(
                "{}.s3.{}.amazonaws.com",
                self.config.bucket, self.config.region
            )
        }
    }

    fn scheme(&self) -> &'static str {
        match self.config.endpoint_url {
            Some(ref endpoint) if endpoint.starts_with("http://") => "http",
            _ => "https",
        }
    }

    /// Sign and send one object request. `payload` is the request body for
    /// PUT, empty for GET.
    async fn send_signed(
        &self,
        method: reqwest::Method,
        key: &str,
        payload: Vec<u8>,
    ) -> Result<reqwest::Response, StoreError> {
        let creds = AwsCredentials::from_env()?;
        let host = self.host();
        let encoded_key = key.split('/').map(uri_encode).collect::<Vec<_>>().join("/");
        let url = format!("{}://{}/{}", self.scheme(), host, encoded_key);

        let now = Utc::now();
        let date_stamp = now.format("%Y%m%d").to_string();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();

        let payload_hash = hex_sha256(&payload);

        let mut headers = vec![
            ("host".to_string(), host.clone()),
            ("x-amz-content-sha256".to_string(), payload_hash.clone()),
            ("x-amz-date".to_string(), amz_date.clone()),
        ];
        if let Some(ref token) = creds.session_token {
            headers.push(("x-amz-security-token".to_string(), token.clone()));
        }
        headers.sort_by(|a, b| a.0.cmp(&b.0));

        let signed_headers: String = headers
            .iter()
            .map(|(k, _)| k.as_str())
            .collect::<Vec<_>>()
            .join(";");

        let canonical_headers: String = headers
            .iter()
            .map(|(k, v)| format!("{}:{}\n", k, v))
            .collect();

        let canonical_uri = format!("/{}", encoded_key);
        let canonical_request = format!(
            "{}\n{}\n\n{}\n{}\n{}",
            method.as_str(),
            canonical_uri,
            canonical_headers,
            signed_headers,
            payload_hash
        );

        let credential_scope = format!("{}/{}/s3/aws4_request", date_stamp, self.config.region);
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{}\n{}\n{}",
            amz_date,
            credential_scope,
            hex_sha256(canonical_request.as_bytes())
        );

        let signing_key = derive_signing_key(
            &creds.secret_access_key,
            &date_stamp,
            &self.config.region,
            "s3",
        );
        let signature = hex_hmac_sha256(&signing_key, string_to_sign.as_bytes());

        let authorization = format!(
            "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
            creds.access_key_id, credential_scope, signed_headers, signature
        );

        let mut builder = self
            .client
            .request(method, &url)
            .header("Authorization", &authorization)
            .header("x-amz-content-sha256", &payload_hash)
            .header("x-amz-date", &amz_date);

        if let Some(ref token) = creds.session_token {
            builder = builder.header("x-amz-security-token", token);
        }
        if !payload.is_empty() {
            builder = builder.body(payload);
        }

        builder.send().await.map_err(|e| StoreError::Object {
            key: key.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        let resp = self.send_signed(reqwest::Method::PUT, key, bytes).await?;
        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(StoreError::Object {
                key: key.to_string(),
                message: format!("PutObject failed (HTTP {status}): {message}"),
            });
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let resp = self
            .send_signed(reqwest::Method::GET, key, Vec::new())
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(StoreError::Object {
                key: key.to_string(),
                message: format!("GetObject failed (HTTP {status})"),
            });
        }
        let bytes = resp.bytes().await.map_err(|e| StoreError::Object {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(bytes.to_vec())
    }
}

// ============ AWS SigV4 Helpers ============

/// Compute the hex-encoded SHA-256 hash of data.
fn hex_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Compute HMAC-SHA256 of data with the given key.
fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Compute hex-encoded HMAC-SHA256.
fn hex_hmac_sha256(key: &[u8], data: &[u8]) -> String {
    hex::encode(hmac_sha256(key, data))
}

/// Derive the AWS SigV4 signing key for a given date, region, and service.
///
/// ```text
/// kDate    = HMAC("AWS4" + secret, dateStamp)
/// kRegion  = HMAC(kDate, region)
/// kService = HMAC(kRegion, service)
/// kSigning = HMAC(kService, "aws4_request")
/// ```
fn derive_signing_key(secret: &str, date_stamp: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(format!("AWS4{}", secret).as_bytes(), date_stamp.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

/// AWS-style URI encoding: unreserved characters pass through, everything
/// else becomes uppercase percent escapes.
fn uri_encode(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.as_bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(*byte as char)
            }
            other => out.push_str(&format!("%{:02X}", other)),
        }
    }
    out
}

// ============ Memory Object Store ============

/// In-memory object store for development and tests.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        self.objects
            .write()
            .unwrap()
            .insert(key.to_string(), bytes);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.objects
            .read()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::Object {
                key: key.to_string(),
                message: "object not found".into(),
            })
    }
}
