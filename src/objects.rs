//! Object storage backends that turn storage paths into download URLs.
//!
//! - **[`PublicObjectStore`]**: permanent URLs under a public base URL
//!   (CDN, public bucket, static file server).
//! - **[`S3ObjectStore`]**: time-limited URLs presigned with AWS
//!   Signature Version 4 (query-string authentication). Works with
//!   S3-compatible services via `endpoint_url`.
//!
//! # Environment Variables
//!
//! The S3 backend reads credentials from:
//! - `AWS_ACCESS_KEY_ID`: required
//! - `AWS_SECRET_ACCESS_KEY`: required
//! - `AWS_SESSION_TOKEN`: optional
//!
//! Presigning is pure computation: no request is made, so a URL for a
//! missing object is still produced and fails only when fetched.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::config::ObjectsConfig;
use crate::error::{Error, Result};

/// A backend able to hand out a download URL for a storage path.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Backend identifier (`"public"`, `"s3"`).
    fn provider(&self) -> &str;

    /// Resolve `path` (e.g. `cloth/casual/3.jpg`) to a download URL.
    async fn download_url(&self, path: &str) -> Result<String>;
}

/// Build the configured object store.
pub fn create_object_store(config: &ObjectsConfig) -> anyhow::Result<Arc<dyn ObjectStore>> {
    match config.provider.as_str() {
        "public" => {
            let base = config
                .public_base_url
                .clone()
                .ok_or_else(|| anyhow::anyhow!("objects.public_base_url required"))?;
            Ok(Arc::new(PublicObjectStore::new(base)))
        }
        "s3" => Ok(Arc::new(S3ObjectStore::from_config(config)?)),
        other => anyhow::bail!("Unknown object provider: {}", other),
    }
}

// ============ Public ============

/// Permanent URLs: `{base_url}/{encoded path}`.
pub struct PublicObjectStore {
    base_url: String,
}

impl PublicObjectStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ObjectStore for PublicObjectStore {
    fn provider(&self) -> &str {
        "public"
    }

    async fn download_url(&self, path: &str) -> Result<String> {
        Ok(format!("{}/{}", self.base_url, encode_key(path)))
    }
}

// ============ S3 ============

type HmacSha256 = Hmac<Sha256>;

/// AWS credentials loaded from environment variables.
#[derive(Clone)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl AwsCredentials {
    /// Load credentials from `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`,
    /// and optionally `AWS_SESSION_TOKEN`.
    pub fn from_env() -> anyhow::Result<Self> {
        let access_key_id = std::env::var("AWS_ACCESS_KEY_ID")
            .context("AWS_ACCESS_KEY_ID environment variable not set")?;
        let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY")
            .context("AWS_SECRET_ACCESS_KEY environment variable not set")?;
        let session_token = std::env::var("AWS_SESSION_TOKEN").ok();

        Ok(Self {
            access_key_id,
            secret_access_key,
            session_token,
        })
    }
}

/// Presigned, time-limited GET URLs for an S3 bucket.
pub struct S3ObjectStore {
    bucket: String,
    region: String,
    endpoint_url: Option<String>,
    expires_secs: u64,
    creds: AwsCredentials,
}

impl S3ObjectStore {
    pub fn from_config(config: &ObjectsConfig) -> anyhow::Result<Self> {
        let creds = AwsCredentials::from_env()?;
        Self::with_credentials(config, creds)
    }

    pub fn with_credentials(config: &ObjectsConfig, creds: AwsCredentials) -> anyhow::Result<Self> {
        let bucket = config
            .bucket
            .clone()
            .ok_or_else(|| anyhow::anyhow!("objects.bucket required for s3 provider"))?;
        Ok(Self {
            bucket,
            region: config.region.clone(),
            endpoint_url: config.endpoint_url.clone(),
            expires_secs: config.expires_secs,
            creds,
        })
    }

    /// Presign a GET for `key` as of `now`.
    pub fn presign_get(&self, key: &str, now: DateTime<Utc>) -> String {
        let (scheme, host, canonical_uri) = self.locate(key);

        let date_stamp = now.format("%Y%m%d").to_string();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let credential_scope = format!("{}/{}/s3/aws4_request", date_stamp, self.region);

        let mut query_params = vec![
            ("X-Amz-Algorithm".to_string(), "AWS4-HMAC-SHA256".to_string()),
            (
                "X-Amz-Credential".to_string(),
                format!("{}/{}", self.creds.access_key_id, credential_scope),
            ),
            ("X-Amz-Date".to_string(), amz_date.clone()),
            ("X-Amz-Expires".to_string(), self.expires_secs.to_string()),
            ("X-Amz-SignedHeaders".to_string(), "host".to_string()),
        ];
        if let Some(ref token) = self.creds.session_token {
            query_params.push(("X-Amz-Security-Token".to_string(), token.clone()));
        }
        query_params.sort_by(|a, b| a.0.cmp(&b.0));

        let canonical_querystring: String = query_params
            .iter()
            .map(|(k, v)| format!("{}={}", uri_encode(k), uri_encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        let canonical_request = format!(
            "GET\n{}\n{}\nhost:{}\n\nhost\nUNSIGNED-PAYLOAD",
            canonical_uri, canonical_querystring, host
        );

        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{}\n{}\n{}",
            amz_date,
            credential_scope,
            hex_sha256(canonical_request.as_bytes())
        );

        let signing_key =
            derive_signing_key(&self.creds.secret_access_key, &date_stamp, &self.region, "s3");
        let signature = hex_hmac_sha256(&signing_key, string_to_sign.as_bytes());

        format!(
            "{}://{}{}?{}&X-Amz-Signature={}",
            scheme, host, canonical_uri, canonical_querystring, signature
        )
    }

    /// Scheme, host, and canonical URI for `key`.
    ///
    /// A custom `endpoint_url` (MinIO, LocalStack) uses path-style
    /// addressing; AWS uses virtual-hosted style.
    fn locate(&self, key: &str) -> (String, String, String) {
        let encoded_key = encode_key(key);
        match self.endpoint_url {
            Some(ref endpoint) => {
                let scheme = if endpoint.starts_with("http://") {
                    "http"
                } else {
                    "https"
                };
                let host = endpoint
                    .trim_start_matches("https://")
                    .trim_start_matches("http://")
                    .trim_end_matches('/')
                    .to_string();
                (
                    scheme.to_string(),
                    host,
                    format!("/{}/{}", uri_encode(&self.bucket), encoded_key),
                )
            }
            None => (
                "https".to_string(),
                self.virtual_host(),
                format!("/{}", encoded_key),
            ),
        }
    }
}

impl S3ObjectStore {
    /// `us-east-1` buckets answer on the global endpoint.
    fn virtual_host(&self) -> String {
        if self.region == "us-east-1" {
            format!("{}.s3.amazonaws.com", self.bucket)
        } else {
            format!("{}.s3.{}.amazonaws.com", self.bucket, self.region)
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    fn provider(&self) -> &str {
        "s3"
    }

    async fn download_url(&self, path: &str) -> Result<String> {
        if path.trim_matches('/').is_empty() {
            return Err(Error::InvalidData("empty object key".to_string()));
        }
        Ok(self.presign_get(path.trim_start_matches('/'), Utc::now()))
    }
}

// ============ AWS SigV4 Helpers ============

/// Encode each `/`-separated segment of an object key.
fn encode_key(key: &str) -> String {
    key.split('/').map(uri_encode).collect::<Vec<_>>().join("/")
}

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
fn derive_signing_key(secret_key: &str, date_stamp: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(
        format!("AWS4{}", secret_key).as_bytes(),
        date_stamp.as_bytes(),
    );
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

/// URI-encode a string per RFC 3986.
///
/// Encodes all characters except unreserved characters:
/// `A-Z a-z 0-9 - _ . ~`
fn uri_encode(s: &str) -> String {
    let mut result = String::new();
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char);
            }
            _ => {
                result.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    result
}
