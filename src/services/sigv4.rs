//! From-scratch AWS Signature Version 4 for an S3-compatible storage gateway.
//!
//! Implements exactly the subset this service needs and nothing more:
//! query-string presigning for PUT (UNSIGNED-PAYLOAD, `host` as the only
//! signed header) and header signing for the server-side storage client.
//! No vendor SDK is involved; the canonicalization rules are reproduced
//! here character for character.
//!
//! The single most error-prone rule: the gateway endpoint may carry a
//! provider path prefix (e.g. `/storage/v1/s3`) that must appear in every
//! dispatched URL but must **never** appear in the canonical URI that gets
//! signed. `Endpoint` keeps those as two separate strings so neither is ever
//! inferred from the other.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use thiserror::Error;
use url::Url;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SERVICE: &str = "s3";
const REQUEST_SUFFIX: &str = "aws4_request";
const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

/// SHA-256 of an empty body, used for GET/DELETE header signing.
const EMPTY_PAYLOAD_SHA256: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

#[derive(Debug, Error)]
pub enum SignError {
    #[error("storage endpoint misconfigured: {0}")]
    Configuration(String),
    #[error("signing failed: {0}")]
    Signing(String),
}

/// The gateway endpoint split into the pieces signing needs.
#[derive(Debug, Clone)]
pub struct Endpoint {
    scheme: String,
    /// Bare `host[:port]`, exactly as it appears in the signed `host` header.
    host: String,
    /// Provider path prefix ("" or e.g. `/storage/v1/s3`). Present in
    /// dispatched URLs, absent from canonical URIs.
    path_prefix: String,
}

impl Endpoint {
    pub fn parse(endpoint: &str) -> Result<Self, SignError> {
        let parsed = Url::parse(endpoint)
            .map_err(|err| SignError::Configuration(format!("endpoint `{}`: {}", endpoint, err)))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| SignError::Configuration(format!("endpoint `{}` has no host", endpoint)))?;
        let host = match parsed.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };
        let path_prefix = parsed.path().trim_end_matches('/').to_string();
        Ok(Self {
            scheme: parsed.scheme().to_string(),
            host,
            path_prefix,
        })
    }

    /// Scheme + bare host, no path.
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.scheme, self.host)
    }

    /// Path the request is actually dispatched to: provider prefix plus the
    /// canonical object URI.
    pub fn dispatch_path(&self, bucket: &str, key: &str) -> String {
        format!("{}{}", self.path_prefix, canonical_object_uri(bucket, key))
    }
}

/// Static signing credentials plus the region they are scoped to.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
}

/// Header set for a server-side signed request.
#[derive(Debug)]
pub struct SignedHeaders {
    pub amz_date: String,
    pub content_sha256: String,
    pub authorization: String,
}

/// Canonical URI for an object: `/{bucket}/{key}` with every key segment
/// percent-encoded independently and `/` preserved as the separator.
pub fn canonical_object_uri(bucket: &str, key: &str) -> String {
    format!("/{}/{}", bucket, encode_key_segments(key))
}

/// Percent-encode each path segment of an object key per the SigV4
/// reserved-character rules, leaving `/` as a literal separator.
pub fn encode_key_segments(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Mint a presigned PUT URL for one object, valid for `expires_secs` from
/// `now`. Pure: identical inputs always yield a byte-identical URL.
pub fn presign_put(
    endpoint: &Endpoint,
    creds: &Credentials,
    bucket: &str,
    key: &str,
    expires_secs: u64,
    now: DateTime<Utc>,
) -> Result<String, SignError> {
    let date_stamp = now.format("%Y%m%d").to_string();
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();

    let canonical_uri = canonical_object_uri(bucket, key);
    let credential_scope = format!(
        "{}/{}/{}/{}",
        date_stamp, creds.region, SERVICE, REQUEST_SUFFIX
    );
    let credential = format!("{}/{}", creds.access_key_id, credential_scope);

    // The five presign parameters, already in lexicographic order by name.
    let canonical_query = format!(
        "X-Amz-Algorithm={}&X-Amz-Credential={}&X-Amz-Date={}&X-Amz-Expires={}&X-Amz-SignedHeaders=host",
        ALGORITHM,
        urlencoding::encode(&credential),
        amz_date,
        expires_secs,
    );

    let canonical_headers = format!("host:{}\n", endpoint.host);
    let canonical_request = format!(
        "PUT\n{}\n{}\n{}\nhost\n{}",
        canonical_uri, canonical_query, canonical_headers, UNSIGNED_PAYLOAD
    );

    let string_to_sign = format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        amz_date,
        credential_scope,
        sha256_hex(canonical_request.as_bytes())
    );

    let signing_key = derive_signing_key(&creds.secret_access_key, &date_stamp, &creds.region)?;
    let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes())?);

    Ok(format!(
        "{}{}{}?{}&X-Amz-Signature={}",
        endpoint.base_url(),
        endpoint.path_prefix,
        canonical_uri,
        canonical_query,
        signature
    ))
}

/// Sign a server-side request with `Authorization` + `x-amz-*` headers.
///
/// Signs `host`, `x-amz-content-sha256`, and `x-amz-date` (the sorted,
/// minimal set the gateway requires); the canonical URI follows the same
/// prefix-stripping rule as presigning.
pub fn sign_headers(
    endpoint: &Endpoint,
    creds: &Credentials,
    method: &str,
    bucket: &str,
    key: &str,
    payload: Option<&[u8]>,
    now: DateTime<Utc>,
) -> Result<SignedHeaders, SignError> {
    let date_stamp = now.format("%Y%m%d").to_string();
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();

    let content_sha256 = match payload {
        Some(body) => sha256_hex(body),
        None => EMPTY_PAYLOAD_SHA256.to_string(),
    };

    let canonical_uri = canonical_object_uri(bucket, key);
    let canonical_headers = format!(
        "host:{}\nx-amz-content-sha256:{}\nx-amz-date:{}\n",
        endpoint.host, content_sha256, amz_date
    );
    let signed_headers = "host;x-amz-content-sha256;x-amz-date";

    let canonical_request = format!(
        "{}\n{}\n\n{}\n{}\n{}",
        method, canonical_uri, canonical_headers, signed_headers, content_sha256
    );

    let credential_scope = format!(
        "{}/{}/{}/{}",
        date_stamp, creds.region, SERVICE, REQUEST_SUFFIX
    );
    let string_to_sign = format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        amz_date,
        credential_scope,
        sha256_hex(canonical_request.as_bytes())
    );

    let signing_key = derive_signing_key(&creds.secret_access_key, &date_stamp, &creds.region)?;
    let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes())?);

    let authorization = format!(
        "{} Credential={}/{}, SignedHeaders={}, Signature={}",
        ALGORITHM, creds.access_key_id, credential_scope, signed_headers, signature
    );

    Ok(SignedHeaders {
        amz_date,
        content_sha256,
        authorization,
    })
}

/// Four chained HMAC-SHA256 operations seeded with the secret key.
fn derive_signing_key(
    secret_access_key: &str,
    date_stamp: &str,
    region: &str,
) -> Result<Vec<u8>, SignError> {
    let k_date = hmac_sha256(
        format!("AWS4{}", secret_access_key).as_bytes(),
        date_stamp.as_bytes(),
    )?;
    let k_region = hmac_sha256(&k_date, region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, SERVICE.as_bytes())?;
    hmac_sha256(&k_service, REQUEST_SUFFIX.as_bytes())
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, SignError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|err| SignError::Signing(format!("HMAC key setup: {}", err)))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
