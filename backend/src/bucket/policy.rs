//! Presigned POST policies for direct browser uploads
//!
//! The Rust SDK only presigns single requests, so the policy document is built
//! here and signed with the SDK's SigV4 primitives (`aws-sigv4`). The document
//! layout follows the S3 POST policy format:
//! <https://docs.aws.amazon.com/AmazonS3/latest/API/sigv4-HTTPPOSTConstructPolicy.html>

use std::collections::BTreeMap;
use std::time::{Duration, SystemTime};

use aws_sigv4::sign::v4::{calculate_signature, generate_signing_key};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

use super::{BucketConfig, BucketError, BucketResult};

/// Placeholder S3 replaces with the uploaded file's name
pub const FILENAME_PLACEHOLDER: &str = "${filename}";

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SERVICE: &str = "s3";

/// Form target and fields a browser needs to upload straight to the bucket
#[derive(Debug, Clone, Serialize)]
pub struct UploadPolicy {
    /// URL the form is POSTed to
    pub url: String,
    /// Form fields, including the policy and its signature
    pub fields: BTreeMap<String, String>,
    /// When the policy stops being accepted
    #[serde(skip)]
    pub expires_at: DateTime<Utc>,
}

impl UploadPolicy {
    /// The `key` field, i.e. `{path_prefix}${filename}`
    #[must_use]
    pub fn key_template(&self) -> Option<&str> {
        self.fields.get("key").map(String::as_str)
    }
}

/// Parameters of a POST policy
#[derive(Debug, Clone, Copy)]
pub struct PostPolicyRequest<'a> {
    /// Fixes the `Content-Type` form field when set
    pub content_type: Option<&'a str>,
    /// Prefix prepended to the uploaded file's name
    pub path_prefix: &'a str,
    /// Policy lifetime
    pub expires_in: Duration,
}

/// Builds and signs a POST policy as of `now`.
///
/// When a content type is requested the policy carries a
/// `["starts-with", "$Content-Type", ""]` condition. It names the field but
/// accepts any value.
///
/// # Errors
///
/// Returns `BucketError::ConfigError` if the expiry is out of range or the
/// policy document cannot be encoded
pub fn sign_post_policy(
    config: &BucketConfig,
    request: &PostPolicyRequest<'_>,
    now: DateTime<Utc>,
) -> BucketResult<UploadPolicy> {
    let expires_in = chrono::Duration::from_std(request.expires_in)
        .map_err(|e| BucketError::ConfigError(format!("Invalid policy expiry: {e}")))?;
    let expires_at = now.checked_add_signed(expires_in).ok_or_else(|| {
        BucketError::ConfigError(format!("Policy expiry {expires_in} overflows the calendar"))
    })?;

    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let credential = format!(
        "{}/{}/{}/{SERVICE}/aws4_request",
        config.access_key_id,
        now.format("%Y%m%d"),
        config.region
    );
    let key = format!("{}{FILENAME_PLACEHOLDER}", request.path_prefix);

    let mut conditions = Vec::with_capacity(6);
    if request.content_type.is_some() {
        conditions.push(json!(["starts-with", "$Content-Type", ""]));
    }
    conditions.push(json!({ "bucket": config.bucket_name }));
    conditions.push(json!(["starts-with", "$key", request.path_prefix]));
    conditions.push(json!({ "x-amz-algorithm": ALGORITHM }));
    conditions.push(json!({ "x-amz-credential": credential }));
    conditions.push(json!({ "x-amz-date": amz_date }));

    let document = json!({
        "expiration": expires_at.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        "conditions": conditions,
    });
    let policy = STANDARD.encode(serde_json::to_vec(&document)?);

    let signing_key = generate_signing_key(
        &config.secret_access_key,
        SystemTime::from(now),
        &config.region,
        SERVICE,
    );
    let signature = calculate_signature(signing_key, policy.as_bytes());

    let mut fields = BTreeMap::new();
    fields.insert("key".to_string(), key);
    if let Some(content_type) = request.content_type {
        fields.insert("Content-Type".to_string(), content_type.to_string());
    }
    fields.insert("x-amz-algorithm".to_string(), ALGORITHM.to_string());
    fields.insert("x-amz-credential".to_string(), credential);
    fields.insert("x-amz-date".to_string(), amz_date);
    fields.insert("policy".to_string(), policy);
    fields.insert("x-amz-signature".to_string(), signature);

    Ok(UploadPolicy {
        url: config.upload_endpoint(),
        fields,
        expires_at,
    })
}
