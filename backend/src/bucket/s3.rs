//! S3 implementation of the bucket adapter

use std::time::Duration;

use aws_sdk_s3::{presigning::PresigningConfig, Client as S3Client};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::{
    sign_post_policy, BucketApi, BucketConfig, BucketError, BucketResult, ObjectPage,
    PostPolicyRequest, StoredObject, UploadPolicy,
};
use crate::types::Environment;

/// Bucket adapter backed by the AWS SDK
pub struct S3Bucket {
    client: S3Client,
    config: BucketConfig,
}

impl S3Bucket {
    /// Wraps a pre-configured S3 client
    #[must_use]
    pub const fn new(client: S3Client, config: BucketConfig) -> Self {
        Self { client, config }
    }

    /// Builds the S3 client for `config` using the environment's SDK settings
    pub async fn connect(environment: &Environment, config: BucketConfig) -> Self {
        let client = S3Client::from_conf(environment.s3_client_config(&config).await);

        info!(
            bucket = %config.bucket_name,
            region = %config.region,
            endpoint = config.endpoint_url.as_deref().unwrap_or("aws"),
            "Initialized S3 bucket client"
        );

        Self::new(client, config)
    }

    /// Name of the bucket this adapter operates on
    #[must_use]
    pub fn bucket_name(&self) -> &str {
        &self.config.bucket_name
    }
}

fn to_chrono(timestamp: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(timestamp.secs(), timestamp.subsec_nanos())
}

#[async_trait::async_trait]
impl BucketApi for S3Bucket {
    /// Generates a presigned GET URL
    ///
    /// # Errors
    ///
    /// Returns `BucketError::ConfigError` if the expiry is not accepted by the SDK
    /// (zero or longer than a week)
    async fn presigned_download_url(
        &self,
        key: &str,
        expires_in: Duration,
    ) -> BucketResult<String> {
        let presigned_config = PresigningConfig::expires_in(expires_in).map_err(|e| {
            BucketError::ConfigError(format!("Failed to create presigning config: {e}"))
        })?;

        let presigned = self
            .client
            .get_object()
            .bucket(&self.config.bucket_name)
            .key(key)
            .presigned(presigned_config)
            .await?;

        Ok(presigned.uri().to_string())
    }

    async fn presigned_upload_policy(
        &self,
        content_type: Option<&str>,
        path_prefix: &str,
        expires_in: Duration,
    ) -> BucketResult<UploadPolicy> {
        let request = PostPolicyRequest {
            content_type,
            path_prefix,
            expires_in,
        };
        let policy = sign_post_policy(&self.config, &request, Utc::now())?;

        debug!(
            key = policy.key_template().unwrap_or_default(),
            expires_at = %policy.expires_at,
            "Generated upload policy"
        );

        Ok(policy)
    }

    async fn list_objects_page(
        &self,
        path_prefix: &str,
        continuation_token: Option<String>,
    ) -> BucketResult<ObjectPage> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(&self.config.bucket_name)
            .prefix(path_prefix)
            .set_continuation_token(continuation_token)
            .send()
            .await?;

        let objects: Vec<StoredObject> = output
            .contents()
            .iter()
            .filter_map(|object| {
                object.key().map(|key| StoredObject {
                    key: key.to_string(),
                    size: object.size(),
                    last_modified: object.last_modified().and_then(to_chrono),
                })
            })
            .collect();

        let next_continuation_token = if output.is_truncated().unwrap_or(false) {
            output.next_continuation_token().map(ToString::to_string)
        } else {
            None
        };

        debug!(
            prefix = path_prefix,
            count = objects.len(),
            truncated = next_continuation_token.is_some(),
            "Listed objects page"
        );

        Ok(ObjectPage {
            objects,
            next_continuation_token,
        })
    }

    async fn delete_object(&self, key: &str) -> BucketResult<bool> {
        if key.is_empty() {
            return Err(BucketError::InvalidInput("object key is empty".to_string()));
        }

        let output = self
            .client
            .delete_object()
            .bucket(&self.config.bucket_name)
            .key(key)
            .send()
            .await?;

        let delete_marker = output.delete_marker().unwrap_or(false);
        info!(key, delete_marker, "Deleted object");

        Ok(delete_marker)
    }
}
