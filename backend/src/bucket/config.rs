//! Bucket connection settings

use std::fmt;

use aws_sdk_s3::config::Credentials;

use crate::types::{optional_var, required_var, ConfigError, Environment};

/// Credentials and location of the bucket, loaded once at startup
#[derive(Clone, PartialEq, Eq)]
pub struct BucketConfig {
    /// AWS access key id
    pub access_key_id: String,
    /// AWS secret access key
    pub secret_access_key: String,
    /// Bucket region, e.g. `us-east-2`
    pub region: String,
    /// Bucket name
    pub bucket_name: String,
    /// Endpoint override for S3-compatible services and `LocalStack`
    pub endpoint_url: Option<String>,
}

impl BucketConfig {
    /// Reads the bucket settings from the process environment.
    ///
    /// `S3_ENDPOINT_URL` takes precedence over the environment's default endpoint.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a required variable is missing or a value is invalid
    pub fn from_env(environment: &Environment) -> Result<Self, ConfigError> {
        let config = Self {
            access_key_id: required_var("AWS_ACCESS_KEY_ID")?,
            secret_access_key: required_var("AWS_SECRET_ACCESS_KEY")?,
            region: required_var("AWS_REGION")?,
            bucket_name: required_var("S3_BUCKET_NAME")?,
            endpoint_url: optional_var("S3_ENDPOINT_URL").or_else(|| {
                environment
                    .override_aws_endpoint_url()
                    .map(ToString::to_string)
            }),
        };

        config.validate()?;
        Ok(config)
    }

    /// Checks that every field is usable before the server starts.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` naming the first offending field
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("AWS_ACCESS_KEY_ID", &self.access_key_id),
            ("AWS_SECRET_ACCESS_KEY", &self.secret_access_key),
            ("AWS_REGION", &self.region),
            ("S3_BUCKET_NAME", &self.bucket_name),
        ];

        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Missing(name));
            }
        }

        if self.bucket_name.contains('/') {
            return Err(ConfigError::Invalid {
                name: "S3_BUCKET_NAME",
                reason: "must not contain '/'".to_string(),
            });
        }

        if let Some(endpoint_url) = &self.endpoint_url {
            if !endpoint_url.starts_with("http://") && !endpoint_url.starts_with("https://") {
                return Err(ConfigError::Invalid {
                    name: "S3_ENDPOINT_URL",
                    reason: format!("expected an http(s) URL, got {endpoint_url}"),
                });
            }
        }

        Ok(())
    }

    /// Static SDK credentials built from the configured key pair
    #[must_use]
    pub fn credentials(&self) -> Credentials {
        Credentials::new(
            &self.access_key_id,
            &self.secret_access_key,
            None,
            None,
            "bucket-config",
        )
    }

    /// Path-style URL browsers POST uploads to
    #[must_use]
    pub fn upload_endpoint(&self) -> String {
        match &self.endpoint_url {
            Some(endpoint_url) => format!(
                "{}/{}",
                endpoint_url.trim_end_matches('/'),
                self.bucket_name
            ),
            None => format!(
                "https://s3.{}.amazonaws.com/{}",
                self.region, self.bucket_name
            ),
        }
    }
}

impl fmt::Debug for BucketConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BucketConfig")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("region", &self.region)
            .field("bucket_name", &self.bucket_name)
            .field("endpoint_url", &self.endpoint_url)
            .finish()
    }
}
