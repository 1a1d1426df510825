//! Environment configuration for different deployment stages

use std::env;
use std::time::Duration;

use aws_config::{retry::RetryConfig, timeout::TimeoutConfig, BehaviorVersion, Region};
use tracing::Level;

use super::{optional_var, ConfigError};
use crate::bucket::{BucketConfig, DEFAULT_PRESIGN_EXPIRY, MAX_PRESIGN_EXPIRY};

/// Application environment configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    /// Production environment
    Production,
    /// Staging environment
    Staging,
    /// Development environment (uses `LocalStack`)
    Development {
        /// Optional override for presigned URL expiry in seconds
        presign_expiry_override: Option<u64>,
        /// Skip bearer token checks and use the default upload prefix
        disable_auth: bool,
    },
}

impl Environment {
    /// Creates an Environment from the `APP_ENV` environment variable
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `APP_ENV` contains an unknown value or
    /// `PRESIGNED_URL_EXPIRY_SECS` is not a whole number of seconds between 1
    /// and 604800
    pub fn from_env() -> Result<Self, ConfigError> {
        let env = env::var("APP_ENV")
            .unwrap_or_else(|_| "development".to_string())
            .trim()
            .to_lowercase();

        match env.as_str() {
            "production" => Ok(Self::Production),
            "staging" => Ok(Self::Staging),
            "development" => {
                let presign_expiry_override = optional_var("PRESIGNED_URL_EXPIRY_SECS")
                    .map(|val| parse_presign_expiry(&val))
                    .transpose()?;

                let disable_auth = env::var("DISABLE_AUTH")
                    .ok()
                    .is_some_and(|val| matches!(val.trim(), "1" | "true"));

                Ok(Self::Development {
                    presign_expiry_override,
                    disable_auth,
                })
            }
            _ => Err(ConfigError::Invalid {
                name: "APP_ENV",
                reason: format!("Invalid environment: {env}"),
            }),
        }
    }

    /// Stage name as accepted by `APP_ENV`
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Staging => "staging",
            Self::Development { .. } => "development",
        }
    }

    /// Whether to show API docs
    #[must_use]
    pub const fn show_api_docs(&self) -> bool {
        matches!(self, Self::Development { .. } | Self::Staging)
    }

    /// Whether bearer token checks are skipped. Only possible in development.
    #[must_use]
    pub const fn disable_auth(&self) -> bool {
        matches!(
            self,
            Self::Development {
                disable_auth: true,
                ..
            }
        )
    }

    /// Returns the endpoint URL to use for S3 when none is configured
    #[must_use]
    pub const fn override_aws_endpoint_url(&self) -> Option<&str> {
        match self {
            // Regular AWS endpoints for production and staging
            Self::Production | Self::Staging => None,
            // LocalStack endpoint for development
            Self::Development { .. } => Some("http://localhost:4566"),
        }
    }

    /// AWS configuration built from the bucket credentials.
    ///
    /// SDK retries are disabled so provider failures surface immediately.
    pub async fn aws_config(&self, bucket: &BucketConfig) -> aws_config::SdkConfig {
        let timeout_config = TimeoutConfig::builder()
            .operation_timeout(Duration::from_secs(30))
            .build();

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(bucket.region.clone()))
            .credentials_provider(bucket.credentials())
            .retry_config(RetryConfig::disabled())
            .timeout_config(timeout_config);

        if let Some(endpoint_url) = bucket.endpoint_url.as_deref() {
            loader = loader.endpoint_url(endpoint_url);
        }

        loader.load().await
    }

    /// AWS S3 service configuration
    pub async fn s3_client_config(&self, bucket: &BucketConfig) -> aws_sdk_s3::Config {
        let aws_config = self.aws_config(bucket).await;
        let s3_config: aws_sdk_s3::Config = (&aws_config).into();
        let mut builder = s3_config.to_builder();

        // Path-style addressing works for AWS, LocalStack and most S3-compatible stores
        // https://github.com/awslabs/aws-sdk-rust/discussions/874
        builder.set_force_path_style(Some(true));

        builder.build()
    }

    /// Presigned URL and upload policy lifetime
    #[must_use]
    pub fn presigned_url_expiry(&self) -> Duration {
        match self {
            Self::Production | Self::Staging => DEFAULT_PRESIGN_EXPIRY,
            Self::Development {
                presign_expiry_override,
                ..
            } => presign_expiry_override.map_or(DEFAULT_PRESIGN_EXPIRY, Duration::from_secs),
        }
    }

    /// Default log level when `RUST_LOG` is not set
    #[must_use]
    pub fn tracing_level(&self) -> Level {
        env::var("TRACING_LEVEL")
            .ok()
            .and_then(|val| val.parse::<Level>().ok())
            .unwrap_or(match self {
                Self::Production | Self::Staging => Level::INFO,
                Self::Development { .. } => Level::DEBUG,
            })
    }
}

fn parse_presign_expiry(raw: &str) -> Result<u64, ConfigError> {
    let invalid = || ConfigError::Invalid {
        name: "PRESIGNED_URL_EXPIRY_SECS",
        reason: format!(
            "expected seconds between 1 and {}, got {raw}",
            MAX_PRESIGN_EXPIRY.as_secs()
        ),
    };

    let secs = raw.parse::<u64>().map_err(|_| invalid())?;
    if secs == 0 || secs > MAX_PRESIGN_EXPIRY.as_secs() {
        return Err(invalid());
    }

    Ok(secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        env::remove_var("APP_ENV");
        env::remove_var("PRESIGNED_URL_EXPIRY_SECS");
        env::remove_var("DISABLE_AUTH");
    }

    #[test]
    #[serial]
    fn test_environment_from_env() {
        // Test development (default)
        clear_env();
        assert_eq!(
            Environment::from_env().unwrap(),
            Environment::Development {
                presign_expiry_override: None,
                disable_auth: false,
            }
        );

        // Test explicit development
        env::set_var("APP_ENV", "development");
        assert!(matches!(
            Environment::from_env(),
            Ok(Environment::Development { .. })
        ));

        // Test staging
        env::set_var("APP_ENV", "staging");
        assert_eq!(Environment::from_env().unwrap(), Environment::Staging);

        // Test production
        env::set_var("APP_ENV", " Production ");
        assert_eq!(Environment::from_env().unwrap(), Environment::Production);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_environment() {
        env::set_var("APP_ENV", "invalid");
        let result = Environment::from_env();
        assert!(matches!(
            result,
            Err(ConfigError::Invalid { name: "APP_ENV", .. })
        ));
        clear_env();
    }

    #[test]
    fn test_presigned_url_expiry() {
        // Default is one hour
        let env = Environment::Development {
            presign_expiry_override: None,
            disable_auth: false,
        };
        assert_eq!(env.presigned_url_expiry(), Duration::from_secs(3600));

        let env = Environment::Development {
            presign_expiry_override: Some(30),
            disable_auth: false,
        };
        assert_eq!(env.presigned_url_expiry(), Duration::from_secs(30));

        // Production and Staging always use the default
        assert_eq!(
            Environment::Production.presigned_url_expiry(),
            Duration::from_secs(3600)
        );
        assert_eq!(
            Environment::Staging.presigned_url_expiry(),
            Duration::from_secs(3600)
        );
    }

    #[test]
    #[serial]
    fn test_development_with_env_overrides() {
        env::set_var("APP_ENV", "development");
        env::set_var("PRESIGNED_URL_EXPIRY_SECS", "120");
        env::set_var("DISABLE_AUTH", "true");

        let env = Environment::from_env().unwrap();
        assert_eq!(
            env,
            Environment::Development {
                presign_expiry_override: Some(120),
                disable_auth: true,
            }
        );
        assert!(env.disable_auth());
        assert_eq!(env.presigned_url_expiry(), Duration::from_secs(120));

        // Blank counts as unset
        env::set_var("PRESIGNED_URL_EXPIRY_SECS", " ");
        let env = Environment::from_env().unwrap();
        assert_eq!(env.presigned_url_expiry(), Duration::from_secs(3600));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_presign_expiry_out_of_range_fails_startup() {
        env::set_var("APP_ENV", "development");

        for value in ["invalid", "0", "604801", "10000000000000", "-5"] {
            env::set_var("PRESIGNED_URL_EXPIRY_SECS", value);
            let result = Environment::from_env();
            assert!(
                matches!(
                    result,
                    Err(ConfigError::Invalid {
                        name: "PRESIGNED_URL_EXPIRY_SECS",
                        ..
                    })
                ),
                "value: {value}"
            );
        }

        // Seven days is the upper bound
        env::set_var("PRESIGNED_URL_EXPIRY_SECS", "604800");
        let env = Environment::from_env().unwrap();
        assert_eq!(env.presigned_url_expiry(), Duration::from_secs(604_800));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_disable_auth_only_in_development() {
        env::set_var("APP_ENV", "production");
        env::set_var("DISABLE_AUTH", "true");

        let env = Environment::from_env().unwrap();
        assert!(!env.disable_auth());

        clear_env();
    }
}
