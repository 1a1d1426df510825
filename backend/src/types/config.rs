//! Startup configuration
//!
//! Everything is read from the process environment once, validated, and then
//! passed by value into the server. Nothing here is re-read at request time.

use std::env;

use thiserror::Error;

use super::Environment;
use crate::bucket::BucketConfig;
use crate::middleware::AccessControl;

/// Default listen port
pub const DEFAULT_PORT: u16 = 8001;

/// Configuration problems detected before the server starts
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required variable is unset or blank
    #[error("{0} environment variable is not set")]
    Missing(&'static str),

    /// A variable is set but unusable
    #[error("{name} is invalid: {reason}")]
    Invalid {
        /// Variable name
        name: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

/// Reads a variable that must be present and non-blank
pub(crate) fn required_var(name: &'static str) -> Result<String, ConfigError> {
    optional_var(name).ok_or(ConfigError::Missing(name))
}

/// Reads a variable, treating blank values as unset
pub(crate) fn optional_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Fully validated application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Deployment stage
    pub environment: Environment,
    /// Bucket credentials and location
    pub bucket: BucketConfig,
    /// Token to upload-prefix mapping
    pub access: AccessControl,
    /// Listen port
    pub port: u16,
}

impl AppConfig {
    /// Loads the remaining configuration for an already resolved environment.
    ///
    /// # Errors
    ///
    /// Returns the first `ConfigError` encountered
    pub fn load(environment: Environment) -> Result<Self, ConfigError> {
        let bucket = BucketConfig::from_env(&environment)?;
        let access = AccessControl::from_env(&environment)?;
        let port = match optional_var("PORT") {
            Some(port) => port.parse().map_err(|e| ConfigError::Invalid {
                name: "PORT",
                reason: format!("{e}"),
            })?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            environment,
            bucket,
            access,
            port,
        })
    }
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    const BUCKET_VARS: [(&str, &str); 4] = [
        ("AWS_ACCESS_KEY_ID", "AKIDEXAMPLE"),
        ("AWS_SECRET_ACCESS_KEY", "secret"),
        ("AWS_REGION", "us-east-2"),
        ("S3_BUCKET_NAME", "presigned-test"),
    ];

    fn set_bucket_vars() {
        for (name, value) in BUCKET_VARS {
            env::set_var(name, value);
        }
    }

    fn clear_vars() {
        for (name, _) in BUCKET_VARS {
            env::remove_var(name);
        }
        for name in [
            "S3_ENDPOINT_URL",
            "PORT",
            "ACCESS_TOKENS",
            "UPLOAD_PREFIX",
            "UPLOAD_PREFIX_ROOT",
        ] {
            env::remove_var(name);
        }
    }

    fn development() -> Environment {
        Environment::Development {
            presign_expiry_override: None,
            disable_auth: false,
        }
    }

    #[test]
    #[serial]
    fn test_load_complete_config() {
        clear_vars();
        set_bucket_vars();
        env::set_var("PORT", "9000");
        env::set_var("ACCESS_TOKENS", "tok-1:alice");

        let config = AppConfig::load(development()).unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.bucket.bucket_name, "presigned-test");
        // Development defaults to LocalStack
        assert_eq!(
            config.bucket.endpoint_url.as_deref(),
            Some("http://localhost:4566")
        );
        assert_eq!(
            config.access.resolve(Some("tok-1")).map(|scope| scope.prefix),
            Some("alice/".to_string())
        );

        clear_vars();
    }

    #[test]
    #[serial]
    fn test_production_uses_aws_endpoint() {
        clear_vars();
        set_bucket_vars();

        let config = AppConfig::load(Environment::Production).unwrap();

        assert_eq!(config.bucket.endpoint_url, None);
        assert_eq!(config.port, DEFAULT_PORT);

        clear_vars();
    }

    #[test]
    #[serial]
    fn test_missing_bucket_name_fails_fast() {
        clear_vars();
        set_bucket_vars();
        env::set_var("S3_BUCKET_NAME", "   ");

        let result = AppConfig::load(development());

        assert!(matches!(
            result,
            Err(ConfigError::Missing("S3_BUCKET_NAME"))
        ));

        clear_vars();
    }

    #[test]
    #[serial]
    fn test_invalid_port() {
        clear_vars();
        set_bucket_vars();
        env::set_var("PORT", "eighty");

        let result = AppConfig::load(development());

        assert!(matches!(result, Err(ConfigError::Invalid { name: "PORT", .. })));

        clear_vars();
    }
}
