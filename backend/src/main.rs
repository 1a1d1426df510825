use std::sync::Arc;

use image_bucket::{
    bucket::{BucketApi, S3Bucket},
    server,
    types::{AppConfig, Environment},
};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let environment = Environment::from_env()?;

    // Configure logging format based on environment
    // Use JSON format for staging/production, regular format for development
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(environment.tracing_level()).into())
        .from_env_lossy();
    match environment {
        Environment::Production | Environment::Staging => {
            fmt().json().with_env_filter(env_filter).init();
        }
        Environment::Development { .. } => {
            fmt().with_env_filter(env_filter).init();
        }
    }

    let config = AppConfig::load(environment)?;
    tracing::info!(bucket = ?config.bucket, "Configuration loaded");

    let bucket: Arc<dyn BucketApi> =
        Arc::new(S3Bucket::connect(&config.environment, config.bucket.clone()).await);

    server::start(config, bucket).await
}
