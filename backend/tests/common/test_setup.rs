use std::collections::HashMap;
use std::sync::Arc;

use axum::{body::Body, http::Request, response::Response, Router};
use image_bucket::{
    bucket::{mock::InMemoryBucket, BucketApi},
    middleware::AccessControl,
    server,
    types::Environment,
};
use tower::ServiceExt;

pub const ALICE_TOKEN: &str = "tok-alice";
pub const BOB_TOKEN: &str = "tok-bob";

/// Initialize tracing for tests
pub fn setup_test_env() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .try_init()
        .ok();
}

/// Router wired to an in-memory bucket
pub struct TestSetup {
    pub router: Router,
    pub environment: Environment,
    pub bucket: Arc<InMemoryBucket>,
}

impl TestSetup {
    /// Token-checked setup: `tok-alice` owns `alice/`, `tok-bob` owns `bob/`
    pub fn new() -> Self {
        let access = AccessControl::new(
            HashMap::from([
                (ALICE_TOKEN.to_string(), "alice".to_string()),
                (BOB_TOKEN.to_string(), "bob".to_string()),
            ]),
            "",
        );
        Self::with_access(access, InMemoryBucket::default())
    }

    /// Auth disabled, every request is scoped to `prefix`
    pub fn unauthenticated(prefix: &str) -> Self {
        Self::with_access(AccessControl::disabled(prefix), InMemoryBucket::default())
    }

    pub fn with_access(access: AccessControl, bucket: InMemoryBucket) -> Self {
        let environment = Environment::Development {
            presign_expiry_override: None,
            disable_auth: false,
        };
        Self::build(environment, access, bucket)
    }

    pub fn build(environment: Environment, access: AccessControl, bucket: InMemoryBucket) -> Self {
        setup_test_env();

        let bucket = Arc::new(bucket);
        let bucket_api: Arc<dyn BucketApi> = bucket.clone();

        let router = server::router(environment.clone(), bucket_api, Arc::new(access))
            .expect("Failed to build router");

        Self {
            router,
            environment,
            bucket,
        }
    }

    pub async fn send_get_request(&self, route: &str, token: Option<&str>) -> Response {
        let mut request = Request::builder().uri(route).method("GET");
        if let Some(token) = token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        self.router
            .clone()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }
}
