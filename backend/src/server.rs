use std::sync::Arc;
use std::time::Duration;

use aide::openapi::OpenApi;
use axum::{extract::Request, Extension, Router};
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::Span;

use crate::routes;
use crate::{
    bucket::BucketApi,
    middleware::AccessControl,
    routes::home::UploadPage,
    types::{AppConfig, Environment},
};

/// Builds the application router with every dependency injected
///
/// # Errors
///
/// Returns an error if the upload page template does not compile
pub fn router(
    environment: Environment,
    bucket: Arc<dyn BucketApi>,
    access: Arc<AccessControl>,
) -> anyhow::Result<Router> {
    let mut openapi = OpenApi::default();
    let upload_page = Arc::new(UploadPage::new()?);

    Ok(routes::handler()
        .finish_api(&mut openapi)
        .layer(Extension(openapi))
        .layer(Extension(environment))
        .layer(Extension(bucket))
        .layer(Extension(access))
        .layer(Extension(upload_page))
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .layer(TimeoutLayer::new(Duration::from_secs(5))))
}

/// Span wrapping each request. `user_id` is filled in by the auth middleware.
///
/// Only the path is recorded so tokens passed as query parameters stay out of
/// the logs.
fn request_span(request: &Request) -> Span {
    tracing::info_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
        user_id = tracing::field::Empty,
    )
}

/// Starts the server with the given configuration and bucket adapter
///
/// # Errors
///
/// Returns an error if the server fails to start or bind to the port
pub async fn start(config: AppConfig, bucket: Arc<dyn BucketApi>) -> anyhow::Result<()> {
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
    let router = router(config.environment, bucket, Arc::new(config.access))?;

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("🔄 Image Bucket Backend started on http://{addr}");

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(anyhow::Error::from)
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!("Failed to install SIGTERM handler: {e}"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections");
}
