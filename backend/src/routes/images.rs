use std::sync::Arc;

use axum::{extract::Query, http::StatusCode, Extension, Json};
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::instrument;

use crate::{
    bucket::{BucketApi, ImageEntry},
    middleware::UserScope,
    types::{AppError, Environment},
};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DeleteImageQuery {
    /// Full object key, e.g. `user1/cat.jpg`
    pub filename: Option<String>,
}

/// Lists the caller's images with a presigned download URL for each
///
/// Every page of the bucket listing is followed, so the result is complete
/// even past the provider's 1000-key page limit.
///
/// # Errors
///
/// - `BucketError::UpstreamError` - 5xx from S3 while listing
/// - `BucketError::S3Error` / `BucketError::AwsError` - listing or presigning failed
#[instrument(skip_all, fields(prefix = %scope.prefix))]
pub async fn list_images(
    Extension(bucket): Extension<Arc<dyn BucketApi>>,
    Extension(environment): Extension<Environment>,
    scope: UserScope,
) -> Result<Json<Vec<ImageEntry>>, AppError> {
    let entries = bucket
        .list_objects_with_urls(&scope.prefix, environment.presigned_url_expiry())
        .await?;

    tracing::info!(count = entries.len(), "Listed images");

    Ok(Json(entries))
}

/// Deletes one of the caller's images
///
/// Returns whether the provider created a delete marker, which only happens on
/// versioned buckets. Deleting a key that does not exist is not an error.
///
/// # Errors
///
/// - 400 `missing_filename` - no or empty `filename` parameter; the bucket is not called
/// - 403 `forbidden_key` - `filename` is outside the caller's prefix
/// - `BucketError` - the delete call failed
#[instrument(skip_all, fields(prefix = %scope.prefix))]
pub async fn delete_image(
    Extension(bucket): Extension<Arc<dyn BucketApi>>,
    scope: UserScope,
    Query(query): Query<DeleteImageQuery>,
) -> Result<Json<bool>, AppError> {
    let filename = query
        .filename
        .filter(|filename| !filename.is_empty())
        .ok_or_else(|| {
            AppError::new(
                StatusCode::BAD_REQUEST,
                "missing_filename",
                "filename query parameter is required",
                false,
            )
        })?;

    if !scope.owns(&filename) {
        return Err(AppError::new(
            StatusCode::FORBIDDEN,
            "forbidden_key",
            "filename is outside of the caller's upload prefix",
            false,
        ));
    }

    let delete_marker = bucket.delete_object(&filename).await?;

    tracing::info!(filename, delete_marker, "Deleted image");

    Ok(Json(delete_marker))
}
