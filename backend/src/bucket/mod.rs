//! Object storage adapter
//!
//! Everything the HTTP layer needs from the bucket goes through [`BucketApi`]:
//! presigned downloads, presigned POST policies for browser uploads, listing and
//! deletion. [`S3Bucket`] talks to S3 through the AWS SDK; the in-memory
//! implementation in [`mock`] backs the route tests.

mod config;
mod error;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
mod policy;
mod s3;

use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::{
    stream::{self, BoxStream},
    StreamExt, TryStreamExt,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub use config::BucketConfig;
pub use error::{BucketError, BucketResult};
pub use policy::{sign_post_policy, PostPolicyRequest, UploadPolicy, FILENAME_PLACEHOLDER};
pub use s3::S3Bucket;

/// Default lifetime of presigned URLs and upload policies
pub const DEFAULT_PRESIGN_EXPIRY: Duration = Duration::from_secs(3600);

/// Longest lifetime SigV4 accepts for presigned requests (7 days)
pub const MAX_PRESIGN_EXPIRY: Duration = Duration::from_secs(604_800);

/// Object attributes as reported by the bucket listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Full object key, e.g. `user1/cat.jpg`
    pub key: String,
    /// Size in bytes
    pub size: Option<i64>,
    /// Last modification time
    pub last_modified: Option<DateTime<Utc>>,
}

/// One page of a bucket listing
#[derive(Debug, Clone, Default)]
pub struct ObjectPage {
    /// Objects in provider order
    pub objects: Vec<StoredObject>,
    /// Token for the next page, `None` once the listing is exhausted
    pub next_continuation_token: Option<String>,
}

/// Listing entry handed to browser clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ImageEntry {
    /// Presigned download URL
    pub url: String,
    /// Full object key
    pub filename: String,
}

enum Cursor {
    Start,
    Next(String),
    Done,
}

/// Operations the service performs against the object store
#[async_trait::async_trait]
pub trait BucketApi: Send + Sync {
    /// Creates a time-limited GET URL for `key`. No existence check is made.
    async fn presigned_download_url(&self, key: &str, expires_in: Duration)
        -> BucketResult<String>;

    /// Creates a POST policy letting a browser upload `{path_prefix}${filename}`.
    async fn presigned_upload_policy(
        &self,
        content_type: Option<&str>,
        path_prefix: &str,
        expires_in: Duration,
    ) -> BucketResult<UploadPolicy>;

    /// Fetches a single page of objects whose key starts with `path_prefix`.
    async fn list_objects_page(
        &self,
        path_prefix: &str,
        continuation_token: Option<String>,
    ) -> BucketResult<ObjectPage>;

    /// Deletes `key`, returning whether the provider created a delete marker.
    async fn delete_object(&self, key: &str) -> BucketResult<bool>;

    /// Lazily lists every object under `path_prefix`, following continuation
    /// tokens until the provider reports the listing complete.
    ///
    /// The stream can be restarted by calling this again.
    fn list_objects<'a>(&'a self, path_prefix: &'a str) -> BoxStream<'a, BucketResult<StoredObject>> {
        let pages = stream::try_unfold(Cursor::Start, move |cursor| async move {
            let continuation_token = match cursor {
                Cursor::Done => return Ok::<_, BucketError>(None),
                Cursor::Start => None,
                Cursor::Next(token) => Some(token),
            };

            let page = self
                .list_objects_page(path_prefix, continuation_token)
                .await?;
            let next = page
                .next_continuation_token
                .map_or(Cursor::Done, Cursor::Next);

            Ok(Some((page.objects, next)))
        });

        pages
            .map_ok(|objects| stream::iter(objects.into_iter().map(Ok::<_, BucketError>)))
            .try_flatten()
            .boxed()
    }

    /// Lists every object under `path_prefix` together with a presigned
    /// download URL, in provider order.
    ///
    /// # Errors
    ///
    /// Returns the first listing or presigning error encountered.
    async fn list_objects_with_urls(
        &self,
        path_prefix: &str,
        expires_in: Duration,
    ) -> BucketResult<Vec<ImageEntry>> {
        let mut objects = self.list_objects(path_prefix);
        let mut entries = Vec::new();

        while let Some(object) = objects.try_next().await? {
            let url = self.presigned_download_url(&object.key, expires_in).await?;
            entries.push(ImageEntry {
                url,
                filename: object.key,
            });
        }

        Ok(entries)
    }
}
