//! In-memory bucket used by tests

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use chrono::Utc;

use super::{
    sign_post_policy, BucketApi, BucketConfig, BucketError, BucketResult, ObjectPage,
    PostPolicyRequest, StoredObject, UploadPolicy,
};

/// Keys are kept sorted, like an S3 listing
pub struct InMemoryBucket {
    config: BucketConfig,
    objects: RwLock<BTreeMap<String, StoredObject>>,
    page_size: usize,
    unavailable: AtomicBool,
    versioned: AtomicBool,
    delete_calls: AtomicUsize,
    list_calls: AtomicUsize,
}

impl InMemoryBucket {
    /// Creates an empty bucket returning at most `page_size` keys per page
    #[must_use]
    pub fn new(page_size: usize) -> Self {
        Self {
            config: BucketConfig {
                access_key_id: "AKIDMOCK".to_string(),
                secret_access_key: "mock-secret".to_string(),
                region: "us-east-2".to_string(),
                bucket_name: "mock-bucket".to_string(),
                endpoint_url: Some("http://localhost:4566".to_string()),
            },
            objects: RwLock::new(BTreeMap::new()),
            page_size: page_size.max(1),
            unavailable: AtomicBool::new(false),
            versioned: AtomicBool::new(false),
            delete_calls: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
        }
    }

    /// Stores an object of `size` bytes under `key`
    ///
    /// # Panics
    ///
    /// Panics if the lock is poisoned
    pub fn insert(&self, key: &str, size: i64) {
        self.objects.write().unwrap().insert(
            key.to_string(),
            StoredObject {
                key: key.to_string(),
                size: Some(size),
                last_modified: Some(Utc::now()),
            },
        );
    }

    /// Whether `key` is currently stored
    ///
    /// # Panics
    ///
    /// Panics if the lock is poisoned
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.objects.read().unwrap().contains_key(key)
    }

    /// Makes every subsequent provider call fail with a 5xx-style error
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Turns versioning on, so deletes report a delete marker
    pub fn set_versioned(&self, versioned: bool) {
        self.versioned.store(versioned, Ordering::SeqCst);
    }

    /// Number of `delete_object` calls that reached the provider
    #[must_use]
    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    /// Number of pages requested so far
    #[must_use]
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> BucketResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(BucketError::UpstreamError(
                "mock bucket unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for InMemoryBucket {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[async_trait::async_trait]
impl BucketApi for InMemoryBucket {
    async fn presigned_download_url(
        &self,
        key: &str,
        expires_in: Duration,
    ) -> BucketResult<String> {
        self.check_available()?;
        Ok(format!(
            "http://localhost:4566/{}/{key}?X-Amz-Expires={}",
            self.config.bucket_name,
            expires_in.as_secs()
        ))
    }

    async fn presigned_upload_policy(
        &self,
        content_type: Option<&str>,
        path_prefix: &str,
        expires_in: Duration,
    ) -> BucketResult<UploadPolicy> {
        self.check_available()?;
        let request = PostPolicyRequest {
            content_type,
            path_prefix,
            expires_in,
        };
        sign_post_policy(&self.config, &request, Utc::now())
    }

    async fn list_objects_page(
        &self,
        path_prefix: &str,
        continuation_token: Option<String>,
    ) -> BucketResult<ObjectPage> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let objects = self
            .objects
            .read()
            .map_err(|e| BucketError::S3Error(e.to_string()))?;

        // The continuation token is the last key of the previous page
        let mut matching = objects
            .values()
            .filter(|object| object.key.starts_with(path_prefix))
            .filter(|object| {
                continuation_token
                    .as_deref()
                    .is_none_or(|after| object.key.as_str() > after)
            })
            .cloned();

        let page: Vec<StoredObject> = matching.by_ref().take(self.page_size).collect();
        let next_continuation_token = match (matching.next(), page.last()) {
            (Some(_), Some(last)) => Some(last.key.clone()),
            _ => None,
        };

        Ok(ObjectPage {
            objects: page,
            next_continuation_token,
        })
    }

    async fn delete_object(&self, key: &str) -> BucketResult<bool> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        if key.is_empty() {
            return Err(BucketError::InvalidInput("object key is empty".to_string()));
        }

        self.objects
            .write()
            .map_err(|e| BucketError::S3Error(e.to_string()))?
            .remove(key);

        Ok(self.versioned.load(Ordering::SeqCst))
    }
}
