use std::{
    collections::{HashMap, VecDeque},
    sync::Mutex,
};

use async_trait::async_trait;
use aws_sdk_s3::{
    error::{DisplayErrorContext, ProvideErrorMetadata},
    Client as AwsS3SdkClient,
};
use tracing::{debug, info};

use super::{classify_aws_error, LogSource};
use crate::{error::DestinationError, extract::LineFormat, retry::RetryPolicy};

const LIST_OBJECTS: &str = "ListObjectsV2";
const GET_OBJECT: &str = "GetObject";

/// One page of a prefix listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub keys: Vec<String>,
    pub is_truncated: bool,
    pub next_continuation_token: Option<String>,
}

/// The two object storage calls the reader needs. Both real and mock
/// implementations use it.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<&str>,
    ) -> Result<ListPage, DestinationError>;

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, DestinationError>;
}

pub struct S3ObjectStore {
    client: AwsS3SdkClient,
}

impl S3ObjectStore {
    pub fn new(client: AwsS3SdkClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<&str>,
    ) -> Result<ListPage, DestinationError> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .set_continuation_token(continuation_token.map(str::to_owned))
            .send()
            .await
            .map_err(|e| {
                classify_aws_error(
                    LIST_OBJECTS,
                    e.code(),
                    format!(
                        "Failed to list objects from bucket {bucket:?}: {}",
                        DisplayErrorContext(&e)
                    ),
                )
            })?;

        Ok(ListPage {
            keys: output
                .contents()
                .iter()
                .filter_map(|o| o.key().map(str::to_owned))
                .collect(),
            is_truncated: output.is_truncated().unwrap_or(false),
            next_continuation_token: output.next_continuation_token().map(str::to_owned),
        })
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, DestinationError> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                classify_aws_error(
                    GET_OBJECT,
                    e.code(),
                    format!(
                        "Failed to get object s3://{bucket}/{key}: {}",
                        DisplayErrorContext(&e)
                    ),
                )
            })?;

        let body = output.body.collect().await.map_err(|e| {
            DestinationError::failed(
                GET_OBJECT,
                format!("Failed to read body of s3://{bucket}/{key}: {e}"),
            )
        })?;
        Ok(body.to_vec())
    }
}

/// In-memory object store for tests. Listing pages are handed out in the order
/// they were queued; object fetches can be scripted to fail before succeeding.
#[derive(Default)]
pub struct MockObjectStore {
    list_responses: Mutex<VecDeque<Result<ListPage, DestinationError>>>,
    list_calls: Mutex<Vec<Option<String>>>,
    objects: HashMap<String, Vec<u8>>,
    get_failures: Mutex<HashMap<String, VecDeque<DestinationError>>>,
    get_calls: Mutex<Vec<String>>,
}

impl MockObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list_ret(self, response: Result<ListPage, DestinationError>) -> Self {
        self.list_responses
            .lock()
            .expect("poisoned")
            .push_back(response);
        self
    }

    pub fn object(mut self, key: &str, body: impl Into<Vec<u8>>) -> Self {
        self.objects.insert(key.to_owned(), body.into());
        self
    }

    /// Fail the next fetch of `key` with `err`; queued failures are used up in order.
    pub fn get_object_err(self, key: &str, err: DestinationError) -> Self {
        self.get_failures
            .lock()
            .expect("poisoned")
            .entry(key.to_owned())
            .or_default()
            .push_back(err);
        self
    }

    /// Continuation token passed on each listing call.
    pub fn list_calls(&self) -> Vec<Option<String>> {
        self.list_calls.lock().expect("poisoned").clone()
    }

    pub fn get_calls(&self) -> Vec<String> {
        self.get_calls.lock().expect("poisoned").clone()
    }
}

#[async_trait]
impl ObjectStore for MockObjectStore {
    async fn list_objects(
        &self,
        _bucket: &str,
        _prefix: &str,
        continuation_token: Option<&str>,
    ) -> Result<ListPage, DestinationError> {
        self.list_calls
            .lock()
            .expect("poisoned")
            .push(continuation_token.map(str::to_owned));
        self.list_responses
            .lock()
            .expect("poisoned")
            .pop_front()
            .unwrap_or_else(|| Err(DestinationError::failed(LIST_OBJECTS, "no listing queued")))
    }

    async fn get_object(&self, _bucket: &str, key: &str) -> Result<Vec<u8>, DestinationError> {
        self.get_calls.lock().expect("poisoned").push(key.to_owned());
        let queued = self
            .get_failures
            .lock()
            .expect("poisoned")
            .get_mut(key)
            .and_then(VecDeque::pop_front);
        if let Some(err) = queued {
            return Err(err);
        }
        self.objects
            .get(key)
            .cloned()
            .ok_or_else(|| DestinationError::failed(GET_OBJECT, format!("NoSuchKey: {key}")))
    }
}

/// Walks every object under a prefix. Listing pages are requested lazily, one
/// whenever the keys from the previous page have all been fetched, and listing
/// stops once a page comes back untruncated.
pub struct ObjectStoreReader<S> {
    store: S,
    bucket: String,
    prefix: String,
    retry: RetryPolicy,
    pending_keys: VecDeque<String>,
    continuation_token: Option<String>,
    listing_done: bool,
    list_calls: u64,
    objects_read: u64,
}

impl<S: ObjectStore> ObjectStoreReader<S> {
    pub fn new(store: S, bucket: String, prefix: String, retry: RetryPolicy) -> Self {
        Self {
            store,
            bucket,
            prefix,
            retry,
            pending_keys: VecDeque::new(),
            continuation_token: None,
            listing_done: false,
            list_calls: 0,
            objects_read: 0,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    async fn list_next_page(&mut self) -> Result<(), DestinationError> {
        let page = {
            let store = &self.store;
            let bucket = self.bucket.as_str();
            let prefix = self.prefix.as_str();
            let token = self.continuation_token.as_deref();
            self.retry
                .run(LIST_OBJECTS, move || {
                    store.list_objects(bucket, prefix, token)
                })
                .await?
        };
        self.list_calls += 1;
        debug!(
            "Listed {} keys from s3://{}/{} (page {}, truncated: {})",
            page.keys.len(),
            self.bucket,
            self.prefix,
            self.list_calls,
            page.is_truncated
        );
        self.pending_keys.extend(page.keys);

        if !page.is_truncated {
            self.listing_done = true;
            return Ok(());
        }
        match page.next_continuation_token {
            Some(token) => self.continuation_token = Some(token),
            // Without a token the next request would restart from the first page.
            None => {
                return Err(DestinationError::failed(
                    LIST_OBJECTS,
                    "listing is truncated but returned no continuation token",
                ))
            }
        }
        Ok(())
    }

    async fn fetch_lines(&mut self, key: String) -> Result<Vec<String>, DestinationError> {
        let body = {
            let store = &self.store;
            let bucket = self.bucket.as_str();
            let key = key.as_str();
            self.retry
                .run(GET_OBJECT, move || store.get_object(bucket, key))
                .await?
        };
        self.objects_read += 1;

        let text = String::from_utf8(body).map_err(|e| {
            DestinationError::failed(
                GET_OBJECT,
                format!("s3://{}/{key} is not valid UTF-8: {e}", self.bucket),
            )
        })?;
        let lines: Vec<String> = split_lines(&text).map(str::to_owned).collect();
        debug!("Fetched {} lines from s3://{}/{}", lines.len(), self.bucket, key);
        Ok(lines)
    }
}

/// Lines of an object body, dropping the empty fragment after a trailing newline
/// and any blank lines.
pub fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    text.split('\n').filter(|line| !line.is_empty())
}

#[async_trait]
impl<S: ObjectStore> LogSource for ObjectStoreReader<S> {
    fn name(&self) -> &'static str {
        "S3"
    }

    fn line_format(&self) -> LineFormat {
        LineFormat::JsonEnvelope
    }

    async fn next_batch(&mut self) -> Result<Option<Vec<String>>, DestinationError> {
        loop {
            if let Some(key) = self.pending_keys.pop_front() {
                return self.fetch_lines(key).await.map(Some);
            }
            if self.listing_done {
                info!(
                    "Finished reading s3://{}/{}: {} objects across {} listing pages",
                    self.bucket, self.prefix, self.objects_read, self.list_calls
                );
                return Ok(None);
            }
            self.list_next_page().await?;
        }
    }

    fn objects_read(&self) -> Option<u64> {
        Some(self.objects_read)
    }
}
