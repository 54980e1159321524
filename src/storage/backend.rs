use std::collections::HashMap;
use std::env;
use std::sync::Arc;

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt, stream};
use http::{HeaderMap, HeaderValue};
use object_store::aws::AmazonS3Builder;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{
    Attribute, AttributeValue, Attributes, ClientOptions, GetOptions, ObjectStore, PutOptions,
    PutPayload,
};
use tracing::warn;

use super::{Acl, StorageError};
use crate::config::StorageConfig;

const ACL_HEADER: &str = "x-amz-acl";

/// Attributes stored alongside an object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutAttributes {
    pub content_type: String,
    pub cache_control: String,
    pub metadata: HashMap<String, String>,
}

/// The operations [`Bucket`](super::Bucket) needs from a store.
pub trait ObjectBackend: Send + Sync + 'static {
    fn put<'a>(&'a self, key: &'a str, body: Bytes, attrs: PutAttributes) -> BoxFuture<'a, Result<(), StorageError>>;

    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Bytes, StorageError>>;

    /// `Ok(false)` when the object does not exist.
    fn exists<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<bool, StorageError>>;

    /// User metadata of an object.
    fn metadata<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<HashMap<String, String>, StorageError>>;

    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<(), StorageError>>;

    /// Deletes `keys` in one call and returns the keys the store confirmed.
    fn delete_many<'a>(&'a self, keys: &'a [String]) -> BoxFuture<'a, Result<Vec<String>, StorageError>>;
}

/// [`ObjectBackend`] over any `object_store` implementation.
#[derive(Debug, Clone)]
pub struct ObjectStoreBackend {
    store: Arc<dyn ObjectStore>,
}

impl ObjectStoreBackend {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()))
    }

    /// Amazon S3 backend. Credentials and region come from the usual `AWS_*`
    /// variables.
    ///
    /// `object_store` has no per-request headers, so the canned ACL is a
    /// client default header and goes out with every request, reads and
    /// deletes included. S3 applies `x-amz-acl` to object writes only and
    /// ignores it elsewhere.
    pub fn s3(config: &StorageConfig) -> Result<Self, StorageError> {
        if config.bucket.is_empty() {
            return Err(StorageError::Config("bucket name is empty".to_owned()));
        }

        let mut builder = AmazonS3Builder::from_env()
            .with_bucket_name(&config.bucket)
            .with_client_options(ClientOptions::new().with_default_headers(acl_headers(config.acl)));

        // localstack / minio
        if let Ok(endpoint) = env::var("AWS_ENDPOINT_URL") {
            if endpoint.starts_with("http://") {
                builder = builder.with_allow_http(true);
            }
            builder = builder.with_endpoint(endpoint);
        }

        let store = builder.build()
            .map_err(|e| StorageError::Config(e.to_string()))?;
        Ok(Self::new(Arc::new(store)))
    }
}

fn acl_headers(acl: Acl) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACL_HEADER, HeaderValue::from_static(acl.as_str()));
    headers
}

impl ObjectBackend for ObjectStoreBackend {
    fn put<'a>(&'a self, key: &'a str, body: Bytes, attrs: PutAttributes) -> BoxFuture<'a, Result<(), StorageError>> {
        async move {
            let mut attributes = Attributes::new();
            attributes.insert(Attribute::ContentType, AttributeValue::from(attrs.content_type));
            attributes.insert(Attribute::CacheControl, AttributeValue::from(attrs.cache_control));
            for (name, value) in attrs.metadata {
                attributes.insert(Attribute::Metadata(name.into()), AttributeValue::from(value));
            }
            let opts = PutOptions { attributes, ..PutOptions::default() };

            self.store.put_opts(&Path::from(key), PutPayload::from(body), opts).await
                .map_err(|e| StorageError::backend("put", key, e))?;
            Ok(())
        }
        .boxed()
    }

    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Bytes, StorageError>> {
        async move {
            let result = self.store.get(&Path::from(key)).await
                .map_err(|e| StorageError::backend("get", key, e))?;
            result.bytes().await
                .map_err(|e| StorageError::backend("get", key, e))
        }
        .boxed()
    }

    fn exists<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<bool, StorageError>> {
        async move {
            match self.store.head(&Path::from(key)).await {
                Ok(_) => Ok(true),
                Err(object_store::Error::NotFound { .. }) => Ok(false),
                Err(e) => Err(StorageError::backend("head", key, e)),
            }
        }
        .boxed()
    }

    fn metadata<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<HashMap<String, String>, StorageError>> {
        async move {
            let opts = GetOptions { head: true, ..GetOptions::default() };
            let result = self.store.get_opts(&Path::from(key), opts).await
                .map_err(|e| StorageError::backend("head", key, e))?;
            let metadata = result.attributes.iter()
                .filter_map(|(attr, value)| match attr {
                    Attribute::Metadata(name) => Some((name.to_string(), String::from(&**value))),
                    _ => None,
                })
                .collect();
            Ok(metadata)
        }
        .boxed()
    }

    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<(), StorageError>> {
        async move {
            self.store.delete(&Path::from(key)).await
                .map_err(|e| StorageError::backend("delete", key, e))
        }
        .boxed()
    }

    fn delete_many<'a>(&'a self, keys: &'a [String]) -> BoxFuture<'a, Result<Vec<String>, StorageError>> {
        async move {
            let by_path: HashMap<String, &String> = keys.iter()
                .map(|key| (Path::from(key.as_str()).to_string(), key))
                .collect();
            let locations = stream::iter(keys.iter().map(|key| Ok(Path::from(key.as_str())))).boxed();

            let outcomes: Vec<Result<Path, object_store::Error>> =
                self.store.delete_stream(locations).collect().await;
            let mut deleted = Vec::with_capacity(outcomes.len());
            for outcome in outcomes {
                match outcome {
                    Ok(path) => {
                        if let Some(key) = by_path.get(path.as_ref()) {
                            deleted.push((*key).clone());
                        }
                    }
                    Err(object_store::Error::NotFound { path, .. }) => {
                        // Already gone counts as deleted.
                        if let Some(key) = by_path.get(&path) {
                            deleted.push((*key).clone());
                        }
                    }
                    Err(e) => warn!(error = %e, "batch delete entry failed"),
                }
            }
            Ok(deleted)
        }
        .boxed()
    }
}
