//! Object storage.
//!
//! [`Bucket`] is a small CRUD facade over an [`ObjectBackend`]. Uploads get a
//! detected content type, the configured `Cache-Control` and user metadata;
//! deletes wait (bounded) until the object is confirmed gone.
//!
//! ```rust
//! # async fn demo() -> Result<(), gatekit::storage::StorageError> {
//! use std::collections::HashMap;
//! use gatekit::storage::Bucket;
//!
//! let bucket = Bucket::in_memory("assets");
//! bucket.put("hello.txt", "hi", HashMap::new()).await?;
//! assert!(bucket.exists("hello.txt").await?);
//! bucket.delete("hello.txt").await?;
//! # Ok(())
//! # }
//! ```

mod backend;
mod error;
mod wait;

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::debug;

pub use backend::{ObjectBackend, ObjectStoreBackend, PutAttributes};
pub use error::StorageError;

use crate::config::StorageConfig;

const DEFAULT_CACHE_CONTROL: &str = "public, max-age=14400";
const DEFAULT_DELETE_WAIT: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Canned ACL applied to uploads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Acl {
    #[default]
    Private,
    PublicRead,
    PublicReadWrite,
    AwsExecRead,
    AuthenticatedRead,
    BucketOwnerRead,
    BucketOwnerFullControl,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown ACL `{0}`")]
pub struct UnknownAcl(pub String);

impl Acl {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::PublicRead => "public-read",
            Self::PublicReadWrite => "public-read-write",
            Self::AwsExecRead => "aws-exec-read",
            Self::AuthenticatedRead => "authenticated-read",
            Self::BucketOwnerRead => "bucket-owner-read",
            Self::BucketOwnerFullControl => "bucket-owner-full-control",
        }
    }
}

impl FromStr for Acl {
    type Err = UnknownAcl;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "private" => Ok(Self::Private),
            "public-read" => Ok(Self::PublicRead),
            "public-read-write" => Ok(Self::PublicReadWrite),
            "aws-exec-read" => Ok(Self::AwsExecRead),
            "authenticated-read" => Ok(Self::AuthenticatedRead),
            "bucket-owner-read" => Ok(Self::BucketOwnerRead),
            "bucket-owner-full-control" => Ok(Self::BucketOwnerFullControl),
            _ => Err(UnknownAcl(s.to_owned())),
        }
    }
}

impl fmt::Display for Acl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named bucket.
#[derive(Clone)]
pub struct Bucket {
    name: String,
    backend: Arc<dyn ObjectBackend>,
    cache_control: String,
    delete_wait: Duration,
}

impl Bucket {
    pub fn new(name: impl Into<String>, backend: Arc<dyn ObjectBackend>) -> Self {
        Self {
            name: name.into(),
            backend,
            cache_control: DEFAULT_CACHE_CONTROL.to_owned(),
            delete_wait: DEFAULT_DELETE_WAIT,
        }
    }

    /// S3 bucket described by `config`.
    pub fn from_config(config: &StorageConfig) -> Result<Self, StorageError> {
        let backend = ObjectStoreBackend::s3(config)?;
        Ok(Self::new(config.bucket.clone(), Arc::new(backend))
            .cache_control(config.cache_control.clone())
            .delete_wait(Duration::from_secs(config.delete_wait_secs)))
    }

    /// Bucket backed by process memory, for tests and local runs.
    pub fn in_memory(name: impl Into<String>) -> Self {
        Self::new(name, Arc::new(ObjectStoreBackend::in_memory()))
    }

    pub fn cache_control(mut self, value: impl Into<String>) -> Self {
        self.cache_control = value.into();
        self
    }

    /// Bounds how long deletes wait for the object to disappear.
    pub fn delete_wait(mut self, wait: Duration) -> Self {
        self.delete_wait = wait;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn put(
        &self,
        id: &str,
        content: impl Into<Bytes>,
        metadata: HashMap<String, String>,
    ) -> Result<(), StorageError> {
        let content = content.into();
        let attrs = PutAttributes {
            content_type: detect_content_type(id, &content),
            cache_control: self.cache_control.clone(),
            metadata,
        };
        debug!(bucket = %self.name, id, size = content.len(), content_type = %attrs.content_type, "put object");
        self.backend.put(id, content, attrs).await
    }

    /// Fails with [`StorageError::NotFound`] for a missing object.
    pub async fn get(&self, id: &str) -> Result<Bytes, StorageError> {
        self.backend.get(id).await
    }

    pub async fn exists(&self, id: &str) -> Result<bool, StorageError> {
        self.backend.exists(id).await
    }

    /// Deletes `id` and waits until it is gone.
    pub async fn delete(&self, id: &str) -> Result<(), StorageError> {
        self.backend.delete(id).await?;
        debug!(bucket = %self.name, id, "deleted object");
        self.wait_absent("delete", id, Instant::now() + self.delete_wait).await
    }

    /// Deletes every id in one backend call.
    ///
    /// Ids the backend did not confirm are reported, sorted, in
    /// [`StorageError::PartialDelete`]. Otherwise waits until each id is gone.
    pub async fn batch_delete(&self, ids: &[&str]) -> Result<(), StorageError> {
        if ids.is_empty() {
            return Ok(());
        }

        let keys: Vec<String> = ids.iter().map(|id| (*id).to_owned()).collect();
        let deleted: HashSet<String> = self.backend.delete_many(&keys).await?.into_iter().collect();
        let remaining: BTreeSet<&String> = keys.iter().filter(|id| !deleted.contains(*id)).collect();
        if !remaining.is_empty() {
            return Err(StorageError::PartialDelete {
                ids: remaining.into_iter().cloned().collect(),
            });
        }
        debug!(bucket = %self.name, count = keys.len(), "batch deleted objects");

        let deadline = Instant::now() + self.delete_wait;
        for id in &keys {
            self.wait_absent("batch_delete", id, deadline).await?;
        }
        Ok(())
    }

    pub async fn get_metadata(&self, id: &str) -> Result<HashMap<String, String>, StorageError> {
        self.backend.metadata(id).await
    }

    async fn wait_absent(&self, op: &'static str, id: &str, deadline: Instant) -> Result<(), StorageError> {
        let backend = &self.backend;
        let gone = wait::wait_until(deadline, POLL_INTERVAL, move || async move {
            Ok::<_, StorageError>(!backend.exists(id).await?)
        })
        .await?;
        if gone {
            Ok(())
        } else {
            Err(StorageError::Timeout { op, id: id.to_owned() })
        }
    }
}

impl fmt::Debug for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bucket")
            .field("name", &self.name)
            .field("cache_control", &self.cache_control)
            .field("delete_wait", &self.delete_wait)
            .finish_non_exhaustive()
    }
}

/// Content type sniffed from the leading bytes, then guessed from the id's
/// extension. Neither matching means plain text for UTF-8 content and
/// octet-stream otherwise.
fn detect_content_type(id: &str, content: &[u8]) -> String {
    if let Some(kind) = infer::get(content) {
        return kind.mime_type().to_owned();
    }
    if let Some(mime) = mime_guess::from_path(id).first_raw() {
        return mime.to_owned();
    }
    if std::str::from_utf8(content).is_ok() {
        "text/plain; charset=utf-8".to_owned()
    } else {
        "application/octet-stream".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_detect_content_type() {
        assert_eq!(detect_content_type("a/logo.png", b"\x89PNG"), "image/png");
        assert_eq!(detect_content_type("data.json", b"{}"), "application/json");
        assert_eq!(detect_content_type("notes", b"hello"), "text/plain; charset=utf-8");
        assert_eq!(detect_content_type("blob", &[0xff, 0xfe, 0x00]), "application/octet-stream");
    }

    #[test]
    fn test_should_prefer_content_bytes_over_extension() {
        let png = b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDR";
        assert_eq!(detect_content_type("avatar", png), "image/png");
        assert_eq!(detect_content_type("avatar.txt", png), "image/png");
        assert_eq!(detect_content_type("scan.bin", b"%PDF-1.7\n"), "application/pdf");
    }

    #[test]
    fn test_should_parse_acl_names() {
        assert_eq!("public-read".parse::<Acl>(), Ok(Acl::PublicRead));
        assert_eq!("BUCKET-OWNER-FULL-CONTROL".parse::<Acl>(), Ok(Acl::BucketOwnerFullControl));
        assert_eq!("everyone".parse::<Acl>(), Err(UnknownAcl("everyone".to_owned())));
        assert_eq!(Acl::AwsExecRead.to_string(), "aws-exec-read");
        assert_eq!(serde_json::to_string(&Acl::AuthenticatedRead).unwrap(), r#""authenticated-read""#);
    }

    #[tokio::test]
    async fn test_should_apply_cache_control_to_uploads() {
        let bucket = Bucket::in_memory("b").cache_control("no-store");
        assert_eq!(bucket.cache_control, "no-store");
        bucket.put("k", "v", HashMap::new()).await.unwrap();
        assert_eq!(bucket.get("k").await.unwrap(), Bytes::from_static(b"v"));
    }
}
