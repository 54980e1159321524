//! Configuration.
//!
//! Everything is driven by environment variables over built-in defaults:
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `LOG_LEVEL` | `info` | Log level filter (ignored when `RUST_LOG` is set) |
//! | `LOG_FORMAT` | `json` | `json` or `pretty` |
//! | `VERIFY_PUBLIC_KEY` | *(unset)* | SPKI PEM public key for [`RequestVerifier`](crate::middleware::RequestVerifier) |
//! | `VERIFY_PROFILE` | `trace` | Canonicalization profile: `trace`, `trace-md5`, `client` |
//! | `VERIFY_MAX_SKEW_SECS` | `300` | Allowed clock skew |
//! | `STORAGE_BUCKET` | *(empty)* | Bucket name |
//! | `STORAGE_ACL` | `private` | Canned ACL applied to uploads |
//! | `STORAGE_CACHE_CONTROL` | `public, max-age=14400` | `Cache-Control` of uploads |
//! | `STORAGE_DELETE_WAIT_SECS` | `5` | Bound on delete confirmation |

use std::env;

use crate::storage::Acl;

/// Top-level configuration.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub log: LogConfig,
    pub verifier: VerifierConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: "info".to_owned(), json: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifierConfig {
    pub public_key_pem: Option<String>,
    pub profile: String,
    pub max_skew_secs: u64,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self { public_key_pem: None, profile: "trace".to_owned(), max_skew_secs: 300 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    pub bucket: String,
    pub acl: Acl,
    pub cache_control: String,
    pub delete_wait_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            acl: Acl::Private,
            cache_control: "public, max-age=14400".to_owned(),
            delete_wait_secs: 5,
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`. Unparsable values keep their
    /// defaults and are logged.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(v) = lookup("LOG_LEVEL") {
            config.log.level = v;
        }
        if let Some(v) = lookup("LOG_FORMAT") {
            config.log.json = !v.eq_ignore_ascii_case("pretty");
        }
        if let Some(v) = lookup("VERIFY_PUBLIC_KEY") {
            config.verifier.public_key_pem = Some(v);
        }
        if let Some(v) = lookup("VERIFY_PROFILE") {
            config.verifier.profile = v;
        }
        if let Some(v) = lookup("VERIFY_MAX_SKEW_SECS") {
            parse_into(&mut config.verifier.max_skew_secs, "VERIFY_MAX_SKEW_SECS", &v);
        }
        if let Some(v) = lookup("STORAGE_BUCKET") {
            config.storage.bucket = v;
        }
        if let Some(v) = lookup("STORAGE_ACL") {
            parse_into(&mut config.storage.acl, "STORAGE_ACL", &v);
        }
        if let Some(v) = lookup("STORAGE_CACHE_CONTROL") {
            config.storage.cache_control = v;
        }
        if let Some(v) = lookup("STORAGE_DELETE_WAIT_SECS") {
            parse_into(&mut config.storage.delete_wait_secs, "STORAGE_DELETE_WAIT_SECS", &v);
        }

        config
    }
}

fn parse_into<T>(slot: &mut T, key: &str, raw: &str)
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw.parse() {
        Ok(v) => *slot = v,
        Err(e) => tracing::warn!(key, value = raw, error = %e, "ignoring invalid configuration value"),
    }
}
