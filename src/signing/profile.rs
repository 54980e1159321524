//! Canonicalization profiles.
//!
//! A profile fixes which request fields are signed, in which order, and the
//! digest applied to their concatenation. Signer and verifier must agree on
//! the profile; any drift makes every signature fail to verify.
//!
//! ```text
//! canonical = method ‖ path ‖ raw_query ‖ header[0] ‖ … ‖ header[n]
//! digest    = HASH(canonical)
//! ```
//!
//! Fields are concatenated without separators to stay bit-compatible with
//! existing clients. A missing header contributes the empty string.

use std::fmt;
use std::str::FromStr;

use md5::Md5;
use sha2::{Digest, Sha256};

use crate::header;
use crate::request::Request;

/// Digest applied to the canonical string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    /// 128-bit MD5. Legacy clients only.
    Md5,
    /// 256-bit SHA-256. Use this for new deployments.
    Sha256,
}

impl HashAlgorithm {
    pub fn digest(self, data: &[u8]) -> Vec<u8> {
        match self {
            Self::Md5 => Md5::digest(data).to_vec(),
            Self::Sha256 => Sha256::digest(data).to_vec(),
        }
    }
}

/// Ordered set of signed headers plus the digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalProfile {
    name: String,
    headers: Vec<String>,
    hash: HashAlgorithm,
}

/// Returned when a profile name is not one of the built-in profiles.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown canonicalization profile `{0}`")]
pub struct UnknownProfile(pub String);

impl CanonicalProfile {
    /// `x-trace-id`, `x-timestamp`; SHA-256.
    pub fn trace() -> Self {
        Self::custom("trace", &[header::TRACE_ID, header::TIMESTAMP], HashAlgorithm::Sha256)
    }

    /// Same fields as [`trace`](Self::trace), hashed with MD5 for legacy
    /// clients.
    pub fn trace_md5() -> Self {
        Self::custom("trace-md5", &[header::TRACE_ID, header::TIMESTAMP], HashAlgorithm::Md5)
    }

    /// `content-type`, `x-app-id`, `x-client-id`, `x-timestamp`,
    /// `authorization`; SHA-256.
    pub fn client() -> Self {
        Self::custom(
            "client",
            &[
                header::CONTENT_TYPE,
                header::APP_ID,
                header::CLIENT_ID,
                header::TIMESTAMP,
                header::AUTHORIZATION,
            ],
            HashAlgorithm::Sha256,
        )
    }

    pub fn custom(name: &str, headers: &[&str], hash: HashAlgorithm) -> Self {
        Self {
            name: name.to_owned(),
            headers: headers.iter().map(|h| h.to_ascii_lowercase()).collect(),
            hash,
        }
    }

    pub fn name(&self) -> &str { &self.name }
    pub fn headers(&self) -> &[String] { &self.headers }
    pub fn hash(&self) -> HashAlgorithm { self.hash }

    /// Builds the canonical signing string for `req`.
    pub fn canonical_bytes(&self, req: &Request) -> Vec<u8> {
        let mut buf = Vec::with_capacity(256);
        buf.extend_from_slice(req.method().as_bytes());
        buf.extend_from_slice(req.path().as_bytes());
        buf.extend_from_slice(req.raw_query().as_bytes());
        for name in &self.headers {
            buf.extend_from_slice(req.header_or_empty(name).as_bytes());
        }
        buf
    }

    /// Digest of the canonical signing string.
    pub fn digest(&self, req: &Request) -> Vec<u8> {
        self.hash.digest(&self.canonical_bytes(req))
    }
}

impl Default for CanonicalProfile {
    fn default() -> Self { Self::trace() }
}

impl FromStr for CanonicalProfile {
    type Err = UnknownProfile;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trace"     => Ok(Self::trace()),
            "trace-md5" => Ok(Self::trace_md5()),
            "client"    => Ok(Self::client()),
            other       => Err(UnknownProfile(other.to_owned())),
        }
    }
}

impl fmt::Display for CanonicalProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
