//! Client-side request signing.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use p256::ecdsa::signature::hazmat::PrehashSigner;
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};

use crate::error::Error;
use crate::header;
use crate::request::Request;
use crate::signing::profile::CanonicalProfile;

/// Signs requests so that a [`RequestVerifier`](crate::middleware::RequestVerifier)
/// configured with the same profile and the matching public key accepts them.
///
/// Signatures are deterministic (RFC 6979).
#[derive(Clone)]
pub struct RequestSigner {
    key: SigningKey,
    profile: CanonicalProfile,
}

impl RequestSigner {
    pub fn new(key: SigningKey, profile: CanonicalProfile) -> Self {
        Self { key, profile }
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key().clone()
    }

    pub fn profile(&self) -> &CanonicalProfile {
        &self.profile
    }

    /// Stamps `x-timestamp` with the current time and sets `x-sign`.
    pub fn sign(&self, req: Request) -> Result<Request, Error> {
        self.sign_at(req, Utc::now())
    }

    /// Same as [`sign`](Self::sign) with an explicit signing time.
    pub fn sign_at(&self, mut req: Request, now: DateTime<Utc>) -> Result<Request, Error> {
        req.set_header(header::TIMESTAMP, now.timestamp().to_string());
        let digest = self.profile.digest(&req);
        let signature: Signature = self.key
            .sign_prehash(&digest)
            .map_err(|e| Error::internal(format!("sign request: {e}")))?;
        req.set_header(header::SIGNATURE, STANDARD.encode(signature.to_der().as_bytes()));
        Ok(req)
    }
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner").field("profile", &self.profile.name()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> RequestSigner {
        let key = SigningKey::from_slice(&[0x42; 32]).unwrap();
        RequestSigner::new(key, CanonicalProfile::trace())
    }

    #[test]
    fn test_should_set_timestamp_and_signature_headers() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let req = signer()
            .sign_at(Request::builder().path("/items/42").build(), now)
            .unwrap();
        assert_eq!(req.header(header::TIMESTAMP), Some("1700000000"));
        let sig = STANDARD.decode(req.header(header::SIGNATURE).unwrap()).unwrap();
        assert!(Signature::from_der(&sig).is_ok());
    }

    #[test]
    fn test_should_sign_deterministically() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let a = signer().sign_at(Request::builder().build(), now).unwrap();
        let b = signer().sign_at(Request::builder().build(), now).unwrap();
        assert_eq!(a.header(header::SIGNATURE), b.header(header::SIGNATURE));
    }
}
