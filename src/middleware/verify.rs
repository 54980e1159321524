//! Signed-request verification.
//!
//! Runs as the first link of a protected route:
//!
//! 1. `x-timestamp` must be unix seconds within the allowed skew (406).
//! 2. `x-sign` must be standard base64 (400).
//! 3. The request is canonicalized and hashed per the configured profile.
//! 4. The DER signature must verify against the digest with the public key
//!    (406 otherwise).
//!
//! Rejections are ordinary responses. Verification reads the request and
//! nothing else.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use p256::ecdsa::signature::hazmat::PrehashVerifier;
use p256::ecdsa::{Signature, VerifyingKey};
use p256::pkcs8::DecodePublicKey;
use tracing::{debug, warn};

use crate::config::VerifierConfig;
use crate::error::Error;
use crate::handler::{BoxFuture, Link, Next};
use crate::header;
use crate::request::Request;
use crate::response::Response;
use crate::signing::CanonicalProfile;

/// Default allowed clock skew between signer and verifier.
pub const DEFAULT_MAX_SKEW: Duration = Duration::from_secs(300);

/// Middleware rejecting requests whose signature does not match.
///
/// ```rust
/// use gatekit::middleware::RequestVerifier;
/// use gatekit::signing::{CanonicalProfile, SigningKey};
/// use gatekit::{Chain, Method, Request, Response, Router};
///
/// # async fn get_item(_: Request) -> Response { Response::text("") }
/// let key = SigningKey::from_slice(&[7; 32]).unwrap();
/// let verifier = RequestVerifier::new(key.verifying_key().clone(), CanonicalProfile::trace());
///
/// let router = Router::new()
///     .route(Method::Get, "/items/{id}", Chain::new().then(verifier).then(get_item));
/// ```
#[derive(Clone)]
pub struct RequestVerifier {
    key: VerifyingKey,
    profile: CanonicalProfile,
    max_skew: Duration,
}

impl RequestVerifier {
    pub fn new(key: VerifyingKey, profile: CanonicalProfile) -> Self {
        Self { key, profile, max_skew: DEFAULT_MAX_SKEW }
    }

    /// Builds a verifier from an SPKI PEM public key and the configured
    /// profile and skew.
    pub fn from_config(config: &VerifierConfig) -> Result<Self, Error> {
        let pem = config.public_key_pem.as_deref()
            .ok_or_else(|| Error::internal("verifier public key is not configured"))?;
        let key = VerifyingKey::from_public_key_pem(pem)
            .map_err(|e| Error::internal(format!("parse verifier public key: {e}")))?;
        let profile = config.profile.parse::<CanonicalProfile>()
            .map_err(|e| Error::internal(e.to_string()))?;
        Ok(Self::new(key, profile).max_skew(Duration::from_secs(config.max_skew_secs)))
    }

    /// Sets the allowed distance between `x-timestamp` and now.
    pub fn max_skew(mut self, skew: Duration) -> Self {
        self.max_skew = skew;
        self
    }

    pub fn profile(&self) -> &CanonicalProfile {
        &self.profile
    }

    /// Verifies `req` against the current time.
    pub fn verify(&self, req: &Request) -> Result<(), Error> {
        self.verify_at(req, Utc::now())
    }

    /// Verifies `req` as if the current time were `now`.
    pub fn verify_at(&self, req: &Request, now: DateTime<Utc>) -> Result<(), Error> {
        check_timestamp(req, self.max_skew, now)?;
        let signature = decode_signature(req)?;

        let digest = self.profile.digest(req);
        let valid = Signature::from_der(&signature)
            .is_ok_and(|sig| self.key.verify_prehash(&digest, &sig).is_ok());
        if valid {
            debug!(profile = self.profile.name(), "signature verified");
            Ok(())
        } else {
            Err(Error::not_acceptable("invalid signature"))
        }
    }
}

impl Link for RequestVerifier {
    fn call(&self, req: Request, next: Next) -> BoxFuture {
        match self.verify(&req) {
            Ok(()) => next.run(req),
            Err(err) => {
                warn!(error = %err, path = req.path(), "request rejected");
                Box::pin(async move { Ok(Some(Response::error(&err))) })
            }
        }
    }
}

impl std::fmt::Debug for RequestVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestVerifier")
            .field("profile", &self.profile.name())
            .field("max_skew", &self.max_skew)
            .finish()
    }
}

fn check_timestamp(req: &Request, max_skew: Duration, now: DateTime<Utc>) -> Result<(), Error> {
    let raw = req.header(header::TIMESTAMP)
        .ok_or_else(|| Error::not_acceptable("missing timestamp"))?;
    let signed_at = raw.trim().parse::<i64>()
        .map_err(|_| Error::not_acceptable("malformed timestamp"))?;
    if now.timestamp().abs_diff(signed_at) > max_skew.as_secs() {
        return Err(Error::not_acceptable("outdated request"));
    }
    Ok(())
}

fn decode_signature(req: &Request) -> Result<Vec<u8>, Error> {
    let raw = req.header(header::SIGNATURE)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::bad_request("missing signature"))?;
    STANDARD.decode(raw.trim())
        .map_err(|_| Error::bad_request("malformed signature"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signing::{HashAlgorithm, RequestSigner, SigningKey};

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn signing_key() -> SigningKey {
        SigningKey::from_slice(&[0x11; 32]).unwrap()
    }

    fn signed(profile: CanonicalProfile) -> (RequestVerifier, Request) {
        let signer = RequestSigner::new(signing_key(), profile.clone());
        let req = Request::builder()
            .method("GET")
            .path("/items/42")
            .header(header::TRACE_ID, "trace-1")
            .build();
        let req = signer.sign_at(req, now()).unwrap();
        (RequestVerifier::new(signer.verifying_key(), profile), req)
    }

    #[test]
    fn test_should_accept_correctly_signed_request() {
        for profile in [CanonicalProfile::trace(), CanonicalProfile::trace_md5(), CanonicalProfile::client()] {
            let (verifier, req) = signed(profile);
            assert!(verifier.verify_at(&req, now()).is_ok());
        }
    }

    #[test]
    fn test_should_reject_when_signed_field_changes() {
        let (verifier, req) = signed(CanonicalProfile::trace());

        let mut tampered = req.clone();
        tampered.method = "DELETE".to_owned();
        assert!(matches!(verifier.verify_at(&tampered, now()), Err(Error::NotAcceptable(_))));

        let mut tampered = req.clone();
        tampered.path = "/items/43".to_owned();
        assert!(matches!(verifier.verify_at(&tampered, now()), Err(Error::NotAcceptable(_))));

        let mut tampered = req.clone();
        tampered.raw_query = "x=1".to_owned();
        assert!(matches!(verifier.verify_at(&tampered, now()), Err(Error::NotAcceptable(_))));

        let mut tampered = req;
        tampered.set_header(header::TRACE_ID, "trace-2");
        assert!(matches!(verifier.verify_at(&tampered, now()), Err(Error::NotAcceptable(_))));
    }

    #[test]
    fn test_should_ignore_fields_outside_profile() {
        let (verifier, mut req) = signed(CanonicalProfile::trace());
        req.set_header(header::APP_ID, "other-app");
        req.body = bytes::Bytes::from_static(b"changed");
        assert!(verifier.verify_at(&req, now()).is_ok());
    }

    #[test]
    fn test_should_reject_with_wrong_public_key() {
        let (_, req) = signed(CanonicalProfile::trace());
        let other = SigningKey::from_slice(&[0x22; 32]).unwrap();
        let verifier = RequestVerifier::new(other.verifying_key().clone(), CanonicalProfile::trace());
        assert!(matches!(verifier.verify_at(&req, now()), Err(Error::NotAcceptable(_))));
    }

    #[test]
    fn test_should_reject_profile_mismatch() {
        let (_, req) = signed(CanonicalProfile::trace());
        let md5 = CanonicalProfile::custom("trace", &[header::TRACE_ID, header::TIMESTAMP], HashAlgorithm::Md5);
        let verifier = RequestVerifier::new(signing_key().verifying_key().clone(), md5);
        assert!(verifier.verify_at(&req, now()).is_err());
    }

    #[test]
    fn test_should_reject_stale_timestamp_before_decoding_signature() {
        let (verifier, mut req) = signed(CanonicalProfile::trace());
        req.set_header(header::SIGNATURE, "%%% not base64 %%%");
        let an_hour_later = now() + chrono::Duration::hours(1);

        let err = verifier.verify_at(&req, an_hour_later).unwrap_err();
        assert!(matches!(err, Error::NotAcceptable(ref m) if m == "outdated request"));
    }

    #[test]
    fn test_should_accept_timestamp_within_skew() {
        let (verifier, req) = signed(CanonicalProfile::trace());
        assert!(verifier.verify_at(&req, now() + chrono::Duration::seconds(299)).is_ok());
        assert!(verifier.verify_at(&req, now() - chrono::Duration::seconds(299)).is_ok());
        let verifier = verifier.max_skew(Duration::from_secs(10));
        assert!(verifier.verify_at(&req, now() + chrono::Duration::seconds(11)).is_err());
    }

    #[test]
    fn test_should_reject_missing_or_malformed_timestamp() {
        let (verifier, mut req) = signed(CanonicalProfile::trace());
        req.set_header(header::TIMESTAMP, "yesterday");
        assert!(matches!(verifier.verify_at(&req, now()), Err(Error::NotAcceptable(_))));

        req.headers.retain(|(k, _)| k != header::TIMESTAMP);
        let err = verifier.verify_at(&req, now()).unwrap_err();
        assert_eq!(err.to_string(), "missing timestamp");
    }

    #[test]
    fn test_should_reject_malformed_signature_as_bad_request() {
        let (verifier, mut req) = signed(CanonicalProfile::trace());
        req.set_header(header::SIGNATURE, "%%% not base64 %%%");
        assert!(matches!(verifier.verify_at(&req, now()), Err(Error::BadRequest(_))));

        req.headers.retain(|(k, _)| k != header::SIGNATURE);
        assert!(matches!(verifier.verify_at(&req, now()), Err(Error::BadRequest(_))));
    }

    #[test]
    fn test_should_reject_base64_that_is_not_der() {
        let (verifier, mut req) = signed(CanonicalProfile::trace());
        req.set_header(header::SIGNATURE, STANDARD.encode(b"definitely not der"));
        assert!(matches!(verifier.verify_at(&req, now()), Err(Error::NotAcceptable(_))));
    }

    #[test]
    fn test_should_build_from_pem_config() {
        use p256::pkcs8::{EncodePublicKey, LineEnding};

        let pem = signing_key().verifying_key().to_public_key_pem(LineEnding::LF).unwrap();
        let config = VerifierConfig {
            public_key_pem: Some(pem),
            profile: "client".to_owned(),
            max_skew_secs: 60,
        };
        let verifier = RequestVerifier::from_config(&config).unwrap();
        assert_eq!(verifier.profile(), &CanonicalProfile::client());
        assert_eq!(verifier.max_skew, Duration::from_secs(60));

        let missing = VerifierConfig { public_key_pem: None, ..config };
        assert!(RequestVerifier::from_config(&missing).is_err());
    }
}
