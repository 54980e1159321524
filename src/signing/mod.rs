//! Request canonicalization and signing.
//!
//! [`CanonicalProfile`] turns a request into the byte string that gets signed.
//! [`RequestSigner`] is the client half; the server half is
//! [`RequestVerifier`](crate::middleware::RequestVerifier). Both go through
//! [`CanonicalProfile::digest`], so they cannot drift apart.

mod profile;
mod signer;

pub use p256::ecdsa::{SigningKey, VerifyingKey};
pub use profile::{CanonicalProfile, HashAlgorithm, UnknownProfile};
pub use signer::RequestSigner;
