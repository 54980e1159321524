//! Header names shared by the signer, the verifier and the dispatcher.
//!
//! All names are lowercase; lookups on [`Request`](crate::Request) and
//! [`Response`](crate::Response) are case-insensitive.

/// Per-request correlation token. Read from the request when present and
/// always written to the response.
pub const TRACE_ID: &str = "x-trace-id";

/// Unix timestamp (seconds) at which the request was signed.
pub const TIMESTAMP: &str = "x-timestamp";

/// Base64-encoded ASN.1 DER ECDSA signature.
pub const SIGNATURE: &str = "x-sign";

pub const APP_ID: &str = "x-app-id";
pub const CLIENT_ID: &str = "x-client-id";
pub const CONTENT_TYPE: &str = "content-type";
pub const AUTHORIZATION: &str = "authorization";
pub const COOKIE: &str = "cookie";
pub const SET_COOKIE: &str = "set-cookie";
