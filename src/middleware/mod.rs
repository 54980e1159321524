//! Middleware layer.
//!
//! Middleware is any chain link that inspects a request before handing it to
//! [`Next`](crate::Next): write it as `async fn(Request, Next) -> impl IntoReply`
//! or implement [`Link`](crate::Link) for stateful middleware.
//!
//! Built-in middleware:
//! - [`RequestVerifier`]: timestamp freshness plus ECDSA signature check over
//!   a canonicalized request

mod verify;

pub use verify::{DEFAULT_MAX_SKEW, RequestVerifier};
