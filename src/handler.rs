//! Handler chains and type erasure.
//!
//! # How a route's handlers are stored
//!
//! A route owns an ordered chain of *links*. Every link is stored behind the
//! same trait object, [`Link`], so chains of different handler types live in
//! one radix tree. A link gets the request and an explicit [`Next`] (the rest
//! of the chain) and either answers or hands the request on:
//!
//! ```text
//! async fn get_item(req: Request) -> Response { … }      ← terminal handler
//! async fn audit(req: Request, next: Next) -> Reply { … } ← middleware
//! RequestVerifier { … }                                  ← impl Link directly
//!        ↓ Chain::new().then(verifier).then(audit).then(get_item)
//! Arc<[BoxedLink]>                                       ← one per route
//!        ↓ at request time
//! Next::new(links).run(req)                              ← one vtable call per link
//! ```
//!
//! Every link produces a [`Reply`]. `Ok(None)` means nothing was produced,
//! which is also what running `Next` past the end of the chain yields. The
//! dispatcher turns it into `501 Not Implemented`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use http::StatusCode;

use crate::error::Error;
use crate::request::Request;
use crate::response::{IntoResponse, Response};

// ── Reply ─────────────────────────────────────────────────────────────────────

/// The explicit outcome of a link.
pub type Reply = Result<Option<Response>, Error>;

/// A heap-allocated, type-erased future that resolves to a [`Reply`].
pub type BoxFuture = Pin<Box<dyn Future<Output = Reply> + Send + 'static>>;

/// Conversion into a [`Reply`]. Implemented for everything a handler may
/// sensibly return.
pub trait IntoReply {
    fn into_reply(self) -> Reply;
}

impl IntoReply for Response {
    fn into_reply(self) -> Reply { Ok(Some(self)) }
}

impl IntoReply for Option<Response> {
    fn into_reply(self) -> Reply { Ok(self) }
}

impl IntoReply for StatusCode {
    fn into_reply(self) -> Reply { Ok(Some(self.into_response())) }
}

impl IntoReply for &'static str {
    fn into_reply(self) -> Reply { Ok(Some(self.into_response())) }
}

impl IntoReply for String {
    fn into_reply(self) -> Reply { Ok(Some(self.into_response())) }
}

impl IntoReply for (StatusCode, String) {
    fn into_reply(self) -> Reply { Ok(Some(self.into_response())) }
}

/// A handler that returns `()` produced nothing.
impl IntoReply for () {
    fn into_reply(self) -> Reply { Ok(None) }
}

impl IntoReply for Error {
    fn into_reply(self) -> Reply { Err(self) }
}

impl<R, E> IntoReply for Result<R, E>
where
    R: IntoReply,
    E: Into<Error>,
{
    fn into_reply(self) -> Reply {
        match self {
            Ok(r) => r.into_reply(),
            Err(e) => Err(e.into()),
        }
    }
}

// ── Link ──────────────────────────────────────────────────────────────────────

/// One element of a handler chain.
///
/// Implement this directly for stateful middleware (see
/// [`RequestVerifier`](crate::middleware::RequestVerifier)); plain async
/// functions get it through [`Handler`].
pub trait Link: Send + Sync + 'static {
    fn call(&self, req: Request, next: Next) -> BoxFuture;
}

/// A type-erased link shared across concurrent requests.
pub type BoxedLink = Arc<dyn Link>;

/// The remainder of a handler chain.
///
/// Cheap to clone: one `Arc` of the route's links plus a position.
#[derive(Clone)]
pub struct Next {
    links: Arc<[BoxedLink]>,
    position: usize,
}

impl Next {
    pub(crate) fn new(links: Arc<[BoxedLink]>) -> Self {
        Self { links, position: 0 }
    }

    /// Runs the next link. Past the end of the chain this resolves to
    /// `Ok(None)`.
    pub fn run(self, req: Request) -> BoxFuture {
        let Some(link) = self.links.get(self.position).cloned() else {
            return Box::pin(async { Ok(None) });
        };
        let rest = Self { links: self.links, position: self.position + 1 };
        link.call(req, rest)
    }

    /// Number of links not yet run.
    pub fn remaining(&self) -> usize {
        self.links.len().saturating_sub(self.position)
    }
}

impl std::fmt::Debug for Next {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next").field("remaining", &self.remaining()).finish()
    }
}

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Marker for handlers that implement [`Link`] themselves.
#[doc(hidden)]
pub struct Linked;

/// Implemented for everything that can be placed in a chain.
///
/// You never implement this yourself. It is satisfied by:
///
/// ```text
/// async fn name(req: Request) -> impl IntoReply               // terminal
/// async fn name(req: Request, next: Next) -> impl IntoReply   // middleware
/// any type implementing Link
/// ```
///
/// `T` only tells the blanket impls apart; the trait is sealed.
pub trait Handler<T>: private::Sealed<T> + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_link(self) -> BoxedLink;
}

mod private {
    pub trait Sealed<T> {}
}

impl<F, Fut, R> private::Sealed<(Request,)> for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoReply + Send + 'static,
{
}

impl<F, Fut, R> Handler<(Request,)> for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoReply + Send + 'static,
{
    fn into_link(self) -> BoxedLink {
        Arc::new(Terminal(self))
    }
}

impl<F, Fut, R> private::Sealed<(Request, Next)> for F
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoReply + Send + 'static,
{
}

impl<F, Fut, R> Handler<(Request, Next)> for F
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoReply + Send + 'static,
{
    fn into_link(self) -> BoxedLink {
        Arc::new(Middleware(self))
    }
}

impl<L: Link> private::Sealed<Linked> for L {}

impl<L: Link> Handler<Linked> for L {
    fn into_link(self) -> BoxedLink {
        Arc::new(self)
    }
}

// ── Concrete wrappers ─────────────────────────────────────────────────────────

/// Wraps `Fn(Request) -> Fut`. Ignores `next`.
struct Terminal<F>(F);

impl<F, Fut, R> Link for Terminal<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoReply + Send + 'static,
{
    fn call(&self, req: Request, _next: Next) -> BoxFuture {
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.into_reply() })
    }
}

/// Wraps `Fn(Request, Next) -> Fut`.
struct Middleware<F>(F);

impl<F, Fut, R> Link for Middleware<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoReply + Send + 'static,
{
    fn call(&self, req: Request, next: Next) -> BoxFuture {
        let fut = (self.0)(req, next);
        Box::pin(async move { fut.await.into_reply() })
    }
}

// ── Chain ─────────────────────────────────────────────────────────────────────

/// An ordered list of links bound to one route.
///
/// ```rust
/// use gatekit::{Chain, Next, Reply, Request, Response};
///
/// async fn audit(req: Request, next: Next) -> Reply {
///     tracing::info!(path = req.path(), "audited");
///     next.run(req).await
/// }
///
/// async fn get_item(_req: Request) -> Response {
///     Response::text("item")
/// }
///
/// let chain = Chain::new().then(audit).then(get_item);
/// assert_eq!(chain.len(), 2);
/// ```
#[derive(Clone, Default)]
pub struct Chain {
    links: Vec<BoxedLink>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a link. Returns `self` for chaining.
    pub fn then<T>(mut self, handler: impl Handler<T>) -> Self {
        self.links.push(handler.into_link());
        self
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub(crate) fn prepend(mut self, layers: &[BoxedLink]) -> Self {
        let mut links = layers.to_vec();
        links.append(&mut self.links);
        self.links = links;
        self
    }

    pub(crate) fn into_links(self) -> Arc<[BoxedLink]> {
        self.links.into()
    }
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain").field("links", &self.links.len()).finish()
    }
}
