//! # gatekit
//!
//! Request plumbing for HTTP-triggered serverless functions.
//!
//! A function receives one gateway event per invocation. gatekit turns it
//! into a [`Request`], routes it through a radix tree to a chain of handlers,
//! and always hands back exactly one [`Response`] tagged with an
//! `x-trace-id`. A handler that fails, panics or produces nothing still
//! yields a well-formed JSON error response.
//!
//! Around that core:
//!
//! - [`middleware::RequestVerifier`]: rejects requests whose ECDSA signature
//!   over a canonicalized form does not match, or whose timestamp is stale
//! - [`signing::RequestSigner`]: the client side of the same scheme
//! - [`storage::Bucket`]: CRUD over an object store with bounded delete
//!   confirmation
//! - [`Server`]: a local HTTP host running the same dispatch path
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use gatekit::middleware::RequestVerifier;
//! use gatekit::{Chain, Config, Method, Request, Response, Router, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), gatekit::Error> {
//!     let config = Config::from_env();
//!     gatekit::logging::init(&config.log)?;
//!
//!     let verifier = RequestVerifier::from_config(&config.verifier)?;
//!     let app = Router::new()
//!         .on(Method::Get, "/health", health)
//!         .route(Method::Get, "/items/{id}", Chain::new().then(verifier).then(get_item));
//!
//!     Server::bind("0.0.0.0:3000")?.serve(app).await
//! }
//!
//! async fn health(_req: Request) -> &'static str {
//!     "ok"
//! }
//!
//! async fn get_item(req: Request) -> Response {
//!     let id = req.param("id").unwrap_or_default();
//!     Response::json(format!(r#"{{"id":"{id}"}}"#))
//! }
//! ```
//!
//! In a function runtime, pass each event to [`Router::handle_event`] (or the
//! raw payload to [`Router::handle_json`]) instead of running a server.

mod config;
mod dispatch;
mod error;
mod event;
mod handler;
mod method;
mod request;
mod response;
mod router;
mod server;

pub mod header;
pub mod logging;
pub mod middleware;
pub mod signing;
pub mod storage;

pub use config::{Config, LogConfig, StorageConfig, VerifierConfig};
pub use error::Error;
pub use event::{GatewayEvent, GatewayHttp, GatewayRequestContext, GatewayResponse};
pub use handler::{BoxFuture, Chain, Handler, IntoReply, Link, Next, Reply};
pub use method::{Method, UnknownMethod};
pub use request::{Request, RequestBuilder};
pub use response::{ContentType, IntoResponse, Response, ResponseBuilder};
pub use router::Router;
pub use server::Server;
