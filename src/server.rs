//! Local development host.
//!
//! Serves a [`Router`] over plain HTTP so functions can be exercised with
//! `curl` before deployment. Each hyper request is collected into a
//! [`Request`] and goes through the same [`Router::dispatch`] path as gateway
//! events.
//!
//! On SIGTERM or Ctrl-C the host stops accepting, lets in-flight connections
//! finish, then returns from [`Server::serve`].

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::dispatch;
use crate::error::Error;
use crate::request::Request;
use crate::router::Router;

/// HTTP host for a [`Router`].
#[derive(Debug)]
pub struct Server {
    addr: SocketAddr,
}

impl Server {
    /// ```rust,no_run
    /// use gatekit::{Router, Server};
    ///
    /// # async fn run() -> Result<(), gatekit::Error> {
    /// Server::bind("127.0.0.1:3000")?.serve(Router::new()).await
    /// # }
    /// ```
    pub fn bind(addr: &str) -> Result<Self, Error> {
        let addr = addr.parse::<SocketAddr>()
            .map_err(|e| Error::internal(format!("invalid socket address `{addr}`: {e}")))?;
        Ok(Self { addr })
    }

    /// Serves until SIGTERM or Ctrl-C, then drains.
    pub async fn serve(self, router: Router) -> Result<(), Error> {
        self.serve_with_shutdown(router, shutdown_signal()).await
    }

    /// Serves until `shutdown` resolves, then drains.
    pub async fn serve_with_shutdown(
        self,
        router: Router,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), Error> {
        let listener = TcpListener::bind(self.addr).await?;
        let router = Arc::new(router);
        info!(addr = %listener.local_addr()?, "gatekit listening");

        let mut tasks = tokio::task::JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                accepted = listener.accept() => {
                    let (stream, remote_addr) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            error!(error = %e, "accept failed");
                            continue;
                        }
                    };

                    let router = Arc::clone(&router);
                    let io = TokioIo::new(stream);
                    tasks.spawn(async move {
                        let svc = service_fn(move |req| {
                            let router = Arc::clone(&router);
                            async move { Ok::<_, Infallible>(handle(&router, req, remote_addr).await) }
                        });
                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, error = %e, "connection failed");
                        }
                    });
                }

                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("gatekit stopped");
        Ok(())
    }
}

async fn handle(
    router: &Router,
    req: hyper::Request<Incoming>,
    remote_addr: SocketAddr,
) -> http::Response<Full<Bytes>> {
    let (parts, body) = req.into_parts();

    let mut builder = Request::builder()
        .method(parts.method.as_str())
        .path(parts.uri.path())
        .query(parts.uri.query().unwrap_or_default())
        .source_ip(remote_addr.ip().to_string());
    for (name, value) in &parts.headers {
        match value.to_str() {
            Ok(value) => builder = builder.header(name.as_str(), value),
            Err(_) => warn!(header = %name, "dropping non-ASCII request header"),
        }
    }
    if let Some(ua) = parts.headers.get(http::header::USER_AGENT).and_then(|v| v.to_str().ok()) {
        builder = builder.user_agent(ua);
    }

    let response = match body.collect().await {
        Ok(collected) => router.dispatch(builder.body(collected.to_bytes()).build()).await,
        Err(e) => {
            let err = Error::bad_request(format!("read request body: {e}"));
            dispatch::reject(&builder.build(), &err)
        }
    };
    response.into_http()
}

/// Resolves on SIGTERM or Ctrl-C. A signal that cannot be installed is
/// logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = sigterm => {}
    }
}
