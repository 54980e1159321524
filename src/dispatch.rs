//! Request dispatch: the one path every request takes.
//!
//! ```text
//! Start       resolve trace id, open span, log "received"
//! Matching    (method, raw path) → chain, or 404 without invoking anything
//! Invoking    run the chain with an explicit Next
//! Recovering  Err reply → its own status; panic → 500 with the panic message
//! Completing  nothing produced → 501; set x-trace-id; log the outcome
//! ```
//!
//! A panic in one handler never escapes [`Router::dispatch`]. The crate must
//! be built with `panic = "unwind"` (the default) for that to hold.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tracing::{Instrument, debug, error, info, info_span};
use uuid::Uuid;

use crate::error::Error;
use crate::handler::Next;
use crate::header;
use crate::method::Method;
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;

/// Bodies at least this long are left out of failure logs.
const MAX_LOGGED_BODY: usize = 1024;

impl Router {
    /// Routes one request and produces one response.
    ///
    /// Always returns a response carrying exactly one `x-trace-id` header.
    pub async fn dispatch(&self, mut req: Request) -> Response {
        let trace_id = resolve_trace_id(&req);
        req.trace_id = trace_id.clone();

        let span = info_span!("dispatch", trace_id = %trace_id);
        async move {
            log_received(&req);
            let response = self.invoke(req).await;
            complete(response, trace_id)
        }
        .instrument(span)
        .await
    }

    async fn invoke(&self, mut req: Request) -> Response {
        let matched = req.method().parse::<Method>().ok()
            .and_then(|method| self.lookup(method, req.raw_path()));
        let Some((links, params)) = matched else {
            return Response::error(&Error::not_found(format!(
                "endpoint not found: {} {}",
                req.method(),
                req.raw_path()
            )));
        };
        req.params = params;

        let next = Next::new(links);
        // The async block defers the first link's synchronous work to the
        // first poll, so panics raised there are caught as well.
        let outcome = AssertUnwindSafe(async move { next.run(req).await })
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(Some(response))) => response,
            Ok(Ok(None)) => Response::error(&Error::not_implemented("no response from handler")),
            Ok(Err(err)) => {
                // log_outcome reports the failure itself
                debug!(error = %err, "handler returned an error");
                Response::error(&err)
            }
            Err(panic) => {
                let msg = panic_message(panic.as_ref());
                error!(error = %msg, "caught a panic");
                Response::error(&Error::internal(msg))
            }
        }
    }
}

/// Answers a request that could not be decoded far enough to route it.
pub(crate) fn reject(req: &Request, err: &Error) -> Response {
    let trace_id = resolve_trace_id(req);
    let _span = info_span!("dispatch", trace_id = %trace_id).entered();
    log_received(req);
    complete(Response::error(err), trace_id)
}

fn log_received(req: &Request) {
    info!(
        header = %headers_json(req.headers()),
        path = req.raw_path(),
        query = req.raw_query(),
        method = req.method(),
        user_agent = req.user_agent(),
        source_ip = req.source_ip(),
        "received"
    );
}

fn complete(mut response: Response, trace_id: String) -> Response {
    response.set_header(header::TRACE_ID, trace_id);
    log_outcome(&response);
    response
}

/// Trace id precedence: `x-trace-id` request header, gateway request id,
/// fresh UUID v4.
pub(crate) fn resolve_trace_id(req: &Request) -> String {
    [req.header_or_empty(header::TRACE_ID), req.request_id()]
        .into_iter()
        .map(str::trim)
        .find(|id| !id.is_empty())
        .map_or_else(|| Uuid::new_v4().to_string(), ToOwned::to_owned)
}

fn headers_json(headers: &[(String, String)]) -> String {
    let map: serde_json::Map<String, serde_json::Value> = headers.iter()
        .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
        .collect();
    serde_json::Value::Object(map).to_string()
}

fn log_outcome(response: &Response) {
    let status = response.status_code().as_u16();
    if status < 400 {
        info!(status_code = status, "succeeded");
    } else if response.body().len() < MAX_LOGGED_BODY {
        error!(status_code = status, body = %String::from_utf8_lossy(response.body()), "failed");
    } else {
        error!(status_code = status, "failed");
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        (*s).to_owned()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn lines(&self) -> Vec<String> {
            String::from_utf8_lossy(&self.0.lock().unwrap()).lines().map(ToOwned::to_owned).collect()
        }
    }

    #[tokio::test]
    async fn test_should_log_handler_error_once_at_error_level() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::INFO)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let router = Router::new().on(Method::Get, "/fail", |_req: Request| async move {
            Err::<Response, _>(Error::not_acceptable("nope"))
        });
        let res = router.dispatch(Request::builder().method("GET").path("/fail").build()).await;
        assert_eq!(res.status_code().as_u16(), 406);

        let lines = captured.lines();
        let errors: Vec<&String> = lines.iter().filter(|l| l.contains("ERROR")).collect();
        assert_eq!(errors.len(), 1, "{lines:#?}");
        assert!(errors[0].contains("failed"));
        assert!(errors[0].contains("status_code=406"));
    }

    #[test]
    fn test_should_prefer_trace_header_over_request_id() {
        let req = Request::builder()
            .header("X-Trace-Id", "trace-1")
            .request_id("req-1")
            .build();
        assert_eq!(resolve_trace_id(&req), "trace-1");
    }

    #[test]
    fn test_should_fall_back_to_request_id_then_uuid() {
        let req = Request::builder().request_id("req-1").header("x-trace-id", "  ").build();
        assert_eq!(resolve_trace_id(&req), "req-1");

        let generated = resolve_trace_id(&Request::builder().build());
        assert!(Uuid::parse_str(&generated).is_ok());
    }

    #[test]
    fn test_should_extract_panic_messages() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");
        let boxed: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(boxed.as_ref()), "handler panicked");
    }

    #[test]
    fn test_should_render_headers_as_json_object() {
        let json = headers_json(&[("x-a".to_owned(), "1".to_owned())]);
        assert_eq!(json, r#"{"x-a":"1"}"#);
    }
}
