//! Incoming request type.

use std::collections::HashMap;

use bytes::Bytes;

/// An incoming request, built from a gateway event or by the local host.
///
/// Handlers only read it. The dispatcher fills in the trace id and the path
/// parameters of the matched route before the chain runs.
#[derive(Debug, Clone, Default)]
pub struct Request {
    pub(crate) method: String,
    pub(crate) path: String,
    pub(crate) raw_path: String,
    pub(crate) raw_query: String,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: Bytes,
    pub(crate) source_ip: String,
    pub(crate) user_agent: String,
    pub(crate) request_id: String,
    pub(crate) trace_id: String,
    pub(crate) params: HashMap<String, String>,
}

impl Request {
    pub fn builder() -> RequestBuilder {
        RequestBuilder { req: Self { method: "GET".to_owned(), ..Self::default() } }
    }

    pub fn method(&self) -> &str { &self.method }

    /// Decoded path, as signed by clients.
    pub fn path(&self) -> &str { &self.path }

    /// Raw path, as matched against the route table.
    pub fn raw_path(&self) -> &str { &self.raw_path }

    pub fn raw_query(&self) -> &str { &self.raw_query }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }
    pub fn source_ip(&self) -> &str { &self.source_ip }
    pub fn user_agent(&self) -> &str { &self.user_agent }

    /// Gateway-assigned request id; empty when the host supplies none.
    pub fn request_id(&self) -> &str { &self.request_id }

    /// Correlation token resolved by the dispatcher. Empty before dispatch.
    pub fn trace_id(&self) -> &str { &self.trace_id }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Header value, or `""` when absent.
    pub fn header_or_empty(&self, name: &str) -> &str {
        self.header(name).unwrap_or("")
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/items/{id}`, `req.param("id")` on `/items/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Sets a header, replacing any existing value with the same name.
    pub(crate) fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_owned(), value.into()));
    }
}

/// Fluent builder for [`Request`]. Used by host adapters and by clients
/// preparing a request for [`RequestSigner`](crate::signing::RequestSigner).
#[derive(Debug)]
pub struct RequestBuilder {
    req: Request,
}

impl RequestBuilder {
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.req.method = method.into();
        self
    }

    /// Sets both the decoded and the raw path.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.req.raw_path = path.clone();
        self.req.path = path;
        self
    }

    /// Overrides the raw path when it differs from the decoded one.
    pub fn raw_path(mut self, raw_path: impl Into<String>) -> Self {
        self.req.raw_path = raw_path.into();
        self
    }

    pub fn query(mut self, raw_query: impl Into<String>) -> Self {
        self.req.raw_query = raw_query.into();
        self
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.req.set_header(name, value);
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.req.body = body.into();
        self
    }

    pub fn source_ip(mut self, ip: impl Into<String>) -> Self {
        self.req.source_ip = ip.into();
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.req.user_agent = ua.into();
        self
    }

    pub fn request_id(mut self, id: impl Into<String>) -> Self {
        self.req.request_id = id.into();
        self
    }

    pub fn build(self) -> Request {
        self.req
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_lookup_headers_case_insensitively() {
        let req = Request::builder().header("X-Trace-Id", "t-1").build();
        assert_eq!(req.header("x-trace-id"), Some("t-1"));
        assert_eq!(req.header("X-TRACE-ID"), Some("t-1"));
        assert_eq!(req.header_or_empty("x-app-id"), "");
    }

    #[test]
    fn test_should_replace_header_with_same_name() {
        let req = Request::builder()
            .header("Content-Type", "text/plain")
            .header("content-type", "application/json")
            .build();
        assert_eq!(req.headers().len(), 1);
        assert_eq!(req.header("content-type"), Some("application/json"));
    }

    #[test]
    fn test_should_default_raw_path_to_path() {
        let req = Request::builder().method("PUT").path("/items/a b").raw_path("/items/a%20b").build();
        assert_eq!(req.method(), "PUT");
        assert_eq!(req.path(), "/items/a b");
        assert_eq!(req.raw_path(), "/items/a%20b");
    }
}
