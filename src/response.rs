//! Outgoing response type and the [`IntoResponse`] conversion trait.
//!
//! Build a [`Response`] in your handler and return it. The dispatcher owns the
//! rest: it renders errors, attaches the trace header and logs the outcome.

use bytes::Bytes;
use http::StatusCode;
use serde::Serialize;

use crate::error::Error;
use crate::header;

/// Body media types the builder can stamp as `content-type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Html,
    Json,
    OctetStream,
    Text,
    Xml,
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Html => "text/html; charset=utf-8",
            Self::Json => "application/json",
            Self::OctetStream => "application/octet-stream",
            Self::Text => "text/plain; charset=utf-8",
            Self::Xml => "application/xml",
        }
    }
}

/// An outgoing response.
///
/// Shortcuts:
///
/// ```rust
/// use gatekit::Response;
/// use http::StatusCode;
///
/// Response::json(br#"{"id":1}"#.to_vec());
/// Response::text("hello");
/// Response::status(StatusCode::NO_CONTENT);
/// ```
///
/// With a status or extra headers:
///
/// ```rust
/// use gatekit::{ContentType, Response};
/// use http::StatusCode;
///
/// Response::builder()
///     .status(StatusCode::CREATED)
///     .header("location", "/items/42")
///     .json(br#"{"id":42}"#.to_vec());
/// ```
#[derive(Debug, Clone)]
pub struct Response {
    pub(crate) status: StatusCode,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: Bytes,
}

/// Wire shape of an error body.
#[derive(Serialize)]
struct ErrorBody<'a> {
    code: u16,
    message: &'a str,
}

impl Response {
    /// `200 OK`, `application/json`.
    pub fn json(body: impl Into<Bytes>) -> Self {
        Self::builder().json(body)
    }

    /// `200 OK`, `text/plain; charset=utf-8`.
    pub fn text(body: impl Into<String>) -> Self {
        Self::builder().text(body)
    }

    /// Response with no body.
    pub fn status(code: StatusCode) -> Self {
        Self { status: code, headers: Vec::new(), body: Bytes::new() }
    }

    pub fn builder() -> ResponseBuilder {
        ResponseBuilder { headers: Vec::new(), status: StatusCode::OK }
    }

    /// Renders an [`Error`] as `{"code": …, "message": …}` under its status.
    pub fn error(err: &Error) -> Self {
        let status = err.status();
        let message = err.to_string();
        let body = serde_json::to_vec(&ErrorBody { code: status.as_u16(), message: &message })
            .unwrap_or_else(|_| message.clone().into_bytes());
        Self::builder().status(status).json(body)
    }

    pub fn status_code(&self) -> StatusCode { self.status }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find_map(|(k, v)| k.eq_ignore_ascii_case(name).then_some(v.as_str()))
    }

    /// Sets a header, dropping every existing value with the same name, so the
    /// header is present exactly once afterwards.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_owned(), value.into()));
    }

    /// Converts into an `http::Response` for the local host.
    pub(crate) fn into_http(self) -> http::Response<http_body_util::Full<Bytes>> {
        let mut res = http::Response::new(http_body_util::Full::new(self.body));
        *res.status_mut() = self.status;
        let headers = res.headers_mut();
        for (name, value) in self.headers {
            let (Ok(name), Ok(value)) = (
                http::HeaderName::try_from(name.as_str()),
                http::HeaderValue::try_from(value.as_str()),
            ) else {
                tracing::warn!(header = %name, "dropping invalid response header");
                continue;
            };
            headers.append(name, value);
        }
        res
    }
}

/// Builder returned by [`Response::builder`]. Starts at `200 OK`; one of the
/// body methods ends it.
#[derive(Debug)]
pub struct ResponseBuilder {
    status: StatusCode,
    headers: Vec<(String, String)>,
}

impl ResponseBuilder {
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code;
        self
    }

    /// Appends a header. Repeated names are kept in order.
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_owned(), value.into()));
        self
    }

    pub fn json(self, body: impl Into<Bytes>) -> Response {
        self.bytes(ContentType::Json, body)
    }

    pub fn text(self, body: impl Into<String>) -> Response {
        self.bytes(ContentType::Text, body.into())
    }

    pub fn bytes(self, content_type: ContentType, body: impl Into<Bytes>) -> Response {
        let mut headers = Vec::with_capacity(self.headers.len() + 1);
        headers.push((header::CONTENT_TYPE.to_owned(), content_type.as_str().to_owned()));
        headers.extend(self.headers);
        Response { status: self.status, headers, body: body.into() }
    }

    pub fn no_body(self) -> Response {
        Response { status: self.status, headers: self.headers, body: Bytes::new() }
    }
}

/// Anything a handler can hand back as a finished response.
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response {
        self
    }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response {
        Response::text(self)
    }
}

impl IntoResponse for String {
    fn into_response(self) -> Response {
        Response::text(self)
    }
}

impl IntoResponse for StatusCode {
    fn into_response(self) -> Response {
        Response::status(self)
    }
}

impl IntoResponse for (StatusCode, String) {
    fn into_response(self) -> Response {
        Response::builder().status(self.0).text(self.1)
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        Response::error(&self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_render_error_as_json_body() {
        let res = Response::error(&Error::not_found("endpoint not found: GET /x"));
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(res.header("Content-Type"), Some("application/json"));

        let body: serde_json::Value = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(body["code"], 404);
        assert_eq!(body["message"], "endpoint not found: GET /x");
    }

    #[test]
    fn test_should_set_header_exactly_once() {
        let mut res = Response::builder()
            .header("X-Trace-Id", "stale")
            .header("x-trace-id", "stale-again")
            .no_body();
        res.set_header("x-trace-id", "fresh");

        let count = res.headers().iter().filter(|(k, _)| k.eq_ignore_ascii_case("x-trace-id")).count();
        assert_eq!(count, 1);
        assert_eq!(res.header("x-trace-id"), Some("fresh"));
    }

    #[test]
    fn test_should_put_content_type_first() {
        let res = Response::builder()
            .status(StatusCode::CREATED)
            .header("location", "/items/1")
            .bytes(ContentType::Xml, b"<ok/>".to_vec());
        assert_eq!(res.headers()[0], ("content-type".to_owned(), "application/xml".to_owned()));
        assert_eq!(res.status_code(), StatusCode::CREATED);
    }

    #[test]
    fn test_should_convert_status_text_pairs() {
        let res = (StatusCode::ACCEPTED, "queued".to_owned()).into_response();
        assert_eq!(res.status_code(), StatusCode::ACCEPTED);
        assert_eq!(res.body(), b"queued");
    }

    #[test]
    fn test_should_convert_into_http_response() {
        let res = Response::text("hi").into_http();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()["content-type"], "text/plain; charset=utf-8");
    }
}
