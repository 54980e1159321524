//! Gateway event envelope.
//!
//! The function runtime delivers each HTTP request as an API Gateway v2 style
//! JSON event and expects a JSON response envelope back. This module maps
//! both onto [`Request`] and [`Response`] and exposes the entry points a
//! runtime calls: [`Router::handle_event`] and [`Router::handle_json`].

use std::collections::HashMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::header;
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;

/// Inbound HTTP event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GatewayEvent {
    pub version: String,
    pub route_key: String,
    pub raw_path: String,
    pub raw_query_string: String,
    /// Request cookies. The gateway strips the `cookie` header and sends its
    /// pairs here instead.
    pub cookies: Vec<String>,
    pub headers: HashMap<String, String>,
    pub request_context: GatewayRequestContext,
    pub body: Option<String>,
    pub is_base64_encoded: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GatewayRequestContext {
    pub request_id: String,
    pub http: GatewayHttp,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GatewayHttp {
    pub method: String,
    pub path: String,
    pub protocol: String,
    pub source_ip: String,
    pub user_agent: String,
}

/// Outbound response envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayResponse {
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    /// One entry per `set-cookie` header.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cookies: Vec<String>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub is_base64_encoded: bool,
}

impl GatewayEvent {
    /// Splits the event into a body-less request and the decoded body.
    fn into_parts(self) -> (Request, Result<Bytes, Error>) {
        let body = match self.body {
            None => Ok(Bytes::new()),
            Some(body) if self.is_base64_encoded => STANDARD.decode(body.as_bytes())
                .map(Bytes::from)
                .map_err(|e| Error::bad_request(format!("malformed base64 body: {e}"))),
            Some(body) => Ok(Bytes::from(body)),
        };

        let http = self.request_context.http;
        let path = if http.path.is_empty() { self.raw_path.clone() } else { http.path };
        let mut builder = Request::builder()
            .method(http.method)
            .path(path)
            .raw_path(self.raw_path)
            .query(self.raw_query_string)
            .source_ip(http.source_ip)
            .user_agent(http.user_agent)
            .request_id(self.request_context.request_id);
        let mut cookie_header = None;
        for (name, value) in self.headers {
            if name.eq_ignore_ascii_case(header::COOKIE) {
                cookie_header = Some(value);
            } else {
                builder = builder.header(&name, value);
            }
        }
        let cookie = cookie_header.into_iter().chain(self.cookies)
            .filter(|c| !c.is_empty())
            .collect::<Vec<_>>()
            .join("; ");
        if !cookie.is_empty() {
            builder = builder.header(header::COOKIE, cookie);
        }
        (builder.build(), body)
    }
}

impl TryFrom<GatewayEvent> for Request {
    type Error = Error;

    fn try_from(event: GatewayEvent) -> Result<Self, Self::Error> {
        let (mut req, body) = event.into_parts();
        req.body = body?;
        Ok(req)
    }
}

impl From<Response> for GatewayResponse {
    fn from(res: Response) -> Self {
        let mut headers: HashMap<String, String> = HashMap::with_capacity(res.headers.len());
        let mut cookies = Vec::new();
        for (name, value) in res.headers {
            // Expires dates contain commas, so cookies cannot be comma-joined.
            if name.eq_ignore_ascii_case(header::SET_COOKIE) {
                cookies.push(value);
                continue;
            }
            headers.entry(name.to_ascii_lowercase())
                .and_modify(|existing| {
                    existing.push_str(", ");
                    existing.push_str(&value);
                })
                .or_insert(value);
        }

        let (body, is_base64_encoded) = match std::str::from_utf8(&res.body) {
            Ok(text) => (text.to_owned(), false),
            Err(_) => (STANDARD.encode(&res.body), true),
        };

        Self { status_code: res.status.as_u16(), headers, cookies, body, is_base64_encoded }
    }
}

impl Router {
    /// Dispatches one gateway event.
    pub async fn handle_event(&self, event: GatewayEvent) -> GatewayResponse {
        let (mut req, body) = event.into_parts();
        let response = match body {
            Ok(body) => {
                req.body = body;
                self.dispatch(req).await
            }
            Err(err) => crate::dispatch::reject(&req, &err),
        };
        response.into()
    }

    /// Dispatches one raw JSON event and returns the JSON response envelope.
    pub async fn handle_json(&self, payload: &[u8]) -> Result<Vec<u8>, Error> {
        let event: GatewayEvent = serde_json::from_slice(payload)
            .map_err(|e| Error::bad_request(format!("malformed event: {e}")))?;
        let response = self.handle_event(event).await;
        serde_json::to_vec(&response)
            .map_err(|e| Error::internal(format!("encode response: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use http::StatusCode;

    use super::*;

    fn event_json() -> &'static str {
        r#"{
            "version": "2.0",
            "routeKey": "$default",
            "rawPath": "/items/42",
            "rawQueryString": "expand=true",
            "headers": {"x-trace-id": "trace-9", "user-agent": "curl/8"},
            "requestContext": {
                "requestId": "req-1",
                "http": {
                    "method": "GET",
                    "path": "/items/42",
                    "protocol": "HTTP/1.1",
                    "sourceIp": "10.0.0.1",
                    "userAgent": "curl/8"
                }
            },
            "body": "aGVsbG8=",
            "isBase64Encoded": true
        }"#
    }

    #[test]
    fn test_should_convert_event_into_request() {
        let event: GatewayEvent = serde_json::from_str(event_json()).unwrap();
        let req = Request::try_from(event).unwrap();
        assert_eq!(req.method(), "GET");
        assert_eq!(req.path(), "/items/42");
        assert_eq!(req.raw_query(), "expand=true");
        assert_eq!(req.source_ip(), "10.0.0.1");
        assert_eq!(req.user_agent(), "curl/8");
        assert_eq!(req.request_id(), "req-1");
        assert_eq!(req.header("X-Trace-Id"), Some("trace-9"));
        assert_eq!(req.body(), b"hello");
    }

    #[test]
    fn test_should_reject_malformed_base64_body() {
        let event = GatewayEvent {
            body: Some("***".to_owned()),
            is_base64_encoded: true,
            ..GatewayEvent::default()
        };
        assert!(matches!(Request::try_from(event), Err(Error::BadRequest(_))));
    }

    #[test]
    fn test_should_encode_binary_response_body_as_base64() {
        let mut res = Response::builder().status(StatusCode::OK).no_body();
        res.body = Bytes::from_static(&[0xff, 0x00, 0xfe]);
        res.set_header(header::TRACE_ID, "t");

        let envelope = GatewayResponse::from(res);
        assert!(envelope.is_base64_encoded);
        assert_eq!(STANDARD.decode(&envelope.body).unwrap(), vec![0xff, 0x00, 0xfe]);
        assert_eq!(envelope.headers.get("x-trace-id").map(String::as_str), Some("t"));
    }

    #[test]
    fn test_should_fold_cookies_into_cookie_header() {
        let event: GatewayEvent = serde_json::from_value(serde_json::json!({
            "rawPath": "/",
            "cookies": ["session=abc", "theme=dark"],
            "requestContext": {"http": {"method": "GET", "path": "/"}}
        }))
        .unwrap();
        let req = Request::try_from(event).unwrap();
        assert_eq!(req.header("Cookie"), Some("session=abc; theme=dark"));
        assert_eq!(req.headers().iter().filter(|(k, _)| k == header::COOKIE).count(), 1);
    }

    #[test]
    fn test_should_keep_each_set_cookie_separate() {
        let res = Response::builder()
            .header("Set-Cookie", "a=1; Expires=Wed, 21 Oct 2026 07:28:00 GMT")
            .header(header::SET_COOKIE, "b=2")
            .header("vary", "origin")
            .text("ok");

        let envelope = GatewayResponse::from(res);
        assert_eq!(envelope.cookies, vec![
            "a=1; Expires=Wed, 21 Oct 2026 07:28:00 GMT".to_owned(),
            "b=2".to_owned(),
        ]);
        assert!(!envelope.headers.contains_key(header::SET_COOKIE));
        assert_eq!(envelope.headers.get("vary").map(String::as_str), Some("origin"));

        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["cookies"][1], "b=2");
    }

    #[tokio::test]
    async fn test_should_answer_malformed_body_with_traced_bad_request() {
        let router = Router::new();
        let event = GatewayEvent {
            body: Some("***".to_owned()),
            is_base64_encoded: true,
            headers: HashMap::from([("x-trace-id".to_owned(), "trace-bad".to_owned())]),
            ..GatewayEvent::default()
        };
        let res = router.handle_event(event).await;
        assert_eq!(res.status_code, 400);
        assert_eq!(res.headers.get("x-trace-id").map(String::as_str), Some("trace-bad"));
    }

    #[tokio::test]
    async fn test_should_handle_raw_json_events() {
        let router = Router::new();
        let out = router.handle_json(event_json().as_bytes()).await.unwrap();
        let res: GatewayResponse = serde_json::from_slice(&out).unwrap();
        assert_eq!(res.status_code, 404);
        assert_eq!(res.headers.get("x-trace-id").map(String::as_str), Some("trace-9"));

        assert!(matches!(router.handle_json(b"not json").await, Err(Error::BadRequest(_))));
    }
}
