//! Terminal response builder used by route handlers.
//!
//! A handler produces exactly one [`Reply`] per request: either through the
//! prepare gate (not-found, exists) or from `handle`. Bodies are the raw
//! resource JSON, not an envelope; errors carry the envelope via `AppError`.

use axum::{
    http::{header::HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;

#[derive(Debug)]
pub struct Reply {
    status: StatusCode,
    headers: Vec<(HeaderName, HeaderValue)>,
    body: Option<Value>,
}

impl Reply {
    /// 200 with an optional JSON body.
    pub fn ok(body: Option<Value>) -> Self {
        Reply {
            status: StatusCode::OK,
            headers: Vec::new(),
            body,
        }
    }

    /// 404 with an empty body.
    pub fn not_found() -> Self {
        Reply {
            status: StatusCode::NOT_FOUND,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.push((name, value));
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn header(&self, name: &HeaderName) -> Option<&HeaderValue> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        let mut resp = match self.body {
            Some(body) => (self.status, Json(body)).into_response(),
            None => self.status.into_response(),
        };
        for (name, value) in self.headers {
            resp.headers_mut().insert(name, value);
        }
        resp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::LOCATION;
    use serde_json::json;

    #[test]
    fn ok_defaults_to_200() {
        let r = Reply::ok(Some(json!({"id": 1})));
        assert_eq!(r.status(), StatusCode::OK);
        assert_eq!(r.body(), Some(&json!({"id": 1})));
    }

    #[test]
    fn builder_chain_overrides_status_and_adds_headers() {
        let r = Reply::ok(None)
            .with_status(StatusCode::CREATED)
            .with_header(LOCATION, HeaderValue::from_static("/api/users/1"))
            .with_body(json!({"id": 1}));
        assert_eq!(r.status(), StatusCode::CREATED);
        assert_eq!(
            r.header(&LOCATION),
            Some(&HeaderValue::from_static("/api/users/1"))
        );
        assert_eq!(r.body(), Some(&json!({"id": 1})));
    }

    #[test]
    fn not_found_has_empty_body() {
        let r = Reply::not_found();
        assert_eq!(r.status(), StatusCode::NOT_FOUND);
        assert!(r.body().is_none());
    }
}
