// Trellis
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Convenience response builders

use crate::error::FrameworkResult;
use crate::http::Response;
use http_body_util::Full;
use hyper::StatusCode;
use hyper::body::Bytes;
use hyper::header::{CONTENT_TYPE, LOCATION};
use serde::Serialize;

/// Conversion into a finished response
pub trait IntoResponse {
    fn into_response(self) -> FrameworkResult<Response>;
}

impl IntoResponse for Response {
    fn into_response(self) -> FrameworkResult<Response> {
        Ok(self)
    }
}

fn build(status: StatusCode, content_type: Option<&str>, headers: Vec<(String, String)>, body: Bytes) -> FrameworkResult<Response> {
    let mut builder = hyper::Response::builder().status(status);
    if let Some(content_type) = content_type {
        builder = builder.header(CONTENT_TYPE, content_type);
    }
    for (name, value) in headers {
        builder = builder.header(name, value);
    }
    Ok(builder.body(Full::new(body))?)
}

macro_rules! builder_methods {
    () => {
        pub fn with_status(mut self, status: StatusCode) -> Self {
            self.status = status;
            self
        }

        pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
            self.headers.push((name.into(), value.into()));
            self
        }
    };
}

/// `application/json` response
#[derive(Debug)]
pub struct JsonResponse {
    body: Vec<u8>,
    status: StatusCode,
    headers: Vec<(String, String)>,
}

impl JsonResponse {
    pub fn new<T: Serialize + ?Sized>(data: &T) -> FrameworkResult<Self> {
        Ok(Self {
            body: serde_json::to_vec(data)?,
            status: StatusCode::OK,
            headers: Vec::new(),
        })
    }

    builder_methods!();
}

impl IntoResponse for JsonResponse {
    fn into_response(self) -> FrameworkResult<Response> {
        build(self.status, Some("application/json"), self.headers, Bytes::from(self.body))
    }
}

/// `text/html` response
#[derive(Debug)]
pub struct HtmlResponse {
    body: String,
    status: StatusCode,
    headers: Vec<(String, String)>,
}

impl HtmlResponse {
    pub fn new(html: impl Into<String>) -> Self {
        Self {
            body: html.into(),
            status: StatusCode::OK,
            headers: Vec::new(),
        }
    }

    builder_methods!();
}

impl IntoResponse for HtmlResponse {
    fn into_response(self) -> FrameworkResult<Response> {
        build(self.status, Some("text/html; charset=utf-8"), self.headers, Bytes::from(self.body))
    }
}

/// `application/xml` response
#[derive(Debug)]
pub struct XmlResponse {
    body: String,
    status: StatusCode,
    headers: Vec<(String, String)>,
}

impl XmlResponse {
    pub fn new(xml: impl Into<String>) -> Self {
        Self {
            body: xml.into(),
            status: StatusCode::OK,
            headers: Vec::new(),
        }
    }

    builder_methods!();
}

impl IntoResponse for XmlResponse {
    fn into_response(self) -> FrameworkResult<Response> {
        build(self.status, Some("application/xml; charset=utf-8"), self.headers, Bytes::from(self.body))
    }
}

/// Redirect with a `Location` header, `302 Found` unless changed
#[derive(Debug)]
pub struct RedirectResponse {
    location: String,
    status: StatusCode,
    headers: Vec<(String, String)>,
}

impl RedirectResponse {
    pub fn to(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            status: StatusCode::FOUND,
            headers: Vec::new(),
        }
    }

    pub fn permanent(self) -> Self {
        self.with_status(StatusCode::MOVED_PERMANENTLY)
    }

    builder_methods!();
}

impl IntoResponse for RedirectResponse {
    fn into_response(self) -> FrameworkResult<Response> {
        let mut headers = self.headers;
        headers.push((LOCATION.as_str().to_string(), self.location));
        build(self.status, None, headers, Bytes::new())
    }
}

/// Body-less response, `204 No Content` unless changed
#[derive(Debug)]
pub struct EmptyResponse {
    status: StatusCode,
    headers: Vec<(String, String)>,
}

impl EmptyResponse {
    pub fn new() -> Self {
        Self {
            status: StatusCode::NO_CONTENT,
            headers: Vec::new(),
        }
    }

    builder_methods!();
}

impl Default for EmptyResponse {
    fn default() -> Self {
        Self::new()
    }
}

impl IntoResponse for EmptyResponse {
    fn into_response(self) -> FrameworkResult<Response> {
        build(self.status, None, self.headers, Bytes::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_text(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_json_response() {
        let response = JsonResponse::new(&serde_json::json!({"ok": true})).unwrap().with_status(StatusCode::CREATED).into_response().unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(body_text(response).await, r#"{"ok":true}"#);
    }

    #[tokio::test]
    async fn test_html_and_xml_responses() {
        let html = HtmlResponse::new("<p>hi</p>").with_header("X-Frame-Options", "DENY").into_response().unwrap();
        assert_eq!(html.headers()[CONTENT_TYPE], "text/html; charset=utf-8");
        assert_eq!(html.headers()["x-frame-options"], "DENY");
        assert_eq!(body_text(html).await, "<p>hi</p>");

        let xml = XmlResponse::new("<a/>").into_response().unwrap();
        assert_eq!(xml.headers()[CONTENT_TYPE], "application/xml; charset=utf-8");
    }

    #[test]
    fn test_redirect_and_empty() {
        let redirect = RedirectResponse::to("/login").into_response().unwrap();
        assert_eq!(redirect.status(), StatusCode::FOUND);
        assert_eq!(redirect.headers()[LOCATION], "/login");

        let permanent = RedirectResponse::to("/new").permanent().into_response().unwrap();
        assert_eq!(permanent.status(), StatusCode::MOVED_PERMANENTLY);

        let empty = EmptyResponse::new().into_response().unwrap();
        assert_eq!(empty.status(), StatusCode::NO_CONTENT);
    }

    #[test]
    fn test_invalid_header_is_an_error() {
        assert!(HtmlResponse::new("x").with_header("bad header", "v").into_response().is_err());
    }
}
