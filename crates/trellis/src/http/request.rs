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

//! Request helpers: snapshots, route parameters, parsed bodies and cookies

use crate::error::FrameworkResult;
use crate::http::{HttpException, Request};
use cookie::Cookie;
use hyper::header::{CONTENT_TYPE, COOKIE};
use hyper::{HeaderMap, Method, Uri};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Snapshot of the parts of a request the exception handler and the container need
#[derive(Debug, Clone)]
pub struct RequestInfo {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
}

impl RequestInfo {
    pub fn from_request(req: &Request) -> Self {
        Self {
            method: req.method().clone(),
            uri: req.uri().clone(),
            headers: req.headers().clone(),
        }
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    /// Plain equality check on the `Content-Type` header, not content negotiation
    pub fn wants_json(&self) -> bool {
        self.content_type() == Some("application/json")
    }
}

impl Default for RequestInfo {
    fn default() -> Self {
        Self {
            method: Method::GET,
            uri: Uri::from_static("/"),
            headers: HeaderMap::new(),
        }
    }
}

/// Parameters captured by the matched route pattern
#[derive(Debug, Clone, Default)]
pub struct RouteParams(pub HashMap<String, String>);

impl RouteParams {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }
}

/// Parsed request body, stored as a request extension once decoded
#[derive(Debug, Clone)]
pub struct ParsedBody(pub Value);

/// Decode the request body as JSON or form data depending on `Content-Type`.
///
/// A body already parsed (and possibly sanitized) by middleware takes precedence.
pub fn parsed_body(req: &Request) -> FrameworkResult<Option<Value>> {
    if let Some(ParsedBody(value)) = req.extensions().get::<ParsedBody>() {
        return Ok(Some(value.clone()));
    }

    let content_type = req.headers().get(CONTENT_TYPE).and_then(|v| v.to_str().ok()).unwrap_or("");
    let Ok(mime) = content_type.parse::<mime::Mime>() else {
        return Ok(None);
    };
    let body = req.body();

    if mime.type_() != mime::APPLICATION {
        return Ok(None);
    }

    if mime.subtype() == mime::JSON {
        if body.is_empty() {
            return Ok(None);
        }
        let value = serde_json::from_slice(body).map_err(|e| HttpException::bad_request(format!("Malformed JSON body: {}", e)))?;
        Ok(Some(value))
    } else if mime.subtype() == mime::WWW_FORM_URLENCODED {
        Ok(Some(parse_form(body)))
    } else {
        Ok(None)
    }
}

/// Parse `application/x-www-form-urlencoded` data into a JSON object
pub(crate) fn parse_form(body: &[u8]) -> Value {
    let mut map = Map::new();
    for (key, value) in url::form_urlencoded::parse(body) {
        map.insert(key.into_owned(), Value::String(value.into_owned()));
    }
    Value::Object(map)
}

/// Parse query parameters from a request URI
pub fn query_params(req: &Request) -> HashMap<String, String> {
    req.uri()
        .query()
        .map(|query| url::form_urlencoded::parse(query.as_bytes()).into_owned().collect())
        .unwrap_or_default()
}

/// Look up an input value in the parsed body first, then in the query string
pub fn input(req: &Request, key: &str) -> Option<String> {
    if let Ok(Some(Value::Object(map))) = parsed_body(req) {
        match map.get(key) {
            Some(Value::String(s)) => return Some(s.clone()),
            Some(Value::Null) | None => {}
            Some(other) => return Some(other.to_string()),
        }
    }
    query_params(req).remove(key)
}

/// Value of the named cookie from the `Cookie` request headers
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| Cookie::split_parse_encoded(value.to_string()))
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::body::Bytes;

    fn request(content_type: &str, body: &'static str) -> Request {
        hyper::Request::builder()
            .method(Method::POST)
            .uri("/submit?page=2&name=query")
            .header(CONTENT_TYPE, content_type)
            .header(COOKIE, "theme=dark; session=abc")
            .body(Bytes::from_static(body.as_bytes()))
            .unwrap()
    }

    #[test]
    fn test_json_body() {
        let req = request("application/json", r#"{"name":"body","count":3}"#);
        let body = parsed_body(&req).unwrap().unwrap();
        assert_eq!(body["name"], "body");
        assert_eq!(input(&req, "name").as_deref(), Some("body"));
        assert_eq!(input(&req, "count").as_deref(), Some("3"));
        assert_eq!(input(&req, "page").as_deref(), Some("2"));
    }

    #[test]
    fn test_form_body_with_charset() {
        let req = request("application/x-www-form-urlencoded; charset=utf-8", "_token=abc&title=Hello+World");
        assert_eq!(input(&req, "_token").as_deref(), Some("abc"));
        assert_eq!(input(&req, "title").as_deref(), Some("Hello World"));
    }

    #[test]
    fn test_malformed_json_is_bad_request() {
        let req = request("application/json", "{not json");
        let err = parsed_body(&req).unwrap_err();
        assert_eq!(err.status_code(), hyper::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_cookie_value() {
        let req = request("text/plain", "");
        assert_eq!(cookie_value(req.headers(), "session").as_deref(), Some("abc"));
        assert_eq!(cookie_value(req.headers(), "missing"), None);
    }

    #[test]
    fn test_wants_json_is_exact_match() {
        let mut info = RequestInfo::from_request(&request("application/json", ""));
        assert!(info.wants_json());
        info.headers.insert(CONTENT_TYPE, "application/json; charset=utf-8".parse().unwrap());
        assert!(!info.wants_json());
    }
}
