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

//! Strips markup that could script the browser from request input

use crate::error::FrameworkResult;
use crate::http::{HttpException, ParsedBody, Request, Response, parsed_body};
use crate::middleware::{Middleware, Next};
use async_trait::async_trait;
use hyper::Method;
use hyper::Uri;
use hyper::body::Bytes;
use hyper::header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderValue};
use hyper::http::uri::PathAndQuery;
use serde_json::Value;
use tracing::debug;

/// Sanitizes query values and the parsed body with `ammonia` for GET, POST, PUT and PATCH
#[derive(Debug, Default)]
pub struct XssMiddleware;

impl XssMiddleware {
    pub fn new() -> Self {
        Self
    }

    fn applies_to(method: &Method) -> bool {
        matches!(*method, Method::GET | Method::POST | Method::PUT | Method::PATCH)
    }

    fn sanitize(&self, req: Request) -> Result<Request, String> {
        let (mut parts, body) = req.into_parts();

        if let Some(query) = parts.uri.query() {
            let cleaned = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(url::form_urlencoded::parse(query.as_bytes()).map(|(key, value)| (key.into_owned(), clean(&value))))
                .finish();
            let path_and_query = PathAndQuery::try_from(format!("{}?{}", parts.uri.path(), cleaned)).map_err(|e| e.to_string())?;
            let mut uri = parts.uri.clone().into_parts();
            uri.path_and_query = Some(path_and_query);
            parts.uri = Uri::from_parts(uri).map_err(|e| e.to_string())?;
        }

        let mut req = Request::from_parts(parts, body);
        let Some(value) = parsed_body(&req).map_err(|e| e.to_string())? else {
            return Ok(req);
        };

        let cleaned = clean_value(value);
        let is_json = req.headers().get(CONTENT_TYPE).and_then(|v| v.to_str().ok()).is_some_and(|v| v.contains("json"));
        let bytes = if is_json {
            serde_json::to_vec(&cleaned).map_err(|e| e.to_string())?
        } else {
            encode_form(&cleaned).into_bytes()
        };

        req.headers_mut().insert(CONTENT_LENGTH, HeaderValue::from(bytes.len()));
        *req.body_mut() = Bytes::from(bytes);
        req.extensions_mut().insert(ParsedBody(cleaned));
        Ok(req)
    }
}

#[async_trait]
impl Middleware for XssMiddleware {
    async fn process(&self, req: Request, next: Next<'_>) -> FrameworkResult<Response> {
        if !Self::applies_to(req.method()) {
            return next.run(req).await;
        }

        let req = self.sanitize(req).map_err(|reason| {
            debug!("Rejecting request input: {}", reason);
            HttpException::bad_request("The request input could not be sanitized.")
        })?;
        next.run(req).await
    }
}

fn clean(value: &str) -> String {
    if value.contains('<') { ammonia::clean(value) } else { value.to_string() }
}

fn clean_value(value: Value) -> Value {
    match value {
        Value::String(text) => Value::String(clean(&text)),
        Value::Array(items) => Value::Array(items.into_iter().map(clean_value).collect()),
        Value::Object(map) => Value::Object(map.into_iter().map(|(key, value)| (key, clean_value(value))).collect()),
        other => other,
    }
}

fn encode_form(value: &Value) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    if let Value::Object(map) = value {
        for (key, value) in map {
            match value {
                Value::String(text) => serializer.append_pair(key, text),
                other => serializer.append_pair(key, &other.to_string()),
            };
        }
    }
    serializer.finish()
}
