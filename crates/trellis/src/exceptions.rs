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

//! Error reporting and rendering

use crate::error::FrameworkError;
use crate::http::status::reason_phrase;
use crate::http::{RequestInfo, Response};
use crate::view::View;
use http_body_util::Full;
use hyper::StatusCode;
use hyper::body::Bytes;
use hyper::header::{ALLOW, CACHE_CONTROL, CONTENT_TYPE, HeaderValue};
use serde::Serialize;
use serde_json::json;
use std::error::Error as _;
use std::sync::Arc;
use tera::{Context, Tera};
use tracing::{debug, error};

const ERROR_PAGE: &str = include_str!("../resources/templates/error.html");
const DEBUG_PAGE: &str = include_str!("../resources/templates/debug.html");

/// Reports and renders errors that escape the kernels
#[cfg_attr(test, mockall::automock)]
pub trait ExceptionHandler: Send + Sync {
    fn report(&self, error: &FrameworkError);

    fn render(&self, request: &RequestInfo, error: &FrameworkError) -> Response;

    fn render_console(&self, error: &FrameworkError) -> String;
}

/// `{"error":{"status":<code>,"message":<text>}}`, fields in that order
#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    error: ErrorBody<'a>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    status: u16,
    message: &'a str,
}

/// The framework's exception handler
pub struct Handler {
    debug: bool,
    environment: String,
    view: Option<Arc<View>>,
}

impl Handler {
    pub fn new(debug: bool) -> Self {
        Self {
            debug,
            environment: "production".to_string(),
            view: None,
        }
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    /// Views consulted for `errors/<status>.html`
    pub fn with_view(mut self, view: Arc<View>) -> Self {
        self.view = Some(view);
        self
    }

    /// Message shown to the client: HTTP exception messages, else the reason phrase
    fn public_message(error: &FrameworkError, status: StatusCode) -> String {
        match error {
            FrameworkError::Http(exception) => exception.message().to_string(),
            _ => reason(status).to_string(),
        }
    }

    fn render_json(status: StatusCode, message: &str) -> Response {
        let envelope = ErrorEnvelope {
            error: ErrorBody {
                status: status.as_u16(),
                message,
            },
        };
        match serde_json::to_string(&envelope) {
            Ok(body) => respond(status, "application/json", body),
            Err(e) => {
                error!("Failed to serialize error envelope: {}", e);
                respond(status, "application/json", String::new())
            }
        }
    }

    fn render_debug(&self, request: &RequestInfo, error: &FrameworkError, status: StatusCode) -> Option<String> {
        let headers: serde_json::Map<String, serde_json::Value> = request
            .headers
            .iter()
            .map(|(name, value)| (name.to_string(), json!(value.to_str().unwrap_or("<binary>"))))
            .collect();

        let mut context = Context::new();
        context.insert("status", &status.as_u16());
        context.insert("reason", reason(status));
        context.insert("message", &error.to_string());
        context.insert("chain", &chain(error));
        context.insert("request", &json!({"method": request.method.as_str(), "uri": request.uri.to_string(), "headers": headers}));
        context.insert("environment", &self.environment);
        context.insert("version", env!("CARGO_PKG_VERSION"));

        Tera::one_off(DEBUG_PAGE, &context, true).map_err(|e| error!("Failed to render debug page: {}", e)).ok()
    }

    fn render_view(&self, status: StatusCode, message: &str) -> Option<String> {
        let mut context = Context::new();
        context.insert("status", &status.as_u16());
        context.insert("reason", reason(status));
        context.insert("message", message);

        let template = format!("errors/{}.html", status.as_u16());
        if let Some(view) = self.view.as_ref().filter(|view| view.exists(&template)) {
            match view.render(&template, &context) {
                Ok(html) => return Some(html),
                Err(e) => error!("Failed to render {}: {}", template, e),
            }
        }

        Tera::one_off(ERROR_PAGE, &context, true).map_err(|e| error!("Failed to render error page: {}", e)).ok()
    }
}

impl ExceptionHandler for Handler {
    fn report(&self, error: &FrameworkError) {
        if let FrameworkError::Custom(custom) = error {
            if custom.report() {
                return;
            }
        }

        let status = error.status_code();
        if status.is_server_error() {
            error!(status = status.as_u16(), chain = ?chain(error), "{}", error);
        } else {
            debug!(status = status.as_u16(), "{}", error);
        }
    }

    fn render(&self, request: &RequestInfo, error: &FrameworkError) -> Response {
        if let FrameworkError::Custom(custom) = error {
            if let Some(response) = custom.render(request) {
                return response;
            }
        }

        let status = error.status_code();
        let message = Self::public_message(error, status);

        let mut response = if request.wants_json() {
            Self::render_json(status, &message)
        } else {
            let html = if self.debug { self.render_debug(request, error, status) } else { None };
            let html = html.or_else(|| self.render_view(status, &message)).unwrap_or_else(|| format!("{} {}", status.as_u16(), message));
            respond(status, "text/html; charset=utf-8", html)
        };

        match error {
            FrameworkError::Http(exception) => {
                for (name, value) in exception.headers() {
                    response.headers_mut().insert(name, value.clone());
                }
            }
            FrameworkError::MethodNotAllowed { allowed, .. } => {
                let allow = allowed.iter().map(|m| m.as_str()).collect::<Vec<_>>().join(", ");
                if let Ok(value) = HeaderValue::from_str(&allow) {
                    response.headers_mut().insert(ALLOW, value);
                }
            }
            _ => {}
        }
        response
    }

    fn render_console(&self, error: &FrameworkError) -> String {
        let mut output = format!("\n  [ERROR] {}\n", error);
        let causes = chain(error);
        for cause in causes.iter().skip(1) {
            output.push_str(&format!("    caused by: {}\n", cause));
        }
        if self.debug {
            output.push_str(&format!("\n  {:?}\n", error));
        }
        output
    }
}

/// Last-resort conversion used when no exception handler is available
impl From<FrameworkError> for Response {
    fn from(error: FrameworkError) -> Self {
        let handler = Handler::new(false);
        handler.report(&error);

        let mut request = RequestInfo::default();
        request.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        handler.render(&request, &error)
    }
}

fn reason(status: StatusCode) -> &'static str {
    reason_phrase(status.as_u16()).or(status.canonical_reason()).unwrap_or("Unknown Status")
}

/// The error followed by its sources
fn chain(error: &FrameworkError) -> Vec<String> {
    let mut chain = vec![error.to_string()];
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if chain.last() != Some(&text) {
            chain.push(text);
        }
        source = cause.source();
    }
    chain
}

fn respond(status: StatusCode, content_type: &'static str, body: String) -> Response {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response.headers_mut().insert(CACHE_CONTROL, HeaderValue::from_static("no-cache, private"));
    response
}
