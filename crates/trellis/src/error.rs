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

//! Error handling for the framework

use crate::http::{HttpException, RequestInfo, Response};
use hyper::{Method, StatusCode};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Application errors that decide for themselves how they are reported and rendered.
///
/// Wrap them with [`FrameworkError::custom`]. The exception handler asks these hooks
/// first and only falls back to its own behavior when they decline.
pub trait ReportableError: std::error::Error + Send + Sync + 'static {
    /// Report the error. Returning `true` marks it as handled and skips default logging.
    fn report(&self) -> bool {
        false
    }

    /// Render the error into a response, or `None` to use the default rendering.
    fn render(&self, _request: &RequestInfo) -> Option<Response> {
        None
    }

    /// Status code used when the default rendering applies
    fn status_code(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// Framework error types
#[derive(Error, Debug)]
pub enum FrameworkError {
    #[error("{message}")]
    Framework { message: String },

    #[error("Environment file not found: {}", .0.display())]
    MissingEnvFile(PathBuf),

    #[error("Invalid encryption key: {message}")]
    InvalidKey { message: String },

    #[error("Encryption failed: {message}")]
    Encryption { message: String },

    #[error("The payload is invalid")]
    InvalidPayload,

    #[error("Stub error: {message}")]
    Stub { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Unknown {kind} '{name}'")]
    UnknownComponent { kind: &'static str, name: String },

    #[error("No container binding for {0}")]
    BindingNotFound(&'static str),

    #[error(transparent)]
    Http(#[from] HttpException),

    #[error("Route not found: {method} {path}")]
    NotFound { method: Method, path: String },

    #[error("Method {method} not allowed for {path}")]
    MethodNotAllowed { method: Method, path: String, allowed: Vec<Method> },

    #[error("Router error: {0}")]
    Routing(String),

    #[error("{0}")]
    Custom(Arc<dyn ReportableError>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serde JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Template error: {0}")]
    Template(#[from] tera::Error),

    #[error("Hyper error: {0}")]
    Hyper(#[from] hyper::Error),

    #[error("HTTP error: {0}")]
    HttpBuild(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FrameworkError {
    /// Internal misconfiguration
    pub fn framework(message: impl Into<String>) -> Self {
        FrameworkError::Framework { message: message.into() }
    }

    pub fn config(message: impl Into<String>) -> Self {
        FrameworkError::Config { message: message.into() }
    }

    pub fn stub(message: impl Into<String>) -> Self {
        FrameworkError::Stub { message: message.into() }
    }

    /// Wrap an application error carrying its own report/render hooks
    pub fn custom<E: ReportableError>(error: E) -> Self {
        FrameworkError::Custom(Arc::new(error))
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            FrameworkError::Http(exception) => exception.status(),
            FrameworkError::NotFound { .. } => StatusCode::NOT_FOUND,
            FrameworkError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            FrameworkError::Custom(error) => error.status_code(),
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the error describes a client mistake rather than a server fault
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

/// Result type for framework operations
pub type FrameworkResult<T> = Result<T, FrameworkError>;

impl From<hyper::http::Error> for FrameworkError {
    fn from(err: hyper::http::Error) -> Self {
        FrameworkError::HttpBuild(err.to_string())
    }
}

impl From<matchit::InsertError> for FrameworkError {
    fn from(err: matchit::InsertError) -> Self {
        FrameworkError::Routing(err.to_string())
    }
}
