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

//! Middleware pipeline and the framework's request middleware

pub mod cookie;
pub mod csrf;
pub mod session;
pub mod xss;

use crate::error::FrameworkResult;
use crate::http::{Request, Response};
use crate::routing::Handler;
use async_trait::async_trait;
use std::sync::Arc;

pub use cookie::CookieMiddleware;
pub use csrf::CsrfMiddleware;
pub use session::SessionMiddleware;
pub use xss::XssMiddleware;

/// Request middleware. Call `next.run(req)` to continue the chain or return early.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn process(&self, req: Request, next: Next<'_>) -> FrameworkResult<Response>;
}

/// Remainder of a middleware chain followed by its endpoint
pub struct Next<'a> {
    middleware: &'a [Arc<dyn Middleware>],
    endpoint: &'a dyn Handler,
}

impl<'a> Next<'a> {
    pub fn new(middleware: &'a [Arc<dyn Middleware>], endpoint: &'a dyn Handler) -> Self {
        Self { middleware, endpoint }
    }

    pub async fn run(self, req: Request) -> FrameworkResult<Response> {
        match self.middleware.split_first() {
            Some((current, rest)) => current.process(req, Next::new(rest, self.endpoint)).await,
            None => self.endpoint.call(req).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HtmlResponse, HttpException, IntoResponse};
    use hyper::StatusCode;

    struct Tag(&'static str);

    #[async_trait]
    impl Middleware for Tag {
        async fn process(&self, req: Request, next: Next<'_>) -> FrameworkResult<Response> {
            let mut response = next.run(req).await?;
            let trail = response.headers().get("x-trail").and_then(|v| v.to_str().ok()).unwrap_or("").to_string();
            response.headers_mut().insert("x-trail", format!("{}{}", trail, self.0).parse().unwrap());
            Ok(response)
        }
    }

    struct Deny;

    #[async_trait]
    impl Middleware for Deny {
        async fn process(&self, _req: Request, _next: Next<'_>) -> FrameworkResult<Response> {
            Err(HttpException::forbidden("denied").into())
        }
    }

    fn request() -> Request {
        hyper::Request::builder().uri("/").body(Default::default()).unwrap()
    }

    #[tokio::test]
    async fn test_outermost_runs_first() {
        let chain: Vec<Arc<dyn Middleware>> = vec![Arc::new(Tag("a")), Arc::new(Tag("b"))];
        let endpoint = |_req: Request| async { HtmlResponse::new("ok").into_response() };

        let response = Next::new(&chain, &endpoint).run(request()).await.unwrap();
        // Inner middleware touches the response first
        assert_eq!(response.headers()["x-trail"], "ba");
    }

    #[tokio::test]
    async fn test_short_circuit() {
        let chain: Vec<Arc<dyn Middleware>> = vec![Arc::new(Tag("a")), Arc::new(Deny)];
        let endpoint = |_req: Request| async { HtmlResponse::new("unreachable").into_response() };

        let err = Next::new(&chain, &endpoint).run(request()).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }
}
