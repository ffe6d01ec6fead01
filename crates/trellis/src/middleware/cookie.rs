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

//! Queued cookies become `Set-Cookie` headers

use crate::application::Application;
use crate::cookie::CookieQueue;
use crate::error::FrameworkResult;
use crate::http::{Request, Response};
use crate::middleware::{Middleware, Next};
use async_trait::async_trait;
use hyper::header::{HeaderValue, SET_COOKIE};
use tracing::warn;

/// Installs a [`CookieQueue`] on the request and writes its cookies to the response
#[derive(Debug, Default)]
pub struct CookieMiddleware;

impl CookieMiddleware {
    pub fn new() -> Self {
        Self
    }

    pub fn from_app(_app: &Application) -> FrameworkResult<Self> {
        Ok(Self)
    }
}

#[async_trait]
impl Middleware for CookieMiddleware {
    async fn process(&self, mut req: Request, next: Next<'_>) -> FrameworkResult<Response> {
        let queue = req.extensions().get::<CookieQueue>().cloned().unwrap_or_default();
        req.extensions_mut().insert(queue.clone());

        let mut response = next.run(req).await?;
        for cookie in queue.drain() {
            match HeaderValue::from_str(&cookie.encoded().to_string()) {
                Ok(value) => {
                    response.headers_mut().append(SET_COOKIE, value);
                }
                Err(_) => warn!("Dropping cookie '{}' with an invalid header value", cookie.name()),
            }
        }
        Ok(response)
    }
}
