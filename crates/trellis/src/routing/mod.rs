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

//! Routing: handlers, controllers and the router

pub mod route;
pub mod router;

use crate::error::FrameworkResult;
use crate::http::{Request, Response};
use async_trait::async_trait;
use std::future::Future;

pub use route::{GroupAttributes, Route, RouteInfo};
pub use router::{ROUTE_MANIFEST, Router};

/// Endpoint invoked for a matched route
#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, req: Request) -> FrameworkResult<Response>;
}

#[async_trait]
impl<F, Fut> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = FrameworkResult<Response>> + Send + 'static,
{
    async fn call(&self, req: Request) -> FrameworkResult<Response> {
        (self)(req).await
    }
}

/// A set of routes registered by name through `app.routing.controllers`
pub trait Controller: Send + Sync {
    fn routes(&self, router: &mut Router) -> FrameworkResult<()>;
}
