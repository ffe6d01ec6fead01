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

//! Turns requests into responses

use crate::application::{Application, MAINTENANCE_FILE};
use crate::error::FrameworkResult;
use crate::http::{HtmlResponse, IntoResponse, Request, RequestInfo, Response};
use crate::kernel::report;
use crate::providers::{BootProvider, default_boot_providers};
use crate::routing::Router;
use hyper::StatusCode;
use std::sync::Arc;
use tracing::debug;

/// Bootstraps the application on first use and dispatches every request through the router.
///
/// Errors never escape `handle`: they are reported and rendered by the exception handler.
pub struct HttpKernel {
    app: Arc<Application>,
    providers: Vec<Box<dyn BootProvider>>,
}

impl HttpKernel {
    pub fn new(app: Arc<Application>) -> Self {
        Self::with_providers(app, default_boot_providers())
    }

    pub fn with_providers(app: Arc<Application>, providers: Vec<Box<dyn BootProvider>>) -> Self {
        Self { app, providers }
    }

    pub fn application(&self) -> &Arc<Application> {
        &self.app
    }

    pub fn bootstrap(&self) -> FrameworkResult<()> {
        self.app.bootstrap_with(&self.providers)
    }

    pub async fn handle(&self, req: Request) -> Response {
        let info = RequestInfo::from_request(&req);
        self.app.container().instance(info.clone());

        match self.process(req).await {
            Ok(response) => response,
            Err(error) => report(&self.app, &error).render(&info, &error),
        }
    }

    async fn process(&self, mut req: Request) -> FrameworkResult<Response> {
        self.bootstrap()?;

        if self.app.is_down() {
            debug!("Maintenance mode, answering {} {} with 503", req.method(), req.uri().path());
            let page = tokio::fs::read_to_string(self.app.public_path(MAINTENANCE_FILE)).await?;
            return HtmlResponse::new(page).with_status(StatusCode::SERVICE_UNAVAILABLE).into_response();
        }

        req.extensions_mut().insert(self.app.clone());
        let router = self.app.container().get::<Router>()?;
        router.dispatch(&self.app, req).await
    }
}
