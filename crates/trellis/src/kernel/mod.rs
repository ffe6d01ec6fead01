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

//! HTTP and console entry points

pub mod console;
pub mod http;

use crate::application::Application;
use crate::error::FrameworkError;
use crate::exceptions::{ExceptionHandler, Handler};
use std::sync::Arc;

pub use console::ConsoleKernel;
pub use http::HttpKernel;

/// The bound exception handler, or a production handler when bootstrap never got that far
fn exception_handler(app: &Application) -> Arc<dyn ExceptionHandler> {
    match app.container().get::<Arc<dyn ExceptionHandler>>() {
        Ok(handler) => (*handler).clone(),
        Err(_) => Arc::new(Handler::new(false).with_environment(app.environment().to_string())),
    }
}

fn report(app: &Application, error: &FrameworkError) -> Arc<dyn ExceptionHandler> {
    let handler = exception_handler(app);
    handler.report(error);
    handler
}
