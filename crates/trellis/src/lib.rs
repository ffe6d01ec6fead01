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

//! Trellis web application framework
//!
//! This crate provides the application container, the HTTP and console kernels,
//! configuration loading, routing with a middleware pipeline, sessions, cookies,
//! encryption, events, views and the exception handler that renders every error
//! escaping a kernel.

pub mod application;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod console;
pub mod container;
pub mod cookie;
pub mod encryption;
pub mod env;
pub mod error;
pub mod events;
pub mod exceptions;
pub mod http;
pub mod kernel;
pub mod logging;
pub mod middleware;
pub mod providers;
pub mod registry;
pub mod routing;
pub mod server;
pub mod session;
pub mod testing;
pub mod view;

pub use application::{Application, ApplicationBuilder, Environment};
pub use error::{FrameworkError, FrameworkResult};
pub use kernel::{ConsoleKernel, HttpKernel};
