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

//! Service providers
//!
//! Boot providers prepare the application itself (environment, config, router, services)
//! and run once, in a fixed order. Service providers are the named, configurable units
//! that bind services into the container.

pub mod boot;
pub mod framework;

use crate::application::Application;
use crate::error::FrameworkResult;

pub use boot::{ConfigBootProvider, EnvironmentBootProvider, RegisterServicesBootProvider, RouterBootProvider};

/// Binds services into the container.
///
/// `register` runs for every provider before any `boot`, so `boot` may resolve services
/// registered by other providers.
pub trait ServiceProvider: Send + Sync {
    fn register(&self, app: &Application) -> FrameworkResult<()>;

    fn boot(&self, _app: &Application) -> FrameworkResult<()> {
        Ok(())
    }
}

/// A step of the application bootstrap
pub trait BootProvider: Send + Sync {
    fn name(&self) -> &'static str;

    fn boot(&self, app: &Application) -> FrameworkResult<()>;
}

/// Environment, config, router, then the registered services
pub fn default_boot_providers() -> Vec<Box<dyn BootProvider>> {
    vec![
        Box::new(EnvironmentBootProvider),
        Box::new(ConfigBootProvider),
        Box::new(RouterBootProvider),
        Box::new(RegisterServicesBootProvider),
    ]
}
