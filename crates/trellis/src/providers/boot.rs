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

//! The bootstrap sequence

use crate::application::Application;
use crate::config::{Config, ConfigCache, ConfigLoader};
use crate::env::Env;
use crate::error::FrameworkResult;
use crate::providers::{BootProvider, ServiceProvider};
use crate::registry::ApplicationRegistry;
use crate::routing::Router;
use tracing::{debug, info};

/// Loads `<root>/.env`
pub struct EnvironmentBootProvider;

impl BootProvider for EnvironmentBootProvider {
    fn name(&self) -> &'static str {
        "environment"
    }

    fn boot(&self, app: &Application) -> FrameworkResult<()> {
        let env = Env::load(&app.root_path(".env"))?;
        app.container().instance(env);
        Ok(())
    }
}

/// Loads the cached configuration, or every config file when no cache exists
pub struct ConfigBootProvider;

impl BootProvider for ConfigBootProvider {
    fn name(&self) -> &'static str {
        "config"
    }

    fn boot(&self, app: &Application) -> FrameworkResult<()> {
        let cache = ConfigCache::new(app);
        let config = if cache.exists() {
            debug!("Loading configuration from {}", cache.path().display());
            cache.load()?
        } else {
            let env = app.container().get::<Env>()?;
            ConfigLoader::new(app, &env).load()?
        };

        app.container().instance::<Config>(config);
        let registry = ApplicationRegistry::new(app.config()?, app.catalog().clone());
        app.container().instance(registry);
        Ok(())
    }
}

/// Builds the router from the registered controllers and global middleware
pub struct RouterBootProvider;

impl BootProvider for RouterBootProvider {
    fn name(&self) -> &'static str {
        "router"
    }

    fn boot(&self, app: &Application) -> FrameworkResult<()> {
        let registry = app.container().get::<ApplicationRegistry>()?;
        let mut router = Router::with_middleware(registry.middleware()?);

        for name in registry.controllers()? {
            let controller = app.catalog().controllers.get(&name)?(app)?;
            router.controller(controller.as_ref())?;
            debug!("Registered routes of controller '{}'", name);
        }

        router.compile()?;
        info!("Router compiled with {} routes", router.routes().len());
        app.container().instance(router);
        Ok(())
    }
}

/// Registers every configured service provider, then boots them
pub struct RegisterServicesBootProvider;

impl BootProvider for RegisterServicesBootProvider {
    fn name(&self) -> &'static str {
        "services"
    }

    fn boot(&self, app: &Application) -> FrameworkResult<()> {
        let registry = app.container().get::<ApplicationRegistry>()?;

        let mut providers: Vec<(String, Box<dyn ServiceProvider>)> = Vec::new();
        for name in registry.providers()? {
            let factory = app.catalog().providers.get(&name)?;
            providers.push((name, factory()));
        }

        for (name, provider) in &providers {
            debug!("Registering service provider '{}'", name);
            provider.register(app)?;
        }
        for (name, provider) in &providers {
            debug!("Booting service provider '{}'", name);
            provider.boot(app)?;
        }
        Ok(())
    }
}
