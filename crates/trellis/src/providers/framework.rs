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

//! The framework's own service providers

use crate::application::Application;
use crate::cache::{CacheStore, store_from_config};
use crate::config::Config;
use crate::cookie::CookieSettings;
use crate::encryption::Encrypter;
use crate::env::Env;
use crate::error::FrameworkResult;
use crate::events::EventDispatcher;
use crate::exceptions::{ExceptionHandler, Handler};
use crate::logging::{self, LogGuard, LogSettings};
use crate::providers::ServiceProvider;
use crate::registry::ApplicationRegistry;
use crate::routing::Router;
use crate::session::SessionManager;
use crate::view::{View, ViewGlobals};
use std::sync::Arc;
use tracing::debug;

/// Binds the `Encrypter`. The key is checked when the encrypter is first resolved.
pub struct EncryptionServiceProvider;

impl ServiceProvider for EncryptionServiceProvider {
    fn register(&self, app: &Application) -> FrameworkResult<()> {
        app.container().singleton(|container| {
            let config = container.get::<Config>()?;
            Encrypter::from_app_key(config.get_str("app.key").unwrap_or_default())
        });
        Ok(())
    }
}

pub struct CookieServiceProvider;

impl ServiceProvider for CookieServiceProvider {
    fn register(&self, app: &Application) -> FrameworkResult<()> {
        let config = app.config()?;
        app.container().instance(CookieSettings::from_config(&config));
        Ok(())
    }
}

pub struct SessionServiceProvider;

impl ServiceProvider for SessionServiceProvider {
    fn register(&self, app: &Application) -> FrameworkResult<()> {
        let config = app.config()?;
        let manager = SessionManager::from_app(app, &config)?;
        debug!("Session driver: {}", manager.settings().driver);
        app.container().instance(manager);
        Ok(())
    }
}

/// Binds an `Arc<dyn CacheStore>` for the configured driver
pub struct CacheServiceProvider;

impl ServiceProvider for CacheServiceProvider {
    fn register(&self, app: &Application) -> FrameworkResult<()> {
        let config = app.config()?;
        let store: Arc<dyn CacheStore> = store_from_config(app, &config)?;
        app.container().instance(store);
        Ok(())
    }
}

/// Binds the `EventDispatcher`; registered listeners subscribe on boot
pub struct EventsServiceProvider;

impl ServiceProvider for EventsServiceProvider {
    fn register(&self, app: &Application) -> FrameworkResult<()> {
        app.container().instance(EventDispatcher::new());
        Ok(())
    }

    fn boot(&self, app: &Application) -> FrameworkResult<()> {
        let registry = app.container().get::<ApplicationRegistry>()?;
        let dispatcher = app.container().get::<EventDispatcher>()?;
        for name in registry.listeners()? {
            app.catalog().listeners.get(&name)?(app, &dispatcher)?;
            debug!("Installed event listener '{}'", name);
        }
        Ok(())
    }
}

/// Binds the `View` over `resources/views` with the framework functions and `view.extensions`
pub struct ViewServiceProvider;

impl ServiceProvider for ViewServiceProvider {
    fn register(&self, app: &Application) -> FrameworkResult<()> {
        let config = app.config()?;
        let mut view = View::from_dir(&app.resources_path("views"))?;
        view.register_globals(ViewGlobals {
            config: config.clone(),
            env: app.container().get::<Env>().unwrap_or_default(),
            router: app.container().get::<Router>().ok(),
        });

        for name in config.get_string_list("view.extensions") {
            let extension = app.catalog().extensions.get(&name)?();
            view.extend(extension.as_ref())?;
            debug!("Registered view extension '{}'", name);
        }

        app.container().instance(view);
        Ok(())
    }
}

pub struct LoggingServiceProvider;

impl ServiceProvider for LoggingServiceProvider {
    fn register(&self, app: &Application) -> FrameworkResult<()> {
        let config = app.config()?;
        let settings = LogSettings::from_config(app, &config);
        if let Some(guard) = logging::init(&settings)? {
            app.container().instance::<LogGuard>(guard);
        }
        Ok(())
    }
}

/// Binds an `Arc<dyn ExceptionHandler>` honoring `app.debug`
pub struct ExceptionServiceProvider;

impl ServiceProvider for ExceptionServiceProvider {
    fn register(&self, app: &Application) -> FrameworkResult<()> {
        let config = app.config()?;
        let mut handler = Handler::new(config.bool_or("app.debug", false)).with_environment(app.environment().to_string());
        if let Ok(view) = app.container().get::<View>() {
            handler = handler.with_view(view);
        }

        let handler: Arc<dyn ExceptionHandler> = Arc::new(handler);
        app.container().instance(handler);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FrameworkError;
    use crate::events::Event;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn app_with(config: Config) -> (tempfile::TempDir, Arc<Application>) {
        let dir = tempfile::tempdir().unwrap();
        let app = Application::new(dir.path()).unwrap();
        app.container().instance(config);
        let registry = ApplicationRegistry::new(app.config().unwrap(), app.catalog().clone());
        app.container().instance(registry);
        (dir, app)
    }

    #[test]
    fn test_encrypter_key_checked_on_resolve() {
        let mut config = Config::default();
        config.set("app.key", json!("base64:not-a-key"));
        let (_dir, app) = app_with(config);

        EncryptionServiceProvider.register(&app).unwrap();
        assert!(matches!(app.container().get::<Encrypter>(), Err(FrameworkError::InvalidKey { .. })));

        let mut config = Config::default();
        config.set("app.key", json!(Encrypter::generate_key().unwrap()));
        let (_dir, app) = app_with(config);
        EncryptionServiceProvider.register(&app).unwrap();
        let encrypter = app.container().get::<Encrypter>().unwrap();
        assert_eq!(encrypter.decrypt_string(&encrypter.encrypt_string("hi").unwrap()).unwrap(), "hi");
    }

    #[test]
    fn test_cache_and_session_drivers() {
        let mut config = Config::default();
        config.set("cache.driver", json!("array"));
        config.set("session.driver", json!("array"));
        let (_dir, app) = app_with(config);

        CacheServiceProvider.register(&app).unwrap();
        SessionServiceProvider.register(&app).unwrap();

        let store = app.container().get::<Arc<dyn CacheStore>>().unwrap();
        store.put("greeting", json!("hello"), None).unwrap();
        assert_eq!(store.get("greeting").unwrap(), Some(json!("hello")));
        assert_eq!(app.container().get::<SessionManager>().unwrap().settings().driver, "array");
    }

    struct Ping;

    impl Event for Ping {}

    #[test]
    fn test_events_install_listeners() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let dir = tempfile::tempdir().unwrap();
        let app = Application::builder(dir.path())
            .listener("pinger", move |_app: &Application, dispatcher: &EventDispatcher| {
                let counter = counter.clone();
                dispatcher.subscribe(move |_event: &mut Ping| {
                    counter.fetch_add(1, Ordering::SeqCst);
                });
                Ok(())
            })
            .build()
            .unwrap();

        let mut config = Config::default();
        config.set("app.events.listeners", json!(["pinger"]));
        app.container().instance(config);
        app.container().instance(ApplicationRegistry::new(app.config().unwrap(), app.catalog().clone()));

        EventsServiceProvider.register(&app).unwrap();
        EventsServiceProvider.boot(&app).unwrap();
        app.container().get::<EventDispatcher>().unwrap().dispatch(Ping);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_exception_handler_binding() {
        let mut config = Config::default();
        config.set("app.debug", json!(true));
        let (_dir, app) = app_with(config);

        ViewServiceProvider.register(&app).unwrap();
        ExceptionServiceProvider.register(&app).unwrap();
        assert!(app.container().has::<View>());
        assert!(app.container().has::<Arc<dyn ExceptionHandler>>());
    }

    #[test]
    fn test_unknown_view_extension() {
        let mut config = Config::default();
        config.set("view.extensions", json!(["markdown"]));
        let (_dir, app) = app_with(config);
        assert_eq!(ViewServiceProvider.register(&app).err().unwrap().to_string(), "Unknown view extension 'markdown'");
    }
}
