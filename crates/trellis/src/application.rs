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

//! The application: project paths, environment, container and component catalog

use crate::catalog::Catalog;
use crate::config::Config;
use crate::console::ConsoleCommand;
use crate::container::Container;
use crate::error::{FrameworkError, FrameworkResult};
use crate::events::EventDispatcher;
use crate::middleware::Middleware;
use crate::providers::{BootProvider, ServiceProvider};
use crate::routing::Controller;
use crate::view::ViewExtension;
use parking_lot::Mutex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// Name of the sentinel file that puts the application into maintenance mode
pub const MAINTENANCE_FILE: &str = "maintenance.html";

/// Application environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Production,
    Development,
    Testing,
    Custom(String),
}

impl Environment {
    pub fn as_str(&self) -> &str {
        match self {
            Environment::Production => "production",
            Environment::Development => "development",
            Environment::Testing => "testing",
            Environment::Custom(name) => name,
        }
    }
}

impl From<&str> for Environment {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            "development" | "dev" | "local" => Environment::Development,
            "testing" | "test" => Environment::Testing,
            other => Environment::Custom(other.to_string()),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Directory segments below the project root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub app: String,
    pub config: String,
    pub public: String,
    pub resources: String,
    pub storage: String,
}

impl Default for AppPaths {
    fn default() -> Self {
        Self {
            app: "src".to_string(),
            config: "config".to_string(),
            public: "public".to_string(),
            resources: "resources".to_string(),
            storage: "storage".to_string(),
        }
    }
}

/// A bootstrapped-once application instance
pub struct Application {
    root: PathBuf,
    paths: AppPaths,
    environment: Environment,
    container: Arc<Container>,
    catalog: Arc<Catalog>,
    bootstrapped: AtomicBool,
    bootstrap_lock: Mutex<()>,
}

impl Application {
    /// Create an application with the framework defaults and the production environment
    pub fn new(root: impl Into<PathBuf>) -> FrameworkResult<Arc<Self>> {
        Self::builder(root).build()
    }

    pub fn builder(root: impl Into<PathBuf>) -> ApplicationBuilder {
        ApplicationBuilder {
            root: root.into(),
            environment: Environment::Production,
            paths: AppPaths::default(),
            catalog: Catalog::with_framework_defaults(),
        }
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }

    pub fn is_testing(&self) -> bool {
        self.environment == Environment::Testing
    }

    /// Whether the environment name is one of `names`
    pub fn is_environment(&self, names: &[&str]) -> bool {
        names.iter().any(|name| Environment::from(*name) == self.environment)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn paths(&self) -> &AppPaths {
        &self.paths
    }

    pub fn root_path(&self, sub: &str) -> PathBuf {
        self.join("", sub)
    }

    pub fn app_path(&self, sub: &str) -> PathBuf {
        self.join(&self.paths.app, sub)
    }

    pub fn config_path(&self, sub: &str) -> PathBuf {
        self.join(&self.paths.config, sub)
    }

    pub fn public_path(&self, sub: &str) -> PathBuf {
        self.join(&self.paths.public, sub)
    }

    pub fn resources_path(&self, sub: &str) -> PathBuf {
        self.join(&self.paths.resources, sub)
    }

    pub fn storage_path(&self, sub: &str) -> PathBuf {
        self.join(&self.paths.storage, sub)
    }

    /// Resolve a path helper by name, as used by the `%path:NAME%` config replacer
    pub fn named_path(&self, name: &str, sub: &str) -> Option<PathBuf> {
        match name {
            "root" => Some(self.root_path(sub)),
            "app" => Some(self.app_path(sub)),
            "config" => Some(self.config_path(sub)),
            "public" => Some(self.public_path(sub)),
            "resources" => Some(self.resources_path(sub)),
            "storage" => Some(self.storage_path(sub)),
            _ => None,
        }
    }

    // root + segment + trim(sub, '/'), skipping empty parts
    fn join(&self, segment: &str, sub: &str) -> PathBuf {
        let mut path = self.root.clone();
        for part in [segment.trim_matches('/'), sub.trim_matches('/')] {
            if !part.is_empty() {
                path.push(part);
            }
        }
        path
    }

    pub fn container(&self) -> &Arc<Container> {
        &self.container
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Loaded configuration; available once the config boot provider ran
    pub fn config(&self) -> FrameworkResult<Arc<Config>> {
        self.container.get::<Config>()
    }

    /// Whether the maintenance sentinel exists
    pub fn is_down(&self) -> bool {
        self.public_path(MAINTENANCE_FILE).is_file()
    }

    pub fn is_bootstrapped(&self) -> bool {
        self.bootstrapped.load(Ordering::Acquire)
    }

    /// Run the boot providers once, in order. A failure leaves the application un-bootstrapped.
    pub fn bootstrap_with(&self, providers: &[Box<dyn BootProvider>]) -> FrameworkResult<()> {
        if self.is_bootstrapped() {
            return Ok(());
        }

        let _guard = self.bootstrap_lock.lock();
        if self.is_bootstrapped() {
            return Ok(());
        }

        for provider in providers {
            debug!("Running boot provider: {}", provider.name());
            provider.boot(self)?;
        }

        self.bootstrapped.store(true, Ordering::Release);
        info!("Application bootstrapped in {} environment", self.environment);
        Ok(())
    }
}

/// Builder registering the application's own components next to the framework defaults
pub struct ApplicationBuilder {
    root: PathBuf,
    environment: Environment,
    paths: AppPaths,
    catalog: Catalog,
}

impl ApplicationBuilder {
    pub fn environment(mut self, environment: impl Into<Environment>) -> Self {
        self.environment = environment.into();
        self
    }

    pub fn paths(mut self, paths: AppPaths) -> Self {
        self.paths = paths;
        self
    }

    pub fn provider<P, F>(mut self, name: &str, factory: F) -> Self
    where
        P: ServiceProvider + 'static,
        F: Fn() -> P + Send + Sync + 'static,
    {
        self.catalog.providers.insert(name, Arc::new(move || Box::new(factory()) as Box<dyn ServiceProvider>));
        self
    }

    pub fn command<C, F>(mut self, name: &str, factory: F) -> Self
    where
        C: ConsoleCommand + 'static,
        F: Fn() -> C + Send + Sync + 'static,
    {
        self.catalog.commands.insert(name, Arc::new(move || Box::new(factory()) as Box<dyn ConsoleCommand>));
        self
    }

    pub fn controller<C, F>(mut self, name: &str, factory: F) -> Self
    where
        C: Controller + 'static,
        F: Fn(&Application) -> FrameworkResult<C> + Send + Sync + 'static,
    {
        self.catalog
            .controllers
            .insert(name, Arc::new(move |app: &Application| factory(app).map(|c| Arc::new(c) as Arc<dyn Controller>)));
        self
    }

    pub fn middleware<M, F>(mut self, name: &str, factory: F) -> Self
    where
        M: Middleware + 'static,
        F: Fn(&Application) -> FrameworkResult<M> + Send + Sync + 'static,
    {
        self.catalog
            .middleware
            .insert(name, Arc::new(move |app: &Application| factory(app).map(|m| Arc::new(m) as Arc<dyn Middleware>)));
        self
    }

    /// Register a listener installer; it subscribes its handlers on the dispatcher
    pub fn listener<F>(mut self, name: &str, install: F) -> Self
    where
        F: Fn(&Application, &EventDispatcher) -> FrameworkResult<()> + Send + Sync + 'static,
    {
        self.catalog.listeners.insert(name, Arc::new(install));
        self
    }

    pub fn view_extension<E, F>(mut self, name: &str, factory: F) -> Self
    where
        E: ViewExtension + 'static,
        F: Fn() -> E + Send + Sync + 'static,
    {
        self.catalog.extensions.insert(name, Arc::new(move || Box::new(factory()) as Box<dyn ViewExtension>));
        self
    }

    pub fn build(self) -> FrameworkResult<Arc<Application>> {
        if self.root.as_os_str().is_empty() || !self.root.is_dir() {
            return Err(FrameworkError::framework(format!("Application root path does not exist: {}", self.root.display())));
        }

        Ok(Arc::new(Application {
            root: self.root,
            paths: self.paths,
            environment: self.environment,
            container: Arc::new(Container::new()),
            catalog: Arc::new(self.catalog),
            bootstrapped: AtomicBool::new(false),
            bootstrap_lock: Mutex::new(()),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::atomic::AtomicUsize;

    struct CountingBoot(Arc<AtomicUsize>);

    impl BootProvider for CountingBoot {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn boot(&self, _app: &Application) -> FrameworkResult<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingBoot;

    impl BootProvider for FailingBoot {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn boot(&self, _app: &Application) -> FrameworkResult<()> {
            Err(FrameworkError::framework("boot failed"))
        }
    }

    #[test]
    fn test_missing_root_is_rejected() {
        let err = Application::new("/definitely/not/a/real/root").err().unwrap();
        assert!(err.to_string().contains("root path does not exist"));
    }

    #[test]
    fn test_path_helpers() {
        let dir = tempfile::tempdir().unwrap();
        let app = Application::new(dir.path()).unwrap();

        assert_eq!(app.config_path("app.toml"), dir.path().join("config").join("app.toml"));
        assert_eq!(app.storage_path("/cache/"), dir.path().join("storage").join("cache"));
        assert_eq!(app.public_path(""), dir.path().join("public"));
        assert_eq!(app.root_path(".env"), dir.path().join(".env"));
        assert_eq!(app.app_path("http"), dir.path().join("src").join("http"));
    }

    #[test]
    fn test_empty_segment_is_omitted() {
        let dir = tempfile::tempdir().unwrap();
        let paths = AppPaths {
            config: String::new(),
            ..AppPaths::default()
        };
        let app = Application::builder(dir.path()).paths(paths).build().unwrap();
        assert_eq!(app.config_path("app.toml"), dir.path().join("app.toml"));
    }

    #[test]
    fn test_environment_parsing() {
        assert_eq!(Environment::from("Production"), Environment::Production);
        assert_eq!(Environment::from("local"), Environment::Development);
        assert_eq!(Environment::from("staging"), Environment::Custom("staging".to_string()));

        let dir = tempfile::tempdir().unwrap();
        let app = Application::builder(dir.path()).environment("staging").build().unwrap();
        assert!(app.is_environment(&["production", "staging"]));
        assert!(!app.is_production());
        assert_eq!(app.environment().to_string(), "staging");
    }

    #[test]
    fn test_bootstrap_runs_once() {
        let dir = tempfile::tempdir().unwrap();
        let app = Application::new(dir.path()).unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let providers: Vec<Box<dyn BootProvider>> = vec![Box::new(CountingBoot(count.clone()))];

        assert!(!app.is_bootstrapped());
        app.bootstrap_with(&providers).unwrap();
        app.bootstrap_with(&providers).unwrap();

        assert!(app.is_bootstrapped());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_bootstrap_stays_unbootstrapped() {
        let dir = tempfile::tempdir().unwrap();
        let app = Application::new(dir.path()).unwrap();
        let providers: Vec<Box<dyn BootProvider>> = vec![Box::new(FailingBoot)];

        assert!(app.bootstrap_with(&providers).is_err());
        assert!(!app.is_bootstrapped());
    }

    proptest! {
        #[test]
        fn prop_paths_join_trimmed_segments(segment in "[a-z]{0,6}", sub in "/{0,2}[a-z]{1,6}(/[a-z]{1,6})?/{0,2}") {
            let dir = tempfile::tempdir().unwrap();
            let paths = AppPaths { storage: segment.clone(), ..AppPaths::default() };
            let app = Application::builder(dir.path()).paths(paths).build().unwrap();

            let mut expected = dir.path().to_path_buf();
            if !segment.is_empty() {
                expected.push(&segment);
            }
            expected.push(sub.trim_matches('/'));

            prop_assert_eq!(app.storage_path(&sub), expected);
        }
    }
}
