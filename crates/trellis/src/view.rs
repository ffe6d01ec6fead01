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

//! Tera templates from `resources/views`

use crate::config::Config;
use crate::env::Env;
use crate::error::FrameworkResult;
use crate::http::{HtmlResponse, IntoResponse, Response};
use crate::routing::Router;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tera::{Context, Tera};
use tracing::debug;

/// Adds functions, filters or testers to the template engine
pub trait ViewExtension: Send + Sync {
    fn register(&self, tera: &mut Tera) -> FrameworkResult<()>;
}

/// Values the framework's template functions read
#[derive(Clone, Default)]
pub struct ViewGlobals {
    pub config: Arc<Config>,
    pub env: Arc<Env>,
    pub router: Option<Arc<Router>>,
}

/// Loaded templates
pub struct View {
    tera: Tera,
}

impl View {
    /// Load every template below `dir`; a missing directory yields an empty view
    pub fn from_dir(dir: &Path) -> FrameworkResult<Self> {
        if !dir.is_dir() {
            debug!("No view directory at {}", dir.display());
            return Ok(Self { tera: Tera::default() });
        }

        let pattern = dir.join("**").join("*");
        let tera = Tera::new(&pattern.to_string_lossy())?;
        debug!("Loaded {} templates from {}", tera.get_template_names().count(), dir.display());
        Ok(Self { tera })
    }

    pub fn from_tera(tera: Tera) -> Self {
        Self { tera }
    }

    /// Register `asset`, `url`, `route`, `config` and `env`
    pub fn register_globals(&mut self, globals: ViewGlobals) {
        let base_url = globals.config.string_or("app.url", "").trim_end_matches('/').to_string();
        let asset_url = globals.config.get_str("app.asset_url").map(|u| u.trim_end_matches('/').to_string()).unwrap_or_else(|| base_url.clone());

        self.tera.register_function("asset", move |args: &HashMap<String, Value>| Ok(Value::String(prefixed(&asset_url, &path_arg(args)?))));
        self.tera.register_function("url", move |args: &HashMap<String, Value>| Ok(Value::String(prefixed(&base_url, &path_arg(args)?))));

        let config = globals.config.clone();
        self.tera.register_function("config", move |args: &HashMap<String, Value>| {
            let key = string_arg(args, "key")?;
            Ok(config.get(&key).cloned().or_else(|| args.get("default").cloned()).unwrap_or(Value::Null))
        });

        let env = globals.env.clone();
        self.tera.register_function("env", move |args: &HashMap<String, Value>| {
            let key = string_arg(args, "key")?;
            Ok(env.get(&key).map(Value::String).or_else(|| args.get("default").cloned()).unwrap_or(Value::Null))
        });

        let router = globals.router;
        self.tera.register_function("route", move |args: &HashMap<String, Value>| {
            let name = string_arg(args, "name")?;
            let router = router.as_ref().ok_or_else(|| tera::Error::msg("No router available"))?;
            let params: HashMap<String, String> = args
                .iter()
                .filter(|(key, _)| key.as_str() != "name")
                .map(|(key, value)| (key.clone(), value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string())))
                .collect();
            router.url_for(&name, &params).map(Value::String).map_err(|e| tera::Error::msg(e.to_string()))
        });
    }

    pub fn extend(&mut self, extension: &dyn ViewExtension) -> FrameworkResult<()> {
        extension.register(&mut self.tera)
    }

    pub fn exists(&self, template: &str) -> bool {
        self.tera.get_template_names().any(|name| name == template)
    }

    pub fn render(&self, template: &str, context: &Context) -> FrameworkResult<String> {
        Ok(self.tera.render(template, context)?)
    }

    /// Render with any serializable value as the context
    pub fn render_with<T: Serialize>(&self, template: &str, data: &T) -> FrameworkResult<String> {
        let context = Context::from_serialize(data)?;
        self.render(template, &context)
    }

    /// Render a template straight into an HTML response
    pub fn response(&self, template: &str, context: &Context) -> FrameworkResult<Response> {
        HtmlResponse::new(self.render(template, context)?).into_response()
    }

    pub fn tera(&self) -> &Tera {
        &self.tera
    }
}

fn string_arg(args: &HashMap<String, Value>, name: &str) -> tera::Result<String> {
    match args.get(name) {
        Some(Value::String(value)) => Ok(value.clone()),
        Some(other) => Ok(other.to_string()),
        None => Err(tera::Error::msg(format!("Missing argument '{}'", name))),
    }
}

fn path_arg(args: &HashMap<String, Value>) -> tera::Result<String> {
    string_arg(args, "path")
}

fn prefixed(base: &str, path: &str) -> String {
    format!("{}/{}", base, path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{EmptyResponse, Request};
    use serde_json::json;

    fn globals() -> ViewGlobals {
        let mut config = Config::default();
        config.set("app.url", json!("https://example.com/"));
        config.set("app.name", json!("Trellis"));

        let mut router = Router::new();
        router.get("/users/{id}", |_req: Request| async { EmptyResponse::new().into_response() }).name("users.show");

        ViewGlobals {
            config: Arc::new(config),
            env: Arc::new(Env::from_vars(HashMap::from([("APP_ENV".to_string(), "testing".to_string())]))),
            router: Some(Arc::new(router)),
        }
    }

    #[test]
    fn test_templates_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("errors")).unwrap();
        std::fs::write(dir.path().join("errors").join("404.html"), "Missing {{ resource }}").unwrap();

        let view = View::from_dir(dir.path()).unwrap();
        assert!(view.exists("errors/404.html"));
        assert!(!view.exists("errors/500.html"));
        assert_eq!(view.render_with("errors/404.html", &json!({"resource": "user"})).unwrap(), "Missing user");
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let view = View::from_dir(Path::new("/definitely/not/here")).unwrap();
        assert_eq!(view.tera().get_template_names().count(), 0);
    }

    #[test]
    fn test_framework_functions() {
        let mut tera = Tera::default();
        tera.add_raw_template(
            "page.txt",
            r#"{{ asset(path="css/app.css") }} {{ url(path="/about") }} {{ route(name="users.show", id=7) }} {{ config(key="app.name") }} {{ env(key="APP_ENV") }}"#,
        )
        .unwrap();

        let mut view = View::from_tera(tera);
        view.register_globals(globals());

        assert_eq!(
            view.render("page.txt", &Context::new()).unwrap(),
            "https://example.com/css/app.css https://example.com/about /users/7 Trellis testing"
        );
    }
}
