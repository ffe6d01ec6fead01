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

//! Helpers for testing applications
//!
//! [`TestApplication`] lays out a throwaway project in a temporary directory, [`TestClient`]
//! sends requests through the HTTP kernel and [`ConsoleTester`] runs console commands.
//!
//! ```no_run
//! # async fn demo() -> trellis::error::FrameworkResult<()> {
//! use trellis::testing::TestApplication;
//!
//! let test = TestApplication::new()?;
//! let response = test.client().get("/").await;
//! assert_eq!(response.status().as_u16(), 404);
//! # Ok(())
//! # }
//! ```

use crate::application::{Application, ApplicationBuilder, Environment};
use crate::encryption::Encrypter;
use crate::error::{FrameworkError, FrameworkResult};
use crate::http::{Request, Response};
use crate::kernel::{ConsoleKernel, HttpKernel};
use http_body_util::BodyExt;
use hyper::body::Bytes;
use hyper::header::{CONTENT_TYPE, COOKIE, HeaderMap, SET_COOKIE};
use hyper::{Method, StatusCode};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const APP_CONFIG: &str = r#"name = "Trellis"
key = "%env:APP_KEY%"
debug = false
url = "http://localhost"
"#;

const DEFAULT_CONFIG: &[(&str, &str)] = &[
    ("session.toml", "driver = \"array\"\n"),
    ("cache.toml", "driver = \"array\"\n"),
    ("logging.toml", "level = \"warn\"\n"),
];

type Customize = Box<dyn FnOnce(ApplicationBuilder) -> ApplicationBuilder>;

/// An application rooted in a temporary project directory
pub struct TestApplication {
    dir: TempDir,
    app: Arc<Application>,
}

impl TestApplication {
    /// A testing-environment project with array session and cache drivers
    pub fn new() -> FrameworkResult<Self> {
        Self::builder().build()
    }

    pub fn builder() -> TestApplicationBuilder {
        TestApplicationBuilder {
            environment: Environment::Testing,
            app_config: APP_CONFIG.to_string(),
            files: DEFAULT_CONFIG.iter().map(|(name, contents)| (name.to_string(), contents.to_string())).collect(),
            env: Vec::new(),
            customize: Vec::new(),
        }
    }

    pub fn app(&self) -> &Arc<Application> {
        &self.app
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn client(&self) -> TestClient {
        TestClient::new(HttpKernel::new(self.app.clone()))
    }

    pub fn console(&self) -> ConsoleTester {
        ConsoleTester {
            kernel: ConsoleKernel::new(self.app.clone()),
        }
    }
}

pub struct TestApplicationBuilder {
    environment: Environment,
    app_config: String,
    files: Vec<(String, String)>,
    env: Vec<(String, String)>,
    customize: Vec<Customize>,
}

impl TestApplicationBuilder {
    pub fn environment(mut self, environment: impl Into<Environment>) -> Self {
        self.environment = environment.into();
        self
    }

    /// Append TOML to `config/app.toml`
    pub fn app_config(mut self, toml: &str) -> Self {
        self.app_config.push('\n');
        self.app_config.push_str(toml);
        self
    }

    /// Write `config/<file>`, replacing a default file of the same name
    pub fn config(mut self, file: &str, contents: &str) -> Self {
        self.files.retain(|(name, _)| name != file);
        self.files.push((file.to_string(), contents.to_string()));
        self
    }

    /// Add a line to `.env`
    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.env.push((key.to_string(), value.to_string()));
        self
    }

    /// Register components on the application builder
    pub fn app<F>(mut self, customize: F) -> Self
    where
        F: FnOnce(ApplicationBuilder) -> ApplicationBuilder + 'static,
    {
        self.customize.push(Box::new(customize));
        self
    }

    pub fn build(self) -> FrameworkResult<TestApplication> {
        let dir = tempfile::tempdir()?;
        let config_dir = dir.path().join("config");
        std::fs::create_dir_all(&config_dir)?;
        std::fs::write(config_dir.join("app.toml"), &self.app_config)?;
        for (name, contents) in &self.files {
            std::fs::write(config_dir.join(name), contents)?;
        }

        let mut env = format!("APP_ENV={}\nAPP_KEY={}\n", self.environment, Encrypter::generate_key()?);
        for (key, value) in &self.env {
            env.push_str(&format!("{}={}\n", key, value));
        }
        std::fs::write(dir.path().join(".env"), env)?;

        let mut builder = Application::builder(dir.path()).environment(self.environment);
        for customize in self.customize {
            builder = customize(builder);
        }
        let app = builder.build()?;

        Ok(TestApplication { dir, app })
    }
}

/// Sends requests through the HTTP kernel, carrying cookies between requests
pub struct TestClient {
    kernel: HttpKernel,
    cookies: Mutex<BTreeMap<String, String>>,
    headers: HeaderMap,
}

impl TestClient {
    pub fn new(kernel: HttpKernel) -> Self {
        Self {
            kernel,
            cookies: Mutex::new(BTreeMap::new()),
            headers: HeaderMap::new(),
        }
    }

    /// Send `name: value` with every request
    pub fn with_header(mut self, name: &'static str, value: &str) -> FrameworkResult<Self> {
        let value = value.parse().map_err(|_| FrameworkError::HttpBuild(format!("Invalid value for header {}", name)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Value of a cookie received so far, percent-decoded
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.cookies.lock().get(name).map(|value| percent_encoding::percent_decode_str(value).decode_utf8_lossy().into_owned())
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.send(Method::GET, path, None, Bytes::new()).await
    }

    pub async fn delete(&self, path: &str) -> TestResponse {
        self.send(Method::DELETE, path, None, Bytes::new()).await
    }

    /// Send a urlencoded form
    pub async fn form(&self, method: Method, path: &str, fields: &[(&str, &str)]) -> TestResponse {
        let body = url::form_urlencoded::Serializer::new(String::new()).extend_pairs(fields).finish();
        self.send(method, path, Some("application/x-www-form-urlencoded"), Bytes::from(body)).await
    }

    /// Send a JSON body with `Content-Type: application/json`
    pub async fn json<T: Serialize>(&self, method: Method, path: &str, body: &T) -> TestResponse {
        let body = serde_json::to_vec(body).unwrap_or_default();
        self.send(method, path, Some("application/json"), Bytes::from(body)).await
    }

    pub async fn send(&self, method: Method, path: &str, content_type: Option<&str>, body: Bytes) -> TestResponse {
        let mut req = Request::new(body);
        *req.method_mut() = method;
        match path.parse() {
            Ok(uri) => *req.uri_mut() = uri,
            Err(_) => return TestResponse::from_error(FrameworkError::HttpBuild(format!("Invalid path {}", path))).await,
        }
        if let Some(content_type) = content_type.and_then(|c| c.parse().ok()) {
            req.headers_mut().insert(CONTENT_TYPE, content_type);
        }
        self.request(req).await
    }

    /// Send a prepared request with the client's headers and cookies, recording the cookies it sets.
    /// Headers already on the request are kept.
    pub async fn request(&self, mut req: Request) -> TestResponse {
        for (name, value) in &self.headers {
            if !req.headers().contains_key(name) {
                req.headers_mut().insert(name.clone(), value.clone());
            }
        }
        let cookie_header = self.cookies.lock().iter().map(|(name, value)| format!("{}={}", name, value)).collect::<Vec<_>>().join("; ");
        if !cookie_header.is_empty() && !req.headers().contains_key(COOKIE) {
            if let Ok(value) = cookie_header.parse() {
                req.headers_mut().insert(COOKIE, value);
            }
        }

        let response = self.kernel.handle(req).await;
        for header in response.headers().get_all(SET_COOKIE) {
            let Ok(text) = header.to_str() else { continue };
            let Ok(cookie) = cookie::Cookie::parse(text.to_string()) else { continue };
            let mut cookies = self.cookies.lock();
            if cookie.max_age().is_some_and(|age| age.is_zero() || age.is_negative()) {
                cookies.remove(cookie.name());
            } else {
                cookies.insert(cookie.name().to_string(), cookie.value().to_string());
            }
        }
        TestResponse::collect(response).await
    }
}

/// A response with its body read into memory
#[derive(Debug)]
pub struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl TestResponse {
    async fn collect(response: Response) -> Self {
        let (parts, body) = response.into_parts();
        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(never) => match never {},
        };
        Self {
            status: parts.status,
            headers: parts.headers,
            body,
        }
    }

    async fn from_error(error: FrameworkError) -> Self {
        Self::collect(Response::from(error)).await
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json(&self) -> FrameworkResult<Value> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn assert_status(&self, expected: StatusCode) -> &Self {
        assert_eq!(self.status, expected, "unexpected status, body: {}", self.text());
        self
    }
}

/// Output of a console run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleOutput {
    pub code: i32,
    pub output: String,
}

/// Runs console commands against a test application
pub struct ConsoleTester {
    kernel: ConsoleKernel,
}

impl ConsoleTester {
    /// Run a command line without the program name
    pub fn run(&self, args: &[&str]) -> ConsoleOutput {
        let mut output = Vec::new();
        let argv = std::iter::once("trellis").chain(args.iter().copied());
        let code = self.kernel.handle(argv, &mut output);
        ConsoleOutput {
            code,
            output: String::from_utf8_lossy(&output).into_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_project_layout() {
        let test = TestApplication::builder().env("FEATURE", "on").config("mail.toml", "from = \"x@y.z\"\n").build().unwrap();

        let env = std::fs::read_to_string(test.root().join(".env")).unwrap();
        assert!(env.contains("APP_ENV=testing"));
        assert!(env.contains("APP_KEY=base64:"));
        assert!(env.contains("FEATURE=on"));
        assert!(test.root().join("config").join("mail.toml").is_file());
        assert!(test.app().is_testing());
    }

    #[tokio::test]
    async fn test_client_json_errors() {
        let test = TestApplication::new().unwrap();
        let client = test.client();

        let response = client.json(Method::GET, "/missing", &json!({})).await;
        response.assert_status(StatusCode::NOT_FOUND);
        assert_eq!(response.json().unwrap(), json!({"error": {"status": 404, "message": "Not Found"}}));
    }

    #[test]
    fn test_console_tester() {
        let test = TestApplication::builder().environment("development").build().unwrap();
        let result = test.console().run(&["app:environment"]);
        assert_eq!(result, ConsoleOutput {
            code: 0,
            output: "Current application environment: development\n".to_string(),
        });
    }
}
