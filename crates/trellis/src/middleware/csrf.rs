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

//! Cross-site request forgery protection

use crate::application::Application;
use crate::cookie::CookieSettings;
use crate::encryption::{Encrypter, secure_compare};
use crate::error::{FrameworkError, FrameworkResult};
use crate::http::{HttpException, Request, Response, parsed_body};
use crate::middleware::{Middleware, Next};
use crate::session::{SessionHandle, TOKEN_KEY};
use async_trait::async_trait;
use hyper::header::{HeaderValue, SET_COOKIE};
use hyper::{Method, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

pub const CSRF_HEADER: &str = "x-csrf-token";
pub const XSRF_HEADER: &str = "x-xsrf-token";
pub const XSRF_COOKIE: &str = "XSRF-TOKEN";

/// Rejects state-changing requests whose token does not match the session token
pub struct CsrfMiddleware {
    encrypter: Arc<Encrypter>,
    cookies: Arc<CookieSettings>,
    exclude: Vec<glob::Pattern>,
    testing: bool,
}

impl CsrfMiddleware {
    pub fn new(encrypter: Arc<Encrypter>, cookies: Arc<CookieSettings>) -> Self {
        Self {
            encrypter,
            cookies,
            exclude: Vec::new(),
            testing: false,
        }
    }

    /// Paths matching any of these glob patterns skip verification
    pub fn exclude(mut self, patterns: &[String]) -> FrameworkResult<Self> {
        for pattern in patterns {
            let compiled = glob::Pattern::new(pattern.trim_start_matches('/')).map_err(|e| FrameworkError::config(format!("Invalid csrf.exclude pattern '{}': {}", pattern, e)))?;
            self.exclude.push(compiled);
        }
        Ok(self)
    }

    /// Skip verification entirely, as the testing environment does
    pub fn skip_verification(mut self, skip: bool) -> Self {
        self.testing = skip;
        self
    }

    pub fn from_app(app: &Application) -> FrameworkResult<Self> {
        let container = app.container();
        let config = app.config()?;
        Self::new(container.get::<Encrypter>()?, container.get::<CookieSettings>()?)
            .exclude(&config.get_string_list("csrf.exclude"))
            .map(|middleware| middleware.skip_verification(app.is_testing()))
    }

    fn is_reading(method: &Method) -> bool {
        matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
    }

    fn is_excluded(&self, path: &str) -> bool {
        let path = path.trim_start_matches('/');
        self.exclude.iter().any(|pattern| pattern.matches(path))
    }

    /// Token sent with the request: body `_token`, then `X-CSRF-TOKEN`, then the decrypted `X-XSRF-TOKEN`
    fn request_token(&self, req: &Request) -> Option<String> {
        if let Ok(Some(Value::Object(body))) = parsed_body(req) {
            if let Some(Value::String(token)) = body.get(TOKEN_KEY) {
                return Some(token.clone());
            }
        }

        let header = |name: &str| req.headers().get(name).and_then(|v| v.to_str().ok()).map(str::to_string);
        header(CSRF_HEADER).or_else(|| header(XSRF_HEADER).and_then(|value| self.encrypter.decrypt_string(&value).ok()))
    }

    fn tokens_match(&self, req: &Request, session: Option<&SessionHandle>) -> bool {
        let Some(expected) = session.and_then(|handle| handle.lock().token().map(str::to_string)) else {
            return false;
        };
        let Some(provided) = self.request_token(req) else {
            return false;
        };
        secure_compare(expected.as_bytes(), provided.as_bytes())
    }
}

#[async_trait]
impl Middleware for CsrfMiddleware {
    async fn process(&self, req: Request, next: Next<'_>) -> FrameworkResult<Response> {
        let session = req.extensions().get::<SessionHandle>().cloned();
        let passes = Self::is_reading(req.method()) || self.testing || self.is_excluded(req.uri().path()) || self.tokens_match(&req, session.as_ref());

        if !passes {
            debug!("CSRF token mismatch for {} {}", req.method(), req.uri().path());
            return Err(HttpException::new(StatusCode::FORBIDDEN).with_message("CSRF token mismatch.").into());
        }

        let mut response = next.run(req).await?;

        let token = session.and_then(|handle| handle.lock().token().map(str::to_string));
        if let Some(token) = token {
            let mut cookie = self.cookies.make(XSRF_COOKIE, self.encrypter.encrypt_string(&token)?);
            cookie.set_http_only(false);
            match HeaderValue::from_str(&cookie.encoded().to_string()) {
                Ok(value) => {
                    response.headers_mut().append(SET_COOKIE, value);
                }
                Err(_) => warn!("XSRF cookie produced an invalid header value"),
            }
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{EmptyResponse, IntoResponse};
    use crate::session::{ArraySessionHandler, Session};
    use hyper::body::Bytes;
    use hyper::header::CONTENT_TYPE;
    use parking_lot::Mutex;

    fn encrypter() -> Arc<Encrypter> {
        Arc::new(Encrypter::from_app_key(&Encrypter::generate_key().unwrap()).unwrap())
    }

    fn session() -> SessionHandle {
        let mut session = Session::new("s", Arc::new(ArraySessionHandler::new()), None);
        session.start().unwrap();
        Arc::new(Mutex::new(session))
    }

    fn request(method: Method, path: &str, session: &SessionHandle) -> hyper::http::request::Builder {
        let mut builder = hyper::Request::builder().method(method).uri(path);
        if let Some(extensions) = builder.extensions_mut() {
            extensions.insert(session.clone());
        }
        builder
    }

    async fn run(middleware: CsrfMiddleware, req: Request) -> FrameworkResult<Response> {
        let chain: Vec<Arc<dyn Middleware>> = vec![Arc::new(middleware)];
        let endpoint = |_req: Request| async { EmptyResponse::new().into_response() };
        Next::new(&chain, &endpoint).run(req).await
    }

    #[tokio::test]
    async fn test_reads_pass_and_receive_cookie() {
        let session = session();
        let middleware = CsrfMiddleware::new(encrypter(), Arc::new(CookieSettings::default()));
        let req = request(Method::GET, "/", &session).body(Bytes::new()).unwrap();

        let response = run(middleware, req).await.unwrap();
        let cookie = response.headers()[SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with("XSRF-TOKEN="));
        assert!(!cookie.contains("HttpOnly"));
    }

    #[tokio::test]
    async fn test_missing_and_wrong_tokens_are_forbidden() {
        let session = session();
        let middleware = CsrfMiddleware::new(encrypter(), Arc::new(CookieSettings::default()));
        let req = request(Method::POST, "/posts", &session).body(Bytes::new()).unwrap();
        assert_eq!(run(middleware, req).await.unwrap_err().status_code(), StatusCode::FORBIDDEN);

        let middleware = CsrfMiddleware::new(encrypter(), Arc::new(CookieSettings::default()));
        let req = request(Method::DELETE, "/posts/1", &session).header(CSRF_HEADER, "wrong").body(Bytes::new()).unwrap();
        assert_eq!(run(middleware, req).await.unwrap_err().status_code(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_token_sources() {
        let session = session();
        let token = session.lock().token().unwrap().to_string();
        let encrypter = encrypter();

        let body = format!("{}={}&title=x", TOKEN_KEY, token);
        let req = request(Method::POST, "/posts", &session)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Bytes::from(body))
            .unwrap();
        assert!(run(CsrfMiddleware::new(encrypter.clone(), Arc::new(CookieSettings::default())), req).await.is_ok());

        let req = request(Method::PUT, "/posts/1", &session).header(CSRF_HEADER, token.clone()).body(Bytes::new()).unwrap();
        assert!(run(CsrfMiddleware::new(encrypter.clone(), Arc::new(CookieSettings::default())), req).await.is_ok());

        let encrypted = encrypter.encrypt_string(&token).unwrap();
        let req = request(Method::PATCH, "/posts/1", &session).header(XSRF_HEADER, encrypted).body(Bytes::new()).unwrap();
        assert!(run(CsrfMiddleware::new(encrypter.clone(), Arc::new(CookieSettings::default())), req).await.is_ok());
    }

    #[tokio::test]
    async fn test_exclusions_and_testing_environment() {
        let session = session();
        let middleware = CsrfMiddleware::new(encrypter(), Arc::new(CookieSettings::default())).exclude(&["/webhooks/*".to_string()]).unwrap();
        let req = request(Method::POST, "/webhooks/stripe", &session).body(Bytes::new()).unwrap();
        assert!(run(middleware, req).await.is_ok());

        let middleware = CsrfMiddleware::new(encrypter(), Arc::new(CookieSettings::default())).skip_verification(true);
        let req = request(Method::POST, "/posts", &session).body(Bytes::new()).unwrap();
        assert!(run(middleware, req).await.is_ok());
    }
}
