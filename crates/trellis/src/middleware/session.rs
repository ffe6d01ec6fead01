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

//! Starts the session for a request and persists it afterwards

use crate::application::Application;
use crate::cookie::CookieSettings;
use crate::encryption::Encrypter;
use crate::error::FrameworkResult;
use crate::http::{Request, Response, cookie_value};
use crate::middleware::{Middleware, Next};
use crate::session::{SessionHandle, SessionManager};
use async_trait::async_trait;
use cookie::time::Duration;
use hyper::header::{HeaderValue, SET_COOKIE};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct SessionMiddleware {
    manager: Arc<SessionManager>,
    encrypter: Arc<Encrypter>,
    cookies: Arc<CookieSettings>,
}

impl SessionMiddleware {
    pub fn new(manager: Arc<SessionManager>, encrypter: Arc<Encrypter>, cookies: Arc<CookieSettings>) -> Self {
        Self { manager, encrypter, cookies }
    }

    pub fn from_app(app: &Application) -> FrameworkResult<Self> {
        let container = app.container();
        Ok(Self::new(container.get::<SessionManager>()?, container.get::<Encrypter>()?, container.get::<CookieSettings>()?))
    }

    /// Sweep expired sessions on the blocking pool; failures never fail the request
    async fn collect_garbage(&self) {
        let manager = self.manager.clone();
        match tokio::task::spawn_blocking(move || manager.gc()).await {
            Ok(Ok(0)) => {}
            Ok(Ok(collected)) => debug!("Session garbage collection removed {} sessions", collected),
            Ok(Err(e)) => warn!("Session garbage collection failed: {}", e),
            Err(e) => warn!("Session garbage collection task failed: {}", e),
        }
    }
}

#[async_trait]
impl Middleware for SessionMiddleware {
    async fn process(&self, mut req: Request, next: Next<'_>) -> FrameworkResult<Response> {
        let settings = self.manager.settings();

        // A cookie that fails to decrypt starts a fresh session
        let id = cookie_value(req.headers(), &settings.cookie).and_then(|value| self.encrypter.decrypt_string(&value).ok());
        let mut session = self.manager.build(id);
        session.start()?;

        if settings.wins_lottery() {
            self.collect_garbage().await;
        }

        let handle: SessionHandle = Arc::new(Mutex::new(session));
        req.extensions_mut().insert(handle.clone());

        let mut response = next.run(req).await?;

        let mut session = handle.lock();
        let mut cookie = self.cookies.make(settings.cookie.clone(), self.encrypter.encrypt_string(session.id())?);
        cookie.set_max_age(Duration::seconds(i64::try_from(settings.max_lifetime()).unwrap_or(i64::MAX)));
        match HeaderValue::from_str(&cookie.encoded().to_string()) {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
            }
            Err(_) => warn!("Session cookie produced an invalid header value"),
        }
        session.save()?;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{EmptyResponse, IntoResponse};
    use crate::session::{ArraySessionHandler, SessionHandler, SessionSettings};
    use hyper::header::COOKIE;
    use serde_json::json;

    fn middleware() -> SessionMiddleware {
        middleware_with(Arc::new(ArraySessionHandler::new()), 10)
    }

    fn middleware_with(handler: Arc<ArraySessionHandler>, expire_minutes: u64) -> SessionMiddleware {
        let settings = SessionSettings {
            driver: "array".to_string(),
            cookie: "trellis_session".to_string(),
            expire_minutes,
            lottery: (1, 1),
        };
        let encrypter = Encrypter::from_app_key(&Encrypter::generate_key().unwrap()).unwrap();
        SessionMiddleware::new(Arc::new(SessionManager::new(settings, handler)), Arc::new(encrypter), Arc::new(CookieSettings::default()))
    }

    fn request() -> Request {
        hyper::Request::builder().uri("/").body(Default::default()).unwrap()
    }

    fn session_cookie(response: &Response) -> String {
        let header = response.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
        let cookie = cookie::Cookie::parse_encoded(header.to_string()).unwrap();
        format!("{}={}", cookie.name(), cookie.value())
    }

    #[tokio::test]
    async fn test_session_round_trip() {
        let chain: Vec<Arc<dyn Middleware>> = vec![Arc::new(middleware())];

        let write = |req: Request| async move {
            let handle = req.extensions().get::<SessionHandle>().cloned().unwrap();
            let mut session = handle.lock();
            let visits = session.get("visits").and_then(|v| v.as_u64()).unwrap_or(0);
            session.put("visits", json!(visits + 1));
            drop(session);
            EmptyResponse::new().with_header("x-visits", (visits + 1).to_string()).into_response()
        };

        let first = Next::new(&chain, &write).run(hyper::Request::builder().uri("/").body(Default::default()).unwrap()).await.unwrap();
        assert_eq!(first.headers()["x-visits"], "1");
        let cookie = session_cookie(&first);
        assert!(cookie.starts_with("trellis_session="));

        let req = hyper::Request::builder().uri("/").header(COOKIE, cookie).body(Default::default()).unwrap();
        let second = Next::new(&chain, &write).run(req).await.unwrap();
        assert_eq!(second.headers()["x-visits"], "2");
    }

    #[tokio::test]
    async fn test_tampered_cookie_starts_fresh_session() {
        let chain: Vec<Arc<dyn Middleware>> = vec![Arc::new(middleware())];
        let read = |req: Request| async move {
            let handle = req.extensions().get::<SessionHandle>().cloned().unwrap();
            let has_token = handle.lock().token().is_some();
            EmptyResponse::new().with_header("x-token", has_token.to_string()).into_response()
        };

        let req = hyper::Request::builder().uri("/").header(COOKIE, "trellis_session=garbage").body(Default::default()).unwrap();
        let response = Next::new(&chain, &read).run(req).await.unwrap();
        assert_eq!(response.headers()["x-token"], "true");
        assert!(response.headers().contains_key(SET_COOKIE));
    }

    #[tokio::test]
    async fn test_requests_collect_expired_sessions() {
        let handler = Arc::new(ArraySessionHandler::new());
        handler.write("stale", "{}").unwrap();
        handler.write("fresh", "{}").unwrap();
        handler.backdate("stale", chrono::Duration::minutes(11));

        let chain: Vec<Arc<dyn Middleware>> = vec![Arc::new(middleware_with(handler.clone(), 10))];
        let ok = |_req: Request| async { EmptyResponse::new().into_response() };
        Next::new(&chain, &ok).run(request()).await.unwrap();

        assert_eq!(handler.read("stale").unwrap(), None);
        assert!(handler.read("fresh").unwrap().is_some());
        // fresh plus the session this request started
        assert_eq!(handler.len(), 2);
    }

    #[tokio::test]
    async fn test_huge_lifetime_caps_cookie_max_age() {
        let chain: Vec<Arc<dyn Middleware>> = vec![Arc::new(middleware_with(Arc::new(ArraySessionHandler::new()), u64::MAX))];
        let ok = |_req: Request| async { EmptyResponse::new().into_response() };
        let response = Next::new(&chain, &ok).run(request()).await.unwrap();

        let header = response.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
        let cookie = cookie::Cookie::parse_encoded(header.to_string()).unwrap();
        assert_eq!(cookie.max_age(), Some(Duration::seconds(i64::MAX)));
    }
}
