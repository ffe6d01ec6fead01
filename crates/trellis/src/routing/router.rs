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

//! Route registration, matching and dispatch over `matchit`

use crate::application::Application;
use crate::error::{FrameworkError, FrameworkResult};
use crate::http::{Request, Response, RouteParams};
use crate::middleware::{Middleware, Next};
use crate::routing::route::{GroupAttributes, Route, RouteInfo};
use crate::routing::{Controller, Handler};
use async_trait::async_trait;
use hyper::Method;
use hyper::header::HOST;
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Route manifest written by `routes:cache`, relative to the storage directory
pub const ROUTE_MANIFEST: &str = "cache/routes.cache";

const SEGMENT: &AsciiSet = &CONTROLS.add(b' ').add(b'"').add(b'#').add(b'<').add(b'>').add(b'?').add(b'`').add(b'{').add(b'}').add(b'/').add(b'%');
const CATCH_ALL: &AsciiSet = &CONTROLS.add(b' ').add(b'"').add(b'#').add(b'<').add(b'>').add(b'?').add(b'`').add(b'{').add(b'}').add(b'%');

/// The route table plus the global middleware wrapped around every dispatch
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
    global_middleware: Vec<String>,
    groups: Vec<GroupAttributes>,
    matcher: OnceCell<matchit::Router<Vec<usize>>>,
    resolved: RwLock<HashMap<String, Arc<dyn Middleware>>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Router with global middleware names, outermost first
    pub fn with_middleware(names: Vec<String>) -> Self {
        Self {
            global_middleware: names,
            ..Self::default()
        }
    }

    pub fn global_middleware(&self) -> &[String] {
        &self.global_middleware
    }

    /// Provide a middleware instance directly instead of building it from the catalog
    pub fn register_middleware(&self, name: &str, middleware: Arc<dyn Middleware>) {
        self.resolved.write().insert(name.to_string(), middleware);
    }

    pub fn get<H: Handler + 'static>(&mut self, path: &str, handler: H) -> &mut Route {
        self.add(&[Method::GET], path, handler)
    }

    pub fn post<H: Handler + 'static>(&mut self, path: &str, handler: H) -> &mut Route {
        self.add(&[Method::POST], path, handler)
    }

    pub fn put<H: Handler + 'static>(&mut self, path: &str, handler: H) -> &mut Route {
        self.add(&[Method::PUT], path, handler)
    }

    pub fn patch<H: Handler + 'static>(&mut self, path: &str, handler: H) -> &mut Route {
        self.add(&[Method::PATCH], path, handler)
    }

    pub fn delete<H: Handler + 'static>(&mut self, path: &str, handler: H) -> &mut Route {
        self.add(&[Method::DELETE], path, handler)
    }

    pub fn options<H: Handler + 'static>(&mut self, path: &str, handler: H) -> &mut Route {
        self.add(&[Method::OPTIONS], path, handler)
    }

    pub fn any<H: Handler + 'static>(&mut self, path: &str, handler: H) -> &mut Route {
        self.add(&[Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE, Method::OPTIONS], path, handler)
    }

    /// Register a route inside the current group context
    pub fn add<H: Handler + 'static>(&mut self, methods: &[Method], path: &str, handler: H) -> &mut Route {
        let mut full = String::new();
        let mut middleware = Vec::new();
        let mut name_prefix = String::new();
        for group in &self.groups {
            full = join_paths(&full, &group.prefix);
            middleware.extend(group.middleware.iter().cloned());
            name_prefix.push_str(&group.name_prefix);
        }
        let group = (!self.groups.is_empty()).then(|| full.clone());
        full = join_paths(&full, path);

        let mut route = Route::new(full, methods.to_vec(), Arc::new(handler));
        route.middleware = middleware;
        route.group = group;
        route.name_prefix = name_prefix;

        self.matcher.take();
        self.routes.push(route);
        let index = self.routes.len() - 1;
        &mut self.routes[index]
    }

    /// Register routes sharing a prefix, middleware and name prefix
    pub fn group<F>(&mut self, attributes: GroupAttributes, routes: F) -> FrameworkResult<()>
    where
        F: FnOnce(&mut Router) -> FrameworkResult<()>,
    {
        self.groups.push(attributes);
        let result = routes(self);
        self.groups.pop();
        result
    }

    pub fn controller(&mut self, controller: &dyn Controller) -> FrameworkResult<()> {
        controller.routes(self)
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn route_infos(&self) -> Vec<RouteInfo> {
        self.routes.iter().map(Route::info).collect()
    }

    /// Build the matcher, reporting conflicting patterns and duplicate names
    pub fn compile(&self) -> FrameworkResult<()> {
        self.matcher()?;

        let mut names: HashMap<&str, &str> = HashMap::new();
        for route in &self.routes {
            if let Some(name) = route.route_name() {
                if let Some(existing) = names.insert(name, &route.path) {
                    return Err(FrameworkError::Routing(format!("Route name '{}' used by both {} and {}", name, existing, route.path)));
                }
            }
        }
        Ok(())
    }

    fn matcher(&self) -> FrameworkResult<&matchit::Router<Vec<usize>>> {
        self.matcher.get_or_try_init(|| {
            let mut by_path: Vec<(&str, Vec<usize>)> = Vec::new();
            for (index, route) in self.routes.iter().enumerate() {
                match by_path.iter_mut().find(|(path, _)| *path == route.path) {
                    Some((_, indices)) => indices.push(index),
                    None => by_path.push((&route.path, vec![index])),
                }
            }

            let mut matcher = matchit::Router::new();
            for (path, indices) in by_path {
                matcher.insert(path, indices)?;
            }
            debug!("Compiled {} routes", self.routes.len());
            Ok(matcher)
        })
    }

    /// Find the route for a request
    pub fn find(&self, req: &Request) -> FrameworkResult<(&Route, RouteParams)> {
        let method = req.method();
        let path = req.uri().path();
        let not_found = || FrameworkError::NotFound {
            method: method.clone(),
            path: path.to_string(),
        };

        let matched = self.matcher()?.at(path).map_err(|_| not_found())?;
        let params = RouteParams(matched.params.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect());

        let scheme = req.uri().scheme_str().unwrap_or("http").to_ascii_lowercase();
        let (host, port) = authority(req);

        let candidates: Vec<&Route> = matched.value.iter().map(|&i| &self.routes[i]).filter(|route| route.accepts(&scheme, host.as_deref(), port)).collect();
        if candidates.is_empty() {
            return Err(not_found());
        }

        if let Some(route) = candidates.iter().copied().find(|route| route.allows(method)) {
            return Ok((route, params));
        }

        let mut allowed: Vec<Method> = Vec::new();
        for route in &candidates {
            for m in route.methods() {
                if !allowed.contains(m) {
                    allowed.push(m.clone());
                }
            }
        }
        if allowed.contains(&Method::GET) && !allowed.contains(&Method::HEAD) {
            allowed.push(Method::HEAD);
        }

        Err(FrameworkError::MethodNotAllowed {
            method: method.clone(),
            path: path.to_string(),
            allowed,
        })
    }

    /// Run the global middleware around route matching, then the route middleware around the handler
    pub async fn dispatch(&self, app: &Application, req: Request) -> FrameworkResult<Response> {
        let global = self.resolve(app, &self.global_middleware)?;
        let endpoint = RouteEndpoint { router: self, app };
        Next::new(&global, &endpoint).run(req).await
    }

    fn resolve(&self, app: &Application, names: &[String]) -> FrameworkResult<Vec<Arc<dyn Middleware>>> {
        let mut chain = Vec::with_capacity(names.len());
        for name in names {
            if let Some(middleware) = self.resolved.read().get(name).cloned() {
                chain.push(middleware);
                continue;
            }

            let middleware = app.catalog().middleware.get(name)?(app)?;
            debug!("Resolved middleware '{}'", name);
            self.resolved.write().entry(name.clone()).or_insert_with(|| middleware.clone());
            chain.push(middleware);
        }
        Ok(chain)
    }

    /// Build the path of a named route. Parameters not used by the pattern become the query string.
    pub fn url_for(&self, name: &str, params: &HashMap<String, String>) -> FrameworkResult<String> {
        let route = self
            .routes
            .iter()
            .find(|route| route.route_name() == Some(name))
            .ok_or_else(|| FrameworkError::Routing(format!("Route '{}' not defined", name)))?;

        let mut used = Vec::new();
        let mut path = String::new();
        let mut rest = route.path.as_str();
        while let Some(start) = rest.find('{') {
            path.push_str(&rest[..start]);
            let end = rest[start..].find('}').map(|e| start + e).ok_or_else(|| FrameworkError::Routing(format!("Malformed route pattern {}", route.path)))?;
            let placeholder = &rest[start + 1..end];
            let (key, catch_all) = match placeholder.strip_prefix('*') {
                Some(key) => (key, true),
                None => (placeholder, false),
            };

            let value = params.get(key).ok_or_else(|| FrameworkError::Routing(format!("Missing parameter '{}' for route '{}'", key, name)))?;
            let set = if catch_all { CATCH_ALL } else { SEGMENT };
            path.push_str(&utf8_percent_encode(value, set).to_string());
            used.push(key);
            rest = &rest[end + 1..];
        }
        path.push_str(rest);

        let mut extra: Vec<(&String, &String)> = params.iter().filter(|(key, _)| !used.contains(&key.as_str())).collect();
        if !extra.is_empty() {
            extra.sort();
            let query = url::form_urlencoded::Serializer::new(String::new()).extend_pairs(extra).finish();
            path.push('?');
            path.push_str(&query);
        }
        Ok(path)
    }
}

struct RouteEndpoint<'a> {
    router: &'a Router,
    app: &'a Application,
}

#[async_trait]
impl Handler for RouteEndpoint<'_> {
    async fn call(&self, mut req: Request) -> FrameworkResult<Response> {
        let (route, params) = self.router.find(&req)?;
        let chain = self.router.resolve(self.app, &route.middleware)?;
        req.extensions_mut().insert(params);
        req.extensions_mut().insert(route.info());
        Next::new(&chain, route.handler.as_ref()).run(req).await
    }
}

fn authority(req: &Request) -> (Option<String>, Option<u16>) {
    if let Some(host) = req.uri().host() {
        return (Some(host.to_string()), req.uri().port_u16());
    }

    let Some(header) = req.headers().get(HOST).and_then(|h| h.to_str().ok()) else {
        return (None, None);
    };
    match header.rsplit_once(':') {
        Some((host, port)) if !port.contains(']') => match port.parse() {
            Ok(port) => (Some(host.to_string()), Some(port)),
            Err(_) => (Some(header.to_string()), None),
        },
        _ => (Some(header.to_string()), None),
    }
}

fn join_paths(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_matches('/');
    match (base.is_empty(), path.is_empty()) {
        (true, true) => "/".to_string(),
        (true, false) => format!("/{}", path),
        (false, true) => base.to_string(),
        (false, false) => format!("{}/{}", base, path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{EmptyResponse, HtmlResponse, IntoResponse};
    use http_body_util::BodyExt;
    use hyper::StatusCode;

    fn request(method: Method, uri: &str) -> Request {
        hyper::Request::builder().method(method).uri(uri).header(HOST, "example.com:8080").body(Default::default()).unwrap()
    }

    async fn ok(_req: Request) -> FrameworkResult<Response> {
        EmptyResponse::new().into_response()
    }

    fn router() -> Router {
        let mut router = Router::new();
        router.get("/", ok).name("home");
        router.get("/users/{id}", ok).name("users.show");
        router.post("/users/{id}", ok);
        router.get("/files/{*path}", ok).name("files");
        router
            .group(GroupAttributes::prefix("/admin").middleware(&["auth"]).name_prefix("admin."), |router| {
                router.get("/", ok).name("dashboard");
                router.delete("/users/{id}", ok).middleware(&["audit"]);
                Ok(())
            })
            .unwrap();
        router
    }

    #[test]
    fn test_matching_and_params() {
        let router = router();
        let (route, params) = router.find(&request(Method::GET, "/users/42")).unwrap();
        assert_eq!(route.route_name(), Some("users.show"));
        assert_eq!(params.get("id"), Some("42"));

        let (route, params) = router.find(&request(Method::GET, "/files/a/b.txt")).unwrap();
        assert_eq!(route.path(), "/files/{*path}");
        assert_eq!(params.get("path"), Some("a/b.txt"));

        let (route, _) = router.find(&request(Method::HEAD, "/users/1")).unwrap();
        assert_eq!(route.methods(), &[Method::GET]);
    }

    #[test]
    fn test_not_found_and_method_not_allowed() {
        let router = router();
        assert!(matches!(router.find(&request(Method::GET, "/missing")), Err(FrameworkError::NotFound { .. })));

        match router.find(&request(Method::PUT, "/users/1")) {
            Err(FrameworkError::MethodNotAllowed { allowed, .. }) => assert_eq!(allowed, vec![Method::GET, Method::POST, Method::HEAD]),
            other => panic!("unexpected: {:?}", other.map(|(route, _)| route.path().to_string())),
        }
    }

    #[test]
    fn test_groups() {
        let router = router();
        let infos = router.route_infos();
        let dashboard = infos.iter().find(|info| info.path == "/admin").unwrap();
        assert_eq!(dashboard.name.as_deref(), Some("admin.dashboard"));
        assert_eq!(dashboard.middleware, vec!["auth"]);
        assert_eq!(dashboard.group.as_deref(), Some("/admin"));

        let delete = infos.iter().find(|info| info.path == "/admin/users/{id}").unwrap();
        assert_eq!(delete.middleware, vec!["auth", "audit"]);
        assert_eq!(delete.name, None);
    }

    #[test]
    fn test_host_constraint() {
        let mut router = Router::new();
        router.get("/status", ok).host("api.example.com");
        assert!(matches!(router.find(&request(Method::GET, "/status")), Err(FrameworkError::NotFound { .. })));

        let req = hyper::Request::builder().uri("/status").header(HOST, "api.example.com").body(Default::default()).unwrap();
        assert!(router.find(&req).is_ok());
    }

    #[test]
    fn test_url_for() {
        let router = router();
        let params = HashMap::from([("id".to_string(), "a b".to_string()), ("tab".to_string(), "posts".to_string())]);
        assert_eq!(router.url_for("users.show", &params).unwrap(), "/users/a%20b?tab=posts");
        assert_eq!(router.url_for("admin.dashboard", &HashMap::new()).unwrap(), "/admin");

        let files = HashMap::from([("path".to_string(), "docs/readme.md".to_string())]);
        assert_eq!(router.url_for("files", &files).unwrap(), "/files/docs/readme.md");

        assert!(router.url_for("users.show", &HashMap::new()).is_err());
        assert!(router.url_for("missing", &HashMap::new()).is_err());
    }

    #[test]
    fn test_compile_errors() {
        let mut router = Router::new();
        router.get("/a", ok).name("same");
        router.get("/b", ok).name("same");
        assert!(matches!(router.compile(), Err(FrameworkError::Routing(_))));

        let mut router = Router::new();
        router.get("/{id}", ok);
        router.get("/{name}", ok);
        assert!(router.compile().is_err());
    }

    #[tokio::test]
    async fn test_dispatch_with_registered_middleware() {
        struct Header;

        #[async_trait]
        impl Middleware for Header {
            async fn process(&self, req: Request, next: Next<'_>) -> FrameworkResult<Response> {
                let mut response = next.run(req).await?;
                response.headers_mut().insert("x-global", "1".parse().unwrap());
                Ok(response)
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let app = Application::new(dir.path()).unwrap();
        let mut router = Router::with_middleware(vec!["header".to_string()]);
        router.register_middleware("header", Arc::new(Header));
        router.get("/hello/{name}", |req: Request| async move {
            let name = req.extensions().get::<RouteParams>().and_then(|p| p.get("name")).unwrap_or("nobody").to_string();
            HtmlResponse::new(format!("hello {}", name)).into_response()
        });

        let response = router.dispatch(&app, request(Method::GET, "/hello/ada")).await.unwrap();
        assert_eq!(response.headers()["x-global"], "1");
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"hello ada");

        let err = router.dispatch(&app, request(Method::GET, "/nope")).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }
}
