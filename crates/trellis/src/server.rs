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

//! HTTP server running the kernel on hyper

use crate::config::Config;
use crate::env::Env;
use crate::error::{FrameworkError, FrameworkResult};
use crate::http::{HttpException, Request, Response};
use crate::kernel::HttpKernel;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::StatusCode;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use hyper_util::service::TowerToHyperService;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower::{BoxError, ServiceBuilder};
use tracing::{debug, error, info, warn};

/// Server settings from the `server` config section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to bind the HTTP server to
    pub bind_address: String,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,

    /// Maximum request body size in bytes
    pub max_body_size: usize,

    /// Requests handled at once across all connections
    pub concurrency_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8000".to_string(),
            request_timeout_secs: 30,
            max_body_size: 10 * 1024 * 1024, // 10MB
            concurrency_limit: 1024,
        }
    }
}

impl ServerConfig {
    pub fn from_config(config: &Config) -> Self {
        let defaults = Self::default();
        Self {
            bind_address: config.string_or("server.bind_address", &defaults.bind_address),
            request_timeout_secs: config.u64_or("server.request_timeout", defaults.request_timeout_secs),
            max_body_size: config.get_u64("server.max_body_size").map_or(defaults.max_body_size, |size| size as usize),
            concurrency_limit: config.get_u64("server.concurrency_limit").map_or(defaults.concurrency_limit, |limit| limit as usize),
        }
    }

    /// Apply `TRELLIS_*` variables on top of the configured values
    pub fn with_env_overrides(mut self, env: &Env) -> Self {
        if let Some(address) = env.get("TRELLIS_BIND_ADDRESS") {
            self.bind_address = address;
        }
        if let Some(timeout) = env.get("TRELLIS_REQUEST_TIMEOUT").and_then(|v| v.parse().ok()) {
            self.request_timeout_secs = timeout;
        }
        if let Some(size) = env.get("TRELLIS_MAX_BODY_SIZE").and_then(|v| v.parse().ok()) {
            self.max_body_size = size;
        }
        if let Some(limit) = env.get("TRELLIS_CONCURRENCY_LIMIT").and_then(|v| v.parse().ok()) {
            self.concurrency_limit = limit;
        }
        self
    }
}

pub struct Server {
    kernel: Arc<HttpKernel>,
    config: ServerConfig,
    bind_address: SocketAddr,
}

impl Server {
    pub fn new(kernel: HttpKernel, config: ServerConfig) -> FrameworkResult<Self> {
        let bind_address: SocketAddr = config
            .bind_address
            .parse()
            .map_err(|e| FrameworkError::config(format!("Invalid bind address '{}': {}", config.bind_address, e)))?;

        Ok(Self {
            kernel: Arc::new(kernel),
            config,
            bind_address,
        })
    }

    pub fn bind_address(&self) -> SocketAddr {
        self.bind_address
    }

    /// Serve until Ctrl-C
    pub async fn run(self) -> FrameworkResult<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    pub async fn run_until<F>(self, shutdown: F) -> FrameworkResult<()>
    where
        F: Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.bind_address).await?;
        info!("Trellis listening on http://{}", listener.local_addr()?);
        self.serve(listener, shutdown).await
    }

    /// Accept connections on `listener` until `shutdown` resolves
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> FrameworkResult<()>
    where
        F: Future<Output = ()>,
    {
        let limit = GlobalConcurrencyLimitLayer::new(self.config.concurrency_limit.max(1));
        let timeout = Duration::from_secs(self.config.request_timeout_secs.max(1));
        let max_body_size = self.config.max_body_size;
        tokio::pin!(shutdown);

        loop {
            let (stream, remote_addr) = tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                        continue;
                    }
                },
                _ = &mut shutdown => {
                    info!("Shutting down");
                    return Ok(());
                }
            };

            let io = TokioIo::new(stream);
            let kernel = self.kernel.clone();
            let service = ServiceBuilder::new()
                .map_result(timeout_response)
                .layer(limit.clone())
                .timeout(timeout)
                .service_fn(move |req: hyper::Request<Incoming>| {
                    let kernel = kernel.clone();
                    async move { Ok::<_, Infallible>(handle(&kernel, req, remote_addr, max_body_size).await) }
                });

            tokio::task::spawn(async move {
                if let Err(err) = http1::Builder::new().serve_connection(io, TowerToHyperService::new(service)).await {
                    debug!("Error serving connection from {}: {}", remote_addr, err);
                }
            });
        }
    }
}

/// Read the body under the size limit, then hand the request to the kernel
async fn handle(kernel: &HttpKernel, req: hyper::Request<Incoming>, remote_addr: SocketAddr, max_body_size: usize) -> Response {
    let (mut parts, body) = req.into_parts();
    let body = match Limited::new(body, max_body_size).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.is::<LengthLimitError>() => {
            warn!("Rejected {} {} from {}: body over {} bytes", parts.method, parts.uri.path(), remote_addr, max_body_size);
            return Response::from(FrameworkError::from(HttpException::new(StatusCode::PAYLOAD_TOO_LARGE)));
        }
        Err(e) => {
            debug!("Failed to read body from {}: {}", remote_addr, e);
            return Response::from(FrameworkError::from(HttpException::new(StatusCode::BAD_REQUEST)));
        }
    };

    parts.extensions.insert(remote_addr);
    kernel.handle(Request::from_parts(parts, body)).await
}

/// Elapsed requests become a 408 response; other service errors pass through to hyper
fn timeout_response(result: Result<Response, BoxError>) -> Result<Response, BoxError> {
    match result {
        Err(e) if e.is::<tower::timeout::error::Elapsed>() => {
            warn!("Request timed out");
            Ok(Response::from(FrameworkError::from(HttpException::new(StatusCode::REQUEST_TIMEOUT))))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{EmptyResponse, IntoResponse};
    use crate::routing::{Controller, Router};
    use crate::testing::TestApplication;
    use serde_json::json;
    use std::collections::HashMap;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[test]
    fn test_config_and_env_overrides() {
        let mut config = Config::default();
        assert_eq!(ServerConfig::from_config(&config), ServerConfig::default());

        config.set("server.bind_address", json!("0.0.0.0:9000"));
        config.set("server.request_timeout", json!(5));
        config.set("server.max_body_size", json!(1024));
        let settings = ServerConfig::from_config(&config);
        assert_eq!(settings.bind_address, "0.0.0.0:9000");
        assert_eq!(settings.request_timeout_secs, 5);
        assert_eq!(settings.max_body_size, 1024);

        let env = Env::from_vars(HashMap::from([
            ("TRELLIS_BIND_ADDRESS".to_string(), "127.0.0.1:9100".to_string()),
            ("TRELLIS_CONCURRENCY_LIMIT".to_string(), "8".to_string()),
            ("TRELLIS_REQUEST_TIMEOUT".to_string(), "soon".to_string()),
        ]));
        let settings = settings.with_env_overrides(&env);
        assert_eq!(settings.bind_address, "127.0.0.1:9100");
        assert_eq!(settings.concurrency_limit, 8);
        assert_eq!(settings.request_timeout_secs, 5);
    }

    #[test]
    fn test_invalid_bind_address() {
        let dir = tempfile::tempdir().unwrap();
        let app = crate::application::Application::new(dir.path()).unwrap();
        let config = ServerConfig {
            bind_address: "not an address".to_string(),
            ..ServerConfig::default()
        };
        let err = Server::new(HttpKernel::new(app), config).err().unwrap();
        assert!(err.to_string().starts_with("Configuration error: Invalid bind address 'not an address'"));
    }

    struct Slow;

    impl Controller for Slow {
        fn routes(&self, router: &mut Router) -> FrameworkResult<()> {
            router.get("/slow", |_req: Request| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                EmptyResponse::new().into_response()
            });
            Ok(())
        }
    }

    /// Serve `test` on an ephemeral port, send one raw request and return the raw response
    async fn exchange(test: &TestApplication, config: ServerConfig, request: &[u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop, stopped) = tokio::sync::oneshot::channel::<()>();

        let server = Server::new(HttpKernel::new(test.app().clone()), config).unwrap();
        let running = tokio::spawn(server.serve(listener, async {
            let _ = stopped.await;
        }));

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream.write_all(request).await.unwrap();
        let mut raw = String::new();
        stream.read_to_string(&mut raw).await.unwrap();

        stop.send(()).unwrap();
        running.await.unwrap().unwrap();
        raw
    }

    #[tokio::test]
    async fn test_serves_requests_until_shutdown() {
        let test = TestApplication::new().unwrap();
        let raw = exchange(
            &test,
            ServerConfig::default(),
            b"GET /nowhere HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nConnection: close\r\n\r\n",
        )
        .await;
        assert!(raw.starts_with("HTTP/1.1 404"));
        assert!(raw.ends_with(r#"{"error":{"status":404,"message":"Not Found"}}"#));
    }

    #[tokio::test]
    async fn test_slow_requests_time_out() {
        let test = TestApplication::builder()
            .app(|builder| builder.controller("slow", |_| Ok(Slow)))
            .app_config("[routing]\ncontrollers = [\"slow\"]\n")
            .build()
            .unwrap();
        let config = ServerConfig {
            request_timeout_secs: 1,
            ..ServerConfig::default()
        };

        let raw = exchange(&test, config, b"GET /slow HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nConnection: close\r\n\r\n").await;
        assert!(raw.starts_with("HTTP/1.1 408"));
        assert!(raw.ends_with(r#"{"error":{"status":408,"message":"Request Timeout"}}"#));
    }
}
