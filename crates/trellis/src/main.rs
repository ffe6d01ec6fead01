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

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use trellis::env::Env;
use trellis::server::{Server, ServerConfig};
use trellis::{Application, HttpKernel, logging};

/// Serve a Trellis application over HTTP
#[derive(Parser, Debug)]
#[command(name = "trellis-server", version, about = "Trellis HTTP server")]
struct Args {
    /// Project root containing `.env` and `config/`
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Address to bind (overrides `server.bind_address` and $TRELLIS_BIND_ADDRESS)
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let env = Env::load(&args.root.join(".env")).context("Failed to read the project environment")?;
    let environment = env.get("APP_ENV").unwrap_or_else(|| "production".to_string());
    let app = Application::builder(&args.root).environment(environment.as_str()).build()?;

    let kernel = HttpKernel::new(app.clone());
    kernel.bootstrap().context("Failed to bootstrap the application")?;
    logging::init_default();
    info!("Starting Trellis in {} mode", app.environment());

    let app_config = app.config()?;
    let mut config = ServerConfig::from_config(&app_config).with_env_overrides(&env);
    if let Some(bind) = args.bind {
        config.bind_address = bind;
    }
    info!("Loaded server configuration: bind_address={}", config.bind_address);

    let server = Server::new(kernel, config)?;
    server.run().await?;

    if let Ok(guard) = app.container().get::<logging::LogGuard>() {
        guard.flush();
    }
    Ok(())
}
