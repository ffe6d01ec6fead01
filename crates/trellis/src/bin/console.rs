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

use std::path::PathBuf;
use trellis::env::Env;
use trellis::{Application, ConsoleKernel, logging};

/// Runs console commands against the project in the current directory,
/// or in `$TRELLIS_ROOT` when set
fn main() {
    let root = std::env::var_os("TRELLIS_ROOT").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
    let environment = Env::load(&root.join(".env")).ok().and_then(|env| env.get("APP_ENV")).unwrap_or_else(|| "production".to_string());

    let code = match Application::builder(&root).environment(environment.as_str()).build() {
        Ok(app) => {
            let kernel = ConsoleKernel::new(app.clone());
            let code = kernel.handle(std::env::args_os(), &mut std::io::stdout());
            if let Ok(guard) = app.container().get::<logging::LogGuard>() {
                guard.flush();
            }
            code
        }
        Err(e) => {
            eprintln!("{}", e);
            1
        }
    };
    std::process::exit(code);
}
