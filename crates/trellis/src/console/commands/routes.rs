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

//! `routes:*` commands

use crate::application::Application;
use crate::console::{ConsoleCommand, FAILURE, SUCCESS, write_table};
use crate::error::{FrameworkError, FrameworkResult};
use crate::routing::{ROUTE_MANIFEST, RouteInfo, Router};
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::io::Write;

/// Lists the registered routes, or the cached manifest with `--cached`
pub struct ListCommand;

impl ListCommand {
    fn infos(app: &Application, cached: bool) -> FrameworkResult<Option<Vec<RouteInfo>>> {
        if !cached {
            return Ok(Some(app.container().get::<Router>()?.route_infos()));
        }

        let path = app.storage_path(ROUTE_MANIFEST);
        if !path.is_file() {
            return Ok(None);
        }
        let contents = std::fs::read(&path)?;
        let infos = serde_json::from_slice(&contents).map_err(|e| FrameworkError::framework(format!("Corrupt route manifest {}: {}", path.display(), e)))?;
        Ok(Some(infos))
    }
}

impl ConsoleCommand for ListCommand {
    fn definition(&self) -> Command {
        Command::new("routes:list")
            .about("List the registered routes")
            .arg(Arg::new("method").long("method").value_name("METHOD").help("Only routes accepting METHOD"))
            .arg(Arg::new("name").long("name").value_name("TEXT").help("Only routes whose name contains TEXT"))
            .arg(Arg::new("path").long("path").value_name("TEXT").help("Only routes whose path contains TEXT"))
            .arg(Arg::new("cached").long("cached").action(ArgAction::SetTrue).help("Read the cached route manifest"))
    }

    fn execute(&self, app: &Application, args: &ArgMatches, output: &mut dyn Write) -> FrameworkResult<i32> {
        let Some(infos) = Self::infos(app, args.get_flag("cached"))? else {
            writeln!(output, "Route cache not found. Run routes:cache first.")?;
            return Ok(FAILURE);
        };

        let method = args.get_one::<String>("method").map(|m| m.to_ascii_uppercase());
        let name = args.get_one::<String>("name");
        let path = args.get_one::<String>("path");

        let rows: Vec<Vec<String>> = infos
            .into_iter()
            .filter(|info| method.as_ref().is_none_or(|m| info.methods.contains(m)))
            .filter(|info| name.is_none_or(|n| info.name.as_deref().is_some_and(|route| route.contains(n.as_str()))))
            .filter(|info| path.is_none_or(|p| info.path.contains(p.as_str())))
            .map(|info| {
                vec![
                    info.methods.join("|"),
                    info.path,
                    info.name.unwrap_or_default(),
                    info.action,
                    info.middleware.join(", "),
                ]
            })
            .collect();

        if rows.is_empty() {
            writeln!(output, "No routes found.")?;
            return Ok(SUCCESS);
        }
        write_table(output, &["Method", "Path", "Name", "Action", "Middleware"], &rows)?;
        Ok(SUCCESS)
    }
}

/// Writes the route manifest to `storage/cache/routes.cache`
pub struct CacheCommand;

impl ConsoleCommand for CacheCommand {
    fn definition(&self) -> Command {
        Command::new("routes:cache").about("Write the route manifest")
    }

    fn execute(&self, app: &Application, _args: &ArgMatches, output: &mut dyn Write) -> FrameworkResult<i32> {
        let infos = app.container().get::<Router>()?.route_infos();
        let path = app.storage_path(ROUTE_MANIFEST);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, serde_json::to_vec_pretty(&infos)?)?;
        writeln!(output, "Routes cached successfully.")?;
        Ok(SUCCESS)
    }
}

pub struct ClearCommand;

impl ConsoleCommand for ClearCommand {
    fn definition(&self) -> Command {
        Command::new("routes:clear").about("Remove the route manifest")
    }

    fn execute(&self, app: &Application, _args: &ArgMatches, output: &mut dyn Write) -> FrameworkResult<i32> {
        let path = app.storage_path(ROUTE_MANIFEST);
        if path.is_file() {
            std::fs::remove_file(path)?;
            writeln!(output, "Route cache cleared.")?;
        } else {
            writeln!(output, "Route cache not found.")?;
        }
        Ok(SUCCESS)
    }
}
