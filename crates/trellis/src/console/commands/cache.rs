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

//! `cache:clear`

use crate::application::Application;
use crate::cache::CacheStore;
use crate::config::ConfigCache;
use crate::console::{ConsoleCommand, SUCCESS};
use crate::error::FrameworkResult;
use crate::routing::ROUTE_MANIFEST;
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::io::Write;
use std::sync::Arc;

pub struct ClearCommand;

impl ConsoleCommand for ClearCommand {
    fn definition(&self) -> Command {
        Command::new("cache:clear")
            .about("Flush the application cache")
            .arg(Arg::new("all").long("all").action(ArgAction::SetTrue).help("Also remove the configuration and route caches"))
    }

    fn execute(&self, app: &Application, args: &ArgMatches, output: &mut dyn Write) -> FrameworkResult<i32> {
        app.container().get::<Arc<dyn CacheStore>>()?.flush()?;
        writeln!(output, "Application cache cleared.")?;

        if args.get_flag("all") {
            ConfigCache::new(app).clear()?;
            let manifest = app.storage_path(ROUTE_MANIFEST);
            if manifest.is_file() {
                std::fs::remove_file(manifest)?;
            }
            writeln!(output, "Configuration and route caches cleared.")?;
        }
        Ok(SUCCESS)
    }
}
