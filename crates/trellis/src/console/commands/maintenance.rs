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

//! `maintenance:*` commands

use crate::application::{Application, MAINTENANCE_FILE};
use crate::console::{ConsoleCommand, SUCCESS};
use crate::error::{FrameworkError, FrameworkResult};
use clap::{Arg, ArgMatches, Command};
use std::io::Write;
use std::path::Path;
use tracing::info;

const DEFAULT_PAGE: &str = include_str!("../../../resources/templates/maintenance.html");

/// Puts the application into maintenance mode by writing `public/maintenance.html`
pub struct DownCommand;

impl DownCommand {
    /// `--template`, else `resources/views/maintenance.html`, else the built-in page
    fn page(app: &Application, template: Option<&String>) -> FrameworkResult<String> {
        if let Some(template) = template {
            let path = Path::new(template);
            let path = if path.is_absolute() { path.to_path_buf() } else { app.root_path(template) };
            if !path.is_file() {
                return Err(FrameworkError::framework(format!("Maintenance template not found: {}", path.display())));
            }
            return Ok(std::fs::read_to_string(path)?);
        }

        let view = app.resources_path("views/maintenance.html");
        if view.is_file() {
            return Ok(std::fs::read_to_string(view)?);
        }
        Ok(DEFAULT_PAGE.to_string())
    }
}

impl ConsoleCommand for DownCommand {
    fn definition(&self) -> Command {
        Command::new("maintenance:down")
            .about("Put the application into maintenance mode")
            .arg(Arg::new("template").long("template").value_name("PATH").help("HTML page served while down"))
    }

    fn execute(&self, app: &Application, args: &ArgMatches, output: &mut dyn Write) -> FrameworkResult<i32> {
        if app.is_down() {
            writeln!(output, "Application is already down.")?;
            return Ok(SUCCESS);
        }

        let page = Self::page(app, args.get_one::<String>("template"))?;
        std::fs::create_dir_all(app.public_path(""))?;
        std::fs::write(app.public_path(MAINTENANCE_FILE), page)?;

        info!("Application entered maintenance mode");
        writeln!(output, "Application is now in maintenance mode.")?;
        Ok(SUCCESS)
    }
}

pub struct UpCommand;

impl ConsoleCommand for UpCommand {
    fn definition(&self) -> Command {
        Command::new("maintenance:up").about("Bring the application out of maintenance mode")
    }

    fn execute(&self, app: &Application, _args: &ArgMatches, output: &mut dyn Write) -> FrameworkResult<i32> {
        if !app.is_down() {
            writeln!(output, "Application is already up.")?;
            return Ok(SUCCESS);
        }

        std::fs::remove_file(app.public_path(MAINTENANCE_FILE))?;
        info!("Application left maintenance mode");
        writeln!(output, "Application is now live.")?;
        Ok(SUCCESS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestApplication;

    #[test]
    fn test_down_and_up() {
        let test = TestApplication::new().unwrap();
        let console = test.console();

        assert_eq!(console.run(&["maintenance:up"]).output, "Application is already up.\n");

        let down = console.run(&["maintenance:down"]);
        assert_eq!(down.code, SUCCESS);
        assert_eq!(down.output, "Application is now in maintenance mode.\n");
        assert!(test.app().is_down());
        assert_eq!(std::fs::read_to_string(test.root().join("public").join(MAINTENANCE_FILE)).unwrap(), DEFAULT_PAGE);

        assert_eq!(console.run(&["maintenance:up"]).output, "Application is now live.\n");
        assert!(!test.app().is_down());
    }

    #[test]
    fn test_custom_template() {
        let test = TestApplication::new().unwrap();
        std::fs::write(test.root().join("down.html"), "<h1>Upgrading</h1>").unwrap();

        let result = test.console().run(&["maintenance:down", "--template", "down.html"]);
        assert_eq!(result.code, SUCCESS);
        assert_eq!(std::fs::read_to_string(test.root().join("public").join(MAINTENANCE_FILE)).unwrap(), "<h1>Upgrading</h1>");
    }
}
