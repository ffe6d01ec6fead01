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

//! `app:*` commands

use crate::application::Application;
use crate::config::ConfigCache;
use crate::console::{ConsoleCommand, FAILURE, SUCCESS};
use crate::encryption::Encrypter;
use crate::env::{Env, write_value};
use crate::error::FrameworkResult;
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::io::Write;
use tracing::info;

pub struct EnvironmentCommand;

impl ConsoleCommand for EnvironmentCommand {
    fn definition(&self) -> Command {
        Command::new("app:environment").about("Display the current application environment")
    }

    fn execute(&self, app: &Application, _args: &ArgMatches, output: &mut dyn Write) -> FrameworkResult<i32> {
        writeln!(output, "Current application environment: {}", app.environment())?;
        Ok(SUCCESS)
    }
}

/// Generates `APP_KEY` in the project's `.env`
pub struct KeyCommand;

impl ConsoleCommand for KeyCommand {
    fn definition(&self) -> Command {
        Command::new("app:key")
            .about("Generate the application encryption key")
            .arg(Arg::new("show").long("show").action(ArgAction::SetTrue).help("Display the key instead of writing it"))
            .arg(Arg::new("force").long("force").action(ArgAction::SetTrue).help("Replace an existing key"))
    }

    fn execute(&self, app: &Application, args: &ArgMatches, output: &mut dyn Write) -> FrameworkResult<i32> {
        let key = Encrypter::generate_key()?;
        if args.get_flag("show") {
            writeln!(output, "{}", key)?;
            return Ok(SUCCESS);
        }

        let path = app.root_path(".env");
        let current = Env::load(&path)?.get("APP_KEY").unwrap_or_default();
        if !current.is_empty() && !args.get_flag("force") {
            writeln!(output, "An application key is already set. Use --force to replace it.")?;
            return Ok(FAILURE);
        }

        write_value(&path, "APP_KEY", &key)?;
        info!("Application key written to {}", path.display());
        writeln!(output, "Application key set successfully.")?;
        if ConfigCache::new(app).exists() {
            writeln!(output, "Run config:cache to refresh the cached configuration.")?;
        }
        Ok(SUCCESS)
    }
}

#[cfg(test)]
mod tests {
    use crate::console::{FAILURE, SUCCESS};
    use crate::env::Env;
    use crate::testing::TestApplication;

    #[test]
    fn test_environment() {
        let test = TestApplication::new().unwrap();
        let result = test.console().run(&["app:environment"]);
        assert_eq!(result.code, SUCCESS);
        assert_eq!(result.output, "Current application environment: testing\n");
    }

    #[test]
    fn test_key_generation() {
        let test = TestApplication::new().unwrap();
        let console = test.console();

        let shown = console.run(&["app:key", "--show"]);
        assert_eq!(shown.code, SUCCESS);
        assert!(shown.output.starts_with("base64:"));

        let before = Env::load(&test.root().join(".env")).unwrap().get("APP_KEY").unwrap();
        let refused = console.run(&["app:key"]);
        assert_eq!(refused.code, FAILURE);
        assert!(refused.output.contains("--force"));

        let forced = console.run(&["app:key", "--force"]);
        assert_eq!(forced.code, SUCCESS);
        let after = Env::load(&test.root().join(".env")).unwrap().get("APP_KEY").unwrap();
        assert_ne!(before, after);
        assert!(after.starts_with("base64:"));
    }
}
