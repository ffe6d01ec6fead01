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

//! `config:*` commands

use crate::application::Application;
use crate::config::{ConfigCache, ConfigLoader};
use crate::console::{ConsoleCommand, SUCCESS, write_table};
use crate::env::Env;
use crate::error::FrameworkResult;
use clap::{Arg, ArgMatches, Command};
use serde_json::Value;
use std::io::Write;

/// Writes the freshly loaded configuration to the cache file
pub struct CacheCommand;

impl ConsoleCommand for CacheCommand {
    fn definition(&self) -> Command {
        Command::new("config:cache").about("Cache the configuration into a single file")
    }

    fn execute(&self, app: &Application, _args: &ArgMatches, output: &mut dyn Write) -> FrameworkResult<i32> {
        let env = app.container().get::<Env>()?;
        let config = ConfigLoader::new(app, &env).load()?;

        let cache = ConfigCache::new(app);
        cache.write(&config)?;
        writeln!(output, "Configuration cached successfully.")?;
        Ok(SUCCESS)
    }
}

pub struct ClearCommand;

impl ConsoleCommand for ClearCommand {
    fn definition(&self) -> Command {
        Command::new("config:clear").about("Remove the configuration cache file")
    }

    fn execute(&self, app: &Application, _args: &ArgMatches, output: &mut dyn Write) -> FrameworkResult<i32> {
        if ConfigCache::new(app).clear()? {
            writeln!(output, "Configuration cache cleared.")?;
        } else {
            writeln!(output, "Configuration cache not found.")?;
        }
        Ok(SUCCESS)
    }
}

/// Lists the flattened configuration
pub struct ListCommand;

impl ConsoleCommand for ListCommand {
    fn definition(&self) -> Command {
        Command::new("config:list")
            .about("List the configuration values")
            .arg(Arg::new("filter").long("filter").value_name("TEXT").help("Only keys containing TEXT"))
    }

    fn execute(&self, app: &Application, args: &ArgMatches, output: &mut dyn Write) -> FrameworkResult<i32> {
        let filter = args.get_one::<String>("filter");
        let rows: Vec<Vec<String>> = app
            .config()?
            .flatten()
            .into_iter()
            .filter(|(key, _)| filter.is_none_or(|filter| key.contains(filter.as_str())))
            .map(|(key, value)| vec![key, display(&value)])
            .collect();

        if rows.is_empty() {
            writeln!(output, "No configuration values found.")?;
            return Ok(SUCCESS);
        }
        write_table(output, &["Key", "Value"], &rows)?;
        Ok(SUCCESS)
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use crate::config::ConfigCache;
    use crate::console::SUCCESS;
    use crate::testing::TestApplication;

    #[test]
    fn test_cache_and_clear() {
        let test = TestApplication::new().unwrap();
        let console = test.console();

        let cached = console.run(&["config:cache"]);
        assert_eq!(cached.code, SUCCESS);
        assert_eq!(cached.output, "Configuration cached successfully.\n");

        let cache = ConfigCache::new(test.app());
        assert!(cache.exists());
        assert_eq!(cache.load().unwrap().get_str("app.name"), Some("Trellis"));

        assert_eq!(console.run(&["config:clear"]).output, "Configuration cache cleared.\n");
        assert_eq!(console.run(&["config:clear"]).output, "Configuration cache not found.\n");
        assert!(!cache.exists());
    }

    #[test]
    fn test_list_with_filter() {
        let test = TestApplication::new().unwrap();
        let result = test.console().run(&["config:list", "--filter", "app.name"]);
        assert_eq!(result.code, SUCCESS);
        assert!(result.output.contains("app.name | Trellis"));
        assert!(!result.output.contains("session.driver"));

        let empty = test.console().run(&["config:list", "--filter", "nothing.matches"]);
        assert_eq!(empty.output, "No configuration values found.\n");
    }
}
