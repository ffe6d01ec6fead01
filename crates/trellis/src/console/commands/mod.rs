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

//! The framework's console commands

pub mod app;
pub mod cache;
pub mod config;
pub mod create;
pub mod maintenance;
pub mod routes;

use crate::catalog::CommandFactory;
use crate::console::ConsoleCommand;
use std::sync::Arc;

fn command<C: ConsoleCommand + 'static>(make: fn() -> C) -> CommandFactory {
    Arc::new(move || Box::new(make()) as Box<dyn ConsoleCommand>)
}

/// Every framework command with its name
pub fn framework_commands() -> Vec<(&'static str, CommandFactory)> {
    let mut commands = vec![
        ("app:environment", command(|| app::EnvironmentCommand)),
        ("app:key", command(|| app::KeyCommand)),
        ("cache:clear", command(|| cache::ClearCommand)),
        ("config:cache", command(|| config::CacheCommand)),
        ("config:clear", command(|| config::ClearCommand)),
        ("config:list", command(|| config::ListCommand)),
    ];

    for blueprint in create::BLUEPRINTS {
        commands.push((blueprint.command, command_for(blueprint)));
    }

    commands.extend([
        ("maintenance:down", command(|| maintenance::DownCommand)),
        ("maintenance:up", command(|| maintenance::UpCommand)),
        ("routes:cache", command(|| routes::CacheCommand)),
        ("routes:clear", command(|| routes::ClearCommand)),
        ("routes:list", command(|| routes::ListCommand)),
    ]);
    commands
}

fn command_for(blueprint: &'static create::Blueprint) -> CommandFactory {
    Arc::new(move || Box::new(create::CreateCommand::new(blueprint)) as Box<dyn ConsoleCommand>)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_match_definitions() {
        for (name, factory) in framework_commands() {
            assert_eq!(factory().definition().get_name(), name);
        }
    }

    #[test]
    fn test_every_create_command_is_registered() {
        let names: Vec<&str> = framework_commands().into_iter().map(|(name, _)| name).collect();
        for kind in ["controller", "middleware", "provider", "command", "event", "listener", "extension"] {
            assert!(names.contains(&format!("create:{}", kind).as_str()));
        }
    }
}
