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

//! `create:*` scaffolding commands

use crate::application::Application;
use crate::console::{ConsoleCommand, SUCCESS};
use crate::error::{FrameworkError, FrameworkResult};
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::io::Write;
use std::path::{Path, PathBuf};
use tera::{Context, Tera};
use tracing::debug;

/// An extra option of a scaffolding command, handed to the stub under its own name
pub struct StubOption {
    pub name: &'static str,
    pub help: &'static str,
    pub takes_value: bool,
}

/// What a `create:*` command generates and where
pub struct Blueprint {
    pub command: &'static str,
    pub label: &'static str,
    /// Directory below the application path
    pub directory: &'static str,
    pub stub: &'static str,
    pub options: &'static [StubOption],
}

pub static BLUEPRINTS: &[Blueprint] = &[
    Blueprint {
        command: "create:controller",
        label: "Controller",
        directory: "controllers",
        stub: include_str!("../../../resources/stubs/controller.stub"),
        options: &[StubOption {
            name: "single",
            help: "Generate a controller with a single action",
            takes_value: false,
        }],
    },
    Blueprint {
        command: "create:middleware",
        label: "Middleware",
        directory: "middleware",
        stub: include_str!("../../../resources/stubs/middleware.stub"),
        options: &[],
    },
    Blueprint {
        command: "create:provider",
        label: "Service provider",
        directory: "providers",
        stub: include_str!("../../../resources/stubs/provider.stub"),
        options: &[StubOption {
            name: "bootable",
            help: "Include a boot method",
            takes_value: false,
        }],
    },
    Blueprint {
        command: "create:command",
        label: "Command",
        directory: "commands",
        stub: include_str!("../../../resources/stubs/command.stub"),
        options: &[StubOption {
            name: "command",
            help: "Console name of the command",
            takes_value: true,
        }],
    },
    Blueprint {
        command: "create:event",
        label: "Event",
        directory: "events",
        stub: include_str!("../../../resources/stubs/event.stub"),
        options: &[StubOption {
            name: "stoppable",
            help: "Allow listeners to stop propagation",
            takes_value: false,
        }],
    },
    Blueprint {
        command: "create:listener",
        label: "Listener",
        directory: "listeners",
        stub: include_str!("../../../resources/stubs/listener.stub"),
        options: &[StubOption {
            name: "event",
            help: "Event type the listener subscribes to",
            takes_value: true,
        }],
    },
    Blueprint {
        command: "create:extension",
        label: "View extension",
        directory: "extensions",
        stub: include_str!("../../../resources/stubs/extension.stub"),
        options: &[],
    },
];

/// Renders a blueprint's stub into `<app>/<directory>/<name>.rs`
pub struct CreateCommand {
    blueprint: &'static Blueprint,
}

impl CreateCommand {
    pub fn new(blueprint: &'static Blueprint) -> Self {
        Self { blueprint }
    }

    fn stub(&self, app: &Application, template: Option<&String>) -> FrameworkResult<String> {
        let Some(template) = template else {
            return Ok(self.blueprint.stub.to_string());
        };

        let path = resolve(app, template);
        if !path.is_file() {
            return Err(FrameworkError::stub(format!("Stub template not found: {}", path.display())));
        }
        Ok(std::fs::read_to_string(path)?)
    }
}

impl ConsoleCommand for CreateCommand {
    fn definition(&self) -> Command {
        let mut command = Command::new(self.blueprint.command)
            .about(format!("Create a new {}", self.blueprint.label.to_lowercase()))
            .arg(Arg::new("name").required(true).help("Type name, e.g. UserController"))
            .arg(Arg::new("force").long("force").action(ArgAction::SetTrue).help("Overwrite an existing file"))
            .arg(Arg::new("template").long("template").value_name("PATH").help("Custom stub to render"));

        for option in self.blueprint.options {
            let arg = Arg::new(option.name).long(option.name).help(option.help);
            command = command.arg(if option.takes_value { arg.value_name("NAME") } else { arg.action(ArgAction::SetTrue) });
        }
        command
    }

    fn execute(&self, app: &Application, args: &ArgMatches, output: &mut dyn Write) -> FrameworkResult<i32> {
        let raw = args.get_one::<String>("name").map(String::as_str).unwrap_or_default();
        let name = pascal_case(raw);
        if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(FrameworkError::stub(format!("'{}' is not a valid type name", raw)));
        }
        let file = snake_case(&name);

        let path = app.app_path(&format!("{}/{}.rs", self.blueprint.directory, file));
        if path.exists() && !args.get_flag("force") {
            return Err(FrameworkError::stub(format!("{} already exists: {}", self.blueprint.label, path.display())));
        }

        let mut context = Context::new();
        context.insert("name", &name);
        context.insert("snake", &file);
        for option in self.blueprint.options {
            if option.takes_value {
                context.insert(option.name, &args.get_one::<String>(option.name).cloned().unwrap_or_default());
            } else {
                context.insert(option.name, &args.get_flag(option.name));
            }
        }

        let stub = self.stub(app, args.get_one::<String>("template"))?;
        let rendered = Tera::one_off(&stub, &context, false).map_err(|e| FrameworkError::stub(format!("Failed to render stub: {}", e)))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, rendered)?;
        debug!("Wrote {}", path.display());

        let shown = path.strip_prefix(app.root()).unwrap_or(&path);
        writeln!(output, "{} created: {}", self.blueprint.label, shown.display())?;
        Ok(SUCCESS)
    }
}

fn resolve(app: &Application, path: &str) -> PathBuf {
    let candidate = Path::new(path);
    if candidate.is_absolute() { candidate.to_path_buf() } else { app.root_path(path) }
}

/// `user_profile`, `user-profile` and `userProfile` all become `UserProfile`
fn pascal_case(raw: &str) -> String {
    raw.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            chars.next().map(|first| first.to_ascii_uppercase().to_string() + chars.as_str()).unwrap_or_default()
        })
        .collect()
}

fn snake_case(name: &str) -> String {
    let mut snake = String::with_capacity(name.len() + 4);
    let chars: Vec<char> = name.chars().collect();
    for (i, c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() {
            let after_lower = i > 0 && (chars[i - 1].is_ascii_lowercase() || chars[i - 1].is_ascii_digit());
            let before_lower = i > 0 && chars[i - 1].is_ascii_uppercase() && chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
            if after_lower || before_lower {
                snake.push('_');
            }
            snake.push(c.to_ascii_lowercase());
        } else {
            snake.push(*c);
        }
    }
    snake
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::FAILURE;
    use crate::testing::TestApplication;

    #[test]
    fn test_case_conversion() {
        assert_eq!(pascal_case("user_profile"), "UserProfile");
        assert_eq!(pascal_case("userProfile"), "UserProfile");
        assert_eq!(pascal_case("user-profile-controller"), "UserProfileController");
        assert_eq!(snake_case("UserProfileController"), "user_profile_controller");
        assert_eq!(snake_case("HTTPClient"), "http_client");
        assert_eq!(snake_case("Oauth2Provider"), "oauth2_provider");
    }

    #[test]
    fn test_create_controller() {
        let test = TestApplication::new().unwrap();
        let result = test.console().run(&["create:controller", "PostController"]);
        assert_eq!(result.code, SUCCESS);
        assert_eq!(result.output, "Controller created: src/controllers/post_controller.rs\n");

        let source = std::fs::read_to_string(test.root().join("src/controllers/post_controller.rs")).unwrap();
        assert!(source.contains("pub struct PostController;"));
        assert!(source.contains("impl Controller for PostController"));
        assert!(source.contains("fn show"));
    }

    #[test]
    fn test_options_reach_the_stub() {
        let test = TestApplication::new().unwrap();
        let console = test.console();

        console.run(&["create:controller", "Health", "--single"]);
        let single = std::fs::read_to_string(test.root().join("src/controllers/health.rs")).unwrap();
        assert!(single.contains("fn invoke"));
        assert!(!single.contains("fn show"));

        console.run(&["create:command", "PruneUsers", "--command", "users:prune"]);
        let command = std::fs::read_to_string(test.root().join("src/commands/prune_users.rs")).unwrap();
        assert!(command.contains("Command::new(\"users:prune\")"));

        console.run(&["create:listener", "SendWelcome", "--event", "UserRegistered"]);
        let listener = std::fs::read_to_string(test.root().join("src/listeners/send_welcome.rs")).unwrap();
        assert!(listener.contains("event: &mut UserRegistered"));
    }

    #[test]
    fn test_existing_file_needs_force() {
        let test = TestApplication::new().unwrap();
        let console = test.console();

        assert_eq!(console.run(&["create:event", "OrderShipped"]).code, SUCCESS);
        let again = console.run(&["create:event", "OrderShipped"]);
        assert_eq!(again.code, FAILURE);
        assert!(again.output.contains("already exists"));
        assert_eq!(console.run(&["create:event", "OrderShipped", "--stoppable", "--force"]).code, SUCCESS);

        let source = std::fs::read_to_string(test.root().join("src/events/order_shipped.rs")).unwrap();
        assert!(source.contains("is_propagation_stopped"));
    }

    #[test]
    fn test_custom_template() {
        let test = TestApplication::new().unwrap();
        std::fs::write(test.root().join("custom.stub"), "// {{ name }} in {{ snake }}.rs\n").unwrap();

        let result = test.console().run(&["create:middleware", "Audit", "--template", "custom.stub"]);
        assert_eq!(result.code, SUCCESS);
        assert_eq!(std::fs::read_to_string(test.root().join("src/middleware/audit.rs")).unwrap(), "// Audit in audit.rs\n");

        let missing = test.console().run(&["create:middleware", "Other", "--template", "nope.stub"]);
        assert_eq!(missing.code, FAILURE);
    }
}
