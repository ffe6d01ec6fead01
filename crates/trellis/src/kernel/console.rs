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

//! Runs console commands

use crate::application::Application;
use crate::console::{ConsoleCommand, FAILURE};
use crate::error::{FrameworkError, FrameworkResult};
use crate::kernel::report;
use crate::providers::{BootProvider, default_boot_providers};
use crate::registry::ApplicationRegistry;
use clap::Command;
use std::ffi::OsString;
use std::io::Write;
use std::sync::Arc;
use tracing::{debug, warn};

/// Bootstraps the application, builds the command tree and runs the matched command
pub struct ConsoleKernel {
    app: Arc<Application>,
    providers: Vec<Box<dyn BootProvider>>,
}

impl ConsoleKernel {
    pub fn new(app: Arc<Application>) -> Self {
        Self::with_providers(app, default_boot_providers())
    }

    pub fn with_providers(app: Arc<Application>, providers: Vec<Box<dyn BootProvider>>) -> Self {
        Self { app, providers }
    }

    pub fn application(&self) -> &Arc<Application> {
        &self.app
    }

    /// Run with `args` (program name first) and return the exit code
    pub fn handle<I, T>(&self, args: I, output: &mut dyn Write) -> i32
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        match self.run(args, output) {
            Ok(code) => code,
            Err(error) => {
                let handler = report(&self.app, &error);
                if let Err(e) = write!(output, "{}", handler.render_console(&error)) {
                    warn!("Failed to write console error: {}", e);
                }
                FAILURE
            }
        }
    }

    fn run<I, T>(&self, args: I, output: &mut dyn Write) -> FrameworkResult<i32>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        self.app.bootstrap_with(&self.providers)?;
        let commands = self.commands()?;

        let mut cli = Command::new("trellis")
            .version(env!("CARGO_PKG_VERSION"))
            .about("Trellis application console")
            .subcommand_required(true)
            .arg_required_else_help(true);
        for command in &commands {
            cli = cli.subcommand(command.definition());
        }

        let matches = match cli.try_get_matches_from(args) {
            Ok(matches) => matches,
            Err(e) => {
                write!(output, "{}", e.render())?;
                return Ok(e.exit_code());
            }
        };

        let (name, args) = matches.subcommand().ok_or_else(|| FrameworkError::framework("No command given"))?;
        let command = commands
            .iter()
            .find(|command| command.definition().get_name() == name)
            .ok_or_else(|| FrameworkError::framework(format!("Command '{}' is not registered", name)))?;

        debug!("Running command {}", name);
        command.execute(&self.app, args, output)
    }

    /// Framework commands first, then the configured ones; a later command replaces an earlier one of the same name
    fn commands(&self) -> FrameworkResult<Vec<Box<dyn ConsoleCommand>>> {
        let registry = self.app.container().get::<ApplicationRegistry>()?;
        let mut commands: Vec<Box<dyn ConsoleCommand>> = Vec::new();

        for name in registry.commands()? {
            let command = self.app.catalog().commands.get(&name)?();
            let command_name = command.definition().get_name().to_string();
            commands.retain(|existing| existing.definition().get_name() != command_name);
            commands.push(command);
        }
        Ok(commands)
    }
}
