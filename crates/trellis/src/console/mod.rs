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

//! Console commands

pub mod commands;

use crate::application::Application;
use crate::error::FrameworkResult;
use clap::{ArgMatches, Command};
use std::io::Write;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;

/// A command the console kernel can run.
///
/// `definition` describes the command's name, arguments and help; `execute` receives the
/// matches for that subcommand and returns the exit code.
pub trait ConsoleCommand: Send + Sync {
    fn definition(&self) -> Command;

    fn execute(&self, app: &Application, args: &ArgMatches, output: &mut dyn Write) -> FrameworkResult<i32>;
}

/// Print rows as left-aligned columns under a header
pub fn write_table(output: &mut dyn Write, header: &[&str], rows: &[Vec<String>]) -> FrameworkResult<()> {
    let mut widths: Vec<usize> = header.iter().map(|h| h.len()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let line = |cells: Vec<&str>| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    writeln!(output, "{}", line(header.to_vec()))?;
    writeln!(output, "{}", widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("-+-"))?;
    for row in rows {
        writeln!(output, "{}", line(row.iter().map(String::as_str).collect()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_layout() {
        let mut output = Vec::new();
        let rows = vec![vec!["GET".to_string(), "/".to_string()], vec!["POST".to_string(), "/users".to_string()]];
        write_table(&mut output, &["Method", "Path"], &rows).unwrap();

        let text = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Method | Path");
        assert_eq!(lines[1], "-------+-------");
        assert_eq!(lines[2], "GET    | /");
        assert_eq!(lines[3], "POST   | /users");
    }
}
