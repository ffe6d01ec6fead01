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

use trellis::testing::TestApplication;

#[test]
fn maintenance_down_is_idempotent() {
    let test = TestApplication::new().unwrap();
    let console = test.console();

    let first = console.run(&["maintenance:down"]);
    assert_eq!(first.code, 0);
    assert_eq!(first.output.trim(), "Application is now in maintenance mode.");

    let second = console.run(&["maintenance:down"]);
    assert_eq!(second.code, 0);
    assert_eq!(second.output.trim(), "Application is already down.");

    let pages: Vec<_> = std::fs::read_dir(test.root().join("public"))
        .unwrap()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_name() == "maintenance.html")
        .collect();
    assert_eq!(pages.len(), 1);
    assert!(test.app().is_down());
}

#[test]
fn config_cache_round_trip() {
    let test = TestApplication::builder().config("mail.toml", "from = \"team@example.com\"\n").build().unwrap();
    let console = test.console();

    assert_eq!(console.run(&["config:cache"]).output.trim(), "Configuration cached successfully.");
    assert!(test.root().join("storage").join("cache").join("config.cache").is_file());

    let listed = console.run(&["config:list", "--filter", "mail."]);
    assert_eq!(listed.code, 0);
    assert!(listed.output.contains("mail.from"));
    assert!(listed.output.contains("team@example.com"));
    assert!(!listed.output.contains("app.name"));

    assert_eq!(console.run(&["config:clear"]).output.trim(), "Configuration cache cleared.");
    assert_eq!(console.run(&["config:clear"]).output.trim(), "Configuration cache not found.");
}

#[test]
fn create_controller_writes_a_file() {
    let test = TestApplication::new().unwrap();
    let console = test.console();

    let created = console.run(&["create:controller", "BlogPost", "--single"]);
    assert_eq!(created.code, 0);
    let source = std::fs::read_to_string(test.root().join("src").join("controllers").join("blog_post.rs")).unwrap();
    assert!(source.contains("BlogPost"));

    let again = console.run(&["create:controller", "BlogPost"]);
    assert_eq!(again.code, 1);
    assert!(again.output.contains("already exists"));
}

#[test]
fn unknown_commands_exit_with_usage_code() {
    let test = TestApplication::new().unwrap();
    let result = test.console().run(&["does:not-exist"]);
    assert_eq!(result.code, 2);
}
