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

//! Cookie defaults and the per-request cookie queue

use crate::config::Config;
use cookie::time::Duration;
use cookie::{Cookie, SameSite};
use parking_lot::Mutex;
use std::sync::Arc;

/// Defaults applied to cookies created by the framework, read from `cookie.*`
#[derive(Debug, Clone, PartialEq)]
pub struct CookieSettings {
    pub path: String,
    pub domain: Option<String>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: SameSite,
    /// Lifetime in minutes; `0` makes session cookies
    pub lifetime: u64,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            domain: None,
            secure: false,
            http_only: true,
            same_site: SameSite::Lax,
            lifetime: 0,
        }
    }
}

impl CookieSettings {
    pub fn from_config(config: &Config) -> Self {
        let defaults = Self::default();
        let same_site = match config.get_str("cookie.same_site").map(str::to_ascii_lowercase).as_deref() {
            Some("strict") => SameSite::Strict,
            Some("none") => SameSite::None,
            _ => defaults.same_site,
        };

        Self {
            path: config.string_or("cookie.path", &defaults.path),
            domain: config.get_str("cookie.domain").filter(|d| !d.is_empty()).map(str::to_string),
            secure: config.bool_or("cookie.secure", defaults.secure),
            http_only: config.bool_or("cookie.http_only", defaults.http_only),
            same_site,
            lifetime: config.u64_or("cookie.lifetime", defaults.lifetime),
        }
    }

    /// Build a cookie carrying these defaults
    pub fn make(&self, name: impl Into<String>, value: impl Into<String>) -> Cookie<'static> {
        let mut builder = Cookie::build((name.into(), value.into()))
            .path(self.path.clone())
            .secure(self.secure)
            .http_only(self.http_only)
            .same_site(self.same_site);
        if let Some(domain) = &self.domain {
            builder = builder.domain(domain.clone());
        }
        if self.lifetime > 0 {
            builder = builder.max_age(Duration::seconds(i64::try_from(self.lifetime.saturating_mul(60)).unwrap_or(i64::MAX)));
        }
        builder.build()
    }

    /// A cookie that expires `name` on the client
    pub fn forget(&self, name: impl Into<String>) -> Cookie<'static> {
        let mut cookie = self.make(name, "");
        cookie.make_removal();
        cookie
    }
}

/// Cookies queued during a request, written as `Set-Cookie` headers by the cookie middleware.
///
/// Stored as a request extension; clones share the same queue.
#[derive(Debug, Clone, Default)]
pub struct CookieQueue {
    cookies: Arc<Mutex<Vec<Cookie<'static>>>>,
}

impl CookieQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a cookie, replacing one queued earlier with the same name
    pub fn queue(&self, cookie: Cookie<'static>) {
        let mut cookies = self.cookies.lock();
        cookies.retain(|queued| queued.name() != cookie.name());
        cookies.push(cookie);
    }

    pub fn has(&self, name: &str) -> bool {
        self.cookies.lock().iter().any(|cookie| cookie.name() == name)
    }

    pub fn len(&self) -> usize {
        self.cookies.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn drain(&self) -> Vec<Cookie<'static>> {
        std::mem::take(&mut *self.cookies.lock())
    }
}
