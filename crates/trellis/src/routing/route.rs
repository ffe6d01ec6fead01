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

//! Route definitions

use crate::routing::Handler;
use hyper::Method;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A registered route. Configure it through the `&mut Route` returned by the router.
pub struct Route {
    pub(crate) path: String,
    pub(crate) methods: Vec<Method>,
    pub(crate) handler: Arc<dyn Handler>,
    pub(crate) name: Option<String>,
    pub(crate) name_prefix: String,
    pub(crate) action: String,
    pub(crate) middleware: Vec<String>,
    pub(crate) scheme: Option<String>,
    pub(crate) host: Option<String>,
    pub(crate) port: Option<u16>,
    pub(crate) group: Option<String>,
}

impl Route {
    pub(crate) fn new(path: String, methods: Vec<Method>, handler: Arc<dyn Handler>) -> Self {
        Self {
            path,
            methods,
            handler,
            name: None,
            name_prefix: String::new(),
            action: "Closure".to_string(),
            middleware: Vec::new(),
            scheme: None,
            host: None,
            port: None,
            group: None,
        }
    }

    /// Name the route; group name prefixes are prepended
    pub fn name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = Some(format!("{}{}", self.name_prefix, name.into()));
        self
    }

    /// Label shown by `routes:list`, such as `UserController::show`
    pub fn action(&mut self, action: impl Into<String>) -> &mut Self {
        self.action = action.into();
        self
    }

    /// Append route middleware by name; they run after global and group middleware
    pub fn middleware(&mut self, names: &[&str]) -> &mut Self {
        self.middleware.extend(names.iter().map(|name| name.to_string()));
        self
    }

    pub fn scheme(&mut self, scheme: impl Into<String>) -> &mut Self {
        self.scheme = Some(scheme.into().to_ascii_lowercase());
        self
    }

    pub fn host(&mut self, host: impl Into<String>) -> &mut Self {
        self.host = Some(host.into().to_ascii_lowercase());
        self
    }

    pub fn port(&mut self, port: u16) -> &mut Self {
        self.port = Some(port);
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    pub fn route_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn middleware_names(&self) -> &[String] {
        &self.middleware
    }

    pub(crate) fn allows(&self, method: &Method) -> bool {
        self.methods.contains(method) || (*method == Method::HEAD && self.methods.contains(&Method::GET))
    }

    pub(crate) fn accepts(&self, scheme: &str, host: Option<&str>, port: Option<u16>) -> bool {
        if self.scheme.as_deref().is_some_and(|expected| expected != scheme) {
            return false;
        }
        if let Some(expected) = &self.host {
            if host.map(str::to_ascii_lowercase).as_deref() != Some(expected.as_str()) {
                return false;
            }
        }
        if self.port.is_some() && self.port != port {
            return false;
        }
        true
    }

    pub fn info(&self) -> RouteInfo {
        RouteInfo {
            path: self.path.clone(),
            methods: self.methods.iter().map(|m| m.to_string()).collect(),
            name: self.name.clone(),
            action: self.action.clone(),
            middleware: self.middleware.clone(),
            scheme: self.scheme.clone(),
            host: self.host.clone(),
            port: self.port,
            group: self.group.clone(),
        }
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route").field("path", &self.path).field("methods", &self.methods).field("name", &self.name).finish()
    }
}

/// Serializable description of a route, listed by `routes:list` and stored in the route manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteInfo {
    pub path: String,
    pub methods: Vec<String>,
    pub name: Option<String>,
    pub action: String,
    pub middleware: Vec<String>,
    pub scheme: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub group: Option<String>,
}

/// Attributes shared by the routes of a group
#[derive(Debug, Clone, Default)]
pub struct GroupAttributes {
    pub prefix: String,
    pub middleware: Vec<String>,
    pub name_prefix: String,
}

impl GroupAttributes {
    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Self::default()
        }
    }

    pub fn middleware(mut self, names: &[&str]) -> Self {
        self.middleware.extend(names.iter().map(|name| name.to_string()));
        self
    }

    /// Prepended to the names of the group's routes
    pub fn name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }
}
