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

//! Dependency injection container
//!
//! A typed map from `TypeId` to a binding. Three binding kinds exist:
//! - instances, shared as-is
//! - factories, producing a fresh value on every resolve
//! - singletons, produced by a factory on first resolve and shared afterwards
//!
//! Rebinding a type replaces the previous binding.

use crate::error::{FrameworkError, FrameworkResult};
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::sync::Arc;

type AnyArc = Arc<dyn Any + Send + Sync>;
type Factory = Arc<dyn Fn(&Container) -> FrameworkResult<AnyArc> + Send + Sync>;

#[derive(Clone)]
enum Binding {
    Instance(AnyArc),
    Factory(Factory),
    Singleton { factory: Factory, resolved: Arc<OnceCell<AnyArc>> },
}

/// Service container shared by the application, kernels and providers
#[derive(Default)]
pub struct Container {
    bindings: RwLock<HashMap<TypeId, Binding>>,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind an already constructed value
    pub fn instance<T: Send + Sync + 'static>(&self, value: T) {
        self.bindings.write().insert(TypeId::of::<T>(), Binding::Instance(Arc::new(value)));
    }

    /// Bind a factory invoked on every resolve
    pub fn bind<T, F>(&self, factory: F)
    where
        T: Send + Sync + 'static,
        F: Fn(&Container) -> FrameworkResult<T> + Send + Sync + 'static,
    {
        self.bindings.write().insert(TypeId::of::<T>(), Binding::Factory(erase(factory)));
    }

    /// Bind a factory invoked once, on first resolve
    pub fn singleton<T, F>(&self, factory: F)
    where
        T: Send + Sync + 'static,
        F: Fn(&Container) -> FrameworkResult<T> + Send + Sync + 'static,
    {
        self.bindings.write().insert(
            TypeId::of::<T>(),
            Binding::Singleton {
                factory: erase(factory),
                resolved: Arc::new(OnceCell::new()),
            },
        );
    }

    /// Resolve a binding
    pub fn get<T: Send + Sync + 'static>(&self) -> FrameworkResult<Arc<T>> {
        // Clone the binding out so factories can resolve other bindings without deadlocking
        let binding = self.bindings.read().get(&TypeId::of::<T>()).cloned().ok_or(FrameworkError::BindingNotFound(type_name::<T>()))?;

        let value = match binding {
            Binding::Instance(value) => value,
            Binding::Factory(factory) => factory(self)?,
            Binding::Singleton { factory, resolved } => resolved.get_or_try_init(|| factory(self))?.clone(),
        };

        value.downcast::<T>().map_err(|_| FrameworkError::BindingNotFound(type_name::<T>()))
    }

    pub fn has<T: 'static>(&self) -> bool {
        self.bindings.read().contains_key(&TypeId::of::<T>())
    }

    /// Remove a binding, returning whether one existed
    pub fn forget<T: 'static>(&self) -> bool {
        self.bindings.write().remove(&TypeId::of::<T>()).is_some()
    }
}

fn erase<T, F>(factory: F) -> Factory
where
    T: Send + Sync + 'static,
    F: Fn(&Container) -> FrameworkResult<T> + Send + Sync + 'static,
{
    Arc::new(move |container: &Container| factory(container).map(|value| Arc::new(value) as AnyArc))
}
