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

//! Synchronous event dispatcher keyed by event type

use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Events are plain types; stoppable events override `is_propagation_stopped`
pub trait Event: Any + Send + Sync {
    fn is_propagation_stopped(&self) -> bool {
        false
    }
}

pub type ListenerId = u64;

type ErasedListener = Arc<dyn Fn(&mut dyn Any) + Send + Sync>;

#[derive(Clone)]
struct Registered {
    id: ListenerId,
    priority: i32,
    listener: ErasedListener,
}

/// Dispatches events to listeners registered for their type, highest priority first
#[derive(Default)]
pub struct EventDispatcher {
    listeners: RwLock<HashMap<TypeId, Vec<Registered>>>,
    next_id: AtomicU64,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<E, F>(&self, listener: F) -> ListenerId
    where
        E: Event,
        F: Fn(&mut E) + Send + Sync + 'static,
    {
        self.subscribe_with_priority(0, listener)
    }

    /// Register a listener; equal priorities run in registration order
    pub fn subscribe_with_priority<E, F>(&self, priority: i32, listener: F) -> ListenerId
    where
        E: Event,
        F: Fn(&mut E) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let listener: ErasedListener = Arc::new(move |event: &mut dyn Any| {
            if let Some(event) = event.downcast_mut::<E>() {
                listener(event);
            }
        });

        let mut listeners = self.listeners.write();
        let registered = listeners.entry(TypeId::of::<E>()).or_default();
        let position = registered.iter().position(|r| r.priority < priority).unwrap_or(registered.len());
        registered.insert(position, Registered { id, priority, listener });
        id
    }

    pub fn unsubscribe<E: Event>(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let Some(registered) = listeners.get_mut(&TypeId::of::<E>()) else {
            return false;
        };

        let before = registered.len();
        registered.retain(|r| r.id != id);
        let removed = registered.len() != before;
        if registered.is_empty() {
            listeners.remove(&TypeId::of::<E>());
        }
        removed
    }

    pub fn has_listeners<E: Event>(&self) -> bool {
        self.listeners.read().get(&TypeId::of::<E>()).is_some_and(|r| !r.is_empty())
    }

    /// Run the listeners for `event` and hand it back
    pub fn dispatch<E: Event>(&self, mut event: E) -> E {
        // Listeners run without the lock held so they can subscribe or dispatch themselves
        let registered = self.listeners.read().get(&TypeId::of::<E>()).cloned().unwrap_or_default();

        for entry in registered {
            if event.is_propagation_stopped() {
                break;
            }
            (entry.listener)(&mut event);
        }
        event
    }
}
