//! Original → wrapper associations. Both maps hold only weak handles, so they
//! never keep a listener (or what it captures) alive past the page's own use.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use crate::page::dom::NodeId;
use crate::page::event::{Handler, HandlerId, WeakHandler};

struct Association {
    original: WeakHandler,
    wrapper: WeakHandler,
    registrations: HashSet<(String, bool)>,
}

impl Association {
    fn is_live(&self) -> bool {
        self.original.is_alive() && self.wrapper.is_alive()
    }
}

/// Native listeners: one wrapper per (target, original listener).
#[derive(Default)]
pub struct ListenerAssociations {
    entries: RefCell<HashMap<(NodeId, HandlerId), Association>>,
}

impl ListenerAssociations {
    pub fn new() -> Self {
        Self::default()
    }

    /// The live wrapper already standing in for `listener` on `target`.
    pub fn wrapper_for(&self, target: NodeId, listener: &Handler) -> Option<Handler> {
        let entries = self.entries.borrow();
        let assoc = entries.get(&(target, listener.id()))?;
        if !assoc.is_live() {
            return None;
        }
        assoc.wrapper.upgrade()
    }

    pub fn record(
        &self,
        target: NodeId,
        listener: &Handler,
        wrapper: &Handler,
        event_type: &str,
        capture: bool,
    ) {
        let mut entries = self.entries.borrow_mut();
        entries.retain(|_, assoc| assoc.is_live());
        let assoc = entries
            .entry((target, listener.id()))
            .or_insert_with(|| Association {
                original: listener.downgrade(),
                wrapper: wrapper.downgrade(),
                registrations: HashSet::new(),
            });
        if assoc.wrapper.id() != wrapper.id() {
            assoc.wrapper = wrapper.downgrade();
            assoc.registrations.clear();
        }
        assoc.registrations.insert((event_type.to_string(), capture));
    }

    /// Resolves the wrapper for a removal and forgets the (type, capture)
    /// registration; the association goes away with its last registration.
    pub fn release(
        &self,
        target: NodeId,
        listener: &Handler,
        event_type: &str,
        capture: bool,
    ) -> Option<Handler> {
        let key = (target, listener.id());
        let mut entries = self.entries.borrow_mut();
        let assoc = entries.get_mut(&key)?;
        let wrapper = assoc.wrapper.upgrade();
        assoc.registrations.remove(&(event_type.to_string(), capture));
        if wrapper.is_none() || assoc.registrations.is_empty() {
            entries.remove(&key);
        }
        wrapper
    }

    pub fn contains(&self, target: NodeId, listener: &Handler) -> bool {
        self.entries.borrow().contains_key(&(target, listener.id()))
    }

    /// Drops associations whose listener or wrapper is gone.
    pub fn prune(&self) -> usize {
        let mut entries = self.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|_, assoc| assoc.is_live());
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.prune();
        self.entries.borrow().len()
    }

    /// Stored associations, dead or alive.
    pub fn entry_count(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct WrapperSet {
    original: WeakHandler,
    by_name: HashMap<String, WeakHandler>,
}

/// Legacy-library handlers: one wrapper per (original handler, event names).
#[derive(Default)]
pub struct HandlerWrappers {
    entries: RefCell<HashMap<HandlerId, WrapperSet>>,
}

impl HandlerWrappers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, original: &Handler, names: &str) -> Option<Handler> {
        self.entries
            .borrow()
            .get(&original.id())
            .and_then(|set| set.by_name.get(names))
            .and_then(WeakHandler::upgrade)
    }

    pub fn insert(&self, original: &Handler, names: &str, wrapper: &Handler) {
        let mut entries = self.entries.borrow_mut();
        retain_live(&mut entries);
        entries
            .entry(original.id())
            .or_insert_with(|| WrapperSet {
                original: original.downgrade(),
                by_name: HashMap::new(),
            })
            .by_name
            .insert(names.to_string(), wrapper.downgrade());
    }

    /// Live wrappers for `original`, keyed by event names.
    pub fn wrappers_of(&self, original: &Handler) -> Vec<(String, Handler)> {
        self.entries
            .borrow()
            .get(&original.id())
            .map(|set| {
                set.by_name
                    .iter()
                    .filter_map(|(name, weak)| weak.upgrade().map(|h| (name.clone(), h)))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn prune(&self) -> usize {
        retain_live(&mut self.entries.borrow_mut())
    }

    /// Number of live wrappers.
    pub fn len(&self) -> usize {
        self.prune();
        self.entries
            .borrow()
            .values()
            .map(|set| set.by_name.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stored originals, dead or alive.
    pub fn entry_count(&self) -> usize {
        self.entries.borrow().len()
    }
}

/// Drops dead wrappers, then originals left without any; returns the wrappers dropped.
fn retain_live(entries: &mut HashMap<HandlerId, WrapperSet>) -> usize {
    let mut dropped = 0;
    entries.retain(|_, set| {
        let before = set.by_name.len();
        set.by_name.retain(|_, weak| weak.is_alive());
        dropped += before - set.by_name.len();
        set.original.is_alive() && !set.by_name.is_empty()
    });
    dropped
}
