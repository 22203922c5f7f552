use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use serde_json::Value;
use tracing::debug;

use super::{parse_delegate, split_namespaces, Arg, BindArgs, LegacyEventApi, Selection, UnbindArgs};
use crate::error::{ArgError, HandlerError};
use crate::page::dom::NodeId;
use crate::page::event::{Event, Handler, Invocation, ListenerOptions};
use crate::page::selector::Selector;
use crate::page::Page;

struct Binding {
    event_type: String,
    namespaces: Vec<String>,
    delegate: Option<Selector>,
    data: Option<Value>,
    handler: Handler,
    removed: Cell<bool>,
}

impl Binding {
    fn matches_unbind(&self, names: Option<&str>, selector: Option<&str>, handler: Option<&Handler>) -> bool {
        if let Some(handler) = handler {
            if self.handler.guid() != handler.guid() {
                return false;
            }
        }
        if let Some(selector) = selector {
            let delegated = self.delegate.as_ref().map(Selector::source);
            if selector == "**" {
                if delegated.is_none() {
                    return false;
                }
            } else if delegated != Some(selector) {
                return false;
            }
        }
        let Some(names) = names else {
            return true;
        };
        names.split_whitespace().any(|name| {
            let (event_type, namespaces) = split_namespaces(name);
            let type_ok = event_type.is_empty() || event_type == self.event_type;
            let ns_ok = namespaces
                .iter()
                .all(|ns| self.namespaces.iter().any(|own| own == ns));
            type_ok && ns_ok
        })
    }
}

/// The in-page legacy library. One native dispatcher listener per (element, type)
/// fans out to the bound handlers.
pub struct Binder {
    this: Weak<Binder>,
    bindings: RefCell<HashMap<NodeId, Vec<Rc<Binding>>>>,
    dispatchers: RefCell<HashMap<(NodeId, String), Handler>>,
}

impl Binder {
    pub fn new() -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            this: this.clone(),
            bindings: RefCell::new(HashMap::new()),
            dispatchers: RefCell::new(HashMap::new()),
        })
    }

    /// Loads a fresh library onto `page` and returns it.
    pub fn load(page: &Page) -> Rc<Self> {
        let binder = Self::new();
        page.set_legacy(binder.clone());
        binder
    }

    pub fn bound_count(&self, node: NodeId, event_type: &str) -> usize {
        self.bindings
            .borrow()
            .get(&node)
            .map(|b| b.iter().filter(|b| b.event_type == event_type).count())
            .unwrap_or(0)
    }

    fn ensure_dispatcher(&self, page: &Page, node: NodeId, event_type: &str) {
        let key = (node, event_type.to_string());
        if self.dispatchers.borrow().contains_key(&key) {
            return;
        }
        let library = self.this.clone();
        let dispatcher = Handler::named(format!("dispatch:{event_type}"), move |call| {
            match library.upgrade() {
                Some(library) => library
                    .handle(call.page, call.this, call.event, call.args)
                    .map(|_| Value::Null),
                None => Ok(Value::Null),
            }
        });
        self.dispatchers.borrow_mut().insert(key, dispatcher.clone());
        page.add_event_listener(node, event_type, dispatcher, ListenerOptions::default());
    }

    fn release_dispatcher(&self, page: &Page, node: NodeId, event_type: &str) {
        if self.bound_count(node, event_type) > 0 {
            return;
        }
        let removed = self
            .dispatchers
            .borrow_mut()
            .remove(&(node, event_type.to_string()));
        if let Some(dispatcher) = removed {
            page.remove_event_listener(node, event_type, &dispatcher, ListenerOptions::default());
        }
    }

    /// Runs the handlers bound on `node` for the event: delegated ones for each
    /// matching node on the path from the target up to `node`, then direct ones.
    fn handle(&self, page: &Page, node: NodeId, event: &Event, extra: &[Value]) -> Result<(), HandlerError> {
        let bound: Vec<Rc<Binding>> = self
            .bindings
            .borrow()
            .get(&node)
            .map(|b| {
                b.iter()
                    .filter(|b| b.event_type == event.event_type())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        if bound.is_empty() {
            return Ok(());
        }

        let mut queue: Vec<(NodeId, Rc<Binding>)> = Vec::new();
        if let Some(target) = event.target() {
            let path: Vec<NodeId> = {
                let doc = page.document();
                doc.event_path(target)
                    .into_iter()
                    .take_while(|n| *n != node)
                    .collect()
            };
            for current in path {
                let doc = page.document();
                for binding in bound.iter().filter(|b| b.delegate.is_some()) {
                    let delegate = binding.delegate.as_ref();
                    if delegate.is_some_and(|sel| sel.matches(&doc, current)) {
                        queue.push((current, binding.clone()));
                    }
                }
            }
        }
        queue.extend(
            bound
                .iter()
                .filter(|b| b.delegate.is_none())
                .map(|b| (node, b.clone())),
        );

        for (this, binding) in queue {
            if binding.removed.get() {
                continue;
            }
            event.set_data(binding.data.clone());
            let invocation = Invocation {
                page,
                this,
                event,
                args: extra,
            };
            let result = binding.handler.call(&invocation);
            event.set_data(None);
            if let Value::Bool(false) = result? {
                event.prevent_default();
                event.stop_propagation();
            }
            if event.immediate_propagation_stopped() {
                break;
            }
        }
        Ok(())
    }
}

impl LegacyEventApi for Binder {
    fn on(&self, page: &Page, selection: &Selection, args: Vec<Arg>) -> Result<(), ArgError> {
        let parsed = BindArgs::parse(&args)?;
        for (names, selector, data, handler) in parsed.bindings() {
            let delegate = parse_delegate(selector)?;
            for &node in selection.nodes() {
                for name in names.split_whitespace() {
                    let (event_type, namespaces) = split_namespaces(name);
                    if event_type.is_empty() {
                        continue;
                    }
                    self.bindings.borrow_mut().entry(node).or_default().push(Rc::new(Binding {
                        event_type: event_type.to_string(),
                        namespaces: namespaces.into_iter().map(str::to_string).collect(),
                        delegate: delegate.clone(),
                        data: data.cloned(),
                        handler: handler.clone(),
                        removed: Cell::new(false),
                    }));
                    self.ensure_dispatcher(page, node, event_type);
                }
            }
        }
        Ok(())
    }

    fn off(&self, page: &Page, selection: &Selection, args: Vec<Arg>) -> Result<(), ArgError> {
        let specs = UnbindArgs::parse(&args)?;
        for &node in selection.nodes() {
            let mut touched: Vec<String> = Vec::new();
            {
                let mut bindings = self.bindings.borrow_mut();
                let Some(list) = bindings.get_mut(&node) else {
                    continue;
                };
                list.retain(|binding| {
                    let hit = specs.iter().any(|spec| {
                        binding.matches_unbind(
                            spec.names.as_deref(),
                            spec.selector.as_deref(),
                            spec.handler.as_ref(),
                        )
                    });
                    if hit {
                        binding.removed.set(true);
                        touched.push(binding.event_type.clone());
                    }
                    !hit
                });
                if list.is_empty() {
                    bindings.remove(&node);
                }
            }
            touched.dedup();
            for event_type in touched {
                self.release_dispatcher(page, node, &event_type);
            }
        }
        debug!(nodes = selection.nodes().len(), "unbound legacy handlers");
        Ok(())
    }

    fn trigger(
        &self,
        page: &Page,
        selection: &Selection,
        event_type: &str,
        extra: &[Value],
    ) -> Result<(), HandlerError> {
        for &node in selection.nodes() {
            let event = Event::new(event_type).bubbling(true).cancelable(true);
            event.begin_dispatch(node);
            let path = page.document().event_path(node);
            for current in path {
                event.enter(current, crate::page::event::EventPhase::Bubbling);
                self.handle(page, current, &event, extra)?;
                if event.propagation_stopped() {
                    break;
                }
            }
            event.end_dispatch();
        }
        Ok(())
    }
}
