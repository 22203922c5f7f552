use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use serde_json::Value;

use super::dom::NodeId;
use super::Page;
use crate::error::HandlerError;

pub type HandlerResult = Result<Value, HandlerError>;

type Callback = dyn Fn(&Invocation<'_>) -> HandlerResult;

static NEXT_HANDLER_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct HandlerId(u64);

impl HandlerId {
    fn next() -> Self {
        Self(NEXT_HANDLER_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

struct HandlerInner {
    id: HandlerId,
    guid: HandlerId,
    label: Option<String>,
    callback: Box<Callback>,
}

/// Reference-counted callable with identity semantics.
///
/// Clones share identity. `guid` is shared by proxies built with [`Handler::proxy`],
/// which lets selection-based unbinding find a proxy through its original.
#[derive(Clone)]
pub struct Handler(Rc<HandlerInner>);

impl Handler {
    pub fn new(callback: impl Fn(&Invocation<'_>) -> HandlerResult + 'static) -> Self {
        Self::build(None, None, callback)
    }

    pub fn named(
        label: impl Into<String>,
        callback: impl Fn(&Invocation<'_>) -> HandlerResult + 'static,
    ) -> Self {
        Self::build(Some(label.into()), None, callback)
    }

    /// A new handler that shares `original`'s guid and label but has its own identity.
    pub fn proxy(
        original: &Handler,
        callback: impl Fn(&Invocation<'_>) -> HandlerResult + 'static,
    ) -> Self {
        Self::build(original.0.label.clone(), Some(original.guid()), callback)
    }

    fn build(
        label: Option<String>,
        guid: Option<HandlerId>,
        callback: impl Fn(&Invocation<'_>) -> HandlerResult + 'static,
    ) -> Self {
        let id = HandlerId::next();
        Self(Rc::new(HandlerInner {
            id,
            guid: guid.unwrap_or(id),
            label,
            callback: Box::new(callback),
        }))
    }

    pub fn id(&self) -> HandlerId {
        self.0.id
    }

    pub fn guid(&self) -> HandlerId {
        self.0.guid
    }

    pub fn label(&self) -> Option<&str> {
        self.0.label.as_deref()
    }

    pub fn call(&self, invocation: &Invocation<'_>) -> HandlerResult {
        (self.0.callback)(invocation)
    }

    pub fn downgrade(&self) -> WeakHandler {
        WeakHandler {
            id: self.0.id,
            inner: Rc::downgrade(&self.0),
        }
    }
}

impl PartialEq for Handler {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Handler {}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("id", &self.0.id)
            .field("guid", &self.0.guid)
            .field("label", &self.0.label)
            .finish()
    }
}

impl fmt::Display for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.label {
            Some(label) => write!(f, "fn#{} {}", self.0.id.0, label),
            None => write!(f, "fn#{}", self.0.id.0),
        }
    }
}

/// Non-owning handle. Does not keep the callable (or anything it captures) alive.
#[derive(Clone)]
pub struct WeakHandler {
    id: HandlerId,
    inner: Weak<HandlerInner>,
}

impl WeakHandler {
    pub fn id(&self) -> HandlerId {
        self.id
    }

    pub fn upgrade(&self) -> Option<Handler> {
        self.inner.upgrade().map(Handler)
    }

    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }
}

impl fmt::Debug for WeakHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakHandler")
            .field("id", &self.id)
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// Arguments a handler is invoked with: the page, `this`, the event and extra positional values.
pub struct Invocation<'a> {
    pub page: &'a Page,
    pub this: NodeId,
    pub event: &'a Event,
    pub args: &'a [Value],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EventPhase {
    None,
    Capturing,
    AtTarget,
    Bubbling,
}

#[derive(Debug)]
pub struct Event {
    event_type: String,
    bubbles: bool,
    cancelable: bool,
    detail: Option<Value>,
    target: Cell<Option<NodeId>>,
    current_target: Cell<Option<NodeId>>,
    phase: Cell<EventPhase>,
    default_prevented: Cell<bool>,
    propagation_stopped: Cell<bool>,
    immediate_propagation_stopped: Cell<bool>,
    data: RefCell<Option<Value>>,
}

impl Event {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            bubbles: false,
            cancelable: false,
            detail: None,
            target: Cell::new(None),
            current_target: Cell::new(None),
            phase: Cell::new(EventPhase::None),
            default_prevented: Cell::new(false),
            propagation_stopped: Cell::new(false),
            immediate_propagation_stopped: Cell::new(false),
            data: RefCell::new(None),
        }
    }

    pub fn bubbling(mut self, bubbles: bool) -> Self {
        self.bubbles = bubbles;
        self
    }

    pub fn cancelable(mut self, cancelable: bool) -> Self {
        self.cancelable = cancelable;
        self
    }

    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = Some(detail);
        self
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn bubbles(&self) -> bool {
        self.bubbles
    }

    pub fn detail(&self) -> Option<&Value> {
        self.detail.as_ref()
    }

    pub fn target(&self) -> Option<NodeId> {
        self.target.get()
    }

    pub fn current_target(&self) -> Option<NodeId> {
        self.current_target.get()
    }

    pub fn phase(&self) -> EventPhase {
        self.phase.get()
    }

    pub fn prevent_default(&self) {
        if self.cancelable {
            self.default_prevented.set(true);
        }
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented.get()
    }

    pub fn stop_propagation(&self) {
        self.propagation_stopped.set(true);
    }

    pub fn stop_immediate_propagation(&self) {
        self.propagation_stopped.set(true);
        self.immediate_propagation_stopped.set(true);
    }

    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped.get()
    }

    pub fn immediate_propagation_stopped(&self) -> bool {
        self.immediate_propagation_stopped.get()
    }

    /// Data bound alongside a legacy-library handler; set per handler call.
    pub fn data(&self) -> Option<Value> {
        self.data.borrow().clone()
    }

    pub(crate) fn set_data(&self, data: Option<Value>) {
        *self.data.borrow_mut() = data;
    }

    pub(crate) fn begin_dispatch(&self, target: NodeId) {
        self.target.set(Some(target));
        self.propagation_stopped.set(false);
        self.immediate_propagation_stopped.set(false);
    }

    pub(crate) fn enter(&self, current: NodeId, phase: EventPhase) {
        self.current_target.set(Some(current));
        self.phase.set(phase);
    }

    pub(crate) fn end_dispatch(&self) {
        self.current_target.set(None);
        self.phase.set(EventPhase::None);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerOptions {
    pub capture: bool,
    pub once: bool,
}

impl ListenerOptions {
    pub fn capture() -> Self {
        Self {
            capture: true,
            once: false,
        }
    }

    pub fn once() -> Self {
        Self {
            capture: false,
            once: true,
        }
    }
}

/// The universal event-target capability: the extension point native interception decorates.
pub trait EventTargetApi {
    fn add_event_listener(
        &self,
        page: &Page,
        target: NodeId,
        event_type: &str,
        listener: Handler,
        options: ListenerOptions,
    );

    fn remove_event_listener(
        &self,
        page: &Page,
        target: NodeId,
        event_type: &str,
        listener: &Handler,
        options: ListenerOptions,
    );
}

pub(crate) struct Registration {
    event_type: String,
    capture: bool,
    once: bool,
    handler: Handler,
    removed: Cell<bool>,
}

impl Registration {
    pub(crate) fn handler(&self) -> &Handler {
        &self.handler
    }

    pub(crate) fn capture(&self) -> bool {
        self.capture
    }

    pub(crate) fn once(&self) -> bool {
        self.once
    }

    pub(crate) fn is_removed(&self) -> bool {
        self.removed.get()
    }
}

/// The page's real listener store. Matches listeners by exact identity, like the platform does.
#[derive(Default)]
pub struct PlatformEvents {
    listeners: RefCell<HashMap<NodeId, Vec<Rc<Registration>>>>,
}

impl PlatformEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registered listeners for `target`/`event_type`, in registration order.
    pub(crate) fn snapshot(&self, target: NodeId, event_type: &str) -> Vec<Rc<Registration>> {
        self.listeners
            .borrow()
            .get(&target)
            .map(|regs| {
                regs.iter()
                    .filter(|r| r.event_type == event_type)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn detach(&self, target: NodeId, registration: &Rc<Registration>) {
        registration.removed.set(true);
        let mut listeners = self.listeners.borrow_mut();
        if let Some(regs) = listeners.get_mut(&target) {
            regs.retain(|r| !Rc::ptr_eq(r, registration));
            if regs.is_empty() {
                listeners.remove(&target);
            }
        }
    }

    pub fn listener_count(&self, target: NodeId, event_type: &str) -> usize {
        self.snapshot(target, event_type).len()
    }

    pub fn is_registered(&self, target: NodeId, event_type: &str, listener: &Handler) -> bool {
        self.snapshot(target, event_type)
            .iter()
            .any(|r| r.handler == *listener)
    }
}

impl EventTargetApi for PlatformEvents {
    fn add_event_listener(
        &self,
        _page: &Page,
        target: NodeId,
        event_type: &str,
        listener: Handler,
        options: ListenerOptions,
    ) {
        let mut listeners = self.listeners.borrow_mut();
        let regs = listeners.entry(target).or_default();
        let duplicate = regs.iter().any(|r| {
            r.event_type == event_type && r.capture == options.capture && r.handler == listener
        });
        if duplicate {
            return;
        }
        regs.push(Rc::new(Registration {
            event_type: event_type.to_string(),
            capture: options.capture,
            once: options.once,
            handler: listener,
            removed: Cell::new(false),
        }));
    }

    fn remove_event_listener(
        &self,
        _page: &Page,
        target: NodeId,
        event_type: &str,
        listener: &Handler,
        options: ListenerOptions,
    ) {
        let found = self.listeners.borrow().get(&target).and_then(|regs| {
            regs.iter()
                .find(|r| {
                    r.event_type == event_type
                        && r.capture == options.capture
                        && r.handler == *listener
                })
                .cloned()
        });
        if let Some(registration) = found {
            self.detach(target, &registration);
        }
    }
}
