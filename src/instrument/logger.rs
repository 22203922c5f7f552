use std::collections::BTreeSet;
use std::rc::Rc;

use serde_json::{Map, Value};

use super::console::{
    Console, ConsoleRecord, EventAction, EventEntry, EventSnapshot, EventSource, HandlerRef,
    MutationAction, MutationCategory, MutationEntry,
};
use crate::page::dom::NodeId;
use crate::page::event::{Event, Handler};
use crate::page::Page;

/// What a logged event is about: the target always, the rest when known.
#[derive(Clone, Copy)]
pub struct EventSubject<'a> {
    pub target: NodeId,
    pub handler: Option<&'a Handler>,
    pub event: Option<&'a Event>,
    pub extra: Option<&'a [Value]>,
}

impl<'a> EventSubject<'a> {
    pub fn on(target: NodeId) -> Self {
        Self {
            target,
            handler: None,
            event: None,
            extra: None,
        }
    }

    pub fn handler(mut self, handler: &'a Handler) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn event(mut self, event: &'a Event) -> Self {
        self.event = Some(event);
        self
    }

    pub fn extra(mut self, extra: &'a [Value]) -> Self {
        self.extra = Some(extra);
        self
    }
}

/// The shared logging surface. Reads the ignore list, formats entries and
/// hands them to the console; never touches any other state.
pub struct Logger {
    ignored: BTreeSet<String>,
    console: Rc<dyn Console>,
}

impl Logger {
    pub fn new(ignored: BTreeSet<String>, console: Rc<dyn Console>) -> Self {
        Self { ignored, console }
    }

    pub fn console(&self) -> &Rc<dyn Console> {
        &self.console
    }

    pub fn is_ignored(&self, name: &str) -> bool {
        self.ignored.contains(name)
    }

    pub fn log_event(
        &self,
        page: &Page,
        action: EventAction,
        source: EventSource,
        name: &str,
        subject: EventSubject<'_>,
    ) {
        if self.is_ignored(name) {
            return;
        }
        let entry = EventEntry {
            action,
            source,
            name: name.to_string(),
            target: page.node_ref(subject.target),
            handler: subject.handler.map(HandlerRef::from),
            event: subject.event.map(|event| snapshot(page, event)),
            extra: subject.extra.map(<[Value]>::to_vec),
        };
        self.console.emit(ConsoleRecord::Event(entry));
    }

    pub fn log_mutation(
        &self,
        page: &Page,
        action: MutationAction,
        category: MutationCategory,
        selector: &str,
        node: Option<NodeId>,
        details: Option<Map<String, Value>>,
    ) {
        let Some(node) = node.filter(|n| page.document().contains_node(*n)) else {
            return;
        };
        let entry = MutationEntry {
            action,
            category,
            selector: selector.to_string(),
            node: page.node_ref(node),
            details,
        };
        self.console.emit(ConsoleRecord::Mutation(entry));
    }

    pub fn info(&self, message: &str, values: Value) {
        self.console.emit(ConsoleRecord::info(message, values));
    }

    pub fn error(&self, message: impl Into<String>) {
        self.console.emit(ConsoleRecord::error(message));
    }
}

fn snapshot(page: &Page, event: &Event) -> EventSnapshot {
    EventSnapshot {
        event_type: event.event_type().to_string(),
        target: event.target().map(|n| page.node_ref(n)),
        current_target: event.current_target().map(|n| page.node_ref(n)),
        phase: event.phase(),
        default_prevented: event.default_prevented(),
        detail: event.detail().cloned(),
    }
}
