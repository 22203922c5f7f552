use std::cell::{Cell, RefCell};
use std::fmt;
use std::io::Write;

use serde::Serialize;
use serde_json::{Map, Value};

use super::theme::{Paint, Theme};
use crate::page::event::{EventPhase, Handler, HandlerId};
use crate::page::NodeRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EventAction {
    Add,
    Remove,
    Trigger,
}

/// Which interception layer observed the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EventSource {
    Native,
    Legacy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MutationAction {
    Add,
    Remove,
    Change,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MutationCategory {
    Child,
    Attr,
    Content,
}

macro_rules! display_as_debug {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Debug::fmt(self, f)
            }
        })*
    };
}

display_as_debug!(EventAction, EventSource, MutationAction, MutationCategory);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandlerRef {
    pub id: HandlerId,
    pub label: Option<String>,
}

impl From<&Handler> for HandlerRef {
    fn from(handler: &Handler) -> Self {
        Self {
            id: handler.id(),
            label: handler.label().map(str::to_string),
        }
    }
}

impl fmt::Display for HandlerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.label {
            Some(label) => write!(f, "fn#{} {}", self.id.get(), label),
            None => write!(f, "fn#{}", self.id.get()),
        }
    }
}

/// The raw event as it looked when a wrapped listener fired.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventSnapshot {
    pub event_type: String,
    pub target: Option<NodeRef>,
    pub current_target: Option<NodeRef>,
    pub phase: EventPhase,
    pub default_prevented: bool,
    pub detail: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventEntry {
    pub action: EventAction,
    pub source: EventSource,
    pub name: String,
    pub target: NodeRef,
    pub handler: Option<HandlerRef>,
    pub event: Option<EventSnapshot>,
    pub extra: Option<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MutationEntry {
    pub action: MutationAction,
    pub category: MutationCategory,
    pub selector: String,
    pub node: NodeRef,
    pub details: Option<Map<String, Value>>,
}

/// One emission on the console stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ConsoleRecord {
    Event(EventEntry),
    Mutation(MutationEntry),
    Info { message: String, values: Value },
    Error { message: String },
}

impl ConsoleRecord {
    pub fn info(message: impl Into<String>, values: Value) -> Self {
        ConsoleRecord::Info {
            message: message.into(),
            values,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ConsoleRecord::Error {
            message: message.into(),
        }
    }

    pub fn as_event(&self) -> Option<&EventEntry> {
        match self {
            ConsoleRecord::Event(entry) => Some(entry),
            _ => None,
        }
    }

    pub fn as_mutation(&self) -> Option<&MutationEntry> {
        match self {
            ConsoleRecord::Mutation(entry) => Some(entry),
            _ => None,
        }
    }

    /// `[Add Native Event: click] {target, handler} {event}`, colored when `ansi` is set.
    pub fn render(&self, theme: &Theme, ansi: bool) -> String {
        let paint = Paint::new(ansi);
        match self {
            ConsoleRecord::Event(entry) => {
                let mut line = format!(
                    "[{} {} Event: {}] {}",
                    paint.color(theme.event_action(entry.action), entry.action),
                    paint.color(theme.event_source(entry.source), entry.source),
                    paint.bold(&entry.name),
                    details_of(&entry.target, entry.handler.as_ref()),
                );
                if let Some(event) = &entry.event {
                    line.push(' ');
                    line.push_str(&json_of(event));
                }
                if let Some(extra) = &entry.extra {
                    line.push(' ');
                    line.push_str(&json_of(extra));
                }
                line
            }
            ConsoleRecord::Mutation(entry) => {
                let mut line = format!(
                    "[{} {} Mutation: {}] {}",
                    paint.color(theme.mutation_action(entry.action), entry.action),
                    paint.color(theme.mutation_category(entry.category), entry.category),
                    paint.bold(&entry.selector),
                    entry.node.label,
                );
                if let Some(details) = &entry.details {
                    line.push(' ');
                    line.push_str(&json_of(details));
                }
                line
            }
            ConsoleRecord::Info { message, values } => format!("{message} {values}"),
            ConsoleRecord::Error { message } => message.clone(),
        }
    }
}

fn details_of(target: &NodeRef, handler: Option<&HandlerRef>) -> String {
    match handler {
        Some(handler) => format!("{{target: {}, handler: {}}}", target.label, handler),
        None => format!("{{target: {}}}", target.label),
    }
}

fn json_of<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "<unserializable>".to_string())
}

/// Sink for the user-facing console stream.
pub trait Console {
    fn emit(&self, record: ConsoleRecord);
}

/// Renders records and forwards them to `tracing` under the `domscope::console` target.
#[derive(Debug, Clone)]
pub struct TracingConsole {
    theme: Theme,
    ansi: bool,
}

impl TracingConsole {
    pub fn new(theme: Theme, ansi: bool) -> Self {
        Self { theme, ansi }
    }
}

impl Console for TracingConsole {
    fn emit(&self, record: ConsoleRecord) {
        let line = record.render(&self.theme, self.ansi);
        match record {
            ConsoleRecord::Error { .. } => tracing::error!(target: "domscope::console", "{line}"),
            _ => tracing::info!(target: "domscope::console", "{line}"),
        }
    }
}

/// How [`StreamConsole`] writes each record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamFormat {
    /// Rendered line, colored when `ansi` is set.
    Text { ansi: bool },
    /// One JSON object per line.
    JsonLines,
}

/// Writes every record to `W` the moment it is emitted.
pub struct StreamConsole<W: Write> {
    theme: Theme,
    format: StreamFormat,
    out: RefCell<W>,
    written: Cell<usize>,
}

impl<W: Write> StreamConsole<W> {
    pub fn new(out: W, theme: Theme, format: StreamFormat) -> Self {
        Self {
            theme,
            format,
            out: RefCell::new(out),
            written: Cell::new(0),
        }
    }

    /// Records written so far.
    pub fn written(&self) -> usize {
        self.written.get()
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }

    fn line(&self, record: &ConsoleRecord) -> Result<String, serde_json::Error> {
        match self.format {
            StreamFormat::Text { ansi } => Ok(record.render(&self.theme, ansi)),
            StreamFormat::JsonLines => serde_json::to_string(record),
        }
    }
}

impl<W: Write> Console for StreamConsole<W> {
    fn emit(&self, record: ConsoleRecord) {
        let line = match self.line(&record) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!("console record not serializable: {}", e);
                return;
            }
        };
        let mut out = self.out.borrow_mut();
        match writeln!(out, "{line}").and_then(|_| out.flush()) {
            Ok(()) => self.written.set(self.written.get() + 1),
            Err(e) => tracing::warn!("console write failed: {}", e),
        }
    }
}

/// Keeps every record in memory.
#[derive(Debug, Default)]
pub struct RecordingConsole {
    records: RefCell<Vec<ConsoleRecord>>,
}

impl RecordingConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<ConsoleRecord> {
        self.records.borrow().clone()
    }

    pub fn events(&self) -> Vec<EventEntry> {
        self.records
            .borrow()
            .iter()
            .filter_map(ConsoleRecord::as_event)
            .cloned()
            .collect()
    }

    pub fn mutations(&self) -> Vec<MutationEntry> {
        self.records
            .borrow()
            .iter()
            .filter_map(ConsoleRecord::as_mutation)
            .cloned()
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.records
            .borrow()
            .iter()
            .filter_map(|record| match record {
                ConsoleRecord::Error { message } => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }

    /// Removes and returns everything recorded so far.
    pub fn drain(&self) -> Vec<ConsoleRecord> {
        std::mem::take(&mut *self.records.borrow_mut())
    }
}

impl Console for RecordingConsole {
    fn emit(&self, record: ConsoleRecord) {
        self.records.borrow_mut().push(record);
    }
}
