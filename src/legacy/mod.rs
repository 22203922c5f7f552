//! Selection-based event binding library with delegation support, and the
//! normalizer for its overloaded argument lists.

pub mod binder;

pub use binder::Binder;

use serde_json::Value;

use crate::error::{ArgError, HandlerError, SelectorError};
use crate::page::dom::NodeId;
use crate::page::event::Handler;
use crate::page::selector::Selector;
use crate::page::Page;

/// Ordered event-name → handler map, as accepted by the map form of `on`.
pub type EventMap = Vec<(String, Handler)>;

/// One raw argument of an `on`/`off` call.
#[derive(Debug, Clone)]
pub enum Arg {
    Str(String),
    Map(EventMap),
    Func(Handler),
    Data(Value),
    Null,
}

impl Arg {
    pub fn kind(&self) -> &'static str {
        match self {
            Arg::Str(_) => "string",
            Arg::Map(_) => "object",
            Arg::Func(_) => "function",
            Arg::Data(_) => "data",
            Arg::Null => "null",
        }
    }
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Arg::Str(value.to_string())
    }
}

impl From<String> for Arg {
    fn from(value: String) -> Self {
        Arg::Str(value)
    }
}

impl From<Handler> for Arg {
    fn from(value: Handler) -> Self {
        Arg::Func(value)
    }
}

impl From<&Handler> for Arg {
    fn from(value: &Handler) -> Self {
        Arg::Func(value.clone())
    }
}

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        Arg::Data(value)
    }
}

impl From<EventMap> for Arg {
    fn from(value: EventMap) -> Self {
        Arg::Map(value)
    }
}

/// Normalized `on` call.
#[derive(Debug, Clone)]
pub enum BindArgs {
    Map {
        events: EventMap,
        selector: Option<String>,
        data: Option<Value>,
    },
    Positional {
        names: String,
        selector: Option<String>,
        data: Option<Value>,
        handler: Handler,
        /// Position of the handler in the raw argument list.
        handler_slot: usize,
    },
}

impl BindArgs {
    /// Accepts `(map, selector?, data?)` or `(names, selector?, data?, handler)`.
    /// In the positional form the handler is the function in slot 1, else 2, else 3.
    pub fn parse(args: &[Arg]) -> Result<Self, ArgError> {
        match args.first() {
            Some(Arg::Map(events)) => {
                let (selector, data) = selector_and_data(&args[1..], 1)?;
                Ok(BindArgs::Map {
                    events: events.clone(),
                    selector,
                    data,
                })
            }
            Some(Arg::Str(names)) if !names.trim().is_empty() => {
                let handler_slot = (1..=3)
                    .find(|slot| matches!(args.get(*slot), Some(Arg::Func(_))))
                    .ok_or_else(|| ArgError::MissingHandler(names.clone()))?;
                if let Some(extra) = args.get(handler_slot + 1) {
                    return Err(ArgError::Unexpected {
                        position: handler_slot + 1,
                        found: extra.kind(),
                    });
                }
                let Some(Arg::Func(handler)) = args.get(handler_slot) else {
                    return Err(ArgError::MissingHandler(names.clone()));
                };
                let (selector, data) = selector_and_data(&args[1..handler_slot], 1)?;
                Ok(BindArgs::Positional {
                    names: names.clone(),
                    selector,
                    data,
                    handler: handler.clone(),
                    handler_slot,
                })
            }
            Some(other) if !matches!(other, Arg::Str(_)) => Err(ArgError::Unexpected {
                position: 0,
                found: other.kind(),
            }),
            _ => Err(ArgError::MissingEvents),
        }
    }

    /// Flattens into (names, selector, data, handler) bindings.
    pub fn bindings(&self) -> Vec<(&str, Option<&str>, Option<&Value>, &Handler)> {
        match self {
            BindArgs::Map {
                events,
                selector,
                data,
            } => events
                .iter()
                .map(|(name, handler)| (name.as_str(), selector.as_deref(), data.as_ref(), handler))
                .collect(),
            BindArgs::Positional {
                names,
                selector,
                data,
                handler,
                ..
            } => vec![(names.as_str(), selector.as_deref(), data.as_ref(), handler)],
        }
    }
}

// Between the event names and the handler: a string (or null) is the selector,
// anything else is data; with two slots the first is always the selector.
fn selector_and_data(
    slots: &[Arg],
    offset: usize,
) -> Result<(Option<String>, Option<Value>), ArgError> {
    let selector_of = |arg: &Arg, position: usize| match arg {
        Arg::Str(s) if s.is_empty() => Ok(None),
        Arg::Str(s) => Ok(Some(s.clone())),
        Arg::Null => Ok(None),
        other => Err(ArgError::Unexpected {
            position,
            found: other.kind(),
        }),
    };
    let data_of = |arg: &Arg, position: usize| match arg {
        Arg::Data(v) => Ok(Some(v.clone())),
        Arg::Str(s) => Ok(Some(Value::String(s.clone()))),
        Arg::Null => Ok(None),
        other => Err(ArgError::Unexpected {
            position,
            found: other.kind(),
        }),
    };

    match slots {
        [] => Ok((None, None)),
        [only @ (Arg::Str(_) | Arg::Null)] => Ok((selector_of(only, offset)?, None)),
        [only] => Ok((None, data_of(only, offset)?)),
        [selector, data] => Ok((selector_of(selector, offset)?, data_of(data, offset + 1)?)),
        [_, _, extra, ..] => Err(ArgError::Unexpected {
            position: offset + 2,
            found: extra.kind(),
        }),
    }
}

/// Normalized `off` call. `names == None` unbinds everything.
#[derive(Debug, Clone, Default)]
pub struct UnbindArgs {
    pub names: Option<String>,
    pub selector: Option<String>,
    pub handler: Option<Handler>,
}

impl UnbindArgs {
    /// Accepts `()`, `(names)`, `(names, handler)`, `(names, selector, handler)` or `(map, selector?)`.
    pub fn parse(args: &[Arg]) -> Result<Vec<Self>, ArgError> {
        match args {
            [] => Ok(vec![UnbindArgs::default()]),
            [Arg::Map(events), rest @ ..] => {
                let selector = match rest {
                    [] | [Arg::Null] => None,
                    [Arg::Str(s)] => Some(s.clone()),
                    [other, ..] => {
                        return Err(ArgError::Unexpected {
                            position: 1,
                            found: other.kind(),
                        })
                    }
                };
                Ok(events
                    .iter()
                    .map(|(name, handler)| UnbindArgs {
                        names: Some(name.clone()),
                        selector: selector.clone(),
                        handler: Some(handler.clone()),
                    })
                    .collect())
            }
            [Arg::Str(names), rest @ ..] => {
                let (selector, handler) = match rest {
                    [] => (None, None),
                    [Arg::Func(h)] => (None, Some(h.clone())),
                    [Arg::Str(s)] => (Some(s.clone()), None),
                    [Arg::Str(s), Arg::Func(h)] => (Some(s.clone()), Some(h.clone())),
                    [Arg::Null, Arg::Func(h)] => (None, Some(h.clone())),
                    [other, ..] => {
                        return Err(ArgError::Unexpected {
                            position: 1,
                            found: other.kind(),
                        })
                    }
                };
                Ok(vec![UnbindArgs {
                    names: Some(names.clone()),
                    selector,
                    handler,
                }])
            }
            [other, ..] => Err(ArgError::Unexpected {
                position: 0,
                found: other.kind(),
            }),
        }
    }
}

/// Event names for logging an `off` call: the names given, or `all`.
pub fn unbind_label(args: &[Arg]) -> String {
    match args.first() {
        Some(Arg::Str(names)) if !names.is_empty() => names.clone(),
        Some(Arg::Map(events)) => events
            .iter()
            .map(|(name, _)| name.as_str())
            .collect::<Vec<_>>()
            .join(" "),
        _ => "all".to_string(),
    }
}

/// An ordered set of nodes the library operates on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection(Vec<NodeId>);

impl Selection {
    pub fn of(nodes: impl IntoIterator<Item = NodeId>) -> Self {
        Self(nodes.into_iter().collect())
    }

    pub fn select(page: &Page, selector: &str) -> Result<Self, SelectorError> {
        Ok(Self(page.query_selector_all(selector)?))
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.0
    }

    pub fn first(&self) -> Option<NodeId> {
        self.0.first().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Bind/unbind entry points of the legacy library: the extension point legacy interception decorates.
pub trait LegacyEventApi {
    fn on(&self, page: &Page, selection: &Selection, args: Vec<Arg>) -> Result<(), ArgError>;

    fn off(&self, page: &Page, selection: &Selection, args: Vec<Arg>) -> Result<(), ArgError>;

    fn trigger(
        &self,
        page: &Page,
        selection: &Selection,
        event_type: &str,
        extra: &[Value],
    ) -> Result<(), HandlerError>;
}

/// Splits `click.menu.main` into (`click`, [`menu`, `main`]).
pub(crate) fn split_namespaces(name: &str) -> (&str, Vec<&str>) {
    let mut parts = name.split('.');
    let event_type = parts.next().unwrap_or_default();
    (event_type, parts.filter(|ns| !ns.is_empty()).collect())
}

pub(crate) fn parse_delegate(selector: Option<&str>) -> Result<Option<Selector>, SelectorError> {
    selector.map(Selector::parse).transpose()
}
