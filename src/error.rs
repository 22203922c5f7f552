use thiserror::Error;

use crate::page::dom::NodeId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomError {
    #[error("node {0:?} does not exist")]
    UnknownNode(NodeId),
    #[error("node {0:?} is not an element")]
    NotAnElement(NodeId),
    #[error("node {0:?} does not hold character data")]
    NotCharacterData(NodeId),
    #[error("node {child:?} is not a child of {parent:?}")]
    NotAChild { parent: NodeId, child: NodeId },
    #[error("cannot insert {child:?} into {parent:?}: hierarchy request")]
    HierarchyRequest { parent: NodeId, child: NodeId },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    #[error("'{0}' is not a valid selector")]
    UnsupportedSelector(String),
    #[error("empty selector")]
    Empty,
}

/// Raised when the legacy library receives arguments it cannot normalize.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgError {
    #[error("missing event names")]
    MissingEvents,
    #[error("unexpected argument at position {position}: {found}")]
    Unexpected { position: usize, found: &'static str },
    #[error("no handler supplied for '{0}'")]
    MissingHandler(String),
    #[error(transparent)]
    Selector(#[from] SelectorError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstallError {
    #[error("legacy library is not loaded on this page")]
    LegacyLibraryMissing,
}

/// Error thrown by an application handler. Interceptors pass it through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<DomError> for HandlerError {
    fn from(err: DomError) -> Self {
        Self(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("failed to read scenario: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse scenario: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("step {step}: selector '{selector}' matched nothing")]
    NoMatch { step: usize, selector: String },
    #[error("step {step}: {source}")]
    Dom {
        step: usize,
        #[source]
        source: DomError,
    },
    #[error("step {step}: {source}")]
    Selector {
        step: usize,
        #[source]
        source: SelectorError,
    },
    #[error("step {step}: {source}")]
    Args {
        step: usize,
        #[source]
        source: ArgError,
    },
    #[error("step {step}: handler failed: {source}")]
    Handler {
        step: usize,
        #[source]
        source: HandlerError,
    },
    #[error("step {step}: no listener named '{name}' was registered")]
    UnknownListener { step: usize, name: String },
    #[error("step {step}: page has no legacy library")]
    NoLegacyLibrary { step: usize },
}
