//! Drives a page from a JSON scenario so instrumentation output can be
//! reproduced outside a browser.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::config::{DebugConfig, ModulePlan, Settings};
use crate::error::{DomError, ScenarioError};
use crate::instrument::{self, DebugContext, InstallReport};
use crate::legacy::{Arg, Binder, EventMap, Selection};
use crate::page::dom::NodeId;
use crate::page::event::{Event, Handler, ListenerOptions};
use crate::page::Page;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Scenario {
    /// Toggle surface; decides both configuration and which modules load.
    pub settings: Option<Settings>,
    /// Explicit configuration; takes precedence over `settings`.
    pub config: Option<DebugConfig>,
    /// Modules to install when no settings are given. Defaults to all of them.
    pub modules: Option<ModulePlan>,
    /// Load the legacy library before instrumentation is installed.
    pub legacy_library: bool,
    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn from_json(raw: &str) -> Result<Self, ScenarioError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ScenarioError> {
        let raw = tokio::fs::read_to_string(path).await?;
        Self::from_json(&raw)
    }

    pub fn debug_config(&self) -> DebugConfig {
        match (&self.config, &self.settings) {
            (Some(config), _) => config.clone(),
            (None, Some(settings)) => settings.debug_config(),
            (None, None) => DebugConfig::default(),
        }
    }

    pub fn plan(&self) -> ModulePlan {
        match (&self.modules, &self.settings) {
            (Some(plan), _) => plan.clone(),
            (None, Some(settings)) if self.config.is_none() => settings.plan(),
            _ => ModulePlan::all(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Append {
        parent: String,
        tag: String,
        #[serde(default)]
        attributes: BTreeMap<String, String>,
        #[serde(default)]
        text: Option<String>,
    },
    Remove {
        target: String,
    },
    SetAttribute {
        target: String,
        name: String,
        value: String,
    },
    RemoveAttribute {
        target: String,
        name: String,
    },
    /// Rewrites the text of an element; a lone text child is edited in place.
    SetText {
        target: String,
        text: String,
    },
    Listen {
        target: String,
        event: String,
        listener: String,
        #[serde(default)]
        capture: bool,
        #[serde(default)]
        once: bool,
        #[serde(default)]
        returns: Option<Value>,
    },
    Unlisten {
        target: String,
        event: String,
        listener: String,
        #[serde(default)]
        capture: bool,
    },
    Dispatch {
        target: String,
        event: String,
        #[serde(default = "default_true")]
        bubbles: bool,
        #[serde(default = "default_true")]
        cancelable: bool,
        #[serde(default)]
        detail: Option<Value>,
    },
    Bind {
        target: String,
        events: String,
        listener: String,
        #[serde(default)]
        selector: Option<String>,
        #[serde(default)]
        data: Option<Value>,
        #[serde(default)]
        returns: Option<Value>,
    },
    /// Map form: event names to listener names.
    BindMap {
        target: String,
        handlers: BTreeMap<String, String>,
        #[serde(default)]
        selector: Option<String>,
    },
    Unbind {
        target: String,
        #[serde(default)]
        events: Option<String>,
        #[serde(default)]
        selector: Option<String>,
        #[serde(default)]
        listener: Option<String>,
    },
    Trigger {
        target: String,
        event: String,
        #[serde(default)]
        extra: Vec<Value>,
    },
    Flush,
    Wait {
        ms: u64,
    },
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaySummary {
    pub report: InstallReport,
    pub steps: usize,
    pub mutations_delivered: usize,
}

/// Prepares `page`, installs the scenario's modules into it and runs every step.
/// Mutations are flushed after each step, like a microtask checkpoint.
pub async fn run(
    scenario: &Scenario,
    page: &Page,
    ctx: &DebugContext,
) -> Result<ReplaySummary, ScenarioError> {
    if scenario.legacy_library && page.legacy().is_none() {
        Binder::load(page);
    }
    let report = instrument::install(ctx, page, &scenario.plan());
    let mut driver = Driver {
        page,
        listeners: HashMap::new(),
    };
    let mut summary = ReplaySummary {
        report,
        ..Default::default()
    };

    for (index, step) in scenario.steps.iter().enumerate() {
        let step_no = index + 1;
        debug!(step = step_no, ?step, "replaying");
        driver.apply(step_no, step).await?;
        summary.mutations_delivered += page.flush_mutations();
        summary.steps += 1;
    }
    info!(
        steps = summary.steps,
        mutations = summary.mutations_delivered,
        "Scenario complete"
    );
    Ok(summary)
}

struct Driver<'a> {
    page: &'a Page,
    listeners: HashMap<String, Handler>,
}

impl Driver<'_> {
    async fn apply(&mut self, step_no: usize, step: &Step) -> Result<(), ScenarioError> {
        let page = self.page;
        let dom = |source: DomError| ScenarioError::Dom {
            step: step_no,
            source,
        };
        match step {
            Step::Append {
                parent,
                tag,
                attributes,
                text,
            } => {
                let parent = self.node(step_no, parent)?;
                let element = page.create_element(tag);
                for (name, value) in attributes {
                    page.set_attribute(element, name, value).map_err(dom)?;
                }
                if let Some(text) = text {
                    let text = page.create_text(text);
                    page.append_child(element, text).map_err(dom)?;
                }
                page.append_child(parent, element).map_err(dom)?;
            }
            Step::Remove { target } => {
                let node = self.node(step_no, target)?;
                page.remove(node).map_err(dom)?;
            }
            Step::SetAttribute {
                target,
                name,
                value,
            } => {
                let node = self.node(step_no, target)?;
                page.set_attribute(node, name, value).map_err(dom)?;
            }
            Step::RemoveAttribute { target, name } => {
                let node = self.node(step_no, target)?;
                page.remove_attribute(node, name).map_err(dom)?;
            }
            Step::SetText { target, text } => {
                let node = self.node(step_no, target)?;
                let lone_text = {
                    let doc = page.document();
                    match doc.children(node) {
                        [only] if !doc.is_element(*only) => Some(*only),
                        _ => None,
                    }
                };
                match lone_text {
                    Some(text_node) => page.set_data(text_node, text).map_err(dom)?,
                    None => page.set_text_content(node, text).map_err(dom)?,
                }
            }
            Step::Listen {
                target,
                event,
                listener,
                capture,
                once,
                returns,
            } => {
                let node = self.node(step_no, target)?;
                let handler = self.listener(listener, returns.clone());
                let options = ListenerOptions {
                    capture: *capture,
                    once: *once,
                };
                page.add_event_listener(node, event, handler, options);
            }
            Step::Unlisten {
                target,
                event,
                listener,
                capture,
            } => {
                let node = self.node(step_no, target)?;
                let handler = self.known_listener(step_no, listener)?;
                let options = ListenerOptions {
                    capture: *capture,
                    once: false,
                };
                page.remove_event_listener(node, event, &handler, options);
            }
            Step::Dispatch {
                target,
                event,
                bubbles,
                cancelable,
                detail,
            } => {
                let node = self.node(step_no, target)?;
                let mut synthetic = Event::new(event.as_str())
                    .bubbling(*bubbles)
                    .cancelable(*cancelable);
                if let Some(detail) = detail {
                    synthetic = synthetic.with_detail(detail.clone());
                }
                let proceed = page.dispatch_event(node, &synthetic);
                debug!(event = event.as_str(), proceed, "dispatched");
            }
            Step::Bind {
                target,
                events,
                listener,
                selector,
                data,
                returns,
            } => {
                let handler = self.listener(listener, returns.clone());
                let mut args = vec![Arg::from(events.as_str())];
                match (selector, data) {
                    (Some(selector), Some(data)) => {
                        args.push(Arg::from(selector.as_str()));
                        args.push(Arg::Data(data.clone()));
                    }
                    (Some(selector), None) => args.push(Arg::from(selector.as_str())),
                    (None, Some(data)) => args.push(Arg::Data(data.clone())),
                    (None, None) => {}
                }
                args.push(Arg::Func(handler));
                self.bind(step_no, target, args)?;
            }
            Step::BindMap {
                target,
                handlers,
                selector,
            } => {
                let events: EventMap = handlers
                    .iter()
                    .map(|(event, listener)| (event.clone(), self.listener(listener, None)))
                    .collect();
                let mut args = vec![Arg::Map(events)];
                if let Some(selector) = selector {
                    args.push(Arg::from(selector.as_str()));
                }
                self.bind(step_no, target, args)?;
            }
            Step::Unbind {
                target,
                events,
                selector,
                listener,
            } => {
                let library = page
                    .legacy()
                    .ok_or(ScenarioError::NoLegacyLibrary { step: step_no })?;
                let selection = self.selection(step_no, target)?;
                let mut args = Vec::new();
                if let Some(events) = events {
                    args.push(Arg::from(events.as_str()));
                    if let Some(selector) = selector {
                        args.push(Arg::from(selector.as_str()));
                    }
                    if let Some(listener) = listener {
                        args.push(Arg::Func(self.known_listener(step_no, listener)?));
                    }
                }
                library
                    .off(page, &selection, args)
                    .map_err(|source| ScenarioError::Args {
                        step: step_no,
                        source,
                    })?;
            }
            Step::Trigger {
                target,
                event,
                extra,
            } => {
                let library = page
                    .legacy()
                    .ok_or(ScenarioError::NoLegacyLibrary { step: step_no })?;
                let selection = self.selection(step_no, target)?;
                library
                    .trigger(page, &selection, event, extra)
                    .map_err(|source| ScenarioError::Handler {
                        step: step_no,
                        source,
                    })?;
            }
            Step::Flush => {
                page.flush_mutations();
            }
            Step::Wait { ms } => {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
            }
        }
        Ok(())
    }

    fn node(&self, step: usize, selector: &str) -> Result<NodeId, ScenarioError> {
        self.page
            .query_selector(selector)
            .map_err(|source| ScenarioError::Selector { step, source })?
            .ok_or_else(|| ScenarioError::NoMatch {
                step,
                selector: selector.to_string(),
            })
    }

    fn selection(&self, step: usize, selector: &str) -> Result<Selection, ScenarioError> {
        let selection = Selection::select(self.page, selector)
            .map_err(|source| ScenarioError::Selector { step, source })?;
        if selection.is_empty() {
            return Err(ScenarioError::NoMatch {
                step,
                selector: selector.to_string(),
            });
        }
        Ok(selection)
    }

    fn bind(&self, step: usize, target: &str, args: Vec<Arg>) -> Result<(), ScenarioError> {
        let library = self
            .page
            .legacy()
            .ok_or(ScenarioError::NoLegacyLibrary { step })?;
        let selection = self.selection(step, target)?;
        library
            .on(self.page, &selection, args)
            .map_err(|source| ScenarioError::Args { step, source })
    }

    /// The listener registered under `name`, created on first use. Names keep
    /// their identity across steps so `unlisten`/`unbind` can refer back.
    fn listener(&mut self, name: &str, returns: Option<Value>) -> Handler {
        self.listeners
            .entry(name.to_string())
            .or_insert_with(|| {
                let label = name.to_string();
                Handler::named(name, move |call| {
                    debug!(listener = label.as_str(), event = call.event.event_type(), "listener ran");
                    Ok(returns.clone().unwrap_or(Value::Null))
                })
            })
            .clone()
    }

    fn known_listener(&self, step: usize, name: &str) -> Result<Handler, ScenarioError> {
        self.listeners
            .get(name)
            .cloned()
            .ok_or_else(|| ScenarioError::UnknownListener {
                step,
                name: name.to_string(),
            })
    }
}
