//! Page-lifetime debug configuration and the toggle surface that decides which
//! instrumentation modules are delivered.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::warn;

const DEFAULT_IGNORED: &str = "mousemove, message, keypress, keyup, keydown";

/// Resolved configuration every instrumentation module reads. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DebugConfig {
    /// Event names the logger drops (exact, case-sensitive).
    pub ignore_events: BTreeSet<String>,
    /// Watched selectors, in the order they are reported.
    pub watch_elements: Vec<String>,
    pub wait_on_mutation: bool,
    pub empty_apple_wallet: bool,
}

impl DebugConfig {
    /// Parses the injected payload. Never fails: malformed input degrades to the
    /// empty configuration so the page keeps working.
    pub fn from_json(raw: &str) -> Self {
        match serde_json::from_str(raw) {
            Ok(config) => config,
            Err(e) => {
                warn!("Malformed debug configuration, using defaults: {}", e);
                Self::default()
            }
        }
    }

    /// Same as [`DebugConfig::from_json`], treating an absent payload as empty.
    pub fn from_source(raw: Option<&str>) -> Self {
        raw.map(Self::from_json).unwrap_or_default()
    }

    pub fn is_ignored(&self, event_name: &str) -> bool {
        self.ignore_events.contains(event_name)
    }
}

/// The toggle surface. Keys and defaults mirror the settings page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub enable_debugging: bool,
    pub js_event_debugger: bool,
    pub js_event_debugger_ignored: String,
    pub dom_watcher: bool,
    pub dom_watcher_pause: bool,
    pub dom_watcher_selectors: String,
    pub mock_apple_pay_session: bool,
    pub mock_empty_apple_pay_wallet: bool,
    #[serde(rename = "globalDOMSearch")]
    pub global_dom_search: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enable_debugging: false,
            js_event_debugger: false,
            js_event_debugger_ignored: DEFAULT_IGNORED.to_string(),
            dom_watcher: false,
            dom_watcher_pause: false,
            dom_watcher_selectors: String::new(),
            mock_apple_pay_session: false,
            mock_empty_apple_pay_wallet: false,
            global_dom_search: false,
        }
    }
}

impl Settings {
    pub fn debug_config(&self) -> DebugConfig {
        DebugConfig {
            ignore_events: split_list(&self.js_event_debugger_ignored).collect(),
            watch_elements: split_list(&self.dom_watcher_selectors).collect(),
            wait_on_mutation: self.dom_watcher_pause,
            empty_apple_wallet: self.mock_empty_apple_pay_wallet,
        }
    }

    /// Which modules get delivered, in delivery order.
    pub fn plan(&self) -> ModulePlan {
        if !self.enable_debugging {
            return ModulePlan::default();
        }
        let mut plan = ModulePlan::default();
        if self.js_event_debugger {
            plan.early.push(Module::NativeEvents);
        }
        if self.dom_watcher {
            plan.early.push(Module::DomWatcher);
        }
        if self.mock_apple_pay_session {
            plan.early.push(Module::PaymentMock);
        }
        if self.js_event_debugger {
            plan.after_library.push(Module::LegacyEvents);
        }
        plan
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = String> + '_ {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
}

/// An instrumentation module that can be installed onto a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Module {
    NativeEvents,
    LegacyEvents,
    DomWatcher,
    PaymentMock,
}

/// Two delivery batches: modules injected early in the head, and modules that
/// need the legacy library to be loaded first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ModulePlan {
    pub early: Vec<Module>,
    pub after_library: Vec<Module>,
}

impl ModulePlan {
    /// Every module in both batches.
    pub fn all() -> Self {
        Self {
            early: vec![Module::NativeEvents, Module::DomWatcher, Module::PaymentMock],
            after_library: vec![Module::LegacyEvents],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.early.is_empty() && self.after_library.is_empty()
    }

    pub fn contains(&self, module: Module) -> bool {
        self.early.contains(&module) || self.after_library.contains(&module)
    }
}
