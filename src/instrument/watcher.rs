use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde_json::{Map, Value};
use tracing::{debug, error};

use super::console::{MutationAction, MutationCategory};
use super::logger::Logger;
use super::{Breakpoint, DebugContext, Pause};
use crate::config::Module;
use crate::page::dom::{Document, NodeId};
use crate::page::observer::{MutationKind, MutationObserverInit, MutationRecord};
use crate::page::selector::Selector;
use crate::page::Page;

/// How a watched selector has to relate to a node to count as a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPolicy {
    /// The node itself.
    Exact,
    /// The node, a descendant of it, or an ancestor of it.
    Related,
}

/// One observer over the whole document, logging changes that touch the watched selectors.
pub struct DomWatcher {
    logger: Rc<Logger>,
    selectors: Vec<String>,
    compiled: RefCell<HashMap<String, Option<Rc<Selector>>>>,
    pause: bool,
    breakpoint: Breakpoint,
}

impl DomWatcher {
    pub fn new(logger: Rc<Logger>, selectors: Vec<String>, pause: bool, breakpoint: Breakpoint) -> Self {
        Self {
            logger,
            selectors,
            compiled: RefCell::new(HashMap::new()),
            pause,
            breakpoint,
        }
    }

    pub fn install(ctx: &DebugContext, page: &Page) -> Option<Rc<Self>> {
        if !ctx.flags().claim(Module::DomWatcher) {
            debug!("dom watcher already installed");
            return None;
        }
        let config = ctx.config();
        let watcher = Rc::new(Self::new(
            ctx.logger().clone(),
            config.watch_elements.clone(),
            config.wait_on_mutation,
            ctx.breakpoint(),
        ));
        let root = page.document().document_element();
        let observer = watcher.clone();
        page.observe(
            root,
            MutationObserverInit::all(),
            Rc::new(move |page: &Page, records: &[MutationRecord]| observer.process(page, records)),
        );
        ctx.logger().info(
            "Debug script initialized. Watching for mutations on:",
            serde_json::json!(config.watch_elements),
        );
        Some(watcher)
    }

    pub fn selectors(&self) -> &[String] {
        &self.selectors
    }

    /// Handles one delivered batch, record by record.
    pub fn process(&self, page: &Page, records: &[MutationRecord]) {
        for record in records {
            let matched = self.process_record(page, record);
            if self.pause && !matched.is_empty() {
                let breakpoint = self.breakpoint.clone();
                breakpoint(&Pause {
                    page,
                    record,
                    matched: &matched,
                });
            }
        }
    }

    fn process_record(&self, page: &Page, record: &MutationRecord) -> Vec<(String, NodeId)> {
        let mut matched = Vec::new();
        match &record.kind {
            MutationKind::ChildList { added, removed } => {
                for &node in added {
                    self.log_matches(page, node, MatchPolicy::Related, MutationAction::Add, MutationCategory::Child, None, &mut matched);
                }
                for &node in removed {
                    self.log_matches(page, node, MatchPolicy::Related, MutationAction::Remove, MutationCategory::Child, None, &mut matched);
                }
            }
            MutationKind::Attributes { name, .. } => {
                let value = page
                    .document()
                    .attribute(record.target, name)
                    .map_or(Value::Null, |v| Value::String(v.to_string()));
                let mut details = Map::new();
                details.insert(name.clone(), value);
                self.log_matches(page, record.target, MatchPolicy::Exact, MutationAction::Change, MutationCategory::Attr, Some(details), &mut matched);
            }
            MutationKind::CharacterData { .. } => {
                let (parent, content) = {
                    let doc = page.document();
                    (doc.parent(record.target), doc.text_content(record.target))
                };
                if let Some(parent) = parent {
                    let mut details = Map::new();
                    details.insert("newContent".to_string(), Value::String(content));
                    self.log_matches(page, parent, MatchPolicy::Exact, MutationAction::Change, MutationCategory::Content, Some(details), &mut matched);
                }
            }
        }
        matched
    }

    #[allow(clippy::too_many_arguments)]
    fn log_matches(
        &self,
        page: &Page,
        node: NodeId,
        policy: MatchPolicy,
        action: MutationAction,
        category: MutationCategory,
        details: Option<Map<String, Value>>,
        matched: &mut Vec<(String, NodeId)>,
    ) {
        for selector in self.matching_selectors(page, node, policy) {
            self.logger
                .log_mutation(page, action, category, &selector, Some(node), details.clone());
            matched.push((selector, node));
        }
    }

    /// Watched selectors matching `node` under `policy`, in configured order.
    /// Non-elements match nothing.
    pub fn matching_selectors(&self, page: &Page, node: NodeId, policy: MatchPolicy) -> Vec<String> {
        if !page.document().is_element(node) {
            return Vec::new();
        }
        let compiled: Vec<(&String, Rc<Selector>)> = self
            .selectors
            .iter()
            .filter_map(|source| self.compile(source).map(|sel| (source, sel)))
            .collect();
        let doc = page.document();
        compiled
            .into_iter()
            .filter(|(_, selector)| selector_applies(&doc, selector, node, policy))
            .map(|(source, _)| source.clone())
            .collect()
    }

    fn compile(&self, source: &str) -> Option<Rc<Selector>> {
        if let Some(cached) = self.compiled.borrow().get(source) {
            return cached.clone();
        }
        let compiled = match Selector::parse(source) {
            Ok(selector) => Some(Rc::new(selector)),
            Err(e) => {
                error!(selector = source, "invalid watch selector: {}", e);
                self.logger
                    .error(format!("Failed to evaluate watch selector '{source}': {e}"));
                None
            }
        };
        self.compiled
            .borrow_mut()
            .insert(source.to_string(), compiled.clone());
        compiled
    }
}

fn selector_applies(doc: &Document, selector: &Selector, node: NodeId, policy: MatchPolicy) -> bool {
    if selector.matches(doc, node) {
        return true;
    }
    match policy {
        MatchPolicy::Exact => false,
        MatchPolicy::Related => {
            selector.query_first(doc, node).is_some()
                || doc.ancestors(node).any(|ancestor| selector.matches(doc, ancestor))
        }
    }
}
