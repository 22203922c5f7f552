//! In-memory host page: document, listener store, mutation queues and the
//! extension points (event target, legacy library, payments) that
//! instrumentation modules decorate.

pub mod dom;
pub mod event;
pub mod observer;
pub mod payment;
pub mod selector;

use std::cell::{Ref, RefCell};
use std::rc::Rc;

use serde::Serialize;
use tracing::{error, warn};

use crate::error::{DomError, SelectorError};
use crate::legacy::LegacyEventApi;
use dom::{Document, NodeId};
use event::{Event, EventPhase, EventTargetApi, Handler, Invocation, ListenerOptions, PlatformEvents};
use observer::{MutationCallback, MutationObserverInit, MutationRecord, ObserverSlot};
use payment::{PaymentApi, UnavailablePayments};
use selector::Selector;

const MAX_FLUSH_ROUNDS: usize = 1_000;

/// Node reference as it appears in console output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeRef {
    pub id: NodeId,
    pub label: String,
}

pub struct Page {
    document: RefCell<Document>,
    platform: Rc<PlatformEvents>,
    event_api: RefCell<Rc<dyn EventTargetApi>>,
    legacy_api: RefCell<Option<Rc<dyn LegacyEventApi>>>,
    payment_api: RefCell<Rc<dyn PaymentApi>>,
    observers: RefCell<Vec<Rc<ObserverSlot>>>,
    prefers_dark: bool,
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

impl Page {
    pub fn new() -> Self {
        Self::with_color_scheme(false)
    }

    pub fn with_color_scheme(prefers_dark: bool) -> Self {
        let platform = Rc::new(PlatformEvents::new());
        Self {
            document: RefCell::new(Document::new()),
            event_api: RefCell::new(platform.clone() as Rc<dyn EventTargetApi>),
            platform,
            legacy_api: RefCell::new(None),
            payment_api: RefCell::new(Rc::new(UnavailablePayments) as Rc<dyn PaymentApi>),
            observers: RefCell::new(Vec::new()),
            prefers_dark,
        }
    }

    pub fn prefers_dark(&self) -> bool {
        self.prefers_dark
    }

    pub fn document(&self) -> Ref<'_, Document> {
        self.document.borrow()
    }

    pub fn body(&self) -> NodeId {
        self.document().body()
    }

    pub fn node_ref(&self, id: NodeId) -> NodeRef {
        NodeRef {
            id,
            label: self.document().describe(id),
        }
    }

    // === Document mutation (records are queued for observers) ===

    pub fn create_element(&self, tag: &str) -> NodeId {
        self.document.borrow_mut().create_element(tag)
    }

    pub fn create_text(&self, text: &str) -> NodeId {
        self.document.borrow_mut().create_text(text)
    }

    pub fn create_comment(&self, text: &str) -> NodeId {
        self.document.borrow_mut().create_comment(text)
    }

    pub fn append_child(&self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        let records = self.document.borrow_mut().append_child(parent, child)?;
        self.queue_records(records);
        Ok(())
    }

    pub fn insert_before(
        &self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DomError> {
        let records = self
            .document
            .borrow_mut()
            .insert_before(parent, child, reference)?;
        self.queue_records(records);
        Ok(())
    }

    pub fn remove_child(&self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        let record = self.document.borrow_mut().remove_child(parent, child)?;
        self.queue_records(vec![record]);
        Ok(())
    }

    /// Detaches `node` from its parent; a detached node is left alone.
    pub fn remove(&self, node: NodeId) -> Result<(), DomError> {
        let parent = self.document().parent(node);
        match parent {
            Some(parent) => self.remove_child(parent, node),
            None => Ok(()),
        }
    }

    pub fn set_attribute(&self, node: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        let record = self.document.borrow_mut().set_attribute(node, name, value)?;
        self.queue_records(vec![record]);
        Ok(())
    }

    pub fn remove_attribute(&self, node: NodeId, name: &str) -> Result<(), DomError> {
        let record = self.document.borrow_mut().remove_attribute(node, name)?;
        self.queue_records(record.into_iter().collect());
        Ok(())
    }

    pub fn set_data(&self, node: NodeId, data: &str) -> Result<(), DomError> {
        let record = self.document.borrow_mut().set_data(node, data)?;
        self.queue_records(vec![record]);
        Ok(())
    }

    pub fn set_text_content(&self, node: NodeId, text: &str) -> Result<(), DomError> {
        let records = self.document.borrow_mut().set_text_content(node, text)?;
        self.queue_records(records);
        Ok(())
    }

    // === Queries ===

    pub fn query_selector(&self, selector: &str) -> Result<Option<NodeId>, SelectorError> {
        let selector = Selector::parse(selector)?;
        let doc = self.document();
        Ok(selector.query_first(&doc, doc.root()))
    }

    pub fn query_selector_all(&self, selector: &str) -> Result<Vec<NodeId>, SelectorError> {
        let selector = Selector::parse(selector)?;
        let doc = self.document();
        Ok(selector.query_all(&doc, doc.root()))
    }

    // === Mutation observation ===

    pub fn observe(&self, root: NodeId, init: MutationObserverInit, callback: MutationCallback) {
        self.observers
            .borrow_mut()
            .push(Rc::new(ObserverSlot::new(root, init, callback)));
    }

    fn queue_records(&self, records: Vec<MutationRecord>) {
        if records.is_empty() {
            return;
        }
        let observers = self.observers.borrow().clone();
        if observers.is_empty() {
            return;
        }
        let doc = self.document();
        for record in records {
            for observer in observers.iter().filter(|o| o.interested(&doc, &record)) {
                observer.enqueue(record.clone());
            }
        }
    }

    /// Microtask checkpoint: delivers pending batches, observer by observer, until
    /// callbacks stop producing new records. Returns the number of records delivered.
    pub fn flush_mutations(&self) -> usize {
        let mut delivered = 0;
        for _ in 0..MAX_FLUSH_ROUNDS {
            let observers = self.observers.borrow().clone();
            let mut progressed = false;
            for observer in observers {
                let batch = observer.take_records();
                if batch.is_empty() {
                    continue;
                }
                progressed = true;
                delivered += batch.len();
                let callback = observer.callback();
                callback(self, &batch);
            }
            if !progressed {
                return delivered;
            }
        }
        warn!(delivered, "mutation observers kept producing records; giving up");
        delivered
    }

    // === Event target capability ===

    pub fn event_api(&self) -> Rc<dyn EventTargetApi> {
        self.event_api.borrow().clone()
    }

    pub fn set_event_api(&self, api: Rc<dyn EventTargetApi>) {
        *self.event_api.borrow_mut() = api;
    }

    /// The unpatched store, for inspection.
    pub fn platform(&self) -> &PlatformEvents {
        &self.platform
    }

    pub fn add_event_listener(
        &self,
        target: NodeId,
        event_type: &str,
        listener: Handler,
        options: ListenerOptions,
    ) {
        let api = self.event_api();
        api.add_event_listener(self, target, event_type, listener, options);
    }

    pub fn remove_event_listener(
        &self,
        target: NodeId,
        event_type: &str,
        listener: &Handler,
        options: ListenerOptions,
    ) {
        let api = self.event_api();
        api.remove_event_listener(self, target, event_type, listener, options);
    }

    /// Capture, target and bubble phases over the target's ancestor path.
    /// Returns false when a listener prevented the default action.
    pub fn dispatch_event(&self, target: NodeId, event: &Event) -> bool {
        let path = self.document().event_path(target);
        event.begin_dispatch(target);

        for node in path.iter().skip(1).rev() {
            if event.propagation_stopped() {
                break;
            }
            self.invoke_listeners(*node, event, EventPhase::Capturing);
        }
        if !event.propagation_stopped() {
            self.invoke_listeners(target, event, EventPhase::AtTarget);
        }
        if event.bubbles() {
            for node in path.iter().skip(1) {
                if event.propagation_stopped() {
                    break;
                }
                self.invoke_listeners(*node, event, EventPhase::Bubbling);
            }
        }

        event.end_dispatch();
        !event.default_prevented()
    }

    fn invoke_listeners(&self, node: NodeId, event: &Event, phase: EventPhase) {
        let registrations = self.platform.snapshot(node, event.event_type());
        if registrations.is_empty() {
            return;
        }
        event.enter(node, phase);
        for registration in registrations {
            if registration.is_removed() {
                continue;
            }
            let skip = match phase {
                EventPhase::Capturing => !registration.capture(),
                EventPhase::Bubbling => registration.capture(),
                _ => false,
            };
            if skip {
                continue;
            }
            if registration.once() {
                self.platform.detach(node, &registration);
            }
            let invocation = Invocation {
                page: self,
                this: node,
                event,
                args: &[],
            };
            if let Err(err) = registration.handler().call(&invocation) {
                error!(
                    event = event.event_type(),
                    listener = %registration.handler(),
                    "uncaught error in listener: {err}"
                );
            }
            if event.immediate_propagation_stopped() {
                break;
            }
        }
    }

    // === Legacy library ===

    pub fn legacy(&self) -> Option<Rc<dyn LegacyEventApi>> {
        self.legacy_api.borrow().clone()
    }

    pub fn set_legacy(&self, api: Rc<dyn LegacyEventApi>) {
        *self.legacy_api.borrow_mut() = Some(api);
    }

    // === Payments ===

    pub fn payments(&self) -> Rc<dyn PaymentApi> {
        self.payment_api.borrow().clone()
    }

    pub fn set_payments(&self, api: Rc<dyn PaymentApi>) {
        *self.payment_api.borrow_mut() = api;
    }
}
