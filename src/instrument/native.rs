use std::rc::Rc;

use tracing::debug;

use super::console::{EventAction, EventSource};
use super::identity::ListenerAssociations;
use super::logger::{EventSubject, Logger};
use super::DebugContext;
use crate::config::Module;
use crate::page::dom::NodeId;
use crate::page::event::{EventTargetApi, Handler, ListenerOptions};
use crate::page::Page;

/// Decorates the page's event-target capability: listeners are registered as
/// logging wrappers, and removal resolves back to the wrapper.
pub struct NativeInterceptor {
    logger: Rc<Logger>,
    inner: Rc<dyn EventTargetApi>,
    associations: ListenerAssociations,
}

impl NativeInterceptor {
    pub fn new(logger: Rc<Logger>, inner: Rc<dyn EventTargetApi>) -> Self {
        Self {
            logger,
            inner,
            associations: ListenerAssociations::new(),
        }
    }

    /// Patches `page` once per context. Later calls return `None` and change nothing.
    pub fn install(ctx: &DebugContext, page: &Page) -> Option<Rc<Self>> {
        if !ctx.flags().claim(Module::NativeEvents) {
            debug!("native event interception already installed");
            return None;
        }
        let interceptor = Rc::new(Self::new(ctx.logger().clone(), page.event_api()));
        page.set_event_api(interceptor.clone());
        ctx.logger().info(
            "Event debugging initialized. Ignored events:",
            serde_json::json!(ctx.config().ignore_events),
        );
        Some(interceptor)
    }

    pub fn associations(&self) -> &ListenerAssociations {
        &self.associations
    }

    fn wrap(&self, listener: &Handler) -> Handler {
        let logger = self.logger.clone();
        let original = listener.clone();
        Handler::proxy(listener, move |call| {
            logger.log_event(
                call.page,
                EventAction::Trigger,
                EventSource::Native,
                call.event.event_type(),
                EventSubject::on(call.this).handler(&original).event(call.event),
            );
            original.call(call)
        })
    }
}

impl EventTargetApi for NativeInterceptor {
    fn add_event_listener(
        &self,
        page: &Page,
        target: NodeId,
        event_type: &str,
        listener: Handler,
        options: ListenerOptions,
    ) {
        let wrapper = self
            .associations
            .wrapper_for(target, &listener)
            .unwrap_or_else(|| self.wrap(&listener));
        self.associations
            .record(target, &listener, &wrapper, event_type, options.capture);
        self.logger.log_event(
            page,
            EventAction::Add,
            EventSource::Native,
            event_type,
            EventSubject::on(target).handler(&listener),
        );
        self.inner
            .add_event_listener(page, target, event_type, wrapper, options);
    }

    fn remove_event_listener(
        &self,
        page: &Page,
        target: NodeId,
        event_type: &str,
        listener: &Handler,
        options: ListenerOptions,
    ) {
        match self
            .associations
            .release(target, listener, event_type, options.capture)
        {
            Some(wrapper) => {
                self.logger.log_event(
                    page,
                    EventAction::Remove,
                    EventSource::Native,
                    event_type,
                    EventSubject::on(target).handler(listener),
                );
                self.inner
                    .remove_event_listener(page, target, event_type, &wrapper, options);
            }
            None => {
                debug!(event_type, %listener, "untracked listener, removing as given");
                self.inner
                    .remove_event_listener(page, target, event_type, listener, options);
            }
        }
    }
}
