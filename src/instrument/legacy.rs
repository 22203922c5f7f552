use std::rc::Rc;

use serde_json::Value;
use tracing::debug;

use super::console::{EventAction, EventSource};
use super::identity::HandlerWrappers;
use super::logger::{EventSubject, Logger};
use super::DebugContext;
use crate::config::Module;
use crate::error::{ArgError, HandlerError, InstallError};
use crate::legacy::{unbind_label, Arg, BindArgs, LegacyEventApi, Selection};
use crate::page::dom::NodeId;
use crate::page::event::Handler;
use crate::page::Page;

/// Decorates the legacy library's `on`/`off`. Bound handlers are swapped for
/// logging proxies; `off` is logged once per call and passed through untouched.
pub struct LegacyInterceptor {
    logger: Rc<Logger>,
    inner: Rc<dyn LegacyEventApi>,
    wrappers: HandlerWrappers,
}

impl LegacyInterceptor {
    pub fn new(logger: Rc<Logger>, inner: Rc<dyn LegacyEventApi>) -> Self {
        Self {
            logger,
            inner,
            wrappers: HandlerWrappers::new(),
        }
    }

    /// Patches the page's legacy library once per context. Fails when the page
    /// has no library loaded; the flag stays unclaimed so a later call can succeed.
    pub fn install(ctx: &DebugContext, page: &Page) -> Result<Option<Rc<Self>>, InstallError> {
        let library = page.legacy().ok_or(InstallError::LegacyLibraryMissing)?;
        if !ctx.flags().claim(Module::LegacyEvents) {
            debug!("legacy event interception already installed");
            return Ok(None);
        }
        let interceptor = Rc::new(Self::new(ctx.logger().clone(), library));
        page.set_legacy(interceptor.clone());
        Ok(Some(interceptor))
    }

    pub fn wrappers(&self) -> &HandlerWrappers {
        &self.wrappers
    }

    fn wrap(&self, page: &Page, context: NodeId, names: &str, original: &Handler) -> Handler {
        let wrapper = match self.wrappers.get(original, names) {
            Some(existing) => existing,
            None => {
                let logger = self.logger.clone();
                let handler = original.clone();
                let bound_names = names.to_string();
                let wrapper = Handler::proxy(original, move |call| {
                    let mut subject = EventSubject::on(call.this)
                        .handler(&handler)
                        .event(call.event);
                    if !call.args.is_empty() {
                        subject = subject.extra(call.args);
                    }
                    logger.log_event(
                        call.page,
                        EventAction::Trigger,
                        EventSource::Legacy,
                        &bound_names,
                        subject,
                    );
                    handler.call(call)
                });
                self.wrappers.insert(original, names, &wrapper);
                wrapper
            }
        };
        self.logger.log_event(
            page,
            EventAction::Add,
            EventSource::Legacy,
            names,
            EventSubject::on(context).handler(original),
        );
        wrapper
    }

    fn wrap_args(&self, page: &Page, context: NodeId, mut args: Vec<Arg>, parsed: BindArgs) -> Vec<Arg> {
        match parsed {
            BindArgs::Map { events, .. } => {
                let wrapped = events
                    .iter()
                    .map(|(name, handler)| (name.clone(), self.wrap(page, context, name, handler)))
                    .collect();
                args[0] = Arg::Map(wrapped);
            }
            BindArgs::Positional {
                names,
                handler,
                handler_slot,
                ..
            } => {
                args[handler_slot] = Arg::Func(self.wrap(page, context, &names, &handler));
            }
        }
        args
    }
}

fn context_of(page: &Page, selection: &Selection) -> NodeId {
    selection.first().unwrap_or_else(|| page.document().root())
}

impl LegacyEventApi for LegacyInterceptor {
    fn on(&self, page: &Page, selection: &Selection, args: Vec<Arg>) -> Result<(), ArgError> {
        let args = match BindArgs::parse(&args) {
            Ok(parsed) => self.wrap_args(page, context_of(page, selection), args, parsed),
            Err(e) => {
                debug!("unrecognized bind arguments, passing through: {}", e);
                args
            }
        };
        self.inner.on(page, selection, args)
    }

    fn off(&self, page: &Page, selection: &Selection, args: Vec<Arg>) -> Result<(), ArgError> {
        self.logger.log_event(
            page,
            EventAction::Remove,
            EventSource::Legacy,
            &unbind_label(&args),
            EventSubject::on(context_of(page, selection)),
        );
        self.inner.off(page, selection, args)
    }

    fn trigger(
        &self,
        page: &Page,
        selection: &Selection,
        event_type: &str,
        extra: &[Value],
    ) -> Result<(), HandlerError> {
        self.inner.trigger(page, selection, event_type, extra)
    }
}
