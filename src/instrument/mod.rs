//! Interception and logging engine. A [`DebugContext`] carries what the modules
//! share; [`install`] decorates a page's extension points with them.

pub mod console;
pub mod identity;
pub mod legacy;
pub mod logger;
pub mod native;
pub mod payment;
pub mod theme;
pub mod watcher;

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::{DebugConfig, Module, ModulePlan};
use crate::error::InstallError;
use crate::page::dom::NodeId;
use crate::page::observer::MutationRecord;
use crate::page::Page;
use console::{Console, RecordingConsole};
use legacy::LegacyInterceptor;
use logger::Logger;
use native::NativeInterceptor;
use payment::PaymentMock;
use theme::Theme;
use watcher::DomWatcher;

/// Where the watcher stopped: the qualifying record and the nodes it matched.
pub struct Pause<'a> {
    pub page: &'a Page,
    pub record: &'a MutationRecord,
    pub matched: &'a [(String, NodeId)],
}

/// Invoked at each qualifying mutation when pausing is on. Defaults to a no-op.
pub type Breakpoint = Rc<dyn Fn(&Pause<'_>)>;

/// One-shot initialization guards, one per module.
#[derive(Debug, Default)]
pub struct InitFlags {
    claimed: RefCell<BTreeSet<Module>>,
}

impl InitFlags {
    /// True the first time `module` is claimed, false ever after.
    pub fn claim(&self, module: Module) -> bool {
        self.claimed.borrow_mut().insert(module)
    }

    pub fn is_set(&self, module: Module) -> bool {
        self.claimed.borrow().contains(&module)
    }
}

#[derive(Default)]
struct Installed {
    native: Option<Rc<NativeInterceptor>>,
    legacy: Option<Rc<LegacyInterceptor>>,
    watcher: Option<Rc<DomWatcher>>,
    payment: Option<Rc<PaymentMock>>,
}

/// Shared state for one page: configuration, theme, logging surface,
/// init flags and the breakpoint hook.
pub struct DebugContext {
    config: Rc<DebugConfig>,
    theme: Theme,
    logger: Rc<Logger>,
    flags: InitFlags,
    breakpoint: Breakpoint,
    installed: RefCell<Installed>,
}

impl DebugContext {
    pub fn new(config: DebugConfig, theme: Theme, console: Rc<dyn Console>) -> Self {
        let logger = Rc::new(Logger::new(config.ignore_events.clone(), console));
        Self {
            config: Rc::new(config),
            theme,
            logger,
            flags: InitFlags::default(),
            breakpoint: Rc::new(|_: &Pause<'_>| {}),
            installed: RefCell::new(Installed::default()),
        }
    }

    /// A context recording into memory, themed after `page`.
    pub fn recording(config: DebugConfig, page: &Page) -> (Rc<Self>, Rc<RecordingConsole>) {
        let console = Rc::new(RecordingConsole::new());
        let ctx = Self::new(config, Theme::for_scheme(page.prefers_dark()), console.clone());
        (Rc::new(ctx), console)
    }

    pub fn with_breakpoint(mut self, breakpoint: impl Fn(&Pause<'_>) + 'static) -> Self {
        self.breakpoint = Rc::new(breakpoint);
        self
    }

    pub fn config(&self) -> &DebugConfig {
        &self.config
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    pub fn logger(&self) -> &Rc<Logger> {
        &self.logger
    }

    pub fn flags(&self) -> &InitFlags {
        &self.flags
    }

    pub fn breakpoint(&self) -> Breakpoint {
        self.breakpoint.clone()
    }

    pub fn native(&self) -> Option<Rc<NativeInterceptor>> {
        self.installed.borrow().native.clone()
    }

    pub fn legacy(&self) -> Option<Rc<LegacyInterceptor>> {
        self.installed.borrow().legacy.clone()
    }

    pub fn watcher(&self) -> Option<Rc<DomWatcher>> {
        self.installed.borrow().watcher.clone()
    }

    pub fn payment(&self) -> Option<Rc<PaymentMock>> {
        self.installed.borrow().payment.clone()
    }

    /// Installs one module. Returns `Ok(false)` when it was already installed.
    pub fn install_module(&self, page: &Page, module: Module) -> Result<bool, InstallError> {
        match module {
            Module::NativeEvents => {
                let Some(interceptor) = NativeInterceptor::install(self, page) else {
                    return Ok(false);
                };
                self.installed.borrow_mut().native = Some(interceptor);
            }
            Module::LegacyEvents => {
                let Some(interceptor) = LegacyInterceptor::install(self, page)? else {
                    return Ok(false);
                };
                self.installed.borrow_mut().legacy = Some(interceptor);
            }
            Module::DomWatcher => {
                let Some(watcher) = DomWatcher::install(self, page) else {
                    return Ok(false);
                };
                self.installed.borrow_mut().watcher = Some(watcher);
            }
            Module::PaymentMock => {
                let Some(mock) = PaymentMock::install(self, page) else {
                    return Ok(false);
                };
                self.installed.borrow_mut().payment = Some(mock);
            }
        }
        Ok(true)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallReport {
    pub installed: Vec<Module>,
    pub already_installed: Vec<Module>,
    pub skipped: Vec<Module>,
}

/// Installs the early batch, then the library-dependent batch if the page has
/// the legacy library loaded.
pub fn install(ctx: &DebugContext, page: &Page, plan: &ModulePlan) -> InstallReport {
    let mut report = InstallReport::default();
    for &module in plan.early.iter().chain(plan.after_library.iter()) {
        match ctx.install_module(page, module) {
            Ok(true) => report.installed.push(module),
            Ok(false) => report.already_installed.push(module),
            Err(e) => {
                warn!(?module, "Skipping module: {}", e);
                report.skipped.push(module);
            }
        }
    }
    info!(
        installed = report.installed.len(),
        skipped = report.skipped.len(),
        "Instrumentation installed"
    );
    report
}
