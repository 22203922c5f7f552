use std::rc::Rc;

use tracing::debug;

use super::DebugContext;
use crate::config::Module;
use crate::page::payment::PaymentApi;
use crate::page::Page;

/// Sandbox stand-in for the payment sheet: payments are always available, and
/// an active card is reported unless the wallet is configured empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct PaymentMock {
    empty_wallet: bool,
}

impl PaymentMock {
    pub fn new(empty_wallet: bool) -> Self {
        Self { empty_wallet }
    }

    pub fn install(ctx: &DebugContext, page: &Page) -> Option<Rc<Self>> {
        if !ctx.flags().claim(Module::PaymentMock) {
            return None;
        }
        let mock = Rc::new(Self::new(ctx.config().empty_apple_wallet));
        page.set_payments(mock.clone());
        debug!(empty_wallet = mock.empty_wallet, "payment session mocked");
        Some(mock)
    }
}

impl PaymentApi for PaymentMock {
    fn supports_version(&self, version: u32) -> bool {
        debug!(version, "supportsVersion");
        true
    }

    fn can_make_payments(&self) -> bool {
        debug!("canMakePayments");
        true
    }

    fn can_make_payments_with_active_card(&self, merchant_id: &str) -> bool {
        debug!(merchant_id, active = !self.empty_wallet, "canMakePaymentsWithActiveCard");
        !self.empty_wallet
    }
}
