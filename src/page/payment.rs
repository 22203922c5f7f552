/// Payment-availability capability exposed to page scripts.
pub trait PaymentApi {
    fn supports_version(&self, version: u32) -> bool;
    fn can_make_payments(&self) -> bool;
    fn can_make_payments_with_active_card(&self, merchant_id: &str) -> bool;
}

/// What a browser without a payment sheet reports.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailablePayments;

impl PaymentApi for UnavailablePayments {
    fn supports_version(&self, _version: u32) -> bool {
        false
    }

    fn can_make_payments(&self) -> bool {
        false
    }

    fn can_make_payments_with_active_card(&self, _merchant_id: &str) -> bool {
        false
    }
}
