use async_trait::async_trait;
use thiserror::Error;
use tpc_common::Secret;

#[derive(Debug, Clone, Error)]
pub enum OrderStoreError {
    /// The order does not exist, or the access token does not match. The two cases are deliberately
    /// indistinguishable to callers.
    #[error("Invalid order or access token")]
    AccessDenied,
    #[error("The order store failed. {0}")]
    Backend(String),
}

/// An order as the host system describes it. Amounts are kept in major units here because that is how order systems
/// store them; the engine converts to minor units at the gateway boundary.
#[derive(Debug, Clone)]
pub struct PaymentOrder {
    pub id: i64,
    /// Human-facing reference for the order, e.g. a kiosk order number. Sent to the gateway as the sale reference.
    pub pos_reference: String,
    pub amount_total: f64,
    /// ISO 4217 code, e.g. "GBP".
    pub currency: String,
    /// How many minor-unit digits the currency carries. 2 for GBP and EUR, 0 for JPY.
    pub decimal_places: u32,
    /// Bearer token that authorizes payment operations against this order.
    pub access_token: Secret<String>,
}

/// Read-side access to the host's orders.
#[async_trait]
pub trait OrderStore {
    /// Fetch the order to be paid, authorizing with the caller-supplied access token. An unknown order id and a bad
    /// token both fail with [`OrderStoreError::AccessDenied`].
    async fn order_for_payment(&self, order_id: i64, access_token: &str) -> Result<PaymentOrder, OrderStoreError>;
}
