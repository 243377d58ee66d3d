use async_trait::async_trait;
use thiserror::Error;
use tpc_common::MinorUnits;

#[derive(Debug, Clone, Error)]
pub enum FinalizationError {
    #[error("Order {0} was not found at finalization time")]
    OrderNotFound(i64),
    #[error("The finalization backend failed. {0}")]
    Backend(String),
}

/// The record handed to the host when an approved payment is committed.
#[derive(Debug, Clone)]
pub struct FinalizeRequest {
    /// The gateway transaction identifier. Idempotency key: finalizing the same UTI twice must commit at most one
    /// payment.
    pub uti: String,
    pub order_id: i64,
    pub order_reference: String,
    pub amount: MinorUnits,
    pub card_bin: Option<String>,
    pub card_last4: Option<String>,
    pub auth_code: Option<String>,
    pub receipt_text: Option<String>,
}

/// What the host reports back after committing (or re-observing) a payment.
#[derive(Debug, Clone)]
pub struct CommittedPayment {
    pub order_id: i64,
    pub pos_reference: String,
    pub amount_total: f64,
    /// `false` when this UTI had already been committed; the prior record is returned unchanged.
    pub first_commit: bool,
}

/// Write-side commitment of approved payments into the host system.
#[async_trait]
pub trait FinalizationSink {
    /// Commit an approved payment against its order. Must be idempotent on `request.uti`: a repeat call returns the
    /// original committed record with `first_commit` false.
    async fn finalize(&self, request: FinalizeRequest) -> Result<CommittedPayment, FinalizationError>;
}
