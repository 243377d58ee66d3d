use gateway_client::GatewayError;
use thiserror::Error;

use crate::{
    registry::RegistryError,
    traits::{FinalizationError, OrderStoreError},
    types::{TxnState, Uti},
};

#[derive(Debug, Error)]
pub enum PaymentFlowError {
    #[error("Unauthorized. {0}")]
    Unauthorized(String),
    #[error("Invalid request. {0}")]
    Validation(String),
    #[error("Gateway error. {0}")]
    Gateway(#[from] GatewayError),
    #[error("No transaction with UTI {0} is known")]
    TransactionNotFound(Uti),
    #[error("Transaction {uti} is not approved (state: {state})")]
    NotApproved { uti: Uti, state: TxnState },
    #[error("Transaction {0} has already been approved and cannot be cancelled")]
    CancelAfterApproval(Uti),
    #[error("Payment finalization failed. {0}")]
    Finalization(#[from] FinalizationError),
    #[error("Backend error. {0}")]
    Backend(String),
}

impl From<OrderStoreError> for PaymentFlowError {
    fn from(e: OrderStoreError) -> Self {
        match e {
            OrderStoreError::AccessDenied => PaymentFlowError::Unauthorized("Invalid order or access token".into()),
            OrderStoreError::Backend(msg) => PaymentFlowError::Backend(msg),
        }
    }
}

impl From<RegistryError> for PaymentFlowError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::NotFound(uti) => PaymentFlowError::TransactionNotFound(uti),
            other => PaymentFlowError::Backend(other.to_string()),
        }
    }
}
