//! An in-process reference backend.
//!
//! Keeps orders and committed payments in a `HashMap` behind a lock. Useful for demos, kiosk bring-up against a real
//! terminal, and tests; a production deployment implements [`OrderStore`] and [`FinalizationSink`] against its own
//! order system instead.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use async_trait::async_trait;

use crate::traits::{
    CommittedPayment,
    FinalizationError,
    FinalizationSink,
    FinalizeRequest,
    OrderStore,
    OrderStoreError,
    PaymentOrder,
};

#[derive(Default)]
struct Inner {
    orders: HashMap<i64, PaymentOrder>,
    /// Committed payments, keyed by UTI. The key is what makes finalization idempotent.
    payments: HashMap<String, CommittedPayment>,
}

#[derive(Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_order(&self, order: PaymentOrder) {
        self.inner.write().expect("backend lock poisoned").orders.insert(order.id, order);
    }

    pub fn payment_count(&self) -> usize {
        self.inner.read().expect("backend lock poisoned").payments.len()
    }

    pub fn is_paid(&self, order_id: i64) -> bool {
        self.inner.read().expect("backend lock poisoned").payments.values().any(|p| p.order_id == order_id)
    }
}

#[async_trait]
impl OrderStore for MemoryBackend {
    async fn order_for_payment(&self, order_id: i64, access_token: &str) -> Result<PaymentOrder, OrderStoreError> {
        let inner = self.inner.read().expect("backend lock poisoned");
        match inner.orders.get(&order_id) {
            Some(order) if order.access_token.reveal() == access_token => Ok(order.clone()),
            _ => Err(OrderStoreError::AccessDenied),
        }
    }
}

#[async_trait]
impl FinalizationSink for MemoryBackend {
    async fn finalize(&self, request: FinalizeRequest) -> Result<CommittedPayment, FinalizationError> {
        let mut inner = self.inner.write().expect("backend lock poisoned");
        if let Some(existing) = inner.payments.get(&request.uti) {
            let mut repeat = existing.clone();
            repeat.first_commit = false;
            return Ok(repeat);
        }
        let order = inner.orders.get(&request.order_id).ok_or(FinalizationError::OrderNotFound(request.order_id))?;
        let committed = CommittedPayment {
            order_id: order.id,
            pos_reference: order.pos_reference.clone(),
            amount_total: request.amount.to_major(order.decimal_places),
            first_commit: true,
        };
        inner.payments.insert(request.uti, committed.clone());
        Ok(committed)
    }
}

#[cfg(test)]
mod test {
    use tpc_common::{MinorUnits, Secret};

    use super::MemoryBackend;
    use crate::traits::{FinalizationSink, FinalizeRequest, OrderStore, OrderStoreError, PaymentOrder};

    fn backend() -> MemoryBackend {
        let backend = MemoryBackend::new();
        backend.add_order(PaymentOrder {
            id: 42,
            pos_reference: "K-42".to_string(),
            amount_total: 10.50,
            currency: "GBP".to_string(),
            decimal_places: 2,
            access_token: Secret::new("tok".to_string()),
        });
        backend
    }

    #[tokio::test]
    async fn token_mismatch_and_unknown_order_are_indistinguishable() {
        let backend = backend();
        assert!(backend.order_for_payment(42, "tok").await.is_ok());
        assert!(matches!(backend.order_for_payment(42, "nope").await, Err(OrderStoreError::AccessDenied)));
        assert!(matches!(backend.order_for_payment(7, "tok").await, Err(OrderStoreError::AccessDenied)));
    }

    #[tokio::test]
    async fn finalize_is_idempotent_on_uti() {
        let backend = backend();
        let request = FinalizeRequest {
            uti: "abc-123".to_string(),
            order_id: 42,
            order_reference: "K-42".to_string(),
            amount: MinorUnits::from(1050),
            card_bin: Some("412345".to_string()),
            card_last4: Some("1111".to_string()),
            auth_code: Some("AUTH01".to_string()),
            receipt_text: None,
        };
        let first = backend.finalize(request.clone()).await.unwrap();
        assert!(first.first_commit);
        assert_eq!(first.amount_total, 10.50);
        let second = backend.finalize(request).await.unwrap();
        assert!(!second.first_commit);
        assert_eq!(backend.payment_count(), 1);
        assert!(backend.is_paid(42));
    }
}
