//! In-memory transaction registry.
//!
//! The registry is the sole shared mutable resource in the engine and the linearization point for all state
//! transitions: writers name the state they believe the transaction is in, and a mismatch fails with
//! [`RegistryError::StaleTransition`] instead of silently overwriting. Nothing here survives a process restart; a
//! reconnecting client must re-poll the gateway rather than assume registry state exists.

use std::{
    collections::HashMap,
    sync::RwLock,
};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::watch;

use crate::types::{Transaction, TxnState, Uti};

#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    #[error("Transaction {0} is not in the registry")]
    NotFound(Uti),
    #[error("Transaction {0} is already registered")]
    Duplicate(Uti),
    #[error("Stale transition for {uti}: expected {expected}, but the state is now {actual}")]
    StaleTransition { uti: Uti, expected: TxnState, actual: TxnState },
}

struct Entry {
    txn: Transaction,
    cancel_tx: watch::Sender<bool>,
}

/// Keyed store of live transactions. All methods take `&self`; the lock is internal and critical sections are short
/// (no I/O ever happens under the lock).
#[derive(Default)]
pub struct TransactionRegistry {
    inner: RwLock<HashMap<Uti, Entry>>,
}

impl TransactionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, txn: Transaction) -> Result<(), RegistryError> {
        let mut map = self.inner.write().expect("registry lock poisoned");
        if map.contains_key(&txn.uti) {
            return Err(RegistryError::Duplicate(txn.uti));
        }
        let (cancel_tx, _) = watch::channel(false);
        map.insert(txn.uti.clone(), Entry { txn, cancel_tx });
        Ok(())
    }

    pub fn get(&self, uti: &Uti) -> Option<Transaction> {
        self.inner.read().expect("registry lock poisoned").get(uti).map(|e| e.txn.clone())
    }

    /// Compare-and-set state transition. Fails with [`RegistryError::StaleTransition`] if the current state no longer
    /// matches `expected`; the caller resolves the race by re-reading, never by overwriting.
    pub fn update_state(&self, uti: &Uti, expected: &TxnState, next: TxnState) -> Result<Transaction, RegistryError> {
        self.update_state_with(uti, expected, next, |_| {})
    }

    /// As [`Self::update_state`], additionally applying `apply` to the record under the same critical section, so
    /// data that belongs to the new state (card details on approval) lands atomically with the transition.
    pub fn update_state_with<F>(
        &self,
        uti: &Uti,
        expected: &TxnState,
        next: TxnState,
        apply: F,
    ) -> Result<Transaction, RegistryError>
    where
        F: FnOnce(&mut Transaction),
    {
        let mut map = self.inner.write().expect("registry lock poisoned");
        let entry = map.get_mut(uti).ok_or_else(|| RegistryError::NotFound(uti.clone()))?;
        if &entry.txn.state != expected {
            return Err(RegistryError::StaleTransition {
                uti: uti.clone(),
                expected: expected.clone(),
                actual: entry.txn.state.clone(),
            });
        }
        entry.txn.state = next;
        entry.txn.last_event_at = Utc::now();
        apply(&mut entry.txn);
        Ok(entry.txn.clone())
    }

    /// Record a sign of life (heartbeat event, in-progress poll) without changing state.
    pub fn touch(&self, uti: &Uti) -> bool {
        let mut map = self.inner.write().expect("registry lock poisoned");
        match map.get_mut(uti) {
            Some(entry) => {
                entry.txn.last_event_at = Utc::now();
                true
            },
            None => false,
        }
    }

    pub fn evict(&self, uti: &Uti) -> Option<Transaction> {
        self.inner.write().expect("registry lock poisoned").remove(uti).map(|e| e.txn)
    }

    /// A receiver that flips to `true` when the transaction is cancelled. The stream relay selects on this between
    /// line reads so a caller-initiated cancel interrupts it promptly.
    pub fn cancel_signal(&self, uti: &Uti) -> Option<watch::Receiver<bool>> {
        self.inner.read().expect("registry lock poisoned").get(uti).map(|e| e.cancel_tx.subscribe())
    }

    pub fn trigger_cancel(&self, uti: &Uti) -> bool {
        match self.inner.read().expect("registry lock poisoned").get(uti) {
            Some(entry) => {
                entry.cancel_tx.send_replace(true);
                true
            },
            None => false,
        }
    }

    /// UTIs of all transactions still pending.
    pub fn pending(&self) -> Vec<Uti> {
        self.inner
            .read()
            .expect("registry lock poisoned")
            .values()
            .filter(|e| e.txn.state == TxnState::Pending)
            .map(|e| e.txn.uti.clone())
            .collect()
    }

    /// Pending transactions with no signal since `cutoff`. Candidates for expiry.
    pub fn pending_older_than(&self, cutoff: DateTime<Utc>) -> Vec<Uti> {
        self.inner
            .read()
            .expect("registry lock poisoned")
            .values()
            .filter(|e| e.txn.state == TxnState::Pending && e.txn.last_event_at < cutoff)
            .map(|e| e.txn.uti.clone())
            .collect()
    }

    /// Terminal-state transactions untouched since `cutoff`. Candidates for eviction, to bound memory.
    pub fn terminal_older_than(&self, cutoff: DateTime<Utc>) -> Vec<Uti> {
        self.inner
            .read()
            .expect("registry lock poisoned")
            .values()
            .filter(|e| e.txn.state.is_terminal() && e.txn.last_event_at < cutoff)
            .map(|e| e.txn.uti.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod test {
    use chrono::{Duration, Utc};
    use tpc_common::{MinorUnits, Secret};

    use super::{RegistryError, TransactionRegistry};
    use crate::types::{DeclineReason, Transaction, TxnState, Uti};

    fn txn(uti: &str) -> Transaction {
        let now = Utc::now();
        Transaction {
            uti: Uti(uti.to_string()),
            order_id: 42,
            order_reference: "K-42".to_string(),
            access_token: Secret::new("tok".to_string()),
            amount: MinorUnits::from(1050),
            currency: "GBP".to_string(),
            terminal_id: "T1".to_string(),
            state: TxnState::Pending,
            card_bin: None,
            card_last4: None,
            auth_code: None,
            receipt_text: None,
            created_at: now,
            last_event_at: now,
        }
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let registry = TransactionRegistry::new();
        registry.insert(txn("abc-123")).unwrap();
        assert!(matches!(registry.insert(txn("abc-123")), Err(RegistryError::Duplicate(_))));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn compare_and_set_rejects_stale_writers() {
        let registry = TransactionRegistry::new();
        let uti = Uti("abc-123".to_string());
        registry.insert(txn("abc-123")).unwrap();

        // First writer wins the transition out of Pending
        let updated = registry
            .update_state(&uti, &TxnState::Pending, TxnState::Approved { finalized: false })
            .expect("first CAS should win");
        assert_eq!(updated.state, TxnState::Approved { finalized: false });

        // Second writer raced on the same prior state and must lose
        let err = registry
            .update_state(&uti, &TxnState::Pending, TxnState::Declined { reason: DeclineReason::Terminal })
            .expect_err("second CAS must observe a stale transition");
        match err {
            RegistryError::StaleTransition { expected, actual, .. } => {
                assert_eq!(expected, TxnState::Pending);
                assert_eq!(actual, TxnState::Approved { finalized: false });
            },
            other => panic!("Expected StaleTransition, got {other:?}"),
        }
        // and the winning transition is untouched
        assert_eq!(registry.get(&uti).unwrap().state, TxnState::Approved { finalized: false });
    }

    #[test]
    fn update_state_with_applies_data_atomically() {
        let registry = TransactionRegistry::new();
        let uti = Uti("abc-123".to_string());
        registry.insert(txn("abc-123")).unwrap();
        let updated = registry
            .update_state_with(&uti, &TxnState::Pending, TxnState::Approved { finalized: false }, |t| {
                t.card_bin = Some("412345".to_string());
                t.card_last4 = Some("1111".to_string());
            })
            .unwrap();
        assert_eq!(updated.card_bin.as_deref(), Some("412345"));
        assert_eq!(updated.card_last4.as_deref(), Some("1111"));
    }

    #[test]
    fn cancel_signal_fires_on_trigger() {
        let registry = TransactionRegistry::new();
        let uti = Uti("abc-123".to_string());
        registry.insert(txn("abc-123")).unwrap();
        let rx = registry.cancel_signal(&uti).expect("signal should exist");
        assert!(!*rx.borrow());
        assert!(registry.trigger_cancel(&uti));
        assert!(*rx.borrow());
        assert!(!registry.trigger_cancel(&Uti("missing".to_string())));
    }

    #[test]
    fn sweep_selection() {
        let registry = TransactionRegistry::new();
        let mut stale = txn("stale-pending");
        stale.last_event_at = Utc::now() - Duration::seconds(600);
        registry.insert(stale).unwrap();
        registry.insert(txn("fresh-pending")).unwrap();
        let mut done = txn("old-done");
        done.state = TxnState::Cancelled;
        done.last_event_at = Utc::now() - Duration::hours(2);
        registry.insert(done).unwrap();

        let cutoff = Utc::now() - Duration::seconds(180);
        let mut pending = registry.pending();
        pending.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(pending, vec![Uti("fresh-pending".to_string()), Uti("stale-pending".to_string())]);
        assert_eq!(registry.pending_older_than(cutoff), vec![Uti("stale-pending".to_string())]);
        assert_eq!(registry.terminal_older_than(cutoff), vec![Uti("old-done".to_string())]);

        registry.evict(&Uti("old-done".to_string()));
        assert_eq!(registry.len(), 2);
    }
}
