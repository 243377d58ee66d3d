use std::sync::Arc;

use chrono::{Duration, Utc};
use futures::stream::BoxStream;
use gateway_client::{ApprovalData, GatewayError, TerminalEvent, TxnStatusResponse};
use log::*;
use tpc_common::MinorUnits;

use crate::{
    errors::PaymentFlowError,
    registry::{RegistryError, TransactionRegistry},
    traits::{FinalizeRequest, CommittedPayment, PaymentBackend, TerminalGateway},
    types::{
        CancelOutcome,
        CompletionData,
        DeclineReason,
        ExpiryResult,
        PaymentInitiated,
        Transaction,
        TxnState,
        Uti,
    },
};

/// The lifecycle coordinator. Drives a card transaction from initiation through approval, decline, cancellation or
/// expiry, and commits approved payments into the host system exactly once per UTI.
///
/// All state transitions funnel through the [`TransactionRegistry`]'s compare-and-set, so the event stream, the
/// status poller, the cancel endpoint and the expiry sweep can all race without corrupting a transaction. Whichever
/// signal lands first wins; the losers observe a stale transition and stand down.
#[derive(Clone)]
pub struct PaymentFlowApi<G, B> {
    gateway: G,
    backend: B,
    registry: Arc<TransactionRegistry>,
}

impl<G, B> PaymentFlowApi<G, B>
where
    G: TerminalGateway + Send + Sync,
    B: PaymentBackend + Send + Sync,
{
    pub fn new(gateway: G, backend: B, registry: Arc<TransactionRegistry>) -> Self {
        Self { gateway, backend, registry }
    }

    pub fn registry(&self) -> &Arc<TransactionRegistry> {
        &self.registry
    }

    pub fn transaction(&self, uti: &Uti) -> Option<Transaction> {
        self.registry.get(uti)
    }

    /// One subscription to the gateway's live event stream for `uti`. The caller owns the relay loop; each line it
    /// reads should be fed back through [`Self::apply_relayed_line`].
    pub async fn open_event_stream(
        &self,
        uti: &Uti,
    ) -> Result<BoxStream<'static, Result<String, GatewayError>>, PaymentFlowError> {
        Ok(self.gateway.open_event_stream(uti).await?)
    }

    /// Start a card payment for an order.
    ///
    /// Authorizes against the order store, converts the order total to minor units, submits the sale to the gateway
    /// and registers the resulting transaction as `Pending`. `reference` overrides the POS reference sent to the
    /// terminal; most callers leave it `None` and get the order's own reference.
    pub async fn initiate(
        &self,
        order_id: i64,
        access_token: &str,
        reference: Option<String>,
    ) -> Result<PaymentInitiated, PaymentFlowError> {
        let order = self.backend.order_for_payment(order_id, access_token).await?;
        let amount = MinorUnits::from_major(order.amount_total, order.decimal_places);
        if amount.value() <= 0 {
            return Err(PaymentFlowError::Validation(format!(
                "The total for order {order_id} is {}, so there is nothing to pay",
                order.amount_total
            )));
        }
        let reference = reference
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| if order.pos_reference.is_empty() { format!("K-{order_id}") } else { order.pos_reference.clone() });
        let sale = self.gateway.sale(amount, &reference).await?;
        let uti = Uti::from(sale.uti.clone());
        let txn = Transaction::new(uti.clone(), &order, amount, reference.clone(), self.gateway.terminal_id());
        self.registry.insert(txn)?;
        info!("💳️ Payment initiated for order {order_id}. {amount} {}, reference {reference}, UTI {uti}", order.currency);
        Ok(PaymentInitiated {
            uti: uti.0,
            amount: amount.to_major(order.decimal_places),
            amount_smallest_unit: amount.value(),
            currency: order.currency.clone(),
            order_id,
            access_token: order.access_token.reveal().clone(),
            pos_reference: reference,
        })
    }

    /// Apply one gateway signal to a transaction. Never fails: a signal for a departed or already-terminal
    /// transaction is logged and dropped, because the gateway remains the source of truth for anything we missed.
    pub async fn apply_event(&self, uti: &Uti, event: TerminalEvent) {
        match event {
            TerminalEvent::Approved(data) => self.apply_approval(uti, data).await,
            TerminalEvent::Declined => {
                self.apply_terminal_state(uti, TxnState::Declined { reason: DeclineReason::Terminal });
            },
            TerminalEvent::Cancelled => {
                self.apply_terminal_state(uti, TxnState::Cancelled);
            },
            TerminalEvent::Connected | TerminalEvent::InProgress | TerminalEvent::Reset => {
                self.registry.touch(uti);
            },
            TerminalEvent::Unknown(line) => {
                trace!("🔄️ Unrecognised gateway signal for {uti} kept as a heartbeat: {line}");
                self.registry.touch(uti);
            },
        }
    }

    /// Parse and apply one raw line relayed from the gateway's event stream.
    pub async fn apply_relayed_line(&self, uti: &Uti, line: &str) {
        trace!("🔄️ Gateway event for {uti}: {line}");
        self.apply_event(uti, TerminalEvent::parse(line)).await;
    }

    /// Fetch the gateway's status snapshot for a transaction and reconcile the local record with it. This is how a
    /// client that missed the stream (or reconnected after a crash) catches up.
    pub async fn status(&self, uti: &Uti) -> Result<TxnStatusResponse, PaymentFlowError> {
        let snapshot = self.gateway.poll_status(uti).await?;
        self.apply_event(uti, TerminalEvent::from_status(&snapshot)).await;
        Ok(snapshot)
    }

    /// Cancel a transaction.
    ///
    /// Fails with [`PaymentFlowError::CancelAfterApproval`] if the transaction has already been approved, including
    /// when an approval lands while the cancel is in flight. Otherwise the local transaction becomes `Cancelled`
    /// unconditionally; if the gateway does not acknowledge, that is reported as a soft failure, never retried.
    pub async fn cancel(&self, uti: &Uti) -> Result<CancelOutcome, PaymentFlowError> {
        if let Some(txn) = self.registry.get(uti) {
            if matches!(txn.state, TxnState::Approved { .. }) {
                return Err(PaymentFlowError::CancelAfterApproval(uti.clone()));
            }
        }
        // Interrupt any open event stream relay first, then tell the gateway.
        self.registry.trigger_cancel(uti);
        let gateway_result = self.gateway.cancel(uti).await;
        match self.registry.update_state(uti, &TxnState::Pending, TxnState::Cancelled) {
            Ok(_) => info!("❌️ Transaction {uti} cancelled"),
            Err(RegistryError::StaleTransition { actual: TxnState::Approved { .. }, .. }) => {
                warn!("❌️ Cancellation of {uti} raced against an approval and lost");
                return Err(PaymentFlowError::CancelAfterApproval(uti.clone()));
            },
            Err(e) => debug!("❌️ Local cancel of {uti} was a no-op. {e}"),
        }
        match gateway_result {
            Ok(()) => Ok(CancelOutcome::accepted()),
            Err(e) => {
                warn!("❌️ The gateway did not acknowledge the cancellation of {uti}. {e}");
                Ok(CancelOutcome::soft_failure(e.to_string()))
            },
        }
    }

    /// Caller-driven completion: the client observed the approval on the relayed stream and posts the card details
    /// back so the payment can be committed against the order.
    ///
    /// Safe to repeat. The finalization sink is idempotent on UTI, so a retry after a dropped response returns the
    /// originally committed payment with `first_commit` false.
    pub async fn complete(
        &self,
        order_id: i64,
        access_token: &str,
        data: CompletionData,
    ) -> Result<CommittedPayment, PaymentFlowError> {
        let order = self.backend.order_for_payment(order_id, access_token).await?;
        let uti = Uti::from(data.uti.clone());
        let (amount, order_reference) = match self.registry.get(&uti) {
            Some(txn) => {
                if txn.order_id != order_id {
                    return Err(PaymentFlowError::Validation(format!(
                        "Transaction {uti} does not belong to order {order_id}"
                    )));
                }
                match txn.state {
                    TxnState::Pending => {
                        // The client saw the approval before our registry did. Accept it, but respect any transition
                        // that lands first.
                        let result = self.registry.update_state_with(
                            &uti,
                            &TxnState::Pending,
                            TxnState::Approved { finalized: false },
                            |t| {
                                t.card_bin = Some(data.bank_id_no.clone());
                                t.card_last4 = Some(data.card_no_4digit.clone());
                                t.auth_code = Some(data.auth_code.clone());
                                t.receipt_text = data.cardholder_receipt.clone();
                            },
                        );
                        if let Err(RegistryError::StaleTransition { actual, .. }) = result {
                            if !matches!(actual, TxnState::Approved { .. }) {
                                return Err(PaymentFlowError::NotApproved { uti, state: actual });
                            }
                        }
                    },
                    TxnState::Approved { .. } => {},
                    other => return Err(PaymentFlowError::NotApproved { uti, state: other }),
                }
                (txn.amount, txn.order_reference)
            },
            // The registry does not survive a restart; fall back to the order itself.
            None => (MinorUnits::from_major(order.amount_total, order.decimal_places), order.pos_reference.clone()),
        };
        let request = FinalizeRequest {
            uti: data.uti.clone(),
            order_id,
            order_reference,
            amount,
            card_bin: Some(data.bank_id_no),
            card_last4: Some(data.card_no_4digit),
            auth_code: Some(data.auth_code),
            receipt_text: data.cardholder_receipt,
        };
        let committed = self.backend.finalize(request).await?;
        let _ = self.registry.update_state(
            &uti,
            &TxnState::Approved { finalized: false },
            TxnState::Approved { finalized: true },
        );
        if committed.first_commit {
            info!("💰️ Payment of {amount} committed against order {order_id} (UTI {uti})");
        } else {
            debug!("💰️ Completion of {uti} repeated; returning the original committed payment");
        }
        Ok(committed)
    }

    /// Expire pending transactions with no gateway activity for `timeout`, and evict terminal-state transactions
    /// older than `retention` so the registry stays bounded. Run periodically by the host.
    pub async fn expire_transactions(&self, timeout: Duration, retention: Duration) -> ExpiryResult {
        let now = Utc::now();
        let mut result = ExpiryResult::default();
        for uti in self.registry.pending_older_than(now - timeout) {
            match self.registry.update_state(&uti, &TxnState::Pending, TxnState::Expired) {
                Ok(_) => {
                    self.registry.trigger_cancel(&uti);
                    if let Err(e) = self.gateway.cancel(&uti).await {
                        debug!("🕰️ The gateway did not acknowledge the cancel of expired transaction {uti}. {e}");
                    }
                    info!("🕰️ Transaction {uti} expired after {}s without terminal activity", timeout.num_seconds());
                    result.expired.push(uti);
                },
                // The state moved on between the sweep and the transition. Leave it be.
                Err(_) => {},
            }
        }
        for uti in self.registry.terminal_older_than(now - retention) {
            if self.registry.evict(&uti).is_some() {
                result.evicted += 1;
            }
        }
        if !result.expired.is_empty() || result.evicted > 0 {
            debug!("🕰️ Expiry sweep complete. {} expired, {} evicted", result.expired.len(), result.evicted);
        }
        result
    }

    async fn apply_approval(&self, uti: &Uti, data: ApprovalData) {
        let Some(txn) = self.registry.get(uti) else {
            warn!("✅️ Approval signal for unknown transaction {uti} dropped");
            return;
        };
        match txn.state {
            TxnState::Pending => {
                if let Some(approved_amount) = data.amttxn {
                    if approved_amount != txn.amount.value() {
                        error!(
                            "🚨️ Amount mismatch on {uti}: initiated {} but the gateway approved {approved_amount}. \
                             Declining the transaction; it will never be finalized.",
                            txn.amount
                        );
                        self.apply_terminal_state(uti, TxnState::Declined {
                            reason: DeclineReason::AmountMismatch,
                        });
                        return;
                    }
                }
                let result = self.registry.update_state_with(
                    uti,
                    &TxnState::Pending,
                    TxnState::Approved { finalized: false },
                    |t| {
                        t.card_bin = data.bank_id_no.clone();
                        t.card_last4 = data.card_no_4digit.clone();
                        t.auth_code = data.auth_code.clone();
                        t.receipt_text = data.cardholder_receipt.clone();
                    },
                );
                match result {
                    Ok(_) => {
                        info!("✅️ Transaction {uti} approved by the terminal");
                        self.try_finalize(uti).await;
                    },
                    Err(RegistryError::StaleTransition { actual, .. }) => {
                        debug!("✅️ Approval signal for {uti} lost the race; state is already {actual}");
                    },
                    Err(e) => warn!("✅️ Could not record the approval of {uti}. {e}"),
                }
            },
            TxnState::Approved { finalized: false } => {
                // A repeat signal (stream and poll racing). Harmless; retry finalization in case the first attempt
                // lacked card data or failed.
                self.try_finalize(uti).await;
            },
            TxnState::Approved { finalized: true } => {
                trace!("✅️ Repeat approval signal for already-finalized {uti} ignored");
            },
            other => {
                warn!("✅️ Approval signal for {uti} arrived after it reached {other}. Ignored; the gateway snapshot remains authoritative.");
            },
        }
    }

    /// Commit an approved transaction if its card details are complete. A transaction approved without card data
    /// stays `Approved {{ finalized: false }}` until the client supplies the details via completion.
    async fn try_finalize(&self, uti: &Uti) {
        let Some(txn) = self.registry.get(uti) else {
            return;
        };
        if txn.state != (TxnState::Approved { finalized: false }) {
            return;
        }
        if txn.card_bin.is_none() || txn.card_last4.is_none() || txn.auth_code.is_none() {
            info!("💰️ Approval of {uti} carried no card details. Finalization deferred until the client completes.");
            return;
        }
        let request = FinalizeRequest {
            uti: txn.uti.0.clone(),
            order_id: txn.order_id,
            order_reference: txn.order_reference.clone(),
            amount: txn.amount,
            card_bin: txn.card_bin.clone(),
            card_last4: txn.card_last4.clone(),
            auth_code: txn.auth_code.clone(),
            receipt_text: txn.receipt_text.clone(),
        };
        match self.backend.finalize(request).await {
            Ok(committed) => {
                let _ = self.registry.update_state(
                    uti,
                    &TxnState::Approved { finalized: false },
                    TxnState::Approved { finalized: true },
                );
                if committed.first_commit {
                    info!("💰️ Payment of {} committed against order {} (UTI {uti})", txn.amount, txn.order_id);
                } else {
                    debug!("💰️ Payment for {uti} was already committed");
                }
            },
            Err(e) => {
                error!("💰️ Finalization of {uti} failed; the transaction stays approved and unfinalized. {e}");
            },
        }
    }

    fn apply_terminal_state(&self, uti: &Uti, next: TxnState) {
        match self.registry.update_state(uti, &TxnState::Pending, next.clone()) {
            Ok(_) => info!("💳️ Transaction {uti} is now {next}"),
            Err(RegistryError::NotFound(_)) => warn!("💳️ Signal {next} for unknown transaction {uti} dropped"),
            Err(RegistryError::StaleTransition { actual, .. }) => {
                debug!("💳️ Signal {next} for {uti} ignored; state is already {actual}");
            },
            Err(e) => warn!("💳️ Could not record {next} for {uti}. {e}"),
        }
    }
}
