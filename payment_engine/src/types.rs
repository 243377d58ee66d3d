use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tpc_common::{MinorUnits, Secret};

use crate::traits::PaymentOrder;

//--------------------------------------        Uti           --------------------------------------------------------
/// Universal Transaction Identifier. Assigned exactly once, by the gateway's response to a sale request; never
/// generated on this side.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Uti(pub String);

impl From<String> for Uti {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for Uti {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Uti {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------      TxnState        --------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclineReason {
    /// The terminal or gateway declined or abandoned the transaction.
    Terminal,
    /// The gateway's approval reported a different amount than was initiated. Security-relevant; never finalized.
    AmountMismatch,
}

/// Lifecycle state of a transaction. Transitions are monotonic: once a transaction leaves `Pending` it never
/// returns, and the four right-hand states are terminal.
///
/// `Approved { finalized: false }` is the "approved but unfinalized" sub-state: the terminal confirmed the charge but
/// the payment has not been committed to order storage yet (the sink failed, or the approval signal carried no card
/// data). The only legal transition out of it is to `Approved { finalized: true }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxnState {
    Pending,
    Approved { finalized: bool },
    Declined { reason: DeclineReason },
    Cancelled,
    Expired,
}

impl TxnState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TxnState::Pending)
    }
}

impl Display for TxnState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TxnState::Pending => write!(f, "Pending"),
            TxnState::Approved { finalized: true } => write!(f, "Approved"),
            TxnState::Approved { finalized: false } => write!(f, "Approved (unfinalized)"),
            TxnState::Declined { reason: DeclineReason::Terminal } => write!(f, "Declined"),
            TxnState::Declined { reason: DeclineReason::AmountMismatch } => write!(f, "Declined (amount mismatch)"),
            TxnState::Cancelled => write!(f, "Cancelled"),
            TxnState::Expired => write!(f, "Expired"),
        }
    }
}

//--------------------------------------     Transaction      --------------------------------------------------------
/// The unit of work between initiation and settlement. Lives in the registry from the moment the gateway returns a
/// UTI until a bounded retention window past its terminal state.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub uti: Uti,
    pub order_id: i64,
    /// The POS reference sent to the gateway as `ref`. Not unique across retries of the same order.
    pub order_reference: String,
    /// The order's access token, echoed back to the caller and required again on completion. Kept out of logs.
    pub access_token: Secret<String>,
    /// Immutable after initiation; the authoritative value compared against the gateway's approval.
    pub amount: MinorUnits,
    pub currency: String,
    pub terminal_id: String,
    pub state: TxnState,
    pub card_bin: Option<String>,
    pub card_last4: Option<String>,
    pub auth_code: Option<String>,
    pub receipt_text: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_event_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(uti: Uti, order: &PaymentOrder, amount: MinorUnits, reference: String, terminal_id: String) -> Self {
        let now = Utc::now();
        Self {
            uti,
            order_id: order.id,
            order_reference: reference,
            access_token: order.access_token.clone(),
            amount,
            currency: order.currency.clone(),
            terminal_id,
            state: TxnState::Pending,
            card_bin: None,
            card_last4: None,
            auth_code: None,
            receipt_text: None,
            created_at: now,
            last_event_at: now,
        }
    }
}

//--------------------------------------   Flow API results   --------------------------------------------------------
/// What the caller gets back from a successful initiation. Everything the kiosk needs to open the event stream and
/// later complete the payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentInitiated {
    pub uti: String,
    /// Major units, for display (e.g. 10.50).
    pub amount: f64,
    /// Minor units, the authoritative amount (e.g. 1050).
    pub amount_smallest_unit: i64,
    pub currency: String,
    pub order_id: i64,
    pub access_token: String,
    pub pos_reference: String,
}

/// Card data the caller supplies on completion. All fields were validated present at the transport boundary.
#[derive(Debug, Clone)]
pub struct CompletionData {
    pub uti: String,
    pub bank_id_no: String,
    pub card_no_4digit: String,
    pub auth_code: String,
    pub cardholder_receipt: Option<String>,
}

/// Outcome of a cancellation request. The local transaction is `Cancelled` either way; `accepted` reports whether the
/// gateway acknowledged the cancel (a soft failure is reported, not retried).
#[derive(Debug, Clone)]
pub struct CancelOutcome {
    pub accepted: bool,
    pub message: Option<String>,
}

impl CancelOutcome {
    pub fn accepted() -> Self {
        Self { accepted: true, message: None }
    }

    pub fn soft_failure<S: Into<String>>(message: S) -> Self {
        Self { accepted: false, message: Some(message.into()) }
    }
}

/// Summary of one expiry sweep.
#[derive(Debug, Clone, Default)]
pub struct ExpiryResult {
    /// Transactions moved from `Pending` to `Expired` in this sweep.
    pub expired: Vec<Uti>,
    /// Terminal-state transactions evicted after the retention window.
    pub evicted: usize,
}
