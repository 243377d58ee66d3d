use gateway_client::{TxnStatus, TxnStatusResponse};
use payment_engine::types::{CancelOutcome, CompletionData};
use serde::{Deserialize, Serialize};

use crate::errors::ServerError;

/// Body of `POST /api/payment/initiate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitiateRequest {
    pub order_id: i64,
    pub access_token: String,
    /// Optional override for the reference shown on the terminal. Defaults to the order's own POS reference.
    #[serde(default)]
    pub pos_reference: Option<String>,
}

/// Body of `POST /api/payment/cancel`. The `uti` may be omitted: a till runs one transaction at a time, so a bare
/// cancel targets the sole pending transaction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CancelRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uti: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelResult {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<CancelOutcome> for CancelResult {
    fn from(outcome: CancelOutcome) -> Self {
        match outcome.accepted {
            true => Self { status: "cancelled".to_string(), message: None },
            false => Self { status: "error".to_string(), message: outcome.message },
        }
    }
}

/// Response to `GET /api/payment/status/{uti}`: a coarse status plus the gateway's snapshot verbatim.
#[derive(Debug, Clone, Serialize)]
pub struct StatusResult {
    pub status: String,
    #[serde(flatten)]
    pub snapshot: TxnStatusResponse,
}

impl From<TxnStatusResponse> for StatusResult {
    fn from(snapshot: TxnStatusResponse) -> Self {
        let status = match snapshot.status() {
            TxnStatus::Approved => "approved",
            TxnStatus::Cancelled => "cancelled",
            TxnStatus::InProgress => "in_progress",
        };
        Self { status: status.to_string(), snapshot }
    }
}

/// Body of `POST /api/payment/complete`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteRequest {
    pub order_id: i64,
    pub access_token: String,
    pub transaction_data: CompletionPayload,
}

/// Card metadata echoed back by the client after it observed the approval on the event stream. The required fields
/// are `Option` here so that validation can name the missing field instead of returning serde's generic message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionPayload {
    pub uti: Option<String>,
    pub bank_id_no: Option<String>,
    pub card_no_4digit: Option<String>,
    pub auth_code: Option<String>,
    #[serde(default)]
    pub cardholder_receipt: Option<String>,
}

impl CompletionPayload {
    pub fn validated(self) -> Result<CompletionData, ServerError> {
        Ok(CompletionData {
            uti: require(self.uti, "uti")?,
            bank_id_no: require(self.bank_id_no, "bank_id_no")?,
            card_no_4digit: require(self.card_no_4digit, "card_no_4digit")?,
            auth_code: require(self.auth_code, "auth_code")?,
            cardholder_receipt: self.cardholder_receipt,
        })
    }
}

fn require(field: Option<String>, name: &str) -> Result<String, ServerError> {
    field
        .filter(|f| !f.trim().is_empty())
        .ok_or_else(|| ServerError::ValidationError(format!("Missing required field: {name}")))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteResponse {
    pub status: String,
    pub order_id: i64,
    pub pos_reference: String,
    pub amount_total: f64,
}
