use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::helpers::truthy;

/// Body of `POST /api/sse/txn/sale`. Field names are the gateway's wire contract; do not rename them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleRequest {
    pub termid: String,
    /// Amount in the smallest currency unit (e.g. 1050 for £10.50).
    pub amttxn: i64,
    #[serde(rename = "ref")]
    pub reference: String,
}

/// The `201` response to a sale request. Anything beyond the UTI is kept verbatim for logging and troubleshooting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleResponse {
    pub uti: String,
    #[serde(flatten)]
    pub extra: Value,
}

/// Snapshot returned by `GET /api/txn/{uti}`. Absence of both flags means the transaction is still in progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxnStatusResponse {
    #[serde(default, rename = "transApproved", deserialize_with = "truthy")]
    pub trans_approved: bool,
    #[serde(default, rename = "transCancelled", deserialize_with = "truthy")]
    pub trans_cancelled: bool,
    #[serde(flatten)]
    pub data: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnStatus {
    Approved,
    Cancelled,
    InProgress,
}

impl TxnStatusResponse {
    pub fn status(&self) -> TxnStatus {
        if self.trans_approved {
            TxnStatus::Approved
        } else if self.trans_cancelled {
            TxnStatus::Cancelled
        } else {
            TxnStatus::InProgress
        }
    }
}
