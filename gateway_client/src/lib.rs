//! Typed HTTP client for the PDQ terminal gateway.
//!
//! The gateway is a small local service that drives the physical card terminal. It exposes four endpoints that this
//! crate wraps with typed calls and deadlines:
//! * `POST /api/sse/txn/sale` - start a card sale, returning the gateway-assigned UTI.
//! * `GET /api/events/{uti}` - a long-lived, line-oriented event stream for a transaction.
//! * `GET /api/txn/{uti}` - a pollable status snapshot, used when the event stream is unavailable.
//! * `POST /api/txn/cancel` - best-effort cancellation of the in-flight transaction.
//!
//! Gateways are typically deployed on the shop LAN with self-signed certificates, so the TLS trust policy is an
//! explicit configuration choice ([`TrustPolicy`]) rather than a hardcoded bypass.

mod api;
mod config;
mod data_objects;
mod error;
mod events;
mod helpers;

pub use api::GatewayApi;
pub use config::{GatewayConfig, TrustPolicy};
pub use data_objects::{SaleRequest, SaleResponse, TxnStatus, TxnStatusResponse};
pub use error::GatewayError;
pub use events::{ApprovalData, TerminalEvent};
