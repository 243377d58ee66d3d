//! Terminal Payment Engine
//!
//! The core logic for coordinating card payments against a PDQ terminal gateway. It is transport-agnostic: the HTTP
//! surface lives in the `payment_server` crate, and order storage is an external collaborator reached through traits.
//!
//! The engine is divided into three main sections:
//! 1. The transaction registry ([`registry`]). An in-memory map from UTI to transaction lifecycle state. All state
//!    transitions are linearized through its per-key compare-and-set; concurrent writers (the event stream and the
//!    status poller) race through it and exactly one wins.
//! 2. The collaborator traits ([`traits`]). Order storage and payment finalization belong to the host system (a till,
//!    an ERP, a kiosk backend); implement [`traits::OrderStore`] and [`traits::FinalizationSink`] to plug one in. The
//!    [`memory::MemoryBackend`] is an in-process reference implementation.
//! 3. The lifecycle coordinator ([`PaymentFlowApi`]). Drives a transaction from initiation through
//!    approval/decline/cancel/expiry and triggers finalization exactly once per approved transaction.

pub mod errors;
pub mod memory;
pub mod registry;
pub mod traits;
pub mod types;

mod flow_api;

pub use errors::PaymentFlowError;
pub use flow_api::PaymentFlowApi;
pub use registry::{RegistryError, TransactionRegistry};
