//! The collaborator interfaces of the payment engine.
//!
//! Order storage and payment finalization belong to the host system; the engine only ever talks to them through
//! [`OrderStore`] and [`FinalizationSink`]. The terminal gateway is likewise reached through [`TerminalGateway`] so
//! that tests can substitute a scripted terminal.

mod finalization;
mod gateway;
mod orders;

pub use finalization::{CommittedPayment, FinalizationError, FinalizationSink, FinalizeRequest};
pub use gateway::TerminalGateway;
pub use orders::{OrderStore, OrderStoreError, PaymentOrder};

/// Everything the lifecycle coordinator needs from the host system, rolled into one bound. Implemented automatically
/// for any type that provides both halves.
pub trait PaymentBackend: OrderStore + FinalizationSink {}

impl<T> PaymentBackend for T where T: OrderStore + FinalizationSink {}
