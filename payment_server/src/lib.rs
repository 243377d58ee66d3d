//! # Terminal payment coordinator server
//!
//! The HTTP surface in front of the payment engine. It is responsible for:
//! * Accepting payment initiation, cancellation, completion and status requests from POS clients.
//! * Relaying the terminal gateway's live event stream to the client as server-sent events.
//! * Running the background expiry sweep that cleans up abandoned transactions.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/api/payment/initiate`: Start a card payment for an order.
//! * `/api/payment/events/{uti}`: Live event stream for a transaction.
//! * `/api/payment/cancel`: Cancel a pending transaction.
//! * `/api/payment/status/{uti}`: Authoritative status snapshot from the gateway.
//! * `/api/payment/complete`: Commit an approved payment against its order.

pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod expiry_worker;
pub mod routes;
pub mod server;
pub mod stream_proxy;

#[cfg(test)]
mod endpoint_tests;
