use async_trait::async_trait;
use futures::stream::BoxStream;
use gateway_client::{GatewayApi, GatewayError, SaleResponse, TxnStatusResponse};
use tpc_common::MinorUnits;

use crate::types::Uti;

/// The slice of the gateway the payment flow needs. [`GatewayApi`] is the production implementation; tests
/// substitute a scripted terminal.
#[async_trait]
pub trait TerminalGateway {
    async fn sale(&self, amount: MinorUnits, reference: &str) -> Result<SaleResponse, GatewayError>;
    async fn cancel(&self, uti: &Uti) -> Result<(), GatewayError>;
    async fn poll_status(&self, uti: &Uti) -> Result<TxnStatusResponse, GatewayError>;
    /// One subscription to the live event stream for `uti`. Yields raw lines; resubscription is the caller's call.
    async fn open_event_stream(&self, uti: &Uti)
        -> Result<BoxStream<'static, Result<String, GatewayError>>, GatewayError>;
    fn terminal_id(&self) -> String;
}

#[async_trait]
impl TerminalGateway for GatewayApi {
    async fn sale(&self, amount: MinorUnits, reference: &str) -> Result<SaleResponse, GatewayError> {
        GatewayApi::sale(self, amount.value(), reference).await
    }

    async fn cancel(&self, uti: &Uti) -> Result<(), GatewayError> {
        GatewayApi::cancel(self, uti.as_str()).await
    }

    async fn poll_status(&self, uti: &Uti) -> Result<TxnStatusResponse, GatewayError> {
        GatewayApi::poll_status(self, uti.as_str()).await
    }

    async fn open_event_stream(
        &self,
        uti: &Uti,
    ) -> Result<BoxStream<'static, Result<String, GatewayError>>, GatewayError> {
        GatewayApi::open_event_stream(self, uti.as_str()).await
    }

    fn terminal_id(&self) -> String {
        self.config().terminal_id.clone()
    }
}
