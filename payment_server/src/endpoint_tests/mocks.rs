use async_trait::async_trait;
use futures::stream::BoxStream;
use gateway_client::{GatewayError, SaleResponse, TxnStatusResponse};
use mockall::mock;
use payment_engine::{
    traits::{
        CommittedPayment,
        FinalizationError,
        FinalizationSink,
        FinalizeRequest,
        OrderStore,
        OrderStoreError,
        PaymentOrder,
        TerminalGateway,
    },
    types::Uti,
};
use tpc_common::MinorUnits;

mock! {
    pub Gateway {}

    #[async_trait]
    impl TerminalGateway for Gateway {
        async fn sale(&self, amount: MinorUnits, reference: &str) -> Result<SaleResponse, GatewayError>;
        async fn cancel(&self, uti: &Uti) -> Result<(), GatewayError>;
        async fn poll_status(&self, uti: &Uti) -> Result<TxnStatusResponse, GatewayError>;
        async fn open_event_stream(&self, uti: &Uti) -> Result<BoxStream<'static, Result<String, GatewayError>>, GatewayError>;
        fn terminal_id(&self) -> String;
    }
}

mock! {
    pub Backend {}

    #[async_trait]
    impl OrderStore for Backend {
        async fn order_for_payment(&self, order_id: i64, access_token: &str) -> Result<PaymentOrder, OrderStoreError>;
    }

    #[async_trait]
    impl FinalizationSink for Backend {
        async fn finalize(&self, request: FinalizeRequest) -> Result<CommittedPayment, FinalizationError>;
    }
}

/// A stock sale response carrying the gateway-assigned UTI `abc-123`.
pub fn sale_response() -> SaleResponse {
    serde_json::from_value(serde_json::json!({"uti": "abc-123", "status_code": "201"})).unwrap()
}
