use std::{sync::Arc, time::Duration};

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use gateway_client::GatewayApi;
use log::*;
use payment_engine::{
    memory::MemoryBackend,
    registry::TransactionRegistry,
    traits::PaymentBackend,
    PaymentFlowApi,
};

use crate::{
    config::ServerConfig,
    errors::ServerError,
    expiry_worker::start_expiry_worker,
    routes::{
        health,
        CancelPaymentRoute,
        CompletePaymentRoute,
        InitiatePaymentRoute,
        PaymentEventsRoute,
        PaymentStatusRoute,
    },
};

/// Run the server with the in-memory reference backend. Production deployments that have their own order system
/// call [`create_server_instance`] with it instead.
pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    config.validate()?;
    let backend = MemoryBackend::new();
    let (srv, api) = create_server_instance(config.clone(), backend)?;
    start_expiry_worker(api, config.txn_timeout, config.retention);
    srv.await.map_err(ServerError::from)
}

pub fn create_server_instance<B>(
    config: ServerConfig,
    backend: B,
) -> Result<(Server, PaymentFlowApi<GatewayApi, B>), ServerError>
where
    B: PaymentBackend + Clone + Send + Sync + 'static,
{
    let gateway = GatewayApi::new(config.gateway.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let registry = Arc::new(TransactionRegistry::new());
    let api = PaymentFlowApi::new(gateway, backend, registry);
    if config.debug_mode {
        warn!("🚨️ Debug mode is enabled. Request logs will include card metadata.");
    }
    let flow_api = api.clone();
    let srv = HttpServer::new(move || {
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("tpc::access_log"))
            .app_data(web::Data::new(flow_api.clone()));
        let api_scope = web::scope("/api")
            .service(InitiatePaymentRoute::<GatewayApi, B>::new())
            .service(PaymentEventsRoute::<GatewayApi, B>::new())
            .service(CancelPaymentRoute::<GatewayApi, B>::new())
            .service(PaymentStatusRoute::<GatewayApi, B>::new())
            .service(CompletePaymentRoute::<GatewayApi, B>::new());
        app.service(health).service(api_scope)
    })
    // Long keep-alive so kiosks can hold their SSE connections open across transactions
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok((srv, api))
}
