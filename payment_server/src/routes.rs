//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! Every payment handler is generic over the terminal gateway and the order backend, so the endpoint tests can run
//! against mocks without a terminal on the network.

use actix_web::{get, http::header, web, HttpResponse, Responder};
use log::*;
use payment_engine::{
    traits::{PaymentBackend, TerminalGateway},
    types::Uti,
    PaymentFlowApi,
};

use crate::{
    data_objects::{CancelRequest, CancelResult, CompleteRequest, CompleteResponse, InitiateRequest, StatusResult},
    errors::ServerError,
    stream_proxy,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + Send + Sync + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Initiate  ----------------------------------------------------
route!(initiate_payment => Post "/payment/initiate" impl TerminalGateway, PaymentBackend);
/// Route handler for the payment initiation endpoint.
///
/// Authorizes the order with its access token, starts the sale on the terminal and returns everything the client
/// needs to subscribe to the event stream and later complete the payment. The returned `uti` identifies the
/// transaction on every other endpoint.
pub async fn initiate_payment<TG, TB>(
    body: web::Json<InitiateRequest>,
    api: web::Data<PaymentFlowApi<TG, TB>>,
) -> Result<HttpResponse, ServerError>
where
    TG: TerminalGateway + Send + Sync,
    TB: PaymentBackend + Send + Sync,
{
    let req = body.into_inner();
    debug!("💻️ POST payment initiation for order {}", req.order_id);
    let initiated = api.initiate(req.order_id, &req.access_token, req.pos_reference).await?;
    Ok(HttpResponse::Ok().json(initiated))
}

//----------------------------------------------   Events  ----------------------------------------------------
route!(payment_events => Get "/payment/events/{uti}" impl TerminalGateway, PaymentBackend);
/// Route handler for the live event stream.
///
/// Relays the gateway's stream to the client as server-sent events, verbatim, while feeding each line through the
/// lifecycle coordinator so the server-side state tracks what the client sees. The stream ends when the gateway
/// closes it, the transaction is cancelled, or the gateway's stream deadline passes.
pub async fn payment_events<TG, TB>(
    path: web::Path<String>,
    api: web::Data<PaymentFlowApi<TG, TB>>,
) -> Result<HttpResponse, ServerError>
where
    TG: TerminalGateway + Send + Sync + 'static,
    TB: PaymentBackend + Send + Sync + 'static,
{
    let uti = Uti::from(path.into_inner());
    debug!("💻️ GET event stream for {uti}");
    let cancel =
        api.registry().cancel_signal(&uti).ok_or_else(|| ServerError::NoRecordFound(format!("Transaction {uti}")))?;
    let source = api.open_event_stream(&uti).await?;
    let relay = stream_proxy::relay(api.clone(), uti, source, cancel);
    Ok(HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        // Tells nginx-style reverse proxies not to buffer the stream
        .insert_header(("X-Accel-Buffering", "no"))
        .streaming(relay))
}

//----------------------------------------------   Cancel  ----------------------------------------------------
route!(cancel_payment => Post "/payment/cancel" impl TerminalGateway, PaymentBackend);
/// Route handler for the cancellation endpoint.
///
/// The `uti` may be omitted when exactly one transaction is pending; the cancel then targets it. The local
/// transaction is cancelled either way; the `status` field of the response reports whether the gateway acknowledged.
/// An already-approved transaction cannot be cancelled and yields a 409.
pub async fn cancel_payment<TG, TB>(
    body: web::Json<CancelRequest>,
    api: web::Data<PaymentFlowApi<TG, TB>>,
) -> Result<HttpResponse, ServerError>
where
    TG: TerminalGateway + Send + Sync,
    TB: PaymentBackend + Send + Sync,
{
    let uti = match body.into_inner().uti {
        Some(uti) => Uti::from(uti),
        None => match api.registry().pending().as_slice() {
            [only] => only.clone(),
            [] => return Err(ServerError::NoRecordFound("There is no pending transaction to cancel".to_string())),
            _ => {
                return Err(ServerError::ValidationError(
                    "More than one transaction is pending. Supply the uti to cancel".to_string(),
                ))
            },
        },
    };
    debug!("💻️ POST cancel for {uti}");
    let outcome = api.cancel(&uti).await?;
    Ok(HttpResponse::Ok().json(CancelResult::from(outcome)))
}

//----------------------------------------------   Status  ----------------------------------------------------
route!(payment_status => Get "/payment/status/{uti}" impl TerminalGateway, PaymentBackend);
/// Route handler for the status endpoint.
///
/// Always asks the gateway, never the local registry: this is the reconciliation path for clients that missed the
/// event stream, and the gateway is the source of truth.
pub async fn payment_status<TG, TB>(
    path: web::Path<String>,
    api: web::Data<PaymentFlowApi<TG, TB>>,
) -> Result<HttpResponse, ServerError>
where
    TG: TerminalGateway + Send + Sync,
    TB: PaymentBackend + Send + Sync,
{
    let uti = Uti::from(path.into_inner());
    debug!("💻️ GET status for {uti}");
    let snapshot = api.status(&uti).await?;
    Ok(HttpResponse::Ok().json(StatusResult::from(snapshot)))
}

//----------------------------------------------   Complete  ----------------------------------------------------
route!(complete_payment => Post "/payment/complete" impl TerminalGateway, PaymentBackend);
/// Route handler for the completion endpoint.
///
/// The client saw the approval on the event stream and posts the card metadata back so the payment can be committed
/// against the order. Idempotent: a retry after a dropped response returns the original result with a 200.
pub async fn complete_payment<TG, TB>(
    body: web::Json<CompleteRequest>,
    api: web::Data<PaymentFlowApi<TG, TB>>,
) -> Result<HttpResponse, ServerError>
where
    TG: TerminalGateway + Send + Sync,
    TB: PaymentBackend + Send + Sync,
{
    let req = body.into_inner();
    debug!("💻️ POST completion for order {}", req.order_id);
    let data = req.transaction_data.validated()?;
    let committed = api.complete(req.order_id, &req.access_token, data).await?;
    let response = CompleteResponse {
        status: "success".to_string(),
        order_id: committed.order_id,
        pos_reference: committed.pos_reference,
        amount_total: committed.amount_total,
    };
    Ok(HttpResponse::Ok().json(response))
}
