//! The SSE relay between the gateway and the client.
//!
//! The gateway's event lines pass through verbatim, re-framed as server-sent events (`{line}\n\n`). Each line is also
//! fed through the lifecycle coordinator before it is forwarded, so the server's view of a transaction is never
//! behind what the client has seen. The relay ends when the gateway closes the stream, the stream errors, or the
//! transaction's cancel signal fires.

use actix_web::web;
use bytes::Bytes;
use futures::{
    stream::{self, BoxStream},
    Stream,
    StreamExt,
};
use gateway_client::GatewayError;
use log::*;
use payment_engine::{
    traits::{PaymentBackend, TerminalGateway},
    types::Uti,
    PaymentFlowApi,
};
use tokio::sync::watch;

use crate::errors::ServerError;

struct RelayState<TG, TB> {
    api: web::Data<PaymentFlowApi<TG, TB>>,
    uti: Uti,
    source: BoxStream<'static, Result<String, GatewayError>>,
    cancel: watch::Receiver<bool>,
    done: bool,
}

pub fn relay<TG, TB>(
    api: web::Data<PaymentFlowApi<TG, TB>>,
    uti: Uti,
    source: BoxStream<'static, Result<String, GatewayError>>,
    cancel: watch::Receiver<bool>,
) -> impl Stream<Item = Result<Bytes, ServerError>>
where
    TG: TerminalGateway + Send + Sync + 'static,
    TB: PaymentBackend + Send + Sync + 'static,
{
    let state = RelayState { api, uti, source, cancel, done: false };
    stream::unfold(state, |mut st| async move {
        if st.done {
            return None;
        }
        loop {
            // The cancel signal takes priority over a ready line, so a cancel never races a final forward.
            let cancelled = tokio::select! {
                biased;
                changed = st.cancel.changed() => changed.is_err() || *st.cancel.borrow(),
                next = st.source.next() => {
                    match next {
                        Some(Ok(line)) => {
                            st.api.apply_relayed_line(&st.uti, &line).await;
                            return Some((Ok(Bytes::from(format!("{line}\n\n"))), st));
                        },
                        Some(Err(e)) => {
                            warn!("🔄️ The event stream for {} failed. {e}", st.uti);
                            st.done = true;
                            let frame = format!("event: error\ndata: {}\n\n", serde_json::json!({"error": e.to_string()}));
                            return Some((Ok(Bytes::from(frame)), st));
                        },
                        None => {
                            debug!("🔄️ The gateway closed the event stream for {}", st.uti);
                            return None;
                        },
                    }
                },
            };
            if cancelled {
                debug!("🔄️ Closing the event stream for {} after cancellation", st.uti);
                st.done = true;
                return Some((Ok(Bytes::from_static(b": cancelled\n\n")), st));
            }
        }
    })
}
