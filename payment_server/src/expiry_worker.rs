use chrono::Duration;
use log::*;
use payment_engine::{
    traits::{PaymentBackend, TerminalGateway},
    types::Uti,
    PaymentFlowApi,
};
use tokio::task::JoinHandle;

/// Starts the expiry worker. Do not await the returned JoinHandle, as it will run indefinitely.
pub fn start_expiry_worker<G, B>(
    api: PaymentFlowApi<G, B>,
    txn_timeout: Duration,
    retention: Duration,
) -> JoinHandle<()>
where
    G: TerminalGateway + Send + Sync + 'static,
    B: PaymentBackend + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(std::time::Duration::from_secs(30));
        info!("🕰️ Transaction expiry worker started");
        loop {
            timer.tick().await;
            trace!("🕰️ Running the transaction expiry sweep");
            let result = api.expire_transactions(txn_timeout, retention).await;
            if !result.expired.is_empty() {
                info!("🕰️ {} transactions expired: {}", result.expired.len(), uti_list(&result.expired));
            }
            if result.evicted > 0 {
                debug!("🕰️ {} finished transactions evicted from the registry", result.evicted);
            }
        }
    })
}

fn uti_list(utis: &[Uti]) -> String {
    utis.iter().map(ToString::to_string).collect::<Vec<String>>().join(", ")
}
