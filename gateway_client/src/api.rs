use std::{fs, sync::Arc, time::Duration};

use bytes::Bytes;
use futures::{
    stream::{self, BoxStream},
    Stream,
    StreamExt,
};
use log::*;
use reqwest::{header, Certificate, Client, Response};
use serde_json::Value;

use crate::{
    config::TrustPolicy,
    GatewayConfig,
    GatewayError,
    SaleRequest,
    SaleResponse,
    TxnStatusResponse,
};

/// Deadline for the sale call. The gateway answers as soon as the terminal accepts the transaction, well before the
/// cardholder interacts with it.
const SALE_TIMEOUT: Duration = Duration::from_secs(30);
/// Deadline for cancel and status calls.
const SHORT_TIMEOUT: Duration = Duration::from_secs(10);
/// Deadline for the event stream. This bounds how long a single subscription can stay open; it matches how long the
/// terminal will wait for a card before giving up.
const STREAM_TIMEOUT: Duration = Duration::from_secs(180);

/// Thin typed client for the terminal gateway.
///
/// Cheap to clone; the underlying connection pool is shared.
#[derive(Clone)]
pub struct GatewayApi {
    config: GatewayConfig,
    client: Arc<Client>,
}

impl GatewayApi {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        config.validate()?;
        let mut headers = header::HeaderMap::with_capacity(1);
        headers.insert(header::CONTENT_TYPE, header::HeaderValue::from_static("application/json"));
        let mut builder = Client::builder().default_headers(headers);
        match &config.trust {
            TrustPolicy::SystemRoots => {},
            TrustPolicy::AcceptInvalidCerts => {
                warn!("🚨️ Gateway TLS certificate validation is disabled by configuration.");
                builder = builder.danger_accept_invalid_certs(true);
            },
            TrustPolicy::PinnedCa(path) => {
                let pem = fs::read(path).map_err(|e| {
                    GatewayError::Initialization(format!("Could not read the pinned CA certificate at {path}: {e}"))
                })?;
                let cert = Certificate::from_pem(&pem).map_err(|e| {
                    GatewayError::Initialization(format!("The pinned CA certificate at {path} is not valid PEM: {e}"))
                })?;
                builder = builder.add_root_certificate(cert);
            },
        }
        let client = builder.build().map_err(|e| GatewayError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    /// Start a card sale on the terminal. Returns the gateway-assigned UTI on a `201` response.
    pub async fn sale(&self, amount_minor_units: i64, reference: &str) -> Result<SaleResponse, GatewayError> {
        let url = self.url("/api/sse/txn/sale");
        let body = SaleRequest {
            termid: self.config.terminal_id.clone(),
            amttxn: amount_minor_units,
            reference: reference.to_string(),
        };
        if self.config.debug_mode {
            info!("🖥️ Sale request: ref {reference}, amount {amount_minor_units}, URL {url}");
        }
        let response = self
            .client
            .post(&url)
            .timeout(SALE_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(|e| request_error("sale", e))?;
        if response.status().as_u16() != 201 {
            return Err(rejection(response).await);
        }
        let sale = response
            .json::<SaleResponse>()
            .await
            .map_err(|_| GatewayError::MissingUti)
            .and_then(|s| if s.uti.is_empty() { Err(GatewayError::MissingUti) } else { Ok(s) })?;
        debug!("🖥️ Sale accepted by the gateway. UTI: {}", sale.uti);
        Ok(sale)
    }

    /// Ask the gateway to abandon the transaction. Best effort; a non-200 response is reported, never retried.
    pub async fn cancel(&self, uti: &str) -> Result<(), GatewayError> {
        let url = self.url("/api/txn/cancel");
        if self.config.debug_mode {
            info!("🖥️ Cancel request for {uti}: {url}");
        }
        let response = self
            .client
            .post(&url)
            .timeout(SHORT_TIMEOUT)
            .json(&serde_json::json!({ "uti": uti }))
            .send()
            .await
            .map_err(|e| request_error("cancel", e))?;
        if response.status().is_success() {
            debug!("🖥️ Gateway accepted cancellation of {uti}");
            Ok(())
        } else {
            Err(rejection(response).await)
        }
    }

    /// Fetch the current status snapshot for a transaction. Safe to call repeatedly.
    pub async fn poll_status(&self, uti: &str) -> Result<TxnStatusResponse, GatewayError> {
        let url = self.url(&format!("/api/txn/{uti}"));
        if self.config.debug_mode {
            info!("🖥️ Status poll for {uti}: {url}");
        }
        let response =
            self.client.get(&url).timeout(SHORT_TIMEOUT).send().await.map_err(|e| request_error("status", e))?;
        if !response.status().is_success() {
            return Err(rejection(response).await);
        }
        response.json::<TxnStatusResponse>().await.map_err(|e| GatewayError::ResponseFormat(e.to_string()))
    }

    /// Open the live event stream for a transaction.
    ///
    /// Yields one item per non-empty line the gateway sends, until the gateway closes the connection, the stream
    /// deadline passes, or an error occurs. At most one connection attempt is made; resubscription is the caller's
    /// decision.
    pub async fn open_event_stream(&self, uti: &str) -> Result<BoxStream<'static, Result<String, GatewayError>>, GatewayError> {
        let url = self.url(&format!("/api/events/{uti}"));
        if self.config.debug_mode {
            info!("🖥️ Opening event stream for {uti}: {url}");
        }
        let response =
            self.client.get(&url).timeout(STREAM_TIMEOUT).send().await.map_err(|e| request_error("events", e))?;
        if !response.status().is_success() {
            return Err(rejection(response).await);
        }
        Ok(lines(response.bytes_stream()).boxed())
    }
}

fn request_error(op: &str, e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout(format!("The {op} call to the gateway timed out"))
    } else if e.is_connect() {
        GatewayError::Unreachable(format!("The {op} call could not reach the gateway. {e}"))
    } else {
        GatewayError::Unreachable(format!("The {op} call to the gateway failed. {e}"))
    }
}

/// Build a [`GatewayError::Rejected`] from a non-success response, preferring the gateway's JSON `{"error"}` message
/// and falling back to the raw body.
async fn rejection(response: Response) -> GatewayError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v["error"].as_str().map(String::from))
        .unwrap_or_else(|| if body.is_empty() { format!("HTTP {status}") } else { body });
    GatewayError::Rejected { status, message }
}

/// Split a byte stream into complete, non-empty lines. Carries a partial trailing line across chunks and flushes it
/// when the stream ends.
fn lines<S>(source: S) -> impl Stream<Item = Result<String, GatewayError>>
where S: Stream<Item = reqwest::Result<Bytes>> + Unpin {
    struct State<S> {
        source: S,
        buffer: Vec<u8>,
        done: bool,
    }
    stream::unfold(State { source, buffer: Vec::new(), done: false }, |mut st| async move {
        loop {
            if let Some(pos) = st.buffer.iter().position(|b| *b == b'\n') {
                let mut line: Vec<u8> = st.buffer.drain(..=pos).collect();
                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                if line.is_empty() {
                    continue;
                }
                return Some((Ok(String::from_utf8_lossy(&line).into_owned()), st));
            }
            if st.done {
                if st.buffer.is_empty() {
                    return None;
                }
                let line = String::from_utf8_lossy(&st.buffer).trim().to_string();
                st.buffer.clear();
                if line.is_empty() {
                    return None;
                }
                return Some((Ok(line), st));
            }
            match st.source.next().await {
                Some(Ok(chunk)) => st.buffer.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    st.done = true;
                    st.buffer.clear();
                    let err = if e.is_timeout() {
                        GatewayError::Timeout("The gateway event stream timed out".into())
                    } else {
                        GatewayError::Stream(e.to_string())
                    };
                    return Some((Err(err), st));
                },
                None => st.done = true,
            }
        }
    })
}
