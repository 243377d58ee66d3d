use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Error establishing the gateway client. {0}")]
    Initialization(String),
    #[error("Cannot connect to the terminal gateway. {0}")]
    Unreachable(String),
    #[error("The terminal gateway did not respond in time. {0}")]
    Timeout(String),
    #[error("The terminal gateway rejected the request ({status}). {message}")]
    Rejected { status: u16, message: String },
    #[error("Could not interpret the gateway response. {0}")]
    ResponseFormat(String),
    #[error("The gateway accepted the sale but did not return a UTI")]
    MissingUti,
    #[error("The gateway event stream failed. {0}")]
    Stream(String),
}
