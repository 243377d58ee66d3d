use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use gateway_client::GatewayError;
use payment_engine::PaymentFlowError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Unauthorized. {0}")]
    AuthorizationError(String),
    #[error("Invalid request. {0}")]
    ValidationError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("The transaction is in a state that does not allow this. {0}")]
    PaymentConflict(String),
    #[error("The payment gateway could not be reached. {0}")]
    GatewayUnreachable(String),
    #[error("The payment gateway did not respond in time. {0}")]
    GatewayTimeout(String),
    #[error("The payment gateway rejected the request. {0}")]
    GatewayRejected(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::AuthorizationError(_) => StatusCode::UNAUTHORIZED,
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::PaymentConflict(_) => StatusCode::CONFLICT,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::GatewayUnreachable(_) => StatusCode::BAD_GATEWAY,
            Self::GatewayRejected(_) => StatusCode::BAD_GATEWAY,
            Self::GatewayTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<PaymentFlowError> for ServerError {
    fn from(e: PaymentFlowError) -> Self {
        match e {
            PaymentFlowError::Unauthorized(msg) => Self::AuthorizationError(msg),
            PaymentFlowError::Validation(msg) => Self::ValidationError(msg),
            PaymentFlowError::Gateway(g) => g.into(),
            PaymentFlowError::TransactionNotFound(uti) => Self::NoRecordFound(format!("Transaction {uti}")),
            PaymentFlowError::NotApproved { .. } | PaymentFlowError::CancelAfterApproval(_) => {
                Self::PaymentConflict(e.to_string())
            },
            PaymentFlowError::Finalization(f) => Self::BackendError(f.to_string()),
            PaymentFlowError::Backend(msg) => Self::BackendError(msg),
        }
    }
}

impl From<GatewayError> for ServerError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::Timeout(msg) => Self::GatewayTimeout(msg),
            GatewayError::Unreachable(msg) => Self::GatewayUnreachable(msg),
            GatewayError::Initialization(msg) => Self::InitializeError(msg),
            other => Self::GatewayRejected(other.to_string()),
        }
    }
}
