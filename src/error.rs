use thiserror::Error;

/// Failure reaching or decoding a gateway endpoint.
///
/// `Network`, `Http` and `Decode` are transport-level: the endpoint was
/// unreachable or returned something unusable. `Rejected` means the endpoint
/// was reached and answered with its own failure envelope; the server's
/// message is carried verbatim.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{endpoint}: request failed: {source}")]
    Network {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint}: HTTP {status}")]
    Http { endpoint: String, status: u16 },

    #[error("{endpoint}: malformed response: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{endpoint}: {message}")]
    Rejected { endpoint: String, message: String },
}

impl GatewayError {
    /// True for failures that never reached the application layer.
    pub fn is_transport(&self) -> bool {
        !matches!(self, GatewayError::Rejected { .. })
    }
}
