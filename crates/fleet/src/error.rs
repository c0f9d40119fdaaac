use fleetbroker_core::error::CoreError;

/// Errors from the provider HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum FleetError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider answered with a non-2xx status.
    #[error("Fleet API error ({status}): {error}: {description}")]
    Api {
        status: u16,
        /// OAuth2 `error` code, or `http_error` when the body was not JSON.
        error: String,
        /// `error_description`, or the raw body.
        description: String,
    },

    /// A 2xx body that does not hold the expected payload.
    #[error("Unexpected response body: {0}")]
    Decode(String),

    #[error("Invalid URL: {0}")]
    Url(String),
}

impl From<FleetError> for CoreError {
    fn from(err: FleetError) -> Self {
        CoreError::UpstreamUnavailable(err.to_string())
    }
}
