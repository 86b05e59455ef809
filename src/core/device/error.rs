use thiserror::Error;

/// Failure modes of a single device status fetch.
///
/// All variants are recoverable from the poller's point of view: the device is
/// skipped for the current cycle and tried again on the next one.
#[derive(Error, Debug)]
pub enum DeviceError {
    /// The request did not complete within the configured per-call timeout.
    #[error("Request to {url} timed out after {timeout_ms} ms")]
    Timeout { url: String, timeout_ms: u128 },

    /// The device answered with a non-2xx HTTP status.
    #[error("Unexpected status code {code} from {url}")]
    UnexpectedStatus { url: String, code: u16 },

    /// The response body was not a valid `Switch.GetStatus` payload.
    #[error("Failed to decode response from {url}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// Connection refused, DNS failure, reset while reading the body, etc.
    #[error("Failed to fetch data from {url}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The HTTP client itself could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    ClientSetup(#[source] reqwest::Error),
}

impl DeviceError {
    /// Short, stable classification used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            DeviceError::Timeout { .. } => "timeout",
            DeviceError::UnexpectedStatus { .. } => "unexpected_status",
            DeviceError::Decode { .. } => "decode",
            DeviceError::Transport { .. } => "transport",
            DeviceError::ClientSetup(_) => "client_setup",
        }
    }
}
