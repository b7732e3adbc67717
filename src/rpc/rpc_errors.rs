use solana_client::client_error::{ClientError, ClientErrorKind};
use thiserror::Error;

/// Failures reported by a ledger collaborator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Network or connection failure; the request may not have reached the node
    #[error("transport error: {0}")]
    Transport(String),

    /// The node throttled the request
    #[error("rate limit exceeded: {0}")]
    RateLimited(String),

    /// The node answered with an error (preflight failure, invalid request)
    #[error("rpc rejected request: {0}")]
    Rejected(String),
}

impl LedgerError {
    /// Whether the same request may succeed if repeated later
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::RateLimited(_))
    }

    /// Classify a `solana-client` error
    pub fn from_client_error(err: ClientError) -> Self {
        let message = err.to_string();
        let lowered = message.to_lowercase();

        if lowered.contains("rate limit")
            || lowered.contains("too many requests")
            || lowered.contains("429")
        {
            return Self::RateLimited(message);
        }

        match err.kind() {
            ClientErrorKind::Io(_) | ClientErrorKind::Reqwest(_) => {
                Self::Transport(message)
            }
            _ => Self::Rejected(message),
        }
    }
}

impl From<ClientError> for LedgerError {
    fn from(err: ClientError) -> Self {
        Self::from_client_error(err)
    }
}
