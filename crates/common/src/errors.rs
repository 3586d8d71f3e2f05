use crate::types::Bookmaker;
use thiserror::Error;

/// Error taxonomy shared by the normalizer, the adapters and the registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventError {
    /// A participant name is empty or has nothing left after normalization.
    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),

    /// A record could not be turned into an event (bad timestamp, missing field).
    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    /// Transport, timeout or non-2xx failure while talking to a feed.
    #[error("Fetch error from {bookmaker}: {reason}")]
    Fetch { bookmaker: Bookmaker, reason: String },

    /// The feed answered, but the body does not have the expected structure.
    #[error("Parse error from {bookmaker}: {reason}")]
    Parse { bookmaker: Bookmaker, reason: String },
}

impl EventError {
    pub fn fetch(bookmaker: Bookmaker, reason: impl Into<String>) -> Self {
        EventError::Fetch {
            bookmaker,
            reason: reason.into(),
        }
    }

    pub fn parse(bookmaker: Bookmaker, reason: impl Into<String>) -> Self {
        EventError::Parse {
            bookmaker,
            reason: reason.into(),
        }
    }

    /// Cycle-level failures: the current cycle is skipped and the next tick retries.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, EventError::Fetch { .. } | EventError::Parse { .. })
    }

    /// Record-level failures: only the offending record is dropped.
    pub fn is_record_level(&self) -> bool {
        matches!(
            self,
            EventError::InvalidIdentity(_) | EventError::MalformedEvent(_)
        )
    }
}
