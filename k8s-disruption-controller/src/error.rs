use super::*;

/// Failures that abort a reconciliation.
///
/// All of them are transient: the dispatch layer retries with backoff.
///
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read machine")]
    Store(#[source] StoreError),
    #[error("failed to persist machine conditions")]
    Persist(#[source] StoreError),
    #[error("reconciliation cancelled")]
    Cancelled,
}

impl Error {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store(_) | Self::Persist(_) | Self::Cancelled => true,
        }
    }

    /// Lost a write race against another writer of the same Machine
    ///
    pub fn is_conflict(&self) -> bool {
        match self {
            Self::Store(err) | Self::Persist(err) => err.is_conflict(),
            Self::Cancelled => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persist_conflict() {
        let err = Error::Persist(StoreError::Conflict("machine-1".to_string()));

        assert!(err.is_retryable());
        assert!(err.is_conflict());
    }

    #[test]
    fn cancelled_is_retryable() {
        assert!(Error::Cancelled.is_retryable());
        assert!(!Error::Cancelled.is_conflict());
    }
}
