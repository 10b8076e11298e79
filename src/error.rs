// 🚨 Error taxonomy for the refresh pipeline and the query surface
//
// Every failure is local to the operation that detects it. Nothing in the
// library retries; callers re-run the whole refresh.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// Either upstream fetch failed, timed out or returned a non-2xx status
    #[error("external data source unavailable: {source_name}: {message}")]
    UpstreamUnavailable {
        source_name: &'static str,
        message: String,
    },

    /// Blank name on lookup/delete, rejected before touching the store
    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Store read/write error; the in-memory partition is discarded
    #[error("persistence failure during {stage}: {source}")]
    Persistence {
        stage: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("country store lock poisoned")]
    StorePoisoned,

    /// Summary image generation; logged by the caller, never surfaced
    #[error("summary rendering failed: {0}")]
    Render(String),
}

impl LedgerError {
    /// Build a `map_err` adapter tagging a rusqlite error with its stage.
    pub fn persistence(stage: &'static str) -> impl FnOnce(rusqlite::Error) -> LedgerError {
        move |source| LedgerError::Persistence { stage, source }
    }

    pub fn upstream(source_name: &'static str, err: impl std::fmt::Display) -> LedgerError {
        LedgerError::UpstreamUnavailable {
            source_name,
            message: err.to_string(),
        }
    }

    /// Short machine-readable category used in JSON error bodies.
    pub fn category(&self) -> &'static str {
        match self {
            LedgerError::UpstreamUnavailable { .. } => "External data source unavailable",
            LedgerError::ValidationFailed(_) => "Validation failed",
            LedgerError::NotFound(_) => "Not found",
            LedgerError::Persistence { .. } | LedgerError::StorePoisoned => "Internal server error",
            LedgerError::Render(_) => "Render failed",
        }
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persistence_adapter_keeps_stage() {
        let err = LedgerError::persistence("bulk insert")(rusqlite::Error::InvalidQuery);
        match err {
            LedgerError::Persistence { stage, .. } => assert_eq!(stage, "bulk insert"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_upstream_message() {
        let err = LedgerError::upstream("exchange rates", "timed out");
        assert_eq!(
            err.to_string(),
            "external data source unavailable: exchange rates: timed out"
        );
        assert_eq!(err.category(), "External data source unavailable");
    }
}
