use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Agency responded with status {status}: {message}")]
    Agency { status: u16, message: String },

    #[error("Endpoint '{0}' is not the agency leader")]
    NotLeader(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl AnalyzerError {
    /// Whether the error must abort the whole run.
    ///
    /// Connection problems against a single server during the live
    /// one-shard check are downgraded to warnings by the caller; every
    /// other error means no report can be produced.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, AnalyzerError::Connection(_))
    }

    /// Short machine-readable code, printed by `analyze --json` on failure.
    pub fn code(&self) -> &'static str {
        match self {
            AnalyzerError::InvalidSnapshot(_) => "INVALID_SNAPSHOT",
            AnalyzerError::Json(_) => "JSON",
            AnalyzerError::Io(_) => "IO",
            AnalyzerError::Http(_) => "HTTP",
            AnalyzerError::Agency { .. } => "AGENCY",
            AnalyzerError::NotLeader(_) => "NOT_LEADER",
            AnalyzerError::Connection(_) => "CONNECTION",
            AnalyzerError::InvalidConfig(_) => "INVALID_CONFIG",
        }
    }
}

pub type Result<T> = std::result::Result<T, AnalyzerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_errors_are_soft() {
        assert!(!AnalyzerError::Connection("refused".into()).is_fatal());
        assert!(AnalyzerError::InvalidSnapshot("empty".into()).is_fatal());
        assert!(AnalyzerError::NotLeader("tcp://a:8531".into()).is_fatal());
    }

    #[test]
    fn error_codes() {
        let err = AnalyzerError::Agency {
            status: 503,
            message: "no leader".into(),
        };
        assert_eq!(err.code(), "AGENCY");
        assert_eq!(
            err.to_string(),
            "Agency responded with status 503: no leader"
        );
    }
}
