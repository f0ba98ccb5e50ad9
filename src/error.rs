use std::path::PathBuf;

use crate::document::DocumentState;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("config validation error: {0}")]
    ConfigValidation(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("Quality score {score:.2} below minimum {minimum:.2}")]
    Quality { score: f64, minimum: f64 },

    #[error("{role} agent failed: {cause}")]
    Agent { role: String, cause: String },

    #[error("approval rejected at {gate}: {reason}")]
    ApprovalRejected { gate: String, reason: String },

    #[error("changes requested at {gate}: {reason}")]
    ChangesRequested { gate: String, reason: String },

    #[error("phase timed out after {0}s")]
    Timeout(u64),

    #[error("invalid transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: DocumentState,
        to: DocumentState,
    },

    #[error("pipeline cancelled")]
    Cancelled,

    #[error("search error: {0}")]
    Search(String),

    #[error("repository error: {0}")]
    Repository(String),

    #[error("output writer error: {0}")]
    Writer(String),

    #[error("prompt error: {0}")]
    Prompt(String),
}

impl Error {
    /// Retry policy only re-attempts transient failures: transport errors
    /// and malformed (but non-empty) responses.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Parse(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(Error::Transport("503".into()).is_retryable());
        assert!(Error::Parse("bad json".into()).is_retryable());
        assert!(!Error::Validation("empty draft".into()).is_retryable());
        assert!(
            !Error::Quality {
                score: 0.5,
                minimum: 0.9
            }
            .is_retryable()
        );
        assert!(!Error::Timeout(300).is_retryable());
    }

    #[test]
    fn test_quality_message_names_score() {
        let err = Error::Quality {
            score: 0.75,
            minimum: 0.9,
        };
        let msg = err.to_string();
        assert!(msg.contains("Quality score"));
        assert!(msg.contains("0.75"));
        assert!(msg.contains("0.90"));
    }

    #[test]
    fn test_approval_messages_name_gate() {
        let err = Error::ApprovalRejected {
            gate: "after-draft".into(),
            reason: "off topic".into(),
        };
        assert!(err.to_string().contains("rejected"));
        assert!(err.to_string().contains("after-draft"));
    }
}
