use thiserror::Error;

#[derive(Error, Debug)]
pub enum VibeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Validation(String),

    /// A single backend failed; the orchestrator absorbs these.
    #[error("{backend}: {reason}")]
    Acquisition { backend: String, reason: String },

    #[error("{backend}: verification required by the hosting site ({reason})")]
    VerificationRequired { backend: String, reason: String },

    #[error("All audio sources failed: {}", failures.join("; "))]
    AcquisitionExhausted {
        failures: Vec<String>,
        verification_required: bool,
    },

    #[error("Effect processing error: {0}")]
    EffectProcessing(String),

    #[error("Media processing error: {0}")]
    Media(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl VibeError {
    pub fn acquisition(backend: &str, reason: impl Into<String>) -> Self {
        Self::Acquisition {
            backend: backend.to_string(),
            reason: reason.into(),
        }
    }

    pub fn verification(backend: &str, reason: impl Into<String>) -> Self {
        Self::VerificationRequired {
            backend: backend.to_string(),
            reason: reason.into(),
        }
    }

    /// Errors the caller can fix by changing the request.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::AcquisitionExhausted { .. } | Self::VerificationRequired { .. }
        )
    }

    pub fn verification_required(&self) -> bool {
        match self {
            Self::VerificationRequired { .. } => true,
            Self::AcquisitionExhausted {
                verification_required,
                ..
            } => *verification_required,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, VibeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_message_keeps_order() {
        let err = VibeError::AcquisitionExhausted {
            failures: vec!["native: a".into(), "yt-dlp: b".into(), "remote-api: c".into()],
            verification_required: false,
        };
        assert_eq!(
            err.to_string(),
            "All audio sources failed: native: a; yt-dlp: b; remote-api: c"
        );
        assert!(err.is_client_error());
        assert!(!err.verification_required());
    }

    #[test]
    fn test_effect_errors_are_server_side() {
        assert!(!VibeError::EffectProcessing("boom".into()).is_client_error());
        assert!(!VibeError::Internal("boom".into()).is_client_error());
        assert!(VibeError::Validation("bad".into()).is_client_error());
    }
}
