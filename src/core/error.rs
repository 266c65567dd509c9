use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Google,
    OpenAi,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Google => write!(f, "Google"),
            Provider::OpenAi => write!(f, "OpenAI"),
        }
    }
}

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("{0} API key is not set")]
    MissingCredential(Provider),

    #[error("model returned no image data")]
    NoImageReturned,

    #[error("{provider} API error: {message}")]
    Provider {
        provider: Provider,
        status: Option<u16>,
        message: String,
    },
}

impl GenerationError {
    pub fn provider(provider: Provider, status: Option<u16>, message: impl Into<String>) -> Self {
        GenerationError::Provider {
            provider,
            status,
            message: message.into(),
        }
    }

    // Google rejects bad keys with a 400 "API key not valid" rather than a 401.
    pub fn is_credential_rejection(&self) -> bool {
        match self {
            GenerationError::Provider {
                status, message, ..
            } => {
                matches!(status, Some(401) | Some(403)) || message.contains("API key not valid")
            }
            _ => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum ScriptError {
    #[error("script must be a top-level JSON array of panels")]
    NotAnArray,

    #[error("script JSON is invalid: {0}")]
    Syntax(#[from] serde_json::Error),

    #[error("panel id {0} appears more than once")]
    DuplicateId(u32),
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("no successfully generated panels to export")]
    NoSuccessfulPanels,

    #[error("failed to write archive: {0}")]
    Packaging(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_rejection_detection() {
        let unauthorized = GenerationError::provider(Provider::OpenAi, Some(401), "bad key");
        assert!(unauthorized.is_credential_rejection());

        let forbidden = GenerationError::provider(Provider::Google, Some(403), "denied");
        assert!(forbidden.is_credential_rejection());

        let google_bad_key = GenerationError::provider(
            Provider::Google,
            Some(400),
            "API key not valid. Please pass a valid API key.",
        );
        assert!(google_bad_key.is_credential_rejection());

        let server_error = GenerationError::provider(Provider::Google, Some(500), "boom");
        assert!(!server_error.is_credential_rejection());

        assert!(!GenerationError::NoImageReturned.is_credential_rejection());
        assert!(!GenerationError::MissingCredential(Provider::Google).is_credential_rejection());
    }

    #[test]
    fn test_missing_credential_names_the_provider() {
        let err = GenerationError::MissingCredential(Provider::OpenAi);
        assert_eq!(err.to_string(), "OpenAI API key is not set");
    }
}
