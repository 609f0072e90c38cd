use thiserror::Error;

/// Error types for the translation subsystem
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranslatorError {
    /// The locale is absent from the backend catalog
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),
    /// The backend reported quota exhaustion
    #[error("Translator is rate limited")]
    RateLimited,
    /// Transport failure while talking to a backend
    #[error("Network error: {0}")]
    NetworkError(String),
    /// The backend answered with an error or an unreadable payload
    #[error("Translation error: {0}")]
    TranslationError(String),
    /// Invalid construction parameters
    #[error("Configuration error: {0}")]
    ConfigError(String),
    /// A locale tag that could not be parsed
    #[error("Invalid locale: {0}")]
    InvalidLocale(String),
    /// A batch response did not contain every requested text
    #[error("Missing translation for '{0}' in batch response")]
    MissingResult(String),
    #[error("Translation timed out")]
    Timeout,
}

impl From<reqwest::Error> for TranslatorError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            TranslatorError::TranslationError(format!("Failed to parse API response: {}", error))
        } else {
            TranslatorError::NetworkError(error.to_string())
        }
    }
}

/// Result type for translation operations
pub type TranslatorResult<T> = Result<T, TranslatorError>;
