use thiserror::Error;

/// Classified failure surfaced by the generation gateway.
///
/// Produced exclusively by the gateway's error classifier; the pipeline and
/// the application state only react to the kind, they never reinterpret it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenError {
    #[error("Your API key is missing or invalid. Please provide a valid key.")]
    MissingOrInvalidCredential,
    #[error("The API quota has been exceeded. Please try again later or with a different key.")]
    QuotaExceeded,
    #[error("{0}")]
    Generic(String),
}

impl GenError {
    pub fn generic(message: impl Into<String>) -> Self {
        GenError::Generic(message.into())
    }
}
