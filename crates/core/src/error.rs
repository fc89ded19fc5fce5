#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Unknown filter '{0}'. Must be one of: grayscale, sepia")]
    UnknownFilter(String),
}
