use thiserror::Error;

#[derive(Debug, Error)]
pub enum TriageError {
    /// Input bytes could not be decoded as an image.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Native radiograph detected but this build (or this file) cannot be decoded.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Rules error: {0}")]
    Rules(String),

    #[error("Detector error: {0}")]
    Detector(String),

    #[error("Worker error: {0}")]
    Worker(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<TriageError> for String {
    fn from(err: TriageError) -> Self {
        err.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_into_string() {
        let msg: String = TriageError::UnsupportedFormat("no DICOM support".to_string()).into();
        assert_eq!(msg, "Unsupported format: no DICOM support");
    }
}
