use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("confirmation required: {0}")]
    ConfirmationRequired(String),

    #[error("busy: {0}")]
    Busy(String),

    #[error("Classification error: {0}")]
    Classification(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("{0}")]
    General(String),
}

impl AppError {
    pub fn capture(self) -> Self {
        tracing::error!(error = %self, "operation failed");
        self
    }
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_display_string() {
        let err = AppError::NotFound("record x".to_string());
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(json, "\"not found: record x\"");
    }

    #[test]
    fn io_errors_convert_with_question_mark() {
        fn read() -> Result<String, AppError> {
            Ok(std::fs::read_to_string("/nonexistent/foldertree/file")?)
        }
        assert!(matches!(read(), Err(AppError::Io(_))));
    }
}
