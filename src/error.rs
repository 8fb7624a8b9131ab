use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrucibleError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Unsupported language: {0} (expected go, python or cpp)")]
    UnsupportedLanguage(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_language_display() {
        let err = CrucibleError::UnsupportedLanguage("cobol".into());
        assert_eq!(
            err.to_string(),
            "Unsupported language: cobol (expected go, python or cpp)"
        );
    }

    #[test]
    fn job_not_found_display() {
        let err = CrucibleError::JobNotFound("abc-123".into());
        assert_eq!(err.to_string(), "Job not found: abc-123");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CrucibleError>();
    }
}
