use thiserror::Error;

/// Top-level error type for the Xodiac system.
///
/// Subsystem crates define their own error types and implement
/// `From<XodiacError>` so that the `?` operator works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum XodiacError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for XodiacError {
    fn from(err: toml::de::Error) -> Self {
        XodiacError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for XodiacError {
    fn from(err: toml::ser::Error) -> Self {
        XodiacError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for XodiacError {
    fn from(err: serde_json::Error) -> Self {
        XodiacError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Xodiac operations.
pub type Result<T> = std::result::Result<T, XodiacError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = XodiacError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: XodiacError = io_err.into();
        assert!(matches!(err, XodiacError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_toml_error_conversion() {
        let toml_err = toml::from_str::<toml::Value>("= broken").unwrap_err();
        let err: XodiacError = toml_err.into();
        assert!(matches!(err, XodiacError::Config(_)));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: XodiacError = json_err.into();
        assert!(matches!(err, XodiacError::Serialization(_)));
        assert!(err.to_string().starts_with("Serialization error:"));
    }
}
