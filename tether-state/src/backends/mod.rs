//! Backend implementations for state storage

mod http;

pub use http::HttpBackend;

use crate::backend::{BackendConfig, BackendError, BackendResult, StateBackend};

/// Create a backend from configuration
///
/// This function dispatches to the appropriate backend implementation
/// based on the backend_type in the configuration.
pub fn create_backend(config: &BackendConfig) -> BackendResult<Box<dyn StateBackend>> {
    match config.backend_type.as_str() {
        "http" => {
            let backend = HttpBackend::from_config(config)?;
            Ok(Box::new(backend))
        }
        other => Err(BackendError::unsupported_backend(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unsupported_backend() {
        let config = BackendConfig::new("unsupported");

        let result = create_backend(&config);
        assert!(result.is_err());

        if let Err(BackendError::UnsupportedBackend(name)) = result {
            assert_eq!(name, "unsupported");
        } else {
            panic!("Expected UnsupportedBackend error");
        }
    }

    #[test]
    fn test_create_http_backend() {
        let config =
            BackendConfig::new("http").with_attribute("address", json!("http://localhost:8080"));
        assert!(create_backend(&config).is_ok());
    }

    #[test]
    fn test_invalid_http_config() {
        let config = BackendConfig::new("http");
        assert!(matches!(
            create_backend(&config),
            Err(BackendError::Configuration(_))
        ));
    }
}
