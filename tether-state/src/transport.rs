//! Construction of the shared HTTP client

use std::path::Path;

use reqwest::{Certificate, Client, Identity};

use crate::backend::{BackendError, BackendResult};
use crate::config::{HttpBackendConfig, TlsMode};

/// Build the HTTP client shared by every named state of one backend
pub fn build_client(config: &HttpBackendConfig) -> BackendResult<Client> {
    let mut builder = Client::builder().timeout(config.timeout);

    builder = match &config.tls {
        TlsMode::Standard => builder,
        TlsMode::SkipVerify => builder.danger_accept_invalid_certs(true),
        TlsMode::CustomCa { ca_file } => builder.add_root_certificate(load_certificate(ca_file)?),
        TlsMode::Mutual {
            cert_file,
            key_file,
            ca_file,
        } => builder
            .add_root_certificate(load_certificate(ca_file)?)
            .identity(load_identity(cert_file, key_file)?),
    };

    builder
        .build()
        .map_err(|e| BackendError::configuration(format!("Failed to build HTTP client: {}", e)))
}

fn read_file(path: &Path) -> BackendResult<Vec<u8>> {
    std::fs::read(path).map_err(|e| {
        BackendError::configuration(format!(
            "Failed to read {} into memory: {}",
            path.display(),
            e
        ))
    })
}

fn load_certificate(path: &Path) -> BackendResult<Certificate> {
    let pem = read_file(path)?;
    Certificate::from_pem(&pem).map_err(|e| {
        BackendError::configuration(format!(
            "No certs could be loaded from {}: {}",
            path.display(),
            e
        ))
    })
}

/// Client certificate and key, concatenated into one PEM bundle
fn load_identity(cert_file: &Path, key_file: &Path) -> BackendResult<Identity> {
    let mut pem = read_file(cert_file)?;
    pem.push(b'\n');
    pem.extend(read_file(key_file)?);
    Identity::from_pem(&pem).map_err(|e| {
        BackendError::configuration(format!(
            "Can not load pem files: {} and {}. Error: {}",
            cert_file.display(),
            key_file.display(),
            e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    fn testdata(file: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("testdata").join(file)
    }

    fn settings(tls: TlsMode) -> HttpBackendConfig {
        let mut config = HttpBackendConfig::new("https://state.example.com").unwrap();
        config.tls = tls;
        config.timeout = Duration::from_secs(2);
        config
    }

    #[test]
    fn test_build_standard_client() {
        assert!(build_client(&settings(TlsMode::Standard)).is_ok());
    }

    #[test]
    fn test_build_skip_verify_client() {
        assert!(build_client(&settings(TlsMode::SkipVerify)).is_ok());
    }

    #[test]
    fn test_build_custom_ca_client() {
        let result = build_client(&settings(TlsMode::CustomCa {
            ca_file: testdata("ca.pem"),
        }));
        assert!(result.is_ok(), "{:?}", result.err());
    }

    #[test]
    fn test_build_mutual_tls_client() {
        let result = build_client(&settings(TlsMode::Mutual {
            cert_file: testdata("client.pem"),
            key_file: testdata("client.key"),
            ca_file: testdata("ca.pem"),
        }));
        assert!(result.is_ok(), "{:?}", result.err());
    }

    #[test]
    fn test_key_file_without_key() {
        // A certificate where the key should be
        let result = build_client(&settings(TlsMode::Mutual {
            cert_file: testdata("client.pem"),
            key_file: testdata("ca.pem"),
            ca_file: testdata("ca.pem"),
        }));
        match result {
            Err(BackendError::Configuration(message)) => {
                assert!(message.contains("Can not load pem files"));
            }
            other => panic!("Expected configuration error, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_missing_ca_file() {
        let dir = tempfile::tempdir().unwrap();
        let ca_file = dir.path().join("missing-ca.pem");
        let result = build_client(&settings(TlsMode::CustomCa { ca_file }));

        match result {
            Err(BackendError::Configuration(message)) => {
                assert!(message.contains("missing-ca.pem"));
            }
            other => panic!("Expected configuration error, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_missing_client_certificate() {
        let dir = tempfile::tempdir().unwrap();
        let result = build_client(&settings(TlsMode::Mutual {
            cert_file: dir.path().join("client.pem"),
            key_file: dir.path().join("client.key"),
            ca_file: dir.path().join("ca.pem"),
        }));
        assert!(matches!(result, Err(BackendError::Configuration(_))));
    }
}
