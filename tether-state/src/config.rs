//! Typed configuration for the HTTP backend

use std::path::PathBuf;
use std::time::Duration;

use reqwest::Method;

use crate::backend::{BackendConfig, BackendError, BackendResult};

/// Request timeout used when none is configured
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP verbs used for the mutating operations
///
/// The remote server defines what each verb means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodConfig {
    pub update: Method,
    pub lock: Method,
    pub unlock: Method,
}

impl MethodConfig {
    pub const DEFAULT_UPDATE: &'static str = "POST";
    pub const DEFAULT_LOCK: &'static str = "LOCK";
    pub const DEFAULT_UNLOCK: &'static str = "UNLOCK";

    /// Build from verb names, rejecting anything that is not an HTTP token
    pub fn parse(update: &str, lock: &str, unlock: &str) -> BackendResult<Self> {
        Ok(Self {
            update: parse_method("update_method", update)?,
            lock: parse_method("lock_method", lock)?,
            unlock: parse_method("unlock_method", unlock)?,
        })
    }
}

fn parse_method(attribute: &str, value: &str) -> BackendResult<Method> {
    if value.is_empty() {
        return Err(BackendError::configuration(format!(
            "{} must not be empty",
            attribute
        )));
    }
    Method::from_bytes(value.as_bytes()).map_err(|_| {
        BackendError::configuration(format!("{} is not a valid HTTP method: {}", attribute, value))
    })
}

/// Basic authentication credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// How the transport verifies the server (and identifies itself)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TlsMode {
    /// Platform roots, normal verification
    Standard,
    /// Accept any server certificate
    SkipVerify,
    /// Trust an additional CA certificate (PEM)
    CustomCa { ca_file: PathBuf },
    /// Present a client certificate and trust the given CA
    Mutual {
        cert_file: PathBuf,
        key_file: PathBuf,
        ca_file: PathBuf,
    },
}

/// Validated settings of an HTTP backend
#[derive(Debug, Clone)]
pub struct HttpBackendConfig {
    /// Base address; state documents live under it
    pub address: String,
    /// Base address of lock resources
    pub lock_address: String,
    /// Base address of unlock requests
    pub unlock_address: String,
    pub methods: MethodConfig,
    pub credentials: Option<Credentials>,
    pub tls: TlsMode,
    /// Bound on every request
    pub timeout: Duration,
}

impl HttpBackendConfig {
    /// Configuration with defaults for everything but the address
    pub fn new(address: impl Into<String>) -> BackendResult<Self> {
        let address = address.into();
        assert_valid_url("address", &address)?;
        Ok(Self {
            lock_address: address.clone(),
            unlock_address: address.clone(),
            address,
            methods: MethodConfig::parse(
                MethodConfig::DEFAULT_UPDATE,
                MethodConfig::DEFAULT_LOCK,
                MethodConfig::DEFAULT_UNLOCK,
            )?,
            credentials: None,
            tls: TlsMode::Standard,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Read and validate the `http` backend attributes
    pub fn from_config(config: &BackendConfig) -> BackendResult<Self> {
        let address = config
            .get_non_empty("address")
            .ok_or_else(|| BackendError::configuration("Missing required attribute: address"))?;
        let mut settings = Self::new(address)?;

        if let Some(lock_address) = config.get_non_empty("lock_address") {
            assert_valid_url("lock_address", lock_address)?;
            settings.lock_address = lock_address.to_string();
        }
        if let Some(unlock_address) = config.get_non_empty("unlock_address") {
            assert_valid_url("unlock_address", unlock_address)?;
            settings.unlock_address = unlock_address.to_string();
        }

        settings.methods = MethodConfig::parse(
            config
                .get_string("update_method")
                .unwrap_or(MethodConfig::DEFAULT_UPDATE),
            config
                .get_string("lock_method")
                .unwrap_or(MethodConfig::DEFAULT_LOCK),
            config
                .get_string("unlock_method")
                .unwrap_or(MethodConfig::DEFAULT_UNLOCK),
        )?;

        if let Some(username) = config.get_non_empty("username") {
            settings.credentials = Some(Credentials {
                username: username.to_string(),
                password: config.get_string("password").map(str::to_string),
            });
        }

        if let Some(secs) = config.get_u64("timeout_seconds") {
            if secs == 0 {
                return Err(BackendError::configuration(
                    "timeout_seconds must be greater than zero",
                ));
            }
            settings.timeout = Duration::from_secs(secs);
        }

        settings.tls = tls_mode(config, &settings.address)?;
        Ok(settings)
    }
}

/// Pick the TLS mode; the three option sets are mutually exclusive
fn tls_mode(config: &BackendConfig, address: &str) -> BackendResult<TlsMode> {
    let skip_verify = config.get_bool_or("skip_cert_verification", false);
    let ca_file = config.get_non_empty("local_cert_ca_file");
    let mutual = config.get_bool_or("mutual_tls_authentication", false);

    if skip_verify {
        require_https(address, "skip_cert_verification = true")?;
        if let Some(ca_file) = ca_file {
            return Err(BackendError::configuration(format!(
                "skip_cert_verification is true and local_cert_ca_file is set: {}. Please choose one or the other",
                ca_file
            )));
        }
        if mutual {
            return Err(BackendError::configuration(
                "skip_cert_verification is true and mutual_tls_authentication is set. Please choose one or the other",
            ));
        }
        return Ok(TlsMode::SkipVerify);
    }

    if let Some(ca_file) = ca_file {
        require_https(address, "local_cert_ca_file is set")?;
        if mutual {
            return Err(BackendError::configuration(
                "mutual_tls_authentication is true and local_cert_ca_file is set. Please choose one or the other",
            ));
        }
        return Ok(TlsMode::CustomCa {
            ca_file: PathBuf::from(ca_file),
        });
    }

    if mutual {
        require_https(address, "mutual_tls_authentication = true")?;
        let required = |key: &str| {
            config.get_non_empty(key).map(PathBuf::from).ok_or_else(|| {
                BackendError::configuration(format!(
                    "mutual_tls_authentication is true and {} is not set",
                    key
                ))
            })
        };
        return Ok(TlsMode::Mutual {
            cert_file: required("local_cert_file")?,
            key_file: required("local_key_file")?,
            ca_file: required("local_ca_file")?,
        });
    }

    Ok(TlsMode::Standard)
}

fn assert_valid_url(attribute: &str, address: &str) -> BackendResult<()> {
    let url = url::Url::parse(address).map_err(|e| {
        BackendError::configuration(format!("failed to parse {} URL: {}", attribute, e))
    })?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(BackendError::configuration(format!(
            "{} must be of type HTTP or HTTPS",
            attribute
        )));
    }
    Ok(())
}

fn require_https(address: &str, reason: &str) -> BackendResult<()> {
    let is_https = url::Url::parse(address)
        .map(|url| url.scheme() == "https")
        .unwrap_or(false);
    if is_https {
        Ok(())
    } else {
        Err(BackendError::configuration(format!(
            "Address must be of type HTTPS if {}",
            reason
        )))
    }
}
