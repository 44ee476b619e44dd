//! Endpoint configuration and API version gate.
//!
//! Mirrors the knobs the NSX provider takes: manager address, credentials,
//! TLS verification override and the endpoint's API version. Reconciliation
//! refuses to run against endpoints older than 6.2; universal tags need 6.3.

use crate::error::{Error, Result};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Minimum NSX version this library reconciles against.
pub const MIN_VERSION: ApiVersion = ApiVersion { major: 6, minor: 2 };

/// Minimum NSX version that understands universal security tags.
pub const UNIVERSAL_MIN_VERSION: ApiVersion = ApiVersion { major: 6, minor: 3 };

/// Per-request timeout for every remote call.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// An NSX API version, `major.minor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ApiVersion {
    /// Major version component.
    pub major: u32,
    /// Minor version component.
    pub minor: u32,
}

impl ApiVersion {
    /// Whether this version accepts the `isUniversal` attribute on the wire.
    #[must_use]
    pub fn supports_universal(&self) -> bool {
        *self >= UNIVERSAL_MIN_VERSION
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for ApiVersion {
    type Err = Error;

    /// Parse `"6.3"` or `"6.3.0"` (any trailing components are ignored).
    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split('.');
        let major = parts.next().and_then(|p| p.parse().ok());
        let minor = parts.next().and_then(|p| p.parse().ok());
        match (major, minor) {
            (Some(major), Some(minor)) => Ok(Self { major, minor }),
            _ => Err(Error::Configuration(format!(
                "invalid NSX version {s:?}, expected major.minor"
            ))),
        }
    }
}

/// Connection settings for an NSX manager.
#[derive(Debug, Clone)]
pub struct Config {
    /// NSX manager host, without scheme (e.g. "nsx.example.com").
    pub manager: String,
    /// User name for API operations.
    pub user: String,
    /// Password for API operations.
    pub password: String,
    /// Permit unverifiable SSL certificates.
    pub allow_unverified_ssl: bool,
    /// API version reported for the endpoint.
    pub version: ApiVersion,
}

impl Config {
    /// Create a configuration with the default version (6.3) and verified TLS.
    pub fn new(
        manager: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            manager: manager.into(),
            user: user.into(),
            password: password.into(),
            allow_unverified_ssl: false,
            version: UNIVERSAL_MIN_VERSION,
        }
    }

    /// Build a configuration from `NSX_USER`, `NSX_PASSWORD`, `NSX_MANAGER`,
    /// `NSX_VERSION` and `NSX_ALLOW_UNVERIFIED_SSL`.
    pub fn from_env() -> Result<Self> {
        let manager = required_env("NSX_MANAGER")?;
        let user = required_env("NSX_USER")?;
        let password = required_env("NSX_PASSWORD")?;

        let mut config = Self::new(manager, user, password);
        if let Ok(version) = env::var("NSX_VERSION") {
            config.version = version.parse()?;
        }
        if let Ok(flag) = env::var("NSX_ALLOW_UNVERIFIED_SSL") {
            config.allow_unverified_ssl = flag == "true" || flag == "1";
        }
        Ok(config)
    }

    /// Set the endpoint API version.
    #[must_use]
    pub fn version(mut self, version: ApiVersion) -> Self {
        self.version = version;
        self
    }

    /// Permit unverifiable SSL certificates.
    #[must_use]
    pub fn allow_unverified_ssl(mut self, allow: bool) -> Self {
        self.allow_unverified_ssl = allow;
        self
    }

    /// Check the minimum-version precondition.
    ///
    /// This is a hard gate: older endpoints are refused, never worked around.
    pub fn validate(&self) -> Result<()> {
        if self.version < MIN_VERSION {
            return Err(Error::UnsupportedVersion {
                found: self.version.to_string(),
                minimum: MIN_VERSION.to_string(),
            });
        }
        Ok(())
    }

    /// Base URL of the security-tag service on this manager.
    #[must_use]
    pub fn tag_endpoint(&self) -> String {
        format!("https://{}/api/2.0/services/securitytags", self.manager)
    }
}

fn required_env(name: &'static str) -> Result<String> {
    env::var(name).map_err(|_| Error::Configuration(format!("{name} is not set")))
}
