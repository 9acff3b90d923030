//! Canonical endpoint addresses and their transport-native parsed form

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Addressing error types
#[derive(Debug, Error)]
pub enum AddressError {
    #[error("Invalid address '{uri}': {reason}")]
    InvalidAddress { uri: String, reason: String },

    #[error("Address codec error: {0}")]
    Codec(String),
}

impl AddressError {
    pub(crate) fn invalid(uri: &str, reason: impl Into<String>) -> Self {
        Self::InvalidAddress {
            uri: uri.to_string(),
            reason: reason.into(),
        }
    }
}

/// Transport scheme of an address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    /// Parse from the scheme component of a uri
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "http" => Some(Self::Http),
            "https" => Some(Self::Https),
            _ => None,
        }
    }

    /// Port implied when the authority carries none
    pub fn default_port(&self) -> u16 {
        match self {
            Self::Http => 80,
            Self::Https => 443,
        }
    }

    /// Whether traffic on this scheme is transport-secured
    pub fn is_secure(&self) -> bool {
        matches!(self, Self::Https)
    }

    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The transport's native address form, parsed out of a canonical uri.
///
/// Only produced by [`EndpointAddress::parse_target`]; never serialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetAddr {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl TargetAddr {
    /// `host:port` dial string
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for TargetAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}{}", self.scheme, self.host, self.port, self.path)
    }
}

/// Canonical, serializable form of a remote reference.
///
/// A uri plus a set of opaque reference parameters that ride along with every
/// protocol message sent to the address. Parameters are kept in a `BTreeMap`
/// so two structurally equal addresses serialize to identical bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointAddress {
    /// Address uri, e.g. `https://node7.example.com:8443/coordinator`
    uri: String,

    /// Opaque reference parameters echoed back by the remote party
    reference_parameters: BTreeMap<String, String>,
}

impl EndpointAddress {
    /// Create a new address with no reference parameters
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            reference_parameters: BTreeMap::new(),
        }
    }

    /// Builder-style parameter attachment
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.reference_parameters.insert(key.into(), value.into());
        self
    }

    /// Get the address uri
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Get a reference parameter by key
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.reference_parameters.get(key).map(|s| s.as_str())
    }

    /// Set a reference parameter, replacing any previous value
    pub fn set_parameter(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.reference_parameters.insert(key.into(), value.into());
    }

    /// Remove a reference parameter if present
    pub fn remove_parameter(&mut self, key: &str) -> Option<String> {
        self.reference_parameters.remove(key)
    }

    /// Iterate reference parameters in key order
    pub fn parameters(&self) -> impl Iterator<Item = (&str, &str)> {
        self.reference_parameters
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Deep copy, reference parameters included.
    ///
    /// The explicit name marks call sites that rely on getting an
    /// independent address to mutate.
    pub fn duplicate(&self) -> Self {
        self.clone()
    }

    /// Parse the uri into the transport's native address form
    pub fn parse_target(&self) -> Result<TargetAddr, AddressError> {
        let (scheme_str, rest) = self
            .uri
            .split_once("://")
            .ok_or_else(|| AddressError::invalid(&self.uri, "missing scheme"))?;

        let scheme = Scheme::parse(scheme_str)
            .ok_or_else(|| AddressError::invalid(&self.uri, format!("unsupported scheme '{}'", scheme_str)))?;

        let (authority, path) = match rest.split_once('/') {
            Some((authority, path)) => (authority, format!("/{}", path)),
            None => (rest, "/".to_string()),
        };

        if authority.is_empty() {
            return Err(AddressError::invalid(&self.uri, "empty authority"));
        }

        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port_str)) => {
                let port = port_str.parse::<u16>().map_err(|_| {
                    AddressError::invalid(&self.uri, format!("invalid port '{}'", port_str))
                })?;
                (host, port)
            }
            None => (authority, scheme.default_port()),
        };

        if host.is_empty() {
            return Err(AddressError::invalid(&self.uri, "empty host"));
        }

        Ok(TargetAddr {
            scheme,
            host: host.to_string(),
            port,
            path,
        })
    }

    /// Serialize to bytes for persistence
    pub fn to_bytes(&self) -> Result<Vec<u8>, AddressError> {
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(self, &mut bytes).map_err(|e| AddressError::Codec(e.to_string()))?;
        Ok(bytes)
    }

    /// Deserialize from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AddressError> {
        ciborium::de::from_reader(bytes).map_err(|e| AddressError::Codec(e.to_string()))
    }
}

// Display shows the uri only; parameters are opaque routing data.
impl fmt::Display for EndpointAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri)
    }
}
