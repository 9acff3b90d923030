//! Endpoints: a canonical address plus the transport handle derived from it

use crate::address::{AddressError, EndpointAddress, TargetAddr};
use parking_lot::Mutex;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A handle a transport can dial, derived from one parsed target.
///
/// Carries the test/diagnostic misroute override: `redirect` repoints the
/// dial authority at a fixed `host:port` to simulate an unreachable
/// participant. Production code paths never set it, and it does not survive
/// serialization or cloning of the owning endpoint.
#[derive(Debug)]
pub struct ClientHandle {
    target: TargetAddr,
    redirect: Mutex<Option<(String, u16)>>,
}

impl ClientHandle {
    pub(crate) fn new(target: TargetAddr) -> Self {
        Self {
            target,
            redirect: Mutex::new(None),
        }
    }

    /// The parsed target this handle dials
    pub fn target(&self) -> &TargetAddr {
        &self.target
    }

    /// `host:port` the transport should actually connect to
    pub fn authority(&self) -> String {
        match &*self.redirect.lock() {
            Some((host, port)) => format!("{}:{}", host, port),
            None => self.target.authority(),
        }
    }

    /// Misroute all traffic from this handle to a fixed `host:port`
    pub fn redirect(&self, host: impl Into<String>, port: u16) {
        *self.redirect.lock() = Some((host.into(), port));
    }

    /// Drop any misroute override
    pub fn clear_redirect(&self) {
        *self.redirect.lock() = None;
    }

    /// Whether a misroute override is active
    pub fn is_redirected(&self) -> bool {
        self.redirect.lock().is_some()
    }
}

/// One remote address, usable both as data to send in a protocol message and
/// as a handle a transport can dial.
///
/// [`Endpoint::from_canonical`] is the only constructor: it parses the
/// canonical address and derives the secure flag and client handle eagerly.
/// Serialization writes the canonical address verbatim and deserialization
/// re-enters `from_canonical`, so there is exactly one code path that turns
/// canonical state into transport state, at first creation and at post-crash
/// reconstruction alike.
#[derive(Debug)]
pub struct Endpoint {
    address: EndpointAddress,
    secure: bool,
    client: ClientHandle,
}

impl Endpoint {
    /// Build an endpoint from its canonical address, deriving all transport
    /// state. Fails if the address cannot be parsed into the transport's
    /// address form.
    pub fn from_canonical(address: EndpointAddress) -> Result<Self, AddressError> {
        let target = address.parse_target()?;
        let secure = target.scheme.is_secure();

        Ok(Self {
            address,
            secure,
            client: ClientHandle::new(target),
        })
    }

    /// The canonical address
    pub fn address(&self) -> &EndpointAddress {
        &self.address
    }

    /// Whether the address uses a transport-secured scheme
    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// The dialable client handle
    pub fn client(&self) -> &ClientHandle {
        &self.client
    }

    /// Serialize to bytes for persistence
    pub fn to_bytes(&self) -> Result<Vec<u8>, AddressError> {
        self.address.to_bytes()
    }

    /// Reconstruct from persisted bytes, re-deriving transport state
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AddressError> {
        Self::from_canonical(EndpointAddress::from_bytes(bytes)?)
    }
}

impl Clone for Endpoint {
    fn clone(&self) -> Self {
        // Derived state is recomputed; the misroute override stays behind.
        Self {
            address: self.address.clone(),
            secure: self.secure,
            client: ClientHandle::new(self.client.target().clone()),
        }
    }
}

impl PartialEq for Endpoint {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for Endpoint {}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address)
    }
}

impl Serialize for Endpoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.address.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Endpoint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let address = EndpointAddress::deserialize(deserializer)?;
        Endpoint::from_canonical(address).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn participant_address() -> EndpointAddress {
        EndpointAddress::new("https://node7.example.com:8443/participant")
            .with_parameter("enlistment", "primary")
    }

    #[test]
    fn test_from_canonical_derives_transport_state() {
        let endpoint = Endpoint::from_canonical(participant_address()).unwrap();
        assert!(endpoint.is_secure());
        assert_eq!(endpoint.client().authority(), "node7.example.com:8443");

        let plain = Endpoint::from_canonical(EndpointAddress::new("http://localhost/p")).unwrap();
        assert!(!plain.is_secure());
        assert_eq!(plain.client().authority(), "localhost:80");
    }

    #[test]
    fn test_from_canonical_rejects_bad_address() {
        assert!(Endpoint::from_canonical(EndpointAddress::new("not a uri")).is_err());
    }

    #[test]
    fn test_serde_roundtrip_reconstructs_derived_fields() {
        let endpoint = Endpoint::from_canonical(participant_address()).unwrap();

        let json = serde_json::to_string(&endpoint).unwrap();
        let restored: Endpoint = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.address(), endpoint.address());
        assert_eq!(restored.is_secure(), endpoint.is_secure());
        assert_eq!(restored.client().authority(), endpoint.client().authority());
    }

    #[test]
    fn test_bytes_roundtrip() {
        let endpoint = Endpoint::from_canonical(participant_address()).unwrap();
        let bytes = endpoint.to_bytes().unwrap();
        let restored = Endpoint::from_bytes(&bytes).unwrap();
        assert_eq!(restored, endpoint);
        assert!(restored.is_secure());
    }

    #[test]
    fn test_misroute_overrides_authority_only() {
        let endpoint = Endpoint::from_canonical(participant_address()).unwrap();

        endpoint.client().redirect("blackhole.test", 1);
        assert_eq!(endpoint.client().authority(), "blackhole.test:1");
        // Canonical address untouched
        assert_eq!(endpoint.address(), &participant_address());

        endpoint.client().clear_redirect();
        assert_eq!(endpoint.client().authority(), "node7.example.com:8443");
    }

    #[test]
    fn test_misroute_does_not_survive_serialization() {
        let endpoint = Endpoint::from_canonical(participant_address()).unwrap();
        endpoint.client().redirect("blackhole.test", 1);

        let restored = Endpoint::from_bytes(&endpoint.to_bytes().unwrap()).unwrap();
        assert!(!restored.client().is_redirected());
        assert_eq!(restored.client().authority(), "node7.example.com:8443");
    }
}
