//! The coordinator's own address as seen by one particular participant

use crate::address::{AddressError, EndpointAddress};
use crate::endpoint::{ClientHandle, Endpoint};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Reference-parameter key carrying the correlation token that routes an
/// inbound call back to the participant it concerns.
pub const PARTICIPANT_PARAMETER: &str = "pact-participant";

/// The coordinator's address, optionally personalized for one participant.
///
/// A bare coordinator endpoint carries no correlation token; `personalize`
/// produces a copy with the token for one participant embedded into the
/// address's reference parameters. The transport layer reads the token back
/// out of inbound messages to pick the right participant.
#[derive(Debug)]
pub struct CoordinatorEndpoint {
    inner: Endpoint,
    correlation_token: Option<String>,
}

impl CoordinatorEndpoint {
    /// Build from the canonical address, deriving transport state and
    /// mirroring out the correlation token if the address carries one.
    pub fn from_canonical(address: EndpointAddress) -> Result<Self, AddressError> {
        let correlation_token = address.parameter(PARTICIPANT_PARAMETER).map(String::from);
        let inner = Endpoint::from_canonical(address)?;

        Ok(Self {
            inner,
            correlation_token,
        })
    }

    /// The underlying endpoint
    pub fn endpoint(&self) -> &Endpoint {
        &self.inner
    }

    /// The canonical address
    pub fn address(&self) -> &EndpointAddress {
        self.inner.address()
    }

    /// Whether the address uses a transport-secured scheme
    pub fn is_secure(&self) -> bool {
        self.inner.is_secure()
    }

    /// The dialable client handle
    pub fn client(&self) -> &ClientHandle {
        self.inner.client()
    }

    /// Correlation token for the participant this endpoint addresses, if any
    pub fn correlation_token(&self) -> Option<&str> {
        self.correlation_token.as_deref()
    }

    /// Produce a copy of this endpoint personalized for one participant.
    ///
    /// The address is duplicated, any stale participant token stripped, and
    /// the new token embedded. The receiver is never mutated; calling this
    /// twice with the same token yields equal endpoints.
    pub fn personalize(&self, token: &str) -> Result<CoordinatorEndpoint, AddressError> {
        let mut address = self.inner.address().duplicate();
        address.remove_parameter(PARTICIPANT_PARAMETER);
        address.set_parameter(PARTICIPANT_PARAMETER, token);
        Self::from_canonical(address)
    }

    /// Serialize to bytes for persistence
    pub fn to_bytes(&self) -> Result<Vec<u8>, AddressError> {
        self.inner.to_bytes()
    }

    /// Reconstruct from persisted bytes, re-deriving transport state
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AddressError> {
        Self::from_canonical(EndpointAddress::from_bytes(bytes)?)
    }
}

impl Clone for CoordinatorEndpoint {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            correlation_token: self.correlation_token.clone(),
        }
    }
}

impl PartialEq for CoordinatorEndpoint {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl Eq for CoordinatorEndpoint {}

impl fmt::Display for CoordinatorEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.correlation_token {
            Some(token) => write!(f, "{} [{}]", self.inner, token),
            None => write!(f, "{}", self.inner),
        }
    }
}

impl Serialize for CoordinatorEndpoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.inner.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CoordinatorEndpoint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let address = EndpointAddress::deserialize(deserializer)?;
        CoordinatorEndpoint::from_canonical(address).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_address() -> EndpointAddress {
        EndpointAddress::new("https://coord.example.com:9443/coordinator")
    }

    #[test]
    fn test_bare_endpoint_has_no_token() {
        let ep = CoordinatorEndpoint::from_canonical(bare_address()).unwrap();
        assert_eq!(ep.correlation_token(), None);
        assert!(ep.is_secure());
    }

    #[test]
    fn test_personalize_embeds_token() {
        let bare = CoordinatorEndpoint::from_canonical(bare_address()).unwrap();
        let personalized = bare.personalize("42").unwrap();

        assert_eq!(personalized.correlation_token(), Some("42"));
        assert_eq!(
            personalized.address().parameter(PARTICIPANT_PARAMETER),
            Some("42")
        );
        // Bare endpoint unmodified
        assert_eq!(bare.correlation_token(), None);
        assert_eq!(bare.address().parameter(PARTICIPANT_PARAMETER), None);
    }

    #[test]
    fn test_personalize_is_idempotent() {
        let bare = CoordinatorEndpoint::from_canonical(bare_address()).unwrap();
        let first = bare.personalize("42").unwrap();
        let second = bare.personalize("42").unwrap();
        assert_eq!(first, second);
        assert_eq!(first.correlation_token(), second.correlation_token());
    }

    #[test]
    fn test_personalize_strips_stale_token() {
        let stale = CoordinatorEndpoint::from_canonical(
            bare_address().with_parameter(PARTICIPANT_PARAMETER, "stale"),
        )
        .unwrap();
        assert_eq!(stale.correlation_token(), Some("stale"));

        let fresh = stale.personalize("42").unwrap();
        assert_eq!(fresh.correlation_token(), Some("42"));
        assert_eq!(fresh.address().parameter(PARTICIPANT_PARAMETER), Some("42"));
    }

    #[test]
    fn test_token_survives_serialization() {
        let ep = CoordinatorEndpoint::from_canonical(bare_address())
            .unwrap()
            .personalize("42")
            .unwrap();

        let restored = CoordinatorEndpoint::from_bytes(&ep.to_bytes().unwrap()).unwrap();
        assert_eq!(restored.correlation_token(), Some("42"));
        assert_eq!(restored.address(), ep.address());
    }
}
