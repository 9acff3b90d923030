//! Addressing layer for the Pact coordinator
//!
//! Every remote party is known by a canonical, serializable
//! [`EndpointAddress`]. Everything a transport actually dials — parsed
//! target, secure flag, client handle — is derived from the canonical form
//! and never serialized, so post-crash reconstruction runs through the exact
//! same derivation path as first construction.

mod address;
mod coordinator;
mod endpoint;

pub use address::{AddressError, EndpointAddress, Scheme, TargetAddr};
pub use coordinator::{CoordinatorEndpoint, PARTICIPANT_PARAMETER};
pub use endpoint::{ClientHandle, Endpoint};
