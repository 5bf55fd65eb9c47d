//! Snitches
//!
//! A snitch places endpoints in datacenters and racks. Lookups never
//! block; an endpoint the snitch cannot place is an `UnresolvedEndpoint`
//! error, which callers treat as a configuration fault.

use std::collections::HashMap;
use std::net::IpAddr;

use crate::error::{Result, RingError};

/// Topology oracle
pub trait EndpointSnitch: Send + Sync + std::fmt::Debug {
    fn datacenter(&self, endpoint: IpAddr) -> Result<String>;

    fn rack(&self, endpoint: IpAddr) -> Result<String>;

    fn is_in_same_datacenter(&self, a: IpAddr, b: IpAddr) -> Result<bool> {
        Ok(self.datacenter(a)? == self.datacenter(b)?)
    }

    fn is_on_same_rack(&self, a: IpAddr, b: IpAddr) -> Result<bool> {
        Ok(self.is_in_same_datacenter(a, b)? && self.rack(a)? == self.rack(b)?)
    }
}

// =============================================================================
// Static
// =============================================================================

/// Topology given explicitly, endpoint by endpoint
#[derive(Debug, Default, Clone)]
pub struct StaticSnitch {
    /// endpoint → (datacenter, rack)
    placements: HashMap<IpAddr, (String, String)>,
}

impl StaticSnitch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place `endpoint` in `datacenter` / `rack`
    pub fn with_endpoint(
        mut self,
        endpoint: IpAddr,
        datacenter: impl Into<String>,
        rack: impl Into<String>,
    ) -> Self {
        self.placements
            .insert(endpoint, (datacenter.into(), rack.into()));
        self
    }

    fn placement(&self, endpoint: IpAddr) -> Result<&(String, String)> {
        self.placements
            .get(&endpoint)
            .ok_or_else(|| RingError::UnresolvedEndpoint(endpoint.to_string()))
    }
}

impl EndpointSnitch for StaticSnitch {
    fn datacenter(&self, endpoint: IpAddr) -> Result<String> {
        Ok(self.placement(endpoint)?.0.clone())
    }

    fn rack(&self, endpoint: IpAddr) -> Result<String> {
        Ok(self.placement(endpoint)?.1.clone())
    }
}

// =============================================================================
// Rack Inferring
// =============================================================================

/// Reads the topology out of IPv4 addresses: the second octet names the
/// datacenter and the third the rack. IPv6 endpoints cannot be placed.
#[derive(Debug, Default, Clone, Copy)]
pub struct RackInferringSnitch;

impl RackInferringSnitch {
    fn octets(endpoint: IpAddr) -> Result<[u8; 4]> {
        match endpoint {
            IpAddr::V4(v4) => Ok(v4.octets()),
            IpAddr::V6(v6) => v6
                .to_ipv4_mapped()
                .map(|v4| v4.octets())
                .ok_or_else(|| RingError::UnresolvedEndpoint(endpoint.to_string())),
        }
    }
}

impl EndpointSnitch for RackInferringSnitch {
    fn datacenter(&self, endpoint: IpAddr) -> Result<String> {
        Ok(Self::octets(endpoint)?[1].to_string())
    }

    fn rack(&self, endpoint: IpAddr) -> Result<String> {
        Ok(Self::octets(endpoint)?[2].to_string())
    }
}
