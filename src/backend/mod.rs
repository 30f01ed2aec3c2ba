//! Backend interfaces
//!
//! The local backend owns drivers, IPAM and endpoint wiring on this host; the
//! cluster backend owns swarm-wide network identity. The core only reads their
//! networks and forwards mutations to them.

use std::collections::HashMap;
use std::future::Future;

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::NetworkError;
use crate::network::filter::Filters;
use crate::network::{
    EndpointSettings, NetworkCreateRequest, NetworkResource, NetworksPruneReport,
};

pub mod memory;

pub const SCOPE_LOCAL: &str = "local";
pub const SCOPE_SWARM: &str = "swarm";
pub const SCOPE_GLOBAL: &str = "global";

/// Networks that always exist on a host and cannot be removed by users.
const PREDEFINED_NETWORKS: &[&str] = &["bridge", "host", "none", "nat", "default"];

pub fn is_predefined_network(name: &str) -> bool {
    PREDEFINED_NETWORKS.contains(&name)
}

/// Network record as held by the local backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Network {
    pub id: String,
    pub name: String,
    pub driver: String,
    pub created: String,
    pub scope: String,
    pub enable_ipv6: bool,
    pub internal: bool,
    pub attachable: bool,
    pub ingress: bool,
    pub config_only: bool,
    pub config_from: String,
    pub labels: HashMap<String, String>,
    pub options: HashMap<String, String>,
    pub ipam: IpamSettings,
    pub endpoints: Vec<Endpoint>,
    pub services: HashMap<String, ServiceRecord>,
    pub peers: Vec<Peer>,
}

impl Network {
    /// Whether any endpoint on this network belongs to a container
    pub fn has_containers(&self) -> bool {
        self.endpoints.iter().any(|ep| {
            ep.info
                .as_ref()
                .is_some_and(|info| info.sandbox.is_some())
        })
    }
}

/// IPAM state of a network: what was requested and what was allocated
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IpamSettings {
    pub driver: String,
    pub options: HashMap<String, String>,
    pub ipv4_config: Vec<IpamPoolConfig>,
    pub ipv6_config: Vec<IpamPoolConfig>,
    pub ipv4_info: Vec<IpamPoolInfo>,
    pub ipv6_info: Vec<IpamPoolInfo>,
}

/// Pool requested by the user at creation time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IpamPoolConfig {
    pub preferred_pool: String,
    pub sub_pool: String,
    pub gateway: String,
    pub aux_addresses: HashMap<String, String>,
}

/// Pool allocated by the IPAM driver at runtime
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IpamPoolInfo {
    pub pool: Option<IpNetwork>,
    pub gateway: Option<IpNetwork>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoint {
    pub id: String,
    pub name: String,
    pub info: Option<EndpointInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointInfo {
    pub sandbox: Option<Sandbox>,
    pub iface: Option<Interface>,
}

/// Network sandbox of the container owning an endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sandbox {
    pub container_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Interface {
    pub mac_address: Option<String>,
    pub address: Option<IpNetwork>,
    pub address_ipv6: Option<IpNetwork>,
}

/// Swarm service load-balanced on a network
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceRecord {
    pub vip: String,
    pub ports: Vec<String>,
    pub local_lb_index: u64,
    pub tasks: Vec<TaskRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskRecord {
    pub name: String,
    pub endpoint_id: String,
    pub endpoint_ip: String,
    pub info: HashMap<String, String>,
}

/// Gossip peer participating in a network
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Peer {
    pub name: String,
    pub ip: String,
}

/// Cluster networks arrive already shaped as resource views
pub type ClusterNetwork = NetworkResource;

/// Result of asking the local backend to create a network
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    /// Created locally. `duplicate_name` is set when another network already
    /// used the requested name and duplicates were allowed.
    Created { id: String, duplicate_name: bool },
    /// The name is taken and nothing was created.
    NameConflict,
    /// The network has to be created through the cluster manager.
    RedirectToCluster { duplicate_name: bool },
}

/// Single-host network backend
pub trait LocalBackend: Send + Sync {
    fn list_networks(&self) -> impl Future<Output = Vec<Network>> + Send;

    fn find_network(
        &self,
        id_or_name: &str,
    ) -> impl Future<Output = Result<Network, NetworkError>> + Send;

    fn create_network(
        &self,
        request: &NetworkCreateRequest,
    ) -> impl Future<Output = Result<CreateOutcome, NetworkError>> + Send;

    fn connect_container(
        &self,
        container: &str,
        network: &str,
        endpoint_config: Option<&EndpointSettings>,
    ) -> impl Future<Output = Result<(), NetworkError>> + Send;

    fn disconnect_container(
        &self,
        container: &str,
        network: &str,
        force: bool,
    ) -> impl Future<Output = Result<(), NetworkError>> + Send;

    fn delete_network(&self, id: &str) -> impl Future<Output = Result<(), NetworkError>> + Send;

    fn prune_networks(
        &self,
        cancel: &CancellationToken,
        filters: &Filters,
    ) -> impl Future<Output = Result<NetworksPruneReport, NetworkError>> + Send;
}

/// Cluster-wide network manager
pub trait ClusterBackend: Send + Sync {
    fn list_networks(&self)
        -> impl Future<Output = Result<Vec<ClusterNetwork>, NetworkError>> + Send;

    fn get_network(
        &self,
        term: &str,
    ) -> impl Future<Output = Result<ClusterNetwork, NetworkError>> + Send;

    fn list_networks_by_name(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Vec<ClusterNetwork>, NetworkError>> + Send;

    fn create_network(
        &self,
        request: &NetworkCreateRequest,
    ) -> impl Future<Output = Result<String, NetworkError>> + Send;

    fn remove_network(&self, id: &str) -> impl Future<Output = Result<(), NetworkError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predefined_networks() {
        assert!(is_predefined_network("bridge"));
        assert!(is_predefined_network("host"));
        assert!(is_predefined_network("none"));
        assert!(!is_predefined_network("web"));
    }

    #[test]
    fn test_has_containers_ignores_dangling_endpoints() {
        let mut network = Network {
            endpoints: vec![Endpoint {
                id: "ep1".to_string(),
                name: "dangling".to_string(),
                info: Some(EndpointInfo::default()),
            }],
            ..Default::default()
        };
        assert!(!network.has_containers());

        network.endpoints.push(Endpoint {
            id: "ep2".to_string(),
            name: "web".to_string(),
            info: Some(EndpointInfo {
                sandbox: Some(Sandbox {
                    container_id: "c1".to_string(),
                }),
                iface: None,
            }),
        });
        assert!(network.has_containers());
    }
}
