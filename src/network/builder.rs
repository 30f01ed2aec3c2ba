//! Resource view construction from local backend records

use std::collections::HashMap;

use crate::backend::{Endpoint, EndpointInfo, Network, Peer};
use crate::network::ipam::build_ipam;
use crate::network::version::ApiVersion;
use crate::network::{
    ConfigReference, EndpointResource, NetworkResource, PeerInfo, ServiceInfo, Task,
};

/// Key prefix for endpoints without a container sandbox
const DANGLING_ENDPOINT_PREFIX: &str = "ep-";

/// How much of a network to materialize
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewDetail {
    /// Summary fields only, no endpoint enumeration
    Summary,
    /// Summary plus every attached endpoint
    Detailed,
    /// Detailed plus swarm services and their tasks
    Verbose,
}

impl ViewDetail {
    /// Detail level for list results at a negotiated API version.
    ///
    /// Clients older than 1.28 expect containers enumerated in list output.
    pub fn for_list(version: &ApiVersion) -> Self {
        if version.is_older_than(&ApiVersion::LIGHTWEIGHT_LIST) {
            ViewDetail::Detailed
        } else {
            ViewDetail::Summary
        }
    }

    /// Detail level for a single-network lookup
    pub fn for_inspect(verbose: bool) -> Self {
        if verbose {
            ViewDetail::Verbose
        } else {
            ViewDetail::Detailed
        }
    }
}

pub fn build(network: Option<&Network>, detail: ViewDetail) -> NetworkResource {
    match detail {
        ViewDetail::Summary => build_view(network),
        ViewDetail::Detailed => build_detailed_view(network, false),
        ViewDetail::Verbose => build_detailed_view(network, true),
    }
}

/// Summary view of a network. A missing network yields an empty view.
pub fn build_view(network: Option<&Network>) -> NetworkResource {
    let Some(nw) = network else {
        return NetworkResource::default();
    };

    let config_from = ConfigReference {
        network: nw.config_from.clone(),
    };

    NetworkResource {
        name: nw.name.clone(),
        id: nw.id.clone(),
        created: nw.created.clone(),
        scope: nw.scope.clone(),
        driver: nw.driver.clone(),
        enable_ipv6: nw.enable_ipv6,
        ipam: build_ipam(&nw.ipam),
        internal: nw.internal,
        attachable: nw.attachable,
        ingress: nw.ingress,
        config_from,
        config_only: nw.config_only,
        containers: HashMap::new(),
        options: nw.options.clone(),
        labels: nw.labels.clone(),
        peers: build_peers(&nw.peers),
        services: HashMap::new(),
    }
}

/// Summary view plus endpoints, and swarm services when `verbose` is set
pub fn build_detailed_view(network: Option<&Network>, verbose: bool) -> NetworkResource {
    let Some(nw) = network else {
        return NetworkResource::default();
    };

    let mut resource = build_view(Some(nw));
    for endpoint in &nw.endpoints {
        let Some(info) = endpoint.info.as_ref() else {
            continue;
        };
        resource
            .containers
            .insert(container_key(endpoint, info), build_endpoint(endpoint, info));
    }

    if verbose {
        resource.services = nw
            .services
            .iter()
            .map(|(name, service)| {
                let tasks = service
                    .tasks
                    .iter()
                    .map(|t| Task {
                        name: t.name.clone(),
                        endpoint_id: t.endpoint_id.clone(),
                        endpoint_ip: t.endpoint_ip.clone(),
                        info: t.info.clone(),
                    })
                    .collect();
                let info = ServiceInfo {
                    vip: service.vip.clone(),
                    ports: service.ports.clone(),
                    local_lb_index: service.local_lb_index,
                    tasks,
                };
                (name.clone(), info)
            })
            .collect();
    }

    resource
}

/// Owning container ID, or a synthetic key for endpoints without a sandbox
fn container_key(endpoint: &Endpoint, info: &EndpointInfo) -> String {
    match &info.sandbox {
        Some(sandbox) => sandbox.container_id.clone(),
        None => format!("{}{}", DANGLING_ENDPOINT_PREFIX, endpoint.id),
    }
}

fn build_endpoint(endpoint: &Endpoint, info: &EndpointInfo) -> EndpointResource {
    let mut resource = EndpointResource {
        name: endpoint.name.clone(),
        endpoint_id: endpoint.id.clone(),
        ..Default::default()
    };

    if let Some(iface) = &info.iface {
        if let Some(mac) = iface.mac_address.as_ref().filter(|m| !m.is_empty()) {
            resource.mac_address = mac.clone();
        }
        if let Some(addr) = iface.address {
            resource.ipv4_address = addr.to_string();
        }
        if let Some(addr) = iface.address_ipv6 {
            resource.ipv6_address = addr.to_string();
        }
    }

    resource
}

fn build_peers(peers: &[Peer]) -> Vec<PeerInfo> {
    peers
        .iter()
        .map(|peer| PeerInfo {
            name: peer.name.clone(),
            ip: peer.ip.clone(),
        })
        .collect()
}
