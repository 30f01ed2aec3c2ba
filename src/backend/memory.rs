//! In-memory backends loaded from a TOML state file
//!
//! They behave like a single engine host and a swarm manager closely enough
//! to drive the resolver and the mutation paths without a daemon.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, SecondsFormat, Utc};
use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::backend::{
    is_predefined_network, ClusterBackend, ClusterNetwork, CreateOutcome, Endpoint, EndpointInfo,
    Interface, IpamPoolConfig, IpamSettings, LocalBackend, Network, Sandbox, SCOPE_LOCAL,
    SCOPE_SWARM,
};
use crate::error::{MatchBasis, NetworkError, StateError};
use crate::network::filter::{label_matches, Filters};
use crate::network::{EndpointSettings, Ipam, NetworkCreateRequest, NetworksPruneReport};

const DEFAULT_LOCAL_DRIVER: &str = "bridge";
const DEFAULT_CLUSTER_DRIVER: &str = "overlay";
const DEFAULT_IPAM_DRIVER: &str = "default";

/// Snapshot of both backends as stored on disk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkState {
    pub local: Vec<Network>,
    pub cluster: Vec<ClusterNetwork>,
}

impl NetworkState {
    pub fn load(path: &Path) -> Result<Self, StateError> {
        let content = std::fs::read_to_string(path).map_err(|source| StateError::Read {
            path: path.display().to_string(),
            source,
        })?;

        toml::from_str(&content).map_err(|e| StateError::InvalidFormat {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), StateError> {
        let content = toml::to_string_pretty(self).map_err(|e| StateError::InvalidFormat {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        std::fs::write(path, content).map_err(|source| StateError::Write {
            path: path.display().to_string(),
            source,
        })
    }
}

/// Random 64 hex digit identifier whose short form is never all digits
fn generate_id() -> String {
    loop {
        let id = hex::encode(rand::random::<[u8; 32]>());
        if !id[..12].bytes().all(|b| b.is_ascii_digit()) {
            return id;
        }
    }
}

fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Find a single entry by exact ID, then exact name, then unique ID prefix
fn lookup<'a, T>(
    items: &'a [T],
    term: &str,
    id_of: impl Fn(&T) -> &str,
    name_of: impl Fn(&T) -> &str,
) -> Result<&'a T, NetworkError> {
    if let Some(item) = items.iter().find(|item| id_of(*item) == term) {
        return Ok(item);
    }

    let by_name: Vec<&T> = items.iter().filter(|item| name_of(*item) == term).collect();
    match by_name.len() {
        0 => {}
        1 => return Ok(by_name[0]),
        count => {
            return Err(NetworkError::Ambiguous {
                term: term.to_string(),
                count,
                basis: MatchBasis::Name,
            })
        }
    }

    let by_prefix: Vec<&T> = items
        .iter()
        .filter(|item| id_of(*item).starts_with(term))
        .collect();
    match by_prefix.len() {
        0 => Err(NetworkError::NotFound(term.to_string())),
        1 => Ok(by_prefix[0]),
        count => Err(NetworkError::Ambiguous {
            term: term.to_string(),
            count,
            basis: MatchBasis::IdPrefix,
        }),
    }
}

fn ipam_settings(request: Option<&Ipam>) -> Result<IpamSettings, NetworkError> {
    let mut settings = IpamSettings {
        driver: DEFAULT_IPAM_DRIVER.to_string(),
        ..Default::default()
    };
    let Some(ipam) = request else {
        return Ok(settings);
    };

    if !ipam.driver.is_empty() {
        settings.driver = ipam.driver.clone();
    }
    settings.options = ipam.options.clone();

    for pool in &ipam.config {
        let subnet: IpNetwork = pool.subnet.parse().map_err(|_| {
            NetworkError::invalid_parameter(format!("invalid subnet '{}'", pool.subnet))
        })?;
        let config = IpamPoolConfig {
            preferred_pool: pool.subnet.clone(),
            sub_pool: pool.ip_range.clone(),
            gateway: pool.gateway.clone(),
            aux_addresses: pool.aux_address.clone(),
        };
        match subnet {
            IpNetwork::V4(_) => settings.ipv4_config.push(config),
            IpNetwork::V6(_) => settings.ipv6_config.push(config),
        }
    }

    Ok(settings)
}

/// Local backend over an in-memory network list
pub struct MemoryLocalBackend {
    networks: RwLock<Vec<Network>>,
    list_calls: AtomicUsize,
    delete_calls: AtomicUsize,
    create_calls: AtomicUsize,
}

impl MemoryLocalBackend {
    pub fn new(networks: Vec<Network>) -> Self {
        Self {
            networks: RwLock::new(networks),
            list_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
            create_calls: AtomicUsize::new(0),
        }
    }

    pub async fn snapshot(&self) -> Vec<Network> {
        self.networks.read().await.clone()
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }
}

impl LocalBackend for MemoryLocalBackend {
    async fn list_networks(&self) -> Vec<Network> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.networks.read().await.clone()
    }

    async fn find_network(&self, id_or_name: &str) -> Result<Network, NetworkError> {
        let networks = self.networks.read().await;
        lookup(networks.as_slice(), id_or_name, |n| n.id.as_str(), |n| n.name.as_str()).cloned()
    }

    async fn create_network(
        &self,
        request: &NetworkCreateRequest,
    ) -> Result<CreateOutcome, NetworkError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if is_predefined_network(&request.name) {
            return Err(NetworkError::upstream(format!(
                "{} is a pre-defined network and cannot be created",
                request.name
            )));
        }

        let mut networks = self.networks.write().await;
        let duplicate_name = networks.iter().any(|n| n.name == request.name);
        if duplicate_name && request.check_duplicate {
            return Ok(CreateOutcome::NameConflict);
        }

        if request.scope == SCOPE_SWARM {
            debug!("Network {} must be created by the cluster manager", request.name);
            return Ok(CreateOutcome::RedirectToCluster { duplicate_name });
        }

        let id = generate_id();
        let driver = if request.driver.is_empty() {
            DEFAULT_LOCAL_DRIVER.to_string()
        } else {
            request.driver.clone()
        };
        let scope = if request.scope.is_empty() {
            SCOPE_LOCAL.to_string()
        } else {
            request.scope.clone()
        };

        networks.push(Network {
            id: id.clone(),
            name: request.name.clone(),
            driver,
            created: timestamp_now(),
            scope,
            enable_ipv6: request.enable_ipv6,
            internal: request.internal,
            attachable: request.attachable,
            ingress: request.ingress,
            config_only: request.config_only,
            config_from: request
                .config_from
                .as_ref()
                .map(|c| c.network.clone())
                .unwrap_or_default(),
            labels: request.labels.clone(),
            options: request.options.clone(),
            ipam: ipam_settings(request.ipam.as_ref())?,
            ..Default::default()
        });

        info!("Created local network {} ({})", request.name, id);
        Ok(CreateOutcome::Created { id, duplicate_name })
    }

    async fn connect_container(
        &self,
        container: &str,
        network: &str,
        endpoint_config: Option<&EndpointSettings>,
    ) -> Result<(), NetworkError> {
        let endpoint_id = generate_id();
        let mut networks = self.networks.write().await;
        let target_id = lookup(networks.as_slice(), network, |n| n.id.as_str(), |n| {
            n.name.as_str()
        })?
        .id
        .clone();
        let Some(target) = networks.iter_mut().find(|n| n.id == target_id) else {
            return Err(NetworkError::NotFound(network.to_string()));
        };

        let attached = target.endpoints.iter().any(|ep| {
            ep.info
                .as_ref()
                .and_then(|info| info.sandbox.as_ref())
                .is_some_and(|sb| sb.container_id == container)
        });
        if attached {
            return Err(NetworkError::upstream(format!(
                "endpoint with name {} already exists in network {}",
                container, target.name
            )));
        }

        let mut iface = Interface::default();
        if let Some(settings) = endpoint_config {
            if !settings.mac_address.is_empty() {
                iface.mac_address = Some(settings.mac_address.clone());
            }
            if let Some(ipam) = &settings.ipam_config {
                iface.address = parse_address(&ipam.ipv4_address)?;
                iface.address_ipv6 = parse_address(&ipam.ipv6_address)?;
            }
        }

        target.endpoints.push(Endpoint {
            id: endpoint_id,
            name: container.to_string(),
            info: Some(EndpointInfo {
                sandbox: Some(Sandbox {
                    container_id: container.to_string(),
                }),
                iface: Some(iface),
            }),
        });

        info!("Connected container {} to network {}", container, target.name);
        Ok(())
    }

    async fn disconnect_container(
        &self,
        container: &str,
        network: &str,
        force: bool,
    ) -> Result<(), NetworkError> {
        let mut networks = self.networks.write().await;
        let target_id = lookup(networks.as_slice(), network, |n| n.id.as_str(), |n| {
            n.name.as_str()
        })?
        .id
        .clone();
        let Some(target) = networks.iter_mut().find(|n| n.id == target_id) else {
            return Err(NetworkError::NotFound(network.to_string()));
        };

        let before = target.endpoints.len();
        target.endpoints.retain(|ep| {
            !ep.info
                .as_ref()
                .and_then(|info| info.sandbox.as_ref())
                .is_some_and(|sb| sb.container_id == container)
        });
        if target.endpoints.len() == before {
            return Err(NetworkError::upstream(format!(
                "container {} is not connected to network {}",
                container, target.name
            )));
        }

        info!(
            "Disconnected container {} from network {} (force: {})",
            container, target.name, force
        );
        Ok(())
    }

    async fn delete_network(&self, id: &str) -> Result<(), NetworkError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        let mut networks = self.networks.write().await;
        let Some(index) = networks.iter().position(|n| n.id == id) else {
            return Err(NetworkError::NotFound(id.to_string()));
        };

        let network = &networks[index];
        if is_predefined_network(&network.name) {
            return Err(NetworkError::upstream(format!(
                "{} is a pre-defined network and cannot be removed",
                network.name
            )));
        }
        if network.has_containers() {
            return Err(NetworkError::upstream(format!(
                "error while removing network: network {} id {} has active endpoints",
                network.name, network.id
            )));
        }

        let removed = networks.remove(index);
        info!("Removed local network {} ({})", removed.name, removed.id);
        Ok(())
    }

    async fn prune_networks(
        &self,
        cancel: &CancellationToken,
        filters: &Filters,
    ) -> Result<NetworksPruneReport, NetworkError> {
        if cancel.is_cancelled() {
            return Err(NetworkError::Cancelled);
        }
        let until = filters.until_cutoff(Utc::now())?;

        let mut networks = self.networks.write().await;
        let mut report = NetworksPruneReport::default();
        networks.retain(|network| {
            if prunable(network, filters, until) {
                debug!("Pruning network {} ({})", network.name, network.id);
                report.networks_deleted.push(network.name.clone());
                false
            } else {
                true
            }
        });

        Ok(report)
    }
}

fn parse_address(value: &str) -> Result<Option<IpNetwork>, NetworkError> {
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse()
        .map(Some)
        .map_err(|_| NetworkError::invalid_parameter(format!("invalid address '{}'", value)))
}

/// Unused, user-defined, host-local networks created no later than `until`
/// and matching every label filter
fn prunable(network: &Network, filters: &Filters, until: Option<DateTime<Utc>>) -> bool {
    if network.scope != SCOPE_LOCAL
        || network.ingress
        || is_predefined_network(&network.name)
        || network.has_containers()
    {
        return false;
    }

    // An unknown creation time counts as older than any cutoff.
    if let (Some(until), Ok(created)) = (until, DateTime::parse_from_rfc3339(&network.created)) {
        if created > until {
            return false;
        }
    }

    filters
        .get("label")
        .all(|entry| label_matches(entry, &network.labels))
        && !filters
            .get("label!")
            .any(|entry| label_matches(entry, &network.labels))
}

/// Cluster backend over an in-memory network list
pub struct MemoryClusterBackend {
    networks: RwLock<Vec<ClusterNetwork>>,
    available: bool,
    create_calls: AtomicUsize,
    remove_calls: AtomicUsize,
}

impl MemoryClusterBackend {
    pub fn new(networks: Vec<ClusterNetwork>) -> Self {
        Self {
            networks: RwLock::new(networks),
            available: true,
            create_calls: AtomicUsize::new(0),
            remove_calls: AtomicUsize::new(0),
        }
    }

    /// A cluster backend whose every call fails, as on a node outside a swarm
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new(Vec::new())
        }
    }

    pub async fn snapshot(&self) -> Vec<ClusterNetwork> {
        self.networks.read().await.clone()
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn remove_calls(&self) -> usize {
        self.remove_calls.load(Ordering::SeqCst)
    }

    fn ensure_available(&self) -> Result<(), NetworkError> {
        if self.available {
            Ok(())
        } else {
            Err(NetworkError::upstream("this node is not a swarm manager"))
        }
    }
}

impl ClusterBackend for MemoryClusterBackend {
    async fn list_networks(&self) -> Result<Vec<ClusterNetwork>, NetworkError> {
        self.ensure_available()?;
        Ok(self.networks.read().await.clone())
    }

    async fn get_network(&self, term: &str) -> Result<ClusterNetwork, NetworkError> {
        self.ensure_available()?;
        let networks = self.networks.read().await;
        lookup(networks.as_slice(), term, |n| n.id.as_str(), |n| n.name.as_str()).cloned()
    }

    async fn list_networks_by_name(&self, name: &str) -> Result<Vec<ClusterNetwork>, NetworkError> {
        self.ensure_available()?;
        let networks = self.networks.read().await;
        Ok(networks.iter().filter(|n| n.name == name).cloned().collect())
    }

    async fn create_network(&self, request: &NetworkCreateRequest) -> Result<String, NetworkError> {
        self.ensure_available()?;
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let mut networks = self.networks.write().await;
        if networks.iter().any(|n| n.name == request.name) {
            return Err(NetworkError::Conflict(request.name.clone()));
        }

        let id = generate_id();
        let driver = if request.driver.is_empty() {
            DEFAULT_CLUSTER_DRIVER.to_string()
        } else {
            request.driver.clone()
        };

        networks.push(ClusterNetwork {
            id: id.clone(),
            name: request.name.clone(),
            driver,
            created: timestamp_now(),
            scope: SCOPE_SWARM.to_string(),
            enable_ipv6: request.enable_ipv6,
            internal: request.internal,
            attachable: request.attachable,
            ingress: request.ingress,
            ipam: request.ipam.clone().unwrap_or_default(),
            options: request.options.clone(),
            labels: request.labels.clone(),
            ..Default::default()
        });

        info!("Created cluster network {} ({})", request.name, id);
        Ok(id)
    }

    async fn remove_network(&self, id: &str) -> Result<(), NetworkError> {
        self.ensure_available()?;
        self.remove_calls.fetch_add(1, Ordering::SeqCst);
        let mut networks = self.networks.write().await;
        let Some(index) = networks.iter().position(|n| n.id == id) else {
            return Err(NetworkError::NotFound(id.to_string()));
        };

        let removed = networks.remove(index);
        info!("Removed cluster network {} ({})", removed.name, removed.id);
        Ok(())
    }
}
