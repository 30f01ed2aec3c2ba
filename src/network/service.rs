//! Network operations exposed to request handlers
//!
//! Reads go through the [`Resolver`] and the resource builder; mutations are
//! routed to whichever backend owns the network. Nothing here is transactional
//! across the two backends.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::{ClusterBackend, CreateOutcome, LocalBackend, SCOPE_SWARM};
use crate::error::NetworkError;
use crate::network::builder::{build, ViewDetail};
use crate::network::filter::{
    filter_networks, Filters, ACCEPTED_NETWORK_FILTERS, ACCEPTED_PRUNE_FILTERS,
};
use crate::network::request::InspectOptions;
use crate::network::resolver::{guarded, Resolver};
use crate::network::version::ApiVersion;
use crate::network::{
    NetworkConnect, NetworkCreateRequest, NetworkCreateResponse, NetworkDisconnect,
    NetworkResource, NetworksPruneReport,
};

/// API version assumed when a caller does not negotiate one
pub const DEFAULT_API_VERSION: ApiVersion = ApiVersion::new(1, 41);

/// Entry point for network reads and mutations over both backends
pub struct NetworkService<L, C> {
    local: Arc<L>,
    cluster: Arc<C>,
    default_api_version: ApiVersion,
}

impl<L, C> NetworkService<L, C>
where
    L: LocalBackend,
    C: ClusterBackend,
{
    pub fn new(local: Arc<L>, cluster: Arc<C>) -> Self {
        Self {
            local,
            cluster,
            default_api_version: DEFAULT_API_VERSION,
        }
    }

    pub fn with_default_api_version(mut self, version: ApiVersion) -> Self {
        self.default_api_version = version;
        self
    }

    pub fn local(&self) -> &Arc<L> {
        &self.local
    }

    pub fn cluster(&self) -> &Arc<C> {
        &self.cluster
    }

    fn resolver<'a>(&'a self, cancel: &'a CancellationToken) -> Resolver<'a, L, C> {
        Resolver::new(self.local.as_ref(), self.cluster.as_ref(), cancel)
    }

    /// All networks known to either backend, trimmed by `filters`.
    ///
    /// Clients older than API 1.28 get attached containers in every entry.
    /// An unreachable cluster manager only removes its networks from the list.
    pub async fn list_networks(
        &self,
        cancel: &CancellationToken,
        filters: &Filters,
        api_version: Option<ApiVersion>,
    ) -> Result<Vec<NetworkResource>, NetworkError> {
        filters.validate(ACCEPTED_NETWORK_FILTERS)?;
        let detail = ViewDetail::for_list(&api_version.unwrap_or(self.default_api_version));

        let mut list = match guarded(cancel, self.cluster.list_networks()).await {
            Ok(networks) => networks,
            Err(NetworkError::Cancelled) => return Err(NetworkError::Cancelled),
            Err(e) => {
                warn!("Listing cluster networks failed, showing local networks only: {}", e);
                Vec::new()
            }
        };

        let local = guarded(cancel, async { Ok(self.local.list_networks().await) }).await?;
        for network in &local {
            if list.iter().any(|known| known.id == network.id) {
                continue;
            }
            list.push(build(Some(network), detail));
        }

        debug!("Listing {} networks before filtering", list.len());
        filter_networks(list, filters)
    }

    /// Look up a single network by ID, name or ID prefix
    pub async fn get_network(
        &self,
        cancel: &CancellationToken,
        term: &str,
        options: &InspectOptions,
    ) -> Result<NetworkResource, NetworkError> {
        self.resolver(cancel)
            .resolve(term, &options.scope, options.verbose)
            .await
    }

    /// Create a network on whichever backend has to own it.
    ///
    /// Names already used in the cluster are always rejected. Local name
    /// collisions are rejected with `check_duplicate` and reported as a
    /// warning otherwise.
    pub async fn create_network(
        &self,
        cancel: &CancellationToken,
        request: &NetworkCreateRequest,
    ) -> Result<NetworkCreateResponse, NetworkError> {
        if request.name.trim().is_empty() {
            return Err(NetworkError::invalid_parameter("network name is required"));
        }

        match guarded(cancel, self.cluster.list_networks_by_name(&request.name)).await {
            Ok(existing) if !existing.is_empty() => {
                return Err(NetworkError::Conflict(request.name.clone()));
            }
            Ok(_) => {}
            Err(NetworkError::Cancelled) => return Err(NetworkError::Cancelled),
            Err(e) => debug!("Cluster name check for {} skipped: {}", request.name, e),
        }

        let name_warning = |duplicate_name: bool| {
            if duplicate_name {
                NetworkError::Conflict(request.name.clone()).to_string()
            } else {
                String::new()
            }
        };

        match guarded(cancel, self.local.create_network(request)).await? {
            CreateOutcome::Created { id, duplicate_name } => {
                info!("Network {} created locally as {}", request.name, id);
                Ok(NetworkCreateResponse {
                    id,
                    warning: name_warning(duplicate_name),
                })
            }
            CreateOutcome::NameConflict => Err(NetworkError::Conflict(request.name.clone())),
            CreateOutcome::RedirectToCluster { duplicate_name } => {
                if duplicate_name && request.check_duplicate {
                    return Err(NetworkError::Conflict(request.name.clone()));
                }
                let id = guarded(cancel, self.cluster.create_network(request)).await?;
                info!("Network {} created in the cluster as {}", request.name, id);
                Ok(NetworkCreateResponse {
                    id,
                    warning: name_warning(duplicate_name),
                })
            }
        }
    }

    /// Attach a container. The local backend resolves `network_term` itself,
    /// since an attachable swarm network may not exist on this host yet.
    pub async fn connect_network(
        &self,
        cancel: &CancellationToken,
        network_term: &str,
        connect: &NetworkConnect,
    ) -> Result<(), NetworkError> {
        if connect.container.is_empty() {
            return Err(NetworkError::invalid_parameter("container is required"));
        }
        guarded(
            cancel,
            self.local.connect_container(
                &connect.container,
                network_term,
                connect.endpoint_config.as_ref(),
            ),
        )
        .await
    }

    pub async fn disconnect_network(
        &self,
        cancel: &CancellationToken,
        network_term: &str,
        disconnect: &NetworkDisconnect,
    ) -> Result<(), NetworkError> {
        if disconnect.container.is_empty() {
            return Err(NetworkError::invalid_parameter("container is required"));
        }
        guarded(
            cancel,
            self.local
                .disconnect_container(&disconnect.container, network_term, disconnect.force),
        )
        .await
    }

    /// Remove the unique network matching `term` from the backend owning it
    pub async fn delete_network(
        &self,
        cancel: &CancellationToken,
        term: &str,
    ) -> Result<(), NetworkError> {
        let network = self.resolver(cancel).find_unique(term).await?;

        if network.scope == SCOPE_SWARM {
            debug!("Removing cluster network {} ({})", network.name, network.id);
            guarded(cancel, self.cluster.remove_network(&network.id)).await
        } else {
            debug!("Removing local network {} ({})", network.name, network.id);
            guarded(cancel, self.local.delete_network(&network.id)).await
        }
    }

    pub async fn prune_networks(
        &self,
        cancel: &CancellationToken,
        filters: &Filters,
    ) -> Result<NetworksPruneReport, NetworkError> {
        filters.validate(ACCEPTED_PRUNE_FILTERS)?;
        let report = guarded(cancel, self.local.prune_networks(cancel, filters)).await?;
        info!("Pruned {} networks", report.networks_deleted.len());
        Ok(report)
    }
}
