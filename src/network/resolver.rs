//! Cross-backend network identity resolution
//!
//! A term may be a full network ID, a full name or an ID prefix. Local and
//! cluster networks are scanned into a [`CandidateSet`]; full IDs return at
//! once while name and prefix matches are only accepted when unique.

use std::collections::HashMap;
use std::future::Future;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::backend::{ClusterBackend, ClusterNetwork, LocalBackend, Network, SCOPE_SWARM};
use crate::error::{ErrorKind, MatchBasis, NetworkError};
use crate::network::builder::{build, ViewDetail};
use crate::network::NetworkResource;

/// Await a backend call unless `cancel` fires first.
///
/// Nothing is started once the token is cancelled.
pub(crate) async fn guarded<T, F>(cancel: &CancellationToken, call: F) -> Result<T, NetworkError>
where
    F: Future<Output = Result<T, NetworkError>>,
{
    if cancel.is_cancelled() {
        return Err(NetworkError::Cancelled);
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(NetworkError::Cancelled),
        result = call => result,
    }
}

/// Scope constraint: an empty requested scope matches everything
fn scope_matches(network_scope: &str, requested: &str) -> bool {
    requested.is_empty() || network_scope == requested
}

/// Name and ID-prefix matches keyed by network ID.
///
/// Local entries always replace what is stored; cluster entries are only
/// added for IDs not seen yet, so a network visible in both scopes keeps its
/// local view.
#[derive(Debug, Default)]
pub(crate) struct CandidateSet {
    by_full_name: HashMap<String, NetworkResource>,
    by_id_prefix: HashMap<String, NetworkResource>,
}

impl CandidateSet {
    pub(crate) fn insert_local(&mut self, basis: MatchBasis, view: NetworkResource) {
        self.map_mut(basis).insert(view.id.clone(), view);
    }

    pub(crate) fn insert_cluster(&mut self, basis: MatchBasis, view: NetworkResource) {
        self.map_mut(basis).entry(view.id.clone()).or_insert(view);
    }

    /// Local-or-merged entry for `id`, prefix matches first
    pub(crate) fn take(&mut self, id: &str) -> Option<NetworkResource> {
        self.by_id_prefix
            .remove(id)
            .or_else(|| self.by_full_name.remove(id))
    }

    #[cfg(test)]
    pub(crate) fn len(&self, basis: MatchBasis) -> usize {
        match basis {
            MatchBasis::Name => self.by_full_name.len(),
            MatchBasis::IdPrefix => self.by_id_prefix.len(),
        }
    }

    /// Unique name match, else unique prefix match.
    ///
    /// `Ok(None)` means nothing matched at all.
    pub(crate) fn into_unique(self, term: &str) -> Result<Option<NetworkResource>, NetworkError> {
        let CandidateSet {
            by_full_name,
            by_id_prefix,
        } = self;

        for (basis, candidates) in [
            (MatchBasis::Name, by_full_name),
            (MatchBasis::IdPrefix, by_id_prefix),
        ] {
            match candidates.len() {
                0 => continue,
                1 => return Ok(candidates.into_values().next()),
                count => {
                    return Err(NetworkError::Ambiguous {
                        term: term.to_string(),
                        count,
                        basis,
                    })
                }
            }
        }

        Ok(None)
    }

    fn map_mut(&mut self, basis: MatchBasis) -> &mut HashMap<String, NetworkResource> {
        match basis {
            MatchBasis::Name => &mut self.by_full_name,
            MatchBasis::IdPrefix => &mut self.by_id_prefix,
        }
    }
}

/// Outcome of scanning one backend's list
enum Scan {
    FullId(NetworkResource),
    Collected,
}

/// Resolves user-supplied network identifiers across both backends
pub struct Resolver<'a, L, C> {
    local: &'a L,
    cluster: &'a C,
    cancel: &'a CancellationToken,
}

impl<'a, L, C> Resolver<'a, L, C>
where
    L: LocalBackend,
    C: ClusterBackend,
{
    pub fn new(local: &'a L, cluster: &'a C, cancel: &'a CancellationToken) -> Self {
        Self {
            local,
            cluster,
            cancel,
        }
    }

    /// Resolve `term` for an inspect-style lookup.
    ///
    /// `scope` narrows the candidates when non-empty; `verbose` adds swarm
    /// services to local views.
    pub async fn resolve(
        &self,
        term: &str,
        scope: &str,
        verbose: bool,
    ) -> Result<NetworkResource, NetworkError> {
        debug!("Resolving network '{}' (scope '{}')", term, scope);
        let detail = ViewDetail::for_inspect(verbose);
        let mut candidates = CandidateSet::default();

        let local = guarded(self.cancel, async { Ok(self.local.list_networks().await) }).await?;
        if let Scan::FullId(view) = scan_local(&local, term, detail, &mut candidates, |nw| {
            scope_matches(&nw.scope, scope)
        }) {
            return Ok(view);
        }

        let mut lead_error = None;
        match guarded(self.cancel, self.cluster.get_network(term)).await {
            Ok(cluster_view) => {
                if cluster_view.id.starts_with(term) || scope == SCOPE_SWARM {
                    debug!("Network '{}' found by cluster lookup", term);
                    return Ok(candidates.take(&cluster_view.id).unwrap_or(cluster_view));
                }
            }
            Err(e) if e.kind() == ErrorKind::Cancelled => return Err(e),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                debug!("Cluster lookup of '{}' failed: {}", term, e);
                lead_error = Some(e);
            }
        }

        let cluster = self.cluster_networks().await?;
        if let Scan::FullId(view) = scan_cluster(cluster, term, &mut candidates, |nw| {
            scope_matches(&nw.scope, scope)
        }) {
            return Ok(view);
        }

        match candidates.into_unique(term)? {
            Some(view) => Ok(view),
            None => Err(lead_error.unwrap_or_else(|| NetworkError::NotFound(term.to_string()))),
        }
    }

    /// Resolve `term` to exactly one network before a destructive operation.
    ///
    /// Ingress networks cannot be selected by name.
    pub async fn find_unique(&self, term: &str) -> Result<NetworkResource, NetworkError> {
        debug!("Looking up unique network '{}'", term);
        let mut candidates = CandidateSet::default();

        let local = guarded(self.cancel, async { Ok(self.local.list_networks().await) }).await?;
        if let Scan::FullId(view) = scan_local_unique(&local, term, &mut candidates) {
            return Ok(view);
        }

        let cluster = self.cluster_networks().await?;
        if let Scan::FullId(view) = scan_cluster(cluster, term, &mut candidates, |_| true) {
            return Ok(view);
        }

        candidates
            .into_unique(term)?
            .ok_or_else(|| NetworkError::NotFound(term.to_string()))
    }

    /// Cluster list; an unreachable cluster contributes nothing
    async fn cluster_networks(&self) -> Result<Vec<ClusterNetwork>, NetworkError> {
        match guarded(self.cancel, self.cluster.list_networks()).await {
            Ok(networks) => Ok(networks),
            Err(NetworkError::Cancelled) => Err(NetworkError::Cancelled),
            Err(e) => {
                debug!("Ignoring cluster network list failure: {}", e);
                Ok(Vec::new())
            }
        }
    }
}

fn scan_local<F>(
    networks: &[Network],
    term: &str,
    detail: ViewDetail,
    candidates: &mut CandidateSet,
    in_scope: F,
) -> Scan
where
    F: Fn(&Network) -> bool,
{
    for nw in networks.iter().filter(|nw| in_scope(*nw)) {
        if nw.id == term {
            return Scan::FullId(build(Some(nw), detail));
        }
        if nw.name == term {
            candidates.insert_local(MatchBasis::Name, build(Some(nw), detail));
        }
        if nw.id.starts_with(term) {
            candidates.insert_local(MatchBasis::IdPrefix, build(Some(nw), detail));
        }
    }
    Scan::Collected
}

fn scan_local_unique(networks: &[Network], term: &str, candidates: &mut CandidateSet) -> Scan {
    for nw in networks {
        if nw.id == term {
            return Scan::FullId(build(Some(nw), ViewDetail::Detailed));
        }
        if nw.name == term && !nw.ingress {
            candidates.insert_local(MatchBasis::Name, build(Some(nw), ViewDetail::Detailed));
        }
        if nw.id.starts_with(term) {
            candidates.insert_local(MatchBasis::IdPrefix, build(Some(nw), ViewDetail::Detailed));
        }
    }
    Scan::Collected
}

fn scan_cluster<F>(
    networks: Vec<ClusterNetwork>,
    term: &str,
    candidates: &mut CandidateSet,
    in_scope: F,
) -> Scan
where
    F: Fn(&ClusterNetwork) -> bool,
{
    for nw in networks.into_iter().filter(|nw| in_scope(nw)) {
        if nw.id == term {
            return Scan::FullId(nw);
        }
        if nw.id.starts_with(term) {
            candidates.insert_cluster(MatchBasis::IdPrefix, nw.clone());
        }
        if nw.name == term {
            candidates.insert_cluster(MatchBasis::Name, nw);
        }
    }
    Scan::Collected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::{MemoryClusterBackend, MemoryLocalBackend};
    use crate::backend::{Endpoint, EndpointInfo, Sandbox, ServiceRecord, SCOPE_LOCAL};

    fn local_network(id: &str, name: &str) -> Network {
        Network {
            id: id.to_string(),
            name: name.to_string(),
            driver: "bridge".to_string(),
            scope: SCOPE_LOCAL.to_string(),
            ..Default::default()
        }
    }

    fn cluster_network(id: &str, name: &str) -> ClusterNetwork {
        ClusterNetwork {
            id: id.to_string(),
            name: name.to_string(),
            driver: "overlay".to_string(),
            scope: SCOPE_SWARM.to_string(),
            ..Default::default()
        }
    }

    fn backends(
        local: Vec<Network>,
        cluster: Vec<ClusterNetwork>,
    ) -> (MemoryLocalBackend, MemoryClusterBackend) {
        (
            MemoryLocalBackend::new(local),
            MemoryClusterBackend::new(cluster),
        )
    }

    #[test]
    fn test_candidate_set_local_wins() {
        let mut set = CandidateSet::default();
        let mut local = cluster_network("id1", "shared");
        local.scope = SCOPE_LOCAL.to_string();

        set.insert_local(MatchBasis::Name, local);
        set.insert_cluster(MatchBasis::Name, cluster_network("id1", "shared"));
        set.insert_cluster(MatchBasis::Name, cluster_network("id1", "shared"));

        assert_eq!(set.len(MatchBasis::Name), 1);
        let view = set.into_unique("shared").unwrap().unwrap();
        assert_eq!(view.scope, SCOPE_LOCAL);
    }

    #[test]
    fn test_candidate_set_prefers_names_over_prefixes() {
        let mut set = CandidateSet::default();
        set.insert_local(MatchBasis::IdPrefix, cluster_network("ab1", "x"));
        set.insert_local(MatchBasis::IdPrefix, cluster_network("ab2", "y"));
        set.insert_local(MatchBasis::Name, cluster_network("zz9", "ab"));

        let view = set.into_unique("ab").unwrap().unwrap();
        assert_eq!(view.id, "zz9");
    }

    #[tokio::test]
    async fn test_full_id_never_ambiguous() {
        let (local, cluster) = backends(
            vec![local_network("abc123", "web"), local_network("abc1234", "abc123")],
            vec![cluster_network("abc123999", "abc123")],
        );
        let cancel = CancellationToken::new();
        let resolver = Resolver::new(&local, &cluster, &cancel);

        let view = resolver.resolve("abc123", "", false).await.unwrap();
        assert_eq!(view.name, "web");

        let view = resolver.find_unique("abc123").await.unwrap();
        assert_eq!(view.name, "web");
    }

    #[tokio::test]
    async fn test_ambiguous_name_across_scopes() {
        let (local, cluster) = backends(
            vec![local_network("abc123", "web")],
            vec![cluster_network("xyz789", "web")],
        );
        let cancel = CancellationToken::new();
        let resolver = Resolver::new(&local, &cluster, &cancel);

        let err = resolver.resolve("web", "", false).await.unwrap_err();
        assert_eq!(
            err,
            NetworkError::Ambiguous {
                term: "web".to_string(),
                count: 2,
                basis: MatchBasis::Name,
            }
        );

        let view = resolver.resolve("web", SCOPE_SWARM, false).await.unwrap();
        assert_eq!(view.id, "xyz789");

        let view = resolver.resolve("web", SCOPE_LOCAL, false).await.unwrap();
        assert_eq!(view.id, "abc123");
    }

    #[tokio::test]
    async fn test_single_name_match() {
        let (local, cluster) = backends(
            vec![local_network("abc123", "web"), local_network("def456", "db")],
            vec![],
        );
        let cancel = CancellationToken::new();
        let resolver = Resolver::new(&local, &cluster, &cancel);

        let view = resolver.resolve("db", "", false).await.unwrap();
        assert_eq!(view.id, "def456");
    }

    #[tokio::test]
    async fn test_ambiguous_prefix() {
        let (local, cluster) = backends(
            vec![local_network("abc123", "web"), local_network("abd999", "db")],
            vec![],
        );
        let cancel = CancellationToken::new();
        let resolver = Resolver::new(&local, &cluster, &cancel);

        let err = resolver.resolve("ab", "", false).await.unwrap_err();
        assert_eq!(
            err,
            NetworkError::Ambiguous {
                term: "ab".to_string(),
                count: 2,
                basis: MatchBasis::IdPrefix,
            }
        );

        let view = resolver.resolve("abd", "", false).await.unwrap();
        assert_eq!(view.name, "db");
    }

    #[tokio::test]
    async fn test_cluster_prefix_hit_returned_directly() {
        let (local, cluster) = backends(
            vec![local_network("abc123", "web")],
            vec![cluster_network("abd999", "db")],
        );
        let cancel = CancellationToken::new();
        let resolver = Resolver::new(&local, &cluster, &cancel);

        let view = resolver.resolve("abd", "", false).await.unwrap();
        assert_eq!(view.id, "abd999");
        assert_eq!(view.scope, SCOPE_SWARM);
    }

    #[tokio::test]
    async fn test_network_in_both_scopes_keeps_local_detail() {
        let mut local_nw = local_network("ovl123", "overlay-net");
        local_nw.scope = SCOPE_SWARM.to_string();
        local_nw.driver = "overlay".to_string();
        local_nw.endpoints.push(Endpoint {
            id: "ep1".to_string(),
            name: "task".to_string(),
            info: Some(EndpointInfo {
                sandbox: Some(Sandbox {
                    container_id: "c1".to_string(),
                }),
                iface: None,
            }),
        });
        let (local, cluster) = backends(
            vec![local_nw],
            vec![cluster_network("ovl123", "overlay-net")],
        );
        let cancel = CancellationToken::new();
        let resolver = Resolver::new(&local, &cluster, &cancel);

        let by_name = resolver.resolve("overlay-net", "", false).await.unwrap();
        assert!(by_name.containers.contains_key("c1"));

        let by_prefix = resolver.resolve("ovl", "", false).await.unwrap();
        assert!(by_prefix.containers.contains_key("c1"));

        let by_swarm_name = resolver.resolve("overlay-net", SCOPE_SWARM, false).await.unwrap();
        assert!(by_swarm_name.containers.contains_key("c1"));
    }

    #[tokio::test]
    async fn test_verbose_adds_services() {
        let mut nw = local_network("abc123", "web");
        nw.services.insert(
            "api".to_string(),
            ServiceRecord {
                vip: "10.0.0.5".to_string(),
                ..Default::default()
            },
        );
        let (local, cluster) = backends(vec![nw], vec![]);
        let cancel = CancellationToken::new();
        let resolver = Resolver::new(&local, &cluster, &cancel);

        let plain = resolver.resolve("web", "", false).await.unwrap();
        assert!(plain.services.is_empty());
        let verbose = resolver.resolve("web", "", true).await.unwrap();
        assert_eq!(verbose.services["api"].vip, "10.0.0.5");
    }

    #[tokio::test]
    async fn test_not_found() {
        let (local, cluster) = backends(vec![local_network("abc123", "web")], vec![]);
        let cancel = CancellationToken::new();
        let resolver = Resolver::new(&local, &cluster, &cancel);

        let err = resolver.resolve("nothing", "", false).await.unwrap_err();
        assert_eq!(err, NetworkError::NotFound("nothing".to_string()));

        let err = resolver.find_unique("nothing").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_cluster_error_surfaces_when_only_lead() {
        let local = MemoryLocalBackend::new(vec![local_network("abc123", "web")]);
        let cluster = MemoryClusterBackend::unavailable();
        let cancel = CancellationToken::new();
        let resolver = Resolver::new(&local, &cluster, &cancel);

        let err = resolver.resolve("elsewhere", "", false).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Upstream);

        // local matches are still served while the cluster is down
        let view = resolver.resolve("web", "", false).await.unwrap();
        assert_eq!(view.id, "abc123");
    }

    #[tokio::test]
    async fn test_find_unique_ignores_ingress_names() {
        let mut ingress = local_network("ing111", "ingress");
        ingress.ingress = true;
        ingress.scope = SCOPE_SWARM.to_string();
        let (local, cluster) = backends(vec![ingress], vec![]);
        let cancel = CancellationToken::new();
        let resolver = Resolver::new(&local, &cluster, &cancel);

        let err = resolver.find_unique("ingress").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let view = resolver.find_unique("ing").await.unwrap();
        assert_eq!(view.id, "ing111");

        // the inspect path still matches ingress by name
        let view = resolver.resolve("ingress", "", false).await.unwrap();
        assert_eq!(view.id, "ing111");
    }

    #[tokio::test]
    async fn test_cancelled_before_any_backend_call() {
        let (local, cluster) = backends(vec![local_network("abc123", "web")], vec![]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let resolver = Resolver::new(&local, &cluster, &cancel);

        let err = resolver.resolve("abc123", "", false).await.unwrap_err();
        assert_eq!(err, NetworkError::Cancelled);
        assert_eq!(local.list_calls(), 0);
    }
}
