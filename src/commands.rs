//! Execution of CLI subcommands against a state file

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::memory::{MemoryClusterBackend, MemoryLocalBackend, NetworkState};
use crate::backend::{ClusterBackend, LocalBackend};
use crate::config::cli::Command;
use crate::config::AppConfig;
use crate::error::{AppError, NetworkError};
use crate::network::filter::Filters;
use crate::network::request::InspectOptions;
use crate::network::service::NetworkService;
use crate::network::version::ApiVersion;
use crate::network::{
    EndpointIpamConfig, EndpointSettings, Ipam, IpamConfig, NetworkConnect, NetworkCreateRequest,
    NetworkDisconnect,
};

/// Run `command` over the configured state file and print its result as JSON.
///
/// Mutating commands write the state back, also when they fail part way.
pub async fn run(
    command: &Command,
    config: &AppConfig,
    cancel: &CancellationToken,
) -> Result<(), AppError> {
    let path = Path::new(&config.state_file);
    let state = load_state(path)?;
    let stored_cluster = state.cluster.clone();

    let cluster = if config.cluster_enabled {
        MemoryClusterBackend::new(state.cluster)
    } else {
        MemoryClusterBackend::unavailable()
    };
    let service = NetworkService::new(
        Arc::new(MemoryLocalBackend::new(state.local)),
        Arc::new(cluster),
    )
    .with_default_api_version(config.default_api_version);

    let result = execute(&service, command, cancel).await;

    if command.mutates() {
        let cluster = if config.cluster_enabled {
            service.cluster().snapshot().await
        } else {
            stored_cluster
        };
        let state = NetworkState {
            local: service.local().snapshot().await,
            cluster,
        };
        state.save(path)?;
        debug!("Saved network state to {}", path.display());
    }

    if let Some(output) = result? {
        println!("{}", serde_json::to_string_pretty(&output)?);
    }
    Ok(())
}

fn load_state(path: &Path) -> Result<NetworkState, AppError> {
    if !path.exists() {
        info!("State file {} does not exist, starting empty", path.display());
        return Ok(NetworkState::default());
    }
    Ok(NetworkState::load(path)?)
}

/// Run one command against `service`, returning what should be printed
pub async fn execute<L, C>(
    service: &NetworkService<L, C>,
    command: &Command,
    cancel: &CancellationToken,
) -> Result<Option<Value>, AppError>
where
    L: LocalBackend,
    C: ClusterBackend,
{
    let output = match command {
        Command::Ls {
            filters,
            api_version,
        } => {
            let filters = Filters::from_args(filters)?;
            let version = api_version
                .as_deref()
                .map(str::parse::<ApiVersion>)
                .transpose()?;
            let networks = service.list_networks(cancel, &filters, version).await?;
            Some(serde_json::to_value(networks)?)
        }
        Command::Inspect {
            network,
            verbose,
            scope,
        } => {
            let options = InspectOptions::new(*verbose, scope.as_deref())?;
            let resource = service.get_network(cancel, network, &options).await?;
            Some(serde_json::to_value(resource)?)
        }
        Command::Create { .. } => {
            let request = create_request(command)?;
            let response = service.create_network(cancel, &request).await?;
            if !response.warning.is_empty() {
                warn!("{}", response.warning);
            }
            Some(serde_json::to_value(response)?)
        }
        Command::Connect {
            network,
            container,
            aliases,
            ip,
            ip6,
        } => {
            let ipam_config = (ip.is_some() || ip6.is_some()).then(|| EndpointIpamConfig {
                ipv4_address: ip.clone().unwrap_or_default(),
                ipv6_address: ip6.clone().unwrap_or_default(),
            });
            let connect = NetworkConnect {
                container: container.clone(),
                endpoint_config: Some(EndpointSettings {
                    aliases: aliases.clone(),
                    ipam_config,
                    ..Default::default()
                }),
            };
            service.connect_network(cancel, network, &connect).await?;
            None
        }
        Command::Disconnect {
            network,
            container,
            force,
        } => {
            let disconnect = NetworkDisconnect {
                container: container.clone(),
                force: *force,
            };
            service.disconnect_network(cancel, network, &disconnect).await?;
            None
        }
        Command::Rm { networks } => {
            let mut removed = Vec::new();
            let mut first_error = None;
            for network in networks {
                match service.delete_network(cancel, network).await {
                    Ok(()) => removed.push(network.clone()),
                    Err(NetworkError::Cancelled) => return Err(NetworkError::Cancelled.into()),
                    Err(e) => {
                        warn!("Failed to remove network {}: {}", network, e);
                        first_error.get_or_insert(e);
                    }
                }
            }
            if let Some(e) = first_error {
                return Err(e.into());
            }
            Some(serde_json::to_value(removed)?)
        }
        Command::Prune { filters } => {
            let filters = Filters::from_args(filters)?;
            let report = service.prune_networks(cancel, &filters).await?;
            Some(serde_json::to_value(report)?)
        }
    };

    Ok(output)
}

fn create_request(command: &Command) -> Result<NetworkCreateRequest, NetworkError> {
    let Command::Create {
        name,
        driver,
        scope,
        subnet,
        gateway,
        ip_range,
        labels,
        options,
        internal,
        attachable,
        ingress,
        ipv6,
        check_duplicate,
    } = command
    else {
        return Err(NetworkError::invalid_parameter("not a create command"));
    };

    if gateway.len() > subnet.len() || ip_range.len() > subnet.len() {
        return Err(NetworkError::invalid_parameter(
            "every gateway and ip-range must be paired with a subnet",
        ));
    }

    let ipam = (!subnet.is_empty()).then(|| Ipam {
        config: subnet
            .iter()
            .enumerate()
            .map(|(i, subnet)| IpamConfig {
                subnet: subnet.clone(),
                gateway: gateway.get(i).cloned().unwrap_or_default(),
                ip_range: ip_range.get(i).cloned().unwrap_or_default(),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    });

    Ok(NetworkCreateRequest {
        name: name.clone(),
        check_duplicate: *check_duplicate,
        driver: driver.clone().unwrap_or_default(),
        scope: scope.clone().unwrap_or_default(),
        enable_ipv6: *ipv6,
        ipam,
        internal: *internal,
        attachable: *attachable,
        ingress: *ingress,
        options: parse_key_values(options),
        labels: parse_key_values(labels),
        ..Default::default()
    })
}

/// `key=value` pairs; a bare key maps to an empty value
fn parse_key_values(pairs: &[String]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => (key.to_string(), value.to_string()),
            None => (pair.clone(), String::new()),
        })
        .collect()
}
