//! IPAM pool reconciliation
//!
//! A network reports both the pools it was created with and the pools its
//! IPAM driver actually allocated. Configured pools win per address family.

use crate::backend::{IpamPoolConfig, IpamPoolInfo, IpamSettings};
use crate::network::{Ipam, IpamConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpFamily {
    V4,
    V6,
}

/// Merge configured and runtime pools of one address family.
///
/// Runtime pools are only consulted when no configured pool with a preferred
/// pool exists for the family. Order follows the backend's own ordering.
pub fn merge_ipam(
    configured: &[IpamPoolConfig],
    runtime: &[IpamPoolInfo],
    family: IpFamily,
) -> Vec<IpamConfig> {
    let merged: Vec<IpamConfig> = configured
        .iter()
        .filter(|pool| !pool.preferred_pool.is_empty())
        .map(|pool| IpamConfig {
            subnet: pool.preferred_pool.clone(),
            ip_range: pool.sub_pool.clone(),
            gateway: pool.gateway.clone(),
            aux_address: pool.aux_addresses.clone(),
        })
        .collect();

    if !merged.is_empty() {
        return merged;
    }

    runtime
        .iter()
        .filter_map(|info| {
            // A v6-disabled network still lists runtime entries without a pool
            let pool = info.pool?;
            let gateway = match (family, info.gateway) {
                (IpFamily::V4, Some(gw)) => gw.ip().to_string(),
                (IpFamily::V6, Some(gw)) => gw.to_string(),
                (_, None) => String::new(),
            };
            Some(IpamConfig {
                subnet: pool.to_string(),
                gateway,
                ..Default::default()
            })
        })
        .collect()
}

/// Build the IPAM section of a resource view, v4 pools first
pub fn build_ipam(settings: &IpamSettings) -> Ipam {
    let mut config = merge_ipam(&settings.ipv4_config, &settings.ipv4_info, IpFamily::V4);
    config.extend(merge_ipam(
        &settings.ipv6_config,
        &settings.ipv6_info,
        IpFamily::V6,
    ));

    Ipam {
        driver: settings.driver.clone(),
        options: settings.options.clone(),
        config,
    }
}
