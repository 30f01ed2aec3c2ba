//! Command-line argument parsing

use crate::config::{parse_api_version, AppConfig};
use crate::error::ConfigError;
use clap::{Parser, Subcommand};

/// Command-line arguments structure
#[derive(Parser, Debug)]
#[command(name = "docker-netview")]
#[command(about = "Inspect and manage container networks across host and swarm scopes")]
#[command(version)]
pub struct CliArgs {
    /// Configuration file path
    #[arg(short, long, global = true, help = "Path to TOML configuration file")]
    pub config: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, help = "Set the logging level")]
    pub log_level: Option<String>,

    #[arg(long, global = true, help = "Path to the network state file")]
    pub state_file: Option<String>,

    #[arg(
        long,
        global = true,
        help = "API version assumed when a command does not specify one"
    )]
    pub default_api_version: Option<String>,

    #[arg(long, global = true, help = "Treat the cluster manager as unreachable")]
    pub no_cluster: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration and exit without running a command")]
    pub validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    pub print_default_config: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// List networks
    Ls {
        #[arg(short, long = "filter", help = "Filter output (e.g. 'driver=bridge')")]
        filters: Vec<String>,

        #[arg(long, help = "Render the list as seen by a client of this API version")]
        api_version: Option<String>,
    },

    /// Display detailed information on a network
    Inspect {
        network: String,

        #[arg(short, long, help = "Include swarm services and their tasks")]
        verbose: bool,

        #[arg(long, help = "Only match networks of this scope (local, swarm, global)")]
        scope: Option<String>,
    },

    /// Create a network
    Create {
        name: String,

        #[arg(short, long)]
        driver: Option<String>,

        #[arg(long)]
        scope: Option<String>,

        #[arg(long, help = "Subnet in CIDR format, may be repeated")]
        subnet: Vec<String>,

        #[arg(long, help = "Gateway for the subnet given at the same position")]
        gateway: Vec<String>,

        #[arg(long, help = "Allocate container addresses from a sub-range")]
        ip_range: Vec<String>,

        #[arg(long = "label", help = "Set metadata on the network (key=value)")]
        labels: Vec<String>,

        #[arg(short = 'o', long = "opt", help = "Set driver specific options (key=value)")]
        options: Vec<String>,

        #[arg(long)]
        internal: bool,

        #[arg(long)]
        attachable: bool,

        #[arg(long)]
        ingress: bool,

        #[arg(long)]
        ipv6: bool,

        #[arg(long, help = "Fail instead of warning when the name is already in use")]
        check_duplicate: bool,
    },

    /// Connect a container to a network
    Connect {
        network: String,
        container: String,

        #[arg(long = "alias")]
        aliases: Vec<String>,

        #[arg(long)]
        ip: Option<String>,

        #[arg(long)]
        ip6: Option<String>,
    },

    /// Disconnect a container from a network
    Disconnect {
        network: String,
        container: String,

        #[arg(short, long)]
        force: bool,
    },

    /// Remove one or more networks
    Rm {
        #[arg(required = true)]
        networks: Vec<String>,
    },

    /// Remove all unused local networks
    Prune {
        #[arg(long = "filter", help = "Provide filter values (e.g. 'label=<key>=<value>')")]
        filters: Vec<String>,
    },
}

impl Command {
    /// Whether running the command can change the stored networks
    pub fn mutates(&self) -> bool {
        !matches!(self, Command::Ls { .. } | Command::Inspect { .. })
    }
}

impl CliArgs {
    /// Apply CLI arguments over base configuration
    pub fn apply_to_config(&self, mut base_config: AppConfig) -> Result<AppConfig, ConfigError> {
        if let Some(ref level) = self.log_level {
            base_config.log_level = level.clone();
        }

        if let Some(ref state_file) = self.state_file {
            base_config.state_file = state_file.clone();
        }

        if let Some(ref version) = self.default_api_version {
            base_config.default_api_version = parse_api_version(version)?;
        }

        if self.no_cluster {
            base_config.cluster_enabled = false;
        }

        Ok(base_config)
    }
}
