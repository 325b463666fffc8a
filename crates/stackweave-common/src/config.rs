//! Topology configuration model.
//!
//! Every section is defaulted so a configuration file only needs to name
//! what differs from the reference deployment.

use std::net::Ipv4Addr;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{Result, StackweaveError};

/// Root configuration for a topology synthesis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackweaveConfig {
    /// Project name, used as a prefix for physical resource names.
    pub project: String,
    /// Image registry settings.
    pub registry: RegistryConfig,
    /// Image version deployed by the application service.
    pub image_tag: String,
    /// Application service sizing.
    pub service: ServiceConfig,
    /// Network address ranges and zone layout.
    pub network: NetworkConfig,
    /// Managed database settings.
    pub database: DatabaseConfig,
    /// Logging and observability sidecar settings.
    pub observability: ObservabilityConfig,
    /// Target account and region.
    pub provider: ProviderConfig,
}

/// Image registry settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Name of the shared image repository.
    pub repository_name: String,
    /// Whether pushed tags may be overwritten.
    pub mutable_tags: bool,
}

/// Application service sizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// CPU units for the whole task (1024 = one vCPU).
    pub cpu: u32,
    /// Memory for the whole task in MiB.
    pub memory_mib: u32,
    /// Number of task replicas.
    pub desired_count: u32,
    /// Port the application container listens on.
    pub container_port: u16,
    /// Port the public load balancer listens on.
    pub listener_port: u16,
    /// HTTP path probed by the load balancer.
    pub health_check_path: String,
}

/// Network address ranges and zone layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// IPv4 CIDR block of the network.
    pub cidr: String,
    /// Number of availability zones to span.
    pub max_azs: u8,
    /// Number of NAT gateways for private subnet egress.
    pub nat_gateways: u8,
}

/// Managed database settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database engine identifier.
    pub engine: String,
    /// Instance class of the writer.
    pub instance_class: String,
    /// Name of the default database.
    pub database_name: String,
    /// Port the database listens on.
    pub port: u16,
    /// Master user name stored in the generated credentials.
    pub username: String,
}

/// Logging and observability sidecar settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Whether cluster-level container insights are enabled.
    pub container_insights: bool,
    /// Whether container insights use the enhanced observability mode.
    pub enhanced_insights: bool,
    /// Image of the telemetry collector sidecar; `None` disables it.
    pub sidecar_image: Option<String>,
    /// Retention of the log sink in days.
    pub log_retention_days: u32,
}

/// Target account and region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Account identifier used in generated ARNs.
    pub account: String,
    /// Region used in generated ARNs and endpoints.
    pub region: String,
}

impl Default for StackweaveConfig {
    fn default() -> Self {
        Self {
            project: "app".into(),
            registry: RegistryConfig::default(),
            image_tag: constants::DEFAULT_IMAGE_TAG.into(),
            service: ServiceConfig::default(),
            network: NetworkConfig::default(),
            database: DatabaseConfig::default(),
            observability: ObservabilityConfig::default(),
            provider: ProviderConfig::default(),
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            repository_name: "app".into(),
            mutable_tags: false,
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            cpu: 512,
            memory_mib: 1024,
            desired_count: 2,
            container_port: constants::DEFAULT_CONTAINER_PORT,
            listener_port: constants::DEFAULT_LISTENER_PORT,
            health_check_path: "/actuator/health".into(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            cidr: "10.0.0.0/16".into(),
            max_azs: 2,
            nat_gateways: 1,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            engine: "aurora-postgresql".into(),
            instance_class: "db.t4g.medium".into(),
            database_name: "app".into(),
            port: constants::DEFAULT_DATABASE_PORT,
            username: "app_admin".into(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            container_insights: true,
            enhanced_insights: true,
            sidecar_image: Some("public.ecr.aws/aws-observability/aws-otel-collector:latest".into()),
            log_retention_days: 30,
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            account: "000000000000".into(),
            region: "us-east-1".into(),
        }
    }
}

impl StackweaveConfig {
    /// Loads and validates a YAML configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or fails
    /// validation.
    pub fn load(path: &Path) -> Result<Self> {
        tracing::info!(path = %path.display(), "loading topology configuration");
        let content = std::fs::read_to_string(path).map_err(|e| StackweaveError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_yaml(&content)
    }

    /// Parses and validates configuration from YAML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid YAML or fails validation.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = if content.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(content)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Returns a copy with the image tag replaced.
    #[must_use]
    pub fn with_image_tag(mut self, tag: impl Into<String>) -> Self {
        self.image_tag = tag.into();
        self
    }

    /// Checks cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns `StackweaveError::Config` naming the first invalid value.
    pub fn validate(&self) -> Result<()> {
        require_non_empty("project", &self.project)?;
        require_non_empty("registry.repository_name", &self.registry.repository_name)?;
        require_non_empty("image_tag", &self.image_tag)?;
        require_non_empty("database.database_name", &self.database.database_name)?;
        require_non_empty("database.username", &self.database.username)?;

        if self.service.cpu == 0 || self.service.memory_mib == 0 {
            return Err(config_err("service cpu and memory_mib must be positive"));
        }
        if self.service.container_port == 0 || self.service.listener_port == 0 {
            return Err(config_err("service ports must be non-zero"));
        }
        if self.network.max_azs == 0 {
            return Err(config_err("network.max_azs must be at least 1"));
        }
        if self.network.nat_gateways > self.network.max_azs {
            return Err(config_err(format!(
                "network.nat_gateways ({}) exceeds network.max_azs ({})",
                self.network.nat_gateways, self.network.max_azs
            )));
        }
        let _ = parse_cidr(&self.network.cidr)?;
        Ok(())
    }
}

/// Parses an IPv4 CIDR block into its base address and prefix length.
///
/// # Errors
///
/// Returns `StackweaveError::Config` if the block is malformed.
pub fn parse_cidr(cidr: &str) -> Result<(Ipv4Addr, u8)> {
    let (addr, prefix) = cidr
        .split_once('/')
        .ok_or_else(|| config_err(format!("CIDR block \"{cidr}\" has no prefix length")))?;
    let addr: Ipv4Addr = addr
        .parse()
        .map_err(|_| config_err(format!("CIDR block \"{cidr}\" has an invalid address")))?;
    let prefix: u8 = prefix
        .parse()
        .ok()
        .filter(|p| *p <= 32)
        .ok_or_else(|| config_err(format!("CIDR block \"{cidr}\" has an invalid prefix")))?;
    Ok((addr, prefix))
}

fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(config_err(format!("{field} must not be empty")));
    }
    Ok(())
}

fn config_err(message: impl Into<String>) -> StackweaveError {
    StackweaveError::Config {
        message: message.into(),
    }
}
