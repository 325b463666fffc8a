//! System-wide constants and default values.

/// Application name used in CLI output and tags.
pub const APP_NAME: &str = "stackweave";

/// Binary name for the CLI.
pub const BIN_NAME: &str = "swv";

/// Default topology configuration file.
pub const DEFAULT_CONFIG_FILE: &str = "stackweave.yaml";

/// Default state index written by the local provider.
pub const DEFAULT_STATE_FILE: &str = ".stackweave/state.json";

/// SHA-256 digest length in hex characters.
pub const SHA256_HEX_LENGTH: usize = 64;

/// CIDR block that matches every IPv4 source.
pub const ANY_IPV4: &str = "0.0.0.0/0";

/// Tag key recording the owning stack of a resource.
pub const TAG_STACK: &str = "stackweave:stack";

/// Tag key recording the network tier of a resource.
pub const TAG_TIER: &str = "stackweave:tier";

/// Tag key marking a resource as managed by this tool.
pub const TAG_MANAGED_BY: &str = "stackweave:managed-by";

/// Tag key marking a tier as reachable from the internet.
pub const TAG_PUBLIC_FACING: &str = "stackweave:public-facing";

/// Separator between a repository URI and an image tag.
pub const IMAGE_TAG_SEPARATOR: &str = ":";

/// Name of the stack holding the image repository.
pub const REGISTRY_STACK: &str = "registry";

/// Name of the stack holding network, compute, and data resources.
pub const APPLICATION_STACK: &str = "application";

/// Export carrying the repository URI from the registry stack.
pub const REPOSITORY_URI_EXPORT: &str = "repositoryUri";

/// Default image tag when none is configured.
pub const DEFAULT_IMAGE_TAG: &str = "latest";

/// Default listener port of the public load balancer.
pub const DEFAULT_LISTENER_PORT: u16 = 80;

/// Default port the application container listens on.
pub const DEFAULT_CONTAINER_PORT: u16 = 8080;

/// Default PostgreSQL port.
pub const DEFAULT_DATABASE_PORT: u16 = 5432;
