//! Provider abstraction for realizing resource descriptors.
//!
//! The engine only talks to [`Provider`]. Per-kind behavior (physical id
//! prefix, reported outputs) is a table lookup keyed by [`ResourceKind`].

pub mod local;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use stackweave_common::error::{Result, StackweaveError};
use stackweave_common::types::{ResourceId, ResourceKind};
use stackweave_compose::descriptor::ResourceDescriptor;
use stackweave_compose::reference::Outputs;

/// Descriptor attributes with every reference resolved to a concrete value.
pub type ResolvedAttributes = BTreeMap<String, Value>;

/// What a realization did to the underlying resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Change {
    /// The resource did not exist and was created.
    Created,
    /// The resource existed and was updated in place.
    Updated,
    /// The resource already matched its declaration.
    Unchanged,
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Updated => write!(f, "updated"),
            Self::Unchanged => write!(f, "unchanged"),
        }
    }
}

/// Provider record of one realized resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Realization {
    /// Identifier assigned by the provider.
    pub physical_id: String,
    /// Output attributes other resources may reference.
    pub attributes: Outputs,
    /// What the call did.
    pub change: Change,
}

/// Boundary to the system that actually creates resources.
///
/// Implementations must be idempotent per logical resource id. Failures are
/// reported as [`StackweaveError::Provider`] with a retry hint; the engine
/// never retries.
pub trait Provider: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Creates or updates the resource described by `descriptor`.
    ///
    /// # Errors
    ///
    /// Returns a provider error if the resource cannot be realized.
    fn realize(
        &self,
        descriptor: &ResourceDescriptor,
        attributes: &ResolvedAttributes,
    ) -> Result<Realization>;

    /// Removes a resource. Returns `false` if it was not realized.
    ///
    /// # Errors
    ///
    /// Returns a provider error if the resource cannot be removed.
    fn destroy(&self, id: &ResourceId) -> Result<bool>;

    /// Returns the outputs of a previously realized resource.
    ///
    /// # Errors
    ///
    /// Returns a provider error if the provider state cannot be read.
    fn outputs(&self, id: &ResourceId) -> Result<Option<Outputs>>;
}

/// Inputs available when computing a kind's outputs.
#[derive(Debug, Clone, Copy)]
pub struct OutputContext<'a> {
    /// Logical identifier.
    pub id: &'a ResourceId,
    /// Identifier assigned by the provider.
    pub physical_id: &'a str,
    /// Resolved attributes of the descriptor.
    pub attributes: &'a ResolvedAttributes,
    /// Target account.
    pub account: &'a str,
    /// Target region.
    pub region: &'a str,
}

impl OutputContext<'_> {
    /// Returns a string attribute, falling back to the lowercased logical id.
    #[must_use]
    pub fn name(&self, key: &str) -> String {
        self.attributes
            .get(key)
            .and_then(Value::as_str)
            .map_or_else(|| self.id.as_str().to_ascii_lowercase(), str::to_string)
    }

    fn attribute(&self, key: &str) -> Value {
        self.attributes.get(key).cloned().unwrap_or(Value::Null)
    }

    fn suffix(&self) -> &str {
        self.physical_id
            .rsplit_once('-')
            .map_or(self.physical_id, |(_, s)| s)
    }

    fn arn(&self, service: &str, resource: &str) -> String {
        format!("arn:aws:{service}:{}:{}:{resource}", self.region, self.account)
    }
}

/// Per-kind realization behavior.
#[derive(Debug, Clone, Copy)]
pub struct KindBehavior {
    /// Kind the entry applies to.
    pub kind: ResourceKind,
    /// Prefix of generated physical identifiers.
    pub id_prefix: &'static str,
    /// Computes the outputs reported for a realized resource.
    pub outputs: fn(&OutputContext<'_>) -> Outputs,
}

static BEHAVIORS: &[KindBehavior] = &[
    KindBehavior {
        kind: ResourceKind::Repository,
        id_prefix: "ecr",
        outputs: repository_outputs,
    },
    KindBehavior {
        kind: ResourceKind::Network,
        id_prefix: "vpc",
        outputs: network_outputs,
    },
    KindBehavior {
        kind: ResourceKind::SecurityGroup,
        id_prefix: "sg",
        outputs: security_group_outputs,
    },
    KindBehavior {
        kind: ResourceKind::SecurityGroupRule,
        id_prefix: "sgr",
        outputs: security_group_rule_outputs,
    },
    KindBehavior {
        kind: ResourceKind::Cluster,
        id_prefix: "ecs",
        outputs: cluster_outputs,
    },
    KindBehavior {
        kind: ResourceKind::TaskDefinition,
        id_prefix: "td",
        outputs: task_definition_outputs,
    },
    KindBehavior {
        kind: ResourceKind::Service,
        id_prefix: "svc",
        outputs: service_outputs,
    },
    KindBehavior {
        kind: ResourceKind::LoadBalancer,
        id_prefix: "alb",
        outputs: load_balancer_outputs,
    },
    KindBehavior {
        kind: ResourceKind::Listener,
        id_prefix: "lsn",
        outputs: listener_outputs,
    },
    KindBehavior {
        kind: ResourceKind::TargetGroup,
        id_prefix: "tg",
        outputs: target_group_outputs,
    },
    KindBehavior {
        kind: ResourceKind::Database,
        id_prefix: "db",
        outputs: database_outputs,
    },
    KindBehavior {
        kind: ResourceKind::Secret,
        id_prefix: "secret",
        outputs: secret_outputs,
    },
    KindBehavior {
        kind: ResourceKind::LogSink,
        id_prefix: "log",
        outputs: log_sink_outputs,
    },
    KindBehavior {
        kind: ResourceKind::Role,
        id_prefix: "role",
        outputs: role_outputs,
    },
];

/// Looks up the behavior registered for a kind.
///
/// # Errors
///
/// Returns a non-retryable provider error for a kind with no entry.
pub fn behavior(kind: ResourceKind) -> Result<&'static KindBehavior> {
    BEHAVIORS
        .iter()
        .find(|b| b.kind == kind)
        .ok_or_else(|| StackweaveError::Provider {
            resource: kind.to_string(),
            message: format!("no behavior registered for kind {kind}"),
            retryable: false,
        })
}

fn output_map<const N: usize>(entries: [(&str, Value); N]) -> Outputs {
    entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

fn repository_outputs(ctx: &OutputContext<'_>) -> Outputs {
    let name = ctx.name("repositoryName");
    output_map([
        ("repositoryArn", json!(ctx.arn("ecr", &format!("repository/{name}")))),
        (
            "repositoryUri",
            json!(format!("{}.dkr.ecr.{}.amazonaws.com/{name}", ctx.account, ctx.region)),
        ),
        ("repositoryName", json!(name)),
    ])
}

fn network_outputs(ctx: &OutputContext<'_>) -> Outputs {
    let azs = ctx
        .attributes
        .get("maxAzs")
        .and_then(Value::as_u64)
        .unwrap_or(2);
    let subnets = |group: &str| -> Value {
        (0..azs)
            .map(|i| json!(format!("subnet-{}-{group}-{i}", ctx.suffix())))
            .collect()
    };
    output_map([
        ("vpcId", json!(ctx.physical_id)),
        ("cidrBlock", ctx.attribute("cidr")),
        ("publicSubnetIds", subnets("public")),
        ("privateSubnetIds", subnets("private")),
        ("isolatedSubnetIds", subnets("isolated")),
    ])
}

fn security_group_outputs(ctx: &OutputContext<'_>) -> Outputs {
    output_map([
        ("groupId", json!(ctx.physical_id)),
        ("vpcId", ctx.attribute("vpcId")),
    ])
}

fn security_group_rule_outputs(ctx: &OutputContext<'_>) -> Outputs {
    output_map([
        ("ruleId", json!(ctx.physical_id)),
        ("groupId", ctx.attribute("groupId")),
    ])
}

fn cluster_outputs(ctx: &OutputContext<'_>) -> Outputs {
    let name = ctx.name("clusterName");
    output_map([
        ("clusterArn", json!(ctx.arn("ecs", &format!("cluster/{name}")))),
        ("clusterName", json!(name)),
    ])
}

fn task_definition_outputs(ctx: &OutputContext<'_>) -> Outputs {
    let family = ctx.name("family");
    output_map([
        (
            "taskDefinitionArn",
            json!(ctx.arn("ecs", &format!("task-definition/{family}:1"))),
        ),
        ("family", json!(family)),
    ])
}

fn service_outputs(ctx: &OutputContext<'_>) -> Outputs {
    let name = ctx.name("serviceName");
    output_map([
        ("serviceArn", json!(ctx.arn("ecs", &format!("service/{name}")))),
        ("serviceName", json!(name)),
    ])
}

fn load_balancer_outputs(ctx: &OutputContext<'_>) -> Outputs {
    let name = ctx.name("name");
    output_map([
        (
            "loadBalancerArn",
            json!(ctx.arn(
                "elasticloadbalancing",
                &format!("loadbalancer/app/{name}/{}", ctx.suffix())
            )),
        ),
        (
            "dnsName",
            json!(format!("{name}-{}.{}.elb.amazonaws.com", ctx.suffix(), ctx.region)),
        ),
    ])
}

fn listener_outputs(ctx: &OutputContext<'_>) -> Outputs {
    output_map([(
        "listenerArn",
        json!(ctx.arn("elasticloadbalancing", &format!("listener/{}", ctx.physical_id))),
    )])
}

fn target_group_outputs(ctx: &OutputContext<'_>) -> Outputs {
    let name = ctx.name("name");
    output_map([(
        "targetGroupArn",
        json!(ctx.arn(
            "elasticloadbalancing",
            &format!("targetgroup/{name}/{}", ctx.suffix())
        )),
    )])
}

fn database_outputs(ctx: &OutputContext<'_>) -> Outputs {
    let name = ctx.name("clusterIdentifier");
    output_map([
        ("clusterArn", json!(ctx.arn("rds", &format!("cluster:{name}")))),
        (
            "endpoint",
            json!(format!("{name}.cluster-{}.{}.rds.amazonaws.com", ctx.suffix(), ctx.region)),
        ),
        ("port", ctx.attribute("port")),
    ])
}

fn secret_outputs(ctx: &OutputContext<'_>) -> Outputs {
    let name = ctx.name("name");
    output_map([(
        "secretArn",
        json!(ctx.arn("secretsmanager", &format!("secret:{name}-{}", ctx.suffix()))),
    )])
}

fn log_sink_outputs(ctx: &OutputContext<'_>) -> Outputs {
    let name = ctx.name("logGroupName");
    output_map([
        ("logGroupArn", json!(ctx.arn("logs", &format!("log-group:{name}")))),
        ("logGroupName", json!(name)),
    ])
}

fn role_outputs(ctx: &OutputContext<'_>) -> Outputs {
    let name = ctx.name("roleName");
    output_map([
        ("roleArn", json!(format!("arn:aws:iam::{}:role/{name}", ctx.account))),
        ("roleName", json!(name)),
    ])
}
