//! The reference two-stack topology.
//!
//! A registry stack owns the image repository and exports its URI. An
//! application stack imports that URI and declares the network, cluster,
//! database, load balancer, and container service around it.

use stackweave_common::config::StackweaveConfig;
use stackweave_common::constants;
use stackweave_common::error::Result;
use stackweave_common::types::ResourceKind;
use stackweave_compose::composer::Composer;
use stackweave_compose::descriptor::{AttributeValue, DescriptorBuilder};
use stackweave_compose::network::{Segmentation, Tier, segment};
use stackweave_compose::reference::Reference;
use stackweave_compose::secret::{SECRET_ARN_ATTRIBUTE, SecretFanout};
use stackweave_compose::stack::{Stack, StackBuilder};

use crate::builder::ContainerBuilder;

/// Logical id of the image repository.
pub const REPOSITORY: &str = "AppRepository";
/// Logical id of the network.
pub const NETWORK: &str = "Vpc";
/// Logical id of the container cluster.
pub const CLUSTER: &str = "Cluster";
/// Logical id of the task execution role.
pub const EXECUTION_ROLE: &str = "ExecutionRole";
/// Logical id of the application log sink.
pub const LOG_SINK: &str = "AppLogs";
/// Logical id of the database credentials secret.
pub const DB_SECRET: &str = "DbSecret";
/// Logical id of the database cluster.
pub const DATABASE: &str = "Database";
/// Logical id of the public load balancer.
pub const LOAD_BALANCER: &str = "LoadBalancer";
/// Logical id of the target group.
pub const TARGET_GROUP: &str = "TargetGroup";
/// Logical id of the listener.
pub const LISTENER: &str = "Listener";
/// Logical id of the task definition.
pub const TASK_DEFINITION: &str = "TaskDefinition";
/// Logical id of the service.
pub const SERVICE: &str = "Service";

/// Name of the application container.
pub const APP_CONTAINER: &str = "app";
/// Name of the telemetry sidecar container.
pub const SIDECAR_CONTAINER: &str = "otel-collector";

/// Tier receiving internet traffic.
pub const EDGE_TIER: &str = "edge";
/// Tier running the application service.
pub const APP_TIER: &str = "application";
/// Tier running the database.
pub const DATA_TIER: &str = "database";

/// Fields exposed by the database credentials secret.
pub const DB_SECRET_FIELDS: [&str; 5] = ["username", "password", "host", "port", "dbname"];

const DB_BINDINGS: [(&str, &str); 4] = [
    ("username", "DB_USER"),
    ("password", "DB_PASSWORD"),
    ("host", "DB_HOST"),
    ("dbname", "DB_NAME"),
];

const OTLP_ENDPOINT: &str = "http://localhost:4317";

/// CPU units reserved for the telemetry sidecar.
pub const SIDECAR_CPU_UNITS: u32 = 128;
/// Memory limit of the telemetry sidecar in MiB.
pub const SIDECAR_MEMORY_MIB: u32 = 256;

/// Declares the registry stack.
///
/// # Errors
///
/// Returns an error if the stack cannot be assembled.
pub fn registry_stack(config: &StackweaveConfig) -> Result<Stack> {
    let mut stack = StackBuilder::new(constants::REGISTRY_STACK);
    let mutability = if config.registry.mutable_tags {
        "MUTABLE"
    } else {
        "IMMUTABLE"
    };
    let repository = stack.add(
        DescriptorBuilder::new(REPOSITORY, ResourceKind::Repository)
            .attribute("repositoryName", config.registry.repository_name.as_str())
            .attribute("imageTagMutability", mutability)
            .attribute(
                "imageScanningConfiguration",
                AttributeValue::map([("scanOnPush", true)]),
            ),
    )?;
    stack.export(constants::REPOSITORY_URI_EXPORT, &repository, "repositoryUri")?;
    stack.build()
}

/// Declares the application stack.
///
/// # Errors
///
/// Returns an error if segmentation, secret binding, or stack assembly
/// fails.
pub fn application_stack(config: &StackweaveConfig) -> Result<Stack> {
    let project = config.project.as_str();
    let mut stack = StackBuilder::new(constants::APPLICATION_STACK);
    let repository_uri = stack.import(
        constants::REPOSITORY_URI_EXPORT,
        constants::REGISTRY_STACK,
        constants::REPOSITORY_URI_EXPORT,
        ResourceKind::Repository,
    )?;

    let _ = stack.add(
        DescriptorBuilder::new(NETWORK, ResourceKind::Network)
            .attribute("cidr", config.network.cidr.as_str())
            .attribute("maxAzs", config.network.max_azs)
            .attribute("natGateways", config.network.nat_gateways)
            .attribute(
                "subnetGroups",
                AttributeValue::list(["public", "private", "isolated"]),
            ),
    )?;

    let _ = stack.add(cluster(config)?)?;

    let _ = stack.add(
        DescriptorBuilder::new(DB_SECRET, ResourceKind::Secret)
            .attribute("name", format!("{project}/db-credentials"))
            .attribute(
                "generateSecretString",
                AttributeValue::map([
                    (
                        "secretStringTemplate",
                        AttributeValue::map([("username", config.database.username.as_str())]),
                    ),
                    ("generateStringKey", AttributeValue::from("password")),
                    ("excludePunctuation", AttributeValue::from(true)),
                ]),
            )
            .attribute("fields", AttributeValue::list(DB_SECRET_FIELDS)),
    )?;

    let _ = stack.add(
        DescriptorBuilder::new(EXECUTION_ROLE, ResourceKind::Role)
            .attribute("roleName", format!("{project}-execution"))
            .attribute("assumedBy", "ecs-tasks.amazonaws.com")
            .attribute(
                "managedPolicies",
                AttributeValue::list(["service-role/AmazonECSTaskExecutionRolePolicy"]),
            )
            .attribute(
                "secretReadArns",
                AttributeValue::List(vec![Reference::new(DB_SECRET, SECRET_ARN_ATTRIBUTE).into()]),
            ),
    )?;

    let _ = stack.add(
        DescriptorBuilder::new(LOG_SINK, ResourceKind::LogSink)
            .attribute("logGroupName", format!("/ecs/{project}"))
            .attribute("retentionInDays", config.observability.log_retention_days),
    )?;

    let segmentation = segment(&tiers(config))?;
    stack.add_all(segmentation.descriptors())?;

    let _ = stack.add(database(config, &segmentation)?)?;
    let load_balancer = stack.add(
        DescriptorBuilder::new(LOAD_BALANCER, ResourceKind::LoadBalancer)
            .attribute("name", format!("{project}-alb"))
            .attribute("scheme", "internet-facing")
            .attribute("subnets", segmentation.subnets_ref(EDGE_TIER)?)
            .attribute(
                "securityGroups",
                AttributeValue::List(vec![segmentation.group_ref(EDGE_TIER)?.into()]),
            ),
    )?;
    let _ = stack.add(
        DescriptorBuilder::new(TARGET_GROUP, ResourceKind::TargetGroup)
            .attribute("name", format!("{project}-tg"))
            .attribute("vpcId", Reference::new(NETWORK, "vpcId"))
            .attribute("port", config.service.container_port)
            .attribute("protocol", "HTTP")
            .attribute("targetType", "ip")
            .attribute(
                "healthCheck",
                AttributeValue::map([
                    ("path", AttributeValue::from(config.service.health_check_path.as_str())),
                    ("intervalSeconds", AttributeValue::from(30_u32)),
                    ("healthyThresholdCount", AttributeValue::from(2_u32)),
                ]),
            ),
    )?;
    let _ = stack.add(
        DescriptorBuilder::new(LISTENER, ResourceKind::Listener)
            .attribute("loadBalancerArn", Reference::new(LOAD_BALANCER, "loadBalancerArn"))
            .attribute("port", config.service.listener_port)
            .attribute("protocol", "HTTP")
            .attribute(
                "defaultActions",
                AttributeValue::List(vec![AttributeValue::map([
                    ("type", AttributeValue::from("forward")),
                    (
                        "targetGroupArn",
                        Reference::new(TARGET_GROUP, "targetGroupArn").into(),
                    ),
                ])]),
            ),
    )?;

    let _ = stack.add(task_definition(config, repository_uri)?)?;
    let _ = stack.add(service(config, &segmentation)?)?;

    stack.export("loadBalancerDns", &load_balancer, "dnsName")?;
    stack.build()
}

/// Declares both stacks and hands them to a composer.
///
/// # Errors
///
/// Returns an error if either stack cannot be declared.
pub fn topology(config: &StackweaveConfig) -> Result<Composer> {
    Ok(Composer::new()
        .with_stack(registry_stack(config)?)
        .with_stack(application_stack(config)?))
}

/// Tier declarations of the application network.
#[must_use]
pub fn tiers(config: &StackweaveConfig) -> Vec<Tier> {
    vec![
        Tier::public(EDGE_TIER, NETWORK, config.service.listener_port),
        Tier::internal(APP_TIER, NETWORK, config.service.container_port).allow_from(EDGE_TIER),
        Tier::internal(DATA_TIER, NETWORK, config.database.port)
            .isolated()
            .allow_from(APP_TIER),
    ]
}

fn cluster(config: &StackweaveConfig) -> Result<DescriptorBuilder> {
    let insights = if config.observability.container_insights {
        "enabled"
    } else {
        "disabled"
    };
    let mut cluster = DescriptorBuilder::new(CLUSTER, ResourceKind::Cluster)
        .attribute("clusterName", format!("{}-cluster", config.project))
        .attribute("vpcId", Reference::new(NETWORK, "vpcId"))
        .attribute(
            "clusterSettings",
            AttributeValue::map([("containerInsights", insights)]),
        );
    if config.observability.container_insights && config.observability.enhanced_insights {
        // The generated setting only knows enabled/disabled.
        cluster.patch("clusterSettings.containerInsights", "enhanced")?;
    }
    Ok(cluster)
}

fn database(config: &StackweaveConfig, segmentation: &Segmentation) -> Result<DescriptorBuilder> {
    let db = &config.database;
    Ok(DescriptorBuilder::new(DATABASE, ResourceKind::Database)
        .attribute("clusterIdentifier", format!("{}-db", config.project))
        .attribute("engine", db.engine.as_str())
        .attribute("instanceClass", db.instance_class.as_str())
        .attribute("databaseName", db.database_name.as_str())
        .attribute("port", db.port)
        .attribute("credentials", Reference::new(DB_SECRET, SECRET_ARN_ATTRIBUTE))
        .attribute("subnetIds", segmentation.subnets_ref(DATA_TIER)?)
        .attribute(
            "securityGroupIds",
            AttributeValue::List(vec![segmentation.group_ref(DATA_TIER)?.into()]),
        )
        .attribute("storageEncrypted", true))
}

fn task_definition(
    config: &StackweaveConfig,
    repository_uri: AttributeValue,
) -> Result<DescriptorBuilder> {
    let mut fanout = SecretFanout::new(DB_SECRET, DB_SECRET_FIELDS);
    for (field, env) in DB_BINDINGS {
        fanout.bind(APP_CONTAINER, field, env)?;
    }

    let log_group = Reference::new(LOG_SINK, "logGroupName");
    let region = config.provider.region.as_str();
    let image = AttributeValue::join([
        repository_uri,
        constants::IMAGE_TAG_SEPARATOR.into(),
        config.image_tag.as_str().into(),
    ]);

    let mut app = ContainerBuilder::new(APP_CONTAINER)
        .image(image)
        .port(config.service.container_port)
        .secrets_from(&fanout)
        .log_to(log_group.clone(), region, APP_CONTAINER);
    let mut containers = Vec::new();
    if let Some(sidecar_image) = &config.observability.sidecar_image {
        app = app.env("OTEL_EXPORTER_OTLP_ENDPOINT", OTLP_ENDPOINT);
        containers.push(
            ContainerBuilder::new(SIDECAR_CONTAINER)
                .image(sidecar_image.as_str())
                .command(vec!["--config=/etc/ecs/ecs-default-config.yaml".into()])
                .essential(false)
                .cpu(SIDECAR_CPU_UNITS)
                .memory_mib(SIDECAR_MEMORY_MIB)
                .readonly_rootfs(true)
                .log_to(log_group, region, SIDECAR_CONTAINER)
                .build()?,
        );
    }
    containers.insert(0, app.build()?);

    Ok(DescriptorBuilder::new(TASK_DEFINITION, ResourceKind::TaskDefinition)
        .attribute("family", config.project.as_str())
        .attribute("cpu", config.service.cpu)
        .attribute("memory", config.service.memory_mib)
        .attribute("networkMode", "awsvpc")
        .attribute("requiresCompatibilities", AttributeValue::list(["FARGATE"]))
        .attribute("executionRoleArn", Reference::new(EXECUTION_ROLE, "roleArn"))
        .attribute("containerDefinitions", AttributeValue::List(containers)))
}

fn service(config: &StackweaveConfig, segmentation: &Segmentation) -> Result<DescriptorBuilder> {
    let mut service = DescriptorBuilder::new(SERVICE, ResourceKind::Service)
        .attribute("serviceName", format!("{}-service", config.project))
        .attribute("cluster", Reference::new(CLUSTER, "clusterArn"))
        .attribute("taskDefinition", Reference::new(TASK_DEFINITION, "taskDefinitionArn"))
        .attribute("desiredCount", config.service.desired_count)
        .attribute("launchType", "FARGATE")
        .attribute(
            "networkConfiguration",
            AttributeValue::map([
                ("subnets", AttributeValue::Ref(segmentation.subnets_ref(APP_TIER)?)),
                (
                    "securityGroups",
                    AttributeValue::List(vec![segmentation.group_ref(APP_TIER)?.into()]),
                ),
                ("assignPublicIp", AttributeValue::from(false)),
            ]),
        )
        .attribute(
            "loadBalancers",
            AttributeValue::List(vec![AttributeValue::map([
                ("containerName", AttributeValue::from(APP_CONTAINER)),
                ("containerPort", config.service.container_port.into()),
                (
                    "targetGroupArn",
                    Reference::new(TARGET_GROUP, "targetGroupArn").into(),
                ),
            ])]),
        )
        .attribute("listenerArn", Reference::new(LISTENER, "listenerArn"));
    service.patch("deploymentConfiguration.circuitBreaker.rollback", true)?;
    Ok(service)
}
