//! Fluent API for declaring container definitions.

use stackweave_common::error::{Result, StackweaveError};
use stackweave_compose::descriptor::AttributeValue;
use stackweave_compose::reference::Reference;
use stackweave_compose::secret::{SecretFanout, SecretInjection};

/// Log routing of a container into a log sink.
#[derive(Debug, Clone)]
struct LogRouting {
    group: Reference,
    region: String,
    stream_prefix: String,
}

/// Builder for one container of a task definition.
#[derive(Debug)]
pub struct ContainerBuilder {
    name: String,
    image: Option<AttributeValue>,
    command: Vec<String>,
    env: Vec<(String, String)>,
    secrets: Vec<SecretInjection>,
    port: Option<u16>,
    cpu: Option<u32>,
    memory_mib: Option<u32>,
    essential: bool,
    readonly_rootfs: bool,
    logging: Option<LogRouting>,
}

impl ContainerBuilder {
    /// Creates a new builder with the given container name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: None,
            command: Vec::new(),
            env: Vec::new(),
            secrets: Vec::new(),
            port: None,
            cpu: None,
            memory_mib: None,
            essential: true,
            readonly_rootfs: false,
            logging: None,
        }
    }

    /// Returns the container name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sets the image. May be a literal, a reference, or a join of both.
    #[must_use]
    pub fn image(mut self, image: impl Into<AttributeValue>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Sets the command to run inside the container.
    #[must_use]
    pub fn command(mut self, cmd: Vec<String>) -> Self {
        self.command = cmd;
        self
    }

    /// Adds a plain environment variable.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Adds every secret field bound to this container in `fanout`.
    #[must_use]
    pub fn secrets_from(mut self, fanout: &SecretFanout) -> Self {
        self.secrets.extend(fanout.injections_for(&self.name));
        self
    }

    /// Exposes a TCP port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Reserves CPU units for this container.
    #[must_use]
    pub const fn cpu(mut self, units: u32) -> Self {
        self.cpu = Some(units);
        self
    }

    /// Sets the memory limit in MiB.
    #[must_use]
    pub const fn memory_mib(mut self, mib: u32) -> Self {
        self.memory_mib = Some(mib);
        self
    }

    /// Sets whether the task stops when this container exits.
    #[must_use]
    pub const fn essential(mut self, essential: bool) -> Self {
        self.essential = essential;
        self
    }

    /// Sets whether the root filesystem should be read-only.
    #[must_use]
    pub const fn readonly_rootfs(mut self, readonly: bool) -> Self {
        self.readonly_rootfs = readonly;
        self
    }

    /// Routes container output to a log group.
    #[must_use]
    pub fn log_to(
        mut self,
        group: Reference,
        region: impl Into<String>,
        stream_prefix: impl Into<String>,
    ) -> Self {
        self.logging = Some(LogRouting {
            group,
            region: region.into(),
            stream_prefix: stream_prefix.into(),
        });
        self
    }

    /// Builds the container definition attribute.
    ///
    /// # Errors
    ///
    /// Returns an error if the image is missing or a variable name is used
    /// both as plain environment and as a secret.
    pub fn build(self) -> Result<AttributeValue> {
        let image = self.image.ok_or_else(|| StackweaveError::Config {
            message: format!("container \"{}\" has no image", self.name),
        })?;
        if let Some(clash) = self
            .env
            .iter()
            .find(|(k, _)| self.secrets.iter().any(|s| &s.name == k))
        {
            return Err(StackweaveError::Config {
                message: format!(
                    "container \"{}\" sets {} both as environment and secret",
                    self.name, clash.0
                ),
            });
        }

        let mut definition = vec![
            ("name".to_string(), AttributeValue::from(self.name.as_str())),
            ("image".to_string(), image),
            ("essential".to_string(), self.essential.into()),
            ("readonlyRootFilesystem".to_string(), self.readonly_rootfs.into()),
        ];
        if !self.command.is_empty() {
            definition.push(("command".into(), AttributeValue::list(self.command)));
        }
        if let Some(cpu) = self.cpu {
            definition.push(("cpu".into(), cpu.into()));
        }
        if let Some(memory) = self.memory_mib {
            definition.push(("memory".into(), memory.into()));
        }
        if let Some(port) = self.port {
            definition.push((
                "portMappings".into(),
                AttributeValue::List(vec![AttributeValue::map([
                    ("containerPort", AttributeValue::from(port)),
                    ("protocol", "tcp".into()),
                ])]),
            ));
        }
        if !self.env.is_empty() {
            definition.push((
                "environment".into(),
                AttributeValue::List(
                    self.env
                        .into_iter()
                        .map(|(k, v)| AttributeValue::map([("name", k), ("value", v)]))
                        .collect(),
                ),
            ));
        }
        if !self.secrets.is_empty() {
            definition.push((
                "secrets".into(),
                AttributeValue::List(self.secrets.iter().map(SecretInjection::to_attribute).collect()),
            ));
        }
        if let Some(log) = self.logging {
            definition.push((
                "logConfiguration".into(),
                AttributeValue::map([
                    ("logDriver", AttributeValue::from("awslogs")),
                    (
                        "options",
                        AttributeValue::map([
                            ("awslogs-group", AttributeValue::Ref(log.group)),
                            ("awslogs-region", log.region.into()),
                            ("awslogs-stream-prefix", log.stream_prefix.into()),
                        ]),
                    ),
                ]),
            ));
        }

        tracing::debug!(container = %self.name, "container definition built");
        Ok(AttributeValue::map(definition))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_image_is_rejected() {
        let err = ContainerBuilder::new("app").build().unwrap_err();
        assert!(err.to_string().contains("no image"), "got: {err}");
    }

    #[test]
    fn secrets_are_pulled_for_this_container_only() {
        let mut fanout = SecretFanout::new("DbSecret", ["host", "password"]);
        fanout.bind("app", "host", "DB_HOST").expect("bind");
        fanout.bind("worker", "password", "DB_PASSWORD").expect("bind");

        let definition = ContainerBuilder::new("app")
            .image("nginx:1")
            .secrets_from(&fanout)
            .build()
            .expect("build");
        let Some(AttributeValue::List(secrets)) = definition.get_path("secrets") else {
            panic!("no secrets");
        };
        assert_eq!(secrets.len(), 1);
        assert_eq!(
            secrets[0].get_path("name").and_then(AttributeValue::as_str),
            Some("DB_HOST")
        );
    }

    #[test]
    fn env_and_secret_with_same_name_clash() {
        let mut fanout = SecretFanout::new("DbSecret", ["host"]);
        fanout.bind("app", "host", "DB_HOST").expect("bind");
        let err = ContainerBuilder::new("app")
            .image("nginx:1")
            .env("DB_HOST", "localhost")
            .secrets_from(&fanout)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("DB_HOST"), "got: {err}");
    }

    #[test]
    fn sizing_and_rootfs_are_emitted() {
        let definition = ContainerBuilder::new("sidecar")
            .image("otel:1")
            .cpu(128)
            .memory_mib(256)
            .readonly_rootfs(true)
            .essential(false)
            .build()
            .expect("build");
        assert_eq!(definition.get_path("cpu"), Some(&AttributeValue::Integer(128)));
        assert_eq!(definition.get_path("memory"), Some(&AttributeValue::Integer(256)));
        assert_eq!(
            definition.get_path("readonlyRootFilesystem"),
            Some(&AttributeValue::Bool(true))
        );
        assert_eq!(definition.get_path("essential"), Some(&AttributeValue::Bool(false)));
    }

    #[test]
    fn unsized_container_omits_cpu_and_memory() {
        let definition = ContainerBuilder::new("app").image("nginx:1").build().expect("build");
        assert!(definition.get_path("cpu").is_none());
        assert!(definition.get_path("memory").is_none());
        assert_eq!(
            definition.get_path("readonlyRootFilesystem"),
            Some(&AttributeValue::Bool(false))
        );
    }

    #[test]
    fn log_routing_references_the_sink() {
        let definition = ContainerBuilder::new("app")
            .image("nginx:1")
            .port(8080)
            .log_to(Reference::new("AppLogs", "logGroupName"), "us-east-1", "app")
            .build()
            .expect("build");
        assert_eq!(
            definition.get_path("logConfiguration.options.awslogs-group"),
            Some(&AttributeValue::Ref(Reference::new("AppLogs", "logGroupName")))
        );
        assert!(definition.get_path("portMappings").is_some());
        assert_eq!(definition.get_path("essential"), Some(&AttributeValue::Bool(true)));
    }
}
