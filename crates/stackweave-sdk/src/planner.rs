//! Loads a topology configuration and synthesizes its plan.
//!
//! Wraps the blueprint and `stackweave-compose`'s composer into a
//! high-level API for SDK consumers.

use std::path::Path;

use stackweave_common::config::StackweaveConfig;
use stackweave_common::error::Result;
use stackweave_compose::plan::Plan;

use crate::blueprint;

/// High-level entry point from configuration to plan.
#[derive(Debug, Clone, Default)]
pub struct Planner {
    config: StackweaveConfig,
}

impl Planner {
    /// Creates a planner over the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a planner over an explicit configuration.
    #[must_use]
    pub const fn with_config(config: StackweaveConfig) -> Self {
        Self { config }
    }

    /// Loads and validates a YAML configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn load_config(&mut self, path: &Path) -> Result<()> {
        self.config = StackweaveConfig::load(path)?;
        Ok(())
    }

    /// Overrides the deployed image tag.
    ///
    /// # Errors
    ///
    /// Returns an error if the resulting configuration is invalid.
    pub fn set_image_tag(&mut self, tag: impl Into<String>) -> Result<()> {
        let config = self.config.clone().with_image_tag(tag);
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Returns the active configuration.
    #[must_use]
    pub const fn config(&self) -> &StackweaveConfig {
        &self.config
    }

    /// Declares the stacks and composes them into an ordered plan.
    ///
    /// # Errors
    ///
    /// Returns the first declaration or composition error.
    pub fn plan(&self) -> Result<Plan> {
        tracing::info!(project = %self.config.project, image_tag = %self.config.image_tag, "synthesizing plan");
        let plan = blueprint::topology(&self.config)?.compose()?;
        tracing::info!(resources = plan.len(), stacks = ?plan.stack_order, "plan synthesized");
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_plans_both_stacks() {
        let plan = Planner::new().plan().expect("plan");
        assert_eq!(plan.stack_order, vec!["registry", "application"]);
    }

    #[test]
    fn empty_image_tag_is_rejected() {
        let mut planner = Planner::new();
        assert!(planner.set_image_tag(" ").is_err());
        assert_eq!(planner.config().image_tag, "latest");
    }

    #[test]
    fn load_config_reads_yaml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("stackweave.yaml");
        std::fs::write(&path, "project: shop\nimage_tag: v7\n").expect("write");
        let mut planner = Planner::new();
        planner.load_config(&path).expect("load");
        assert_eq!(planner.config().project, "shop");
        assert_eq!(planner.config().image_tag, "v7");
    }
}
