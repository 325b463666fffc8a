//! Tier-based network segmentation.
//!
//! Each tier gets one security group and a subnet group. Traffic between
//! tiers is admitted only along declared `allow_from` adjacencies, each of
//! which yields exactly one ingress rule on the destination group naming
//! the source group. Only a public-facing tier receives a rule with an
//! unrestricted source. Egress stays at the provider default (allow all).

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use stackweave_common::constants;
use stackweave_common::error::{Result, StackweaveError};
use stackweave_common::types::{ResourceId, ResourceKind};

use crate::descriptor::DescriptorBuilder;
use crate::reference::Reference;

/// Subnet group a tier is placed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubnetGroup {
    /// Routed to the internet gateway.
    Public,
    /// Egress through NAT, no inbound route from the internet.
    Private,
    /// No route to or from the internet.
    Isolated,
}

impl SubnetGroup {
    /// Returns the network output attribute listing this group's subnets.
    #[must_use]
    pub const fn subnet_ids_attribute(self) -> &'static str {
        match self {
            Self::Public => "publicSubnetIds",
            Self::Private => "privateSubnetIds",
            Self::Isolated => "isolatedSubnetIds",
        }
    }
}

impl fmt::Display for SubnetGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => write!(f, "public"),
            Self::Private => write!(f, "private"),
            Self::Isolated => write!(f, "isolated"),
        }
    }
}

/// Source tier name reserved for the unrestricted rule of a public tier.
pub const ANY_SOURCE: &str = "anywhere";

/// Direction of a security group rule.
///
/// Only ingress is derived; egress stays at the provider default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Inbound traffic.
    Ingress,
}

impl Direction {
    /// Returns the attribute value of the direction.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ingress => "ingress",
        }
    }
}

/// Where a rule admits traffic from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleSource {
    /// Members of another security group.
    Group(Reference),
    /// An address range.
    Cidr(String),
}

/// A derived security group rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroupRule {
    /// Identifier of the rule resource.
    pub id: ResourceId,
    /// Tier owning the destination group.
    pub destination_tier: String,
    /// Destination group.
    pub destination: Reference,
    /// Source tier, when the source is a group.
    pub source_tier: Option<String>,
    /// Traffic source.
    pub source: RuleSource,
    /// IP protocol.
    pub protocol: String,
    /// First port of the range.
    pub from_port: u16,
    /// Last port of the range.
    pub to_port: u16,
    /// Rule direction.
    pub direction: Direction,
}

/// Declaration of one network tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tier {
    /// Tier name, e.g. `edge`, `app`, `db`.
    pub name: String,
    /// Network the tier's resources live in.
    pub network: ResourceId,
    /// Port the tier accepts traffic on.
    pub port: u16,
    /// Whether the tier accepts traffic from any address.
    pub public_facing: bool,
    /// Subnet group the tier is placed in.
    pub subnet: SubnetGroup,
    /// Tiers allowed to reach this tier.
    pub allow_from: Vec<String>,
}

impl Tier {
    /// Declares a public-facing tier in the public subnets.
    #[must_use]
    pub fn public(name: impl Into<String>, network: impl Into<ResourceId>, port: u16) -> Self {
        Self {
            name: name.into(),
            network: network.into(),
            port,
            public_facing: true,
            subnet: SubnetGroup::Public,
            allow_from: Vec::new(),
        }
    }

    /// Declares an internal tier in the private subnets.
    #[must_use]
    pub fn internal(name: impl Into<String>, network: impl Into<ResourceId>, port: u16) -> Self {
        Self {
            name: name.into(),
            network: network.into(),
            port,
            public_facing: false,
            subnet: SubnetGroup::Private,
            allow_from: Vec::new(),
        }
    }

    /// Places the tier in the isolated subnets.
    #[must_use]
    pub const fn isolated(mut self) -> Self {
        self.subnet = SubnetGroup::Isolated;
        self
    }

    /// Admits traffic from another tier.
    #[must_use]
    pub fn allow_from(mut self, tier: impl Into<String>) -> Self {
        self.allow_from.push(tier.into());
        self
    }
}

#[derive(Debug, Clone)]
struct Placement {
    tier: Tier,
    group: ResourceId,
}

/// Derived security groups, rules, and subnet placements.
#[derive(Debug, Clone)]
pub struct Segmentation {
    placements: Vec<Placement>,
    rules: Vec<SecurityGroupRule>,
}

impl Segmentation {
    /// Returns a reference to the security group id of a tier.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown tier.
    pub fn group_ref(&self, tier: &str) -> Result<Reference> {
        Ok(Reference::new(self.placement(tier)?.group.clone(), "groupId"))
    }

    /// Returns the subnet group a tier is placed in.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown tier.
    pub fn subnet_group(&self, tier: &str) -> Result<SubnetGroup> {
        Ok(self.placement(tier)?.tier.subnet)
    }

    /// Returns a reference to the subnet ids a tier is placed in.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown tier.
    pub fn subnets_ref(&self, tier: &str) -> Result<Reference> {
        let placement = self.placement(tier)?;
        Ok(Reference::new(
            placement.tier.network.clone(),
            placement.tier.subnet.subnet_ids_attribute(),
        ))
    }

    /// Returns every derived rule.
    #[must_use]
    pub fn rules(&self) -> &[SecurityGroupRule] {
        &self.rules
    }

    /// Returns the ingress rules on one tier's group.
    pub fn ingress_rules_for<'a>(
        &'a self,
        tier: &'a str,
    ) -> impl Iterator<Item = &'a SecurityGroupRule> + 'a {
        self.rules
            .iter()
            .filter(move |r| r.destination_tier == tier)
    }

    /// Returns descriptor builders for every security group followed by
    /// every rule.
    #[must_use]
    pub fn descriptors(&self) -> Vec<DescriptorBuilder> {
        let groups = self.placements.iter().map(|p| {
            DescriptorBuilder::new(p.group.clone(), ResourceKind::SecurityGroup)
                .attribute("vpcId", Reference::new(p.tier.network.clone(), "vpcId"))
                .attribute("description", format!("{} tier", p.tier.name))
                .attribute("allowAllOutbound", true)
                .tag(constants::TAG_TIER, p.tier.name.clone())
                .tag(constants::TAG_PUBLIC_FACING, p.tier.public_facing.to_string())
        });

        let rules = self.rules.iter().map(|rule| {
            let builder = DescriptorBuilder::new(rule.id.clone(), ResourceKind::SecurityGroupRule)
                .attribute("groupId", rule.destination.clone())
                .attribute("ipProtocol", rule.protocol.clone())
                .attribute("fromPort", rule.from_port)
                .attribute("toPort", rule.to_port)
                .attribute("direction", rule.direction.as_str())
                .tag(constants::TAG_TIER, rule.destination_tier.clone());
            match &rule.source {
                RuleSource::Group(source) => builder.attribute("sourceGroupId", source.clone()),
                RuleSource::Cidr(cidr) => builder.attribute("cidrIp", cidr.clone()),
            }
        });

        groups.chain(rules).collect()
    }

    fn placement(&self, tier: &str) -> Result<&Placement> {
        self.placements
            .iter()
            .find(|p| p.tier.name == tier)
            .ok_or_else(|| StackweaveError::NotFound {
                kind: "tier",
                id: tier.to_string(),
            })
    }
}

/// Derives security groups and ingress rules from tier declarations.
///
/// # Errors
///
/// Returns `DuplicateResource` for repeated tier names or colliding
/// generated ids, `Config` for a reserved tier name or a public-facing tier
/// outside the public subnets, `NotFound` for an `allow_from` naming an
/// unknown tier, and `TopologyMismatch` when an adjacency crosses networks.
pub fn segment(tiers: &[Tier]) -> Result<Segmentation> {
    let mut seen = BTreeSet::new();
    for tier in tiers {
        ResourceId::new(tier.name.clone()).validate()?;
        if tier.name == ANY_SOURCE {
            return Err(StackweaveError::Config {
                message: format!("tier name \"{ANY_SOURCE}\" is reserved"),
            });
        }
        if tier.public_facing && tier.subnet != SubnetGroup::Public {
            return Err(StackweaveError::Config {
                message: format!(
                    "public-facing tier \"{}\" must be placed in the public subnets, not {}",
                    tier.name, tier.subnet
                ),
            });
        }
        if !seen.insert(tier.name.as_str()) {
            return Err(StackweaveError::DuplicateResource {
                kind: "tier",
                id: tier.name.clone(),
            });
        }
    }

    let by_name: BTreeMap<&str, &Tier> = tiers.iter().map(|t| (t.name.as_str(), t)).collect();
    let mut rules = Vec::new();

    for tier in tiers {
        let destination = Reference::new(group_id(&tier.name), "groupId");

        if tier.public_facing {
            rules.push(SecurityGroupRule {
                id: rule_id(&tier.name, ANY_SOURCE),
                destination_tier: tier.name.clone(),
                destination: destination.clone(),
                source_tier: None,
                source: RuleSource::Cidr(constants::ANY_IPV4.into()),
                protocol: "tcp".into(),
                from_port: tier.port,
                to_port: tier.port,
                direction: Direction::Ingress,
            });
        }

        let mut admitted = BTreeSet::new();
        for source_name in &tier.allow_from {
            if !admitted.insert(source_name.as_str()) {
                continue;
            }
            let source = by_name
                .get(source_name.as_str())
                .ok_or_else(|| StackweaveError::NotFound {
                    kind: "tier",
                    id: format!("{source_name} (allowed by {})", tier.name),
                })?;
            if source.network != tier.network {
                return Err(StackweaveError::TopologyMismatch {
                    source_tier: source.name.clone(),
                    destination: tier.name.clone(),
                    message: format!(
                        "\"{}\" is in network {} but \"{}\" is in network {}",
                        tier.name, tier.network, source.name, source.network
                    ),
                });
            }
            rules.push(SecurityGroupRule {
                id: rule_id(&tier.name, &source.name),
                destination_tier: tier.name.clone(),
                destination: destination.clone(),
                source_tier: Some(source.name.clone()),
                source: RuleSource::Group(Reference::new(group_id(&source.name), "groupId")),
                protocol: "tcp".into(),
                from_port: tier.port,
                to_port: tier.port,
                direction: Direction::Ingress,
            });
        }
    }

    let placements: Vec<Placement> = tiers
        .iter()
        .map(|t| Placement {
            tier: t.clone(),
            group: group_id(&t.name),
        })
        .collect();

    let mut generated = BTreeSet::new();
    let ids = placements.iter().map(|p| &p.group).chain(rules.iter().map(|r| &r.id));
    for id in ids {
        if !generated.insert(id) {
            return Err(StackweaveError::DuplicateResource {
                kind: "generated network resource",
                id: format!("{id} (rename one of the tiers)"),
            });
        }
    }

    tracing::info!(tiers = tiers.len(), rules = rules.len(), "network segmented");
    Ok(Segmentation { placements, rules })
}

fn group_id(tier: &str) -> ResourceId {
    ResourceId::new(format!("{tier}-sg"))
}

fn rule_id(destination: &str, source: &str) -> ResourceId {
    ResourceId::new(format!("{destination}-from-{source}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_tiers() -> Vec<Tier> {
        vec![
            Tier::public("edge", "Vpc", 80),
            Tier::internal("app", "Vpc", 8080).allow_from("edge"),
            Tier::internal("db", "Vpc", 5432).isolated().allow_from("app"),
        ]
    }

    #[test]
    fn edge_to_app_yields_one_rule_sourced_from_edge_group() {
        let seg = segment(&three_tiers()).expect("segment");
        let app_rules: Vec<_> = seg.ingress_rules_for("app").collect();
        assert_eq!(app_rules.len(), 1);
        assert_eq!(app_rules[0].source, RuleSource::Group(seg.group_ref("edge").expect("edge")));
        assert_eq!(app_rules[0].from_port, 8080);
    }

    #[test]
    fn database_only_admits_application_group() {
        let seg = segment(&three_tiers()).expect("segment");
        let db_rules: Vec<_> = seg.ingress_rules_for("db").collect();
        assert_eq!(db_rules.len(), 1);
        assert_eq!(db_rules[0].source_tier.as_deref(), Some("app"));
        assert!(matches!(db_rules[0].source, RuleSource::Group(_)));
    }

    #[test]
    fn only_public_tier_has_unrestricted_source() {
        let seg = segment(&three_tiers()).expect("segment");
        let open: Vec<_> = seg
            .rules()
            .iter()
            .filter(|r| matches!(&r.source, RuleSource::Cidr(c) if c == constants::ANY_IPV4))
            .collect();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].destination_tier, "edge");
        assert_eq!(seg.rules().len(), 3);
    }

    #[test]
    fn subnet_placement_follows_tier_declaration() {
        let seg = segment(&three_tiers()).expect("segment");
        assert_eq!(seg.subnet_group("edge").expect("edge"), SubnetGroup::Public);
        assert_eq!(seg.subnet_group("app").expect("app"), SubnetGroup::Private);
        assert_eq!(seg.subnet_group("db").expect("db"), SubnetGroup::Isolated);
        assert_eq!(
            seg.subnets_ref("db").expect("db"),
            Reference::new("Vpc", "isolatedSubnetIds")
        );
    }

    #[test]
    fn adjacency_across_networks_is_a_mismatch() {
        let tiers = vec![
            Tier::public("edge", "VpcA", 80),
            Tier::internal("app", "VpcB", 8080).allow_from("edge"),
        ];
        let err = segment(&tiers).unwrap_err();
        assert!(matches!(err, StackweaveError::TopologyMismatch { .. }), "got: {err}");
    }

    #[test]
    fn unknown_source_tier_fails() {
        let tiers = vec![Tier::internal("app", "Vpc", 8080).allow_from("ghost")];
        let msg = segment(&tiers).unwrap_err().to_string();
        assert!(msg.contains("ghost"), "got: {msg}");
    }

    #[test]
    fn repeated_adjacency_collapses_to_one_rule() {
        let tiers = vec![
            Tier::public("edge", "Vpc", 80),
            Tier::internal("app", "Vpc", 8080).allow_from("edge").allow_from("edge"),
        ];
        let seg = segment(&tiers).expect("segment");
        assert_eq!(seg.ingress_rules_for("app").count(), 1);
    }

    #[test]
    fn public_tier_outside_public_subnets_rejected() {
        let tiers = vec![Tier::public("edge", "Vpc", 80).isolated()];
        let err = segment(&tiers).unwrap_err();
        assert!(matches!(err, StackweaveError::Config { .. }), "got: {err}");
        assert!(err.to_string().contains("isolated"), "got: {err}");
    }

    #[test]
    fn reserved_source_name_rejected() {
        let tiers = vec![
            Tier::public("x", "Vpc", 80).allow_from(ANY_SOURCE),
            Tier::internal(ANY_SOURCE, "Vpc", 8080),
        ];
        let err = segment(&tiers).unwrap_err();
        assert!(err.to_string().contains("reserved"), "got: {err}");
    }

    #[test]
    fn colliding_generated_ids_rejected() {
        let tiers = vec![
            Tier::internal("a", "Vpc", 8080).allow_from("b-from-c"),
            Tier::internal("a-from-b", "Vpc", 8081).allow_from("c"),
            Tier::internal("b-from-c", "Vpc", 8082),
            Tier::internal("c", "Vpc", 8083),
        ];
        let err = segment(&tiers).unwrap_err();
        match err {
            StackweaveError::DuplicateResource { id, .. } => {
                assert!(id.contains("a-from-b-from-c"), "got: {id}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rules_carry_their_direction() {
        let seg = segment(&three_tiers()).expect("segment");
        let rule = seg
            .descriptors()
            .into_iter()
            .map(DescriptorBuilder::freeze)
            .find(|d| d.id().as_str() == "db-from-app")
            .expect("rule");
        assert_eq!(
            rule.attribute("direction").and_then(crate::descriptor::AttributeValue::as_str),
            Some("ingress")
        );
    }

    #[test]
    fn duplicate_tier_rejected() {
        let tiers = vec![Tier::public("edge", "Vpc", 80), Tier::public("edge", "Vpc", 443)];
        assert!(segment(&tiers).is_err());
    }

    #[test]
    fn descriptors_reference_network_and_groups() {
        let seg = segment(&three_tiers()).expect("segment");
        let descriptors: Vec<_> = seg.descriptors().into_iter().map(DescriptorBuilder::freeze).collect();
        assert_eq!(descriptors.len(), 6);

        let app_sg = descriptors.iter().find(|d| d.id().as_str() == "app-sg").expect("app-sg");
        assert_eq!(app_sg.kind(), ResourceKind::SecurityGroup);
        assert_eq!(app_sg.dependencies(), vec![&ResourceId::new("Vpc")]);

        let rule = descriptors
            .iter()
            .find(|d| d.id().as_str() == "app-from-edge")
            .expect("rule");
        let deps: Vec<&str> = rule.dependencies().into_iter().map(ResourceId::as_str).collect();
        assert_eq!(deps, vec!["app-sg", "edge-sg"]);
    }
}
