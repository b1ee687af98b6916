//! Network addressing parameters for the three-zone VPC layout

use crate::document::{Declaration, Document, DocumentError, LogicalId, ParameterSpec, Value};

use super::Bundle;

/// Subnet blocks for zones 1, 2 and 3 when nothing else is configured
pub const DEFAULT_SUBNET_CIDR_BLOCKS: [&str; 3] =
    ["172.20.0.0/24", "172.20.4.0/24", "172.20.8.0/24"];

const DOMAIN_NAME_SUFFIX: &str = "ec2ComputeDomainNameSuffix";
const GATEWAY_CIDR_BLOCK: &str = "gatewayCidrBlock";
const VPC_CIDR_BLOCK: &str = "vpcCidrBlock";

/// Parameter id of the subnet block for a zone (1-based)
pub fn subnet_cidr_param_id(zone: usize) -> LogicalId {
    LogicalId::new(format!("subnetCidrBlockForAz{}", zone))
}

/// Output id publishing the subnet block for a zone (1-based)
pub fn subnet_cidr_output_id(zone: usize) -> LogicalId {
    LogicalId::new(format!("vpcSubnetCidrBlockForAz{}", zone))
}

/// Constraints shared by every CIDR parameter
fn cidr_parameter(description: impl Into<String>, default: &str) -> ParameterSpec {
    ParameterSpec::string()
        .with_description(description)
        .with_min_length(9)
        .with_max_length(20)
        .with_allowed_pattern("[0-9./]*")
        .with_default(default)
}

/// VPC, gateway and per-zone subnet addressing
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkBundle {
    /// Internal IPv4 block of the VPC
    pub vpc_cidr_block: String,
    /// Where internet traffic is allowed from
    pub gateway_cidr_block: String,
    /// One block per availability zone; the length is the zone count
    pub subnet_cidr_blocks: Vec<String>,
}

impl Default for NetworkBundle {
    fn default() -> Self {
        Self {
            vpc_cidr_block: "172.20.0.0/20".to_string(),
            gateway_cidr_block: "0.0.0.0/0".to_string(),
            subnet_cidr_blocks: DEFAULT_SUBNET_CIDR_BLOCKS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl NetworkBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_vpc_cidr_block(mut self, block: impl Into<String>) -> Self {
        self.vpc_cidr_block = block.into();
        self
    }

    pub fn with_gateway_cidr_block(mut self, block: impl Into<String>) -> Self {
        self.gateway_cidr_block = block.into();
        self
    }

    pub fn with_subnet_cidr_blocks<I, S>(mut self, blocks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subnet_cidr_blocks = blocks.into_iter().map(Into::into).collect();
        self
    }

    pub fn zone_count(&self) -> usize {
        self.subnet_cidr_blocks.len()
    }
}

impl Bundle for NetworkBundle {
    type Handles = NetworkHandles;

    fn register_into(&self, document: &mut Document) -> Result<NetworkHandles, DocumentError> {
        let mut declarations = vec![
            Declaration::parameter(
                DOMAIN_NAME_SUFFIX,
                ParameterSpec::string()
                    .with_description("The suffix the region will be appended to for the VPC's internal DNS")
                    .with_default("compute.internal"),
            ),
            Declaration::parameter(
                GATEWAY_CIDR_BLOCK,
                cidr_parameter(
                    "The internet gateway CIDR block for where traffic is allowed from",
                    &self.gateway_cidr_block,
                ),
            ),
            Declaration::parameter(
                VPC_CIDR_BLOCK,
                cidr_parameter(
                    "The VPC's CIDR block for internal IPv4 addressing",
                    &self.vpc_cidr_block,
                ),
            ),
        ];
        for (index, block) in self.subnet_cidr_blocks.iter().enumerate() {
            let zone = index + 1;
            declarations.push(Declaration::parameter(
                subnet_cidr_param_id(zone),
                cidr_parameter(format!("Cidr block for subnet in AZ '{}'", zone), block),
            ));
        }

        let subnet_cidr_blocks = document.register_all(declarations)?.split_off(3);
        Ok(NetworkHandles {
            domain_name_suffix: LogicalId::new(DOMAIN_NAME_SUFFIX),
            gateway_cidr_block: LogicalId::new(GATEWAY_CIDR_BLOCK),
            vpc_cidr_block: LogicalId::new(VPC_CIDR_BLOCK),
            subnet_cidr_blocks,
        })
    }
}

/// References to the registered network parameters
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkHandles {
    pub domain_name_suffix: LogicalId,
    pub gateway_cidr_block: LogicalId,
    pub vpc_cidr_block: LogicalId,
    subnet_cidr_blocks: Vec<LogicalId>,
}

impl NetworkHandles {
    pub fn domain_name_suffix(&self) -> Value {
        Value::reference(&self.domain_name_suffix)
    }

    pub fn gateway_cidr_block(&self) -> Value {
        Value::reference(&self.gateway_cidr_block)
    }

    pub fn vpc_cidr_block(&self) -> Value {
        Value::reference(&self.vpc_cidr_block)
    }

    /// Zones registered by the bundle, 1-based
    pub fn zones(&self) -> impl Iterator<Item = usize> {
        1..=self.subnet_cidr_blocks.len()
    }

    /// `Ref` to the subnet block parameter of a zone (1-based)
    pub fn subnet_cidr_for_zone(&self, zone: usize) -> Option<Value> {
        zone.checked_sub(1)
            .and_then(|index| self.subnet_cidr_blocks.get(index))
            .map(Value::reference)
    }

    /// `(zone, Ref)` for every subnet block parameter
    pub fn subnet_cidr_blocks(&self) -> impl Iterator<Item = (usize, Value)> + '_ {
        self.subnet_cidr_blocks
            .iter()
            .enumerate()
            .map(|(index, id)| (index + 1, Value::reference(id)))
    }

    /// Publish each zone's subnet block as an output
    pub fn register_outputs(&self, document: &mut Document) -> Result<(), DocumentError> {
        let outputs = self
            .subnet_cidr_blocks
            .iter()
            .enumerate()
            .map(|(index, param)| {
                let zone = index + 1;
                Declaration::output(subnet_cidr_output_id(zone), Value::reference(param))
                    .with_description(format!("Cidr block for subnet in AZ '{}'", zone))
            })
            .collect();
        document.register_all(outputs)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Section;

    #[test]
    fn test_subnet_ids_by_zone() {
        assert_eq!(subnet_cidr_param_id(2).as_str(), "subnetCidrBlockForAz2");
        assert_eq!(subnet_cidr_output_id(3).as_str(), "vpcSubnetCidrBlockForAz3");
    }

    #[test]
    fn test_registers_parameters_in_order() {
        let mut doc = Document::new("test");
        let network = NetworkBundle::new().register_into(&mut doc).unwrap();
        let ids: Vec<&str> = doc.ids().map(|id| id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "ec2ComputeDomainNameSuffix",
                "gatewayCidrBlock",
                "vpcCidrBlock",
                "subnetCidrBlockForAz1",
                "subnetCidrBlockForAz2",
                "subnetCidrBlockForAz3",
            ]
        );
        assert_eq!(network.zones().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(
            network.subnet_cidr_for_zone(2),
            Some(Value::reference("subnetCidrBlockForAz2"))
        );
        assert!(network.subnet_cidr_for_zone(0).is_none());
        assert!(network.subnet_cidr_for_zone(4).is_none());
    }

    #[test]
    fn test_cidr_constraints_and_defaults() {
        let mut doc = Document::new("test");
        NetworkBundle::new().register_into(&mut doc).unwrap();
        let vpc = doc.get("vpcCidrBlock").unwrap();
        assert_eq!(vpc.attribute("Default"), Some(&Value::from("172.20.0.0/20")));
        assert_eq!(vpc.attribute("MinLength"), Some(&Value::from(9u32)));
        assert_eq!(vpc.attribute("AllowedPattern"), Some(&Value::from("[0-9./]*")));
        let az3 = doc.get("subnetCidrBlockForAz3").unwrap();
        assert_eq!(az3.attribute("Default"), Some(&Value::from("172.20.8.0/24")));
    }

    #[test]
    fn test_custom_zone_count() {
        let mut doc = Document::new("test");
        let network = NetworkBundle::new()
            .with_subnet_cidr_blocks(["10.0.0.0/24", "10.0.1.0/24"])
            .register_into(&mut doc)
            .unwrap();
        assert_eq!(network.zones().count(), 2);
        assert!(!doc.contains("subnetCidrBlockForAz3"));
    }

    #[test]
    fn test_collision_leaves_document_untouched() {
        let mut doc = Document::new("test");
        doc.declare_parameter("vpcCidrBlock", ParameterSpec::string())
            .unwrap();
        let result = NetworkBundle::new().register_into(&mut doc);
        assert!(matches!(result, Err(DocumentError::DuplicateId { .. })));
        let ids: Vec<&str> = doc.ids().map(|id| id.as_str()).collect();
        assert_eq!(ids, vec!["vpcCidrBlock"]);
    }

    #[test]
    fn test_outputs_do_not_collide_with_parameters() {
        let mut doc = Document::new("test");
        let network = NetworkBundle::new().register_into(&mut doc).unwrap();
        network.register_outputs(&mut doc).expect("Should register outputs");
        assert_eq!(doc.section(Section::Output).count(), 3);
        let resolved = doc.resolve().unwrap();
        // the outputs use the subnet parameters; the rest stay unused
        let unused: Vec<&str> = resolved.advisories().iter().map(|a| a.id.as_str()).collect();
        assert_eq!(
            unused,
            vec!["ec2ComputeDomainNameSuffix", "gatewayCidrBlock", "vpcCidrBlock"]
        );
    }
}
