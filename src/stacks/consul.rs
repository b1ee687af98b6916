//! Consul server cluster inside the VPC

use crate::bundle::Bundle;
use crate::config::StackConfig;
use crate::document::{Document, DocumentError};

use super::cluster::{self, Capacity, InstanceInputs, ScalingGroup};

pub(super) const DESCRIPTION: &str = "Launches the Consul cluster in the Cerberus VPC";

pub fn build(config: &StackConfig) -> Result<Document, DocumentError> {
    let mut doc = Document::new(DESCRIPTION);
    let tags = config.tags.register_into(&mut doc)?;

    cluster::declare_vpc_id(&mut doc)?;
    let instance = InstanceInputs::declare(&mut doc, "Consul")?;
    let tools_ingress_sg = cluster::declare_security_group_id(
        &mut doc,
        "toolsIngressSgId",
        "Tools Ingress Security Group ID",
    )?;
    let consul_client_sg = cluster::declare_security_group_id(
        &mut doc,
        "consulClientSgId",
        "Consul Client Security Group ID",
    )?;
    let consul_server_sg = cluster::declare_security_group_id(
        &mut doc,
        "consulServerSgId",
        "Consul Server Security Group ID",
    )?;
    let key_pair_name = cluster::declare_key_pair_name(&mut doc, Some("cpe-cerberus"))?;
    let user_data = cluster::declare_user_data(&mut doc, "Consul User Data")?;
    let capacity = Capacity::declare(&mut doc, None)?;
    let subnets = cluster::declare_subnet_ids(&mut doc, config.network.zone_count())?;

    let launch_config = cluster::launch_configuration(
        &mut doc,
        "ConsulLaunchConfiguration",
        &instance,
        &key_pair_name,
        &[&tools_ingress_sg, &consul_client_sg, &consul_server_sg],
        &user_data,
    )?;
    let autoscaling_group = cluster::autoscaling_group(
        &mut doc,
        "ConsulAutoScalingGroup",
        ScalingGroup {
            launch_configuration: &launch_config,
            load_balancer: None,
            desired: capacity.desired.reference(),
            maximum: capacity.maximum.reference(),
            minimum: capacity.minimum.reference(),
            health_check_grace_period: 60,
            health_check_type: "EC2",
            subnets: cluster::subnet_refs(&subnets),
            update_policy: cluster::rolling_update(1, 2, "PT15M", true),
        },
        &tags,
    )?;

    cluster::register_cluster_outputs(&mut doc, &autoscaling_group, &launch_config)?;

    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::LogicalId;
    use crate::resolve::{AdvisoryCategory, ResolvedValue};

    #[test]
    fn test_autoscaling_group_wiring() {
        let doc = build(&StackConfig::default()).unwrap();
        let resolved = doc.resolve().unwrap();
        let group = resolved.get("ConsulAutoScalingGroup").unwrap();

        assert_eq!(group.depends_on, vec![LogicalId::new("ConsulLaunchConfiguration")]);
        match group.attribute("VPCZoneIdentifier") {
            Some(ResolvedValue::List(items)) => {
                assert_eq!(items.len(), 3);
                assert_eq!(items[0], ResolvedValue::Ref("vpcSubnetIdForAz1".to_string()));
            }
            other => panic!("Expected List, got {:?}", other),
        }
        match &group.update_policy {
            Some(ResolvedValue::Map(policy)) => {
                assert!(policy.contains_key("AutoScalingRollingUpdate"));
            }
            other => panic!("Expected update policy, got {:?}", other),
        }
    }

    #[test]
    fn test_only_vpc_id_unused() {
        let doc = build(&StackConfig::default()).unwrap();
        let resolved = doc.resolve().unwrap();
        let advisories = resolved.advisories();
        assert_eq!(advisories.len(), 1);
        assert_eq!(advisories[0].category, AdvisoryCategory::UnusedParameter);
        assert_eq!(advisories[0].id.as_str(), "vpcId");
    }

    #[test]
    fn test_zone_count_follows_network_config() {
        let config = StackConfig {
            network: crate::bundle::NetworkBundle::new()
                .with_subnet_cidr_blocks(["10.0.0.0/24", "10.0.1.0/24"]),
            ..StackConfig::default()
        };
        let doc = build(&config).unwrap();
        assert!(doc.contains("vpcSubnetIdForAz2"));
        assert!(!doc.contains("vpcSubnetIdForAz3"));
    }
}
