//! Single instance that backs up the CMS database

use crate::bundle::Bundle;
use crate::config::StackConfig;
use crate::document::{Document, DocumentError, Value};

use super::cluster::{self, InstanceInputs, ScalingGroup};

pub(super) const DESCRIPTION: &str = "Launches the RDS backup stack in the Cerberus VPC";

pub fn build(config: &StackConfig) -> Result<Document, DocumentError> {
    let mut doc = Document::new(DESCRIPTION);
    let tags = config.tags.register_into(&mut doc)?;

    cluster::declare_vpc_id(&mut doc)?;
    let instance = InstanceInputs::declare(&mut doc, "RDS backup")?;
    let tools_ingress_sg = cluster::declare_security_group_id(
        &mut doc,
        "toolsIngressSgId",
        "Tools Ingress Security Group ID",
    )?;
    let cms_sg = cluster::declare_security_group_id(
        &mut doc,
        "cmsSgId",
        "CMS Security Group ID for servers",
    )?;
    let subnets = cluster::declare_subnet_ids(&mut doc, config.network.zone_count())?;
    let key_pair_name = cluster::declare_key_pair_name(&mut doc, None)?;
    let user_data = cluster::declare_user_data(&mut doc, "RDS backup cluster user data")?;

    let launch_config = cluster::launch_configuration(
        &mut doc,
        "RdsBackupLaunchConfiguration",
        &instance,
        &key_pair_name,
        &[&tools_ingress_sg, &cms_sg],
        &user_data,
    )?;
    // exactly one instance; replacements may leave none running
    let autoscaling_group = cluster::autoscaling_group(
        &mut doc,
        "RdsBackupAutoScalingGroup",
        ScalingGroup {
            launch_configuration: &launch_config,
            load_balancer: None,
            desired: Value::from(1),
            maximum: Value::from(1),
            minimum: Value::from(1),
            health_check_grace_period: 60,
            health_check_type: "EC2",
            subnets: cluster::subnet_refs(&subnets),
            update_policy: cluster::rolling_update(1, 0, "PT5M", false),
        },
        &tags,
    )?;

    cluster::register_cluster_outputs(&mut doc, &autoscaling_group, &launch_config)?;

    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Number, Section};
    use crate::resolve::ResolvedValue;

    #[test]
    fn test_fixed_single_instance() {
        let resolved = build(&StackConfig::default()).unwrap().resolve().unwrap();
        let group = resolved.get("RdsBackupAutoScalingGroup").unwrap();
        for key in ["DesiredCapacity", "MaxSize", "MinSize"] {
            assert_eq!(
                group.attribute(key),
                Some(&ResolvedValue::Number(Number::Int(1))),
                "{}",
                key
            );
        }
        assert!(group.attribute("LoadBalancerNames").is_none());
    }

    #[test]
    fn test_key_pair_has_no_default() {
        let doc = build(&StackConfig::default()).unwrap();
        let key_pair = doc.get("keyPairName").unwrap();
        assert!(key_pair.attribute("Default").is_none());
        assert_eq!(doc.section(Section::Output).count(), 2);
    }
}
