//! Vault server cluster, joined to Consul and fronted by an internal load balancer

use crate::bundle::Bundle;
use crate::config::StackConfig;
use crate::document::{Document, DocumentError, ParameterSpec};

use super::cluster::{
    self, Capacity, InstanceInputs, LoadBalancer, RollingUpdateInputs, ScalingGroup,
};

pub(super) const DESCRIPTION: &str = "Launches the Vault stack in the Cerberus VPC";

const VAULT_PORT: u16 = 8200;

pub fn build(config: &StackConfig) -> Result<Document, DocumentError> {
    let mut doc = Document::new(DESCRIPTION);
    let tags = config.tags.register_into(&mut doc)?;

    let cert_public_key = doc.declare_parameter(
        "certPublicKey",
        ParameterSpec::string()
            .with_description("TLS certificate public key to be used for backend authentication"),
    )?;
    let ssl_certificate_arn = doc.declare_parameter(
        "sslCertificateArn",
        ParameterSpec::string().with_description("TLS certificate ARN for the ELB"),
    )?;
    cluster::declare_vpc_id(&mut doc)?;
    let instance = InstanceInputs::declare(&mut doc, "Vault")?;
    let vault_server_elb_sg = cluster::declare_security_group_id(
        &mut doc,
        "vaultServerElbSgId",
        "Vault Server ELB Security Group ID",
    )?;
    let tools_ingress_sg = cluster::declare_security_group_id(
        &mut doc,
        "toolsIngressSgId",
        "Tools Ingress Security Group ID",
    )?;
    let vault_client_sg = cluster::declare_security_group_id(
        &mut doc,
        "vaultClientSgId",
        "Vault Security Group ID for clients",
    )?;
    let vault_server_sg = cluster::declare_security_group_id(
        &mut doc,
        "vaultServerSgId",
        "Vault Security Group ID for servers",
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
    let subnets = cluster::declare_subnet_ids(&mut doc, config.network.zone_count())?;
    let key_pair_name = cluster::declare_key_pair_name(&mut doc, Some("cpe-cerberus"))?;
    let user_data = cluster::declare_user_data(&mut doc, "Vault User Data")?;
    let hosted_zone_id = doc.declare_parameter(
        "hostedZoneId",
        ParameterSpec::string()
            .with_description("The hosted zone id to associate the CNAME record with"),
    )?;
    let cname = doc.declare_parameter(
        "cname",
        ParameterSpec::string().with_description("The CNAME to be created"),
    )?;
    let capacity = Capacity::declare(&mut doc, Some((3, 4, 3)))?;
    let rolling_update = RollingUpdateInputs::declare(&mut doc)?;

    let elb = cluster::load_balancer(
        &mut doc,
        "VaultElasticLoadBalancer",
        LoadBalancer {
            policy_prefix: "Vault",
            scheme: "internal",
            health_check_target: "HTTPS:8200/v1/sys/health",
            instance_port: VAULT_PORT,
            instance_protocol: "HTTPS",
            certificate_arn: &ssl_certificate_arn,
            backend_public_key: Some(&cert_public_key),
            security_group: &vault_server_elb_sg,
            subnets: cluster::subnet_refs(&subnets),
        },
        &tags,
    )?;
    let launch_config = cluster::launch_configuration(
        &mut doc,
        "VaultLaunchConfiguration",
        &instance,
        &key_pair_name,
        &[
            &tools_ingress_sg,
            &vault_client_sg,
            &vault_server_sg,
            &consul_client_sg,
            &consul_server_sg,
        ],
        &user_data,
    )?;
    let autoscaling_group = cluster::autoscaling_group(
        &mut doc,
        "VaultAutoScalingGroup",
        ScalingGroup {
            launch_configuration: &launch_config,
            load_balancer: Some(&elb),
            desired: capacity.desired.reference(),
            maximum: capacity.maximum.reference(),
            minimum: capacity.minimum.reference(),
            health_check_grace_period: 60,
            health_check_type: "EC2",
            subnets: cluster::subnet_refs(&subnets),
            update_policy: rolling_update.policy(&capacity.minimum),
        },
        &tags,
    )?;
    cluster::cname_record(
        &mut doc,
        "VaultRecordSet",
        &hosted_zone_id,
        &cname,
        elb.attribute("DNSName"),
    )?;

    cluster::register_cluster_outputs(&mut doc, &autoscaling_group, &launch_config)?;
    cluster::register_load_balancer_outputs(&mut doc, &elb)?;

    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{LogicalId, Value};
    use crate::resolve::ResolvedValue;

    #[test]
    fn test_backend_authentication_port() {
        let doc = build(&StackConfig::default()).unwrap();
        let policies = match doc
            .get("VaultElasticLoadBalancer")
            .and_then(|d| d.attribute("Policies"))
        {
            Some(Value::List(policies)) => policies.clone(),
            other => panic!("Expected policies, got {:?}", other),
        };
        assert_eq!(policies.len(), 3);
        match &policies[2] {
            Value::Map(policy) => {
                assert_eq!(policy.get("InstancePorts"), Some(&Value::from(vec!["8200"])));
            }
            other => panic!("Expected Map, got {:?}", other),
        }
    }

    #[test]
    fn test_launch_configuration_joins_consul() {
        let resolved = build(&StackConfig::default()).unwrap().resolve().unwrap();
        let launch_config = resolved.get("VaultLaunchConfiguration").unwrap();
        match launch_config.attribute("SecurityGroups") {
            Some(ResolvedValue::List(groups)) => {
                assert_eq!(groups.len(), 5);
                assert_eq!(groups[4], ResolvedValue::Ref("consulServerSgId".to_string()));
            }
            other => panic!("Expected List, got {:?}", other),
        }
        assert!(launch_config.depends_on.is_empty());

        let group = resolved.get("VaultAutoScalingGroup").unwrap();
        assert_eq!(
            group.depends_on,
            vec![
                LogicalId::new("VaultLaunchConfiguration"),
                LogicalId::new("VaultElasticLoadBalancer"),
            ]
        );
    }

    #[test]
    fn test_only_vpc_id_unused() {
        let resolved = build(&StackConfig::default()).unwrap().resolve().unwrap();
        let unused: Vec<&str> = resolved.advisories().iter().map(|a| a.id.as_str()).collect();
        assert_eq!(unused, vec!["vpcId"]);
    }
}
