//! Cerberus management service cluster behind an internal load balancer

use crate::bundle::Bundle;
use crate::config::StackConfig;
use crate::document::{Document, DocumentError, ParameterSpec};

use super::cluster::{
    self, Capacity, InstanceInputs, LoadBalancer, RollingUpdateInputs, ScalingGroup,
};

pub(super) const DESCRIPTION: &str = "Launches the CMS cluster in the Cerberus VPC";

pub fn build(config: &StackConfig) -> Result<Document, DocumentError> {
    let mut doc = Document::new(DESCRIPTION);
    let tags = config.tags.register_into(&mut doc)?;

    // accepted alongside the other cluster inputs; the CMS listener does
    // not authenticate its backends
    doc.declare_parameter(
        "certPublicKey",
        ParameterSpec::string()
            .with_description("TLS certificate public key to be used for backend authentication"),
    )?;
    let ssl_certificate_arn = doc.declare_parameter(
        "sslCertificateArn",
        ParameterSpec::string().with_description("TLS certificate ARN for the CMS ELB"),
    )?;
    cluster::declare_vpc_id(&mut doc)?;
    let instance = InstanceInputs::declare(&mut doc, "CMS")?;
    let cms_elb_sg =
        cluster::declare_security_group_id(&mut doc, "cmsElbSgId", "CMS ELB Security Group ID")?;
    let cms_sg = cluster::declare_security_group_id(&mut doc, "cmsSgId", "CMS Security Group ID")?;
    let tools_ingress_sg = cluster::declare_security_group_id(
        &mut doc,
        "toolsIngressSgId",
        "Tools Ingress Security Group ID",
    )?;
    let subnets = cluster::declare_subnet_ids(&mut doc, config.network.zone_count())?;
    let key_pair_name = cluster::declare_key_pair_name(&mut doc, Some("cpe-cerberus"))?;
    let user_data = cluster::declare_user_data(&mut doc, "CMS user data")?;
    let hosted_zone_id = doc.declare_parameter(
        "hostedZoneId",
        ParameterSpec::string()
            .with_description("The hosted zone id to associate the CNAME record with"),
    )?;
    let cname = doc.declare_parameter(
        "cname",
        ParameterSpec::string().with_description("The CNAME to be created for the CMS ELB"),
    )?;
    let capacity = Capacity::declare(&mut doc, Some((3, 4, 3)))?;
    let rolling_update = RollingUpdateInputs::declare(&mut doc)?;

    let elb = cluster::load_balancer(
        &mut doc,
        "CmsElasticLoadBalancer",
        LoadBalancer {
            policy_prefix: "Cms",
            scheme: "internal",
            health_check_target: "HTTP:8080/healthcheck",
            instance_port: 8080,
            instance_protocol: "HTTP",
            certificate_arn: &ssl_certificate_arn,
            backend_public_key: None,
            security_group: &cms_elb_sg,
            subnets: cluster::subnet_refs(&subnets),
        },
        &tags,
    )?;
    let launch_config = cluster::launch_configuration(
        &mut doc,
        "CmsLaunchConfiguration",
        &instance,
        &key_pair_name,
        &[&tools_ingress_sg, &cms_sg],
        &user_data,
    )?;
    let autoscaling_group = cluster::autoscaling_group(
        &mut doc,
        "CmsAutoScalingGroup",
        ScalingGroup {
            launch_configuration: &launch_config,
            load_balancer: Some(&elb),
            desired: capacity.desired.reference(),
            maximum: capacity.maximum.reference(),
            minimum: capacity.minimum.reference(),
            health_check_grace_period: 900,
            health_check_type: "ELB",
            subnets: cluster::subnet_refs(&subnets),
            update_policy: rolling_update.policy(&capacity.minimum),
        },
        &tags,
    )?;
    cluster::cname_record(
        &mut doc,
        "CmsRecordSet",
        &hosted_zone_id,
        &cname,
        elb.attribute("DNSName"),
    )?;

    cluster::register_cluster_outputs(&mut doc, &autoscaling_group, &launch_config)?;
    cluster::register_load_balancer_outputs(&mut doc, &elb)?;

    Ok(doc)
}
