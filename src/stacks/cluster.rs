//! Building blocks of the autoscaled instance clusters
//!
//! Every cluster stack takes the ids the VPC stack outputs as parameters,
//! launches instances from a launch configuration into an autoscaling group
//! and, for the clusters serving traffic, fronts the group with a classic
//! load balancer.

use crate::attributes;
use crate::bundle::TagHandles;
use crate::document::{
    Declaration, Document, DocumentError, ParameterHandle, ParameterSpec, ResourceHandle, Value,
};

pub(super) const SECURITY_GROUP_ID: &str = "AWS::EC2::SecurityGroup::Id";

const TLS_SECURITY_POLICY: &str = "ELBSecurityPolicy-2015-05";

/// The VPC id parameter.
///
/// Cluster stacks accept it so callers can pass every VPC output through,
/// but none of them references it.
pub(super) fn declare_vpc_id(doc: &mut Document) -> Result<ParameterHandle, DocumentError> {
    doc.declare_parameter(
        "vpcId",
        ParameterSpec::of_type("AWS::EC2::VPC::Id").with_description("The ID of the VPC"),
    )
}

pub(super) fn declare_security_group_id(
    doc: &mut Document,
    id: &str,
    description: &str,
) -> Result<ParameterHandle, DocumentError> {
    doc.declare_parameter(
        id,
        ParameterSpec::of_type(SECURITY_GROUP_ID).with_description(description),
    )
}

/// One subnet id parameter per zone
pub(super) fn declare_subnet_ids(
    doc: &mut Document,
    zones: usize,
) -> Result<Vec<ParameterHandle>, DocumentError> {
    (1..=zones)
        .map(|zone| {
            doc.declare_parameter(
                format!("vpcSubnetIdForAz{}", zone),
                ParameterSpec::string().with_description(format!("VPC Subnet ID for Zone {}", zone)),
            )
        })
        .collect()
}

pub(super) fn subnet_refs(subnets: &[ParameterHandle]) -> Value {
    Value::list(subnets.iter().map(ParameterHandle::reference))
}

pub(super) fn declare_key_pair_name(
    doc: &mut Document,
    default: Option<&str>,
) -> Result<ParameterHandle, DocumentError> {
    let mut spec = ParameterSpec::string()
        .with_description("The key pair to be associated with the EC2 instances");
    if let Some(default) = default {
        spec = spec.with_default(default);
    }
    doc.declare_parameter("keyPairName", spec)
}

pub(super) fn declare_user_data(
    doc: &mut Document,
    description: &str,
) -> Result<ParameterHandle, DocumentError> {
    doc.declare_parameter("userData", ParameterSpec::string().with_description(description))
}

/// What the instances of a cluster are launched from
#[derive(Debug, Clone)]
pub(super) struct InstanceInputs {
    pub instance_profile: ParameterHandle,
    pub ami_id: ParameterHandle,
    pub instance_size: ParameterHandle,
}

impl InstanceInputs {
    pub fn declare(doc: &mut Document, service: &str) -> Result<Self, DocumentError> {
        Ok(Self {
            instance_profile: doc.declare_parameter(
                "instanceProfileName",
                ParameterSpec::string()
                    .with_description(format!("The name for the {} instance profile", service)),
            )?,
            ami_id: doc.declare_parameter(
                "amiId",
                ParameterSpec::string()
                    .with_description(format!("The AMI ID for the {} instances", service)),
            )?,
            instance_size: doc.declare_parameter(
                "instanceSize",
                ParameterSpec::string()
                    .with_description(format!("The instance size for the {} instances", service)),
            )?,
        })
    }
}

/// Autoscaling group sizes supplied at deploy time
#[derive(Debug, Clone)]
pub(super) struct Capacity {
    pub desired: ParameterHandle,
    pub maximum: ParameterHandle,
    pub minimum: ParameterHandle,
}

impl Capacity {
    /// Declare the size parameters, optionally defaulting to `(desired, maximum, minimum)`
    pub fn declare(doc: &mut Document, defaults: Option<(u32, u32, u32)>) -> Result<Self, DocumentError> {
        let size = |description: &str, default: Option<u32>| {
            let spec = ParameterSpec::number().with_description(description);
            match default {
                Some(default) => spec.with_default(default.to_string()),
                None => spec,
            }
        };
        let maximum_description = if defaults.is_some() {
            "Maximum Number of Auto Scaling Instances (must be larger than min)"
        } else {
            "Maximum Number of Auto Scaling Instances"
        };

        Ok(Self {
            desired: doc.declare_parameter(
                "desiredInstances",
                size("Desired Number of Auto Scaling Instances", defaults.map(|d| d.0)),
            )?,
            maximum: doc.declare_parameter(
                "maximumInstances",
                size(maximum_description, defaults.map(|d| d.1)),
            )?,
            minimum: doc.declare_parameter(
                "minimumInstances",
                size("Minimum Number of Auto Scaling Instances", defaults.map(|d| d.2)),
            )?,
        })
    }
}

/// Rolling update pacing supplied at deploy time
#[derive(Debug, Clone)]
pub(super) struct RollingUpdateInputs {
    pub pause_time: ParameterHandle,
    pub wait_on_resource_signals: ParameterHandle,
}

impl RollingUpdateInputs {
    pub fn declare(doc: &mut Document) -> Result<Self, DocumentError> {
        Ok(Self {
            pause_time: doc.declare_parameter(
                "pauseTime",
                ParameterSpec::string()
                    .with_description("Pause time for AutoScalingRollingUpdate e.g PT15M")
                    .with_default("PT15M"),
            )?,
            wait_on_resource_signals: doc.declare_parameter(
                "waitOnResourceSignals",
                ParameterSpec::string()
                    .with_description(
                        "Enabling WaitOnResourceSignals allows CloudFormation to wait until you have received a success signal before performing the next scaling action.",
                    )
                    .with_default("True"),
            )?,
        })
    }

    /// Rolling update driven by these parameters, keeping `minimum` in service
    pub fn policy(&self, minimum: &ParameterHandle) -> Value {
        rolling_update(1, minimum, &self.pause_time, &self.wait_on_resource_signals)
    }
}

/// Replace instances a batch at a time
pub(super) fn rolling_update(
    max_batch_size: impl Into<Value>,
    min_in_service: impl Into<Value>,
    pause_time: impl Into<Value>,
    wait_on_resource_signals: impl Into<Value>,
) -> Value {
    let max_batch_size: Value = max_batch_size.into();
    let min_in_service: Value = min_in_service.into();
    let pause_time: Value = pause_time.into();
    let wait_on_resource_signals: Value = wait_on_resource_signals.into();
    Value::from(attributes! {
        "AutoScalingRollingUpdate" => attributes! {
            "MaxBatchSize" => max_batch_size,
            "MinInstancesInService" => min_in_service,
            "PauseTime" => pause_time,
            "WaitOnResourceSignals" => wait_on_resource_signals,
        },
    })
}

pub(super) fn launch_configuration(
    doc: &mut Document,
    id: &str,
    instance: &InstanceInputs,
    key_pair_name: &ParameterHandle,
    security_groups: &[&ParameterHandle],
    user_data: &ParameterHandle,
) -> Result<ResourceHandle, DocumentError> {
    let security_groups: Vec<Value> = security_groups.iter().map(|sg| sg.reference()).collect();
    doc.declare_resource(
        id,
        "AWS::AutoScaling::LaunchConfiguration",
        attributes! {
            "AssociatePublicIpAddress" => true,
            "IamInstanceProfile" => &instance.instance_profile,
            "ImageId" => &instance.ami_id,
            "InstanceMonitoring" => true,
            "InstanceType" => &instance.instance_size,
            "KeyName" => key_pair_name,
            "SecurityGroups" => security_groups,
            "UserData" => user_data,
        },
    )
}

/// Settings of an autoscaling group
pub(super) struct ScalingGroup<'a> {
    pub launch_configuration: &'a ResourceHandle,
    pub load_balancer: Option<&'a ResourceHandle>,
    pub desired: Value,
    pub maximum: Value,
    pub minimum: Value,
    pub health_check_grace_period: i64,
    pub health_check_type: &'a str,
    pub subnets: Value,
    pub update_policy: Value,
}

pub(super) fn autoscaling_group(
    doc: &mut Document,
    id: &str,
    group: ScalingGroup<'_>,
    tags: &TagHandles,
) -> Result<ResourceHandle, DocumentError> {
    let mut attributes = attributes! {
        "DesiredCapacity" => group.desired,
        "HealthCheckGracePeriod" => group.health_check_grace_period,
        "HealthCheckType" => group.health_check_type,
        "LaunchConfigurationName" => group.launch_configuration,
    };
    if let Some(load_balancer) = group.load_balancer {
        attributes.insert(
            "LoadBalancerNames".to_string(),
            Value::from(vec![load_balancer.reference()]),
        );
    }
    attributes.extend(attributes! {
        "MaxSize" => group.maximum,
        "MinSize" => group.minimum,
        "VPCZoneIdentifier" => group.subnets,
        "Tags" => tags.autoscaling_tags(),
    });

    doc.add_resource(
        Declaration::resource(id, "AWS::AutoScaling::AutoScalingGroup", attributes)
            .with_update_policy(group.update_policy),
    )
}

/// Settings of a classic load balancer terminating TLS on 443
pub(super) struct LoadBalancer<'a> {
    /// Prefix of the listener policy names
    pub policy_prefix: &'a str,
    pub scheme: &'a str,
    pub health_check_target: &'a str,
    pub instance_port: u16,
    pub instance_protocol: &'a str,
    pub certificate_arn: &'a ParameterHandle,
    /// Authenticate backends against this public key
    pub backend_public_key: Option<&'a ParameterHandle>,
    pub security_group: &'a ParameterHandle,
    pub subnets: Value,
}

pub(super) fn load_balancer(
    doc: &mut Document,
    id: &str,
    elb: LoadBalancer<'_>,
    tags: &TagHandles,
) -> Result<ResourceHandle, DocumentError> {
    let tls_policy = format!("{}TLSNegotiationPolicy", elb.policy_prefix);
    let mut policies = vec![elb_policy(
        &tls_policy,
        "SSLNegotiationPolicyType",
        "Reference-Security-Policy",
        TLS_SECURITY_POLICY,
    )];
    if let Some(public_key) = elb.backend_public_key {
        let key_policy = format!("{}PublicKeyPolicy", elb.policy_prefix);
        policies.push(elb_policy(
            &key_policy,
            "PublicKeyPolicyType",
            "PublicKey",
            public_key,
        ));
        let mut backend = elb_policy(
            &format!("{}BackendServerAuthenticationPolicy", elb.policy_prefix),
            "BackendServerAuthenticationPolicyType",
            "PublicKeyPolicyName",
            key_policy.as_str(),
        );
        if let Value::Map(entries) = &mut backend {
            entries.insert(
                "InstancePorts".to_string(),
                Value::from(vec![elb.instance_port.to_string()]),
            );
        }
        policies.push(backend);
    }

    doc.declare_resource(
        id,
        "AWS::ElasticLoadBalancing::LoadBalancer",
        attributes! {
            "ConnectionDrainingPolicy" => attributes! { "Enabled" => true, "Timeout" => 10 },
            "ConnectionSettings" => attributes! { "IdleTimeout" => 10 },
            "CrossZone" => true,
            "HealthCheck" => attributes! {
                "HealthyThreshold" => 2,
                "Interval" => 5,
                "Target" => elb.health_check_target,
                "Timeout" => 2,
                "UnhealthyThreshold" => 2,
            },
            "Listeners" => vec![attributes! {
                "InstancePort" => elb.instance_port,
                "InstanceProtocol" => elb.instance_protocol,
                "LoadBalancerPort" => 443,
                "PolicyNames" => vec![tls_policy],
                "Protocol" => "HTTPS",
                "SSLCertificateId" => elb.certificate_arn,
            }],
            "Policies" => policies,
            "Scheme" => elb.scheme,
            "SecurityGroups" => vec![elb.security_group.reference()],
            "Subnets" => elb.subnets,
            "Tags" => tags.tags(),
        },
    )
}

fn elb_policy(name: &str, kind: &str, attribute: &str, value: impl Into<Value>) -> Value {
    let value: Value = value.into();
    Value::from(attributes! {
        "PolicyName" => name,
        "PolicyType" => kind,
        "Attributes" => vec![attributes! {
            "Name" => attribute,
            "Value" => value,
        }],
    })
}

/// CNAME record pointing `name` at `target`
pub(super) fn cname_record(
    doc: &mut Document,
    id: &str,
    hosted_zone: &ParameterHandle,
    name: impl Into<Value>,
    target: Value,
) -> Result<ResourceHandle, DocumentError> {
    let name: Value = name.into();
    doc.declare_resource(
        id,
        "AWS::Route53::RecordSet",
        attributes! {
            "HostedZoneId" => hosted_zone,
            "Name" => name,
            "TTL" => 30,
            "Type" => "CNAME",
            "ResourceRecords" => vec![target],
        },
    )
}

/// Outputs naming the group and launch configuration, for rolling deploys
pub(super) fn register_cluster_outputs(
    doc: &mut Document,
    autoscaling_group: &ResourceHandle,
    launch_configuration: &ResourceHandle,
) -> Result<(), DocumentError> {
    doc.declare_output("autoscalingGroupLogicalId", autoscaling_group)?;
    doc.declare_output("launchConfigurationLogicalId", launch_configuration)
}

pub(super) fn register_load_balancer_outputs(
    doc: &mut Document,
    elb: &ResourceHandle,
) -> Result<(), DocumentError> {
    doc.declare_output("elbLogicalId", elb)?;
    doc.declare_output(
        "elbCanonicalHostedZoneNameId",
        elb.attribute("CanonicalHostedZoneNameID"),
    )?;
    doc.declare_output("elbDnsName", elb.attribute("DNSName"))?;
    doc.declare_output(
        "elbSourceSecurityGroupName",
        elb.attribute("SourceSecurityGroup.GroupName"),
    )?;
    doc.declare_output(
        "elbSourceSecurityGroupOwnerAlias",
        elb.attribute("SourceSecurityGroup.OwnerAlias"),
    )
}
