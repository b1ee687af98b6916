//! Public gateway cluster behind CloudFront and a WAF web ACL

use crate::attributes;
use crate::bundle::Bundle;
use crate::config::StackConfig;
use crate::document::{
    Declaration, Document, DocumentError, ParameterHandle, ParameterSpec, ResourceHandle, Value,
};

use super::cluster::{self, Capacity, InstanceInputs, LoadBalancer, ScalingGroup};
use super::iam;

pub(super) const DESCRIPTION: &str = "Launches the gateway cluster in the Cerberus VPC";

const ORIGIN_ID: &str = "CerberusGatewayOrigin";
const MATCH_FIELDS: [&str; 3] = ["URI", "QUERY_STRING", "BODY"];
const MAX_BODY_BYTES: i64 = 256_000;

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
    let ssl_certificate_id = doc.declare_parameter(
        "sslCertificateId",
        ParameterSpec::string()
            .with_description("TLS certificate ID for the CloudFront distribution and ELB"),
    )?;
    cluster::declare_vpc_id(&mut doc)?;
    let instance = InstanceInputs::declare(&mut doc, "gateway")?;
    let gateway_elb_sg = cluster::declare_security_group_id(
        &mut doc,
        "gatewayElbSgId",
        "Gateway Server ELB Security Group ID",
    )?;
    let gateway_server_sg = cluster::declare_security_group_id(
        &mut doc,
        "gatewayServerSgId",
        "Gateway Server Security Group ID",
    )?;
    let tools_ingress_sg = cluster::declare_security_group_id(
        &mut doc,
        "toolsIngressSgId",
        "Tools Ingress Security Group ID",
    )?;
    let log_processor_role = doc.declare_parameter(
        "cloudFrontLogProcessorLambdaIamRoleArn",
        ParameterSpec::string().with_description("The IAM Role Arn for the lambda"),
    )?;
    let subnets = cluster::declare_subnet_ids(&mut doc, config.network.zone_count())?;
    let key_pair_name = cluster::declare_key_pair_name(&mut doc, Some("cpe-cerberus"))?;
    let user_data = cluster::declare_user_data(&mut doc, "Gateway User Data")?;
    let hosted_zone_id = doc.declare_parameter(
        "hostedZoneId",
        ParameterSpec::string()
            .with_description("The hosted zone id to associate the CNAME record with"),
    )?;
    let hostname = doc.declare_parameter(
        "hostname",
        ParameterSpec::string()
            .with_description("The base hostname for the public facing gateway / router"),
    )?;
    let waf_lambda_bucket = doc.declare_parameter(
        "wafLambdaBucket",
        ParameterSpec::string().with_description("S3 Bucket for waf lambda function artifact"),
    )?;
    let waf_lambda_key = doc.declare_parameter(
        "wafLambdaKey",
        ParameterSpec::string().with_description("Key for waf lambda function artifact"),
    )?;
    let capacity = Capacity::declare(&mut doc, None)?;

    let elb = cluster::load_balancer(
        &mut doc,
        "GatewayElasticLoadBalancer",
        LoadBalancer {
            policy_prefix: "Gateway",
            scheme: "internet-facing",
            health_check_target: "HTTPS:443/sys/health",
            instance_port: 443,
            instance_protocol: "HTTPS",
            certificate_arn: &ssl_certificate_arn,
            backend_public_key: Some(&cert_public_key),
            security_group: &gateway_elb_sg,
            subnets: cluster::subnet_refs(&subnets),
        },
        &tags,
    )?;
    let launch_config = cluster::launch_configuration(
        &mut doc,
        "GatewayLaunchConfiguration",
        &instance,
        &key_pair_name,
        &[&tools_ingress_sg, &gateway_server_sg],
        &user_data,
    )?;
    let autoscaling_group = cluster::autoscaling_group(
        &mut doc,
        "GatewayAutoScalingGroup",
        ScalingGroup {
            launch_configuration: &launch_config,
            load_balancer: Some(&elb),
            desired: capacity.desired.reference(),
            maximum: capacity.maximum.reference(),
            minimum: capacity.minimum.reference(),
            health_check_grace_period: 300,
            health_check_type: "ELB",
            subnets: cluster::subnet_refs(&subnets),
            update_policy: cluster::rolling_update(1, 2, "PT15M", true),
        },
        &tags,
    )?;
    cluster::cname_record(
        &mut doc,
        "OriginCerberusPublicRecordSet",
        &hosted_zone_id,
        Value::join(".", vec![Value::from("origin"), hostname.reference(), Value::from("")]),
        elb.attribute("CanonicalHostedZoneName"),
    )?;

    let acl = web_acl(&mut doc, &hostname)?;

    let function = doc.declare_resource(
        "LambdaWAFBlacklistingFunction",
        "AWS::Lambda::Function",
        attributes! {
            "Description" => "Function for auto black listing ips that are misbehaving",
            "Handler" => "com.nike.cerberus.lambda.waf.handler.CloudFrontLogEventHandler::handleNewS3Event",
            "Role" => &log_processor_role,
            "Code" => attributes! {
                "S3Bucket" => &waf_lambda_bucket,
                "S3Key" => &waf_lambda_key,
            },
            "Runtime" => "java8",
            "MemorySize" => "512",
            "Timeout" => "60",
        },
    )?;
    doc.add_resource(
        Declaration::resource(
            "LambdaInvokePermission",
            "AWS::Lambda::Permission",
            attributes! {
                "FunctionName" => function.attribute("Arn"),
                "Action" => "lambda:*",
                "Principal" => "s3.amazonaws.com",
                "SourceAccount" => Value::account_id(),
            },
        )
        .depends_on(&function),
    )?;

    // the log processor runs for every gzipped access log CloudFront drops
    let logs_bucket = doc.declare_resource(
        "CloudFrontBucket",
        "AWS::S3::Bucket",
        attributes! {
            "AccessControl" => "BucketOwnerFullControl",
            "Tags" => tags.tags(),
            "NotificationConfiguration" => attributes! {
                "LambdaConfigurations" => vec![attributes! {
                    "Event" => "s3:ObjectCreated:*",
                    "Filter" => attributes! {
                        "S3Key" => attributes! {
                            "Rules" => vec![attributes! { "Name" => "suffix", "Value" => "gz" }],
                        },
                    },
                    "Function" => function.attribute("Arn"),
                }],
            },
        },
    )?;
    doc.declare_resource(
        "CloudFrontLogsBucketPolicy",
        "AWS::S3::BucketPolicy",
        attributes! {
            "Bucket" => &logs_bucket,
            "PolicyDocument" => iam::policy_document(vec![iam::grant(
                "Allow-CloudFront-Log-Access",
                iam::aws_principals(vec![log_processor_role.reference()]),
                &["s3:*"],
                vec![iam::s3_arn(&logs_bucket, "/*")],
            )]),
        },
    )?;

    let distribution = doc.declare_resource(
        "CerberusDistribution",
        "AWS::CloudFront::Distribution",
        attributes! {
            "DistributionConfig" => attributes! {
                "Aliases" => vec![hostname.reference()],
                "DefaultCacheBehavior" => attributes! {
                    "AllowedMethods" => vec!["GET", "PUT", "POST", "DELETE", "PATCH", "HEAD", "OPTIONS"],
                    "CachedMethods" => vec!["GET", "HEAD", "OPTIONS"],
                    "ForwardedValues" => attributes! {
                        "Headers" => vec!["*"],
                        "QueryString" => true,
                    },
                    "MaxTTL" => 0,
                    "MinTTL" => 0,
                    "DefaultTTL" => 0,
                    "TargetOriginId" => ORIGIN_ID,
                    "ViewerProtocolPolicy" => "https-only",
                },
                "Enabled" => true,
                "Origins" => vec![attributes! {
                    "Id" => ORIGIN_ID,
                    "DomainName" => Value::join(".", vec![Value::from("origin"), hostname.reference()]),
                    "CustomOriginConfig" => attributes! {
                        "HTTPSPort" => "443",
                        "OriginProtocolPolicy" => "https-only",
                        "OriginSSLProtocols" => vec!["TLSv1.2"],
                    },
                }],
                "PriceClass" => "PriceClass_100",
                "ViewerCertificate" => attributes! {
                    "IamCertificateId" => &ssl_certificate_id,
                    "MinimumProtocolVersion" => "TLSv1",
                    "SslSupportMethod" => "sni-only",
                },
                "WebACLId" => &acl.web_acl,
                "Logging" => attributes! {
                    "Bucket" => logs_bucket.attribute("DomainName"),
                },
            },
        },
    )?;
    cluster::cname_record(
        &mut doc,
        "CerberusPublicRecordSet",
        &hosted_zone_id,
        Value::join(".", vec![hostname.reference(), Value::from("")]),
        distribution.attribute("DomainName"),
    )?;

    cluster::register_cluster_outputs(&mut doc, &autoscaling_group, &launch_config)?;
    cluster::register_load_balancer_outputs(&mut doc, &elb)?;
    doc.declare_output("cloudFrontDistributionId", &distribution)?;
    doc.declare_output(
        "cloudFrontDistributionDomainName",
        distribution.attribute("DomainName"),
    )?;
    doc.declare_output("cloudFrontAccessLogBucket", &logs_bucket)?;
    doc.declare_output("whiteListIPSetID", &acl.white_list)?;
    doc.declare_output("manualBlockIPSetID", &acl.manual_block)?;
    doc.declare_output("autoBlockIPSetID", &acl.auto_block)?;

    Ok(doc)
}

/// The web ACL and the IP sets the WAF lambda maintains
struct WebAcl {
    web_acl: ResourceHandle,
    white_list: ResourceHandle,
    manual_block: ResourceHandle,
    auto_block: ResourceHandle,
}

fn web_acl(doc: &mut Document, hostname: &ParameterHandle) -> Result<WebAcl, DocumentError> {
    let xss_set = doc.declare_resource(
        "CerberusWafXssMatchSet",
        "AWS::WAF::XssMatchSet",
        attributes! {
            "Name" => "CerberusWafXssMatchSet",
            "XssMatchTuples" => match_tuples(),
        },
    )?;
    let xss_rule = rule(doc, "CerberusWafXssRule", "CerberusWafXss", &xss_set, "XssMatch")?;

    let sql_set = doc.declare_resource(
        "CerberusWafSqlInjectionMatchSet",
        "AWS::WAF::SqlInjectionMatchSet",
        attributes! {
            "Name" => "CerberusWafSqlInjectionMatchSet",
            "SqlInjectionMatchTuples" => match_tuples(),
        },
    )?;
    let sql_rule = rule(
        doc,
        "CerberusWafSqlInjectionRule",
        "CerberusWafSqlInjection",
        &sql_set,
        "SqlInjectionMatch",
    )?;

    let size_set = doc.declare_resource(
        "CerberusWafSizeConstraintSet",
        "AWS::WAF::SizeConstraintSet",
        attributes! {
            "Name" => "CerberusWafSizeConstraintSet",
            "SizeConstraints" => vec![attributes! {
                "ComparisonOperator" => "GE",
                "FieldToMatch" => attributes! { "Type" => "BODY" },
                "Size" => MAX_BODY_BYTES,
                "TextTransformation" => "NONE",
            }],
        },
    )?;
    let size_rule = rule(
        doc,
        "CerberusWafSizeConstraintRule",
        "CerberusWafSizeConstraint",
        &size_set,
        "SizeConstraint",
    )?;

    let white_list = ip_set(doc, "WAFWhiteListSet", "White List Set")?;
    let manual_block = ip_set(doc, "WAFManualBlockSet", "Manual Block Set")?;
    let auto_block = ip_set(doc, "WAFAutoBlockSet", "Auto Block Set")?;
    let white_list_rule = ip_rule(doc, "WAFWhiteListRule", "White List Rule", "WhiteListRule", &white_list)?;
    let manual_block_rule = ip_rule(
        doc,
        "WAFManualBlockRule",
        "Manual Block Rule",
        "ManualBlockRule",
        &manual_block,
    )?;
    let auto_block_rule = ip_rule(doc, "WAFAutoBlockRule", "Auto Block Rule", "AutoBlockRule", &auto_block)?;

    // evaluated by priority; the whitelist wins over both block lists
    let rules = vec![
        ("BLOCK", &size_rule),
        ("BLOCK", &sql_rule),
        ("BLOCK", &xss_rule),
        ("ALLOW", &white_list_rule),
        ("BLOCK", &manual_block_rule),
        ("BLOCK", &auto_block_rule),
    ];
    let rules: Vec<Value> = rules
        .into_iter()
        .zip(1i64..)
        .map(|((action, rule), priority)| {
            Value::from(attributes! {
                "Action" => attributes! { "Type" => action },
                "Priority" => priority,
                "RuleId" => rule,
            })
        })
        .collect();

    let web_acl = doc.add_resource(
        Declaration::resource(
            "CerberusWAFWebAcl",
            "AWS::WAF::WebACL",
            attributes! {
                "MetricName" => "CerberusWAF",
                "DefaultAction" => attributes! { "Type" => "ALLOW" },
                "Name" => Value::join(".", vec![Value::from("waf"), hostname.reference()]),
                "Rules" => rules,
            },
        )
        .depends_on(&manual_block_rule)
        .depends_on(&auto_block_rule),
    )?;

    Ok(WebAcl {
        web_acl,
        white_list,
        manual_block,
        auto_block,
    })
}

/// Inspect every request field without transforming it first
fn match_tuples() -> Value {
    Value::list(MATCH_FIELDS.iter().map(|field| {
        attributes! {
            "FieldToMatch" => attributes! { "Type" => *field },
            "TextTransformation" => "NONE",
        }
    }))
}

fn predicate(data: &ResourceHandle, kind: &str) -> Value {
    Value::from(vec![attributes! {
        "DataId" => data,
        "Negated" => false,
        "Type" => kind,
    }])
}

fn rule(
    doc: &mut Document,
    id: &str,
    metric_name: &str,
    data: &ResourceHandle,
    kind: &str,
) -> Result<ResourceHandle, DocumentError> {
    doc.declare_resource(
        id,
        "AWS::WAF::Rule",
        attributes! {
            "Name" => id,
            "MetricName" => metric_name,
            "Predicates" => predicate(data, kind),
        },
    )
}

fn ip_set(doc: &mut Document, id: &str, name: &str) -> Result<ResourceHandle, DocumentError> {
    doc.declare_resource(id, "AWS::WAF::IPSet", attributes! { "Name" => name })
}

/// Rule matching the addresses of an IP set
fn ip_rule(
    doc: &mut Document,
    id: &str,
    name: &str,
    metric_name: &str,
    set: &ResourceHandle,
) -> Result<ResourceHandle, DocumentError> {
    doc.add_resource(
        Declaration::resource(
            id,
            "AWS::WAF::Rule",
            attributes! {
                "Name" => name,
                "MetricName" => metric_name,
                "Predicates" => predicate(set, "IPMatch"),
            },
        )
        .depends_on(set),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{LogicalId, Section};
    use crate::resolve::{AdvisoryCategory, ResolvedValue};

    fn ids(items: &[&str]) -> Vec<LogicalId> {
        items.iter().map(|id| LogicalId::new(*id)).collect()
    }

    #[test]
    fn test_web_acl_dependencies() {
        let resolved = build(&StackConfig::default()).unwrap().resolve().unwrap();
        let acl = resolved.get("CerberusWAFWebAcl").unwrap();
        assert_eq!(
            acl.depends_on,
            ids(&[
                "WAFManualBlockRule",
                "WAFAutoBlockRule",
                "CerberusWafSizeConstraintRule",
                "CerberusWafSqlInjectionRule",
                "CerberusWafXssRule",
                "WAFWhiteListRule",
            ])
        );
        let rule = resolved.get("WAFWhiteListRule").unwrap();
        assert_eq!(rule.depends_on, ids(&["WAFWhiteListSet"]));
    }

    #[test]
    fn test_rule_priorities() {
        let doc = build(&StackConfig::default()).unwrap();
        let rules = match doc.get("CerberusWAFWebAcl").and_then(|d| d.attribute("Rules")) {
            Some(Value::List(rules)) => rules.clone(),
            other => panic!("Expected rule list, got {:?}", other),
        };
        assert_eq!(rules.len(), 6);
        assert_eq!(
            rules[3],
            Value::from(attributes! {
                "Action" => attributes! { "Type" => "ALLOW" },
                "Priority" => 4i64,
                "RuleId" => Value::reference("WAFWhiteListRule"),
            })
        );
    }

    #[test]
    fn test_distribution_logs_to_bucket() {
        let resolved = build(&StackConfig::default()).unwrap().resolve().unwrap();
        let distribution = resolved.get("CerberusDistribution").unwrap();
        assert_eq!(
            distribution.depends_on,
            ids(&["CerberusWAFWebAcl", "CloudFrontBucket"])
        );
        let bucket = resolved.get("CloudFrontBucket").unwrap();
        assert_eq!(bucket.depends_on, ids(&["LambdaWAFBlacklistingFunction"]));
        match resolved
            .get("LambdaInvokePermission")
            .and_then(|p| p.attribute("Principal"))
        {
            Some(ResolvedValue::String(principal)) => assert_eq!(principal, "s3.amazonaws.com"),
            other => panic!("Expected principal, got {:?}", other),
        }
    }

    #[test]
    fn test_only_vpc_id_unused() {
        let resolved = build(&StackConfig::default()).unwrap().resolve().unwrap();
        let advisories = resolved.advisories();
        assert_eq!(advisories.len(), 1);
        assert_eq!(advisories[0].category, AdvisoryCategory::UnusedParameter);
        assert_eq!(advisories[0].id.as_str(), "vpcId");
    }

    #[test]
    fn test_outputs() {
        let resolved = build(&StackConfig::default()).unwrap().resolve().unwrap();
        let outputs: Vec<&str> = resolved
            .section(Section::Output)
            .map(|d| d.id.as_str())
            .collect();
        assert_eq!(
            outputs,
            vec![
                "autoscalingGroupLogicalId",
                "launchConfigurationLogicalId",
                "elbLogicalId",
                "elbCanonicalHostedZoneNameId",
                "elbDnsName",
                "elbSourceSecurityGroupName",
                "elbSourceSecurityGroupOwnerAlias",
                "cloudFrontDistributionId",
                "cloudFrontDistributionDomainName",
                "cloudFrontAccessLogBucket",
                "whiteListIPSetID",
                "manualBlockIPSetID",
                "autoBlockIPSetID",
            ]
        );
    }
}
