//! The VPC and the networking every other stack is launched into
//!
//! Besides the network itself this stack owns everything the clusters share:
//! security groups, instance roles, the config bucket with its encryption key
//! and the CMS database.

use crate::attributes;
use crate::bundle::{Bundle, TagHandles};
use crate::config::StackConfig;
use crate::document::{
    Attributes, Declaration, Document, DocumentError, ParameterHandle, ParameterSpec,
    ResourceHandle, Value,
};

use super::iam::{self, allow, aws_principals, grant, inline_policy, s3_arn};

pub(super) const DESCRIPTION: &str = "Creates the Cerberus VPC and foundational resources";

const CONSUL_PORT_RPC: u16 = 8300;
const CONSUL_PORTS_GOSSIP: [u16; 2] = [8301, 8302];
const CMS_PORTS: [u16; 3] = [8443, 8080, 8077];
const VAULT_PORTS: [u16; 2] = [8200, 8201];

const JDBC_OPTIONS: &str =
    "?useUnicode=true&characterEncoding=utf8&useLegacyDatetimeCode=false&serverTimezone=UTC";

const INSTANCE_ACTIONS: [&str; 2] = ["EC2:Describe*", "cloudformation:SignalResource"];

const CMS_KMS_ACTIONS: [&str; 16] = [
    "kms:CreateAlias",
    "kms:CreateKey",
    "kms:DeleteAlias",
    "kms:DescribeKey",
    "kms:DisableKey",
    "kms:DisableKeyRotation",
    "kms:EnableKey",
    "kms:EnableKeyRotation",
    "kms:GetKeyPolicy",
    "kms:GetKeyRotationStatus",
    "kms:ListAliases",
    "kms:ListKeyPolicies",
    "kms:ListKeys",
    "kms:PutKeyPolicy",
    "kms:UpdateAlias",
    "kms:UpdateKeyDescription",
];

pub fn build(config: &StackConfig) -> Result<Document, DocumentError> {
    let mut doc = Document::new(DESCRIPTION);
    let tags = config.tags.register_into(&mut doc)?;
    let network = config.network.register_into(&mut doc)?;

    let account_admin_arn = doc.declare_parameter(
        "accountAdminArn",
        ParameterSpec::string()
            .with_description("The ARN for a IAM user, group or role that can create this stack."),
    )?;
    let mut zones: Vec<ParameterHandle> = Vec::new();
    for zone in network.zones() {
        zones.push(doc.declare_parameter(
            format!("az{}", zone),
            ParameterSpec::string()
                .with_description(format!("An availability zone identifier for zone '{}'", zone))
                .with_allowed_pattern(r"[a-z]{2}-[a-z]+-\d\w"),
        )?);
    }
    let database = DatabaseInputs::declare(&mut doc)?;
    let hosted_zone_name = doc.declare_parameter(
        "vpcHostedZoneName",
        ParameterSpec::string().with_description("The hosted zone name used in the Cerberus VPC"),
    )?;

    let vpc = doc.declare_resource(
        "CerberusVpc",
        "AWS::EC2::VPC",
        attributes! {
            "CidrBlock" => network.vpc_cidr_block(),
            "EnableDnsSupport" => true,
            "EnableDnsHostnames" => true,
            "Tags" => tags.tags(),
        },
    )?;

    // us-east-1 uses ec2.internal, every other region <region>.<suffix>
    let east_one = doc.declare_condition(
        "RegionEqualsEastOne",
        Value::equals(Value::region(), "us-east-1"),
    )?;
    let dhcp_options = doc.declare_resource(
        "CerberusDhcpOptions",
        "AWS::EC2::DHCPOptions",
        attributes! {
            "DomainName" => east_one.choose(
                "ec2.internal",
                Value::join(".", vec![Value::region(), network.domain_name_suffix()]),
            ),
            "DomainNameServers" => vec!["AmazonProvidedDNS"],
            "Tags" => tags.tags(),
        },
    )?;
    doc.declare_resource(
        "CerberusVpcDhcpOptionsAssociation",
        "AWS::EC2::VPCDHCPOptionsAssociation",
        attributes! {
            "DhcpOptionsId" => &dhcp_options,
            "VpcId" => &vpc,
        },
    )?;

    let route_table = doc.declare_resource(
        "CerberusRouteTable",
        "AWS::EC2::RouteTable",
        attributes! {
            "VpcId" => &vpc,
            "Tags" => tags.tags(),
        },
    )?;
    let internet_gateway = doc.declare_resource(
        "CerberusInternetGateway",
        "AWS::EC2::InternetGateway",
        attributes! { "Tags" => tags.tags() },
    )?;
    doc.declare_resource(
        "CerberusRouteInternetGateway",
        "AWS::EC2::Route",
        attributes! {
            "DestinationCidrBlock" => network.gateway_cidr_block(),
            "GatewayId" => &internet_gateway,
            "RouteTableId" => &route_table,
        },
    )?;
    doc.declare_resource(
        "CerberusVpcGatewayAttachment",
        "AWS::EC2::VPCGatewayAttachment",
        attributes! {
            "InternetGatewayId" => &internet_gateway,
            "VpcId" => &vpc,
        },
    )?;

    let mut subnets: Vec<ResourceHandle> = Vec::new();
    for ((zone, cidr_block), az) in network.subnet_cidr_blocks().zip(&zones) {
        let subnet = doc.declare_resource(
            format!("CerberusSubnetForAz{}", zone),
            "AWS::EC2::Subnet",
            attributes! {
                "AvailabilityZone" => az,
                "CidrBlock" => cidr_block,
                "MapPublicIpOnLaunch" => true,
                "VpcId" => &vpc,
                "Tags" => tags.tags(),
            },
        )?;
        doc.declare_resource(
            format!("CerberusSubnetRouteTableAssociationForAz{}", zone),
            "AWS::EC2::SubnetRouteTableAssociation",
            attributes! {
                "RouteTableId" => &route_table,
                "SubnetId" => &subnet,
            },
        )?;
        subnets.push(subnet);
    }

    let sg = SecurityGroups::declare(&mut doc, &vpc, &tags)?;

    let mut internet = attributes! {
        "GroupId" => &sg.gateway_elb,
        "CidrIp" => network.gateway_cidr_block(),
    };
    internet.extend(port_range("tcp", 443));
    doc.declare_resource(
        "GatewayElbIngressFromInternetSg443",
        "AWS::EC2::SecurityGroupIngress",
        internet,
    )?;
    ingress(
        &mut doc,
        "GatewayServerIngressFromGatewayElb443",
        (&sg.gateway_server, &sg.gateway_elb),
        "tcp",
        443,
    )?;
    ingress(
        &mut doc,
        "CmsElbFromGatewayServer443",
        (&sg.cms_elb, &sg.gateway_server),
        "tcp",
        443,
    )?;
    ingress(
        &mut doc,
        "VaultServerElbFromGatewayServer443",
        (&sg.vault_server_elb, &sg.gateway_server),
        "tcp",
        443,
    )?;
    for port in CMS_PORTS {
        ingress(
            &mut doc,
            &format!("CmsIngressFromCmsElb{}", port),
            (&sg.cms, &sg.cms_elb),
            "tcp",
            port,
        )?;
    }
    ingress(
        &mut doc,
        "VaultElbIngressFromCms443",
        (&sg.vault_server_elb, &sg.cms),
        "tcp",
        443,
    )?;
    ingress(&mut doc, "CmsDbFromCms", (&sg.cms_db, &sg.cms), "tcp", &database.port)?;
    for port in VAULT_PORTS {
        ingress(
            &mut doc,
            &format!("VaultServerIngressFromVaultElb{}", port),
            (&sg.vault_server, &sg.vault_server_elb),
            "tcp",
            port,
        )?;
    }
    ingress(
        &mut doc,
        "VaultServerIngress8200",
        (&sg.vault_server, &sg.vault_client),
        "tcp",
        VAULT_PORTS[0],
    )?;

    // Consul agents talk to servers over RPC (tcp) and gossip (tcp and udp)
    ingress(
        &mut doc,
        &format!("ConsulServerIngress{}", CONSUL_PORT_RPC),
        (&sg.consul_server, &sg.consul_client),
        "tcp",
        CONSUL_PORT_RPC,
    )?;
    for port in CONSUL_PORTS_GOSSIP {
        for (name, protocol) in [("Tcp", "tcp"), ("Udp", "udp")] {
            ingress(
                &mut doc,
                &format!("ConsulServerIngress{}{}", name, port),
                (&sg.consul_server, &sg.consul_client),
                protocol,
                port,
            )?;
        }
    }

    let roles = Roles::declare(&mut doc)?;
    let gateway_profile = instance_profile(&mut doc, "GatewayInstanceProfile", &roles.gateway)?;
    let cms_profile = instance_profile(&mut doc, "CmsInstanceProfile", &roles.cms)?;
    let vault_profile = instance_profile(&mut doc, "VaultInstanceProfile", &roles.vault)?;
    let consul_profile = instance_profile(&mut doc, "ConsulInstanceProfile", &roles.consul)?;

    let dashboard_bucket = doc.declare_resource(
        "DashboardBucket",
        "AWS::S3::Bucket",
        attributes! {
            "AccessControl" => "PublicRead",
            "WebsiteConfiguration" => attributes! {
                "IndexDocument" => "index.html",
                "ErrorDocument" => "error.html",
            },
            "Tags" => tags.tags(),
        },
    )?;
    doc.declare_resource(
        "DashboardBucketAccessPolicy",
        "AWS::S3::BucketPolicy",
        attributes! {
            "Bucket" => &dashboard_bucket,
            "PolicyDocument" => iam::policy_document(vec![grant(
                "Allow-Bucket-Access",
                Value::from("*"),
                &["s3:GetObject"],
                vec![s3_arn(&dashboard_bucket, "/*")],
            )]),
        },
    )?;

    let config_bucket = doc.declare_resource(
        "CerberusConfigBucket",
        "AWS::S3::Bucket",
        attributes! {
            "AccessControl" => "Private",
            "VersioningConfiguration" => attributes! { "Status" => "Enabled" },
            "Tags" => tags.tags(),
        },
    )?;
    doc.declare_resource(
        "CerberusConfigBucketAccessPolicy",
        "AWS::S3::BucketPolicy",
        attributes! {
            "Bucket" => &config_bucket,
            "PolicyDocument" => config_bucket_policy(&config_bucket, &roles),
        },
    )?;

    let config_file_key = doc.declare_resource(
        "ConfigFileKey",
        "AWS::KMS::Key",
        attributes! {
            "Description" => "Cerberus encryption key for storing config files in an encrypted state.",
            "Enabled" => true,
            "KeyPolicy" => iam::policy_document(vec![
                grant(
                    "Allow-Root-User",
                    aws_principals(vec![Value::join(
                        "",
                        vec![Value::from("arn:aws:iam::"), Value::account_id(), Value::from(":root")],
                    )]),
                    &["kms:*"],
                    "*",
                ),
                grant(
                    "Allow-Decrypt-From-Instances",
                    aws_principals(roles.instance_arns()),
                    &["kms:Decrypt"],
                    "*",
                ),
                grant(
                    "Allow-Account-Admin",
                    aws_principals(vec![account_admin_arn.reference()]),
                    &["kms:*"],
                    "*",
                ),
            ]),
        },
    )?;

    let cms_kms_policy = doc.declare_resource(
        "CmsKmsPolicy",
        "AWS::IAM::Policy",
        attributes! {
            "PolicyName" => "CmsKmsPolicy",
            "Roles" => vec![roles.cms.reference()],
            "PolicyDocument" => iam::policy_document(vec![allow(&CMS_KMS_ACTIONS, vec!["*"])]),
        },
    )?;

    let database_instance = database.declare_instance(&mut doc, &subnets, &sg, &tags)?;

    let hosted_zone = doc.declare_resource(
        "CerberusInternalHostedZone",
        "AWS::Route53::HostedZone",
        attributes! {
            "Name" => Value::join(".", vec![Value::region(), hosted_zone_name.reference()]),
            "VPCs" => vec![attributes! {
                "VPCId" => &vpc,
                "VPCRegion" => Value::region(),
            }],
            "HostedZoneTags" => tags.tag_map(),
            "HostedZoneConfig" => attributes! {
                "Comment" => "The hosted zone for the Cerberus VPC",
            },
        },
    )?;

    doc.declare_output("vpcId", &vpc)?;
    doc.declare_output("gatewayIamRoleArn", roles.gateway.attribute("Arn"))?;
    doc.declare_output("cmsIamRoleArn", roles.cms.attribute("Arn"))?;
    doc.declare_output("consulIamRoleArn", roles.consul.attribute("Arn"))?;
    doc.declare_output("vaultIamRoleArn", roles.vault.attribute("Arn"))?;
    doc.declare_output(
        "cloudFrontLogProcessorLambdaIamRoleArn",
        roles.waf_lambda.attribute("Arn"),
    )?;
    doc.declare_output("gatewayInstanceProfileName", &gateway_profile)?;
    doc.declare_output("cmsInstanceProfileName", &cms_profile)?;
    doc.declare_output("consulInstanceProfileName", &consul_profile)?;
    doc.declare_output("vaultInstanceProfileName", &vault_profile)?;
    for (id, group) in sg.outputs() {
        doc.declare_output(id, group.attribute("GroupId"))?;
    }
    doc.declare_output("configFileKeyId", &config_file_key)?;
    doc.declare_output("dashboardBucketName", &dashboard_bucket)?;
    doc.declare_output(
        "dashboardBucketWebsiteUrl",
        dashboard_bucket.attribute("WebsiteURL"),
    )?;
    doc.declare_output("configBucketName", &config_bucket)?;
    doc.declare_output("configBucketDomainName", config_bucket.attribute("DomainName"))?;
    doc.declare_output("cmsDbId", &database_instance)?;
    doc.declare_output("cmsDbAddress", database_instance.attribute("Endpoint.Address"))?;
    // the cmsDbPort id is taken by the parameter
    doc.declare_output("cmsDbEndpointPort", database_instance.attribute("Endpoint.Port"))?;
    doc.register(
        Declaration::output(
            "cmsDbJdbcConnectionString",
            Value::join(
                "",
                vec![
                    Value::from("jdbc:mysql://"),
                    database_instance.attribute("Endpoint.Address"),
                    Value::from(":"),
                    database_instance.attribute("Endpoint.Port"),
                    Value::from("/"),
                    database.name.reference(),
                    Value::from(JDBC_OPTIONS),
                ],
            ),
        )
        .with_description("JDBC connection string for cms database"),
    )?;
    doc.register(
        Declaration::output("vpcHostedZoneId", &hosted_zone)
            .with_description("The VPC hosted zone ID"),
    )?;
    for (zone, subnet) in network.zones().zip(&subnets) {
        doc.declare_output(format!("vpcSubnetIdForAz{}", zone), subnet)?;
    }
    doc.register(
        Declaration::output("cmsKmsPolicyId", &cms_kms_policy)
            .with_description("The policy id for CMS managing KMS keys"),
    )?;
    network.register_outputs(&mut doc)?;

    Ok(doc)
}

/// Security groups of every tier, in declaration and output order
struct SecurityGroups {
    tools_ingress: ResourceHandle,
    gateway_elb: ResourceHandle,
    gateway_server: ResourceHandle,
    cms_elb: ResourceHandle,
    cms: ResourceHandle,
    cms_db: ResourceHandle,
    vault_server_elb: ResourceHandle,
    vault_client: ResourceHandle,
    vault_server: ResourceHandle,
    consul_client: ResourceHandle,
    consul_server: ResourceHandle,
}

impl SecurityGroups {
    fn declare(
        doc: &mut Document,
        vpc: &ResourceHandle,
        tags: &TagHandles,
    ) -> Result<Self, DocumentError> {
        let mut group = |id: &str, description: &str| {
            security_group(doc, vpc, id, description, tags.tags())
        };
        let tools_ingress = group("ToolsIngressSg", "Administration ingress from tools NAT boxes")?;
        // the CloudFront IP updater finds this group by its tags
        let gateway_elb =
            security_group(doc, vpc, "GatewayElbSg", "Gateway ELB Security Group", tags.gateway_tags())?;
        let mut group = |id: &str, description: &str| {
            security_group(doc, vpc, id, description, tags.tags())
        };
        Ok(Self {
            tools_ingress,
            gateway_elb,
            gateway_server: group("GatewayServerSg", "Gateway Server Instance Security Group")?,
            cms_elb: group("CmsElbSg", "Management Server ELB Security Group")?,
            cms: group("CmsSg", "Management Server Instance Security Group")?,
            cms_db: group("CmsDbSg", "Management Server Database Security Group")?,
            vault_server_elb: group("VaultServerElbSg", "Vault ServerELB Security Group")?,
            vault_client: group("VaultClientSg", "Vault Client Security Group")?,
            vault_server: group("VaultServerSg", "Vault Server Security Group")?,
            consul_client: group("ConsulClientSg", "Consul Client Security Group")?,
            consul_server: group("ConsulServerSg", "Consul Server Security Group")?,
        })
    }

    fn outputs(&self) -> [(&'static str, &ResourceHandle); 11] {
        [
            ("toolsIngressSgId", &self.tools_ingress),
            ("gatewayElbSgId", &self.gateway_elb),
            ("gatewayServerSgId", &self.gateway_server),
            ("cmsElbSgId", &self.cms_elb),
            ("cmsSgId", &self.cms),
            ("cmsDbSgId", &self.cms_db),
            ("vaultServerElbSgId", &self.vault_server_elb),
            ("vaultClientSgId", &self.vault_client),
            ("vaultServerSgId", &self.vault_server),
            ("consulClientSgId", &self.consul_client),
            ("consulServerSgId", &self.consul_server),
        ]
    }
}

fn security_group(
    doc: &mut Document,
    vpc: &ResourceHandle,
    id: &str,
    description: &str,
    tags: Value,
) -> Result<ResourceHandle, DocumentError> {
    doc.declare_resource(
        id,
        "AWS::EC2::SecurityGroup",
        attributes! {
            "GroupDescription" => description,
            "VpcId" => vpc,
            "Tags" => tags,
        },
    )
}

fn port_range(protocol: &str, port: impl Into<Value>) -> Attributes {
    let port: Value = port.into();
    attributes! {
        "FromPort" => port.clone(),
        "IpProtocol" => protocol,
        "ToPort" => port,
    }
}

/// Allow the second group of `(group, source)` into the first on a single port
fn ingress(
    doc: &mut Document,
    id: &str,
    (group, source): (&ResourceHandle, &ResourceHandle),
    protocol: &str,
    port: impl Into<Value>,
) -> Result<ResourceHandle, DocumentError> {
    let mut rule = attributes! {
        "GroupId" => group,
        "SourceSecurityGroupId" => source,
    };
    rule.extend(port_range(protocol, port));
    doc.declare_resource(id, "AWS::EC2::SecurityGroupIngress", rule)
}

/// Roles assumed by the instances of each cluster and by the WAF lambda
struct Roles {
    waf_lambda: ResourceHandle,
    gateway: ResourceHandle,
    cms: ResourceHandle,
    vault: ResourceHandle,
    consul: ResourceHandle,
}

impl Roles {
    fn declare(doc: &mut Document) -> Result<Self, DocumentError> {
        let waf_lambda = iam::role(
            doc,
            "WAFLambdaRole",
            "lambda.amazonaws.com",
            vec![
                inline_policy("WAFAccess", vec![allow(&["waf:*"], "*")]),
                inline_policy("S3BucketList", vec![allow(&["s3:ListAllMyBuckets"], "*")]),
                inline_policy("LogsAccess", vec![allow(&["logs:*"], "*")]),
                inline_policy("LambdaAccess", vec![allow(&["lambda:*"], "*")]),
                inline_policy(
                    "CloudFormationAccess",
                    vec![allow(
                        &["cloudformation:DescribeStacks", "cloudformation:ListStacks"],
                        "*",
                    )],
                ),
                inline_policy(
                    "CloudWatchAccess",
                    vec![allow(&["cloudwatch:PutMetricData"], "*")],
                ),
            ],
        )?;
        let mut instance_role = |id: &str, policy: &str, actions: &[&str]| {
            iam::role(
                doc,
                id,
                "ec2.amazonaws.com",
                vec![inline_policy(policy, vec![allow(actions, "*")])],
            )
        };
        Ok(Self {
            waf_lambda,
            gateway: instance_role("GatewayIamRole", "gatewayPolicy", &INSTANCE_ACTIONS)?,
            cms: instance_role("CmsIamRole", "cmsPolicy", &INSTANCE_ACTIONS)?,
            vault: instance_role("VaultIamRole", "consulPolicy", &INSTANCE_ACTIONS)?,
            consul: instance_role(
                "ConsulIamRole",
                "consulPolicy",
                &[
                    "EC2:Describe*",
                    "cloudformation:DescribeStacks",
                    "cloudformation:SignalResource",
                ],
            )?,
        })
    }

    /// ARNs of the roles instances run as
    fn instance_arns(&self) -> Vec<Value> {
        [&self.gateway, &self.cms, &self.vault, &self.consul]
            .iter()
            .map(|role| role.attribute("Arn"))
            .collect()
    }
}

fn instance_profile(
    doc: &mut Document,
    id: &str,
    role: &ResourceHandle,
) -> Result<ResourceHandle, DocumentError> {
    doc.declare_resource(
        id,
        "AWS::IAM::InstanceProfile",
        attributes! {
            "Path" => "/",
            "Roles" => vec![role.reference()],
        },
    )
}

/// Every role may list the config bucket; each service owns its own prefixes
fn config_bucket_policy(bucket: &ResourceHandle, roles: &Roles) -> Value {
    let paths = |suffixes: &[&str]| -> Vec<Value> {
        suffixes.iter().map(|suffix| s3_arn(bucket, suffix)).collect()
    };
    let owner = |sid: &str, role: &ResourceHandle, suffixes: &[&str]| {
        grant(
            sid,
            aws_principals(vec![role.attribute("Arn")]),
            &["s3:*"],
            paths(suffixes),
        )
    };

    let mut listers = roles.instance_arns();
    listers.push(roles.waf_lambda.attribute("Arn"));
    iam::policy_document(vec![
        grant(
            "Allow-ListBucket-Access",
            aws_principals(listers),
            &["s3:ListBucket"],
            paths(&["", "/*"]),
        ),
        owner(
            "Allow-Bucket-Access-For-Gateway",
            &roles.gateway,
            &["/data/gateway/*", "/data/gateway"],
        ),
        owner("Allow-Bucket-Access-For-CMS", &roles.cms, &["/data/cms/*", "/data/cms"]),
        owner(
            "Allow-Bucket-Access-For-Log-Processing-Lambda",
            &roles.waf_lambda,
            &[
                "/data/cloud-front-log-processor/*",
                "/data/cloud-front-log-processor",
            ],
        ),
        owner(
            "Allow-Bucket-Access-For-Vault",
            &roles.vault,
            &[
                "/data/vault/*",
                "/data/vault",
                "/data/consul/*",
                "/data/consul",
                "/config/secrets.json",
            ],
        ),
        owner(
            "Allow-Bucket-Access-For-Consul",
            &roles.consul,
            &["/data/consul/*", "/data/consul", "/consul/*", "/consul"],
        ),
    ])
}

/// Deploy-time settings of the CMS database
struct DatabaseInputs {
    allocated_storage: ParameterHandle,
    instance_size: ParameterHandle,
    name: ParameterHandle,
    master_username: ParameterHandle,
    master_password: ParameterHandle,
    port: ParameterHandle,
}

impl DatabaseInputs {
    fn declare(doc: &mut Document) -> Result<Self, DocumentError> {
        Ok(Self {
            allocated_storage: doc.declare_parameter(
                "cmsDbAllocatedStorage",
                ParameterSpec::string()
                    .with_description("The allocated storage for the RDS instance.")
                    .with_default("100"),
            )?,
            instance_size: doc.declare_parameter(
                "cmsDbInstanceSize",
                ParameterSpec::string()
                    .with_description("MySQL DB instance class")
                    .with_default("db.r3.large"),
            )?,
            name: doc.declare_parameter(
                "cmsDbName",
                ParameterSpec::string()
                    .with_description("The name of the database initially create on the RDS instance"),
            )?,
            master_username: doc.declare_parameter(
                "cmsDbMasterUsername",
                ParameterSpec::string().with_description("Master username for the cms RDS instance"),
            )?,
            master_password: doc.declare_parameter(
                "cmsDbMasterPassword",
                ParameterSpec::string().with_description("Master password for the cms RDS instance"),
            )?,
            port: doc.declare_parameter(
                "cmsDbPort",
                ParameterSpec::number()
                    .with_description("Port for the cms DB instance")
                    .with_default("3306"),
            )?,
        })
    }

    /// Multi-AZ MySQL instance spread over every subnet
    fn declare_instance(
        &self,
        doc: &mut Document,
        subnets: &[ResourceHandle],
        sg: &SecurityGroups,
        tags: &TagHandles,
    ) -> Result<ResourceHandle, DocumentError> {
        let subnet_group = doc.declare_resource(
            "CmsDatabaseSubnetGroup",
            "AWS::RDS::DBSubnetGroup",
            attributes! {
                "DBSubnetGroupDescription" => "DB Subnet Group for management DB",
                "SubnetIds" => Value::list(subnets.iter().map(ResourceHandle::reference)),
            },
        )?;
        let parameter_group = doc.declare_resource(
            "CmsDatabaseParamGroup",
            "AWS::RDS::DBParameterGroup",
            attributes! {
                "Description" => "Default parameters for the cms DB",
                "Family" => "mysql5.6",
                "Parameters" => attributes! {
                    "slow_query_log" => 1,
                    "log_output" => "TABLE",
                },
            },
        )?;
        doc.declare_resource(
            "CmsDatabase",
            "AWS::RDS::DBInstance",
            attributes! {
                "AllocatedStorage" => &self.allocated_storage,
                "AllowMajorVersionUpgrade" => true,
                "AutoMinorVersionUpgrade" => true,
                "BackupRetentionPeriod" => 14,
                "DBInstanceClass" => &self.instance_size,
                "DBName" => &self.name,
                "DBParameterGroupName" => &parameter_group,
                "DBSubnetGroupName" => &subnet_group,
                "Engine" => "MySQL",
                "MasterUsername" => &self.master_username,
                "MasterUserPassword" => &self.master_password,
                "VPCSecurityGroups" => vec![sg.tools_ingress.reference(), sg.cms_db.reference()],
                "MultiAZ" => true,
                "PreferredBackupWindow" => "13:14-13:44",
                "PreferredMaintenanceWindow" => "tue:06:48-tue:07:18",
                "PubliclyAccessible" => false,
                "StorageEncrypted" => true,
                "StorageType" => "gp2",
                "Port" => &self.port,
                "Tags" => tags.tags(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{LogicalId, Section};
    use crate::resolve::ResolvedValue;

    fn resolved() -> crate::resolve::ResolvedDocument {
        build(&StackConfig::default())
            .and_then(|doc| doc.resolve())
            .expect("Should resolve")
    }

    fn get_att(target: &str, attribute: &str) -> ResolvedValue {
        ResolvedValue::GetAtt {
            target: target.to_string(),
            attribute: attribute.to_string(),
        }
    }

    fn principals(statement: &ResolvedValue) -> Vec<ResolvedValue> {
        let principal = match statement {
            ResolvedValue::Map(statement) => statement.get("Principal"),
            other => panic!("Expected Map, got {:?}", other),
        };
        match principal {
            Some(ResolvedValue::Map(principal)) => match principal.get("AWS") {
                Some(ResolvedValue::List(arns)) => arns.clone(),
                other => panic!("Expected AWS principals, got {:?}", other),
            },
            other => panic!("Expected Map, got {:?}", other),
        }
    }

    fn statements(
        resolved: &crate::resolve::ResolvedDocument,
        id: &str,
        key: &str,
    ) -> Vec<ResolvedValue> {
        match resolved.get(id).and_then(|d| d.attribute(key)) {
            Some(ResolvedValue::Map(policy)) => match policy.get("Statement") {
                Some(ResolvedValue::List(statements)) => statements.clone(),
                other => panic!("Expected statements, got {:?}", other),
            },
            other => panic!("Expected policy document, got {:?}", other),
        }
    }

    #[test]
    fn test_dhcp_domain_name_is_conditional() {
        let resolved = resolved();
        let dhcp = resolved.get("CerberusDhcpOptions").unwrap();
        match dhcp.attribute("DomainName") {
            Some(ResolvedValue::If { condition, then, otherwise }) => {
                assert_eq!(condition, "RegionEqualsEastOne");
                assert_eq!(**then, ResolvedValue::String("ec2.internal".to_string()));
                assert!(matches!(**otherwise, ResolvedValue::Join { .. }));
            }
            other => panic!("Expected If, got {:?}", other),
        }
    }

    #[test]
    fn test_subnets_per_zone() {
        let resolved = resolved();
        for zone in 1..=3 {
            let subnet = resolved.get(&format!("CerberusSubnetForAz{}", zone)).unwrap();
            assert_eq!(
                subnet.attribute("AvailabilityZone"),
                Some(&ResolvedValue::Ref(format!("az{}", zone)))
            );
            assert_eq!(subnet.depends_on, vec![LogicalId::new("CerberusVpc")]);

            let association = resolved
                .get(&format!("CerberusSubnetRouteTableAssociationForAz{}", zone))
                .unwrap();
            assert_eq!(
                association.depends_on,
                vec![
                    LogicalId::new("CerberusRouteTable"),
                    LogicalId::new(format!("CerberusSubnetForAz{}", zone)),
                ]
            );
        }
    }

    #[test]
    fn test_database_port_ingress() {
        let resolved = resolved();
        let rule = resolved.get("CmsDbFromCms").unwrap();
        assert_eq!(
            rule.attribute("FromPort"),
            Some(&ResolvedValue::Ref("cmsDbPort".to_string()))
        );
        assert_eq!(rule.attribute("FromPort"), rule.attribute("ToPort"));
        assert_eq!(
            rule.depends_on,
            vec![LogicalId::new("CmsDbSg"), LogicalId::new("CmsSg")]
        );
        assert!(resolved.get("ConsulServerIngressUdp8302").is_some());
    }

    #[test]
    fn test_config_bucket_listers() {
        let resolved = resolved();
        let statements = statements(&resolved, "CerberusConfigBucketAccessPolicy", "PolicyDocument");
        assert_eq!(statements.len(), 6);
        assert_eq!(
            principals(&statements[0]),
            vec![
                get_att("GatewayIamRole", "Arn"),
                get_att("CmsIamRole", "Arn"),
                get_att("VaultIamRole", "Arn"),
                get_att("ConsulIamRole", "Arn"),
                get_att("WAFLambdaRole", "Arn"),
            ]
        );
    }

    #[test]
    fn test_config_key_policy() {
        let resolved = resolved();
        let statements = statements(&resolved, "ConfigFileKey", "KeyPolicy");
        assert_eq!(statements.len(), 3);
        assert_eq!(principals(&statements[1]).len(), 4);
        assert_eq!(
            principals(&statements[2]),
            vec![ResolvedValue::Ref("accountAdminArn".to_string())]
        );
    }

    #[test]
    fn test_database_wiring() {
        let resolved = resolved();
        let database = resolved.get("CmsDatabase").unwrap();
        assert_eq!(
            database.depends_on,
            vec![
                LogicalId::new("CmsDatabaseParamGroup"),
                LogicalId::new("CmsDatabaseSubnetGroup"),
                LogicalId::new("ToolsIngressSg"),
                LogicalId::new("CmsDbSg"),
            ]
        );

        let jdbc = resolved.get("cmsDbJdbcConnectionString").unwrap();
        match jdbc.attribute("Value") {
            Some(ResolvedValue::Join { separator, parts }) => {
                assert_eq!(separator, "");
                assert_eq!(parts[1], get_att("CmsDatabase", "Endpoint.Address"));
                assert_eq!(parts[5], ResolvedValue::Ref("cmsDbName".to_string()));
            }
            other => panic!("Expected Join, got {:?}", other),
        }
    }

    #[test]
    fn test_every_parameter_used() {
        let resolved = resolved();
        assert!(
            resolved.advisories().is_empty(),
            "unexpected advisories: {:?}",
            resolved.advisories()
        );
    }

    #[test]
    fn test_outputs() {
        let resolved = resolved();
        let outputs: Vec<&str> = resolved
            .section(Section::Output)
            .map(|d| d.id.as_str())
            .collect();
        assert_eq!(
            outputs,
            vec![
                "vpcId",
                "gatewayIamRoleArn",
                "cmsIamRoleArn",
                "consulIamRoleArn",
                "vaultIamRoleArn",
                "cloudFrontLogProcessorLambdaIamRoleArn",
                "gatewayInstanceProfileName",
                "cmsInstanceProfileName",
                "consulInstanceProfileName",
                "vaultInstanceProfileName",
                "toolsIngressSgId",
                "gatewayElbSgId",
                "gatewayServerSgId",
                "cmsElbSgId",
                "cmsSgId",
                "cmsDbSgId",
                "vaultServerElbSgId",
                "vaultClientSgId",
                "vaultServerSgId",
                "consulClientSgId",
                "consulServerSgId",
                "configFileKeyId",
                "dashboardBucketName",
                "dashboardBucketWebsiteUrl",
                "configBucketName",
                "configBucketDomainName",
                "cmsDbId",
                "cmsDbAddress",
                "cmsDbEndpointPort",
                "cmsDbJdbcConnectionString",
                "vpcHostedZoneId",
                "vpcSubnetIdForAz1",
                "vpcSubnetIdForAz2",
                "vpcSubnetIdForAz3",
                "cmsKmsPolicyId",
                "vpcSubnetCidrBlockForAz1",
                "vpcSubnetCidrBlockForAz2",
                "vpcSubnetCidrBlockForAz3",
            ]
        );
    }

    #[test]
    fn test_strict_lint_passes() {
        let doc = build(&StackConfig::default()).unwrap();
        let strict = crate::resolve::ResolveOptions::strict();
        assert!(doc.resolve_with(&strict).is_ok());
    }
}
