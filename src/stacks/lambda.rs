//! Lambda that keeps origin ELB security groups in sync with CloudFront IPs

use crate::attributes;
use crate::config::StackConfig;
use crate::document::{Declaration, Document, DocumentError, ParameterSpec, Value};

use super::iam::{self, allow};

pub(super) const DESCRIPTION: &str =
    "Launches the lambda syncing CloudFront IP ranges into origin ELB security groups";

const FUNCTION_ID: &str = "CloudFrontOriginElbSgIpSyncFunction";

pub fn build(_config: &StackConfig) -> Result<Document, DocumentError> {
    let mut doc = Document::new(DESCRIPTION);

    let lambda_bucket = doc.declare_parameter(
        "lambdaBucket",
        ParameterSpec::string().with_description("S3 Bucket for lambda function artifact"),
    )?;
    let lambda_key = doc.declare_parameter(
        "lambdaKey",
        ParameterSpec::string().with_description("Key for lambda function artifact"),
    )?;

    let role = iam::role(
        &mut doc,
        "CloudFrontOriginElbSgIpSyncLambdaIamRole",
        "lambda.amazonaws.com",
        vec![iam::inline_policy(
            "cloud_front_origin_elb_sg_ip_sync_lambda_iam_role_policy",
            vec![
                allow(
                    &["logs:CreateLogGroup", "logs:CreateLogStream", "logs:PutLogEvents"],
                    "arn:aws:logs:*:*:*",
                ),
                allow(
                    &[
                        "ec2:DescribeSecurityGroups",
                        "ec2:AuthorizeSecurityGroupIngress",
                        "ec2:RevokeSecurityGroupIngress",
                    ],
                    "*",
                ),
            ],
        )],
    )?;

    let function = doc.declare_resource(
        FUNCTION_ID,
        "AWS::Lambda::Function",
        attributes! {
            "Description" => "Lambda for syncing AWSs IPs for Cloud Front to origin ELB SGs",
            "Handler" => "update_security_groups.lambda_handler",
            "Role" => role.attribute("Arn"),
            "Code" => attributes! {
                "S3Bucket" => &lambda_bucket,
                "S3Key" => &lambda_key,
            },
            "Runtime" => "python2.7",
            "MemorySize" => "128",
            "Timeout" => "5",
        },
    )?;

    doc.add_resource(
        Declaration::resource(
            "LambdaInvokePermission",
            "AWS::Lambda::Permission",
            attributes! {
                "FunctionName" => function.attribute("Arn"),
                "Action" => "lambda:*",
                "Principal" => "sns.amazonaws.com",
                "SourceAccount" => Value::account_id(),
            },
        )
        .depends_on(&function),
    )?;

    doc.declare_output(
        "cloudFrontOriginElbSgIpSyncFunctionArn",
        function.attribute("Arn"),
    )?;

    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{LogicalId, Section};
    use crate::resolve::ResolvedValue;

    #[test]
    fn test_permission_depends_on_function() {
        let doc = build(&StackConfig::default()).unwrap();
        let resolved = doc.resolve().unwrap();
        let permission = resolved.get("LambdaInvokePermission").unwrap();
        assert_eq!(permission.depends_on, vec![LogicalId::new(FUNCTION_ID)]);
        assert_eq!(
            permission.attribute("SourceAccount"),
            Some(&ResolvedValue::Ref("AWS::AccountId".to_string()))
        );
    }

    #[test]
    fn test_function_depends_on_role() {
        let doc = build(&StackConfig::default()).unwrap();
        let resolved = doc.resolve().unwrap();
        let function = resolved.get(FUNCTION_ID).unwrap();
        assert_eq!(
            function.depends_on,
            vec![LogicalId::new("CloudFrontOriginElbSgIpSyncLambdaIamRole")]
        );
        assert!(resolved.advisories().is_empty());
    }

    #[test]
    fn test_declaration_counts() {
        let doc = build(&StackConfig::default()).unwrap();
        assert_eq!(doc.section(Section::Parameter).count(), 2);
        assert_eq!(doc.section(Section::Resource).count(), 3);
        assert_eq!(doc.section(Section::Output).count(), 1);
    }
}
