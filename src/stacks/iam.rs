//! IAM roles and the policy document shapes shared by the stacks

use crate::attributes;
use crate::document::{Document, DocumentError, ResourceHandle, Value};

const POLICY_VERSION: &str = "2012-10-17";

/// Trust policy letting a service assume the role
pub(super) fn assume_role_policy(service: &str) -> Value {
    Value::from(attributes! {
        "Version" => POLICY_VERSION,
        "Statement" => vec![attributes! {
            "Effect" => "Allow",
            "Principal" => attributes! { "Service" => vec![service] },
            "Action" => vec!["sts:AssumeRole"],
        }],
    })
}

/// Allow `actions` on `resource` for whoever holds the policy
pub(super) fn allow(actions: &[&str], resource: impl Into<Value>) -> Value {
    let resource: Value = resource.into();
    Value::from(attributes! {
        "Effect" => "Allow",
        "Action" => actions.to_vec(),
        "Resource" => resource,
    })
}

/// Allow `principal` to perform `actions` on `resources`
pub(super) fn grant(
    sid: &str,
    principal: Value,
    actions: &[&str],
    resources: impl Into<Value>,
) -> Value {
    let resources: Value = resources.into();
    Value::from(attributes! {
        "Sid" => sid,
        "Effect" => "Allow",
        "Principal" => principal,
        "Action" => actions.to_vec(),
        "Resource" => resources,
    })
}

/// `{"AWS": [...]}` principal naming IAM entities by ARN
pub(super) fn aws_principals(arns: Vec<Value>) -> Value {
    Value::from(attributes! { "AWS" => arns })
}

/// A standalone, versioned policy document
pub(super) fn policy_document(statements: Vec<Value>) -> Value {
    Value::from(attributes! {
        "Version" => POLICY_VERSION,
        "Statement" => statements,
    })
}

/// A named policy embedded in a role
pub(super) fn inline_policy(name: &str, statements: Vec<Value>) -> Value {
    Value::from(attributes! {
        "PolicyName" => name,
        "PolicyDocument" => attributes! { "Statement" => statements },
    })
}

/// Role assumable by `service` carrying the given inline policies
pub(super) fn role(
    doc: &mut Document,
    id: &str,
    service: &str,
    policies: Vec<Value>,
) -> Result<ResourceHandle, DocumentError> {
    doc.declare_resource(
        id,
        "AWS::IAM::Role",
        attributes! {
            "AssumeRolePolicyDocument" => assume_role_policy(service),
            "Policies" => policies,
            "Path" => "/",
        },
    )
}

/// `arn:aws:s3:::<bucket><suffix>`
pub(super) fn s3_arn(bucket: impl Into<Value>, suffix: &str) -> Value {
    let mut parts = vec![Value::from("arn:aws:s3:::"), bucket.into()];
    if !suffix.is_empty() {
        parts.push(Value::from(suffix));
    }
    Value::join("", parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Attributes;

    fn entries(value: &Value) -> &Attributes {
        match value {
            Value::Map(entries) => entries,
            other => panic!("Expected Map, got {:?}", other),
        }
    }

    #[test]
    fn test_s3_arn_parts() {
        assert_eq!(
            s3_arn("bucket", "/*"),
            Value::join("", vec!["arn:aws:s3:::", "bucket", "/*"])
        );
        assert_eq!(
            s3_arn("bucket", ""),
            Value::join("", vec!["arn:aws:s3:::", "bucket"])
        );
    }

    #[test]
    fn test_grant_key_order() {
        let statement = grant(
            "Allow-Bucket-Access",
            Value::from("*"),
            &["s3:GetObject"],
            vec![Value::from("arn")],
        );
        let keys: Vec<&str> = entries(&statement).keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["Sid", "Effect", "Principal", "Action", "Resource"]);
    }

    #[test]
    fn test_role_attributes() {
        let mut doc = Document::new("test");
        let role = role(
            &mut doc,
            "GatewayIamRole",
            "ec2.amazonaws.com",
            vec![inline_policy("gatewayPolicy", vec![allow(&["EC2:Describe*"], "*")])],
        )
        .unwrap();
        let decl = doc.get(role.id().as_str()).unwrap();
        assert_eq!(decl.kind(), "AWS::IAM::Role");
        assert_eq!(decl.attribute("Path"), Some(&Value::from("/")));
        assert_eq!(
            decl.attribute("AssumeRolePolicyDocument"),
            Some(&assume_role_policy("ec2.amazonaws.com"))
        );
    }
}
