//! Integration tests for registering shared bundles into documents

use pretty_assertions::assert_eq;
use serde_json::json;

use stack_assembler::bundle::subnet_cidr_param_id;
use stack_assembler::{
    assemble, attributes, Bundle, Declaration, Document, DocumentError, FactoryBundle,
    NetworkBundle, ParameterSpec, Section, TagBundle,
};

fn declarations(doc: &Document) -> Vec<Declaration> {
    doc.declarations().cloned().collect()
}

#[test]
fn test_same_bundle_into_two_documents() {
    let tags = TagBundle::new();
    let network = NetworkBundle::new();

    let mut first = Document::new("first");
    let mut second = Document::new("second");
    let first_tags = tags.register_into(&mut first).unwrap();
    let first_network = network.register_into(&mut first).unwrap();
    let second_tags = tags.register_into(&mut second).unwrap();
    let second_network = network.register_into(&mut second).unwrap();

    assert_eq!(declarations(&first), declarations(&second));
    assert_eq!(first_tags, second_tags);
    assert_eq!(first_network, second_network);

    // handles from the first document resolve inside the second one too
    second
        .declare_resource(
            "CerberusVpc",
            "AWS::EC2::VPC",
            attributes! {
                "CidrBlock" => first_network.vpc_cidr_block(),
                "Tags" => first_tags.tags(),
            },
        )
        .unwrap();
    assert!(second.resolve().is_ok());
    assert!(!first.contains("CerberusVpc"));
}

#[test]
fn test_same_bundle_twice_into_one_document() {
    let mut doc = Document::new("test");
    TagBundle::new().register_into(&mut doc).unwrap();
    let err = TagBundle::new().register_into(&mut doc).unwrap_err();
    assert!(matches!(
        err,
        DocumentError::DuplicateId {
            existing: Section::Parameter,
            ..
        }
    ));
}

#[test]
fn test_colliding_bundle_leaves_document_untouched() {
    let mut doc = Document::new("test");
    doc.declare_parameter("vpcCidrBlock", ParameterSpec::string())
        .unwrap();

    let err = NetworkBundle::new().register_into(&mut doc).unwrap_err();
    assert_eq!(err.logical_id(), Some("vpcCidrBlock"));
    let ids: Vec<String> = doc.ids().map(|id| id.to_string()).collect();
    assert_eq!(ids, vec!["vpcCidrBlock"]);

    // the same bundle still registers cleanly once the collision is gone
    doc.remove("vpcCidrBlock");
    NetworkBundle::new().register_into(&mut doc).unwrap();
    assert!(doc.contains("ec2ComputeDomainNameSuffix"));
}

#[test]
fn test_unrelated_bundles_keep_their_own_order() {
    let mut tags_first = Document::new("test");
    TagBundle::new().register_into(&mut tags_first).unwrap();
    NetworkBundle::new().register_into(&mut tags_first).unwrap();

    let mut network_first = Document::new("test");
    NetworkBundle::new().register_into(&mut network_first).unwrap();
    TagBundle::new().register_into(&mut network_first).unwrap();

    let tag_ids = |doc: &Document| -> Vec<String> {
        doc.ids()
            .map(|id| id.to_string())
            .filter(|id| id.starts_with("tag"))
            .collect()
    };
    let network_ids = |doc: &Document| -> Vec<String> {
        doc.ids()
            .map(|id| id.to_string())
            .filter(|id| !id.starts_with("tag"))
            .collect()
    };
    assert_eq!(tag_ids(&tags_first), tag_ids(&network_first));
    assert_eq!(network_ids(&tags_first), network_ids(&network_first));
}

#[test]
fn test_network_outputs_serialize() {
    let mut doc = Document::new("test");
    let network = NetworkBundle::new()
        .with_subnet_cidr_blocks(["10.0.0.0/24"])
        .register_into(&mut doc)
        .unwrap();
    network.register_outputs(&mut doc).unwrap();

    let output: serde_json::Value = serde_json::from_str(&assemble(&doc).unwrap()).unwrap();
    assert_eq!(
        output["Outputs"]["vpcSubnetCidrBlockForAz1"]["Value"],
        json!({"Ref": subnet_cidr_param_id(1).as_str()})
    );
    assert_eq!(
        output["Parameters"]["subnetCidrBlockForAz1"],
        json!({
            "Type": "String",
            "Description": "Cidr block for subnet in AZ '1'",
            "MinLength": 9,
            "MaxLength": 20,
            "AllowedPattern": "[0-9./]*",
            "Default": "10.0.0.0/24"
        })
    );
}

#[test]
fn test_factory_bundle_handles() {
    let bundle = FactoryBundle::new()
        .with("bucket", || {
            Declaration::parameter("lambdaBucket", ParameterSpec::string())
        })
        .with("key", || Declaration::parameter("lambdaKey", ParameterSpec::string()));

    let mut doc = Document::new("test");
    let handles = bundle.register_into(&mut doc).unwrap();
    doc.declare_resource(
        "Function",
        "AWS::Lambda::Function",
        attributes! {
            "Code" => attributes! {
                "S3Bucket" => handles.reference("bucket").unwrap(),
                "S3Key" => handles.reference("key").unwrap(),
            },
        },
    )
    .unwrap();

    let resolved = doc.resolve().unwrap();
    assert!(resolved.advisories().is_empty());
}
