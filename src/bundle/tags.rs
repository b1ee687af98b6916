//! Standard tagging parameters shared by every stack

use crate::attributes;
use crate::document::{Declaration, Document, DocumentError, LogicalId, ParameterSpec, Value};

use super::{Bundle, FactoryBundle};

const TAG_NAME: &str = "tagName";
const TAG_EMAIL: &str = "tagEmail";
const TAG_CLASSIFICATION: &str = "tagClassification";
const TAG_COSTCENTER: &str = "tagCostcenter";

/// The four tag parameters: name, owner e-mail, data classification, cost center
#[derive(Debug, Clone, PartialEq)]
pub struct TagBundle {
    /// Default for the classification parameter
    pub default_classification: String,
}

impl Default for TagBundle {
    fn default() -> Self {
        Self {
            default_classification: "Gold".to_string(),
        }
    }
}

impl TagBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_classification(mut self, classification: impl Into<String>) -> Self {
        self.default_classification = classification.into();
        self
    }

    fn factories(&self) -> FactoryBundle {
        let classification = self.default_classification.clone();
        FactoryBundle::new()
            .with(TAG_NAME, || {
                Declaration::parameter(
                    TAG_NAME,
                    ParameterSpec::string()
                        .with_description("Name assigned to the stack. Format: {appGroup}-{appName}"),
                )
            })
            .with(TAG_EMAIL, || {
                Declaration::parameter(
                    TAG_EMAIL,
                    ParameterSpec::string().with_description(
                        "E-mail address for group or person responsible for the stack.",
                    ),
                )
            })
            .with(TAG_CLASSIFICATION, move || {
                Declaration::parameter(
                    TAG_CLASSIFICATION,
                    ParameterSpec::string()
                        .with_description(
                            "Denotes which category of Data Classification the instance is grouped under.",
                        )
                        .with_default(classification.clone()),
                )
            })
            .with(TAG_COSTCENTER, || {
                Declaration::parameter(
                    TAG_COSTCENTER,
                    ParameterSpec::string()
                        .with_description("Represents the Cost Center associated with the team/project."),
                )
            })
    }
}

impl Bundle for TagBundle {
    type Handles = TagHandles;

    fn register_into(&self, document: &mut Document) -> Result<TagHandles, DocumentError> {
        self.factories().register_into(document)?;
        Ok(TagHandles {
            name: LogicalId::new(TAG_NAME),
            email: LogicalId::new(TAG_EMAIL),
            classification: LogicalId::new(TAG_CLASSIFICATION),
            costcenter: LogicalId::new(TAG_COSTCENTER),
        })
    }
}

/// References to the registered tag parameters and the tag shapes built from them
#[derive(Debug, Clone, PartialEq)]
pub struct TagHandles {
    pub name: LogicalId,
    pub email: LogicalId,
    pub classification: LogicalId,
    pub costcenter: LogicalId,
}

impl TagHandles {
    pub fn name(&self) -> Value {
        Value::reference(&self.name)
    }

    pub fn email(&self) -> Value {
        Value::reference(&self.email)
    }

    pub fn classification(&self) -> Value {
        Value::reference(&self.classification)
    }

    pub fn costcenter(&self) -> Value {
        Value::reference(&self.costcenter)
    }

    /// Key/Value tag list for most resources
    pub fn tags(&self) -> Value {
        Value::List(vec![
            tag("Name", self.name()),
            tag("email", self.email()),
            tag("classification", self.classification()),
            tag("costcenter", self.costcenter()),
        ])
    }

    /// Tag list for resources the CloudFront IP updater must find: fixed name
    /// and the auto-update marker instead of the stack name
    pub fn gateway_tags(&self) -> Value {
        Value::List(vec![
            tag("Name", "cloudfront"),
            tag("AutoUpdate", "true"),
            tag("email", self.email()),
            tag("classification", self.classification()),
            tag("costcenter", self.costcenter()),
        ])
    }

    /// Tag list for autoscaling groups, propagated to launched instances
    pub fn autoscaling_tags(&self) -> Value {
        Value::List(vec![
            propagated_tag("Name", self.name()),
            propagated_tag("email", self.email()),
            propagated_tag("classification", self.classification()),
            propagated_tag("costcenter", self.costcenter()),
        ])
    }

    /// Tags as a flat mapping, for resources that take one
    pub fn tag_map(&self) -> Value {
        Value::Map(attributes! {
            "Name" => self.name(),
            "email" => self.email(),
            "classification" => self.classification(),
            "costcenter" => self.costcenter(),
        })
    }
}

fn tag(key: &str, value: impl Into<Value>) -> Value {
    let value: Value = value.into();
    Value::Map(attributes! {
        "Key" => key,
        "Value" => value,
    })
}

fn propagated_tag(key: &str, value: Value) -> Value {
    Value::Map(attributes! {
        "Key" => key,
        "Value" => value,
        "PropagateAtLaunch" => true,
    })
}
