//! Canonical JSON rendering of a resolved document
//!
//! Output is deterministic: sections and the entries inside them follow
//! registration order, and every mapping keeps its insertion order. Nothing
//! here depends on hash iteration order.

pub mod config;

pub use config::SerializeConfig;

use serde_json::{Map, Value as Json};
use thiserror::Error;

use crate::document::{Number, Section};
use crate::resolve::{ResolvedDeclaration, ResolvedDocument, ResolvedValue};

/// Errors that can occur while rendering a document
#[derive(Debug, Error)]
pub enum SerializeError {
    /// A value with no representation in the output format
    #[error("unserializable value at {path}: {reason}")]
    UnserializableValue { path: String, reason: String },

    #[error("failed to encode document: {0}")]
    Json(#[from] serde_json::Error),
}

impl SerializeError {
    pub fn unserializable(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnserializableValue {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Render a resolved document as text
pub fn serialize(document: &ResolvedDocument, config: &SerializeConfig) -> Result<String, SerializeError> {
    let tree = to_json(document, config)?;
    let text = if config.pretty {
        serde_json::to_string_pretty(&tree)?
    } else {
        serde_json::to_string(&tree)?
    };
    Ok(text)
}

/// Build the JSON tree of a resolved document
pub fn to_json(document: &ResolvedDocument, config: &SerializeConfig) -> Result<Json, SerializeError> {
    let mut root = Map::new();
    root.insert(
        "AWSTemplateFormatVersion".to_string(),
        Json::String(document.format_version.clone()),
    );
    root.insert(
        "Description".to_string(),
        Json::String(document.description.clone()),
    );

    for section in Section::ALL {
        let mut entries = Map::new();
        for decl in document.section(section) {
            let path = format!("{}.{}", section.key(), decl.id);
            entries.insert(decl.id.to_string(), encode_declaration(decl, &path)?);
        }
        if entries.is_empty() && config.omit_empty_sections {
            continue;
        }
        root.insert(section.key().to_string(), Json::Object(entries));
    }

    Ok(Json::Object(root))
}

fn encode_declaration(decl: &ResolvedDeclaration, path: &str) -> Result<Json, SerializeError> {
    match decl.section {
        Section::Parameter => {
            let mut entry = Map::new();
            entry.insert("Type".to_string(), Json::String(decl.kind.clone()));
            encode_entries(&decl.attributes, path, &mut entry)?;
            Ok(Json::Object(entry))
        }
        Section::Condition => match decl.expression() {
            Some(expression) => encode(expression, path),
            None => Err(SerializeError::unserializable(path, "condition has no expression")),
        },
        Section::Resource => encode_resource(decl, path),
        Section::Output => {
            let mut entry = Map::new();
            if let Some(condition) = &decl.condition {
                entry.insert("Condition".to_string(), Json::String(condition.to_string()));
            }
            encode_entries(&decl.attributes, path, &mut entry)?;
            Ok(Json::Object(entry))
        }
    }
}

fn encode_resource(decl: &ResolvedDeclaration, path: &str) -> Result<Json, SerializeError> {
    let mut entry = Map::new();
    entry.insert("Type".to_string(), Json::String(decl.kind.clone()));
    if let Some(condition) = &decl.condition {
        entry.insert("Condition".to_string(), Json::String(condition.to_string()));
    }
    if !decl.depends_on.is_empty() {
        let deps = decl
            .depends_on
            .iter()
            .map(|d| Json::String(d.to_string()))
            .collect();
        entry.insert("DependsOn".to_string(), Json::Array(deps));
    }
    if let Some(policy) = decl.deletion_policy {
        entry.insert(
            "DeletionPolicy".to_string(),
            Json::String(policy.as_str().to_string()),
        );
    }
    if let Some(policy) = &decl.update_policy {
        let policy_path = format!("{}.UpdatePolicy", path);
        entry.insert("UpdatePolicy".to_string(), encode(policy, &policy_path)?);
    }

    let mut properties = Map::new();
    encode_entries(&decl.attributes, &format!("{}.Properties", path), &mut properties)?;
    entry.insert("Properties".to_string(), Json::Object(properties));
    Ok(Json::Object(entry))
}

fn encode_entries(
    entries: &indexmap::IndexMap<String, ResolvedValue>,
    path: &str,
    out: &mut Map<String, Json>,
) -> Result<(), SerializeError> {
    for (key, value) in entries {
        let child = format!("{}.{}", path, key);
        out.insert(key.clone(), encode(value, &child)?);
    }
    Ok(())
}

/// Encode a single resolved value
fn encode(value: &ResolvedValue, path: &str) -> Result<Json, SerializeError> {
    match value {
        ResolvedValue::String(s) => Ok(Json::String(s.clone())),
        ResolvedValue::Bool(b) => Ok(Json::Bool(*b)),
        ResolvedValue::Number(Number::Int(n)) => Ok(Json::from(*n)),
        ResolvedValue::Number(Number::Float(f)) => serde_json::Number::from_f64(*f)
            .map(Json::Number)
            .ok_or_else(|| SerializeError::unserializable(path, format!("non-finite number {}", f))),
        ResolvedValue::List(items) => encode_list(items, path).map(Json::Array),
        ResolvedValue::Map(entries) => {
            let mut map = Map::new();
            encode_entries(entries, path, &mut map)?;
            Ok(Json::Object(map))
        }
        ResolvedValue::Ref(target) => Ok(intrinsic("Ref", Json::String(target.clone()))),
        ResolvedValue::GetAtt { target, attribute } => Ok(intrinsic(
            "Fn::GetAtt",
            Json::Array(vec![
                Json::String(target.clone()),
                Json::String(attribute.clone()),
            ]),
        )),
        ResolvedValue::Join { separator, parts } => {
            let parts = encode_list(parts, &format!("{}.Fn::Join", path))?;
            Ok(intrinsic(
                "Fn::Join",
                Json::Array(vec![Json::String(separator.clone()), Json::Array(parts)]),
            ))
        }
        ResolvedValue::If {
            condition,
            then,
            otherwise,
        } => {
            let path = format!("{}.Fn::If", path);
            Ok(intrinsic(
                "Fn::If",
                Json::Array(vec![
                    Json::String(condition.clone()),
                    encode(then, &format!("{}[1]", path))?,
                    encode(otherwise, &format!("{}[2]", path))?,
                ]),
            ))
        }
        ResolvedValue::Equals(a, b) => {
            let path = format!("{}.Fn::Equals", path);
            Ok(intrinsic(
                "Fn::Equals",
                Json::Array(vec![
                    encode(a, &format!("{}[0]", path))?,
                    encode(b, &format!("{}[1]", path))?,
                ]),
            ))
        }
        ResolvedValue::Base64(inner) => Ok(intrinsic(
            "Fn::Base64",
            encode(inner, &format!("{}.Fn::Base64", path))?,
        )),
    }
}

fn encode_list(items: &[ResolvedValue], path: &str) -> Result<Vec<Json>, SerializeError> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| encode(item, &format!("{}[{}]", path, i)))
        .collect()
}

/// Single-key object naming an engine intrinsic
fn intrinsic(name: &str, argument: Json) -> Json {
    let mut map = Map::new();
    map.insert(name.to_string(), argument);
    Json::Object(map)
}
