//! Reusable declaration bundles
//!
//! A bundle is a fixed, ordered set of declaration factories that several
//! stacks share (standard tag parameters, network addressing). Registering a
//! bundle produces fresh declarations in the target document and hands back
//! handles for building further references to them. The bundle itself keeps
//! no state between registrations, so one value can be registered into any
//! number of independent documents.
//!
//! Ids are the fixed names baked into the factories. Registration is all or
//! nothing: registering the same bundle twice into one document fails with a
//! duplicate id and leaves the document as it was.

mod network;
mod tags;

pub use network::{
    subnet_cidr_output_id, subnet_cidr_param_id, NetworkBundle, NetworkHandles,
    DEFAULT_SUBNET_CIDR_BLOCKS,
};
pub use tags::{TagBundle, TagHandles};

use indexmap::IndexMap;

use crate::document::{Declaration, Document, DocumentError, LogicalId, Section, Value};

/// Something that can be registered into a document as a unit
pub trait Bundle {
    /// Handles to the registered declarations
    type Handles;

    /// Register every declaration of the bundle, in order, or none of them
    fn register_into(&self, document: &mut Document) -> Result<Self::Handles, DocumentError>;
}

type Factory = Box<dyn Fn() -> Declaration>;

/// A bundle assembled from named declaration factories
#[derive(Default)]
pub struct FactoryBundle {
    factories: Vec<(String, Factory)>,
}

impl FactoryBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a factory; `name` is the handle name callers look it up by
    pub fn with(
        mut self,
        name: impl Into<String>,
        factory: impl Fn() -> Declaration + 'static,
    ) -> Self {
        self.factories.push((name.into(), Box::new(factory)));
        self
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Handle names in registration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.iter().map(|(name, _)| name.as_str())
    }
}

impl std::fmt::Debug for FactoryBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FactoryBundle")
            .field("names", &self.names().collect::<Vec<_>>())
            .finish()
    }
}

impl Bundle for FactoryBundle {
    type Handles = HandleSet;

    fn register_into(&self, document: &mut Document) -> Result<HandleSet, DocumentError> {
        let declarations: Vec<Declaration> =
            self.factories.iter().map(|(_, factory)| factory()).collect();
        let sections: Vec<Section> = declarations.iter().map(Declaration::section).collect();
        let ids = document.register_all(declarations)?;

        let handles = self
            .factories
            .iter()
            .zip(ids.into_iter().zip(sections))
            .map(|((name, _), handle)| (name.clone(), handle))
            .collect::<IndexMap<_, _>>();
        Ok(HandleSet { handles })
    }
}

/// Named handles produced by registering a [`FactoryBundle`]
#[derive(Debug, Clone, PartialEq)]
pub struct HandleSet {
    handles: IndexMap<String, (LogicalId, Section)>,
}

impl HandleSet {
    /// Logical id registered under a handle name
    pub fn id(&self, name: &str) -> Option<&LogicalId> {
        self.handles.get(name).map(|(id, _)| id)
    }

    pub fn section(&self, name: &str) -> Option<Section> {
        self.handles.get(name).map(|(_, section)| *section)
    }

    /// `Ref` to the declaration registered under a handle name
    pub fn reference(&self, name: &str) -> Option<Value> {
        self.id(name).map(Value::reference)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Handle names in registration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handles.keys().map(|k| k.as_str())
    }
}
