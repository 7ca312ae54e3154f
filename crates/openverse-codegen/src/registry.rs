//! Per-session registry of constructed models, keyed by name.

use std::collections::HashMap;

use crate::schema::{ref_name, Model, SchemaType};

/// Models registered during one generation session.
///
/// Registering a name twice replaces the earlier model. Type references hold
/// only the model name, so anything resolved after the replacement observes
/// the newer model.
#[derive(Debug, Default, Clone)]
pub struct ModelRegistry {
    models: HashMap<String, Model>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model, returning the model it replaced, if any.
    pub fn register(&mut self, model: Model) -> Option<Model> {
        let previous = self.models.insert(model.name.clone(), model);
        if let Some(previous) = &previous {
            tracing::debug!(model = %previous.name, "Replaced previously registered model");
        }
        previous
    }

    pub fn get(&self, name: &str) -> Option<&Model> {
        self.models.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    /// Resolve a `$ref` such as `#/components/schemas/Tag`.
    pub fn resolve_ref(&self, reference: &str) -> Option<&Model> {
        self.get(ref_name(reference))
    }

    /// Model registered under the built-in name of `ty`, if any.
    ///
    /// A registered model takes precedence over the built-in spelling.
    pub fn shadowing(&self, ty: &SchemaType) -> Option<&Model> {
        ty.raw_name().and_then(|name| self.get(name))
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
