//! Process-wide registry of flow definitions.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::definition::FlowDefinition;

/// Errors raised while assembling a [`FlowRegistry`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// Two definitions share an identifier.
    #[error("flow `{id}` registered twice")]
    DuplicateFlow {
        /// Conflicting identifier.
        id: String,
    },
}

/// Result alias for registry construction.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Immutable set of flow definitions keyed by id.
///
/// Built once at startup and shared as `Arc<FlowRegistry>`; there is no way to
/// add or remove flows afterwards.
#[derive(Debug, Default)]
pub struct FlowRegistry {
    flows: Vec<Arc<FlowDefinition>>,
    index: HashMap<String, usize>,
}

impl FlowRegistry {
    /// Starts an empty builder.
    #[must_use]
    pub fn builder() -> FlowRegistryBuilder {
        FlowRegistryBuilder::default()
    }

    /// Looks up a definition by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Arc<FlowDefinition>> {
        self.index.get(id).map(|&slot| &self.flows[slot])
    }

    /// Iterates definitions in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<FlowDefinition>> {
        self.flows.iter()
    }

    /// Registered flow identifiers in registration order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.flows.iter().map(|flow| flow.id().as_str())
    }

    /// Number of registered flows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.flows.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }
}

/// Collects definitions and rejects duplicate ids.
#[derive(Debug, Default)]
pub struct FlowRegistryBuilder {
    registry: FlowRegistry,
}

impl FlowRegistryBuilder {
    /// Adds a definition.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateFlow`] when the id is already taken.
    pub fn register(mut self, definition: FlowDefinition) -> RegistryResult<Self> {
        let id = definition.id().as_str().to_owned();
        if self.registry.index.contains_key(&id) {
            return Err(RegistryError::DuplicateFlow { id });
        }
        debug!(flow = %id, "flow registered");
        self.registry.index.insert(id, self.registry.flows.len());
        self.registry.flows.push(Arc::new(definition));
        Ok(self)
    }

    /// Freezes the registry.
    #[must_use]
    pub fn build(self) -> Arc<FlowRegistry> {
        Arc::new(self.registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use advisor_primitives::{Contract, FieldSpec, FlowId};

    fn definition(id: &str) -> FlowDefinition {
        let input = Contract::from_fields([FieldSpec::string("feedData", "feed")]).unwrap();
        let output = Contract::from_fields([FieldSpec::string("reasoning", "why")]).unwrap();
        FlowDefinition::builder(FlowId::new(id).unwrap(), input, output)
            .template("{{{feedData}}}")
            .unwrap()
    }

    #[test]
    fn lookups_follow_registration() {
        let registry = FlowRegistry::builder()
            .register(definition("combustion"))
            .unwrap()
            .register(definition("quality-correction"))
            .unwrap()
            .build();

        assert_eq!(registry.len(), 2);
        assert!(registry.get("combustion").is_some());
        assert!(registry.get("unknown").is_none());
        assert_eq!(
            registry.ids().collect::<Vec<_>>(),
            ["combustion", "quality-correction"]
        );
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = FlowRegistry::builder()
            .register(definition("combustion"))
            .unwrap()
            .register(definition("combustion"))
            .expect_err("duplicate");
        assert_eq!(
            err,
            RegistryError::DuplicateFlow {
                id: "combustion".into()
            }
        );
    }
}
