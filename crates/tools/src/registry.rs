//! Category-keyed action handler registry.
//!
//! Explicitly constructed and dependency-injected into the action
//! dispatcher at startup, never a module-level global. Lookup of an
//! unregistered action returns `None`; the caller turns that into a handled
//! failure, not an error.

use std::collections::HashMap;
use std::sync::Arc;

use crate::action::{ActionCategory, ActionHandler};

struct Registered {
    category: ActionCategory,
    handler: Arc<dyn ActionHandler>,
}

/// Manages available action handlers and their lookup.
#[derive(Default)]
pub struct ToolRegistry {
    actions: HashMap<String, Registered>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its declared name and category.
    /// Returns an error if the name is already taken.
    pub fn register(&mut self, handler: impl ActionHandler + 'static) -> Result<(), RegistryError> {
        let name = handler.name().to_string();
        if self.actions.contains_key(&name) {
            return Err(RegistryError::DuplicateName(name));
        }
        self.actions.insert(
            name,
            Registered {
                category: handler.category(),
                handler: Arc::new(handler),
            },
        );
        Ok(())
    }

    /// Resolve an action type to its handler.
    pub fn get(&self, action_type: &str) -> Option<Arc<dyn ActionHandler>> {
        self.actions
            .get(action_type)
            .map(|r| Arc::clone(&r.handler))
    }

    /// Category of a registered action, if present.
    pub fn category_of(&self, action_type: &str) -> Option<ActionCategory> {
        self.actions.get(action_type).map(|r| r.category)
    }

    /// All registered action names in a category.
    pub fn names_in(&self, category: ActionCategory) -> Vec<&str> {
        self.actions
            .iter()
            .filter(|(_, r)| r.category == category)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("action '{0}' is already registered")]
    DuplicateName(String),
}
