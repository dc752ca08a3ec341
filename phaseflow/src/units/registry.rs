//! Work-unit identities and the factory registry that resolves them.

use super::WorkUnit;
use crate::errors::ResolveError;
use parking_lot::RwLock;
use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::fmt;

/// Identity of the work unit bound to a step.
///
/// Two steps of the same phase may not share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UnitKey {
    /// Identified by a Rust type.
    Type {
        /// The type's id.
        id: TypeId,
        /// The type's full path, for diagnostics.
        name: &'static str,
    },
    /// Identified by a registry name.
    Named(String),
}

impl UnitKey {
    /// Returns the key for a work-unit type.
    #[must_use]
    pub fn of<U: 'static>() -> Self {
        Self::Type {
            id: TypeId::of::<U>(),
            name: type_name::<U>(),
        }
    }

    /// Returns a key for a named work unit.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    /// Returns a short, human-readable name.
    #[must_use]
    pub fn short_name(&self) -> &str {
        match self {
            Self::Type { name, .. } => {
                let base = name.split('<').next().unwrap_or(name);
                base.rsplit("::").next().unwrap_or(base)
            }
            Self::Named(name) => name,
        }
    }
}

impl fmt::Display for UnitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// Produces work-unit instances for keys.
#[cfg_attr(test, mockall::automock)]
pub trait UnitResolver: Send + Sync {
    /// Builds a fresh instance for `key`.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError` when nothing is registered for `key` or the
    /// factory fails.
    fn resolve(&self, key: &UnitKey) -> Result<Box<dyn WorkUnit>, ResolveError>;
}

/// Factory function type for creating work units.
pub type UnitFactory = Box<dyn Fn() -> Result<Box<dyn WorkUnit>, ResolveError> + Send + Sync>;

/// Registry of work-unit factories.
///
/// Every resolution calls the factory again, so instances never share state
/// unless the factory hands it out explicitly.
#[derive(Default)]
pub struct UnitRegistry {
    factories: RwLock<HashMap<UnitKey, UnitFactory>>,
}

impl UnitRegistry {
    /// Creates a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory for the work-unit type `U`.
    pub fn register<U, F>(&self, factory: F)
    where
        U: WorkUnit + 'static,
        F: Fn() -> U + Send + Sync + 'static,
    {
        self.register_keyed(UnitKey::of::<U>(), factory);
    }

    /// Registers a factory under an explicit key.
    pub fn register_keyed<U, F>(&self, key: UnitKey, factory: F)
    where
        U: WorkUnit + 'static,
        F: Fn() -> U + Send + Sync + 'static,
    {
        self.register_factory(key, Box::new(move || Ok(Box::new(factory()) as Box<dyn WorkUnit>)));
    }

    /// Registers a factory that may fail to build an instance.
    pub fn register_fallible<U, F>(&self, key: UnitKey, factory: F)
    where
        U: WorkUnit + 'static,
        F: Fn() -> anyhow::Result<U> + Send + Sync + 'static,
    {
        let unit = key.to_string();
        self.register_factory(
            key,
            Box::new(move || {
                factory()
                    .map(|u| Box::new(u) as Box<dyn WorkUnit>)
                    .map_err(|e| ResolveError::factory(&unit, e.to_string()))
            }),
        );
    }

    /// Registers a boxed factory, replacing any previous one for the key.
    pub fn register_factory(&self, key: UnitKey, factory: UnitFactory) {
        self.factories.write().insert(key, factory);
    }

    /// Checks if a key is registered.
    #[must_use]
    pub fn contains(&self, key: &UnitKey) -> bool {
        self.factories.read().contains_key(key)
    }

    /// Returns the number of registered factories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.read().len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.read().is_empty()
    }
}

impl UnitResolver for UnitRegistry {
    fn resolve(&self, key: &UnitKey) -> Result<Box<dyn WorkUnit>, ResolveError> {
        let factories = self.factories.read();
        let factory = factories
            .get(key)
            .ok_or_else(|| ResolveError::not_registered(key.to_string()))?;
        factory()
    }
}

impl fmt::Debug for UnitRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<String> = self.factories.read().keys().map(ToString::to_string).collect();
        keys.sort();
        f.debug_struct("UnitRegistry").field("units", &keys).finish()
    }
}
