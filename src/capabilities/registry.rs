//! Capability Registry: ordered name → capability mapping.
//!
//! Registration order is listing order. Names are unique; a second
//! registration under the same name is refused rather than replacing the
//! first.

use std::collections::HashMap;

use super::capability::{Capability, ToolDescriptor};
use super::catalog::builtin_capabilities;
use super::filter::EnabledTools;
use crate::platform::PlatformDescriptor;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("capability already registered: {0}")]
    DuplicateCapability(String),

    #[error("no handler bound for capability: {0}")]
    HandlerMissing(String),
}

/// What the registry needs to know to decide which capabilities exist for
/// one deployment.
#[derive(Debug, Clone, Copy)]
pub struct ListContext<'a> {
    pub enabled: &'a EnabledTools,
    pub platform: PlatformDescriptor,
}

/// Outcome of checking one name against a [`ListContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invocability {
    Invocable,
    /// Registered but not in the enabled set.
    Disabled,
    /// Enabled but its availability predicate does not hold.
    Unavailable,
    Unknown,
}

#[derive(Debug, Default)]
pub struct CapabilityRegistry {
    capabilities: Vec<Capability>,
    index: HashMap<String, usize>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in catalog.
    pub fn with_builtins() -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for capability in builtin_capabilities() {
            registry.register(capability)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, capability: Capability) -> Result<(), RegistryError> {
        if self.index.contains_key(&capability.name) {
            return Err(RegistryError::DuplicateCapability(capability.name));
        }
        self.index
            .insert(capability.name.clone(), self.capabilities.len());
        self.capabilities.push(capability);
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Option<&Capability> {
        self.index.get(name).map(|&i| &self.capabilities[i])
    }

    /// Every registered capability, in registration order.
    pub fn list(&self) -> &[Capability] {
        &self.capabilities
    }

    /// Capabilities passing both the enabled set and availability, in
    /// registration order.
    pub fn list_available(&self, ctx: &ListContext<'_>) -> Vec<&Capability> {
        self.capabilities
            .iter()
            .filter(|c| ctx.enabled.allows(&c.name) && c.availability.holds(&ctx.platform))
            .collect()
    }

    pub fn descriptors(&self, ctx: &ListContext<'_>) -> Vec<ToolDescriptor> {
        self.list_available(ctx)
            .into_iter()
            .map(Capability::descriptor)
            .collect()
    }

    pub fn check(&self, name: &str, ctx: &ListContext<'_>) -> Invocability {
        match self.resolve(name) {
            None => Invocability::Unknown,
            Some(_) if !ctx.enabled.allows(name) => Invocability::Disabled,
            Some(c) if !c.availability.holds(&ctx.platform) => Invocability::Unavailable,
            Some(_) => Invocability::Invocable,
        }
    }

    pub fn is_invocable(&self, name: &str, ctx: &ListContext<'_>) -> bool {
        self.check(name, ctx) == Invocability::Invocable
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.capabilities.iter().map(|c| c.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }
}
