// crates/nexus-router-core/src/registry.rs
// ============================================================================
// Module: Adapter Registry
// Description: In-process, non-global collection of adapters.
// Purpose: Registration, lookup, and capability queries for the router.
// Dependencies: crate::adapter, crate::error, crate::model
// ============================================================================

//! ## Overview
//! The registry is owned by the host process, constructed before runs start,
//! and treated as read-only during execution. It is backed by a
//! `BTreeMap`, which gives the lexicographic-by-`adapter_id` listing order
//! required for determinism for free.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use crate::adapter::Adapter;
use crate::adapter::AdapterInfo;
use crate::error::RegistryError;
use crate::model::Capability;

// ============================================================================
// SECTION: Registry
// ============================================================================

/// A non-global collection of adapters, keyed by `adapter_id`.
///
/// # Invariants
/// - An adapter is referenced by exactly one registry at a time (no aliasing
///   across registries): registration takes ownership.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: BTreeMap<String, Box<dyn Adapter>>,
    default_adapter_id: Option<String>,
}

impl AdapterRegistry {
    /// Creates an empty registry with no default adapter.
    #[must_use]
    pub fn new() -> Self {
        Self { adapters: BTreeMap::new(), default_adapter_id: None }
    }

    /// Registers an adapter, taking ownership of it.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateAdapter`] if `adapter_id` is already
    /// present.
    pub fn register(&mut self, adapter: Box<dyn Adapter>) -> Result<(), RegistryError> {
        let adapter_id = adapter.adapter_id().to_string();
        if self.adapters.contains_key(&adapter_id) {
            return Err(RegistryError::DuplicateAdapter { adapter_id });
        }
        self.adapters.insert(adapter_id, adapter);
        Ok(())
    }

    /// Registers an adapter and marks it the registry's default in one call.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateAdapter`] if `adapter_id` is already
    /// present.
    pub fn register_default(&mut self, adapter: Box<dyn Adapter>) -> Result<(), RegistryError> {
        let adapter_id = adapter.adapter_id().to_string();
        self.register(adapter)?;
        self.default_adapter_id = Some(adapter_id);
        Ok(())
    }

    /// Sets (or replaces) which registered adapter is the default.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownAdapter`] if `adapter_id` is not
    /// registered.
    pub fn set_default(&mut self, adapter_id: &str) -> Result<(), RegistryError> {
        if !self.adapters.contains_key(adapter_id) {
            return Err(RegistryError::UnknownAdapter {
                adapter_id: adapter_id.to_string(),
                available_adapters: self.list_ids(),
            });
        }
        self.default_adapter_id = Some(adapter_id.to_string());
        Ok(())
    }

    /// Looks up an adapter by id.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownAdapter`] if `adapter_id` is not
    /// registered.
    pub fn get(&self, adapter_id: &str) -> Result<&dyn Adapter, RegistryError> {
        self.adapters
            .get(adapter_id)
            .map(AsRef::as_ref)
            .ok_or_else(|| RegistryError::UnknownAdapter {
                adapter_id: adapter_id.to_string(),
                available_adapters: self.list_ids(),
            })
    }

    /// Returns the registry's default adapter.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NoDefaultAdapter`] if no default has been
    /// configured, or the configured default is no longer registered.
    pub fn get_default(&self) -> Result<&dyn Adapter, RegistryError> {
        let adapter_id = self.default_adapter_id.as_deref().ok_or_else(|| {
            RegistryError::NoDefaultAdapter { available_adapters: self.list_ids() }
        })?;
        self.adapters.get(adapter_id).map(AsRef::as_ref).ok_or_else(|| {
            RegistryError::NoDefaultAdapter { available_adapters: self.list_ids() }
        })
    }

    /// Lists all registered adapter ids, lexicographically sorted.
    #[must_use]
    pub fn list_ids(&self) -> Vec<String> {
        self.adapters.keys().cloned().collect()
    }

    /// Lists all registered adapters as info snapshots, lexicographically
    /// sorted by `adapter_id`.
    #[must_use]
    pub fn list_adapters(&self) -> Vec<AdapterInfo> {
        self.adapters.values().map(|adapter| AdapterInfo::from_adapter(adapter.as_ref())).collect()
    }

    /// Returns all registered adapter ids that declare `capability`,
    /// lexicographically sorted.
    #[must_use]
    pub fn find_by_capability(&self, capability: Capability) -> Vec<String> {
        self.adapters
            .iter()
            .filter(|(_, adapter)| adapter.capabilities().contains(&capability))
            .map(|(adapter_id, _)| adapter_id.clone())
            .collect()
    }

    /// Reports whether `adapter_id` declares `capability`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownAdapter`] if `adapter_id` is not
    /// registered.
    pub fn has_capability(
        &self,
        adapter_id: &str,
        capability: Capability,
    ) -> Result<bool, RegistryError> {
        Ok(self.get(adapter_id)?.capabilities().contains(&capability))
    }

    /// Requires that `adapter_id` declares `capability`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownAdapter`] if `adapter_id` is not
    /// registered, or [`RegistryError::CapabilityMissing`] if it does not
    /// declare `capability`.
    pub fn require_capability(
        &self,
        adapter_id: &str,
        capability: Capability,
    ) -> Result<(), RegistryError> {
        let adapter = self.get(adapter_id)?;
        if adapter.capabilities().contains(&capability) {
            return Ok(());
        }
        Err(RegistryError::CapabilityMissing {
            adapter_id: adapter_id.to_string(),
            capability: capability.as_str().to_string(),
            adapter_capabilities: adapter
                .capabilities()
                .iter()
                .map(|cap| cap.as_str().to_string())
                .collect(),
        })
    }
}
