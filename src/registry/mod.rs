//! Model and adapter registry
//!
//! An explicit [`Registry`] value replaces process-wide globals: build one at
//! startup, wrap it in an `Arc`, and pass it to whatever needs lookups. Tests
//! construct a fresh registry each.
//!
//! Models are keyed by `(id, provider)` and merge additively: registering the
//! same key again must keep the display name, while capabilities and
//! constraints accumulate across capability packages. A parameter may be
//! declared again only with an equal constraint.

mod model;

pub use model::Model;

use crate::error::{OmniError, Result};
use crate::providers::ProviderAdapter;
use crate::types::{Capability, Provider};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

#[derive(Default)]
pub struct Registry {
    models: BTreeMap<(String, Provider), Model>,
    adapters: HashMap<(Capability, Provider), Arc<dyn ProviderAdapter>>,
    loaded_packages: HashSet<String>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("models", &self.models.len())
            .field("adapters", &self.adapters.len())
            .field("loaded_packages", &self.loaded_packages)
            .finish()
    }
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every enabled built-in provider package loaded.
    pub fn with_builtin() -> Result<Self> {
        let mut registry = Self::new();
        crate::providers::register_builtin(&mut registry)?;
        Ok(registry)
    }

    /// Register models under `capability`, merging with existing entries.
    pub fn register_models(
        &mut self,
        models: impl IntoIterator<Item = Model>,
        capability: Capability,
    ) -> Result<()> {
        for mut model in models {
            model.capabilities.insert(capability);
            let key = (model.id.clone(), model.provider);
            match self.models.get_mut(&key) {
                Some(existing) => {
                    if existing.display_name != model.display_name {
                        return Err(OmniError::Validation(format!(
                            "Model '{}' for provider {} already registered as '{}', got display name '{}'",
                            model.id, model.provider, existing.display_name, model.display_name
                        )));
                    }
                    let conflict = model.parameter_constraints.iter().find(|(param, constraint)| {
                        existing
                            .parameter_constraints
                            .get(*param)
                            .is_some_and(|current| current != *constraint)
                    });
                    if let Some((param, _)) = conflict {
                        return Err(OmniError::Validation(format!(
                            "Model '{}' for provider {} already registered with a different constraint for '{}'",
                            model.id, model.provider, param
                        )));
                    }
                    existing.capabilities.extend(model.capabilities);
                    for (param, constraint) in model.parameter_constraints {
                        existing.parameter_constraints.entry(param).or_insert(constraint);
                    }
                    existing.streaming |= model.streaming;
                }
                None => {
                    tracing::trace!(model = %model.id, provider = %model.provider, %capability, "registered model");
                    self.models.insert(key, model);
                }
            }
        }
        Ok(())
    }

    /// Register the adapter serving `(adapter.capability(), adapter.provider())`.
    pub fn register_adapter(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters
            .insert((adapter.capability(), adapter.provider()), adapter);
    }

    /// Run `loader` once per package name. Returns `false` when already loaded.
    pub fn load_package<F>(&mut self, name: &str, loader: F) -> Result<bool>
    where
        F: FnOnce(&mut Registry) -> Result<()>,
    {
        if self.loaded_packages.contains(name) {
            return Ok(false);
        }
        loader(self)?;
        self.loaded_packages.insert(name.to_string());
        tracing::debug!(package = name, "loaded provider package");
        Ok(true)
    }

    /// Look up a model by id, optionally narrowed to one provider.
    pub fn get_model(&self, id: &str, provider: Option<Provider>) -> Option<&Model> {
        match provider {
            Some(p) => self.models.get(&(id.to_string(), p)),
            None => self.models.values().find(|m| m.id == id),
        }
    }

    /// Like [`Registry::get_model`] but fails with `ModelNotFound`.
    pub fn require_model(&self, id: &str, provider: Option<Provider>) -> Result<&Model> {
        self.get_model(id, provider)
            .ok_or_else(|| OmniError::ModelNotFound {
                model_id: id.to_string(),
                provider: provider
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "any".to_string()),
            })
    }

    pub fn list_models(
        &self,
        provider: Option<Provider>,
        capability: Option<Capability>,
    ) -> Vec<&Model> {
        self.models
            .values()
            .filter(|m| provider.is_none_or(|p| m.provider == p))
            .filter(|m| capability.is_none_or(|c| m.capabilities.contains(&c)))
            .collect()
    }

    pub fn adapter(
        &self,
        capability: Capability,
        provider: Provider,
    ) -> Result<Arc<dyn ProviderAdapter>> {
        self.adapters
            .get(&(capability, provider))
            .cloned()
            .ok_or(OmniError::ClientNotFound {
                capability,
                provider,
            })
    }

    pub fn providers_for(&self, capability: Capability) -> Vec<Provider> {
        let mut providers: Vec<Provider> = self
            .adapters
            .keys()
            .filter(|(c, _)| *c == capability)
            .map(|(_, p)| *p)
            .collect();
        providers.sort();
        providers
    }
}
