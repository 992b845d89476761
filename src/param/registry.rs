//! ParamRegistry - per-pipeline store of shared parameters (DashMap)
//!
//! One registry per pipeline, created with it and cleared on destroy.
//! Lookups return handles to the stored payload; `get` never locks it.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

use crate::error::{NodeflowError, Result};
use crate::status::Status;

use super::shared::{ErasedParam, Param, ParamSlot, SharedParam};

/// Thread-safe registry: name → type-erased parameter slot
#[derive(Default)]
pub struct ParamRegistry {
    params: DashMap<Arc<str>, Arc<dyn ErasedParam>>,
}

impl ParamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a parameter; fails if the name is taken
    pub fn create<T: Param>(&self, name: &str, value: T) -> Result<SharedParam<T>> {
        match self.params.entry(Arc::from(name)) {
            Entry::Occupied(_) => Err(NodeflowError::DuplicateParameter {
                name: name.to_string(),
            }),
            Entry::Vacant(vacant) => {
                let slot = Arc::new(ParamSlot::new(Arc::clone(vacant.key()), value));
                let handle = slot.handle();
                vacant.insert(slot);
                debug!(param = name, "shared parameter created");
                Ok(handle)
            }
        }
    }

    /// Look up a parameter by name and payload type
    pub fn get<T: Param>(&self, name: &str) -> Result<SharedParam<T>> {
        let slot = self
            .params
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| NodeflowError::UnknownParameter {
                name: name.to_string(),
            })?;

        slot.as_any()
            .downcast_ref::<ParamSlot<T>>()
            .map(ParamSlot::handle)
            .ok_or_else(|| NodeflowError::ParamTypeMismatch {
                name: name.to_string(),
                expected: std::any::type_name::<T>(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.params.iter().map(|e| e.key().to_string()).collect();
        names.sort();
        names
    }

    /// Type name of a parameter's payload
    pub fn type_of(&self, name: &str) -> Option<&'static str> {
        self.params.get(name).map(|e| e.value().type_name())
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Reset every parameter with the prior run's status; returns the count.
    ///
    /// Slots are collected first so no shard lock is held while user
    /// `reset` code runs.
    pub(crate) fn reset_all(&self, prior: &Status) -> usize {
        let slots: Vec<Arc<dyn ErasedParam>> =
            self.params.iter().map(|e| Arc::clone(e.value())).collect();
        for slot in &slots {
            slot.reset(prior);
        }
        slots.len()
    }

    pub(crate) fn clear(&self) {
        self.params.clear();
    }

    /// Drop every parameter whose name is not in `keep`
    pub(crate) fn retain_names(&self, keep: &[String]) {
        self.params.retain(|name, _| keep.iter().any(|k| k.as_str() == name.as_ref()));
    }
}

impl std::fmt::Debug for ParamRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParamRegistry")
            .field("params", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    struct Total(u64);
    impl Param for Total {
        fn reset(&mut self, _prior: &Status) {
            self.0 = 0;
        }
    }

    struct Label(String);
    impl Param for Label {}

    #[test]
    fn create_then_get_returns_same_payload() {
        let registry = ParamRegistry::new();
        let created = registry.create("total", Total(1)).unwrap();
        let fetched = registry.get::<Total>("total").unwrap();

        fetched.lock().0 += 41;
        assert_eq!(created.lock().0, 42);
        assert!(created.same_as(&fetched));
    }

    #[test]
    fn duplicate_create_fails() {
        let registry = ParamRegistry::new();
        registry.create("total", Total(0)).unwrap();
        let err = registry.create("total", Total(5)).unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::DuplicateParameter);
        assert_eq!(registry.get::<Total>("total").unwrap().lock().0, 0);
    }

    #[test]
    fn unknown_name_fails() {
        let registry = ParamRegistry::new();
        let err = registry.get::<Total>("missing").unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::UnknownParameter);
    }

    #[test]
    fn wrong_type_fails() {
        let registry = ParamRegistry::new();
        registry.create("label", Label("x".into())).unwrap();
        let err = registry.get::<Total>("label").unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::ParamTypeMismatch);
        assert!(registry.type_of("label").unwrap().ends_with("Label"));
    }

    #[test]
    fn reset_all_touches_every_param() {
        let registry = ParamRegistry::new();
        let a = registry.create("a", Total(3)).unwrap();
        let b = registry.create("b", Total(4)).unwrap();
        registry.create("label", Label("kept".into())).unwrap();

        assert_eq!(registry.reset_all(&Status::ok()), 3);
        assert_eq!(a.lock().0, 0);
        assert_eq!(b.lock().0, 0);
        assert_eq!(registry.get::<Label>("label").unwrap().lock().0, "kept");
    }

    #[test]
    fn retain_names_drops_the_rest() {
        let registry = ParamRegistry::new();
        registry.create("keep", Total(1)).unwrap();
        registry.create("drop", Total(2)).unwrap();

        registry.retain_names(&["keep".to_string()]);
        assert_eq!(registry.names(), vec!["keep".to_string()]);
    }

    #[test]
    fn names_are_sorted() {
        let registry = ParamRegistry::new();
        registry.create("zeta", Total(0)).unwrap();
        registry.create("alpha", Total(0)).unwrap();
        assert_eq!(registry.names(), vec!["alpha".to_string(), "zeta".to_string()]);
        registry.clear();
        assert!(registry.is_empty());
    }
}
