//! Generic named-factory store.
//!
//! A [`Registry`] maps short symbolic keys to constructible entries, letting
//! independently-authored components be looked up by the name an experiment
//! profile selects, without the assembly code knowing concrete types. One
//! registry instance exists per architectural role (see
//! [`crate::modeling::registries`]); the type itself is contract-agnostic.

use indexmap::IndexMap;

use crate::error::{GlipError, GlipResult};

/// An ordered mapping from symbolic key to a registered entry.
///
/// Keys are unique within one instance: registering an existing key is a hard
/// error, never a silent overwrite. Iteration follows insertion order, so key
/// listings in error messages are deterministic.
#[derive(Debug, Clone)]
pub struct Registry<T> {
    name: String,
    entries: IndexMap<String, T>,
}

impl<T> Registry<T> {
    /// Creates an empty registry. `name` identifies the role group in errors.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: IndexMap::new(),
        }
    }

    /// The role-group name this registry was created with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registers `entry` under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`GlipError::DuplicateKey`] if `key` is already present; the
    /// original entry is left untouched.
    pub fn register(&mut self, key: impl Into<String>, entry: T) -> GlipResult<()> {
        let key = key.into();
        if self.entries.contains_key(&key) {
            return Err(GlipError::DuplicateKey {
                key,
                registry: self.name.clone(),
            });
        }
        self.entries.insert(key, entry);
        Ok(())
    }

    /// Returns the entry registered under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`GlipError::UnknownKey`] listing the registered keys if `key`
    /// is absent.
    pub fn get(&self, key: &str) -> GlipResult<&T> {
        self.entries.get(key).ok_or_else(|| self.unknown_key(key))
    }

    /// Removes and returns the entry registered under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`GlipError::UnknownKey`] if `key` is absent.
    pub fn unregister(&mut self, key: &str) -> GlipResult<T> {
        // shift_remove keeps the insertion order of the remaining keys.
        self.entries
            .shift_remove(key)
            .ok_or_else(|| self.unknown_key(key))
    }

    /// Whether `key` is registered.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Iterates over the registered keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of registered entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn unknown_key(&self, key: &str) -> GlipError {
        GlipError::UnknownKey {
            key: key.to_owned(),
            registry: self.name.clone(),
            known: self.known(),
        }
    }

    fn known(&self) -> String {
        if self.entries.is_empty() {
            "<none>".to_owned()
        } else {
            self.keys().collect::<Vec<_>>().join(", ")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_on_fresh_registry_fails() {
        let registry: Registry<usize> = Registry::new("backbone");
        assert_eq!(registry.name(), "backbone");
        assert!(registry.is_empty());

        match registry.get("swin-t") {
            Err(GlipError::UnknownKey { key, registry, .. }) => {
                assert_eq!(key, "swin-t");
                assert_eq!(registry, "backbone");
            }
            _ => panic!("Expected UnknownKey error"),
        }
    }

    #[test]
    fn get_returns_the_registered_entry() {
        let mut registry = Registry::new("backbone");
        registry.register("swin-t", 96_usize).unwrap();

        assert_eq!(*registry.get("swin-t").unwrap(), 96);
    }

    #[test]
    fn duplicate_registration_fails_and_keeps_original() {
        let mut registry = Registry::new("backbone");
        registry.register("swin-t", 96_usize).unwrap();

        match registry.register("swin-t", 192) {
            Err(GlipError::DuplicateKey { key, .. }) => assert_eq!(key, "swin-t"),
            _ => panic!("Expected DuplicateKey error"),
        }
        assert_eq!(*registry.get("swin-t").unwrap(), 96);
    }

    #[test]
    fn keys_yields_every_registration_in_order() {
        let mut registry = Registry::new("backbone");
        registry.register("swin-t", 1_usize).unwrap();
        registry.register("swin-l", 2).unwrap();
        registry.register("r-50", 3).unwrap();

        let keys: Vec<_> = registry.keys().collect();
        assert_eq!(keys, ["swin-t", "swin-l", "r-50"]);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn unknown_key_error_lists_registered_keys() {
        let mut registry = Registry::new("backbone");
        registry.register("swin-t", ()).unwrap();
        registry.register("swin-l", ()).unwrap();

        let message = registry.get("swim-t").unwrap_err().to_string();
        assert!(message.contains("swim-t"));
        assert!(message.contains("swin-t, swin-l"));
    }

    #[test]
    fn unregister_removes_the_entry() {
        let mut registry = Registry::new("backbone");
        registry.register("swin-t", ()).unwrap();

        registry.unregister("swin-t").unwrap();
        assert!(!registry.contains("swin-t"));
        assert!(registry.unregister("swin-t").is_err());
    }
}
