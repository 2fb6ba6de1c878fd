//! # Identity Cache
//!
//! Two maps that spare round-trips to the KG:
//! - `objects`: instance URI -> last known object
//! - `saved`: (class, normalized existence filters) -> instance URI
//!
//! The second map matters because kg-core indexes new instances with a delay:
//! an existence query issued right after a create may not see it yet, and
//! would lead to the same object being created twice.

use crate::object::KgObject;
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub struct IdentityCache {
    objects: BTreeMap<String, KgObject>,
    saved: BTreeMap<(String, String), String>,
}

impl IdentityCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&KgObject> {
        self.objects.get(id)
    }

    /// Cache an object under its id. Objects without id are ignored.
    pub fn insert(&mut self, obj: &KgObject) -> bool {
        match &obj.id {
            Some(id) => {
                self.objects.insert(id.clone(), obj.clone());
                true
            }
            None => false,
        }
    }

    /// Drop an object and every save-cache entry pointing at it.
    pub fn remove(&mut self, id: &str) -> Option<KgObject> {
        self.saved.retain(|_, saved_id| saved_id != id);
        self.objects.remove(id)
    }

    #[must_use]
    pub fn lookup_saved(&self, key: &(String, String)) -> Option<&str> {
        self.saved.get(key).map(String::as_str)
    }

    pub fn record_saved(&mut self, key: (String, String), id: impl Into<String>) {
        self.saved.insert(key, id.into());
    }

    pub fn clear(&mut self) {
        self.objects.clear();
        self.saved.clear();
    }

    /// Number of cached objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty() && self.saved.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openminds;

    const ID: &str = "https://kg.ebrains.eu/api/instances/9d2c9f3e-4a4d-4b9e-8a0b-2f0c7b1e6a11";

    #[test]
    fn insert_requires_id() {
        let reg = openminds::core_registry().expect("registry");
        let mut cache = IdentityCache::new();
        let unsaved = KgObject::new(reg.get("Person").expect("person"));
        assert!(!cache.insert(&unsaved));
        let saved = unsaved.with_id(ID).expect("id");
        assert!(cache.insert(&saved));
        assert_eq!(cache.get(ID), Some(&saved));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn remove_forgets_saved_keys() {
        let mut cache = IdentityCache::new();
        let key = ("Person".to_string(), "given_name=Ada".to_string());
        cache.record_saved(key.clone(), ID);
        assert_eq!(cache.lookup_saved(&key), Some(ID));
        assert!(!cache.is_empty());
        cache.remove(ID);
        assert_eq!(cache.lookup_saved(&key), None);
        assert!(cache.is_empty());
    }
}
