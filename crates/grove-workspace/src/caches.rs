//! Caches of values derived from workspace state.
//!
//! Analysis passes park their results here under a key, type-erased, and
//! the workspace clears whole caches when the state they were derived
//! from changes. Payloads are `Arc`ed so readers keep a result alive even
//! while a later invalidation drops the cache entry.

use std::any::Any;
use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use url::Url;

/// Type-erased, shareable cache payload.
pub type CachePayload = Arc<dyn Any + Send + Sync>;

/// One keyed cache of type-erased values.
pub struct DerivedCache<K> {
    entries: HashMap<K, CachePayload>,
}

// A derived Default would demand K: Default for no reason.
impl<K> Default for DerivedCache<K> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash> DerivedCache<K> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: K, value: CachePayload) {
        self.entries.insert(key, value);
    }

    #[must_use]
    pub fn get<Q>(&self, key: &Q) -> Option<&CachePayload>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.entries.get(key)
    }

    /// Fetches and downcasts in one step. `None` when the key is absent
    /// or the stored payload has a different type.
    #[must_use]
    pub fn get_as<T, Q>(&self, key: &Q) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let payload = self.entries.get(key)?;
        Arc::clone(payload).downcast::<T>().ok()
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<CachePayload>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.entries.remove(key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The standard set of derived caches a workspace carries.
#[derive(Default)]
pub struct DerivedCaches {
    /// Inferred type information, keyed by module name.
    pub types: DerivedCache<String>,
    /// Diagnostics, keyed by file URI.
    pub diagnostics: DerivedCache<Url>,
    /// Import suggestions, keyed by file URI.
    pub possible_imports: DerivedCache<Url>,
    /// Operator tables, keyed by module name.
    pub operators: DerivedCache<String>,
}

impl DerivedCaches {
    /// Drops the caches that any edit invalidates. Import suggestions and
    /// operator tables depend only on the project graph, so they survive
    /// until a reload.
    pub fn clear_analysis(&mut self) {
        self.types.clear();
        self.diagnostics.clear();
    }

    /// Drops everything.
    pub fn clear(&mut self) {
        self.types.clear();
        self.diagnostics.clear();
        self.possible_imports.clear();
        self.operators.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payloads_round_trip_through_downcast() {
        let mut cache = DerivedCache::new();
        let payload: CachePayload = Arc::new(vec![1, 2, 3]);
        cache.insert("Main".to_string(), payload);

        let values = cache.get_as::<Vec<i32>, _>("Main").unwrap();
        assert_eq!(*values, vec![1, 2, 3]);
        assert!(cache.get("Main").is_some());
    }

    #[test]
    fn mismatched_payload_types_come_back_as_none() {
        let mut cache = DerivedCache::new();
        cache.insert("Main".to_string(), Arc::new(vec![1, 2, 3]) as CachePayload);
        assert!(cache.get_as::<String, _>("Main").is_none());
        assert!(cache.get_as::<Vec<i32>, _>("Missing").is_none());
    }

    #[test]
    fn clear_analysis_keeps_graph_derived_caches() {
        let mut caches = DerivedCaches::default();
        let uri = Url::from_file_path("/ws/src/Main.elm").unwrap();
        caches.types.insert("Main".to_string(), Arc::new(1u8) as CachePayload);
        caches
            .diagnostics
            .insert(uri.clone(), Arc::new(2u8) as CachePayload);
        caches
            .possible_imports
            .insert(uri, Arc::new(3u8) as CachePayload);
        caches
            .operators
            .insert("Main".to_string(), Arc::new(4u8) as CachePayload);

        caches.clear_analysis();
        assert!(caches.types.is_empty());
        assert!(caches.diagnostics.is_empty());
        assert_eq!(caches.possible_imports.len(), 1);
        assert_eq!(caches.operators.len(), 1);

        caches.clear();
        assert!(caches.possible_imports.is_empty());
        assert!(caches.operators.is_empty());
    }
}
