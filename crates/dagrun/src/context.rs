//! Shared, write-once store of task results

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::{ContextError, ContextResult};
use crate::task::TaskKey;

/// Results produced so far in a run, keyed by task key
///
/// Cloning is cheap and yields a handle to the same store. Every key can be
/// written exactly once; a second write is rejected rather than overwriting
/// the first result.
pub struct ExecutionContext<V> {
    results: Arc<DashMap<TaskKey, V>>,
}

impl<V> ExecutionContext<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a new empty context
    pub fn new() -> Self {
        Self {
            results: Arc::new(DashMap::new()),
        }
    }

    /// Create a context pre-populated with caller supplied inputs
    pub fn with_seed<K, I>(initial: I) -> ContextResult<Self>
    where
        K: Into<TaskKey>,
        I: IntoIterator<Item = (K, V)>,
    {
        let context = Self::new();
        context.seed(initial)?;
        Ok(context)
    }

    /// Store caller supplied inputs before a run starts
    pub fn seed<K, I>(&self, initial: I) -> ContextResult<()>
    where
        K: Into<TaskKey>,
        I: IntoIterator<Item = (K, V)>,
    {
        for (key, value) in initial {
            self.put(key, value)?;
        }
        Ok(())
    }

    /// Get a previously stored result
    pub fn get<K>(&self, key: K) -> ContextResult<V>
    where
        K: AsRef<str>,
    {
        let key = key.as_ref();
        self.results
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ContextError::NotFound(TaskKey::from(key)))
    }

    /// Store the result for `key`, failing if one was already stored
    pub fn put(&self, key: impl Into<TaskKey>, value: V) -> ContextResult<()> {
        match self.results.entry(key.into()) {
            Entry::Occupied(entry) => Err(ContextError::DuplicateWrite(entry.key().clone())),
            Entry::Vacant(entry) => {
                entry.insert(value);
                Ok(())
            }
        }
    }

    /// Check if a result exists for `key`
    pub fn contains<K>(&self, key: K) -> bool
    where
        K: AsRef<str>,
    {
        self.results.contains_key(key.as_ref())
    }

    /// Number of stored results
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Keys of all stored results, sorted
    pub fn keys(&self) -> Vec<TaskKey> {
        let mut keys: Vec<TaskKey> = self.results.iter().map(|entry| entry.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Copy all stored results out of the context
    pub fn snapshot(&self) -> HashMap<TaskKey, V> {
        self.results
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}

impl<V> Clone for ExecutionContext<V> {
    fn clone(&self) -> Self {
        Self {
            results: self.results.clone(),
        }
    }
}

impl<V> Default for ExecutionContext<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for ExecutionContext<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("len", &self.results.len())
            .finish()
    }
}
