//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Named, independently serializable request context values.

use super::ContextError;
use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Converts one kind of context value to and from bytes.
///
/// Each value in a [`ContextsContainer`] carries its own serializer, so
/// values can be propagated (and later read back) without the container
/// knowing their types.
pub trait ContextSerializer<T>: Send + Sync {
    /// Encodes `value`.
    fn serialize(&self, value: &T) -> Result<Vec<u8>, ContextError>;

    /// Decodes a value previously produced by [`serialize`](Self::serialize).
    fn deserialize(&self, bytes: &[u8]) -> Result<T, ContextError>;
}

/// [`ContextSerializer`] for any serde type, using JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonContextSerializer;

impl<T> ContextSerializer<T> for JsonContextSerializer
where
    T: Serialize + DeserializeOwned,
{
    fn serialize(&self, value: &T) -> Result<Vec<u8>, ContextError> {
        serde_json::to_vec(value).map_err(|e| ContextError::serialization(std::any::type_name::<T>(), e))
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<T, ContextError> {
        serde_json::from_slice(bytes)
            .map_err(|e| ContextError::serialization(std::any::type_name::<T>(), e))
    }
}

#[derive(Clone)]
struct ContextEntry {
    /// Decoded value, absent until first read for values that arrived as bytes.
    value: Option<Arc<dyn Any + Send + Sync>>,
    serialized: Arc<[u8]>,
}

/// A shared map of named context values attached to a request.
///
/// Clones share the same map; two containers are equal only if they are the
/// same shared map.
///
/// # Examples
///
/// ```rust
/// use rxnet::context::{ContextsContainer, JsonContextSerializer};
///
/// # fn example() -> Result<(), rxnet::context::ContextError> {
/// let container = ContextsContainer::new();
/// container.add_context("tenant", "blue".to_string(), &JsonContextSerializer)?;
///
/// let tenant = container.get_context::<String, _>("tenant", &JsonContextSerializer)?;
/// assert_eq!(tenant.as_deref().map(String::as_str), Some("blue"));
/// assert_eq!(container.serialized_context("tenant").as_deref(), Some(&b"\"blue\""[..]));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct ContextsContainer {
    entries: Arc<RwLock<BTreeMap<String, ContextEntry>>>,
}

impl ContextsContainer {
    /// Creates an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the value called `name`.
    pub fn add_context<T, S>(&self, name: &str, value: T, serializer: &S) -> Result<(), ContextError>
    where
        T: Send + Sync + 'static,
        S: ContextSerializer<T> + ?Sized,
    {
        let serialized = serializer
            .serialize(&value)
            .map_err(|e| rename(e, name))?;
        let entry = ContextEntry {
            value: Some(Arc::new(value)),
            serialized: serialized.into(),
        };
        self.entries.write().insert(name.to_string(), entry);
        Ok(())
    }

    /// Adds or replaces a value in its serialized form, as received from a
    /// peer. It is decoded on first read.
    pub fn add_serialized_context(&self, name: &str, bytes: impl Into<Vec<u8>>) {
        let entry = ContextEntry {
            value: None,
            serialized: bytes.into().into(),
        };
        self.entries.write().insert(name.to_string(), entry);
    }

    /// Returns the value called `name`, decoding it with `serializer` if it
    /// has only been seen in serialized form.
    pub fn get_context<T, S>(&self, name: &str, serializer: &S) -> Result<Option<Arc<T>>, ContextError>
    where
        T: Send + Sync + 'static,
        S: ContextSerializer<T> + ?Sized,
    {
        let serialized = {
            let entries = self.entries.read();
            let Some(entry) = entries.get(name) else {
                return Ok(None);
            };
            if let Some(value) = &entry.value {
                return Arc::clone(value)
                    .downcast::<T>()
                    .map(Some)
                    .map_err(|_| ContextError::TypeMismatch {
                        name: name.to_string(),
                    });
            }
            Arc::clone(&entry.serialized)
        };

        let value: Arc<T> = Arc::new(serializer.deserialize(&serialized).map_err(|e| rename(e, name))?);
        if let Some(entry) = self.entries.write().get_mut(name) {
            if Arc::ptr_eq(&entry.serialized, &serialized) {
                entry.value = Some(value.clone());
            }
        }
        Ok(Some(value))
    }

    /// Serialized form of the value called `name`.
    pub fn serialized_context(&self, name: &str) -> Option<Vec<u8>> {
        self.entries
            .read()
            .get(name)
            .map(|entry| entry.serialized.to_vec())
    }

    /// Every value in serialized form, ordered by name.
    pub fn serialized_contexts(&self) -> Vec<(String, Vec<u8>)> {
        self.entries
            .read()
            .iter()
            .map(|(name, entry)| (name.clone(), entry.serialized.to_vec()))
            .collect()
    }

    /// Removes the value called `name`; returns whether it existed.
    pub fn remove_context(&self, name: &str) -> bool {
        self.entries.write().remove(name).is_some()
    }

    /// Names of all values, ordered.
    pub fn names(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if the container holds no values.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Returns `true` if both handles share the same map.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.entries, &other.entries)
    }
}

fn rename(error: ContextError, name: &str) -> ContextError {
    match error {
        ContextError::Serialization { reason, .. } => ContextError::serialization(name, reason),
        other => other,
    }
}

impl PartialEq for ContextsContainer {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for ContextsContainer {}

impl fmt::Debug for ContextsContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextsContainer")
            .field("names", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Tenant {
        id: u32,
        region: String,
    }

    #[test]
    fn test_serialized_value_decodes_lazily() {
        let container = ContextsContainer::new();
        container.add_serialized_context("tenant", br#"{"id":7,"region":"eu"}"#.to_vec());

        let tenant = container
            .get_context::<Tenant, _>("tenant", &JsonContextSerializer)
            .unwrap()
            .unwrap();
        assert_eq!(tenant.id, 7);

        let again = container
            .get_context::<Tenant, _>("tenant", &JsonContextSerializer)
            .unwrap()
            .unwrap();
        assert!(Arc::ptr_eq(&tenant, &again));
    }

    #[test]
    fn test_type_mismatch() {
        let container = ContextsContainer::new();
        container.add_context("count", 3u32, &JsonContextSerializer).unwrap();

        let result = container.get_context::<String, _>("count", &JsonContextSerializer);
        assert!(matches!(result, Err(ContextError::TypeMismatch { .. })));
    }

    #[test]
    fn test_bad_bytes_name_the_value() {
        let container = ContextsContainer::new();
        container.add_serialized_context("tenant", b"not json".to_vec());

        match container.get_context::<Tenant, _>("tenant", &JsonContextSerializer) {
            Err(ContextError::Serialization { name, .. }) => assert_eq!(name, "tenant"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_equality_is_identity() {
        let a = ContextsContainer::new();
        let b = ContextsContainer::new();
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn test_missing_and_removed() {
        let container = ContextsContainer::new();
        assert!(container
            .get_context::<u32, _>("absent", &JsonContextSerializer)
            .unwrap()
            .is_none());

        container.add_context("n", 1u8, &JsonContextSerializer).unwrap();
        assert_eq!(container.names(), vec!["n".to_string()]);
        assert!(container.remove_context("n"));
        assert!(container.is_empty());
    }
}
