//! # Type Map
//!
//! A type-keyed container of shared values. Each concrete type can be stored at most
//! once and is retrieved by naming the type, without the caller ever seeing `dyn Any`.
//!
//! ## Usage
//! ```rust
//! use voxel_streaming::core::MtTypeMap;
//! use std::sync::Arc;
//!
//! let mut map = MtTypeMap::new();
//! map.insert(Arc::new("Hello".to_string()));
//! assert_eq!(map.get::<String>().unwrap().as_str(), "Hello");
//! assert!(map.get::<u32>().is_none());
//! ```

use std::{
    any::{type_name, Any, TypeId},
    collections::HashMap,
    fmt,
    sync::Arc,
};

/// A thread-safe, type-keyed container.
///
/// Values are stored as `Arc<dyn Any + Send + Sync>` keyed by their `TypeId` and are
/// handed back as `Arc<T>` clones, so the map shares ownership with every caller that
/// looked a value up.
#[derive(Default, Clone)]
pub struct MtTypeMap {
    entries: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl MtTypeMap {
    /// Creates a new, empty map.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Inserts a value, replacing any value of the same type.
    ///
    /// # Returns
    /// The replaced value, if there was one
    pub fn insert<T: Send + Sync + 'static>(&mut self, value: Arc<T>) -> Option<Arc<T>> {
        self.entries
            .insert(TypeId::of::<T>(), value)
            .and_then(|previous| previous.downcast::<T>().ok())
    }

    /// Retrieves the value of type `T`.
    ///
    /// # Returns
    /// `Some(Arc<T>)` if a value of that type is stored, `None` otherwise
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.entries
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|value| value.downcast::<T>().ok())
    }

    /// Removes and returns the value of type `T`.
    pub fn remove<T: Send + Sync + 'static>(&mut self) -> Option<Arc<T>> {
        self.entries
            .remove(&TypeId::of::<T>())
            .and_then(|value| value.downcast::<T>().ok())
    }

    /// Returns `true` if a value of type `T` is stored.
    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for MtTypeMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MtTypeMap")
            .field("len", &self.entries.len())
            .finish()
    }
}

/// Readable name of `T` for log lines.
pub(crate) fn describe<T: ?Sized>() -> &'static str {
    type_name::<T>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_replaces_same_type() {
        let mut map = MtTypeMap::new();
        assert!(map.insert(Arc::new(1u32)).is_none());
        let previous = map.insert(Arc::new(2u32));
        assert_eq!(previous.as_deref(), Some(&1));
        assert_eq!(*map.get::<u32>().unwrap(), 2);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn distinct_types_do_not_collide() {
        let mut map = MtTypeMap::new();
        map.insert(Arc::new(7u32));
        map.insert(Arc::new(7u64));
        assert_eq!(map.len(), 2);
        assert_eq!(*map.remove::<u64>().unwrap(), 7);
        assert!(!map.contains::<u64>());
        assert!(map.contains::<u32>());
    }
}
