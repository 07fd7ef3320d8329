//! # Object Registry
//!
//! Named scene objects. Every streamed chunk is registered here as a `GameObject`
//! named after its coordinate; the registry entry holds the only strong reference to
//! the `Chunk`, attached as a component. The world manager keeps weak references.
//!
//! The registry is a main-thread object reached through the `MainThreadContext`.

use std::{collections::HashMap, sync::Arc};

use cgmath::Point3;
use log::{error, trace};

use crate::core::{type_map::describe, MtTypeMap};
use crate::engine_state::error::{Result, StreamingError};

/// A named object with type-keyed components.
#[derive(Debug, Clone)]
pub struct GameObject {
    name: String,
    position: Point3<f32>,
    components: MtTypeMap,
}

impl GameObject {
    /// Creates an object without components.
    pub fn new(name: impl Into<String>, position: Point3<f32>) -> Self {
        Self {
            name: name.into(),
            position,
            components: MtTypeMap::new(),
        }
    }

    /// Builder-style `insert_component`.
    pub fn with_component<T: Send + Sync + 'static>(mut self, component: Arc<T>) -> Self {
        self.insert_component(component);
        self
    }

    /// Attaches a component, replacing any component of the same type.
    pub fn insert_component<T: Send + Sync + 'static>(&mut self, component: Arc<T>) -> Option<Arc<T>> {
        trace!("Attaching {} to '{}'", describe::<T>(), self.name);
        self.components.insert(component)
    }

    /// The component of type `T`, if attached.
    pub fn component<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.components.get::<T>()
    }

    /// Unique name of the object.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// World-space position of the object origin.
    pub fn position(&self) -> Point3<f32> {
        self.position
    }
}

/// All registered objects, keyed by name.
#[derive(Debug, Default)]
pub struct ObjectRegistry {
    objects: HashMap<String, GameObject>,
}

impl ObjectRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `object` under its name.
    ///
    /// # Errors
    /// `StreamingError::DuplicateObject` if the name is taken; the registry is left
    /// unchanged.
    pub fn register(&mut self, object: GameObject) -> Result<&GameObject> {
        use std::collections::hash_map::Entry;

        match self.objects.entry(object.name.clone()) {
            Entry::Occupied(_) => {
                error!("Object '{}' is already registered", object.name);
                Err(StreamingError::DuplicateObject(object.name))
            }
            Entry::Vacant(slot) => Ok(slot.insert(object)),
        }
    }

    /// Removes and returns the object named `name`.
    pub fn unregister(&mut self, name: &str) -> Option<GameObject> {
        self.objects.remove(name)
    }

    /// The object named `name`.
    pub fn get(&self, name: &str) -> Option<&GameObject> {
        self.objects.get(name)
    }

    /// Returns `true` if an object named `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.objects.contains_key(name)
    }

    /// Names of all registered objects, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.objects.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
