//! # Core Module
//!
//! Shared-state primitives used throughout the streaming engine.
//!
//! ## Key Components
//! - `MtResource`: Thread-safe reference-counted resource with read-write locking
//! - `MtTypeMap`: Type-keyed container of shared values, used for object components
//!
//! ## Usage
//! ```rust
//! use voxel_streaming::core::{MtResource, MtTypeMap};
//! use std::sync::Arc;
//!
//! let counter = MtResource::new(0);
//! *counter.get_mut() += 1;
//! assert_eq!(*counter.get(), 1);
//!
//! let mut components = MtTypeMap::new();
//! components.insert(Arc::new(42u32));
//! assert_eq!(*components.get::<u32>().unwrap(), 42);
//! ```

pub mod mt_resource;
pub mod type_map;

pub use mt_resource::MtResource;
pub use type_map::MtTypeMap;
