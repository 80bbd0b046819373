//! # STRATA Core
//!
//! In-memory columnar record store. Records are typed by the set of
//! components they carry; records with the same set share a chunk that
//! keeps each component in a dense, aligned column.
//!
//! ## Architecture Rules
//!
//! 1. **Stable handles** - an [`Entity`] is an index plus a generation, and a
//!    handle stops resolving the moment its record is removed
//! 2. **Data-oriented design** - queries return whole columns as slices
//! 3. **Safe byte storage** - columns live in one aligned buffer per chunk and
//!    are viewed through `bytemuck`, never through raw pointers
//!
//! ## Example
//!
//! ```rust
//! use bytemuck::{Pod, Zeroable};
//! use strata_core::{Component, World};
//!
//! #[derive(Clone, Copy, Default, Pod, Zeroable)]
//! #[repr(C)]
//! struct Mass(f32);
//!
//! impl Component for Mass {
//!     const ID: u32 = 3;
//! }
//!
//! let mut world = World::new();
//! for entity in world.spawn_batch::<(Mass,)>(4).unwrap() {
//!     world.set(entity, Mass(2.0)).unwrap();
//! }
//! let total: f32 = world
//!     .query_field_arrays::<Mass>()
//!     .unwrap()
//!     .iter()
//!     .flat_map(|column| column.iter())
//!     .map(|mass| mass.0)
//!     .sum();
//! assert_eq!(total, 8.0);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod ecs;
pub mod error;

pub use config::{WorldConfig, MAX_ENTITY_RESERVE, MAX_INITIAL_CHUNK_CAPACITY};
pub use ecs::{
    Archetype, ArchetypeId, ArchetypeSignature, Chunk, ChunkMut, Component, ComponentId,
    ComponentInfo, ComponentRegistry, ComponentSet, Entity, EntityAllocator, Schedule, System,
    World, CHUNK_ALIGN, MAX_CHUNK_CAPACITY,
};
pub use error::{StoreError, StoreResult};
