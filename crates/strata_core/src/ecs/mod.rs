//! # Columnar Record Store
//!
//! Entities are grouped by archetype (their exact set of components) and each
//! archetype gets one chunk that stores every component in its own contiguous
//! column.
//!
//! ## Design Philosophy
//!
//! - One chunk per archetype, found by a hash of its component ids
//! - Columns are dense and aligned, so a query hands out plain slices
//! - Removal swaps the last slot into the hole; no gaps, no tombstones
//! - Entity IDs are indices with generation counters

mod archetype;
mod chunk;
mod component;
mod entity;
mod system;
mod world;

pub use archetype::{Archetype, ArchetypeId, ArchetypeSignature};
pub use chunk::{Chunk, ChunkMut, CHUNK_ALIGN, MAX_CHUNK_CAPACITY};
pub use component::{Component, ComponentId, ComponentInfo, ComponentRegistry, ComponentSet};
pub use entity::{Entity, EntityAllocator};
pub use system::{Schedule, System};
pub use world::World;
