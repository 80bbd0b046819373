//! # Entity Management
//!
//! Entities are lightweight identifiers consisting of:
//! - An index that is recycled after the entity is despawned
//! - A generation counter that changes on every reuse of the index

use std::fmt;

use crate::error::{StoreError, StoreResult};

/// Handle to one record stored in a [`World`](super::World).
///
/// The handle is split into two parts:
/// - Lower 32 bits: Index, reused after removal
/// - Upper 32 bits: Generation counter for detecting stale references
///
/// Equality and hashing cover both halves, so a stale handle never matches
/// the entity that later reused its index.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Entity(u64);

impl Entity {
    /// Creates an entity handle from index and generation.
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self(((generation as u64) << 32) | (index as u64))
    }

    /// Returns the index portion of the handle.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0 as u32
    }

    /// Returns the generation portion of the handle.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Returns the packed 64-bit representation.
    #[inline]
    #[must_use]
    pub const fn to_bits(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({}v{})", self.index(), self.generation())
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index(), self.generation())
    }
}

#[derive(Clone, Copy, Debug)]
struct EntitySlot {
    generation: u32,
    alive: bool,
}

/// Allocates and recycles entity handles.
///
/// Freed indices are reused last-in first-out, each reuse bumping the
/// generation by one. At no time do two live handles share an index.
#[derive(Debug, Default)]
pub struct EntityAllocator {
    /// Per-index state; the index into this vec is the entity index.
    slots: Vec<EntitySlot>,
    /// Free list of entity indices for reuse.
    free_indices: Vec<u32>,
    /// Number of currently alive entities.
    alive_count: usize,
}

impl EntityAllocator {
    /// Creates an empty allocator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty allocator with room for `capacity` indices.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free_indices: Vec::new(),
            alive_count: 0,
        }
    }

    /// Returns the number of currently alive entities.
    #[inline]
    #[must_use]
    pub const fn alive_count(&self) -> usize {
        self.alive_count
    }

    /// Allocates a handle, reusing a freed index if one exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::EntityCapacityExhausted`] once every `u32`
    /// index is live.
    pub fn allocate(&mut self) -> StoreResult<Entity> {
        if let Some(index) = self.free_indices.pop() {
            let slot = &mut self.slots[index as usize];
            slot.generation = slot.generation.wrapping_add(1);
            slot.alive = true;
            self.alive_count += 1;
            return Ok(Entity::new(index, slot.generation));
        }

        let index =
            u32::try_from(self.slots.len()).map_err(|_| StoreError::EntityCapacityExhausted)?;
        self.slots.push(EntitySlot {
            generation: 0,
            alive: true,
        });
        self.alive_count += 1;
        Ok(Entity::new(index, 0))
    }

    /// Returns a live handle's index to the free pool.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::EntityNotFound`] if the handle is not live,
    /// including stale handles whose index has since been reused.
    pub fn free(&mut self, entity: Entity) -> StoreResult<()> {
        if !self.is_alive(entity) {
            return Err(StoreError::EntityNotFound(entity));
        }
        self.slots[entity.index() as usize].alive = false;
        self.free_indices.push(entity.index());
        self.alive_count -= 1;
        Ok(())
    }

    /// Checks if a handle is live (index in use with a matching generation).
    #[inline]
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.slots
            .get(entity.index() as usize)
            .is_some_and(|slot| slot.alive && slot.generation == entity.generation())
    }
}
