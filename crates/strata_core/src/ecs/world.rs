//! # World
//!
//! The central container: routes every entity to the chunk of its archetype,
//! keeps one chunk per distinct archetype, and recycles entity handles.
//!
//! Chunks are keyed by the sorted component id set itself, so looking up the
//! chunk for a set is a single hash lookup and two different sets can never
//! share a chunk. [`ArchetypeId`] is only a compact name for diagnostics.

use std::collections::HashMap;

use tracing::{info, trace};

use super::archetype::{Archetype, ArchetypeId, ArchetypeSignature};
use super::chunk::{Chunk, ChunkMut};
use super::component::{Component, ComponentRegistry, ComponentSet};
use super::entity::{Entity, EntityAllocator};
use super::system::{Schedule, System};
use crate::config::WorldConfig;
use crate::error::{StoreError, StoreResult};

/// The world - owner of all chunks and entity handles.
///
/// # Example
///
/// ```rust
/// use bytemuck::{Pod, Zeroable};
/// use strata_core::{Component, World};
///
/// #[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
/// #[repr(C)]
/// struct Position { x: f32, y: f32, z: f32 }
///
/// impl Component for Position {
///     const ID: u32 = 0;
/// }
///
/// let mut world = World::new();
/// let entity = world.spawn::<(Position,)>().unwrap();
/// world.set(entity, Position { x: 1.0, y: 2.0, z: 3.0 }).unwrap();
/// assert_eq!(world.get::<Position>(entity).unwrap().y, 2.0);
/// ```
pub struct World {
    /// Handle allocation and recycling.
    entities: EntityAllocator,
    /// Layouts of every component type seen so far.
    components: ComponentRegistry,
    /// One chunk per archetype, in creation order.
    chunks: Vec<Chunk>,
    /// Sorted component ids -> index into `chunks`.
    chunk_index: HashMap<ArchetypeSignature, usize>,
    /// Entity -> index of the chunk holding it. Chunks are never removed, so
    /// indices stay valid.
    entity_chunks: HashMap<Entity, usize>,
    /// Slots allocated for each new chunk.
    initial_chunk_capacity: usize,
    /// Systems run by [`run_systems`](Self::run_systems).
    schedule: Schedule,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    /// Creates a world with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        let config = WorldConfig::default();
        Self {
            entities: EntityAllocator::new(),
            components: ComponentRegistry::new(),
            chunks: Vec::new(),
            chunk_index: HashMap::new(),
            entity_chunks: HashMap::new(),
            initial_chunk_capacity: config.initial_chunk_capacity,
            schedule: Schedule::new(),
        }
    }

    /// Creates a world from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidConfig`] if the configuration fails
    /// validation.
    pub fn with_config(config: &WorldConfig) -> StoreResult<Self> {
        config.validate()?;
        info!(
            initial_chunk_capacity = config.initial_chunk_capacity,
            entity_reserve = config.entity_reserve,
            "world created"
        );
        Ok(Self {
            entities: EntityAllocator::with_capacity(config.entity_reserve),
            entity_chunks: HashMap::with_capacity(config.entity_reserve),
            initial_chunk_capacity: config.initial_chunk_capacity,
            ..Self::new()
        })
    }

    /// Returns the number of live entities.
    #[inline]
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.alive_count()
    }

    /// Returns the number of chunks (distinct archetypes seen).
    #[inline]
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Returns the component registry.
    #[must_use]
    pub fn components(&self) -> &ComponentRegistry {
        &self.components
    }

    /// Checks if a handle is live.
    #[inline]
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
    }

    /// Returns the archetype of the chunk holding an entity.
    #[must_use]
    pub fn archetype_of(&self, entity: Entity) -> Option<ArchetypeId> {
        self.entity_chunks
            .get(&entity)
            .map(|&index| self.chunks[index].id())
    }

    /// Returns the first chunk created with this archetype id, if any.
    #[must_use]
    pub fn chunk(&self, id: ArchetypeId) -> Option<&Chunk> {
        self.chunks.iter().find(|chunk| chunk.id() == id)
    }

    /// Returns the chunk holding exactly the components of `S`, if one exists.
    #[must_use]
    pub fn chunk_of_set<S: ComponentSet>(&self) -> Option<&Chunk> {
        self.chunk_index
            .get(&ArchetypeSignature::of::<S>())
            .map(|&index| &self.chunks[index])
            .filter(|chunk| chunk.exact_match_set::<S>())
    }

    /// Iterates over every chunk in creation order.
    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.iter()
    }

    /// Returns the id of the chunk for exactly this component set, creating
    /// the chunk if none exists yet.
    ///
    /// # Errors
    ///
    /// - [`StoreError::DuplicateComponent`] if the set repeats a component
    /// - [`StoreError::ComponentIdConflict`] if a type's id belongs to another type
    /// - [`StoreError::CapacityOverflow`] if a new chunk cannot be allocated
    pub fn register_archetype<S: ComponentSet>(&mut self) -> StoreResult<ArchetypeId> {
        let index = self.chunk_index_for::<S>()?;
        Ok(self.chunks[index].id())
    }

    /// Creates an entity with the given components.
    ///
    /// Component values are unspecified until set.
    ///
    /// # Errors
    ///
    /// Same as [`register_archetype`](Self::register_archetype), plus
    /// [`StoreError::EntityCapacityExhausted`].
    pub fn spawn<S: ComponentSet>(&mut self) -> StoreResult<Entity> {
        let index = self.chunk_index_for::<S>()?;
        self.spawn_in(index)
    }

    /// Creates `count` entities with the given components.
    ///
    /// # Errors
    ///
    /// Same as [`spawn`](Self::spawn). The chunk grows once for the whole
    /// batch; entities created before a failure stay alive.
    pub fn spawn_batch<S: ComponentSet>(&mut self, count: usize) -> StoreResult<Vec<Entity>> {
        let index = self.chunk_index_for::<S>()?;
        self.chunks[index].reserve(count)?;
        (0..count).map(|_| self.spawn_in(index)).collect()
    }

    fn spawn_in(&mut self, index: usize) -> StoreResult<Entity> {
        // Grow before allocating, so a failed growth leaves no handle behind.
        self.chunks[index].reserve(1)?;
        let entity = self.entities.allocate()?;
        let chunk = &mut self.chunks[index];
        debug_assert!(!chunk.contains_entity(entity), "fresh handle already stored");
        chunk.add_entity(entity)?;
        self.entity_chunks.insert(entity, index);
        trace!(%entity, archetype = %chunk.id(), "spawned");
        Ok(entity)
    }

    /// Destroys an entity and returns its index to the pool.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::EntityNotFound`] if the handle is not live.
    pub fn despawn(&mut self, entity: Entity) -> StoreResult<()> {
        let index = self.chunk_of(entity)?;
        self.chunks[index].remove_entity(entity)?;
        self.entity_chunks.remove(&entity);
        self.entities.free(entity)?;
        trace!(%entity, "despawned");
        Ok(())
    }

    /// Reads one component of an entity.
    ///
    /// # Errors
    ///
    /// - [`StoreError::EntityNotFound`] if the handle is not live
    /// - [`StoreError::ComponentNotInArchetype`] if the entity lacks `C`
    /// - [`StoreError::ComponentIdConflict`] if `C`'s id belongs to another type
    pub fn get<C: Component>(&self, entity: Entity) -> StoreResult<C> {
        self.components.check::<C>()?;
        let index = self.chunk_of(entity)?;
        self.chunks[index].get(entity)
    }

    /// Writes one component of an entity.
    ///
    /// # Errors
    ///
    /// Same as [`get`](Self::get).
    pub fn set<C: Component>(&mut self, entity: Entity, value: C) -> StoreResult<()> {
        self.components.check::<C>()?;
        let index = self.chunk_of(entity)?;
        self.chunks[index].set(entity, value)
    }

    /// Checks whether a live entity has component `C`.
    #[must_use]
    pub fn has<C: Component>(&self, entity: Entity) -> bool {
        self.components.is_registered::<C>()
            && self
                .chunk_of(entity)
                .is_ok_and(|index| self.chunks[index].contains(&[C::ID]))
    }

    /// Returns the occupied `C` column of every chunk whose archetype has `C`.
    ///
    /// # Errors
    ///
    /// [`StoreError::ComponentIdConflict`] if `C`'s id belongs to another type.
    pub fn query_field_arrays<C: Component>(&self) -> StoreResult<Vec<&[C]>> {
        self.components.check::<C>()?;
        self.chunks
            .iter()
            .filter(|chunk| chunk.contains(&[C::ID]))
            .map(Chunk::field_array::<C>)
            .collect()
    }

    /// Writable form of [`query_field_arrays`](Self::query_field_arrays).
    ///
    /// # Errors
    ///
    /// Same as [`query_field_arrays`](Self::query_field_arrays).
    pub fn query_field_arrays_mut<C: Component>(&mut self) -> StoreResult<Vec<&mut [C]>> {
        self.components.check::<C>()?;
        self.chunks
            .iter_mut()
            .filter(|chunk| chunk.contains(&[C::ID]))
            .map(Chunk::field_array_mut::<C>)
            .collect()
    }

    /// Returns every chunk whose archetype has all components of `S`.
    ///
    /// # Errors
    ///
    /// [`StoreError::ComponentIdConflict`] if an id in `S` belongs to another type.
    pub fn query_chunks<S: ComponentSet>(&self) -> StoreResult<Vec<&Chunk>> {
        self.components.check_set::<S>()?;
        let ids = S::ids();
        Ok(self.chunks.iter().filter(|chunk| chunk.contains(&ids)).collect())
    }

    /// Writable form of [`query_chunks`](Self::query_chunks). The returned
    /// handles allow value access only, not spawning or despawning.
    ///
    /// # Errors
    ///
    /// Same as [`query_chunks`](Self::query_chunks).
    pub fn query_chunks_mut<S: ComponentSet>(&mut self) -> StoreResult<Vec<ChunkMut<'_>>> {
        self.components.check_set::<S>()?;
        let ids = S::ids();
        Ok(self
            .chunks
            .iter_mut()
            .filter(|chunk| chunk.contains(&ids))
            .map(ChunkMut::new)
            .collect())
    }

    /// Calls `f` for every entity with component `A`, chunk by chunk in
    /// creation order, slot by slot within each chunk.
    ///
    /// # Errors
    ///
    /// [`StoreError::ComponentIdConflict`] if `A`'s id belongs to another type.
    pub fn for_each<A, F>(&mut self, mut f: F) -> StoreResult<()>
    where
        A: Component,
        F: FnMut(&mut A),
    {
        for mut chunk in self.query_chunks_mut::<(A,)>()? {
            chunk.for_each::<A, _>(&mut f)?;
        }
        Ok(())
    }

    /// Calls `f` for every entity with components `A` and `B`.
    ///
    /// # Errors
    ///
    /// [`StoreError::DuplicateComponent`] if `A` and `B` are the same
    /// component, otherwise as [`for_each`](Self::for_each).
    pub fn for_each2<A, B, F>(&mut self, mut f: F) -> StoreResult<()>
    where
        A: Component,
        B: Component,
        F: FnMut(&mut A, &mut B),
    {
        if A::ID == B::ID {
            return Err(StoreError::DuplicateComponent(A::ID));
        }
        for mut chunk in self.query_chunks_mut::<(A, B)>()? {
            chunk.for_each2::<A, B, _>(&mut f)?;
        }
        Ok(())
    }

    /// Calls `f` for every entity with components `A`, `B` and `C`.
    ///
    /// # Errors
    ///
    /// Same as [`for_each2`](Self::for_each2).
    pub fn for_each3<A, B, C, F>(&mut self, mut f: F) -> StoreResult<()>
    where
        A: Component,
        B: Component,
        C: Component,
        F: FnMut(&mut A, &mut B, &mut C),
    {
        if A::ID == B::ID || A::ID == C::ID {
            return Err(StoreError::DuplicateComponent(A::ID));
        }
        if B::ID == C::ID {
            return Err(StoreError::DuplicateComponent(B::ID));
        }
        for mut chunk in self.query_chunks_mut::<(A, B, C)>()? {
            chunk.for_each3::<A, B, C, _>(&mut f)?;
        }
        Ok(())
    }

    /// Registers a system to run on every [`run_systems`](Self::run_systems).
    /// Adding a second system of the same type is a no-op.
    ///
    /// Returns `true` if the system was added.
    pub fn add_system<S: System>(&mut self, system: S) -> bool {
        self.schedule.add_system(system)
    }

    /// Returns the number of registered systems.
    #[must_use]
    pub fn system_count(&self) -> usize {
        self.schedule.len()
    }

    /// Runs every registered system once, in registration order.
    ///
    /// Systems added while the schedule is running are appended after the
    /// existing ones and first run on the next call.
    pub fn run_systems(&mut self) {
        let mut schedule = std::mem::take(&mut self.schedule);
        schedule.run(self);
        let added = std::mem::replace(&mut self.schedule, schedule);
        self.schedule.append(added);
    }

    fn chunk_of(&self, entity: Entity) -> StoreResult<usize> {
        self.entity_chunks
            .get(&entity)
            .copied()
            .ok_or(StoreError::EntityNotFound(entity))
    }

    /// Index of the chunk for exactly `S`, created on first use.
    fn chunk_index_for<S: ComponentSet>(&mut self) -> StoreResult<usize> {
        self.components.check_set::<S>()?;
        let ids = S::ids();
        let signature = ArchetypeSignature::new(ids.clone());

        // A shorter signature means the set repeats a component; the
        // archetype check below reports it.
        if signature.len() == ids.len() {
            if let Some(&index) = self.chunk_index.get(&signature) {
                return Ok(index);
            }
        }

        let archetype = Archetype::of::<S>()?;
        let chunk = Chunk::new(archetype, self.initial_chunk_capacity)?;
        self.components.register_set::<S>()?;
        let index = self.chunks.len();
        self.chunks.push(chunk);
        self.chunk_index.insert(signature, index);
        Ok(index)
    }
}
