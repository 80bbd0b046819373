//! # Chunk Storage
//!
//! A chunk holds every entity of one archetype in a single byte buffer laid
//! out as one contiguous column per component:
//!
//! ```text
//! capacity = 4, archetype = (Position: 12 bytes, Health: 4 bytes)
//!
//! | Position[0] Position[1] Position[2] Position[3] | Health[0] Health[1] Health[2] Health[3] |
//! ^ offset 0                                         ^ offset 4 * 12 = 48
//! ```
//!
//! Occupied slots are always `[0, len)`. Removal moves the last slot into the
//! hole (swap-remove), so it costs one copy per field regardless of how many
//! entities the chunk holds, at the price of stable ordering.
//!
//! Growth doubles the capacity and re-lays every column for the new capacity.
//! Column views are borrows of the chunk, so no view survives a structural
//! change.

use std::collections::HashMap;
use std::ops::{Deref, Range};

use bytemuck::{Pod, Zeroable};
use tracing::{debug, trace, warn};

use super::archetype::{Archetype, ArchetypeId};
use super::component::{Component, ComponentId, ComponentInfo, ComponentSet};
use super::entity::Entity;
use crate::error::{StoreError, StoreResult};

/// Alignment of every chunk buffer, and the largest component alignment a
/// chunk can store.
pub const CHUNK_ALIGN: usize = 16;

/// Unit of chunk allocation. Keeps the byte buffer 16-byte aligned so typed
/// column views can be cast in place.
#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(C, align(16))]
struct Block([u8; CHUNK_ALIGN]);

/// Largest slot count a chunk accepts. A chunk never holds more entities
/// than there are entity indices.
pub const MAX_CHUNK_CAPACITY: usize = u32::MAX as usize;

#[inline]
const fn align_up(value: usize, align: usize) -> Option<usize> {
    match value.checked_add(align - 1) {
        Some(padded) => Some(padded & !(align - 1)),
        None => None,
    }
}

/// Base offset of every column for `capacity` slots, plus the total size.
///
/// Each column spans `capacity * size` bytes and starts where the previous
/// one ended, rounded up to the field's alignment.
///
/// # Errors
///
/// [`StoreError::CapacityOverflow`] if the capacity exceeds
/// [`MAX_CHUNK_CAPACITY`] or the buffer would not fit in memory.
fn column_layout(fields: &[ComponentInfo], capacity: usize) -> StoreResult<(Vec<usize>, usize)> {
    let overflow = StoreError::CapacityOverflow(capacity);
    if capacity > MAX_CHUNK_CAPACITY {
        return Err(overflow);
    }
    let mut offsets = Vec::with_capacity(fields.len());
    let mut offset = 0usize;
    for field in fields {
        offset = align_up(offset, field.align).ok_or_else(|| overflow.clone())?;
        offsets.push(offset);
        offset = capacity
            .checked_mul(field.size)
            .and_then(|column| offset.checked_add(column))
            .ok_or_else(|| overflow.clone())?;
    }
    // Vec allocations are limited to isize::MAX bytes.
    match align_up(offset, CHUNK_ALIGN) {
        Some(total) if total <= isize::MAX as usize => Ok((offsets, offset)),
        _ => Err(overflow),
    }
}

fn allocate_blocks(bytes: usize) -> Vec<Block> {
    vec![Block::zeroed(); bytes.div_ceil(CHUNK_ALIGN)]
}

/// Splits `bytes` into the given non-overlapping ranges, returned in the
/// order requested.
fn split_disjoint_mut<'a, const N: usize>(
    mut bytes: &'a mut [u8],
    ranges: &[Range<usize>; N],
) -> [&'a mut [u8]; N] {
    let mut order: [usize; N] = std::array::from_fn(|i| i);
    order.sort_unstable_by_key(|&i| ranges[i].start);

    let mut columns: [&'a mut [u8]; N] = std::array::from_fn(|_| Default::default());
    let mut consumed = 0;
    for i in order {
        let range = &ranges[i];
        let rest = std::mem::take(&mut bytes);
        let (_, rest) = rest.split_at_mut(range.start - consumed);
        let (column, rest) = rest.split_at_mut(range.len());
        columns[i] = column;
        bytes = rest;
        consumed = range.end;
    }
    columns
}

/// Structure-of-arrays storage for all entities of one archetype.
pub struct Chunk {
    /// Schema of every entity in this chunk.
    archetype: Archetype,
    /// Raw column storage.
    blocks: Vec<Block>,
    /// Base byte offset of each column, parallel to `archetype.fields()`.
    offsets: Vec<usize>,
    /// Number of occupied slots.
    len: usize,
    /// Number of slots the buffer has room for.
    capacity: usize,
    /// Entity -> slot.
    slots: HashMap<Entity, usize>,
    /// Slot -> entity, for every occupied slot.
    entities: Vec<Entity>,
}

impl Chunk {
    /// Creates an empty chunk with room for `capacity` entities.
    ///
    /// # Errors
    ///
    /// [`StoreError::CapacityOverflow`] if the buffer for `capacity` slots
    /// cannot be addressed.
    pub fn new(archetype: Archetype, capacity: usize) -> StoreResult<Self> {
        let (offsets, total) = column_layout(archetype.fields(), capacity)?;
        debug!(
            archetype = %archetype.id(),
            capacity,
            stride = archetype.stride(),
            "chunk created"
        );
        Ok(Self {
            archetype,
            blocks: allocate_blocks(total),
            offsets,
            len: 0,
            capacity,
            slots: HashMap::with_capacity(capacity),
            entities: Vec::with_capacity(capacity),
        })
    }

    /// Creates an empty chunk for a component set.
    ///
    /// # Errors
    ///
    /// See [`Archetype::new`] and [`Chunk::new`].
    pub fn of<S: ComponentSet>(capacity: usize) -> StoreResult<Self> {
        Self::new(Archetype::of::<S>()?, capacity)
    }

    /// Returns the archetype of this chunk.
    #[inline]
    #[must_use]
    pub fn archetype(&self) -> &Archetype {
        &self.archetype
    }

    /// Returns the id of this chunk's archetype.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ArchetypeId {
        self.archetype.id()
    }

    /// Returns the number of entities in this chunk.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Checks if empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the capacity (entities before the next growth).
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of unoccupied slots.
    #[inline]
    #[must_use]
    pub fn free_slots(&self) -> usize {
        self.capacity - self.len
    }

    /// Returns the entity in every occupied slot, in slot order.
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Checks if an entity is stored in this chunk.
    #[inline]
    #[must_use]
    pub fn contains_entity(&self, entity: Entity) -> bool {
        self.slots.contains_key(&entity)
    }

    /// Checks if the archetype has every requested component.
    #[must_use]
    pub fn contains(&self, ids: &[ComponentId]) -> bool {
        self.archetype.contains(ids)
    }

    /// [`contains`](Self::contains) for a component set.
    #[must_use]
    pub fn contains_set<S: ComponentSet>(&self) -> bool {
        self.archetype.contains_set::<S>()
    }

    /// Checks if the archetype has exactly the requested components.
    #[must_use]
    pub fn exact_match(&self, ids: &[ComponentId]) -> bool {
        self.archetype.exact_match(ids)
    }

    /// [`exact_match`](Self::exact_match) for a component set.
    #[must_use]
    pub fn exact_match_set<S: ComponentSet>(&self) -> bool {
        self.archetype.exact_match_set::<S>()
    }

    /// Appends an entity in the first free slot, doubling the capacity first
    /// if the chunk is full.
    ///
    /// The new slot's component bytes are unspecified until written.
    ///
    /// # Errors
    ///
    /// - [`StoreError::EntityAlreadyPresent`] if the entity is already stored here
    /// - [`StoreError::CapacityOverflow`] if the chunk is full and cannot grow
    pub fn add_entity(&mut self, entity: Entity) -> StoreResult<()> {
        if self.slots.contains_key(&entity) {
            return Err(StoreError::EntityAlreadyPresent(entity));
        }
        self.reserve(1)?;

        let slot = self.len;
        self.slots.insert(entity, slot);
        self.entities.push(entity);
        self.len += 1;
        trace!(%entity, slot, archetype = %self.archetype.id(), "entity added");
        Ok(())
    }

    /// Removes an entity, moving the last occupied slot into its place.
    ///
    /// Returns the entity that was relocated, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::EntityNotFound`] if the entity is not stored here.
    pub fn remove_entity(&mut self, entity: Entity) -> StoreResult<Option<Entity>> {
        let Some(freed) = self.slots.remove(&entity) else {
            return Err(StoreError::EntityNotFound(entity));
        };
        let last = self.len - 1;

        let mut relocated = None;
        if freed != last {
            let bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut self.blocks);
            for (field, &offset) in self.archetype.fields().iter().zip(&self.offsets) {
                let src = offset + last * field.size;
                bytes.copy_within(src..src + field.size, offset + freed * field.size);
            }
            let tail = self.entities[last];
            self.slots.insert(tail, freed);
            relocated = Some(tail);
            trace!(%entity, moved = %tail, slot = freed, "swap-removed");
        }
        self.entities.swap_remove(freed);
        self.len -= 1;

        debug_assert_eq!(self.entities.len(), self.len, "slot list out of sync");
        debug_assert_eq!(self.slots.len(), self.len, "slot map out of sync");
        Ok(relocated)
    }

    /// Makes room for `additional` more entities, doubling the capacity as
    /// many times as needed in a single resize.
    ///
    /// # Errors
    ///
    /// [`StoreError::CapacityOverflow`] if the required capacity cannot be
    /// addressed. The chunk is left unchanged.
    pub fn reserve(&mut self, additional: usize) -> StoreResult<()> {
        let needed = self
            .len
            .checked_add(additional)
            .ok_or(StoreError::CapacityOverflow(usize::MAX))?;
        if needed <= self.capacity {
            return Ok(());
        }
        let mut new_capacity = self.capacity.max(1);
        while new_capacity < needed {
            new_capacity = new_capacity.saturating_mul(2);
        }
        // The last doubling may overshoot the limit while `needed` does not.
        if new_capacity > MAX_CHUNK_CAPACITY && needed <= MAX_CHUNK_CAPACITY {
            new_capacity = MAX_CHUNK_CAPACITY;
        }
        self.resize(new_capacity)
    }

    /// Grows the buffer to `new_capacity` slots, re-laying every column.
    ///
    /// Chunks never shrink: requests at or below the current capacity are
    /// ignored.
    ///
    /// # Errors
    ///
    /// [`StoreError::CapacityOverflow`] if `new_capacity` cannot be addressed.
    /// The chunk is left unchanged.
    pub fn resize(&mut self, new_capacity: usize) -> StoreResult<()> {
        if new_capacity <= self.capacity {
            if new_capacity < self.capacity {
                warn!(
                    capacity = self.capacity,
                    requested = new_capacity,
                    "ignoring request to shrink chunk"
                );
            }
            return Ok(());
        }

        let (new_offsets, total) = column_layout(self.archetype.fields(), new_capacity)?;
        let mut new_blocks = allocate_blocks(total);
        {
            let old: &[u8] = bytemuck::cast_slice(&self.blocks);
            let new: &mut [u8] = bytemuck::cast_slice_mut(&mut new_blocks);
            let columns = self.archetype.fields().iter().zip(&self.offsets).zip(&new_offsets);
            for ((field, &old_offset), &new_offset) in columns {
                let used = self.len * field.size;
                new[new_offset..new_offset + used]
                    .copy_from_slice(&old[old_offset..old_offset + used]);
            }
        }

        debug!(
            archetype = %self.archetype.id(),
            from = self.capacity,
            to = new_capacity,
            "chunk grown"
        );
        self.blocks = new_blocks;
        self.offsets = new_offsets;
        self.capacity = new_capacity;
        Ok(())
    }

    /// Reads one component of an entity.
    ///
    /// # Errors
    ///
    /// - [`StoreError::EntityNotFound`] if the entity is not stored here
    /// - [`StoreError::ComponentNotInArchetype`] / [`StoreError::SizeMismatch`]
    ///   if `C` is not a field of the archetype with the same size
    pub fn get<C: Component>(&self, entity: Entity) -> StoreResult<C> {
        let slot = self.slot(entity)?;
        let range = self.element_range(C::ID, C::name(), std::mem::size_of::<C>(), slot)?;
        Ok(bytemuck::pod_read_unaligned(&self.bytes()[range]))
    }

    /// Writes one component of an entity.
    ///
    /// # Errors
    ///
    /// Same as [`get`](Self::get).
    pub fn set<C: Component>(&mut self, entity: Entity, value: C) -> StoreResult<()> {
        let slot = self.slot(entity)?;
        let range = self.element_range(C::ID, C::name(), std::mem::size_of::<C>(), slot)?;
        self.bytes_mut()[range].copy_from_slice(bytemuck::bytes_of(&value));
        Ok(())
    }

    /// Reads one component of an entity as raw bytes.
    ///
    /// # Errors
    ///
    /// [`StoreError::EntityNotFound`] or [`StoreError::ComponentNotInArchetype`].
    pub fn get_bytes(&self, entity: Entity, id: ComponentId) -> StoreResult<&[u8]> {
        let slot = self.slot(entity)?;
        let size = self.field(id, "<untyped>")?.size;
        let range = self.element_range(id, "<untyped>", size, slot)?;
        Ok(&self.bytes()[range])
    }

    /// Overwrites one component of an entity with raw bytes.
    ///
    /// # Errors
    ///
    /// [`StoreError::EntityNotFound`], [`StoreError::ComponentNotInArchetype`],
    /// or [`StoreError::SizeMismatch`] if `value` is not exactly one element.
    pub fn set_bytes(&mut self, entity: Entity, id: ComponentId, value: &[u8]) -> StoreResult<()> {
        let slot = self.slot(entity)?;
        let range = self.element_range(id, "<untyped>", value.len(), slot)?;
        self.bytes_mut()[range].copy_from_slice(value);
        Ok(())
    }

    /// Returns the occupied part of one column.
    ///
    /// # Errors
    ///
    /// [`StoreError::ComponentNotInArchetype`] or [`StoreError::SizeMismatch`].
    pub fn field_array<C: Component>(&self) -> StoreResult<&[C]> {
        let range = self.column_range::<C>()?;
        Ok(bytemuck::try_cast_slice(&self.bytes()[range])?)
    }

    /// Returns the occupied part of one column, writable.
    ///
    /// # Errors
    ///
    /// Same as [`field_array`](Self::field_array).
    pub fn field_array_mut<C: Component>(&mut self) -> StoreResult<&mut [C]> {
        let range = self.column_range::<C>()?;
        Ok(bytemuck::try_cast_slice_mut(&mut self.bytes_mut()[range])?)
    }

    /// Returns two distinct columns, both writable.
    ///
    /// # Errors
    ///
    /// [`StoreError::DuplicateComponent`] if `A` and `B` are the same
    /// component, otherwise as [`field_array`](Self::field_array).
    pub fn columns_mut2<A: Component, B: Component>(
        &mut self,
    ) -> StoreResult<(&mut [A], &mut [B])> {
        if A::ID == B::ID {
            return Err(StoreError::DuplicateComponent(A::ID));
        }
        let ranges = [self.column_range::<A>()?, self.column_range::<B>()?];
        let [a, b] = split_disjoint_mut(self.bytes_mut(), &ranges);
        Ok((bytemuck::try_cast_slice_mut(a)?, bytemuck::try_cast_slice_mut(b)?))
    }

    /// Returns three distinct columns, all writable.
    ///
    /// # Errors
    ///
    /// Same as [`columns_mut2`](Self::columns_mut2).
    pub fn columns_mut3<A: Component, B: Component, C: Component>(
        &mut self,
    ) -> StoreResult<(&mut [A], &mut [B], &mut [C])> {
        if A::ID == B::ID || A::ID == C::ID {
            return Err(StoreError::DuplicateComponent(A::ID));
        }
        if B::ID == C::ID {
            return Err(StoreError::DuplicateComponent(B::ID));
        }
        let ranges = [
            self.column_range::<A>()?,
            self.column_range::<B>()?,
            self.column_range::<C>()?,
        ];
        let [a, b, c] = split_disjoint_mut(self.bytes_mut(), &ranges);
        Ok((
            bytemuck::try_cast_slice_mut(a)?,
            bytemuck::try_cast_slice_mut(b)?,
            bytemuck::try_cast_slice_mut(c)?,
        ))
    }

    /// Calls `f` once per occupied slot, in slot order.
    ///
    /// # Errors
    ///
    /// Same as [`field_array`](Self::field_array).
    pub fn for_each<A, F>(&mut self, f: F) -> StoreResult<()>
    where
        A: Component,
        F: FnMut(&mut A),
    {
        self.field_array_mut::<A>()?.iter_mut().for_each(f);
        Ok(())
    }

    /// Calls `f` with both fields of every occupied slot, in slot order.
    ///
    /// # Errors
    ///
    /// Same as [`columns_mut2`](Self::columns_mut2).
    pub fn for_each2<A, B, F>(&mut self, mut f: F) -> StoreResult<()>
    where
        A: Component,
        B: Component,
        F: FnMut(&mut A, &mut B),
    {
        let (a, b) = self.columns_mut2::<A, B>()?;
        for (a, b) in a.iter_mut().zip(b.iter_mut()) {
            f(a, b);
        }
        Ok(())
    }

    /// Calls `f` with all three fields of every occupied slot, in slot order.
    ///
    /// # Errors
    ///
    /// Same as [`columns_mut3`](Self::columns_mut3).
    pub fn for_each3<A, B, C, F>(&mut self, mut f: F) -> StoreResult<()>
    where
        A: Component,
        B: Component,
        C: Component,
        F: FnMut(&mut A, &mut B, &mut C),
    {
        let (a, b, c) = self.columns_mut3::<A, B, C>()?;
        for ((a, b), c) in a.iter_mut().zip(b.iter_mut()).zip(c.iter_mut()) {
            f(a, b, c);
        }
        Ok(())
    }

    #[inline]
    fn bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.blocks)
    }

    #[inline]
    fn bytes_mut(&mut self) -> &mut [u8] {
        bytemuck::cast_slice_mut(&mut self.blocks)
    }

    #[inline]
    fn slot(&self, entity: Entity) -> StoreResult<usize> {
        self.slots
            .get(&entity)
            .copied()
            .ok_or(StoreError::EntityNotFound(entity))
    }

    fn field(&self, id: ComponentId, name: &'static str) -> StoreResult<&ComponentInfo> {
        self.archetype
            .field(id)
            .ok_or(StoreError::ComponentNotInArchetype { id, name })
    }

    /// Column base offset of a field, after checking the caller's element size.
    fn checked_offset(&self, id: ComponentId, name: &'static str, size: usize) -> StoreResult<usize> {
        let position = self
            .archetype
            .position(id)
            .ok_or(StoreError::ComponentNotInArchetype { id, name })?;
        let expected = self.archetype.fields()[position].size;
        if size != expected {
            return Err(StoreError::SizeMismatch {
                id,
                expected,
                actual: size,
            });
        }
        Ok(self.offsets[position])
    }

    fn element_range(
        &self,
        id: ComponentId,
        name: &'static str,
        size: usize,
        slot: usize,
    ) -> StoreResult<Range<usize>> {
        let start = self.checked_offset(id, name, size)? + slot * size;
        Ok(start..start + size)
    }

    fn column_range<C: Component>(&self) -> StoreResult<Range<usize>> {
        let size = std::mem::size_of::<C>();
        let start = self.checked_offset(C::ID, C::name(), size)?;
        Ok(start..start + self.len * size)
    }
}

impl std::fmt::Debug for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunk")
            .field("archetype", &self.archetype.id())
            .field("len", &self.len)
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

/// Writable access to one chunk's columns, handed out by
/// [`World`](super::World) queries.
///
/// Values can be read and written, but entities cannot be added or removed:
/// the world's entity routing stays in sync with its chunks.
pub struct ChunkMut<'w> {
    chunk: &'w mut Chunk,
}

impl<'w> ChunkMut<'w> {
    pub(crate) fn new(chunk: &'w mut Chunk) -> Self {
        Self { chunk }
    }

    /// See [`Chunk::set`].
    ///
    /// # Errors
    ///
    /// Same as [`Chunk::set`].
    pub fn set<C: Component>(&mut self, entity: Entity, value: C) -> StoreResult<()> {
        self.chunk.set(entity, value)
    }

    /// See [`Chunk::field_array_mut`].
    ///
    /// # Errors
    ///
    /// Same as [`Chunk::field_array_mut`].
    pub fn field_array_mut<C: Component>(&mut self) -> StoreResult<&mut [C]> {
        self.chunk.field_array_mut()
    }

    /// See [`Chunk::columns_mut2`].
    ///
    /// # Errors
    ///
    /// Same as [`Chunk::columns_mut2`].
    pub fn columns_mut2<A: Component, B: Component>(
        &mut self,
    ) -> StoreResult<(&mut [A], &mut [B])> {
        self.chunk.columns_mut2()
    }

    /// See [`Chunk::columns_mut3`].
    ///
    /// # Errors
    ///
    /// Same as [`Chunk::columns_mut3`].
    pub fn columns_mut3<A: Component, B: Component, C: Component>(
        &mut self,
    ) -> StoreResult<(&mut [A], &mut [B], &mut [C])> {
        self.chunk.columns_mut3()
    }

    /// See [`Chunk::for_each`].
    ///
    /// # Errors
    ///
    /// Same as [`Chunk::for_each`].
    pub fn for_each<A: Component, F: FnMut(&mut A)>(&mut self, f: F) -> StoreResult<()> {
        self.chunk.for_each(f)
    }

    /// See [`Chunk::for_each2`].
    ///
    /// # Errors
    ///
    /// Same as [`Chunk::for_each2`].
    pub fn for_each2<A, B, F>(&mut self, f: F) -> StoreResult<()>
    where
        A: Component,
        B: Component,
        F: FnMut(&mut A, &mut B),
    {
        self.chunk.for_each2(f)
    }

    /// See [`Chunk::for_each3`].
    ///
    /// # Errors
    ///
    /// Same as [`Chunk::for_each3`].
    pub fn for_each3<A, B, C, F>(&mut self, f: F) -> StoreResult<()>
    where
        A: Component,
        B: Component,
        C: Component,
        F: FnMut(&mut A, &mut B, &mut C),
    {
        self.chunk.for_each3(f)
    }
}

impl Deref for ChunkMut<'_> {
    type Target = Chunk;

    fn deref(&self) -> &Chunk {
        self.chunk
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
    #[repr(C)]
    struct Position {
        x: f32,
        y: f32,
        z: f32,
    }

    impl Position {
        fn new(x: f32, y: f32, z: f32) -> Self {
            Self { x, y, z }
        }
    }

    impl Component for Position {
        const ID: ComponentId = 0;
    }

    #[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
    #[repr(C)]
    struct Velocity {
        x: f32,
        y: f32,
        z: f32,
    }

    impl Component for Velocity {
        const ID: ComponentId = 1;
    }

    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
    #[repr(C)]
    struct Flags(u8);

    impl Component for Flags {
        const ID: ComponentId = 2;
    }

    #[allow(dead_code)]
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
    #[repr(C)]
    struct Counter(u64);

    impl Component for Counter {
        const ID: ComponentId = 3;
    }

    fn entity(index: u32) -> Entity {
        Entity::new(index, 0)
    }

    #[test]
    fn test_chunk_creation() {
        let chunk = Chunk::of::<(Position, Velocity)>(100).unwrap();
        assert_eq!(chunk.len(), 0);
        assert_eq!(chunk.capacity(), 100);
        assert_eq!(chunk.free_slots(), 100);
        assert_eq!(chunk.offsets, vec![0, 1200]);
        assert!(chunk.bytes().len() >= 100 * chunk.archetype().stride());
    }

    #[test]
    fn test_columns_are_aligned() {
        // Flags (1 byte) sorts before Counter (8 bytes), so Counter's column
        // must be padded to its alignment.
        let chunk = Chunk::of::<(Counter, Flags)>(3).unwrap();
        assert_eq!(chunk.offsets, vec![0, 8]);

        let mut chunk = chunk;
        chunk.add_entity(entity(0)).unwrap();
        chunk.set(entity(0), Counter(u64::MAX)).unwrap();
        assert_eq!(chunk.field_array::<Counter>().unwrap(), &[Counter(u64::MAX)]);
    }

    #[test]
    fn test_add_and_get() {
        let mut chunk = Chunk::of::<(Position, Velocity)>(4).unwrap();
        let id = entity(1);
        chunk.add_entity(id).unwrap();
        assert_eq!(chunk.len(), 1);
        assert_eq!(chunk.slots[&id], 0);

        chunk.set(id, Position::new(1.0, 2.0, 3.0)).unwrap();
        chunk.set(id, Velocity { x: 0.1, y: 0.2, z: 0.3 }).unwrap();
        assert_eq!(chunk.get::<Position>(id).unwrap(), Position::new(1.0, 2.0, 3.0));
        assert_eq!(chunk.get::<Velocity>(id).unwrap().x, 0.1);
    }

    #[test]
    fn test_add_duplicate_rejected() {
        let mut chunk = Chunk::of::<(Position,)>(4).unwrap();
        chunk.add_entity(entity(0)).unwrap();
        assert_eq!(
            chunk.add_entity(entity(0)),
            Err(StoreError::EntityAlreadyPresent(entity(0)))
        );
        assert_eq!(chunk.len(), 1);
    }

    #[test]
    fn test_unknown_entity_and_component() {
        let mut chunk = Chunk::of::<(Position,)>(4).unwrap();
        assert_eq!(
            chunk.get::<Position>(entity(7)),
            Err(StoreError::EntityNotFound(entity(7)))
        );
        assert_eq!(
            chunk.remove_entity(entity(7)),
            Err(StoreError::EntityNotFound(entity(7)))
        );

        chunk.add_entity(entity(0)).unwrap();
        assert!(matches!(
            chunk.get::<Velocity>(entity(0)),
            Err(StoreError::ComponentNotInArchetype { id: 1, .. })
        ));
        assert!(chunk.field_array::<Velocity>().is_err());
    }

    #[test]
    fn test_size_mismatch_detected() {
        // Declares Position's id with a different size than the Rust type.
        let lying = ComponentInfo {
            id: Position::ID,
            size: 16,
            align: 4,
            name: "Position",
        };
        let mut chunk = Chunk::new(Archetype::new(vec![lying]).unwrap(), 2).unwrap();
        chunk.add_entity(entity(0)).unwrap();

        let expected = Err(StoreError::SizeMismatch {
            id: Position::ID,
            expected: 16,
            actual: 12,
        });
        assert_eq!(chunk.get::<Position>(entity(0)), expected);
        assert_eq!(chunk.set(entity(0), Position::default()), expected.map(|_| ()));
        assert!(chunk.set_bytes(entity(0), Position::ID, &[0; 3]).is_err());
        assert!(chunk.set_bytes(entity(0), Position::ID, &[7; 16]).is_ok());
        assert_eq!(chunk.get_bytes(entity(0), Position::ID).unwrap(), &[7; 16]);
    }

    #[test]
    fn test_growth_preserves_data() {
        let mut chunk = Chunk::of::<(Position, Flags)>(2).unwrap();
        for i in 0..2 {
            chunk.add_entity(entity(i)).unwrap();
            let v = i as f32;
            chunk.set(entity(i), Position::new(v, v + 1.0, v + 2.0)).unwrap();
            chunk.set(entity(i), Flags(i as u8 + 10)).unwrap();
        }
        assert_eq!(chunk.capacity(), 2);

        chunk.add_entity(entity(2)).unwrap();
        assert_eq!(chunk.capacity(), 4);
        assert_eq!(chunk.len(), 3);
        assert_eq!(chunk.offsets, vec![0, 48]);

        for i in 0..2 {
            let v = i as f32;
            assert_eq!(
                chunk.get::<Position>(entity(i)).unwrap(),
                Position::new(v, v + 1.0, v + 2.0)
            );
            assert_eq!(chunk.get::<Flags>(entity(i)).unwrap(), Flags(i as u8 + 10));
        }
    }

    #[test]
    fn test_zero_capacity_grows() {
        let mut chunk = Chunk::of::<(Flags,)>(0).unwrap();
        chunk.add_entity(entity(0)).unwrap();
        assert_eq!(chunk.capacity(), 1);
        chunk.add_entity(entity(1)).unwrap();
        assert_eq!(chunk.capacity(), 2);
    }

    #[test]
    fn test_resize_never_shrinks() {
        let mut chunk = Chunk::of::<(Position,)>(8).unwrap();
        chunk.resize(4).unwrap();
        assert_eq!(chunk.capacity(), 8);
        chunk.resize(8).unwrap();
        assert_eq!(chunk.capacity(), 8);
        chunk.resize(20).unwrap();
        assert_eq!(chunk.capacity(), 20);
    }

    #[test]
    fn test_reserve_grows_in_one_step() {
        let mut chunk = Chunk::of::<(Flags,)>(2).unwrap();
        chunk.add_entity(entity(0)).unwrap();
        chunk.set(entity(0), Flags(9)).unwrap();

        chunk.reserve(1).unwrap();
        assert_eq!(chunk.capacity(), 2);
        chunk.reserve(6).unwrap();
        assert_eq!(chunk.capacity(), 8);
        assert_eq!(chunk.get::<Flags>(entity(0)).unwrap(), Flags(9));
    }

    #[test]
    fn test_oversized_capacity_rejected() {
        assert_eq!(
            Chunk::of::<(Position,)>(usize::MAX).unwrap_err(),
            StoreError::CapacityOverflow(usize::MAX)
        );
        assert_eq!(
            Chunk::of::<(Position,)>(MAX_CHUNK_CAPACITY + 1).unwrap_err(),
            StoreError::CapacityOverflow(MAX_CHUNK_CAPACITY + 1)
        );

        let mut chunk = Chunk::of::<(Position, Counter)>(4).unwrap();
        chunk.add_entity(entity(0)).unwrap();
        chunk.set(entity(0), Counter(5)).unwrap();
        assert_eq!(
            chunk.resize(usize::MAX),
            Err(StoreError::CapacityOverflow(usize::MAX))
        );
        assert!(chunk.reserve(usize::MAX).is_err());
        assert_eq!(chunk.capacity(), 4);
        assert_eq!(chunk.get::<Counter>(entity(0)).unwrap(), Counter(5));
    }

    #[test]
    fn test_layout_overflow_is_an_error() {
        // Within the slot limit, but the byte size cannot be addressed.
        let wide = ComponentInfo {
            id: 5,
            size: usize::MAX / 2,
            align: 1,
            name: "Wide",
        };
        let archetype = Archetype::new(vec![wide]).unwrap();
        assert_eq!(
            Chunk::new(archetype, 4).unwrap_err(),
            StoreError::CapacityOverflow(4)
        );
    }

    #[test]
    fn test_swap_remove() {
        let mut chunk = Chunk::of::<(Position, Flags)>(4).unwrap();
        let (h0, h1, h2) = (entity(0), entity(1), entity(2));
        for (i, h) in [h0, h1, h2].into_iter().enumerate() {
            chunk.add_entity(h).unwrap();
            let v = i as f32;
            chunk.set(h, Position::new(v, v, v)).unwrap();
            chunk.set(h, Flags(i as u8)).unwrap();
        }

        assert_eq!(chunk.remove_entity(h0).unwrap(), Some(h2));
        assert_eq!(chunk.len(), 2);
        assert_eq!(chunk.slots[&h2], 0);
        assert_eq!(chunk.slots[&h1], 1);
        assert_eq!(chunk.entities(), &[h2, h1]);
        assert!(!chunk.contains_entity(h0));

        assert_eq!(chunk.get::<Position>(h2).unwrap(), Position::new(2.0, 2.0, 2.0));
        assert_eq!(chunk.get::<Flags>(h2).unwrap(), Flags(2));
        assert_eq!(chunk.get::<Position>(h1).unwrap(), Position::new(1.0, 1.0, 1.0));
        assert_eq!(chunk.get::<Flags>(h1).unwrap(), Flags(1));
    }

    #[test]
    fn test_remove_last_moves_nothing() {
        let mut chunk = Chunk::of::<(Flags,)>(4).unwrap();
        chunk.add_entity(entity(0)).unwrap();
        chunk.add_entity(entity(1)).unwrap();
        assert_eq!(chunk.remove_entity(entity(1)).unwrap(), None);
        assert_eq!(chunk.entities(), &[entity(0)]);
        assert_eq!(chunk.remove_entity(entity(0)).unwrap(), None);
        assert!(chunk.is_empty());
    }

    #[test]
    fn test_field_array_covers_occupied_slots() {
        let mut chunk = Chunk::of::<(Flags, Position)>(8).unwrap();
        assert!(chunk.field_array::<Flags>().unwrap().is_empty());

        for i in 0..5 {
            chunk.add_entity(entity(i)).unwrap();
            chunk.set(entity(i), Flags(i as u8)).unwrap();
        }
        chunk.remove_entity(entity(1)).unwrap();

        let flags = chunk.field_array::<Flags>().unwrap();
        assert_eq!(flags, &[Flags(0), Flags(4), Flags(2), Flags(3)]);

        for flag in chunk.field_array_mut::<Flags>().unwrap() {
            flag.0 *= 2;
        }
        assert_eq!(chunk.get::<Flags>(entity(4)).unwrap(), Flags(8));
    }

    #[test]
    fn test_columns_mut2_disjoint() {
        let mut chunk = Chunk::of::<(Position, Velocity)>(4).unwrap();
        for i in 0..3 {
            chunk.add_entity(entity(i)).unwrap();
            chunk.set(entity(i), Position::default()).unwrap();
            let v = i as f32;
            chunk.set(entity(i), Velocity { x: v, y: v * 2.0, z: 1.0 }).unwrap();
        }

        // Requested in reverse column order.
        let (vel, pos) = chunk.columns_mut2::<Velocity, Position>().unwrap();
        assert_eq!(vel.len(), 3);
        for (p, v) in pos.iter_mut().zip(vel.iter()) {
            p.x += v.x;
            p.y += v.y;
            p.z += v.z;
        }

        assert_eq!(chunk.get::<Position>(entity(2)).unwrap(), Position::new(2.0, 4.0, 1.0));
        assert_eq!(
            chunk.columns_mut2::<Position, Position>().unwrap_err(),
            StoreError::DuplicateComponent(Position::ID)
        );
    }

    #[test]
    fn test_for_each3_in_slot_order() {
        let mut chunk = Chunk::of::<(Position, Velocity, Flags)>(2).unwrap();
        for i in 0..4 {
            chunk.add_entity(entity(i)).unwrap();
            chunk.set(entity(i), Flags(0)).unwrap();
        }

        let mut next = 0u8;
        chunk
            .for_each3::<Flags, Position, Velocity, _>(|flags, pos, vel| {
                flags.0 = next;
                *pos = Position::new(f32::from(next), 0.0, 0.0);
                *vel = Velocity::default();
                next += 1;
            })
            .unwrap();

        assert_eq!(next, 4);
        for i in 0..4 {
            assert_eq!(chunk.get::<Flags>(entity(i)).unwrap(), Flags(i as u8));
        }
    }

    #[test]
    fn test_new_slot_reads_are_deterministic() {
        let mut chunk = Chunk::of::<(Position,)>(2).unwrap();
        chunk.add_entity(entity(0)).unwrap();
        let first = chunk.get::<Position>(entity(0)).unwrap();
        let second = chunk.get::<Position>(entity(0)).unwrap();
        assert_eq!(first.x.to_bits(), second.x.to_bits());
    }

    #[test]
    fn test_chunk_mut_forwards_writes() {
        let mut chunk = Chunk::of::<(Flags,)>(2).unwrap();
        chunk.add_entity(entity(0)).unwrap();

        let mut view = ChunkMut::new(&mut chunk);
        view.set(entity(0), Flags(3)).unwrap();
        view.for_each::<Flags, _>(|f| f.0 += 1).unwrap();
        assert_eq!(view.len(), 1);
        assert_eq!(view.get::<Flags>(entity(0)).unwrap(), Flags(4));
    }
}
