//! # Archetypes
//!
//! An archetype is the set of components shared by a group of entities.
//! Two archetypes are the same archetype when they list the same component
//! ids, whatever order the components were named in.
//!
//! ```text
//! (Velocity, Position)  ──sort──▶  [Position(0), Velocity(1)]  ──FNV-1a──▶  ArchetypeId
//! (Position, Velocity)  ──sort──▶  [Position(0), Velocity(1)]  ──FNV-1a──▶  same ArchetypeId
//! ```
//!
//! The sorted order is also the column order inside a [`Chunk`](super::Chunk).

use std::fmt;

use super::component::{ComponentId, ComponentInfo, ComponentSet};
use crate::error::{StoreError, StoreResult};

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Deterministic identifier of an archetype.
///
/// Computed from the sorted component id set, so structurally equal
/// archetypes get equal ids in every process and build.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArchetypeId(u64);

impl ArchetypeId {
    /// Hashes a sorted, duplicate-free id list (FNV-1a over little-endian ids).
    #[must_use]
    fn from_sorted_ids(ids: &[ComponentId]) -> Self {
        let mut hash = FNV_OFFSET_BASIS;
        for id in ids {
            for byte in id.to_le_bytes() {
                hash ^= u64::from(byte);
                hash = hash.wrapping_mul(FNV_PRIME);
            }
        }
        Self(hash)
    }

    /// Returns the raw hash value.
    #[inline]
    #[must_use]
    pub const fn to_bits(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ArchetypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Signature of an archetype - which components it contains.
///
/// Uses a sorted list of component ids for consistent hashing.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ArchetypeSignature {
    /// Sorted list of component ids.
    components: Vec<ComponentId>,
}

impl ArchetypeSignature {
    /// Builds the signature of an id list, sorting it and dropping repeats.
    #[must_use]
    pub fn new(mut components: Vec<ComponentId>) -> Self {
        components.sort_unstable();
        components.dedup();
        Self { components }
    }

    /// Builds the signature of a component set.
    #[must_use]
    pub fn of<S: ComponentSet>() -> Self {
        Self::new(S::ids())
    }

    /// Returns the deterministic id of this signature.
    #[must_use]
    pub fn id(&self) -> ArchetypeId {
        ArchetypeId::from_sorted_ids(&self.components)
    }

    /// Checks if this signature contains a component id.
    #[must_use]
    pub fn contains(&self, id: ComponentId) -> bool {
        self.components.binary_search(&id).is_ok()
    }

    /// Returns the sorted component ids.
    #[must_use]
    pub fn ids(&self) -> &[ComponentId] {
        &self.components
    }

    /// Returns the number of component types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Checks if empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

/// The immutable schema of a chunk: its fields and their combined stride.
#[derive(Clone, Debug)]
pub struct Archetype {
    id: ArchetypeId,
    signature: ArchetypeSignature,
    /// Field layouts sorted by component id.
    fields: Vec<ComponentInfo>,
    /// Sum of all field sizes.
    stride: usize,
}

impl Archetype {
    /// Creates an archetype from field layouts given in any order.
    ///
    /// # Errors
    ///
    /// - [`StoreError::DuplicateComponent`] if a component id appears twice
    /// - [`StoreError::ZeroSizedComponent`] / [`StoreError::UnsupportedAlignment`]
    ///   for layouts a chunk cannot hold
    pub fn new(mut fields: Vec<ComponentInfo>) -> StoreResult<Self> {
        for field in &fields {
            field.validate()?;
        }
        fields.sort_unstable_by_key(|field| field.id);
        if let Some(pair) = fields.windows(2).find(|pair| pair[0].id == pair[1].id) {
            return Err(StoreError::DuplicateComponent(pair[0].id));
        }

        let signature = ArchetypeSignature::new(fields.iter().map(|field| field.id).collect());
        let stride = fields.iter().map(|field| field.size).sum();
        Ok(Self {
            id: signature.id(),
            signature,
            fields,
            stride,
        })
    }

    /// Creates the archetype of a component set.
    ///
    /// # Errors
    ///
    /// See [`new`](Self::new).
    pub fn of<S: ComponentSet>() -> StoreResult<Self> {
        Self::new(S::infos())
    }

    /// Returns the deterministic id of this archetype.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ArchetypeId {
        self.id
    }

    /// Returns the sorted component id set.
    #[inline]
    #[must_use]
    pub fn signature(&self) -> &ArchetypeSignature {
        &self.signature
    }

    /// Returns the field layouts in column order (sorted by id).
    #[inline]
    #[must_use]
    pub fn fields(&self) -> &[ComponentInfo] {
        &self.fields
    }

    /// Returns the combined size of one record across all fields.
    #[inline]
    #[must_use]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Returns the number of fields.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Checks if the archetype has no fields.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns the column position of a field, if present.
    #[inline]
    #[must_use]
    pub fn position(&self, id: ComponentId) -> Option<usize> {
        self.fields.binary_search_by_key(&id, |field| field.id).ok()
    }

    /// Looks up a field's layout.
    #[must_use]
    pub fn field(&self, id: ComponentId) -> Option<&ComponentInfo> {
        self.position(id).map(|index| &self.fields[index])
    }

    /// Same field id set as `other`.
    #[must_use]
    pub fn equals(&self, other: &Self) -> bool {
        self.signature.len() == other.signature.len() && self.signature == other.signature
    }

    /// True iff every requested id is a field. Extra fields are allowed and
    /// repeated ids are harmless.
    #[must_use]
    pub fn contains(&self, ids: &[ComponentId]) -> bool {
        ids.iter().all(|&id| self.signature.contains(id))
    }

    /// [`contains`](Self::contains) for a component set.
    #[must_use]
    pub fn contains_set<S: ComponentSet>(&self) -> bool {
        self.contains(&S::ids())
    }

    /// True iff the request names exactly this archetype's fields: same
    /// count, no repeats, and every id present.
    #[must_use]
    pub fn exact_match(&self, ids: &[ComponentId]) -> bool {
        if ids.len() != self.fields.len() {
            return false;
        }
        let mut requested = ids.to_vec();
        requested.sort_unstable();
        if requested.windows(2).any(|pair| pair[0] == pair[1]) {
            return false;
        }
        self.contains(&requested)
    }

    /// [`exact_match`](Self::exact_match) for a component set.
    #[must_use]
    pub fn exact_match_set<S: ComponentSet>(&self) -> bool {
        self.exact_match(&S::ids())
    }
}

#[cfg(test)]
impl Archetype {
    /// Replaces the id, standing in for a hash collision.
    pub(crate) fn with_id(mut self, id: ArchetypeId) -> Self {
        self.id = id;
        self
    }
}

impl PartialEq for Archetype {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

impl Eq for Archetype {}
