//! # Component System
//!
//! Components are pure data containers with no behavior.
//! They must be `Pod` and have a fixed, non-zero size so chunks can move
//! them around as raw bytes.

use std::any::TypeId;
use std::collections::HashMap;

use bytemuck::Pod;

use super::chunk::CHUNK_ALIGN;
use crate::error::{StoreError, StoreResult};

/// Stable numeric identifier of a component type.
pub type ComponentId = u32;

/// Marker trait for components.
///
/// Components must be:
/// - `Pod`: Plain old data, bitwise copyable, safe to view as bytes
/// - `Send + Sync`: Shareable like any other plain value
///
/// The `ID` is declared by hand and must be unique per component type. It is
/// the field id used everywhere in the store, so it stays the same across
/// processes and builds.
///
/// # Example
///
/// ```rust
/// use bytemuck::{Pod, Zeroable};
/// use strata_core::Component;
///
/// #[derive(Clone, Copy, Default, Pod, Zeroable)]
/// #[repr(C)]
/// struct Position {
///     x: f32,
///     y: f32,
///     z: f32,
/// }
///
/// impl Component for Position {
///     const ID: u32 = 0;
/// }
/// ```
pub trait Component: Pod + Send + Sync + 'static {
    /// Unique identifier for this component type.
    const ID: ComponentId;

    /// Display name, used in diagnostics.
    #[must_use]
    fn name() -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Layout description of one component type: a field of an archetype.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ComponentInfo {
    /// Stable component id.
    pub id: ComponentId,
    /// Size of one value in bytes.
    pub size: usize,
    /// Alignment requirement in bytes.
    pub align: usize,
    /// Display name.
    pub name: &'static str,
}

impl ComponentInfo {
    /// Describes a component type.
    #[inline]
    #[must_use]
    pub fn of<C: Component>() -> Self {
        Self {
            id: C::ID,
            size: std::mem::size_of::<C>(),
            align: std::mem::align_of::<C>(),
            name: C::name(),
        }
    }

    /// Checks the layout can be stored in a chunk.
    ///
    /// # Errors
    ///
    /// Zero-sized layouts and alignments that are not a power of two or
    /// exceed [`CHUNK_ALIGN`] are rejected.
    pub fn validate(&self) -> StoreResult<()> {
        if self.size == 0 {
            return Err(StoreError::ZeroSizedComponent(self.name));
        }
        if !self.align.is_power_of_two() || self.align > CHUNK_ALIGN {
            return Err(StoreError::UnsupportedAlignment {
                name: self.name,
                align: self.align,
                max: CHUNK_ALIGN,
            });
        }
        Ok(())
    }
}

/// A list of component types, implemented for tuples of one to eight
/// components: `(Position,)`, `(Position, Velocity)`, ...
///
/// The list may contain the same type twice; archetype construction rejects
/// it, exact matching treats it as a mismatch.
pub trait ComponentSet: 'static {
    /// Type identity and layout of every listed component, in listing order.
    fn entries() -> Vec<(TypeId, ComponentInfo)>;

    /// Layout of every listed component, in listing order.
    #[must_use]
    fn infos() -> Vec<ComponentInfo> {
        Self::entries().into_iter().map(|(_, info)| info).collect()
    }

    /// Ids of every listed component, in listing order.
    #[must_use]
    fn ids() -> Vec<ComponentId> {
        Self::entries().into_iter().map(|(_, info)| info.id).collect()
    }
}

macro_rules! impl_component_set {
    ($($name:ident),+) => {
        impl<$($name: Component),+> ComponentSet for ($($name,)+) {
            fn entries() -> Vec<(TypeId, ComponentInfo)> {
                vec![$((TypeId::of::<$name>(), ComponentInfo::of::<$name>())),+]
            }
        }
    };
}

impl_component_set!(A);
impl_component_set!(A, B);
impl_component_set!(A, B, C);
impl_component_set!(A, B, C, D);
impl_component_set!(A, B, C, D, E);
impl_component_set!(A, B, C, D, E, F);
impl_component_set!(A, B, C, D, E, F, G);
impl_component_set!(A, B, C, D, E, F, G, H);

/// Runtime registry of component types.
///
/// Records each type's layout once and guarantees that one id is never
/// claimed by two different Rust types within a world.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    by_id: HashMap<ComponentId, (TypeId, ComponentInfo)>,
}

impl ComponentRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one component type. Registering a type again is a no-op.
    ///
    /// # Errors
    ///
    /// See [`register_set`](Self::register_set).
    pub fn register<C: Component>(&mut self) -> StoreResult<ComponentInfo> {
        let info = ComponentInfo::of::<C>();
        self.register_entries(&[(TypeId::of::<C>(), info)])?;
        Ok(info)
    }

    /// Registers every type of a set, all or nothing.
    ///
    /// # Errors
    ///
    /// - [`StoreError::ComponentIdConflict`] if an id is already taken by a
    ///   different type, or two different types in the set share an id
    /// - [`StoreError::ZeroSizedComponent`] / [`StoreError::UnsupportedAlignment`]
    ///   for layouts a chunk cannot hold
    pub fn register_set<S: ComponentSet>(&mut self) -> StoreResult<Vec<ComponentInfo>> {
        let entries = S::entries();
        self.register_entries(&entries)?;
        Ok(entries.into_iter().map(|(_, info)| info).collect())
    }

    fn register_entries(&mut self, entries: &[(TypeId, ComponentInfo)]) -> StoreResult<()> {
        let mut staged: HashMap<ComponentId, (TypeId, ComponentInfo)> = HashMap::new();
        for &(type_id, info) in entries {
            info.validate()?;
            let claimed = self.by_id.get(&info.id).or_else(|| staged.get(&info.id));
            if let Some(&(existing_type, existing)) = claimed {
                if existing_type != type_id {
                    return Err(StoreError::ComponentIdConflict {
                        id: info.id,
                        existing: existing.name,
                        new: info.name,
                    });
                }
                continue;
            }
            staged.insert(info.id, (type_id, info));
        }
        self.by_id.extend(staged);
        Ok(())
    }

    /// Checks that no other type has claimed `C`'s id, without registering.
    ///
    /// # Errors
    ///
    /// [`StoreError::ComponentIdConflict`] if a different type owns the id.
    pub fn check<C: Component>(&self) -> StoreResult<()> {
        match self.by_id.get(&C::ID) {
            Some(&(type_id, existing)) if type_id != TypeId::of::<C>() => {
                Err(StoreError::ComponentIdConflict {
                    id: C::ID,
                    existing: existing.name,
                    new: C::name(),
                })
            }
            _ => Ok(()),
        }
    }

    /// [`check`](Self::check) for every type of a set.
    ///
    /// # Errors
    ///
    /// [`StoreError::ComponentIdConflict`] if a different type owns one of the ids.
    pub fn check_set<S: ComponentSet>(&self) -> StoreResult<()> {
        for (type_id, info) in S::entries() {
            if let Some(&(existing_type, existing)) = self.by_id.get(&info.id) {
                if existing_type != type_id {
                    return Err(StoreError::ComponentIdConflict {
                        id: info.id,
                        existing: existing.name,
                        new: info.name,
                    });
                }
            }
        }
        Ok(())
    }

    /// Looks up the layout registered under an id.
    #[must_use]
    pub fn info(&self, id: ComponentId) -> Option<&ComponentInfo> {
        self.by_id.get(&id).map(|(_, info)| info)
    }

    /// Checks whether a component type has been registered.
    #[must_use]
    pub fn is_registered<C: Component>(&self) -> bool {
        self.by_id
            .get(&C::ID)
            .is_some_and(|(type_id, _)| *type_id == TypeId::of::<C>())
    }

    /// Returns the number of registered component types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Checks if no component type has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
