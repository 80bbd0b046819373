//! # Store Error Types
//!
//! All errors that can occur in the storage engine. Every one of them is a
//! precondition failure: the operation that reports it has not mutated any
//! state.

use thiserror::Error;

use crate::ecs::{ComponentId, Entity};

/// Errors that can occur in the storage engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The handle is not live, or is not stored where it was looked up.
    #[error("entity not found: {0}")]
    EntityNotFound(Entity),

    /// The handle is already stored in this chunk.
    #[error("entity already present: {0}")]
    EntityAlreadyPresent(Entity),

    /// The archetype does not contain the requested component.
    #[error("component {id} ({name}) is not part of the archetype")]
    ComponentNotInArchetype {
        /// The requested component id.
        id: ComponentId,
        /// Display name of the requested component.
        name: &'static str,
    },

    /// The requested type's size differs from the size recorded in the archetype.
    #[error("size mismatch for component {id}: archetype stores {expected} bytes, got {actual}")]
    SizeMismatch {
        /// The component id.
        id: ComponentId,
        /// Size recorded in the archetype.
        expected: usize,
        /// Size of the requested type or byte slice.
        actual: usize,
    },

    /// The same component was listed more than once.
    #[error("component {0} listed more than once")]
    DuplicateComponent(ComponentId),

    /// Two distinct Rust types declared the same component id.
    #[error("component id {id} already registered by {existing}, cannot register {new}")]
    ComponentIdConflict {
        /// The contested id.
        id: ComponentId,
        /// Name of the type that registered first.
        existing: &'static str,
        /// Name of the type that tried to register.
        new: &'static str,
    },

    /// Components must occupy at least one byte.
    #[error("component {0} is zero-sized")]
    ZeroSizedComponent(&'static str),

    /// The component's alignment exceeds what chunk buffers guarantee.
    #[error("component {name} requires alignment {align}, chunk buffers provide {max}")]
    UnsupportedAlignment {
        /// Display name of the component.
        name: &'static str,
        /// Alignment the type requires.
        align: usize,
        /// Maximum supported alignment.
        max: usize,
    },

    /// A chunk of the requested capacity cannot be addressed.
    #[error("chunk capacity {0} exceeds the addressable limit")]
    CapacityOverflow(usize),

    /// No more entity indices are available.
    #[error("entity index space exhausted")]
    EntityCapacityExhausted,

    /// A column could not be viewed as the requested type.
    #[error("column cast failed: {0:?}")]
    ColumnCast(bytemuck::PodCastError),

    /// Invalid configuration file.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<bytemuck::PodCastError> for StoreError {
    fn from(err: bytemuck::PodCastError) -> Self {
        Self::ColumnCast(err)
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
