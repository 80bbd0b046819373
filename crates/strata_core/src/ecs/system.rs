//! # Systems
//!
//! Update routines that run against the world once per tick, in the order
//! they were registered.

use std::any::TypeId;
use std::collections::HashSet;

use tracing::trace;

use super::world::World;

/// An update routine run once per tick.
///
/// A system may read and write component values freely, but must not spawn
/// or despawn entities in a chunk it is iterating; the borrow checker
/// enforces this for views obtained from the world.
pub trait System: 'static {
    /// Runs the routine.
    fn run(&mut self, world: &mut World);

    /// Display name, used in diagnostics.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Ordered list of systems, at most one per system type.
#[derive(Default)]
pub struct Schedule {
    systems: Vec<(TypeId, Box<dyn System>)>,
    registered: HashSet<TypeId>,
}

impl Schedule {
    /// Creates an empty schedule.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a system. Adding a second system of the same type is a no-op.
    ///
    /// Returns `true` if the system was added.
    pub fn add_system<S: System>(&mut self, system: S) -> bool {
        self.insert(TypeId::of::<S>(), Box::new(system))
    }

    fn insert(&mut self, type_id: TypeId, system: Box<dyn System>) -> bool {
        if !self.registered.insert(type_id) {
            trace!(system = system.name(), "system already registered");
            return false;
        }
        self.systems.push((type_id, system));
        true
    }

    /// Checks whether a system of type `S` is registered.
    #[must_use]
    pub fn contains<S: System>(&self) -> bool {
        self.registered.contains(&TypeId::of::<S>())
    }

    /// Returns the number of systems.
    #[must_use]
    pub fn len(&self) -> usize {
        self.systems.len()
    }

    /// Checks if no system is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    /// Runs every system once, in registration order.
    pub fn run(&mut self, world: &mut World) {
        for (_, system) in &mut self.systems {
            trace!(system = system.name(), "running system");
            system.run(world);
        }
    }

    /// Moves the systems of `other` to the end of this schedule, skipping
    /// types already present.
    pub(crate) fn append(&mut self, other: Self) {
        for (type_id, system) in other.systems {
            self.insert(type_id, system);
        }
    }
}
