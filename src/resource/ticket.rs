//! Per-build resource handles.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Source of build generations, shared by every frame graph in the process so
/// tickets from one graph can never be mistaken for tickets of another.
static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_generation() -> u64 {
    NEXT_GENERATION.fetch_add(1, Ordering::Relaxed)
}

/// Handle to a logical resource declared in a frame graph build.
///
/// Tickets are cheap to clone and are only valid for the build that issued
/// them. Passing a ticket to a later build fails with
/// [`DeclarationError::StaleTicket`](crate::DeclarationError::StaleTicket).
///
/// Equality and hashing only consider the index and generation; the name is
/// carried for diagnostics.
#[derive(Clone)]
pub struct ResourceTicket {
    pub(crate) index: u32,
    pub(crate) generation: u64,
    pub(crate) name: Arc<str>,
}

impl ResourceTicket {
    pub(crate) fn new(index: u32, generation: u64, name: Arc<str>) -> Self {
        Self {
            index,
            generation,
            name,
        }
    }

    /// Index of the ticket within its build.
    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Generation of the build that issued this ticket.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Debug name given at declaration.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub(crate) fn slot(&self) -> usize {
        self.index as usize
    }
}

impl PartialEq for ResourceTicket {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl Eq for ResourceTicket {}

impl Hash for ResourceTicket {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl fmt::Debug for ResourceTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ticket({}#{}.g{})", self.name, self.index, self.generation)
    }
}

impl fmt::Display for ResourceTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_ignores_name() {
        let a = ResourceTicket::new(3, 7, Arc::from("color"));
        let b = ResourceTicket::new(3, 7, Arc::from("renamed"));
        let c = ResourceTicket::new(3, 8, Arc::from("color"));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_generations_are_unique() {
        let first = next_generation();
        let second = next_generation();
        assert!(second > first);
    }

    #[test]
    fn test_formatting() {
        let ticket = ResourceTicket::new(2, 5, Arc::from("depth"));
        assert_eq!(format!("{ticket:?}"), "Ticket(depth#2.g5)");
        assert_eq!(ticket.to_string(), "depth#2");
    }
}
