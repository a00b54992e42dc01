//! Frame graph error types.

use thiserror::Error;

use crate::pool::ObjectId;

/// Errors reported by a [`ResourceAllocator`](crate::backend::ResourceAllocator).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Out of memory: {requested} bytes requested, {available} available")]
    OutOfMemory { requested: u64, available: u64 },
    #[error("Failed to create resource: {0}")]
    ResourceCreationFailed(String),
    #[error("Unsupported resource shape: {0}")]
    UnsupportedShape(String),
    #[error("Device lost")]
    DeviceLost,
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Errors in the way passes and tickets were declared.
///
/// These are detected while building and abort the frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeclarationError {
    #[error("Unknown ticket index {index}: only {declared} tickets were declared")]
    UnknownTicket { index: u32, declared: u32 },
    #[error("Stale ticket {ticket} used by pass '{pass}'")]
    StaleTicket { ticket: String, pass: String },
    #[error("Ticket {ticket} is created by both '{first}' and '{second}'")]
    DuplicateCreator {
        ticket: String,
        first: String,
        second: String,
    },
    #[error("Cyclic dependency between passes: {}", .passes.join(" -> "))]
    CyclicDependency { passes: Vec<String> },
}

/// Failure reported by a pass callback.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PassError {
    #[error("{0}")]
    Failed(String),
    #[error("Pass panicked: {0}")]
    Panicked(String),
    #[error("Resource {0} is not declared by this pass")]
    MissingResource(String),
}

impl PassError {
    /// Create a generic failure with a message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Why [`RenderObjectMap::acquire_specific`](crate::pool::RenderObjectMap::acquire_specific)
/// could not hand out the requested object.
///
/// This is reported to the caller, who falls back to a regular acquire.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpecificAcquireError {
    #[error("Object {0} does not exist")]
    Unknown(ObjectId),
    #[error("Object {0} is in use")]
    InUse(ObjectId),
    #[error("Object {0} is reserved by a pending frame")]
    Reserved(ObjectId),
    #[error("Object {0} has an incompatible shape")]
    Incompatible(ObjectId),
}

/// Errors from direct [`RenderObjectMap`](crate::pool::RenderObjectMap) operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MapError {
    #[error("Object {0} does not exist")]
    UnknownObject(ObjectId),
    #[error("Object {0} is still referenced")]
    ObjectBusy(ObjectId),
    #[error("Object {0} is not in use")]
    NotInUse(ObjectId),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Errors that abort a frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameGraphError {
    #[error("Declaration error: {0}")]
    Declaration(#[from] DeclarationError),
    #[error("Failed to resolve ticket {ticket}: {source}")]
    Resolution {
        ticket: String,
        #[source]
        source: BackendError,
    },
    #[error("Pass '{pass}' failed: {source}")]
    Execution {
        pass: String,
        #[source]
        source: PassError,
    },
    #[error("Frame cancelled: {0}")]
    Cancelled(String),
}

impl FrameGraphError {
    /// Whether this error was raised while building.
    pub fn is_declaration(&self) -> bool {
        matches!(self, Self::Declaration(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DeclarationError::CyclicDependency {
            passes: vec!["A".into(), "B".into(), "A".into()],
        };
        assert_eq!(
            err.to_string(),
            "Cyclic dependency between passes: A -> B -> A"
        );

        let err = FrameGraphError::Execution {
            pass: "lighting".into(),
            source: PassError::msg("pipeline missing"),
        };
        assert_eq!(err.to_string(), "Pass 'lighting' failed: pipeline missing");
    }

    #[test]
    fn test_declaration_conversion() {
        let err: FrameGraphError = DeclarationError::UnknownTicket {
            index: 4,
            declared: 2,
        }
        .into();
        assert!(err.is_declaration());
    }

    #[test]
    fn test_backend_error_into_map_error() {
        let err: MapError = BackendError::DeviceLost.into();
        assert_eq!(err.to_string(), "Device lost");
    }
}
