//! Frame outcome reporting.

use std::fmt;

use crate::error::{FrameGraphError, PassError, SpecificAcquireError};
use crate::pool::ObjectId;

/// Lifecycle state of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameState {
    /// Passes and tickets are being declared.
    Building,
    /// Tickets are bound and their objects reserved; execution is pending.
    Resolving,
    /// Passes are running.
    Executing,
    Completed,
    Aborted,
}

/// Non-fatal condition noticed while resolving or executing a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameWarning {
    /// A ticket was still bound when the frame completed.
    Leak { ticket: String, object: ObjectId },
    /// A ticket was still bound when the frame aborted before its consumer ran.
    ForceReleased { ticket: String, object: ObjectId },
    /// A requested object could not be reused and a pooled one was used instead.
    SpecificAcquireFallback {
        ticket: String,
        requested: ObjectId,
        reason: SpecificAcquireError,
    },
}

impl fmt::Display for FrameWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Leak { ticket, object } => {
                write!(f, "ticket {ticket} leaked {object} (force-released)")
            }
            Self::ForceReleased { ticket, object } => {
                write!(f, "ticket {ticket} force-released {object} after abort")
            }
            Self::SpecificAcquireFallback {
                ticket,
                requested,
                reason,
            } => write!(f, "ticket {ticket} could not reuse {requested}: {reason}"),
        }
    }
}

/// A pass callback that failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassFailure {
    pub pass: String,
    pub error: PassError,
}

/// Outcome of executing a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameGraphResult {
    /// `Completed` or `Aborted`.
    pub state: FrameState,
    /// Why the frame was aborted.
    pub error: Option<FrameGraphError>,
    /// Every failing pass, in execution order.
    pub pass_failures: Vec<PassFailure>,
    pub warnings: Vec<FrameWarning>,
    /// Number of passes whose callbacks returned successfully.
    pub executed: usize,
}

impl FrameGraphResult {
    /// Completed with no failures.
    pub fn is_success(&self) -> bool {
        self.state == FrameState::Completed && self.error.is_none() && self.pass_failures.is_empty()
    }

    /// Tickets reported as leaked.
    pub fn leaks(&self) -> impl Iterator<Item = (&str, ObjectId)> {
        self.warnings.iter().filter_map(|warning| match warning {
            FrameWarning::Leak { ticket, object } => Some((ticket.as_str(), *object)),
            _ => None,
        })
    }
}
