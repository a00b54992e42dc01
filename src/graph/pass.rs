//! Pass definitions for the frame graph.

use bitflags::bitflags;

use crate::backend::GpuHandle;
use crate::compiler::PassAccess;
use crate::error::PassError;
use crate::pool::ObjectId;
use crate::resource::{ResourceShape, ResourceTicket};

/// Callback run when a pass executes.
pub type PassCallback<C> = Box<dyn FnMut(&mut PassContext<'_, C>) -> Result<(), PassError>>;

/// Unique identifier for a pass within its build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PassHandle(pub(crate) u32);

impl PassHandle {
    /// Submission index of the pass.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

bitflags! {
    /// How a pass accesses a resource.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ResourceAccess: u8 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const CREATE = 1 << 2;
        const REFERENCE = 1 << 3;
    }
}

/// Snapshot of the physical object bound to a ticket, handed to callbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedResource {
    pub ticket: ResourceTicket,
    pub object: ObjectId,
    pub handle: GpuHandle,
    pub shape: ResourceShape,
    pub access: ResourceAccess,
}

/// A scheduling unit: declared resource accesses plus an execution callback.
pub struct ResourcePass<C> {
    pub(crate) access: PassAccess,
    pub(crate) callback: Option<PassCallback<C>>,
}

impl<C> ResourcePass<C> {
    pub fn name(&self) -> &str {
        &self.access.name
    }

    pub fn reads(&self) -> &[ResourceTicket] {
        &self.access.reads
    }

    pub fn writes(&self) -> &[ResourceTicket] {
        &self.access.writes
    }

    pub fn creates(&self) -> &[ResourceTicket] {
        &self.access.creates
    }

    pub fn refs(&self) -> &[ResourceTicket] {
        &self.access.refs
    }

    /// Whether the pass does anything when run.
    pub fn has_callback(&self) -> bool {
        self.callback.is_some()
    }

    /// Combined access flags for every ticket of the pass, in first-seen order.
    pub(crate) fn ticket_accesses(&self) -> Vec<(ResourceTicket, ResourceAccess)> {
        let lists = [
            (&self.access.reads, ResourceAccess::READ),
            (&self.access.writes, ResourceAccess::WRITE),
            (&self.access.creates, ResourceAccess::CREATE),
            (&self.access.refs, ResourceAccess::REFERENCE),
        ];
        let mut merged: Vec<(ResourceTicket, ResourceAccess)> = Vec::new();
        for (tickets, flag) in lists {
            for ticket in tickets {
                match merged.iter_mut().find(|(seen, _)| seen == ticket) {
                    Some((_, access)) => *access |= flag,
                    None => merged.push((ticket.clone(), flag)),
                }
            }
        }
        merged
    }
}

impl<C> AsRef<PassAccess> for ResourcePass<C> {
    fn as_ref(&self) -> &PassAccess {
        &self.access
    }
}

impl<C> std::fmt::Debug for ResourcePass<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourcePass")
            .field("access", &self.access)
            .finish_non_exhaustive()
    }
}

/// Builder form of a pass declaration.
///
/// ```ignore
/// builder.add(
///     PassDesc::new("lighting")
///         .read(&gbuffer)
///         .create(&hdr)
///         .execute(|ctx| {
///             let target = ctx.resource(&hdr)?;
///             // record commands into ctx.backend()
///             Ok(())
///         }),
/// )?;
/// ```
pub struct PassDesc<C> {
    access: PassAccess,
    callback: Option<PassCallback<C>>,
}

impl<C> PassDesc<C> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            access: PassAccess {
                name: name.into(),
                ..Default::default()
            },
            callback: None,
        }
    }

    pub fn read(mut self, ticket: &ResourceTicket) -> Self {
        self.access.reads.push(ticket.clone());
        self
    }

    pub fn write(mut self, ticket: &ResourceTicket) -> Self {
        self.access.writes.push(ticket.clone());
        self
    }

    pub fn create(mut self, ticket: &ResourceTicket) -> Self {
        self.access.creates.push(ticket.clone());
        self
    }

    /// Keep `ticket` alive until this pass has run, without reading it.
    pub fn reference(mut self, ticket: &ResourceTicket) -> Self {
        self.access.refs.push(ticket.clone());
        self
    }

    /// Set the execution callback. Passes without one do nothing when run.
    pub fn execute<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&mut PassContext<'_, C>) -> Result<(), PassError> + 'static,
    {
        self.callback = Some(Box::new(callback));
        self
    }

    pub(crate) fn into_pass(self) -> ResourcePass<C> {
        ResourcePass {
            access: self.access,
            callback: self.callback,
        }
    }

    pub(crate) fn access(&self) -> &PassAccess {
        &self.access
    }
}

/// Context handed to a pass callback.
pub struct PassContext<'a, C> {
    backend: &'a mut C,
    pass_name: &'a str,
    frame_index: u64,
    position: usize,
    resources: Vec<ResolvedResource>,
    abort: Option<String>,
}

impl<'a, C> PassContext<'a, C> {
    pub(crate) fn new(
        backend: &'a mut C,
        pass_name: &'a str,
        frame_index: u64,
        position: usize,
        resources: Vec<ResolvedResource>,
    ) -> Self {
        Self {
            backend,
            pass_name,
            frame_index,
            position,
            resources,
            abort: None,
        }
    }

    /// Backend context supplied to [`execute`](crate::ExecutableFrameGraph::execute).
    pub fn backend(&mut self) -> &mut C {
        self.backend
    }

    pub fn pass_name(&self) -> &str {
        self.pass_name
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Position of the pass in the execution order.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Resolved object for a ticket this pass declared.
    pub fn resource(&self, ticket: &ResourceTicket) -> Result<&ResolvedResource, PassError> {
        self.resources
            .iter()
            .find(|resource| &resource.ticket == ticket)
            .ok_or_else(|| PassError::MissingResource(ticket.to_string()))
    }

    pub fn resources(&self) -> &[ResolvedResource] {
        &self.resources
    }

    /// Stop the frame after this pass returns.
    pub fn request_abort(&mut self, reason: impl Into<String>) {
        self.abort = Some(reason.into());
    }

    pub(crate) fn take_abort(&mut self) -> Option<String> {
        self.abort.take()
    }
}
