//! Frame graph construction.

use std::sync::Arc;

use crate::cancellation::CancellationToken;
use crate::capture::{CaptureEvent, SharedCapture};
use crate::compiler::{self, PassAccess};
use crate::config::FailurePolicy;
use crate::error::{DeclarationError, FrameGraphError, PassError};
use crate::pool::SharedObjectMap;
use crate::resource::{ResourceDef, ResourceTicket};

use super::executable::ExecutableFrameGraph;
use super::pass::{PassContext, PassDesc, PassHandle, ResourcePass};
use super::resolve::{self, DeclaredResource};
use super::result::FrameState;

/// Collects the tickets and passes of one frame.
///
/// Obtained from [`FrameGraph::begin_frame`](super::FrameGraph::begin_frame).
/// Nothing is allocated until [`build`](Self::build).
pub struct FrameGraphBuilder<C> {
    map: SharedObjectMap,
    capture: Option<SharedCapture>,
    policy: FailurePolicy,
    cancellation: Option<CancellationToken>,
    frame_index: u64,
    generation: u64,
    resources: Vec<DeclaredResource>,
    creators: Vec<Option<usize>>,
    passes: Vec<ResourcePass<C>>,
    error: Option<DeclarationError>,
}

impl<C> FrameGraphBuilder<C> {
    pub(crate) fn new(
        map: SharedObjectMap,
        capture: Option<SharedCapture>,
        policy: FailurePolicy,
        frame_index: u64,
        generation: u64,
    ) -> Self {
        Self {
            map,
            capture,
            policy,
            cancellation: None,
            frame_index,
            generation,
            resources: Vec::new(),
            creators: Vec::new(),
            passes: Vec::new(),
            error: None,
        }
    }

    /// Check `token` between passes while executing.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Replace or clear the cancellation token.
    pub fn set_cancellation(&mut self, token: Option<CancellationToken>) {
        self.cancellation = token;
    }

    /// Always [`FrameState::Building`].
    pub fn state(&self) -> FrameState {
        FrameState::Building
    }

    /// Index of the frame this builder belongs to, starting at 1.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Generation stamped into every ticket of this build.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of passes accepted so far.
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    /// Number of declared tickets.
    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    /// Register a logical resource.
    pub fn declare(&mut self, name: impl Into<String>, def: impl Into<ResourceDef>) -> ResourceTicket {
        let def = def.into();
        let name: Arc<str> = Arc::from(name.into());
        let ticket = ResourceTicket::new(self.resources.len() as u32, self.generation, name);

        log::trace!("Declared {} ({})", ticket, def.shape);
        self.record(CaptureEvent::ResourceDeclared {
            ticket: ticket.to_string(),
            shape: def.shape.to_string(),
        });
        self.resources.push(DeclaredResource {
            ticket: ticket.clone(),
            def,
        });
        self.creators.push(None);
        ticket
    }

    /// Look up a ticket declared in this build by index.
    pub fn ticket(&self, index: u32) -> Result<ResourceTicket, DeclarationError> {
        self.resources
            .get(index as usize)
            .map(|resource| resource.ticket.clone())
            .ok_or(DeclarationError::UnknownTicket {
                index,
                declared: self.resources.len() as u32,
            })
    }

    /// Definition a ticket was declared with.
    pub fn definition(&self, ticket: &ResourceTicket) -> Option<&ResourceDef> {
        self.resources
            .get(ticket.slot())
            .filter(|resource| &resource.ticket == ticket)
            .map(|resource| &resource.def)
    }

    /// Declare a pass.
    ///
    /// Errors are also remembered and returned again by [`build`](Self::build).
    pub fn add_pass<F>(
        &mut self,
        name: impl Into<String>,
        reads: &[ResourceTicket],
        writes: &[ResourceTicket],
        creates: &[ResourceTicket],
        refs: &[ResourceTicket],
        callback: F,
    ) -> Result<PassHandle, DeclarationError>
    where
        F: FnMut(&mut PassContext<'_, C>) -> Result<(), PassError> + 'static,
    {
        let mut desc = PassDesc::new(name).execute(callback);
        for ticket in reads {
            desc = desc.read(ticket);
        }
        for ticket in writes {
            desc = desc.write(ticket);
        }
        for ticket in creates {
            desc = desc.create(ticket);
        }
        for ticket in refs {
            desc = desc.reference(ticket);
        }
        self.add(desc)
    }

    /// Declare a pass from a [`PassDesc`].
    pub fn add(&mut self, desc: PassDesc<C>) -> Result<PassHandle, DeclarationError> {
        if let Err(err) = self.validate(desc.access()) {
            log::error!("Rejected pass '{}': {}", desc.access().name, err);
            if self.error.is_none() {
                self.error = Some(err.clone());
            }
            return Err(err);
        }

        let handle = PassHandle(self.passes.len() as u32);
        for ticket in &desc.access().creates {
            self.creators[ticket.slot()] = Some(handle.index());
        }
        self.passes.push(desc.into_pass());
        Ok(handle)
    }

    fn validate(&self, access: &PassAccess) -> Result<(), DeclarationError> {
        for ticket in access.tickets() {
            if ticket.generation() != self.generation {
                return Err(DeclarationError::StaleTicket {
                    ticket: ticket.to_string(),
                    pass: access.name.clone(),
                });
            }
            if ticket.slot() >= self.resources.len() {
                return Err(DeclarationError::UnknownTicket {
                    index: ticket.index(),
                    declared: self.resources.len() as u32,
                });
            }
        }
        for ticket in &access.creates {
            if let Some(first) = self.creators[ticket.slot()] {
                return Err(DeclarationError::DuplicateCreator {
                    ticket: ticket.to_string(),
                    first: self.passes[first].name().to_string(),
                    second: access.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Order the passes and bind every used ticket to an object.
    ///
    /// Bound objects stay reserved in the map until the returned graph runs
    /// or is dropped.
    pub fn build(self) -> Result<ExecutableFrameGraph<C>, FrameGraphError> {
        if let Some(err) = self.error.clone() {
            return Err(self.fail(err.into()));
        }

        let compiled = match compiler::compile(&self.passes, self.resources.len()) {
            Ok(compiled) => compiled,
            Err(err) => return Err(self.fail(err.into())),
        };

        let resolution = {
            let mut map = self.map.lock();
            resolve::resolve(&mut map, &self.resources, &compiled)
        };
        let resolution = match resolution {
            Ok(resolution) => resolution,
            Err(err) => return Err(self.fail(err)),
        };

        log::debug!(
            "Built frame {}: {} passes, {} tickets, {} bound",
            self.frame_index,
            self.passes.len(),
            self.resources.len(),
            resolution.bindings.iter().flatten().count()
        );

        Ok(ExecutableFrameGraph::new(
            self.map,
            self.capture,
            self.policy,
            self.cancellation,
            self.frame_index,
            self.generation,
            self.resources,
            self.passes,
            compiled,
            resolution,
        ))
    }

    fn fail(&self, err: FrameGraphError) -> FrameGraphError {
        log::error!("Frame {} aborted while building: {}", self.frame_index, err);
        self.record(CaptureEvent::FrameAborted {
            generation: self.generation,
            reason: err.to_string(),
        });
        err
    }

    fn record(&self, event: CaptureEvent) {
        if let Some(capture) = &self.capture {
            capture.lock().record(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyAllocator;
    use crate::pool::RenderObjectMap;
    use crate::resource::ResourceShape;
    use crate::types::BufferUsage;

    fn builder(generation: u64) -> FrameGraphBuilder<()> {
        let map = RenderObjectMap::new(DummyAllocator::new()).shared();
        FrameGraphBuilder::new(map, None, FailurePolicy::Abort, 1, generation)
    }

    fn uniform() -> ResourceShape {
        ResourceShape::buffer(256, BufferUsage::UNIFORM)
    }

    #[test]
    fn test_declare_assigns_indices() {
        let mut builder = builder(10);
        let a = builder.declare("a", uniform());
        let b = builder.declare("b", uniform());
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(a.generation(), 10);
        assert_eq!(builder.ticket(1).unwrap(), b);
        assert_eq!(builder.definition(&a).unwrap().shape, uniform());
    }

    #[test]
    fn test_unknown_ticket_index() {
        let mut builder = builder(10);
        builder.declare("a", uniform());
        assert_eq!(
            builder.ticket(3),
            Err(DeclarationError::UnknownTicket {
                index: 3,
                declared: 1
            })
        );
    }

    #[test]
    fn test_stale_ticket_is_remembered() {
        let mut old = builder(10);
        let stale = old.declare("history", uniform());

        let mut builder = builder(11);
        let err = builder
            .add_pass("blend", &[stale], &[], &[], &[], |_| Ok(()))
            .unwrap_err();
        assert!(matches!(err, DeclarationError::StaleTicket { .. }));
        assert_eq!(builder.pass_count(), 0);

        let build_err = builder.build().err().unwrap();
        assert_eq!(build_err, FrameGraphError::Declaration(err));
    }

    #[test]
    fn test_duplicate_creator() {
        let mut builder = builder(10);
        let t = builder.declare("t", uniform());
        builder
            .add(PassDesc::new("first").create(&t))
            .unwrap();
        let err = builder.add(PassDesc::new("second").create(&t)).unwrap_err();
        assert_eq!(
            err,
            DeclarationError::DuplicateCreator {
                ticket: t.to_string(),
                first: "first".into(),
                second: "second".into(),
            }
        );
    }
}
