//! Frame graph execution.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::cancellation::CancellationToken;
use crate::capture::{CaptureEvent, SharedCapture};
use crate::compiler::{CompiledGraph, TicketLifetime};
use crate::config::FailurePolicy;
use crate::error::{FrameGraphError, PassError};
use crate::pool::{ObjectId, SharedObjectMap};
use crate::resource::ResourceTicket;

use super::pass::{PassContext, ResolvedResource, ResourcePass};
use super::resolve::{self, DeclaredResource, Resolution};
use super::result::{FrameGraphResult, FrameState, FrameWarning, PassFailure};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TicketState {
    Unbound,
    Reserved,
    Active,
    Released,
}

/// A resolved frame ready to run.
///
/// Every used ticket is bound to an object, and those objects are reserved in
/// the map. Running the graph with [`execute`](Self::execute),
/// calling [`abort`](Self::abort), or dropping it returns the reservations.
pub struct ExecutableFrameGraph<C> {
    map: SharedObjectMap,
    capture: Option<SharedCapture>,
    policy: FailurePolicy,
    cancellation: Option<CancellationToken>,
    frame_index: u64,
    generation: u64,
    resources: Vec<DeclaredResource>,
    passes: Vec<ResourcePass<C>>,
    compiled: CompiledGraph,
    bindings: Vec<Option<ObjectId>>,
    tickets: Vec<TicketState>,
    first_use: Vec<Vec<usize>>,
    last_use: Vec<Vec<usize>>,
    warnings: Vec<FrameWarning>,
    state: FrameState,
}

impl<C> ExecutableFrameGraph<C> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        map: SharedObjectMap,
        capture: Option<SharedCapture>,
        policy: FailurePolicy,
        cancellation: Option<CancellationToken>,
        frame_index: u64,
        generation: u64,
        resources: Vec<DeclaredResource>,
        passes: Vec<ResourcePass<C>>,
        compiled: CompiledGraph,
        resolution: Resolution,
    ) -> Self {
        let (first_use, last_use) = resolve::schedule(&compiled);
        let tickets = resolution
            .bindings
            .iter()
            .map(|binding| match binding {
                Some(_) => TicketState::Reserved,
                None => TicketState::Unbound,
            })
            .collect();
        Self {
            map,
            capture,
            policy,
            cancellation,
            frame_index,
            generation,
            resources,
            passes,
            compiled,
            bindings: resolution.bindings,
            tickets,
            first_use,
            last_use,
            warnings: resolution.warnings,
            state: FrameState::Resolving,
        }
    }

    /// [`FrameState::Resolving`] until the frame runs.
    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Generation of the tickets this frame accepts.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Pass names in execution order.
    pub fn pass_order(&self) -> Vec<&str> {
        self.compiled
            .pass_order()
            .iter()
            .map(|&pass| self.passes[pass].name())
            .collect()
    }

    /// Pass order and ticket lifetimes.
    pub fn compiled(&self) -> &CompiledGraph {
        &self.compiled
    }

    /// Object bound to `ticket`, if it is used by any pass.
    pub fn binding(&self, ticket: &ResourceTicket) -> Option<ObjectId> {
        if ticket.generation() != self.generation {
            return None;
        }
        self.bindings.get(ticket.slot()).copied().flatten()
    }

    /// Execution positions between which `ticket` is live.
    pub fn lifetime(&self, ticket: &ResourceTicket) -> Option<TicketLifetime> {
        if ticket.generation() != self.generation {
            return None;
        }
        self.compiled.lifetime(ticket.slot())
    }

    /// Warnings gathered while resolving.
    pub fn warnings(&self) -> &[FrameWarning] {
        &self.warnings
    }

    /// Run every pass in order.
    ///
    /// A failing pass stops the frame under [`FailurePolicy::Abort`]; under
    /// [`FailurePolicy::Continue`] the remaining passes still run and every
    /// failure is reported.
    pub fn execute(mut self, backend: &mut C) -> FrameGraphResult {
        self.state = FrameState::Executing;
        let mut failures = Vec::new();
        let mut executed = 0;
        let mut error = None;

        for position in 0..self.compiled.pass_count() {
            let pass_index = self.compiled.pass_order()[position];

            if let Some(token) = &self.cancellation {
                if token.is_cancelled() {
                    error = Some(FrameGraphError::Cancelled(format!(
                        "cancelled before pass '{}'",
                        self.passes[pass_index].name()
                    )));
                    break;
                }
            }

            self.activate(position);
            let resources = self.resolved_resources(pass_index);
            let name = self.passes[pass_index].name().to_string();
            self.record(CaptureEvent::PassPrepared {
                pass: name.clone(),
                position,
            });

            let pass = &mut self.passes[pass_index];
            let (outcome, abort_request) = match pass.callback.as_mut() {
                Some(callback) => {
                    let mut ctx =
                        PassContext::new(backend, &pass.access.name, self.frame_index, position, resources);
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| callback(&mut ctx)))
                        .unwrap_or_else(|payload| Err(PassError::Panicked(panic_message(payload))));
                    (outcome, ctx.take_abort())
                }
                None => (Ok(()), None),
            };

            match outcome {
                Ok(()) => {
                    executed += 1;
                    log::trace!("Executed pass '{}'", name);
                    self.record(CaptureEvent::PassExecuted {
                        pass: name.clone(),
                        position,
                    });
                }
                Err(err) => {
                    log::error!("Pass '{}' failed: {}", name, err);
                    self.record(CaptureEvent::PassFailed {
                        pass: name.clone(),
                        error: err.to_string(),
                    });
                    failures.push(PassFailure {
                        pass: name.clone(),
                        error: err.clone(),
                    });
                    if self.policy == FailurePolicy::Abort {
                        error = Some(FrameGraphError::Execution {
                            pass: name.clone(),
                            source: err,
                        });
                    }
                }
            }

            self.release_after(position);

            if error.is_some() {
                break;
            }
            if let Some(reason) = abort_request {
                error = Some(FrameGraphError::Cancelled(format!(
                    "pass '{}' requested abort: {}",
                    name, reason
                )));
                break;
            }
        }

        self.finish(error, failures, executed)
    }

    /// Stop the frame without running any pass.
    pub fn abort(mut self, reason: impl Into<String>) -> FrameGraphResult {
        self.finish(Some(FrameGraphError::Cancelled(reason.into())), Vec::new(), 0)
    }

    fn activate(&mut self, position: usize) {
        let mut map = self.map.lock();
        for &slot in &self.first_use[position] {
            let Some(object) = self.bindings[slot] else {
                continue;
            };
            if let Err(err) = map.activate(object) {
                log::error!("Failed to activate {}: {}", object, err);
            }
            self.tickets[slot] = TicketState::Active;
            self.record(CaptureEvent::ResourceAcquired {
                ticket: self.resources[slot].ticket.to_string(),
                object,
            });
        }
    }

    fn release_after(&mut self, position: usize) {
        let mut map = self.map.lock();
        for &slot in &self.last_use[position] {
            let Some(object) = self.bindings[slot] else {
                continue;
            };
            if self.tickets[slot] != TicketState::Active {
                continue;
            }
            if let Err(err) = map.release(object) {
                log::error!("Failed to release {}: {}", object, err);
            }
            self.tickets[slot] = TicketState::Released;
            self.record(CaptureEvent::ResourceReleased {
                ticket: self.resources[slot].ticket.to_string(),
                object,
            });
        }
    }

    fn resolved_resources(&self, pass_index: usize) -> Vec<ResolvedResource> {
        let map = self.map.lock();
        self.passes[pass_index]
            .ticket_accesses()
            .into_iter()
            .filter_map(|(ticket, access)| {
                let object = self.bindings[ticket.slot()]?;
                let physical = map.get(object)?;
                Some(ResolvedResource {
                    ticket,
                    object,
                    handle: physical.handle(),
                    shape: physical.shape().clone(),
                    access,
                })
            })
            .collect()
    }

    // Return everything still bound. Active tickets left over after a completed
    // frame are leaks; after an abort their consumers simply never ran.
    fn force_release(&mut self, completed: bool) {
        let mut map = self.map.lock();
        for slot in 0..self.bindings.len() {
            let Some(object) = self.bindings[slot] else {
                continue;
            };
            let result = match self.tickets[slot] {
                TicketState::Reserved => map.unreserve(object),
                TicketState::Active => {
                    let ticket = self.resources[slot].ticket.to_string();
                    if completed {
                        log::warn!("Ticket {} still bound to {} at frame end", ticket, object);
                        self.warnings.push(FrameWarning::Leak {
                            ticket: ticket.clone(),
                            object,
                        });
                    } else {
                        log::warn!("Ticket {} force-released from {} after abort", ticket, object);
                        self.warnings.push(FrameWarning::ForceReleased {
                            ticket: ticket.clone(),
                            object,
                        });
                    }
                    self.record(CaptureEvent::ResourceForceReleased { ticket, object });
                    map.release(object)
                }
                TicketState::Unbound | TicketState::Released => continue,
            };
            if let Err(err) = result {
                log::error!("Failed to force-release {}: {}", object, err);
            }
            self.tickets[slot] = TicketState::Released;
        }
    }

    fn finish(
        &mut self,
        error: Option<FrameGraphError>,
        pass_failures: Vec<PassFailure>,
        executed: usize,
    ) -> FrameGraphResult {
        let completed = error.is_none();
        self.force_release(completed);

        if let Some(err) = &error {
            self.state = FrameState::Aborted;
            log::error!("Frame {} aborted: {}", self.frame_index, err);
            self.record(CaptureEvent::FrameAborted {
                generation: self.generation,
                reason: err.to_string(),
            });
        } else {
            self.state = FrameState::Completed;
            log::debug!(
                "Frame {} completed: {} of {} passes executed",
                self.frame_index,
                executed,
                self.passes.len()
            );
            self.record(CaptureEvent::FrameCompleted {
                generation: self.generation,
                executed,
            });
        }
        self.passes.clear();

        FrameGraphResult {
            state: self.state,
            error,
            pass_failures,
            warnings: std::mem::take(&mut self.warnings),
            executed,
        }
    }

    fn record(&self, event: CaptureEvent) {
        if let Some(capture) = &self.capture {
            capture.lock().record(event);
        }
    }
}

impl<C> Drop for ExecutableFrameGraph<C> {
    fn drop(&mut self) {
        if matches!(self.state, FrameState::Completed | FrameState::Aborted) {
            return;
        }
        log::debug!("Dropping frame {} before execution", self.frame_index);
        self.force_release(false);
        self.state = FrameState::Aborted;
        self.record(CaptureEvent::FrameAborted {
            generation: self.generation,
            reason: "dropped before execution".to_string(),
        });
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
