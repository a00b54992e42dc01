//! Ticket resolution.
//!
//! Resolution walks the compiled pass order and replays every ticket's
//! lifetime against the object map: a ticket acquires an object just before
//! its first pass and hands it back after its last consumer, so later tickets
//! can reuse memory released earlier in the same frame. Reuse within a frame
//! never reshapes an object another ticket is bound to. Once every ticket is
//! bound, the objects are released again and reserved instead; execution
//! turns each reservation back into a reference at the same points.

use std::collections::HashMap;

use crate::compiler::CompiledGraph;
use crate::error::{BackendError, FrameGraphError, SpecificAcquireError};
use crate::pool::{ObjectId, RenderObjectMap};
use crate::resource::{ResourceDef, ResourceTicket};

use super::result::FrameWarning;

/// A ticket together with its definition.
#[derive(Debug, Clone)]
pub(crate) struct DeclaredResource {
    pub ticket: ResourceTicket,
    pub def: ResourceDef,
}

pub(crate) struct Resolution {
    pub bindings: Vec<Option<ObjectId>>,
    pub warnings: Vec<FrameWarning>,
}

/// Per-position ticket slots: those first used at a position, and those whose
/// last consumer runs there.
pub(crate) fn schedule(compiled: &CompiledGraph) -> (Vec<Vec<usize>>, Vec<Vec<usize>>) {
    let mut first_use = vec![Vec::new(); compiled.pass_count()];
    let mut last_use = vec![Vec::new(); compiled.pass_count()];
    for (slot, lifetime) in compiled.lifetimes().iter().enumerate() {
        let Some(lifetime) = lifetime else {
            continue;
        };
        first_use[lifetime.first_use].push(slot);
        if let Some(last) = lifetime.last_consumer {
            last_use[last].push(slot);
        }
    }
    (first_use, last_use)
}

struct Resolver<'a> {
    map: &'a mut RenderObjectMap,
    resources: &'a [DeclaredResource],
    bindings: Vec<Option<ObjectId>>,
    held: Vec<bool>,
    // Objects bound through an explicit identity stay held until the end so
    // every ticket naming the same identity lands on the same object.
    pinned: Vec<bool>,
    named: HashMap<ObjectId, ObjectId>,
    warnings: Vec<FrameWarning>,
}

/// Bind every used ticket to an object and reserve it.
///
/// On failure every reference taken so far is dropped again, leaving the map
/// as it was apart from newly created objects, which stay pooled.
pub(crate) fn resolve(
    map: &mut RenderObjectMap,
    resources: &[DeclaredResource],
    compiled: &CompiledGraph,
) -> Result<Resolution, FrameGraphError> {
    let (first_use, last_use) = schedule(compiled);
    let mut resolver = Resolver {
        map,
        resources,
        bindings: vec![None; resources.len()],
        held: vec![false; resources.len()],
        pinned: vec![false; resources.len()],
        named: HashMap::new(),
        warnings: Vec::new(),
    };

    for position in 0..compiled.pass_count() {
        for &slot in &first_use[position] {
            if let Err(source) = resolver.bind(slot) {
                resolver.release_held();
                let ticket = resources[slot].ticket.to_string();
                log::error!("Failed to resolve ticket {}: {}", ticket, source);
                return Err(FrameGraphError::Resolution { ticket, source });
            }
        }
        for &slot in &last_use[position] {
            if !resolver.pinned[slot] {
                resolver.release(slot);
            }
        }
    }
    resolver.release_held();

    for object in resolver.bindings.iter().flatten() {
        if let Err(err) = resolver.map.reserve(*object) {
            log::error!("Failed to reserve {}: {}", object, err);
        }
    }

    Ok(Resolution {
        bindings: resolver.bindings,
        warnings: resolver.warnings,
    })
}

impl Resolver<'_> {
    fn bind(&mut self, slot: usize) -> Result<(), BackendError> {
        let resources = self.resources;
        let DeclaredResource { ticket, def } = &resources[slot];

        if let Some(identity) = def.identity {
            let specific = match self.named.get(&identity).copied() {
                Some(object) => self.alias(object, def),
                None => self.map.acquire_specific(identity, def),
            };
            match specific {
                Ok(object) => {
                    self.named.entry(identity).or_insert(object);
                    return self.hold(slot, object, true);
                }
                Err(reason) => {
                    log::warn!(
                        "Ticket {} could not reuse {}: {}; acquiring a pooled object",
                        ticket,
                        identity,
                        reason
                    );
                    self.warnings.push(FrameWarning::SpecificAcquireFallback {
                        ticket: ticket.to_string(),
                        requested: identity,
                        reason,
                    });
                }
            }
        }

        // An object already bound earlier in this frame keeps its shape until
        // the frame ends, so it may only be reused on an exact match.
        let bindings = &self.bindings;
        let object = self
            .map
            .acquire_reshaping(def, |object| !bindings.contains(&Some(object)))?;
        self.hold(slot, object, false)
    }

    /// Share an object already bound through the same identity in this build.
    fn alias(&mut self, object: ObjectId, def: &ResourceDef) -> Result<ObjectId, SpecificAcquireError> {
        let compatible = self
            .map
            .get(object)
            .map_or(false, |existing| existing.shape().is_compatible(&def.shape));
        if !compatible {
            return Err(SpecificAcquireError::Incompatible(object));
        }
        // Pinned objects stay referenced until resolution ends.
        self.map
            .retain(object)
            .map_err(|_| SpecificAcquireError::Unknown(object))?;
        Ok(object)
    }

    fn hold(&mut self, slot: usize, object: ObjectId, pinned: bool) -> Result<(), BackendError> {
        log::trace!("Bound {} to {}", self.resources[slot].ticket, object);
        self.bindings[slot] = Some(object);
        self.held[slot] = true;
        self.pinned[slot] = pinned;
        Ok(())
    }

    fn release(&mut self, slot: usize) {
        if !self.held[slot] {
            return;
        }
        self.held[slot] = false;
        if let Some(object) = self.bindings[slot] {
            if let Err(err) = self.map.release(object) {
                log::error!("Failed to release {}: {}", object, err);
            }
        }
    }

    fn release_held(&mut self) {
        for slot in 0..self.held.len() {
            self.release(slot);
        }
    }
}
