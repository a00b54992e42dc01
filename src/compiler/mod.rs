//! Frame graph compilation.
//!
//! Turns the passes declared in a build into an execution plan
//! ([`CompiledGraph`]): a pass order that honours every resource dependency,
//! plus the span of that order during which each ticket must stay alive.
//!
//! # Ordering rules
//!
//! For every ticket `T`:
//!
//! 1. Every writer of `T` (creators count as writers) runs before every reader.
//! 2. The creator of `T` runs before every other pass that touches `T`.
//! 3. Every writer of `T` runs before every pass that references `T`.
//!
//! Passes that are not ordered by these rules keep their submission order:
//! the topological sort always picks the ready pass that was added first.
//!
//! A pass that both reads and writes `T` while another pass does the same
//! forms a cycle. Declare a new ticket for each version of the resource
//! instead.

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap};

use crate::error::DeclarationError;
use crate::resource::ResourceTicket;

/// How a pass touches its tickets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassAccess {
    pub name: String,
    pub reads: Vec<ResourceTicket>,
    pub writes: Vec<ResourceTicket>,
    pub creates: Vec<ResourceTicket>,
    pub refs: Vec<ResourceTicket>,
}

impl AsRef<PassAccess> for PassAccess {
    fn as_ref(&self) -> &PassAccess {
        self
    }
}

impl PassAccess {
    /// Every ticket the pass touches, possibly with repeats.
    pub fn tickets(&self) -> impl Iterator<Item = &ResourceTicket> {
        self.reads
            .iter()
            .chain(&self.writes)
            .chain(&self.creates)
            .chain(&self.refs)
    }
}

/// Span of the pass order during which a ticket is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TicketLifetime {
    /// Position of the first pass touching the ticket.
    pub first_use: usize,
    /// Position of the last reader or referencer, if any.
    pub last_consumer: Option<usize>,
}

impl TicketLifetime {
    /// Whether the ticket is still bound while the pass at `position` runs.
    pub fn is_live_at(&self, position: usize) -> bool {
        position >= self.first_use && self.last_consumer.map_or(true, |last| position <= last)
    }
}

/// A compiled frame graph ready for resolution and execution.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CompiledGraph {
    order: Vec<usize>,
    lifetimes: Vec<Option<TicketLifetime>>,
}

impl CompiledGraph {
    /// Pass indices (submission order) in execution order.
    pub fn pass_order(&self) -> &[usize] {
        &self.order
    }

    pub fn pass_count(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Lifetime of every declared ticket; `None` when no pass uses it.
    pub fn lifetimes(&self) -> &[Option<TicketLifetime>] {
        &self.lifetimes
    }

    pub fn lifetime(&self, slot: usize) -> Option<TicketLifetime> {
        self.lifetimes.get(slot).copied().flatten()
    }
}

/// Compile the passes of a build with `ticket_count` declared tickets.
///
/// Fails with [`DeclarationError::UnknownTicket`] when a pass names a ticket
/// index outside the build.
pub fn compile<P: AsRef<PassAccess>>(
    passes: &[P],
    ticket_count: usize,
) -> Result<CompiledGraph, DeclarationError> {
    let passes: Vec<&PassAccess> = passes.iter().map(AsRef::as_ref).collect();
    let passes = passes.as_slice();
    if let Some(ticket) = passes
        .iter()
        .flat_map(|access| access.tickets())
        .find(|ticket| ticket.slot() >= ticket_count)
    {
        return Err(DeclarationError::UnknownTicket {
            index: ticket.index(),
            declared: ticket_count as u32,
        });
    }
    let successors = dependency_edges(passes, ticket_count);
    let order = topological_order(passes, &successors)?;
    let lifetimes = ticket_lifetimes(passes, &order, ticket_count);
    Ok(CompiledGraph { order, lifetimes })
}

#[derive(Default)]
struct TicketUsers {
    writers: BTreeSet<usize>,
    creator: Option<usize>,
    readers: BTreeSet<usize>,
    refs: BTreeSet<usize>,
    users: BTreeSet<usize>,
}

fn dependency_edges(passes: &[&PassAccess], ticket_count: usize) -> Vec<BTreeSet<usize>> {
    let mut users: Vec<TicketUsers> = (0..ticket_count).map(|_| TicketUsers::default()).collect();
    for (pass, access) in passes.iter().enumerate() {
        for ticket in &access.creates {
            let entry = &mut users[ticket.slot()];
            entry.creator = Some(pass);
            entry.writers.insert(pass);
        }
        for ticket in &access.writes {
            users[ticket.slot()].writers.insert(pass);
        }
        for ticket in &access.reads {
            users[ticket.slot()].readers.insert(pass);
        }
        for ticket in &access.refs {
            users[ticket.slot()].refs.insert(pass);
        }
        for ticket in access.tickets() {
            users[ticket.slot()].users.insert(pass);
        }
    }

    let mut successors = vec![BTreeSet::new(); passes.len()];
    for ticket in &users {
        for &writer in &ticket.writers {
            for &consumer in ticket.readers.iter().chain(&ticket.refs) {
                if writer != consumer {
                    successors[writer].insert(consumer);
                }
            }
        }
        if let Some(creator) = ticket.creator {
            for &user in &ticket.users {
                if user != creator {
                    successors[creator].insert(user);
                }
            }
        }
    }
    successors
}

// Kahn's algorithm with a min-heap on submission index, so independent
// passes keep the order they were added in.
fn topological_order(
    passes: &[&PassAccess],
    successors: &[BTreeSet<usize>],
) -> Result<Vec<usize>, DeclarationError> {
    let n = passes.len();
    let mut in_degree = vec![0usize; n];
    for targets in successors {
        for &target in targets {
            in_degree[target] += 1;
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = (0..n)
        .filter(|&pass| in_degree[pass] == 0)
        .map(Reverse)
        .collect();
    let mut order = Vec::with_capacity(n);

    while let Some(Reverse(pass)) = ready.pop() {
        order.push(pass);
        for &next in &successors[pass] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.push(Reverse(next));
            }
        }
    }

    if order.len() != n {
        let passes = find_cycle(passes, successors, &in_degree);
        log::error!("Cyclic dependency between passes: {}", passes.join(" -> "));
        return Err(DeclarationError::CyclicDependency { passes });
    }
    Ok(order)
}

// Every pass left with a non-zero in-degree has an unprocessed predecessor,
// so walking predecessors from any of them must revisit a pass.
fn find_cycle(passes: &[&PassAccess], successors: &[BTreeSet<usize>], in_degree: &[usize]) -> Vec<String> {
    let pending = |pass: usize| in_degree[pass] > 0;
    let predecessor = |pass: usize| {
        (0..passes.len()).find(|&from| pending(from) && successors[from].contains(&pass))
    };

    let Some(start) = (0..passes.len()).find(|&pass| pending(pass)) else {
        return Vec::new();
    };

    let mut walk = vec![start];
    let mut current = start;
    let cycle = loop {
        let Some(prev) = predecessor(current) else {
            break Vec::new();
        };
        if let Some(at) = walk.iter().position(|&pass| pass == prev) {
            break walk.split_off(at);
        }
        walk.push(prev);
        current = prev;
    };

    // The walk follows edges backwards; flip it and start at the earliest pass.
    let mut cycle: Vec<usize> = cycle.into_iter().rev().collect();
    if let Some(min_at) = cycle
        .iter()
        .enumerate()
        .min_by_key(|&(_, &pass)| pass)
        .map(|(at, _)| at)
    {
        cycle.rotate_left(min_at);
    }
    if let Some(&first) = cycle.first() {
        cycle.push(first);
    }
    cycle.into_iter().map(|pass| passes[pass].name.clone()).collect()
}

fn ticket_lifetimes(passes: &[&PassAccess], order: &[usize], ticket_count: usize) -> Vec<Option<TicketLifetime>> {
    let mut lifetimes: Vec<Option<TicketLifetime>> = vec![None; ticket_count];
    for (position, &pass) in order.iter().enumerate() {
        let access = passes[pass];
        for ticket in access.tickets() {
            lifetimes[ticket.slot()].get_or_insert(TicketLifetime {
                first_use: position,
                last_consumer: None,
            });
        }
        for ticket in access.reads.iter().chain(&access.refs) {
            if let Some(lifetime) = lifetimes[ticket.slot()].as_mut() {
                lifetime.last_consumer = Some(position);
            }
        }
    }
    lifetimes
}
