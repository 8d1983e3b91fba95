//! Context/Slot Manager (spec component C): a fixed pool of 128 contexts —
//! 60 TX, 60 RX, 6 WRITE, 2 ACK — each bound 1:1 to a slot in the
//! [`crate::slot::SlotArena`]. Every context carries a state per spec §3:
//! `AVAILABLE` while free, `ALLOCATED` once checked out, `WAITING` once its
//! operation is posted to the fabric, `HAS_DATA` for an RX context holding a
//! message the consumer has not yet extracted, and `CANCELED` for a context
//! rolled back before it was ever posted. `ACK_ONLY` contexts are the
//! exception: per spec §4.3 they are never freed — `reset` never returns
//! them to `AVAILABLE` — so they are shared round-robin instead of pooled.

use netfr_support::constants::{ACK_CONTEXTS, RX_CONTEXTS, TOTAL_CONTEXTS, TX_CONTEXTS, WRITE_CONTEXTS};
use netfr_support::error::{NetfrError, NetfrResult};
use std::collections::VecDeque;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ContextClass {
    Tx,
    Rx,
    Write,
    Ack,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ContextState {
    Invalid,
    Available,
    AckOnly,
    Allocated,
    Waiting,
    HasData,
    Canceled,
}

#[derive(Debug, Copy, Clone)]
struct Context {
    class: ContextClass,
    state: ContextState,
}

const TX_BASE: usize = 0;
const RX_BASE: usize = TX_BASE + TX_CONTEXTS;
const WRITE_BASE: usize = RX_BASE + RX_CONTEXTS;
const ACK_BASE: usize = WRITE_BASE + WRITE_CONTEXTS;

fn range_for(class: ContextClass) -> (usize, usize) {
    match class {
        ContextClass::Tx => (TX_BASE, TX_BASE + TX_CONTEXTS),
        ContextClass::Rx => (RX_BASE, RX_BASE + RX_CONTEXTS),
        ContextClass::Write => (WRITE_BASE, WRITE_BASE + WRITE_CONTEXTS),
        ContextClass::Ack => (ACK_BASE, ACK_BASE + ACK_CONTEXTS),
    }
}

pub fn class_of(context_id: usize) -> Option<ContextClass> {
    if context_id < RX_BASE {
        Some(ContextClass::Tx)
    } else if context_id < WRITE_BASE {
        Some(ContextClass::Rx)
    } else if context_id < ACK_BASE {
        Some(ContextClass::Write)
    } else if context_id < TOTAL_CONTEXTS {
        Some(ContextClass::Ack)
    } else {
        None
    }
}

fn slot_index(class: ContextClass) -> usize {
    match class {
        ContextClass::Tx => 0,
        ContextClass::Rx => 1,
        ContextClass::Write => 2,
        ContextClass::Ack => 3,
    }
}

/// Checks contexts in and out by class, tracking each one's state per
/// spec §3/§4.3. The slot bound to a context is always `context_id` itself.
pub struct ContextPool {
    contexts: Vec<Context>,
    free: [VecDeque<usize>; 4],
    next_ack: usize,
}

impl ContextPool {
    pub fn new() -> ContextPool {
        let mut contexts = vec![Context { class: ContextClass::Tx, state: ContextState::Invalid }; TOTAL_CONTEXTS];
        let mut free: [VecDeque<usize>; 4] = Default::default();
        for class in [ContextClass::Tx, ContextClass::Rx, ContextClass::Write, ContextClass::Ack] {
            let (start, end) = range_for(class);
            for id in start..end {
                contexts[id] = Context {
                    class,
                    state: if class == ContextClass::Ack { ContextState::AckOnly } else { ContextState::Available },
                };
            }
            if class != ContextClass::Ack {
                free[slot_index(class)] = (start..end).collect();
            }
        }
        ContextPool { contexts, free, next_ack: ACK_BASE }
    }

    /// Checks out a free context of `class`, transitioning it to `ALLOCATED`.
    /// Never call this with [`ContextClass::Ack`]; acks share
    /// [`Self::acquire_ack`] instead.
    pub fn acquire(&mut self, class: ContextClass) -> NetfrResult<usize> {
        debug_assert_ne!(class, ContextClass::Ack, "ack contexts are never individually acquired");
        let context_id = self.free[slot_index(class)].pop_front().ok_or(NetfrError::NoSpace { required: 1 })?;
        debug_assert!(matches!(self.contexts[context_id].state, ContextState::Available | ContextState::Canceled));
        self.contexts[context_id].state = ContextState::Allocated;
        Ok(context_id)
    }

    /// Hands back one of the two reserved `ACK_ONLY` contexts, round-robin.
    /// Per spec §4.3 these are never freed, so any number of concurrent
    /// zero-payload acks may share them.
    pub fn acquire_ack(&mut self) -> usize {
        let context_id = self.next_ack;
        self.next_ack = ACK_BASE + ((self.next_ack + 1 - ACK_BASE) % ACK_CONTEXTS);
        debug_assert_eq!(self.contexts[context_id].state, ContextState::AckOnly);
        context_id
    }

    /// Marks an allocated context as posted to the fabric, awaiting its
    /// completion event.
    pub fn mark_waiting(&mut self, context_id: usize) -> NetfrResult<()> {
        self.transition(context_id, &[ContextState::Allocated], ContextState::Waiting)
    }

    /// An RX context's recv completed; the payload sits in its slot until
    /// the consumer extracts it. Per spec §4.7 the context stays here
    /// rather than being released on receipt.
    pub fn mark_has_data(&mut self, context_id: usize) -> NetfrResult<()> {
        self.transition(context_id, &[ContextState::Allocated, ContextState::Waiting], ContextState::HasData)
    }

    /// Rolls back a context that was allocated but never posted, e.g.
    /// because a sibling allocation failed. Returns it to `AVAILABLE`
    /// immediately; `ACK_ONLY` contexts cannot be canceled.
    pub fn cancel(&mut self, context_id: usize) -> NetfrResult<()> {
        let class = class_of(context_id).ok_or(NetfrError::BadMessage { reason: "context id out of range" })?;
        if class == ContextClass::Ack {
            return Err(NetfrError::BadMessage { reason: "ack contexts are never canceled" });
        }
        match self.contexts[context_id].state {
            ContextState::Allocated => {
                self.contexts[context_id].state = ContextState::Canceled;
                self.free[slot_index(class)].push_back(context_id);
                Ok(())
            }
            other => Err(bad_state("cancel", other)),
        }
    }

    /// Returns a context to `AVAILABLE` once its owner is done with it
    /// (completion observed, or — for RX — the consumer extracted the
    /// message). `ACK_ONLY` contexts ignore release entirely; they are
    /// never freed.
    pub fn release(&mut self, context_id: usize) -> NetfrResult<()> {
        let class = class_of(context_id).ok_or(NetfrError::BadMessage { reason: "context id out of range" })?;
        if class == ContextClass::Ack {
            return Ok(());
        }
        match self.contexts[context_id].state {
            ContextState::Allocated | ContextState::Waiting | ContextState::HasData => {
                self.contexts[context_id].state = ContextState::Available;
                self.free[slot_index(class)].push_back(context_id);
                Ok(())
            }
            ContextState::Available => Err(NetfrError::BadMessage { reason: "context released twice" }),
            other => Err(bad_state("release", other)),
        }
    }

    pub fn state_of(&self, context_id: usize) -> Option<ContextState> {
        self.contexts.get(context_id).map(|c| c.state)
    }

    pub fn available(&self, class: ContextClass) -> usize {
        if class == ContextClass::Ack {
            ACK_CONTEXTS
        } else {
            self.free[slot_index(class)].len()
        }
    }

    fn transition(&mut self, context_id: usize, from: &[ContextState], to: ContextState) -> NetfrResult<()> {
        let context = self.contexts.get_mut(context_id).ok_or(NetfrError::BadMessage { reason: "context id out of range" })?;
        if from.contains(&context.state) {
            context.state = to;
            Ok(())
        } else {
            Err(bad_state("transition", context.state))
        }
    }
}

fn bad_state(op: &'static str, from: ContextState) -> NetfrError {
    let _ = (op, from);
    NetfrError::BadMessage { reason: "invalid context state transition" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_sizes_match_spec_constants() {
        let pool = ContextPool::new();
        assert_eq!(pool.available(ContextClass::Tx), TX_CONTEXTS);
        assert_eq!(pool.available(ContextClass::Rx), RX_CONTEXTS);
        assert_eq!(pool.available(ContextClass::Write), WRITE_CONTEXTS);
        assert_eq!(pool.available(ContextClass::Ack), ACK_CONTEXTS);
    }

    #[test]
    fn acquire_exhausts_then_release_replenishes() {
        let mut pool = ContextPool::new();
        let mut taken = Vec::new();
        for _ in 0..WRITE_CONTEXTS {
            taken.push(pool.acquire(ContextClass::Write).unwrap());
        }
        assert!(pool.acquire(ContextClass::Write).is_err());
        pool.release(taken.pop().unwrap()).unwrap();
        assert!(pool.acquire(ContextClass::Write).is_ok());
    }

    #[test]
    fn class_of_matches_ranges() {
        assert_eq!(class_of(0), Some(ContextClass::Tx));
        assert_eq!(class_of(TX_CONTEXTS), Some(ContextClass::Rx));
        assert_eq!(class_of(RX_BASE + RX_CONTEXTS), Some(ContextClass::Write));
        assert_eq!(class_of(ACK_BASE), Some(ContextClass::Ack));
        assert_eq!(class_of(TOTAL_CONTEXTS), None);
    }

    #[test]
    fn double_release_is_rejected() {
        let mut pool = ContextPool::new();
        let id = pool.acquire(ContextClass::Tx).unwrap();
        pool.release(id).unwrap();
        assert!(pool.release(id).is_err());
    }

    #[test]
    fn ack_contexts_are_never_freed() {
        let mut pool = ContextPool::new();
        let first = pool.acquire_ack();
        let second = pool.acquire_ack();
        let third = pool.acquire_ack();
        assert_ne!(first, second);
        assert_eq!(first, third, "only ACK_CONTEXTS distinct ids exist; round-robin wraps");
        assert!(pool.release(first).is_ok(), "releasing an ack context is a no-op, not an error");
        assert_eq!(pool.state_of(first), Some(ContextState::AckOnly));
    }

    #[test]
    fn rx_context_stays_checked_out_through_has_data() {
        let mut pool = ContextPool::new();
        let id = pool.acquire(ContextClass::Rx).unwrap();
        pool.mark_waiting(id).unwrap();
        pool.mark_has_data(id).unwrap();
        assert_eq!(pool.state_of(id), Some(ContextState::HasData));
        assert!(pool.acquire(ContextClass::Rx).is_ok(), "the other 59 RX contexts remain free");
        pool.release(id).unwrap();
        assert_eq!(pool.state_of(id), Some(ContextState::Available));
    }

    #[test]
    fn cancel_rolls_back_an_unposted_allocation() {
        let mut pool = ContextPool::new();
        let before = pool.available(ContextClass::Write);
        let id = pool.acquire(ContextClass::Write).unwrap();
        assert_eq!(pool.available(ContextClass::Write), before - 1);
        pool.cancel(id).unwrap();
        assert_eq!(pool.available(ContextClass::Write), before);
        assert!(pool.acquire(ContextClass::Write).is_ok());
    }
}
