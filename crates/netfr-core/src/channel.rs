//! Ties the Context/Slot Manager, the two memory registries, the
//! connection state machine, and the dual serial counters into the single
//! per-channel object the Transfer Engine and Receive Dispatcher operate
//! on. One [`Channel`] exists per element of `N_CHANNELS`; the two
//! channels of a session never share state, matching spec §3's "fully
//! isolated" requirement.
//!
//! `Channel` is deliberately `!Sync`: like the teacher's `net::channel::Channel`,
//! all access happens from the single thread driving `process()`. A
//! debug-only re-entrancy guard stands in for the mutex a multi-threaded
//! caller would need, since the fabric here never calls back into us from
//! another thread.

use crate::connection::{ClientConnection, HostAcceptor};
use crate::context::ContextPool;
use crate::region::RegionRegistry;
use crate::remote::RemoteMemoryRegistry;
use crate::slot::SlotArena;
use netfr_fabric::{ConnId, FabricProvider};
use netfr_support::constants::CREDIT_INIT;
use slog::Logger;
use std::cell::Cell;
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Role {
    Host,
    Client,
}

/// A `CLIENT_DATA`/`HOST_DATA` message whose RX context is parked in
/// `HAS_DATA`, buffered here until `dispatch::select_event` extracts it and
/// posts the ack (spec §4.7).
#[derive(Debug, Clone)]
pub struct PendingData {
    pub context_id: usize,
    pub msg_serial: u32,
    pub channel_serial: u32,
    pub payload: Vec<u8>,
}

/// A high-level, already-decoded event the transfer engine or dispatcher
/// wants the owning Host/Client API to see.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    Connected,
    ConnectFailed,
    Disconnected,
    DataReceived { channel_serial: u32, data: Vec<u8> },
    BufferLanded { index: usize, offset: u32, len: u32, write_serial: u32, channel_serial: u32 },
    RegionPublished { index: usize },
}

pub struct Channel<P: FabricProvider> {
    pub provider: P,
    pub role: Role,
    pub conn: Option<ConnId>,
    pub client_conn: ClientConnection,
    pub host_acceptor: HostAcceptor,
    pub contexts: ContextPool,
    pub arena: SlotArena,
    pub regions: RegionRegistry,
    pub remote_regions: RemoteMemoryRegistry,
    /// Tx context id of an in-flight `BUFFER_STATE` send -> the local region
    /// index it announces, consumed by `dispatch` on that send's own
    /// completion to drive `RegionRegistry::confirm_available`.
    pub pending_publishes: HashMap<usize, usize>,
    /// Rx context id -> a `CLIENT_DATA`/`HOST_DATA` message that landed but
    /// has not yet been selected as an event.
    pub pending_data: HashMap<usize, PendingData>,
    /// Connection-lifecycle events queued by `dispatch::drain` for
    /// `api::process_one` to hand out one at a time.
    pub(crate) pending_immediate: VecDeque<ChannelEvent>,
    pub tx_credits: u32,
    pub msg_serial: u32,
    pub channel_serial: u32,
    pub logger: Logger,
    in_process: Cell<bool>,
}

impl<P: FabricProvider> Channel<P> {
    pub fn new(provider: P, role: Role, logger: Logger) -> Channel<P> {
        Channel {
            provider,
            role,
            conn: None,
            client_conn: ClientConnection::new(),
            host_acceptor: HostAcceptor::new(),
            contexts: ContextPool::new(),
            arena: SlotArena::new(),
            regions: RegionRegistry::new(),
            remote_regions: RemoteMemoryRegistry::new(),
            pending_publishes: HashMap::new(),
            pending_data: HashMap::new(),
            pending_immediate: VecDeque::new(),
            tx_credits: CREDIT_INIT,
            msg_serial: 0,
            channel_serial: 0,
            logger,
            in_process: Cell::new(false),
        }
    }

    /// Panics on re-entrant `process()` calls in debug builds, the way the
    /// teacher documents (rather than enforces at runtime cost) that
    /// `Channel` is driven from one thread at a time.
    pub(crate) fn guard_reentrancy(&self) -> ReentrancyGuard {
        debug_assert!(!self.in_process.get(), "Channel::process is not re-entrant");
        self.in_process.set(true);
        ReentrancyGuard { flag: &self.in_process as *const Cell<bool> }
    }

    pub fn next_msg_serial(&mut self) -> u32 {
        let serial = self.msg_serial;
        self.msg_serial = self.msg_serial.wrapping_add(1);
        serial
    }

    pub fn next_channel_serial(&mut self) -> u32 {
        let serial = self.channel_serial;
        self.channel_serial = self.channel_serial.wrapping_add(1);
        serial
    }

    pub fn has_send_credit(&self) -> bool {
        self.tx_credits > 0
    }

    pub fn consume_credit(&mut self) {
        self.tx_credits = self.tx_credits.saturating_sub(1);
    }

    pub fn restore_credit(&mut self) {
        self.tx_credits = (self.tx_credits + 1).min(CREDIT_INIT);
    }

    pub fn is_connected(&self) -> bool {
        match self.role {
            Role::Client => self.client_conn.is_connected(),
            Role::Host => self.conn.is_some(),
        }
    }
}

pub(crate) struct ReentrancyGuard {
    flag: *const Cell<bool>,
}

impl Drop for ReentrancyGuard {
    fn drop(&mut self) {
        // SAFETY: `flag` points at the `in_process` field of the `Channel`
        // that created this guard, which outlives the guard itself.
        unsafe {
            (*self.flag).set(false);
        }
    }
}
