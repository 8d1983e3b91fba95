//! Fabric Provider abstraction (spec component A).
//!
//! Real RDMA verbs (`libfabric`/`ibverbs`) are out of scope for this
//! workspace, so every operation the upper layers need from a fabric —
//! memory registration, connection management, one-sided writes, send/recv,
//! completion polling — is captured here as a trait. [`loopback`] backs it
//! with an in-process channel pair for deterministic tests; [`tcp`] backs it
//! with a `mio`-driven TCP stream that emulates a one-sided write by
//! tagging the payload with its destination region/offset in-band, the way
//! the teacher's `net::endpoint::Endpoint` drives a `mio::net::TcpListener`
//! through server/handshake/live polls.

pub mod loopback;
pub mod tcp;

use netfr_support::error::NetfrResult;

pub type ConnId = u32;

/// A fabric-side memory registration handle. `addr`/`rkey` are opaque to
/// callers; they only round-trip them through `BUFFER_STATE` so the peer
/// can target this region with a one-sided write.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct MemoryRegion {
    pub addr: u64,
    pub rkey: u64,
    pub len: usize,
}

/// A remote region descriptor, as published by the peer in `BUFFER_STATE`.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct RemoteAddr {
    pub addr: u64,
    pub rkey: u64,
}

/// Connection-manager events, read from `eq_read`.
#[derive(Debug, Clone)]
pub enum EqEvent {
    ConnRequest { conn: ConnId, private_data: Vec<u8> },
    Connected { conn: ConnId, private_data: Vec<u8> },
    Rejected { conn: ConnId, private_data: Vec<u8> },
    Disconnected { conn: ConnId },
}

/// Completion events, read from `cq_read`. `Recv` carries the bytes that
/// landed rather than a raw pointer, so the trait stays fully safe; the
/// caller copies them into its own slot storage.
#[derive(Debug, Clone)]
pub enum CqEvent {
    Send { conn: ConnId, context_id: u64 },
    Recv { conn: ConnId, context_id: u64, data: Vec<u8> },
    Write { conn: ConnId, context_id: u64 },
}

#[derive(Debug, Clone)]
pub struct CqError {
    pub conn: ConnId,
    pub context_id: u64,
    pub error: netfr_support::error::NetfrError,
}

/// Everything the upper layers need from a transport capable of one-sided
/// writes plus a credit-gated send/recv channel. Every method is
/// non-blocking: absence of an event is `Ok(None)`, not an error.
pub trait FabricProvider {
    fn open_fabric(&mut self) -> NetfrResult<()>;

    /// Registers a fresh, provider-owned buffer of `len` bytes for one-sided
    /// access and returns its address/key handle.
    fn register_memory(&mut self, len: usize) -> NetfrResult<MemoryRegion>;

    fn passive_listen(&mut self, addr: &str) -> NetfrResult<()>;

    /// Initiates a connection, carrying `private_data` (the CLIENT_HELLO).
    fn connect(&mut self, addr: &str, private_data: &[u8]) -> NetfrResult<ConnId>;

    fn accept(&mut self, conn: ConnId, private_data: &[u8]) -> NetfrResult<()>;

    fn reject(&mut self, conn: ConnId, private_data: &[u8]) -> NetfrResult<()>;

    fn eq_read(&mut self) -> NetfrResult<Option<EqEvent>>;

    fn post_send(&mut self, conn: ConnId, context_id: u64, data: &[u8]) -> NetfrResult<()>;

    /// Reserves `context_id` to complete when up to `max_len` bytes arrive.
    fn post_recv(&mut self, conn: ConnId, context_id: u64, max_len: usize) -> NetfrResult<()>;

    /// One-sided write of `data` into the peer's `remote` region. Completes
    /// locally (`CqEvent::Write`) once the bytes have left; the peer is not
    /// notified by the fabric itself — that is `BUFFER_UPDATE`'s job, sent
    /// afterwards over the ordinary send path.
    fn post_write(&mut self, conn: ConnId, context_id: u64, data: &[u8], remote: RemoteAddr) -> NetfrResult<()>;

    fn post_inject(&mut self, conn: ConnId, data: &[u8]) -> NetfrResult<()>;

    fn cq_read(&mut self) -> NetfrResult<Option<CqEvent>>;

    fn cq_read_err(&mut self) -> NetfrResult<Option<CqError>>;

    /// Reads back the current contents of one of *this side's own*
    /// registered regions. Real RDMA needs no such call — the remote write
    /// lands directly in the registered memory via DMA — but our providers
    /// keep registered regions inside themselves rather than aliasing a
    /// caller-owned slice, so the owner fetches the freshly-landed bytes
    /// through the provider instead of a shared pointer.
    fn region_read(&mut self, region: MemoryRegion, offset: usize, len: usize) -> NetfrResult<Vec<u8>>;
}
