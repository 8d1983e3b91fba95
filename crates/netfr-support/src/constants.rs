//! Wire and slot geometry constants, per spec §6.

/// Number of independent channels each peer owns (primary, secondary).
pub const N_CHANNELS: usize = 2;

/// Size in bytes of a single communication-buffer slot.
pub const SLOT_SIZE: usize = 4096;

/// Length of the per-slot preamble (`msgSerial:u32`, `channelSerial:u32`).
pub const SLOT_PREAMBLE_SIZE: usize = 8;

/// Largest payload a CLIENT_DATA/HOST_DATA message may carry.
pub const MAX_PAYLOAD: usize = SLOT_SIZE - 32;

/// Largest fully-framed message the fabric will accept as an inline
/// `INJECT` send rather than a context-backed `SEND`. Chosen well under
/// typical provider inline-data limits (e.g. libfabric's `inject_size`).
pub const INLINE_MAX: usize = 256;

/// Payloads are padded up to this alignment before being hand off to the fabric layer.
pub const PAYLOAD_ALIGNMENT: usize = 16;

/// Context partition sizes.
pub const TX_CONTEXTS: usize = 60;
pub const RX_CONTEXTS: usize = 60;
pub const WRITE_CONTEXTS: usize = 6;
pub const ACK_CONTEXTS: usize = 2;
pub const TOTAL_CONTEXTS: usize = TX_CONTEXTS + RX_CONTEXTS + WRITE_CONTEXTS + ACK_CONTEXTS;

/// Memory region registry size, per channel.
pub const M_REGIONS: usize = 32;

/// Maximum size of a single RDMA-registrable buffer.
pub const MAX_RDMA_BUFFER: usize = 256 * 1024 * 1024;

/// Initial value of a channel's `txCredits` counter. Not pinned by the spec
/// text; chosen equal to the TX partition size since credits gate the same
/// class of operation a TX context ultimately backs. See DESIGN.md.
pub const CREDIT_INIT: u32 = TX_CONTEXTS as u32;

/// Credit floor below which a user-initiated send is refused.
pub const RESERVED_CREDITS: u32 = 8;

/// Bounded retry count for memory-registration key collisions.
pub const MAX_RKEY_RETRIES: u32 = 8;

/// Maximum connection-manager private-data payload (HELLO handshake).
pub const MAX_CM_PRIVATE_DATA: usize = 16;

/// Wire magic, protocol version.
pub const WIRE_MAGIC: [u8; 8] = *b"NetFrame";
pub const WIRE_VERSION: u8 = 1;

/// Header size: magic(8) + version(1) + type(1).
pub const HEADER_SIZE: usize = 10;
