//! Shared peer-facing operations (spec §4.8), generic over [`Role`] since
//! the dispatcher already treats `BUFFER_STATE`/`BUFFER_UPDATE` and the
//! data/ack pair symmetrically — whichever side calls
//! [`attach_memory`]/[`write_buffer`] owns that half of the bulk channel.
//! `netfr-host` and `netfr-client` each wrap this with the connection
//! setup (`passive_listen`+`accept` vs `connect`) their role needs.

use crate::channel::{Channel, ChannelEvent};
use crate::transfer;
use netfr_fabric::FabricProvider;
use netfr_support::error::{NetfrError, NetfrResult};

pub const DEFAULT_PAGE_SIZE: u32 = 4096;

/// Registers a local buffer and announces it to the peer so a later
/// `write_buffer` call on their side can target it. Returns the local
/// region index, used to correlate `BufferLanded` events and `read_data`
/// calls.
pub fn attach_memory<P: FabricProvider>(channel: &mut Channel<P>, size: usize) -> NetfrResult<usize> {
    let region = channel.provider.register_memory(size)?;
    let index = channel.regions.reserve(region.addr, region.rkey, size)?;
    channel.regions.mark_unsynced(index)?;
    transfer::publish_region(channel, index, region.addr, region.rkey, size, DEFAULT_PAGE_SIZE)?;
    Ok(index)
}

/// One-sided write of `data` into whichever of the peer's published
/// regions has room.
pub fn write_buffer<P: FabricProvider>(channel: &mut Channel<P>, data: &[u8]) -> NetfrResult<()> {
    transfer::write_buffer(channel, data)
}

/// Reads back bytes that landed in one of this side's own attached
/// regions, after a [`ChannelEvent::BufferLanded`] names it.
pub fn read_data<P: FabricProvider>(channel: &mut Channel<P>, index: usize, offset: u32, len: u32) -> NetfrResult<Vec<u8>> {
    let region = channel.regions.get(index).ok_or(NetfrError::BadMessage { reason: "unknown region index" })?;
    let provider_region = netfr_fabric::MemoryRegion { addr: region.addr, rkey: region.rkey, len: region.size };
    let bytes = channel.provider.region_read(provider_region, offset as usize, len as usize)?;
    channel.regions.mark_has_data_consumed(index)?;
    Ok(bytes)
}

/// Sends a credit-gated message on the low-latency channel. Returns
/// [`NetfrError::Again`] if no send credit is currently available.
pub fn send_data<P: FabricProvider>(channel: &mut Channel<P>, payload: &[u8]) -> NetfrResult<()> {
    transfer::send_data(channel, payload)
}

/// Implements spec §4.8's single-event `client_process`/`host_process`
/// algorithm: drains any ready connection-manager/completion events, then
/// returns at most one application-visible event, oldest-first and
/// wrap-safe, across both connection-lifecycle events and pending
/// data/landed-write events.
pub fn process_one<P: FabricProvider>(channel: &mut Channel<P>) -> NetfrResult<Option<ChannelEvent>> {
    for event in crate::dispatch::drain(channel)? {
        channel.pending_immediate.push_back(event);
    }
    if let Some(event) = channel.pending_immediate.pop_front() {
        return Ok(Some(event));
    }
    crate::dispatch::select_event(channel)
}

/// Drains every currently available event into a batch. Built on top of
/// [`process_one`] so the single-event contract spec §4.8 mandates stays
/// the one source of truth; this just loops it for callers that want a
/// whole round's worth at once.
pub fn process<P: FabricProvider>(channel: &mut Channel<P>) -> NetfrResult<Vec<ChannelEvent>> {
    let mut events = Vec::new();
    while let Some(event) = process_one(channel)? {
        events.push(event);
    }
    Ok(events)
}
