//! Transfer Engine (spec component E): turns a `send_data`/`write_buffer`
//! call into posted fabric operations, applying the credit policy and
//! assigning serials the way the teacher's `net::channel::Channel::send`
//! path frames an outgoing payload before handing it to `mio`.

use crate::channel::Channel;
use crate::channel::Role;
use crate::context::ContextClass;
use netfr_fabric::{FabricProvider, RemoteAddr};
use netfr_proto::header::{Header, MessageType};
use netfr_proto::message::{BufferState, BufferUpdate, DataHeader};
use netfr_support::constants::{INLINE_MAX, MAX_PAYLOAD};
use netfr_support::error::{NetfrError, NetfrResult};
use slog::debug;

/// Re-arms every free RX context so inbound sends/injects have somewhere
/// to land. Call once after connecting and again whenever a recv
/// completes.
pub fn prime_receives<P: FabricProvider>(channel: &mut Channel<P>) -> NetfrResult<()> {
    let conn = channel.conn.ok_or(NetfrError::NotConnected)?;
    while let Ok(context_id) = channel.contexts.acquire(ContextClass::Rx) {
        channel.provider.post_recv(conn, context_id as u64, MAX_PAYLOAD)?;
        channel.contexts.mark_waiting(context_id)?;
    }
    Ok(())
}

/// Sends a `CLIENT_DATA`/`HOST_DATA` message. Gated by `tx_credits`;
/// returns [`NetfrError::Again`] when none remain, the caller's cue to
/// retry once an ack restores one. Payloads small enough to fit the
/// fabric's inline threshold go out via `INJECT`, which needs no TX
/// context and completes without a CQ event; everything else falls back
/// to a context-backed `SEND`.
pub fn send_data<P: FabricProvider>(channel: &mut Channel<P>, payload: &[u8]) -> NetfrResult<()> {
    if payload.is_empty() || payload.len() > MAX_PAYLOAD {
        return Err(NetfrError::BadMessage { reason: "payload out of range" });
    }
    if !channel.is_connected() {
        return Err(NetfrError::NotConnected);
    }
    if !channel.has_send_credit() {
        return Err(NetfrError::Again);
    }

    let msg_serial = channel.next_msg_serial();
    let channel_serial = channel.next_channel_serial();
    let msg_type = match channel.role {
        Role::Client => MessageType::ClientData,
        Role::Host => MessageType::HostData,
    };

    let mut buf = Vec::with_capacity(Header::SIZE + DataHeader::SIZE + payload.len());
    Header::new(msg_type).write(&mut buf).map_err(NetfrError::from)?;
    DataHeader { length: payload.len() as u32, msg_serial, channel_serial }.write(&mut buf)?;
    buf.extend_from_slice(payload);

    let conn = channel.conn.ok_or(NetfrError::NotConnected)?;

    if buf.len() <= INLINE_MAX {
        channel.provider.post_inject(conn, &buf)?;
        channel.consume_credit();
        debug!(channel.logger, "posted inline data send"; "msg_serial" => msg_serial, "channel_serial" => channel_serial);
        return Ok(());
    }

    let context_id = channel.contexts.acquire(ContextClass::Tx)?;
    if let Err(err) = channel.provider.post_send(conn, context_id as u64, &buf) {
        channel.contexts.cancel(context_id)?;
        return Err(err);
    }
    channel.contexts.mark_waiting(context_id)?;
    channel.consume_credit();
    debug!(channel.logger, "posted data send"; "msg_serial" => msg_serial, "channel_serial" => channel_serial);
    Ok(())
}

/// Sends the header-only ack for a just-delivered `CLIENT_DATA`/`HOST_DATA`
/// from one of the two shared `ACK_ONLY` contexts.
pub fn send_ack<P: FabricProvider>(channel: &mut Channel<P>) -> NetfrResult<()> {
    let conn = channel.conn.ok_or(NetfrError::NotConnected)?;
    let context_id = channel.contexts.acquire_ack();
    let msg_type = match channel.role {
        Role::Client => MessageType::HostDataAck, // acking data the host sent us
        Role::Host => MessageType::ClientDataAck,
    };
    let mut buf = Vec::with_capacity(Header::SIZE);
    Header::new(msg_type).write(&mut buf).map_err(NetfrError::from)?;
    channel.provider.post_send(conn, context_id as u64, &buf)?;
    Ok(())
}

/// Client-side: announces (or revokes, when `size == 0`) a bulk-transfer
/// region. Control traffic, not gated by `tx_credits`. The region is only
/// moved from `AVAILABLE_UNSYNCED` to `AVAILABLE` once this send's own CQ
/// completion is observed (`dispatch::handle_cq_event`), via
/// `pending_publishes`.
pub fn publish_region<P: FabricProvider>(channel: &mut Channel<P>, index: usize, addr: u64, rkey: u64, size: usize, page_size: u32) -> NetfrResult<()> {
    let conn = channel.conn.ok_or(NetfrError::NotConnected)?;
    let context_id = channel.contexts.acquire(ContextClass::Tx)?;
    let mut buf = Vec::new();
    Header::new(MessageType::BufferState).write(&mut buf).map_err(NetfrError::from)?;
    BufferState { page_size, addr, size: size as u64, rkey, index: index as u8 }.write(&mut buf).map_err(NetfrError::from)?;

    if let Err(err) = channel.provider.post_send(conn, context_id as u64, &buf) {
        channel.contexts.cancel(context_id)?;
        return Err(err);
    }
    channel.contexts.mark_waiting(context_id)?;
    channel.pending_publishes.insert(context_id, index);
    Ok(())
}

/// Host-side: one-sided write of `data` into whichever published remote
/// region has room, immediately followed by the `BUFFER_UPDATE` send that
/// tells the client where the bytes landed. The follow-up send is posted
/// right after the write — not on the write's own CQ completion — relying
/// on the fabric provider's guaranteed send-after-write ordering on a
/// single connection (spec's SAS+SAW rationale); waiting for the
/// completion first would buy nothing and only gives a leaked remote
/// region a longer window to occur in.
///
/// The WRITE context is acquired before any remote region is touched, so
/// exhausting the WRITE partition fails loudly instead of leaving an
/// allocated region stranded.
pub fn write_buffer<P: FabricProvider>(channel: &mut Channel<P>, data: &[u8]) -> NetfrResult<()> {
    if data.is_empty() || data.len() > netfr_support::constants::MAX_RDMA_BUFFER {
        return Err(NetfrError::BadMessage { reason: "write payload out of range" });
    }
    if !channel.is_connected() {
        return Err(NetfrError::NotConnected);
    }
    let conn = channel.conn.ok_or(NetfrError::NotConnected)?;

    let write_context = channel.contexts.acquire(ContextClass::Write)?;

    let index = match channel.remote_regions.find_available(data.len()) {
        Some(index) => index,
        None => {
            channel.contexts.cancel(write_context)?;
            return Err(NetfrError::NoBuffer);
        }
    };

    if let Err(err) = channel.remote_regions.allocate(index) {
        channel.contexts.cancel(write_context)?;
        return Err(err);
    }
    if let Err(err) = channel.remote_regions.mark_busy_local(index) {
        channel.remote_regions.cancel(index)?;
        channel.contexts.cancel(write_context)?;
        return Err(err);
    }

    let region = *channel.remote_regions.get(index).expect("just allocated");

    if let Err(err) = channel.provider.post_write(conn, write_context as u64, data, RemoteAddr { addr: region.addr, rkey: region.rkey }) {
        channel.remote_regions.cancel(index)?;
        channel.contexts.cancel(write_context)?;
        return Err(err);
    }
    channel.contexts.mark_waiting(write_context)?;

    let update_context = match channel.contexts.acquire(ContextClass::Tx) {
        Ok(context_id) => context_id,
        Err(err) => {
            // The write itself is already posted and cannot be unwound; the
            // region stays BusyLocal and the client simply never sees a
            // BUFFER_UPDATE for it until this case is handled by a retry.
            return Err(err);
        }
    };

    channel.remote_regions.mark_busy_remote(index)?;
    let write_serial = channel.next_channel_serial();
    let channel_serial = channel.next_channel_serial();

    let mut buf = Vec::new();
    Header::new(MessageType::BufferUpdate).write(&mut buf).map_err(NetfrError::from)?;
    BufferUpdate { index: index as u8, payload_size: data.len() as u32, payload_offset: 0, write_serial, channel_serial }
        .write(&mut buf)
        .map_err(NetfrError::from)?;

    if let Err(err) = channel.provider.post_send(conn, update_context as u64, &buf) {
        channel.contexts.cancel(update_context)?;
        return Err(err);
    }
    channel.contexts.mark_waiting(update_context)?;
    debug!(channel.logger, "posted write + buffer update"; "index" => index, "channel_serial" => channel_serial);
    Ok(())
}
