//! Receive Dispatcher (spec component G): turns fabric-level
//! connection-manager and completion events into channel state changes,
//! buffering landed writes and inbound messages until `select_event` picks
//! the oldest one to surface as a [`ChannelEvent`].

use crate::channel::{Channel, ChannelEvent, PendingData, Role};
use crate::context::class_of;
use crate::region::LandedWrite;
use crate::transfer;
use netfr_fabric::{CqEvent, EqEvent, FabricProvider};
use netfr_proto::header::{Header, MessageType};
use netfr_proto::hello::{self, HelloStatus};
use netfr_proto::message::{BufferState, BufferUpdate, DataHeader};
use netfr_support::error::{NetfrError, NetfrResult};
use netfr_support::serial;
use slog::{debug, warn};
use std::io::Cursor;

/// Drains every ready connection-manager and completion event once.
/// Connection-lifecycle events are returned immediately; landed writes and
/// inbound messages are only buffered here — [`select_event`] is what turns
/// them into the single oldest-first [`ChannelEvent`] spec §4.8 calls for.
pub fn drain<P: FabricProvider>(channel: &mut Channel<P>) -> NetfrResult<Vec<ChannelEvent>> {
    let _guard = channel.guard_reentrancy();
    let mut events = Vec::new();

    while let Some(eq) = channel.provider.eq_read()? {
        if let Some(event) = handle_eq_event(channel, eq)? {
            events.push(event);
        }
    }

    while let Some(cq) = channel.provider.cq_read()? {
        if let Some(event) = handle_cq_event(channel, cq)? {
            events.push(event);
        }
    }

    while let Some(err) = channel.provider.cq_read_err()? {
        warn!(channel.logger, "fabric completion error"; "context" => err.context_id, "error" => %err.error);
    }

    Ok(events)
}

enum Pick {
    Region(usize),
    Data(usize),
}

/// Picks the single oldest pending data-ish event — a landed write or an
/// unextracted message — across both sources, per spec §4.8 steps 5-7.
/// Picking a message is what "extracts" it: only here does its RX context
/// get released and its ack go out (spec §4.7).
pub fn select_event<P: FabricProvider>(channel: &mut Channel<P>) -> NetfrResult<Option<ChannelEvent>> {
    let region_candidate = channel.regions.oldest_busy().map(|(s, index)| (s, Pick::Region(index)));
    let data_candidate = channel
        .pending_data
        .values()
        .map(|pd| (pd.channel_serial, Pick::Data(pd.context_id)))
        .fold(None, |best, item| serial::older(best, Some(item)));

    match serial::older(region_candidate, data_candidate) {
        None => Ok(None),
        Some((_, Pick::Region(index))) => {
            channel.regions.mark_delivered(index)?;
            let landed = channel
                .regions
                .get(index)
                .and_then(|r| r.landed)
                .ok_or(NetfrError::BadMessage { reason: "delivered region missing landed-write info" })?;
            Ok(Some(ChannelEvent::BufferLanded {
                index,
                offset: landed.offset,
                len: landed.len,
                write_serial: landed.write_serial,
                channel_serial: landed.channel_serial,
            }))
        }
        Some((_, Pick::Data(context_id))) => {
            let pending = channel
                .pending_data
                .remove(&context_id)
                .ok_or(NetfrError::BadMessage { reason: "picked context has no pending message" })?;
            transfer::send_ack(channel)?;
            channel.contexts.release(context_id)?;
            Ok(Some(ChannelEvent::DataReceived { channel_serial: pending.channel_serial, data: pending.payload }))
        }
    }
}

fn handle_eq_event<P: FabricProvider>(channel: &mut Channel<P>, event: EqEvent) -> NetfrResult<Option<ChannelEvent>> {
    match event {
        EqEvent::ConnRequest { conn, private_data } => {
            debug!(channel.logger, "connection request"; "conn" => conn);
            if hello::decode_client_hello(&private_data).is_err() {
                channel.provider.reject(conn, &hello::encode_server_hello(HelloStatus::Error))?;
                return Ok(None);
            }
            if channel.host_acceptor.offer() {
                channel.conn = Some(conn);
                channel.provider.accept(conn, &hello::encode_server_hello(HelloStatus::Ok))?;
                transfer::prime_receives(channel)?;
                Ok(Some(ChannelEvent::Connected))
            } else {
                channel.provider.reject(conn, &hello::encode_server_hello(HelloStatus::Rejected))?;
                Ok(None)
            }
        }
        EqEvent::Connected { private_data, .. } => match hello::decode_server_hello(&private_data)? {
            HelloStatus::Ok => {
                channel.client_conn.mark_connected()?;
                transfer::prime_receives(channel)?;
                Ok(Some(ChannelEvent::Connected))
            }
            HelloStatus::Error | HelloStatus::Rejected => {
                channel.client_conn.mark_disconnected();
                Ok(Some(ChannelEvent::ConnectFailed))
            }
        },
        EqEvent::Rejected { .. } => {
            channel.client_conn.mark_disconnected();
            Ok(Some(ChannelEvent::ConnectFailed))
        }
        EqEvent::Disconnected { .. } => {
            match channel.role {
                Role::Client => channel.client_conn.mark_disconnected(),
                Role::Host => {
                    channel.host_acceptor.release();
                    channel.conn = None;
                }
            }
            Ok(Some(ChannelEvent::Disconnected))
        }
    }
}

fn handle_cq_event<P: FabricProvider>(channel: &mut Channel<P>, event: CqEvent) -> NetfrResult<Option<ChannelEvent>> {
    match event {
        CqEvent::Send { context_id, .. } => {
            let context_id = context_id as usize;
            if let Some(index) = channel.pending_publishes.remove(&context_id) {
                channel.regions.confirm_available(index)?;
            }
            release_context(channel, context_id)?;
            Ok(None)
        }
        CqEvent::Write { context_id, .. } => {
            release_context(channel, context_id as usize)?;
            Ok(None)
        }
        CqEvent::Recv { context_id, data, .. } => {
            let context_id = context_id as usize;
            let (event, keep_context) = handle_recv(channel, context_id, &data)?;
            if !keep_context {
                release_context(channel, context_id)?;
            }
            transfer::prime_receives(channel)?;
            Ok(event)
        }
    }
}

fn release_context<P: FabricProvider>(channel: &mut Channel<P>, context_id: usize) -> NetfrResult<()> {
    if class_of(context_id).is_some() {
        channel.contexts.release(context_id)
    } else {
        Ok(())
    }
}

/// Returns the immediate event (if any) plus whether the RX context must
/// stay checked out. `ClientData`/`HostData` keep their context in
/// `HAS_DATA` until `select_event` extracts the message (spec §4.7); every
/// other message type releases its context right away.
fn handle_recv<P: FabricProvider>(channel: &mut Channel<P>, context_id: usize, data: &[u8]) -> NetfrResult<(Option<ChannelEvent>, bool)> {
    let mut cursor = Cursor::new(data);
    let header = Header::read(&mut cursor)?;

    match header.msg_type {
        MessageType::BufferState => {
            let msg = BufferState::read(&mut cursor)?;
            channel.remote_regions.publish(msg.index as usize, msg.addr, msg.rkey, msg.size as usize)?;
            Ok((Some(ChannelEvent::RegionPublished { index: msg.index as usize }), false))
        }
        MessageType::BufferUpdate => {
            let msg = BufferUpdate::read(&mut cursor)?;
            channel.regions.mark_busy(
                msg.index as usize,
                LandedWrite {
                    offset: msg.payload_offset,
                    len: msg.payload_size,
                    write_serial: msg.write_serial,
                    channel_serial: msg.channel_serial,
                },
            )?;
            Ok((None, false))
        }
        MessageType::ClientData | MessageType::HostData => {
            let expect_client = matches!(header.msg_type, MessageType::ClientData);
            if (channel.role == Role::Host) != expect_client {
                return Err(NetfrError::BadMessage { reason: "data message for the wrong role" });
            }
            let msg = DataHeader::read(&mut cursor)?;
            let start = cursor.position() as usize;
            let end = start + msg.length as usize;
            if end > data.len() {
                return Err(NetfrError::BadMessage { reason: "truncated data message" });
            }
            let payload = data[start..end].to_vec();
            channel.contexts.mark_has_data(context_id)?;
            channel.pending_data.insert(
                context_id,
                PendingData { context_id, msg_serial: msg.msg_serial, channel_serial: msg.channel_serial, payload },
            );
            Ok((None, true))
        }
        MessageType::ClientDataAck | MessageType::HostDataAck => {
            channel.restore_credit();
            Ok((None, false))
        }
    }
}
