//! `mio`-backed [`FabricProvider`]. TCP has no notion of one-sided writes or
//! a connection-manager private-data exchange, so both are emulated over an
//! ordinary byte stream: a small internal frame kind (`Send`/`Write`/
//! `Inject`/`ConnReq`/`Accept`/`Reject`) precedes every payload, and a write
//! frame names the destination region by the address `register_memory`
//! handed out. This mirrors the teacher's `net::endpoint::Endpoint`, which
//! drives a `mio::net::TcpListener` through separate server/handshake/live
//! polls and tracks per-connection read/write buffers in `net::channel`.

use crate::{CqError, CqEvent, ConnId, EqEvent, FabricProvider, MemoryRegion, RemoteAddr};
use byteorder::{BigEndian, WriteBytesExt};
use mio::net::{TcpListener, TcpStream};
use netfr_support::error::{NetfrError, NetfrResult};
use std::collections::{HashMap, VecDeque};
use std::io::{self, Read, Write};
use std::net::SocketAddr;

const TOKEN_LISTENER: mio::Token = mio::Token(0);
const TOKEN_STREAM: mio::Token = mio::Token(1);

const KIND_SEND: u8 = 0;
const KIND_WRITE: u8 = 1;
const KIND_INJECT: u8 = 2;
const KIND_CONN_REQ: u8 = 3;
const KIND_ACCEPT: u8 = 4;
const KIND_REJECT: u8 = 5;

/// The single peer connection this provider is willing to carry, per the
/// spec's one-client-per-channel invariant.
struct Peer {
    stream: TcpStream,
    conn: ConnId,
    out: VecDeque<u8>,
    in_buf: Vec<u8>,
}

pub struct TcpProvider {
    listener: Option<TcpListener>,
    poll: mio::Poll,
    events: mio::Events,
    peer: Option<Peer>,
    next_conn: ConnId,
    regions: HashMap<u64, Vec<u8>>,
    next_addr: u64,
    eq: VecDeque<EqEvent>,
    cq: VecDeque<CqEvent>,
    pending_recv: VecDeque<(u64, usize)>,
    pending_send_ctx: VecDeque<u64>,
    pending_write_ctx: VecDeque<u64>,
    listening: bool,
}

impl TcpProvider {
    pub fn new() -> NetfrResult<TcpProvider> {
        Ok(TcpProvider {
            listener: None,
            poll: mio::Poll::new().map_err(io_to_fatal)?,
            events: mio::Events::with_capacity(256),
            peer: None,
            next_conn: 1,
            regions: HashMap::new(),
            next_addr: 1,
            eq: VecDeque::new(),
            cq: VecDeque::new(),
            pending_recv: VecDeque::new(),
            pending_send_ctx: VecDeque::new(),
            pending_write_ctx: VecDeque::new(),
            listening: false,
        })
    }

    fn queue_frame(peer: &mut Peer, kind: u8, addr: u64, payload: &[u8]) {
        let mut header = Vec::with_capacity(13);
        header.push(kind);
        header.write_u64::<BigEndian>(addr).unwrap();
        header.write_u32::<BigEndian>(payload.len() as u32).unwrap();
        peer.out.extend(header);
        peer.out.extend(payload.iter().copied());
    }

    fn pump_io(&mut self) -> NetfrResult<()> {
        self.poll.poll(&mut self.events, Some(std::time::Duration::from_millis(0))).map_err(io_to_fatal)?;

        if let Some(listener) = &self.listener {
            if self.peer.is_none() {
                if let Ok((stream, _addr)) = listener.accept() {
                    self.poll
                        .register(&stream, TOKEN_STREAM, mio::Ready::readable() | mio::Ready::writable(), mio::PollOpt::edge())
                        .map_err(io_to_fatal)?;
                    let conn = self.next_conn;
                    self.next_conn += 1;
                    self.peer = Some(Peer { stream, conn, out: VecDeque::new(), in_buf: Vec::new() });
                }
            }
        }

        let mut disconnected = false;
        if let Some(peer) = &mut self.peer {
            let mut chunk = [0u8; 65536];
            loop {
                match peer.stream.read(&mut chunk) {
                    Ok(0) => {
                        disconnected = true;
                        break;
                    }
                    Ok(n) => peer.in_buf.extend_from_slice(&chunk[..n]),
                    Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                    Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(_) => {
                        disconnected = true;
                        break;
                    }
                }
            }

            if !peer.out.is_empty() {
                let pending: Vec<u8> = peer.out.iter().copied().collect();
                match peer.stream.write(&pending) {
                    Ok(n) => {
                        peer.out.drain(..n);
                    }
                    Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {}
                    Err(_) => disconnected = true,
                }
            }
        }

        if disconnected {
            if let Some(peer) = self.peer.take() {
                self.eq.push_back(EqEvent::Disconnected { conn: peer.conn });
            }
            return Ok(());
        }

        self.drain_frames()
    }

    fn drain_frames(&mut self) -> NetfrResult<()> {
        loop {
            let frame = match &mut self.peer {
                Some(peer) => match take_frame(&mut peer.in_buf) {
                    Some(f) => f,
                    None => break,
                },
                None => break,
            };

            let conn = self.peer.as_ref().unwrap().conn;
            match frame.kind {
                KIND_CONN_REQ => self.eq.push_back(EqEvent::ConnRequest { conn, private_data: frame.payload }),
                KIND_ACCEPT => self.eq.push_back(EqEvent::Connected { conn, private_data: frame.payload }),
                KIND_REJECT => self.eq.push_back(EqEvent::Rejected { conn, private_data: frame.payload }),
                KIND_SEND | KIND_INJECT => {
                    if let Some((context_id, max_len)) = self.pending_recv.pop_front() {
                        let len = frame.payload.len().min(max_len);
                        self.cq.push_back(CqEvent::Recv { conn, context_id, data: frame.payload[..len].to_vec() });
                    }
                }
                KIND_WRITE => {
                    if let Some((base, buf)) = resolve_region(&mut self.regions, frame.addr) {
                        let offset = (frame.addr - base) as usize;
                        if offset + frame.payload.len() <= buf.len() {
                            buf[offset..offset + frame.payload.len()].copy_from_slice(&frame.payload);
                        }
                    }
                }
                _ => return Err(NetfrError::BadMessage { reason: "unknown fabric frame kind" }),
            }
        }
        Ok(())
    }
}

struct Frame {
    kind: u8,
    addr: u64,
    payload: Vec<u8>,
}

fn take_frame(buf: &mut Vec<u8>) -> Option<Frame> {
    if buf.len() < 13 {
        return None;
    }
    let len = u32::from_be_bytes([buf[9], buf[10], buf[11], buf[12]]) as usize;
    if buf.len() < 13 + len {
        return None;
    }
    let kind = buf[0];
    let addr = u64::from_be_bytes([buf[1], buf[2], buf[3], buf[4], buf[5], buf[6], buf[7], buf[8]]);
    let payload = buf[13..13 + len].to_vec();
    buf.drain(..13 + len);
    Some(Frame { kind, addr, payload })
}

fn resolve_region(regions: &mut HashMap<u64, Vec<u8>>, addr: u64) -> Option<(u64, &mut Vec<u8>)> {
    for (&base, buf) in regions.iter_mut() {
        if addr >= base && (addr - base) as usize <= buf.len() {
            return Some((base, buf));
        }
    }
    None
}

fn io_to_fatal(e: io::Error) -> NetfrError {
    NetfrError::from(e)
}

impl FabricProvider for TcpProvider {
    fn open_fabric(&mut self) -> NetfrResult<()> {
        Ok(())
    }

    fn register_memory(&mut self, len: usize) -> NetfrResult<MemoryRegion> {
        let addr = self.next_addr;
        self.next_addr += len as u64 + 1;
        self.regions.insert(addr, vec![0u8; len]);
        Ok(MemoryRegion { addr, rkey: addr, len })
    }

    fn passive_listen(&mut self, addr: &str) -> NetfrResult<()> {
        let socket_addr: SocketAddr = addr.parse().map_err(NetfrError::from)?;
        let listener = TcpListener::bind(&socket_addr).map_err(io_to_fatal)?;
        self.poll
            .register(&listener, TOKEN_LISTENER, mio::Ready::readable(), mio::PollOpt::edge())
            .map_err(io_to_fatal)?;
        self.listener = Some(listener);
        self.listening = true;
        Ok(())
    }

    fn connect(&mut self, addr: &str, private_data: &[u8]) -> NetfrResult<ConnId> {
        let socket_addr: SocketAddr = addr.parse().map_err(NetfrError::from)?;
        let stream = TcpStream::connect(&socket_addr).map_err(io_to_fatal)?;
        self.poll
            .register(&stream, TOKEN_STREAM, mio::Ready::readable() | mio::Ready::writable(), mio::PollOpt::edge())
            .map_err(io_to_fatal)?;
        let conn = self.next_conn;
        self.next_conn += 1;
        let mut peer = Peer { stream, conn, out: VecDeque::new(), in_buf: Vec::new() };
        Self::queue_frame(&mut peer, KIND_CONN_REQ, 0, private_data);
        self.peer = Some(peer);
        Ok(conn)
    }

    fn accept(&mut self, _conn: ConnId, private_data: &[u8]) -> NetfrResult<()> {
        if let Some(peer) = &mut self.peer {
            Self::queue_frame(peer, KIND_ACCEPT, 0, private_data);
        }
        Ok(())
    }

    fn reject(&mut self, _conn: ConnId, private_data: &[u8]) -> NetfrResult<()> {
        if let Some(peer) = &mut self.peer {
            Self::queue_frame(peer, KIND_REJECT, 0, private_data);
        }
        Ok(())
    }

    fn eq_read(&mut self) -> NetfrResult<Option<EqEvent>> {
        self.pump_io()?;
        Ok(self.eq.pop_front())
    }

    fn post_send(&mut self, _conn: ConnId, context_id: u64, data: &[u8]) -> NetfrResult<()> {
        if let Some(peer) = &mut self.peer {
            Self::queue_frame(peer, KIND_SEND, 0, data);
        }
        self.pending_send_ctx.push_back(context_id);
        Ok(())
    }

    fn post_recv(&mut self, _conn: ConnId, context_id: u64, max_len: usize) -> NetfrResult<()> {
        self.pending_recv.push_back((context_id, max_len));
        Ok(())
    }

    fn post_write(&mut self, _conn: ConnId, context_id: u64, data: &[u8], remote: RemoteAddr) -> NetfrResult<()> {
        if let Some(peer) = &mut self.peer {
            Self::queue_frame(peer, KIND_WRITE, remote.addr, data);
        }
        self.pending_write_ctx.push_back(context_id);
        Ok(())
    }

    fn post_inject(&mut self, _conn: ConnId, data: &[u8]) -> NetfrResult<()> {
        if let Some(peer) = &mut self.peer {
            Self::queue_frame(peer, KIND_INJECT, 0, data);
        }
        Ok(())
    }

    fn cq_read(&mut self) -> NetfrResult<Option<CqEvent>> {
        self.pump_io()?;
        let conn = self.peer.as_ref().map(|p| p.conn).unwrap_or(0);
        if let Some(context_id) = self.pending_send_ctx.pop_front() {
            self.cq.push_back(CqEvent::Send { conn, context_id });
        }
        if let Some(context_id) = self.pending_write_ctx.pop_front() {
            self.cq.push_back(CqEvent::Write { conn, context_id });
        }
        Ok(self.cq.pop_front())
    }

    fn cq_read_err(&mut self) -> NetfrResult<Option<CqError>> {
        Ok(None)
    }

    fn region_read(&mut self, region: MemoryRegion, offset: usize, len: usize) -> NetfrResult<Vec<u8>> {
        match self.regions.get(&region.addr) {
            Some(buf) if offset + len <= buf.len() => Ok(buf[offset..offset + len].to_vec()),
            Some(_) => Err(NetfrError::BadMessage { reason: "region_read out of bounds" }),
            None => Err(NetfrError::BadMessage { reason: "unknown region" }),
        }
    }
}
