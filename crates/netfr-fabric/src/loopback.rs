//! In-process [`FabricProvider`] pair, used by integration tests and demo
//! binaries that want a deterministic host/client pair without opening a
//! real socket. Modeled after the teacher's preference for testing
//! `net::channel::Channel` logic against an in-memory `Cursor` rather than a
//! live `TcpStream` wherever the logic under test doesn't care which one it
//! is.

use crate::{CqError, CqEvent, ConnId, EqEvent, FabricProvider, MemoryRegion, RemoteAddr};
use netfr_support::error::{NetfrError, NetfrResult};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Side {
    Host,
    Client,
}

impl Side {
    fn other(self) -> Side {
        match self {
            Side::Host => Side::Client,
            Side::Client => Side::Host,
        }
    }

    fn index(self) -> usize {
        match self {
            Side::Host => 0,
            Side::Client => 1,
        }
    }
}

#[derive(Default)]
struct PerSide {
    eq: VecDeque<EqEvent>,
    cq: VecDeque<CqEvent>,
    pending_recv: VecDeque<(u64, usize)>,
    backlog: VecDeque<Vec<u8>>,
}

struct Shared {
    sides: [PerSide; 2],
    regions: HashMap<u64, Vec<u8>>,
    next_addr: u64,
    next_conn: ConnId,
    listening: bool,
}

impl Shared {
    fn new() -> Shared {
        Shared {
            sides: [PerSide::default(), PerSide::default()],
            regions: HashMap::new(),
            next_addr: 1,
            next_conn: 1,
            listening: false,
        }
    }
}

/// One endpoint of an in-process loopback connection. Construct a
/// connected pair with [`pair`].
pub struct LoopbackProvider {
    side: Side,
    shared: Arc<Mutex<Shared>>,
}

/// Builds a host/client pair sharing one in-process "wire". Each represents
/// a single channel; callers needing the spec's two isolated channels
/// construct two independent pairs.
pub fn pair() -> (LoopbackProvider, LoopbackProvider) {
    let shared = Arc::new(Mutex::new(Shared::new()));
    (
        LoopbackProvider { side: Side::Host, shared: shared.clone() },
        LoopbackProvider { side: Side::Client, shared },
    )
}

impl LoopbackProvider {
    fn resolve_region<'a>(regions: &'a mut HashMap<u64, Vec<u8>>, addr: u64) -> Option<(&'a mut Vec<u8>, usize)> {
        for (&base, buf) in regions.iter_mut() {
            if addr >= base && (addr - base) as usize <= buf.len() {
                let offset = (addr - base) as usize;
                return Some((buf, offset));
            }
        }
        None
    }
}

impl FabricProvider for LoopbackProvider {
    fn open_fabric(&mut self) -> NetfrResult<()> {
        Ok(())
    }

    fn register_memory(&mut self, len: usize) -> NetfrResult<MemoryRegion> {
        let mut shared = self.shared.lock().unwrap();
        let addr = shared.next_addr;
        shared.next_addr += len as u64 + 1;
        shared.regions.insert(addr, vec![0u8; len]);
        Ok(MemoryRegion { addr, rkey: addr, len })
    }

    fn passive_listen(&mut self, _addr: &str) -> NetfrResult<()> {
        let mut shared = self.shared.lock().unwrap();
        shared.listening = true;
        Ok(())
    }

    fn connect(&mut self, _addr: &str, private_data: &[u8]) -> NetfrResult<ConnId> {
        let mut shared = self.shared.lock().unwrap();
        if !shared.listening {
            return Err(NetfrError::ConnRefused);
        }
        let conn = shared.next_conn;
        shared.next_conn += 1;
        shared.sides[self.side.other().index()].eq.push_back(EqEvent::ConnRequest {
            conn,
            private_data: private_data.to_vec(),
        });
        Ok(conn)
    }

    fn accept(&mut self, conn: ConnId, private_data: &[u8]) -> NetfrResult<()> {
        let mut shared = self.shared.lock().unwrap();
        shared.sides[self.side.other().index()].eq.push_back(EqEvent::Connected {
            conn,
            private_data: private_data.to_vec(),
        });
        Ok(())
    }

    fn reject(&mut self, conn: ConnId, private_data: &[u8]) -> NetfrResult<()> {
        let mut shared = self.shared.lock().unwrap();
        shared.sides[self.side.other().index()].eq.push_back(EqEvent::Rejected {
            conn,
            private_data: private_data.to_vec(),
        });
        Ok(())
    }

    fn eq_read(&mut self) -> NetfrResult<Option<EqEvent>> {
        let mut shared = self.shared.lock().unwrap();
        Ok(shared.sides[self.side.index()].eq.pop_front())
    }

    fn post_send(&mut self, conn: ConnId, context_id: u64, data: &[u8]) -> NetfrResult<()> {
        let mut shared = self.shared.lock().unwrap();
        deliver(&mut shared, self.side.other(), conn, data);
        shared.sides[self.side.index()].cq.push_back(CqEvent::Send { conn, context_id });
        Ok(())
    }

    fn post_recv(&mut self, conn: ConnId, context_id: u64, max_len: usize) -> NetfrResult<()> {
        let mut shared = self.shared.lock().unwrap();
        let side = &mut shared.sides[self.side.index()];
        if let Some(data) = side.backlog.pop_front() {
            let len = data.len().min(max_len);
            side.cq.push_back(CqEvent::Recv { conn, context_id, data: data[..len].to_vec() });
        } else {
            side.pending_recv.push_back((context_id, max_len));
        }
        Ok(())
    }

    fn post_write(&mut self, conn: ConnId, context_id: u64, data: &[u8], remote: RemoteAddr) -> NetfrResult<()> {
        let mut shared = self.shared.lock().unwrap();
        match Self::resolve_region(&mut shared.regions, remote.addr) {
            Some((buf, offset)) => {
                if offset + data.len() > buf.len() {
                    return Err(NetfrError::BadMessage { reason: "write exceeds remote region" });
                }
                buf[offset..offset + data.len()].copy_from_slice(data);
            }
            None => return Err(NetfrError::BadMessage { reason: "unknown remote region" }),
        }
        shared.sides[self.side.index()].cq.push_back(CqEvent::Write { conn, context_id });
        Ok(())
    }

    fn post_inject(&mut self, conn: ConnId, data: &[u8]) -> NetfrResult<()> {
        let mut shared = self.shared.lock().unwrap();
        deliver(&mut shared, self.side.other(), conn, data);
        Ok(())
    }

    fn cq_read(&mut self) -> NetfrResult<Option<CqEvent>> {
        let mut shared = self.shared.lock().unwrap();
        Ok(shared.sides[self.side.index()].cq.pop_front())
    }

    fn cq_read_err(&mut self) -> NetfrResult<Option<CqError>> {
        Ok(None)
    }

    fn region_read(&mut self, region: MemoryRegion, offset: usize, len: usize) -> NetfrResult<Vec<u8>> {
        let shared = self.shared.lock().unwrap();
        match shared.regions.get(&region.addr) {
            Some(buf) if offset + len <= buf.len() => Ok(buf[offset..offset + len].to_vec()),
            Some(_) => Err(NetfrError::BadMessage { reason: "region_read out of bounds" }),
            None => Err(NetfrError::BadMessage { reason: "unknown region" }),
        }
    }
}

fn deliver(shared: &mut Shared, dest: Side, conn: ConnId, data: &[u8]) {
    let side = &mut shared.sides[dest.index()];
    if let Some((context_id, max_len)) = side.pending_recv.pop_front() {
        let len = data.len().min(max_len);
        side.cq.push_back(CqEvent::Recv { conn, context_id, data: data[..len].to_vec() });
    } else {
        side.backlog.push_back(data.to_vec());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_accept_handshake() {
        let (mut host, mut client) = pair();
        host.passive_listen("loopback").unwrap();
        let conn = client.connect("loopback", b"hello").unwrap();

        match host.eq_read().unwrap() {
            Some(EqEvent::ConnRequest { private_data, .. }) => assert_eq!(private_data, b"hello"),
            other => panic!("unexpected {:?}", other),
        }
        host.accept(conn, b"ok").unwrap();
        match client.eq_read().unwrap() {
            Some(EqEvent::Connected { private_data, .. }) => assert_eq!(private_data, b"ok"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn send_recv_roundtrip() {
        let (mut host, mut client) = pair();
        host.passive_listen("loopback").unwrap();
        let conn = client.connect("loopback", b"").unwrap();
        host.eq_read().unwrap();
        host.accept(conn, b"").unwrap();
        client.eq_read().unwrap();

        client.post_recv(conn, 9, 64).unwrap();
        host.post_send(conn, 1, b"payload").unwrap();

        match client.cq_read().unwrap() {
            Some(CqEvent::Recv { context_id, data, .. }) => {
                assert_eq!(context_id, 9);
                assert_eq!(data, b"payload");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(host.cq_read().unwrap().is_some(), true);
    }

    #[test]
    fn one_sided_write_lands_without_remote_completion() {
        let (mut host, mut client) = pair();
        host.passive_listen("loopback").unwrap();
        let conn = client.connect("loopback", b"").unwrap();
        host.eq_read().unwrap();
        host.accept(conn, b"").unwrap();
        client.eq_read().unwrap();

        let region = client.register_memory(16).unwrap();
        host.post_write(conn, 3, b"abcd", RemoteAddr { addr: region.addr, rkey: region.rkey }).unwrap();

        assert!(client.cq_read().unwrap().is_none());
        match host.cq_read().unwrap() {
            Some(CqEvent::Write { context_id, .. }) => assert_eq!(context_id, 3),
            other => panic!("unexpected {:?}", other),
        }
        let landed = client.region_read(region, 0, 4).unwrap();
        assert_eq!(landed, b"abcd");
    }
}
