//! Connection State Machine (spec component F), one instance per channel.
//!
//! Client side: `None -> ReadyToConnect -> Connecting -> Connected -> Disconnected`.
//! Host side additionally enforces the "exactly one client per channel"
//! invariant — a second `ConnRequest` while already connected is rejected
//! rather than queued.

use netfr_support::error::{NetfrError, NetfrResult};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ConnectionState {
    None,
    ReadyToConnect,
    Connecting,
    Connected,
    Disconnected,
}

pub struct ClientConnection {
    state: ConnectionState,
}

impl ClientConnection {
    pub fn new() -> ClientConnection {
        ClientConnection { state: ConnectionState::None }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn ready(&mut self) -> NetfrResult<()> {
        match self.state {
            ConnectionState::None | ConnectionState::Disconnected => {
                self.state = ConnectionState::ReadyToConnect;
                Ok(())
            }
            other => Err(bad_transition(other)),
        }
    }

    pub fn begin_connecting(&mut self) -> NetfrResult<()> {
        match self.state {
            ConnectionState::ReadyToConnect => {
                self.state = ConnectionState::Connecting;
                Ok(())
            }
            other => Err(bad_transition(other)),
        }
    }

    pub fn mark_connected(&mut self) -> NetfrResult<()> {
        match self.state {
            ConnectionState::Connecting => {
                self.state = ConnectionState::Connected;
                Ok(())
            }
            other => Err(bad_transition(other)),
        }
    }

    pub fn mark_disconnected(&mut self) {
        self.state = ConnectionState::Disconnected;
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }
}

/// Host-side acceptor for a single channel's listening socket. Tracks
/// whether a client currently occupies the channel so a second connection
/// request is rejected instead of displacing the first.
pub struct HostAcceptor {
    occupied: bool,
}

impl HostAcceptor {
    pub fn new() -> HostAcceptor {
        HostAcceptor { occupied: false }
    }

    pub fn is_occupied(&self) -> bool {
        self.occupied
    }

    /// Call when a `ConnRequest` arrives. `Ok(true)` means accept it,
    /// `Ok(false)` means a peer is already connected and it must be
    /// rejected.
    pub fn offer(&mut self) -> bool {
        if self.occupied {
            false
        } else {
            self.occupied = true;
            true
        }
    }

    pub fn release(&mut self) {
        self.occupied = false;
    }
}

fn bad_transition(from: ConnectionState) -> NetfrError {
    let _ = from;
    NetfrError::NotConnected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_happy_path() {
        let mut conn = ClientConnection::new();
        conn.ready().unwrap();
        conn.begin_connecting().unwrap();
        conn.mark_connected().unwrap();
        assert!(conn.is_connected());
        conn.mark_disconnected();
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        conn.ready().unwrap();
        assert_eq!(conn.state(), ConnectionState::ReadyToConnect);
    }

    #[test]
    fn cannot_skip_connecting() {
        let mut conn = ClientConnection::new();
        assert!(conn.begin_connecting().is_err());
    }

    #[test]
    fn host_rejects_second_client() {
        let mut acceptor = HostAcceptor::new();
        assert!(acceptor.offer());
        assert!(!acceptor.offer());
        acceptor.release();
        assert!(acceptor.offer());
    }
}
