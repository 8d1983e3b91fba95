//! CLIENT_HELLO / SERVER_HELLO payloads. Per spec §4.4/§6 these never
//! appear as a data-stream send; they ride in the fabric connection
//! manager's connect/accept/reject private-data payload (max 16 bytes).

use netfr_support::constants::{MAX_CM_PRIVATE_DATA, WIRE_MAGIC, WIRE_VERSION};
use netfr_support::error::NetfrError;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u8)]
pub enum HelloStatus {
    Ok = 0,
    Error = 1,
    Rejected = 2,
}

impl HelloStatus {
    fn from_u8(value: u8) -> Result<HelloStatus, NetfrError> {
        match value {
            0 => Ok(HelloStatus::Ok),
            1 => Ok(HelloStatus::Error),
            2 => Ok(HelloStatus::Rejected),
            _ => Err(NetfrError::BadMessage { reason: "bad hello status" }),
        }
    }
}

/// CLIENT_HELLO private data: just the magic+version, to confirm both
/// peers agree on the wire format before anything else is exchanged.
pub fn encode_client_hello() -> [u8; MAX_CM_PRIVATE_DATA] {
    let mut buf = [0u8; MAX_CM_PRIVATE_DATA];
    buf[..8].copy_from_slice(&WIRE_MAGIC);
    buf[8] = WIRE_VERSION;
    buf
}

pub fn decode_client_hello(data: &[u8]) -> Result<(), NetfrError> {
    if data.len() < 9 {
        return Err(NetfrError::BadMessage { reason: "hello truncated" });
    }
    if data[..8] != WIRE_MAGIC {
        return Err(NetfrError::BadMessage { reason: "hello magic mismatch" });
    }
    if data[8] != WIRE_VERSION {
        return Err(NetfrError::BadMessage { reason: "hello version mismatch" });
    }
    Ok(())
}

/// SERVER_HELLO private data: a single status byte.
pub fn encode_server_hello(status: HelloStatus) -> [u8; MAX_CM_PRIVATE_DATA] {
    let mut buf = [0u8; MAX_CM_PRIVATE_DATA];
    buf[0] = status as u8;
    buf
}

pub fn decode_server_hello(data: &[u8]) -> Result<HelloStatus, NetfrError> {
    if data.is_empty() {
        return Err(NetfrError::BadMessage { reason: "hello truncated" });
    }
    HelloStatus::from_u8(data[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_hello_roundtrip() {
        let encoded = encode_client_hello();
        decode_client_hello(&encoded).unwrap();
    }

    #[test]
    fn client_hello_rejects_bad_magic() {
        let mut encoded = encode_client_hello();
        encoded[0] = b'X';
        assert!(decode_client_hello(&encoded).is_err());
    }

    #[test]
    fn server_hello_roundtrip() {
        for status in [HelloStatus::Ok, HelloStatus::Error, HelloStatus::Rejected] {
            let encoded = encode_server_hello(status);
            assert_eq!(decode_server_hello(&encoded).unwrap(), status);
        }
    }
}
