use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use netfr_support::constants::{HEADER_SIZE, WIRE_MAGIC, WIRE_VERSION};
use netfr_support::error::NetfrError;
use std::io::{self, Read, Write};

/// Message types carried on the data-channel wire, after the handshake.
/// HELLO variants are deliberately absent: per spec §4.4/§6 they travel
/// only in the connection manager's private-data payload, never as a send
/// on the data stream.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u8)]
pub enum MessageType {
    BufferState = 0,
    BufferUpdate = 1,
    ClientData = 2,
    ClientDataAck = 3,
    HostData = 4,
    HostDataAck = 5,
}

impl MessageType {
    const MAX_VALUE: u8 = MessageType::HostDataAck as u8;

    fn from_u8(value: u8) -> Option<MessageType> {
        match value {
            0 => Some(MessageType::BufferState),
            1 => Some(MessageType::BufferUpdate),
            2 => Some(MessageType::ClientData),
            3 => Some(MessageType::ClientDataAck),
            4 => Some(MessageType::HostData),
            5 => Some(MessageType::HostDataAck),
            _ => None,
        }
    }
}

/// The fixed 10-byte header prefixing every message: `{magic[8], version, type}`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Header {
    pub msg_type: MessageType,
}

impl Header {
    pub const SIZE: usize = HEADER_SIZE;

    #[inline]
    pub fn new(msg_type: MessageType) -> Header {
        Header { msg_type }
    }

    pub fn write<W: Write>(&self, mut w: W) -> io::Result<()> {
        w.write_all(&WIRE_MAGIC)?;
        w.write_u8(WIRE_VERSION)?;
        w.write_u8(self.msg_type as u8)
    }

    /// Reads and validates a header. Rejects mismatched magic, version, or
    /// an out-of-range type, per spec §4.4's `verify_header`.
    pub fn read<R: Read>(mut r: R) -> Result<Header, NetfrError> {
        let mut magic = [0u8; 8];
        r.read_exact(&mut magic)?;
        if magic != WIRE_MAGIC {
            return Err(NetfrError::BadMessage { reason: "magic mismatch" });
        }

        let version = r.read_u8()?;
        if version != WIRE_VERSION {
            return Err(NetfrError::BadMessage { reason: "version mismatch" });
        }

        let raw_type = r.read_u8()?;
        if raw_type > MessageType::MAX_VALUE {
            return Err(NetfrError::BadMessage { reason: "type out of range" });
        }

        let msg_type = MessageType::from_u8(raw_type).expect("validated above");

        Ok(Header { msg_type })
    }
}

/// Round-trip a little-endian `u64` purely so call sites that need one
/// don't all have to depend on `byteorder` themselves.
#[inline]
pub fn write_u64<W: Write>(w: &mut W, value: u64) -> io::Result<()> {
    w.write_u64::<LittleEndian>(value)
}

#[inline]
pub fn read_u64<R: Read>(r: &mut R) -> io::Result<u64> {
    r.read_u64::<LittleEndian>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn header_roundtrip() {
        let header = Header::new(MessageType::BufferUpdate);
        let mut buf = Vec::new();
        header.write(&mut buf).unwrap();
        assert_eq!(buf.len(), Header::SIZE);

        let decoded = Header::read(Cursor::new(&buf[..])).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut buf = vec![0u8; Header::SIZE];
        buf[0] = b'X';
        let err = Header::read(Cursor::new(&buf[..])).unwrap_err();
        assert_eq!(err, NetfrError::BadMessage { reason: "magic mismatch" });
    }

    #[test]
    fn rejects_bad_version() {
        let mut buf = Vec::new();
        Header::new(MessageType::ClientData).write(&mut buf).unwrap();
        buf[8] = 99;
        let err = Header::read(Cursor::new(&buf[..])).unwrap_err();
        assert_eq!(err, NetfrError::BadMessage { reason: "version mismatch" });
    }

    #[test]
    fn rejects_bad_type() {
        let mut buf = Vec::new();
        Header::new(MessageType::ClientData).write(&mut buf).unwrap();
        let last = buf.len() - 1;
        buf[last] = 200;
        let err = Header::read(Cursor::new(&buf[..])).unwrap_err();
        assert_eq!(err, NetfrError::BadMessage { reason: "type out of range" });
    }
}
