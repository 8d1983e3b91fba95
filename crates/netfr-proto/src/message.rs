use crate::header::MessageType;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use netfr_support::constants::{MAX_PAYLOAD, PAYLOAD_ALIGNMENT};
use netfr_support::error::NetfrError;
use std::io::{self, Read, Write};

#[inline]
const fn align_up(size: usize) -> usize {
    (size + PAYLOAD_ALIGNMENT - 1) / PAYLOAD_ALIGNMENT * PAYLOAD_ALIGNMENT
}

/// `BUFFER_STATE` (client → host): publishes, updates, or revokes (size ==
/// 0) a region's address/size/rkey in the host's remote-memory registry.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct BufferState {
    pub page_size: u32,
    pub addr: u64,
    pub size: u64,
    pub rkey: u64,
    pub index: u8,
}

impl BufferState {
    const WIRE_SIZE: usize = 4 + 8 + 8 + 8 + 1;
    pub const PADDED_SIZE: usize = align_up(Self::WIRE_SIZE);

    pub fn write<W: Write>(&self, mut w: W) -> io::Result<()> {
        w.write_u32::<LittleEndian>(self.page_size)?;
        w.write_u64::<LittleEndian>(self.addr)?;
        w.write_u64::<LittleEndian>(self.size)?;
        w.write_u64::<LittleEndian>(self.rkey)?;
        w.write_u8(self.index)?;
        write_padding(&mut w, Self::WIRE_SIZE)
    }

    pub fn read<R: Read>(mut r: R) -> Result<BufferState, NetfrError> {
        Ok(BufferState {
            page_size: r.read_u32::<LittleEndian>()?,
            addr: r.read_u64::<LittleEndian>()?,
            size: r.read_u64::<LittleEndian>()?,
            rkey: r.read_u64::<LittleEndian>()?,
            index: r.read_u8()?,
        })
    }
}

/// `BUFFER_UPDATE` (host → client): the follow-up to a one-sided write,
/// announcing where the data landed and under which serials.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct BufferUpdate {
    pub index: u8,
    pub payload_size: u32,
    pub payload_offset: u32,
    pub write_serial: u32,
    pub channel_serial: u32,
}

impl BufferUpdate {
    const WIRE_SIZE: usize = 1 + 4 + 4 + 4 + 4;
    pub const PADDED_SIZE: usize = align_up(Self::WIRE_SIZE);

    pub fn write<W: Write>(&self, mut w: W) -> io::Result<()> {
        w.write_u8(self.index)?;
        w.write_u32::<LittleEndian>(self.payload_size)?;
        w.write_u32::<LittleEndian>(self.payload_offset)?;
        w.write_u32::<LittleEndian>(self.write_serial)?;
        w.write_u32::<LittleEndian>(self.channel_serial)?;
        write_padding(&mut w, Self::WIRE_SIZE)
    }

    pub fn read<R: Read>(mut r: R) -> Result<BufferUpdate, NetfrError> {
        Ok(BufferUpdate {
            index: r.read_u8()?,
            payload_size: r.read_u32::<LittleEndian>()?,
            payload_offset: r.read_u32::<LittleEndian>()?,
            write_serial: r.read_u32::<LittleEndian>()?,
            channel_serial: r.read_u32::<LittleEndian>()?,
        })
    }
}

/// Fixed header preceding the variable-length body of `CLIENT_DATA` /
/// `HOST_DATA`. The body itself is copied in/out of the slot directly by
/// the caller (`netfr-core`'s transfer engine) rather than routed through
/// this struct, so a `MAX_PAYLOAD`-sized buffer is never allocated twice.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct DataHeader {
    pub length: u32,
    pub msg_serial: u32,
    pub channel_serial: u32,
}

impl DataHeader {
    const WIRE_SIZE: usize = 4 + 4 + 4 + 4; // length, msgSerial, channelSerial, pad

    pub fn write<W: Write>(&self, mut w: W) -> Result<(), NetfrError> {
        if self.length == 0 || self.length as usize > MAX_PAYLOAD {
            return Err(NetfrError::BadMessage { reason: "data length out of range" });
        }
        w.write_u32::<LittleEndian>(self.length)?;
        w.write_u32::<LittleEndian>(self.msg_serial)?;
        w.write_u32::<LittleEndian>(self.channel_serial)?;
        w.write_u32::<LittleEndian>(0)?; // explicit pad field
        Ok(())
    }

    pub fn read<R: Read>(mut r: R) -> Result<DataHeader, NetfrError> {
        let length = r.read_u32::<LittleEndian>()?;
        let msg_serial = r.read_u32::<LittleEndian>()?;
        let channel_serial = r.read_u32::<LittleEndian>()?;
        let _pad = r.read_u32::<LittleEndian>()?;

        if length == 0 || length as usize > MAX_PAYLOAD {
            return Err(NetfrError::BadMessage { reason: "data length out of range" });
        }

        Ok(DataHeader {
            length,
            msg_serial,
            channel_serial,
        })
    }

    pub const SIZE: usize = Self::WIRE_SIZE;
}

fn write_padding<W: Write>(w: &mut W, written: usize) -> io::Result<()> {
    let padded = align_up(written);
    let zeros = [0u8; PAYLOAD_ALIGNMENT];
    w.write_all(&zeros[..padded - written])
}

/// Any message this protocol can carry, used by the dispatcher to branch
/// after peeking the header's type byte. `ClientDataAck`/`HostDataAck` have
/// no body beyond the header.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Message {
    BufferState(BufferState),
    BufferUpdate(BufferUpdate),
    ClientData(DataHeader),
    ClientDataAck,
    HostData(DataHeader),
    HostDataAck,
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::BufferState(_) => MessageType::BufferState,
            Message::BufferUpdate(_) => MessageType::BufferUpdate,
            Message::ClientData(_) => MessageType::ClientData,
            Message::ClientDataAck => MessageType::ClientDataAck,
            Message::HostData(_) => MessageType::HostData,
            Message::HostDataAck => MessageType::HostDataAck,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn buffer_state_roundtrip_and_padding() {
        let msg = BufferState {
            page_size: 4096,
            addr: 0xdead_beef,
            size: 128 * 1024 * 1024,
            rkey: 42,
            index: 3,
        };
        let mut buf = Vec::new();
        msg.write(&mut buf).unwrap();
        assert_eq!(buf.len(), BufferState::PADDED_SIZE);
        assert_eq!(buf.len() % PAYLOAD_ALIGNMENT, 0);

        let decoded = BufferState::read(Cursor::new(&buf[..BufferState::WIRE_SIZE])).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn buffer_update_roundtrip() {
        let msg = BufferUpdate {
            index: 1,
            payload_size: 128 * 1024 * 1024,
            payload_offset: 0,
            write_serial: 7,
            channel_serial: 8,
        };
        let mut buf = Vec::new();
        msg.write(&mut buf).unwrap();
        assert_eq!(buf.len() % PAYLOAD_ALIGNMENT, 0);
        let decoded = BufferUpdate::read(Cursor::new(&buf[..BufferUpdate::WIRE_SIZE])).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn data_header_rejects_oversized_length() {
        let header = DataHeader {
            length: (MAX_PAYLOAD + 1) as u32,
            msg_serial: 0,
            channel_serial: 0,
        };
        let mut buf = Vec::new();
        assert!(header.write(&mut buf).is_err());
    }

    #[test]
    fn data_header_rejects_zero_length() {
        let header = DataHeader {
            length: 0,
            msg_serial: 0,
            channel_serial: 0,
        };
        assert!(header.write(&mut Vec::new()).is_err());
    }

    #[test]
    fn data_header_roundtrip() {
        let header = DataHeader {
            length: 12,
            msg_serial: 5,
            channel_serial: 6,
        };
        let mut buf = Vec::new();
        header.write(&mut buf).unwrap();
        assert_eq!(buf.len(), DataHeader::SIZE);
        let decoded = DataHeader::read(Cursor::new(&buf[..])).unwrap();
        assert_eq!(decoded, header);
    }
}
