//! Communication Buffer: the fixed pool of fixed-size byte slots that every
//! context (spec component C) is bound to 1:1. One contiguous arena backs
//! all of them so it can be registered with the fabric provider as a
//! single region.

use netfr_support::constants::{SLOT_PREAMBLE_SIZE, SLOT_SIZE, TOTAL_CONTEXTS};

/// Backing storage for every context's slot. Index `i` occupies
/// `[i * SLOT_SIZE, (i + 1) * SLOT_SIZE)`.
pub struct SlotArena {
    bytes: Vec<u8>,
}

impl SlotArena {
    pub fn new() -> SlotArena {
        SlotArena { bytes: vec![0u8; TOTAL_CONTEXTS * SLOT_SIZE] }
    }

    pub fn total_len(&self) -> usize {
        self.bytes.len()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// The fabric-facing preamble plus payload area for one slot.
    pub fn slot(&self, index: usize) -> &[u8] {
        let start = index * SLOT_SIZE;
        &self.bytes[start..start + SLOT_SIZE]
    }

    pub fn slot_mut(&mut self, index: usize) -> &mut [u8] {
        let start = index * SLOT_SIZE;
        &mut self.bytes[start..start + SLOT_SIZE]
    }

    /// The usable payload area of a slot, after the fabric preamble.
    pub fn payload(&self, index: usize) -> &[u8] {
        &self.slot(index)[SLOT_PREAMBLE_SIZE..]
    }

    pub fn payload_mut(&mut self, index: usize) -> &mut [u8] {
        &mut self.slot_mut(index)[SLOT_PREAMBLE_SIZE..]
    }

    pub fn offset_of(&self, index: usize) -> usize {
        index * SLOT_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_do_not_overlap() {
        let mut arena = SlotArena::new();
        arena.slot_mut(0)[0] = 0xAA;
        arena.slot_mut(1)[0] = 0xBB;
        assert_eq!(arena.slot(0)[0], 0xAA);
        assert_eq!(arena.slot(1)[0], 0xBB);
    }

    #[test]
    fn payload_skips_preamble() {
        let mut arena = SlotArena::new();
        arena.slot_mut(0)[0] = 0xFF;
        assert_eq!(arena.payload(0).len(), SLOT_SIZE - SLOT_PREAMBLE_SIZE);
        assert_eq!(arena.payload(0)[0], 0);
    }
}
