//! Memory Region Registry (spec component B): the client side's bookkeeping
//! for its own bulk-transfer buffers. Each slot tracks one registration the
//! client has offered the host for one-sided writes.
//!
//! State machine per spec §5.2:
//! `Empty -> Reserved -> {Available, AvailableUnsynced} -> Busy -> HasData -> AvailableUnsynced`

use netfr_support::constants::M_REGIONS;
use netfr_support::error::{NetfrError, NetfrResult};
use netfr_support::serial;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RegionState {
    /// Slot unused; no region lives here.
    Empty,
    /// Allocated locally but not yet announced to the host.
    Reserved,
    /// Announced; `BUFFER_STATE` has not yet reached the host, or the
    /// region's address/size changed since the last announce.
    AvailableUnsynced,
    /// Announced and acknowledged — the host may target it with a write.
    Available,
    /// A write landed and the host has claimed it for delivery; the client
    /// must not reuse it yet.
    Busy,
    /// Write landed, data has been read out locally; about to be
    /// re-announced (or revoked).
    HasData,
}

/// Where a landed write put its bytes, carried by a region from the moment
/// its `BUFFER_UPDATE` arrives until `dispatch::select_event` surfaces it as
/// a [`crate::channel::ChannelEvent::BufferLanded`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct LandedWrite {
    pub offset: u32,
    pub len: u32,
    pub write_serial: u32,
    pub channel_serial: u32,
}

#[derive(Debug, Copy, Clone)]
pub struct Region {
    pub state: RegionState,
    pub addr: u64,
    pub rkey: u64,
    pub size: usize,
    pub landed: Option<LandedWrite>,
    delivered: bool,
}

impl Region {
    const EMPTY: Region = Region { state: RegionState::Empty, addr: 0, rkey: 0, size: 0, landed: None, delivered: false };
}

/// Fixed-capacity table of up to [`M_REGIONS`] client-side regions.
pub struct RegionRegistry {
    regions: [Region; M_REGIONS],
}

impl RegionRegistry {
    pub fn new() -> RegionRegistry {
        RegionRegistry { regions: [Region::EMPTY; M_REGIONS] }
    }

    pub fn get(&self, index: usize) -> Option<&Region> {
        self.regions.get(index)
    }

    /// Finds a free slot and reserves it for a freshly registered region.
    pub fn reserve(&mut self, addr: u64, rkey: u64, size: usize) -> NetfrResult<usize> {
        let index = self
            .regions
            .iter()
            .position(|r| r.state == RegionState::Empty)
            .ok_or(NetfrError::NoSpace { required: 1 })?;

        self.regions[index] = Region { state: RegionState::Reserved, addr, rkey, size, landed: None, delivered: false };
        Ok(index)
    }

    /// Marks a reserved (or re-announced) region as sent to the host but
    /// not yet confirmed.
    pub fn mark_unsynced(&mut self, index: usize) -> NetfrResult<()> {
        let region = self.slot_mut(index)?;
        match region.state {
            RegionState::Reserved | RegionState::HasData | RegionState::AvailableUnsynced => {
                region.state = RegionState::AvailableUnsynced;
                Ok(())
            }
            other => Err(bad_transition("mark_unsynced", other)),
        }
    }

    /// The host's own completion of our `BUFFER_STATE` send was observed;
    /// the region is now writable.
    pub fn confirm_available(&mut self, index: usize) -> NetfrResult<()> {
        let region = self.slot_mut(index)?;
        match region.state {
            RegionState::AvailableUnsynced => {
                region.state = RegionState::Available;
                Ok(())
            }
            other => Err(bad_transition("confirm_available", other)),
        }
    }

    /// A `BUFFER_UPDATE` arrived claiming a write landed here.
    pub fn mark_busy(&mut self, index: usize, landed: LandedWrite) -> NetfrResult<()> {
        let region = self.slot_mut(index)?;
        match region.state {
            RegionState::Available => {
                region.state = RegionState::Busy;
                region.landed = Some(landed);
                region.delivered = false;
                Ok(())
            }
            other => Err(bad_transition("mark_busy", other)),
        }
    }

    /// The application finished reading the landed data out of the slot.
    pub fn mark_has_data_consumed(&mut self, index: usize) -> NetfrResult<()> {
        let region = self.slot_mut(index)?;
        match region.state {
            RegionState::Busy => {
                region.state = RegionState::HasData;
                region.landed = None;
                Ok(())
            }
            other => Err(bad_transition("mark_has_data_consumed", other)),
        }
    }

    /// The lowest-`channel_serial` region still `BUSY` whose landed write
    /// hasn't been surfaced as an event yet, compared wrap-safely. Feeds
    /// the dispatcher's oldest-first event selection (spec §4.8 step 5).
    pub fn oldest_busy(&self) -> Option<(u32, usize)> {
        let mut best: Option<(u32, usize)> = None;
        for (index, region) in self.regions.iter().enumerate() {
            if region.state != RegionState::Busy || region.delivered {
                continue;
            }
            if let Some(landed) = region.landed {
                best = serial::older(best, Some((landed.channel_serial, index)));
            }
        }
        best
    }

    /// Marks a landed write as surfaced, so `oldest_busy` stops returning
    /// it. The region itself stays `BUSY` until the application reads the
    /// bytes out via `mark_has_data_consumed`.
    pub fn mark_delivered(&mut self, index: usize) -> NetfrResult<()> {
        let region = self.slot_mut(index)?;
        region.delivered = true;
        Ok(())
    }

    /// Revokes a region entirely (size 0 announcement), freeing the slot.
    pub fn revoke(&mut self, index: usize) -> NetfrResult<()> {
        let region = self.slot_mut(index)?;
        *region = Region::EMPTY;
        Ok(())
    }

    fn slot_mut(&mut self, index: usize) -> NetfrResult<&mut Region> {
        self.regions.get_mut(index).ok_or(NetfrError::BadMessage { reason: "region index out of range" })
    }
}

fn bad_transition(op: &'static str, from: RegionState) -> NetfrError {
    let _ = (op, from);
    NetfrError::BadMessage { reason: "invalid region state transition" }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(channel_serial: u32) -> LandedWrite {
        LandedWrite { offset: 0, len: 16, write_serial: 0, channel_serial }
    }

    #[test]
    fn lifecycle_happy_path() {
        let mut reg = RegionRegistry::new();
        let idx = reg.reserve(0x1000, 42, 4096).unwrap();
        assert_eq!(reg.get(idx).unwrap().state, RegionState::Reserved);

        reg.mark_unsynced(idx).unwrap();
        assert_eq!(reg.get(idx).unwrap().state, RegionState::AvailableUnsynced);

        reg.confirm_available(idx).unwrap();
        assert_eq!(reg.get(idx).unwrap().state, RegionState::Available);

        reg.mark_busy(idx, write(7)).unwrap();
        assert_eq!(reg.get(idx).unwrap().state, RegionState::Busy);
        assert_eq!(reg.oldest_busy(), Some((7, idx)));

        reg.mark_delivered(idx).unwrap();
        assert_eq!(reg.oldest_busy(), None);

        reg.mark_has_data_consumed(idx).unwrap();
        assert_eq!(reg.get(idx).unwrap().state, RegionState::HasData);

        reg.mark_unsynced(idx).unwrap();
        assert_eq!(reg.get(idx).unwrap().state, RegionState::AvailableUnsynced);
    }

    #[test]
    fn rejects_busy_before_available() {
        let mut reg = RegionRegistry::new();
        let idx = reg.reserve(0x1000, 42, 4096).unwrap();
        assert!(reg.mark_busy(idx, write(0)).is_err());
    }

    #[test]
    fn reserve_fails_when_full() {
        let mut reg = RegionRegistry::new();
        for _ in 0..M_REGIONS {
            reg.reserve(0, 0, 0).unwrap();
        }
        assert!(reg.reserve(0, 0, 0).is_err());
    }

    #[test]
    fn revoke_frees_the_slot_for_reuse() {
        let mut reg = RegionRegistry::new();
        let idx = reg.reserve(0x1000, 42, 4096).unwrap();
        reg.revoke(idx).unwrap();
        assert_eq!(reg.get(idx).unwrap().state, RegionState::Empty);
        let idx2 = reg.reserve(0x2000, 43, 8192).unwrap();
        assert_eq!(idx2, idx);
    }

    #[test]
    fn oldest_busy_picks_lowest_serial_wrap_safely() {
        let mut reg = RegionRegistry::new();
        let a = reg.reserve(0, 0, 4096).unwrap();
        reg.mark_unsynced(a).unwrap();
        reg.confirm_available(a).unwrap();
        let b = reg.reserve(0, 0, 4096).unwrap();
        reg.mark_unsynced(b).unwrap();
        reg.confirm_available(b).unwrap();

        reg.mark_busy(a, write(u32::MAX - 1)).unwrap();
        reg.mark_busy(b, write(5)).unwrap();

        assert_eq!(reg.oldest_busy(), Some((u32::MAX - 1, a)), "5 is newer once the counter wraps past it");
    }
}
