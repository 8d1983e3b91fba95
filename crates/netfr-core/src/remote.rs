//! Remote Memory Registry: the host side's mirror of the client's published
//! regions, keyed by the same index the client uses in its own
//! [`crate::region::RegionRegistry`].
//!
//! State machine per spec §5.3:
//! `None -> Available -> Allocated -> BusyLocal -> BusyRemote -> Available`

use netfr_support::constants::M_REGIONS;
use netfr_support::error::{NetfrError, NetfrResult};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RemoteState {
    /// Nothing known about this index.
    None,
    /// Published by the client; free for the host to allocate.
    Available,
    /// Claimed by the host for an in-flight write, not yet posted.
    Allocated,
    /// Write posted to the fabric; waiting on the local completion.
    BusyLocal,
    /// Local completion seen; `BUFFER_UPDATE` sent, waiting on the client
    /// to re-announce the region before it can be reused.
    BusyRemote,
}

#[derive(Debug, Copy, Clone)]
pub struct RemoteRegion {
    pub state: RemoteState,
    pub addr: u64,
    pub rkey: u64,
    pub size: usize,
}

impl RemoteRegion {
    const EMPTY: RemoteRegion = RemoteRegion { state: RemoteState::None, addr: 0, rkey: 0, size: 0 };
}

pub struct RemoteMemoryRegistry {
    regions: [RemoteRegion; M_REGIONS],
}

impl RemoteMemoryRegistry {
    pub fn new() -> RemoteMemoryRegistry {
        RemoteMemoryRegistry { regions: [RemoteRegion::EMPTY; M_REGIONS] }
    }

    pub fn get(&self, index: usize) -> Option<&RemoteRegion> {
        self.regions.get(index)
    }

    /// Applies a `BUFFER_STATE` announcement. `size == 0` revokes the entry.
    pub fn publish(&mut self, index: usize, addr: u64, rkey: u64, size: usize) -> NetfrResult<()> {
        let region = self.slot_mut(index)?;
        if size == 0 {
            *region = RemoteRegion::EMPTY;
            return Ok(());
        }
        match region.state {
            RemoteState::None | RemoteState::Available => {
                *region = RemoteRegion { state: RemoteState::Available, addr, rkey, size };
                Ok(())
            }
            other => Err(bad_transition(other)),
        }
    }

    /// Finds the tightest-fitting available remote region able to hold
    /// `needed` bytes: `min{size : region.size >= needed}`, not merely the
    /// first one large enough.
    pub fn find_available(&self, needed: usize) -> Option<usize> {
        self.regions
            .iter()
            .enumerate()
            .filter(|(_, r)| r.state == RemoteState::Available && r.size >= needed)
            .min_by_key(|(_, r)| r.size)
            .map(|(index, _)| index)
    }

    pub fn allocate(&mut self, index: usize) -> NetfrResult<()> {
        let region = self.slot_mut(index)?;
        match region.state {
            RemoteState::Available => {
                region.state = RemoteState::Allocated;
                Ok(())
            }
            other => Err(bad_transition(other)),
        }
    }

    pub fn mark_busy_local(&mut self, index: usize) -> NetfrResult<()> {
        let region = self.slot_mut(index)?;
        match region.state {
            RemoteState::Allocated => {
                region.state = RemoteState::BusyLocal;
                Ok(())
            }
            other => Err(bad_transition(other)),
        }
    }

    /// Local write completion observed; `BUFFER_UPDATE` is about to go out.
    pub fn mark_busy_remote(&mut self, index: usize) -> NetfrResult<()> {
        let region = self.slot_mut(index)?;
        match region.state {
            RemoteState::BusyLocal => {
                region.state = RemoteState::BusyRemote;
                Ok(())
            }
            other => Err(bad_transition(other)),
        }
    }

    /// Rolls back a region claimed via `allocate`/`mark_busy_local` but
    /// never actually written to — e.g. a later allocation for the same
    /// write request failed. Returns it to `AVAILABLE` without touching its
    /// published address/size/rkey, per spec §4.5's "roll back and return
    /// Busy" requirement.
    pub fn cancel(&mut self, index: usize) -> NetfrResult<()> {
        let region = self.slot_mut(index)?;
        match region.state {
            RemoteState::Allocated | RemoteState::BusyLocal => {
                region.state = RemoteState::Available;
                Ok(())
            }
            other => Err(bad_transition(other)),
        }
    }

    /// The client re-announced the region (or a fresh one); it is usable
    /// again.
    pub fn recycle(&mut self, index: usize, addr: u64, rkey: u64, size: usize) -> NetfrResult<()> {
        let region = self.slot_mut(index)?;
        match region.state {
            RemoteState::BusyRemote => {
                *region = RemoteRegion { state: RemoteState::Available, addr, rkey, size };
                Ok(())
            }
            other => Err(bad_transition(other)),
        }
    }

    fn slot_mut(&mut self, index: usize) -> NetfrResult<&mut RemoteRegion> {
        self.regions.get_mut(index).ok_or(NetfrError::BadMessage { reason: "remote region index out of range" })
    }
}

fn bad_transition(from: RemoteState) -> NetfrError {
    let _ = from;
    NetfrError::BadMessage { reason: "invalid remote region state transition" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_happy_path() {
        let mut reg = RemoteMemoryRegistry::new();
        reg.publish(0, 0x1000, 7, 4096).unwrap();
        assert_eq!(reg.get(0).unwrap().state, RemoteState::Available);

        assert_eq!(reg.find_available(2048), Some(0));
        reg.allocate(0).unwrap();
        reg.mark_busy_local(0).unwrap();
        reg.mark_busy_remote(0).unwrap();
        assert_eq!(reg.get(0).unwrap().state, RemoteState::BusyRemote);

        reg.recycle(0, 0x2000, 8, 4096).unwrap();
        assert_eq!(reg.get(0).unwrap().state, RemoteState::Available);
    }

    #[test]
    fn revoke_via_zero_size() {
        let mut reg = RemoteMemoryRegistry::new();
        reg.publish(0, 0x1000, 7, 4096).unwrap();
        reg.publish(0, 0, 0, 0).unwrap();
        assert_eq!(reg.get(0).unwrap().state, RemoteState::None);
    }

    #[test]
    fn find_available_skips_regions_too_small() {
        let mut reg = RemoteMemoryRegistry::new();
        reg.publish(0, 0x1000, 7, 128).unwrap();
        reg.publish(1, 0x2000, 8, 8192).unwrap();
        assert_eq!(reg.find_available(4096), Some(1));
    }

    #[test]
    fn find_available_prefers_tightest_fit_over_first_fit() {
        let mut reg = RemoteMemoryRegistry::new();
        reg.publish(0, 0x1000, 7, 1 << 20).unwrap();
        reg.publish(1, 0x2000, 8, 4096).unwrap();
        reg.publish(2, 0x3000, 9, 65536).unwrap();
        assert_eq!(reg.find_available(2048), Some(1), "region 1 is the smallest region that still fits");
    }

    #[test]
    fn allocate_rejects_unavailable_region() {
        let mut reg = RemoteMemoryRegistry::new();
        assert!(reg.allocate(0).is_err());
    }

    #[test]
    fn cancel_rolls_back_without_touching_published_fields() {
        let mut reg = RemoteMemoryRegistry::new();
        reg.publish(0, 0x1000, 7, 4096).unwrap();
        reg.allocate(0).unwrap();
        reg.cancel(0).unwrap();
        let region = reg.get(0).unwrap();
        assert_eq!(region.state, RemoteState::Available);
        assert_eq!(region.addr, 0x1000);
        assert_eq!(region.rkey, 7);

        reg.allocate(0).unwrap();
        reg.mark_busy_local(0).unwrap();
        reg.cancel(0).unwrap();
        assert_eq!(reg.get(0).unwrap().state, RemoteState::Available);
    }
}
