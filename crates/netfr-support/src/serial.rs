//! Wrap-safe comparison for the 32-bit `msgSerial`/`channelSerial` counters.
//!
//! spec §4.5 describes the trick informally ("if any serial under
//! consideration lies in the top 2048 of the space, subtract 4096 from
//! every serial before comparing"); property #6 in spec §8 is the precise
//! requirement — correct ordering for any pair whose modular distance is
//! under a window of 2048. That's exactly RFC1982 serial-number arithmetic
//! generalized to `u32`, which is what's implemented here: wrap safely for
//! any distance under half the counter's range, a strict superset of the
//! 2048-wide window spec §8 actually tests.

/// Returns `true` if `a` logically precedes `b` on the wrapping counter,
/// i.e. `a` is the older of the two serials.
#[inline]
pub fn precedes(a: u32, b: u32) -> bool {
    (a.wrapping_sub(b) as i32) < 0
}

/// Picks the older of two optional serials, wrap-safely. `None` never wins
/// (an absent candidate never precedes a present one).
#[inline]
pub fn older<T>(a: Option<(u32, T)>, b: Option<(u32, T)>) -> Option<(u32, T)> {
    match (a, b) {
        (Some(a), Some(b)) => {
            if precedes(a.0, b.0) {
                Some(a)
            } else {
                Some(b)
            }
        }
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_ordering() {
        assert!(precedes(1, 2));
        assert!(!precedes(2, 1));
        assert!(!precedes(5, 5));
    }

    #[test]
    fn wraps_around_u32_max() {
        let near_max = u32::MAX - 10;
        let wrapped = 5u32;
        assert!(precedes(near_max, wrapped));
        assert!(!precedes(wrapped, near_max));
    }

    #[test]
    fn window_from_spec_e5() {
        // Force channelSerial to start at 0xFFFFF000 and walk it forward;
        // ordering must stay monotone across the wrap.
        let base: u32 = 0xFFFFF000;
        let mut serials: Vec<u32> = Vec::new();
        for i in 0..8192u32 {
            serials.push(base.wrapping_add(i));
        }
        for w in serials.windows(2) {
            assert!(precedes(w[0], w[1]), "{:x} should precede {:x}", w[0], w[1]);
        }
    }

    #[test]
    fn older_picks_the_lower_serial() {
        let a = Some((10u32, "a"));
        let b = Some((20u32, "b"));
        assert_eq!(older(a, b), Some((10, "a")));
        assert_eq!(older(None, b), Some((20, "b")));
        assert_eq!(older::<&str>(None, None), None);
    }
}
