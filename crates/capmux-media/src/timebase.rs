//! Track time bases and rational timestamp rescaling.

use serde::{Deserialize, Serialize};

/// A track time base expressed as ticks per second (the time base ratio is
/// `1 / ticks_per_second`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBase {
    /// Container-native ticks per second.
    pub ticks_per_second: u32,
}

impl TimeBase {
    /// Microsecond time base (1/1_000_000), the unit incoming packet
    /// timestamps are expressed in.
    pub const MICROS: TimeBase = TimeBase {
        ticks_per_second: 1_000_000,
    };

    pub const fn new(ticks_per_second: u32) -> Self {
        Self { ticks_per_second }
    }
}

/// Rescale `value` from one time base to another, rounding to nearest.
///
/// Computed as `value * to / from` with i128 intermediates, so 64-bit
/// microsecond timestamps cannot overflow.
pub fn rescale(value: i64, from: TimeBase, to: TimeBase) -> i64 {
    if from == to {
        return value;
    }

    let num = value as i128 * to.ticks_per_second as i128;
    let den = from.ticks_per_second as i128;
    let rounded = if num >= 0 {
        (num + den / 2) / den
    } else {
        (num - den / 2) / den
    };
    rounded as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_rescale() {
        let tb = TimeBase::MICROS;
        assert_eq!(rescale(1_234_567, tb, tb), 1_234_567);
    }

    #[test]
    fn test_rescale_matches_rounded_ratio() {
        // Native ts must equal round(t * r / 1_000_000) for a 1/r track.
        let to = TimeBase::new(48_000);
        for t in [0i64, 1, 999, 20_833, 1_000_000, 86_400_000_000] {
            let expected = ((t as f64) * 48_000.0 / 1_000_000.0).round() as i64;
            assert_eq!(rescale(t, TimeBase::MICROS, to), expected, "t = {t}");
        }
    }

    #[test]
    fn test_round_trip_within_one_tick() {
        let audio = TimeBase::new(44_100);
        for t in [0i64, 22, 1_000, 23_219, 5_000_001, 3_600_000_000] {
            let native = rescale(t, TimeBase::MICROS, audio);
            let back = rescale(native, audio, TimeBase::MICROS);
            // One native tick is ~22.7 us at 44.1 kHz.
            let tick_micros = 1_000_000 / 44_100 + 1;
            assert!(
                (back - t).abs() <= tick_micros,
                "t = {t}, back = {back}"
            );
        }
    }

    #[test]
    fn test_rescale_preserves_order() {
        let to = TimeBase::new(90_000);
        let inputs = [0i64, 1, 33_333, 33_334, 66_666, 100_000];
        let outputs: Vec<i64> = inputs
            .iter()
            .map(|&t| rescale(t, TimeBase::MICROS, to))
            .collect();
        for pair in outputs.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
    }

    #[test]
    fn test_negative_values_round_symmetrically() {
        let to = TimeBase::new(1_000);
        assert_eq!(rescale(1_500, TimeBase::MICROS, to), 2);
        assert_eq!(rescale(-1_500, TimeBase::MICROS, to), -2);
    }

    #[test]
    fn test_large_timestamps_do_not_overflow() {
        // ~292 years of microseconds.
        let t = i64::MAX / 1_000;
        let to = TimeBase::new(48_000);
        let native = rescale(t, TimeBase::MICROS, to);
        assert!(native > 0);
    }
}
