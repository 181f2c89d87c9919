/*
    Copyright (C) 2020-2022  Rafal Michalski

    This file is part of ZXREPLAY, a Rust library for persisting and replaying ZX Spectrum emulation.

    For the full copyright notice, see the lib.rs file.
*/
//! T-state timestamp types and the 48k clock constants.

/// A linear T-state timestamp type.
pub type FTs = i32;

/// The CPU clock frequency of the 48k machine in T-states per second.
pub const CPU_HZ: u32 = 3_500_000;

/// The number of T-states in a single video frame (one interrupt period) of the 48k machine.
pub const FRAME_TSTATES: FTs = 69888;

/// The number of T-states in a single millisecond.
pub const TSTATES_PER_MS: u32 = CPU_HZ / 1000;

/// Converts a duration in milliseconds to T-states.
#[inline]
pub fn ms_to_tstates(ms: u16) -> u32 {
    ms as u32 * TSTATES_PER_MS
}

/// Converts a sample index of an audio stream with the given `sample_rate` to a T-state
/// timestamp, rounding to the nearest T-state.
///
/// # Panics
/// Panics if `sample_rate` is 0.
#[inline]
pub fn sample_to_tstates(index: u64, sample_rate: u32) -> u64 {
    let rate = sample_rate as u64;
    (index * CPU_HZ as u64 + rate / 2) / rate
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_conversions_work() {
        assert_eq!(ms_to_tstates(0), 0);
        assert_eq!(ms_to_tstates(1000), CPU_HZ);
        assert_eq!(ms_to_tstates(u16::max_value()), 229_372_500);
        assert_eq!(sample_to_tstates(0, 44100), 0);
        assert_eq!(sample_to_tstates(1, 44100), 79);
        assert_eq!(sample_to_tstates(2, 44100), 159);
        assert_eq!(sample_to_tstates(44100, 44100), CPU_HZ as u64);
        assert_eq!(sample_to_tstates(7, 3_500_000), 7);
    }
}
