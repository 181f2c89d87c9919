/*
    Copyright (C) 2020-2022  Rafal Michalski

    This file is part of ZXREPLAY, a Rust library for persisting and replaying ZX Spectrum emulation.

    For the full copyright notice, see the lib.rs file.
*/
//! Data block pulse encoding shared by the tape formats.
use zxreplay_core::pulse::PulseTags;

/// T-state pulse lengths of the ROM loading routines.
pub mod consts {
    /// The length of the lead tone pulse.
    pub const LEAD_PULSE_LENGTH : u32 = 2168;
    /// The length of the 1st sync pulse.
    pub const SYNC_PULSE1_LENGTH: u32 = 667;
    /// The length of the 2nd sync pulse.
    pub const SYNC_PULSE2_LENGTH: u32 = 735;
    /// The length of the bit 0 pulse.
    pub const ZERO_PULSE_LENGTH : u32 = 855;
    /// The length of the bit 1 pulse.
    pub const ONE_PULSE_LENGTH  : u32 = 1710;
    /// The length of the pulse terminating a data block.
    pub const TAIL_PULSE_LENGTH : u32 = 945;
    /// The length of the pause between blocks.
    pub const PAUSE_PULSE_LENGTH: u32 = 3_500_000;
    /// The number of lead pulses for the header block.
    pub const LEAD_PULSES_HEAD: u16 = 8063;
    /// The number of lead pulses for the data block.
    pub const LEAD_PULSES_DATA: u16 = 3223;
}

use consts::*;

/// Timing of the data block signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DataTiming {
    pub lead_pulse: u32,
    /// The number of lead pulses, 0 for no lead tone.
    pub lead_count: u16,
    /// Sync pulse lengths, `None` for no sync pulses.
    pub sync: Option<(u32, u32)>,
    pub zero_pulse: u32,
    pub one_pulse: u32,
    /// The number of bits used in the last byte, counting from the most significant bit.
    pub used_bits: u8,
    /// The length of the terminating pulse, `None` for no terminating pulse.
    pub tail: Option<u32>,
}

impl DataTiming {
    /// Returns the ROM timing for a data block starting with the given `flag` byte.
    ///
    /// The lead tone of blocks with the `flag` less than 128 is longer.
    pub fn standard(flag: u8) -> Self {
        DataTiming {
            lead_pulse: LEAD_PULSE_LENGTH,
            lead_count: if flag & 0x80 == 0 { LEAD_PULSES_HEAD } else { LEAD_PULSES_DATA },
            sync: Some((SYNC_PULSE1_LENGTH, SYNC_PULSE2_LENGTH)),
            zero_pulse: ZERO_PULSE_LENGTH,
            one_pulse: ONE_PULSE_LENGTH,
            used_bits: 8,
            tail: Some(TAIL_PULSE_LENGTH)
        }
    }
}

/// The current state of the [DataEncoder].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EncodeState {
    /// Emitting lead pulses, `countdown` pulses are left.
    Lead { countdown: u16 },
    Sync1,
    Sync2,
    /// Emitting data pulses.
    Data {
        /// An index of the current byte.
        index: usize,
        /// A pulse counter for the current byte, there are two pulses per bit.
        pulse: u8
    },
    Tail,
    Done
}

/// Encodes data as T-state pulse intervals.
///
/// The encoder doesn't own the data. Instead the same data slice must be provided to each
/// invocation of [DataEncoder::next_pulse], so it can be resumed from any kind of storage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DataEncoder {
    state: EncodeState,
    timing: DataTiming,
}

impl DataEncoder {
    pub fn new(timing: DataTiming) -> Self {
        let state = if timing.lead_count != 0 {
            EncodeState::Lead { countdown: timing.lead_count }
        }
        else if timing.sync.is_some() {
            EncodeState::Sync1
        }
        else {
            EncodeState::Data { index: 0, pulse: 0 }
        };
        DataEncoder { state, timing }
    }
    /// Creates the encoder with the ROM timing determined from the first byte of `data`.
    pub fn standard(data: &[u8]) -> Self {
        let flag = data.first().copied().unwrap_or(0);
        Self::new(DataTiming::standard(flag))
    }

    pub fn state(&self) -> EncodeState {
        self.state
    }

    pub fn timing(&self) -> &DataTiming {
        &self.timing
    }

    pub fn is_done(&self) -> bool {
        self.state == EncodeState::Done
    }

    fn after_sync(&self) -> EncodeState {
        EncodeState::Data { index: 0, pulse: 0 }
    }

    fn after_data(&self) -> EncodeState {
        if self.timing.tail.is_some() { EncodeState::Tail } else { EncodeState::Done }
    }
    /// Returns the length and tags of the next pulse, or `None` if the encoding is done.
    pub fn next_pulse(&mut self, data: &[u8]) -> Option<(u32, PulseTags)> {
        loop {
            match self.state {
                EncodeState::Lead { countdown } => {
                    self.state = match countdown - 1 {
                        0 if self.timing.sync.is_some() => EncodeState::Sync1,
                        0 => self.after_sync(),
                        countdown => EncodeState::Lead { countdown }
                    };
                    return Some((self.timing.lead_pulse, PulseTags::PILOT))
                }
                EncodeState::Sync1 => {
                    self.state = EncodeState::Sync2;
                    let (sync1, _) = self.timing.sync.unwrap_or_default();
                    return Some((sync1, PulseTags::SYNC1))
                }
                EncodeState::Sync2 => {
                    self.state = self.after_sync();
                    let (_, sync2) = self.timing.sync.unwrap_or_default();
                    return Some((sync2, PulseTags::SYNC2))
                }
                EncodeState::Data { index, pulse } => {
                    let byte = match data.get(index) {
                        Some(&byte) => byte,
                        None => {
                            self.state = self.after_data();
                            continue
                        }
                    };
                    let bits = if index + 1 == data.len() {
                        self.timing.used_bits.clamp(1, 8)
                    }
                    else {
                        8
                    };
                    let bit_one = (byte << (pulse >> 1)) & 0x80 != 0;
                    self.state = if pulse + 1 == bits * 2 {
                        EncodeState::Data { index: index + 1, pulse: 0 }
                    }
                    else {
                        EncodeState::Data { index, pulse: pulse + 1 }
                    };
                    return Some(if bit_one {
                        (self.timing.one_pulse, PulseTags::BIT1)
                    }
                    else {
                        (self.timing.zero_pulse, PulseTags::BIT0)
                    })
                }
                EncodeState::Tail => {
                    self.state = EncodeState::Done;
                    return self.timing.tail.map(|tail| (tail, PulseTags::TAIL))
                }
                EncodeState::Done => return None
            }
        }
    }
}
