/*
    Copyright (C) 2020-2022  Rafal Michalski

    This file is part of ZXREPLAY, a Rust library for persisting and replaying ZX Spectrum emulation.

    For the full copyright notice, see the lib.rs file.
*/
/*! **WAV** tape recordings.

Samples of 8-bit unsigned or 16-bit signed PCM files are summed across channels and the sum is
compared with the middle of their range to determine the signal level. Every run of samples at the same
level becomes a single [Pulse] with its duration scaled from the sample rate to T-states.
*/
use core::borrow::Borrow;
use std::io::{self, Cursor};

use log::debug;

use zxreplay_core::clock::sample_to_tstates;
use zxreplay_core::pulse::{EndTagged, Pulse, PulseTags};

use crate::error::{FormatError, Result};

/// A decoded **WAV** file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WavFile {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    levels: Vec<bool>,
}

fn wav_error(err: hound::Error, image_len: usize) -> FormatError {
    match err {
        hound::Error::IoError(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
            FormatError::truncated(image_len, 1, 0)
        }
        hound::Error::IoError(err) => FormatError::Io(err),
        hound::Error::Unsupported => FormatError::UnsupportedFeature("WAV encoding"),
        hound::Error::FormatError(msg) => {
            debug!("WAV: {}", msg);
            FormatError::InvalidData("malformed WAV file")
        }
        err => {
            debug!("WAV: {}", err);
            FormatError::InvalidData("malformed WAV file")
        }
    }
}

impl WavFile {
    /// Parses a **WAV** file image, decoding all of its samples.
    ///
    /// # Errors
    /// If the data chunk holds fewer samples than declared [FormatError::Truncated] is returned.
    /// Sample formats other than 8-bit and 16-bit integers are reported as
    /// [FormatError::UnsupportedFeature].
    pub fn parse(image: &[u8]) -> Result<Self> {
        let reader = hound::WavReader::new(Cursor::new(image))
                     .map_err(|err| wav_error(err, image.len()))?;
        let spec = reader.spec();
        if spec.sample_format != hound::SampleFormat::Int ||
           !(spec.bits_per_sample == 8 || spec.bits_per_sample == 16) {
            return Err(FormatError::UnsupportedFeature("WAV sample format"))
        }
        let channels = spec.channels.max(1) as usize;
        let declared = reader.len() as usize;
        debug!("WAV: {:?}, samples: {}", spec, declared);
        let mut levels = Vec::with_capacity(declared / channels);
        let mut frame_sum = 0i32;
        let mut decoded = 0usize;
        for sample in reader.into_samples::<i16>() {
            let sample = sample.map_err(|err| match err {
                // the reader reports a short data chunk as a generic i/o error
                hound::Error::IoError(..) if decoded < declared => {
                    let width = spec.bits_per_sample as usize / 8;
                    FormatError::truncated(image.len(), declared * width, decoded * width)
                }
                err => wav_error(err, image.len())
            })?;
            frame_sum += i32::from(sample);
            decoded += 1;
            if decoded % channels == 0 {
                // 8-bit samples are already converted to signed by the reader
                levels.push(frame_sum > 0);
                frame_sum = 0;
            }
        }
        Ok(WavFile {
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            bits_per_sample: spec.bits_per_sample,
            levels
        })
    }
    /// Returns the signal levels of subsequent sample frames.
    pub fn levels(&self) -> &[bool] {
        &self.levels
    }
    /// Returns a lazy pulse sequence borrowing this file.
    pub fn pulses(&self) -> WavPulses<&WavFile> {
        EndTagged::new(WavPulseIter::new(self))
    }
    /// Returns a lazy pulse sequence owning this file.
    pub fn into_pulses(self) -> WavPulses<WavFile> {
        EndTagged::new(WavPulseIter::new(self))
    }
}

/// The pulse sequence of a **WAV** file with the last pulse tagged.
pub type WavPulses<F> = EndTagged<WavPulseIter<F>>;

/// Converts level transitions of the borrowed [WavFile] to pulses.
#[derive(Clone, Debug)]
pub struct WavPulseIter<F> {
    file: F,
    index: usize,
}

impl<F: Borrow<WavFile>> WavPulseIter<F> {
    pub fn new(file: F) -> Self {
        WavPulseIter { file, index: 0 }
    }

    pub fn into_inner(self) -> F {
        self.file
    }
}

impl<F: Borrow<WavFile>> Iterator for WavPulseIter<F> {
    type Item = Pulse;

    fn next(&mut self) -> Option<Pulse> {
        let wav = self.file.borrow();
        let start = self.index;
        let level = *wav.levels.get(start)?;
        let end = wav.levels[start..].iter().position(|&l| l != level)
                  .map_or(wav.levels.len(), |len| start + len);
        self.index = end;
        let rate = wav.sample_rate.max(1);
        let duration = sample_to_tstates(end as u64, rate) - sample_to_tstates(start as u64, rate);
        Some(Pulse::new(level, duration.min(u32::MAX as u64) as u32, PulseTags::empty()))
    }
}
