/*
    Copyright (C) 2020-2022  Rafal Michalski

    This file is part of ZXREPLAY, a Rust library for persisting and replaying ZX Spectrum emulation.

    For the full copyright notice, see the lib.rs file.
*/
//! Decoding the supported file formats through the format registry.
use std::io::Cursor;

use hound::{SampleFormat, WavSpec, WavWriter};
use zxreplay::*;
use zxreplay::formats::rzx::{CreatorInfo, Frame, PortSamples, RzxFile, SnapshotChunk};
use zxreplay::formats::tap::{TapBlock, TapFile};
use zxreplay::formats::tap::pulse::consts::LEAD_PULSES_DATA;
use zxreplay::formats::tzx::TZX_SIGNATURE;
use zxreplay::video::BorderColor;
use zxreplay::z80emu::Z80NMOS;

fn test_snapshot() -> UnifiedSnapshot {
    UnifiedSnapshot {
        pc: 0x8000,
        sp: 0xFF00,
        hl: 0x1234,
        border: Some(BorderColor::BLUE),
        ticks_since_int: Some(1000),
        ..UnifiedSnapshot::default()
    }
    .with_memory(0x4000, vec![0x55;0x4000]).unwrap()
    .with_memory(0x8000, (0..0x4000).map(|n| n as u8).collect()).unwrap()
    .with_memory(0xC000, vec![0;0x4000]).unwrap()
}

#[test]
fn test_z80_v1_snapshot() {
    let mut image = vec![0u8;30];
    image[4..6].copy_from_slice(&0x1234u16.to_le_bytes());
    image[6..8].copy_from_slice(&0x0001u16.to_le_bytes());
    image[12] = 0xFF;
    image[29] = 1;
    image.extend((0..0xC000).map(|n| (n >> 8) as u8));
    assert_eq!(image.len(), 49182);
    assert_eq!(detect_format(&image, "z80"), Some(FormatKind::Z80));
    let snap = match parse("GAME.Z80", &image).unwrap() {
        FileRecord::Snapshot(snap) => {
            assert_eq!(snap.kind(), FormatKind::Z80);
            snap.to_unified()
        }
        _ => panic!("not a snapshot")
    };
    assert_eq!(snap.hl, 0x1234);
    assert_eq!(snap.pc, 0x0001);
    assert_eq!(&image[4..6], &snap.hl.to_le_bytes());
    assert_eq!(snap.memory.blocks().len(), 3);
}

#[test]
fn test_snapshot_round_trip() {
    let snap = test_snapshot();
    let image = make_snapshot(&snap).unwrap();
    match parse("saved.z80", &image).unwrap() {
        FileRecord::Snapshot(SnapshotFile::Z80(z80)) => assert_eq!(z80.into_unified(), snap),
        _ => panic!("not a Z80 snapshot")
    }
    let snap = UnifiedSnapshot { ticks_since_int: None, ..snap };
    let image = make_snapshot(&snap).unwrap();
    match parse("saved.z80", &image).unwrap() {
        FileRecord::Snapshot(file) => assert_eq!(file.to_unified(), snap),
        _ => panic!("not a snapshot")
    }
}

#[test]
fn test_rzx_recording() {
    let rzx = RzxFile::new()
        .with_chunk(CreatorInfo::new("ZXREPLAY", 0, 1))
        .with_chunk(SnapshotChunk::from_unified(&test_snapshot()).unwrap())
        .with_chunk(PortSamples {
            first_tick: 0,
            frames: vec![Frame::new(1, vec![]), Frame::new(1, vec![])]
        });
    let image = rzx.to_bytes();
    assert_eq!(detect_format(&image, ""), Some(FormatKind::Rzx));
    let rzx2 = match parse("session.rzx", &image).unwrap() {
        FileRecord::Recording(rzx) => rzx,
        _ => panic!("not a recording")
    };
    assert_eq!(rzx2.chunks[0].id(), "info");
    assert_eq!(rzx2.chunks.len(), 3);
    assert_eq!(rzx2.find_creator_info().unwrap().to_string(), "ZXREPLAY 0.1");
    assert_eq!(rzx2, rzx);
}

#[test]
fn test_tap_tape() {
    let tap = TapFile::default().with_block(TapBlock::new(0xFF, &[1, 2, 3]));
    let image = tap.to_bytes();
    assert_eq!(image.len(), 2 + 1 + 3 + 1);
    let tape = match parse("tape.tap", &image).unwrap() {
        FileRecord::Sound(tape) => tape,
        _ => panic!("not a tape")
    };
    assert_eq!(tape.kind(), FormatKind::Tap);
    let pulses: Vec<Pulse> = tape.pulses().collect();
    assert!(!pulses.is_empty());
    assert!(pulses.last().unwrap().tags.contains(PulseTags::END));
    assert_eq!(pulses.iter().filter(|p| p.is_end()).count(), 1);
    assert_eq!(tape.into_pulses().count(), pulses.len());
}

#[test]
fn test_tzx_tape() {
    let mut image = TZX_SIGNATURE.to_vec();
    image.extend_from_slice(&[1, 20]);
    image.extend_from_slice(&[0x10, 0, 0, 5, 0, 0xFF, 1, 2, 3, 0xFD]);
    assert_eq!(detect_format(&image, "bin"), Some(FormatKind::Tzx));
    let tape = match parse("tape.tzx", &image).unwrap() {
        FileRecord::Sound(tape) => tape,
        _ => panic!("not a tape")
    };
    assert_eq!(tape.kind(), FormatKind::Tzx);
    let count = tape.pulses().count();
    assert_eq!(count, LEAD_PULSES_DATA as usize + 2 + 5*8*2 + 1);
}

#[test]
fn test_wav_tape() {
    let spec = WavSpec { channels: 1, sample_rate: 44100, bits_per_sample: 8, sample_format: SampleFormat::Int };
    let mut image = Vec::new();
    {
        let mut writer = WavWriter::new(Cursor::new(&mut image), spec).unwrap();
        for n in 0..100 {
            writer.write_sample(if n & 1 == 0 { -128i8 } else { 127 }).unwrap();
        }
        writer.finalize().unwrap();
    }
    assert_eq!(detect_format(&image, ""), Some(FormatKind::Wav));
    let tape = match parse("tape.wav", &image).unwrap() {
        FileRecord::Sound(tape) => tape,
        _ => panic!("not a tape")
    };
    let pulses: Vec<_> = tape.pulses().collect();
    assert_eq!(pulses.len(), 100);
    assert!(pulses.windows(2).all(|w| w[0].level != w[1].level));
}

#[test]
fn test_unknown_formats() {
    assert!(matches!(parse("readme.txt", b"hello"), Err(FormatError::UnknownFormat(..))));
    assert!(matches!(parse("broken.tzx", b"ZXTape!"), Err(FormatError::Truncated {..})));
    assert!(parse("broken.rzx", b"RZX!\x00").is_err());
    assert_eq!(detect_format(b"", "tap"), Some(FormatKind::Tap));
    assert_eq!(detect_format(b"", "dat"), None);
}

struct Machine {
    cpu: Z80NMOS,
    ram: Vec<u8>,
    tstates: FTs,
}

impl SnapshotCreator for Machine {
    fn create_snapshot(&self) -> UnifiedSnapshot {
        UnifiedSnapshot::from_cpu(&self.cpu).with_memory(0x4000, self.ram.clone()).unwrap()
    }

    fn interrupt_ticks(&self) -> FTs {
        self.tstates
    }
}

impl SnapshotLoader for Machine {
    fn install_snapshot(&mut self, snapshot: UnifiedSnapshot) {
        snapshot.apply_to_cpu(&mut self.cpu);
        snapshot.read_memory(0x4000, &mut self.ram);
        self.tstates = snapshot.ticks_since_int.unwrap_or(0);
    }
}

#[test]
fn test_save_and_restore_machine() {
    use zxreplay::z80emu::{Cpu, StkReg16};
    let mut cpu = Z80NMOS::default();
    cpu.set_pc(0x8123);
    cpu.set_sp(0x7FF0);
    cpu.set_reg16(StkReg16::HL, 0xBEEF);
    let machine = Machine { cpu, ram: (0..0xC000).map(|n| (n * 7) as u8).collect(), tstates: 12345 };
    let image = save_snapshot(&machine).unwrap();
    let snap = match parse("machine.z80", &image).unwrap() {
        FileRecord::Snapshot(snap) => snap.to_unified(),
        _ => panic!("not a snapshot")
    };
    assert_eq!(snap.ticks_since_int, Some(12345));
    let mut restored = Machine { cpu: Z80NMOS::default(), ram: vec![0;0xC000], tstates: 0 };
    restored.install_snapshot(snap);
    assert_eq!(restored.cpu.get_pc(), 0x8123);
    assert_eq!(restored.cpu.get_sp(), 0x7FF0);
    assert_eq!(restored.cpu.get_reg16(StkReg16::HL), 0xBEEF);
    assert_eq!(restored.ram, machine.ram);
    assert_eq!(restored.tstates, 12345);
}
