/*
    Copyright (C) 2020-2022  Rafal Michalski

    This file is part of ZXREPLAY, a Rust library for persisting and replaying ZX Spectrum emulation.

    For the full copyright notice, see the lib.rs file.
*/
//! Video related types carried by snapshots.
use core::convert::TryFrom;
use core::fmt;
use core::str::FromStr;

#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

use bitflags::bitflags;

/// The address of the screen memory of the 48k machine.
pub const SCREEN_ADDRESS: u16 = 0x4000;
/// The size of the INK/PAPER bitmap with its attributes.
pub const SCREEN_SIZE: usize = 6912;

bitflags! {
    /// Bitflags defining ZX Spectrum's border colors.
    #[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
    #[cfg_attr(feature = "snapshot", serde(try_from = "u8", into = "u8"))]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BorderColor: u8 {
        const BLACK   = 0b000;
        const BLUE    = 0b001;
        const RED     = 0b010;
        const MAGENTA = 0b011;
        const GREEN   = 0b100;
        const CYAN    = 0b101;
        const YELLOW  = 0b110;
        const WHITE   = 0b111;
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TryFromU8BorderColorError(pub u8);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseBorderColorError;

impl Default for BorderColor {
    fn default() -> Self {
        BorderColor::BLACK
    }
}

impl std::error::Error for TryFromU8BorderColorError {}

impl fmt::Display for TryFromU8BorderColorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "converted integer ({}) out of range for `BorderColor`", self.0)
    }
}

impl TryFrom<u8> for BorderColor {
    type Error = TryFromU8BorderColorError;
    fn try_from(color: u8) -> core::result::Result<Self, Self::Error> {
        BorderColor::from_bits(color).ok_or(TryFromU8BorderColorError(color))
    }
}

impl From<BorderColor> for u8 {
    fn from(color: BorderColor) -> u8 {
        color.bits()
    }
}

impl std::error::Error for ParseBorderColorError {}

impl fmt::Display for ParseBorderColorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("unrecognized border color")
    }
}

impl FromStr for BorderColor {
    type Err = ParseBorderColorError;
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        BorderColor::from_name(&name.to_ascii_uppercase()).ok_or(ParseBorderColorError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn border_color_works() {
        assert_eq!(BorderColor::default(), BorderColor::BLACK);
        for color in 0..8u8 {
            let border = BorderColor::try_from(color).unwrap();
            assert_eq!(u8::from(border), color);
        }
        assert_eq!(BorderColor::try_from(8), Err(TryFromU8BorderColorError(8)));
        assert_eq!("cyan".parse::<BorderColor>(), Ok(BorderColor::CYAN));
        assert_eq!("Orange".parse::<BorderColor>(), Err(ParseBorderColorError));
    }

    #[cfg(feature = "snapshot")]
    #[test]
    fn border_color_serde_works() {
        let border = BorderColor::YELLOW;
        let json = serde_json::to_string(&border).unwrap();
        assert_eq!(json, "6");
        assert_eq!(serde_json::from_str::<BorderColor>(&json).unwrap(), border);
        assert!(serde_json::from_str::<BorderColor>("9").is_err());
    }
}
