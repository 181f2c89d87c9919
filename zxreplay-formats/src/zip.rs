/*
    Copyright (C) 2020-2022  Rafal Michalski

    This file is part of ZXREPLAY, a Rust library for persisting and replaying ZX Spectrum emulation.

    For the full copyright notice, see the lib.rs file.
*/
//! **ZIP** archive member extraction.
use std::io::{Cursor, Read};

use log::debug;
use ::zip::result::ZipError;

use crate::error::{FormatError, Result};

pub const ZIP_SIGNATURE: &[u8;4] = b"PK\x03\x04";

impl From<ZipError> for FormatError {
    fn from(err: ZipError) -> Self {
        match err {
            ZipError::Io(err) => FormatError::Io(err),
            ZipError::InvalidArchive(msg) => {
                debug!("ZIP: {}", msg);
                FormatError::CorruptedBlock("invalid ZIP archive")
            }
            ZipError::UnsupportedArchive(msg) => {
                debug!("ZIP: {}", msg);
                FormatError::UnsupportedFeature("ZIP archive compression")
            }
            err => {
                debug!("ZIP: {}", err);
                FormatError::InvalidData("invalid ZIP archive")
            }
        }
    }
}

/// Extracts all the file members of a **ZIP** archive in the archive order.
///
/// Returns pairs of member names and their contents. Directories are skipped.
pub fn read_files(image: &[u8]) -> Result<Vec<(String, Vec<u8>)>> {
    let mut archive = ::zip::ZipArchive::new(Cursor::new(image))?;
    let mut files = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let mut member = archive.by_index(index)?;
        if member.is_dir() {
            continue
        }
        let mut data = Vec::with_capacity(member.size() as usize);
        member.read_to_end(&mut data)?;
        debug!("ZIP member: {}, size: {}", member.name(), data.len());
        files.push((member.name().to_string(), data));
    }
    Ok(files)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::Write;
    use ::zip::write::{FileOptions, ZipWriter};
    use super::*;

    pub(crate) fn zip_image(members: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in members {
            writer.start_file(*name, FileOptions::default()).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn read_files_works() {
        let image = zip_image(&[("b.tap", &[1u8, 2, 3][..]), ("a/readme.txt", &b"hello"[..])]);
        assert_eq!(&image[..4], ZIP_SIGNATURE);
        let files = read_files(&image).unwrap();
        assert_eq!(files, vec![
            ("b.tap".to_string(), vec![1, 2, 3]),
            ("a/readme.txt".to_string(), b"hello".to_vec())]);
        assert!(read_files(&image[..10]).is_err());
    }
}
