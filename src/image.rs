// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Sector-granular access to the disk image.

use std::cell::RefCell;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::result::{Error, Result};

/// The size of a disk sector, in bytes.
pub const SECTOR_SIZE: usize = 512;

/// A single sector's worth of bytes.
pub type Sector = [u8; SECTOR_SIZE];

/// Random access, a sector at a time, over the image file.
///
/// The image is held exclusively for the duration of one
/// operation, and the kernel page cache makes repeated
/// sector reads cheap, so no caching happens here. The
/// handle sits behind a `RefCell` so that reads work
/// through shared references; the program is single
/// threaded throughout.
pub struct Image {
    file: RefCell<File>,
}

impl Image {
    /// Opens the image file for reading.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Image> {
        let file = File::open(path).map_err(|_| Error::Open)?;
        Ok(Image { file: RefCell::new(file) })
    }

    /// Reads the given sector: seek to `sector * 512`, then
    /// read exactly 512 bytes. A short read is an error.
    pub fn read_sector(&self, sector: u32) -> Result<Sector> {
        let mut file = self.file.borrow_mut();
        let mut buf = [0u8; SECTOR_SIZE];
        file.seek(SeekFrom::Start(u64::from(sector) * SECTOR_SIZE as u64))?;
        file.read_exact(&mut buf)?;
        Ok(buf)
    }
}
