// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::cmp;
use std::fmt;

use log::debug;
use static_assertions::const_assert;

use crate::fs::{Blocks, FileSystem, FileType, Inode};
use crate::image::{SECTOR_SIZE, Sector};

/// The length of the name field in a directory entry.
pub const NAME_LEN: usize = 14;

/// The size of an on-disk directory entry.
pub const ENTRY_SIZE: usize = 16;

/// Directory entries per sector.
pub const ENTRIES_PER_SECTOR: usize = SECTOR_SIZE / ENTRY_SIZE;

const_assert!(NAME_LEN + 2 == ENTRY_SIZE);

/// Newtype around an inode representing a directory file.
pub struct Directory<'fs> {
    inode: Inode<'fs>,
}

impl<'fs> Directory<'fs> {
    /// Creates a new directory from the given inode.
    /// Asserts that the inode is an allocated directory.
    pub fn new(inode: Inode<'fs>) -> Directory<'fs> {
        let mode = inode.mode();
        assert!(mode.allocated() && mode.typ() == FileType::Dir);
        Directory { inode }
    }

    /// Tries to create a new `Directory` from the given
    /// inode. Returns `None` unless the inode is an
    /// allocated directory.
    pub fn try_new(inode: Inode<'fs>) -> Option<Directory<'fs>> {
        let mode = inode.mode();
        let isdir = mode.allocated() && mode.typ() == FileType::Dir;
        isdir.then(|| Self::new(inode))
    }

    /// Returns an iterator over the directory entries in
    /// this directory, in on-disk order.
    pub fn iter(&self) -> Iter<'fs> {
        Iter::new(self)
    }
}

/// A directory entry iterator.
///
/// Sectors that cannot be used (block walker errors, zero
/// or out-of-range addresses, failed reads) are skipped
/// rather than failing the scan, so a damaged directory
/// still yields whatever entries can be decoded. Empty
/// slots, marked by an i-number of zero, are skipped too.
pub struct Iter<'fs> {
    fs: &'fs FileSystem,
    blocks: Blocks<'fs>,
    sector: Option<(Sector, usize)>,
}

impl<'fs> Iter<'fs> {
    /// Creates a new entry iterator for the given
    /// directory.
    pub fn new(dir: &Directory<'fs>) -> Iter<'fs> {
        Iter { fs: dir.inode.fs, blocks: dir.inode.blocks(), sector: None }
    }
}

impl Iterator for Iter<'_> {
    type Item = Entry;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((buf, slot)) = &mut self.sector {
                while *slot < ENTRIES_PER_SECTOR {
                    let bs = &buf[*slot * ENTRY_SIZE..(*slot + 1) * ENTRY_SIZE];
                    *slot += 1;
                    let ino = u16::from_le_bytes([bs[0], bs[1]]);
                    if ino == 0 {
                        continue;
                    }
                    let mut name = [0u8; NAME_LEN];
                    name.copy_from_slice(&bs[2..ENTRY_SIZE]);
                    return Some(Entry { ino, name });
                }
                self.sector = None;
            }
            match self.blocks.next()? {
                Err(err) => {
                    debug!("dir scan: skipping indirect block: {err:?}");
                }
                Ok(0) => (),
                Ok(sector) if !self.fs.in_data_area(sector) => {
                    debug!("dir scan: sector {sector} outside data area");
                }
                Ok(sector) => {
                    match self.fs.img.read_sector(u32::from(sector)) {
                        Ok(buf) => self.sector = Some((buf, 0)),
                        Err(err) => {
                            debug!("dir scan: sector {sector}: {err:?}");
                        }
                    }
                }
            }
        }
    }
}

/// The in-memory representation of a directory entry.
#[derive(Clone, Copy)]
pub struct Entry {
    ino: u16,
    name: [u8; NAME_LEN],
}

impl Entry {
    /// Returns the i-number for this directory entry.
    pub fn ino(&self) -> u16 {
        self.ino
    }

    /// Returns the name contained in this directory entry,
    /// terminated at the first NUL.
    pub fn name(&self) -> &[u8] {
        let len = self.name.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
        &self.name[..len]
    }

    /// Whether `query` names this entry. The comparison is
    /// over the fixed-width field: the query is truncated
    /// to fourteen bytes and NUL padded, then compared
    /// bytewise.
    pub fn matches(&self, query: &[u8]) -> bool {
        let mut padded = [0u8; NAME_LEN];
        let len = cmp::min(query.len(), NAME_LEN);
        padded[..len].copy_from_slice(&query[..len]);
        self.name == padded
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{} {}", self.ino, String::from_utf8_lossy(self.name()))
    }
}
