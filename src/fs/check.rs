// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Filesystem consistency checking.

use std::io::Write;

use log::debug;

use crate::fs::{Directory, FileSystem, FileType, PTRS_PER_SECTOR, le16};
use crate::result::{Error, Result};

/// Checks the filesystem invariants and writes one report
/// line per finding:
///
/// - `BAD-BLOCK <ino> <sector>` for a non-zero block
///   reference outside the data area, whether a direct
///   address, an indirect address, or an address found
///   inside an indirect sector;
/// - `DUP-BLOCK <sector> <count>` for a sector referenced
///   more than once across all inodes, ascending by sector;
/// - `BAD-DOT <ino>` for a directory whose `.` entry is
///   missing or does not name the directory itself;
/// - `BAD-DOTDOT <ino>` for a directory whose `..` entry is
///   missing or does not name an allocated directory.
///
/// A clean image produces no output. Otherwise the whole
/// report is written and `Error::Inconsistent` returned.
pub fn check<W: Write>(fs: &FileSystem, out: &mut W) -> Result<()> {
    let mut refs = vec![0u32; usize::from(fs.sb.fsize)];
    let mut clean = true;

    for ino in 1..=fs.inode_count() {
        let ip = fs.inode(ino)?;
        if !ip.mode().allocated() {
            continue;
        }
        // The specials keep a device number in addr[0], not
        // a block address.
        if matches!(ip.file_type(), FileType::Char | FileType::Block) {
            continue;
        }
        if !ip.mode().large() {
            for &addr in &ip.dinode.addr {
                clean &= tally(fs, &mut refs, ino, addr, out)?;
            }
            continue;
        }
        for &addr in &ip.dinode.addr {
            if addr == 0 {
                continue;
            }
            clean &= tally(fs, &mut refs, ino, addr, out)?;
            if !fs.in_data_area(addr) {
                continue;
            }
            match fs.img.read_sector(u32::from(addr)) {
                Ok(buf) => {
                    for e in 0..PTRS_PER_SECTOR {
                        let sector = le16(&buf[e * 2..]);
                        clean &= tally(fs, &mut refs, ino, sector, out)?;
                    }
                }
                Err(err) => {
                    debug!("check: indirect sector {addr}: {err:?}");
                }
            }
        }
    }

    for (sector, &count) in refs.iter().enumerate() {
        if count > 1 {
            writeln!(out, "DUP-BLOCK {sector} {count}")?;
            clean = false;
        }
    }

    for ino in 1..=fs.inode_count() {
        let Some(dir) = Directory::try_new(fs.inode(ino)?) else {
            continue;
        };
        let mut dot = None;
        let mut dotdot = None;
        for entry in dir.iter() {
            match entry.name() {
                b"." if dot.is_none() => dot = Some(entry.ino()),
                b".." if dotdot.is_none() => dotdot = Some(entry.ino()),
                _ => (),
            }
        }
        if dot != Some(ino) {
            writeln!(out, "BAD-DOT {ino}")?;
            clean = false;
        }
        let parent_ok = dotdot.is_some_and(|parent| {
            fs.inode(parent).is_ok_and(|pip| {
                pip.mode().allocated() && pip.file_type() == FileType::Dir
            })
        });
        if !parent_ok {
            writeln!(out, "BAD-DOTDOT {ino}")?;
            clean = false;
        }
    }

    if clean { Ok(()) } else { Err(Error::Inconsistent) }
}

/// Accounts for one block reference from inode `ino`,
/// reporting it if it lies outside the data area. Returns
/// whether the reference was acceptable.
fn tally<W: Write>(
    fs: &FileSystem,
    refs: &mut [u32],
    ino: u16,
    sector: u16,
    out: &mut W,
) -> Result<bool> {
    if sector == 0 {
        return Ok(true);
    }
    if !fs.in_data_area(sector) {
        writeln!(out, "BAD-BLOCK {ino} {sector}")?;
        return Ok(false);
    }
    refs[usize::from(sector)] += 1;
    Ok(true)
}
