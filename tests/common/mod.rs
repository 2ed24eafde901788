// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Assembles small synthetic V5 filesystem images for the
//! black-box tests, a sector at a time.

use std::cmp;
use std::collections::BTreeMap;
use std::io::Write;

use tempfile::NamedTempFile;

pub const SECTOR_SIZE: usize = 512;

// Mode bits as they appear on disk.
pub const ALLOC: u16 = 0o100000;
pub const IFDIR: u16 = 0o040000;
pub const IFCHR: u16 = 0o020000;
pub const LARGE: u16 = 0o010000;

/// One inode's worth of fields, in decoded form.
#[derive(Clone, Copy, Default)]
pub struct Ino {
    pub mode: u16,
    pub nlink: u8,
    pub size: u32,
    pub addr: [u16; 8],
}

/// Builds a V5 image: superblock in sector 1, `isize`
/// sectors of inodes from sector 2, data after that.
pub struct ImageBuilder {
    isize: u16,
    fsize: u16,
    inodes: BTreeMap<u16, Ino>,
    sectors: BTreeMap<u16, Vec<u8>>,
}

impl ImageBuilder {
    pub fn new(isize: u16, fsize: u16) -> ImageBuilder {
        ImageBuilder {
            isize,
            fsize,
            inodes: BTreeMap::new(),
            sectors: BTreeMap::new(),
        }
    }

    pub fn inode(&mut self, ino: u16, inode: Ino) -> &mut Self {
        self.inodes.insert(ino, inode);
        self
    }

    /// Lays down raw sector content, NUL padded to a full
    /// sector.
    pub fn sector(&mut self, sector: u16, bytes: &[u8]) -> &mut Self {
        assert!(bytes.len() <= SECTOR_SIZE);
        self.sectors.insert(sector, bytes.to_vec());
        self
    }

    /// Lays down an indirect sector holding the given block
    /// addresses.
    pub fn ptrs(&mut self, sector: u16, ptrs: &[u16]) -> &mut Self {
        let mut bytes = Vec::new();
        for p in ptrs {
            bytes.extend_from_slice(&p.to_le_bytes());
        }
        self.sector(sector, &bytes)
    }

    /// A single-sector directory: entry array in `sector`,
    /// directory inode at `ino`.
    pub fn dir(
        &mut self,
        ino: u16,
        sector: u16,
        entries: &[(u16, &[u8])],
    ) -> &mut Self {
        let mut bytes = Vec::new();
        for &(entry_ino, name) in entries {
            bytes.extend_from_slice(&entry_ino.to_le_bytes());
            let mut field = [0u8; 14];
            field[..name.len()].copy_from_slice(name);
            bytes.extend_from_slice(&field);
        }
        let size = bytes.len() as u32;
        self.sector(sector, &bytes);
        self.inode(
            ino,
            Ino {
                mode: ALLOC | IFDIR,
                nlink: 2,
                size,
                addr: first_addr(sector),
            },
        )
    }

    /// A single-sector regular file.
    pub fn file(&mut self, ino: u16, sector: u16, content: &[u8]) -> &mut Self {
        self.sector(sector, content);
        self.inode(
            ino,
            Ino {
                mode: ALLOC,
                nlink: 1,
                size: content.len() as u32,
                addr: first_addr(sector),
            },
        )
    }

    pub fn build(&self) -> Vec<u8> {
        let mut nsectors = cmp::max(
            usize::from(self.fsize),
            usize::from(self.isize) + 2,
        );
        if let Some((&last, _)) = self.sectors.last_key_value() {
            nsectors = cmp::max(nsectors, usize::from(last) + 1);
        }
        let mut img = vec![0u8; nsectors * SECTOR_SIZE];
        img[512..514].copy_from_slice(&self.isize.to_le_bytes());
        img[514..516].copy_from_slice(&self.fsize.to_le_bytes());
        for (&ino, d) in &self.inodes {
            let off = 2 * SECTOR_SIZE + usize::from(ino - 1) * 32;
            img[off..off + 2].copy_from_slice(&d.mode.to_le_bytes());
            img[off + 2] = d.nlink;
            img[off + 5] = (d.size >> 16) as u8;
            img[off + 6..off + 8]
                .copy_from_slice(&(d.size as u16).to_le_bytes());
            for (k, a) in d.addr.iter().enumerate() {
                img[off + 8 + k * 2..off + 10 + k * 2]
                    .copy_from_slice(&a.to_le_bytes());
            }
        }
        for (&sector, bytes) in &self.sectors {
            let off = usize::from(sector) * SECTOR_SIZE;
            img[off..off + bytes.len()].copy_from_slice(bytes);
        }
        img
    }

    pub fn write(&self) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&self.build()).unwrap();
        file.flush().unwrap();
        file
    }
}

fn first_addr(sector: u16) -> [u16; 8] {
    let mut addr = [0u16; 8];
    addr[0] = sector;
    addr
}

pub fn path(file: &NamedTempFile) -> &str {
    file.path().to_str().unwrap()
}

pub const PASSWD: &[u8] = b"root::0:0::/:\nbin::1:1::/bin:\n";

/// A little root filesystem:
///
/// ```text
/// /
/// |- etc/passwd      regular, sector 7
/// |- usr/sys/ken/    nested directories
/// |- big             large file: 512 x 'A', 512 x 'B',
/// |                  a hole, then 10 x 'C'
/// `- tty             character special
/// ```
pub fn boot_image() -> NamedTempFile {
    let mut b = ImageBuilder::new(2, 64);
    b.dir(
        1,
        4,
        &[
            (1, b"."),
            (1, b".."),
            (2, b"etc"),
            (3, b"usr"),
            (8, b"big"),
            (9, b"tty"),
        ],
    );
    b.dir(2, 5, &[(2, b"."), (1, b".."), (4, b"passwd")]);
    b.dir(3, 6, &[(3, b"."), (1, b".."), (6, b"sys")]);
    b.file(4, 7, PASSWD);
    b.dir(6, 8, &[(6, b"."), (3, b".."), (7, b"ken")]);
    b.dir(7, 9, &[(7, b"."), (6, b"..")]);
    let mut big = Ino { mode: ALLOC | LARGE, nlink: 1, size: 1034, ..Default::default() };
    big.addr[0] = 10;
    b.inode(8, big);
    b.ptrs(10, &[11, 12, 0, 13]);
    b.sector(11, &[b'A'; 512]);
    b.sector(12, &[b'B'; 512]);
    b.sector(13, &[b'C'; 512]);
    let mut tty = Ino { mode: ALLOC | IFCHR, nlink: 1, ..Default::default() };
    tty.addr[0] = 0x0401;
    b.inode(9, tty);
    b.write()
}

/// The expected content of `big` in [`boot_image`].
pub fn big_content() -> Vec<u8> {
    let mut bytes = vec![b'A'; 512];
    bytes.extend_from_slice(&[b'B'; 512]);
    bytes.extend_from_slice(&[b'C'; 10]);
    bytes
}
