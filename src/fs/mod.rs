// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! This is an implementation of the read paths in the
//! classic Fifth Edition Unix filesystem, suitable for
//! resolving path names against a disk image, extracting
//! the contents of files, and programmatically examining
//! the directory hierarchy.
//!
//! The format is from the era when a big disk was an RK05
//! pack holding a couple of megabytes, and it is pleasingly
//! small. Everything is counted in 512 byte sectors.
//! Sector 0 holds boot code and sector 1 the superblock,
//! which gives the size of the inode area and of the whole
//! filesystem; the inode area follows immediately at sector
//! 2, and everything from there to the end of the
//! filesystem is the data area. An inode is 32 bytes, so
//! sixteen pack into a sector, and each is named by its
//! 1-based index in the area, the i-number; i-number 1 is
//! the root directory. An inode carries eight block
//! addresses. For a small file these address data sectors
//! directly; for a file marked "large" each one addresses
//! an indirect sector holding 256 further addresses, for a
//! maximum file size of a megabyte, which at the time
//! nobody had. Directories are ordinary files whose content
//! is an array of 16 byte entries: a 16-bit i-number
//! followed by a 14 byte, NUL padded name.
//!
//! All multi-byte fields are little-endian, in deference to
//! the PDP-11.
//!
//! References:
//!
//! [Thom78] Ken Thompson. 1978. ``UNIX Implementation''.
//! Bell System Technical Journal 57, 6 (July-August 1978),
//! 1931-1946.

use std::cmp;
use std::fmt;
use std::io::Write;
use std::path::Path;

use bitstruct::bitstruct;
use log::{debug, warn};
use static_assertions::const_assert;

use crate::image::{Image, SECTOR_SIZE, Sector};
use crate::result::{Error, Result};

/// The size of an on-disk inode, in bytes.
pub const INODE_SIZE: usize = 32;

/// Number of inodes packed into one sector.
pub const INODES_PER_SECTOR: usize = SECTOR_SIZE / INODE_SIZE;

/// First sector of the inode area.
pub const INODE_START_SECTOR: u16 = 2;

/// Number of block addresses in an inode.
pub const NADDR: usize = 8;

/// Number of block addresses in an indirect sector.
pub const PTRS_PER_SECTOR: usize = SECTOR_SIZE / 2;

/// The i-number of the root directory.
///
/// I-numbers are origin 1; 0 is the "unused" indicator.
pub const ROOT_INO: u16 = 1;

/// Number of entries in the superblock free list.
const NICFREE: usize = 100;

/// Largest inode-area size that keeps every i-number
/// representable in 16 bits.
const MAX_ISIZE: u16 = u16::MAX / INODES_PER_SECTOR as u16;

/// Directory nesting depth past which the lister refuses to
/// descend. Directory links are restricted, so a deeper
/// tree than this means a damaged image.
const MAX_DEPTH: usize = 128;

const_assert!(SECTOR_SIZE % INODE_SIZE == 0);
const_assert!(PTRS_PER_SECTOR * 2 == SECTOR_SIZE);

/// Decodes a little-endian 16-bit value.
fn le16(bs: &[u8]) -> u16 {
    u16::from_le_bytes([bs[0], bs[1]])
}

/// Superblock, from sector 1.
///
/// Only `isize` and `fsize` matter to the read paths; the
/// free list is materialized but never interpreted.
pub struct SuperBlock {
    isize: u16,
    fsize: u16,
    _nfree: u16,
    _free: [u16; NICFREE],
}

impl SuperBlock {
    /// Decodes the superblock from its sector. The inode
    /// area cannot be empty, and it cannot be so big that
    /// i-numbers overflow 16 bits; either is an impossible
    /// parameter, not a recoverable condition. `fsize` is
    /// deliberately not checked against the length of the
    /// image file: block references outside the image are
    /// caught where they are used.
    pub fn decode(buf: &Sector) -> Result<SuperBlock> {
        let isize = le16(&buf[0..2]);
        let fsize = le16(&buf[2..4]);
        if isize == 0 || isize > MAX_ISIZE {
            return Err(Error::InvSuper);
        }
        let mut free = [0u16; NICFREE];
        for (i, f) in free.iter_mut().enumerate() {
            *f = le16(&buf[6 + i * 2..]);
        }
        Ok(SuperBlock { isize, fsize, _nfree: le16(&buf[4..6]), _free: free })
    }

    /// Number of inodes in the inode area.
    pub fn inode_count(&self) -> u16 {
        self.isize * INODES_PER_SECTOR as u16
    }

    /// First sector of the data area.
    pub fn data_start(&self) -> u16 {
        INODE_START_SECTOR + self.isize
    }

    /// Last valid data sector. When `fsize` is zero there
    /// are no valid data sectors and this falls below
    /// `data_start`.
    pub fn data_end(&self) -> u16 {
        self.fsize.saturating_sub(1)
    }
}

/// The type of a file, from the inode mode word.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum FileType {
    Regular,
    Char,
    Dir,
    Block,
}

/// This block of constants provides the traditional Unix
/// names for the file types, as the two-bit type field of
/// the mode word encodes them.
const IFREG: u8 = 0o0;
const IFCHR: u8 = 0o1;
const IFDIR: u8 = 0o2;
const IFBLK: u8 = 0o3;

bitstruct! {
    /// The parsed representation of the mode word from an
    /// inode. Permission bits exist on disk but nothing in
    /// the read paths consults them, so they are not broken
    /// out here.
    #[derive(Clone, Copy)]
    pub struct Mode(u16) {
        large: bool = 12;
        typ: FileType = 13..=14;
        allocated: bool = 15;
    }
}

impl bitstruct::FromRaw<u8, FileType> for Mode {
    fn from_raw(raw: u8) -> FileType {
        match raw {
            IFCHR => FileType::Char,
            IFDIR => FileType::Dir,
            IFBLK => FileType::Block,
            _ => FileType::Regular,
        }
    }
}

impl bitstruct::IntoRaw<u8, FileType> for Mode {
    fn into_raw(typ: FileType) -> u8 {
        match typ {
            FileType::Regular => IFREG,
            FileType::Char => IFCHR,
            FileType::Dir => IFDIR,
            FileType::Block => IFBLK,
        }
    }
}

impl fmt::Debug for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let typ = match self.typ() {
            FileType::Regular => '-',
            FileType::Char => 'c',
            FileType::Dir => 'd',
            FileType::Block => 'b',
        };
        write!(f, "{typ}:{:#08o}", self.0)
    }
}

/// The storage-resident form of an inode, decoded from its
/// 32-byte record. The two time fields in the last eight
/// bytes are not decoded; nothing here wants them.
#[derive(Clone, Copy, Default)]
pub struct DiskInode {
    mode: u16,
    nlink: u8,
    uid: u8,
    gid: u8,
    size0: u8,
    size1: u16,
    addr: [u16; NADDR],
}

impl DiskInode {
    fn decode(bs: &[u8]) -> DiskInode {
        let mut addr = [0u16; NADDR];
        for (k, a) in addr.iter_mut().enumerate() {
            *a = le16(&bs[8 + k * 2..]);
        }
        DiskInode {
            mode: le16(&bs[0..2]),
            nlink: bs[2],
            uid: bs[3],
            gid: bs[4],
            size0: bs[5],
            size1: le16(&bs[6..8]),
            addr,
        }
    }
}

/// A V5 filesystem over an image file.
///
/// The inode table is materialized once at open time and is
/// immutable thereafter; everything else is decoded on
/// demand.
pub struct FileSystem {
    img: Image,
    sb: SuperBlock,
    inodes: Vec<DiskInode>,
}

impl FileSystem {
    /// Opens an image and reads the superblock and the
    /// whole inode area.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<FileSystem> {
        let img = Image::open(path)?;
        let sb = SuperBlock::decode(&img.read_sector(1)?)?;
        let mut inodes =
            vec![DiskInode::default(); usize::from(sb.inode_count()) + 1];
        for s in 0..sb.isize {
            let buf = img.read_sector(u32::from(INODE_START_SECTOR + s))?;
            for i in 0..INODES_PER_SECTOR {
                let ino = usize::from(s) * INODES_PER_SECTOR + i + 1;
                inodes[ino] = DiskInode::decode(&buf[i * INODE_SIZE..]);
            }
        }
        Ok(FileSystem { img, sb, inodes })
    }

    /// Number of inodes in the inode area; i-numbers run
    /// from 1 to this, inclusive.
    pub fn inode_count(&self) -> u16 {
        self.sb.inode_count()
    }

    /// Returns the inode with the given i-number.
    pub fn inode(&self, ino: u16) -> Result<Inode<'_>> {
        if ino == 0 || ino > self.inode_count() {
            return Err(Error::InvInum);
        }
        Ok(Inode { dinode: self.inodes[usize::from(ino)], ino, fs: self })
    }

    /// Whether `sector` lies inside the data area.
    pub fn in_data_area(&self, sector: u16) -> bool {
        sector >= self.sb.data_start() && sector <= self.sb.data_end()
    }

    /// Maps an absolute path name to an i-number, walking
    /// directories down from the root. Empty components are
    /// discarded, so `/usr//sys/` and `/usr/sys` resolve
    /// identically. Each component is matched against the
    /// fixed-width name field, so components longer than
    /// fourteen bytes match on their prefix.
    pub fn resolve(&self, path: &[u8]) -> Result<u16> {
        if path.first() != Some(&b'/') {
            return Err(Error::InvPath);
        }
        let mut cur = ROOT_INO;
        for comp in path.split(|&b| b == b'/') {
            if comp.is_empty() {
                continue;
            }
            let dir =
                Directory::try_new(self.inode(cur)?).ok_or(Error::NoFile)?;
            cur = dir
                .iter()
                .find(|e| e.matches(comp))
                .map(|e| e.ino())
                .ok_or(Error::NoFile)?;
        }
        debug!("resolve: {} -> {cur}", String::from_utf8_lossy(path));
        Ok(cur)
    }

    /// Reconstructs the canonical absolute path name of a
    /// directory, with a trailing slash, by repeatedly
    /// reading `..` and then locating the forward link in
    /// the parent. The walk is bounded by the inode count;
    /// a well formed tree reaches the root long before
    /// that. The root itself is simply `/`.
    pub fn dir_path(&self, ino: u16) -> Result<Vec<u8>> {
        Directory::try_new(self.inode(ino)?).ok_or(Error::NotDir)?;
        let mut names = Vec::new();
        let mut cur = ino;
        let mut steps = 0;
        while cur != ROOT_INO {
            if steps >= self.inode_count() {
                return Err(Error::DirLoop);
            }
            steps += 1;
            let dir =
                Directory::try_new(self.inode(cur)?).ok_or(Error::NotDir)?;
            let parent = dir
                .iter()
                .find(|e| e.name() == b"..")
                .map(|e| e.ino())
                .ok_or(Error::NoDotDot)?;
            let pdir =
                Directory::try_new(self.inode(parent)?).ok_or(Error::NotDir)?;
            let name = pdir
                .iter()
                .find(|e| {
                    e.ino() == cur && e.name() != b"." && e.name() != b".."
                })
                .ok_or(Error::NoLink)?;
            names.push(name.name().to_vec());
            cur = parent;
        }
        let mut path = vec![b'/'];
        for name in names.iter().rev() {
            path.extend_from_slice(name);
            path.push(b'/');
        }
        Ok(path)
    }

    /// Streams the first `size` bytes of a regular file to
    /// `out`. Zero block pointers contribute no bytes and do
    /// not advance the count; a non-zero pointer outside the
    /// data area is fatal here, where the enumeration paths
    /// would skip it.
    pub fn extract<W: Write>(&self, ino: u16, out: &mut W) -> Result<()> {
        let ip = self.inode(ino)?;
        if !ip.mode().allocated() {
            return Err(Error::NoFile);
        }
        if ip.file_type() != FileType::Regular {
            return Err(Error::NotFile);
        }
        debug!("extract: {ip:?}");
        let size = ip.size();
        let mut written = 0;
        for sector in ip.blocks() {
            if written == size {
                break;
            }
            let sector = sector?;
            if sector == 0 {
                continue;
            }
            if !self.in_data_area(sector) {
                return Err(Error::BadBlock);
            }
            let buf = self.img.read_sector(u32::from(sector))?;
            let n = cmp::min(SECTOR_SIZE, size - written);
            out.write_all(&buf[..n])?;
            written += n;
        }
        Ok(())
    }

    /// Emits the depth-first hierarchy listing rooted at
    /// directory `ino`, one token per line. The top level
    /// lists `../` and `./` first; each nested directory is
    /// followed by its own `../` and `./` tokens and then
    /// its contents, all in on-disk entry order.
    pub fn list<W: Write>(&self, ino: u16, out: &mut W) -> Result<()> {
        let dir = Directory::try_new(self.inode(ino)?).ok_or(Error::NotDir)?;
        out.write_all(b"../\n")?;
        out.write_all(b"./\n")?;
        self.list_dir(&dir, &mut Vec::new(), out, 0)
    }

    fn list_dir<W: Write>(
        &self,
        dir: &Directory<'_>,
        prefix: &mut Vec<u8>,
        out: &mut W,
        depth: usize,
    ) -> Result<()> {
        for entry in dir.iter() {
            let name = entry.name();
            if name == b"." || name == b".." {
                continue;
            }
            let child = match self.inode(entry.ino()) {
                Ok(ip) if ip.mode().allocated() => ip,
                _ => {
                    debug!("list: skipping bad i-number {}", entry.ino());
                    continue;
                }
            };
            match Directory::try_new(child) {
                Some(sub) => {
                    for tail in [b"/\n".as_slice(), b"/../\n", b"/./\n"] {
                        out.write_all(prefix)?;
                        out.write_all(name)?;
                        out.write_all(tail)?;
                    }
                    if depth + 1 >= MAX_DEPTH {
                        warn!(
                            "list: nesting exceeds {MAX_DEPTH}, not descending"
                        );
                        continue;
                    }
                    let mark = prefix.len();
                    prefix.extend_from_slice(name);
                    prefix.push(b'/');
                    self.list_dir(&sub, prefix, out, depth + 1)?;
                    prefix.truncate(mark);
                }
                None => {
                    out.write_all(prefix)?;
                    out.write_all(name)?;
                    out.write_all(b"\n")?;
                }
            }
        }
        Ok(())
    }
}

/// An in-memory inode, paired with its i-number and the
/// filesystem it came from. Note that the i-number is not
/// part of the on-disk representation.
#[derive(Clone)]
pub struct Inode<'fs> {
    dinode: DiskInode,
    ino: u16,
    fs: &'fs FileSystem,
}

impl<'fs> Inode<'fs> {
    /// The file's i-number.
    pub fn ino(&self) -> u16 {
        self.ino
    }

    /// The 24-bit file size, in bytes.
    pub fn size(&self) -> usize {
        usize::from(self.dinode.size0) << 16 | usize::from(self.dinode.size1)
    }

    pub fn mode(&self) -> Mode {
        Mode(self.dinode.mode)
    }

    /// The type of this file.
    pub fn file_type(&self) -> FileType {
        self.mode().typ()
    }

    /// Returns a lazy iterator over the data sectors of
    /// this file, in file order.
    pub fn blocks(&self) -> Blocks<'fs> {
        Blocks {
            fs: self.fs,
            addr: self.dinode.addr,
            large: self.mode().large(),
            slot: 0,
            indirect: None,
        }
    }
}

impl fmt::Debug for Inode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "inode {} ({:?} nlink {} uid {} gid {} size {})",
            self.ino(),
            self.mode(),
            self.dinode.nlink,
            self.dinode.uid,
            self.dinode.gid,
            self.size()
        )
    }
}

/// Lazy sequence of the data sector addresses referenced by
/// an inode, in file order.
///
/// For a small file the eight direct addresses are yielded
/// as they are, zeros included: a zero means hole or end,
/// and the consumer decides which. For a large file every
/// non-zero direct address names an indirect sector holding
/// 256 further addresses, which are yielded in order. An
/// indirect pointer that cannot be loaded yields a single
/// `Err` and iteration continues with the next pointer, so
/// a scanning consumer can skip it while extraction treats
/// it as fatal. Yielded addresses are not range checked;
/// that, too, is consumer policy.
pub struct Blocks<'fs> {
    fs: &'fs FileSystem,
    addr: [u16; NADDR],
    large: bool,
    slot: usize,
    indirect: Option<(Sector, usize)>,
}

impl Iterator for Blocks<'_> {
    type Item = Result<u16>;

    fn next(&mut self) -> Option<Result<u16>> {
        loop {
            if let Some((buf, next)) = &mut self.indirect {
                if *next < PTRS_PER_SECTOR {
                    let sector = le16(&buf[*next * 2..]);
                    *next += 1;
                    return Some(Ok(sector));
                }
                self.indirect = None;
            }
            if self.slot == NADDR {
                return None;
            }
            let addr = self.addr[self.slot];
            self.slot += 1;
            if !self.large {
                return Some(Ok(addr));
            }
            if addr == 0 {
                continue;
            }
            if !self.fs.in_data_area(addr) {
                return Some(Err(Error::BadBlock));
            }
            match self.fs.img.read_sector(u32::from(addr)) {
                Ok(buf) => self.indirect = Some((buf, 0)),
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

pub mod check;
mod dir;

pub use dir::Directory;
