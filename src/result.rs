// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;
use std::io;

/// Various errors
#[derive(Clone, Copy, Eq, Ord, PartialEq, PartialOrd)]
pub enum Error {
    Open,
    Io,
    InvSuper,
    InvInum,
    InvPath,
    NoFile,
    NotDir,
    NotFile,
    NoDotDot,
    NoLink,
    DirLoop,
    BadBlock,
    NumParse,
    BadArgs,
    Inconsistent,
}

impl Error {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "Unable to open disk image",
            Self::Io => "I/O error on disk image",
            Self::InvSuper => "Bad parameters in superblock",
            Self::InvInum => "I-number out of range",
            Self::InvPath => "Invalid path",
            Self::NoFile => "No such file or directory",
            Self::NotDir => "Not a directory",
            Self::NotFile => "Not a regular file",
            Self::NoDotDot => "Directory has no '..' entry",
            Self::NoLink => "Directory not linked from its parent",
            Self::DirLoop => "Directory tree does not reach the root",
            Self::BadBlock => "Block address outside the data area",
            Self::NumParse => "Error parsing number from string",
            Self::BadArgs => "Bad command arguments",
            Self::Inconsistent => "File system is inconsistent",
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> core::result::Result<(), fmt::Error> {
        write!(f, "{}", self.as_str())
    }
}

impl From<io::Error> for Error {
    fn from(_err: io::Error) -> Error {
        Error::Io
    }
}

pub(crate) type Result<T> = core::result::Result<T, Error>;
