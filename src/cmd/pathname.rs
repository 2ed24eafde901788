// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io::{self, Write};

use crate::fs::FileSystem;
use crate::result::{Error, Result};

pub fn run(fs: &FileSystem, inum: u32) -> Result<()> {
    let ino = u16::try_from(inum).map_err(|_| Error::InvInum)?;
    let path = fs.dir_path(ino)?;
    let mut out = io::stdout().lock();
    out.write_all(&path)?;
    out.write_all(b"\n")?;
    Ok(())
}
