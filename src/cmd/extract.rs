// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io::{self, BufWriter, Write};

use crate::cmd::Target;
use crate::fs::FileSystem;
use crate::result::Result;

pub fn run(fs: &FileSystem, target: &Target<'_>) -> Result<()> {
    let ino = target.lookup(fs)?;
    let mut out = BufWriter::new(io::stdout().lock());
    fs.extract(ino, &mut out)?;
    out.flush()?;
    Ok(())
}
