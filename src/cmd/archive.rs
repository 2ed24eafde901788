// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io::{self, BufWriter, Write};

use crate::fs::{FileSystem, ROOT_INO};
use crate::result::Result;

pub fn run(fs: &FileSystem) -> Result<()> {
    let mut out = BufWriter::new(io::stdout().lock());
    fs.list(ROOT_INO, &mut out)?;
    out.flush()?;
    Ok(())
}
