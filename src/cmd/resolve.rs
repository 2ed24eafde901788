// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::fs::FileSystem;
use crate::result::Result;

pub fn run(fs: &FileSystem, path: &str) -> Result<()> {
    let ino = fs.resolve(path.as_bytes())?;
    println!("{ino}");
    Ok(())
}
