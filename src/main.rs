// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Read-only inspector for Fifth Edition UNIX filesystem
//! images: resolves path names to i-numbers and back,
//! extracts file contents, lists directory hierarchies, and
//! checks image consistency.

use std::env;
use std::process;

use clap::Parser;

mod cmd;
mod fs;
mod image;
mod result;

use crate::result::Error;

fn main() {
    // -h wins over everything else, and reports on stderr,
    // leaving stdout pristine for the data modes.
    if env::args().skip(1).any(|arg| arg == "-h") {
        cmd::usage();
        return;
    }
    env_logger::init();
    let args = match cmd::Args::try_parse() {
        Ok(args) => args,
        Err(err) => err.exit(),
    };
    if let Err(err) = cmd::run(&args) {
        match err {
            Error::BadArgs | Error::NumParse => cmd::usage_line(),
            _ => eprintln!("v5fs: {err:?}"),
        }
        process::exit(1);
    }
}
