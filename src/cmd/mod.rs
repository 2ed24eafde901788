// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The command surface: one mode per invocation, selected
//! by flag, operating on the filesystem opened from the
//! image named by `-f`.

use std::path::PathBuf;

use clap::{ArgGroup, Parser};

use crate::fs::FileSystem;
use crate::result::{Error, Result};

mod archive;
mod check;
mod extract;
mod list;
mod pathname;
mod resolve;

/// Parsed command line.
///
/// Exactly one mode flag must be given. `-i` and `-n`
/// select how the operand is interpreted; exactly one is
/// required with `-x` and `-l` and neither is allowed
/// elsewhere, a rule the flag grammar cannot carry, so
/// `operation` applies it after parsing. The `-h` flag is
/// handled before parsing ever starts.
#[derive(Debug, Parser)]
#[command(name = "v5fs", disable_help_flag = true, disable_version_flag = true)]
#[command(group(ArgGroup::new("mode").required(true)))]
#[command(group(ArgGroup::new("interp")))]
pub struct Args {
    /// Disk image to inspect.
    #[arg(short = 'f', value_name = "diskimage", required = true)]
    image: PathBuf,

    /// Extract a regular file's bytes to stdout.
    #[arg(short = 'x', group = "mode")]
    extract: bool,

    /// Resolve an absolute path name to an i-number.
    #[arg(short = 'r', group = "mode")]
    resolve: bool,

    /// Map a directory i-number back to its canonical path.
    #[arg(short = 'p', group = "mode")]
    pathname: bool,

    /// List a directory hierarchy, depth first.
    #[arg(short = 'l', group = "mode")]
    list: bool,

    /// Serialize the full hierarchy from the root.
    #[arg(short = 'a', group = "mode")]
    archive: bool,

    /// Check filesystem consistency.
    #[arg(short = 'c', group = "mode")]
    check: bool,

    /// Interpret the operand as an i-number.
    #[arg(short = 'i', group = "interp")]
    by_inum: bool,

    /// Interpret the operand as a path name.
    #[arg(short = 'n', group = "interp")]
    by_name: bool,

    /// The mode's operand: a path name or an i-number.
    operand: Option<String>,
}

/// The operation selected by the mode flags, with its
/// operand decoded.
enum Op<'a> {
    Extract(Target<'a>),
    Resolve(&'a str),
    Pathname(u32),
    List(Target<'a>),
    Archive,
    Check,
}

/// What the operand of `-x` or `-l` names.
enum Target<'a> {
    Inum(u32),
    Name(&'a str),
}

impl Target<'_> {
    /// The i-number this target denotes, resolving path
    /// names against the filesystem. An i-number too big
    /// for the on-disk representation cannot name anything.
    fn lookup(&self, fs: &FileSystem) -> Result<u16> {
        match self {
            Target::Inum(v) => {
                u16::try_from(*v).map_err(|_| Error::InvInum)
            }
            Target::Name(path) => fs.resolve(path.as_bytes()),
        }
    }
}

impl Args {
    /// Applies the invocation rules the flag grammar alone
    /// cannot express, and decodes the operand.
    fn operation(&self) -> Result<Op<'_>> {
        let wants_interp = self.extract || self.list;
        if wants_interp != (self.by_inum || self.by_name) {
            return Err(Error::BadArgs);
        }
        let operand = self.operand.as_deref();
        if self.extract || self.list {
            let operand = operand.ok_or(Error::BadArgs)?;
            let target = if self.by_inum {
                Target::Inum(parse_inum(operand)?)
            } else {
                Target::Name(operand)
            };
            return Ok(if self.extract {
                Op::Extract(target)
            } else {
                Op::List(target)
            });
        }
        if self.resolve {
            let operand = operand.ok_or(Error::BadArgs)?;
            if !operand.starts_with('/') {
                return Err(Error::BadArgs);
            }
            return Ok(Op::Resolve(operand));
        }
        if self.pathname {
            return Ok(Op::Pathname(parse_inum(
                operand.ok_or(Error::BadArgs)?,
            )?));
        }
        // Neither -a nor -c takes an operand.
        if operand.is_some() {
            return Err(Error::BadArgs);
        }
        Ok(if self.archive { Op::Archive } else { Op::Check })
    }
}

/// Parses a positive decimal i-number.
fn parse_inum(s: &str) -> Result<u32> {
    match s.parse::<u32>() {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(Error::NumParse),
    }
}

/// Runs the selected operation against the image.
pub fn run(args: &Args) -> Result<()> {
    let op = args.operation()?;
    let fs = FileSystem::open(&args.image)?;
    match op {
        Op::Extract(target) => extract::run(&fs, &target),
        Op::Resolve(path) => resolve::run(&fs, path),
        Op::Pathname(inum) => pathname::run(&fs, inum),
        Op::List(target) => list::run(&fs, &target),
        Op::Archive => archive::run(&fs),
        Op::Check => check::run(&fs),
    }
}

/// One-line usage synopsis, printed on invocation errors.
pub fn usage_line() {
    eprintln!(
        "Usage: v5fs -f <diskimage> (-x | -r | -p | -l | -a | -c) \
         [-i | -n] [arg]"
    );
}

/// Full usage text, printed for `-h`.
pub fn usage() {
    usage_line();
    eprintln!("Options:");
    eprintln!("  -h               Show this help message and exit");
    eprintln!("  -f <diskimage>   Disk image file (required)");
    eprintln!("  -x               Extract a file to stdout (needs -i or -n)");
    eprintln!("  -r               Resolve an absolute path to an i-number");
    eprintln!("  -p               Map a directory i-number to its path");
    eprintln!("  -l               List a directory hierarchy (needs -i or -n)");
    eprintln!("  -a               Serialize the hierarchy from the root");
    eprintln!("  -c               Check filesystem consistency");
    eprintln!("  -i               Interpret the operand as an i-number");
    eprintln!("  -n               Interpret the operand as a path name");
}
