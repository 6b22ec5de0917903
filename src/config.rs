//! Command-line configuration. Grounded on the teacher's `config.rs`
//! (`#[derive(Parser)]` struct, `#[clap(long = ..., help = ...)]` fields),
//! generalized from a single redo-log path option to the image path,
//! on-disk variant, and per-operation subcommand the engine needs.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::layout::Variant;

#[derive(Parser)]
#[command(about = "Inspect and manipulate ZealFS images")]
pub struct Config {
    #[clap(long, help = "Path to the backing image file")]
    pub image: PathBuf,

    #[clap(long, default_value = "v2", help = "On-disk variant: v1 or v2")]
    pub variant: CliVariant,

    #[clap(
        long = "size-kib",
        default_value = "1024",
        help = "Image size in KiB; only consulted by `format`"
    )]
    pub size_kib: u64,

    #[clap(
        long,
        default_value = "false",
        help = "Wrap a freshly formatted v2 image in an MBR partition table"
    )]
    pub mbr: bool,

    #[clap(short, long, default_value = "false", help = "Enable debug logging")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum CliVariant {
    V1,
    V2,
}

impl From<CliVariant> for Variant {
    fn from(v: CliVariant) -> Self {
        match v {
            CliVariant::V1 => Variant::V1,
            CliVariant::V2 => Variant::V2,
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Format a new image, overwriting any existing file at `--image`.
    Format,
    /// List the contents of a directory.
    Ls { path: String },
    /// Print a file's contents to stdout.
    Cat { path: String },
    /// Write stdin to a file, creating it first if necessary.
    Write { path: String },
    /// Create an empty directory.
    Mkdir { path: String },
    /// Remove a file.
    Rm { path: String },
    /// Remove an empty directory.
    Rmdir { path: String },
    /// Rename or move a file or directory.
    Mv { from: String, to: String },
}
