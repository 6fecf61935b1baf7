//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sfnor")]
#[command(author, version, about = "SPI NOR flash update tool (simulated device)", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Backing image file for the simulated chip; created on demand and
    /// written back after the command
    #[arg(long, global = true)]
    pub image: Option<PathBuf>,

    /// Simulated chip capacity in bytes
    #[arg(long, global = true, default_value_t = 16 * 1024 * 1024)]
    pub flash_size: u32,

    /// Simulated erase block size in bytes
    #[arg(long, global = true, default_value_t = 4096)]
    pub sector_size: u32,

    /// Simulate a chip without whole-chip erase support
    #[arg(long, global = true)]
    pub no_bulk_erase: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Select and initialize the flash device
    Probe {
        /// Addressing token: chip select, or bus:cs
        target: Option<String>,

        /// SPI clock speed in Hz
        speed: Option<String>,

        /// SPI transfer mode (hexadecimal)
        mode: Option<String>,
    },

    /// Read flash contents to a file (offset and length hexadecimal)
    Read {
        offset: String,
        len: String,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Write a file to flash (offset hexadecimal); the range must be
    /// erased first
    Write {
        offset: String,

        /// Input file path
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Differentially update flash from a file, skipping unchanged
    /// erase blocks (offset hexadecimal)
    Update {
        offset: String,

        /// Input file path
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Erase a range; the length is decimal unless it carries a `0x`
    /// prefix, and a leading `+` rounds it up to the next erase block
    /// boundary
    Erase { offset: String, len: String },

    /// Erase the entire chip
    Bulkerase,
}
