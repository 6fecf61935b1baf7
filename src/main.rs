//! sfnor - SPI NOR flash update tool
//!
//! Drives the `sf` command dispatcher against a simulated flash chip,
//! optionally backed by an image file so runs have persistent effect.
//! Source and destination data live in a simulated RAM window; input
//! files are staged there before the command and read back afterwards,
//! mirroring how the commands address memory on real hardware.

mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use sfnor_core::args;
use sfnor_core::dispatch::Dispatcher;
use sfnor_core::Error;
use sfnor_sim::{SimBus, SimConfig, SimMemory};
use std::fs;
use std::process::ExitCode;

/// Base address of the simulated RAM window.
const RAM_BASE: u64 = 0x8000_0000;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("sfnor: {}", e);
            match e.downcast_ref::<Error>() {
                Some(err) if err.is_usage() => ExitCode::from(2),
                _ => ExitCode::FAILURE,
            }
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = SimConfig {
        size: cli.flash_size,
        erase_block_size: cli.sector_size,
        bulk_erase_supported: !cli.no_bulk_erase,
    };
    let bus = match &cli.image {
        Some(path) => SimBus::with_image(config, path)?,
        None => SimBus::new(config),
    };

    // Size the RAM window to the command's data before the dispatcher
    // takes ownership of it.
    let staged = match &cli.command {
        Commands::Read { len, .. } => vec![0u8; args::parse_hex(len)? as usize],
        Commands::Write { input, .. } | Commands::Update { input, .. } => fs::read(input)?,
        _ => Vec::new(),
    };
    let mut memory = SimMemory::new(RAM_BASE, staged.len());
    memory.load(RAM_BASE, &staged);

    let mut sf = Dispatcher::new(bus, memory);
    let addr = format!("{:x}", RAM_BASE);
    let data_len = format!("{:x}", staged.len());

    match &cli.command {
        Commands::Probe {
            target,
            speed,
            mode,
        } => {
            let mut argv = vec!["probe"];
            for token in [target, speed, mode].into_iter().flatten() {
                argv.push(token.as_str());
            }
            sf.dispatch(&argv)?;
        }
        Commands::Read {
            offset,
            len,
            output,
        } => {
            sf.dispatch(&["probe"])?;
            sf.dispatch(&["read", &addr, offset, len])?;
            fs::write(output, sf.memory().bytes())?;
            println!("read {} bytes to {}", sf.memory().bytes().len(), output.display());
        }
        Commands::Write { offset, input } => {
            sf.dispatch(&["probe"])?;
            sf.dispatch(&["write", &addr, offset, &data_len])?;
            println!("wrote {} bytes from {}", staged.len(), input.display());
        }
        Commands::Update { offset, input } => {
            sf.dispatch(&["probe"])?;
            log::debug!("updating {:#x} bytes from {}", staged.len(), input.display());
            sf.dispatch(&["update", &addr, offset, &data_len])?;
        }
        Commands::Erase { offset, len } => {
            sf.dispatch(&["probe"])?;
            sf.dispatch(&["erase", offset, len])?;
        }
        Commands::Bulkerase => {
            sf.dispatch(&["probe"])?;
            sf.dispatch(&["bulkerase"])?;
        }
    }

    sf.bus().save_image()?;
    Ok(())
}
