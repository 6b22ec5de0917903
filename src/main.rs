use std::io::{self, Read, Write as _};

use clap::Parser;

use zealfs::config::{Command, Config};
use zealfs::volume::{RenameFlags, Volume};

fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    let default_level = if config.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
    let variant = config.variant.into();

    if matches!(&config.command, Command::Format) {
        Volume::format(&config.image, variant, config.size_kib, config.mbr)?;
        return Ok(());
    }

    let mut volume = Volume::load(&config.image, variant)?;

    match config.command {
        Command::Format => unreachable!("handled above"),
        Command::Ls { path } => {
            let handle = volume.opendir(&path)?;
            for entry in volume.readdir(&handle) {
                println!("{}{}", entry.name, if entry.is_dir { "/" } else { "" });
            }
        }
        Command::Cat { path } => {
            let handle = volume.open(&path)?;
            let mut offset = 0u64;
            let mut stdout = io::stdout();
            loop {
                let chunk = volume.read(&handle, offset, 4096)?;
                if chunk.is_empty() {
                    break;
                }
                stdout.write_all(&chunk)?;
                offset += chunk.len() as u64;
            }
        }
        Command::Write { path } => {
            let mut input = Vec::new();
            io::stdin().read_to_end(&mut input)?;
            if volume.open(&path).is_err() {
                volume.create(&path)?;
            }
            let handle = volume.open(&path)?;
            volume.write(&handle, 0, &input)?;
        }
        Command::Mkdir { path } => volume.mkdir(&path)?,
        Command::Rm { path } => volume.unlink(&path)?,
        Command::Rmdir { path } => volume.rmdir(&path)?,
        Command::Mv { from, to } => volume.rename(&from, &to, RenameFlags::None)?,
    }

    volume.teardown()?;
    Ok(())
}
