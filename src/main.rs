//! flashloader - Streamed flash loader and local flash installer
//!
//! The device side receives framed commands over a serial link and either
//! streams a file onto removable storage (`SAVE`), streams an image straight
//! into execute-in-place flash (`PROG`) or refreshes its file listing
//! (`__LS`). A second path copies an image that is already on storage into
//! flash.
//!
//! This binary runs the device side against a directory and a flash image
//! file, runs local installs, and acts as the host that sends commands.

mod cli;
mod commands;
mod config;
mod device;
mod progress;
mod transport;

use clap::Parser;
use cli::{Cli, Commands};
use config::Config;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    match cli.command {
        Commands::Serve {
            device,
            serial,
            input,
        } => commands::serve::run(&config, &device, &serial, input.as_deref()),
        Commands::Install {
            name,
            device,
            verify,
        } => commands::install::run(&config, &name, &device, verify),
        Commands::Send {
            kind,
            file,
            name,
            serial,
            output,
        } => commands::send::run(
            &config,
            kind,
            file.as_deref(),
            name.as_deref(),
            &serial,
            output.as_deref(),
        ),
    }
}
