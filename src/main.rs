// Copyright (C) 2026 Talkless Contributors
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use std::error::Error;
use std::path::{Path, PathBuf};

use clap::{crate_version, Parser, Subcommand};
use talkless::{
    audio,
    config::{init_engine_and_controller, Talkless},
    library::Library,
};

#[derive(Parser)]
#[clap(
    author = "Talkless Contributors",
    version = crate_version!(),
    about = "A soundboard that plays clips into your microphone feed."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio input and output devices.
    Devices {},
    /// Reports which devices the soundboard would route through and what
    /// looks misconfigured.
    Diagnose {},
    /// Lists the clips in the library of the given configuration.
    Clips {
        /// The path to the talkless config.
        config_path: String,
    },
    /// Start will start the soundboard.
    Start {
        /// The path to the talkless config.
        config_path: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Diagnose {} => {
            print!("{}", audio::diagnose()?);
        }
        Commands::Clips { config_path } => {
            let config_path = PathBuf::from(config_path);
            let config = Talkless::deserialize(&config_path)?;
            let base = config_path.parent().unwrap_or(Path::new(""));
            let Some(root) = config.library(base) else {
                println!("No library configured.");
                return Ok(());
            };

            let library = Library::open(&root)?;
            if library.is_empty() {
                println!("No clips found in {}.", root.display());
                return Ok(());
            }

            println!("Clips (count: {}):", library.len());
            for record in library.records() {
                let triggers = if record.triggers.is_empty() {
                    String::new()
                } else {
                    format!(" [{}]", record.triggers.join(", "))
                };
                println!(
                    "- [{}] {} ({}, volume {:.2}){}",
                    record.id, record.name, record.file, record.volume, triggers
                );
            }
        }
        Commands::Start { config_path } => {
            init_engine_and_controller(&PathBuf::from(config_path))?
                .join()
                .await?;
        }
    }

    Ok(())
}
