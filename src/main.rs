// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
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
use std::{error::Error, path::PathBuf, sync::Arc};

use clap::{crate_version, Parser, Subcommand};
use padmidi::{
    config::{Settings, Skin},
    controller::{keyboard, Controller, KeyMap},
    midi,
    performance::{NoteController, Pattern},
    silencer::Silencer,
    widget::{WidgetGroup, Widgets},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A MIDI pad controller."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start will start the pad controller.
    Start {
        /// The path to the controller config.
        config_path: String,
    },
    /// Lists the available MIDI output devices.
    MidiDevices {},
    /// Lists the built in note patterns.
    Patterns {},
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start { config_path } => start(PathBuf::from(config_path)).await?,
        Commands::MidiDevices {} => {
            let devices = midi::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Patterns {} => {
            println!("Patterns:");
            for (i, pattern) in Pattern::builtin().iter().enumerate() {
                println!("{}: {}", i, pattern);
            }
        }
    }

    Ok(())
}

async fn start(config_path: PathBuf) -> Result<(), Box<dyn Error>> {
    let settings = Settings::load(&config_path)?;
    info!(
        version = settings.version(),
        path = %config_path.display(),
        "Loaded config."
    );

    let (keymap, widgets) = match settings.skin() {
        Some(path) => {
            let skin = Skin::load(path)?;
            info!(title = %skin.title, path = %path.display(), "Loaded skin.");
            let widgets = Widgets {
                pads: WidgetGroup::from_buttons(&skin.pads),
                tonics: WidgetGroup::from_buttons(&skin.tonics),
                octaves: WidgetGroup::from_buttons(&skin.octaves),
                patterns: WidgetGroup::from_buttons(&skin.patterns),
            };
            (KeyMap::from_skin(&skin)?, widgets)
        }
        None => (KeyMap::builtin(), Widgets::default()),
    };

    let output = midi::get_output(settings.midi_device())?;
    info!(output = %output, "Using MIDI output.");

    let silencer = Arc::new(
        Silencer::new(output.clone(), settings.sweep_period())?
            .with_stop_timeout(settings.stop_timeout()),
    );
    let notes = NoteController::new(settings.performance_state(), silencer, output);

    let driver = Arc::new(keyboard::Driver::new(Arc::new(keymap)));
    let mut controller = Controller::new(notes, widgets, driver)?;
    controller.join().await?;

    info!("Pad controller stopped.");
    Ok(())
}
