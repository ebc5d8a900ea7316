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
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use config::{Config, File, FileFormat};
use duration_string::DurationString;
use serde::Deserialize;

use super::error::ConfigError;
use crate::{
    performance::{PerformanceState, DEFAULT_DURATION, DEFAULT_VELOCITY},
    silencer::{DEFAULT_PERIOD, DEFAULT_STOP_TIMEOUT},
};

/// The INI representation of the settings file.
#[derive(Deserialize)]
struct SettingsFile {
    #[serde(rename = "DEFAULT", alias = "default")]
    defaults: Option<Defaults>,
}

/// The [DEFAULT] section of the settings file.
#[derive(Deserialize)]
struct Defaults {
    /// Must be present for the file to be considered valid.
    version: Option<String>,
    /// The skin descriptor, relative to the settings file.
    skin: Option<String>,
    /// The MIDI output to play through.
    midi_device: Option<String>,
    channel: Option<u8>,
    instrument: Option<u8>,
    velocity: Option<u8>,
    /// How long each note plays, e.g. 250ms.
    duration: Option<String>,
    /// How often sounding notes are checked for expiry.
    sweep_period: Option<String>,
    /// How long shutdown waits for notes to be silenced.
    stop_timeout: Option<String>,
    /// Whether notes sustain until silenced.
    sustain: Option<bool>,
}

/// Settings for the pad controller.
#[derive(Debug, Clone)]
pub struct Settings {
    version: String,
    skin: Option<PathBuf>,
    midi_device: Option<String>,
    channel: u8,
    instrument: u8,
    velocity: u8,
    duration: Duration,
    sweep_period: Duration,
    stop_timeout: Duration,
    sustain: bool,
}

impl Settings {
    /// Loads the settings from an INI file.
    pub fn load(path: &Path) -> Result<Settings, ConfigError> {
        let config = Config::builder()
            .add_source(File::from(path).format(FileFormat::Ini))
            .build()?;
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Settings::from_config(config, &base_dir)
    }

    /// Parses settings from INI contents. Relative paths resolve against base_dir.
    pub fn parse(contents: &str, base_dir: &Path) -> Result<Settings, ConfigError> {
        let config = Config::builder()
            .add_source(File::from_str(contents, FileFormat::Ini))
            .build()?;
        Settings::from_config(config, base_dir)
    }

    fn from_config(config: Config, base_dir: &Path) -> Result<Settings, ConfigError> {
        let defaults = config
            .try_deserialize::<SettingsFile>()?
            .defaults
            .ok_or(ConfigError::MissingField {
                context: "DEFAULT".to_string(),
                field: "version",
            })?;

        let version = defaults.version.ok_or(ConfigError::MissingField {
            context: "DEFAULT".to_string(),
            field: "version",
        })?;

        let channel = defaults.channel.unwrap_or(0);
        if channel > 15 {
            return Err(ConfigError::Invalid {
                field: "channel",
                message: format!("{} is not between 0 and 15", channel),
            });
        }
        let instrument = max_127("instrument", defaults.instrument.unwrap_or(0))?;
        let velocity = max_127("velocity", defaults.velocity.unwrap_or(DEFAULT_VELOCITY))?;

        let sweep_period = parse_duration(defaults.sweep_period, DEFAULT_PERIOD)?;
        if sweep_period.is_zero() {
            return Err(ConfigError::Invalid {
                field: "sweep_period",
                message: "must be greater than zero".to_string(),
            });
        }

        Ok(Settings {
            version,
            skin: defaults.skin.map(|skin| resolve_path(base_dir, &skin)),
            midi_device: defaults.midi_device,
            channel,
            instrument,
            velocity,
            duration: parse_duration(defaults.duration, DEFAULT_DURATION)?,
            sweep_period,
            stop_timeout: parse_duration(defaults.stop_timeout, DEFAULT_STOP_TIMEOUT)?,
            sustain: defaults.sustain.unwrap_or(false),
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// The resolved path to the skin descriptor, if there is one.
    pub fn skin(&self) -> Option<&Path> {
        self.skin.as_deref()
    }

    pub fn midi_device(&self) -> Option<&str> {
        self.midi_device.as_deref()
    }

    pub fn sweep_period(&self) -> Duration {
        self.sweep_period
    }

    pub fn stop_timeout(&self) -> Duration {
        self.stop_timeout
    }

    /// The initial performance state described by these settings.
    pub fn performance_state(&self) -> PerformanceState {
        PerformanceState::new(self.channel, self.velocity, self.instrument, self.duration)
            .with_sustain(self.sustain)
    }
}

fn max_127(field: &'static str, value: u8) -> Result<u8, ConfigError> {
    if value > 127 {
        return Err(ConfigError::Invalid {
            field,
            message: format!("{} is not between 0 and 127", value),
        });
    }
    Ok(value)
}

fn parse_duration(value: Option<String>, default: Duration) -> Result<Duration, ConfigError> {
    match value {
        Some(value) => Ok(DurationString::from_string(value.clone())
            .map_err(|e| ConfigError::Duration {
                value,
                message: e.to_string(),
            })?
            .into()),
        None => Ok(default),
    }
}

/// Resolves a path against the given directory unless it's already absolute.
pub(crate) fn resolve_path(base_dir: &Path, path: &str) -> PathBuf {
    let path = PathBuf::from(path);
    if path.is_absolute() {
        path
    } else {
        base_dir.join(path)
    }
}
