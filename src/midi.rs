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
use std::{fmt, sync::Arc};

use midly::{
    live::LiveEvent,
    num::{u14, u4, u7},
    MidiMessage, PitchBend,
};

mod midir;
mod mock;
mod note;

pub use note::{ansi_name, Note, NoteKey};

/// The lowest pitch bend value that can be sent.
pub const PITCH_BEND_MIN: i32 = -8192;

/// The highest pitch bend value that can be sent.
pub const PITCH_BEND_MAX: i32 = 8191;

/// Errors raised while talking to a MIDI output.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{what} {value} is out of range (0-{max})")]
    OutOfRange {
        what: &'static str,
        value: u8,
        max: u8,
    },

    #[error("no MIDI output found with name {0}")]
    NotFound(String),

    #[error("found too many MIDI outputs that match ({0}), use a less ambiguous device name")]
    Ambiguous(String),

    #[error("no MIDI outputs available")]
    NoOutputs,

    #[error("MIDI init error: {0}")]
    Init(#[from] ::midir::InitError),

    #[error("MIDI port error: {0}")]
    Port(#[from] ::midir::PortInfoError),

    #[error("unable to connect to MIDI output: {0}")]
    Connect(String),

    #[error("MIDI send error: {0}")]
    Send(#[from] ::midir::SendError),

    #[error("MIDI encode error: {0}")]
    Encode(String),

    #[error("mock output error: {0}")]
    Mock(String),
}

/// A MIDI output that notes are played through.
pub trait Output: fmt::Display + Send + Sync {
    /// Returns the name of the output.
    fn name(&self) -> String;

    /// Emits a raw event.
    fn emit(&self, event: LiveEvent<'static>) -> Result<(), Error>;

    /// Turns the given note on.
    fn note_on(&self, number: u8, velocity: u8, channel: u8) -> Result<(), Error> {
        self.emit(LiveEvent::Midi {
            channel: channel_num(channel)?,
            message: MidiMessage::NoteOn {
                key: data_byte("note", number)?,
                vel: data_byte("velocity", velocity)?,
            },
        })
    }

    /// Turns the given note off.
    fn note_off(&self, number: u8, velocity: u8, channel: u8) -> Result<(), Error> {
        self.emit(LiveEvent::Midi {
            channel: channel_num(channel)?,
            message: MidiMessage::NoteOff {
                key: data_byte("note", number)?,
                vel: data_byte("velocity", velocity)?,
            },
        })
    }

    /// Selects the instrument (program) for the channel.
    fn set_instrument(&self, instrument: u8, channel: u8) -> Result<(), Error> {
        self.emit(LiveEvent::Midi {
            channel: channel_num(channel)?,
            message: MidiMessage::ProgramChange {
                program: data_byte("instrument", instrument)?,
            },
        })
    }

    /// Bends the pitch of the channel. Values are clamped to
    /// [PITCH_BEND_MIN, PITCH_BEND_MAX], zero is no bend.
    fn pitch_bend(&self, value: i32, channel: u8) -> Result<(), Error> {
        self.emit(LiveEvent::Midi {
            channel: channel_num(channel)?,
            message: MidiMessage::PitchBend {
                bend: pitch_bend_value(value),
            },
        })
    }
}

fn data_byte(what: &'static str, value: u8) -> Result<u7, Error> {
    u7::try_from(value).ok_or(Error::OutOfRange {
        what,
        value,
        max: 127,
    })
}

fn channel_num(channel: u8) -> Result<u4, Error> {
    u4::try_from(channel).ok_or(Error::OutOfRange {
        what: "channel",
        value: channel,
        max: 15,
    })
}

/// Encodes a signed pitch bend as the 14 bit value centred on 8192.
fn pitch_bend_value(value: i32) -> PitchBend {
    let clamped = value.clamp(PITCH_BEND_MIN, PITCH_BEND_MAX);
    PitchBend(u14::new((clamped - PITCH_BEND_MIN) as u16))
}

/// Lists the names of the MIDI outputs known to midir.
pub fn list_devices() -> Result<Vec<String>, Error> {
    midir::list()
}

/// Gets the output with the given name. Names starting with "mock" produce a mock
/// output. With no name, the first output midir knows about is used.
pub fn get_output(name: Option<&str>) -> Result<Arc<dyn Output>, Error> {
    match name {
        Some(name) if name.starts_with("mock") => Ok(Arc::new(mock::Output::get(name))),
        Some(name) => Ok(Arc::new(midir::get(name)?)),
        None => Ok(Arc::new(midir::get_default()?)),
    }
}
