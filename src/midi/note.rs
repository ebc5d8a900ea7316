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
    fmt,
    time::{Duration, Instant},
};

/// Note names as printed by `ansi_name`, starting from C.
const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Identifies a sounding note. Only one note is tracked per key at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NoteKey {
    /// The MIDI channel (0-15).
    pub channel: u8,
    /// The MIDI note number (0-127).
    pub number: u8,
}

/// A note that has been turned on, along with when it should be turned off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Note {
    /// The MIDI note number.
    pub number: u8,
    /// The velocity the note was played with. Also used for the note off.
    pub velocity: u8,
    /// The MIDI channel.
    pub channel: u8,
    /// When the note must be silenced. None means the note sustains until it
    /// is explicitly silenced.
    pub expiration: Option<Instant>,
}

impl Note {
    /// Creates a note that expires at the given instant.
    pub fn expiring_at(number: u8, velocity: u8, channel: u8, expiration: Instant) -> Note {
        Note {
            number,
            velocity,
            channel,
            expiration: Some(expiration),
        }
    }

    /// Creates a note that expires after the given duration from now.
    pub fn timed(number: u8, velocity: u8, channel: u8, duration: Duration) -> Note {
        Note::expiring_at(number, velocity, channel, Instant::now() + duration)
    }

    /// Creates a note with no automatic expiry.
    pub fn sustained(number: u8, velocity: u8, channel: u8) -> Note {
        Note {
            number,
            velocity,
            channel,
            expiration: None,
        }
    }

    /// The key this note is tracked under.
    pub fn key(&self) -> NoteKey {
        NoteKey {
            channel: self.channel,
            number: self.number,
        }
    }

    /// Returns true if the note should be silenced by the given deadline.
    /// Sustained notes are never due.
    pub fn is_due(&self, deadline: Instant) -> bool {
        self.expiration
            .is_some_and(|expiration| expiration <= deadline)
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}, channel {}, velocity {})",
            ansi_name(self.number),
            self.number,
            self.channel,
            self.velocity
        )
    }
}

/// Returns the ANSI name of a MIDI note number, e.g. 60 is C4.
pub fn ansi_name(number: u8) -> String {
    let octave = i32::from(number) / 12 - 1;
    format!("{}{}", NOTE_NAMES[usize::from(number % 12)], octave)
}
