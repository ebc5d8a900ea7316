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

//! Performance state: what the pads play right now.

use std::time::Duration;

use crate::{
    midi::{self, Note},
    silencer,
};

mod notes;
mod pattern;

pub use notes::NoteController;
pub use pattern::Pattern;

/// The highest tonic, in semitones above C.
pub const MAX_TONIC: u8 = 11;

/// The lowest selectable octave. Octave -1 starts at MIDI note 0.
pub const MIN_OCTAVE: i8 = -1;

/// The highest selectable octave.
pub const MAX_OCTAVE: i8 = 9;

pub const DEFAULT_OCTAVE: i8 = 3;
pub const DEFAULT_VELOCITY: u8 = 127;
pub const DEFAULT_DURATION: Duration = Duration::from_millis(250);

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("tonic {0} is out of range (0-11)")]
    TonicOutOfRange(u8),

    #[error("octave {0} is out of range (-1 to 9)")]
    OctaveOutOfRange(i8),

    #[error("note {0} is out of range (0-127)")]
    NoteOutOfRange(i32),

    #[error(transparent)]
    Midi(#[from] midi::Error),

    #[error(transparent)]
    Silencer(#[from] silencer::Error),
}

/// The performer's current selections. Changes only affect notes played after
/// the change.
#[derive(Debug, Clone)]
pub struct PerformanceState {
    tonic: u8,
    octave: i8,
    pattern: usize,
    patterns: Vec<Pattern>,
    /// Semitones added to the next note only.
    modifier: i8,
    channel: u8,
    velocity: u8,
    instrument: u8,
    duration: Duration,
    sustain: bool,
}

impl Default for PerformanceState {
    fn default() -> Self {
        PerformanceState::new(0, DEFAULT_VELOCITY, 0, DEFAULT_DURATION)
    }
}

impl PerformanceState {
    /// Creates a new performance state using the built in patterns.
    pub fn new(channel: u8, velocity: u8, instrument: u8, duration: Duration) -> PerformanceState {
        PerformanceState {
            tonic: 0,
            octave: DEFAULT_OCTAVE,
            pattern: 0,
            patterns: Pattern::builtin(),
            modifier: 0,
            channel,
            velocity,
            instrument,
            duration,
            sustain: false,
        }
    }

    /// Sets whether notes sustain until silenced.
    pub fn with_sustain(mut self, sustain: bool) -> PerformanceState {
        self.sustain = sustain;
        self
    }

    pub fn tonic(&self) -> u8 {
        self.tonic
    }

    pub fn octave(&self) -> i8 {
        self.octave
    }

    /// The index of the selected pattern.
    pub fn pattern_index(&self) -> usize {
        self.pattern
    }

    /// The active pattern.
    pub fn pattern(&self) -> &Pattern {
        &self.patterns[self.pattern]
    }

    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    pub fn modifier(&self) -> i8 {
        self.modifier
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn velocity(&self) -> u8 {
        self.velocity
    }

    pub fn instrument(&self) -> u8 {
        self.instrument
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn sustain(&self) -> bool {
        self.sustain
    }

    pub fn set_tonic(&mut self, tonic: u8) -> Result<(), Error> {
        if tonic > MAX_TONIC {
            return Err(Error::TonicOutOfRange(tonic));
        }
        self.tonic = tonic;
        Ok(())
    }

    pub fn set_octave(&mut self, octave: i8) -> Result<(), Error> {
        if !(MIN_OCTAVE..=MAX_OCTAVE).contains(&octave) {
            return Err(Error::OctaveOutOfRange(octave));
        }
        self.octave = octave;
        Ok(())
    }

    /// Selects a pattern. Unknown patterns select the first one.
    pub fn set_pattern(&mut self, index: usize) -> &Pattern {
        self.pattern = if index < self.patterns.len() { index } else { 0 };
        self.pattern()
    }

    pub fn set_instrument(&mut self, instrument: u8) {
        self.instrument = instrument;
    }

    /// Shifts the next note by the given number of semitones.
    pub fn shift(&mut self, semitones: i8) {
        self.modifier = self.modifier.saturating_add(semitones);
    }

    /// Toggles sustain and returns the new value.
    pub fn toggle_sustain(&mut self) -> bool {
        self.sustain = !self.sustain;
        self.sustain
    }

    /// The note number the pad would play right now.
    pub fn note_value(&self, pad: usize) -> Result<u8, Error> {
        let value = (i32::from(self.octave) + 1) * 12
            + i32::from(self.tonic)
            + i32::from(self.pattern().degree(pad))
            + i32::from(self.modifier);
        u8::try_from(value)
            .ok()
            .filter(|value| *value <= 127)
            .ok_or(Error::NoteOutOfRange(value))
    }

    /// Builds the note for the pad and clears the modifier.
    pub fn next_note(&mut self, pad: usize) -> Result<Note, Error> {
        let number = self.note_value(pad)?;
        self.modifier = 0;

        Ok(if self.sustain {
            Note::sustained(number, self.velocity, self.channel)
        } else {
            Note::timed(number, self.velocity, self.channel, self.duration)
        })
    }
}
