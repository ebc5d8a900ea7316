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
use std::sync::Arc;

use tracing::info;

use crate::{
    midi::{Note, Output},
    silencer::Silencer,
};

use super::{Error, PerformanceState};

/// Turns pad hits into notes. Every note is turned on through the output right
/// away and handed to the silencer so that it is turned off again later.
pub struct NoteController {
    state: PerformanceState,
    silencer: Arc<Silencer>,
    output: Arc<dyn Output>,
}

impl NoteController {
    /// Creates a new note controller.
    pub fn new(
        state: PerformanceState,
        silencer: Arc<Silencer>,
        output: Arc<dyn Output>,
    ) -> NoteController {
        NoteController {
            state,
            silencer,
            output,
        }
    }

    /// Selects the configured instrument and starts silencing notes.
    pub fn start(&self) -> Result<(), Error> {
        self.output
            .set_instrument(self.state.instrument(), self.state.channel())?;
        self.silencer.start()?;
        Ok(())
    }

    /// Stops the silencer, which turns off every sounding note.
    pub fn stop(&self) -> Result<(), Error> {
        self.silencer.stop()?;
        Ok(())
    }

    pub fn state(&self) -> &PerformanceState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut PerformanceState {
        &mut self.state
    }

    /// Plays the note for the given pad.
    pub fn play_note(&mut self, pad: usize) -> Result<Note, Error> {
        let note = self.state.next_note(pad)?;

        // Turned on and registered under the silencer's emission lock, so a sweep
        // can never turn it off in between. Nothing is played while stopped.
        let output = &self.output;
        self.silencer.note_on_with(note, |note| -> Result<(), Error> {
            Ok(output.note_on(note.number, note.velocity, note.channel)?)
        })?;

        info!(pad, note = %note, "Playing note.");
        Ok(note)
    }

    /// Turns off every sounding note.
    pub fn silence(&self) -> Result<usize, Error> {
        Ok(self.silencer.silence_all()?)
    }

    /// Bends the pitch of the performance channel.
    pub fn pitch_bend(&self, value: i32) -> Result<(), Error> {
        Ok(self.output.pitch_bend(value, self.state.channel())?)
    }

    /// Switches the instrument on the performance channel.
    pub fn set_instrument(&mut self, instrument: u8) -> Result<(), Error> {
        self.output.set_instrument(instrument, self.state.channel())?;
        self.state.set_instrument(instrument);
        Ok(())
    }
}
