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
use std::{io, sync::Arc};

use tokio::{
    sync::mpsc::{self, Sender},
    task::{self, JoinError, JoinHandle},
};
use tracing::{debug, error, info, span, Instrument, Level};

use crate::{
    performance::{self, NoteController},
    widget::{WidgetGroup, Widgets},
};

pub mod keyboard;
mod keymap;

pub use keymap::KeyMap;

/// Semitones in an octave, used by the octave modifiers.
const OCTAVE: i8 = 12;

/// Controller events that change what is playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Plays the note for the pad.
    Pad(usize),

    /// Selects the tonic, in semitones above C.
    Tonic(u8),

    /// Selects the octave.
    Octave(i8),

    /// Selects the pattern. Unknown patterns select the first one.
    Pattern(usize),

    /// Turns off every sounding note.
    Silence,

    /// Raises the next note by a semitone.
    Sharp,

    /// Lowers the next note by a semitone.
    Flat,

    /// Raises the next note by an octave.
    OctaveUp,

    /// Lowers the next note by an octave.
    OctaveDown,

    /// Bends the pitch. Zero is no bend.
    PitchBend(i32),

    /// Switches between timed and sustained notes.
    ToggleSustain,

    /// Stops the controller.
    Quit,
}

pub trait Driver: Send + Sync + 'static {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>>;
}

/// Drives the note controller from a driver's events.
pub struct Controller {
    handle: JoinHandle<()>,
}

impl Controller {
    /// Starts the note controller and begins handling events from the driver.
    pub fn new(
        notes: NoteController,
        widgets: Widgets,
        driver: Arc<dyn Driver>,
    ) -> Result<Controller, performance::Error> {
        notes.start()?;
        Ok(Controller {
            handle: tokio::spawn(
                Controller::trigger_events(notes, widgets, driver)
                    .instrument(span!(Level::INFO, "controller")),
            ),
        })
    }

    /// Join will block until the controller finishes.
    pub async fn join(&mut self) -> Result<(), JoinError> {
        (&mut self.handle).await
    }

    /// Handles events from the driver until it closes or asks to quit.
    async fn trigger_events(
        mut notes: NoteController,
        mut widgets: Widgets,
        driver: Arc<dyn Driver>,
    ) {
        let (events_tx, mut events_rx) = mpsc::channel(1);
        let join_handle = driver.monitor_events(events_tx);

        info!(
            pattern = notes.state().pattern().name(),
            octave = notes.state().octave(),
            "Controller started."
        );

        while let Some(event) = events_rx.recv().await {
            debug!(event = format!("{:?}", event), "Received event.");

            match handle_event(&mut notes, &mut widgets, event) {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => error!("Error handling event: {}", e),
            }
        }

        info!("Controller closing.");
        // Stopping waits for the final silence pass, which blocks.
        match task::spawn_blocking(move || notes.stop()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Error stopping notes: {}", e),
            Err(e) => error!("Error waiting for notes to stop: {}", e),
        }
        drop(events_rx);
        match join_handle.await {
            Ok(Err(e)) => error!("Event monitor failed: {}", e),
            Err(e) => error!("Error waiting for event monitor to stop: {}", e),
            Ok(Ok(())) => {}
        }
    }
}

/// Applies a single event. Returns false if the controller should stop.
pub fn handle_event(
    notes: &mut NoteController,
    widgets: &mut Widgets,
    event: Event,
) -> Result<bool, performance::Error> {
    match event {
        Event::Pad(pad) => {
            notes.play_note(pad)?;
            activate(&mut widgets.pads, pad);
        }
        Event::Tonic(tonic) => {
            notes.state_mut().set_tonic(tonic)?;
            activate(&mut widgets.tonics, usize::from(tonic));
        }
        Event::Octave(octave) => {
            notes.state_mut().set_octave(octave)?;
            if let Ok(index) = usize::try_from(octave) {
                activate(&mut widgets.octaves, index);
            }
        }
        Event::Pattern(pattern) => {
            let name = notes.state_mut().set_pattern(pattern).name().to_string();
            let selected = notes.state().pattern_index();
            info!(pattern = name, index = selected, "Selected pattern.");
            activate(&mut widgets.patterns, selected);
        }
        Event::Silence => {
            let count = notes.silence()?;
            info!(count, "Silenced notes.");
        }
        Event::Sharp => notes.state_mut().shift(1),
        Event::Flat => notes.state_mut().shift(-1),
        Event::OctaveUp => notes.state_mut().shift(OCTAVE),
        Event::OctaveDown => notes.state_mut().shift(-OCTAVE),
        Event::PitchBend(value) => notes.pitch_bend(value)?,
        Event::ToggleSustain => {
            let sustain = notes.state_mut().toggle_sustain();
            info!(sustain, "Toggled sustain.");
        }
        Event::Quit => return Ok(false),
    }
    Ok(true)
}

fn activate(group: &mut WidgetGroup, index: usize) {
    if let Some(widget) = group.activate(index) {
        debug!(
            index,
            image = %widget.current_image().display(),
            "Activated widget."
        );
    }
}
