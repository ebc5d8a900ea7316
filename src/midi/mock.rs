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
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use midly::{live::LiveEvent, MidiMessage};
use parking_lot::Mutex;
use tracing::debug;

#[cfg(test)]
use super::NoteKey;
use super::Error;

/// A mock output. Doesn't actually play anything, but remembers everything it was
/// asked to emit.
#[derive(Clone)]
pub struct Output {
    name: String,
    emitted: Arc<Mutex<Vec<(Instant, LiveEvent<'static>)>>>,
    failing_note_offs: Arc<AtomicUsize>,
    note_off_delay: Arc<Mutex<Duration>>,
}

impl Output {
    /// Gets the given mock output.
    pub fn get(name: &str) -> Output {
        Output {
            name: name.to_string(),
            emitted: Arc::new(Mutex::new(Vec::new())),
            failing_note_offs: Arc::new(AtomicUsize::new(0)),
            note_off_delay: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    #[cfg(test)]
    /// Gets all emitted events in order.
    pub fn events(&self) -> Vec<LiveEvent<'static>> {
        self.emitted.lock().iter().map(|(_, event)| event.clone()).collect()
    }

    #[cfg(test)]
    /// Gets the keys of all emitted note ons in order.
    pub fn note_ons(&self) -> Vec<NoteKey> {
        self.timed_note_ons().into_iter().map(|(_, key)| key).collect()
    }

    #[cfg(test)]
    /// Gets the keys of all emitted note offs in order.
    pub fn note_offs(&self) -> Vec<NoteKey> {
        self.timed_note_offs()
            .into_iter()
            .map(|(_, key)| key)
            .collect()
    }

    #[cfg(test)]
    /// Gets the emitted note ons along with when they were emitted.
    pub fn timed_note_ons(&self) -> Vec<(Instant, NoteKey)> {
        self.filter_notes(|message| matches!(message, MidiMessage::NoteOn { .. }))
    }

    #[cfg(test)]
    /// Gets the emitted note offs along with when they were emitted.
    pub fn timed_note_offs(&self) -> Vec<(Instant, NoteKey)> {
        self.filter_notes(|message| matches!(message, MidiMessage::NoteOff { .. }))
    }

    #[cfg(test)]
    /// Makes the next count note offs fail without being recorded.
    pub fn fail_next_note_offs(&self, count: usize) {
        self.failing_note_offs.store(count, Ordering::SeqCst);
    }

    #[cfg(test)]
    /// Makes every note off take the given time, like a slow device.
    pub fn delay_note_offs(&self, delay: Duration) {
        *self.note_off_delay.lock() = delay;
    }

    #[cfg(test)]
    fn filter_notes<F>(&self, predicate: F) -> Vec<(Instant, NoteKey)>
    where
        F: Fn(&MidiMessage) -> bool,
    {
        self.emitted
            .lock()
            .iter()
            .filter_map(|(at, event)| match event {
                LiveEvent::Midi { channel, message } if predicate(message) => {
                    let number = match message {
                        MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                            key.as_int()
                        }
                        _ => return None,
                    };
                    Some((
                        *at,
                        NoteKey {
                            channel: channel.as_int(),
                            number,
                        },
                    ))
                }
                _ => None,
            })
            .collect()
    }
}

impl super::Output for Output {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn emit(&self, event: LiveEvent<'static>) -> Result<(), Error> {
        if let LiveEvent::Midi {
            message: MidiMessage::NoteOff { .. },
            ..
        } = event
        {
            let failed = self
                .failing_note_offs
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                    remaining.checked_sub(1)
                })
                .is_ok();
            if failed {
                return Err(Error::Mock("note off failed".to_string()));
            }

            let delay = *self.note_off_delay.lock();
            if !delay.is_zero() {
                thread::sleep(delay);
            }
        }

        debug!(
            device = self.name,
            event = format!("{:?}", event),
            "Emitting event (mock)."
        );
        self.emitted.lock().push((Instant::now(), event));
        Ok(())
    }
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}
