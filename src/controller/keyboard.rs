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

use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{info, span, warn, Level};

use super::{Event, KeyMap};

const QUIT: &str = "quit";
const BEND: &str = "bend";

/// A driver that reads key symbols from the terminal, one per line.
pub struct Driver {
    keymap: Arc<KeyMap>,
}

impl Driver {
    pub fn new(keymap: Arc<KeyMap>) -> Driver {
        Driver { keymap }
    }

    /// Reads one line and sends the event it maps to. Returns false once input
    /// has ended or quit was requested.
    fn monitor_io<R, W>(
        keymap: &KeyMap,
        events_tx: &Sender<Event>,
        mut reader: R,
        mut writer: W,
    ) -> Result<bool, io::Error>
    where
        R: io::BufRead,
        W: io::Write,
    {
        write!(writer, "Key ({} or {} <value>): ", QUIT, BEND)?;
        writer.flush()?;
        let mut input: String = String::default();
        if reader.read_line(&mut input)? == 0 {
            return Ok(false);
        }

        let input = input.trim();
        if input.is_empty() {
            return Ok(true);
        }

        let event = match input.split_once(' ') {
            Some((BEND, value)) => match value.trim().parse::<i32>() {
                Ok(value) => Some(Event::PitchBend(value)),
                Err(_) => {
                    warn!(input, "Unrecognized pitch bend value");
                    None
                }
            },
            _ if input.eq_ignore_ascii_case(QUIT) => Some(Event::Quit),
            _ => keymap.lookup(input),
        };

        match event {
            Some(event) => {
                events_tx
                    .blocking_send(event)
                    .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
                Ok(event != Event::Quit)
            }
            None => {
                warn!(input, "Unrecognized input");
                Ok(true)
            }
        }
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        let keymap = self.keymap.clone();
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "keyboard driver");
            let _enter = span.enter();

            info!(bindings = keymap.len(), "Keyboard driver started.");

            while Self::monitor_io(&keymap, &events_tx, io::stdin().lock(), io::stdout())? {}

            info!("Keyboard driver stopped.");
            Ok(())
        })
    }
}

#[cfg(test)]
mod test {
    use std::io::{self, BufReader, BufWriter};

    use tokio::sync::mpsc;

    use crate::controller::{Event, KeyMap};

    use super::Driver;

    fn get_events(input: &str) -> Result<(Vec<Event>, bool), io::Error> {
        let (sender, mut receiver) = mpsc::channel::<Event>(8);

        let reader = BufReader::new(input.as_bytes());
        let writer = BufWriter::new(Vec::new());
        let more = Driver::monitor_io(&KeyMap::builtin(), &sender, reader, writer)?;

        // Force the sender to close.
        drop(sender);
        let mut events = Vec::new();
        while let Some(event) = receiver.blocking_recv() {
            events.push(event);
        }
        Ok((events, more))
    }

    #[test]
    fn test_keyboard_events() -> Result<(), io::Error> {
        assert_eq!((vec![Event::Pad(0)], true), get_events("Left\n")?);
        assert_eq!((vec![Event::Pattern(1)], true), get_events("u\n")?);
        assert_eq!((vec![Event::Octave(4)], true), get_events("  4  \n")?);
        assert_eq!((vec![Event::Silence], true), get_events("q\n")?);
        assert_eq!((vec![Event::PitchBend(-200)], true), get_events("bend -200\n")?);
        assert_eq!((vec![], true), get_events("bend up\n")?);
        assert_eq!((vec![], true), get_events("unrecognized\n")?);
        assert_eq!((vec![], true), get_events("\n")?);
        Ok(())
    }

    #[test]
    fn test_keyboard_end_of_input() -> Result<(), io::Error> {
        assert_eq!((vec![Event::Quit], false), get_events("quit\n")?);
        assert_eq!((vec![Event::Quit], false), get_events("Escape\n")?);
        assert_eq!((vec![], false), get_events("")?);
        Ok(())
    }
}
