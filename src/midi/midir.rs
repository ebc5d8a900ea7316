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
use std::fmt;

use midir::{MidiOutput, MidiOutputConnection, MidiOutputPort};
use midly::live::LiveEvent;
use parking_lot::Mutex;
use tracing::{debug, info, span, Level};

use super::Error;

/// An output backed by a midir connection. The connection is held open for the
/// lifetime of the output so that note events go out without reconnecting.
pub struct Output {
    name: String,
    connection: Mutex<MidiOutputConnection>,
}

impl super::Output for Output {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn emit(&self, event: LiveEvent<'static>) -> Result<(), Error> {
        debug!(
            device = self.name,
            event = format!("{:?}", event),
            "Emitting event."
        );

        // Choosing 8 here because that's what nodi does.
        let mut buf: Vec<u8> = Vec::with_capacity(8);
        event
            .write(&mut buf)
            .map_err(|e| Error::Encode(e.to_string()))?;
        self.connection.lock().send(&buf)?;

        Ok(())
    }
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Output)", self.name)
    }
}

/// Lists the names of the midir output ports, sorted.
pub fn list() -> Result<Vec<String>, Error> {
    let output = MidiOutput::new("padmidi output listing")?;
    let mut names = output
        .ports()
        .iter()
        .map(|port| output.port_name(port))
        .collect::<Result<Vec<String>, _>>()?;
    names.sort();
    Ok(names)
}

/// Connects to the single output port whose name contains the given name.
pub fn get(name: &str) -> Result<Output, Error> {
    let output = MidiOutput::new("padmidi output")?;
    let mut matches: Vec<(String, MidiOutputPort)> = Vec::new();
    for port in output.ports() {
        let port_name = output.port_name(&port)?;
        if port_name.contains(name) {
            matches.push((port_name, port));
        }
    }

    if matches.is_empty() {
        return Err(Error::NotFound(name.to_string()));
    }
    if matches.len() > 1 {
        return Err(Error::Ambiguous(
            matches
                .iter()
                .map(|(port_name, _)| port_name.clone())
                .collect::<Vec<String>>()
                .join(", "),
        ));
    }

    // We've verified that there's only one element in the vector, so this should be safe.
    let (port_name, port) = matches.swap_remove(0);
    connect(output, port_name, &port)
}

/// Connects to the first output port midir reports.
pub fn get_default() -> Result<Output, Error> {
    let output = MidiOutput::new("padmidi output")?;
    let port = output.ports().into_iter().next().ok_or(Error::NoOutputs)?;
    let port_name = output.port_name(&port)?;
    connect(output, port_name, &port)
}

fn connect(output: MidiOutput, name: String, port: &MidiOutputPort) -> Result<Output, Error> {
    let span = span!(Level::INFO, "connect (midir)");
    let _enter = span.enter();

    let connection = output
        .connect(port, "padmidi")
        .map_err(|e| Error::Connect(e.to_string()))?;
    info!(device = name, "Connected to MIDI output.");

    Ok(Output {
        name,
        connection: Mutex::new(connection),
    })
}
