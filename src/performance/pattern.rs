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

/// An ordered set of scale degrees, in semitones above the tonic, that the pads
/// play.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    name: String,
    degrees: Vec<u8>,
}

impl Pattern {
    /// Creates a new pattern.
    pub fn new(name: &str, degrees: &[u8]) -> Pattern {
        Pattern {
            name: name.to_string(),
            degrees: degrees.to_vec(),
        }
    }

    /// The name of the pattern.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The scale degrees.
    pub fn degrees(&self) -> &[u8] {
        &self.degrees
    }

    /// Gets the degree for the given pad. Pads beyond the pattern play the
    /// first degree.
    pub fn degree(&self, pad: usize) -> u8 {
        self.degrees
            .get(pad)
            .or_else(|| self.degrees.first())
            .copied()
            .unwrap_or(0)
    }

    /// The built in five note modes.
    pub fn builtin() -> Vec<Pattern> {
        vec![
            Pattern::new("Ionian", &[0, 2, 4, 7, 9]),
            Pattern::new("Dorian", &[0, 2, 5, 7, 10]),
            Pattern::new("Phrygian", &[0, 3, 5, 8, 10]),
            Pattern::new("Mixolydian", &[0, 2, 5, 7, 9]),
            Pattern::new("Aeolian", &[0, 3, 5, 7, 10]),
        ]
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({})",
            self.name,
            self.degrees
                .iter()
                .map(|degree| degree.to_string())
                .collect::<Vec<String>>()
                .join(", ")
        )
    }
}
