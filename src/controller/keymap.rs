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
use std::collections::{hash_map::Entry, HashMap};

use crate::config::{ConfigError, Skin};

use super::Event;

/// Pads bound when there's no skin, in pad order.
const DEFAULT_PAD_KEYS: [&str; 5] = ["Left", "Up", "Right", "Down", "space"];

/// Patterns bound when there's no skin, in pattern order.
const DEFAULT_PATTERN_KEYS: [&str; 5] = ["y", "u", "i", "o", "p"];

/// Keys that are bound regardless of the skin, unless the skin uses them.
const MODIFIER_KEYS: [(&str, Event); 7] = [
    ("a", Event::OctaveDown),
    ("s", Event::OctaveUp),
    ("z", Event::Flat),
    ("x", Event::Sharp),
    ("q", Event::Silence),
    ("t", Event::ToggleSustain),
    ("Escape", Event::Quit),
];

/// Maps key symbols to controller events.
#[derive(Debug, Clone, Default)]
pub struct KeyMap {
    bindings: HashMap<String, Event>,
}

impl KeyMap {
    /// Binds every button on the skin to its event. Each key may only be bound
    /// once.
    pub fn from_skin(skin: &Skin) -> Result<KeyMap, ConfigError> {
        let mut keymap = KeyMap::default();
        for button in &skin.pads {
            keymap.bind(&button.key, Event::Pad(button.index))?;
        }
        for button in &skin.tonics {
            let tonic = u8::try_from(button.index).unwrap_or(u8::MAX);
            keymap.bind(&button.key, Event::Tonic(tonic))?;
        }
        for button in &skin.octaves {
            let octave = i8::try_from(button.index).unwrap_or(i8::MAX);
            keymap.bind(&button.key, Event::Octave(octave))?;
        }
        for button in &skin.patterns {
            keymap.bind(&button.key, Event::Pattern(button.index))?;
        }
        keymap.bind_modifiers();
        Ok(keymap)
    }

    /// The bindings used without a skin.
    pub fn builtin() -> KeyMap {
        let mut keymap = KeyMap::default();
        let bindings = DEFAULT_PAD_KEYS
            .iter()
            .enumerate()
            .map(|(pad, key)| (key.to_string(), Event::Pad(pad)))
            .chain(
                DEFAULT_PATTERN_KEYS
                    .iter()
                    .enumerate()
                    .map(|(pattern, key)| (key.to_string(), Event::Pattern(pattern))),
            )
            .chain((0..=9).map(|octave: i8| (octave.to_string(), Event::Octave(octave))))
            .chain((0..12).map(|tonic: u8| (format!("F{}", tonic + 1), Event::Tonic(tonic))));
        keymap.bindings.extend(bindings);
        keymap.bind_modifiers();
        keymap
    }

    /// Looks up the event bound to the key symbol.
    pub fn lookup(&self, key: &str) -> Option<Event> {
        self.bindings.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    fn bind(&mut self, key: &str, event: Event) -> Result<(), ConfigError> {
        match self.bindings.entry(key.to_string()) {
            Entry::Occupied(_) => Err(ConfigError::DuplicateKey(key.to_string())),
            Entry::Vacant(entry) => {
                entry.insert(event);
                Ok(())
            }
        }
    }

    fn bind_modifiers(&mut self) {
        for (key, event) in MODIFIER_KEYS {
            self.bindings.entry(key.to_string()).or_insert(event);
        }
    }
}
