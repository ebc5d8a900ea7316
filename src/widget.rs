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

//! Two state widgets: the pads and selectors drawn by a front end.

use std::path::{Path, PathBuf};

use crate::config::ButtonDef;

/// A widget that shows one image when inactive and another when active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetState {
    inactive_image: PathBuf,
    active_image: PathBuf,
    active: bool,
}

impl WidgetState {
    /// Creates a new, inactive widget.
    pub fn new(inactive_image: PathBuf, active_image: PathBuf) -> WidgetState {
        WidgetState {
            inactive_image,
            active_image,
            active: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// The image that should currently be shown.
    pub fn current_image(&self) -> &Path {
        if self.active {
            &self.active_image
        } else {
            &self.inactive_image
        }
    }
}

impl From<&ButtonDef> for WidgetState {
    fn from(button: &ButtonDef) -> Self {
        WidgetState::new(button.image.clone(), button.active_image.clone())
    }
}

/// The widgets of one control family. At most one is active at a time.
#[derive(Debug, Clone, Default)]
pub struct WidgetGroup {
    widgets: Vec<WidgetState>,
    active: Option<usize>,
}

impl WidgetGroup {
    pub fn new(widgets: Vec<WidgetState>) -> WidgetGroup {
        WidgetGroup {
            widgets,
            active: None,
        }
    }

    pub fn from_buttons(buttons: &[ButtonDef]) -> WidgetGroup {
        WidgetGroup::new(buttons.iter().map(WidgetState::from).collect())
    }

    /// Activates the widget at the index and deactivates the previous one.
    /// Returns None, changing nothing, if there's no such widget.
    pub fn activate(&mut self, index: usize) -> Option<&WidgetState> {
        if index >= self.widgets.len() {
            return None;
        }
        if let Some(previous) = self.active.and_then(|i| self.widgets.get_mut(i)) {
            previous.set_active(false);
        }
        self.widgets[index].set_active(true);
        self.active = Some(index);
        self.widgets.get(index)
    }

    /// The index of the active widget.
    pub fn active(&self) -> Option<usize> {
        self.active
    }

    pub fn get(&self, index: usize) -> Option<&WidgetState> {
        self.widgets.get(index)
    }

    pub fn len(&self) -> usize {
        self.widgets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.widgets.is_empty()
    }
}

/// Every widget family on the controller.
#[derive(Debug, Clone, Default)]
pub struct Widgets {
    pub pads: WidgetGroup,
    pub tonics: WidgetGroup,
    pub octaves: WidgetGroup,
    pub patterns: WidgetGroup,
}
