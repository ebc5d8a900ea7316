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
    fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use super::{error::ConfigError, settings::resolve_path};

/// The JSON representation of a skin descriptor.
#[derive(Deserialize)]
struct SkinFile {
    root: Option<RootFile>,
    controls: Option<ControlsFile>,
}

#[derive(Deserialize)]
struct RootFile {
    title: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    background: Option<String>,
}

#[derive(Deserialize)]
struct ControlsFile {
    pads: Option<GroupFile>,
    tonics: Option<GroupFile>,
    octaves: Option<GroupFile>,
    patterns: Option<GroupFile>,
}

/// A family of buttons. Values here are defaults for every instance.
#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct GroupFile {
    width: Option<u32>,
    height: Option<u32>,
    y: Option<i32>,
    image_inactive: Option<String>,
    image_active: Option<String>,
    instances: Option<Vec<InstanceFile>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct InstanceFile {
    width: Option<u32>,
    height: Option<u32>,
    x: Option<i32>,
    y: Option<i32>,
    key: Option<String>,
    image: Option<String>,
    image_active: Option<String>,
}

/// A two state button on the skin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonDef {
    /// The position of the button within its group.
    pub index: usize,
    pub width: u32,
    pub height: u32,
    pub x: i32,
    pub y: i32,
    /// The key symbol bound to the button.
    pub key: String,
    pub image: PathBuf,
    pub active_image: PathBuf,
}

/// The layout and key bindings of the pad controller.
#[derive(Debug, Clone)]
pub struct Skin {
    pub path: PathBuf,
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub background: PathBuf,
    pub pads: Vec<ButtonDef>,
    pub tonics: Vec<ButtonDef>,
    pub octaves: Vec<ButtonDef>,
    pub patterns: Vec<ButtonDef>,
}

impl Skin {
    /// Loads a skin descriptor. Relative image paths resolve against the
    /// descriptor's directory.
    pub fn load(path: &Path) -> Result<Skin, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let skin: SkinFile =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Skin {
                path: path.to_path_buf(),
                source,
            })?;

        let resource_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Skin::from_file(skin, path, &resource_dir)
    }

    fn from_file(skin: SkinFile, path: &Path, resource_dir: &Path) -> Result<Skin, ConfigError> {
        let root = required("", "root", skin.root)?;
        let controls = required("", "controls", skin.controls)?;

        Ok(Skin {
            path: path.to_path_buf(),
            title: required("root", "title", root.title)?,
            width: required("root", "width", root.width)?,
            height: required("root", "height", root.height)?,
            background: resolve_path(
                resource_dir,
                &required("root", "background", root.background)?,
            ),
            pads: load_group("pads", controls.pads, resource_dir)?,
            tonics: load_group("tonics", controls.tonics, resource_dir)?,
            octaves: load_group("octaves", controls.octaves, resource_dir)?,
            patterns: load_group("patterns", controls.patterns, resource_dir)?,
        })
    }
}

fn required<T>(context: &str, field: &'static str, value: Option<T>) -> Result<T, ConfigError> {
    value.ok_or_else(|| ConfigError::MissingField {
        context: context.to_string(),
        field,
    })
}

fn load_group(
    name: &'static str,
    group: Option<GroupFile>,
    resource_dir: &Path,
) -> Result<Vec<ButtonDef>, ConfigError> {
    let group = required("controls", name, group)?;
    let image_inactive = required(name, "image-inactive", group.image_inactive)?;
    let image_active = required(name, "image-active", group.image_active)?;

    required(name, "instances", group.instances)?
        .into_iter()
        .enumerate()
        .map(|(index, instance)| -> Result<ButtonDef, ConfigError> {
            let context = format!("{} {}", name, index);
            Ok(ButtonDef {
                index,
                width: required(&context, "width", instance.width.or(group.width))?,
                height: required(&context, "height", instance.height.or(group.height))?,
                x: required(&context, "x", instance.x)?,
                y: required(&context, "y", instance.y.or(group.y))?,
                key: required(&context, "key", instance.key)?,
                image: resolve_path(
                    resource_dir,
                    instance.image.as_deref().unwrap_or(&image_inactive),
                ),
                active_image: resolve_path(
                    resource_dir,
                    instance.image_active.as_deref().unwrap_or(&image_active),
                ),
            })
        })
        .collect()
}

#[cfg(test)]
mod test {
    use std::{error::Error, fs, path::PathBuf};

    use crate::config::ConfigError;

    use super::Skin;

    const SKIN: &str = r#"{
        "root": {
            "title": "Pads",
            "width": 640,
            "height": 480,
            "background": "images/background.png"
        },
        "controls": {
            "pads": {
                "width": 64,
                "height": 64,
                "y": 300,
                "image-inactive": "images/pad.png",
                "image-active": "images/pad-active.png",
                "instances": [
                    { "x": 10, "key": "Left" },
                    { "x": 90, "key": "Up", "image": "/opt/images/special.png" },
                    { "x": 170, "y": 310, "width": 80, "key": "Right" }
                ]
            },
            "tonics": {
                "width": 32,
                "height": 32,
                "y": 20,
                "image-inactive": "images/tonic.png",
                "image-active": "images/tonic-active.png",
                "instances": [
                    { "x": 10, "key": "c" },
                    { "x": 50, "key": "d" }
                ]
            },
            "octaves": {
                "width": 32,
                "height": 32,
                "y": 60,
                "image-inactive": "images/octave.png",
                "image-active": "images/octave-active.png",
                "instances": [
                    { "x": 10, "key": "3" },
                    { "x": 50, "key": "4" }
                ]
            },
            "patterns": {
                "width": 32,
                "height": 32,
                "y": 100,
                "image-inactive": "images/pattern.png",
                "image-active": "images/pattern-active.png",
                "instances": [
                    { "x": 10, "key": "y" }
                ]
            }
        }
    }"#;

    fn write_skin(contents: &str) -> Result<(tempfile::TempDir, PathBuf), Box<dyn Error>> {
        let tempdir = tempfile::tempdir()?;
        let path = tempdir.path().join("skin.json");
        fs::write(&path, contents)?;
        Ok((tempdir, path))
    }

    #[test]
    fn load() -> Result<(), Box<dyn Error>> {
        let (tempdir, path) = write_skin(SKIN)?;
        let skin = Skin::load(&path)?;

        assert_eq!("Pads", skin.title);
        assert_eq!((640, 480), (skin.width, skin.height));
        assert_eq!(
            tempdir.path().join("images/background.png"),
            skin.background
        );
        assert_eq!(3, skin.pads.len());
        assert_eq!(2, skin.tonics.len());
        assert_eq!(2, skin.octaves.len());
        assert_eq!(1, skin.patterns.len());

        let first = &skin.pads[0];
        assert_eq!(0, first.index);
        assert_eq!((64, 64, 10, 300), (first.width, first.height, first.x, first.y));
        assert_eq!("Left", first.key);
        assert_eq!(tempdir.path().join("images/pad.png"), first.image);
        assert_eq!(
            tempdir.path().join("images/pad-active.png"),
            first.active_image
        );

        assert_eq!(PathBuf::from("/opt/images/special.png"), skin.pads[1].image);

        let last = &skin.pads[2];
        assert_eq!(2, last.index);
        assert_eq!((80, 64, 170, 310), (last.width, last.height, last.x, last.y));
        assert_eq!("y", skin.patterns[0].key);
        Ok(())
    }

    #[test]
    fn missing_required_values_fail() -> Result<(), Box<dyn Error>> {
        let (_tempdir, path) = write_skin(&SKIN.replace(r#""title": "Pads","#, ""))?;
        assert!(matches!(
            Skin::load(&path),
            Err(ConfigError::MissingField { field: "title", .. })
        ));

        let (_tempdir, path) = write_skin(&SKIN.replace(r#"{ "x": 50, "key": "d" }"#, r#"{ "x": 50 }"#))?;
        match Skin::load(&path) {
            Err(ConfigError::MissingField { context, field }) => {
                assert_eq!("tonics 1", context);
                assert_eq!("key", field);
            }
            other => panic!("unexpected result: {:?}", other.map(|skin| skin.title)),
        }
        Ok(())
    }

    #[test]
    fn invalid_json_fails() -> Result<(), Box<dyn Error>> {
        let (_tempdir, path) = write_skin("{ not json")?;
        assert!(matches!(Skin::load(&path), Err(ConfigError::Skin { .. })));
        Ok(())
    }

    #[test]
    fn missing_file_fails() -> Result<(), Box<dyn Error>> {
        let tempdir = tempfile::tempdir()?;
        assert!(matches!(
            Skin::load(&tempdir.path().join("missing.json")),
            Err(ConfigError::Read { .. })
        ));
        Ok(())
    }
}
