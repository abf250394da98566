//! Data models for library commands, composite layouts and decode requests

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::RenderError;

/// Requested output dimensions for a decode.
///
/// `width` and `height` are in output pixels, i.e. after scaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpriteAttributes {
    #[serde(rename = "spritewidth")]
    pub width: u32,
    #[serde(rename = "spriteheight")]
    pub height: u32,
}

impl SpriteAttributes {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// How the sections of a composite sprite are arranged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Left, middle and right columns
    #[default]
    Horizontal,
    /// Top, middle and bottom rows
    Vertical,
    /// Nine regions: edges, corners and middle
    Corners,
}

impl Direction {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "horizontal" => Some(Direction::Horizontal),
            "vertical" => Some(Direction::Vertical),
            "corners" => Some(Direction::Corners),
            _ => None,
        }
    }
}

/// Column position of a section within a composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Left,
    Center,
    Right,
}

/// Row position of a section within a composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Row {
    Top,
    Center,
    Bottom,
}

/// A named part of a composite sprite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Section {
    Top,
    Right,
    Bottom,
    Left,
    Middle,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Section {
    pub const ALL: [Section; 9] = [
        Section::Top,
        Section::Right,
        Section::Bottom,
        Section::Left,
        Section::Middle,
        Section::TopLeft,
        Section::TopRight,
        Section::BottomLeft,
        Section::BottomRight,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Section::Top => "top",
            Section::Right => "right",
            Section::Bottom => "bottom",
            Section::Left => "left",
            Section::Middle => "middle",
            Section::TopLeft => "topLeft",
            Section::TopRight => "topRight",
            Section::BottomLeft => "bottomLeft",
            Section::BottomRight => "bottomRight",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Section::ALL.into_iter().find(|s| s.name() == name)
    }

    pub fn is_corner(self) -> bool {
        matches!(
            self,
            Section::TopLeft | Section::TopRight | Section::BottomLeft | Section::BottomRight
        )
    }

    pub fn column(self) -> Column {
        match self {
            Section::Left | Section::TopLeft | Section::BottomLeft => Column::Left,
            Section::Right | Section::TopRight | Section::BottomRight => Column::Right,
            Section::Top | Section::Middle | Section::Bottom => Column::Center,
        }
    }

    pub fn row(self) -> Row {
        match self {
            Section::Top | Section::TopLeft | Section::TopRight => Row::Top,
            Section::Bottom | Section::BottomLeft | Section::BottomRight => Row::Bottom,
            Section::Left | Section::Middle | Section::Right => Row::Center,
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Layout metadata of a composite sprite.
///
/// Extents are in source pixels; they are multiplied by the codec scale
/// when decoding and drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MultipleLayout {
    pub direction: Direction,
    pub topheight: u32,
    pub rightwidth: u32,
    pub bottomheight: u32,
    pub leftwidth: u32,
    /// Stretch the middle section instead of tiling it
    pub middle_stretch: bool,
}

/// How a library node derives its pixels from elsewhere in the library.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Alias of the entry at `path`
    Same(Vec<String>),
    /// The entry at `path` with a palette filter applied
    Filter { path: Vec<String>, filter: String },
    /// A composite of independently encoded sections
    Multiple { layout: MultipleLayout, sections: BTreeMap<Section, String> },
}

impl Command {
    /// Parse a raw command array found at `at` in the library.
    pub fn from_value(at: &[String], items: &[Value]) -> Result<Self, RenderError> {
        let Some(Value::String(kind)) = items.first() else {
            return Err(RenderError::invalid_entry(at, "command must start with its name"));
        };
        match (kind.as_str(), items.len()) {
            ("same", 2) => Ok(Command::Same(parse_path(at, &items[1])?)),
            ("filter", 3) => {
                let Value::String(filter) = &items[2] else {
                    return Err(RenderError::invalid_entry(at, "filter name must be a string"));
                };
                Ok(Command::Filter { path: parse_path(at, &items[1])?, filter: filter.clone() })
            }
            ("multiple", 3) => {
                let Value::String(direction) = &items[1] else {
                    return Err(RenderError::invalid_entry(at, "direction must be a string"));
                };
                let direction = Direction::from_name(direction).ok_or_else(|| {
                    RenderError::invalid_entry(at, format!("unknown direction '{}'", direction))
                })?;
                parse_multiple(at, direction, &items[2])
            }
            ("same" | "filter" | "multiple", n) => Err(RenderError::invalid_entry(
                at,
                format!("command '{}' has {} elements", kind, n),
            )),
            _ => Err(RenderError::invalid_entry(at, format!("unknown command '{}'", kind))),
        }
    }
}

fn parse_path(at: &[String], value: &Value) -> Result<Vec<String>, RenderError> {
    match value {
        Value::Array(segments) => segments
            .iter()
            .map(|s| match s {
                Value::String(s) => Ok(s.clone()),
                _ => Err(RenderError::invalid_entry(at, "path segments must be strings")),
            })
            .collect(),
        Value::String(path) => Ok(path.split_whitespace().map(str::to_string).collect()),
        _ => Err(RenderError::invalid_entry(at, "path must be an array of strings")),
    }
}

fn parse_multiple(at: &[String], direction: Direction, value: &Value) -> Result<Command, RenderError> {
    let Value::Object(fields) = value else {
        return Err(RenderError::invalid_entry(at, "multiple sections must be an object"));
    };

    let mut layout = MultipleLayout { direction, ..Default::default() };
    let mut sections = BTreeMap::new();

    for (name, field) in fields {
        let extent = || {
            field
                .as_u64()
                .and_then(|v| u32::try_from(v).ok())
                .ok_or_else(|| RenderError::invalid_entry(at, format!("'{}' must be a pixel count", name)))
        };
        match name.as_str() {
            "topheight" => layout.topheight = extent()?,
            "rightwidth" => layout.rightwidth = extent()?,
            "bottomheight" => layout.bottomheight = extent()?,
            "leftwidth" => layout.leftwidth = extent()?,
            "middleStretch" => {
                layout.middle_stretch = field.as_bool().ok_or_else(|| {
                    RenderError::invalid_entry(at, "middleStretch must be a boolean")
                })?
            }
            _ => {
                let section = Section::from_name(name).ok_or_else(|| {
                    RenderError::invalid_entry(at, format!("unknown section '{}'", name))
                })?;
                if section.is_corner() && direction != Direction::Corners {
                    return Err(RenderError::invalid_entry(
                        at,
                        format!("section '{}' requires direction 'corners'", name),
                    ));
                }
                let Value::String(source) = field else {
                    return Err(RenderError::invalid_entry(
                        at,
                        format!("section '{}' must be a compressed string", name),
                    ));
                };
                sections.insert(section, source.clone());
            }
        }
    }

    if sections.is_empty() {
        return Err(RenderError::invalid_entry(at, "multiple command has no sections"));
    }

    Ok(Command::Multiple { layout, sections })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn at() -> Vec<String> {
        vec!["Thing".to_string()]
    }

    fn items(value: Value) -> Vec<Value> {
        value.as_array().cloned().unwrap()
    }

    #[test]
    fn test_parse_same() {
        let cmd = Command::from_value(&at(), &items(json!(["same", ["Player", "normal"]]))).unwrap();
        assert_eq!(cmd, Command::Same(vec!["Player".to_string(), "normal".to_string()]));
    }

    #[test]
    fn test_parse_filter() {
        let cmd = Command::from_value(&at(), &items(json!(["filter", ["Goomba"], "dark"]))).unwrap();
        assert_eq!(
            cmd,
            Command::Filter { path: vec!["Goomba".to_string()], filter: "dark".to_string() }
        );
    }

    #[test]
    fn test_parse_multiple() {
        let cmd = Command::from_value(
            &at(),
            &items(json!(["multiple", "horizontal", {
                "left": "0101",
                "middle": "1",
                "right": "1010",
                "leftwidth": 2,
                "rightwidth": 2,
                "middleStretch": true
            }])),
        )
        .unwrap();
        match cmd {
            Command::Multiple { layout, sections } => {
                assert_eq!(layout.direction, Direction::Horizontal);
                assert_eq!(layout.leftwidth, 2);
                assert_eq!(layout.rightwidth, 2);
                assert!(layout.middle_stretch);
                assert_eq!(sections.len(), 3);
                assert_eq!(sections.get(&Section::Middle), Some(&"1".to_string()));
            }
            other => panic!("Expected multiple, got {:?}", other),
        }
    }

    #[test]
    fn test_corner_section_requires_corners() {
        let result = Command::from_value(
            &at(),
            &items(json!(["multiple", "vertical", {"topLeft": "0"}])),
        );
        assert!(matches!(result, Err(RenderError::InvalidEntry { .. })));
    }

    #[test]
    fn test_unknown_command() {
        let result = Command::from_value(&at(), &items(json!(["mirror", ["A"]])));
        assert!(matches!(result, Err(RenderError::InvalidEntry { .. })));
    }

    #[test]
    fn test_section_positions() {
        assert_eq!(Section::TopLeft.column(), Column::Left);
        assert_eq!(Section::TopLeft.row(), Row::Top);
        assert_eq!(Section::Middle.column(), Column::Center);
        assert_eq!(Section::from_name("bottomRight"), Some(Section::BottomRight));
        assert_eq!(Section::from_name("center"), None);
    }

    #[test]
    fn test_attributes_serde_names() {
        let attrs: SpriteAttributes =
            serde_json::from_str(r#"{"spritewidth": 8, "spriteheight": 16}"#).unwrap();
        assert_eq!(attrs, SpriteAttributes::new(8, 16));
    }
}
