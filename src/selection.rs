//! Corner and tool selection
//!
//! The two batch-wide choices that steer every edit request: which corner the
//! object sits in, and which removal tool the service should use.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Image region holding the object to remove
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ValueEnum)]
pub enum Corner {
    /// Top left corner (default)
    #[default]
    #[serde(rename = "top left")]
    TopLeft,
    /// Top right corner
    #[serde(rename = "top right")]
    TopRight,
    /// Bottom left corner
    #[serde(rename = "bottom left")]
    BottomLeft,
    /// Bottom right corner
    #[serde(rename = "bottom right")]
    BottomRight,
}

impl Corner {
    /// All corners in display order
    pub const ALL: [Corner; 4] = [
        Corner::TopLeft,
        Corner::TopRight,
        Corner::BottomLeft,
        Corner::BottomRight,
    ];

    /// Label sent on the wire
    pub fn label(&self) -> &'static str {
        match self {
            Corner::TopLeft => "top left",
            Corner::TopRight => "top right",
            Corner::BottomLeft => "bottom left",
            Corner::BottomRight => "bottom right",
        }
    }
}

impl fmt::Display for Corner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Corner {
    type Err = SelectionParseError;

    /// Accepts the wire label (`top left`) as well as the CLI spelling (`top-left`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', '_'], " ");
        Corner::ALL
            .into_iter()
            .find(|corner| corner.label() == normalized)
            .ok_or_else(|| SelectionParseError::UnknownCorner(s.to_string()))
    }
}

/// Removal strategy requested from the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ValueEnum)]
pub enum Tool {
    /// Fast, local spot healing; best for small objects (default)
    #[default]
    #[serde(rename = "heal")]
    Heal,
    /// Slower, broader inpainting; best for larger objects
    #[serde(rename = "generative-remove")]
    GenerativeRemove,
}

impl Tool {
    /// All tools in display order
    pub const ALL: [Tool; 2] = [Tool::Heal, Tool::GenerativeRemove];

    /// Identifier sent on the wire
    pub fn id(&self) -> &'static str {
        match self {
            Tool::Heal => "heal",
            Tool::GenerativeRemove => "generative-remove",
        }
    }

    /// Short badge shown next to a result
    pub fn badge(&self) -> &'static str {
        match self {
            Tool::Heal => "H",
            Tool::GenerativeRemove => "GR",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Tool {
    type Err = SelectionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace([' ', '_'], "-");
        Tool::ALL
            .into_iter()
            .find(|tool| tool.id() == normalized)
            .ok_or_else(|| SelectionParseError::UnknownTool(s.to_string()))
    }
}

/// Unrecognised corner or tool name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectionParseError {
    #[error("Unknown corner: {0}")]
    UnknownCorner(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),
}

/// Corner and tool applied to every image processed until changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProcessingSelection {
    pub corner: Corner,
    pub tool: Tool,
}

impl ProcessingSelection {
    /// Create a selection
    pub fn new(corner: Corner, tool: Tool) -> Self {
        Self { corner, tool }
    }
}
