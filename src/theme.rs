use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CanvasError, Result};
use crate::graph::types::NodeStatus;

const LIGHT_BACKGROUND: &str = "#FFFFFF";
const LIGHT_SURFACE: &str = "#F2F2F7";
const LIGHT_CARD: &str = "#FFFFFF";
const LIGHT_TEXT: &str = "#000000";
const LIGHT_TEXT_SECONDARY: &str = "#8E8E93";
const LIGHT_BORDER: &str = "#C6C6C8";
const LIGHT_PRIMARY: &str = "#007AFF";
const LIGHT_GRID: &str = "#E5E5EA";

const STATUS_TODO: &str = "#8E8E93";
const STATUS_IN_PROGRESS: &str = "#007AFF";
const STATUS_BLOCKED: &str = "#FF9500";
const STATUS_DONE: &str = "#34C759";

const BUILTIN_THEMES: &[(&str, &str)] = &[
    ("dark", include_str!("../themes/dark.toml")),
    ("light", include_str!("../themes/light.toml")),
];

const FONT_FAMILY: &str = "sans-serif";
const FONT_SIZE_TITLE: f32 = 15.0;
const FONT_SIZE_META: f32 = 12.0;
const LINE_HEIGHT: f32 = 1.35;
const CARD_RADIUS: f32 = 12.0;
const CARD_PADDING: f32 = 12.0;
const CARD_MIN_WIDTH: f32 = 180.0;
const CARD_MAX_WIDTH: f32 = 220.0;

/// Colours and card metrics for drawing a canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanvasTheme {
    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default = "default_background")]
    pub background: String,
    #[serde(default = "default_surface")]
    pub surface: String,
    #[serde(default = "default_card")]
    pub card: String,
    #[serde(default = "default_text")]
    pub text: String,
    #[serde(default = "default_text_secondary")]
    pub text_secondary: String,
    #[serde(default = "default_border")]
    pub border: String,
    /// Accent for selection and for edges whose target has no colour.
    #[serde(default = "default_primary")]
    pub primary: String,
    #[serde(default = "default_grid")]
    pub grid: String,
    #[serde(default)]
    pub status: StatusColors,

    #[serde(default = "default_font_family")]
    pub font_family: String,
    #[serde(default = "default_font_size_title")]
    pub font_size_title: f32,
    #[serde(default = "default_font_size_meta")]
    pub font_size_meta: f32,
    #[serde(default = "default_line_height")]
    pub line_height: f32,

    #[serde(default = "default_card_radius")]
    pub card_radius: f32,
    #[serde(default = "default_card_padding")]
    pub card_padding: f32,
    #[serde(default = "default_card_min_width")]
    pub card_min_width: f32,
    #[serde(default = "default_card_max_width")]
    pub card_max_width: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusColors {
    #[serde(default = "default_status_todo")]
    pub todo: String,
    #[serde(default = "default_status_in_progress")]
    pub in_progress: String,
    #[serde(default = "default_status_blocked")]
    pub blocked: String,
    #[serde(default = "default_status_done")]
    pub done: String,
}

impl Default for StatusColors {
    fn default() -> Self {
        Self {
            todo: STATUS_TODO.to_string(),
            in_progress: STATUS_IN_PROGRESS.to_string(),
            blocked: STATUS_BLOCKED.to_string(),
            done: STATUS_DONE.to_string(),
        }
    }
}

fn default_name() -> String {
    "custom".to_string()
}
fn default_background() -> String {
    LIGHT_BACKGROUND.to_string()
}
fn default_surface() -> String {
    LIGHT_SURFACE.to_string()
}
fn default_card() -> String {
    LIGHT_CARD.to_string()
}
fn default_text() -> String {
    LIGHT_TEXT.to_string()
}
fn default_text_secondary() -> String {
    LIGHT_TEXT_SECONDARY.to_string()
}
fn default_border() -> String {
    LIGHT_BORDER.to_string()
}
fn default_primary() -> String {
    LIGHT_PRIMARY.to_string()
}
fn default_grid() -> String {
    LIGHT_GRID.to_string()
}
fn default_status_todo() -> String {
    STATUS_TODO.to_string()
}
fn default_status_in_progress() -> String {
    STATUS_IN_PROGRESS.to_string()
}
fn default_status_blocked() -> String {
    STATUS_BLOCKED.to_string()
}
fn default_status_done() -> String {
    STATUS_DONE.to_string()
}
fn default_font_family() -> String {
    FONT_FAMILY.to_string()
}
fn default_font_size_title() -> f32 {
    FONT_SIZE_TITLE
}
fn default_font_size_meta() -> f32 {
    FONT_SIZE_META
}
fn default_line_height() -> f32 {
    LINE_HEIGHT
}
fn default_card_radius() -> f32 {
    CARD_RADIUS
}
fn default_card_padding() -> f32 {
    CARD_PADDING
}
fn default_card_min_width() -> f32 {
    CARD_MIN_WIDTH
}
fn default_card_max_width() -> f32 {
    CARD_MAX_WIDTH
}

impl Default for CanvasTheme {
    fn default() -> Self {
        Self::light()
    }
}

impl CanvasTheme {
    pub fn light() -> Self {
        CanvasTheme {
            name: "light".to_string(),
            background: LIGHT_BACKGROUND.to_string(),
            surface: LIGHT_SURFACE.to_string(),
            card: LIGHT_CARD.to_string(),
            text: LIGHT_TEXT.to_string(),
            text_secondary: LIGHT_TEXT_SECONDARY.to_string(),
            border: LIGHT_BORDER.to_string(),
            primary: LIGHT_PRIMARY.to_string(),
            grid: LIGHT_GRID.to_string(),
            status: StatusColors::default(),

            font_family: FONT_FAMILY.to_string(),
            font_size_title: FONT_SIZE_TITLE,
            font_size_meta: FONT_SIZE_META,
            line_height: LINE_HEIGHT,

            card_radius: CARD_RADIUS,
            card_padding: CARD_PADDING,
            card_min_width: CARD_MIN_WIDTH,
            card_max_width: CARD_MAX_WIDTH,
        }
    }

    pub fn from_builtin(name: &str) -> Result<Self> {
        let normalized = name.trim().to_ascii_lowercase().replace('-', "_");
        let content = BUILTIN_THEMES
            .iter()
            .find(|(n, _)| *n == normalized)
            .map(|(_, c)| *c)
            .ok_or_else(|| CanvasError::UnknownTheme {
                name: name.to_string(),
                available: Self::list_builtins().join(", "),
            })?;
        Self::from_toml(content)
    }

    pub fn list_builtins() -> Vec<&'static str> {
        BUILTIN_THEMES.iter().map(|(n, _)| *n).collect()
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Reads a theme file, trying TOML first and then YAML.
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(CanvasError::MissingPath {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        match Self::from_toml(&content) {
            Ok(theme) => Ok(theme),
            Err(toml_err) => Self::from_yaml(&content).map_err(|yaml_err| {
                log::debug!("theme {}: not TOML ({toml_err})", path.display());
                yaml_err
            }),
        }
    }

    /// A path to an existing file, otherwise a built-in theme name.
    pub fn resolve(name_or_path: &str) -> Result<Self> {
        let path = Path::new(name_or_path);
        if path.is_file() {
            Self::from_path(path)
        } else {
            Self::from_builtin(name_or_path)
        }
    }

    pub fn status_color(&self, status: NodeStatus) -> &str {
        match status {
            NodeStatus::Todo => &self.status.todo,
            NodeStatus::InProgress => &self.status.in_progress,
            NodeStatus::Blocked => &self.status.blocked,
            NodeStatus::Done => &self.status.done,
        }
    }
}
