use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CanvasError, Result};

const MIN_ZOOM: f32 = 0.5;
const MAX_ZOOM: f32 = 2.0;
const ZOOM_STEP: f32 = 1.2;
const WHEEL_SENSITIVITY: f32 = 0.0015;

const TOUCH_SLOP: f32 = 8.0;
const LONG_PRESS_MS: u64 = 500;
const LONG_PRESS_TOLERANCE: f32 = 10.0;
const TWO_FINGER_TAP_MS: u64 = 250;
const TWO_FINGER_TAP_DISTANCE: f32 = 24.0;
const DRAG_LIFT_SCALE: f32 = 1.05;

const RANK_SEPARATION: f32 = 80.0;
const NODE_SEPARATION: f32 = 60.0;
const LAYOUT_MARGIN: f32 = 40.0;
const DEFAULT_NODE_WIDTH: f32 = 200.0;
const DEFAULT_NODE_HEIGHT: f32 = 120.0;

const STAND_OFF: f32 = 16.0;
const CORNER_RADIUS: f32 = 12.0;
const CURVATURE: f32 = 0.5;
const MIN_STRENGTH: f32 = 24.0;
const MAX_STRENGTH: f32 = 160.0;
const ARROW_LENGTH: f32 = 12.0;
const ARROW_WIDTH: f32 = 10.0;
const STROKE_WIDTH: f32 = 2.0;
const PARENT_OPACITY: f32 = 1.0;
const SEQUENTIAL_OPACITY: f32 = 0.45;

/// Everything tunable about one canvas. Every field has a default, so a
/// config file only needs the keys it changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanvasConfig {
    #[serde(default)]
    pub viewport: ViewportConfig,
    #[serde(default)]
    pub gestures: GestureConfig,
    #[serde(default)]
    pub layout: LayoutConfig,
    #[serde(default)]
    pub edges: EdgeConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewportConfig {
    #[serde(default = "default_min_zoom")]
    pub min_zoom: f32,
    #[serde(default = "default_max_zoom")]
    pub max_zoom: f32,
    /// Factor applied by `zoom_in` / `zoom_out`.
    #[serde(default = "default_zoom_step")]
    pub zoom_step: f32,
    #[serde(default = "default_wheel_sensitivity")]
    pub wheel_sensitivity: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GestureConfig {
    /// Movement before a press turns into a pan or drag.
    #[serde(default = "default_touch_slop")]
    pub touch_slop: f32,
    #[serde(default = "default_long_press_ms")]
    pub long_press_ms: u64,
    #[serde(default = "default_long_press_tolerance")]
    pub long_press_tolerance: f32,
    #[serde(default = "default_two_finger_tap_ms")]
    pub two_finger_tap_ms: u64,
    #[serde(default = "default_two_finger_tap_distance")]
    pub two_finger_tap_distance: f32,
    #[serde(default = "default_drag_lift_scale")]
    pub drag_lift_scale: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    #[serde(default = "default_rank_separation")]
    pub rank_separation: f32,
    #[serde(default = "default_node_separation")]
    pub node_separation: f32,
    #[serde(default = "default_layout_margin")]
    pub margin: f32,
    #[serde(default = "default_node_width")]
    pub default_node_width: f32,
    #[serde(default = "default_node_height")]
    pub default_node_height: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingMode {
    #[default]
    Orthogonal,
    Bezier,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeConfig {
    #[serde(default)]
    pub routing: RoutingMode,
    #[serde(default = "default_stand_off")]
    pub stand_off: f32,
    #[serde(default = "default_corner_radius")]
    pub corner_radius: f32,
    #[serde(default = "default_curvature")]
    pub curvature: f32,
    #[serde(default = "default_min_strength")]
    pub min_strength: f32,
    #[serde(default = "default_max_strength")]
    pub max_strength: f32,
    #[serde(default = "default_arrow_length")]
    pub arrow_length: f32,
    #[serde(default = "default_arrow_width")]
    pub arrow_width: f32,
    #[serde(default = "default_stroke_width")]
    pub stroke_width: f32,
    #[serde(default = "default_parent_opacity")]
    pub parent_opacity: f32,
    #[serde(default = "default_sequential_opacity")]
    pub sequential_opacity: f32,
}

fn default_min_zoom() -> f32 {
    MIN_ZOOM
}
fn default_max_zoom() -> f32 {
    MAX_ZOOM
}
fn default_zoom_step() -> f32 {
    ZOOM_STEP
}
fn default_wheel_sensitivity() -> f32 {
    WHEEL_SENSITIVITY
}
fn default_touch_slop() -> f32 {
    TOUCH_SLOP
}
fn default_long_press_ms() -> u64 {
    LONG_PRESS_MS
}
fn default_long_press_tolerance() -> f32 {
    LONG_PRESS_TOLERANCE
}
fn default_two_finger_tap_ms() -> u64 {
    TWO_FINGER_TAP_MS
}
fn default_two_finger_tap_distance() -> f32 {
    TWO_FINGER_TAP_DISTANCE
}
fn default_drag_lift_scale() -> f32 {
    DRAG_LIFT_SCALE
}
fn default_rank_separation() -> f32 {
    RANK_SEPARATION
}
fn default_node_separation() -> f32 {
    NODE_SEPARATION
}
fn default_layout_margin() -> f32 {
    LAYOUT_MARGIN
}
fn default_node_width() -> f32 {
    DEFAULT_NODE_WIDTH
}
fn default_node_height() -> f32 {
    DEFAULT_NODE_HEIGHT
}
fn default_stand_off() -> f32 {
    STAND_OFF
}
fn default_corner_radius() -> f32 {
    CORNER_RADIUS
}
fn default_curvature() -> f32 {
    CURVATURE
}
fn default_min_strength() -> f32 {
    MIN_STRENGTH
}
fn default_max_strength() -> f32 {
    MAX_STRENGTH
}
fn default_arrow_length() -> f32 {
    ARROW_LENGTH
}
fn default_arrow_width() -> f32 {
    ARROW_WIDTH
}
fn default_stroke_width() -> f32 {
    STROKE_WIDTH
}
fn default_parent_opacity() -> f32 {
    PARENT_OPACITY
}
fn default_sequential_opacity() -> f32 {
    SEQUENTIAL_OPACITY
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            min_zoom: MIN_ZOOM,
            max_zoom: MAX_ZOOM,
            zoom_step: ZOOM_STEP,
            wheel_sensitivity: WHEEL_SENSITIVITY,
        }
    }
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            touch_slop: TOUCH_SLOP,
            long_press_ms: LONG_PRESS_MS,
            long_press_tolerance: LONG_PRESS_TOLERANCE,
            two_finger_tap_ms: TWO_FINGER_TAP_MS,
            two_finger_tap_distance: TWO_FINGER_TAP_DISTANCE,
            drag_lift_scale: DRAG_LIFT_SCALE,
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            rank_separation: RANK_SEPARATION,
            node_separation: NODE_SEPARATION,
            margin: LAYOUT_MARGIN,
            default_node_width: DEFAULT_NODE_WIDTH,
            default_node_height: DEFAULT_NODE_HEIGHT,
        }
    }
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            routing: RoutingMode::Orthogonal,
            stand_off: STAND_OFF,
            corner_radius: CORNER_RADIUS,
            curvature: CURVATURE,
            min_strength: MIN_STRENGTH,
            max_strength: MAX_STRENGTH,
            arrow_length: ARROW_LENGTH,
            arrow_width: ARROW_WIDTH,
            stroke_width: STROKE_WIDTH,
            parent_opacity: PARENT_OPACITY,
            sequential_opacity: SEQUENTIAL_OPACITY,
        }
    }
}

/// `value` if finite and at least `min`, else `fallback`.
fn at_least(value: f32, min: f32, fallback: f32) -> f32 {
    if value.is_finite() && value >= min { value } else { fallback }
}

impl CanvasConfig {
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str::<Self>(content)?.sanitized())
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str::<Self>(content)?.sanitized())
    }

    /// Loads `.toml`, `.yaml`/`.yml` or `.json` by extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(CanvasError::MissingPath {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match ext.as_str() {
            "toml" => Self::from_toml(&content),
            "yaml" | "yml" => Self::from_yaml(&content),
            "json" => Ok(serde_json::from_str::<Self>(&content)?.sanitized()),
            _ => Err(CanvasError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }

    /// Replaces values that would make gestures or geometry misbehave
    /// (non-finite, negative, inverted ranges) with their defaults.
    pub fn sanitized(mut self) -> Self {
        let vp = &mut self.viewport;
        vp.min_zoom = at_least(vp.min_zoom, f32::MIN_POSITIVE, MIN_ZOOM);
        vp.max_zoom = at_least(vp.max_zoom, f32::MIN_POSITIVE, MAX_ZOOM);
        if vp.min_zoom > vp.max_zoom {
            log::warn!(
                "config: min_zoom {} exceeds max_zoom {}; swapping",
                vp.min_zoom,
                vp.max_zoom
            );
            std::mem::swap(&mut vp.min_zoom, &mut vp.max_zoom);
        }
        vp.zoom_step = at_least(vp.zoom_step, 1.0, ZOOM_STEP);
        vp.wheel_sensitivity = at_least(vp.wheel_sensitivity, 0.0, WHEEL_SENSITIVITY);

        let g = &mut self.gestures;
        g.touch_slop = at_least(g.touch_slop, 0.0, TOUCH_SLOP);
        g.long_press_tolerance = at_least(g.long_press_tolerance, 0.0, LONG_PRESS_TOLERANCE);
        g.two_finger_tap_distance = at_least(g.two_finger_tap_distance, 0.0, TWO_FINGER_TAP_DISTANCE);
        g.drag_lift_scale = at_least(g.drag_lift_scale, f32::MIN_POSITIVE, DRAG_LIFT_SCALE);

        let l = &mut self.layout;
        l.rank_separation = at_least(l.rank_separation, 0.0, RANK_SEPARATION);
        l.node_separation = at_least(l.node_separation, 0.0, NODE_SEPARATION);
        l.margin = at_least(l.margin, 0.0, LAYOUT_MARGIN);
        l.default_node_width = at_least(l.default_node_width, 1.0, DEFAULT_NODE_WIDTH);
        l.default_node_height = at_least(l.default_node_height, 1.0, DEFAULT_NODE_HEIGHT);

        let e = &mut self.edges;
        e.stand_off = at_least(e.stand_off, 0.0, STAND_OFF);
        e.corner_radius = at_least(e.corner_radius, 0.0, CORNER_RADIUS);
        e.curvature = at_least(e.curvature, 0.0, CURVATURE);
        e.min_strength = at_least(e.min_strength, 0.0, MIN_STRENGTH);
        e.max_strength = at_least(e.max_strength, 0.0, MAX_STRENGTH);
        if e.min_strength > e.max_strength {
            std::mem::swap(&mut e.min_strength, &mut e.max_strength);
        }
        e.arrow_length = at_least(e.arrow_length, 0.0, ARROW_LENGTH);
        e.arrow_width = at_least(e.arrow_width, 0.0, ARROW_WIDTH);
        e.stroke_width = at_least(e.stroke_width, 0.0, STROKE_WIDTH);
        e.parent_opacity = at_least(e.parent_opacity, 0.0, PARENT_OPACITY).min(1.0);
        e.sequential_opacity = at_least(e.sequential_opacity, 0.0, SEQUENTIAL_OPACITY).min(1.0);

        self
    }
}
