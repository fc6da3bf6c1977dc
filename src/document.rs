use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CanvasError, Result};
use crate::graph::geometry::{Point, Size};
use crate::graph::interaction::{CanvasController, CanvasDelegate, PointerEvent, PointerPhase, Viewport};
use crate::graph::registry::{NodeHandle, NodeHandlers, NodeRegistry};
use crate::graph::types::TaskDocument;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
    Toml,
}

impl DocumentFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "json" => Ok(DocumentFormat::Json),
            "yaml" | "yml" => Ok(DocumentFormat::Yaml),
            "toml" => Ok(DocumentFormat::Toml),
            _ => Err(CanvasError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }

    pub fn parse<T: for<'de> Deserialize<'de>>(&self, content: &str) -> Result<T> {
        Ok(match self {
            DocumentFormat::Json => serde_json::from_str(content)?,
            DocumentFormat::Yaml => serde_yaml::from_str(content)?,
            DocumentFormat::Toml => toml::from_str(content)?,
        })
    }
}

/// Reads `path` (or stdin for `-`) in the format its extension names.
/// Stdin is taken as JSON, falling back to YAML.
pub fn load<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    if path.to_str() == Some("-") {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        return match DocumentFormat::Json.parse(&buffer) {
            Ok(value) => Ok(value),
            Err(json_err) => DocumentFormat::Yaml.parse(&buffer).map_err(|yaml_err| {
                log::debug!("stdin: not JSON ({json_err})");
                yaml_err
            }),
        };
    }

    if !path.is_file() {
        return Err(CanvasError::MissingPath {
            path: path.to_path_buf(),
        });
    }
    let format = DocumentFormat::from_path(path)?;
    let content = std::fs::read_to_string(path)?;
    format.parse(&content)
}

pub fn load_document(path: &Path) -> Result<TaskDocument> {
    let document: TaskDocument = load(path)?;
    log::debug!("loaded {} nodes from {}", document.nodes.len(), path.display());
    Ok(document)
}

fn default_node_width() -> f32 {
    200.0
}

fn default_node_height() -> f32 {
    120.0
}

/// A node view to mount before replaying.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptNode {
    pub id: String,
    pub x: f32,
    pub y: f32,
    #[serde(default = "default_node_width")]
    pub width: f32,
    #[serde(default = "default_node_height")]
    pub height: f32,
    #[serde(default)]
    pub handlers: NodeHandlers,
}

/// One recorded input. Coordinates are screen-space; `t` is milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScriptStep {
    Pointer {
        pointer: u64,
        phase: PointerPhase,
        x: f32,
        y: f32,
        t: u64,
    },
    Tick {
        t: u64,
    },
    Wheel {
        x: f32,
        y: f32,
        dy: f32,
    },
    DoubleClick {
        x: f32,
        y: f32,
        #[serde(default)]
        modifier: bool,
    },
    ZoomIn {
        x: f32,
        y: f32,
    },
    ZoomOut {
        x: f32,
        y: f32,
    },
    ResetView,
    Cancel,
}

impl ScriptStep {
    pub fn apply<D: CanvasDelegate>(&self, controller: &mut CanvasController<D>) {
        match *self {
            ScriptStep::Pointer {
                pointer,
                phase,
                x,
                y,
                t,
            } => controller.handle_pointer(PointerEvent {
                pointer,
                phase,
                position: Point::new(x, y),
                time_ms: t,
            }),
            ScriptStep::Tick { t } => controller.tick(t),
            ScriptStep::Wheel { x, y, dy } => controller.wheel(Point::new(x, y), dy),
            ScriptStep::DoubleClick { x, y, modifier } => controller.double_click(Point::new(x, y), modifier),
            ScriptStep::ZoomIn { x, y } => controller.zoom_in(Point::new(x, y)),
            ScriptStep::ZoomOut { x, y } => controller.zoom_out(Point::new(x, y)),
            ScriptStep::ResetView => controller.reset_view(),
            ScriptStep::Cancel => controller.cancel(),
        }
    }
}

/// Nodes, starting viewport and an input sequence for the replay tool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GestureScript {
    #[serde(default)]
    pub nodes: Vec<ScriptNode>,
    #[serde(default)]
    pub viewport: Option<Viewport>,
    #[serde(default)]
    pub events: Vec<ScriptStep>,
}

impl GestureScript {
    /// Mounts every script node; the handles keep them mounted.
    pub fn mount(&self, registry: &NodeRegistry) -> Vec<NodeHandle> {
        self.nodes
            .iter()
            .map(|node| {
                registry.mount_with(
                    node.id.clone(),
                    Point::new(node.x, node.y),
                    Size::new(node.width, node.height),
                    node.handlers,
                )
            })
            .collect()
    }

    pub fn replay<D: CanvasDelegate>(&self, controller: &mut CanvasController<D>) {
        if let Some(viewport) = self.viewport {
            controller.set_viewport(viewport);
        }
        for step in &self.events {
            step.apply(controller);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CanvasConfig;
    use crate::graph::interaction::CanvasEvent;

    #[test]
    fn format_follows_extension() {
        assert_eq!(DocumentFormat::from_path(Path::new("a.JSON")).ok(), Some(DocumentFormat::Json));
        assert_eq!(DocumentFormat::from_path(Path::new("a.yml")).ok(), Some(DocumentFormat::Yaml));
        assert_eq!(DocumentFormat::from_path(Path::new("a.toml")).ok(), Some(DocumentFormat::Toml));
        assert!(matches!(
            DocumentFormat::from_path(Path::new("a.csv")),
            Err(CanvasError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn task_document_parses_in_every_format() {
        let json: TaskDocument = DocumentFormat::Json
            .parse(r#"[{"id": "A"}, {"id": "B", "parentId": "A"}]"#)
            .expect("json");
        let yaml: TaskDocument = DocumentFormat::Yaml
            .parse("nodes:\n  - id: A\n  - id: B\n    parentId: A\n")
            .expect("yaml");
        let toml: TaskDocument = DocumentFormat::Toml
            .parse("[[nodes]]\nid = \"A\"\n\n[[nodes]]\nid = \"B\"\nparentId = \"A\"\n")
            .expect("toml");
        for doc in [json, yaml, toml] {
            assert_eq!(doc.nodes.len(), 2);
            assert_eq!(doc.nodes[1].parent(), Some("A"));
        }
    }

    #[test]
    fn missing_file_is_reported() {
        let err = load_document(Path::new("does/not/exist.json")).expect_err("missing");
        assert!(matches!(err, CanvasError::MissingPath { .. }));
    }

    #[test]
    fn script_replays_a_drag() {
        let script: GestureScript = DocumentFormat::Json
            .parse(
                r#"{
                    "nodes": [{"id": "X", "x": 100, "y": 100}],
                    "events": [
                        {"type": "pointer", "pointer": 1, "phase": "down", "x": 150, "y": 150, "t": 0},
                        {"type": "pointer", "pointer": 1, "phase": "move", "x": 250, "y": 200, "t": 16},
                        {"type": "pointer", "pointer": 1, "phase": "move", "x": 350, "y": 300, "t": 32},
                        {"type": "pointer", "pointer": 1, "phase": "up", "x": 350, "y": 300, "t": 48}
                    ]
                }"#,
            )
            .expect("script");

        let registry = NodeRegistry::new();
        let _handles = script.mount(&registry);
        let mut controller = CanvasController::new(registry, &CanvasConfig::default(), Vec::new());
        script.replay(&mut controller);

        assert_eq!(
            controller.into_delegate(),
            vec![CanvasEvent::NodeMoveCommitted {
                id: "X".into(),
                x: 300.0,
                y: 250.0
            }]
        );
    }

    #[test]
    fn script_handlers_default_to_all() {
        let node: ScriptNode = DocumentFormat::Yaml
            .parse("id: n\nx: 0\ny: 0\nhandlers:\n  pan: false\n")
            .expect("yaml");
        assert_eq!(node.width, 200.0);
        assert!(!node.handlers.pan);
        assert!(node.handlers.tap && node.handlers.long_press);
    }
}
