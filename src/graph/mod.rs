pub mod edge_render;
pub mod edges;
pub mod geometry;
pub mod gesture;
pub mod interaction;
pub mod layout;
pub mod registry;
pub mod scene;
pub mod types;

pub use edge_render::{EdgeGeometry, EdgeLayer, edge_geometry};
pub use edges::derive_graph_edges;
pub use geometry::{Point, Rect, Size};
pub use gesture::{Arbiter, ArbitrationTable, GestureKind, Relation};
pub use interaction::{
    CanvasController, CanvasDelegate, CanvasEvent, GesturePhase, PointerEvent, PointerPhase, PressOptions,
    PressSource, Viewport,
};
pub use layout::{GraphLayout, LayoutEngine};
pub use registry::{NodeEntry, NodeHandle, NodeHandlers, NodeRegistry, Subscription};
pub use scene::{Scene, SceneOptions, render_canvas};
pub use types::{Edge, EdgeKind, Node, NodeStatus, TaskDocument};
