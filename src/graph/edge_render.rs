use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;

use crate::config::{EdgeConfig, RoutingMode};

use super::geometry::{Rect, arrow_head_path, bezier_path_for_rects, route_orthogonal};
use super::registry::{NodeEntry, NodeRegistry, Subscription};
use super::types::{Edge, EdgeKind};

/// What to draw for one edge this frame. An empty `path` means the edge is
/// skipped (an endpoint is missing or not measured yet).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeGeometry {
    pub id: String,
    pub from: String,
    pub to: String,
    pub kind: EdgeKind,
    pub path: String,
    pub arrow: String,
    pub opacity: f32,
}

impl EdgeGeometry {
    fn skipped(edge: &Edge, opacity: f32) -> Self {
        Self {
            id: edge.id.clone(),
            from: edge.from.clone(),
            to: edge.to.clone(),
            kind: edge.kind,
            path: String::new(),
            arrow: String::new(),
            opacity,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }
}

pub fn edge_opacity(kind: EdgeKind, config: &EdgeConfig) -> f32 {
    match kind {
        EdgeKind::Parent => config.parent_opacity,
        EdgeKind::Sequential => config.sequential_opacity,
    }
}

/// Connector and arrowhead between two rectangles.
pub fn edge_geometry_for_rects(edge: &Edge, from: &Rect, to: &Rect, config: &EdgeConfig) -> EdgeGeometry {
    let opacity = edge_opacity(edge.kind, config);
    let mut geometry = EdgeGeometry::skipped(edge, opacity);

    match config.routing {
        RoutingMode::Orthogonal => {
            if let Some(routed) = route_orthogonal(from, to, config.stand_off, config.corner_radius) {
                geometry.arrow = arrow_head_path(routed.tail, routed.tip, config.arrow_length, config.arrow_width);
                geometry.path = routed.path;
            }
        }
        RoutingMode::Bezier => {
            if let Some(curve) = bezier_path_for_rects(from, to, config.curvature, config.min_strength, config.max_strength) {
                geometry.arrow = arrow_head_path(curve.control2, curve.end, config.arrow_length, config.arrow_width);
                geometry.path = curve.path;
            }
        }
    }

    geometry
}

/// One-shot lookup of both endpoints in the registry.
pub fn edge_geometry(edge: &Edge, registry: &NodeRegistry, config: &EdgeConfig) -> EdgeGeometry {
    match (registry.get(&edge.from), registry.get(&edge.to)) {
        (Some(a), Some(b)) => edge_geometry_for_rects(edge, &a.rect(), &b.rect(), config),
        _ => EdgeGeometry::skipped(edge, edge_opacity(edge.kind, config)),
    }
}

/// The edge layer of one canvas. Endpoints are re-resolved only after a
/// mount or unmount; every frame reads the live cells directly.
pub struct EdgeLayer {
    registry: NodeRegistry,
    edges: Vec<Edge>,
    config: EdgeConfig,
    resolved: Vec<Option<(NodeEntry, NodeEntry)>>,
    dirty: Arc<AtomicBool>,
    _subscription: Subscription,
}

impl EdgeLayer {
    pub fn new(registry: NodeRegistry, edges: Vec<Edge>, config: EdgeConfig) -> Self {
        let dirty = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&dirty);
        let subscription = registry.subscribe(move |_| flag.store(true, Ordering::Release));
        Self {
            registry,
            edges,
            config,
            resolved: Vec::new(),
            dirty,
            _subscription: subscription,
        }
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Replaces the edge list, e.g. after re-deriving from a new task list.
    pub fn set_edges(&mut self, edges: Vec<Edge>) {
        self.edges = edges;
        self.dirty.store(true, Ordering::Release);
    }

    pub fn set_config(&mut self, config: EdgeConfig) {
        self.config = config;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Geometry for every edge, in edge order.
    pub fn frame(&mut self) -> Vec<EdgeGeometry> {
        if self.dirty.swap(false, Ordering::AcqRel) {
            self.resolve();
        }

        self.edges
            .iter()
            .zip(&self.resolved)
            .map(|(edge, endpoints)| match endpoints {
                Some((a, b)) => edge_geometry_for_rects(edge, &a.rect(), &b.rect(), &self.config),
                None => EdgeGeometry::skipped(edge, edge_opacity(edge.kind, &self.config)),
            })
            .collect()
    }

    fn resolve(&mut self) {
        self.resolved = self
            .edges
            .iter()
            .map(|edge| Some((self.registry.get(&edge.from)?, self.registry.get(&edge.to)?)))
            .collect();
        let missing = self.resolved.iter().filter(|r| r.is_none()).count();
        log::trace!(
            "edge layer resolved {} edges ({missing} waiting for endpoints)",
            self.edges.len()
        );
    }
}
