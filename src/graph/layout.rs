use std::cmp::Ordering;
use std::collections::{HashMap, HashSet, VecDeque};

use crate::config::LayoutConfig;

use super::geometry::{Point, Rect, Size};
use super::types::{Edge, EdgeKind, Node};

/// Final rectangle of one input node.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedNode {
    pub id: String,
    pub rect: Rect,
    pub rank: usize,
}

/// Layout result, one entry per input node in input order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphLayout {
    pub nodes: Vec<PlacedNode>,
    pub bbox: Rect,
}

impl GraphLayout {
    pub fn get(&self, id: &str) -> Option<&PlacedNode> {
        self.nodes.iter().find(|placed| placed.id == id)
    }

    pub fn position(&self, id: &str) -> Option<Point> {
        self.get(id).map(|placed| Point::new(placed.rect.x, placed.rect.y))
    }

    /// Writes positions back onto the nodes the layout was computed from.
    /// Ids, parents and sizes are left alone. Returns how many were moved.
    pub fn apply(&self, nodes: &mut [Node]) -> usize {
        let mut moved = 0;
        for (node, placed) in nodes.iter_mut().zip(&self.nodes) {
            if node.id == placed.id {
                node.position = Some(Point::new(placed.rect.x, placed.rect.y));
                moved += 1;
            }
        }
        moved
    }
}

#[derive(Debug, Clone, Copy)]
struct Vertex {
    width: f32,
    height: f32,
    rank: usize,
    /// Input position for real nodes; dummies follow in creation order.
    order: usize,
}

/// Layered layout engine
#[derive(Debug, Clone)]
pub struct LayoutEngine {
    pub rank_separation: f32,
    pub node_separation: f32,
    pub margin: f32,
    pub default_size: Size,
}

impl Default for LayoutEngine {
    fn default() -> Self {
        Self::new(&LayoutConfig::default())
    }
}

impl LayoutEngine {
    pub fn new(config: &LayoutConfig) -> Self {
        Self {
            rank_separation: config.rank_separation,
            node_separation: config.node_separation,
            margin: config.margin,
            default_size: Size::new(config.default_node_width, config.default_node_height),
        }
    }

    /// Measured size, or the configured default for nodes not measured yet.
    pub fn node_size(&self, node: &Node) -> Size {
        node.size
            .filter(Size::is_measured)
            .unwrap_or(self.default_size)
    }

    pub fn layout(&self, nodes: &[Node], edges: &[Edge]) -> GraphLayout {
        if nodes.is_empty() {
            return GraphLayout::default();
        }

        // First occurrence wins when ids repeat.
        let mut index: HashMap<&str, usize> = HashMap::new();
        for (i, node) in nodes.iter().enumerate() {
            index.entry(node.id.as_str()).or_insert(i);
        }

        let mut seen: HashSet<(usize, usize)> = HashSet::new();
        let mut links: Vec<(usize, usize)> = Vec::new();
        for edge in edges.iter().filter(|e| e.kind == EdgeKind::Parent) {
            let (Some(&from), Some(&to)) = (index.get(edge.from.as_str()), index.get(edge.to.as_str())) else {
                continue;
            };
            if from != to && seen.insert((from, to)) {
                links.push((from, to));
            }
        }

        let ranks = longest_path_ranks(nodes.len(), &links);

        let mut vertices: Vec<Vertex> = nodes
            .iter()
            .enumerate()
            .map(|(i, node)| {
                let size = self.node_size(node);
                Vertex {
                    width: size.width,
                    height: size.height,
                    rank: ranks[i],
                    order: i,
                }
            })
            .collect();

        // --- Dummy vertices for edges spanning more than one rank ---
        let mut augmented: Vec<(usize, usize)> = Vec::with_capacity(links.len());
        for &(from, to) in &links {
            let from_rank = vertices[from].rank;
            let to_rank = vertices[to].rank;
            if to_rank > from_rank + 1 {
                let mut prev = from;
                for rank in (from_rank + 1)..to_rank {
                    let dummy = vertices.len();
                    vertices.push(Vertex {
                        width: 0.0,
                        height: 0.0,
                        rank,
                        order: dummy,
                    });
                    augmented.push((prev, dummy));
                    prev = dummy;
                }
                augmented.push((prev, to));
            } else {
                augmented.push((from, to));
            }
        }

        let mut incoming: Vec<Vec<usize>> = vec![Vec::new(); vertices.len()];
        let mut outgoing: Vec<Vec<usize>> = vec![Vec::new(); vertices.len()];
        for &(from, to) in &augmented {
            outgoing[from].push(to);
            incoming[to].push(from);
        }

        let max_rank = vertices.iter().map(|v| v.rank).max().unwrap_or(0);
        let mut layers: Vec<Vec<usize>> = vec![Vec::new(); max_rank + 1];
        for (i, vertex) in vertices.iter().enumerate() {
            layers[vertex.rank].push(i);
        }
        for layer in &mut layers {
            layer.sort_by_key(|&v| vertices[v].order);
        }

        // --- Crossing reduction ---
        for _ in 0..6 {
            for rank in 1..layers.len() {
                let (fixed, rest) = layers.split_at_mut(rank);
                order_by_barycenter(&mut rest[0], &fixed[rank - 1], &incoming, &vertices);
            }
            for rank in (0..layers.len().saturating_sub(1)).rev() {
                let (head, tail) = layers.split_at_mut(rank + 1);
                order_by_barycenter(&mut head[rank], &tail[0], &outgoing, &vertices);
            }
        }

        // --- Initial coordinates, each rank centred on the widest ---
        let rank_widths: Vec<f32> = layers
            .iter()
            .map(|layer| {
                layer.iter().map(|&v| vertices[v].width).sum::<f32>()
                    + self.node_separation * layer.len().saturating_sub(1) as f32
            })
            .collect();
        let widest = rank_widths.iter().copied().fold(0.0, f32::max);

        let mut xs = vec![0.0f32; vertices.len()];
        let mut ys = vec![0.0f32; vertices.len()];
        let mut y = 0.0;
        for (rank, layer) in layers.iter().enumerate() {
            let mut x = (widest - rank_widths[rank]).max(0.0) / 2.0;
            let mut rank_height: f32 = 0.0;
            for &v in layer {
                xs[v] = x;
                ys[v] = y;
                x += vertices[v].width + self.node_separation;
                rank_height = rank_height.max(vertices[v].height);
            }
            y += rank_height + self.rank_separation;
        }

        // --- Median refinement ---
        for _ in 0..4 {
            for rank in 1..layers.len() {
                self.align_to_median(&layers[rank], &incoming, &vertices, &mut xs);
            }
            for rank in (0..layers.len().saturating_sub(1)).rev() {
                self.align_to_median(&layers[rank], &outgoing, &vertices, &mut xs);
            }
        }

        // --- Normalize real nodes to the margin ---
        let real = nodes.len();
        let min_x = xs[..real].iter().copied().fold(f32::INFINITY, f32::min);
        let min_y = ys[..real].iter().copied().fold(f32::INFINITY, f32::min);
        let dx = self.margin - min_x;
        let dy = self.margin - min_y;

        let placed: Vec<PlacedNode> = nodes
            .iter()
            .enumerate()
            .map(|(i, node)| PlacedNode {
                id: node.id.clone(),
                rect: Rect::new(xs[i] + dx, ys[i] + dy, vertices[i].width, vertices[i].height),
                rank: vertices[i].rank,
            })
            .collect();

        let bbox = bounding_box(&placed);
        log::debug!(
            "layout: {} nodes, {} ranks, {} dummies, bbox {:.0}x{:.0}",
            real,
            layers.len(),
            vertices.len() - real,
            bbox.w,
            bbox.h
        );

        GraphLayout { nodes: placed, bbox }
    }

    fn align_to_median(&self, layer: &[usize], neighbors: &[Vec<usize>], vertices: &[Vertex], xs: &mut [f32]) {
        for &v in layer {
            let mut centers: Vec<f32> = neighbors[v]
                .iter()
                .map(|&n| xs[n] + vertices[n].width / 2.0)
                .collect();
            if centers.is_empty() {
                continue;
            }
            centers.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
            let median = centers[centers.len() / 2];
            xs[v] = median - vertices[v].width / 2.0;
        }

        // Enforce minimum spacing
        let mut prev_right = f32::NEG_INFINITY;
        for &v in layer {
            xs[v] = xs[v].max(prev_right + self.node_separation);
            prev_right = xs[v] + vertices[v].width;
        }
    }
}

/// Longest-path ranks over parent links (Kahn). When the queue runs dry the
/// first unranked node in input order that lies on a cycle becomes a root;
/// nodes merely hanging off a cycle wait for it.
fn longest_path_ranks(count: usize, links: &[(usize, usize)]) -> Vec<usize> {
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); count];
    let mut pending = vec![0usize; count];
    for &(from, to) in links {
        children[from].push(to);
        pending[to] += 1;
    }

    let mut rank = vec![0usize; count];
    let mut settled = vec![false; count];
    let mut queue: VecDeque<usize> = VecDeque::new();
    for i in 0..count {
        if pending[i] == 0 {
            settled[i] = true;
            queue.push_back(i);
        }
    }

    let mut remaining = count;
    loop {
        while let Some(node) = queue.pop_front() {
            remaining -= 1;
            for &child in &children[node] {
                if settled[child] {
                    continue;
                }
                rank[child] = rank[child].max(rank[node] + 1);
                pending[child] -= 1;
                if pending[child] == 0 {
                    settled[child] = true;
                    queue.push_back(child);
                }
            }
        }

        if remaining == 0 {
            break;
        }
        let Some(next) = (0..count)
            .find(|&i| !settled[i] && on_unsettled_cycle(i, &children, &settled))
            .or_else(|| (0..count).find(|&i| !settled[i]))
        else {
            break;
        };
        log::debug!("layout: cycle through node #{next}; treating it as a root");
        rank[next] = 0;
        pending[next] = 0;
        settled[next] = true;
        queue.push_back(next);
    }

    rank
}

fn on_unsettled_cycle(start: usize, children: &[Vec<usize>], settled: &[bool]) -> bool {
    let mut visited = vec![false; children.len()];
    let mut stack = vec![start];
    while let Some(node) = stack.pop() {
        for &child in &children[node] {
            if child == start {
                return true;
            }
            if !settled[child] && !visited[child] {
                visited[child] = true;
                stack.push(child);
            }
        }
    }
    false
}

fn order_by_barycenter(layer: &mut Vec<usize>, fixed: &[usize], neighbors: &[Vec<usize>], vertices: &[Vertex]) {
    let fixed_pos: HashMap<usize, usize> = fixed.iter().enumerate().map(|(i, &v)| (v, i)).collect();

    let mut keyed: Vec<(usize, Option<f32>)> = layer
        .iter()
        .map(|&v| (v, barycenter(&neighbors[v], &fixed_pos)))
        .collect();

    keyed.sort_by(|(a, bc_a), (b, bc_b)| {
        let by_order = || vertices[*a].order.cmp(&vertices[*b].order);
        match (bc_a, bc_b) {
            (Some(x), Some(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal).then_with(by_order),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => by_order(),
        }
    });

    *layer = keyed.into_iter().map(|(v, _)| v).collect();
}

fn barycenter(neighbors: &[usize], rank_pos: &HashMap<usize, usize>) -> Option<f32> {
    let mut total = 0.0;
    let mut count = 0.0;
    for neighbor in neighbors {
        if let Some(pos) = rank_pos.get(neighbor) {
            total += *pos as f32;
            count += 1.0;
        }
    }

    if count > 0.0 { Some(total / count) } else { None }
}

fn bounding_box(placed: &[PlacedNode]) -> Rect {
    if placed.is_empty() {
        return Rect::default();
    }

    let mut min_x = f32::MAX;
    let mut min_y = f32::MAX;
    let mut max_x = f32::MIN;
    let mut max_y = f32::MIN;

    for node in placed {
        min_x = min_x.min(node.rect.x);
        min_y = min_y.min(node.rect.y);
        max_x = max_x.max(node.rect.right());
        max_y = max_y.max(node.rect.bottom());
    }

    Rect::new(min_x, min_y, max_x - min_x, max_y - min_y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::edges::derive_graph_edges;

    fn tree() -> Vec<Node> {
        vec![
            Node::new("root", "Root").created("2024-01-01"),
            Node::new("a", "A").with_parent("root"),
            Node::new("b", "B").with_parent("root"),
            Node::new("a1", "A1").with_parent("a"),
            Node::new("solo", "Solo").created("2024-02-01"),
        ]
    }

    #[test]
    fn same_graph_gives_same_coordinates() {
        let nodes = tree();
        let edges = derive_graph_edges(&nodes);
        let engine = LayoutEngine::default();
        assert_eq!(engine.layout(&nodes, &edges), engine.layout(&nodes, &edges));
    }

    #[test]
    fn children_sit_below_parents() {
        let nodes = tree();
        let edges = derive_graph_edges(&nodes);
        let layout = LayoutEngine::default().layout(&nodes, &edges);

        let y = |id: &str| layout.get(id).map(|p| p.rect.y).unwrap_or(f32::NAN);
        assert!(y("a") > y("root"));
        assert!(y("a1") > y("a"));
        assert_eq!(y("a"), y("b"));
        assert_eq!(layout.get("a1").map(|p| p.rank), Some(2));
    }

    #[test]
    fn same_rank_nodes_keep_separation() {
        let nodes = tree();
        let edges = derive_graph_edges(&nodes);
        let engine = LayoutEngine::default();
        let layout = engine.layout(&nodes, &edges);

        let mut rank_one: Vec<Rect> = layout
            .nodes
            .iter()
            .filter(|p| p.rank == 1)
            .map(|p| p.rect)
            .collect();
        rank_one.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(Ordering::Equal));
        for pair in rank_one.windows(2) {
            assert!(pair[1].x - pair[0].right() >= engine.node_separation - 0.01);
        }
    }

    #[test]
    fn drawing_starts_at_the_margin() {
        let nodes = tree();
        let edges = derive_graph_edges(&nodes);
        let layout = LayoutEngine::default().layout(&nodes, &edges);
        assert!((layout.bbox.x - 40.0).abs() < 0.01);
        assert!((layout.bbox.y - 40.0).abs() < 0.01);
    }

    #[test]
    fn unmeasured_nodes_use_default_size() {
        let nodes = vec![Node::new("a", ""), Node::new("b", "").sized(300.0, 90.0)];
        let layout = LayoutEngine::default().layout(&nodes, &[]);
        let a = layout.get("a").map(|p| p.rect).unwrap_or_default();
        let b = layout.get("b").map(|p| p.rect).unwrap_or_default();
        assert_eq!((a.w, a.h), (200.0, 120.0));
        assert_eq!((b.w, b.h), (300.0, 90.0));
    }

    #[test]
    fn cycles_and_orphans_still_get_positions() {
        let nodes = vec![
            Node::new("x", "").with_parent("y"),
            Node::new("y", "").with_parent("x"),
            Node::new("orphan", "").with_parent("missing"),
        ];
        let edges = vec![
            Edge::new("y", "x", EdgeKind::Parent),
            Edge::new("x", "y", EdgeKind::Parent),
            Edge::new("missing", "orphan", EdgeKind::Parent),
        ];
        let layout = LayoutEngine::default().layout(&nodes, &edges);
        assert_eq!(layout.nodes.len(), 3);
        assert!(layout.nodes.iter().all(|p| p.rect.x.is_finite() && p.rect.y.is_finite()));
        assert_eq!(layout.get("x").map(|p| p.rank), Some(0));
        assert_eq!(layout.get("y").map(|p| p.rank), Some(1));
        assert_eq!(layout.get("orphan").map(|p| p.rank), Some(0));
        assert_eq!(layout, LayoutEngine::default().layout(&nodes, &edges));
    }

    #[test]
    fn cycle_descendant_listed_first_ranks_below_the_cycle() {
        let nodes = vec![
            Node::new("z", "").with_parent("y"),
            Node::new("x", "").with_parent("y"),
            Node::new("y", "").with_parent("x"),
        ];
        let edges = derive_graph_edges(&nodes);
        let layout = LayoutEngine::default().layout(&nodes, &edges);

        let rank = |id: &str| layout.get(id).map(|p| p.rank);
        assert_eq!(rank("x"), Some(0));
        assert_eq!(rank("y"), Some(1));
        assert_eq!(rank("z"), Some(2));
        let y = |id: &str| layout.get(id).map(|p| p.rect.y).unwrap_or(f32::NAN);
        assert!(y("z") > y("y"));
    }

    #[test]
    fn long_edges_do_not_break_ranking() {
        let nodes = vec![
            Node::new("r", ""),
            Node::new("m", "").with_parent("r"),
            Node::new("l", "").with_parent("m"),
            Node::new("skip", "").with_parent("r"),
        ];
        let mut edges = derive_graph_edges(&nodes);
        edges.push(Edge::new("r", "l", EdgeKind::Parent));
        let layout = LayoutEngine::default().layout(&nodes, &edges);
        assert_eq!(layout.get("l").map(|p| p.rank), Some(2));
        assert_eq!(layout.nodes.len(), 4);
    }

    #[test]
    fn sequential_edges_do_not_rank() {
        let nodes = vec![Node::new("a", "").created("2024-01-01"), Node::new("b", "").created("2024-01-02")];
        let edges = derive_graph_edges(&nodes);
        let layout = LayoutEngine::default().layout(&nodes, &edges);
        assert!(layout.nodes.iter().all(|p| p.rank == 0));
    }

    #[test]
    fn apply_writes_positions_only() {
        let mut nodes = tree();
        let edges = derive_graph_edges(&nodes);
        let layout = LayoutEngine::default().layout(&nodes, &edges);
        let before: Vec<(String, Option<String>)> =
            nodes.iter().map(|n| (n.id.clone(), n.parent_id.clone())).collect();

        assert_eq!(layout.apply(&mut nodes), nodes.len());
        let after: Vec<(String, Option<String>)> =
            nodes.iter().map(|n| (n.id.clone(), n.parent_id.clone())).collect();
        assert_eq!(before, after);
        assert_eq!(nodes[0].position, layout.position("root"));
        assert_eq!(derive_graph_edges(&nodes), edges);
    }

    #[test]
    fn empty_input_is_empty_layout() {
        assert_eq!(LayoutEngine::default().layout(&[], &[]), GraphLayout::default());
    }
}
