use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use super::types::{Edge, EdgeKind, Node};

const NAIVE_DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parent edges for every resolvable `parentId`, followed by sequential
/// edges chaining the unparented, non-standalone nodes of each group in
/// creation order.
pub fn derive_graph_edges(nodes: &[Node]) -> Vec<Edge> {
    let known: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    let mut edges = Vec::new();

    for node in nodes {
        let Some(parent) = node.parent() else {
            continue;
        };
        if parent == node.id {
            log::warn!("node {} names itself as parent; edge skipped", node.id);
            continue;
        }
        if !known.contains(parent) {
            log::debug!("node {} references missing parent {}; edge dropped", node.id, parent);
            continue;
        }
        edges.push(Edge::new(parent, node.id.as_str(), EdgeKind::Parent));
    }

    // Buckets keep first-appearance order so output is stable.
    let mut bucket_index: HashMap<Option<&str>, usize> = HashMap::new();
    let mut buckets: Vec<Vec<RootEntry>> = Vec::new();

    for (index, node) in nodes.iter().enumerate() {
        if node.parent().is_some() || node.is_standalone_root() {
            continue;
        }
        let key = node.project_id.as_deref();
        let slot = *bucket_index.entry(key).or_insert_with(|| {
            buckets.push(Vec::new());
            buckets.len() - 1
        });
        buckets[slot].push(RootEntry {
            id: node.id.as_str(),
            index,
            sort_key: sort_key(node, index),
        });
    }

    for mut roots in buckets {
        roots.sort_by(|a, b| {
            a.sort_key
                .partial_cmp(&b.sort_key)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.index.cmp(&b.index))
        });
        for pair in roots.windows(2) {
            edges.push(Edge::new(pair[0].id, pair[1].id, EdgeKind::Sequential));
        }
    }

    edges
}

struct RootEntry<'a> {
    id: &'a str,
    index: usize,
    sort_key: f64,
}

/// Creation timestamp in epoch milliseconds, else the explicit order index,
/// else the node's position in the input list.
fn sort_key(node: &Node, index: usize) -> f64 {
    if let Some(ts) = node.created_at.as_deref().and_then(parse_timestamp_millis) {
        return ts as f64;
    }
    match node.order_index {
        Some(order) if order.is_finite() => order,
        _ => index as f64,
    }
}

/// Accepts RFC 3339, naive date-times (taken as UTC) and bare dates.
pub fn parse_timestamp_millis(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp_millis());
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt.and_utc().timestamp_millis());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find<'a>(edges: &'a [Edge], from: &str, to: &str) -> Option<&'a Edge> {
        edges.iter().find(|e| e.from == from && e.to == to)
    }

    #[test]
    fn parent_and_sequential_edges_for_mixed_list() {
        let nodes = vec![
            Node::new("A", "A").created("2024-01-01"),
            Node::new("B", "B").with_parent("A"),
            Node::new("C", "C").created("2024-01-02"),
        ];
        let edges = derive_graph_edges(&nodes);
        assert_eq!(edges.len(), 2);
        assert_eq!(find(&edges, "A", "B").map(|e| e.kind), Some(EdgeKind::Parent));
        assert_eq!(find(&edges, "A", "C").map(|e| e.kind), Some(EdgeKind::Sequential));
    }

    #[test]
    fn derivation_is_idempotent() {
        let nodes = vec![
            Node::new("x", "x").created("2024-03-01T09:00:00Z"),
            Node::new("y", "y").with_parent("x"),
            Node::new("z", "z").created("not a date"),
            Node::new("w", "w").with_project("other"),
        ];
        let first = derive_graph_edges(&nodes);
        let second = derive_graph_edges(&nodes);
        assert_eq!(first, second);
        let ids: HashSet<&str> = first.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids.len(), first.len());
    }

    #[test]
    fn parented_nodes_never_get_sequential_edges() {
        let nodes = vec![
            Node::new("A", "A").created("2024-01-01"),
            Node::new("B", "B").with_parent("A").created("2024-01-02"),
        ];
        let edges = derive_graph_edges(&nodes);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].kind, EdgeKind::Parent);
        assert!(
            edges
                .iter()
                .all(|e| e.kind != EdgeKind::Sequential || (e.from != "A" && e.to != "B"))
        );
    }

    #[test]
    fn roots_chain_in_timestamp_order() {
        let nodes = vec![
            Node::new("t3", "t3").created("2024-01-03T00:00:00Z"),
            Node::new("t1", "t1").created("2024-01-01T00:00:00Z"),
            Node::new("t2", "t2").created("2024-01-02T00:00:00Z"),
        ];
        let edges = derive_graph_edges(&nodes);
        assert_eq!(edges.len(), 2);
        assert!(find(&edges, "t1", "t2").is_some());
        assert!(find(&edges, "t2", "t3").is_some());
        assert!(find(&edges, "t1", "t3").is_none());
        assert!(find(&edges, "t2", "t1").is_none());
    }

    #[test]
    fn standalone_roots_are_excluded() {
        let nodes = vec![
            Node::new("a", "a").created("2024-01-01"),
            Node::new("s", "s").created("2024-01-02").standalone(),
            Node::new("b", "b").created("2024-01-03"),
        ];
        let edges = derive_graph_edges(&nodes);
        assert!(edges.iter().all(|e| e.from != "s" && e.to != "s"));
        assert!(find(&edges, "a", "b").is_some());
    }

    #[test]
    fn groups_chain_independently() {
        let nodes = vec![
            Node::new("p1a", "").with_project("p1"),
            Node::new("p2a", "").with_project("p2"),
            Node::new("p1b", "").with_project("p1"),
            Node::new("p2b", "").with_project("p2"),
        ];
        let edges = derive_graph_edges(&nodes);
        let ids: Vec<&str> = edges.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["sequential:p1a->p1b", "sequential:p2a->p2b"]);
    }

    #[test]
    fn unparsable_timestamp_falls_back_to_order_index_then_position() {
        let mut first = Node::new("late", "").created("garbage");
        first.order_index = Some(5.0);
        let mut second = Node::new("early", "");
        second.order_index = Some(1.0);
        let edges = derive_graph_edges(&[first, second]);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].from, "early");
        assert_eq!(edges[0].to, "late");

        // No timestamp, no order index: list position decides.
        let edges = derive_graph_edges(&[Node::new("one", ""), Node::new("two", "")]);
        assert_eq!(edges[0].from, "one");
    }

    #[test]
    fn equal_keys_tie_break_on_list_position() {
        let nodes = vec![
            Node::new("b", "").created("2024-05-05"),
            Node::new("a", "").created("2024-05-05"),
        ];
        let edges = derive_graph_edges(&nodes);
        assert_eq!(edges[0].from, "b");
        assert_eq!(edges[0].to, "a");
    }

    #[test]
    fn stale_parent_references_are_dropped() {
        let nodes = vec![Node::new("orphan", "").with_parent("gone")];
        assert!(derive_graph_edges(&nodes).is_empty());
    }

    #[test]
    fn timestamps_parse_in_common_shapes() {
        let day = parse_timestamp_millis("2024-01-01").expect("date");
        assert_eq!(parse_timestamp_millis("2024-01-01T00:00:00Z"), Some(day));
        assert_eq!(parse_timestamp_millis("2024-01-01T00:00:00.000"), Some(day));
        assert_eq!(parse_timestamp_millis("2024-01-01 00:00:00"), Some(day));
        assert_eq!(
            parse_timestamp_millis("2024-01-01T01:00:00+01:00"),
            Some(day)
        );
        assert_eq!(parse_timestamp_millis("yesterday"), None);
        assert_eq!(parse_timestamp_millis(""), None);
    }
}
