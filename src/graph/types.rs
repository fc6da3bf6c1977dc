use std::fmt;

use serde::de::{self, Deserializer, IgnoredAny, SeqAccess, Visitor};
use serde::{Deserialize, Serialize};

use super::geometry::{Point, Size};

/// Task status as shown on the node card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeStatus {
    Todo,
    #[serde(alias = "in_progress")]
    InProgress,
    Blocked,
    Done,
}

impl NodeStatus {
    pub fn label(&self) -> &'static str {
        match self {
            NodeStatus::Todo => "To do",
            NodeStatus::InProgress => "In progress",
            NodeStatus::Blocked => "Blocked",
            NodeStatus::Done => "Done",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeMeta {
    /// Keeps a top-level node out of the inferred reading-order chain.
    #[serde(default)]
    pub standalone_root: bool,
}

/// A task node as supplied by the external task store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status: Option<NodeStatus>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default, alias = "groupKey")]
    pub project_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub order_index: Option<f64>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub meta: Option<NodeMeta>,
    #[serde(default)]
    pub position: Option<Point>,
    /// `None` until the node view has been measured.
    #[serde(default)]
    pub size: Option<Size>,
    #[serde(default, deserialize_with = "attachment_count")]
    pub attachments: usize,
}

impl Node {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent_id = Some(parent.into());
        self
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project_id = Some(project.into());
        self
    }

    pub fn created(mut self, created_at: impl Into<String>) -> Self {
        self.created_at = Some(created_at.into());
        self
    }

    pub fn at(mut self, x: f32, y: f32) -> Self {
        self.position = Some(Point::new(x, y));
        self
    }

    pub fn sized(mut self, width: f32, height: f32) -> Self {
        self.size = Some(Size::new(width, height));
        self
    }

    pub fn standalone(mut self) -> Self {
        self.meta = Some(NodeMeta {
            standalone_root: true,
        });
        self
    }

    /// Parent reference, with empty strings treated as absent.
    pub fn parent(&self) -> Option<&str> {
        self.parent_id.as_deref().filter(|p| !p.is_empty())
    }

    pub fn is_standalone_root(&self) -> bool {
        self.meta.as_ref().is_some_and(|m| m.standalone_root)
    }
}

/// Accepts either an attachment list (only its length is kept) or a count.
fn attachment_count<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    struct CountVisitor;

    impl<'de> Visitor<'de> for CountVisitor {
        type Value = usize;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("an attachment list or a count")
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<usize, A::Error> {
            let mut count = 0;
            while seq.next_element::<IgnoredAny>()?.is_some() {
                count += 1;
            }
            Ok(count)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<usize, E> {
            usize::try_from(v).map_err(E::custom)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<usize, E> {
            usize::try_from(v).map_err(E::custom)
        }

        fn visit_unit<E: de::Error>(self) -> Result<usize, E> {
            Ok(0)
        }

        fn visit_none<E: de::Error>(self) -> Result<usize, E> {
            Ok(0)
        }

        fn visit_some<D2: Deserializer<'de>>(self, d: D2) -> Result<usize, D2::Error> {
            d.deserialize_any(CountVisitor)
        }
    }

    deserializer.deserialize_any(CountVisitor)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    /// Explicit hierarchy: the child names this parent.
    Parent,
    /// Inferred reading order between top-level nodes.
    Sequential,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Parent => "parent",
            EdgeKind::Sequential => "sequential",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub from: String,
    pub to: String,
    pub kind: EdgeKind,
}

impl Edge {
    pub fn new(from: impl Into<String>, to: impl Into<String>, kind: EdgeKind) -> Self {
        let from = from.into();
        let to = to.into();
        Self {
            id: edge_id(kind, &from, &to),
            from,
            to,
            kind,
        }
    }
}

/// Stable identifier so re-derivation of an unchanged graph is byte-identical.
/// `\` and `>` inside node ids are backslash-escaped, so the only bare `>`
/// is the one in the `->` separator.
pub fn edge_id(kind: EdgeKind, from: &str, to: &str) -> String {
    format!("{}:{}->{}", kind.as_str(), escape_endpoint(from), escape_endpoint(to))
}

fn escape_endpoint(id: &str) -> String {
    id.replace('\\', "\\\\").replace('>', "\\>")
}

/// A task list as loaded from disk: `{ "nodes": [...] }` or a bare array.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "DocumentRepr")]
pub struct TaskDocument {
    pub nodes: Vec<Node>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DocumentRepr {
    Wrapped { nodes: Vec<Node> },
    Bare(Vec<Node>),
}

impl From<DocumentRepr> for TaskDocument {
    fn from(repr: DocumentRepr) -> Self {
        match repr {
            DocumentRepr::Wrapped { nodes } | DocumentRepr::Bare(nodes) => TaskDocument { nodes },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_deserializes_from_task_store_json() {
        let json = r##"{
            "id": "n1",
            "title": "Write report",
            "status": "in-progress",
            "parentId": "root",
            "projectId": "p1",
            "createdAt": "2024-01-01T10:00:00Z",
            "orderIndex": 3,
            "color": "#FF9500",
            "meta": { "standaloneRoot": true },
            "position": { "x": 10.5, "y": 20 },
            "attachments": [{ "id": "a" }, { "id": "b", "type": "image" }]
        }"##;
        let node: Node = serde_json::from_str(json).expect("node parses");
        assert_eq!(node.status, Some(NodeStatus::InProgress));
        assert_eq!(node.parent(), Some("root"));
        assert_eq!(node.project_id.as_deref(), Some("p1"));
        assert_eq!(node.order_index, Some(3.0));
        assert!(node.is_standalone_root());
        assert_eq!(node.position, Some(Point::new(10.5, 20.0)));
        assert_eq!(node.size, None);
        assert_eq!(node.attachments, 2);
    }

    #[test]
    fn attachments_accept_plain_count_and_null() {
        let node: Node = serde_json::from_str(r#"{"id":"a","attachments":4}"#).expect("count");
        assert_eq!(node.attachments, 4);
        let node: Node = serde_json::from_str(r#"{"id":"a","attachments":null}"#).expect("null");
        assert_eq!(node.attachments, 0);
    }

    #[test]
    fn status_accepts_snake_case_alias() {
        let node: Node = serde_json::from_str(r#"{"id":"a","status":"in_progress"}"#).expect("alias");
        assert_eq!(node.status, Some(NodeStatus::InProgress));
    }

    #[test]
    fn empty_parent_is_treated_as_root() {
        let node: Node = serde_json::from_str(r#"{"id":"a","parentId":""}"#).expect("node");
        assert_eq!(node.parent(), None);
    }

    #[test]
    fn document_accepts_wrapped_and_bare_forms() {
        let wrapped: TaskDocument =
            serde_json::from_str(r#"{"nodes":[{"id":"a"},{"id":"b"}]}"#).expect("wrapped");
        let bare: TaskDocument = serde_json::from_str(r#"[{"id":"a"}]"#).expect("bare");
        assert_eq!(wrapped.nodes.len(), 2);
        assert_eq!(bare.nodes.len(), 1);
    }

    #[test]
    fn edge_ids_encode_kind_and_endpoints() {
        assert_eq!(Edge::new("A", "B", EdgeKind::Parent).id, "parent:A->B");
        assert_eq!(Edge::new("A", "B", EdgeKind::Sequential).id, "sequential:A->B");
    }

    #[test]
    fn arrows_inside_node_ids_do_not_collide() {
        let left = Edge::new("a->b", "c", EdgeKind::Parent);
        let right = Edge::new("a", "b->c", EdgeKind::Parent);
        assert_ne!(left.id, right.id);
        assert_eq!(left.id, r"parent:a-\>b->c");
        assert_eq!(right.id, r"parent:a->b-\>c");

        let slash = Edge::new(r"a\", ">b", EdgeKind::Parent);
        let plain = Edge::new("a", r"\>b", EdgeKind::Parent);
        assert_ne!(slash.id, plain.id);
    }
}
