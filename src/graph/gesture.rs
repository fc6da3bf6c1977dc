use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GestureKind {
    CanvasPan,
    CanvasPinch,
    CanvasTwoFingerTap,
    NodePan,
    NodeTap,
    NodeLongPress,
}

impl GestureKind {
    pub const ALL: [GestureKind; 6] = [
        GestureKind::CanvasPan,
        GestureKind::CanvasPinch,
        GestureKind::CanvasTwoFingerTap,
        GestureKind::NodePan,
        GestureKind::NodeTap,
        GestureKind::NodeLongPress,
    ];

    fn index(self) -> usize {
        self as usize
    }

    pub fn is_node_gesture(self) -> bool {
        matches!(
            self,
            GestureKind::NodePan | GestureKind::NodeTap | GestureKind::NodeLongPress
        )
    }
}

impl fmt::Display for GestureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GestureKind::CanvasPan => "canvas-pan",
            GestureKind::CanvasPinch => "canvas-pinch",
            GestureKind::CanvasTwoFingerTap => "canvas-two-finger-tap",
            GestureKind::NodePan => "node-pan",
            GestureKind::NodeTap => "node-tap",
            GestureKind::NodeLongPress => "node-long-press",
        };
        f.write_str(name)
    }
}

/// How gesture `a` treats gesture `b`, read as "a <relation> b".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// Both may be active together.
    Simultaneous,
    /// `a` wins: activating `a` cancels an active `b`.
    Blocks,
    /// `b` wins: `a` may not activate while `b` is active.
    BlockedBy,
    /// First come, first served.
    Exclusive,
}

impl Relation {
    pub fn inverse(self) -> Relation {
        match self {
            Relation::Blocks => Relation::BlockedBy,
            Relation::BlockedBy => Relation::Blocks,
            other => other,
        }
    }
}

const KINDS: usize = GestureKind::ALL.len();

/// One declared [`Relation`] per pair of gestures that can be live together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArbitrationTable {
    relations: [[Relation; KINDS]; KINDS],
}

impl Default for ArbitrationTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl ArbitrationTable {
    /// Everything exclusive.
    pub fn empty() -> Self {
        Self {
            relations: [[Relation::Exclusive; KINDS]; KINDS],
        }
    }

    /// Declares `a <relation> b` and the inverse for `b`.
    pub fn declare(&mut self, a: GestureKind, relation: Relation, b: GestureKind) -> &mut Self {
        self.relations[a.index()][b.index()] = relation;
        self.relations[b.index()][a.index()] = relation.inverse();
        self
    }

    pub fn relation(&self, a: GestureKind, b: GestureKind) -> Relation {
        self.relations[a.index()][b.index()]
    }

    /// Node gestures claim a touch before the canvas pan; pinch and pan run
    /// together; a second finger on the canvas ends any node gesture.
    pub fn standard() -> Self {
        use GestureKind::*;
        use Relation::*;

        let mut table = Self::empty();
        table
            .declare(CanvasPan, Simultaneous, CanvasPinch)
            .declare(CanvasPan, Simultaneous, CanvasTwoFingerTap)
            .declare(CanvasPinch, Simultaneous, CanvasTwoFingerTap)
            .declare(NodeTap, Simultaneous, NodeLongPress);

        for node_gesture in [NodePan, NodeTap, NodeLongPress] {
            table
                .declare(node_gesture, Blocks, CanvasPan)
                .declare(CanvasPinch, Blocks, node_gesture)
                .declare(CanvasTwoFingerTap, Blocks, node_gesture);
        }

        table
            .declare(NodePan, Blocks, NodeTap)
            .declare(NodePan, Blocks, NodeLongPress);
        table
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Activate { cancelled: Vec<GestureKind> },
    Reject { blocked_by: GestureKind },
}

/// Tracks the active gesture set for one canvas.
#[derive(Debug, Clone, Default)]
pub struct Arbiter {
    table: ArbitrationTable,
    active: Vec<GestureKind>,
}

impl Arbiter {
    pub fn new(table: ArbitrationTable) -> Self {
        Self {
            table,
            active: Vec::new(),
        }
    }

    pub fn table(&self) -> &ArbitrationTable {
        &self.table
    }

    /// Tries to activate `kind`. Any active gesture that blocks it (or that
    /// is exclusive with it) wins; otherwise the gestures `kind` blocks are
    /// cancelled and returned.
    pub fn request(&mut self, kind: GestureKind) -> Decision {
        if self.active.contains(&kind) {
            return Decision::Activate { cancelled: Vec::new() };
        }

        for &other in &self.active {
            match self.table.relation(kind, other) {
                Relation::BlockedBy | Relation::Exclusive => {
                    return Decision::Reject { blocked_by: other };
                }
                Relation::Blocks | Relation::Simultaneous => {}
            }
        }

        let table = &self.table;
        let (cancelled, kept): (Vec<GestureKind>, Vec<GestureKind>) = self
            .active
            .iter()
            .partition(|&&other| table.relation(kind, other) == Relation::Blocks);
        self.active = kept;
        self.active.push(kind);
        Decision::Activate { cancelled }
    }

    pub fn release(&mut self, kind: GestureKind) {
        self.active.retain(|&k| k != kind);
    }

    /// Ends every active gesture and returns what was active.
    pub fn reset(&mut self) -> Vec<GestureKind> {
        std::mem::take(&mut self.active)
    }

    pub fn is_active(&self, kind: GestureKind) -> bool {
        self.active.contains(&kind)
    }

    pub fn active(&self) -> &[GestureKind] {
        &self.active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::GestureKind::*;

    #[test]
    fn standard_table_is_consistent_both_ways() {
        let table = ArbitrationTable::standard();
        for a in GestureKind::ALL {
            for b in GestureKind::ALL {
                assert_eq!(table.relation(a, b), table.relation(b, a).inverse(), "{a} vs {b}");
            }
        }
    }

    #[test]
    fn node_gestures_block_canvas_pan() {
        let mut arbiter = Arbiter::default();
        assert!(matches!(arbiter.request(NodeTap), Decision::Activate { .. }));
        assert_eq!(arbiter.request(CanvasPan), Decision::Reject { blocked_by: NodeTap });
        assert!(!arbiter.is_active(CanvasPan));
    }

    #[test]
    fn node_pan_cancels_tap_and_long_press() {
        let mut arbiter = Arbiter::default();
        arbiter.request(NodeTap);
        arbiter.request(NodeLongPress);
        assert_eq!(
            arbiter.request(NodePan),
            Decision::Activate {
                cancelled: vec![NodeTap, NodeLongPress]
            }
        );
        assert_eq!(arbiter.active(), &[NodePan]);
    }

    #[test]
    fn pinch_and_pan_run_together() {
        let mut arbiter = Arbiter::default();
        arbiter.request(CanvasPan);
        assert_eq!(arbiter.request(CanvasPinch), Decision::Activate { cancelled: vec![] });
        assert_eq!(
            arbiter.request(CanvasTwoFingerTap),
            Decision::Activate { cancelled: vec![] }
        );
        assert_eq!(arbiter.active().len(), 3);
    }

    #[test]
    fn pinch_cancels_an_active_drag() {
        let mut arbiter = Arbiter::default();
        arbiter.request(NodePan);
        assert_eq!(
            arbiter.request(CanvasPinch),
            Decision::Activate { cancelled: vec![NodePan] }
        );
        assert_eq!(arbiter.request(NodePan), Decision::Reject { blocked_by: CanvasPinch });
    }

    #[test]
    fn empty_table_is_first_come_first_served() {
        let mut arbiter = Arbiter::new(ArbitrationTable::empty());
        arbiter.request(CanvasPan);
        assert_eq!(arbiter.request(CanvasPinch), Decision::Reject { blocked_by: CanvasPan });
        arbiter.release(CanvasPan);
        assert!(matches!(arbiter.request(CanvasPinch), Decision::Activate { .. }));
    }

    #[test]
    fn repeated_request_is_a_no_op() {
        let mut arbiter = Arbiter::default();
        arbiter.request(NodePan);
        assert_eq!(arbiter.request(NodePan), Decision::Activate { cancelled: vec![] });
        assert_eq!(arbiter.reset(), vec![NodePan]);
        assert!(arbiter.active().is_empty());
    }
}
