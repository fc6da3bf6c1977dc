use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn offset(&self, dx: f32, dy: f32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    pub fn distance_squared(&self, other: &Point) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        dx * dx + dy * dy
    }

    pub fn distance(&self, other: &Point) -> f32 {
        self.distance_squared(other).sqrt()
    }

    pub fn midpoint(&self, other: &Point) -> Self {
        Self::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }

    fn finite_or_zero(self) -> Self {
        let clean = |v: f32| if v.is_finite() { v } else { 0.0 };
        Self::new(clean(self.x), clean(self.y))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn is_measured(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

/// Axis-aligned rectangle, top-left origin.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    pub fn from_parts(origin: Point, size: Size) -> Self {
        Self::new(origin.x, origin.y, size.width, size.height)
    }

    /// A rectangle with non-positive or non-finite extent has not been laid
    /// out yet and must not be routed against.
    pub fn is_measured(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && self.w.is_finite()
            && self.h.is_finite()
            && self.w > 0.0
            && self.h > 0.0
    }

    pub fn right(&self) -> f32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.h
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    pub fn contains(&self, point: Point) -> bool {
        self.is_measured()
            && point.x >= self.x
            && point.x <= self.right()
            && point.y >= self.y
            && point.y <= self.bottom()
    }

    fn sanitized(&self) -> Self {
        let coord = |v: f32| if v.is_finite() { v } else { 0.0 };
        let extent = |v: f32| if v.is_finite() && v > 0.0 { v } else { 0.0 };
        Self::new(coord(self.x), coord(self.y), extent(self.w), extent(self.h))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Top,
    Right,
    Bottom,
    Left,
}

impl Side {
    /// Fixed iteration order; anchor tie-breaks depend on it.
    pub const ALL: [Side; 4] = [Side::Top, Side::Right, Side::Bottom, Side::Left];

    pub fn is_horizontal(&self) -> bool {
        matches!(self, Side::Left | Side::Right)
    }

    pub fn is_vertical(&self) -> bool {
        !self.is_horizontal()
    }

    pub fn normal(&self) -> (f32, f32) {
        match self {
            Side::Top => (0.0, -1.0),
            Side::Right => (1.0, 0.0),
            Side::Bottom => (0.0, 1.0),
            Side::Left => (-1.0, 0.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    pub point: Point,
    pub side: Side,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnchorPair {
    pub from: Anchor,
    pub to: Anchor,
}

/// Midpoints of the four sides, in `Side::ALL` order.
pub fn anchors_for_rect(rect: &Rect) -> [Anchor; 4] {
    let r = rect.sanitized();
    let cx = r.x + r.w / 2.0;
    let cy = r.y + r.h / 2.0;
    Side::ALL.map(|side| {
        let point = match side {
            Side::Top => Point::new(cx, r.y),
            Side::Right => Point::new(r.x + r.w, cy),
            Side::Bottom => Point::new(cx, r.y + r.h),
            Side::Left => Point::new(r.x, cy),
        };
        // Huge but finite extents can still overflow when summed.
        Anchor {
            point: point.finite_or_zero(),
            side,
        }
    })
}

/// Picks the pair of side midpoints with the smallest distance between the
/// two rectangles. Ties keep the first pair in `Side::ALL × Side::ALL` order.
pub fn closest_anchor_pair(a: &Rect, b: &Rect) -> AnchorPair {
    let from_anchors = anchors_for_rect(a);
    let to_anchors = anchors_for_rect(b);

    let mut best = AnchorPair {
        from: from_anchors[0],
        to: to_anchors[0],
    };
    let mut best_dist = f32::INFINITY;

    for from in &from_anchors {
        for to in &to_anchors {
            let dist = from.point.distance_squared(&to.point);
            if dist < best_dist {
                best_dist = dist;
                best = AnchorPair {
                    from: *from,
                    to: *to,
                };
            }
        }
    }

    best
}

pub fn stand_off(anchor: &Anchor, distance: f32) -> Point {
    let (nx, ny) = anchor.side.normal();
    anchor.point.offset(nx * distance, ny * distance)
}

/// Manhattan waypoints between two stand-off points. Only the intermediate
/// corners are returned; no obstacle avoidance is attempted.
pub fn orthogonal_waypoints(out: Point, inn: Point, from_side: Side, to_side: Side) -> Vec<Point> {
    if from_side.is_horizontal() && to_side.is_horizontal() {
        let mid_x = (out.x + inn.x) / 2.0;
        vec![Point::new(mid_x, out.y), Point::new(mid_x, inn.y)]
    } else if from_side.is_vertical() && to_side.is_vertical() {
        let mid_y = (out.y + inn.y) / 2.0;
        vec![Point::new(out.x, mid_y), Point::new(inn.x, mid_y)]
    } else if from_side.is_horizontal() {
        vec![Point::new(inn.x, out.y)]
    } else {
        vec![Point::new(out.x, inn.y)]
    }
}

/// Polyline to path with each interior corner replaced by a quadratic blend.
/// The blend radius is clamped to half of the shorter adjacent segment.
pub fn to_rounded_svg_path(points: &[Point], radius: f32) -> String {
    if points.is_empty() || points.iter().any(|p| !p.is_finite()) {
        return String::new();
    }
    let radius = if radius.is_finite() { radius } else { 0.0 };

    let mut path = PathBuilder::new();
    path.move_to(points[0]);

    for window in points.windows(3) {
        let (p0, p1, p2) = (window[0], window[1], window[2]);
        let (v1x, v1y) = (p1.x - p0.x, p1.y - p0.y);
        let (v2x, v2y) = (p2.x - p1.x, p2.y - p1.y);
        let len1 = v1x.hypot(v1y);
        let len2 = v2x.hypot(v2y);

        if len1 == 0.0 || len2 == 0.0 {
            path.line_to(p1);
            continue;
        }

        let r = radius.min(len1 / 2.0).min(len2 / 2.0);
        if r <= 0.0 {
            path.line_to(p1);
            continue;
        }

        let corner_start = p1.offset(-v1x / len1 * r, -v1y / len1 * r);
        let corner_end = p1.offset(v2x / len2 * r, v2y / len2 * r);
        path.line_to(corner_start);
        path.quad_to(p1, corner_end);
    }

    if points.len() > 1 {
        path.line_to(points[points.len() - 1]);
    }

    path.finish()
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoutedPath {
    pub path: String,
    pub anchors: AnchorPair,
    /// Start of the final segment; the arrowhead points from here to `tip`.
    pub tail: Point,
    pub tip: Point,
}

/// Closest anchors, stand-off points, Manhattan corners, rounded path.
/// Returns `None` when either rectangle is unmeasured.
pub fn route_orthogonal(a: &Rect, b: &Rect, stand_off_distance: f32, radius: f32) -> Option<RoutedPath> {
    if !a.is_measured() || !b.is_measured() {
        return None;
    }

    let anchors = closest_anchor_pair(a, b);
    let out = stand_off(&anchors.from, stand_off_distance);
    let inn = stand_off(&anchors.to, stand_off_distance);

    let mut points = Vec::with_capacity(6);
    points.push(anchors.from.point);
    points.push(out);
    points.extend(orthogonal_waypoints(out, inn, anchors.from.side, anchors.to.side));
    points.push(inn);
    points.push(anchors.to.point);

    let path = to_rounded_svg_path(&points, radius);
    if path.is_empty() {
        return None;
    }

    Some(RoutedPath {
        path,
        anchors,
        tail: inn,
        tip: anchors.to.point,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct BezierPath {
    pub path: String,
    pub start: Point,
    pub control1: Point,
    pub control2: Point,
    pub end: Point,
}

/// Smooth-curve alternative to orthogonal routing. Handle length is the
/// anchor distance times `curvature`, clamped to the strength range.
pub fn bezier_path_for_rects(
    a: &Rect,
    b: &Rect,
    curvature: f32,
    min_strength: f32,
    max_strength: f32,
) -> Option<BezierPath> {
    if !a.is_measured() || !b.is_measured() {
        return None;
    }

    let finite_or_zero = |v: f32| if v.is_finite() { v } else { 0.0 };
    let (lo, hi) = {
        let lo = finite_or_zero(min_strength).max(0.0);
        let hi = finite_or_zero(max_strength).max(0.0);
        if lo <= hi { (lo, hi) } else { (hi, lo) }
    };

    let anchors = closest_anchor_pair(a, b);
    let start = anchors.from.point;
    let end = anchors.to.point;
    let strength = (start.distance(&end) * finite_or_zero(curvature)).clamp(lo, hi);

    let (n1x, n1y) = anchors.from.side.normal();
    let (n2x, n2y) = anchors.to.side.normal();
    let control1 = start.offset(n1x * strength, n1y * strength);
    let control2 = end.offset(n2x * strength, n2y * strength);

    let mut path = PathBuilder::new();
    path.move_to(start);
    path.cubic_to(control1, control2, end);

    Some(BezierPath {
        path: path.finish(),
        start,
        control1,
        control2,
        end,
    })
}

/// Filled triangle with its apex at `tip`, base set back `length` along the
/// tail→tip direction. The segment length is floored at 1 so coincident
/// points collapse to the tip instead of dividing by zero.
pub fn arrow_head_path(tail: Point, tip: Point, length: f32, width: f32) -> String {
    if !tail.is_finite() || !tip.is_finite() || !length.is_finite() || !width.is_finite() {
        return String::new();
    }

    let dx = tip.x - tail.x;
    let dy = tip.y - tail.y;
    let len = dx.hypot(dy).max(1.0);
    let (ux, uy) = (dx / len, dy / len);
    let (px, py) = (-uy, ux);
    let half = width / 2.0;

    let base = tip.offset(-ux * length, -uy * length);
    let left = base.offset(px * half, py * half);
    let right = base.offset(-px * half, -py * half);

    let mut path = PathBuilder::new();
    path.move_to(tip);
    path.line_to(left);
    path.line_to(right);
    path.close();
    path.finish()
}

#[derive(Debug, Default)]
pub struct PathBuilder {
    d: String,
}

impl PathBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn command(&mut self, cmd: char, points: &[Point]) {
        if !self.d.is_empty() {
            self.d.push(' ');
        }
        self.d.push(cmd);
        for p in points {
            let _ = write!(self.d, " {} {}", fmt_coord(p.x), fmt_coord(p.y));
        }
    }

    pub fn move_to(&mut self, p: Point) {
        self.command('M', &[p]);
    }

    pub fn line_to(&mut self, p: Point) {
        self.command('L', &[p]);
    }

    pub fn quad_to(&mut self, control: Point, end: Point) {
        self.command('Q', &[control, end]);
    }

    pub fn cubic_to(&mut self, c1: Point, c2: Point, end: Point) {
        self.command('C', &[c1, c2, end]);
    }

    pub fn close(&mut self) {
        self.command('Z', &[]);
    }

    pub fn finish(self) -> String {
        self.d
    }
}

fn fmt_coord(v: f32) -> String {
    // Adding zero folds -0.0 into 0.0.
    format!("{:.2}", v + 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn path_is_finite(path: &str) -> bool {
        !path.contains("NaN") && !path.contains("inf")
    }

    #[test]
    fn zero_rect_anchors_collapse_to_origin() {
        let anchors = anchors_for_rect(&Rect::new(0.0, 0.0, 0.0, 0.0));
        for anchor in anchors {
            assert_eq!(anchor.point, Point::ZERO);
        }
        let sides: Vec<Side> = anchors.iter().map(|a| a.side).collect();
        assert_eq!(sides, Side::ALL.to_vec());
    }

    #[test]
    fn non_finite_rect_anchors_stay_finite() {
        let anchors = anchors_for_rect(&Rect::new(f32::NAN, 10.0, f32::INFINITY, -5.0));
        for anchor in anchors {
            assert!(anchor.point.is_finite());
        }
        assert_eq!(anchors[0].point, Point::new(0.0, 10.0));
    }

    #[test]
    fn anchors_are_side_midpoints() {
        let anchors = anchors_for_rect(&Rect::new(10.0, 20.0, 100.0, 40.0));
        assert_eq!(anchors[0].point, Point::new(60.0, 20.0));
        assert_eq!(anchors[1].point, Point::new(110.0, 40.0));
        assert_eq!(anchors[2].point, Point::new(60.0, 60.0));
        assert_eq!(anchors[3].point, Point::new(10.0, 40.0));
    }

    #[test]
    fn closest_pair_for_stacked_rects_is_bottom_to_top() {
        let parent = Rect::new(0.0, 0.0, 200.0, 100.0);
        let child = Rect::new(0.0, 300.0, 200.0, 100.0);
        let pair = closest_anchor_pair(&parent, &child);
        assert_eq!(pair.from.side, Side::Bottom);
        assert_eq!(pair.to.side, Side::Top);
    }

    #[test]
    fn closest_pair_for_side_by_side_rects_is_right_to_left() {
        let a = Rect::new(0.0, 0.0, 100.0, 50.0);
        let b = Rect::new(300.0, 10.0, 100.0, 50.0);
        let pair = closest_anchor_pair(&a, &b);
        assert_eq!(pair.from.side, Side::Right);
        assert_eq!(pair.to.side, Side::Left);
    }

    #[test]
    fn closest_pair_is_deterministic() {
        let a = Rect::new(12.5, 40.0, 180.0, 90.0);
        let b = Rect::new(260.0, 310.0, 220.0, 130.0);
        assert_eq!(closest_anchor_pair(&a, &b), closest_anchor_pair(&a, &b));
    }

    #[test]
    fn closest_pair_tie_breaks_on_first_pair() {
        // Identical rects: top/top has distance zero and is visited first.
        let r = Rect::new(0.0, 0.0, 10.0, 10.0);
        let pair = closest_anchor_pair(&r, &r);
        assert_eq!(pair.from.side, Side::Top);
        assert_eq!(pair.to.side, Side::Top);
    }

    #[test]
    fn horizontal_sides_route_through_mid_column() {
        let pts = orthogonal_waypoints(
            Point::new(0.0, 0.0),
            Point::new(100.0, 50.0),
            Side::Right,
            Side::Left,
        );
        assert_eq!(pts, vec![Point::new(50.0, 0.0), Point::new(50.0, 50.0)]);
    }

    #[test]
    fn vertical_sides_route_through_mid_row() {
        let pts = orthogonal_waypoints(
            Point::new(0.0, 0.0),
            Point::new(100.0, 80.0),
            Side::Bottom,
            Side::Top,
        );
        assert_eq!(pts, vec![Point::new(0.0, 40.0), Point::new(100.0, 40.0)]);
    }

    #[test]
    fn mixed_sides_route_through_single_corner() {
        let out = Point::new(0.0, 0.0);
        let inn = Point::new(100.0, 80.0);
        assert_eq!(
            orthogonal_waypoints(out, inn, Side::Right, Side::Top),
            vec![Point::new(100.0, 0.0)]
        );
        assert_eq!(
            orthogonal_waypoints(out, inn, Side::Bottom, Side::Left),
            vec![Point::new(0.0, 80.0)]
        );
    }

    #[test]
    fn empty_points_give_empty_path() {
        assert_eq!(to_rounded_svg_path(&[], 12.0), "");
    }

    #[test]
    fn single_point_is_a_bare_move() {
        assert_eq!(to_rounded_svg_path(&[Point::new(1.0, 2.0)], 12.0), "M 1.00 2.00");
    }

    #[test]
    fn straight_segment_is_move_then_line() {
        let path = to_rounded_svg_path(&[Point::new(0.0, 0.0), Point::new(10.0, 0.0)], 12.0);
        assert_eq!(path, "M 0.00 0.00 L 10.00 0.00");
    }

    #[test]
    fn corner_radius_is_clamped_to_half_the_short_segment() {
        let pts = [
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 100.0),
        ];
        let path = to_rounded_svg_path(&pts, 12.0);
        assert_eq!(
            path,
            "M 0.00 0.00 L 5.00 0.00 Q 10.00 0.00 10.00 5.00 L 10.00 100.00"
        );
    }

    #[test]
    fn zero_length_segment_falls_back_to_line() {
        let pts = [
            Point::new(0.0, 0.0),
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
        ];
        let path = to_rounded_svg_path(&pts, 12.0);
        assert_eq!(path, "M 0.00 0.00 L 0.00 0.00 L 10.00 0.00");
    }

    #[test]
    fn zero_radius_keeps_sharp_corners() {
        let pts = [
            Point::new(0.0, 0.0),
            Point::new(50.0, 0.0),
            Point::new(50.0, 50.0),
        ];
        let path = to_rounded_svg_path(&pts, 0.0);
        assert_eq!(path, "M 0.00 0.00 L 50.00 0.00 L 50.00 50.00");
    }

    #[test]
    fn non_finite_points_give_empty_path() {
        let pts = [Point::new(0.0, 0.0), Point::new(f32::NAN, 1.0)];
        assert_eq!(to_rounded_svg_path(&pts, 12.0), "");
    }

    #[test]
    fn route_against_unmeasured_rect_is_none() {
        let measured = Rect::new(0.0, 0.0, 200.0, 120.0);
        let unmeasured = Rect::new(300.0, 0.0, 0.0, 120.0);
        assert!(route_orthogonal(&measured, &unmeasured, 16.0, 12.0).is_none());
        assert!(route_orthogonal(&unmeasured, &measured, 16.0, 12.0).is_none());
    }

    #[test]
    fn route_between_stacked_rects_starts_and_ends_at_anchors() {
        let a = Rect::new(0.0, 0.0, 200.0, 100.0);
        let b = Rect::new(0.0, 300.0, 200.0, 100.0);
        let routed = route_orthogonal(&a, &b, 16.0, 12.0).expect("measured rects route");
        assert!(routed.path.starts_with("M 100.00 100.00"));
        assert!(routed.path.ends_with("L 100.00 300.00"));
        assert_eq!(routed.tail, Point::new(100.0, 284.0));
        assert_eq!(routed.tip, Point::new(100.0, 300.0));
    }

    #[test]
    fn bezier_strength_is_clamped() {
        let a = Rect::new(0.0, 0.0, 100.0, 100.0);
        let b = Rect::new(0.0, 1000.0, 100.0, 100.0);
        let curve = bezier_path_for_rects(&a, &b, 0.5, 24.0, 160.0).expect("curve");
        // Anchor distance is 900, so 0.5 * 900 clamps to 160.
        assert_eq!(curve.start, Point::new(50.0, 100.0));
        assert_eq!(curve.control1, Point::new(50.0, 260.0));
        assert_eq!(curve.control2, Point::new(50.0, 840.0));
        assert!(curve.path.starts_with("M 50.00 100.00 C"));

        let near = Rect::new(0.0, 110.0, 100.0, 100.0);
        let short = bezier_path_for_rects(&a, &near, 0.5, 24.0, 160.0).expect("curve");
        assert_eq!(short.control1, Point::new(50.0, 124.0));
    }

    #[test]
    fn bezier_swaps_inverted_strength_range() {
        let a = Rect::new(0.0, 0.0, 100.0, 100.0);
        let b = Rect::new(0.0, 1000.0, 100.0, 100.0);
        let normal = bezier_path_for_rects(&a, &b, 0.5, 24.0, 160.0);
        let inverted = bezier_path_for_rects(&a, &b, 0.5, 160.0, 24.0);
        assert_eq!(normal, inverted);
    }

    #[test]
    fn bezier_against_unmeasured_rect_is_none() {
        let a = Rect::new(0.0, 0.0, 100.0, 100.0);
        assert!(bezier_path_for_rects(&a, &Rect::default(), 0.5, 24.0, 160.0).is_none());
    }

    #[test]
    fn arrow_head_points_along_segment() {
        let path = arrow_head_path(Point::new(0.0, 0.0), Point::new(0.0, 100.0), 12.0, 10.0);
        assert_eq!(path, "M 0.00 100.00 L -5.00 88.00 L 5.00 88.00 Z");
    }

    #[test]
    fn arrow_head_with_coincident_points_is_finite() {
        let path = arrow_head_path(Point::new(5.0, 5.0), Point::new(5.0, 5.0), 16.0, 10.0);
        assert!(!path.is_empty());
        assert!(path_is_finite(&path));
        assert_eq!(path, "M 5.00 5.00 L 5.00 5.00 L 5.00 5.00 Z");
    }

    proptest! {
        #[test]
        fn anchors_are_always_finite(
            x in proptest::num::f32::ANY,
            y in proptest::num::f32::ANY,
            w in proptest::num::f32::ANY,
            h in proptest::num::f32::ANY,
        ) {
            for anchor in anchors_for_rect(&Rect::new(x, y, w, h)) {
                prop_assert!(anchor.point.is_finite());
            }
        }

        #[test]
        fn arrow_heads_never_leak_nan(
            tx in -1.0e4f32..1.0e4,
            ty in -1.0e4f32..1.0e4,
            px in -1.0e4f32..1.0e4,
            py in -1.0e4f32..1.0e4,
            length in 0.0f32..64.0,
            width in 0.0f32..64.0,
        ) {
            let path = arrow_head_path(Point::new(tx, ty), Point::new(px, py), length, width);
            prop_assert!(path_is_finite(&path));
            prop_assert!(path.ends_with('Z'));
        }

        #[test]
        fn routed_paths_never_leak_nan(
            ax in -5.0e3f32..5.0e3,
            ay in -5.0e3f32..5.0e3,
            aw in -10.0f32..400.0,
            ah in -10.0f32..400.0,
            bx in -5.0e3f32..5.0e3,
            by in -5.0e3f32..5.0e3,
            bw in -10.0f32..400.0,
            bh in -10.0f32..400.0,
        ) {
            let a = Rect::new(ax, ay, aw, ah);
            let b = Rect::new(bx, by, bw, bh);
            match route_orthogonal(&a, &b, 16.0, 12.0) {
                Some(routed) => {
                    prop_assert!(a.is_measured() && b.is_measured());
                    prop_assert!(path_is_finite(&routed.path));
                }
                None => prop_assert!(!a.is_measured() || !b.is_measured()),
            }
        }
    }
}
