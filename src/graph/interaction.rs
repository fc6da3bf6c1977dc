use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::{CanvasConfig, GestureConfig, ViewportConfig};

use super::geometry::Point;
use super::gesture::{Arbiter, ArbitrationTable, Decision, GestureKind};
use super::registry::{NodeEntry, NodeRegistry};

/// Pan/zoom transform: `screen = canvas * scale + offset`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub offset: Point,
    pub scale: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            offset: Point::ZERO,
            scale: 1.0,
        }
    }
}

impl Viewport {
    pub fn new(offset: Point, scale: f32) -> Self {
        Self { offset, scale }
    }

    pub fn to_canvas(&self, screen: Point) -> Point {
        let scale = if self.scale.abs() > f32::EPSILON { self.scale } else { 1.0 };
        Point::new(
            (screen.x - self.offset.x) / scale,
            (screen.y - self.offset.y) / scale,
        )
    }

    pub fn to_screen(&self, canvas: Point) -> Point {
        Point::new(
            canvas.x * self.scale + self.offset.x,
            canvas.y * self.scale + self.offset.y,
        )
    }

    /// Same viewport at `scale`, with the canvas point under `focal` kept
    /// under `focal`.
    pub fn zoom_about(&self, focal: Point, scale: f32) -> Viewport {
        let anchor = self.to_canvas(focal);
        Viewport::new(
            Point::new(focal.x - anchor.x * scale, focal.y - anchor.y * scale),
            scale,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerPhase {
    Down,
    Move,
    Up,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerEvent {
    pub pointer: u64,
    pub phase: PointerPhase,
    pub position: Point,
    pub time_ms: u64,
}

impl PointerEvent {
    pub fn down(pointer: u64, x: f32, y: f32, time_ms: u64) -> Self {
        Self::new(pointer, PointerPhase::Down, x, y, time_ms)
    }

    pub fn moved(pointer: u64, x: f32, y: f32, time_ms: u64) -> Self {
        Self::new(pointer, PointerPhase::Move, x, y, time_ms)
    }

    pub fn up(pointer: u64, x: f32, y: f32, time_ms: u64) -> Self {
        Self::new(pointer, PointerPhase::Up, x, y, time_ms)
    }

    fn new(pointer: u64, phase: PointerPhase, x: f32, y: f32, time_ms: u64) -> Self {
        Self {
            pointer,
            phase,
            position: Point::new(x, y),
            time_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PressSource {
    TwoFingerTap,
    DoubleClick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PressOptions {
    pub modifier_held: bool,
    pub source: PressSource,
}

/// Callbacks out of the canvas. Positions are canvas-space.
pub trait CanvasDelegate {
    /// Once per completed drag, with the final position.
    fn on_node_move_committed(&mut self, _id: &str, _x: f32, _y: f32) {}

    /// Create-node request on empty canvas.
    fn on_canvas_pressed(&mut self, _position: Point, _options: PressOptions) {}

    fn on_node_press(&mut self, _id: &str) {}

    fn on_node_long_press(&mut self, _id: &str) {}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CanvasEvent {
    NodeMoveCommitted {
        id: String,
        x: f32,
        y: f32,
    },
    CanvasPressed {
        position: Point,
        modifier_held: bool,
        source: PressSource,
    },
    NodePress {
        id: String,
    },
    NodeLongPress {
        id: String,
    },
}

impl CanvasDelegate for Vec<CanvasEvent> {
    fn on_node_move_committed(&mut self, id: &str, x: f32, y: f32) {
        self.push(CanvasEvent::NodeMoveCommitted {
            id: id.to_string(),
            x,
            y,
        });
    }

    fn on_canvas_pressed(&mut self, position: Point, options: PressOptions) {
        self.push(CanvasEvent::CanvasPressed {
            position,
            modifier_held: options.modifier_held,
            source: options.source,
        });
    }

    fn on_node_press(&mut self, id: &str) {
        self.push(CanvasEvent::NodePress { id: id.to_string() });
    }

    fn on_node_long_press(&mut self, id: &str) {
        self.push(CanvasEvent::NodeLongPress { id: id.to_string() });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GesturePhase {
    Idle,
    CanvasPress,
    Panning,
    Pinching,
    NodePress,
    Dragging,
    /// A gesture ended while pointers are still down; waiting for release.
    Settling,
}

#[derive(Debug, Clone, Copy)]
struct CanvasPress {
    pointer: u64,
    start: Point,
    start_offset: Point,
    started_ms: u64,
}

#[derive(Debug, Clone)]
struct NodePress {
    pointer: u64,
    id: String,
    entry: NodeEntry,
    start: Point,
    started_ms: u64,
    long_press_armed: bool,
    long_press_fired: bool,
}

#[derive(Debug, Clone)]
struct Drag {
    pointer: u64,
    id: String,
    entry: NodeEntry,
    /// Canvas offset from the node origin to the grab point.
    grab: Point,
    start_position: Point,
}

#[derive(Debug, Clone, Copy)]
struct Pinch {
    pointers: [u64; 2],
    starts: [Point; 2],
    start_distance: f32,
    start_mid: Point,
    start_viewport: Viewport,
    started_ms: u64,
    tap_candidate: bool,
    lifted: bool,
}

#[derive(Debug, Clone)]
enum State {
    Idle,
    CanvasPress(CanvasPress),
    Panning(CanvasPress),
    Pinching(Pinch),
    NodePress(NodePress),
    Dragging(Drag),
    Settling,
}

/// Time comes in with every event (and `tick`), never from a clock.
pub struct CanvasController<D: CanvasDelegate> {
    registry: NodeRegistry,
    delegate: D,
    viewport: Viewport,
    limits: ViewportConfig,
    gestures: GestureConfig,
    arbiter: Arbiter,
    pointers: Vec<(u64, Point)>,
    state: State,
}

impl<D: CanvasDelegate> CanvasController<D> {
    pub fn new(registry: NodeRegistry, config: &CanvasConfig, delegate: D) -> Self {
        Self::with_table(registry, config, ArbitrationTable::standard(), delegate)
    }

    pub fn with_table(registry: NodeRegistry, config: &CanvasConfig, table: ArbitrationTable, delegate: D) -> Self {
        Self {
            registry,
            delegate,
            viewport: Viewport::default(),
            limits: config.viewport.clone(),
            gestures: config.gestures.clone(),
            arbiter: Arbiter::new(table),
            pointers: Vec::new(),
            state: State::Idle,
        }
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        if !viewport.offset.is_finite() {
            log::warn!("ignoring non-finite viewport offset");
            return;
        }
        self.viewport = Viewport::new(viewport.offset, self.clamp_scale(viewport.scale));
    }

    pub fn reset_view(&mut self) {
        self.viewport = Viewport::default();
    }

    pub fn zoom_in(&mut self, focal: Point) {
        self.zoom_by(self.limits.zoom_step, focal);
    }

    pub fn zoom_out(&mut self, focal: Point) {
        self.zoom_by(1.0 / self.limits.zoom_step, focal);
    }

    fn zoom_by(&mut self, factor: f32, focal: Point) {
        if !focal.is_finite() {
            return;
        }
        let scale = self.clamp_scale(self.viewport.scale * factor);
        self.viewport = self.viewport.zoom_about(focal, scale);
    }

    pub fn phase(&self) -> GesturePhase {
        match self.state {
            State::Idle => GesturePhase::Idle,
            State::CanvasPress(_) => GesturePhase::CanvasPress,
            State::Panning(_) => GesturePhase::Panning,
            State::Pinching(_) => GesturePhase::Pinching,
            State::NodePress(_) => GesturePhase::NodePress,
            State::Dragging(_) => GesturePhase::Dragging,
            State::Settling => GesturePhase::Settling,
        }
    }

    pub fn dragging_node(&self) -> Option<&str> {
        match &self.state {
            State::Dragging(drag) => Some(&drag.id),
            _ => None,
        }
    }

    pub fn active_gestures(&self) -> &[GestureKind] {
        self.arbiter.active()
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    pub fn delegate(&self) -> &D {
        &self.delegate
    }

    pub fn delegate_mut(&mut self) -> &mut D {
        &mut self.delegate
    }

    pub fn into_delegate(self) -> D {
        self.delegate
    }

    pub fn handle_pointer(&mut self, event: PointerEvent) {
        if !event.position.is_finite() {
            log::warn!("dropping pointer event with non-finite position");
            return;
        }
        self.tick(event.time_ms);
        match event.phase {
            PointerPhase::Down => self.pointer_down(&event),
            PointerPhase::Move => self.pointer_move(&event),
            PointerPhase::Up => self.pointer_up(&event),
            PointerPhase::Cancel => self.cancel(),
        }
    }

    /// Advances timers. Fires the long press once the press has been held
    /// long enough without moving past the tolerance.
    pub fn tick(&mut self, now_ms: u64) {
        let State::NodePress(press) = &mut self.state else {
            return;
        };
        if press.long_press_fired || !press.long_press_armed || !press.entry.handlers.long_press {
            return;
        }
        if now_ms.saturating_sub(press.started_ms) < self.gestures.long_press_ms {
            return;
        }
        if !self.arbiter.is_active(GestureKind::NodeLongPress) {
            return;
        }

        press.long_press_fired = true;
        let id = press.id.clone();
        self.arbiter.release(GestureKind::NodeTap);
        log::debug!("long press on node {id}");
        self.delegate.on_node_long_press(&id);
    }

    pub fn wheel(&mut self, position: Point, delta_y: f32) {
        if !position.is_finite() || !delta_y.is_finite() {
            return;
        }
        if matches!(self.state, State::Dragging(_)) {
            return;
        }
        let factor = (-delta_y * self.limits.wheel_sensitivity).exp();
        let scale = self.clamp_scale(self.viewport.scale * factor);
        self.viewport = self.viewport.zoom_about(position, scale);
        log::trace!("wheel zoom to {:.3}", self.viewport.scale);
    }

    /// Desktop counterpart of the two-finger tap. Ignored over a node.
    pub fn double_click(&mut self, position: Point, modifier_held: bool) {
        if !position.is_finite() {
            return;
        }
        let canvas = self.viewport.to_canvas(position);
        if let Some((id, _)) = self.hit_test(canvas) {
            log::debug!("double click on node {id} ignored");
            return;
        }
        self.delegate.on_canvas_pressed(
            canvas,
            PressOptions {
                modifier_held,
                source: PressSource::DoubleClick,
            },
        );
    }

    /// System cancellation: a drag in progress snaps back to where it
    /// started and nothing is committed.
    pub fn cancel(&mut self) {
        if let State::Dragging(drag) = std::mem::replace(&mut self.state, State::Idle) {
            self.abort_drag(&drag);
        }
        let cancelled = self.arbiter.reset();
        if !cancelled.is_empty() {
            log::debug!("gestures cancelled: {cancelled:?}");
        }
        self.pointers.clear();
    }

    fn pointer_down(&mut self, event: &PointerEvent) {
        if self.pointer_position(event.pointer).is_some() {
            log::warn!("pointer {} went down twice", event.pointer);
            return;
        }
        self.pointers.push((event.pointer, event.position));

        let state = std::mem::replace(&mut self.state, State::Idle);
        self.state = match state {
            State::Idle => self.press(event),
            State::CanvasPress(press) => self.second_pointer(State::CanvasPress(press), press.pointer, event, press.started_ms, true),
            State::Panning(press) => self.second_pointer(State::Panning(press), press.pointer, event, press.started_ms, false),
            State::NodePress(press) => {
                let (pointer, started, candidate) = (press.pointer, press.started_ms, !press.long_press_fired);
                self.second_pointer(State::NodePress(press), pointer, event, started, candidate)
            }
            State::Dragging(drag) => {
                let pointer = drag.pointer;
                self.second_pointer(State::Dragging(drag), pointer, event, 0, false)
            }
            State::Pinching(mut pinch) => {
                pinch.tap_candidate = false;
                State::Pinching(pinch)
            }
            State::Settling => State::Settling,
        };
    }

    fn press(&mut self, event: &PointerEvent) -> State {
        let canvas = self.viewport.to_canvas(event.position);
        if let Some((id, entry)) = self.hit_test(canvas) {
            let handlers = entry.handlers;
            let mut claimed = false;
            if handlers.tap {
                claimed |= self.claim(GestureKind::NodeTap);
            }
            if handlers.long_press {
                claimed |= self.claim(GestureKind::NodeLongPress);
            }
            if claimed || handlers.pan {
                log::debug!("press on node {id}");
                return State::NodePress(NodePress {
                    pointer: event.pointer,
                    id,
                    entry,
                    start: event.position,
                    started_ms: event.time_ms,
                    long_press_armed: true,
                    long_press_fired: false,
                });
            }
        }

        State::CanvasPress(CanvasPress {
            pointer: event.pointer,
            start: event.position,
            start_offset: self.viewport.offset,
            started_ms: event.time_ms,
        })
    }

    /// A second pointer asks for a pinch. If the table lets it through, any
    /// node gesture it cancels is unwound first.
    fn second_pointer(&mut self, current: State, first: u64, event: &PointerEvent, started_ms: u64, tap_candidate: bool) -> State {
        match self.arbiter.request(GestureKind::CanvasPinch) {
            Decision::Reject { blocked_by } => {
                log::debug!("pinch blocked by {blocked_by}");
                current
            }
            Decision::Activate { cancelled } => {
                if let State::Dragging(drag) = &current {
                    self.abort_drag(drag);
                }
                if cancelled.iter().any(|k| k.is_node_gesture()) {
                    log::debug!("second pointer cancelled {cancelled:?}");
                }
                self.claim(GestureKind::CanvasTwoFingerTap);
                self.claim(GestureKind::CanvasPan);

                let a = self.pointer_position(first).unwrap_or(event.position);
                let b = event.position;
                State::Pinching(Pinch {
                    pointers: [first, event.pointer],
                    starts: [a, b],
                    start_distance: a.distance(&b),
                    start_mid: a.midpoint(&b),
                    start_viewport: self.viewport,
                    started_ms,
                    tap_candidate,
                    lifted: false,
                })
            }
        }
    }

    fn pointer_move(&mut self, event: &PointerEvent) {
        if !self.update_pointer(event.pointer, event.position) {
            return;
        }

        let state = std::mem::replace(&mut self.state, State::Idle);
        self.state = match state {
            State::CanvasPress(press) if press.pointer == event.pointer => {
                if press.start.distance(&event.position) > self.gestures.touch_slop
                    && self.claim(GestureKind::CanvasPan)
                {
                    log::debug!("canvas pan started");
                    self.pan_to(&press, event.position);
                    State::Panning(press)
                } else {
                    State::CanvasPress(press)
                }
            }
            State::Panning(press) if press.pointer == event.pointer => {
                self.pan_to(&press, event.position);
                State::Panning(press)
            }
            State::NodePress(press) if press.pointer == event.pointer => self.node_press_moved(press, event),
            State::Dragging(drag) if drag.pointer == event.pointer => self.drag_moved(drag, event),
            State::Pinching(pinch) => self.pinch_moved(pinch, event),
            other => other,
        };
    }

    fn node_press_moved(&mut self, mut press: NodePress, event: &PointerEvent) -> State {
        let moved = press.start.distance(&event.position);
        if moved > self.gestures.long_press_tolerance {
            press.long_press_armed = false;
        }

        let handlers = press.entry.handlers;
        if handlers.pan {
            if moved > self.gestures.touch_slop && self.claim(GestureKind::NodePan) {
                return self.begin_drag(press, event);
            }
            return State::NodePress(press);
        }

        // No drag handler: once the press is clearly not a tap or long
        // press, the canvas takes over.
        let threshold = if handlers.long_press {
            self.gestures.long_press_tolerance.max(self.gestures.touch_slop)
        } else {
            self.gestures.touch_slop
        };
        if moved > threshold {
            self.arbiter.reset();
            if self.claim(GestureKind::CanvasPan) {
                let canvas_press = CanvasPress {
                    pointer: press.pointer,
                    start: press.start,
                    start_offset: self.viewport.offset,
                    started_ms: press.started_ms,
                };
                self.pan_to(&canvas_press, event.position);
                return State::Panning(canvas_press);
            }
        }
        State::NodePress(press)
    }

    fn begin_drag(&mut self, press: NodePress, event: &PointerEvent) -> State {
        let origin = press.entry.position.point();
        let grab_at = self.viewport.to_canvas(press.start);
        press.entry.scale.set(self.gestures.drag_lift_scale);
        log::debug!("drag started on node {} at ({:.1}, {:.1})", press.id, origin.x, origin.y);

        let drag = Drag {
            pointer: press.pointer,
            id: press.id,
            entry: press.entry,
            grab: Point::new(grab_at.x - origin.x, grab_at.y - origin.y),
            start_position: origin,
        };
        self.drag_moved(drag, event)
    }

    fn drag_moved(&mut self, drag: Drag, event: &PointerEvent) -> State {
        if !self.is_mounted(&drag) {
            log::debug!("node {} unmounted mid-drag; gesture dropped", drag.id);
            drag.entry.scale.set(1.0);
            self.arbiter.reset();
            return State::Settling;
        }
        let canvas = self.viewport.to_canvas(event.position);
        drag.entry
            .position
            .set(canvas.x - drag.grab.x, canvas.y - drag.grab.y);
        log::trace!("drag {} -> ({:.1}, {:.1})", drag.id, canvas.x, canvas.y);
        State::Dragging(drag)
    }

    fn pinch_moved(&mut self, mut pinch: Pinch, event: &PointerEvent) -> State {
        let Some(slot) = pinch.pointers.iter().position(|&p| p == event.pointer) else {
            return State::Pinching(pinch);
        };
        if pinch.starts[slot].distance(&event.position) > self.gestures.two_finger_tap_distance {
            pinch.tap_candidate = false;
        }
        if pinch.lifted {
            return State::Pinching(pinch);
        }

        let (Some(a), Some(b)) = (
            self.pointer_position(pinch.pointers[0]),
            self.pointer_position(pinch.pointers[1]),
        ) else {
            return State::Pinching(pinch);
        };

        let ratio = if pinch.start_distance > 1.0 {
            a.distance(&b) / pinch.start_distance
        } else {
            1.0
        };
        let scale = self.clamp_scale(pinch.start_viewport.scale * ratio);
        let anchor = pinch.start_viewport.to_canvas(pinch.start_mid);
        let mid = a.midpoint(&b);
        self.viewport = Viewport::new(
            Point::new(mid.x - anchor.x * scale, mid.y - anchor.y * scale),
            scale,
        );
        State::Pinching(pinch)
    }

    fn pointer_up(&mut self, event: &PointerEvent) {
        if !self.update_pointer(event.pointer, event.position) {
            return;
        }
        self.pointers.retain(|(p, _)| *p != event.pointer);

        let state = std::mem::replace(&mut self.state, State::Idle);
        self.state = match state {
            State::CanvasPress(press) | State::Panning(press) if press.pointer == event.pointer => {
                self.arbiter.reset();
                State::Idle
            }
            State::NodePress(press) if press.pointer == event.pointer => {
                let held = event.time_ms.saturating_sub(press.started_ms);
                if press.entry.handlers.tap
                    && !press.long_press_fired
                    && held < self.gestures.long_press_ms
                    && self.arbiter.is_active(GestureKind::NodeTap)
                {
                    log::debug!("tap on node {}", press.id);
                    self.delegate.on_node_press(&press.id);
                }
                self.arbiter.reset();
                State::Idle
            }
            State::Dragging(drag) if drag.pointer == event.pointer => {
                self.finish_drag(&drag);
                self.arbiter.reset();
                State::Idle
            }
            State::Pinching(pinch) => self.pinch_released(pinch, event),
            other => other,
        };

        if self.pointers.is_empty() {
            if matches!(self.state, State::Settling) {
                self.state = State::Idle;
                self.arbiter.reset();
            }
        } else if matches!(self.state, State::Idle) {
            self.state = State::Settling;
        }
    }

    fn pinch_released(&mut self, mut pinch: Pinch, event: &PointerEvent) -> State {
        if !pinch.pointers.contains(&event.pointer) {
            return State::Pinching(pinch);
        }
        if !pinch.lifted {
            pinch.lifted = true;
            return State::Pinching(pinch);
        }

        let held = event.time_ms.saturating_sub(pinch.started_ms);
        if pinch.tap_candidate && held <= self.gestures.two_finger_tap_ms {
            let position = pinch.start_viewport.to_canvas(pinch.start_mid);
            log::debug!("two-finger tap at ({:.1}, {:.1})", position.x, position.y);
            self.delegate.on_canvas_pressed(
                position,
                PressOptions {
                    modifier_held: false,
                    source: PressSource::TwoFingerTap,
                },
            );
        }
        self.arbiter.reset();
        State::Idle
    }

    fn finish_drag(&mut self, drag: &Drag) {
        drag.entry.scale.set(1.0);
        if !self.is_mounted(drag) {
            log::debug!("node {} unmounted before release; nothing committed", drag.id);
            return;
        }
        let end = drag.entry.position.point();
        log::debug!("drag on node {} committed at ({:.1}, {:.1})", drag.id, end.x, end.y);
        self.delegate.on_node_move_committed(&drag.id, end.x, end.y);
    }

    fn abort_drag(&self, drag: &Drag) {
        drag.entry.position.set_point(drag.start_position);
        drag.entry.scale.set(1.0);
        log::debug!("drag on node {} cancelled; restored", drag.id);
    }

    fn pan_to(&mut self, press: &CanvasPress, position: Point) {
        self.viewport.offset = Point::new(
            press.start_offset.x + position.x - press.start.x,
            press.start_offset.y + position.y - press.start.y,
        );
    }

    fn claim(&mut self, kind: GestureKind) -> bool {
        match self.arbiter.request(kind) {
            Decision::Activate { .. } => true,
            Decision::Reject { blocked_by } => {
                log::trace!("{kind} blocked by {blocked_by}");
                false
            }
        }
    }

    fn hit_test(&self, canvas: Point) -> Option<(String, NodeEntry)> {
        self.registry
            .get_all()
            .into_iter()
            .rev()
            .find(|(_, entry)| entry.rect().contains(canvas))
    }

    fn is_mounted(&self, drag: &Drag) -> bool {
        self.registry
            .get(&drag.id)
            .is_some_and(|entry| Arc::ptr_eq(&entry.position, &drag.entry.position))
    }

    fn pointer_position(&self, pointer: u64) -> Option<Point> {
        self.pointers
            .iter()
            .find(|(p, _)| *p == pointer)
            .map(|(_, pos)| *pos)
    }

    fn update_pointer(&mut self, pointer: u64, position: Point) -> bool {
        match self.pointers.iter_mut().find(|(p, _)| *p == pointer) {
            Some(slot) => {
                slot.1 = position;
                true
            }
            None => false,
        }
    }

    fn clamp_scale(&self, scale: f32) -> f32 {
        if !scale.is_finite() {
            return self.viewport.scale;
        }
        scale.max(self.limits.min_zoom).min(self.limits.max_zoom)
    }
}
