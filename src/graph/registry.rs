use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use super::geometry::{Point, Rect, Size};

/// Two `f32`s packed in one atomic word: a reader never sees half an update.
#[derive(Default)]
pub struct LiveVec2 {
    bits: AtomicU64,
}

impl LiveVec2 {
    pub fn new(a: f32, b: f32) -> Self {
        Self {
            bits: AtomicU64::new(pack(a, b)),
        }
    }

    pub fn get(&self) -> (f32, f32) {
        unpack(self.bits.load(Ordering::Acquire))
    }

    pub fn set(&self, a: f32, b: f32) {
        self.bits.store(pack(a, b), Ordering::Release);
    }

    pub fn point(&self) -> Point {
        let (x, y) = self.get();
        Point::new(x, y)
    }

    pub fn set_point(&self, p: Point) {
        self.set(p.x, p.y);
    }

    pub fn size(&self) -> Size {
        let (w, h) = self.get();
        Size::new(w, h)
    }

    pub fn set_size(&self, s: Size) {
        self.set(s.width, s.height);
    }
}

impl fmt::Debug for LiveVec2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (a, b) = self.get();
        write!(f, "LiveVec2({a}, {b})")
    }
}

fn pack(a: f32, b: f32) -> u64 {
    (u64::from(a.to_bits()) << 32) | u64::from(b.to_bits())
}

fn unpack(bits: u64) -> (f32, f32) {
    (f32::from_bits((bits >> 32) as u32), f32::from_bits(bits as u32))
}

pub struct LiveScalar {
    bits: AtomicU32,
}

impl LiveScalar {
    pub fn new(v: f32) -> Self {
        Self {
            bits: AtomicU32::new(v.to_bits()),
        }
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Acquire))
    }

    pub fn set(&self, v: f32) {
        self.bits.store(v.to_bits(), Ordering::Release);
    }
}

impl Default for LiveScalar {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl fmt::Debug for LiveScalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LiveScalar({})", self.get())
    }
}

/// Which node-level gestures a node view installs. A node without a pan
/// handler cannot be dragged, so a press on it falls through to the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeHandlers {
    pub pan: bool,
    pub tap: bool,
    pub long_press: bool,
}

impl NodeHandlers {
    pub const NONE: NodeHandlers = NodeHandlers {
        pan: false,
        tap: false,
        long_press: false,
    };

    pub fn any(&self) -> bool {
        self.pan || self.tap || self.long_press
    }
}

impl Default for NodeHandlers {
    fn default() -> Self {
        Self {
            pan: true,
            tap: true,
            long_press: true,
        }
    }
}

/// Shared references to one node view's live state. Cloning shares the
/// cells; the node view writes them, edges and the controller read them.
#[derive(Debug, Clone)]
pub struct NodeEntry {
    pub position: Arc<LiveVec2>,
    pub size: Arc<LiveVec2>,
    pub scale: Arc<LiveScalar>,
    pub handlers: NodeHandlers,
    mount_seq: u64,
}

impl NodeEntry {
    pub fn new(position: Arc<LiveVec2>, size: Arc<LiveVec2>) -> Self {
        Self {
            position,
            size,
            scale: Arc::new(LiveScalar::default()),
            handlers: NodeHandlers::default(),
            mount_seq: 0,
        }
    }

    pub fn with_handlers(mut self, handlers: NodeHandlers) -> Self {
        self.handlers = handlers;
        self
    }

    pub fn rect(&self) -> Rect {
        Rect::from_parts(self.position.point(), self.size.size())
    }

    pub fn mount_seq(&self) -> u64 {
        self.mount_seq
    }

    fn same_cells(&self, other: &NodeEntry) -> bool {
        Arc::ptr_eq(&self.position, &other.position) && Arc::ptr_eq(&self.size, &other.size)
    }
}

type Listener = Arc<dyn Fn(u64) + Send + Sync>;

#[derive(Default)]
struct RegistryInner {
    entries: RwLock<HashMap<String, NodeEntry>>,
    listeners: Mutex<Vec<(u64, Listener)>>,
    version: AtomicU64,
    next_listener: AtomicU64,
    next_mount: AtomicU64,
}

impl RegistryInner {
    fn bump_and_notify(&self) {
        let version = self.version.fetch_add(1, Ordering::AcqRel) + 1;
        // Snapshot so listeners may call back into the registry.
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(version);
        }
    }

    fn remove_listener(&self, id: u64) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }
}

/// Registry scoped to one canvas. Clones share the same state. Mounts and
/// unmounts notify subscribers; position reads go through the live cells.
#[derive(Clone, Default)]
pub struct NodeRegistry {
    inner: Arc<RegistryInner>,
}

impl fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("nodes", &self.len())
            .field("version", &self.version())
            .finish()
    }
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the entry for `id` and notifies subscribers.
    pub fn register(&self, id: impl Into<String>, mut entry: NodeEntry) {
        let id = id.into();
        entry.mount_seq = self.inner.next_mount.fetch_add(1, Ordering::Relaxed);
        log::trace!("registry: mount {id}");
        self.inner.entries.write().insert(id, entry);
        self.inner.bump_and_notify();
    }

    /// Removes `id`. Subscribers are notified only when something was removed.
    pub fn unregister(&self, id: &str) -> bool {
        let removed = self.inner.entries.write().remove(id).is_some();
        if removed {
            log::trace!("registry: unmount {id}");
            self.inner.bump_and_notify();
        }
        removed
    }

    fn unregister_if_same(&self, id: &str, entry: &NodeEntry) -> bool {
        let removed = {
            let mut entries = self.inner.entries.write();
            match entries.get(id) {
                Some(current) if current.same_cells(entry) => entries.remove(id).is_some(),
                _ => false,
            }
        };
        if removed {
            self.inner.bump_and_notify();
        }
        removed
    }

    pub fn get(&self, id: &str) -> Option<NodeEntry> {
        self.inner.entries.read().get(id).cloned()
    }

    /// All entries in mount order.
    pub fn get_all(&self) -> Vec<(String, NodeEntry)> {
        let mut all: Vec<(String, NodeEntry)> = self
            .inner
            .entries
            .read()
            .iter()
            .map(|(id, entry)| (id.clone(), entry.clone()))
            .collect();
        all.sort_by_key(|(_, entry)| entry.mount_seq);
        all
    }

    pub fn len(&self) -> usize {
        self.inner.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn version(&self) -> u64 {
        self.inner.version.load(Ordering::Acquire)
    }

    /// Calls `listener` synchronously with the new version after every
    /// register/unregister until the returned guard is dropped.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(u64) + Send + Sync + 'static,
    {
        let id = self.inner.next_listener.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.lock().push((id, Arc::new(listener)));
        Subscription {
            id,
            registry: Arc::downgrade(&self.inner),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }

    /// Creates fresh live cells for a node view and registers them. The
    /// returned handle unregisters the entry when dropped.
    pub fn mount(&self, id: impl Into<String>, position: Point, size: Size) -> NodeHandle {
        self.mount_with(id, position, size, NodeHandlers::default())
    }

    pub fn mount_with(&self, id: impl Into<String>, position: Point, size: Size, handlers: NodeHandlers) -> NodeHandle {
        let id = id.into();
        let entry = NodeEntry::new(
            Arc::new(LiveVec2::new(position.x, position.y)),
            Arc::new(LiveVec2::new(size.width, size.height)),
        )
        .with_handlers(handlers);
        self.register(id.clone(), entry.clone());
        NodeHandle {
            id,
            entry,
            registry: self.clone(),
        }
    }
}

pub struct Subscription {
    id: u64,
    registry: Weak<RegistryInner>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        // Drop does the work.
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.registry.upgrade() {
            inner.remove_listener(self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// A mounted node view. Owns writes to its cells and unmounts on drop.
#[derive(Debug)]
pub struct NodeHandle {
    id: String,
    entry: NodeEntry,
    registry: NodeRegistry,
}

impl NodeHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn entry(&self) -> &NodeEntry {
        &self.entry
    }

    pub fn set_position(&self, position: Point) {
        self.entry.position.set_point(position);
    }

    /// Layout measurement callback. Sub-pixel jitter is ignored once the
    /// node has a real size.
    pub fn set_measured_size(&self, size: Size) {
        let current = self.entry.size.size();
        if !current.is_measured()
            || (current.width - size.width).abs() > 0.5
            || (current.height - size.height).abs() > 0.5
        {
            self.entry.size.set_size(size);
        }
    }
}

impl Drop for NodeHandle {
    fn drop(&mut self) {
        self.registry.unregister_if_same(&self.id, &self.entry);
    }
}
