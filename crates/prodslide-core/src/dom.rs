#![forbid(unsafe_code)]

//! Document access.
//!
//! The engine never reaches into a global document. It is handed a value
//! implementing [`Dom`], which answers the few structural queries discovery
//! needs, reads and writes inline styles, and records which event listeners
//! a container has attached. Two implementations exist:
//!
//! - [`MemoryDom`]: an arena-backed element tree, used natively and in tests.
//! - the browser binding in `prodslide-web` (wasm32 only).
//!
//! Nodes are addressed by [`NodeId`], an opaque index stable for the
//! lifetime of the document value.

use std::collections::BTreeMap;
use std::fmt;

use bitflags::bitflags;

/// Opaque handle to an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

bitflags! {
    /// Event listeners a container can have attached.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Listeners: u8 {
        const POINTER_ENTER = 0b0000_0001;
        const POINTER_LEAVE = 0b0000_0010;
        const CLICK         = 0b0000_0100;
        const TOUCH_START   = 0b0000_1000;
        const TOUCH_END     = 0b0001_0000;

        const HOVER = Self::POINTER_ENTER.bits() | Self::POINTER_LEAVE.bits();
        const TOUCH = Self::TOUCH_START.bits() | Self::TOUCH_END.bits();
    }
}

/// Structural selector understood by [`Dom::query_all`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector<'a> {
    /// Elements carrying a class.
    Class(&'a str),
    /// Elements with a tag name (case-insensitive).
    Tag(&'a str),
}

/// Read/write access to the host document.
pub trait Dom {
    /// Descendants of `scope` (or of the whole document when `None`) that
    /// match `selector`, in document order. `scope` itself is excluded.
    fn query_all(&self, scope: Option<NodeId>, selector: Selector<'_>) -> Vec<NodeId>;

    /// First match of [`query_all`](Dom::query_all).
    fn query(&self, scope: Option<NodeId>, selector: Selector<'_>) -> Option<NodeId> {
        self.query_all(scope, selector).into_iter().next()
    }

    /// Parent element, `None` for roots.
    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Lower-case tag name.
    fn tag_name(&self, node: NodeId) -> Option<String>;

    /// Attribute value.
    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;

    /// Inline style property value. Empty values read as `None`.
    fn style(&self, node: NodeId, prop: &str) -> Option<String>;

    /// Set an inline style property.
    fn set_style(&mut self, node: NodeId, prop: &str, value: &str);

    /// Attach listeners to a node.
    fn add_listeners(&mut self, node: NodeId, listeners: Listeners);

    /// Detach listeners from a node.
    fn remove_listeners(&mut self, node: NodeId, listeners: Listeners);

    /// Listeners currently attached to a node.
    fn listeners(&self, node: NodeId) -> Listeners;

    /// Dispatch a fire-and-forget custom event carrying an index.
    fn dispatch_custom(&mut self, node: NodeId, name: &str, detail: usize);

    /// Whether the node carries `class`.
    fn has_class(&self, node: NodeId, class: &str) -> bool;

    fn add_class(&mut self, node: NodeId, class: &str);

    fn remove_class(&mut self, node: NodeId, class: &str);

    /// Drop what the document keeps for nodes that left the page. Ids of
    /// released nodes are never handed out again. Returns how many nodes
    /// were released.
    fn prune(&mut self) -> usize {
        0
    }

    /// Whether `node` or one of its ancestors below `stop` is a `tag` element.
    fn has_ancestor_tag(&self, node: NodeId, tag: &str, stop: NodeId) -> bool {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if current == stop {
                return false;
            }
            if self
                .tag_name(current)
                .is_some_and(|name| name.eq_ignore_ascii_case(tag))
            {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }
}

// ---------------------------------------------------------------------------
// MemoryDom
// ---------------------------------------------------------------------------

/// Description of an element to insert into a [`MemoryDom`].
#[derive(Debug, Clone, Default)]
pub struct ElementSpec {
    tag: String,
    classes: Vec<String>,
    attributes: BTreeMap<String, String>,
}

impl ElementSpec {
    #[must_use]
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn class(mut self, class: &str) -> Self {
        self.classes.push(class.to_owned());
        self
    }

    #[must_use]
    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_owned(), value.to_owned());
        self
    }
}

#[derive(Debug, Clone)]
struct Element {
    tag: String,
    classes: Vec<String>,
    attributes: BTreeMap<String, String>,
    style: BTreeMap<String, String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    listeners: Listeners,
    released: bool,
}

/// Custom event recorded by [`MemoryDom::dispatch_custom`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomEvent {
    pub node: NodeId,
    pub name: String,
    pub detail: usize,
}

/// Arena-backed in-memory document.
#[derive(Debug, Clone, Default)]
pub struct MemoryDom {
    elements: Vec<Element>,
    roots: Vec<NodeId>,
    custom_events: Vec<CustomEvent>,
    style_writes: u64,
}

impl MemoryDom {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an element under `parent` (or as a new root).
    ///
    /// # Panics
    ///
    /// Panics if `parent` does not belong to this document.
    pub fn append(&mut self, parent: Option<NodeId>, spec: ElementSpec) -> NodeId {
        let id = NodeId(u32::try_from(self.elements.len()).expect("document too large"));
        if let Some(p) = parent {
            assert!(p.index() < self.elements.len(), "unknown parent {p}");
            self.elements[p.index()].children.push(id);
        } else {
            self.roots.push(id);
        }
        self.elements.push(Element {
            tag: spec.tag,
            classes: spec.classes,
            attributes: spec.attributes,
            style: BTreeMap::new(),
            parent,
            children: Vec::new(),
            listeners: Listeners::empty(),
            released: false,
        });
        id
    }

    /// Detach a subtree from its parent. The nodes stay allocated but are no
    /// longer reachable by queries.
    pub fn detach(&mut self, node: NodeId) {
        let Some(element) = self.elements.get(node.index()) else {
            return;
        };
        match element.parent {
            Some(p) => self.elements[p.index()].children.retain(|c| *c != node),
            None => self.roots.retain(|r| *r != node),
        }
        self.elements[node.index()].parent = None;
    }

    /// Number of elements ever allocated.
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Custom events dispatched so far.
    #[must_use]
    pub fn custom_events(&self) -> &[CustomEvent] {
        &self.custom_events
    }

    /// Drain dispatched custom events.
    pub fn take_custom_events(&mut self) -> Vec<CustomEvent> {
        std::mem::take(&mut self.custom_events)
    }

    /// Total listener bits attached across the whole document.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.elements
            .iter()
            .map(|e| e.listeners.bits().count_ones() as usize)
            .sum()
    }

    /// Nodes released by [`Dom::prune`] so far.
    #[must_use]
    pub fn released(&self) -> usize {
        self.elements.iter().filter(|e| e.released).count()
    }

    /// Number of inline style writes performed (diagnostic).
    #[must_use]
    pub fn style_writes(&self) -> u64 {
        self.style_writes
    }

    fn walk(&self, start: &[NodeId], out: &mut Vec<NodeId>, pred: &dyn Fn(&Element) -> bool) {
        for id in start {
            let element = &self.elements[id.index()];
            if pred(element) {
                out.push(*id);
            }
            self.walk(&element.children, out, pred);
        }
    }
}

impl Dom for MemoryDom {
    fn query_all(&self, scope: Option<NodeId>, selector: Selector<'_>) -> Vec<NodeId> {
        let start: &[NodeId] = match scope {
            Some(node) => match self.elements.get(node.index()) {
                Some(element) => &element.children,
                None => return Vec::new(),
            },
            None => &self.roots,
        };
        let mut out = Vec::new();
        match selector {
            Selector::Class(class) => {
                self.walk(start, &mut out, &|e| e.classes.iter().any(|c| c == class));
            }
            Selector::Tag(tag) => {
                self.walk(start, &mut out, &|e| e.tag.eq_ignore_ascii_case(tag));
            }
        }
        out
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.elements.get(node.index())?.parent
    }

    fn tag_name(&self, node: NodeId) -> Option<String> {
        self.elements.get(node.index()).map(|e| e.tag.clone())
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.elements
            .get(node.index())?
            .attributes
            .get(name)
            .cloned()
    }

    fn style(&self, node: NodeId, prop: &str) -> Option<String> {
        self.elements
            .get(node.index())?
            .style
            .get(prop)
            .filter(|v| !v.is_empty())
            .cloned()
    }

    fn set_style(&mut self, node: NodeId, prop: &str, value: &str) {
        if let Some(element) = self.elements.get_mut(node.index()) {
            self.style_writes += 1;
            if value.is_empty() {
                element.style.remove(prop);
            } else {
                element.style.insert(prop.to_owned(), value.to_owned());
            }
        }
    }

    fn add_listeners(&mut self, node: NodeId, listeners: Listeners) {
        if let Some(element) = self.elements.get_mut(node.index()) {
            element.listeners |= listeners;
        }
    }

    fn remove_listeners(&mut self, node: NodeId, listeners: Listeners) {
        if let Some(element) = self.elements.get_mut(node.index()) {
            element.listeners &= !listeners;
        }
    }

    fn listeners(&self, node: NodeId) -> Listeners {
        self.elements
            .get(node.index())
            .map_or(Listeners::empty(), |e| e.listeners)
    }

    fn dispatch_custom(&mut self, node: NodeId, name: &str, detail: usize) {
        self.custom_events.push(CustomEvent {
            node,
            name: name.to_owned(),
            detail,
        });
    }

    fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.elements
            .get(node.index())
            .is_some_and(|e| e.classes.iter().any(|c| c == class))
    }

    fn add_class(&mut self, node: NodeId, class: &str) {
        if let Some(element) = self.elements.get_mut(node.index()) {
            if !element.classes.iter().any(|c| c == class) {
                element.classes.push(class.to_owned());
            }
        }
    }

    fn remove_class(&mut self, node: NodeId, class: &str) {
        if let Some(element) = self.elements.get_mut(node.index()) {
            element.classes.retain(|c| c != class);
        }
    }

    fn prune(&mut self) -> usize {
        let mut reachable = Vec::new();
        self.walk(&self.roots, &mut reachable, &|_: &Element| true);
        let mut live = vec![false; self.elements.len()];
        for id in reachable {
            live[id.index()] = true;
        }
        let mut released = 0;
        for (element, live) in self.elements.iter_mut().zip(live) {
            if live || element.released {
                continue;
            }
            element.released = true;
            element.style.clear();
            element.attributes.clear();
            element.listeners = Listeners::empty();
            released += 1;
        }
        released
    }
}
