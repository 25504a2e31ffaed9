#![forbid(unsafe_code)]

//! Browser surface.
//!
//! - [`WebDom`] implements the document capability over the live DOM. Nodes
//!   are interned into an arena on first sight and looked up through a
//!   `WeakMap`; nodes that left the document are released on rebuild.
//!   Listeners are real DOM listeners that queue [`PageEvent`]s for the next
//!   tick.
//! - [`SwiperSource`] resolves a page-global `Swiper` constructor.
//! - [`SessionStorage`] records once-per-session notices in
//!   `sessionStorage`.
//! - [`ProductSliderWeb`] is the `wasm-bindgen` export the page script
//!   drives from `requestAnimationFrame`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use js_sys::{Array, Function, JSON, Object, Reflect, WeakMap};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{CustomEvent, CustomEventInit, Document, Element, Event, HtmlElement, TouchEvent};

use prodslide_core::dom::{Dom, Listeners, NodeId, Selector};
use prodslide_core::event::{PageEvent, PointerKind, TouchPhase};
use prodslide_core::session::{SessionError, SessionStore};
use prodslide_core::settings::RawSettings;
use prodslide_runtime::backend::{
    AnimationBackend, BackendError, BackendInstance, BackendNotice, BackendOptions, BackendSource,
};

use crate::bridge::Bridge;
use crate::protocol::HostEvent;
use crate::swiper::SwiperOptions;

// ---------------------------------------------------------------------------
// Node arena
// ---------------------------------------------------------------------------

/// Slot per node id. Released slots stay empty so ids are never reused;
/// `ids` maps each element back to its slot without holding it alive.
#[derive(Debug)]
struct Arena {
    elements: Vec<Option<Element>>,
    ids: WeakMap,
}

impl Default for Arena {
    fn default() -> Self {
        Self {
            elements: Vec::new(),
            ids: WeakMap::new(),
        }
    }
}

impl Arena {
    fn intern(&mut self, element: &Element) -> NodeId {
        let key: &Object = element.as_ref();
        if let Some(raw) = self.ids.get(key).as_f64() {
            let node = NodeId::new(raw as u32);
            if let Some(slot) = self.elements.get_mut(node.index()) {
                // Released earlier and back in the document.
                slot.get_or_insert_with(|| element.clone());
                return node;
            }
        }
        let node = NodeId::new(self.elements.len() as u32);
        self.elements.push(Some(element.clone()));
        self.ids.set(key, &JsValue::from(node.raw()));
        node
    }

    fn get(&self, node: NodeId) -> Option<&Element> {
        self.elements.get(node.index())?.as_ref()
    }

    fn live(&self) -> usize {
        self.elements.iter().flatten().count()
    }

    /// Drop elements no longer connected to the document, except `keep`.
    fn release_detached(&mut self, keep: impl Fn(NodeId) -> bool) -> usize {
        let mut released = 0;
        for (i, slot) in self.elements.iter_mut().enumerate() {
            let node = NodeId::new(i as u32);
            if slot.as_ref().is_some_and(|el| !el.is_connected()) && !keep(node) {
                *slot = None;
                released += 1;
            }
        }
        released
    }
}

type SharedArena = Rc<RefCell<Arena>>;

fn element(arena: &SharedArena, node: NodeId) -> Option<Element> {
    arena.borrow().get(node).cloned()
}

// ---------------------------------------------------------------------------
// WebDom
// ---------------------------------------------------------------------------

const LISTENER_EVENTS: [(Listeners, &str); 5] = [
    (Listeners::POINTER_ENTER, "mouseenter"),
    (Listeners::POINTER_LEAVE, "mouseleave"),
    (Listeners::CLICK, "click"),
    (Listeners::TOUCH_START, "touchstart"),
    (Listeners::TOUCH_END, "touchend"),
];

struct Attached {
    flag: Listeners,
    name: &'static str,
    callback: Closure<dyn FnMut(Event)>,
}

/// The live document.
pub struct WebDom {
    document: Document,
    arena: SharedArena,
    attached: HashMap<NodeId, Vec<Attached>>,
    inbox: Rc<RefCell<Vec<PageEvent>>>,
}

impl fmt::Debug for WebDom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebDom")
            .field("nodes", &self.arena.borrow().live())
            .field("listening", &self.attached.len())
            .field("queued", &self.inbox.borrow().len())
            .finish()
    }
}

impl WebDom {
    #[must_use]
    pub fn new(document: Document) -> Self {
        Self {
            document,
            arena: Rc::default(),
            attached: HashMap::new(),
            inbox: Rc::default(),
        }
    }

    /// Node id for an element, interning it if new.
    pub fn node_of(&self, element: &Element) -> NodeId {
        self.arena.borrow_mut().intern(element)
    }

    /// Events queued by DOM listeners since the last call.
    pub fn drain_events(&self) -> Vec<PageEvent> {
        std::mem::take(&mut *self.inbox.borrow_mut())
    }

    fn html(&self, node: NodeId) -> Option<HtmlElement> {
        element(&self.arena, node).and_then(|e| e.dyn_into::<HtmlElement>().ok())
    }

    fn callback(&self, container: NodeId, flag: Listeners) -> Closure<dyn FnMut(Event)> {
        let inbox = Rc::clone(&self.inbox);
        let arena = Rc::clone(&self.arena);
        Closure::new(move |event: Event| {
            let touch_x = || {
                event
                    .dyn_ref::<TouchEvent>()
                    .and_then(|t| t.changed_touches().get(0))
                    .map(|t| t.screen_x() as f32)
            };
            let page_event = if flag == Listeners::POINTER_ENTER {
                Some(PageEvent::Pointer {
                    container,
                    kind: PointerKind::Enter,
                })
            } else if flag == Listeners::POINTER_LEAVE {
                Some(PageEvent::Pointer {
                    container,
                    kind: PointerKind::Leave,
                })
            } else if flag == Listeners::CLICK {
                let target = event
                    .target()
                    .and_then(|t| t.dyn_into::<Element>().ok())
                    .map_or(container, |el| arena.borrow_mut().intern(&el));
                Some(PageEvent::Click { container, target })
            } else if flag == Listeners::TOUCH_START {
                touch_x().map(|x| PageEvent::Touch {
                    container,
                    phase: TouchPhase::Start,
                    x,
                })
            } else if flag == Listeners::TOUCH_END {
                touch_x().map(|x| PageEvent::Touch {
                    container,
                    phase: TouchPhase::End,
                    x,
                })
            } else {
                None
            };
            if let Some(page_event) = page_event {
                inbox.borrow_mut().push(page_event);
            }
        })
    }
}

impl Dom for WebDom {
    fn query_all(&self, scope: Option<NodeId>, selector: Selector<'_>) -> Vec<NodeId> {
        let css = match selector {
            Selector::Class(class) => format!(".{class}"),
            Selector::Tag(tag) => tag.to_owned(),
        };
        let found = match scope {
            None => self.document.query_selector_all(&css),
            Some(node) => match element(&self.arena, node) {
                Some(el) => el.query_selector_all(&css),
                None => return Vec::new(),
            },
        };
        let Ok(list) = found else {
            tracing::debug!(selector = %css, "query failed");
            return Vec::new();
        };
        let mut arena = self.arena.borrow_mut();
        (0..list.length())
            .filter_map(|i| list.item(i))
            .filter_map(|n| n.dyn_into::<Element>().ok())
            .map(|el| arena.intern(&el))
            .collect()
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        let parent = element(&self.arena, node)?.parent_element()?;
        Some(self.node_of(&parent))
    }

    fn tag_name(&self, node: NodeId) -> Option<String> {
        element(&self.arena, node).map(|e| e.tag_name().to_ascii_lowercase())
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        element(&self.arena, node)?.get_attribute(name)
    }

    fn style(&self, node: NodeId, prop: &str) -> Option<String> {
        self.html(node)?
            .style()
            .get_property_value(prop)
            .ok()
            .filter(|v| !v.is_empty())
    }

    fn set_style(&mut self, node: NodeId, prop: &str, value: &str) {
        let Some(el) = self.html(node) else {
            return;
        };
        let style = el.style();
        let result = if value.is_empty() {
            style.remove_property(prop).map(drop)
        } else {
            style.set_property(prop, value)
        };
        if let Err(err) = result {
            tracing::trace!(%node, prop, error = ?err, "style write rejected");
        }
    }

    fn add_listeners(&mut self, node: NodeId, listeners: Listeners) {
        let Some(el) = element(&self.arena, node) else {
            return;
        };
        let current = self.listeners(node);
        for (flag, name) in LISTENER_EVENTS {
            if !listeners.contains(flag) || current.contains(flag) {
                continue;
            }
            let callback = self.callback(node, flag);
            if el
                .add_event_listener_with_callback(name, callback.as_ref().unchecked_ref())
                .is_ok()
            {
                self.attached.entry(node).or_default().push(Attached {
                    flag,
                    name,
                    callback,
                });
            }
        }
    }

    fn remove_listeners(&mut self, node: NodeId, listeners: Listeners) {
        let el = element(&self.arena, node);
        let Some(attached) = self.attached.get_mut(&node) else {
            return;
        };
        attached.retain(|a| {
            if !listeners.contains(a.flag) {
                return true;
            }
            if let Some(el) = &el {
                let _ = el.remove_event_listener_with_callback(
                    a.name,
                    a.callback.as_ref().unchecked_ref(),
                );
            }
            false
        });
        if attached.is_empty() {
            self.attached.remove(&node);
        }
    }

    fn listeners(&self, node: NodeId) -> Listeners {
        self.attached
            .get(&node)
            .map_or(Listeners::empty(), |v| {
                v.iter().fold(Listeners::empty(), |acc, a| acc | a.flag)
            })
    }

    fn has_class(&self, node: NodeId, class: &str) -> bool {
        element(&self.arena, node).is_some_and(|el| el.class_list().contains(class))
    }

    fn add_class(&mut self, node: NodeId, class: &str) {
        if let Some(el) = element(&self.arena, node) {
            if let Err(err) = el.class_list().add_1(class) {
                tracing::trace!(%node, class, error = ?err, "class not added");
            }
        }
    }

    fn remove_class(&mut self, node: NodeId, class: &str) {
        if let Some(el) = element(&self.arena, node) {
            if let Err(err) = el.class_list().remove_1(class) {
                tracing::trace!(%node, class, error = ?err, "class not removed");
            }
        }
    }

    fn prune(&mut self) -> usize {
        let attached = &self.attached;
        self.arena
            .borrow_mut()
            .release_detached(|node| attached.contains_key(&node))
    }

    fn dispatch_custom(&mut self, node: NodeId, name: &str, detail: usize) {
        let Some(el) = element(&self.arena, node) else {
            return;
        };
        let payload = js_sys::Object::new();
        let _ = Reflect::set(&payload, &"index".into(), &JsValue::from(detail as u32));
        let init = CustomEventInit::new();
        init.set_detail(&payload);
        init.set_bubbles(true);
        match CustomEvent::new_with_event_init_dict(name, &init) {
            Ok(event) => {
                let _ = el.dispatch_event(&event);
            }
            Err(err) => tracing::debug!(name, error = ?err, "custom event not created"),
        }
    }
}

// ---------------------------------------------------------------------------
// Swiper backend
// ---------------------------------------------------------------------------

fn js_error(err: &JsValue) -> String {
    err.as_string()
        .or_else(|| {
            err.dyn_ref::<js_sys::Error>()
                .map(|e| String::from(e.message()))
        })
        .unwrap_or_else(|| format!("{err:?}"))
}

/// Call `target[method](...args)`.
fn call(target: &JsValue, method: &str, args: &[JsValue]) -> Result<JsValue, JsValue> {
    let func: Function = Reflect::get(target, &method.into())?.dyn_into()?;
    let argv = args.iter().collect::<Array>();
    func.apply(target, &argv)
}

/// Resolves `globalThis.Swiper` on every probe attempt.
#[derive(Debug, Clone)]
pub struct SwiperSource {
    arena: SharedArena,
}

impl SwiperSource {
    /// A source whose backend resolves nodes through `dom`.
    #[must_use]
    pub fn new(dom: &WebDom) -> Self {
        Self {
            arena: Rc::clone(&dom.arena),
        }
    }
}

impl BackendSource for SwiperSource {
    fn resolve(&self) -> Option<Rc<dyn AnimationBackend>> {
        let ctor = Reflect::get(&js_sys::global(), &"Swiper".into())
            .ok()?
            .dyn_into::<Function>()
            .ok()?;
        Some(Rc::new(SwiperBackend {
            ctor,
            arena: Rc::clone(&self.arena),
        }))
    }
}

struct SwiperBackend {
    ctor: Function,
    arena: SharedArena,
}

impl AnimationBackend for SwiperBackend {
    fn name(&self) -> &str {
        "swiper"
    }

    fn create(
        &self,
        _dom: &mut dyn Dom,
        frame: NodeId,
        options: &BackendOptions,
    ) -> Result<Box<dyn BackendInstance>, BackendError> {
        let frame_el = element(&self.arena, frame).ok_or(BackendError::MissingElement(".swiper"))?;
        let json = SwiperOptions::from(options)
            .to_json()
            .map_err(|e| BackendError::Construction(e.to_string()))?;
        let opts = JSON::parse(&json).map_err(|e| BackendError::Construction(js_error(&e)))?;
        if let Some(pagination) = options.pagination {
            let el = element(&self.arena, pagination.el)
                .ok_or(BackendError::MissingElement(".swiper-pagination"))?;
            let target = Reflect::get(&opts, &"pagination".into())
                .map_err(|e| BackendError::Construction(js_error(&e)))?;
            Reflect::set(&target, &"el".into(), &el)
                .map_err(|e| BackendError::Construction(js_error(&e)))?;
        }

        let args = Array::of2(&frame_el, &opts);
        let swiper = Reflect::construct(&self.ctor, &args)
            .map_err(|e| BackendError::Construction(js_error(&e)))?;

        let changes: Rc<RefCell<Vec<usize>>> = Rc::default();
        let sink = Rc::clone(&changes);
        let handle = swiper.clone();
        let on_change = Closure::<dyn FnMut()>::new(move || {
            let index = Reflect::get(&handle, &"realIndex".into())
                .ok()
                .and_then(|v| v.as_f64())
                .unwrap_or(0.0);
            sink.borrow_mut().push(index as usize);
        });
        if let Err(err) = call(
            &swiper,
            "on",
            &["slideChange".into(), on_change.as_ref().clone()],
        ) {
            // Unobserved instances must not keep animating the container.
            if let Err(destroy) = call(&swiper, "destroy", &[JsValue::TRUE, JsValue::TRUE]) {
                tracing::debug!(error = %js_error(&destroy), "swiper destroy failed");
            }
            return Err(BackendError::Construction(js_error(&err)));
        }

        Ok(Box::new(SwiperInstance {
            swiper,
            changes,
            _on_change: on_change,
        }))
    }
}

struct SwiperInstance {
    swiper: JsValue,
    changes: Rc<RefCell<Vec<usize>>>,
    _on_change: Closure<dyn FnMut()>,
}

impl SwiperInstance {
    fn invoke(&self, method: &str, args: &[JsValue]) {
        if let Err(err) = call(&self.swiper, method, args) {
            tracing::debug!(method, error = %js_error(&err), "swiper call failed");
        }
    }

    fn autoplay(&self) -> Option<JsValue> {
        Reflect::get(&self.swiper, &"autoplay".into())
            .ok()
            .filter(|a| a.is_object())
    }
}

impl BackendInstance for SwiperInstance {
    fn active_index(&self) -> usize {
        Reflect::get(&self.swiper, &"realIndex".into())
            .ok()
            .and_then(|v| v.as_f64())
            .map_or(0, |v| v as usize)
    }

    fn slide_next(&mut self, _dom: &mut dyn Dom) {
        self.invoke("slideNext", &[]);
    }

    fn slide_prev(&mut self, _dom: &mut dyn Dom) {
        self.invoke("slidePrev", &[]);
    }

    fn slide_to(&mut self, _dom: &mut dyn Dom, index: usize, speed: Duration) {
        let args = [
            JsValue::from(index as u32),
            JsValue::from(speed.as_millis() as f64),
        ];
        self.invoke("slideToLoop", &args);
    }

    fn autoplay_start(&mut self) {
        if let Some(autoplay) = self.autoplay() {
            let _ = call(&autoplay, "start", &[]);
        }
    }

    fn autoplay_stop(&mut self) {
        if let Some(autoplay) = self.autoplay() {
            let _ = call(&autoplay, "stop", &[]);
        }
    }

    fn autoplay_running(&self) -> bool {
        self.autoplay()
            .and_then(|a| Reflect::get(&a, &"running".into()).ok())
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    fn update(&mut self, _dom: &mut dyn Dom) {
        self.invoke("update", &[]);
    }

    fn poll(&mut self, _dom: &mut dyn Dom, _now: Duration) -> Vec<BackendNotice> {
        self.changes
            .borrow_mut()
            .drain(..)
            .map(BackendNotice::SlideChanged)
            .collect()
    }

    fn destroy(self: Box<Self>, _dom: &mut dyn Dom) {
        self.invoke("destroy", &[JsValue::TRUE, JsValue::TRUE]);
    }
}

// ---------------------------------------------------------------------------
// Session storage
// ---------------------------------------------------------------------------

/// `window.sessionStorage`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionStorage;

impl SessionStorage {
    fn storage() -> Result<web_sys::Storage, SessionError> {
        web_sys::window()
            .ok_or(SessionError::Unavailable)?
            .session_storage()
            .map_err(|e| SessionError::Rejected(js_error(&e)))?
            .ok_or(SessionError::Unavailable)
    }
}

impl SessionStore for SessionStorage {
    fn name(&self) -> &str {
        "sessionStorage"
    }

    fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        Self::storage()?
            .get_item(key)
            .map_err(|e| SessionError::Rejected(js_error(&e)))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), SessionError> {
        Self::storage()?
            .set_item(key, value)
            .map_err(|e| SessionError::Rejected(js_error(&e)))
    }
}

// ---------------------------------------------------------------------------
// Exported surface
// ---------------------------------------------------------------------------

/// Product slider engine for one page.
///
/// ```js
/// const slider = new ProductSliderWeb(wcplsSettings);
/// slider.start();
/// let last = performance.now();
/// function frame(t) {
///   for (const out of slider.tick(t - last)) { /* ... */ }
///   last = t;
///   requestAnimationFrame(frame);
/// }
/// requestAnimationFrame(frame);
/// ```
#[wasm_bindgen]
pub struct ProductSliderWeb {
    bridge: Bridge<WebDom>,
}

#[wasm_bindgen]
impl ProductSliderWeb {
    /// Create the engine from the localized settings object.
    #[wasm_bindgen(constructor)]
    pub fn new(settings: JsValue) -> Result<ProductSliderWeb, JsValue> {
        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or_else(|| JsValue::from_str("no document"))?;
        let raw = if settings.is_undefined() || settings.is_null() {
            RawSettings::default()
        } else {
            let json: String = JSON::stringify(&settings)?.into();
            RawSettings::from_json(&json).map_err(|e| JsValue::from_str(&e.to_string()))?
        };
        let dom = WebDom::new(document);
        let source = SwiperSource::new(&dom);
        let bridge = Bridge::new(dom, &raw, source).with_session(SessionStorage);
        Ok(Self { bridge })
    }

    pub fn start(&mut self) {
        self.bridge.start();
    }

    /// Deliver queued DOM input, advance time by `dt_ms`, and return the
    /// outputs produced as an array of plain objects.
    pub fn tick(&mut self, dt_ms: f64) -> Result<JsValue, JsValue> {
        let queued = self.bridge.page().dom().drain_events();
        for event in queued {
            self.bridge.page_mut().push_event(event);
        }
        let ms = if dt_ms.is_finite() && dt_ms > 0.0 {
            dt_ms as u64
        } else {
            0
        };
        self.bridge.apply(HostEvent::Advance { ms });
        self.outputs()
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.bridge.apply(HostEvent::Resize { width, height });
    }

    /// Product fragments were loaded or refreshed.
    #[wasm_bindgen(js_name = contentChanged)]
    pub fn content_changed(&mut self) {
        self.bridge.apply(HostEvent::ContentChanged);
    }

    /// Apply one JSON-encoded host event (record/replay).
    #[wasm_bindgen(js_name = applyEvent)]
    pub fn apply_event(&mut self, json: &str) -> Result<(), JsValue> {
        self.bridge
            .apply_json(json)
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    pub fn diagnostics(&self) -> Result<JsValue, JsValue> {
        let json = self
            .bridge
            .diagnostics_json()
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        JSON::parse(&json)
    }

    /// Tear everything down. The instance stays inert afterwards.
    pub fn destroy(&mut self) {
        self.bridge.shutdown();
    }
}

impl ProductSliderWeb {
    fn outputs(&mut self) -> Result<JsValue, JsValue> {
        let json = self
            .bridge
            .take_outputs_json()
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        JSON::parse(&json)
    }
}
