#![forbid(unsafe_code)]

//! Container discovery.
//!
//! Walks the document for slider containers and, for each one, the ordered
//! slide sequence inside it. Discovery is a pure read: it never writes
//! styles or listeners, so running it any number of times over the same
//! document yields the same [`Discovery`].
//!
//! # Markup contract
//!
//! ```text
//! div.wc-product-list-slider-container[data-product-id]
//! ├── div.swiper                       (absent for single-image products)
//! │   ├── div.swiper-wrapper
//! │   │   └── div.swiper-slide × n     (each wraps one <img>)
//! │   └── div.swiper-pagination        (optional)
//! └── img                              (single-image products only)
//! ```
//!
//! # Failure Modes
//!
//! | Condition | Outcome |
//! |-----------|---------|
//! | No containers on the page | empty [`Discovery`], not an error |
//! | `.swiper` without `.swiper-wrapper` | container skipped, [`DiscoveryError::MissingWrapper`] |
//! | Wrapper holds no slides / no image at all | container skipped, [`DiscoveryError::NoSlides`] |
//! | Missing `data-product-id` | positional id used; ids are diagnostic only |

use std::fmt;

use crate::dom::{Dom, NodeId, Selector};

/// Class carried by every slider container.
pub const CONTAINER_CLASS: &str = "wc-product-list-slider-container";
/// Class of the slider frame inside a multi-image container.
pub const FRAME_CLASS: &str = "swiper";
/// Class of the element holding the slides.
pub const WRAPPER_CLASS: &str = "swiper-wrapper";
/// Class of one slide.
pub const SLIDE_CLASS: &str = "swiper-slide";
/// Class of the optional pagination element.
pub const PAGINATION_CLASS: &str = "swiper-pagination";
/// Class a container carries while its animation backend is constructed.
pub const LOADING_CLASS: &str = "loading";
/// Attribute carrying the product identifier.
pub const PRODUCT_ID_ATTR: &str = "data-product-id";

/// One slide position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlideNode {
    /// Position within the carousel, 0-based.
    pub index: usize,
    /// The slide element (for single-image containers, the image itself).
    pub node: NodeId,
    /// The already-rendered image inside the slide.
    pub image: Option<NodeId>,
}

/// Inner structure of a multi-image container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliderFrame {
    pub frame: NodeId,
    pub wrapper: NodeId,
    pub pagination: Option<NodeId>,
}

/// A container found on the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredContainer {
    /// Container element.
    pub node: NodeId,
    /// Position among all containers on the page.
    pub position: usize,
    /// Product identifier, used for logging only.
    pub product_id: String,
    /// `None` for single-image markup.
    pub frame: Option<SliderFrame>,
    /// Ordered slides, never empty.
    pub slides: Vec<SlideNode>,
}

impl DiscoveredContainer {
    #[must_use]
    pub fn slide_count(&self) -> usize {
        self.slides.len()
    }

    /// Whether this container needs no transition machinery.
    #[must_use]
    pub fn is_single(&self) -> bool {
        self.slides.len() <= 1
    }
}

/// Why a container was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryError {
    /// The container has a slider frame but no slide wrapper inside it.
    MissingWrapper,
    /// Nothing to show: no slides and no bare image.
    NoSlides,
}

impl fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingWrapper => write!(f, "container has no .{WRAPPER_CLASS}"),
            Self::NoSlides => f.write_str("container has no slides"),
        }
    }
}

impl std::error::Error for DiscoveryError {}

/// A container discovery could not use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedContainer {
    pub node: NodeId,
    pub position: usize,
    pub product_id: String,
    pub error: DiscoveryError,
}

/// Result of one discovery pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discovery {
    pub containers: Vec<DiscoveredContainer>,
    pub skipped: Vec<SkippedContainer>,
}

impl Discovery {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    /// Containers with two or more slides.
    pub fn animated(&self) -> impl Iterator<Item = &DiscoveredContainer> {
        self.containers.iter().filter(|c| !c.is_single())
    }
}

/// Discover every slider container in the document.
pub fn discover<D: Dom + ?Sized>(dom: &D) -> Discovery {
    let mut out = Discovery::default();
    for (position, node) in dom
        .query_all(None, Selector::Class(CONTAINER_CLASS))
        .into_iter()
        .enumerate()
    {
        let product_id = dom
            .attribute(node, PRODUCT_ID_ATTR)
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| format!("container-{position}"));

        match read_container(dom, node) {
            Ok((frame, slides)) => out.containers.push(DiscoveredContainer {
                node,
                position,
                product_id,
                frame,
                slides,
            }),
            Err(error) => {
                crate::debug!(
                    product_id = %product_id,
                    position,
                    error = %error,
                    "skipping slider container"
                );
                out.skipped.push(SkippedContainer {
                    node,
                    position,
                    product_id,
                    error,
                });
            }
        }
    }
    crate::debug!(
        found = out.containers.len(),
        skipped = out.skipped.len(),
        "container discovery finished"
    );
    out
}

fn read_container<D: Dom + ?Sized>(
    dom: &D,
    container: NodeId,
) -> Result<(Option<SliderFrame>, Vec<SlideNode>), DiscoveryError> {
    let Some(frame) = dom.query(Some(container), Selector::Class(FRAME_CLASS)) else {
        // Single-image markup: one bare image, no frame.
        let image = dom
            .query(Some(container), Selector::Tag("img"))
            .ok_or(DiscoveryError::NoSlides)?;
        return Ok((
            None,
            vec![SlideNode {
                index: 0,
                node: image,
                image: Some(image),
            }],
        ));
    };

    let wrapper = dom
        .query(Some(frame), Selector::Class(WRAPPER_CLASS))
        .ok_or(DiscoveryError::MissingWrapper)?;
    let slides: Vec<SlideNode> = dom
        .query_all(Some(wrapper), Selector::Class(SLIDE_CLASS))
        .into_iter()
        .enumerate()
        .map(|(index, node)| SlideNode {
            index,
            node,
            image: dom.query(Some(node), Selector::Tag("img")),
        })
        .collect();
    if slides.is_empty() {
        return Err(DiscoveryError::NoSlides);
    }
    let pagination = dom.query(Some(frame), Selector::Class(PAGINATION_CLASS));
    Ok((
        Some(SliderFrame {
            frame,
            wrapper,
            pagination,
        }),
        slides,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{ElementSpec, MemoryDom};

    fn container(dom: &mut MemoryDom, parent: NodeId, id: &str) -> NodeId {
        dom.append(
            Some(parent),
            ElementSpec::new("div")
                .class(CONTAINER_CLASS)
                .attr(PRODUCT_ID_ATTR, id),
        )
    }

    fn slider(dom: &mut MemoryDom, container: NodeId, images: usize) -> Vec<NodeId> {
        let frame = dom.append(Some(container), ElementSpec::new("div").class(FRAME_CLASS));
        let wrapper = dom.append(Some(frame), ElementSpec::new("div").class(WRAPPER_CLASS));
        let slides = (0..images)
            .map(|_| {
                let slide = dom.append(Some(wrapper), ElementSpec::new("div").class(SLIDE_CLASS));
                dom.append(Some(slide), ElementSpec::new("img"));
                slide
            })
            .collect();
        dom.append(Some(frame), ElementSpec::new("div").class(PAGINATION_CLASS));
        slides
    }

    #[test]
    fn empty_page_is_not_an_error() {
        let mut dom = MemoryDom::new();
        dom.append(None, ElementSpec::new("body"));
        let found = discover(&dom);
        assert!(found.is_empty());
        assert!(found.skipped.is_empty());
    }

    #[test]
    fn finds_slides_in_order() {
        let mut dom = MemoryDom::new();
        let body = dom.append(None, ElementSpec::new("body"));
        let c = container(&mut dom, body, "42");
        let slides = slider(&mut dom, c, 3);

        let found = discover(&dom);
        assert_eq!(found.containers.len(), 1);
        let got = &found.containers[0];
        assert_eq!(got.product_id, "42");
        assert_eq!(
            got.slides.iter().map(|s| s.node).collect::<Vec<_>>(),
            slides
        );
        assert!(got.slides.iter().all(|s| s.image.is_some()));
        assert!(got.frame.and_then(|f| f.pagination).is_some());
        assert_eq!(found.animated().count(), 1);
    }

    #[test]
    fn single_image_markup() {
        let mut dom = MemoryDom::new();
        let body = dom.append(None, ElementSpec::new("body"));
        let c = container(&mut dom, body, "7");
        let img = dom.append(Some(c), ElementSpec::new("img").class("single-product-image"));

        let found = discover(&dom);
        let got = &found.containers[0];
        assert!(got.is_single());
        assert!(got.frame.is_none());
        assert_eq!(got.slides[0].node, img);
    }

    #[test]
    fn missing_wrapper_is_skipped_others_survive() {
        let mut dom = MemoryDom::new();
        let body = dom.append(None, ElementSpec::new("body"));
        let broken = container(&mut dom, body, "1");
        dom.append(Some(broken), ElementSpec::new("div").class(FRAME_CLASS));
        let ok = container(&mut dom, body, "2");
        slider(&mut dom, ok, 2);

        let found = discover(&dom);
        assert_eq!(found.containers.len(), 1);
        assert_eq!(found.containers[0].position, 1);
        assert_eq!(found.skipped.len(), 1);
        assert_eq!(found.skipped[0].error, DiscoveryError::MissingWrapper);
    }

    #[test]
    fn empty_containers_are_skipped() {
        let mut dom = MemoryDom::new();
        let body = dom.append(None, ElementSpec::new("body"));
        container(&mut dom, body, "1");
        let c = container(&mut dom, body, "2");
        slider(&mut dom, c, 0);

        let found = discover(&dom);
        assert!(found.containers.is_empty());
        assert!(
            found
                .skipped
                .iter()
                .all(|s| s.error == DiscoveryError::NoSlides)
        );
    }

    #[test]
    fn missing_product_id_gets_positional_id() {
        let mut dom = MemoryDom::new();
        let body = dom.append(None, ElementSpec::new("body"));
        let c = dom.append(Some(body), ElementSpec::new("div").class(CONTAINER_CLASS));
        slider(&mut dom, c, 2);
        assert_eq!(discover(&dom).containers[0].product_id, "container-0");
    }

    #[test]
    fn discovery_is_idempotent() {
        let mut dom = MemoryDom::new();
        let body = dom.append(None, ElementSpec::new("body"));
        for id in ["a", "b"] {
            let c = container(&mut dom, body, id);
            slider(&mut dom, c, 2);
        }
        let writes = dom.style_writes();
        assert_eq!(discover(&dom), discover(&dom));
        assert_eq!(dom.style_writes(), writes);
    }
}
