//! Data Utils Module
//!
//! Render data through a template into a container, keeping component
//! bindings in sync: replaced content is disposed, new content is
//! initialized, untouched content is left alone.

use markup5ever_rcdom::Handle;
use tracing::trace;

use crate::clean::clean_element;
use crate::dom;
use crate::init::{init_components_in, init_each};
use crate::registry::Registry;

/// Render one data item into `container` and return the first inserted
/// element.
///
/// With `append` unset, the existing children are disposed and removed first.
pub fn render_item<T, F>(
    registry: &Registry,
    container: &Handle,
    template: F,
    data: &T,
    append: bool,
) -> Option<Handle>
where
    T: ?Sized,
    F: Fn(&T) -> String,
{
    let nodes = dom::parse_fragment_elements(&template(data));
    insert(registry, container, nodes, append).into_iter().next()
}

/// Render a list of data items into `container` and return the inserted
/// top-level elements.
///
/// Without `item_wrapper` the rendered HTML of all items is concatenated and
/// inserted as siblings. With a wrapper, every item is rendered into its own
/// deep clone of the wrapper, at the wrapper's deepest first-child element, and
/// each clone becomes one inserted element.
///
/// In replace mode all items are constructed before any of them is adopted;
/// appended items are initialized one after another.
pub fn render_items<T, F>(
    registry: &Registry,
    container: &Handle,
    template: F,
    data: &[T],
    append: bool,
    item_wrapper: Option<&Handle>,
) -> Vec<Handle>
where
    F: Fn(&T) -> String,
{
    let nodes = match item_wrapper {
        Some(wrapper) => data
            .iter()
            .map(|item| wrap_item(wrapper, &template(item)))
            .collect(),
        None => {
            let html: String = data.iter().map(&template).collect();
            dom::parse_fragment_elements(&html)
        }
    };

    insert(registry, container, nodes, append)
}

fn wrap_item(wrapper: &Handle, html: &str) -> Handle {
    let clone = dom::clone_node(wrapper, true);
    let leaf = dom::deepest_first_leaf(&clone);
    for node in dom::parse_fragment_elements(html) {
        dom::append_child(&leaf, &node);
    }
    clone
}

fn insert(registry: &Registry, container: &Handle, nodes: Vec<Handle>, append: bool) -> Vec<Handle> {
    if !append {
        let mut disposed = 0;
        for child in dom::element_children(container) {
            disposed += clean_element(registry, &child);
        }
        dom::remove_children(container);
        trace!(disposed, "cleared container");
    }

    for node in &nodes {
        dom::append_child(container, node);
    }

    // Only the new nodes: existing siblings are already bound. Replaced content
    // is scanned as a whole, appended items one by one.
    if append {
        init_each(registry, &nodes);
    } else {
        init_components_in(registry, &nodes);
    }
    nodes
}
