use markup5ever_rcdom::Handle;

use crate::clean::clean_element;
use crate::dom;
use crate::error::{BinderError, Result};
use crate::init::init_components;
use crate::registry::Registry;

/// Replace `element` with the element parsed from `html`, disposing the
/// components of the old tree and initializing those of the new one.
///
/// Useful when new HTML for a section of the page came from the backend.
/// Fails without touching the DOM or the registry when `element` is detached
/// or `html` holds no element. There is no rollback if a component of the new
/// tree fails to construct; see [`crate::init`].
pub fn update_element(registry: &Registry, element: &Handle, html: &str) -> Result<Handle> {
    if dom::parent(element).is_none() {
        return Err(BinderError::DetachedElement);
    }
    let new_element = dom::create_html(html).ok_or(BinderError::EmptyFragment)?;

    clean_element(registry, element);
    dom::replace_node(element, &new_element)?;
    init_components(registry, &new_element);

    Ok(new_element)
}
