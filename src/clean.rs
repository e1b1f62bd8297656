use markup5ever_rcdom::Handle;
use tracing::trace;

use crate::dom;
use crate::registry::Registry;

/// Remove and dispose every instance bound to `element` or to a marked element
/// inside it.
///
/// Call this before removing or replacing any piece of HTML that may have
/// components attached, otherwise the records stay in the registry and
/// `dispose` never runs. Returns the number of disposed instances.
pub fn clean_element(registry: &Registry, element: &Handle) -> usize {
    let marker = registry.config().marker_attribute.as_str();

    let mut marked = Vec::new();
    if dom::has_attribute(element, marker) {
        marked.push(element.clone());
    }
    marked.extend(dom::query_by_attribute(element, marker, None));

    let mut disposed = 0;
    for node in &marked {
        disposed += release(registry, node);
    }
    disposed
}

fn release(registry: &Registry, element: &Handle) -> usize {
    let Some(name) = registry.marker_of(element) else {
        return 0;
    };
    if !registry.has_instances_for(&name) {
        return 0;
    }

    // A scan without `skip_existing` may have bound the element twice.
    let mut released = 0;
    while let Some(record) = registry.remove_instance_by_element(&name, element) {
        trace!(name = %name, "disposing component");
        record.dispose();
        released += 1;
    }
    released
}
