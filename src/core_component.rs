use markup5ever_rcdom::Handle;

use crate::error::Result;
use crate::registry::Component;
use crate::selector::Selector;

/// Base behavior for components: holds the bound element and offers selector
/// lookups scoped to it. Embed it in a component struct and forward `dispose`.
#[derive(Debug, Clone)]
pub struct CoreComponent {
    element: Option<Handle>,
}

impl CoreComponent {
    pub fn new(element: &Handle) -> Self {
        Self {
            element: Some(element.clone()),
        }
    }

    /// The bound element; `None` once disposed.
    pub fn element(&self) -> Option<&Handle> {
        self.element.as_ref()
    }

    /// First element matching `selector` inside `container`, or inside the
    /// bound element when no container is given.
    pub fn get_element(&self, selector: &str, container: Option<&Handle>) -> Result<Option<Handle>> {
        let selector = Selector::parse(selector)?;
        Ok(self
            .scope(container)
            .and_then(|scope| selector.query(scope)))
    }

    /// Every element matching `selector`, scoped like [`Self::get_element`].
    pub fn get_elements(&self, selector: &str, container: Option<&Handle>) -> Result<Vec<Handle>> {
        let selector = Selector::parse(selector)?;
        Ok(self
            .scope(container)
            .map(|scope| selector.query_all(scope))
            .unwrap_or_default())
    }

    fn scope<'a>(&'a self, container: Option<&'a Handle>) -> Option<&'a Handle> {
        container.or(self.element.as_ref())
    }
}

impl Component for CoreComponent {
    fn dispose(&mut self) {
        self.element = None;
    }
}
