//! Shared fixtures for the lifecycle tests.

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::anyhow;
use markup5ever_rcdom::Handle;
use serde_json::Value;

use crate::dom;
use crate::registry::{Component, ComponentDescriptor};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Mount(String),
    Adopt(String),
    Dispose(String),
}

/// Records lifecycle calls of every component created from it.
#[derive(Debug, Clone, Default)]
pub struct Spy {
    events: Rc<RefCell<Vec<Event>>>,
}

impl Spy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: Event) {
        self.events.borrow_mut().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    pub fn mounts(&self) -> Vec<String> {
        self.filter(|e| match e {
            Event::Mount(name) => Some(name.clone()),
            _ => None,
        })
    }

    pub fn adopts(&self) -> Vec<String> {
        self.filter(|e| match e {
            Event::Adopt(name) => Some(name.clone()),
            _ => None,
        })
    }

    pub fn disposals(&self) -> Vec<String> {
        self.filter(|e| match e {
            Event::Dispose(name) => Some(name.clone()),
            _ => None,
        })
    }

    fn filter(&self, pick: impl Fn(&Event) -> Option<String>) -> Vec<String> {
        self.events.borrow().iter().filter_map(pick).collect()
    }
}

pub struct SpyComponent {
    pub name: String,
    pub element: Handle,
    spy: Spy,
}

impl Component for SpyComponent {
    fn adopted(&mut self) {
        self.spy.push(Event::Adopt(self.name.clone()));
    }

    fn dispose(&mut self) {
        self.spy.push(Event::Dispose(self.name.clone()));
    }
}

/// Descriptor whose instances report to `spy`, under the label `name`.
pub fn spy_descriptor(name: &str, spy: &Spy) -> ComponentDescriptor {
    labelled_spy_descriptor(name, name, spy)
}

/// Like [`spy_descriptor`] but reporting as `label`, to tell versions apart.
pub fn labelled_spy_descriptor(name: &str, label: &str, spy: &Spy) -> ComponentDescriptor {
    let label = label.to_string();
    let spy = spy.clone();
    ComponentDescriptor::new(name, move |element, _registry| {
        spy.push(Event::Mount(label.clone()));
        Ok(Box::new(SpyComponent {
            name: label.clone(),
            element: element.clone(),
            spy: spy.clone(),
        }))
    })
}

pub fn failing_descriptor(name: &str) -> ComponentDescriptor {
    let name_owned = name.to_string();
    ComponentDescriptor::new(name, move |_element, _registry| {
        Err(anyhow!("{} refused to construct", name_owned))
    })
}

pub fn create_html(html: &str) -> Handle {
    dom::create_html(html).expect("fixture html has an element")
}

pub fn count_marked(root: &Handle, name: &str) -> usize {
    dom::query_by_attribute(root, "data-component", Some(name)).len()
}

/// Stand-in for a compiled `foo` template.
pub fn foo_template(data: &Value) -> String {
    format!(
        r#"<div data-component="foo">{}</div>"#,
        data["text"].as_str().unwrap_or_default()
    )
}
