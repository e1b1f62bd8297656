//! # Component Binder
//!
//! Binds behavior to server-rendered HTML. Markup declares a component with a
//! marker attribute (`data-component="name"`); the binder finds those elements
//! in an html5ever DOM, builds one registered component per element and keeps
//! the instances in step with the DOM as it changes.
//!
//! ## Lifecycle Invariants
//!
//! 1. **Deepest First**: `init_components` constructs children before their
//!    parents, and calls `adopted` on every instance only after the whole
//!    subtree of that call is constructed.
//! 2. **Contained Failures**: a component whose factory fails is logged and
//!    skipped; its siblings and parents are still created.
//! 3. **Clean Before Discard**: `clean_element` must run on a subtree before it
//!    is removed; it unregisters each bound instance and then disposes it.
//! 4. **Structural Errors Propagate**: `update_element` on a detached element
//!    fails without touching the DOM or the registry.
//!
//! ## Shared Registry
//!
//! Pass a [`Registry`] explicitly, or use [`registry::global`] when several
//! independently built entry points on the same thread must share one.

#[cfg(feature = "napi")]
use napi_derive::napi;

mod clean;
mod config;
mod core_component;
mod data_utils;
pub mod dev;
pub mod dom;
mod error;
mod init;
pub mod loader;
pub mod registry;
pub mod selector;
mod update;

#[cfg(test)]
mod test_support;

#[cfg(test)]
mod data_utils_tests;

pub use clean::clean_element;
pub use config::{BinderConfig, DEFAULT_MARKER_ATTRIBUTE};
pub use core_component::CoreComponent;
pub use data_utils::{render_item, render_items};
pub use error::{BinderError, Result};
pub use init::{
    init_components, init_components_in, init_components_with, ConstructionFailure, InitOptions,
    InitReport,
};
pub use registry::{
    AsAny, BoxedComponent, Component, ComponentDescriptor, ComponentFactory, InstanceHandle,
    Registry, StoredInstance,
};
pub use update::update_element;

// Re-export the DOM handle so hosts don't need a direct rcdom dependency
pub use markup5ever_rcdom::Handle;

#[cfg(feature = "napi")]
#[napi]
pub fn binder_bridge() -> String {
    "Component Binder Native Bridge Connected".to_string()
}
