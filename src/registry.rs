//! Registry Module
//!
//! Maps component names to their descriptors and to the live instances bound
//! to DOM elements.
//!
//! ## Key Invariants
//!
//! 1. **One binding per element**: for a (name, element) pair there is at most
//!    one [`StoredInstance`] at any time (the scanner can break this on purpose
//!    when `skip_existing` is off, see [`crate::init`]).
//! 2. **Weak elements**: records hold elements weakly; the registry never keeps
//!    a removed subtree alive.
//! 3. **Remove before dispose**: a disposed instance is never discoverable.
//! 4. **No borrow across component code**: the internal `RefCell`s, the
//!    registry's and each instance slot's, are released before any factory,
//!    `adopted` or `dispose` runs, so components may call back into the
//!    registry, their own record included.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use markup5ever_rcdom::{Handle, Node};
use tracing::{debug, error, warn};

use crate::config::BinderConfig;
use crate::dom;

// ═══════════════════════════════════════════════════════════════════════════════
// COMPONENT CAPABILITIES
// ═══════════════════════════════════════════════════════════════════════════════

/// Upcast helper so instances can be downcast to their concrete type.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Behavior bound to one DOM element.
///
/// Both lifecycle hooks are optional; the defaults do nothing.
pub trait Component: AsAny {
    /// Called once after every instance created by the same scan exists,
    /// so the instance may reach into its children.
    fn adopted(&mut self) {}

    /// Called when the element is removed or the component is hot-replaced.
    fn dispose(&mut self) {}
}

pub type BoxedComponent = Box<dyn Component>;

/// Shared handle to a live instance. Hot replacement swaps the boxed value in
/// place, so clones of the handle follow the replacement.
pub type InstanceHandle = Rc<RefCell<BoxedComponent>>;

/// Builds a component for an element. Receives the registry so a parent can
/// look up the (already constructed) instances of its children.
pub type ComponentFactory = Rc<dyn Fn(&Handle, &Registry) -> anyhow::Result<BoxedComponent>>;

// ═══════════════════════════════════════════════════════════════════════════════
// DESCRIPTORS AND RECORDS
// ═══════════════════════════════════════════════════════════════════════════════

/// Registration entry: a component name plus the factory that builds it.
#[derive(Clone)]
pub struct ComponentDescriptor {
    pub name: String,
    pub factory: ComponentFactory,
}

impl ComponentDescriptor {
    pub fn new<F>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&Handle, &Registry) -> anyhow::Result<BoxedComponent> + 'static,
    {
        Self {
            name: name.into(),
            factory: Rc::new(factory),
        }
    }
}

impl fmt::Debug for ComponentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDescriptor")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// A live instance and the element it is bound to.
#[derive(Clone)]
pub struct StoredInstance {
    pub name: String,
    pub instance: InstanceHandle,
    element: Weak<Node>,
}

impl StoredInstance {
    pub fn new(name: impl Into<String>, instance: BoxedComponent, element: &Handle) -> Self {
        Self {
            name: name.into(),
            instance: Rc::new(RefCell::new(instance)),
            element: Rc::downgrade(element),
        }
    }

    /// The bound element, if it is still alive.
    pub fn element(&self) -> Option<Handle> {
        self.element.upgrade()
    }

    pub fn is_bound_to(&self, element: &Handle) -> bool {
        std::ptr::eq(self.element.as_ptr(), Rc::as_ptr(element))
    }

    /// Typed mutable access to the instance. `None` when it is not a `T`, or
    /// while the instance is itself running component code.
    pub fn with<T: Component, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        self.run(|instance| {
            let component: &mut dyn Component = &mut **instance;
            <dyn Component as AsAny>::as_any_mut(component)
                .downcast_mut::<T>()
                .map(f)
        })
    }

    pub(crate) fn dispose(&self) {
        self.run(|instance| instance.dispose());
    }

    pub(crate) fn adopted(&self) {
        self.run(|instance| instance.adopted());
    }

    /// Run component code on the instance with the slot released.
    ///
    /// The instance is moved out and a [`Vacant`] marker takes its place, so
    /// the code may reach this record again through the registry. Afterwards:
    /// a dispose that hit the marker is carried out on the real instance, and
    /// an instance hot-swapped into the slot meanwhile wins over the old one.
    fn run<R>(&self, f: impl FnOnce(&mut BoxedComponent) -> R) -> R {
        let mut taken = std::mem::replace(
            &mut *self.instance.borrow_mut(),
            Box::new(Vacant::default()),
        );
        let result = f(&mut taken);

        let vacant_state = {
            let slot = self.instance.borrow();
            let component: &dyn Component = &**slot;
            <dyn Component as AsAny>::as_any(component)
                .downcast_ref::<Vacant>()
                .map(|vacant| vacant.dispose_requested)
        };

        match vacant_state {
            Some(false) => *self.instance.borrow_mut() = taken,
            Some(true) => {
                taken.dispose();
                *self.instance.borrow_mut() = taken;
            }
            None => {
                debug!(name = %self.name, "instance replaced while busy, disposing the old one");
                taken.dispose();
            }
        }
        result
    }
}

/// Placeholder held by a record while its instance runs component code.
#[derive(Default)]
struct Vacant {
    dispose_requested: bool,
}

impl Component for Vacant {
    fn dispose(&mut self) {
        self.dispose_requested = true;
    }
}

impl fmt::Debug for StoredInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredInstance")
            .field("name", &self.name)
            .field("element_alive", &(self.element.strong_count() > 0))
            .finish_non_exhaustive()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// REGISTRY
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Default)]
struct RegistryState {
    modules: Vec<ComponentDescriptor>,
    instances: HashMap<String, Vec<StoredInstance>>,
}

/// Component registry. Single threaded; share it with `Rc` or use [`global`].
#[derive(Default)]
pub struct Registry {
    config: BinderConfig,
    state: RefCell<RegistryState>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: BinderConfig) -> Self {
        Self {
            config,
            state: RefCell::default(),
        }
    }

    pub fn config(&self) -> &BinderConfig {
        &self.config
    }

    /// Component name declared on `element` through the marker attribute.
    pub fn marker_of(&self, element: &Handle) -> Option<String> {
        dom::get_attribute(element, &self.config.marker_attribute)
    }

    /// Register a component so the scanner can create it for matching elements.
    ///
    /// A descriptor with the same name is replaced. Descriptors without a name
    /// are dropped with a diagnostic and `false` is returned.
    pub fn register(&self, descriptor: ComponentDescriptor) -> bool {
        if descriptor.name.trim().is_empty() {
            error!(?descriptor, "missing component name on descriptor, ignoring it");
            return false;
        }

        let mut state = self.state.borrow_mut();
        state.modules.retain(|m| m.name != descriptor.name);
        debug!(name = %descriptor.name, "registered component");
        state.modules.push(descriptor);
        true
    }

    /// Snapshot of the registered descriptors, in registration order.
    pub fn descriptors(&self) -> Vec<ComponentDescriptor> {
        self.state.borrow().modules.clone()
    }

    pub fn descriptor(&self, name: &str) -> Option<ComponentDescriptor> {
        self.state
            .borrow()
            .modules
            .iter()
            .find(|m| m.name == name)
            .cloned()
    }

    /// All instances for `name`, empty when there are none.
    pub fn instances(&self, name: &str) -> Vec<StoredInstance> {
        self.state
            .borrow()
            .instances
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    /// Whether an instance list exists for `name`.
    pub fn has_instances_for(&self, name: &str) -> bool {
        self.state.borrow().instances.contains_key(name)
    }

    pub fn has_instance(&self, element: &Handle) -> bool {
        self.instance_for(element).is_some()
    }

    /// The record bound to `element`, if any.
    pub fn instance_for(&self, element: &Handle) -> Option<StoredInstance> {
        let state = self.state.borrow();
        if let Some(name) = self.marker_of(element) {
            if let Some(found) = Self::find_in(&state, &name, element) {
                return Some(found);
            }
        }
        state
            .instances
            .values()
            .flatten()
            .find(|record| record.is_bound_to(element))
            .cloned()
    }

    fn find_in(state: &RegistryState, name: &str, element: &Handle) -> Option<StoredInstance> {
        state
            .instances
            .get(name)?
            .iter()
            .find(|record| record.is_bound_to(element))
            .cloned()
    }

    /// The instance handle bound to `element`.
    pub fn component_for_element(&self, element: &Handle) -> Option<InstanceHandle> {
        self.instance_for(element).map(|record| record.instance)
    }

    /// Typed access to the instance bound to `element`. Returns `None` when no
    /// instance is bound or it is not a `T`.
    pub fn with_component<T: Component, R>(
        &self,
        element: &Handle,
        f: impl FnOnce(&mut T) -> R,
    ) -> Option<R> {
        self.instance_for(element)?.with(f)
    }

    pub fn add_instance(&self, record: StoredInstance) {
        self.state
            .borrow_mut()
            .instances
            .entry(record.name.clone())
            .or_default()
            .push(record);
    }

    /// Remove the first record for `name` bound to `element`.
    pub fn remove_instance_by_element(&self, name: &str, element: &Handle) -> Option<StoredInstance> {
        let mut state = self.state.borrow_mut();
        let records = state.instances.get_mut(name)?;
        let index = records.iter().position(|record| record.is_bound_to(element))?;
        Some(records.remove(index))
    }

    /// Hot replacement: dispose every instance of `name` and build a new one on
    /// the same element with `factory`. The records keep their identity.
    ///
    /// Returns the number of replaced instances.
    pub fn replace_instances(&self, name: &str, factory: &ComponentFactory) -> usize {
        let mut replaced = 0;

        for record in self.instances(name) {
            record.dispose();

            let Some(element) = record.element() else {
                debug!(name, "pruning instance whose element was dropped");
                self.remove_record(name, &record);
                continue;
            };

            match factory(&element, self) {
                Ok(instance) => {
                    *record.instance.borrow_mut() = instance;
                    replaced += 1;
                }
                Err(e) => {
                    warn!(name, error = %e, "failed to recreate component, dropping instance");
                    self.remove_record(name, &record);
                }
            }
        }

        replaced
    }

    /// Register `descriptor` and hot-replace the live instances of its name.
    pub fn update_component(&self, descriptor: ComponentDescriptor) -> usize {
        let name = descriptor.name.clone();
        let factory = descriptor.factory.clone();
        if !self.register(descriptor) {
            return 0;
        }
        self.replace_instances(&name, &factory)
    }

    fn remove_record(&self, name: &str, record: &StoredInstance) {
        if let Some(records) = self.state.borrow_mut().instances.get_mut(name) {
            records.retain(|r| !Rc::ptr_eq(&r.instance, &record.instance));
        }
    }

    /// Total number of live records.
    pub fn instance_count(&self) -> usize {
        self.state.borrow().instances.values().map(Vec::len).sum()
    }

    /// Drop all instances without disposing them.
    pub fn clear_instances(&self) {
        self.state.borrow_mut().instances.clear();
    }

    /// Forget every descriptor and instance.
    pub fn reset(&self) {
        *self.state.borrow_mut() = RegistryState::default();
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Registry")
            .field("config", &self.config)
            .field(
                "modules",
                &state.modules.iter().map(|m| m.name.as_str()).collect::<Vec<_>>(),
            )
            .field("instances", &state.instances.values().map(Vec::len).sum::<usize>())
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// GLOBAL SLOT
// ═══════════════════════════════════════════════════════════════════════════════

thread_local! {
    static GLOBAL_REGISTRY: Rc<Registry> = Rc::new(Registry::new());
}

/// The well-known registry shared by every entry point running on this (UI)
/// thread. Use it when separately built bundles must see the same components.
pub fn global() -> Rc<Registry> {
    GLOBAL_REGISTRY.with(Rc::clone)
}

/// Clear the global registry. Meant for tests.
pub fn reset_global() {
    GLOBAL_REGISTRY.with(|registry| registry.reset());
}
