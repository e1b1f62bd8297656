//! Init Module
//!
//! Binds registered components to the marked elements of a subtree.
//!
//! ## Ordering
//!
//! 1. Instances are constructed deepest element first, so when a parent's
//!    factory runs, the instances of its children already exist in the
//!    registry.
//! 2. `adopted` runs only after every construction of the same call finished,
//!    in the same deepest-first order.
//! 3. A failing factory is logged and skipped; it never stops the others.

use markup5ever_rcdom::Handle;
use tracing::{debug, error, trace};

use crate::config::BinderConfig;
use crate::dom;
use crate::registry::{ComponentDescriptor, Registry, StoredInstance};

/// Knobs for a single scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InitOptions {
    /// Leave elements that already have a bound instance alone.
    pub skip_existing: bool,
}

impl From<&BinderConfig> for InitOptions {
    fn from(config: &BinderConfig) -> Self {
        Self {
            skip_existing: config.skip_existing,
        }
    }
}

/// A factory that returned an error.
#[derive(Debug)]
pub struct ConstructionFailure {
    pub name: String,
    pub element: Handle,
    pub error: anyhow::Error,
}

/// Outcome of one scan.
#[derive(Debug, Default)]
pub struct InitReport {
    /// Successfully constructed instances, in construction order.
    pub constructed: Vec<StoredInstance>,
    pub failures: Vec<ConstructionFailure>,
    /// Elements left alone because they were already bound.
    pub skipped: usize,
}

impl InitReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Component names in construction order.
    pub fn constructed_names(&self) -> Vec<&str> {
        self.constructed.iter().map(|r| r.name.as_str()).collect()
    }

    pub(crate) fn merge(&mut self, other: InitReport) {
        self.constructed.extend(other.constructed);
        self.failures.extend(other.failures);
        self.skipped += other.skipped;
    }
}

struct PendingComponent {
    descriptor: ComponentDescriptor,
    element: Handle,
    depth: usize,
}

/// Create component instances for every marked element in `root`'s subtree,
/// `root` included, using the registry's configured options.
pub fn init_components(registry: &Registry, root: &Handle) -> InitReport {
    init_components_with(registry, root, &InitOptions::from(registry.config()))
}

pub fn init_components_with(
    registry: &Registry,
    root: &Handle,
    options: &InitOptions,
) -> InitReport {
    scan(registry, std::slice::from_ref(root), options)
}

/// One scan over several subtrees: every marked element of all `roots` is
/// constructed first, deepest first, and only then adopted.
pub fn init_components_in(registry: &Registry, roots: &[Handle]) -> InitReport {
    scan(registry, roots, &InitOptions::from(registry.config()))
}

fn scan(registry: &Registry, roots: &[Handle], options: &InitOptions) -> InitReport {
    let mut pending: Vec<PendingComponent> = roots
        .iter()
        .flat_map(|root| collect_pending(registry, root))
        .collect();

    // Stable, so siblings at equal depth keep document order.
    pending.sort_by(|a, b| b.depth.cmp(&a.depth));

    let mut report = InitReport::default();

    for PendingComponent {
        descriptor,
        element,
        depth,
    } in pending
    {
        if options.skip_existing && registry.has_instance(&element) {
            trace!(name = %descriptor.name, depth, "element already bound, skipping");
            report.skipped += 1;
            continue;
        }

        match (descriptor.factory)(&element, registry) {
            Ok(instance) => {
                trace!(name = %descriptor.name, depth, "constructed component");
                let record = StoredInstance::new(&descriptor.name, instance, &element);
                registry.add_instance(record.clone());
                report.constructed.push(record);
            }
            Err(e) => {
                error!(name = %descriptor.name, error = %e, "failed to construct component");
                report.failures.push(ConstructionFailure {
                    name: descriptor.name.clone(),
                    element,
                    error: e,
                });
            }
        }
    }

    for record in &report.constructed {
        record.adopted();
    }

    debug!(
        constructed = report.constructed.len(),
        failed = report.failures.len(),
        skipped = report.skipped,
        "initialized components"
    );
    report
}

fn collect_pending(registry: &Registry, root: &Handle) -> Vec<PendingComponent> {
    let marker = &registry.config().marker_attribute;
    let mut pending = Vec::new();

    for descriptor in registry.descriptors() {
        let mut elements = Vec::new();
        if dom::get_attribute(root, marker).as_deref() == Some(descriptor.name.as_str()) {
            elements.push(root.clone());
        }
        elements.extend(dom::query_by_attribute(root, marker, Some(&descriptor.name)));

        for element in elements {
            pending.push(PendingComponent {
                depth: dom::depth(&element),
                descriptor: descriptor.clone(),
                element,
            });
        }
    }

    pending
}

/// Scan each node in `roots`, combining the reports.
pub(crate) fn init_each(registry: &Registry, roots: &[Handle]) -> InitReport {
    let mut report = InitReport::default();
    for root in roots {
        report.merge(init_components(registry, root));
    }
    report
}
