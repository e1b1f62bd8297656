//! # Dev Bootstrap Module
//!
//! Development-only page rendering: templates are rendered into the app root
//! on the client, using data modules found next to the pages, and re-rendered
//! when data, partials or templates change.
//!
//! ## Key Invariants
//!
//! 1. **Page selection**: the page name comes from the options, else from the
//!    location path (`/name.html`), else it is `listing` (the index page).
//! 2. **Clean before re-render**: every update disposes the bound instances of
//!    the app root before new HTML is written into it.
//! 3. **Data-scoped updates**: a data update only re-renders when a module of
//!    the current page changed.
//!
//! Waiting for stylesheets to load is left to the host: call [`DevApp::render`]
//! once the page is ready.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use lazy_static::lazy_static;
use markup5ever_rcdom::Handle;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::clean::clean_element;
use crate::dom;
use crate::error::{BinderError, Result};
use crate::init::{init_components, InitReport};
use crate::registry::Registry;

pub const LISTING_PAGE: &str = "listing";

lazy_static! {
    static ref PAGE_PATH_RE: Regex = Regex::new(r"(?i)/(.*)\.html").unwrap();
    static ref BLOCK_PARTIAL_RE: Regex = Regex::new(r"(?i)/([^/]+)\.hbs").unwrap();
}

pub type Template = Rc<dyn Fn(&Value) -> String>;
pub type PartialNameMapper = Rc<dyn Fn(&str) -> Option<String>>;
pub type DataHook = Rc<dyn Fn(Value, &str) -> Option<Value>>;
pub type Hook = Rc<dyn Fn()>;

// ═══════════════════════════════════════════════════════════════════════════════
// DATA CONTEXT
// ═══════════════════════════════════════════════════════════════════════════════

/// Data modules keyed by their module path (`./home.json`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataContext {
    modules: BTreeMap<String, Value>,
}

impl DataContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.modules.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.modules.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Load every `.json` file below `dir`. Keys are `./` + the path relative
    /// to `dir`, with forward slashes.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let mut context = Self::new();

        for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
            let Ok(entry) = entry else { continue };
            let path = entry.path();
            if !path.is_file() || path.extension().map_or(true, |ext| ext != "json") {
                continue;
            }

            let source = fs::read_to_string(path).map_err(|source| BinderError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            let value = serde_json::from_str(&source).map_err(|source| BinderError::DataModule {
                path: path.to_path_buf(),
                source,
            })?;

            let relative = path.strip_prefix(dir).unwrap_or(path);
            let key = format!("./{}", relative.to_string_lossy().replace('\\', "/"));
            context.insert(key, value);
        }

        debug!(modules = context.len(), dir = %dir.display(), "loaded data modules");
        Ok(context)
    }

    /// Keys of `newer` that are new or whose content differs from `self`.
    pub fn changed_keys(&self, newer: &DataContext) -> Vec<String> {
        newer
            .modules
            .iter()
            .filter(|(key, value)| {
                self.modules
                    .get(*key)
                    .map_or(true, |old| content_hash(old) != content_hash(value))
            })
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// The data module belonging to `page_name`, matched on `/<page>.`.
    pub fn find_page(&self, page_name: &str) -> Option<(&str, &Value)> {
        self.modules
            .iter()
            .find(|(key, _)| is_page_module(key, page_name))
            .map(|(key, value)| (key.as_str(), value))
    }
}

pub fn content_hash(value: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

fn source_hash(source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn is_page_module(key: &str, page_name: &str) -> bool {
    let needle = format!("{}.", page_name);
    key.match_indices(&needle).any(|(index, _)| {
        index > 0 && matches!(key.as_bytes()[index - 1], b'/' | b'\\')
    })
}

/// Page name from a location path: `/home.html` → `home`, anything else is
/// the listing page.
pub fn page_name_from_path(pathname: &str) -> String {
    PAGE_PATH_RE
        .captures(pathname)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|name| !name.is_empty())
        .unwrap_or(LISTING_PAGE)
        .to_string()
}

// ═══════════════════════════════════════════════════════════════════════════════
// INDEX MODEL
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageEntry {
    pub page: String,
    pub data: Value,
    pub link: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Category {
    pub name: String,
    pub pages: Vec<PageEntry>,
}

/// Data handed to the index template.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexModel {
    pub pages: Vec<PageEntry>,
    pub categories: Vec<Category>,
    pub show_categories: bool,
}

impl IndexModel {
    pub fn from_context(context: &DataContext) -> Self {
        let pages = get_pages(context);
        let categories = map_categories(&pages);
        Self {
            show_categories: categories.len() > 1,
            pages,
            categories,
        }
    }
}

fn file_stem(key: &str) -> String {
    let base = key.rsplit(['/', '\\']).next().unwrap_or(key);
    match base.rfind('.') {
        Some(index) if index > 0 => base[..index].to_string(),
        _ => base.to_string(),
    }
}

fn meta_str(data: &Value, field: &str) -> Option<String> {
    match data.get("meta")?.get(field)? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Every data module as a page. Pages with a dot in their name are marked as
/// alternatives (`meta.alt`) and sort right after the page they vary.
pub fn get_pages(context: &DataContext) -> Vec<PageEntry> {
    let mut pages: Vec<PageEntry> = context
        .modules
        .iter()
        .map(|(key, value)| {
            let page = file_stem(key);
            let mut data = value.clone();
            if let Value::Object(object) = &mut data {
                let meta = object
                    .entry("meta")
                    .or_insert_with(|| Value::Object(Map::new()));
                if !meta.is_object() {
                    *meta = Value::Object(Map::new());
                }
                if page.contains('.') {
                    if let Value::Object(meta) = meta {
                        meta.insert("alt".to_string(), Value::Bool(true));
                    }
                }
            }
            PageEntry {
                link: format!("{}.html", page),
                page,
                data,
            }
        })
        .collect();

    pages.sort_by_cached_key(|entry| {
        let is_alt = entry.page.contains('.');
        let base = entry.page.split('.').next().unwrap_or(&entry.page).to_string();
        let sort_name = meta_str(&entry.data, "id").unwrap_or(base);
        (sort_name, is_alt, entry.page.clone())
    });
    pages
}

/// Group pages by `meta.category` (default `default`), in first-seen order.
pub fn map_categories(pages: &[PageEntry]) -> Vec<Category> {
    let mut categories: Vec<Category> = Vec::new();
    for page in pages {
        let name = meta_str(&page.data, "category").unwrap_or_else(|| "default".to_string());
        match categories.iter_mut().find(|c| c.name == name) {
            Some(category) => category.pages.push(page.clone()),
            None => categories.push(Category {
                name,
                pages: vec![page.clone()],
            }),
        }
    }
    categories
}

// ═══════════════════════════════════════════════════════════════════════════════
// PARTIALS
// ═══════════════════════════════════════════════════════════════════════════════

/// Receives partial templates, typically the template engine.
pub trait PartialRegistry {
    fn register_partial(&mut self, name: &str, template: &str);
}

impl PartialRegistry for HashMap<String, String> {
    fn register_partial(&mut self, name: &str, template: &str) {
        self.insert(name.to_string(), template.to_string());
    }
}

/// `./block/button/button.hbs` → `button`; only files under a `/block/` folder.
pub fn default_partial_name(path: &str) -> Option<String> {
    if !path.contains("/block/") {
        return None;
    }
    BLOCK_PARTIAL_RE
        .captures(path)
        .map(|caps| caps[1].to_string())
}

/// Register `content` under the name given by the first mapper that knows
/// `path`. Only one mapper may claim a partial.
pub fn register_partial(
    path: &str,
    content: &str,
    mappers: &[PartialNameMapper],
    partials: &mut dyn PartialRegistry,
) -> Option<String> {
    let name = if mappers.is_empty() {
        default_partial_name(path)
    } else {
        mappers.iter().find_map(|mapper| mapper(path))
    }?;

    partials.register_partial(&name, content);
    Some(name)
}

// ═══════════════════════════════════════════════════════════════════════════════
// BOOTSTRAP
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Clone)]
pub struct BootstrapOptions {
    pub index_template: Template,
    pub app_template: Template,
    /// Overrides the page derived from `location_path`.
    pub page_name: Option<String>,
    /// `document.location.pathname` of the host page.
    pub location_path: Option<String>,
    /// Path to partial name mapping; empty means [`default_partial_name`].
    pub partial_name_map: Vec<PartialNameMapper>,
    /// Transforms page data before rendering; `None` from the hook renders `{}`.
    pub on_data: Option<DataHook>,
    pub on_before_init: Option<Hook>,
    pub on_init: Option<Hook>,
    pub on_update: Option<Hook>,
}

impl BootstrapOptions {
    pub fn new<I, A>(index_template: I, app_template: A) -> Self
    where
        I: Fn(&Value) -> String + 'static,
        A: Fn(&Value) -> String + 'static,
    {
        Self {
            index_template: Rc::new(index_template),
            app_template: Rc::new(app_template),
            page_name: None,
            location_path: None,
            partial_name_map: Vec::new(),
            on_data: None,
            on_before_init: None,
            on_init: None,
            on_update: None,
        }
    }

    pub fn with_page_name(mut self, page_name: impl Into<String>) -> Self {
        self.page_name = Some(page_name.into());
        self
    }

    pub fn with_location_path(mut self, location_path: impl Into<String>) -> Self {
        self.location_path = Some(location_path.into());
        self
    }

    pub fn with_partial_name_mapper(
        mut self,
        mapper: impl Fn(&str) -> Option<String> + 'static,
    ) -> Self {
        self.partial_name_map.push(Rc::new(mapper));
        self
    }

    pub fn on_data(mut self, hook: impl Fn(Value, &str) -> Option<Value> + 'static) -> Self {
        self.on_data = Some(Rc::new(hook));
        self
    }

    pub fn on_before_init(mut self, hook: impl Fn() + 'static) -> Self {
        self.on_before_init = Some(Rc::new(hook));
        self
    }

    pub fn on_init(mut self, hook: impl Fn() + 'static) -> Self {
        self.on_init = Some(Rc::new(hook));
        self
    }

    pub fn on_update(mut self, hook: impl Fn() + 'static) -> Self {
        self.on_update = Some(Rc::new(hook));
        self
    }

    fn resolve_page_name(&self) -> String {
        match (&self.page_name, &self.location_path) {
            (Some(name), _) => name.clone(),
            (None, Some(path)) => page_name_from_path(path),
            (None, None) => LISTING_PAGE.to_string(),
        }
    }
}

impl fmt::Debug for BootstrapOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BootstrapOptions")
            .field("page_name", &self.page_name)
            .field("location_path", &self.location_path)
            .field("partial_name_map", &self.partial_name_map.len())
            .finish_non_exhaustive()
    }
}

/// A page rendered on the client during development.
pub struct DevApp<P: PartialRegistry> {
    app_root: Handle,
    registry: Rc<Registry>,
    options: BootstrapOptions,
    page_name: String,
    data: DataContext,
    partials: P,
    partial_hashes: HashMap<String, String>,
}

impl<P: PartialRegistry> DevApp<P> {
    /// Set up the app and register the initial partials. Nothing is rendered
    /// until [`Self::render`].
    pub fn bootstrap<I>(
        app_root: Handle,
        registry: Rc<Registry>,
        options: BootstrapOptions,
        data: DataContext,
        partial_sources: I,
        partials: P,
    ) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let page_name = options.resolve_page_name();
        let mut app = Self {
            app_root,
            registry,
            options,
            page_name,
            data,
            partials,
            partial_hashes: HashMap::new(),
        };
        for (path, content) in partial_sources {
            app.register_partial(&path, &content);
        }
        app
    }

    pub fn page_name(&self) -> &str {
        &self.page_name
    }

    pub fn app_root(&self) -> &Handle {
        &self.app_root
    }

    pub fn partials(&self) -> &P {
        &self.partials
    }

    /// First render, once the page is ready.
    pub fn render(&self) -> InitReport {
        self.render_page(false)
    }

    /// Swap in new data modules; re-renders only when the current page's data
    /// changed. Returns whether a re-render happened.
    pub fn update_data(&mut self, data: DataContext) -> bool {
        let changed = self.data.changed_keys(&data);
        self.data = data;

        if changed.iter().any(|key| is_page_module(key, &self.page_name)) {
            self.refresh();
            true
        } else {
            false
        }
    }

    /// Re-register changed partials and re-render.
    pub fn update_partials<I>(&mut self, partial_sources: I) -> InitReport
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (path, content) in partial_sources {
            let unchanged = self.partial_hashes.get(&path) == Some(&source_hash(&content));
            if !unchanged {
                self.register_partial(&path, &content);
            }
        }
        self.refresh()
    }

    /// Swap in new page templates and re-render.
    pub fn update(&mut self, index_template: Template, app_template: Template) -> InitReport {
        self.options.index_template = index_template;
        self.options.app_template = app_template;
        self.refresh()
    }

    fn register_partial(&mut self, path: &str, content: &str) {
        if let Some(name) = register_partial(
            path,
            content,
            &self.options.partial_name_map,
            &mut self.partials,
        ) {
            debug!(path, name = %name, "registered partial");
        }
        self.partial_hashes
            .insert(path.to_string(), source_hash(content));
    }

    fn refresh(&self) -> InitReport {
        clean_element(&self.registry, &self.app_root);
        self.render_page(true)
    }

    fn page_data(&self) -> Value {
        let data = match self.data.find_page(&self.page_name) {
            Some((_, value)) => value.clone(),
            None => {
                info!("Data for page \"{}\" could not be found.", self.page_name);
                Value::Null
            }
        };

        match &self.options.on_data {
            Some(hook) => hook(data, &self.page_name).unwrap_or_else(|| Value::Object(Map::new())),
            None => data,
        }
    }

    fn render_page(&self, update: bool) -> InitReport {
        let html = if self.page_name == LISTING_PAGE {
            let model = IndexModel::from_context(&self.data);
            let model = serde_json::to_value(model).unwrap_or(Value::Null);
            (self.options.index_template)(&model)
        } else {
            (self.options.app_template)(&self.page_data())
        };

        dom::set_inner_html(&self.app_root, &html);

        if !update {
            if let Some(hook) = &self.options.on_before_init {
                hook();
            }
        }

        let report = init_components(&self.registry, &self.app_root);

        let hook = if update {
            &self.options.on_update
        } else {
            &self.options.on_init
        };
        if let Some(hook) = hook {
            hook();
        }

        report
    }
}
