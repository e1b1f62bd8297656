//! Loader Module
//!
//! Build-time text transforms applied to template partials before they are
//! bundled. Both are plain string rewrites; the bundler side only forwards the
//! file content and hands the result back.
//!
//! - `hbs_build_loader`: turns `<script src>` / `<link rel="stylesheet">`
//!   includes into module requires and emits the `registerComponent` glue (plus
//!   an optional hot-reload block) for every script.
//! - `partial_comment_loader`: wraps a partial in begin/end HTML comments so
//!   it can be found in the rendered page.

#[cfg(feature = "napi")]
use napi_derive::napi;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;

lazy_static! {
    static ref SCRIPT_INCLUDE_RE: Regex =
        Regex::new(r#"(?i)<script src=["']([^"']+)["']></script>[\r\n]*"#).unwrap();

    static ref STYLE_INCLUDE_RE: Regex =
        Regex::new(r#"(?i)<link rel=["']stylesheet["'] href=["']([^"']+)["']>[\r\n]*"#).unwrap();

    /// `?include` in the resource query keeps the template in the build
    static ref INCLUDE_QUERY_RE: Regex = Regex::new(r"\?.*include").unwrap();

    static ref HBS_REQUIRE_RE: Regex = Regex::new(r#"(?i)require\("([\w/\\.-]+\.hbs)"\)"#).unwrap();

    static ref ANY_REQUIRE_RE: Regex = Regex::new(r#"require\("[^"]+"\)"#).unwrap();

    /// Everything after the last `src/`, without a leading `app/`
    static ref PARTIAL_SOURCE_RE: Regex = Regex::new(r".*src[\\/](?:app[\\/])?(.+?)$").unwrap();
}

/// Options of the template build loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HbsLoaderOptions {
    pub remove_script: bool,
    pub remove_style: bool,
    /// Keep only the partial requires of the template. Ignored when the
    /// resource query asks for `?include`.
    pub remove_template: bool,
    /// Emit the hot-module-replacement block for scripts.
    pub hot: bool,
    /// Module the generated glue imports `registerComponent` from.
    pub runtime_module: String,
}

impl Default for HbsLoaderOptions {
    fn default() -> Self {
        Self {
            remove_script: false,
            remove_style: false,
            remove_template: false,
            hot: true,
            runtime_module: "muban-core".to_string(),
        }
    }
}

impl HbsLoaderOptions {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Script and stylesheet includes pulled out of a template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Includes {
    pub scripts: Vec<String>,
    pub styles: Vec<String>,
    /// The template with the includes removed.
    pub content: String,
}

// ═══════════════════════════════════════════════════════════════════════════════
// TEMPLATE BUILD LOADER
// ═══════════════════════════════════════════════════════════════════════════════

pub fn extract_includes(content: &str) -> Includes {
    let mut scripts = Vec::new();
    let mut styles = Vec::new();

    let stripped = SCRIPT_INCLUDE_RE.replace_all(content, |caps: &regex::Captures| {
        scripts.push(caps[1].to_string());
        String::new()
    });
    let stripped = STYLE_INCLUDE_RE.replace_all(&stripped, |caps: &regex::Captures| {
        styles.push(caps[1].to_string());
        String::new()
    });

    Includes {
        scripts,
        styles,
        content: stripped.into_owned(),
    }
}

/// Quote a request path as a JS string literal.
fn stringify_request(request: &str) -> String {
    serde_json::Value::String(request.to_string()).to_string()
}

fn process_scripts(scripts: &[String], options: &HbsLoaderOptions) -> String {
    if options.remove_script || scripts.is_empty() {
        return String::new();
    }

    let runtime = stringify_request(&options.runtime_module);
    let blocks: Vec<String> = scripts
        .iter()
        .map(|script| {
            let request = stringify_request(script);
            let mut block = format!(
                "\nvar component = require({request}).default;\n\
                 var registerComponent = require({runtime}).registerComponent;\n\
                 registerComponent(component);\n"
            );
            if options.hot {
                block.push_str(&format!(
                    "\n// Hot Module Replacement API\n\
                     if (module.hot) {{\n  \
                       module.hot.accept({request}, function() {{\n    \
                         var component = require({request}).default;\n    \
                         require({runtime}).updateComponent(component);\n  \
                       }});\n\
                     }}\n"
                ));
            }
            block
        })
        .collect();

    format!("\n{}\n\n", blocks.join("\n"))
}

fn process_styles(styles: &[String], options: &HbsLoaderOptions) -> String {
    if options.remove_style || styles.is_empty() {
        return String::new();
    }

    let requires: Vec<String> = styles
        .iter()
        .map(|style| format!("require({});", stringify_request(style)))
        .collect();
    format!("\n{}\n", requires.join("\n"))
}

fn process_template(content: &str, remove_template: bool, include_in_build: bool) -> String {
    if !remove_template {
        if include_in_build {
            return HBS_REQUIRE_RE
                .replace_all(content, r#"require("$1?include")"#)
                .into_owned();
        }
        return content.to_string();
    }

    // keep only the partial requires
    let requires: Vec<&str> = ANY_REQUIRE_RE
        .find_iter(content)
        .map(|m| m.as_str())
        .filter(|r| r.ends_with(".hbs\")"))
        .collect();
    format!("\n// hbs partial requires\n{}", requires.join("\n"))
}

/// Rewrite a compiled template module: stylesheet requires first, then the
/// component registration glue, then the (possibly stripped) template.
pub fn hbs_build_loader(content: &str, resource_query: &str, options: &HbsLoaderOptions) -> String {
    let include_in_build = INCLUDE_QUERY_RE.is_match(resource_query);
    let remove_template = !include_in_build && options.remove_template;

    let includes = extract_includes(content);

    let mut output = process_styles(&includes.styles, options);
    output.push_str(&process_scripts(&includes.scripts, options));
    output.push_str(&process_template(
        &includes.content,
        remove_template,
        include_in_build,
    ));
    output
}

// ═══════════════════════════════════════════════════════════════════════════════
// PARTIAL COMMENT LOADER
// ═══════════════════════════════════════════════════════════════════════════════

/// Short display name of a partial: the path after the last `src/` (and an
/// optional `app/`), else the path relative to the project `context`.
pub fn partial_name(resource_path: &str, context: &Path) -> String {
    if let Some(caps) = PARTIAL_SOURCE_RE.captures(resource_path) {
        return caps[1].replace('\\', "/");
    }

    let path = Path::new(resource_path);
    path.strip_prefix(context)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

pub fn partial_comment_loader(content: &str, resource_path: &str, context: &Path) -> String {
    let name = partial_name(resource_path, context);
    format!(
        "\n<!-- partial: {name} -->\n{}\n<!-- / {name} -->\n",
        content.trim_end()
    )
}

// ═══════════════════════════════════════════════════════════════════════════════
// NAPI EXPORTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(feature = "napi")]
#[napi]
pub fn hbs_build_loader_native(
    content: String,
    resource_query: String,
    options_json: Option<String>,
) -> napi::Result<String> {
    let options = match options_json {
        Some(json) => HbsLoaderOptions::from_json(&json)
            .map_err(|e| napi::Error::from_reason(e.to_string()))?,
        None => HbsLoaderOptions::default(),
    };
    Ok(hbs_build_loader(&content, &resource_query, &options))
}

#[cfg(feature = "napi")]
#[napi]
pub fn partial_comment_loader_native(content: String, resource_path: String, context: String) -> String {
    partial_comment_loader(&content, &resource_path, Path::new(&context))
}
