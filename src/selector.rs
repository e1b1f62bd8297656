//! Selector Module
//!
//! A small CSS selector engine for `querySelector`-style lookups inside a
//! component's element. Supports type, `#id`, `.class`, `[attr]`,
//! `[attr=value]`, compound selectors, the descendant and child combinators
//! and comma separated selector lists. Pseudo classes are not supported.

use lazy_static::lazy_static;
use markup5ever_rcdom::Handle;
use regex::Regex;

use crate::dom;
use crate::error::{BinderError, Result};

lazy_static! {
    /// Optional type selector followed by any number of id/class/attribute parts
    static ref COMPOUND_RE: Regex =
        Regex::new(r"^(\*|[A-Za-z][A-Za-z0-9-]*)?((?:#[\w-]+|\.[\w-]+|\[[^\]]+\])*)$").unwrap();

    /// One id, class or attribute part of a compound selector
    static ref PART_RE: Regex = Regex::new(
        r#"#([\w-]+)|\.([\w-]+)|\[\s*([\w:-]+)\s*(?:=\s*(?:"([^"]*)"|'([^']*)'|([^\]\s"']+)))?\s*\]"#
    )
    .unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttributeMatcher {
    name: String,
    value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attributes: Vec<AttributeMatcher>,
}

impl Compound {
    fn matches(&self, element: &Handle) -> bool {
        if let Some(tag) = &self.tag {
            if dom::tag_name(element).as_deref() != Some(tag.as_str()) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if dom::get_attribute(element, "id").as_deref() != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.is_empty() {
            let class_list = dom::class_list(element);
            if !self.classes.iter().all(|class| class_list.contains(class)) {
                return false;
            }
        }
        self.attributes.iter().all(|attr| match &attr.value {
            Some(value) => {
                dom::get_attribute(element, &attr.name).as_deref() == Some(value.as_str())
            }
            None => dom::has_attribute(element, &attr.name),
        })
    }
}

/// Compounds from left to right; each carries the combinator that links it to
/// the previous one (ignored for the first).
#[derive(Debug, Clone, PartialEq, Eq)]
struct ComplexSelector {
    parts: Vec<(Combinator, Compound)>,
}

impl ComplexSelector {
    fn matches(&self, element: &Handle) -> bool {
        match self.parts.len() {
            0 => false,
            len => self.matches_at(element, len - 1),
        }
    }

    fn matches_at(&self, element: &Handle, index: usize) -> bool {
        let (combinator, compound) = &self.parts[index];
        if !compound.matches(element) {
            return false;
        }
        if index == 0 {
            return true;
        }

        match combinator {
            Combinator::Child => dom::parent_element(element)
                .map(|parent| self.matches_at(&parent, index - 1))
                .unwrap_or(false),
            Combinator::Descendant => {
                let mut ancestor = dom::parent_element(element);
                while let Some(candidate) = ancestor {
                    if self.matches_at(&candidate, index - 1) {
                        return true;
                    }
                    ancestor = dom::parent_element(&candidate);
                }
                false
            }
        }
    }
}

/// A parsed selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    alternatives: Vec<ComplexSelector>,
}

impl Selector {
    pub fn parse(source: &str) -> Result<Self> {
        let invalid = |reason: &str| BinderError::InvalidSelector {
            selector: source.to_string(),
            reason: reason.to_string(),
        };

        let mut alternatives = Vec::new();
        for alternative in split_outside_brackets(source, ',') {
            let alternative = alternative.trim();
            if alternative.is_empty() {
                return Err(invalid("empty selector"));
            }
            alternatives.push(parse_complex(alternative).map_err(|reason| invalid(&reason))?);
        }

        if alternatives.is_empty() {
            return Err(invalid("empty selector"));
        }
        Ok(Self { alternatives })
    }

    pub fn matches(&self, element: &Handle) -> bool {
        dom::is_element(element) && self.alternatives.iter().any(|alt| alt.matches(element))
    }

    /// First matching descendant of `root` in document order.
    pub fn query(&self, root: &Handle) -> Option<Handle> {
        dom::descendant_elements(root)
            .into_iter()
            .find(|element| self.matches(element))
    }

    /// Every matching descendant of `root` in document order.
    pub fn query_all(&self, root: &Handle) -> Vec<Handle> {
        dom::query_all(root, |element| self.matches(element))
    }
}

/// `root.querySelector(selector)`
pub fn query_selector(root: &Handle, selector: &str) -> Result<Option<Handle>> {
    Ok(Selector::parse(selector)?.query(root))
}

/// `root.querySelectorAll(selector)`
pub fn query_selector_all(root: &Handle, selector: &str) -> Result<Vec<Handle>> {
    Ok(Selector::parse(selector)?.query_all(root))
}

// ═══════════════════════════════════════════════════════════════════════════════
// PARSING
// ═══════════════════════════════════════════════════════════════════════════════

fn split_outside_brackets(source: &str, separator: char) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut in_brackets = false;

    for c in source.chars() {
        match c {
            '[' => in_brackets = true,
            ']' => in_brackets = false,
            _ => {}
        }
        if c == separator && !in_brackets {
            pieces.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    pieces.push(current);
    pieces
}

fn parse_complex(source: &str) -> std::result::Result<ComplexSelector, String> {
    let mut parts = Vec::new();
    let mut pending = Combinator::Descendant;
    let mut current = String::new();
    let mut in_brackets = false;

    let flush = |current: &mut String,
                     pending: &mut Combinator,
                     parts: &mut Vec<(Combinator, Compound)>|
     -> std::result::Result<(), String> {
        if !current.is_empty() {
            parts.push((*pending, parse_compound(current)?));
            current.clear();
            *pending = Combinator::Descendant;
        }
        Ok(())
    };

    for c in source.chars() {
        match c {
            '[' => {
                in_brackets = true;
                current.push(c);
            }
            ']' => {
                in_brackets = false;
                current.push(c);
            }
            '>' if !in_brackets => {
                flush(&mut current, &mut pending, &mut parts)?;
                if parts.is_empty() {
                    return Err("selector starts with a combinator".to_string());
                }
                pending = Combinator::Child;
            }
            c if c.is_whitespace() && !in_brackets => {
                flush(&mut current, &mut pending, &mut parts)?;
            }
            _ => current.push(c),
        }
    }
    flush(&mut current, &mut pending, &mut parts)?;

    if pending == Combinator::Child {
        return Err("selector ends with a combinator".to_string());
    }
    if parts.is_empty() {
        return Err("empty selector".to_string());
    }
    Ok(ComplexSelector { parts })
}

fn parse_compound(source: &str) -> std::result::Result<Compound, String> {
    let caps = COMPOUND_RE
        .captures(source)
        .ok_or_else(|| format!("unsupported compound selector '{}'", source))?;

    let mut compound = Compound {
        tag: caps
            .get(1)
            .map(|m| m.as_str())
            .filter(|tag| *tag != "*")
            .map(str::to_ascii_lowercase),
        ..Default::default()
    };

    let rest = caps.get(2).map(|m| m.as_str()).unwrap_or("");
    for part in PART_RE.captures_iter(rest) {
        if let Some(id) = part.get(1) {
            compound.id = Some(id.as_str().to_string());
        } else if let Some(class) = part.get(2) {
            compound.classes.push(class.as_str().to_string());
        } else if let Some(name) = part.get(3) {
            let value = part
                .get(4)
                .or_else(|| part.get(5))
                .or_else(|| part.get(6))
                .map(|m| m.as_str().to_string());
            compound.attributes.push(AttributeMatcher {
                name: name.as_str().to_ascii_lowercase(),
                value,
            });
        }
    }

    if compound == Compound::default() && caps.get(1).is_none() {
        return Err(format!("unsupported compound selector '{}'", source));
    }
    Ok(compound)
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> Handle {
        dom::create_html(
            r#"<div id="root">
                <ul class="list main">
                    <li class="item" data-index="0">zero</li>
                    <li class="item active" data-index="1">one</li>
                </ul>
                <p><span class="item">loose</span></p>
            </div>"#,
        )
        .unwrap()
    }

    fn texts(nodes: &[Handle]) -> Vec<String> {
        nodes.iter().map(dom::text_content).collect()
    }

    #[test]
    fn test_class_and_tag() {
        let root = fixture();
        assert_eq!(query_selector_all(&root, ".item").unwrap().len(), 3);
        assert_eq!(query_selector_all(&root, "li.item").unwrap().len(), 2);
        assert_eq!(
            texts(&query_selector_all(&root, ".item.active").unwrap()),
            vec!["one"]
        );
    }

    #[test]
    fn test_attribute_selectors() {
        let root = fixture();
        let found = query_selector(&root, "[data-index=\"1\"]").unwrap().unwrap();
        assert_eq!(dom::text_content(&found), "one");
        assert_eq!(query_selector_all(&root, "[data-index]").unwrap().len(), 2);
        assert_eq!(query_selector_all(&root, "li[data-index='0']").unwrap().len(), 1);
    }

    #[test]
    fn test_combinators() {
        let root = fixture();
        assert_eq!(
            texts(&query_selector_all(&root, "p .item").unwrap()),
            vec!["loose"]
        );
        assert_eq!(query_selector_all(&root, "ul > li").unwrap().len(), 2);
        assert_eq!(query_selector_all(&root, "div > li").unwrap().len(), 0);
        assert_eq!(query_selector_all(&root, "#root li").unwrap().len(), 2);
    }

    #[test]
    fn test_selector_list() {
        let root = fixture();
        assert_eq!(query_selector_all(&root, "p, ul").unwrap().len(), 2);
    }

    #[test]
    fn test_root_is_not_matched() {
        let root = fixture();
        assert!(query_selector(&root, "#root").unwrap().is_none());
    }

    #[test]
    fn test_invalid_selectors() {
        assert!(Selector::parse("").is_err());
        assert!(Selector::parse("> li").is_err());
        assert!(Selector::parse("ul >").is_err());
        assert!(Selector::parse("li:hover").is_err());
        assert!(Selector::parse("a,,b").is_err());
    }
}
