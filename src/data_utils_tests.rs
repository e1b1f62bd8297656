#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use crate::data_utils::{render_item, render_items};
    use crate::dom;
    use crate::init::init_components;
    use crate::registry::Registry;
    use crate::test_support::{count_marked, create_html, foo_template, spy_descriptor, Event, Spy};
    use crate::Handle;

    const TWO_FOOS: &str = r#"<div>
        <div data-component="foo">foo</div>
        <div data-component="foo">foo</div>
    </div>"#;

    const TWO_WRAPPED_FOOS: &str = r#"<div>
        <div data-wrapper="bar"><div data-component="foo">foo</div></div>
        <div data-wrapper="bar"><div data-component="foo">foo</div></div>
    </div>"#;

    fn mounted(html: &str) -> (Registry, Spy, Handle) {
        let registry = Registry::new();
        let spy = Spy::new();
        registry.register(spy_descriptor("foo", &spy));
        let container = create_html(html);
        init_components(&registry, &container);
        (registry, spy, container)
    }

    fn three_items() -> Vec<Value> {
        vec![
            json!({ "text": "foobar" }),
            json!({ "text": "baz" }),
            json!({ "text": "ipsum" }),
        ]
    }

    fn count_wrappers(root: &Handle, value: &str) -> usize {
        dom::query_by_attribute(root, "data-wrapper", Some(value)).len()
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // RENDER ITEM
    // ═══════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_render_item_replaces_content() {
        let (registry, spy, container) = mounted(TWO_FOOS);

        let item = render_item(
            &registry,
            &container,
            foo_template,
            &json!({ "text": "foobar" }),
            false,
        );

        assert_eq!(spy.mounts().len(), 3);
        assert_eq!(spy.adopts().len(), 3);
        assert_eq!(spy.disposals().len(), 2);
        assert_eq!(count_marked(&container, "foo"), 1);

        let item = item.unwrap();
        assert_eq!(dom::text_content(&item), "foobar");
        assert!(registry.has_instance(&item));
        assert_eq!(registry.instance_count(), 1);
    }

    #[test]
    fn test_render_item_appends() {
        let (registry, spy, container) = mounted(TWO_FOOS);

        let item = render_item(
            &registry,
            &container,
            foo_template,
            &json!({ "text": "foobar" }),
            true,
        );

        assert!(item.is_some());
        assert_eq!(spy.mounts().len(), 3);
        assert_eq!(spy.adopts().len(), 3);
        assert!(spy.disposals().is_empty());
        assert_eq!(count_marked(&container, "foo"), 3);
        assert_eq!(registry.instance_count(), 3);
    }

    #[test]
    fn test_render_item_without_elements() {
        let (registry, spy, container) = mounted(TWO_FOOS);

        let item = render_item(&registry, &container, |text: &str| text.to_string(), "plain text", false);

        assert!(item.is_none());
        assert_eq!(spy.disposals().len(), 2);
        assert_eq!(count_marked(&container, "foo"), 0);
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // RENDER ITEMS
    // ═══════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_render_items_replaces_content() {
        let (registry, spy, container) = mounted(TWO_FOOS);
        let data = vec![json!({ "text": "foobar" }), json!({ "text": "baz" })];

        let items = render_items(&registry, &container, foo_template, &data, false, None);

        assert_eq!(spy.mounts().len(), 4);
        assert_eq!(spy.adopts().len(), 4);
        assert_eq!(spy.disposals().len(), 2);
        assert_eq!(items.len(), 2);
        assert_eq!(count_marked(&container, "foo"), 2);

        let texts: Vec<String> = items.iter().map(dom::text_content).collect();
        assert_eq!(texts, vec!["foobar", "baz"]);
    }

    #[test]
    fn test_render_items_appends() {
        let (registry, spy, container) = mounted(TWO_FOOS);
        let data = vec![json!({ "text": "foobar" }), json!({ "text": "baz" })];

        let items = render_items(&registry, &container, foo_template, &data, true, None);

        assert_eq!(spy.mounts().len(), 4);
        assert_eq!(spy.adopts().len(), 4);
        assert_eq!(items.len(), 2);
        assert_eq!(count_marked(&container, "foo"), 4);
        assert_eq!(registry.instance_count(), 4);
    }

    #[test]
    fn test_render_items_replace_constructs_all_before_adopting() {
        let (registry, spy, container) = mounted(TWO_FOOS);
        let data = vec![json!({ "text": "foobar" }), json!({ "text": "baz" })];

        render_items(&registry, &container, foo_template, &data, false, None);

        let foo = || "foo".to_string();
        assert_eq!(
            spy.events()[4..],
            [
                Event::Dispose(foo()),
                Event::Dispose(foo()),
                Event::Mount(foo()),
                Event::Mount(foo()),
                Event::Adopt(foo()),
                Event::Adopt(foo()),
            ]
        );
    }

    #[test]
    fn test_render_items_append_initializes_one_by_one() {
        let (registry, spy, container) = mounted(TWO_FOOS);
        let data = vec![json!({ "text": "foobar" }), json!({ "text": "baz" })];

        render_items(&registry, &container, foo_template, &data, true, None);

        let foo = || "foo".to_string();
        assert_eq!(
            spy.events()[4..],
            [
                Event::Mount(foo()),
                Event::Adopt(foo()),
                Event::Mount(foo()),
                Event::Adopt(foo()),
            ]
        );
    }

    #[test]
    fn test_render_items_empty_list_clears() {
        let (registry, spy, container) = mounted(TWO_FOOS);
        let data: Vec<Value> = Vec::new();

        let items = render_items(&registry, &container, foo_template, &data, false, None);

        assert!(items.is_empty());
        assert_eq!(spy.disposals().len(), 2);
        assert!(dom::element_children(&container).is_empty());
        assert_eq!(registry.instance_count(), 0);
    }

    #[test]
    fn test_render_items_with_wrapper_replaces_content() {
        let (registry, spy, container) = mounted(TWO_WRAPPED_FOOS);
        let wrapper = create_html(r#"<div data-wrapper="bar"></div>"#);

        let items = render_items(
            &registry,
            &container,
            foo_template,
            &three_items(),
            false,
            Some(&wrapper),
        );

        assert_eq!(spy.mounts().len(), 5);
        assert_eq!(spy.disposals().len(), 2);
        assert_eq!(items.len(), 3);
        assert_eq!(count_wrappers(&container, "bar"), 3);

        // the template wrapper itself is never inserted
        assert!(dom::element_children(&wrapper).is_empty());
        assert!(dom::parent(&wrapper).is_none());
    }

    #[test]
    fn test_render_items_with_wrapper_appends() {
        let (registry, spy, container) = mounted(TWO_WRAPPED_FOOS);
        let wrapper = create_html(r#"<div data-wrapper="bar"></div>"#);

        let items = render_items(
            &registry,
            &container,
            foo_template,
            &three_items(),
            true,
            Some(&wrapper),
        );

        assert_eq!(spy.mounts().len(), 5);
        assert_eq!(items.len(), 3);
        assert_eq!(count_wrappers(&container, "bar"), 5);
    }

    #[test]
    fn test_render_items_with_nested_wrapper() {
        let (registry, spy, container) = mounted(TWO_WRAPPED_FOOS);
        let wrapper = create_html(
            r#"<div data-wrapper="bar">
                <span data-wrapper="bar-inner"></span>
            </div>"#,
        );

        let items = render_items(
            &registry,
            &container,
            foo_template,
            &three_items(),
            true,
            Some(&wrapper),
        );

        assert_eq!(spy.mounts().len(), 5);
        assert_eq!(items.len(), 3);

        let leaves = dom::query_by_attribute(&container, "data-wrapper", Some("bar-inner"));
        assert_eq!(leaves.len(), 3);
        for leaf in &leaves {
            assert_eq!(dom::element_children(leaf).len(), 1);
        }
    }
}
