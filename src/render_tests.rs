#[cfg(test)]
mod tests {
    use crate::config::InterpreterConfig;
    use crate::renderer::NoComponents;
    use crate::tree::{RenderedNode, TreeRenderer};
    use crate::value::Value;
    use crate::view::SchemaView;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn render_tree(schema: serde_json::Value) -> RenderedNode {
        let view = SchemaView::from_json(
            &schema.to_string(),
            TreeRenderer,
            NoComponents,
            InterpreterConfig::default(),
        )
        .unwrap();
        view.render().unwrap().unwrap()
    }

    fn render(schema: serde_json::Value) -> String {
        render_tree(schema).to_html()
    }

    #[test]
    fn test_tag_without_attributes() {
        assert_eq!(render(json!({ "component": "h1" })), "<h1></h1>");
    }

    #[test]
    fn test_class_string_array_and_object_forms() {
        assert_eq!(
            render(json!({ "component": "h1", "class": "myClass" })),
            r#"<h1 class="myClass"></h1>"#
        );
        assert_eq!(
            render(json!({ "component": "h1", "class": ["myArrClass"] })),
            r#"<h1 class="myArrClass"></h1>"#
        );
        assert_eq!(
            render(json!({ "component": "h1", "class": { "myObjClass": true, "off": false } })),
            r#"<h1 class="myObjClass"></h1>"#
        );
    }

    #[test]
    fn test_static_style() {
        assert_eq!(
            render(json!({ "component": "h1", "style": { "color": "red" } })),
            r#"<h1 style="color: red;"></h1>"#
        );
    }

    #[test]
    fn test_attrs_on_void_element() {
        assert_eq!(
            render(json!({ "component": "input", "attrs": { "id": "id" } })),
            r#"<input id="id">"#
        );
    }

    #[test]
    fn test_dom_props_are_carried_but_value_is_not_reflected() {
        let tree = render_tree(json!({
            "component": "input",
            "domProps": { "value": "propValue" }
        }));
        assert_eq!(tree.dom_props["value"], Value::from("propValue"));
        assert_eq!(tree.to_html(), "<input>");
    }

    #[test]
    fn test_ref_is_carried() {
        let tree = render_tree(json!({ "component": "input", "ref": "ref" }));
        assert_eq!(tree.reference.as_deref(), Some("ref"));
        assert_eq!(tree.to_html(), "<input>");
    }

    #[test]
    fn test_inner_text() {
        assert_eq!(
            render(json!({ "component": "div", "text": "Some Text" })),
            "<div>Some Text</div>"
        );
    }

    #[test]
    fn test_nested_children() {
        let schema = json!({
            "component": "div",
            "children": [
                {
                    "component": "span",
                    "children": [{ "component": "b", "text": "text" }]
                },
                { "component": "a", "text": "link" }
            ]
        });
        assert_eq!(
            render(schema),
            "<div><span><b>text</b></span><a>link</a></div>"
        );
    }

    #[test]
    fn test_text_wins_over_children() {
        let schema = json!({
            "component": "p",
            "text": "plain",
            "children": [{ "component": "b" }]
        });
        assert_eq!(render(schema), "<p>plain</p>");
    }

    #[test]
    fn test_html_is_not_escaped() {
        let schema = json!({
            "component": "div",
            "namespace": "root",
            "data": { "markup": "<b>bold</b>" },
            ":html": "root.markup"
        });
        assert_eq!(render(schema), "<div><b>bold</b></div>");
    }

    #[test]
    fn test_bound_props_and_nested_data() {
        let tree = render_tree(json!({
            "component": "section",
            "namespace": "root",
            "data": {
                "myData": "storageValue",
                "myNestedData": { "more": { "value": "nestedValue" } }
            },
            "props": {
                ":myProp": "root.myData",
                ":myNestedProp": "root.myNestedData.more.value"
            }
        }));
        assert_eq!(tree.props["myProp"], Value::from("storageValue"));
        assert_eq!(tree.props["myNestedProp"], Value::from("nestedValue"));
    }

    #[test]
    fn test_bound_class_forms() {
        let bound = |class: serde_json::Value| {
            render_tree(json!({
                "component": "div",
                "namespace": "root",
                "data": { "class": class },
                ":class": "root.class"
            }))
            .class
        };
        assert_eq!(bound(json!("boundClass")), vec!["boundClass"]);
        assert_eq!(bound(json!(["boundClass", "more"])), vec!["boundClass", "more"]);
        assert_eq!(
            bound(json!({ "boundClass": true, "more": true, "notThere": false })),
            vec!["boundClass", "more"]
        );
    }

    #[test]
    fn test_bound_class_merges_after_static() {
        let tree = render_tree(json!({
            "component": "div",
            "namespace": "root",
            "data": { "class": { "boundClass": true } },
            "class": "staticClass",
            ":class": "root.class"
        }));
        assert_eq!(tree.class, vec!["staticClass", "boundClass"]);
    }

    #[test]
    fn test_bound_style_attrs_dom_props_and_text() {
        let tree = render_tree(json!({
            "component": "div",
            "namespace": "root",
            "data": { "style": "red", "id": "boundId", "text": "text content", "value": "v" },
            "style": { ":color": "root.style" },
            "attrs": { ":id": "root.id" },
            "domProps": { ":value": "root.value" },
            ":text": "root.text"
        }));
        assert_eq!(tree.dom_props["value"], Value::from("v"));
        assert_eq!(
            tree.to_html(),
            r#"<div style="color: red;" id="boundId">text content</div>"#
        );
    }

    #[test]
    fn test_spread_merges_over_entries() {
        let schema = json!({
            "component": "div",
            "namespace": "root",
            "data": { "extra": { "id": "spread", "title": "t" } },
            "attrs": { "id": "entry" },
            ":attrs": "root.extra"
        });
        assert_eq!(render(schema), r#"<div id="spread" title="t"></div>"#);
    }

    #[test]
    fn test_spread_must_be_an_object() {
        let view = SchemaView::from_json(
            &json!({
                "component": "div",
                "namespace": "root",
                "data": { "style": "red" },
                ":style": "root.style"
            })
            .to_string(),
            TreeRenderer,
            NoComponents,
            InterpreterConfig::default(),
        )
        .unwrap();
        let err = view.render().unwrap_err();
        assert!(matches!(err, crate::error::Error::ExpressionType { .. }));
    }

    #[test]
    fn test_falsy_values_are_present() {
        let schema = json!({
            "component": "span",
            "namespace": "root",
            "data": { "count": 0, "flag": false },
            ":text": "root.count",
            "attrs": { ":data-flag": "root.flag" }
        });
        assert_eq!(render(schema), "<span>0</span>");
    }

    #[test]
    fn test_static_if() {
        let child = |condition: bool| {
            render(json!({
                "component": "div",
                "namespace": "key",
                "children": { "component": "span", "namespace": "childHidden", "if": condition }
            }))
        };
        assert_eq!(child(true), "<div><span></span></div>");
        assert_eq!(child(false), "<div></div>");
    }

    #[test]
    fn test_bound_if() {
        let child = |render_flag: bool| {
            render(json!({
                "component": "div",
                "namespace": "key",
                "children": {
                    "component": "span",
                    "namespace": "childHidden",
                    ":if": "childHidden.render",
                    "data": { "render": render_flag }
                }
            }))
        };
        assert_eq!(child(true), "<div><span></span></div>");
        assert_eq!(child(false), "<div></div>");
    }

    #[test]
    fn test_static_and_bound_show() {
        assert_eq!(
            render(json!({
                "component": "div",
                "children": { "component": "span", "show": false }
            })),
            r#"<div><span style="display: none;"></span></div>"#
        );
        assert_eq!(
            render(json!({
                "component": "div",
                "children": {
                    "component": "span",
                    "namespace": "childHidden",
                    ":show": "childHidden.render",
                    "data": { "render": true }
                }
            })),
            "<div><span></span></div>"
        );
    }

    #[test]
    fn test_hidden_display_overrides_and_goes_last() {
        let schema = json!({
            "component": "span",
            "style": { "display": "block", "color": "red" },
            "show": false
        });
        assert_eq!(
            render(schema),
            r#"<span style="color: red; display: none;"></span>"#
        );
    }

    #[test]
    fn test_omitted_root_renders_nothing() {
        let view = SchemaView::from_json(
            r#"{"component": "div", "if": false}"#,
            TreeRenderer,
            NoComponents,
            InterpreterConfig::default(),
        )
        .unwrap();
        assert!(view.render().unwrap().is_none());
    }
}
