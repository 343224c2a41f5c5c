#[cfg(test)]
mod tests {
    use crate::binding::Expression;
    use crate::config::InterpreterConfig;
    use crate::error::Error;
    use crate::renderer::NoComponents;
    use crate::tree::TreeRenderer;
    use crate::value::Value;
    use crate::view::SchemaView;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn view_with(schema: serde_json::Value, enabled: bool) -> SchemaView<TreeRenderer> {
        SchemaView::from_json(
            &schema.to_string(),
            TreeRenderer,
            NoComponents,
            InterpreterConfig::new().with_expression_execution(enabled),
        )
        .unwrap()
    }

    fn render(schema: serde_json::Value) -> String {
        view_with(schema, true).render().unwrap().unwrap().to_html()
    }

    #[test]
    fn test_disabled_expressions_render_verbatim() {
        let view = view_with(
            json!({ "namespace": "key", "component": "div", ":text": "|> \"Test\"" }),
            false,
        );
        assert_eq!(
            view.render().unwrap().unwrap().to_html(),
            "<div>|&gt; \"Test\"</div>"
        );
    }

    #[test]
    fn test_disabled_expressions_are_never_parsed() {
        let view = view_with(
            json!({ "component": "div", ":text": "|> this is ( not js" }),
            false,
        );
        assert_eq!(
            view.render().unwrap().unwrap().to_html(),
            "<div>|&gt; this is ( not js</div>"
        );
    }

    #[test]
    fn test_string_literal() {
        assert_eq!(
            render(json!({ "namespace": "key", "component": "div", ":text": "|> \"Test\"" })),
            "<div>Test</div>"
        );
    }

    #[test]
    fn test_store_access() {
        let schema = json!({
            "namespace": "namespace",
            "component": "div",
            "data": { "myData": "Test data" },
            ":text": "|> namespace.myData"
        });
        assert_eq!(render(schema), "<div>Test data</div>");
    }

    #[test]
    fn test_parent_namespace_is_visible() {
        let schema = json!({
            "namespace": "parent",
            "component": "div",
            "data": { "shouldNotBeAccessed": "Test data" },
            "children": {
                "namespace": "child",
                "component": "div",
                ":text": "|> parent.shouldNotBeAccessed"
            }
        });
        assert_eq!(render(schema), "<div><div>Test data</div></div>");
    }

    #[test]
    fn test_sibling_namespace_is_not_defined() {
        let view = view_with(
            json!({
                "namespace": "parent",
                "component": "div",
                "children": [
                    {
                        "namespace": "child1",
                        "component": "div",
                        "data": { "shouldNotBeAccessed": "Test data" }
                    },
                    {
                        "namespace": "child2",
                        "component": "div",
                        ":text": "|> child1.shouldNotBeAccessed"
                    }
                ]
            }),
            true,
        );
        let err = view.render().unwrap_err();
        assert_eq!(err.to_string(), "child1 is not defined");
    }

    #[test]
    fn test_globals_are_unreachable() {
        let view = view_with(
            json!({ "component": "div", ":text": "|> window.location" }),
            true,
        );
        assert_eq!(
            view.render().unwrap_err(),
            Error::ExpressionReferenceFault {
                identifier: "window".to_string()
            }
        );
    }

    #[test]
    fn test_click_mutates_parent_and_rerenders() {
        let view = view_with(
            json!({
                "namespace": "parent",
                "component": "div",
                "data": { "myData": "Test data" },
                "children": {
                    "namespace": "child",
                    "component": "div",
                    "domProps": { "id": "child" },
                    "on": { ":click": "|> () => {parent.myData = \"altered\"}" },
                    ":text": "parent.myData"
                }
            }),
            true,
        );
        let tree = view.render().unwrap().unwrap();
        assert_eq!(tree.to_html(), r#"<div><div id="child">Test data</div></div>"#);
        assert!(!view.is_dirty());

        let child = &tree.children[0];
        child.trigger("click", &[]).unwrap();
        assert!(view.is_dirty());

        assert_eq!(
            view.render().unwrap().unwrap().to_html(),
            r#"<div><div id="child">altered</div></div>"#
        );
    }

    #[test]
    fn test_expression_listener_returns_non_function_result() {
        let view = view_with(
            json!({
                "namespace": "root",
                "component": "button",
                "data": { "count": 1 },
                "on": { ":click": "|> root.count + 1" }
            }),
            true,
        );
        let tree = view.render().unwrap().unwrap();
        assert_eq!(tree.trigger("click", &[]).unwrap(), Value::Number(2.0));
    }

    #[test]
    fn test_compound_assignment_through_listener() {
        let view = view_with(
            json!({
                "namespace": "root",
                "component": "button",
                "data": { "count": 1 },
                "on": { ":click": "|> () => root.count += 2" },
                ":text": "root.count"
            }),
            true,
        );
        let tree = view.render().unwrap().unwrap();
        tree.trigger("click", &[]).unwrap();
        tree.trigger("click", &[]).unwrap();
        assert_eq!(
            view.render().unwrap().unwrap().to_html(),
            "<button>5</button>"
        );
    }

    #[test]
    fn test_loop_binding_inside_expression() {
        let schema = json!({
            "namespace": "root",
            "component": "ul",
            "children": {
                "namespace": "item",
                "component": "li",
                "for": ["a", "b"],
                ":text": "|> `${item.$for.index}:${item.$for.value}`"
            }
        });
        assert_eq!(render(schema), "<ul><li>0:a</li><li>1:b</li></ul>");
    }

    #[test]
    fn test_syntax_error_is_reported_at_evaluation() {
        let view = view_with(
            json!({ "component": "div", ":text": "|> (1 + " }),
            true,
        );
        assert!(matches!(
            view.render().unwrap_err(),
            Error::ExpressionSyntax { .. }
        ));
    }

    #[test]
    fn test_dependencies_are_namespace_identifiers() {
        let expression = Expression::new("|> (event) => parent.value = event.target.value + other.x");
        let compiled = expression.compiled().unwrap();
        assert_eq!(compiled.dependencies().to_vec(), vec!["parent", "other"]);
        assert_eq!(compiled.source(), "(event) => parent.value = event.target.value + other.x");
    }
}
