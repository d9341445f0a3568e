#[cfg(test)]
mod tests {
    use crate::diagnostics::{Level, RecordingDiagnostics};
    use crate::dom;
    use crate::error::BindError;
    use crate::options::EngineOptions;
    use crate::reactive::Field;
    use crate::value::{Container, Value};
    use crate::Engine;
    use markup5ever_rcdom::{Handle, RcDom};
    use serde_json::json;
    use std::rc::Rc;

    struct Mounted {
        engine: Engine,
        // keeps the document node alive so attachment checks can reach it
        _document: RcDom,
        body: Handle,
        diagnostics: Rc<RecordingDiagnostics>,
    }

    fn mount(html: &str, data: serde_json::Value) -> Mounted {
        mount_with(html, data, EngineOptions::default())
    }

    fn mount_with(html: &str, data: serde_json::Value, options: EngineOptions) -> Mounted {
        let diagnostics = Rc::new(RecordingDiagnostics::new());
        let engine = Engine::with_options(data, options, diagnostics.clone()).unwrap();
        let document = dom::parse_html(html);
        let body = dom::body(&document).unwrap();
        Mounted {
            engine,
            _document: document,
            body,
            diagnostics,
        }
    }

    fn by_id(root: &Handle, id: &str) -> Handle {
        dom::find_matching(&format!("[id=\"{}\"]", id), root)
            .into_iter()
            .next()
            .unwrap()
    }

    fn texts(root: &Handle, selector: &str) -> Vec<String> {
        dom::find_matching(selector, root)
            .iter()
            .map(dom::text_content)
            .collect()
    }

    // ───────────────────────────────────────────────────────────────────────
    // Leaf, deep and template fan-out
    // ───────────────────────────────────────────────────────────────────────

    #[test]
    fn test_fan_out_reaches_every_dependent() {
        let m = mount(
            r#"<div id="a" ez-bind="a"></div><div id="ab" ez-bind="a.b"></div><div id="abc" ez-bind="a.b.c"></div><span id="d">``a.b.c.d``</span>"#,
            json!({"a": {"b": {"c": {"d": 0}}}}),
        );
        let report = m.engine.compile(&m.body);
        assert_eq!(report.deep, 3);
        assert_eq!(report.templates, 1);
        assert_eq!(dom::text_content(&by_id(&m.body, "d")), "0");

        assert!(m.engine.set_path("a.b.c.d", 1));

        assert_eq!(dom::text_content(&by_id(&m.body, "d")), "1");
        assert_eq!(dom::text_content(&by_id(&m.body, "abc")), r#"{"d":1}"#);
        assert_eq!(dom::text_content(&by_id(&m.body, "ab")), r#"{"c":{"d":1}}"#);
        assert_eq!(
            dom::text_content(&by_id(&m.body, "a")),
            r#"{"b":{"c":{"d":1}}}"#
        );
    }

    #[test]
    fn test_scalar_write_refreshes_deep_records_only() {
        let m = mount(
            r#"<div id="a" ez-bind="a"></div><div id="ab" ez-bind="a.b"></div><div id="abc" ez-bind="a.b.c"></div><span id="d">``a.b.c.d``</span>"#,
            json!({"a": {"b": {"c": {"d": 0}}}}),
        );
        m.engine.compile(&m.body);

        assert!(m.engine.set_path("a.b.c", 1));

        assert_eq!(dom::text_content(&by_id(&m.body, "abc")), "1");
        assert_eq!(dom::text_content(&by_id(&m.body, "ab")), r#"{"c":1}"#);
        assert_eq!(dom::text_content(&by_id(&m.body, "a")), r#"{"b":{"c":1}}"#);
        // a scalar has no descendants to refresh
        assert_eq!(dom::text_content(&by_id(&m.body, "d")), "0");
        assert_eq!(m.engine.stats().deep, 3);
    }

    #[test]
    fn test_replacing_an_ancestor_refreshes_descendant_bindings() {
        let m = mount(
            r#"<p id="name" ez-bind="user.name"></p><span id="greet">Hi ``user.name``!</span>"#,
            json!({"user": {"name": "Ada"}}),
        );
        m.engine.compile(&m.body);
        assert_eq!(dom::text_content(&by_id(&m.body, "greet")), "Hi Ada!");

        m.engine.set_path("user", json!({"name": "Grace"}));

        assert_eq!(dom::text_content(&by_id(&m.body, "name")), "Grace");
        assert_eq!(dom::text_content(&by_id(&m.body, "greet")), "Hi Grace!");
    }

    #[test]
    fn test_empty_string_renders_empty() {
        let m = mount(
            r#"<span id="greet">Hi ``user.name``!</span><p id="name" ez-bind="user.name"></p>"#,
            json!({"user": {"name": "Ada"}}),
        );
        m.engine.compile(&m.body);

        assert!(m.engine.set_path("user.name", ""));

        assert_eq!(dom::text_content(&by_id(&m.body, "greet")), "Hi !");
        assert_eq!(dom::text_content(&by_id(&m.body, "name")), "");
    }

    #[test]
    fn test_array_delete_refreshes_shifted_indices() {
        let m = mount(
            r#"<p id="first" ez-bind="items[0]"></p><p id="second" ez-bind="items[1]"></p><p id="third" ez-bind="items[2]"></p><span id="t">``items[1]``</span>"#,
            json!({"items": ["a", "b", "c"]}),
        );
        m.engine.compile(&m.body);
        assert_eq!(dom::text_content(&by_id(&m.body, "second")), "b");

        assert!(m.engine.delete_path("items[0]"));

        assert_eq!(dom::text_content(&by_id(&m.body, "first")), "b");
        assert_eq!(dom::text_content(&by_id(&m.body, "second")), "c");
        assert_eq!(dom::text_content(&by_id(&m.body, "third")), "");
        assert_eq!(dom::text_content(&by_id(&m.body, "t")), "c");
        assert_eq!(m.engine.snapshot(), json!({"items": ["b", "c"]}));
    }

    #[test]
    fn test_dotted_index_matches_bracketed_writes() {
        let m = mount(
            r#"<p id="dotted" ez-bind="items.0"></p><span id="t">``items.1.name``</span>"#,
            json!({"items": ["a", {"name": "x"}]}),
        );
        m.engine.compile(&m.body);
        assert_eq!(dom::text_content(&by_id(&m.body, "dotted")), "a");
        assert_eq!(dom::text_content(&by_id(&m.body, "t")), "x");

        m.engine.set_path("items[0]", "z");
        m.engine.set_path("items[1].name", "y");

        assert_eq!(dom::text_content(&by_id(&m.body, "dotted")), "z");
        assert_eq!(dom::text_content(&by_id(&m.body, "t")), "y");
    }

    #[test]
    fn test_alias_paths_all_update() {
        let m = mount(
            r#"<span id="l">``left.name``</span><span id="r">``right.name``</span>"#,
            json!({}),
        );
        let shared = Container::object();
        let root = m.engine.root();
        root.set("left", Value::Container(shared.clone()));
        root.set("right", Value::Container(shared));
        m.engine.compile(&m.body);

        let left = m.engine.get_path("left").unwrap();
        left.as_node().unwrap().set("name", "Bob");

        assert_eq!(dom::text_content(&by_id(&m.body, "l")), "Bob");
        assert_eq!(dom::text_content(&by_id(&m.body, "r")), "Bob");
    }

    #[test]
    fn test_template_interpolation() {
        let m = mount(
            r#"<a id="link" title="Profile of ``user.name``">``user.name`` (``user.age``)</a>"#,
            json!({"user": {"name": "Ada", "age": 36}}),
        );
        let report = m.engine.compile(&m.body);
        assert_eq!(report.templates, 2);

        let link = by_id(&m.body, "link");
        assert_eq!(dom::text_content(&link), "Ada (36)");
        assert_eq!(
            dom::get_attribute(&link, "title").as_deref(),
            Some("Profile of Ada")
        );

        assert!(m.engine.delete_path("user.name"));
        assert_eq!(dom::text_content(&link), " (36)");
        assert_eq!(dom::get_attribute(&link, "title").as_deref(), Some("Profile of "));
    }

    #[test]
    fn test_attribute_bindings() {
        let m = mount(
            r#"<button id="b" ez-bind:disabled="busy" ez-bind:title="label"></button>"#,
            json!({"busy": false, "label": "Go"}),
        );
        let report = m.engine.compile(&m.body);
        assert_eq!(report.leaves, 2);

        let button = by_id(&m.body, "b");
        assert!(!dom::has_attribute(&button, "disabled"));
        assert_eq!(dom::get_attribute(&button, "title").as_deref(), Some("Go"));

        m.engine.set_path("busy", true);
        assert_eq!(dom::get_attribute(&button, "disabled").as_deref(), Some(""));

        m.engine.set_path("label", Value::Null);
        assert!(!dom::has_attribute(&button, "title"));
    }

    #[test]
    fn test_compiling_twice_binds_nothing_new() {
        let m = mount(
            r#"<p ez-bind="a"></p><span>``a``</span><ul><li ez-for="list">``.``</li></ul>"#,
            json!({"a": 1, "list": [1, 2]}),
        );
        let first = m.engine.compile(&m.body);
        assert_eq!(first.repeats, 1);
        let stats = m.engine.stats();

        let second = m.engine.compile(&m.body);
        assert_eq!(second.total(), 0);
        assert_eq!(m.engine.stats(), stats);
    }

    // ───────────────────────────────────────────────────────────────────────
    // Repeats
    // ───────────────────────────────────────────────────────────────────────

    #[test]
    fn test_repeat_renders_in_array_order() {
        let m = mount(
            r#"<ul id="list"><li ez-for="items">``name``</li></ul>"#,
            json!({"items": [{"name": "x"}, {"name": "y"}, {"name": "z"}]}),
        );
        let report = m.engine.compile(&m.body);
        assert_eq!(report.repeats, 1);

        let list = by_id(&m.body, "list");
        assert_eq!(texts(&list, "li"), vec!["x", "y", "z"]);
        assert!(dom::find_matching("[ez-for]", &list).is_empty());

        m.engine.set_path("items[1].name", "why");
        assert_eq!(texts(&list, "li"), vec!["x", "why", "z"]);
    }

    #[test]
    fn test_repeat_rebuild_waits_for_turn_end() {
        let m = mount(
            r#"<ul id="list"><li ez-for="items">``name``</li></ul>"#,
            json!({"items": [{"name": "x"}]}),
        );
        m.engine.compile(&m.body);
        let list = by_id(&m.body, "list");

        let items = m.engine.get_path("items").unwrap();
        items.as_node().unwrap().push(json!({"name": "y"}));

        assert_eq!(texts(&list, "li"), vec!["x"]);
        assert_eq!(m.engine.pending_rebuilds(), 1);

        assert_eq!(m.engine.flush(), 1);
        assert_eq!(texts(&list, "li"), vec!["x", "y"]);
        assert_eq!(m.engine.pending_rebuilds(), 0);
    }

    #[test]
    fn test_repeat_rebuilds_coalesce_within_a_turn() {
        let m = mount(
            r#"<ul id="list"><li ez-for="items">``name``</li></ul>"#,
            json!({"items": [{"name": "a"}, {"name": "b"}]}),
        );
        m.engine.compile(&m.body);
        let list = by_id(&m.body, "list");

        m.engine.set_path("items[0].name", "a2");
        m.engine.set_path("items[1].name", "b2");
        m.engine.set_path("items", json!([{"name": "p"}, {"name": "q"}, {"name": "r"}]));
        assert_eq!(m.engine.pending_rebuilds(), 1);

        assert_eq!(m.engine.flush(), 1);
        assert_eq!(m.engine.turns(), 1);
        assert_eq!(texts(&list, "li"), vec!["p", "q", "r"]);
    }

    #[test]
    fn test_nested_repeat_paths_stay_relative_to_inner_item() {
        let m = mount(
            r#"<div id="groups"><section ez-for="groups"><h2>``title``</h2><i ez-for="tags">``.``</i></section></div>"#,
            json!({"groups": [
                {"title": "A", "tags": ["x", "y"]},
                {"title": "B", "tags": ["z"]}
            ]}),
        );
        m.engine.compile(&m.body);
        let groups = by_id(&m.body, "groups");

        assert_eq!(texts(&groups, "h2"), vec!["A", "B"]);
        assert_eq!(texts(&groups, "i"), vec!["x", "y", "z"]);

        m.engine.set_path("groups[1].tags[0]", "zz");
        assert_eq!(texts(&groups, "i"), vec!["x", "y", "zz"]);
    }

    #[test]
    fn test_repeat_over_non_array_renders_nothing() {
        let m = mount(
            r#"<ul id="list"><li ez-for="items">``.``</li></ul>"#,
            json!({"items": "oops"}),
        );
        m.engine.compile(&m.body);

        assert!(texts(&by_id(&m.body, "list"), "li").is_empty());
        assert!(m.diagnostics.contains("repeat source is not an array"));
    }

    #[test]
    fn test_settle_drains_every_turn() {
        let m = mount(
            r#"<ul id="list"><li ez-for="items">``.``</li></ul>"#,
            json!({"items": [1]}),
        );
        m.engine.compile(&m.body);
        m.engine.set_path("items[1]", 2);

        assert_eq!(m.engine.settle(), 1);
        assert_eq!(texts(&by_id(&m.body, "list"), "li"), vec!["1", "2"]);
        assert_eq!(m.engine.settle(), 0);
    }

    // ───────────────────────────────────────────────────────────────────────
    // Select models
    // ───────────────────────────────────────────────────────────────────────

    fn select_fixture() -> Mounted {
        mount(
            r#"<select id="s" ez-bind="choice"></select>"#,
            json!({"choice": {
                "selectedValue": "b",
                "options": [["a", true], ["b", true], ["c", false]]
            }}),
        )
    }

    #[test]
    fn test_select_model_renders_options() {
        let m = select_fixture();
        let report = m.engine.compile(&m.body);
        assert_eq!(report.deep, 1);
        assert_eq!(report.listeners, 1);

        let select = by_id(&m.body, "s");
        let options = dom::options(&select);
        assert_eq!(options.len(), 3);
        assert!(dom::has_attribute(&options[2], "disabled"));
        assert!(!dom::has_attribute(&options[0], "disabled"));
        assert_eq!(dom::read_value(&select), "b");
    }

    #[test]
    fn test_select_disabled_value_clears_with_warning() {
        let m = select_fixture();
        m.engine.compile(&m.body);
        let select = by_id(&m.body, "s");

        m.engine.set_path("choice.selectedValue", "c");
        assert_eq!(dom::read_value(&select), "b");
        assert_eq!(m.engine.flush(), 1);

        assert_eq!(dom::read_value(&select), "");
        assert!(m.diagnostics.count_at(Level::Warn) >= 1);
        assert!(m.diagnostics.contains("not an enabled option"));
    }

    #[test]
    fn test_select_write_back_updates_selected_value_only() {
        let m = select_fixture();
        m.engine.compile(&m.body);
        let select = by_id(&m.body, "s");

        assert!(dom::select_option(&select, "a"));
        assert!(m.engine.dispatch_change(&select));

        assert_eq!(
            m.engine.get_path("choice.selectedValue").unwrap().display(),
            "a"
        );
        // the element was flagged while writing, so nothing was queued for it
        assert_eq!(m.engine.pending_rebuilds(), 0);
        assert_eq!(dom::options(&select).len(), 3);
    }

    #[test]
    fn test_select_missing_options_warns() {
        let m = mount(
            r#"<select id="s" ez-bind="choice"></select>"#,
            json!({"choice": {"selectedValue": "a", "options": [["a", true]]}}),
        );
        m.engine.compile(&m.body);
        m.engine.delete_path("choice.options");
        m.engine.flush();

        assert!(m.diagnostics.contains("object with an `options` array"));
    }

    #[test]
    fn test_select_model_assigned_after_compile() {
        let m = mount(r#"<select id="s" ez-bind="choice"></select>"#, json!({}));
        let report = m.engine.compile(&m.body);
        assert_eq!(report.deep, 1);
        assert_eq!(report.leaves, 0);

        m.engine.set_path(
            "choice",
            json!({"selectedValue": "b", "options": [["a", true], ["b", true]]}),
        );
        m.engine.settle();

        let select = by_id(&m.body, "s");
        assert_eq!(dom::options(&select).len(), 2);
        assert_eq!(dom::read_value(&select), "b");
        let stats = m.engine.stats();
        assert_eq!(stats.deep, 1);
        assert_eq!(stats.leaf, 0);
    }

    #[test]
    fn test_select_bound_to_scalar_picks_an_option() {
        let m = mount(
            r#"<select id="s" ez-bind="size"><option value="s">S</option><option value="m">M</option></select>"#,
            json!({"size": "s"}),
        );
        m.engine.compile(&m.body);
        let select = by_id(&m.body, "s");
        assert_eq!(dom::read_value(&select), "s");

        m.engine.set_path("size", "m");
        m.engine.settle();

        assert_eq!(dom::read_value(&select), "m");
        assert_eq!(dom::options(&select).len(), 2);
    }

    // ───────────────────────────────────────────────────────────────────────
    // Write-back, liveness and compaction
    // ───────────────────────────────────────────────────────────────────────

    #[test]
    fn test_input_write_back_keeps_numbers_numeric() {
        let m = mount(r#"<input id="n" ez-bind="count">"#, json!({"count": 1}));
        m.engine.compile(&m.body);
        let input = by_id(&m.body, "n");
        assert_eq!(dom::read_value(&input), "1");

        dom::set_attribute(&input, "value", "41");
        assert!(m.engine.dispatch_change(&input));

        match m.engine.get_path("count") {
            Some(Field::Value(Value::Number(n))) => assert_eq!(n.as_i64(), Some(41)),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(m.engine.snapshot(), json!({"count": 41}));
    }

    #[test]
    fn test_dispatch_change_without_listener() {
        let m = mount(r#"<p id="p" ez-bind="a"></p>"#, json!({"a": "x"}));
        m.engine.compile(&m.body);
        assert!(!m.engine.dispatch_change(&by_id(&m.body, "p")));
    }

    #[test]
    fn test_detached_nodes_are_never_written() {
        let m = mount(r#"<p id="p" ez-bind="title"></p>"#, json!({"title": "one"}));
        m.engine.compile(&m.body);
        let paragraph = by_id(&m.body, "p");
        assert_eq!(dom::text_content(&paragraph), "one");

        dom::detach(&paragraph);
        m.engine.set_path("title", "two");

        assert_eq!(dom::text_content(&paragraph), "one");
        assert_eq!(m.engine.stats().leaf, 1);
    }

    #[test]
    fn test_failed_apply_does_not_block_siblings() {
        let m = mount(
            r#"<img id="i" ez-bind="title"><p id="p" ez-bind="title"></p><span id="s">``title``</span>"#,
            json!({"title": "one"}),
        );
        m.engine.compile(&m.body);
        assert!(m.diagnostics.contains("<img> cannot hold a value"));
        let errors = m.diagnostics.count_at(Level::Error);

        m.engine.set_path("title", "two");

        assert_eq!(dom::text_content(&by_id(&m.body, "p")), "two");
        assert_eq!(dom::text_content(&by_id(&m.body, "s")), "two");
        assert_eq!(m.diagnostics.count_at(Level::Error), errors + 1);
    }

    #[test]
    fn test_repeat_on_a_detached_element_reports_an_error() {
        let m = mount("", json!({"items": [1, 2]}));
        let item = dom::create_element("li");
        dom::set_attribute(&item, "ez-for", "items");

        let report = m.engine.compile(&item);

        assert_eq!(report.repeats, 1);
        assert_eq!(m.diagnostics.count_at(Level::Error), 1);
        assert!(m.diagnostics.contains("is detached"));
    }

    #[test]
    fn test_compact_drops_only_detached_records() {
        let m = mount(
            r#"<p id="gone" ez-bind="a"></p><p id="kept" ez-bind="b"></p>"#,
            json!({"a": 1, "b": 2}),
        );
        m.engine.compile(&m.body);
        assert_eq!(m.engine.stats().leaf, 2);

        dom::detach(&by_id(&m.body, "gone"));
        assert_eq!(m.engine.compact(), 1);
        assert_eq!(m.engine.stats().leaf, 1);

        m.engine.set_path("b", 3);
        assert_eq!(dom::text_content(&by_id(&m.body, "kept")), "3");
        assert_eq!(m.engine.compact(), 0);
    }

    #[test]
    fn test_compact_after_repeat_rebuild() {
        let m = mount(
            r#"<ul><li ez-for="items">``.``</li></ul>"#,
            json!({"items": [1, 2]}),
        );
        m.engine.compile(&m.body);
        assert_eq!(m.engine.stats().template, 2);

        m.engine.set_path("items", json!([3, 4]));
        m.engine.flush();
        assert_eq!(m.engine.stats().template, 4);

        assert_eq!(m.engine.compact(), 2);
        assert_eq!(m.engine.stats().template, 2);
    }

    // ───────────────────────────────────────────────────────────────────────
    // Construction and options
    // ───────────────────────────────────────────────────────────────────────

    #[test]
    fn test_non_object_root_is_replaced() {
        let diagnostics = Rc::new(RecordingDiagnostics::new());
        let engine =
            Engine::with_options(json!([1, 2]), EngineOptions::default(), diagnostics.clone())
                .unwrap();
        assert_eq!(engine.snapshot(), json!({}));
        assert_eq!(diagnostics.count_at(Level::Warn), 1);
    }

    #[test]
    fn test_set_path_needs_a_container_parent() {
        let m = mount("", json!({"a": 1}));
        assert!(!m.engine.set_path("a.b", 2));
        assert!(!m.engine.set_path("", 2));
        assert!(m.engine.set_path("c", 3));
        assert_eq!(m.engine.snapshot(), json!({"a": 1, "c": 3}));
    }

    #[test]
    fn test_custom_options() {
        let options =
            EngineOptions::from_json_str(r#"{"bindAttribute": "data-bind", "templateDelimiter": "%%"}"#)
                .unwrap();
        assert_eq!(options.repeat_attribute, "ez-for");

        let m = mount_with(
            r#"<p id="p" data-bind="a"></p><span id="s">Hi %%a%%</span><i id="i" ez-bind="a"></i>"#,
            json!({"a": "there"}),
            options,
        );
        m.engine.compile(&m.body);

        assert_eq!(dom::text_content(&by_id(&m.body, "p")), "there");
        assert_eq!(dom::text_content(&by_id(&m.body, "s")), "Hi there");
        assert_eq!(dom::text_content(&by_id(&m.body, "i")), "");
    }

    #[test]
    fn test_invalid_options_are_rejected() {
        let options = EngineOptions {
            repeat_attribute: "ez-bind".to_string(),
            ..Default::default()
        };
        let result = Engine::with_options(json!({}), options, Rc::new(RecordingDiagnostics::new()));
        assert!(matches!(result, Err(BindError::Options(_))));

        assert!(EngineOptions::from_json_str(r#"{"maxSettleTurns": 0}"#).is_err());
        assert!(EngineOptions::from_json_str("not json").is_err());
    }
}
