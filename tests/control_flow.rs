use std::collections::BTreeMap;

use shimmypebble::{Context, Engine, Error, MemoryLoader, StringLoader, Value};

fn render(source: &str, context: &Context) -> shimmypebble::Result<String> {
    Engine::new(StringLoader).compile(source)?.render(context)
}

#[test]
fn text_without_tags_is_returned_verbatim() {
    let source = "Dear {name},\n\n  100% of 3 > 2 }} and %} stay put.\n";
    assert_eq!(render(source, &Context::new().with("name", "x")).unwrap(), source);
}

#[test]
fn operator_precedence() {
    let ctx = Context::new();
    assert_eq!(render("{{ 1 + 2 * 3 }}", &ctx).unwrap(), "7");
    assert_eq!(render("{{ 10 - 4 - 3 }}", &ctx).unwrap(), "3");
    assert_eq!(render("{{ 7 / 2 }} {{ 8 / 2 }} {{ 7 % 4 }}", &ctx).unwrap(), "3.5 4 3");
    assert_eq!(render("{{ 1 < 2 and 3 >= 3 }} {{ not 1 == 1 or false }}", &ctx).unwrap(), "true false");
    assert_eq!(render("{{ 'n=' + 4 }}", &ctx).unwrap(), "n=4");
}

#[test]
fn if_elseif_else() {
    let source = "{% if n > 10 %}big{% elseif n > 5 %}medium{% else %}small{% endif %}";
    for (n, expected) in [(20, "big"), (7, "medium"), (1, "small")] {
        assert_eq!(render(source, &Context::new().with("n", n)).unwrap(), expected);
    }
}

#[test]
fn for_binds_loop_metadata() {
    let source = "{% for item in items %}{{ loop.index }}:{{ item }}{% if loop.first %}(first){% endif %}{% if loop.last %}(last){% endif %}{% if not loop.last %},{% endif %}{% endfor %}";
    let ctx = Context::new().with("items", vec!["a", "b", "c"]);
    assert_eq!(render(source, &ctx).unwrap(), "0:a(first),1:b,2:c(last)");

    let ctx = Context::new().with("items", vec!["x", "y"]);
    assert_eq!(
        render("{% for i in items %}{{ loop.revindex }}/{{ loop.length }} {% endfor %}", &ctx).unwrap(),
        "1/2 0/2 "
    );
}

#[test]
fn for_else_renders_once_when_empty() {
    let source = "{% for x in items %}[{{ x }}]{% else %}none{% endfor %}";
    let empty: Vec<Value> = Vec::new();
    assert_eq!(render(source, &Context::new().with("items", empty)).unwrap(), "none");
    assert_eq!(render(source, &Context::new()).unwrap(), "none");
    assert_eq!(render(source, &Context::new().with("items", vec![1, 2])).unwrap(), "[1][2]");
}

#[test]
fn for_over_maps_with_key_and_value() {
    let mut scores = BTreeMap::new();
    scores.insert("bob".to_string(), Value::Int(3));
    scores.insert("amy".to_string(), Value::Int(5));
    let ctx = Context::new().with("scores", scores);
    assert_eq!(
        render("{% for name, score in scores %}{{ name }}={{ score }};{% endfor %}", &ctx).unwrap(),
        "amy=5;bob=3;"
    );
}

#[test]
fn for_over_a_scalar_is_a_render_error() {
    let err = render("{% for x in 5 %}{% endfor %}", &Context::new()).unwrap_err();
    assert!(matches!(err, Error::Render { .. }));
}

#[test]
fn loop_scope_does_not_leak() {
    let source = "{% for x in [1, 2] %}{% set last = x %}{% endfor %}[{{ last }}][{{ x }}]";
    assert_eq!(render(source, &Context::new()).unwrap(), "[][]");
}

#[test]
fn set_binds_in_current_scope() {
    let source = "{% set greeting = 'Hello ' + name %}{{ greeting }}!";
    assert_eq!(render(source, &Context::new().with("name", "World")).unwrap(), "Hello World!");
}

#[test]
fn nested_map_literal_inside_print() {
    assert_eq!(render("{{ {'a': {'b': 1}} }}", &Context::new()).unwrap(), "{a: {b: 1}}");
    assert_eq!(render("{{ {'a': {'b': 1}}.a.b }}", &Context::new()).unwrap(), "1");
}

#[test]
fn integer_literals_past_i64_degrade_to_floats() {
    let ctx = Context::new();
    assert_eq!(render("{{ -9223372036854775808 < 0 }}", &ctx).unwrap(), "true");
    assert_eq!(render("{{ 9223372036854775808 > 1 }}", &ctx).unwrap(), "true");
}

#[test]
fn attribute_and_index_access() {
    let ctx = Context::new().with(
        "user",
        Value::from(serde_json::json!({"name": "ada", "roles": ["admin", "dev"]})),
    );
    assert_eq!(
        render("{{ user.name }} {{ user['roles'][1] }} {{ user.missing }}|", &ctx).unwrap(),
        "ada dev |"
    );
}

#[test]
fn macros_render_with_their_own_scope() {
    let source = "{% macro greet(who, punct) %}Hi {{ who }}{{ punct | default('.') }}{{ outer }}{% endmacro %}{{ greet('Bob') }} {{ greet('Amy', '!') }}";
    assert_eq!(render(source, &Context::new().with("outer", "LEAK")).unwrap(), "Hi Bob. Hi Amy!");
}

#[test]
fn macros_may_recurse() {
    let source = "{% macro down(n) %}{{ n }}{% if n > 0 %}{{ down(n - 1) }}{% endif %}{% endmacro %}{{ down(3) }}";
    assert_eq!(render(source, &Context::new()).unwrap(), "3210");
}

#[test]
fn deep_macro_recursion_renders() {
    let source = "{% macro down(n) %}{% if n > 0 %}{{ down(n - 1) }}{% endif %}{{ n % 10 }}{% endmacro %}{{ down(200) | abbreviate(8) }}";
    assert_eq!(render(source, &Context::new()).unwrap(), "01234...");
}

#[test]
fn unbounded_macro_recursion_is_a_render_error() {
    let err = render(
        "{% macro again() %}{{ again() }}{% endmacro %}{{ again() }}",
        &Context::new(),
    )
    .unwrap_err();
    assert!(err.to_string().contains("maximum macro call depth"), "{err}");
}

#[test]
fn self_including_template_is_a_render_error() {
    let loader = MemoryLoader::new().with("loop", "x{% include 'loop' %}");
    let err = Engine::new(loader)
        .compile("loop")
        .unwrap()
        .render(&Context::new())
        .unwrap_err();
    assert!(err.to_string().contains("maximum include depth"), "{err}");
}

#[test]
fn undefined_function_is_a_render_error() {
    let err = render("line one\n{{ nope(1) }}", &Context::new()).unwrap_err();
    match err {
        Error::Render { message, line, .. } => {
            assert!(message.contains("undefined function or macro 'nope'"));
            assert_eq!(line, 2);
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn import_binds_macros_under_an_alias() {
    let loader = MemoryLoader::new()
        .with(
            "forms",
            r#"{% macro input(name, type) %}<input name="{{ name }}" type="{{ type | default('text') }}">{% endmacro %}"#,
        )
        .with("page", "{% import 'forms' as forms %}{{ forms.input('email') }}{{ forms.input('pw', 'password') }}");
    let html = Engine::new(loader).compile("page").unwrap().render(&Context::new()).unwrap();
    assert_eq!(html, r#"<input name="email" type="text"><input name="pw" type="password">"#);
}

#[test]
fn calling_a_missing_macro_on_a_module_fails() {
    let loader = MemoryLoader::new()
        .with("forms", "")
        .with("page", "{% import 'forms' as forms %}{{ forms.select() }}");
    let err = Engine::new(loader).compile("page").unwrap().render(&Context::new()).unwrap_err();
    assert!(err.to_string().contains("macro 'select' is not defined"));
}

#[test]
fn include_renders_inline_with_extra_context() {
    let loader = MemoryLoader::new()
        .with("row", "<li>{{ label }}/{{ site }}</li>{% set site = 'changed' %}")
        .with("list", "<ul>{% for label in ['a', 'b'] %}{% include 'row' %}{% endfor %}{% include 'row' with {'label': 'z'} %}</ul>{{ site }}");
    let html = Engine::new(loader)
        .compile("list")
        .unwrap()
        .render(&Context::new().with("site", "web"))
        .unwrap();
    assert_eq!(html, "<ul><li>a/web</li><li>b/web</li><li>z/web</li></ul>web");
}

#[test]
fn missing_include_is_a_render_error() {
    let loader = MemoryLoader::new().with("page", "{% include 'ghost' %}");
    let err = Engine::new(loader).compile("page").unwrap().render(&Context::new()).unwrap_err();
    assert!(err.to_string().contains("unable to load template 'ghost'"), "{err}");
}

#[test]
fn syntax_errors_carry_template_and_line() {
    let err = render("ok\n\n{{ 1 + }}", &Context::new()).unwrap_err();
    match err {
        Error::Syntax { line, .. } => assert_eq!(line, 3),
        other => panic!("unexpected error {other:?}"),
    }
    assert!(matches!(render("{% bogus %}", &Context::new()), Err(Error::Syntax { .. })));
    assert!(matches!(render("{{ x | nosuchfilter }}", &Context::new()), Err(Error::Syntax { .. })));
    assert!(matches!(render("{{ 'open", &Context::new()), Err(Error::Syntax { .. })));
}
