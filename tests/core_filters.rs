use chrono::NaiveDate;
use shimmypebble::{Context, Engine, StringLoader};

fn render(source: &str, context: &Context) -> String {
    Engine::new(StringLoader)
        .compile(source)
        .unwrap()
        .render(context)
        .unwrap()
}

fn render_plain(source: &str) -> String {
    render(source, &Context::new())
}

#[test]
fn chained_filters_with_null_input() {
    assert_eq!(render_plain("{{ null | upper | lower }}"), "");
}

#[test]
fn lower_and_upper() {
    assert_eq!(render_plain("{{ 'TEMPLATE' | lower }}"), "template");
    assert_eq!(render_plain("{{ 'template' | upper }}"), "TEMPLATE");
    assert_eq!(render_plain("{{ null | lower }}{{ null | upper }}"), "");
}

#[test]
fn date_formats_dates_and_reparses_strings() {
    let real_date = NaiveDate::from_ymd_opt(2012, 7, 1).unwrap();
    let context = Context::new()
        .with("realDate", real_date)
        .with("stringDate", "2012-July-1")
        .with("format", "yyyy-MMMM-d");

    let source = r#"{{ realDate | date("MM/dd/yyyy") }}{{ realDate | date(format) }}{{ stringDate | date("yyyy-MMMM-d", "yyyy/MMMM/d") }}"#;
    assert_eq!(render(source, &context), "07/01/20122012-July-12012/July/1");
}

#[test]
fn date_with_null_input() {
    assert_eq!(render_plain(r#"{{ null | date("MM/dd/yyyy") }}"#), "");
}

#[test]
fn unparsable_date_is_a_render_error() {
    let template = Engine::new(StringLoader)
        .compile("{{ 'soon' | date('yyyy-MM-dd', 'yyyy') }}")
        .unwrap();
    let err = template.render(&Context::new()).unwrap_err();
    assert!(err.to_string().contains("cannot parse 'soon'"), "{err}");
}

#[test]
fn urlencode() {
    assert_eq!(
        render_plain("{{ 'The string ü@foo-bar' | urlencode }}"),
        "The+string+%C3%BC%40foo-bar"
    );
    assert_eq!(render_plain("{{ null | urlencode }}"), "");
}

#[test]
fn format() {
    let context = Context::new().with("foo", "foo");
    assert_eq!(
        render("{{ 'I like %s and %s.' | format(foo, 'bar') }}", &context),
        "I like foo and bar."
    );
    assert_eq!(render_plain("{{ null | format(foo, 'bar') }}"), "");
}

#[test]
fn number_format() {
    let context = Context::new().with("currencyFormat", "$#,###,###,##0.00");
    assert_eq!(
        render("You owe me {{ 10000.235166 | numberformat(currencyFormat) }}.", &context),
        "You owe me $10,000.24."
    );
    assert_eq!(render_plain("{{ null | numberformat(currencyFormat) }}"), "");
    assert_eq!(render_plain("{{ 1000000 | numberformat }}"), "1,000,000");
}

#[test]
fn abbreviate() {
    assert_eq!(
        render_plain("{{ 'This is a test of the abbreviate filter' | abbreviate(16) }}"),
        "This is a tes..."
    );
    assert_eq!(render_plain("{{ null | abbreviate(16) }}"), "");
}

#[test]
fn capitalize() {
    assert_eq!(
        render_plain("{{ 'this should be capitalized.' | capitalize }}"),
        "This should be capitalized."
    );
    assert_eq!(render_plain("{{ null | capitalize }}"), "");
    assert_eq!(render_plain("{{ '' | capitalize }}"), "");
}

#[test]
fn trim() {
    assert_eq!(
        render_plain("{{ '        \t\tThis should be trimmed. \t\t' | trim }}"),
        "This should be trimmed."
    );
    assert_eq!(render_plain("{{ null | trim }}"), "");
}

#[test]
fn json() {
    let context = Context::new().with("items", vec!["a", "b"]);
    assert_eq!(render("{{ items | json }}", &context), r#"["a","b"]"#);
    assert_eq!(render_plain("{{ {'n': 1.5, 'ok': true} | json }}"), r#"{"n":1.5,"ok":true}"#);
}

#[test]
fn default() {
    let context = Context::new().with("obj", shimmypebble::Value::Null);
    assert_eq!(
        render(
            "{{ obj|default('ONE') }} {{ null|default('TWO') }} {{ '  ' |default('THREE') }} {{ 4 |default('FOUR') }}",
            &context
        ),
        "ONE TWO THREE 4"
    );
}

#[test]
fn builtin_tests() {
    assert_eq!(
        render_plain("{{ 4 is even }} {{ 3 is odd }} {{ x is null }} {{ '' is empty }} {{ [1] is iterable }} {{ 2 is equalTo(2.0) }} {{ 1 is not null }}"),
        "true true true true true true true"
    );
}

#[test]
fn functions() {
    assert_eq!(render_plain("{{ range(1, 5, 2) }} {{ min(4, 2, 8) }} {{ max([1, 9, 3]) }}"), "[1, 3, 5] 2 9");
}
