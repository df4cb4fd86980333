#[macro_use]
extern crate proptest;

use proptest::prelude::{Strategy, any, prop};

use flowloom::context::VariableMap;
use flowloom::template::resolve_str;
use serde_json::{Value, json};

// Generators shared by the resolution properties.

fn name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,10}").unwrap()
}

/// Literal text with no `{` at all. `}` is allowed: a `}}` without a
/// matching opener passes through untouched.
fn literal_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9 _.,!?}-]{0,40}").unwrap()
}

fn value_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9 .+-]{0,20}").unwrap()
}

/// A well-formed placeholder still present after resolution: some `{{`
/// with a `}}` anywhere after it.
fn has_open_placeholder(s: &str) -> bool {
    match s.find("{{") {
        Some(open) => s[open..].contains("}}"),
        None => false,
    }
}

proptest! {
    #[test]
    fn prop_text_without_openers_passes_through(text in literal_strategy()) {
        let vars = VariableMap::default();
        prop_assert_eq!(resolve_str(&text, &vars, &Value::Null), text);
    }

    #[test]
    fn prop_known_variables_substitute(
        name in name_strategy(),
        value in value_strategy(),
        pre in literal_strategy(),
        post in literal_strategy(),
    ) {
        let mut vars = VariableMap::default();
        vars.set(&name, json!(value.clone()));

        let input = format!("{pre}{{{{{name}}}}}{post}");
        let expected = format!("{pre}{value}{post}");
        prop_assert_eq!(resolve_str(&input, &vars, &Value::Null), expected);
    }

    #[test]
    fn prop_unknown_placeholders_render_empty(
        name in name_strategy(),
        pre in literal_strategy(),
        post in literal_strategy(),
    ) {
        let vars = VariableMap::default();
        let input = format!("{pre}{{{{{name}}}}}{post}");
        prop_assert_eq!(resolve_str(&input, &vars, &Value::Null), format!("{pre}{post}"));
    }

    #[test]
    fn prop_resolution_consumes_every_wellformed_placeholder(input in any::<String>()) {
        let mut vars = VariableMap::default();
        vars.set("sentinel", json!("resolved sentinel value"));

        // Totality: arbitrary input resolves without panicking, and no
        // `{{...}}` pair survives; an unterminated `{{` tail may remain.
        let resolved = resolve_str(&input, &vars, &json!({"k": "v"}));
        prop_assert!(
            !has_open_placeholder(&resolved),
            "unresolved placeholder left in {resolved:?}"
        );
    }

    #[test]
    fn prop_trigger_paths_read_the_payload(
        payload in prop::collection::btree_map(name_strategy(), value_strategy(), 1..5usize),
        pre in literal_strategy(),
    ) {
        let trigger = json!(payload);
        let (key, value) = payload.iter().next().unwrap();

        let vars = VariableMap::default();
        let input = format!("{pre}{{{{$trigger.{key}}}}}");
        prop_assert_eq!(resolve_str(&input, &vars, &trigger), format!("{pre}{value}"));
    }

    #[test]
    fn prop_whitespace_inside_braces_is_trimmed(
        name in name_strategy(),
        value in value_strategy(),
        left in prop::string::string_regex("[ \t]{0,3}").unwrap(),
        right in prop::string::string_regex("[ \t]{0,3}").unwrap(),
    ) {
        let mut vars = VariableMap::default();
        vars.set(&name, json!(value.clone()));

        let input = format!("{{{{{left}{name}{right}}}}}");
        prop_assert_eq!(resolve_str(&input, &vars, &Value::Null), value);
    }

    #[test]
    fn prop_scalars_render_in_json_form(
        name in name_strategy(),
        number in any::<i64>(),
        flag in any::<bool>(),
    ) {
        let mut vars = VariableMap::default();
        vars.set(&name, json!(number));
        prop_assert_eq!(
            resolve_str(&format!("{{{{{name}}}}}"), &vars, &Value::Null),
            number.to_string()
        );

        vars.set(&name, json!(flag));
        prop_assert_eq!(
            resolve_str(&format!("{{{{{name}}}}}"), &vars, &Value::Null),
            flag.to_string()
        );
    }
}
