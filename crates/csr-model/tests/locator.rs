//! Schema-location to path-location translation.

use csr_model::{convert_schema_loc_to_path_loc, LocStep, Location, UNKNOWN_NAME};
use log as _;
use proptest as _;
use rstest::rstest;
use serde as _;
use serde_json::{json, Value};
use thiserror as _;

/// Parses `items.0.register.offset` into a location.
fn loc(dotted: &str) -> Location {
    dotted
        .split('.')
        .filter(|step| !step.is_empty())
        .map(|step| {
            step.parse::<usize>()
                .map_or_else(|_| LocStep::from(step), LocStep::from)
        })
        .collect()
}

fn sample() -> Value {
    json!({
        "name": "map_a",
        "doc": "",
        "items": [{
            "kind": "register",
            "name": "reg_a",
            "fields": [{
                "name": "field_a",
                "enum": {"name": "enum_a", "members": [{"name": "m0"}]},
            }],
        }],
    })
}

#[rstest]
#[case("doc", &["map_a", "doc"])]
#[case("items.0", &["map_a", "reg_a"])]
#[case("items.0.register.offset", &["map_a", "reg_a", "offset"])]
#[case("items.0.register.fields.0.enum.value", &["map_a", "reg_a", "field_a", "enum_a", "value"])]
#[case("items.0.register.fields.0.field.enum.members.0.value", &["map_a", "reg_a", "field_a", "enum_a", "m0", "value"])]
#[case("items.0.register.fields.3.name", &["map_a", "reg_a", UNKNOWN_NAME, "name"])]
#[case("items.1.register", &["map_a", UNKNOWN_NAME])]
fn translates_against_sample(#[case] schema_loc: &str, #[case] expected: &[&str]) {
    assert_eq!(convert_schema_loc_to_path_loc(&loc(schema_loc), &sample()), expected);
}

#[test]
fn empty_input_has_unknown_root() {
    assert_eq!(
        convert_schema_loc_to_path_loc(&loc("name"), &json!({})),
        [UNKNOWN_NAME, "name"]
    );
}

#[test]
fn non_list_fields_stop_at_the_key() {
    let data = json!({"name": "map_a", "items": [{"name": "reg_a", "fields": "wrong"}]});
    assert_eq!(
        convert_schema_loc_to_path_loc(&loc("items.0.register.fields"), &data),
        ["map_a", "reg_a", "fields"]
    );
}

#[rstest]
#[case(json!({"name": null, "items": [{"name": "reg_a"}]}))]
#[case(json!({"items": [{"name": "reg_a"}]}))]
#[case(json!({"name": "not valid", "items": [{"name": "reg_a"}]}))]
fn missing_or_invalid_root_name(#[case] data: Value) {
    assert_eq!(
        convert_schema_loc_to_path_loc(&loc("items.0.doc"), &data),
        [UNKNOWN_NAME, "reg_a", "doc"]
    );
}

#[test]
fn root_location_is_just_the_map() {
    assert_eq!(convert_schema_loc_to_path_loc(&Location::root(), &sample()), ["map_a"]);
}

#[test]
fn names_keep_input_case() {
    let data = json!({"name": " Top ", "items": [{"name": "Reg_A", "fields": [{"name": "X"}]}]});
    assert_eq!(
        convert_schema_loc_to_path_loc(&loc("items.0.register.fields.0.width"), &data),
        ["Top", "Reg_A", "X", "width"]
    );
}
